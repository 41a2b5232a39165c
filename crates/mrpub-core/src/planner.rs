//! Multi-region topology planning.
//!
//! Expands one logical "publish" step into a publish action per region and
//! derives every repository, domain and package identifier those actions need
//! to be authorized for.
//!
//! The plan is a pure map over the region set in its canonical order
//! (replicas in input order, then the primary). Each region contributes four
//! identifiers and one action; nothing is accumulated across regions, so the
//! same inputs always produce the same topology.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::PublishingConfig;
use crate::coordinates::RepositoryCoordinates;
use crate::digest::compute_digest;
use crate::error::PlanResult;
use crate::locator::{
    ResourceIdentifier, ResourceLocator, ResourceType, CODEARTIFACT_SERVICE, DEFAULT_PARTITION,
    WILDCARD_SUFFIX,
};
use crate::obs::{emit_plan_finished, emit_plan_rejected, emit_plan_started, emit_region_planned};
use crate::region::{Region, RegionSet};

/// Run order shared by every publish action, primary included.
pub const PUBLISH_RUN_ORDER: u32 = 1;

/// Identifiers derived per region: repository, contents, domain, package.
pub const IDENTIFIERS_PER_REGION: usize = 4;

/// Prefix of every publish action name.
pub const PUBLISH_ACTION_PREFIX: &str = "PublishToRegion-";

/// Parameter keys handed to the external publish tool.
pub mod params {
    pub const DOMAIN_OWNER: &str = "domainOwner";
    pub const DOMAIN_NAME: &str = "domainName";
    pub const REPOSITORY_NAME: &str = "repositoryName";
    pub const REGION: &str = "region";
}

/// One regional publish action.
///
/// All descriptors of a plan share [`PUBLISH_RUN_ORDER`]; the primary is
/// distinguished only by `is_primary`, never by its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishActionDescriptor {
    /// Unique action name derived from the region.
    pub name: String,
    pub region: Region,
    pub is_primary: bool,
    pub run_order: u32,
    /// Structured parameters for the publish tool:
    /// `domainOwner`, `domainName`, `repositoryName`, `region`.
    pub parameters: BTreeMap<String, String>,
}

/// Result of planning: identifiers for access scoping, actions for stage
/// expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub identifiers: Vec<ResourceIdentifier>,
    pub actions: Vec<PublishActionDescriptor>,
}

impl Topology {
    /// The action publishing to the primary region.
    pub fn primary_action(&self) -> Option<&PublishActionDescriptor> {
        self.actions.iter().find(|a| a.is_primary)
    }

    /// Identifiers belonging to one region, in derivation order.
    pub fn identifiers_for<'a>(
        &'a self,
        region: &'a Region,
    ) -> impl Iterator<Item = &'a ResourceIdentifier> + 'a {
        self.identifiers.iter().filter(move |id| &id.region == region)
    }

    /// Rendered identifier strings, in derivation order.
    pub fn identifier_strings(&self) -> Vec<String> {
        self.identifiers.iter().map(ToString::to_string).collect()
    }

    /// SHA-256 digest of the canonical JSON form of this topology.
    pub fn digest(&self) -> PlanResult<String> {
        compute_digest(self)
    }
}

/// Derives a [`Topology`] from repository coordinates and a region set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPlanner {
    partition: String,
}

impl Default for TopologyPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION)
    }
}

impl TopologyPlanner {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
        }
    }

    /// Plan the topology for already-validated inputs.
    ///
    /// Produces `4 × |regions|` identifiers and `|regions|` actions.
    pub fn plan(
        &self,
        coordinates: &RepositoryCoordinates,
        regions: &RegionSet,
    ) -> PlanResult<Topology> {
        emit_plan_started(regions.primary().as_str(), regions.replicas().len());

        let locator = ResourceLocator::new(&self.partition, coordinates.owner_account_id())?;

        let per_region = regions
            .iter()
            .map(|region| {
                let identifiers = regional_identifiers(&locator, coordinates, region)?;
                let action = publish_action(coordinates, region, regions.is_primary(region));
                emit_region_planned(region.as_str(), action.is_primary, identifiers.len());
                Ok((identifiers, action))
            })
            .collect::<PlanResult<Vec<_>>>()?;

        let (identifiers, actions): (Vec<Vec<ResourceIdentifier>>, Vec<PublishActionDescriptor>) =
            per_region.into_iter().unzip();

        let topology = Topology {
            identifiers: identifiers.into_iter().flatten().collect(),
            actions,
        };

        emit_plan_finished(
            topology.identifiers.len(),
            topology.actions.len(),
            &topology.digest()?,
        );
        Ok(topology)
    }

    /// Validate raw static parameters, then plan.
    ///
    /// Any configuration error aborts before a single identifier is derived.
    pub fn plan_config(config: &PublishingConfig) -> PlanResult<Topology> {
        let validated = config.validate().map_err(|e| {
            emit_plan_rejected(e.kind(), &e);
            e
        })?;
        TopologyPlanner::new(validated.partition.clone())
            .plan(&validated.coordinates, &validated.regions)
    }
}

/// Repository, repository contents, domain and package identifiers for one
/// region, in that order.
fn regional_identifiers(
    locator: &ResourceLocator,
    coordinates: &RepositoryCoordinates,
    region: &Region,
) -> PlanResult<Vec<ResourceIdentifier>> {
    let repository_path = coordinates.repository_path();

    let repository = locator.identifier(
        CODEARTIFACT_SERVICE,
        ResourceType::Repository,
        region,
        &repository_path,
    )?;
    let contents = repository.contents();
    let domain = locator.identifier(
        CODEARTIFACT_SERVICE,
        ResourceType::Domain,
        region,
        coordinates.domain_name(),
    )?;
    let package = locator.identifier(
        CODEARTIFACT_SERVICE,
        ResourceType::Package,
        region,
        &format!("{repository_path}{WILDCARD_SUFFIX}"),
    )?;

    Ok(vec![repository, contents, domain, package])
}

fn publish_action(
    coordinates: &RepositoryCoordinates,
    region: &Region,
    is_primary: bool,
) -> PublishActionDescriptor {
    let parameters = BTreeMap::from([
        (
            params::DOMAIN_OWNER.to_string(),
            coordinates.owner_account_id().to_string(),
        ),
        (
            params::DOMAIN_NAME.to_string(),
            coordinates.domain_name().to_string(),
        ),
        (
            params::REPOSITORY_NAME.to_string(),
            coordinates.repository_name().to_string(),
        ),
        (params::REGION.to_string(), region.to_string()),
    ]);

    PublishActionDescriptor {
        name: format!("{PUBLISH_ACTION_PREFIX}{region}"),
        region: region.clone(),
        is_primary,
        run_order: PUBLISH_RUN_ORDER,
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> RepositoryCoordinates {
        RepositoryCoordinates::new("custom-package-domain", "package-artifact-repo", "123456789012")
            .unwrap()
    }

    #[test]
    fn test_regional_identifiers_order() {
        let locator = ResourceLocator::new("aws", "123456789012").unwrap();
        let region = Region::parse("region", "us-west-2").unwrap();
        let ids = regional_identifiers(&locator, &coords(), &region).unwrap();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "arn:aws:codeartifact:us-west-2:123456789012:repository/custom-package-domain/package-artifact-repo",
                "arn:aws:codeartifact:us-west-2:123456789012:repository/custom-package-domain/package-artifact-repo/*",
                "arn:aws:codeartifact:us-west-2:123456789012:domain/custom-package-domain",
                "arn:aws:codeartifact:us-west-2:123456789012:package/custom-package-domain/package-artifact-repo/*",
            ]
        );
    }

    #[test]
    fn test_publish_action_parameters() {
        let region = Region::parse("region", "us-east-2").unwrap();
        let action = publish_action(&coords(), &region, false);
        assert_eq!(action.name, "PublishToRegion-us-east-2");
        assert_eq!(action.run_order, PUBLISH_RUN_ORDER);
        assert!(!action.is_primary);
        assert_eq!(action.parameters[params::REGION], "us-east-2");
        assert_eq!(action.parameters[params::DOMAIN_OWNER], "123456789012");
        assert_eq!(action.parameters[params::DOMAIN_NAME], "custom-package-domain");
        assert_eq!(
            action.parameters[params::REPOSITORY_NAME],
            "package-artifact-repo"
        );
        assert_eq!(action.parameters.len(), 4);
    }

    #[test]
    fn test_plan_marks_primary_last() {
        let regions = RegionSet::parse("us-east-1", &["us-west-2", "us-east-2"]).unwrap();
        let topology = TopologyPlanner::default().plan(&coords(), &regions).unwrap();
        let primary = topology.primary_action().unwrap();
        assert_eq!(primary.region.as_str(), "us-east-1");
        assert_eq!(topology.actions.iter().filter(|a| a.is_primary).count(), 1);
        assert_eq!(
            topology.identifiers_for(regions.primary()).count(),
            IDENTIFIERS_PER_REGION
        );
    }

    #[test]
    fn test_partition_flows_into_identifiers() {
        let regions = RegionSet::parse::<&str>("cn-north-1", &[]).unwrap();
        let topology = TopologyPlanner::new("aws-cn")
            .plan(&coords(), &regions)
            .unwrap();
        assert!(topology
            .identifier_strings()
            .iter()
            .all(|s| s.starts_with("arn:aws-cn:codeartifact:cn-north-1:")));
    }
}
