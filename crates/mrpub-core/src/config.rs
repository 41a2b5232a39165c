//! Static parameters supplied by the entry point.
//!
//! Parameters come from a TOML file; the entry point overlays flags that fall
//! back to the `MRPUB_*` variables named here. Missing values deserialize as
//! empty so that [`PublishingConfig::validate`] can report exactly which field
//! is absent.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coordinates::RepositoryCoordinates;
use crate::error::{PlanError, PlanResult};
use crate::locator::DEFAULT_PARTITION;
use crate::region::RegionSet;

/// Default pipeline name.
pub const DEFAULT_PIPELINE_NAME: &str = "packagePipeline";

/// Default branch watched by the source stage.
pub const DEFAULT_SOURCE_BRANCH: &str = "main";

// Environment fallbacks for the entry point's flags.
pub const ENV_DOMAIN_NAME: &str = "MRPUB_DOMAIN_NAME";
pub const ENV_REPOSITORY_NAME: &str = "MRPUB_REPOSITORY_NAME";
pub const ENV_PRIMARY_REGION: &str = "MRPUB_PRIMARY_REGION";
pub const ENV_REPLICA_REGIONS: &str = "MRPUB_REPLICA_REGIONS";
pub const ENV_ACCOUNT_ID: &str = "MRPUB_ACCOUNT_ID";
pub const ENV_PARTITION: &str = "MRPUB_PARTITION";

/// Raw, unvalidated publishing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishingConfig {
    pub domain_name: String,
    pub repository_name: String,
    pub primary_region: String,
    pub replica_regions: Vec<String>,
    pub account_id: String,
    pub partition: String,
    pub pipeline_name: String,
    pub source_branch: String,
    /// Archive the source repository is seeded with when it is created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_bundle: Option<SourceBundle>,
}

/// Object-store location of a zipped source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceBundle {
    pub bucket: String,
    pub key: String,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            domain_name: String::new(),
            repository_name: String::new(),
            primary_region: String::new(),
            replica_regions: Vec::new(),
            account_id: String::new(),
            partition: DEFAULT_PARTITION.to_string(),
            pipeline_name: DEFAULT_PIPELINE_NAME.to_string(),
            source_branch: DEFAULT_SOURCE_BRANCH.to_string(),
            source_bundle: None,
        }
    }
}

/// Parameters that passed validation, ready for planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig {
    pub coordinates: RepositoryCoordinates,
    pub regions: RegionSet,
    pub partition: String,
    pub pipeline_name: String,
    pub source_branch: String,
    pub source_bundle: Option<SourceBundle>,
}

impl PublishingConfig {
    pub fn from_toml_str(input: &str) -> PlanResult<Self> {
        toml::from_str(input).map_err(|e| PlanError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PlanError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check every field and build the typed planning inputs.
    ///
    /// Fields are checked in declaration order and the first failure is
    /// returned, naming the field.
    pub fn validate(&self) -> PlanResult<ValidatedConfig> {
        let coordinates = RepositoryCoordinates::new(
            self.domain_name.as_str(),
            self.repository_name.as_str(),
            self.account_id.as_str(),
        )?;

        if self.primary_region.trim().is_empty() {
            return Err(PlanError::empty("primary_region"));
        }
        let regions = RegionSet::parse(&self.primary_region, &self.replica_regions)?;

        let partition = required("partition", &self.partition)?;
        if !partition
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(PlanError::invalid(
                "partition",
                format!("'{partition}' is not a valid partition name"),
            ));
        }

        let pipeline_name = required("pipeline_name", &self.pipeline_name)?;
        if !pipeline_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        {
            return Err(PlanError::invalid(
                "pipeline_name",
                format!("'{pipeline_name}' contains characters not allowed in a pipeline name"),
            ));
        }

        let source_branch = required("source_branch", &self.source_branch)?;

        let source_bundle = match &self.source_bundle {
            Some(bundle) => Some(SourceBundle {
                bucket: required("source_bundle.bucket", &bundle.bucket)?,
                key: required("source_bundle.key", &bundle.key)?,
            }),
            None => None,
        };

        Ok(ValidatedConfig {
            coordinates,
            regions,
            partition,
            pipeline_name,
            source_branch,
            source_bundle,
        })
    }
}

fn required(field: &str, value: &str) -> PlanResult<String> {
    if value.trim().is_empty() {
        return Err(PlanError::empty(field));
    }
    if value.trim() != value {
        return Err(PlanError::invalid(
            field,
            format!("'{value}' must not have surrounding whitespace"),
        ));
    }
    Ok(value.to_string())
}
