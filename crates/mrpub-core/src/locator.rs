//! Fully-qualified resource identifiers.
//!
//! [`ResourceLocator`] is a pure mapping from
//! `(service, resource type, region, resource name)` to an identifier string of
//! the form `arn:{partition}:{service}:{region}:{account}:{type}/{name}`. The
//! partition and owning account are fixed context carried by the locator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::region::Region;

/// Service namespace of the package repository.
pub const CODEARTIFACT_SERVICE: &str = "codeartifact";

/// Default provider partition.
pub const DEFAULT_PARTITION: &str = "aws";

/// Suffix that widens an identifier to everything beneath it.
pub const WILDCARD_SUFFIX: &str = "/*";

/// Package-repository resource types that need access grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Domain,
    Repository,
    Package,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Domain => "domain",
            ResourceType::Repository => "repository",
            ResourceType::Package => "package",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, derived resource identifier.
///
/// Two identifiers are equal iff every field matches. `Display` renders the
/// fully-qualified string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub partition: String,
    pub account_id: String,
    pub service: String,
    pub resource_type: ResourceType,
    pub region: Region,
    pub path: String,
}

impl ResourceIdentifier {
    /// The same identifier widened with a wildcard suffix.
    ///
    /// For a repository this is the "contents" identifier used for
    /// object-level permission scoping.
    pub fn contents(&self) -> Self {
        Self {
            path: format!("{}{}", self.path, WILDCARD_SUFFIX),
            ..self.clone()
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.path.ends_with(WILDCARD_SUFFIX)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}/{}",
            self.partition,
            self.service,
            self.region,
            self.account_id,
            self.resource_type,
            self.path
        )
    }
}

/// Formats identifiers for a fixed partition and owning account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    partition: String,
    account_id: String,
}

impl ResourceLocator {
    pub fn new(partition: impl Into<String>, account_id: impl Into<String>) -> PlanResult<Self> {
        let partition = partition.into();
        let account_id = account_id.into();
        if partition.trim().is_empty() {
            return Err(PlanError::invalid("partition", "partition must not be empty"));
        }
        if account_id.trim().is_empty() {
            return Err(PlanError::invalid("account_id", "account id must not be empty"));
        }
        Ok(Self {
            partition,
            account_id,
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Build a structured identifier.
    ///
    /// Fails with `InvalidArgument` on an empty service or resource name
    /// instead of producing a malformed identifier.
    pub fn identifier(
        &self,
        service: &str,
        resource_type: ResourceType,
        region: &Region,
        resource_name: &str,
    ) -> PlanResult<ResourceIdentifier> {
        if service.is_empty() {
            return Err(PlanError::invalid("service", "service must not be empty"));
        }
        if resource_name.is_empty() {
            return Err(PlanError::invalid(
                "resource_name",
                "resource name must not be empty",
            ));
        }
        Ok(ResourceIdentifier {
            partition: self.partition.clone(),
            account_id: self.account_id.clone(),
            service: service.to_string(),
            resource_type,
            region: region.clone(),
            path: resource_name.to_string(),
        })
    }

    /// Render the identifier string for raw inputs.
    ///
    /// Deterministic and side-effect free: identical inputs always yield
    /// identical strings.
    pub fn locate(
        &self,
        service: &str,
        resource_type: ResourceType,
        region: &str,
        resource_name: &str,
    ) -> PlanResult<String> {
        let region = Region::parse("region", region)?;
        Ok(self
            .identifier(service, resource_type, &region, resource_name)?
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> ResourceLocator {
        ResourceLocator::new(DEFAULT_PARTITION, "123456789012").unwrap()
    }

    #[test]
    fn test_locate_formats_identifier() {
        let arn = locator()
            .locate(
                CODEARTIFACT_SERVICE,
                ResourceType::Repository,
                "us-west-2",
                "custom-package-domain/package-artifact-repo",
            )
            .unwrap();
        assert_eq!(
            arn,
            "arn:aws:codeartifact:us-west-2:123456789012:repository/custom-package-domain/package-artifact-repo"
        );
    }

    #[test]
    fn test_locate_is_deterministic() {
        let l = locator();
        let a = l
            .locate(CODEARTIFACT_SERVICE, ResourceType::Domain, "us-east-1", "d")
            .unwrap();
        let b = l
            .locate(CODEARTIFACT_SERVICE, ResourceType::Domain, "us-east-1", "d")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_locate_rejects_empty_inputs() {
        let l = locator();
        let err = l
            .locate(CODEARTIFACT_SERVICE, ResourceType::Domain, "", "d")
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));

        let err = l
            .locate(CODEARTIFACT_SERVICE, ResourceType::Domain, "us-east-1", "")
            .unwrap_err();
        assert!(
            matches!(err, PlanError::InvalidArgument { field, .. } if field == "resource_name")
        );

        let err = l
            .locate("", ResourceType::Domain, "us-east-1", "d")
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { field, .. } if field == "service"));
    }

    #[test]
    fn test_contents_appends_wildcard() {
        let region = Region::parse("region", "us-east-1").unwrap();
        let repo = locator()
            .identifier(CODEARTIFACT_SERVICE, ResourceType::Repository, &region, "d/r")
            .unwrap();
        let contents = repo.contents();
        assert_eq!(contents.to_string(), format!("{repo}/*"));
        assert!(contents.is_wildcard());
        assert!(!repo.is_wildcard());
        assert_ne!(repo, contents);
    }

    #[test]
    fn test_locator_requires_context() {
        assert!(ResourceLocator::new("", "123456789012").is_err());
        assert!(ResourceLocator::new("aws", " ").is_err());
    }
}
