//! Regions and the ordered primary/replica region set.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// A named geographic deployment target, e.g. `"us-east-1"`.
///
/// Only lowercase ASCII letters, digits and inner hyphens are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    /// Parse a region name, naming `field` in the error on failure.
    pub fn parse(field: &str, name: &str) -> PlanResult<Self> {
        if name.is_empty() {
            return Err(PlanError::invalid(field, "region must not be empty"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(PlanError::invalid(
                field,
                format!("region '{name}' may only contain lowercase letters, digits and hyphens"),
            ));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(PlanError::invalid(
                field,
                format!("region '{name}' must not start or end with a hyphen"),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Region {
    type Error = PlanError;

    fn try_from(value: String) -> PlanResult<Self> {
        Region::parse("region", &value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// One primary region plus an ordered list of replica regions.
///
/// Invariants, checked once at construction:
/// - the primary never appears among the replicas
/// - replicas are pairwise distinct
///
/// Traversal order is replicas in insertion order, then the primary. Callers
/// that care which region is the primary must ask [`RegionSet::is_primary`]
/// rather than rely on position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionSet {
    primary: Region,
    replicas: Vec<Region>,
}

impl RegionSet {
    /// Build a region set, rejecting any repeated region.
    pub fn new(primary: Region, replicas: Vec<Region>) -> PlanResult<Self> {
        let mut seen: HashSet<&Region> = HashSet::with_capacity(replicas.len() + 1);
        seen.insert(&primary);
        for replica in &replicas {
            if !seen.insert(replica) {
                return Err(PlanError::DuplicateRegion {
                    region: replica.to_string(),
                });
            }
        }
        Ok(Self { primary, replicas })
    }

    /// Parse raw region names and build the set.
    pub fn parse<S: AsRef<str>>(primary: &str, replicas: &[S]) -> PlanResult<Self> {
        let primary = Region::parse("primary_region", primary)?;
        let replicas = replicas
            .iter()
            .map(|r| Region::parse("replica_regions", r.as_ref()))
            .collect::<PlanResult<Vec<_>>>()?;
        Self::new(primary, replicas)
    }

    pub fn primary(&self) -> &Region {
        &self.primary
    }

    pub fn replicas(&self) -> &[Region] {
        &self.replicas
    }

    pub fn is_primary(&self, region: &Region) -> bool {
        &self.primary == region
    }

    /// Total number of regions (primary included).
    pub fn len(&self) -> usize {
        self.replicas.len() + 1
    }

    /// Always false; a region set holds at least its primary.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Replicas in insertion order, then the primary.
    pub fn iter(&self) -> impl Iterator<Item = &Region> + '_ {
        self.replicas.iter().chain(std::iter::once(&self.primary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str) -> Region {
        Region::parse("region", name).unwrap()
    }

    #[test]
    fn test_region_parse_accepts_provider_names() {
        assert_eq!(region("us-east-1").as_str(), "us-east-1");
        assert_eq!(region("eu-west-2").as_str(), "eu-west-2");
    }

    #[test]
    fn test_region_parse_rejects_padding() {
        for padded in [" us-east-1", "us-east-1 ", "\tus-east-1"] {
            let err = Region::parse("replica_regions", padded).unwrap_err();
            assert!(
                matches!(err, PlanError::InvalidArgument { ref field, .. } if field == "replica_regions"),
                "expected InvalidArgument for {padded:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_region_parse_rejects_malformed() {
        for bad in ["", "US-EAST-1", "us_east_1", "-us-east-1", "us-east-1-", "us east"] {
            let err = Region::parse("primary_region", bad).unwrap_err();
            assert!(
                matches!(err, PlanError::InvalidArgument { ref field, .. } if field == "primary_region"),
                "expected InvalidArgument for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_region_set_traversal_replicas_then_primary() {
        let set = RegionSet::new(
            region("us-east-1"),
            vec![region("us-west-2"), region("us-east-2")],
        )
        .unwrap();
        let order: Vec<&str> = set.iter().map(Region::as_str).collect();
        assert_eq!(order, vec!["us-west-2", "us-east-2", "us-east-1"]);
        assert_eq!(set.len(), 3);
        assert!(set.is_primary(&region("us-east-1")));
        assert!(!set.is_primary(&region("us-west-2")));
    }

    #[test]
    fn test_region_set_rejects_primary_as_replica() {
        let err = RegionSet::new(region("us-east-1"), vec![region("us-east-1")]).unwrap_err();
        assert!(matches!(err, PlanError::DuplicateRegion { region } if region == "us-east-1"));
    }

    #[test]
    fn test_region_set_rejects_repeated_replica() {
        let err = RegionSet::parse("us-east-1", &["us-west-2", "eu-west-1", "us-west-2"])
            .unwrap_err();
        assert!(matches!(err, PlanError::DuplicateRegion { region } if region == "us-west-2"));
    }

    #[test]
    fn test_region_set_zero_replicas() {
        let set = RegionSet::parse::<&str>("us-east-1", &[]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().count(), 1);
        assert!(set.replicas().is_empty());
    }

    #[test]
    fn test_region_deserialize_validates() {
        let ok: Region = serde_json::from_str("\"ap-south-1\"").unwrap();
        assert_eq!(ok.as_str(), "ap-south-1");
        assert!(serde_json::from_str::<Region>("\"Nope!\"").is_err());
    }
}
