//! Access grant for the shared publish execution role.
//!
//! The grant has exactly two statements:
//! 1. every `codeartifact:*` action on exactly the identifiers the planner
//!    derived, and nothing wider;
//! 2. `sts:GetServiceBearerToken` on `*`, conditioned on the requesting
//!    service being the package repository service. That action has no
//!    resource-level scoping, so the condition is the only narrowing
//!    available.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{PlanError, PlanResult};
use crate::locator::{ResourceIdentifier, CODEARTIFACT_SERVICE};
use crate::obs::emit_policy_built;

pub const POLICY_NAME: &str = "CodeArtifactAccessPolicy";
pub const POLICY_VERSION: &str = "2012-10-17";
pub const REPOSITORY_ACTIONS: &str = "codeartifact:*";
pub const TOKEN_ACTION: &str = "sts:GetServiceBearerToken";
pub const TOKEN_CONDITION_KEY: &str = "sts:AWSServiceName";
pub const REPOSITORY_SERVICE_PRINCIPAL: &str = "codeartifact.amazonaws.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// A single permission statement in provider policy-document form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    pub action: Vec<String>,
    pub resource: Vec<String>,
    /// `operator -> (key -> value)`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: BTreeMap<String, BTreeMap<String, String>>,
}

/// The execution identity every regional publish action runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRole {
    pub name: String,
}

impl ExecutionRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Named policy attached to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub policy_name: String,
    pub role: ExecutionRole,
    pub statements: Vec<PolicyStatement>,
}

impl AccessGrant {
    /// Resources of the repository statement.
    pub fn repository_resources(&self) -> &[String] {
        self.statements
            .iter()
            .find(|s| s.action.iter().any(|a| a == REPOSITORY_ACTIONS))
            .map(|s| s.resource.as_slice())
            .unwrap_or(&[])
    }

    /// The policy document as the provider expects it.
    pub fn policy_document(&self) -> serde_json::Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": self.statements,
        })
    }
}

/// Builds the [`AccessGrant`] for a planned identifier set.
pub struct AccessPolicyBuilder;

impl AccessPolicyBuilder {
    /// Build the grant for `role` scoped to `identifiers`.
    ///
    /// The repository statement lists the identifiers in the order given,
    /// with nothing added or dropped.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `identifiers` is empty or contains an
    /// identifier outside the package repository service.
    pub fn build(
        identifiers: &[ResourceIdentifier],
        role: &ExecutionRole,
    ) -> PlanResult<AccessGrant> {
        if identifiers.is_empty() {
            return Err(PlanError::invalid(
                "identifiers",
                "access grant needs at least one resource",
            ));
        }
        if let Some(foreign) = identifiers
            .iter()
            .find(|id| id.service != CODEARTIFACT_SERVICE)
        {
            return Err(PlanError::invalid(
                "identifiers",
                format!("'{foreign}' is outside the {CODEARTIFACT_SERVICE} namespace"),
            ));
        }
        if role.name.trim().is_empty() {
            return Err(PlanError::invalid("role", "role name must not be empty"));
        }

        let repository_statement = PolicyStatement {
            effect: Effect::Allow,
            action: vec![REPOSITORY_ACTIONS.to_string()],
            resource: identifiers.iter().map(ToString::to_string).collect(),
            condition: BTreeMap::new(),
        };

        let token_statement = PolicyStatement {
            effect: Effect::Allow,
            action: vec![TOKEN_ACTION.to_string()],
            resource: vec!["*".to_string()],
            condition: BTreeMap::from([(
                "StringEquals".to_string(),
                BTreeMap::from([(
                    TOKEN_CONDITION_KEY.to_string(),
                    REPOSITORY_SERVICE_PRINCIPAL.to_string(),
                )]),
            )]),
        };

        emit_policy_built(&role.name, repository_statement.resource.len());

        Ok(AccessGrant {
            policy_name: POLICY_NAME.to_string(),
            role: role.clone(),
            statements: vec![repository_statement, token_statement],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{ResourceLocator, ResourceType};
    use crate::region::Region;

    fn identifiers() -> Vec<ResourceIdentifier> {
        let locator = ResourceLocator::new("aws", "123456789012").unwrap();
        let region = Region::parse("region", "us-east-1").unwrap();
        let repo = locator
            .identifier(CODEARTIFACT_SERVICE, ResourceType::Repository, &region, "d/r")
            .unwrap();
        let domain = locator
            .identifier(CODEARTIFACT_SERVICE, ResourceType::Domain, &region, "d")
            .unwrap();
        vec![repo.clone(), repo.contents(), domain]
    }

    #[test]
    fn test_build_two_statements() {
        let ids = identifiers();
        let grant = AccessPolicyBuilder::build(&ids, &ExecutionRole::new("PublishRole")).unwrap();
        assert_eq!(grant.policy_name, POLICY_NAME);
        assert_eq!(grant.statements.len(), 2);

        let expected: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(grant.repository_resources(), expected.as_slice());

        let token = &grant.statements[1];
        assert_eq!(token.action, vec![TOKEN_ACTION.to_string()]);
        assert_eq!(token.resource, vec!["*".to_string()]);
        assert_eq!(
            token.condition["StringEquals"][TOKEN_CONDITION_KEY],
            REPOSITORY_SERVICE_PRINCIPAL
        );
    }

    #[test]
    fn test_no_broader_wildcard() {
        let grant =
            AccessPolicyBuilder::build(&identifiers(), &ExecutionRole::new("PublishRole")).unwrap();
        assert!(!grant.repository_resources().iter().any(|r| r == "*"));
    }

    #[test]
    fn test_policy_document_shape() {
        let grant =
            AccessPolicyBuilder::build(&identifiers(), &ExecutionRole::new("PublishRole")).unwrap();
        let doc = grant.policy_document();
        assert_eq!(doc["Version"], POLICY_VERSION);
        assert_eq!(doc["Statement"][0]["Effect"], "Allow");
        assert_eq!(doc["Statement"][0]["Action"][0], REPOSITORY_ACTIONS);
        assert!(doc["Statement"][0].get("Condition").is_none());
        assert_eq!(
            doc["Statement"][1]["Condition"]["StringEquals"]["sts:AWSServiceName"],
            "codeartifact.amazonaws.com"
        );
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let err = AccessPolicyBuilder::build(&[], &ExecutionRole::new("PublishRole")).unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }

    #[test]
    fn test_foreign_service_rejected() {
        let mut ids = identifiers();
        ids[0].service = "s3".to_string();
        let err = AccessPolicyBuilder::build(&ids, &ExecutionRole::new("PublishRole")).unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }
}
