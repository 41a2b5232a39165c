//! Compliance-checker suppressions for resources that legitimately carry
//! wildcard permissions.

use serde::Serialize;
use serde_json::{json, Value};

use crate::template::Template;

/// Rule flagging wildcard permissions.
pub const WILDCARD_PERMISSIONS_RULE: &str = "AwsSolutions-IAM5";

/// One suppressed rule with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suppression {
    pub id: String,
    pub reason: String,
}

impl Suppression {
    pub fn new(id: &str, reason: &str) -> Self {
        Self {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Metadata block the compliance checker reads.
pub fn suppression_metadata(suppressions: &[Suppression]) -> Value {
    json!({ "cdk_nag": { "rules_to_suppress": suppressions } })
}

/// Suppressions for the pipeline stack, keyed by logical id.
pub fn pipeline_suppressions() -> Vec<(&'static str, Vec<Suppression>)> {
    vec![
        (
            "CustomPackageCodeBuildProjectRole",
            vec![Suppression::new(
                WILDCARD_PERMISSIONS_RULE,
                "Build role wildcards are limited to objects in the pipeline artifact bucket",
            )],
        ),
        (
            "PublishPackageProjectRole",
            vec![Suppression::new(
                WILDCARD_PERMISSIONS_RULE,
                "Publish role wildcards are limited to objects in the pipeline artifact bucket",
            )],
        ),
        (
            "PackagePipelineRole",
            vec![Suppression::new(
                WILDCARD_PERMISSIONS_RULE,
                "Pipeline role uses object-level S3 and KMS actions on the artifact store",
            )],
        ),
        (
            "CodeArtifactAccessPolicy",
            vec![Suppression::new(
                WILDCARD_PERMISSIONS_RULE,
                "Only allows access to the planned regional repository resources",
            )],
        ),
    ]
}

/// Attach every suppression to its resource. Returns the logical ids that
/// were not found in `template`.
pub fn apply(template: &mut Template, suppressions: &[(&str, Vec<Suppression>)]) -> Vec<String> {
    suppressions
        .iter()
        .filter(|(id, rules)| !template.set_metadata(id, suppression_metadata(rules)))
        .map(|(id, _)| id.to_string())
        .collect()
}
