//! Container project definitions for the build and publish stages.
//!
//! Both projects run an external hook script inside an ephemeral container.
//! The buildspec is rendered from a typed [`BuildSpec`] and names nothing but
//! the hook path and the artifact layout; the container gets a structured
//! environment. Hook contents are never inspected.
//!
//! Contract with the source repository: it carries [`BUILD_HOOK`] and
//! [`PUBLISH_HOOK`]. The build hook leaves the package in [`ARTIFACT_DIR`];
//! the build artifact carries the publish hook forward, so the publish stage
//! needs nothing beyond its single input artifact.

use std::collections::BTreeMap;

use mrpub_core::planner::params;
use mrpub_core::{RegionSet, RepositoryCoordinates};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Directory the build tool leaves its artifact in.
pub const ARTIFACT_DIR: &str = "dist";

/// Environment variable telling the build tool where to collect artifacts.
pub const ARTIFACT_DIR_VAR: &str = "PACKAGE_OUTPUT_DIR";

/// Files the build stage hands to the publish stage.
pub const ARTIFACT_FILES: &str = "dist/*";

pub const BUILD_HOOK: &str = "scripts/build.sh";
pub const PUBLISH_HOOK: &str = "scripts/publish.sh";

pub const BUILDSPEC_VERSION: &str = "0.2";

pub const DEFAULT_COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";
pub const DEFAULT_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:3.0";

/// Builtin container projects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinProject {
    /// Builds the package into `dist/`.
    Build,

    /// Uploads `dist/*` to one regional repository.
    Publish,
}

impl BuiltinProject {
    /// Logical id of the project resource.
    pub fn logical_id(&self) -> &'static str {
        match self {
            BuiltinProject::Build => "CustomPackageCodeBuildProject",
            BuiltinProject::Publish => "PublishPackageProject",
        }
    }

    /// Logical id of the project's service role.
    pub fn role_logical_id(&self) -> &'static str {
        match self {
            BuiltinProject::Build => "CustomPackageCodeBuildProjectRole",
            BuiltinProject::Publish => "PublishPackageProjectRole",
        }
    }

    /// Hook script the project runs.
    pub fn hook(&self) -> &'static str {
        match self {
            BuiltinProject::Build => BUILD_HOOK,
            BuiltinProject::Publish => PUBLISH_HOOK,
        }
    }

    pub fn buildspec(&self) -> BuildSpec {
        let artifacts = match self {
            BuiltinProject::Build => Some(ArtifactFiles {
                files: vec![ARTIFACT_FILES.to_string(), PUBLISH_HOOK.to_string()],
            }),
            BuiltinProject::Publish => None,
        };
        BuildSpec {
            version: BUILDSPEC_VERSION.to_string(),
            phases: BTreeMap::from([(
                "build".to_string(),
                Phase {
                    commands: vec![format!("sh {}", self.hook())],
                },
            )]),
            artifacts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactFiles {
    pub files: Vec<String>,
}

/// Container build specification, embedded in the project as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildSpec {
    pub version: String,
    pub phases: BTreeMap<String, Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactFiles>,
}

impl BuildSpec {
    /// Output files this buildspec collects, empty when it produces no artifact.
    pub fn artifact_files(&self) -> &[String] {
        self.artifacts
            .as_ref()
            .map(|a| a.files.as_slice())
            .unwrap_or(&[])
    }
}

/// Configuration for one container project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    pub logical_id: String,
    pub role_logical_id: String,
    pub buildspec: BuildSpec,
    pub compute_type: String,
    pub image: String,
    /// Plain-text environment handed to the container.
    pub environment: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Build project: collects the artifact from [`ARTIFACT_DIR`].
    pub fn build() -> Self {
        Self::from_builtin(
            BuiltinProject::Build,
            BTreeMap::from([(ARTIFACT_DIR_VAR.to_string(), ARTIFACT_DIR.to_string())]),
        )
    }

    /// Publish project: defaults to the primary region; every publish action
    /// overrides the parameters for its own region.
    pub fn publish(coordinates: &RepositoryCoordinates, regions: &RegionSet) -> Self {
        let environment = BTreeMap::from([
            (
                params::DOMAIN_NAME.to_string(),
                coordinates.domain_name().to_string(),
            ),
            (
                params::REPOSITORY_NAME.to_string(),
                coordinates.repository_name().to_string(),
            ),
            (
                params::DOMAIN_OWNER.to_string(),
                coordinates.owner_account_id().to_string(),
            ),
            (params::REGION.to_string(), regions.primary().to_string()),
            (ARTIFACT_DIR_VAR.to_string(), ARTIFACT_DIR.to_string()),
        ]);
        Self::from_builtin(BuiltinProject::Publish, environment)
    }

    pub fn from_builtin(project: BuiltinProject, environment: BTreeMap<String, String>) -> Self {
        Self {
            logical_id: project.logical_id().to_string(),
            role_logical_id: project.role_logical_id().to_string(),
            buildspec: project.buildspec(),
            compute_type: DEFAULT_COMPUTE_TYPE.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            environment,
        }
    }

    /// Resource properties of the project, encrypted with `key_logical_id`.
    pub fn properties(&self, key_logical_id: &str) -> serde_json::Result<Value> {
        Ok(json!({
            "Artifacts": { "Type": "CODEPIPELINE" },
            "Source": {
                "Type": "CODEPIPELINE",
                "BuildSpec": serde_json::to_string(&self.buildspec)?,
            },
            "Environment": {
                "Type": "LINUX_CONTAINER",
                "ComputeType": self.compute_type,
                "Image": self.image,
                "PrivilegedMode": false,
                "EnvironmentVariables": environment_variables(&self.environment),
            },
            "EncryptionKey": crate::template::get_att(key_logical_id, "Arn"),
            "ServiceRole": crate::template::get_att(&self.role_logical_id, "Arn"),
        }))
    }
}

/// Render a parameter map as the container's plain-text variable list.
pub fn environment_variables(environment: &BTreeMap<String, String>) -> Value {
    Value::Array(
        environment
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Type": "PLAINTEXT", "Value": value }))
            .collect(),
    )
}
