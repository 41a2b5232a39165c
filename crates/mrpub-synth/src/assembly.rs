//! Cloud assembly: every stack template plus a manifest, written to disk.
//!
//! Layout:
//! ```text
//! <out>/manifest.json
//! <out>/CodeArtifactStack-<region>.template.json   (one per region)
//! <out>/PackagePublishingPipelineStack.template.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use mrpub_core::{emit_plan_rejected, emit_stack_written, PlanSpan, PublishingConfig, Region};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{SynthError, SynthResult};
use crate::pipeline_stack::PipelineStack;
use crate::repository_stack::{repository_template, stack_name};
use crate::template::Template;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// One deployable stack.
#[derive(Debug, Clone)]
pub struct StackArtifact {
    pub name: String,
    pub region: Region,
    pub template: Template,
    /// Stacks that must be deployed first.
    pub dependencies: Vec<String>,
}

impl StackArtifact {
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    #[serde(rename = "type")]
    artifact_type: &'static str,
    environment: String,
    template_file: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Manifest {
    version: &'static str,
    plan_digest: String,
    artifacts: BTreeMap<String, ManifestEntry>,
}

/// All stacks of one publishing deployment.
#[derive(Debug, Clone)]
pub struct CloudAssembly {
    pub account_id: String,
    pub plan_digest: String,
    /// Repository stacks in planning order, then the pipeline stack.
    pub stacks: Vec<StackArtifact>,
    pub pipeline: PipelineStack,
}

impl CloudAssembly {
    /// Validate `config` and build every stack in memory.
    ///
    /// Nothing is produced when validation fails.
    pub fn synthesize(config: &PublishingConfig) -> SynthResult<Self> {
        let validated = config.validate().map_err(|e| {
            emit_plan_rejected(e.kind(), &e);
            e
        })?;
        let _span = PlanSpan::enter(&validated.pipeline_name);

        let pipeline = PipelineStack::synthesize(&validated)?;

        let mut stacks: Vec<StackArtifact> = validated
            .regions
            .iter()
            .map(|region| StackArtifact {
                name: stack_name(region),
                region: region.clone(),
                template: repository_template(&validated.coordinates, region),
                dependencies: Vec::new(),
            })
            .collect();

        let repository_stacks = stacks.iter().map(|s| s.name.clone()).collect();
        stacks.push(StackArtifact {
            name: pipeline.name.clone(),
            region: pipeline.region.clone(),
            template: pipeline.template.clone(),
            dependencies: repository_stacks,
        });

        Ok(Self {
            account_id: validated.coordinates.owner_account_id().to_string(),
            plan_digest: pipeline.topology.digest()?,
            stacks,
            pipeline,
        })
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name == name)
    }

    fn manifest(&self) -> Manifest {
        let artifacts = self
            .stacks
            .iter()
            .map(|stack| {
                (
                    stack.name.clone(),
                    ManifestEntry {
                        artifact_type: STACK_ARTIFACT_TYPE,
                        environment: format!("aws://{}/{}", self.account_id, stack.region),
                        template_file: stack.template_file(),
                        dependencies: stack.dependencies.clone(),
                    },
                )
            })
            .collect();
        Manifest {
            version: MANIFEST_VERSION,
            plan_digest: self.plan_digest.clone(),
            artifacts,
        }
    }

    /// Write every template and the manifest into `dir`.
    ///
    /// Each file is written to a temporary file in `dir` and renamed into
    /// place. Returns the written paths, manifest last.
    pub fn write(&self, dir: &Path) -> SynthResult<Vec<PathBuf>> {
        if dir.exists() && !dir.is_dir() {
            return Err(SynthError::NotADirectory(dir.display().to_string()));
        }
        fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            write_atomic(&path, stack.template.to_json_pretty()?.as_bytes())?;
            emit_stack_written(&stack.name, stack.region.as_str(), &path.display().to_string());
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        write_atomic(
            &manifest_path,
            serde_json::to_string_pretty(&self.manifest())?.as_bytes(),
        )?;
        written.push(manifest_path);
        Ok(written)
    }
}

/// Synthesize `config` and write the assembly into `dir`.
pub fn write_assembly(config: &PublishingConfig, dir: &Path) -> SynthResult<CloudAssembly> {
    let assembly = CloudAssembly::synthesize(config)?;
    assembly.write(dir)?;
    Ok(assembly)
}

fn write_atomic(path: &Path, data: &[u8]) -> SynthResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| SynthError::NotADirectory(path.display().to_string()))?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
