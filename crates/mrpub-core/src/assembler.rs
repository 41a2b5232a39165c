//! Pipeline assembly: Source -> Build -> Publish.
//!
//! The assembler takes the single source action, the single build action and
//! the planner's publish descriptors and lays them out as a three-stage
//! pipeline. Every publish action lands in the same stage with the same run
//! order, so the execution engine runs them side by side, and every one of
//! them reads the build stage's only output artifact.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::error::{PlanError, PlanResult};
use crate::obs::emit_pipeline_assembled;
use crate::planner::PublishActionDescriptor;
use crate::region::Region;

/// Artifact produced by the source stage.
pub const SOURCE_OUTPUT: &str = "SourceOutput";

/// Artifact produced by the build stage and consumed by every publish action.
pub const BUILD_OUTPUT: &str = "BuildOutput";

/// Run order of the single action in the source and build stages.
pub const SINGLE_ACTION_RUN_ORDER: u32 = 1;

/// Default name of the container project shared by all publish actions.
pub const DEFAULT_PUBLISH_PROJECT: &str = "PublishPackageProject";

/// Console host serving the pipeline view.
pub const CONSOLE_HOST: &str = "console.aws.amazon.com";

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Source,
    Build,
    Publish,
}

impl StageKind {
    pub const ORDER: [StageKind; 3] = [StageKind::Source, StageKind::Build, StageKind::Publish];

    /// Stage name as it appears in the pipeline definition.
    pub fn stage_name(&self) -> &'static str {
        match self {
            StageKind::Source => "Source",
            StageKind::Build => "BuildPackage",
            StageKind::Publish => "Publish",
        }
    }
}

/// Source stage definition: a repository mirror watched on one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAction {
    pub name: String,
    pub repository_name: String,
    pub branch: String,
}

impl SourceAction {
    pub fn new(repository_name: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            name: "CodeCommit".to_string(),
            repository_name: repository_name.into(),
            branch: branch.into(),
        }
    }
}

/// Build stage definition: one container project producing one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildAction {
    pub name: String,
    pub project: String,
}

impl BuildAction {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            name: "BuildPackage".to_string(),
            project: project.into(),
        }
    }
}

/// What an assembled action does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Source {
        repository_name: String,
        branch: String,
    },
    Build {
        project: String,
    },
    Publish {
        project: String,
        region: Region,
        is_primary: bool,
        parameters: BTreeMap<String, String>,
    },
}

/// An action placed in a stage.
///
/// Actions carry no continue-on-error switch: a failed action always fails
/// its stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineAction {
    pub name: String,
    pub run_order: u32,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// Runtime status of one action, as reported by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

/// Derived status of a stage or of the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub kind: StageKind,
    pub name: String,
    pub actions: Vec<PipelineAction>,
}

impl Stage {
    /// Conjunction of the statuses of every action in the stage.
    ///
    /// Any failed action fails the stage, even while siblings are still in
    /// flight; the stage succeeds only once every action has succeeded.
    /// Actions absent from `statuses` count as pending.
    pub fn status(&self, statuses: &BTreeMap<String, ActionStatus>) -> StageStatus {
        let of = |a: &PipelineAction| {
            statuses
                .get(&a.name)
                .copied()
                .unwrap_or(ActionStatus::Pending)
        };

        if self.actions.iter().any(|a| of(a) == ActionStatus::Failed) {
            StageStatus::Failed
        } else if self.actions.iter().all(|a| of(a) == ActionStatus::Succeeded) {
            StageStatus::Succeeded
        } else if self.actions.iter().all(|a| of(a) == ActionStatus::Pending) {
            StageStatus::Pending
        } else {
            StageStatus::InProgress
        }
    }
}

/// An assembled pipeline with exactly three stages in fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub fn publish_actions(&self) -> &[PipelineAction] {
        self.stage(StageKind::Publish)
            .map(|s| s.actions.as_slice())
            .unwrap_or(&[])
    }

    /// Overall status. Stages run strictly in order, so the first stage that
    /// has not succeeded decides, except that a pending stage after a
    /// succeeded one means the run is already under way.
    pub fn status(&self, statuses: &BTreeMap<String, ActionStatus>) -> StageStatus {
        let mut started = false;
        for stage in &self.stages {
            match stage.status(statuses) {
                StageStatus::Succeeded => started = true,
                StageStatus::Pending if started => return StageStatus::InProgress,
                other => return other,
            }
        }
        StageStatus::Succeeded
    }

    /// Console URL for viewing the pipeline from its home region.
    pub fn console_url(&self, primary_region: &Region) -> String {
        format!(
            "https://{primary_region}.{CONSOLE_HOST}/codesuite/codepipeline/pipelines/{}/view",
            self.name
        )
    }
}

/// Stateless builder of [`Pipeline`] values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineAssembler {
    pipeline_name: String,
    publish_project: String,
}

impl PipelineAssembler {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            publish_project: DEFAULT_PUBLISH_PROJECT.to_string(),
        }
    }

    /// Use a different container project for the publish actions.
    pub fn with_publish_project(mut self, project: impl Into<String>) -> Self {
        self.publish_project = project.into();
        self
    }

    /// Lay out Source -> Build -> Publish.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when `publish_actions` is empty, when the actions
    ///   do not share one run order, when more than one is primary, or when
    ///   two actions share a name.
    /// - `DuplicateRegion` when two actions target the same region.
    pub fn assemble(
        &self,
        source: SourceAction,
        build: BuildAction,
        publish_actions: &[PublishActionDescriptor],
    ) -> PlanResult<Pipeline> {
        validate_publish_actions(publish_actions)?;

        let source_stage = Stage {
            kind: StageKind::Source,
            name: StageKind::Source.stage_name().to_string(),
            actions: vec![PipelineAction {
                name: source.name,
                run_order: SINGLE_ACTION_RUN_ORDER,
                inputs: Vec::new(),
                outputs: vec![SOURCE_OUTPUT.to_string()],
                kind: ActionKind::Source {
                    repository_name: source.repository_name,
                    branch: source.branch,
                },
            }],
        };

        let build_stage = Stage {
            kind: StageKind::Build,
            name: StageKind::Build.stage_name().to_string(),
            actions: vec![PipelineAction {
                name: build.name,
                run_order: SINGLE_ACTION_RUN_ORDER,
                inputs: vec![SOURCE_OUTPUT.to_string()],
                outputs: vec![BUILD_OUTPUT.to_string()],
                kind: ActionKind::Build {
                    project: build.project,
                },
            }],
        };

        let publish_stage = Stage {
            kind: StageKind::Publish,
            name: StageKind::Publish.stage_name().to_string(),
            actions: publish_actions
                .iter()
                .map(|d| PipelineAction {
                    name: d.name.clone(),
                    run_order: d.run_order,
                    inputs: vec![BUILD_OUTPUT.to_string()],
                    outputs: Vec::new(),
                    kind: ActionKind::Publish {
                        project: self.publish_project.clone(),
                        region: d.region.clone(),
                        is_primary: d.is_primary,
                        parameters: d.parameters.clone(),
                    },
                })
                .collect(),
        };

        let pipeline = Pipeline {
            name: self.pipeline_name.clone(),
            stages: vec![source_stage, build_stage, publish_stage],
        };
        emit_pipeline_assembled(
            &pipeline.name,
            pipeline.stages.len(),
            pipeline.publish_actions().len(),
        );
        Ok(pipeline)
    }
}

fn validate_publish_actions(actions: &[PublishActionDescriptor]) -> PlanResult<()> {
    let first = actions.first().ok_or_else(|| {
        PlanError::invalid("publish_actions", "at least one publish action is required")
    })?;

    if let Some(odd) = actions.iter().find(|a| a.run_order != first.run_order) {
        return Err(PlanError::invalid(
            "publish_actions",
            format!(
                "action '{}' has run order {} but the stage runs at {}",
                odd.name, odd.run_order, first.run_order
            ),
        ));
    }

    if actions.iter().filter(|a| a.is_primary).count() > 1 {
        return Err(PlanError::invalid(
            "publish_actions",
            "more than one publish action is marked primary",
        ));
    }

    let mut regions = HashSet::new();
    let mut names = HashSet::new();
    for action in actions {
        if !regions.insert(&action.region) {
            return Err(PlanError::DuplicateRegion {
                region: action.region.to_string(),
            });
        }
        if !names.insert(action.name.as_str()) {
            return Err(PlanError::invalid(
                "publish_actions",
                format!("action name '{}' is used more than once", action.name),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PUBLISH_RUN_ORDER;

    fn descriptor(region: &str, is_primary: bool) -> PublishActionDescriptor {
        PublishActionDescriptor {
            name: format!("PublishToRegion-{region}"),
            region: Region::parse("region", region).unwrap(),
            is_primary,
            run_order: PUBLISH_RUN_ORDER,
            parameters: BTreeMap::new(),
        }
    }

    fn assemble(actions: &[PublishActionDescriptor]) -> PlanResult<Pipeline> {
        PipelineAssembler::new("packagePipeline").assemble(
            SourceAction::new("PackageSourceCode", "main"),
            BuildAction::new("CustomPackageCodeBuildProject"),
            actions,
        )
    }

    #[test]
    fn test_stage_order_fixed() {
        let pipeline = assemble(&[descriptor("us-west-2", false), descriptor("us-east-1", true)])
            .unwrap();
        let kinds: Vec<StageKind> = pipeline.stages.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, StageKind::ORDER.to_vec());
        let names: Vec<&str> = pipeline.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Source", "BuildPackage", "Publish"]);
    }

    #[test]
    fn test_publish_actions_share_build_output() {
        let pipeline = assemble(&[descriptor("us-west-2", false), descriptor("us-east-1", true)])
            .unwrap();
        let build = pipeline.stage(StageKind::Build).unwrap();
        assert_eq!(build.actions.len(), 1);
        assert_eq!(build.actions[0].outputs, vec![BUILD_OUTPUT.to_string()]);
        for action in pipeline.publish_actions() {
            assert_eq!(action.inputs, vec![BUILD_OUTPUT.to_string()]);
            assert_eq!(action.run_order, PUBLISH_RUN_ORDER);
            assert!(matches!(
                &action.kind,
                ActionKind::Publish { project, .. } if project == DEFAULT_PUBLISH_PROJECT
            ));
        }
    }

    #[test]
    fn test_empty_publish_rejected() {
        let err = assemble(&[]).unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }

    #[test]
    fn test_mixed_run_order_rejected() {
        let mut sequenced = descriptor("us-east-1", true);
        sequenced.run_order = 2;
        let err = assemble(&[descriptor("us-west-2", false), sequenced]).unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }

    #[test]
    fn test_repeated_region_rejected() {
        let err = assemble(&[descriptor("us-west-2", false), descriptor("us-west-2", false)])
            .unwrap_err();
        assert!(matches!(err, PlanError::DuplicateRegion { region } if region == "us-west-2"));
    }

    #[test]
    fn test_repeated_action_name_is_invalid_argument() {
        let mut renamed = descriptor("us-east-2", false);
        renamed.name = "PublishToRegion-us-west-2".to_string();
        let err = assemble(&[descriptor("us-west-2", false), renamed]).unwrap_err();
        assert!(
            matches!(err, PlanError::InvalidArgument { ref field, .. } if field == "publish_actions"),
            "expected InvalidArgument, got {err:?}"
        );
    }

    #[test]
    fn test_two_primaries_rejected() {
        let err = assemble(&[descriptor("us-west-2", true), descriptor("us-east-1", true)])
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidArgument { .. }));
    }

    #[test]
    fn test_stage_status_is_conjunction() {
        let pipeline = assemble(&[
            descriptor("us-west-2", false),
            descriptor("us-east-2", false),
            descriptor("us-east-1", true),
        ])
        .unwrap();
        let publish = pipeline.stage(StageKind::Publish).unwrap();

        let mut statuses = BTreeMap::new();
        assert_eq!(publish.status(&statuses), StageStatus::Pending);

        statuses.insert("PublishToRegion-us-west-2".to_string(), ActionStatus::Succeeded);
        statuses.insert("PublishToRegion-us-east-2".to_string(), ActionStatus::InProgress);
        assert_eq!(publish.status(&statuses), StageStatus::InProgress);

        statuses.insert("PublishToRegion-us-east-1".to_string(), ActionStatus::Failed);
        assert_eq!(publish.status(&statuses), StageStatus::Failed);

        statuses.insert("PublishToRegion-us-east-1".to_string(), ActionStatus::Succeeded);
        statuses.insert("PublishToRegion-us-east-2".to_string(), ActionStatus::Succeeded);
        assert_eq!(publish.status(&statuses), StageStatus::Succeeded);
    }

    #[test]
    fn test_pipeline_status_walks_stages_in_order() {
        let pipeline = assemble(&[descriptor("us-east-1", true)]).unwrap();
        let mut statuses = BTreeMap::new();
        statuses.insert("CodeCommit".to_string(), ActionStatus::Succeeded);
        statuses.insert("BuildPackage".to_string(), ActionStatus::InProgress);
        assert_eq!(pipeline.status(&statuses), StageStatus::InProgress);

        statuses.insert("BuildPackage".to_string(), ActionStatus::Succeeded);
        statuses.insert("PublishToRegion-us-east-1".to_string(), ActionStatus::Failed);
        assert_eq!(pipeline.status(&statuses), StageStatus::Failed);

        statuses.insert("PublishToRegion-us-east-1".to_string(), ActionStatus::Succeeded);
        assert_eq!(pipeline.status(&statuses), StageStatus::Succeeded);
    }

    #[test]
    fn test_pipeline_status_between_stages_is_in_progress() {
        let pipeline = assemble(&[descriptor("us-east-1", true)]).unwrap();
        let mut statuses = BTreeMap::new();
        assert_eq!(pipeline.status(&statuses), StageStatus::Pending);

        statuses.insert("CodeCommit".to_string(), ActionStatus::Succeeded);
        assert_eq!(pipeline.status(&statuses), StageStatus::InProgress);

        statuses.insert("BuildPackage".to_string(), ActionStatus::Succeeded);
        assert_eq!(pipeline.status(&statuses), StageStatus::InProgress);
    }

    #[test]
    fn test_console_url() {
        let pipeline = assemble(&[descriptor("us-east-1", true)]).unwrap();
        let primary = Region::parse("region", "us-east-1").unwrap();
        assert_eq!(
            pipeline.console_url(&primary),
            "https://us-east-1.console.aws.amazon.com/codesuite/codepipeline/pipelines/packagePipeline/view"
        );
    }
}
