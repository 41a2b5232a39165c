//! mrpub core - multi-region package publishing topology
//!
//! Plans a Source -> Build -> Publish pipeline whose publish stage fans one
//! build artifact out to a package repository replicated across regions:
//! - [`TopologyPlanner`] derives every regional resource identifier and one
//!   publish action per region
//! - [`PipelineAssembler`] lays the actions out in fixed stage order
//! - [`AccessPolicyBuilder`] scopes the shared publish role to exactly the
//!   derived identifiers

pub mod assembler;
pub mod config;
pub mod coordinates;
pub mod digest;
pub mod error;
pub mod locator;
pub mod obs;
pub mod planner;
pub mod policy;
pub mod region;
pub mod telemetry;

pub use assembler::{
    ActionKind, ActionStatus, BuildAction, Pipeline, PipelineAction, PipelineAssembler,
    SourceAction, Stage, StageKind, StageStatus, BUILD_OUTPUT, SOURCE_OUTPUT,
};
pub use config::{PublishingConfig, SourceBundle, ValidatedConfig};
pub use coordinates::RepositoryCoordinates;
pub use error::{PlanError, PlanResult};
pub use locator::{ResourceIdentifier, ResourceLocator, ResourceType, CODEARTIFACT_SERVICE};
pub use obs::{
    emit_pipeline_assembled, emit_plan_finished, emit_plan_rejected, emit_plan_started,
    emit_policy_built, emit_region_planned, emit_stack_written, PlanSpan,
};
pub use planner::{PublishActionDescriptor, Topology, TopologyPlanner, PUBLISH_RUN_ORDER};
pub use policy::{AccessGrant, AccessPolicyBuilder, ExecutionRole, PolicyStatement};
pub use region::{Region, RegionSet};
pub use telemetry::init_tracing;

/// mrpub version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
