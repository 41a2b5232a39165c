//! mrpub synth - stack templates for multi-region package publishing
//!
//! Turns a validated publishing configuration into deployable stacks: one
//! package repository stack per region and a single pipeline stack in the
//! primary region that depends on all of them.

pub mod assembly;
pub mod error;
pub mod pipeline_stack;
pub mod project;
pub mod repository_stack;
pub mod suppressions;
pub mod template;

pub use assembly::{write_assembly, CloudAssembly, StackArtifact, MANIFEST_FILE};
pub use error::{SynthError, SynthResult};
pub use pipeline_stack::{PipelineStack, STACK_NAME as PIPELINE_STACK_NAME};
pub use project::{BuiltinProject, ProjectConfig};
pub use suppressions::Suppression;
pub use template::{Output, Resource, Template};
