//! Structured observability hooks for planning and synthesis.
//!
//! Events are emitted at `info!` level (rejections at `warn!`) with a stable
//! `event` field so log pipelines can filter on it, e.g.
//! `event=plan.finished identifiers=12 actions=3`.

use tracing::{info, warn};

/// RAII guard that enters a span tagged with the pipeline name for the
/// duration of a planning pass.
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(pipeline_name: &str) -> Self {
        let span = tracing::info_span!("mrpub.plan", pipeline = %pipeline_name);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: planning started for a primary region and replica count.
pub fn emit_plan_started(primary_region: &str, replica_count: usize) {
    info!(
        event = "plan.started",
        primary_region = %primary_region,
        replicas = replica_count,
    );
}

/// Emit event: identifiers and the publish action for one region were derived.
pub fn emit_region_planned(region: &str, is_primary: bool, identifiers: usize) {
    info!(
        event = "plan.region_planned",
        region = %region,
        is_primary = is_primary,
        identifiers = identifiers,
    );
}

/// Emit event: planning finished.
pub fn emit_plan_finished(identifiers: usize, actions: usize, digest: &str) {
    info!(
        event = "plan.finished",
        identifiers = identifiers,
        actions = actions,
        digest = %digest,
    );
}

/// Emit event: planning aborted on a configuration error (warning level).
pub fn emit_plan_rejected(kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "plan.rejected", kind = %kind, error = %error);
}

/// Emit event: a pipeline was assembled.
pub fn emit_pipeline_assembled(pipeline_name: &str, stages: usize, publish_actions: usize) {
    info!(
        event = "pipeline.assembled",
        pipeline = %pipeline_name,
        stages = stages,
        publish_actions = publish_actions,
    );
}

/// Emit event: an access grant was built for a role.
pub fn emit_policy_built(role: &str, resources: usize) {
    info!(event = "policy.built", role = %role, resources = resources);
}

/// Emit event: a synthesized stack template was written.
pub fn emit_stack_written(stack_name: &str, region: &str, path: &str) {
    info!(
        event = "synth.stack_written",
        stack = %stack_name,
        region = %region,
        path = %path,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_span_create() {
        let _span = PlanSpan::enter("packagePipeline");
    }
}
