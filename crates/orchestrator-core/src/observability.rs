//! Standardized tracing span and field names for the orchestrator core.
//!
//! Centralizing these names keeps log output consistent across the
//! registry, lifecycle machine, scheduler, and shell runner instead of
//! each module inventing its own vocabulary. Grounded on the teacher's own
//! `observability.rs`, which does the same thing for the devcontainer
//! domain via a set of `*_span` helper constructors built from the
//! `spans`/`fields` constant tables below.

use tracing::{span, Span};

/// Canonical span names for core workflows.
pub mod spans {
    pub const SCHEDULER_TICK: &str = "scheduler.tick";
    pub const LIFECYCLE_TRANSITION: &str = "lifecycle.transition";
    pub const SHELL_RUN: &str = "shell.run";
    pub const COMPONENT_LOCATE: &str = "component.locate";
    pub const DEPENDENCY_RESOLVE: &str = "dependency.resolve";
}

/// Common structured field names. Mirrors each `*_span` helper's
/// `component`/`step`/`from_state`/`to_state` fields below, named here so
/// call sites reaching for a raw string get a single vocabulary to match.
pub mod fields {
    pub const COMPONENT: &str = "component";
    pub const STEP: &str = "step";
    pub const FROM_STATE: &str = "from_state";
    pub const TO_STATE: &str = "to_state";
    pub const REASON: &str = "reason";
    pub const EXIT_CODE: &str = "exit_code";
}

/// Start a span for one lifecycle transition (spec §4.D).
pub fn lifecycle_transition_span(
    component: &str,
    from: &crate::state::State,
    to: &crate::state::State,
) -> Span {
    span!(
        target: "orchestrator_core::observability",
        tracing::Level::INFO,
        spans::LIFECYCLE_TRANSITION,
        component = %component,
        from_state = %from,
        to_state = %to,
    )
}

/// Start a span for resolving a component by name through the registry
/// (spec §4.F).
pub fn component_locate_span(component: &str) -> Span {
    span!(
        target: "orchestrator_core::observability",
        tracing::Level::INFO,
        spans::COMPONENT_LOCATE,
        component = %component,
    )
}

/// Start a span for one scheduler pass over a target set (spec §4.G).
pub fn scheduler_tick_span(target_count: usize) -> Span {
    span!(
        target: "orchestrator_core::observability",
        tracing::Level::INFO,
        spans::SCHEDULER_TICK,
        target_count = target_count,
    )
}

/// Start a span for a shell-runner invocation of one lifecycle step
/// (spec §4.B).
pub fn shell_run_span(component: &str, step: &str) -> Span {
    span!(
        target: "orchestrator_core::observability",
        tracing::Level::INFO,
        spans::SHELL_RUN,
        component = %component,
        step = %step,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;

    #[test]
    fn span_builders_do_not_panic() {
        let _ = lifecycle_transition_span("sleeperA", &State::New, &State::Installing);
        let _ = component_locate_span("sleeperA");
        let _ = scheduler_tick_span(3);
        let _ = shell_run_span("sleeperA", "install");
    }
}
