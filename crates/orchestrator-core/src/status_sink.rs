//! The `StatusSink` external interface (spec §6): receives state-change
//! events and overall fleet health.

use crate::component::ComponentId;
use crate::state::{Overall, State};
use tokio::sync::broadcast;

/// One reported lifecycle transition.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub component: ComponentId,
    pub from: State,
    pub to: State,
    pub reason: Option<String>,
}

/// Fleet-wide health change.
#[derive(Debug, Clone, Copy)]
pub struct OverallEvent {
    pub overall: Overall,
}

/// External collaborator notified of every state-change event
/// (spec §6). Remote deployment, cloud job polling, and MQTT publishing
/// are out of scope (spec §1) — this trait only specifies the interface
/// the scheduler and lifecycle machine call into.
pub trait StatusSink: Send + Sync {
    fn on_transition(&self, event: TransitionEvent);
    fn on_overall_change(&self, event: OverallEvent);
}

/// Reference `StatusSink` that forwards events over a broadcast channel,
/// so a CLI `status` command and integration tests can both subscribe.
pub struct ChannelStatusSink {
    transitions: broadcast::Sender<TransitionEvent>,
    overall: broadcast::Sender<OverallEvent>,
}

impl ChannelStatusSink {
    pub fn new(capacity: usize) -> Self {
        let (transitions, _) = broadcast::channel(capacity);
        let (overall, _) = broadcast::channel(capacity);
        Self {
            transitions,
            overall,
        }
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<TransitionEvent> {
        self.transitions.subscribe()
    }

    pub fn subscribe_overall(&self) -> broadcast::Receiver<OverallEvent> {
        self.overall.subscribe()
    }
}

impl Default for ChannelStatusSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl StatusSink for ChannelStatusSink {
    fn on_transition(&self, event: TransitionEvent) {
        // No subscribers is a normal state (e.g. a test that only checks
        // final component states), not an error.
        let _ = self.transitions.send(event);
    }

    fn on_overall_change(&self, event: OverallEvent) {
        let _ = self.overall.send(event);
    }
}

/// No-op sink for tests that don't assert on status events.
#[derive(Debug, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn on_transition(&self, _event: TransitionEvent) {}
    fn on_overall_change(&self, _event: OverallEvent) {}
}
