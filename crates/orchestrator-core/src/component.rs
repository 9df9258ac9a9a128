//! Component identity and the shared, observable handle used by the
//! scheduler, registry, and dependents (spec §3 "Component").

use crate::state::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Globally-unique component name. Dotted paths are permitted (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        ComponentId::new(value)
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        ComponentId::new(value)
    }
}

/// Opaque handler identity for a `CodeBacked` component's class symbol
/// (spec §9, "Runtime classloading").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub String);

/// How a component is driven: by the recipe's shell lifecycle steps, or by
/// an in-process handler registered under a class symbol (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Generic,
    CodeBacked(HandlerId),
}

/// Monotonically increasing generation stamp. Reload replaces the whole
/// graph by creating a new generation and terminating the old one
/// (spec §3, Lifecycles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(pub u64);

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

impl Generation {
    pub fn next() -> Self {
        Generation(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Events delivered into a component's single-writer lifecycle executor
/// (spec §5, "Cross-component interactions ... are delivered by posting
/// events to the target's executor").
#[derive(Debug, Clone)]
pub enum Event {
    /// External or scheduler-issued `install` action.
    Install,
    /// A dependency's observed state changed; re-check readiness.
    DepsChanged,
    /// The background `run` child exited with this code.
    ChildExited(i32),
    /// The per-component timer fired (`Finished -> Running`).
    TimerFired,
    /// External `close()`/shutdown request.
    Close,
    /// The subtree of config this component reads changed.
    ConfigChanged,
}

/// A shared, cheaply-clonable handle to a running component.
///
/// The component's own `LifecycleMachine` task is the only writer to its
/// state; everyone else observes it through the `watch` channel and sends
/// events through `event_tx`, matching the single-writer discipline in
/// spec §5.
#[derive(Clone)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    pub generation: Generation,
    state_rx: watch::Receiver<State>,
    event_tx: mpsc::Sender<Event>,
    errored: Arc<AtomicBool>,
    status_message: Arc<std::sync::Mutex<Option<String>>>,
}

impl Component {
    pub fn new(
        id: ComponentId,
        kind: ComponentKind,
        generation: Generation,
        state_rx: watch::Receiver<State>,
        event_tx: mpsc::Sender<Event>,
        errored: Arc<AtomicBool>,
        status_message: Arc<std::sync::Mutex<Option<String>>>,
    ) -> Self {
        Self {
            id,
            kind,
            generation,
            state_rx,
            event_tx,
            errored,
            status_message,
        }
    }

    pub fn state(&self) -> State {
        *self.state_rx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<State> {
        self.state_rx.clone()
    }

    /// Sticky error flag, cleared only by a fresh `install` (spec §3).
    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::Acquire)
    }

    pub fn status_message(&self) -> Option<String> {
        self.status_message.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn send(&self, event: Event) {
        // The receiving task only ever shuts down after processing a Close
        // event, so a send failure here means the component has already
        // torn down (e.g. a stale handle from a prior generation).
        let _ = self.event_tx.send(event).await;
    }

    pub fn try_send(&self, event: Event) {
        let _ = self.event_tx.try_send(event);
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .field("generation", &self.generation)
            .finish()
    }
}
