//! Lifecycle state and the readiness total order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single component.
///
/// `New < Installing < AwaitingStartup < Starting < Running` forms the
/// "readiness" total order used to satisfy dependency requirements;
/// `Finished`, `Errored`, and `Broken` are terminal/quiescent and are
/// compared by equality rather than rank (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    New,
    Installing,
    AwaitingStartup,
    Starting,
    Running,
    Stopping,
    Finished,
    Errored,
    Broken,
}

impl State {
    /// Rank within the active startup chain, or `None` for states outside it
    /// (`Stopping`, `Finished`, `Errored`, `Broken`).
    fn readiness_rank(self) -> Option<u8> {
        match self {
            State::New => Some(0),
            State::Installing => Some(1),
            State::AwaitingStartup => Some(2),
            State::Starting => Some(3),
            State::Running => Some(4),
            State::Stopping | State::Finished | State::Errored | State::Broken => None,
        }
    }

    /// `true` for states with no further forward transition under normal
    /// operation (spec §3 invariants).
    pub fn is_terminal_or_quiescent(self) -> bool {
        matches!(self, State::Finished | State::Errored | State::Broken)
    }

    /// `true` iff this component may be considered a dependency failure for
    /// its dependents (spec §7 propagation rules).
    pub fn is_broken(self) -> bool {
        matches!(self, State::Errored | State::Broken)
    }

    /// Evaluate `self >= required` per the dependency satisfaction rule in
    /// spec §3: "`Running` requires every dep `d` ... to have `d.state >=
    /// d.required_state`."
    ///
    /// States inside the active chain (`New`..`Running`) compare by rank.
    /// A `required` of `Finished`, `Errored`, `Broken`, or `Stopping` is
    /// satisfied only by exact equality, since those states are not reached
    /// by forward progress through the chain.
    pub fn satisfies(self, required: State) -> bool {
        match (self.readiness_rank(), required.readiness_rank()) {
            (Some(have), Some(need)) => have >= need,
            _ => self == required,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::New => "New",
            State::Installing => "Installing",
            State::AwaitingStartup => "AwaitingStartup",
            State::Starting => "Starting",
            State::Running => "Running",
            State::Stopping => "Stopping",
            State::Finished => "Finished",
            State::Errored => "Errored",
            State::Broken => "Broken",
        };
        f.write_str(s)
    }
}

impl State {
    /// All variants, used by dependency-string prefix matching.
    pub const ALL: [State; 9] = [
        State::New,
        State::Installing,
        State::AwaitingStartup,
        State::Starting,
        State::Running,
        State::Stopping,
        State::Finished,
        State::Errored,
        State::Broken,
    ];

    /// Case-insensitive prefix match against the enum, used when parsing a
    /// dependency spec's `:<state>` fragment (spec §4.E). Returns `None` on
    /// no match or an ambiguous (multiple-match) prefix.
    pub fn parse_prefix(token: &str) -> Option<State> {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return None;
        }
        let mut found = None;
        for candidate in State::ALL {
            if candidate.to_string().to_lowercase().starts_with(&token) {
                if found.is_some() {
                    return None; // ambiguous prefix
                }
                found = Some(candidate);
            }
        }
        found
    }
}

/// Fleet-wide health, derived from every non-terminal component's state
/// (spec §6, `StatusSink::onOverallChange`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overall {
    /// Every non-terminal component is `Running` or `Finished`.
    Healthy,
    Unhealthy,
}
