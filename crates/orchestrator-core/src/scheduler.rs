//! Fleet-wide startup and shutdown orchestration (spec §4.G).
//!
//! The scheduler itself holds no lifecycle state — every component's
//! `LifecycleMachine` already knows how to wait for its own dependencies
//! and stop itself when one drops away. The scheduler's job is narrower:
//! resolve the requested target set through the `ComponentRegistry`,
//! compute a topological order over the resulting dependency graph, and
//! issue `Install`/`Close` events in that order (or its reverse) so
//! nothing is told to start before its dependencies have at least been
//! asked to.

use crate::component::{Component, ComponentId, Event};
use crate::dependency::DependencyGraph;
use crate::registry::ComponentRegistry;
use crate::state::{Overall, State};
use crate::status_sink::OverallEvent;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// A component observed waiting in `AwaitingStartup` with at least one
/// dependency that has not reached its required state — surfaced when
/// nothing in the fleet is making forward progress (spec §4.G,
/// "diagnosing a stuck startup").
#[derive(Debug, Clone)]
pub struct StuckReport {
    pub component: ComponentId,
    pub state: State,
    pub waiting_on: Vec<ComponentId>,
}

/// Drives a set of target components through resolution and the
/// startup/shutdown algorithms of spec §4.G.
pub struct Scheduler {
    registry: Arc<ComponentRegistry>,
    targets: Mutex<Vec<ComponentId>>,
}

impl Scheduler {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Resolve `names` (and, transitively, everything they depend on)
    /// and issue `Event::Install` leaves-first, so a component is never
    /// told to install before a component it depends on has been.
    /// Installation proceeding further (to `Running`) is each
    /// `LifecycleMachine`'s own business once its dependencies satisfy it.
    pub async fn start(&self, names: &[&str]) -> Vec<Component> {
        let _span = crate::observability::scheduler_tick_span(names.len()).entered();
        let target_ids: Vec<ComponentId> = names.iter().map(|n| ComponentId::new(*n)).collect();
        let components: Vec<Component> = target_ids
            .iter()
            .map(|id| self.registry.locate(id.as_str()))
            .collect();
        *self.targets.lock().unwrap_or_else(|e| e.into_inner()) = target_ids.clone();

        let graph = self.registry.graph();
        let order = self.order_or_fallback(&graph, &target_ids);

        for id in &order {
            let component = self.registry.locate(id.as_str());
            info!(component = %id, "issuing install");
            component.send(Event::Install).await;
        }

        self.spawn_overall_watcher(components.clone());
        components
    }

    /// Recompute `Overall` whenever any target component's state changes,
    /// notifying the `StatusSink` only when the value actually flips (spec
    /// §6, `StatusSink::onOverallChange`). One watcher task per component
    /// shares a single `last` slot so only the watcher that observes the
    /// transition publishes it.
    fn spawn_overall_watcher(&self, components: Vec<Component>) {
        if components.is_empty() {
            return;
        }
        let sink = self.registry.sink();
        let last = Arc::new(Mutex::new(None::<Overall>));
        for component in &components {
            let mut watch_rx = component.watch();
            let components = components.clone();
            let sink = Arc::clone(&sink);
            let last = Arc::clone(&last);
            tokio::spawn(async move {
                loop {
                    let overall = Scheduler::overall(&components);
                    let changed = {
                        let mut guard = last.lock().unwrap_or_else(|e| e.into_inner());
                        if *guard == Some(overall) {
                            false
                        } else {
                            *guard = Some(overall);
                            true
                        }
                    };
                    if changed {
                        sink.on_overall_change(OverallEvent { overall });
                    }
                    if watch_rx.changed().await.is_err() {
                        break;
                    }
                }
            });
        }
    }

    /// Stop every previously-started target in reverse startup order —
    /// dependents before the components they depend on — so a component
    /// is never closed while something still needs it (spec §4.G).
    pub async fn stop_all(&self) {
        let target_ids = self.targets.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let graph = self.registry.graph();
        let mut order = self.order_or_fallback(&graph, &target_ids);
        order.reverse();

        for id in order {
            let component = self.registry.locate(id.as_str());
            info!(component = %id, "issuing close");
            component.send(Event::Close).await;
        }
    }

    fn order_or_fallback(&self, graph: &DependencyGraph, roots: &[ComponentId]) -> Vec<ComponentId> {
        match graph.topo_order(roots) {
            Ok(order) => order,
            Err(cycle_node) => {
                warn!(component = %cycle_node, "dependency cycle detected; falling back to declaration order for the unaffected targets");
                roots.to_vec()
            }
        }
    }

    /// Fleet-wide health: `Healthy` iff every observed component has
    /// reached `Running` or `Finished` (spec §6, `StatusSink::onOverallChange`).
    pub fn overall(components: &[Component]) -> Overall {
        let healthy = components
            .iter()
            .all(|c| matches!(c.state(), State::Running | State::Finished));
        if healthy {
            Overall::Healthy
        } else {
            Overall::Unhealthy
        }
    }

    /// Find components stalled in `AwaitingStartup` because a dependency
    /// has not yet reached its required state, for the "nothing is
    /// progressing" diagnostic (spec §4.G).
    pub fn diagnose_stuck(&self) -> Vec<StuckReport> {
        let graph = self.registry.graph();
        let mut reports = Vec::new();

        for id in graph.nodes() {
            let component = self.registry.locate(id.as_str());
            if component.state() != State::AwaitingStartup {
                continue;
            }

            let waiting_on: Vec<ComponentId> = graph
                .edges_from(&id)
                .iter()
                .filter_map(|edge| {
                    let dep = self.registry.locate(edge.to.as_str());
                    if dep.state().satisfies(edge.required_state) {
                        None
                    } else {
                        Some(edge.to.clone())
                    }
                })
                .collect();

            if !waiting_on.is_empty() {
                reports.push(StuckReport {
                    component: id,
                    state: component.state(),
                    waiting_on,
                });
            }
        }

        reports
    }
}
