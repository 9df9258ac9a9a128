//! Name-to-component resolution (spec §4.F).
//!
//! `ComponentRegistry::locate` is the single entry point the scheduler
//! uses to turn a name into a live `Component`: it merges the recipe
//! store with the `services.<name>` configuration subtree, recursively
//! resolves the component's declared dependencies (detecting cycles along
//! the way), and instantiates either a plain recipe-driven component or a
//! `CodeBacked` one backed by a registered in-process handler. Results are
//! cached by name so a diamond dependency only spawns one executor.

use crate::component::{Component, ComponentId, ComponentKind, Event, Generation, HandlerId};
use crate::state::State;
use crate::dependency::{parse_dependency_spec, DependencyEdge, DependencyGraph};
use crate::guard::validate_mutual_exclusion;
use crate::handler::HandlerFactory;
use crate::lifecycle_machine::LifecycleMachine;
use crate::platform::TagTable;
use crate::recipe::{Recipe, RecipeSource, StepSpec, STEP_NAMES};
use crate::shell::ShellRunner;
use crate::status_sink::StatusSink;
use crate::config_store::ConfigStore;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Resolves component names to live `Component` handles, instantiating
/// and caching `LifecycleMachine` executors on first reference.
pub struct ComponentRegistry {
    recipes: Arc<dyn RecipeSource>,
    config: Arc<dyn ConfigStore>,
    shell: Arc<dyn ShellRunner>,
    sink: Arc<dyn StatusSink>,
    tags: Arc<TagTable>,
    handlers: Arc<HandlerFactory>,
    root: PathBuf,

    cache: Mutex<HashMap<ComponentId, Component>>,
    /// Handler instances declared `singleton = true` in their recipe,
    /// cached by class symbol so every component that names the same
    /// class shares one instance (spec §9, "Runtime classloading").
    singleton_handlers: Mutex<HashMap<String, Arc<dyn crate::handler::CodeBackedHandler>>>,
    /// Names currently being resolved on this call stack, used to detect
    /// a dependency cycle the moment it closes (spec §4.E).
    resolving: Mutex<HashSet<ComponentId>>,
    /// Every dependency edge recorded as components are resolved, so the
    /// scheduler can compute a startup/shutdown order without re-parsing
    /// recipes itself.
    graph: Mutex<DependencyGraph>,
}

impl ComponentRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recipes: Arc<dyn RecipeSource>,
        config: Arc<dyn ConfigStore>,
        shell: Arc<dyn ShellRunner>,
        sink: Arc<dyn StatusSink>,
        tags: Arc<TagTable>,
        handlers: Arc<HandlerFactory>,
        root: PathBuf,
    ) -> Self {
        Self {
            recipes,
            config,
            shell,
            sink,
            tags,
            handlers,
            root,
            cache: Mutex::new(HashMap::new()),
            singleton_handlers: Mutex::new(HashMap::new()),
            graph: Mutex::new(DependencyGraph::new()),
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve `name` to a live component, instantiating it (and its
    /// transitive dependencies) on first reference. Idempotent: a second
    /// call with the same name returns the cached handle without
    /// re-running resolution.
    pub fn locate(&self, name: &str) -> Component {
        let _span = crate::observability::component_locate_span(name).entered();
        let id = ComponentId::new(name);

        if let Some(existing) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(&id) {
            return existing.clone();
        }

        {
            let mut resolving = self.resolving.lock().unwrap_or_else(|e| e.into_inner());
            if resolving.contains(&id) {
                // Re-entrant request for a name already on this call
                // stack: a dependency cycle just closed. Spec §4.E/Scenario
                // S6: the last-touched node in the cycle becomes Errored
                // (not Broken — the resolution itself didn't fail, the
                // graph did) rather than the whole resolution failing. Cache
                // it immediately so the in-flight outer call resolving this
                // same name converges on this Errored stand-in too, instead
                // of clobbering it with whatever it produces once the cycle
                // unwinds.
                warn!(component = %id, "dependency cycle detected during resolution");
                let broken = self.synthesize_dependency_error(&id, "dependency cycle");
                let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                return cache.entry(id).or_insert_with(|| broken).clone();
            }
            resolving.insert(id.clone());
        }

        let component = self.resolve_uncached(&id);

        self.resolving
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entry(id).or_insert_with(|| component).clone()
    }

    fn resolve_uncached(&self, id: &ComponentId) -> Component {
        let Some(mut recipe) = self.recipes.find_recipe(id.as_str(), None) else {
            warn!(component = %id, "no matching recipe; synthesizing a broken component");
            return self.synthesize_broken(id, "no matching component definition");
        };

        self.merge_configuration(id, &mut recipe);

        for step in STEP_NAMES {
            if let Some(StepSpec::Topics(topics)) = recipe.lifecycle.get(step) {
                if let Err(e) = validate_mutual_exclusion(id.as_str(), topics) {
                    warn!(component = %id, error = %e, "bad guard declaration; synthesizing a broken component");
                    return self.synthesize_broken(id, &e.to_string());
                }
            }
        }

        let deps = match self.resolve_dependencies(id, &recipe) {
            Ok(deps) => deps,
            Err(message) => {
                warn!(component = %id, message, "bad dependency syntax; synthesizing an errored component");
                return self.synthesize_dependency_error(id, &message);
            }
        };

        let (kind, handler) = self.resolve_handler(id, &recipe);

        info!(component = %id, kind = ?kind, dependency_count = deps.len(), "resolved component");

        LifecycleMachine::spawn(
            id.clone(),
            kind,
            recipe,
            deps,
            Arc::clone(&self.tags),
            Arc::clone(&self.shell),
            Arc::clone(&self.sink),
            handler,
            self.root.clone(),
        )
    }

    /// Overlay the `services.<name>` configuration subtree onto the
    /// recipe's own `configuration`, the recipe's values taking priority
    /// for keys both declare (spec §4.F: "merges the recipe's declared
    /// configuration with any `services.<name>` overrides").
    fn merge_configuration(&self, id: &ComponentId, recipe: &mut Recipe) {
        let Some(overrides) = self.config.get_child(&format!("services.{}", id.as_str())) else {
            return;
        };
        let (Some(base), Some(extra)) = (recipe.configuration.as_object_mut(), overrides.as_object())
        else {
            return;
        };
        for (key, value) in extra {
            base.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    fn resolve_dependencies(
        &self,
        id: &ComponentId,
        recipe: &Recipe,
    ) -> Result<Vec<(DependencyEdge, Component)>, String> {
        let Some(spec) = &recipe.dependencies else {
            return Ok(Vec::new());
        };
        let edges = parse_dependency_spec(id, spec).map_err(|e| {
            format!("bad dependency syntax: '{}'", e.fragment)
        })?;

        let mut resolved = Vec::with_capacity(edges.len());
        for edge in edges {
            self.graph.lock().unwrap_or_else(|e| e.into_inner()).add_dependency(
                edge.from.clone(),
                edge.to.clone(),
                edge.required_state,
            );
            let dep_component = self.locate(edge.to.as_str());
            resolved.push((edge, dep_component));
        }
        Ok(resolved)
    }

    /// Snapshot of every dependency edge recorded across all resolutions
    /// so far, used by the scheduler to compute startup/shutdown order.
    pub fn graph(&self) -> DependencyGraph {
        self.graph.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The `StatusSink` every resolved component reports transitions to,
    /// shared with the scheduler so it can also publish
    /// `onOverallChange` (spec §6).
    pub fn sink(&self) -> Arc<dyn StatusSink> {
        Arc::clone(&self.sink)
    }

    /// Instantiate (or reuse, for a declared singleton) the in-process
    /// handler named by `recipe.class`, if any.
    fn resolve_handler(
        &self,
        id: &ComponentId,
        recipe: &Recipe,
    ) -> (ComponentKind, Option<Arc<dyn crate::handler::CodeBackedHandler>>) {
        let Some(class) = &recipe.class else {
            return (ComponentKind::Generic, None);
        };

        if !self.handlers.is_registered(class) {
            warn!(component = %id, class, "no handler registered for class symbol; falling back to a generic component");
            return (ComponentKind::Generic, None);
        }

        let singleton = recipe.singleton || self.handlers.is_singleton(class);
        if singleton {
            let mut singletons = self
                .singleton_handlers
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = singletons.get(class) {
                return (
                    ComponentKind::CodeBacked(HandlerId(class.clone())),
                    Some(Arc::clone(existing)),
                );
            }
            let instance = self
                .handlers
                .instantiate(&HandlerId(class.clone()), recipe.configuration.clone());
            if let Some(instance) = &instance {
                singletons.insert(class.clone(), Arc::clone(instance));
            }
            return (ComponentKind::CodeBacked(HandlerId(class.clone())), instance);
        }

        let instance = self
            .handlers
            .instantiate(&HandlerId(class.clone()), recipe.configuration.clone());
        (ComponentKind::CodeBacked(HandlerId(class.clone())), instance)
    }

    /// Build a component that starts life already in `state` (`Broken` for
    /// a missing recipe or a malformed guard declaration, `Errored` for bad
    /// dependency syntax — spec §4.E/§4.D). It never runs `LifecycleMachine`
    /// at all: there is no recipe worth installing anything from. A trivial
    /// background task drains its event channel so a subsequent
    /// `Event::Close` from the scheduler still completes cleanly.
    fn synthesize_terminal(&self, id: &ComponentId, state: State, message: &str) -> Component {
        let generation = Generation::next();
        let (state_tx, state_rx) = watch::channel(state);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let errored = Arc::new(AtomicBool::new(true));
        let status_message = Arc::new(Mutex::new(Some(message.to_string())));

        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if matches!(event, Event::Close) {
                    break;
                }
            }
        });
        // state_tx is only needed to construct the watch::Receiver above;
        // it is dropped here since a synthesized component never transitions.
        drop(state_tx);

        Component::new(
            id.clone(),
            ComponentKind::Generic,
            generation,
            state_rx,
            event_tx,
            errored,
            status_message,
        )
    }

    fn synthesize_broken(&self, id: &ComponentId, message: &str) -> Component {
        self.synthesize_terminal(id, State::Broken, message)
    }

    fn synthesize_dependency_error(&self, id: &ComponentId, message: &str) -> Component {
        self.synthesize_terminal(id, State::Errored, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::JsonConfigStore;
    use crate::recipe::MapRecipeSource;
    use crate::shell::CliShellRunner;
    use crate::status_sink::NullStatusSink;
    use serde_json::json;

    fn registry_with(source: MapRecipeSource) -> ComponentRegistry {
        ComponentRegistry::new(
            Arc::new(source),
            Arc::new(JsonConfigStore::new(json!({}))),
            Arc::new(CliShellRunner::new()),
            Arc::new(NullStatusSink),
            Arc::new(TagTable::from_ranks(HashMap::new())),
            Arc::new(HandlerFactory::new()),
            PathBuf::from("/tmp"),
        )
    }

    #[test]
    fn missing_recipe_synthesizes_a_broken_component() {
        let registry = registry_with(MapRecipeSource::new());
        let component = registry.locate("ghost");
        assert_eq!(component.state(), crate::state::State::Broken);
        assert!(component.is_errored());
    }

    #[test]
    fn locate_is_idempotent() {
        let mut source = MapRecipeSource::new();
        source.insert(Recipe {
            name: "sleeperA".to_string(),
            version: "1.0.0".to_string(),
            ..Default::default()
        });
        let registry = registry_with(source);
        let first = registry.locate("sleeperA");
        let second = registry.locate("sleeperA");
        assert_eq!(first.generation, second.generation);
    }

    #[test]
    fn bad_dependency_syntax_goes_straight_to_errored() {
        let mut source = MapRecipeSource::new();
        source.insert(Recipe {
            name: "broken-deps".to_string(),
            version: "1.0.0".to_string(),
            dependencies: Some("sleeperA:zzzz".to_string()),
            ..Default::default()
        });
        let registry = registry_with(source);
        let component = registry.locate("broken-deps");
        assert_eq!(component.state(), crate::state::State::Errored);
    }
}
