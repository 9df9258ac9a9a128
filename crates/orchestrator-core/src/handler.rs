//! In-process handlers for `CodeBacked` components (spec §9, "Runtime
//! classloading").
//!
//! The source system dynamically loads a handler by a string class
//! symbol; here that becomes a `HandlerFactory` lookup table of
//! constructors populated at program start, keyed by `HandlerId`.

use crate::component::HandlerId;
use crate::shell::RunOutcome;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-process lifecycle handler attached to a component via
/// `recipe.class`. Each method defaults to a no-op success so a handler
/// only needs to override the steps it actually participates in; any step
/// with a declared shell script still runs that script first.
pub trait CodeBackedHandler: Send + Sync {
    fn install(&self) -> RunOutcome {
        RunOutcome::Ok
    }
    fn startup(&self) -> RunOutcome {
        RunOutcome::Ok
    }
    fn shutdown(&self) -> RunOutcome {
        RunOutcome::Ok
    }
}

type Constructor = Arc<dyn Fn(serde_json::Value) -> Arc<dyn CodeBackedHandler> + Send + Sync>;

struct Registration {
    constructor: Constructor,
    singleton: bool,
}

/// Process-wide table of handler constructors keyed by class symbol,
/// populated once at program start (spec §9, "Mutable global OS tag
/// table" sibling strategy applied to handler lookup).
#[derive(Default, Clone)]
pub struct HandlerFactory {
    registrations: HashMap<String, Registration>,
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler constructor under `id`. `singleton` mirrors the
    /// recipe-declared singleton attribute: when true, the registry caches
    /// the first instantiation under the handler's class identity and
    /// returns it for every subsequent lookup (spec §9).
    pub fn register<F>(&mut self, id: impl Into<String>, singleton: bool, constructor: F)
    where
        F: Fn(serde_json::Value) -> Arc<dyn CodeBackedHandler> + Send + Sync + 'static,
    {
        self.registrations.insert(
            id.into(),
            Registration {
                constructor: Arc::new(constructor),
                singleton,
            },
        );
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registrations.contains_key(id)
    }

    pub fn is_singleton(&self, id: &str) -> bool {
        self.registrations.get(id).is_some_and(|r| r.singleton)
    }

    pub fn instantiate(
        &self,
        id: &HandlerId,
        config: serde_json::Value,
    ) -> Option<Arc<dyn CodeBackedHandler>> {
        self.registrations.get(&id.0).map(|r| (r.constructor)(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl CodeBackedHandler for Noop {}

    #[test]
    fn registers_and_instantiates() {
        let mut factory = HandlerFactory::new();
        factory.register("noop", false, |_cfg| Arc::new(Noop));
        assert!(factory.is_registered("noop"));
        assert!(!factory.is_singleton("noop"));
        let instance = factory.instantiate(&HandlerId("noop".to_string()), serde_json::json!({}));
        assert!(instance.is_some());
    }

    #[test]
    fn unknown_symbol_is_not_registered() {
        let factory = HandlerFactory::new();
        assert!(!factory.is_registered("missing"));
        assert!(factory.instantiate(&HandlerId("missing".to_string()), serde_json::json!({})).is_none());
    }
}
