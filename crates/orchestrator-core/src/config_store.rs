//! The `ConfigStore` external interface (spec §6): a hierarchical,
//! dot-separated key-value tree with copy-on-write subtree reads and
//! change notification.
//!
//! Persistence and hot reload against a real backing store are out of
//! scope (spec §1); this module provides the in-memory reference
//! implementation needed to run the core end to end.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;

/// Hierarchical configuration tree, consulted by the `ComponentRegistry`
/// at `services.<name>` (spec §4.F) and by lifecycle steps for `setenv`
/// and `timer` declarations.
pub trait ConfigStore: Send + Sync {
    /// Look up the subtree at `path` (dot-separated), or `None` if absent.
    fn get_child(&self, path: &str) -> Option<Value>;

    /// Subscribe to changes of the subtree rooted at `path`. The returned
    /// receiver observes `()` whenever any write lands at or below `path`.
    fn subscribe(&self, path: &str) -> watch::Receiver<()>;

    /// Replace the subtree at `path` wholesale and notify subscribers.
    fn set_child(&self, path: &str, value: Value);
}

/// In-memory `ConfigStore` over a `serde_json::Value` tree.
///
/// Reads clone an `Arc`-free snapshot behind a short read lock so
/// observers never see a torn read while a write is in flight (spec §5,
/// "the ConfigStore ... uses copy-on-write subtree snapshots").
pub struct JsonConfigStore {
    root: RwLock<Value>,
    subscribers: RwLock<HashMap<String, watch::Sender<()>>>,
}

impl JsonConfigStore {
    pub fn new(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    fn navigate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
        if path.is_empty() {
            return Some(root);
        }
        let mut current = root;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    fn notify_prefix(&self, path: &str) {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        for (sub_path, sender) in subscribers.iter() {
            if path.starts_with(sub_path.as_str()) || sub_path.starts_with(path) {
                let _ = sender.send(());
            }
        }
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_child(&self, path: &str) -> Option<Value> {
        let root = self.root.read().unwrap_or_else(|e| e.into_inner());
        Self::navigate(&root, path).cloned()
    }

    fn subscribe(&self, path: &str) -> watch::Receiver<()> {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(()).0)
            .subscribe()
    }

    fn set_child(&self, path: &str, value: Value) {
        {
            let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
            set_at_path(&mut root, path, value);
        }
        self.notify_prefix(path);
    }
}

fn set_at_path(root: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        current = current
            .as_object_mut()
            .unwrap()
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    if !current.is_object() {
        *current = Value::Object(Default::default());
    }
    current
        .as_object_mut()
        .unwrap()
        .insert(segments[segments.len() - 1].to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_child_navigates_dotted_path() {
        let store = JsonConfigStore::new(json!({
            "services": { "sleeperA": { "lifecycle": { "run": "sleep 5" } } }
        }));
        let value = store.get_child("services.sleeperA.lifecycle.run");
        assert_eq!(value, Some(json!("sleep 5")));
    }

    #[test]
    fn missing_path_returns_none() {
        let store = JsonConfigStore::new(json!({}));
        assert_eq!(store.get_child("services.missing"), None);
    }

    #[test]
    fn set_child_notifies_subscriber() {
        let store = JsonConfigStore::new(json!({}));
        let mut rx = store.subscribe("services.sleeperA");
        store.set_child("services.sleeperA.lifecycle", json!({"run": "true"}));
        assert!(rx.has_changed().unwrap());
    }
}
