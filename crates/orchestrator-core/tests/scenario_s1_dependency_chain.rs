//! Scenario S1: a component depending on another reaches its terminal
//! state only once the dependency has satisfied its required state.

use orchestrator_core::component::Event;
use orchestrator_core::config_store::JsonConfigStore;
use orchestrator_core::handler::HandlerFactory;
use orchestrator_core::platform::TagTable;
use orchestrator_core::recipe::{MapRecipeSource, Recipe, StepSpec};
use orchestrator_core::registry::ComponentRegistry;
use orchestrator_core::scheduler::Scheduler;
use orchestrator_core::shell::CliShellRunner;
use orchestrator_core::status_sink::NullStatusSink;
use orchestrator_core::State;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn recipe(name: &str, dependencies: Option<&str>) -> Recipe {
    let mut lifecycle = HashMap::new();
    lifecycle.insert("install".to_string(), StepSpec::Raw("true".to_string()));
    lifecycle.insert("startup".to_string(), StepSpec::Raw("true".to_string()));
    Recipe {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        dependencies: dependencies.map(str::to_string),
        lifecycle,
        ..Default::default()
    }
}

#[tokio::test]
async fn dependent_reaches_finished_once_its_dependency_does() {
    let mut source = MapRecipeSource::new();
    source.insert(recipe("web", Some("db:finished")));
    source.insert(recipe("db", None));

    let registry = Arc::new(ComponentRegistry::new(
        Arc::new(source),
        Arc::new(JsonConfigStore::new(json!({}))),
        Arc::new(CliShellRunner::new()),
        Arc::new(NullStatusSink),
        Arc::new(TagTable::from_ranks(HashMap::new())),
        Arc::new(HandlerFactory::new()),
        PathBuf::from("/tmp"),
    ));
    let scheduler = Scheduler::new(Arc::clone(&registry));

    let components = scheduler.start(&["web"]).await;
    let web = components.into_iter().next().unwrap();

    let mut watch = web.watch();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if *watch.borrow() == State::Finished {
                return;
            }
            watch.changed().await.unwrap();
        }
    })
    .await
    .expect("web should reach Finished once db does");

    let db = registry.locate("db");
    assert_eq!(db.state(), State::Finished);

    db.send(Event::Close).await;
    web.send(Event::Close).await;
}
