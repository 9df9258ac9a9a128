//! Scenario S5: a step guarded by `skipif onpath <cmd>` is skipped (and
//! treated as a success) when the named command is found on `PATH`.

use orchestrator_core::component::Event;
use orchestrator_core::config_store::JsonConfigStore;
use orchestrator_core::handler::HandlerFactory;
use orchestrator_core::platform::TagTable;
use orchestrator_core::recipe::{MapRecipeSource, Recipe, StepSpec, TopicsStep};
use orchestrator_core::registry::ComponentRegistry;
use orchestrator_core::shell::CliShellRunner;
use orchestrator_core::status_sink::NullStatusSink;
use orchestrator_core::State;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn skipif_onpath_skips_the_step_when_the_command_is_present() {
    let mut source = MapRecipeSource::new();
    let mut lifecycle = HashMap::new();
    // A command known to exist (`sh`) is the skip condition; the script
    // would fail (`exit 1`) if it were ever actually run, so a Finished
    // outcome proves the step was skipped rather than executed.
    lifecycle.insert(
        "install".to_string(),
        StepSpec::Topics(TopicsStep {
            script: Some("exit 1".to_string()),
            skipif: Some("onpath sh".to_string()),
            doif: None,
            timeout: None,
        }),
    );
    source.insert(Recipe {
        name: "guarded".to_string(),
        version: "1.0.0".to_string(),
        lifecycle,
        ..Default::default()
    });

    let registry = ComponentRegistry::new(
        Arc::new(source),
        Arc::new(JsonConfigStore::new(json!({}))),
        Arc::new(CliShellRunner::new()),
        Arc::new(NullStatusSink),
        Arc::new(TagTable::from_ranks(HashMap::new())),
        Arc::new(HandlerFactory::new()),
        PathBuf::from("/tmp"),
    );

    let component = registry.locate("guarded");
    component.send(Event::Install).await;

    let mut watch = component.watch();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if *watch.borrow() == State::Finished {
                return;
            }
            watch.changed().await.unwrap();
        }
    })
    .await
    .expect("the guarded step should be skipped, not executed");
}
