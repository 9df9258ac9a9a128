//! Shared plumbing for every subcommand: loading a bootstrap recipe set
//! off disk and wiring up the in-memory `ComponentRegistry` collaborators.
//!
//! This is a thin convenience format for standing up the core from a CLI
//! invocation, not the on-disk recipe/package-store layout that `SPEC_FULL.md`
//! carries forward as out of scope — it exists only so `orchestrator run`
//! has something to point at.

use anyhow::{Context, Result};
use orchestrator_core::config_store::JsonConfigStore;
use orchestrator_core::handler::HandlerFactory;
use orchestrator_core::platform::TagTable;
use orchestrator_core::recipe::{MapRecipeSource, Recipe, StepSpec, TimerSpec};
use orchestrator_core::registry::ComponentRegistry;
use orchestrator_core::shell::CliShellRunner;
use orchestrator_core::status_sink::ChannelStatusSink;
use orchestrator_core::Component;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One component declaration in a bootstrap recipe-set file.
#[derive(Debug, Deserialize)]
pub struct ComponentDecl {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub dependencies: Option<String>,
    #[serde(default)]
    pub lifecycle: HashMap<String, String>,
    #[serde(default)]
    pub setenv: HashMap<String, String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub timer: Option<TimerDecl>,
}

/// The `timer` block of a bootstrap component declaration (spec §4.C):
/// a period in seconds plus an optional fuzz fraction in `[0, 1]`.
#[derive(Debug, Deserialize)]
pub struct TimerDecl {
    pub period_secs: u64,
    #[serde(default)]
    pub fuzz: f64,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Top-level shape of a bootstrap recipe-set file (TOML or JSON).
#[derive(Debug, Deserialize)]
pub struct RecipeFile {
    #[serde(default)]
    pub targets: Vec<String>,
    pub components: HashMap<String, ComponentDecl>,
}

/// A parsed bootstrap file, ready to seed a `MapRecipeSource`.
pub struct Bootstrap {
    pub source: MapRecipeSource,
    pub targets: Vec<String>,
}

/// Load and parse a bootstrap recipe-set file. The format is selected by
/// extension: `.toml` is parsed as TOML, anything else as JSON.
pub fn load_bootstrap(path: &Path) -> Result<Bootstrap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading recipe set '{}'", path.display()))?;

    let file: RecipeFile = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
        toml::from_str(&raw)
            .with_context(|| format!("parsing recipe set '{}' as TOML", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing recipe set '{}' as JSON", path.display()))?
    };

    let mut source = MapRecipeSource::new();
    for (name, decl) in &file.components {
        let lifecycle = decl
            .lifecycle
            .iter()
            .map(|(step, script)| (step.clone(), StepSpec::Raw(script.clone())))
            .collect();

        source.insert(Recipe {
            name: name.clone(),
            version: decl.version.clone(),
            lifecycle,
            dependencies: decl.dependencies.clone(),
            class: decl.class.clone(),
            setenv: decl.setenv.clone(),
            configuration: serde_json::Value::Object(Default::default()),
            timer: decl.timer.as_ref().map(|t| TimerSpec {
                period: Duration::from_secs(t.period_secs),
                fuzz: t.fuzz,
            }),
            singleton: decl.singleton,
        });
    }

    let targets = if file.targets.is_empty() {
        file.components.keys().cloned().collect()
    } else {
        file.targets
    };

    Ok(Bootstrap { source, targets })
}

/// Build a `ComponentRegistry` over the parsed recipe set, using the
/// in-memory reference `ConfigStore`/`StatusSink`/`ShellRunner`/`TagTable`
/// collaborators (spec §6) — there is no on-disk config or remote status
/// backend for a standalone CLI invocation to attach to.
pub fn build_registry(source: MapRecipeSource, root: PathBuf) -> (Arc<ComponentRegistry>, Arc<ChannelStatusSink>) {
    let sink = Arc::new(ChannelStatusSink::default());
    let registry = Arc::new(ComponentRegistry::new(
        Arc::new(source),
        Arc::new(JsonConfigStore::new(serde_json::json!({}))),
        Arc::new(CliShellRunner::new()),
        Arc::clone(&sink),
        Arc::new(TagTable::detect()),
        Arc::new(HandlerFactory::new()),
        root,
    ));
    (registry, sink)
}

/// JSON-serializable snapshot of a single component, used by every
/// subcommand that reports fleet state.
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub state: String,
    pub errored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

pub fn snapshot(components: &[Component]) -> Vec<ComponentStatus> {
    let mut rows: Vec<ComponentStatus> = components
        .iter()
        .map(|c| ComponentStatus {
            name: c.id.as_str().to_string(),
            state: c.state().to_string(),
            errored: c.is_errored(),
            status_message: c.status_message(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

/// Print a snapshot as pretty JSON to stdout, matching the teacher's
/// `Output::write_json` convention of a single machine-readable payload
/// per invocation.
pub fn print_snapshot(rows: &[ComponentStatus]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}
