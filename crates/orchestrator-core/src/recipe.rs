//! Recipe data model and the `RecipeSource` external interface (spec §6).
//!
//! A recipe is the declarative description of one component: its
//! lifecycle steps, dependency string, and metadata. Parsing recipe files
//! off disk and laying out a package store are explicitly out of scope
//! (spec §1); this module only defines the in-memory shape recipes take
//! once resolved, plus an in-memory reference `RecipeSource` sufficient to
//! drive the scenarios in spec §8.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::Duration;

/// One lifecycle step's declaration, before platform selection.
///
/// Mirrors spec §3's "Lifecycle block" grammar: a raw shell string, a
/// structured `Topics` block with guards and a timeout, or a platform-tagged
/// map whose children are themselves `StepSpec` values.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSpec {
    /// A bare shell command string.
    Raw(String),
    /// A structured step with optional guards and timeout.
    Topics(TopicsStep),
    /// Platform-tagged children, resolved via `platform::pick_by_os`.
    Tagged(IndexMap<String, StepSpec>),
}

/// The structured form of a lifecycle step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicsStep {
    pub script: Option<String>,
    /// Skip the step when this expression evaluates `true` (spec §4.F).
    pub skipif: Option<String>,
    /// Skip the step when this expression evaluates `false` (spec §4.F).
    pub doif: Option<String>,
    pub timeout: Option<Duration>,
}

/// Declaration of the optional per-component timer (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSpec {
    pub period: Duration,
    /// Fraction in `[0, 1]` applied as `period * (1 +/- rand * fuzz)`.
    pub fuzz: f64,
}

/// The four canonical lifecycle step names plus `recover`, as declared in
/// spec §3.
pub const STEP_NAMES: [&str; 5] = ["install", "startup", "run", "shutdown", "recover"];

/// A fully-parsed recipe, as returned by a `RecipeSource`.
#[derive(Debug, Clone, Default)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    pub lifecycle: HashMap<String, StepSpec>,
    /// Free-text dependency string, parsed by `dependency::parse_dependency_spec`.
    pub dependencies: Option<String>,
    /// `Generic` (default) or the class symbol for a `CodeBacked` component.
    pub class: Option<String>,
    pub setenv: HashMap<String, String>,
    pub configuration: serde_json::Value,
    pub timer: Option<TimerSpec>,
    /// Declared by the recipe author; see `registry::ComponentRegistry` for
    /// how singleton handlers are cached under their class identity.
    pub singleton: bool,
}

impl Recipe {
    pub fn step(&self, name: &str) -> Option<&StepSpec> {
        self.lifecycle.get(name)
    }
}

/// External collaborator that locates recipes by name and version
/// (spec §6). Parsing recipe files and on-disk layout are out of scope;
/// only this interface is specified.
pub trait RecipeSource: Send + Sync {
    /// Find a recipe by name and optional version requirement.
    fn find_recipe(&self, name: &str, version: Option<&str>) -> Option<Recipe>;

    /// List known versions of `name` compatible with `requirement`.
    fn list_versions(&self, name: &str, requirement: Option<&str>) -> Vec<String>;

    /// Resolve the best matching `(name, version)` pair for a requirement.
    fn best_match(&self, name: &str, requirement: Option<&str>) -> Option<(String, String)> {
        self.list_versions(name, requirement)
            .into_iter()
            .next()
            .map(|v| (name.to_string(), v))
    }
}

/// In-memory `RecipeSource` reference implementation, keyed by
/// `(name, version)`. Sufficient to drive every scenario in spec §8
/// without a real on-disk package store.
#[derive(Debug, Default)]
pub struct MapRecipeSource {
    recipes: HashMap<(String, String), Recipe>,
}

impl MapRecipeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipe under its own `(name, version)`.
    pub fn insert(&mut self, recipe: Recipe) -> &mut Self {
        let key = (recipe.name.clone(), recipe.version.clone());
        self.recipes.insert(key, recipe);
        self
    }
}

impl RecipeSource for MapRecipeSource {
    fn find_recipe(&self, name: &str, version: Option<&str>) -> Option<Recipe> {
        if let Some(version) = version {
            return self
                .recipes
                .get(&(name.to_string(), version.to_string()))
                .cloned();
        }
        // No version requested: return the most recently inserted match.
        // HashMap has no stable order, so fall back to any match; the
        // vast majority of recipes in this reference source carry a single
        // version, which is all the scenarios in spec §8 require.
        self.recipes
            .iter()
            .find(|((n, _), _)| n == name)
            .map(|(_, r)| r.clone())
    }

    fn list_versions(&self, name: &str, _requirement: Option<&str>) -> Vec<String> {
        let mut versions: Vec<String> = self
            .recipes
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect();
        versions.sort();
        versions
    }
}
