//! Error types and handling
//!
//! Domain-specific error types for the orchestrator core.

use thiserror::Error;

/// Domain errors for the component orchestrator.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A component could not be located or instantiated (spec §7, "Resolution error").
    #[error("resolution error for component '{component}': {message}")]
    Resolution { component: String, message: String },

    /// A lifecycle step exited non-zero or timed out (spec §7, "Script error").
    #[error("script error in component '{component}' step '{step}': {message}")]
    Script {
        component: String,
        step: String,
        message: String,
    },

    /// A declared dependency string could not be parsed (spec §7, "Dependency syntax error").
    #[error("bad dependency syntax in component '{component}': {message}")]
    DependencySyntax { component: String, message: String },

    /// A dependency cycle was detected during topological sort.
    #[error("dependency cycle detected at component '{component}'")]
    Cycle { component: String },

    /// A shutdown or step timeout escalated.
    #[error("timeout in component '{component}' step '{step}'")]
    Timeout { component: String, step: String },

    /// Malformed or missing configuration read through the ConfigStore interface.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// I/O failure surfaced from the shell runner or an external store.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Convenience alias for Results produced by the orchestrator core.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
