//! `skipif`/`doif` guard expressions (spec §4.F).
//!
//! Grammar: a leading `!` inverts the result; otherwise `onpath <cmd>`,
//! `exists <path>` (`~`-expanded against the nucleus root), the literal
//! `true`, or else the expression is run as a shell command via
//! `ShellRunner::successful`.
//!
//! Per spec §9's Open Question resolution, `skipif` and `doif` are
//! mutually exclusive on a single step: both present is a parse-time
//! error, not a silently-resolved XOR.

use crate::errors::{OrchestratorError, Result};
use crate::recipe::TopicsStep;
use crate::shell::ShellRunner;
use std::path::{Path, PathBuf};

/// A parsed guard expression.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    OnPath(String),
    Exists(String),
    True,
    Shell(String),
}

/// A guard expression plus its leading-`!` negation.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub expr: GuardExpr,
    pub negated: bool,
}

/// How a step's guard should gate execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Skip the step when the guard evaluates `true`.
    SkipIf,
    /// Skip the step when the guard evaluates `false`.
    DoIf,
}

pub fn parse_guard(raw: &str) -> Guard {
    let (negated, rest) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, raw.trim()),
    };

    let expr = if rest == "true" {
        GuardExpr::True
    } else if let Some(cmd) = rest.strip_prefix("onpath ") {
        GuardExpr::OnPath(cmd.trim().to_string())
    } else if let Some(path) = rest.strip_prefix("exists ") {
        GuardExpr::Exists(path.trim().to_string())
    } else {
        GuardExpr::Shell(rest.to_string())
    };

    Guard { expr, negated }
}

/// Validate that a step declares at most one of `skipif`/`doif`
/// (spec §9 Open Question).
pub fn validate_mutual_exclusion(component: &str, step: &TopicsStep) -> Result<()> {
    if step.skipif.is_some() && step.doif.is_some() {
        return Err(OrchestratorError::Resolution {
            component: component.to_string(),
            message: "step declares both skipif and doif; these are mutually exclusive"
                .to_string(),
        });
    }
    Ok(())
}

fn expand_tilde(path: &str, root: &Path) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => {
            let rest = rest.trim_start_matches('/');
            root.join(rest)
        }
        None => PathBuf::from(path),
    }
}

/// Evaluate a guard, returning its raw (un-negated) truth value XORed with
/// the leading `!`.
pub async fn evaluate(guard: &Guard, shell: &dyn ShellRunner, root: &Path) -> bool {
    let raw = match &guard.expr {
        GuardExpr::True => true,
        GuardExpr::OnPath(cmd) => shell.which(cmd).is_some(),
        GuardExpr::Exists(path) => expand_tilde(path, root).exists(),
        GuardExpr::Shell(expr) => shell.successful(expr).await,
    };
    raw ^ guard.negated
}

/// Decide whether a step should be skipped, applying `GuardKind` semantics:
/// `skipif` skips when true, `doif` skips when false.
pub async fn should_skip(
    kind: GuardKind,
    raw: &str,
    shell: &dyn ShellRunner,
    root: &Path,
) -> bool {
    let guard = parse_guard(raw);
    let value = evaluate(&guard, shell, root).await;
    match kind {
        GuardKind::SkipIf => value,
        GuardKind::DoIf => !value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_onpath() {
        let guard = parse_guard("onpath bash");
        assert_eq!(guard.expr, GuardExpr::OnPath("bash".to_string()));
        assert!(!guard.negated);
    }

    #[test]
    fn parses_negated_exists() {
        let guard = parse_guard("!exists ~/.config/foo");
        assert_eq!(guard.expr, GuardExpr::Exists("~/.config/foo".to_string()));
        assert!(guard.negated);
    }

    #[test]
    fn parses_true_literal() {
        assert_eq!(parse_guard("true").expr, GuardExpr::True);
    }

    #[test]
    fn falls_back_to_shell_expression() {
        let guard = parse_guard("test -f /etc/hostname");
        assert_eq!(
            guard.expr,
            GuardExpr::Shell("test -f /etc/hostname".to_string())
        );
    }

    #[test]
    fn mutual_exclusion_is_rejected() {
        let step = TopicsStep {
            script: None,
            skipif: Some("true".to_string()),
            doif: Some("true".to_string()),
            timeout: None,
        };
        assert!(validate_mutual_exclusion("c", &step).is_err());
    }

    #[test]
    fn single_guard_is_accepted() {
        let step = TopicsStep {
            script: None,
            skipif: Some("true".to_string()),
            doif: None,
            timeout: None,
        };
        assert!(validate_mutual_exclusion("c", &step).is_ok());
    }

    #[test]
    fn tilde_expands_against_root() {
        let root = Path::new("/home/device");
        assert_eq!(
            expand_tilde("~/state/db", root),
            PathBuf::from("/home/device/state/db")
        );
    }
}
