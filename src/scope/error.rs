//! Error types for the scope subsystem

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by tagging, dispatch and lifecycle operations
///
/// Routing misses and requests for torn-down instances are not errors: the
/// reducer returns the state unchanged for those.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// A request was tagged without a namespace
    #[error("{}", missing_namespace_message(*verbose))]
    MissingNamespace { verbose: bool },

    /// A bundle of creators was handed to a dispatch sink
    #[error("cannot dispatch a bundle of creators; invoke one of {keys:?} first")]
    UndispatchableBundle { keys: Vec<String> },

    /// Dispatch was called while the store was running a transition
    #[error("dispatch called from inside a transition function")]
    ReentrantDispatch,

    /// The store behind a dispatch sink has been dropped
    #[error("dispatch target store has been dropped")]
    StoreClosed,
}

/// How much detail configuration errors carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnostics {
    /// Multi-line messages with a usage example
    Verbose,
    /// One-line messages
    Terse,
}

impl Diagnostics {
    /// Build the missing-namespace configuration error for this mode
    pub fn missing_namespace(self) -> ScopeError {
        ScopeError::MissingNamespace {
            verbose: self == Diagnostics::Verbose,
        }
    }
}

impl Default for Diagnostics {
    /// Verbose in debug builds, terse in release builds
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Diagnostics::Verbose
        } else {
            Diagnostics::Terse
        }
    }
}

fn missing_namespace_message(verbose: bool) -> String {
    if !verbose {
        return "scoped requests must have a namespace".to_string();
    }

    "looks like no namespace was passed when tagging a request.
Every scoped request needs the namespace of the transition function it targets.
Example:
    use scopemux::{augment, Action};

    // reaches only the instance `id` of the `counter` namespace
    let one = augment(Action::new(\"INCREMENT\").into(), Some(\"counter\"), Some(&id))?;

    // leaving the instance out reaches every instance of `counter`
    let all = augment(Action::new(\"RESET\").into(), Some(\"counter\"), None)?;"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terse_message_is_one_line() {
        let err = Diagnostics::Terse.missing_namespace();
        let msg = err.to_string();
        assert_eq!(msg, "scoped requests must have a namespace");
        assert!(!msg.contains('\n'));
    }

    #[test]
    fn test_verbose_message_has_usage_example() {
        let msg = Diagnostics::Verbose.missing_namespace().to_string();
        assert!(msg.contains("Example:"));
        assert!(msg.contains("Some(\"counter\")"));
    }

    #[test]
    fn test_diagnostics_parse_lowercase() {
        let parsed: Diagnostics = serde_json::from_str("\"terse\"").unwrap();
        assert_eq!(parsed, Diagnostics::Terse);
    }
}
