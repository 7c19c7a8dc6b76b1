//! Runtime errors.
//!
//! A [`RuntimeError`] describes a broken protocol invariant. Most of them are
//! raised on the hot path by [`fatal`], which logs the error and aborts the
//! computation with a panic; they cannot be recovered from in place because
//! generated code has no continuation to return them to.
//!
//! [`ConfigError`] is an ordinary recoverable error returned while loading
//! a [`RuntimeConfig`](crate::RuntimeConfig).

use thiserror::Error;

use crate::evidence::{EffectTag, Marker};
use crate::heap::Tag;

/// Broken runtime invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// An operation was performed with no handler for its effect installed.
    #[error("no handler installed for effect `{effect}`")]
    MissingHandler { effect: EffectTag },

    /// An operation index outside the handler's clause table.
    #[error("operation {index} is out of range for effect `{effect}` ({clauses} clauses)")]
    UnknownOperation {
        effect: EffectTag,
        index: usize,
        clauses: usize,
    },

    #[error("object with tag {tag} is not a handler")]
    NotAHandler { tag: Tag },

    #[error("clause {index} of effect `{effect}` is not a clause object")]
    NotAClause { effect: EffectTag, index: usize },

    #[error("object with tag {tag} is not a function")]
    NotAFunction { tag: Tag },

    /// A yield reached the top level without meeting its handler.
    #[error("yield to marker {marker} escaped every handler")]
    UnhandledYield { marker: Marker },

    /// A deferred step was handed back without a driver to run it.
    #[error("computation ended with a deferred step that was never run")]
    UndrivenStep,

    #[error("evidence vector exceeded its maximum depth of {max}")]
    EvidenceOverflow { max: usize },
}

/// Errors while loading runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Abort the current computation on a broken invariant.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: RuntimeError) -> ! {
    tracing::error!(error = %err, "fatal runtime error");
    panic!("ichor runtime: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_effect() {
        let err = RuntimeError::UnknownOperation {
            effect: EffectTag::new("state"),
            index: 3,
            clauses: 2,
        };
        assert_eq!(
            err.to_string(),
            "operation 3 is out of range for effect `state` (2 clauses)"
        );
    }

    #[test]
    #[should_panic(expected = "no handler installed for effect `exn`")]
    fn test_fatal_panics_with_message() {
        fatal(RuntimeError::MissingHandler {
            effect: EffectTag::new("exn"),
        });
    }
}
