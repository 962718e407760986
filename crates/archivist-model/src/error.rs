//! Error types for the data model

use crate::confirmation::ConfirmationStatus;

/// Errors raised while building or validating model values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Filter predicate is not of the form `<path>=<value>`
    #[error("invalid predicate {predicate:?}: {reason}")]
    InvalidPredicate {
        /// Raw predicate text
        predicate: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Confirmation status transition not permitted
    #[error("illegal confirmation transition {from} -> {to}")]
    IllegalTransition {
        /// Current status
        from: ConfirmationStatus,
        /// Requested status
        to: ConfirmationStatus,
    },

    /// Unrecognised confirmation status string
    #[error("unknown confirmation status: {0}")]
    UnknownStatus(String),
}

impl ModelError {
    /// Create an invalid predicate error
    #[inline]
    pub(crate) fn invalid_predicate(predicate: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPredicate {
            predicate: predicate.into(),
            reason,
        }
    }
}
