//! Confirmation status and its state machine
//!
//! Assets, events and subjects are accepted by the service immediately and
//! settle on the ledger later. `CREATED -> PENDING` happens on submission,
//! `PENDING -> CONFIRMED | FAILED` on settlement. Both settled states are terminal.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Settlement status of a ledger-backed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationStatus {
    /// Built locally, not yet submitted
    Created,
    /// Submitted, awaiting settlement
    Pending,
    /// Settled successfully
    Confirmed,
    /// Settlement failed
    Failed,
}

impl ConfirmationStatus {
    /// Wire representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
        }
    }

    /// No transition leaves a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl Display for ConfirmationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmationStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "FAILED" => Ok(Self::Failed),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: ConfirmationStatus) -> &'static [ConfirmationStatus] {
    use ConfirmationStatus::*;
    match from {
        Created => &[Pending],
        Pending => &[Confirmed, Failed],
        Confirmed | Failed => &[],
    }
}

/// Validates a status transition.
pub fn validate_transition(
    from: ConfirmationStatus,
    to: ConfirmationStatus,
) -> Result<(), ModelError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ModelError::IllegalTransition { from, to })
    }
}

/// A record that settles asynchronously on the ledger
pub trait Confirmable {
    /// Identity of the record, e.g. `assets/<uuid>`
    fn identity(&self) -> &str;

    /// Status as last reported by the service; `None` if the field was absent
    fn confirmation_status(&self) -> Option<ConfirmationStatus>;
}
