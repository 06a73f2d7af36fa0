//! Error taxonomy for reservation and registry commands.

use crate::model::ReservationState;
use thiserror::Error;

/// Which occupant blocked a new reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// The space is held by a PENDING reservation
    Pending,
    /// The space is RESERVED (or its cancellation is being reviewed)
    Reserved,
    /// Storage rejected a second active reservation; occupant unknown
    Active,
}

impl ConflictKind {
    /// User-facing explanation.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Pending => "The space already has a reservation pending confirmation",
            Self::Reserved => "The space is already reserved",
            Self::Active => "The space already has an active reservation",
        }
    }
}

/// Errors returned by reservation and registry commands.
///
/// Commands never panic across the command boundary; transport layers map
/// each variant onto a status code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Entity absent
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Requested identifier
        id: String,
    },

    /// A second active reservation for the same space was attempted
    #[error("{}", .0.message())]
    Conflict(ConflictKind),

    /// Transition not allowed from the current state
    #[error("cannot {operation} a reservation in state {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State the reservation was in
        state: ReservationState,
    },

    /// Malformed input or a precondition on related records failed
    #[error("{0}")]
    Validation(String),

    /// Actor lacks ownership or role
    #[error("{0}")]
    Forbidden(String),

    /// No verified identity
    #[error("authentication required")]
    Unauthenticated,

    /// Transient storage or expiry store failure; safe to retry
    #[error("service temporarily unavailable: {0}")]
    Unavailable(String),

    /// Permanent storage failure
    #[error("storage error: {0}")]
    Internal(String),
}

impl ReservationError {
    /// Shorthand for [`ReservationError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same command may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
