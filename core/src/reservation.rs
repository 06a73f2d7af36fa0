//! Reservation lifecycle state machine.
//!
//! [`ReservationReducer`] is pure: it validates a command against the
//! reservation it is handed, mutates it in place and describes the side
//! effects to run. Loading the reservation under a lock, persisting the result,
//! touching the expiry store and broadcasting are the caller's job (see the
//! runtime crate's `ReservationService`).
//!
//! A rejected command leaves the state untouched and returns no effects.

use crate::environment::Clock;
use crate::error::{ConflictKind, ReservationError};
use crate::event::EventName;
use crate::model::{Reservation, ReservationState, Space};
use crate::reducer::Reducer;
use crate::types::{ReservationId, SpaceId, UserId};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use std::time::Duration;

/// Commands and lapse notifications accepted by the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum ReservationAction {
    /// Hold a space. `space` and `occupant` are the locked space and its
    /// current active reservation as read inside the same unit of work.
    Create {
        /// Identifier for the new reservation
        reservation_id: ReservationId,
        /// Requested space
        space_id: SpaceId,
        /// The space, `None` if it does not exist
        space: Option<Space>,
        /// Reservation currently occupying the space
        occupant: Option<Reservation>,
        /// Requesting user; `None` for admin-created holds
        user_id: Option<UserId>,
        /// Holder display name
        asignee: String,
    },
    /// Set or extend the hold deadline of a PENDING reservation
    RefreshHold {
        /// Target reservation
        reservation_id: ReservationId,
        /// Hold duration from now
        ttl: Duration,
    },
    /// Admin confirms a PENDING reservation
    Confirm {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// Admin rejects a PENDING reservation
    Reject {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// Cancel a PENDING or RESERVED reservation. `requester` is `None` for
    /// privileged callers; otherwise it must own the reservation.
    Cancel {
        /// Target reservation
        reservation_id: ReservationId,
        /// Non-privileged caller
        requester: Option<UserId>,
    },
    /// Owner asks to give the space back
    RequestCancellation {
        /// Target reservation
        reservation_id: ReservationId,
        /// Caller; must own the reservation
        requester: UserId,
    },
    /// Admin approves a cancellation request
    ApproveCancellation {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// Admin denies a cancellation request
    DenyCancellation {
        /// Target reservation
        reservation_id: ReservationId,
    },
    /// The hold marker lapsed. No-op unless still PENDING.
    Expire {
        /// Target reservation
        reservation_id: ReservationId,
    },
}

impl ReservationAction {
    /// Short operation name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::RefreshHold { .. } => "refresh_hold",
            Self::Confirm { .. } => "confirm",
            Self::Reject { .. } => "reject",
            Self::Cancel { .. } => "cancel",
            Self::RequestCancellation { .. } => "request_cancellation",
            Self::ApproveCancellation { .. } => "approve_cancellation",
            Self::DenyCancellation { .. } => "deny_cancellation",
            Self::Expire { .. } => "expire",
        }
    }

    /// Reservation the action targets or creates.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::Create { reservation_id, .. }
            | Self::RefreshHold { reservation_id, .. }
            | Self::Confirm { reservation_id }
            | Self::Reject { reservation_id }
            | Self::Cancel { reservation_id, .. }
            | Self::RequestCancellation { reservation_id, .. }
            | Self::ApproveCancellation { reservation_id }
            | Self::DenyCancellation { reservation_id }
            | Self::Expire { reservation_id } => *reservation_id,
        }
    }
}

/// Side effects requested by the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Create or overwrite the hold marker
    SetExpiry {
        /// Held reservation
        reservation_id: ReservationId,
        /// Marker lifetime
        ttl: Duration,
    },
    /// Remove the hold marker if present
    ClearExpiry {
        /// Reservation that left PENDING
        reservation_id: ReservationId,
    },
    /// Broadcast the reservation once the change is committed
    Publish {
        /// Event name
        event: EventName,
        /// Changed reservation
        reservation_id: ReservationId,
    },
}

/// Effects of one command.
pub type Effects = SmallVec<[Effect; 4]>;

/// Dependencies of the state machine.
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Source of timestamps
    pub clock: Arc<dyn Clock>,
}

impl ReservationEnvironment {
    /// Environment reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Pure reservation lifecycle rules.
///
/// The state is the reservation being acted upon; `None` before
/// [`ReservationAction::Create`] or when the reservation does not exist.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReservationReducer;

impl Reducer for ReservationReducer {
    type State = Option<Reservation>;
    type Action = ReservationAction;
    type Environment = ReservationEnvironment;
    type Effect = Effect;
    type Error = ReservationError;

    fn reduce(
        &self,
        state: &mut Option<Reservation>,
        action: ReservationAction,
        env: &ReservationEnvironment,
    ) -> Result<Effects, ReservationError> {
        let now = env.clock.now();

        match action {
            ReservationAction::Create {
                reservation_id,
                space_id,
                space,
                occupant,
                user_id,
                asignee,
            } => {
                if state.is_some() {
                    return Err(ReservationError::Validation(format!(
                        "reservation {reservation_id} already exists"
                    )));
                }
                let space = space.ok_or_else(|| ReservationError::not_found("Space", space_id))?;
                if !space.active {
                    return Err(ReservationError::Validation(format!(
                        "space {} is blocked",
                        space.name
                    )));
                }
                if let Some(occupant) = occupant.filter(|o| o.state.is_active()) {
                    return Err(ReservationError::Conflict(
                        if occupant.state == ReservationState::Pending {
                            ConflictKind::Pending
                        } else {
                            ConflictKind::Reserved
                        },
                    ));
                }
                let asignee = asignee.trim();
                if asignee.is_empty() {
                    return Err(ReservationError::Validation(
                        "asignee is required".to_string(),
                    ));
                }

                *state = Some(Reservation {
                    id: reservation_id,
                    space_id: space.id,
                    user_id,
                    asignee: asignee.to_string(),
                    state: ReservationState::Pending,
                    expires_at: None,
                    created_at: now,
                    updated_at: now,
                });

                Ok(smallvec![Effect::Publish {
                    event: EventName::ReservationCreated,
                    reservation_id,
                }])
            }

            ReservationAction::RefreshHold {
                reservation_id,
                ttl,
            } => {
                let reservation = existing(state, reservation_id)?;
                require(reservation, ReservationState::Pending, "refresh the hold of")?;
                if ttl.is_zero() {
                    return Err(ReservationError::Validation(
                        "hold duration must be positive".to_string(),
                    ));
                }
                let expires_at = chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|hold| now.checked_add_signed(hold))
                    .ok_or_else(|| {
                        ReservationError::Validation("hold duration out of range".to_string())
                    })?;

                reservation.expires_at = Some(expires_at);
                reservation.updated_at = now;

                Ok(smallvec![
                    Effect::SetExpiry {
                        reservation_id,
                        ttl,
                    },
                    Effect::Publish {
                        event: EventName::ReservationUpdated,
                        reservation_id,
                    },
                ])
            }

            ReservationAction::Confirm { reservation_id } => {
                let reservation = existing(state, reservation_id)?;
                require(reservation, ReservationState::Pending, "confirm")?;

                reservation.state = ReservationState::Reserved;
                reservation.expires_at = None;
                reservation.updated_at = now;

                Ok(smallvec![
                    Effect::ClearExpiry { reservation_id },
                    Effect::Publish {
                        event: EventName::ReservationUpdated,
                        reservation_id,
                    },
                ])
            }

            ReservationAction::Reject { reservation_id } => {
                let reservation = existing(state, reservation_id)?;
                require(reservation, ReservationState::Pending, "reject")?;

                Ok(cancel(reservation, now))
            }

            ReservationAction::Cancel {
                reservation_id,
                requester,
            } => {
                let reservation = existing(state, reservation_id)?;
                if requester
                    .as_ref()
                    .is_some_and(|user| !reservation.is_owned_by(user))
                {
                    return Err(ReservationError::Forbidden(
                        "only the owner or an admin can cancel this reservation".to_string(),
                    ));
                }
                match reservation.state {
                    ReservationState::Pending | ReservationState::Reserved => {
                        Ok(cancel(reservation, now))
                    }
                    other => Err(ReservationError::InvalidState {
                        operation: "cancel",
                        state: other,
                    }),
                }
            }

            ReservationAction::RequestCancellation {
                reservation_id,
                requester,
            } => {
                let reservation = existing(state, reservation_id)?;
                if !reservation.is_owned_by(&requester) {
                    return Err(ReservationError::Forbidden(
                        "only the owner can request cancellation".to_string(),
                    ));
                }
                match reservation.state {
                    ReservationState::Pending => Ok(cancel(reservation, now)),
                    ReservationState::Reserved => {
                        reservation.state = ReservationState::CancellationRequested;
                        reservation.updated_at = now;
                        Ok(smallvec![Effect::Publish {
                            event: EventName::CancellationRequested,
                            reservation_id,
                        }])
                    }
                    other => Err(ReservationError::InvalidState {
                        operation: "request cancellation of",
                        state: other,
                    }),
                }
            }

            ReservationAction::ApproveCancellation { reservation_id } => {
                let reservation = existing(state, reservation_id)?;
                require(
                    reservation,
                    ReservationState::CancellationRequested,
                    "approve cancellation of",
                )?;

                reservation.state = ReservationState::Cancelled;
                reservation.updated_at = now;

                Ok(smallvec![Effect::Publish {
                    event: EventName::ReservationCancelled,
                    reservation_id,
                }])
            }

            ReservationAction::DenyCancellation { reservation_id } => {
                let reservation = existing(state, reservation_id)?;
                require(
                    reservation,
                    ReservationState::CancellationRequested,
                    "deny cancellation of",
                )?;

                reservation.state = ReservationState::Reserved;
                reservation.updated_at = now;

                Ok(smallvec![Effect::Publish {
                    event: EventName::ReservationUpdated,
                    reservation_id,
                }])
            }

            ReservationAction::Expire { reservation_id } => {
                // Lapses are hints: anything but a PENDING reservation ignores them.
                let Some(reservation) = state
                    .as_mut()
                    .filter(|r| r.state == ReservationState::Pending)
                else {
                    return Ok(SmallVec::new());
                };

                reservation.state = ReservationState::Expired;
                reservation.updated_at = now;

                Ok(smallvec![Effect::Publish {
                    event: EventName::ReservationExpired,
                    reservation_id,
                }])
            }
        }
    }
}

fn existing(
    state: &mut Option<Reservation>,
    reservation_id: ReservationId,
) -> Result<&mut Reservation, ReservationError> {
    state
        .as_mut()
        .filter(|r| r.id == reservation_id)
        .ok_or_else(|| ReservationError::not_found("Reservation", reservation_id))
}

fn require(
    reservation: &Reservation,
    expected: ReservationState,
    operation: &'static str,
) -> Result<(), ReservationError> {
    if reservation.state == expected {
        Ok(())
    } else {
        Err(ReservationError::InvalidState {
            operation,
            state: reservation.state,
        })
    }
}

fn cancel(reservation: &mut Reservation, now: chrono::DateTime<chrono::Utc>) -> Effects {
    let was_pending = reservation.state == ReservationState::Pending;
    reservation.state = ReservationState::Cancelled;
    reservation.updated_at = now;

    let mut effects = Effects::new();
    if was_pending {
        effects.push(Effect::ClearExpiry {
            reservation_id: reservation.id,
        });
    }
    effects.push(Effect::Publish {
        event: EventName::ReservationCancelled,
        reservation_id: reservation.id,
    });
    effects
}
