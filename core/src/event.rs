//! Domain events and the envelope pushed to realtime clients.
//!
//! Every envelope carries the owning plan id so viewers can drop events for
//! plans they are not looking at; the server never filters.

use crate::model::{ReservationView, Space};
use crate::types::PlanId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a domain event as seen by realtime clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// A PENDING reservation was created
    ReservationCreated,
    /// A reservation changed without leaving the active set, or was confirmed
    ReservationUpdated,
    /// A hold lapsed
    ReservationExpired,
    /// A reservation was cancelled, rejected or its cancellation approved
    ReservationCancelled,
    /// The owner asked to cancel a RESERVED reservation
    CancellationRequested,
    /// A space's metadata or availability changed
    SpaceUpdated,
}

impl EventName {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReservationCreated => "reservation_created",
            Self::ReservationUpdated => "reservation_updated",
            Self::ReservationExpired => "reservation_expired",
            Self::ReservationCancelled => "reservation_cancelled",
            Self::CancellationRequested => "cancellation_requested",
            Self::SpaceUpdated => "space_updated",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record carried by an envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Reservation snapshot after the transition
    Reservation(ReservationView),
    /// Space snapshot after the change
    Space(Space),
}

/// `{event, reservation|space, plano_id}` message fanned out to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// Event name
    pub event: EventName,
    /// Reservation or space snapshot
    #[serde(flatten)]
    pub payload: Payload,
    /// Plan the record belongs to
    pub plano_id: Option<PlanId>,
}

impl BroadcastEnvelope {
    /// Envelope for a reservation transition.
    #[must_use]
    pub fn reservation(event: EventName, view: ReservationView) -> Self {
        Self {
            event,
            plano_id: view.plan_id,
            payload: Payload::Reservation(view),
        }
    }

    /// `space_updated` envelope.
    #[must_use]
    pub fn space_updated(space: Space) -> Self {
        Self {
            event: EventName::SpaceUpdated,
            plano_id: Some(space.plan_id),
            payload: Payload::Space(space),
        }
    }
}
