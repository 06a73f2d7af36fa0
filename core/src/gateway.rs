//! Persistence gateway abstraction.
//!
//! Reads that do not participate in a command go straight through
//! [`PersistenceGateway`]. Every write happens inside a [`UnitOfWork`] obtained
//! from [`PersistenceGateway::begin`], which is committed or rolled back as a
//! whole.
//!
//! # Object safety
//!
//! Methods return `Pin<Box<dyn Future>>` (see [`GatewayFuture`]) so the
//! gateway can be shared as `Arc<dyn PersistenceGateway>` and a unit of work
//! handed around as `Box<dyn UnitOfWork>`.
//!
//! # Single active reservation
//!
//! Implementations must make [`UnitOfWork::lock_space`] serialize concurrent
//! units of work touching the same space (a row lock, or a store-wide lock),
//! and should additionally reject a second active reservation for a space at
//! the storage layer, reporting it as [`StoreError::UniqueViolation`].

use crate::error::{ConflictKind, ReservationError};
use crate::model::{Event, Plan, Reservation, ReservationState, Space, UserProfile, Zone};
use crate::types::{EventId, PlanId, ReservationId, SpaceId, UserId, ZoneId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by gateway operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors that can occur in gateway operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection lost, pool exhausted, timeout; the unit of work was not applied
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A second active reservation for one space reached the storage layer
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced record does not exist
    #[error("foreign key violated: {0}")]
    MissingReference(String),

    /// Row could not be decoded or the statement was rejected
    #[error("storage error: {0}")]
    Database(String),
}

impl From<StoreError> for ReservationError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Unavailable(msg) => Self::Unavailable(msg),
            StoreError::UniqueViolation(_) => Self::Conflict(ConflictKind::Active),
            StoreError::MissingReference(msg) => Self::Validation(msg),
            StoreError::Database(msg) => Self::Internal(msg),
        }
    }
}

/// Filter for reservation listings. Empty fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    /// Only reservations of this space
    pub space_id: Option<SpaceId>,
    /// Only reservations made by this user
    pub user_id: Option<UserId>,
    /// Only reservations in one of these states
    pub states: Vec<ReservationState>,
    /// Only reservations whose `expires_at` is strictly before this instant
    pub expires_before: Option<DateTime<Utc>>,
}

impl ReservationFilter {
    /// Reservations of one space.
    #[must_use]
    pub fn for_space(space_id: SpaceId) -> Self {
        Self {
            space_id: Some(space_id),
            ..Self::default()
        }
    }

    /// Reservations of one user.
    #[must_use]
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Reservations in one state.
    #[must_use]
    pub fn in_state(state: ReservationState) -> Self {
        Self {
            states: vec![state],
            ..Self::default()
        }
    }

    /// Whether `reservation` passes the filter.
    #[must_use]
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.space_id.is_none_or(|id| reservation.space_id == id)
            && self
                .user_id
                .as_ref()
                .is_none_or(|user| reservation.user_id.as_ref() == Some(user))
            && (self.states.is_empty() || self.states.contains(&reservation.state))
            && self.expires_before.is_none_or(|cutoff| {
                reservation.expires_at.is_some_and(|expires| expires < cutoff)
            })
    }
}

/// Read access and transaction factory.
pub trait PersistenceGateway: Send + Sync {
    /// Start a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if no connection can be obtained.
    fn begin(&self) -> GatewayFuture<'_, Box<dyn UnitOfWork>>;

    /// Cheap liveness probe.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store cannot be reached.
    fn ping(&self) -> GatewayFuture<'_, ()>;

    /// Load a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn reservation(&self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>>;

    /// List reservations, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn reservations(&self, filter: ReservationFilter) -> GatewayFuture<'_, Vec<Reservation>>;

    /// Load a space.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn space(&self, id: SpaceId) -> GatewayFuture<'_, Option<Space>>;

    /// List the spaces of a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn spaces(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Space>>;

    /// Load a zone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn zone(&self, id: ZoneId) -> GatewayFuture<'_, Option<Zone>>;

    /// List the zones of a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn zones(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Zone>>;

    /// Load a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn plan(&self, id: PlanId) -> GatewayFuture<'_, Option<Plan>>;

    /// List plans, optionally only those of one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn plans(&self, event_id: Option<EventId>) -> GatewayFuture<'_, Vec<Plan>>;

    /// Load an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn event(&self, id: EventId) -> GatewayFuture<'_, Option<Event>>;

    /// List events, optionally only visible ones.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn events(&self, visible_only: bool) -> GatewayFuture<'_, Vec<Event>>;

    /// Load a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn profile<'a>(&'a self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>>;
}

/// One atomic batch of reads and writes.
///
/// Dropping a unit of work without committing discards its writes.
pub trait UnitOfWork: Send {
    /// Load a space and hold it exclusively until the unit of work ends.
    fn lock_space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>>;

    /// Load a space without locking it.
    fn space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>>;

    /// Load a reservation and hold it exclusively until the unit of work ends.
    fn lock_reservation(&mut self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>>;

    /// The reservation currently occupying a space, if any.
    fn active_reservation(&mut self, space_id: SpaceId) -> GatewayFuture<'_, Option<Reservation>>;

    /// Load a user profile.
    fn profile<'a>(&'a mut self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>>;

    /// Insert a new reservation.
    fn insert_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()>;

    /// Overwrite an existing reservation.
    fn update_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()>;

    /// Insert or overwrite a space.
    fn save_space(&mut self, space: Space) -> GatewayFuture<'_, ()>;

    /// Delete a space and its reservation history. Returns whether it existed.
    fn delete_space(&mut self, id: SpaceId) -> GatewayFuture<'_, bool>;

    /// Insert or overwrite a zone.
    fn save_zone(&mut self, zone: Zone) -> GatewayFuture<'_, ()>;

    /// Delete a zone, detaching its spaces. Returns whether it existed.
    fn delete_zone(&mut self, id: ZoneId) -> GatewayFuture<'_, bool>;

    /// Insert or overwrite a plan.
    fn save_plan(&mut self, plan: Plan) -> GatewayFuture<'_, ()>;

    /// Delete a plan with its spaces and zones. Returns whether it existed.
    fn delete_plan(&mut self, id: PlanId) -> GatewayFuture<'_, bool>;

    /// Insert or overwrite an event.
    fn save_event(&mut self, event: Event) -> GatewayFuture<'_, ()>;

    /// Delete an event with its plans. Returns whether it existed.
    fn delete_event(&mut self, id: EventId) -> GatewayFuture<'_, bool>;

    /// Insert or overwrite a user profile.
    fn save_profile(&mut self, profile: UserProfile) -> GatewayFuture<'_, ()>;

    /// Make every write visible atomically.
    fn commit(self: Box<Self>) -> GatewayFuture<'static, ()>;

    /// Discard every write.
    fn rollback(self: Box<Self>) -> GatewayFuture<'static, ()>;
}
