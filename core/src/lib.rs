//! # Standbook Core
//!
//! Domain model, reservation state machine and collaborator traits for
//! Standbook, a stand reservation service for trade-fair floor plans.
//!
//! A [`reservation::ReservationReducer`] validates each command against the
//! current record and returns [`reservation::Effect`] descriptions (expiry
//! markers to set or clear, broadcasts to publish). Storage, the expiry store
//! and authentication sit behind the traits in [`gateway`], [`expiry`] and
//! [`auth`]; the runtime crate wires them together.
//!
//! At most one reservation per space may be active (PENDING, RESERVED or
//! CANCELLATION_REQUESTED) at any time. The reducer rejects creation against a
//! known occupant; the gateway guarantees the occupant it reports is current.
//!
//! ## Example
//!
//! ```ignore
//! use standbook_core::reducer::Reducer;
//! use standbook_core::reservation::{ReservationAction, ReservationReducer};
//!
//! let mut state = Some(pending_reservation);
//! let effects = ReservationReducer.reduce(
//!     &mut state,
//!     ReservationAction::Confirm { reservation_id },
//!     &env,
//! )?;
//! ```

pub mod auth;
pub mod error;
pub mod event;
pub mod expiry;
pub mod gateway;
pub mod model;
pub mod reservation;
pub mod types;

pub use error::{ConflictKind, ReservationError};
pub use event::{BroadcastEnvelope, EventName, Payload};
pub use model::{
    ClientProfile, Event, Geometry, Plan, Reservation, ReservationState, ReservationView,
    ShapeKind, Space, SpaceStatus, UserProfile, Zone,
};
pub use types::{EventId, PlanId, ReservationId, SpaceId, UserId, ZoneId};

/// Pure command handling.
pub mod reducer {
    use smallvec::SmallVec;

    /// Applies an action to a state, returning the effects to run.
    ///
    /// A rejected action returns `Err` and must leave `state` as it was.
    pub trait Reducer {
        /// Record (or absence of one) being changed
        type State;
        /// Command
        type Action;
        /// Injected dependencies such as the clock
        type Environment;
        /// Side effect description
        type Effect;
        /// Rejection reason
        type Error;

        /// Validate `action`, update `state` and describe the follow-up work.
        ///
        /// # Errors
        ///
        /// When `action` is not allowed from the current state.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Effect; 4]>, Self::Error>;
    }
}

/// Time source.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Where reducers and the service read "now" from.
    ///
    /// Tests use a fixed or manually advanced clock.
    pub trait Clock: Send + Sync {
        /// Current instant.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
