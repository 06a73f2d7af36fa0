//! Transactional command shell around the reservation state machine.
//!
//! Every command runs in one unit of work:
//!
//! 1. lock the affected rows (the space for creates, the reservation otherwise)
//! 2. run [`ReservationReducer`] on the locked state
//! 3. write the result
//! 4. apply expiry effects, so an unreachable expiry store rolls the command back
//! 5. commit
//! 6. broadcast, only after the commit succeeded
//!
//! Broadcast failures never reach the caller.

use crate::broadcast::Broadcaster;
use crate::metrics::ReservationMetrics;
use serde::{Serialize, Serializer};
use standbook_core::environment::Clock;
use standbook_core::expiry::{ExpiryStore, HoldKeys, TimeRemaining};
use standbook_core::gateway::{GatewayFuture, PersistenceGateway, ReservationFilter, UnitOfWork};
use standbook_core::reducer::Reducer;
use standbook_core::reservation::{
    Effect, Effects, ReservationAction, ReservationEnvironment, ReservationReducer,
};
use standbook_core::{
    BroadcastEnvelope, EventName, Payload, Reservation, ReservationError, ReservationId,
    ReservationState, ReservationView, Space, SpaceId, UserId, UserProfile,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs inside the confirming unit of work, after the reservation was written.
///
/// Returning a space reports that the hook changed it; the change is
/// broadcast as `space_updated` once the unit of work commits.
pub trait ConfirmHook: Send + Sync {
    /// Apply caller-level side effects of a confirmation.
    ///
    /// # Errors
    ///
    /// A storage error rolls back the confirmation.
    fn after_confirm<'a>(
        &'a self,
        uow: &'a mut dyn UnitOfWork,
        reservation: &'a Reservation,
    ) -> GatewayFuture<'a, Option<Space>>;
}

/// What delivered an expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpirySource {
    /// Lapse notification from the expiry store
    Lapse,
    /// Reconciliation sweep
    Sweep,
}

impl ExpirySource {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lapse => "lapse",
            Self::Sweep => "sweep",
        }
    }
}

/// Result of a confirmation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Confirmation {
    /// Confirmed reservation
    pub reservation: ReservationView,
    /// New space name when the confirm hook renamed the space
    pub updated_space_name: Option<String>,
}

/// Diagnostic view combining the stored record and its hold marker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReservationStatus {
    /// Requested reservation
    pub reservation_id: ReservationId,
    /// Whether the record exists
    pub exists_in_database: bool,
    /// Whether a hold marker exists
    pub is_active_in_expiry_store: bool,
    /// Seconds left on the marker, `"no-ttl"` or `"absent"`
    #[serde(serialize_with = "serialize_ttl")]
    pub ttl: TimeRemaining,
    /// The record, if it exists
    pub reservation: Option<ReservationView>,
}

fn serialize_ttl<S: Serializer>(ttl: &TimeRemaining, serializer: S) -> Result<S::Ok, S::Error> {
    match ttl {
        TimeRemaining::Remaining(left) => serializer.serialize_u64(left.as_secs()),
        TimeRemaining::NoTtl => serializer.serialize_str("no-ttl"),
        TimeRemaining::Absent => serializer.serialize_str("absent"),
    }
}

/// Envelopes collected during a unit of work, delivered after commit.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    envelopes: Vec<BroadcastEnvelope>,
}

impl Outbox {
    pub(crate) fn reservation(&mut self, event: EventName, view: ReservationView) {
        self.envelopes.push(BroadcastEnvelope::reservation(event, view));
    }

    /// Queue `space_updated`, replacing an earlier snapshot of the same space.
    pub(crate) fn space(&mut self, space: Space) {
        self.envelopes.retain(|envelope| {
            !matches!(&envelope.payload, Payload::Space(queued) if queued.id == space.id)
        });
        self.envelopes.push(BroadcastEnvelope::space_updated(space));
    }

    fn deliver(self, broadcaster: &Broadcaster) {
        for envelope in self.envelopes {
            if matches!(envelope.payload, Payload::Reservation(_)) {
                ReservationMetrics::record_transition(envelope.event);
            }
            broadcaster.publish(envelope);
        }
    }
}

/// Reservation commands and queries.
///
/// Cheap to clone; clones share collaborators.
#[derive(Clone)]
pub struct ReservationService {
    gateway: Arc<dyn PersistenceGateway>,
    expiry: Arc<dyn ExpiryStore>,
    broadcaster: Broadcaster,
    keys: HoldKeys,
    env: ReservationEnvironment,
    confirm_hook: Option<Arc<dyn ConfirmHook>>,
}

impl ReservationService {
    /// Service over the given collaborators with the default key namespace.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        expiry: Arc<dyn ExpiryStore>,
        broadcaster: Broadcaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            expiry,
            broadcaster,
            keys: HoldKeys::default(),
            env: ReservationEnvironment::new(clock),
            confirm_hook: None,
        }
    }

    /// Use `keys` for hold markers.
    #[must_use]
    pub fn with_keys(mut self, keys: HoldKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Run `hook` inside every confirmation.
    #[must_use]
    pub fn with_confirm_hook(mut self, hook: Arc<dyn ConfirmHook>) -> Self {
        self.confirm_hook = Some(hook);
        self
    }

    /// Persistence gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Expiry store.
    #[must_use]
    pub fn expiry_store(&self) -> &Arc<dyn ExpiryStore> {
        &self.expiry
    }

    /// Broadcast hub.
    #[must_use]
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Hold marker namespace.
    #[must_use]
    pub const fn keys(&self) -> &HoldKeys {
        &self.keys
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Create a PENDING reservation without a hold marker.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown space, `Validation` for a blocked space or a
    /// blank asignee, `Conflict` if the space is occupied, `Unavailable` on
    /// storage failure.
    pub async fn create(
        &self,
        space_id: SpaceId,
        user_id: Option<UserId>,
        asignee: &str,
    ) -> Result<ReservationView, ReservationError> {
        observe("create", async {
            let mut uow = self.gateway.begin().await?;
            let mut outbox = Outbox::default();
            let result = async {
                let reservation = self
                    .create_in(uow.as_mut(), &mut outbox, space_id, user_id, asignee)
                    .await?;
                self.view_in(uow.as_mut(), reservation).await
            }
            .await;
            self.finish(uow, outbox, result).await
        })
        .await
    }

    /// Create a PENDING reservation and start its hold in one unit of work.
    ///
    /// # Errors
    ///
    /// As [`ReservationService::create`]; additionally `Unavailable` if the
    /// hold marker cannot be written, in which case nothing is created.
    pub async fn create_and_hold(
        &self,
        space_id: SpaceId,
        user_id: Option<UserId>,
        asignee: &str,
        ttl: Duration,
    ) -> Result<ReservationView, ReservationError> {
        observe("create", async {
            let mut uow = self.gateway.begin().await?;
            let mut outbox = Outbox::default();
            let result = async {
                let created = self
                    .create_in(uow.as_mut(), &mut outbox, space_id, user_id, asignee)
                    .await?;
                let action = ReservationAction::RefreshHold {
                    reservation_id: created.id,
                    ttl,
                };
                let held = self.transition_in(uow.as_mut(), &mut outbox, action).await?;
                self.view_in(uow.as_mut(), held).await
            }
            .await;
            self.finish(uow, outbox, result).await
        })
        .await
    }

    /// Set or extend the hold of a PENDING reservation.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless PENDING, `Validation` for a zero `ttl`.
    pub async fn refresh_hold(
        &self,
        reservation_id: ReservationId,
        ttl: Duration,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::RefreshHold {
            reservation_id,
            ttl,
        })
        .await
    }

    /// Confirm a PENDING reservation and run the confirm hook.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` unless PENDING.
    pub async fn confirm(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Confirmation, ReservationError> {
        observe("confirm", async {
            let mut uow = self.gateway.begin().await?;
            let mut outbox = Outbox::default();
            let result = async {
                let (reservation, renamed) = self
                    .confirm_in(uow.as_mut(), &mut outbox, reservation_id)
                    .await?;
                let view = self.view_in(uow.as_mut(), reservation).await?;
                Ok(Confirmation {
                    reservation: view,
                    updated_space_name: renamed.map(|space| space.name),
                })
            }
            .await;
            self.finish(uow, outbox, result).await
        })
        .await
    }

    /// Reject a PENDING reservation.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `InvalidState` unless PENDING.
    pub async fn reject(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::Reject { reservation_id })
            .await
    }

    /// Cancel a PENDING or RESERVED reservation.
    ///
    /// `requester` is `None` for admins and internal callers.
    ///
    /// # Errors
    ///
    /// `Forbidden` if `requester` does not own the reservation,
    /// `InvalidState` from any other state.
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
        requester: Option<UserId>,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::Cancel {
            reservation_id,
            requester,
        })
        .await
    }

    /// Owner-side cancellation: PENDING is cancelled outright, RESERVED waits
    /// for an admin.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless `requester` owns the reservation, `InvalidState`
    /// from any other state.
    pub async fn request_cancellation(
        &self,
        reservation_id: ReservationId,
        requester: UserId,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::RequestCancellation {
            reservation_id,
            requester,
        })
        .await
    }

    /// Approve a cancellation request.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless CANCELLATION_REQUESTED.
    pub async fn approve_cancellation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::ApproveCancellation { reservation_id })
            .await
    }

    /// Deny a cancellation request, restoring RESERVED.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless CANCELLATION_REQUESTED.
    pub async fn deny_cancellation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationView, ReservationError> {
        self.command(ReservationAction::DenyCancellation { reservation_id })
            .await
    }

    /// Expire a lapsed hold.
    ///
    /// Safe to call any number of times: returns `Ok(None)` without writing
    /// when the reservation is gone, no longer PENDING, or its marker is live
    /// again because the hold was refreshed after the lapse.
    ///
    /// # Errors
    ///
    /// `Unavailable` if storage or the expiry store cannot be reached.
    pub async fn handle_expiry(
        &self,
        reservation_id: ReservationId,
        source: ExpirySource,
    ) -> Result<Option<ReservationView>, ReservationError> {
        let expired = observe("expire", async {
            let mut uow = self.gateway.begin().await?;
            let mut outbox = Outbox::default();
            let result = self.expire_in(uow.as_mut(), &mut outbox, reservation_id).await;
            self.finish(uow, outbox, result).await
        })
        .await?;

        match &expired {
            Some(view) => {
                ReservationMetrics::record_expired(source.as_str());
                tracing::debug!(
                    %reservation_id,
                    space_id = %view.reservation.space_id,
                    source = source.as_str(),
                    "Hold expired"
                );
            }
            None => tracing::debug!(
                %reservation_id,
                source = source.as_str(),
                "Stale lapse ignored"
            ),
        }
        Ok(expired)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// One reservation.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationView, ReservationError> {
        let reservation = self
            .gateway
            .reservation(reservation_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Reservation", reservation_id))?;
        self.view(reservation).await
    }

    /// Record and marker diagnostics.
    ///
    /// # Errors
    ///
    /// `Unavailable` if storage or the expiry store cannot be reached.
    pub async fn status(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReservationStatus, ReservationError> {
        let reservation = match self.gateway.reservation(reservation_id).await? {
            Some(reservation) => Some(self.view(reservation).await?),
            None => None,
        };
        let ttl = self
            .expiry
            .time_remaining(&self.keys.key(reservation_id))
            .await?;

        Ok(ReservationStatus {
            reservation_id,
            exists_in_database: reservation.is_some(),
            is_active_in_expiry_store: ttl != TimeRemaining::Absent,
            ttl,
            reservation,
        })
    }

    /// Every reservation of a space, oldest first.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_by_space(
        &self,
        space_id: SpaceId,
    ) -> Result<Vec<ReservationView>, ReservationError> {
        self.list(ReservationFilter::for_space(space_id)).await
    }

    /// The reservation currently occupying a space.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn active_for_space(
        &self,
        space_id: SpaceId,
    ) -> Result<Option<ReservationView>, ReservationError> {
        let filter = ReservationFilter {
            states: ReservationState::ACTIVE.to_vec(),
            ..ReservationFilter::for_space(space_id)
        };
        Ok(self.list(filter).await?.pop())
    }

    /// Reservations made by a user.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ReservationView>, ReservationError> {
        self.list(ReservationFilter::for_user(user_id.clone())).await
    }

    /// Reservations waiting for confirmation.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_pending(&self) -> Result<Vec<ReservationView>, ReservationError> {
        self.list(ReservationFilter::in_state(ReservationState::Pending))
            .await
    }

    /// Reservations whose owner asked to cancel.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_cancellation_requests(
        &self,
    ) -> Result<Vec<ReservationView>, ReservationError> {
        self.list(ReservationFilter::in_state(
            ReservationState::CancellationRequested,
        ))
        .await
    }

    /// PENDING reservations whose hold deadline has passed.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn overdue_holds(&self) -> Result<Vec<Reservation>, ReservationError> {
        let filter = ReservationFilter {
            expires_before: Some(self.now()),
            ..ReservationFilter::in_state(ReservationState::Pending)
        };
        Ok(self.gateway.reservations(filter).await?)
    }

    // ------------------------------------------------------------------
    // Unit-of-work building blocks, shared with the registry
    // ------------------------------------------------------------------

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.env.clock.now()
    }

    pub(crate) async fn create_in(
        &self,
        uow: &mut dyn UnitOfWork,
        outbox: &mut Outbox,
        space_id: SpaceId,
        user_id: Option<UserId>,
        asignee: &str,
    ) -> Result<Reservation, ReservationError> {
        // The space row lock serializes creates for the same space; the
        // storage-level unique index backs it up.
        let space = uow.lock_space(space_id).await?;
        let occupant = match space {
            Some(_) => uow.active_reservation(space_id).await?,
            None => None,
        };

        let action = ReservationAction::Create {
            reservation_id: ReservationId::new(),
            space_id,
            space,
            occupant,
            user_id,
            asignee: asignee.to_string(),
        };
        let mut state = None;
        let effects = ReservationReducer
            .reduce(&mut state, action, &self.env)
            .inspect_err(record_conflict)?;
        let reservation = state.ok_or_else(|| {
            ReservationError::Internal("create produced no reservation".to_string())
        })?;

        uow.insert_reservation(reservation.clone())
            .await
            .map_err(ReservationError::from)
            .inspect_err(record_conflict)?;
        self.settle(uow, outbox, &reservation, effects).await?;
        Ok(reservation)
    }

    pub(crate) async fn transition_in(
        &self,
        uow: &mut dyn UnitOfWork,
        outbox: &mut Outbox,
        action: ReservationAction,
    ) -> Result<Reservation, ReservationError> {
        let state = uow.lock_reservation(action.reservation_id()).await?;
        let (reservation, effects) = self.apply(uow, state, action).await?;
        self.settle(uow, outbox, &reservation, effects).await?;
        Ok(reservation)
    }

    pub(crate) async fn confirm_in(
        &self,
        uow: &mut dyn UnitOfWork,
        outbox: &mut Outbox,
        reservation_id: ReservationId,
    ) -> Result<(Reservation, Option<Space>), ReservationError> {
        let state = uow.lock_reservation(reservation_id).await?;
        let (reservation, effects) = self
            .apply(uow, state, ReservationAction::Confirm { reservation_id })
            .await?;

        let renamed = match &self.confirm_hook {
            Some(hook) => hook.after_confirm(uow, &reservation).await?,
            None => None,
        };

        self.settle(uow, outbox, &reservation, effects).await?;
        if let Some(space) = &renamed {
            outbox.space(space.clone());
        }
        Ok((reservation, renamed))
    }

    async fn expire_in(
        &self,
        uow: &mut dyn UnitOfWork,
        outbox: &mut Outbox,
        reservation_id: ReservationId,
    ) -> Result<Option<ReservationView>, ReservationError> {
        let state = uow.lock_reservation(reservation_id).await?;
        if !state
            .as_ref()
            .is_some_and(|r| r.state == ReservationState::Pending)
        {
            return Ok(None);
        }
        // Checked under the row lock: a refresh committed before we locked has
        // already written its marker.
        if self.expiry.exists(&self.keys.key(reservation_id)).await? {
            return Ok(None);
        }

        let (reservation, effects) = self
            .apply(uow, state, ReservationAction::Expire { reservation_id })
            .await?;
        self.settle(uow, outbox, &reservation, effects).await?;
        Ok(Some(self.view_in(uow, reservation).await?))
    }

    /// Commit and deliver on success, roll back otherwise.
    pub(crate) async fn finish<T>(
        &self,
        uow: Box<dyn UnitOfWork>,
        outbox: Outbox,
        result: Result<T, ReservationError>,
    ) -> Result<T, ReservationError> {
        match result {
            Ok(value) => {
                uow.commit().await?;
                outbox.deliver(&self.broadcaster);
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = uow.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(error)
            }
        }
    }

    pub(crate) async fn view_in(
        &self,
        uow: &mut dyn UnitOfWork,
        reservation: Reservation,
    ) -> Result<ReservationView, ReservationError> {
        let space = uow.space(reservation.space_id).await?;
        let profile = match reservation.user_id.as_ref() {
            Some(user) if reservation.state == ReservationState::Reserved => {
                uow.profile(user).await?
            }
            _ => None,
        };
        Ok(ReservationView::new(
            reservation,
            space.as_ref(),
            profile.as_ref(),
        ))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn command(
        &self,
        action: ReservationAction,
    ) -> Result<ReservationView, ReservationError> {
        observe(action.name(), async {
            let mut uow = self.gateway.begin().await?;
            let mut outbox = Outbox::default();
            let result = async {
                let reservation = self.transition_in(uow.as_mut(), &mut outbox, action).await?;
                self.view_in(uow.as_mut(), reservation).await
            }
            .await;
            self.finish(uow, outbox, result).await
        })
        .await
    }

    /// Reduce and persist. The state is left as loaded on rejection.
    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        mut state: Option<Reservation>,
        action: ReservationAction,
    ) -> Result<(Reservation, Effects), ReservationError> {
        let reservation_id = action.reservation_id();
        let effects = ReservationReducer.reduce(&mut state, action, &self.env)?;
        let reservation =
            state.ok_or_else(|| ReservationError::not_found("Reservation", reservation_id))?;
        if !effects.is_empty() {
            uow.update_reservation(reservation.clone()).await?;
        }
        Ok((reservation, effects))
    }

    /// Apply expiry effects inside the unit of work and queue broadcasts.
    async fn settle(
        &self,
        uow: &mut dyn UnitOfWork,
        outbox: &mut Outbox,
        reservation: &Reservation,
        effects: Effects,
    ) -> Result<(), ReservationError> {
        for effect in effects {
            match effect {
                Effect::SetExpiry {
                    reservation_id,
                    ttl,
                } => self.expiry.set(&self.keys.key(reservation_id), ttl).await?,
                Effect::ClearExpiry { reservation_id } => {
                    self.expiry.remove(&self.keys.key(reservation_id)).await?;
                }
                Effect::Publish { event, .. } => {
                    let view = self.view_in(uow, reservation.clone()).await?;
                    outbox.reservation(event, view);
                }
            }
        }
        Ok(())
    }

    async fn view(&self, reservation: Reservation) -> Result<ReservationView, ReservationError> {
        let space = self.gateway.space(reservation.space_id).await?;
        let profile = match reservation.user_id.as_ref() {
            Some(user) if reservation.state == ReservationState::Reserved => {
                self.gateway.profile(user).await?
            }
            _ => None,
        };
        Ok(ReservationView::new(
            reservation,
            space.as_ref(),
            profile.as_ref(),
        ))
    }

    async fn list(
        &self,
        filter: ReservationFilter,
    ) -> Result<Vec<ReservationView>, ReservationError> {
        let rows = self.gateway.reservations(filter).await?;
        let mut spaces: HashMap<SpaceId, Option<Space>> = HashMap::new();
        let mut profiles: HashMap<UserId, Option<UserProfile>> = HashMap::new();
        let mut views = Vec::with_capacity(rows.len());

        for reservation in rows {
            if !spaces.contains_key(&reservation.space_id) {
                let space = self.gateway.space(reservation.space_id).await?;
                spaces.insert(reservation.space_id, space);
            }
            if reservation.state == ReservationState::Reserved {
                if let Some(user) = &reservation.user_id {
                    if !profiles.contains_key(user) {
                        let profile = self.gateway.profile(user).await?;
                        profiles.insert(user.clone(), profile);
                    }
                }
            }

            let space = spaces.get(&reservation.space_id).and_then(Option::as_ref);
            let profile = reservation
                .user_id
                .as_ref()
                .and_then(|user| profiles.get(user))
                .and_then(Option::as_ref);
            views.push(ReservationView::new(reservation, space, profile));
        }
        Ok(views)
    }
}

/// Command results that name the reservation they touched.
trait Touched {
    fn touched(&self) -> Option<&Reservation>;
}

impl Touched for ReservationView {
    fn touched(&self) -> Option<&Reservation> {
        Some(&self.reservation)
    }
}

impl Touched for Confirmation {
    fn touched(&self) -> Option<&Reservation> {
        Some(&self.reservation.reservation)
    }
}

impl Touched for Option<ReservationView> {
    fn touched(&self) -> Option<&Reservation> {
        self.as_ref().map(|view| &view.reservation)
    }
}

/// Time and log one command.
async fn observe<T, F>(operation: &'static str, command: F) -> Result<T, ReservationError>
where
    T: Touched,
    F: Future<Output = Result<T, ReservationError>>,
{
    let started = Instant::now();
    let result = command.await;
    ReservationMetrics::record_command(operation, started.elapsed());
    match &result {
        Ok(outcome) => {
            if let Some(reservation) = outcome.touched() {
                tracing::info!(
                    operation,
                    reservation_id = %reservation.id,
                    space_id = %reservation.space_id,
                    state = %reservation.state,
                    "Reservation command committed"
                );
            }
        }
        Err(error) if error.is_retryable() => {
            tracing::warn!(operation, error = %error, "Reservation command failed");
        }
        Err(error) => tracing::debug!(operation, error = %error, "Reservation command rejected"),
    }
    result
}

fn record_conflict(error: &ReservationError) {
    if matches!(error, ReservationError::Conflict(_)) {
        ReservationMetrics::record_conflict();
    }
}
