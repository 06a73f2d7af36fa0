//! In-memory persistence gateway.

use standbook_core::gateway::{
    GatewayFuture, PersistenceGateway, ReservationFilter, StoreError, UnitOfWork,
};
use standbook_core::{
    Event, EventId, Plan, PlanId, Reservation, ReservationId, Space, SpaceId, UserId,
    UserProfile, Zone, ZoneId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    reservations: HashMap<ReservationId, Reservation>,
    spaces: HashMap<SpaceId, Space>,
    zones: HashMap<ZoneId, Zone>,
    plans: HashMap<PlanId, Plan>,
    events: HashMap<EventId, Event>,
    profiles: HashMap<UserId, UserProfile>,
}

impl Tables {
    fn active_for(&self, space_id: SpaceId) -> Option<&Reservation> {
        self.reservations
            .values()
            .find(|r| r.space_id == space_id && r.state.is_active())
    }

    fn check_single_active(&self, reservation: &Reservation) -> Result<(), StoreError> {
        match self.active_for(reservation.space_id) {
            Some(other) if reservation.state.is_active() && other.id != reservation.id => {
                Err(StoreError::UniqueViolation(format!(
                    "space {} already has active reservation {}",
                    reservation.space_id, other.id
                )))
            }
            _ => Ok(()),
        }
    }

    fn remove_space(&mut self, id: SpaceId) -> bool {
        self.reservations.retain(|_, r| r.space_id != id);
        self.spaces.remove(&id).is_some()
    }

    fn remove_plan(&mut self, id: PlanId) -> bool {
        let spaces: Vec<SpaceId> = self
            .spaces
            .values()
            .filter(|s| s.plan_id == id)
            .map(|s| s.id)
            .collect();
        for space in spaces {
            self.remove_space(space);
        }
        self.zones.retain(|_, z| z.plan_id != id);
        self.plans.remove(&id).is_some()
    }
}

fn sorted<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(key);
    rows
}

/// In-memory gateway.
///
/// A unit of work holds a store-wide lock from `begin` until commit or
/// rollback and works on a private copy of the tables, so units of work are
/// fully serialized and uncommitted writes are invisible. Non-transactional
/// reads wait for an open unit of work to finish.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGateway {
    tables: Arc<Mutex<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryGateway {
    /// Empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared trait object over the same tables.
    #[must_use]
    pub fn as_dyn(&self) -> Arc<dyn PersistenceGateway> {
        Arc::new(self.clone())
    }

    /// Make the next commit fail with [`StoreError::Unavailable`].
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed an event.
    pub async fn put_event(&self, event: Event) {
        self.tables.lock().await.events.insert(event.id, event);
    }

    /// Seed a plan.
    pub async fn put_plan(&self, plan: Plan) {
        self.tables.lock().await.plans.insert(plan.id, plan);
    }

    /// Seed a space.
    pub async fn put_space(&self, space: Space) {
        self.tables.lock().await.spaces.insert(space.id, space);
    }

    /// Seed a zone.
    pub async fn put_zone(&self, zone: Zone) {
        self.tables.lock().await.zones.insert(zone.id, zone);
    }

    /// Seed a reservation, bypassing the single-active check.
    pub async fn put_reservation(&self, reservation: Reservation) {
        self.tables
            .lock()
            .await
            .reservations
            .insert(reservation.id, reservation);
    }

    /// Seed a profile.
    pub async fn put_profile(&self, profile: UserProfile) {
        self.tables
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    /// Every stored reservation, in no particular order.
    pub async fn all_reservations(&self) -> Vec<Reservation> {
        self.tables
            .lock()
            .await
            .reservations
            .values()
            .cloned()
            .collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn read<T, F>(&self, f: F) -> GatewayFuture<'_, T>
    where
        T: Send + 'static,
        F: FnOnce(&Tables) -> T + Send + 'static,
    {
        Box::pin(async move {
            self.check_available()?;
            let tables = self.tables.lock().await;
            Ok(f(&tables))
        })
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn begin(&self) -> GatewayFuture<'_, Box<dyn UnitOfWork>> {
        Box::pin(async move {
            self.check_available()?;
            let guard = Arc::clone(&self.tables).lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(InMemoryUnitOfWork {
                guard,
                working,
                fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
            }) as Box<dyn UnitOfWork>)
        })
    }

    fn ping(&self) -> GatewayFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }

    fn reservation(&self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>> {
        self.read(move |t| t.reservations.get(&id).cloned())
    }

    fn reservations(&self, filter: ReservationFilter) -> GatewayFuture<'_, Vec<Reservation>> {
        self.read(move |t| {
            let rows = t
                .reservations
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            sorted(rows, |r: &Reservation| r.created_at)
        })
    }

    fn space(&self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        self.read(move |t| t.spaces.get(&id).cloned())
    }

    fn spaces(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Space>> {
        self.read(move |t| {
            let rows = t
                .spaces
                .values()
                .filter(|s| s.plan_id == plan_id)
                .cloned()
                .collect();
            sorted(rows, |s: &Space| s.name.clone())
        })
    }

    fn zone(&self, id: ZoneId) -> GatewayFuture<'_, Option<Zone>> {
        self.read(move |t| t.zones.get(&id).cloned())
    }

    fn zones(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Zone>> {
        self.read(move |t| {
            let rows = t
                .zones
                .values()
                .filter(|z| z.plan_id == plan_id)
                .cloned()
                .collect();
            sorted(rows, |z: &Zone| z.name.clone())
        })
    }

    fn plan(&self, id: PlanId) -> GatewayFuture<'_, Option<Plan>> {
        self.read(move |t| t.plans.get(&id).cloned())
    }

    fn plans(&self, event_id: Option<EventId>) -> GatewayFuture<'_, Vec<Plan>> {
        self.read(move |t| {
            let rows = t
                .plans
                .values()
                .filter(|p| event_id.is_none_or(|id| p.event_id == Some(id)))
                .cloned()
                .collect();
            sorted(rows, |p: &Plan| p.created_at)
        })
    }

    fn event(&self, id: EventId) -> GatewayFuture<'_, Option<Event>> {
        self.read(move |t| t.events.get(&id).cloned())
    }

    fn events(&self, visible_only: bool) -> GatewayFuture<'_, Vec<Event>> {
        self.read(move |t| {
            let rows = t
                .events
                .values()
                .filter(|e| !visible_only || e.visible)
                .cloned()
                .collect();
            sorted(rows, |e: &Event| e.created_at)
        })
    }

    fn profile<'a>(&'a self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>> {
        let user_id = user_id.clone();
        self.read(move |t| t.profiles.get(&user_id).cloned())
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    fail_commit: bool,
}

impl InMemoryUnitOfWork {
    fn ready<T: Send + 'static>(result: Result<T, StoreError>) -> GatewayFuture<'static, T> {
        Box::pin(std::future::ready(result))
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn lock_space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        Self::ready(Ok(self.working.spaces.get(&id).cloned()))
    }

    fn space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        Self::ready(Ok(self.working.spaces.get(&id).cloned()))
    }

    fn lock_reservation(&mut self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>> {
        Self::ready(Ok(self.working.reservations.get(&id).cloned()))
    }

    fn active_reservation(&mut self, space_id: SpaceId) -> GatewayFuture<'_, Option<Reservation>> {
        Self::ready(Ok(self.working.active_for(space_id).cloned()))
    }

    fn profile<'a>(&'a mut self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>> {
        Self::ready(Ok(self.working.profiles.get(user_id).cloned()))
    }

    fn insert_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()> {
        let result = if !self.working.spaces.contains_key(&reservation.space_id) {
            Err(StoreError::MissingReference(format!(
                "space {} does not exist",
                reservation.space_id
            )))
        } else if self.working.reservations.contains_key(&reservation.id) {
            Err(StoreError::Database(format!(
                "reservation {} already exists",
                reservation.id
            )))
        } else {
            self.working.check_single_active(&reservation).map(|()| {
                self.working
                    .reservations
                    .insert(reservation.id, reservation);
            })
        };
        Self::ready(result)
    }

    fn update_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()> {
        let result = if self.working.reservations.contains_key(&reservation.id) {
            self.working.check_single_active(&reservation).map(|()| {
                self.working
                    .reservations
                    .insert(reservation.id, reservation);
            })
        } else {
            Err(StoreError::Database(format!(
                "reservation {} does not exist",
                reservation.id
            )))
        };
        Self::ready(result)
    }

    fn save_space(&mut self, space: Space) -> GatewayFuture<'_, ()> {
        let result = if !self.working.plans.contains_key(&space.plan_id) {
            Err(StoreError::MissingReference(format!(
                "plan {} does not exist",
                space.plan_id
            )))
        } else if space
            .zone_id
            .is_some_and(|zone| !self.working.zones.contains_key(&zone))
        {
            Err(StoreError::MissingReference("zone does not exist".to_string()))
        } else {
            self.working.spaces.insert(space.id, space);
            Ok(())
        };
        Self::ready(result)
    }

    fn delete_space(&mut self, id: SpaceId) -> GatewayFuture<'_, bool> {
        Self::ready(Ok(self.working.remove_space(id)))
    }

    fn save_zone(&mut self, zone: Zone) -> GatewayFuture<'_, ()> {
        let result = if self.working.plans.contains_key(&zone.plan_id) {
            self.working.zones.insert(zone.id, zone);
            Ok(())
        } else {
            Err(StoreError::MissingReference(format!(
                "plan {} does not exist",
                zone.plan_id
            )))
        };
        Self::ready(result)
    }

    fn delete_zone(&mut self, id: ZoneId) -> GatewayFuture<'_, bool> {
        for space in self.working.spaces.values_mut() {
            if space.zone_id == Some(id) {
                space.zone_id = None;
            }
        }
        Self::ready(Ok(self.working.zones.remove(&id).is_some()))
    }

    fn save_plan(&mut self, plan: Plan) -> GatewayFuture<'_, ()> {
        let result = if plan
            .event_id
            .is_some_and(|event| !self.working.events.contains_key(&event))
        {
            Err(StoreError::MissingReference("event does not exist".to_string()))
        } else {
            self.working.plans.insert(plan.id, plan);
            Ok(())
        };
        Self::ready(result)
    }

    fn delete_plan(&mut self, id: PlanId) -> GatewayFuture<'_, bool> {
        Self::ready(Ok(self.working.remove_plan(id)))
    }

    fn save_event(&mut self, event: Event) -> GatewayFuture<'_, ()> {
        self.working.events.insert(event.id, event);
        Self::ready(Ok(()))
    }

    fn delete_event(&mut self, id: EventId) -> GatewayFuture<'_, bool> {
        let plans: Vec<PlanId> = self
            .working
            .plans
            .values()
            .filter(|p| p.event_id == Some(id))
            .map(|p| p.id)
            .collect();
        for plan in plans {
            self.working.remove_plan(plan);
        }
        Self::ready(Ok(self.working.events.remove(&id).is_some()))
    }

    fn save_profile(&mut self, profile: UserProfile) -> GatewayFuture<'_, ()> {
        self.working
            .profiles
            .insert(profile.user_id.clone(), profile);
        Self::ready(Ok(()))
    }

    fn commit(self: Box<Self>) -> GatewayFuture<'static, ()> {
        let Self {
            mut guard,
            working,
            fail_commit,
        } = *self;
        if fail_commit {
            return Self::ready(Err(StoreError::Unavailable(
                "injected commit failure".to_string(),
            )));
        }
        *guard = working;
        Self::ready(Ok(()))
    }

    fn rollback(self: Box<Self>) -> GatewayFuture<'static, ()> {
        Self::ready(Ok(()))
    }
}
