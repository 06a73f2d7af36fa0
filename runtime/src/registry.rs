//! Events, plans, spaces, zones and user profiles.
//!
//! Space mutations broadcast `space_updated` after commit. The
//! [`Registry::set_space_status`] shortcut drives the reservation state
//! machine through the same unit-of-work building blocks the
//! [`ReservationService`] uses, so it cannot bypass the single-active rule.

use crate::service::{Outbox, ReservationService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use standbook_core::gateway::{PersistenceGateway, UnitOfWork};
use standbook_core::reservation::ReservationAction;
use standbook_core::{
    ConflictKind, Event, EventId, Geometry, Plan, PlanId, Reservation, ReservationError,
    ReservationState, ReservationView, ShapeKind, Space, SpaceId, SpaceStatus, UserId,
    UserProfile, Zone, ZoneId,
};
use std::sync::Arc;

const fn default_true() -> bool {
    true
}

/// Fields of a new event.
#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    /// Display name
    pub name: String,
    /// Reservations open at
    #[serde(default)]
    pub reservable_from: Option<DateTime<Utc>>,
    /// Reservations close at
    #[serde(default)]
    pub reservable_until: Option<DateTime<Utc>>,
    /// Listed to anonymous visitors
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Partial event update; absent fields are kept.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventPatch {
    /// Display name
    pub name: Option<String>,
    /// Reservations open at
    pub reservable_from: Option<DateTime<Utc>>,
    /// Reservations close at
    pub reservable_until: Option<DateTime<Utc>>,
    /// Listed to anonymous visitors
    pub visible: Option<bool>,
}

/// Fields of a new plan.
#[derive(Clone, Debug, Deserialize)]
pub struct NewPlan {
    /// Owning event
    #[serde(rename = "evento_id", default)]
    pub event_id: Option<EventId>,
    /// Display name
    pub name: String,
    /// Background image location
    pub url: String,
    /// Canvas width in pixels
    pub width: i32,
    /// Canvas height in pixels
    pub height: i32,
    /// Scale calibration
    #[serde(default)]
    pub pixels_per_meter: Option<f64>,
}

/// Partial plan metadata update.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlanPatch {
    /// Display name
    pub name: Option<String>,
    /// Background image location
    pub url: Option<String>,
    /// Canvas width in pixels
    pub width: Option<i32>,
    /// Canvas height in pixels
    pub height: Option<i32>,
    /// Scale calibration
    pub pixels_per_meter: Option<f64>,
}

/// A plan with everything drawn on it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanDetail {
    /// The plan
    #[serde(flatten)]
    pub plan: Plan,
    /// Spaces on the plan
    pub spaces: Vec<Space>,
    /// Zones on the plan
    pub zones: Vec<Zone>,
}

/// Partial geometry update.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeometryPatch {
    /// Shape primitive
    pub kind: Option<ShapeKind>,
    /// Left edge
    pub x: Option<f64>,
    /// Top edge
    pub y: Option<f64>,
    /// Width
    pub width: Option<f64>,
    /// Height
    pub height: Option<f64>,
    /// Rotation in degrees
    pub rotation: Option<f64>,
    /// Fill colour
    pub color: Option<String>,
}

impl GeometryPatch {
    fn apply(self, geometry: &mut Geometry) {
        if let Some(kind) = self.kind {
            geometry.kind = kind;
        }
        if let Some(x) = self.x {
            geometry.x = x;
        }
        if let Some(y) = self.y {
            geometry.y = y;
        }
        if let Some(width) = self.width {
            geometry.width = width;
        }
        if let Some(height) = self.height {
            geometry.height = height;
        }
        if let Some(rotation) = self.rotation {
            geometry.rotation = rotation;
        }
        if let Some(color) = self.color {
            geometry.color = color;
        }
    }
}

/// Fields of a new space.
#[derive(Clone, Debug, Deserialize)]
pub struct NewSpace {
    /// Owning plan
    #[serde(rename = "plano_id")]
    pub plan_id: PlanId,
    /// Grouping zone
    #[serde(default)]
    pub zone_id: Option<ZoneId>,
    /// Display name
    pub name: String,
    /// Shape
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Indicative price
    #[serde(default)]
    pub price: Option<f64>,
    /// Open for reservation
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial space update. Availability changes go through
/// [`Registry::set_space_status`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpacePatch {
    /// Display name
    pub name: Option<String>,
    /// Move into this zone
    pub zone_id: Option<ZoneId>,
    /// Shape changes
    #[serde(flatten)]
    pub geometry: GeometryPatch,
    /// Indicative price
    pub price: Option<f64>,
}

/// Fields of a new zone.
#[derive(Clone, Debug, Deserialize)]
pub struct NewZone {
    /// Owning plan
    #[serde(rename = "plano_id")]
    pub plan_id: PlanId,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Shape
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Indicative price
    #[serde(default)]
    pub price: Option<f64>,
    /// Shown on the plan
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Partial zone update.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ZonePatch {
    /// Display name
    pub name: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Shape changes
    #[serde(flatten)]
    pub geometry: GeometryPatch,
    /// Indicative price
    pub price: Option<f64>,
    /// Shown on the plan
    pub active: Option<bool>,
}

/// Profile fields supplied by the user. Absent fields are kept, blank ones
/// cleared.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileFields {
    /// Contact email
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// `LinkedIn` profile
    pub linkedin: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Position
    pub position: Option<String>,
    /// Notes
    pub notes: Option<String>,
}

/// Space and its occupant after a status change.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpaceState {
    /// The space
    pub space: Space,
    /// Active reservation, if any
    pub reservation: Option<ReservationView>,
}

/// Registry of floor-plan records.
#[derive(Clone)]
pub struct Registry {
    service: ReservationService,
}

impl Registry {
    /// Registry sharing collaborators with `service`.
    #[must_use]
    pub const fn new(service: ReservationService) -> Self {
        Self { service }
    }

    fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        self.service.gateway()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Events, optionally only visible ones.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_events(&self, visible_only: bool) -> Result<Vec<Event>, ReservationError> {
        Ok(self.gateway().events(visible_only).await?)
    }

    /// One event.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_event(&self, id: EventId) -> Result<Event, ReservationError> {
        self.gateway()
            .event(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Event", id))
    }

    /// Create an event.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name or an inverted reservation window.
    pub async fn create_event(&self, input: NewEvent) -> Result<Event, ReservationError> {
        let now = self.service.now();
        let event = Event {
            id: EventId::new(),
            name: required(&input.name, "name")?,
            reservable_from: input.reservable_from,
            reservable_until: input.reservable_until,
            visible: input.visible,
            created_at: now,
            updated_at: now,
        };
        event.validate().map_err(ReservationError::Validation)?;

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_event(event.clone()).await?;
                Ok(event)
            })
        })
        .await
    }

    /// Update an event.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` for a blank name or inverted window.
    pub async fn update_event(
        &self,
        id: EventId,
        patch: EventPatch,
    ) -> Result<Event, ReservationError> {
        let mut event = self.get_event(id).await?;
        if let Some(name) = patch.name {
            event.name = required(&name, "name")?;
        }
        if patch.reservable_from.is_some() {
            event.reservable_from = patch.reservable_from;
        }
        if patch.reservable_until.is_some() {
            event.reservable_until = patch.reservable_until;
        }
        if let Some(visible) = patch.visible {
            event.visible = visible;
        }
        event.updated_at = self.service.now();
        event.validate().map_err(ReservationError::Validation)?;

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_event(event.clone()).await?;
                Ok(event)
            })
        })
        .await
    }

    /// Delete an event with its plans, spaces, zones and reservations.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn delete_event(&self, id: EventId) -> Result<(), ReservationError> {
        self.write(|uow, _| {
            Box::pin(async move {
                found(uow.delete_event(id).await?, "Event", id)
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // Plans
    // ------------------------------------------------------------------

    /// Plans, optionally of one event.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_plans(
        &self,
        event_id: Option<EventId>,
    ) -> Result<Vec<Plan>, ReservationError> {
        Ok(self.gateway().plans(event_id).await?)
    }

    /// One plan with its spaces and zones.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_plan(&self, id: PlanId) -> Result<PlanDetail, ReservationError> {
        let plan = self.plan(id).await?;
        let spaces = self.gateway().spaces(id).await?;
        let zones = self.gateway().zones(id).await?;
        Ok(PlanDetail {
            plan,
            spaces,
            zones,
        })
    }

    /// Create a plan.
    ///
    /// # Errors
    ///
    /// `Validation` for blank fields, non-positive dimensions or an unknown
    /// event.
    pub async fn create_plan(&self, input: NewPlan) -> Result<Plan, ReservationError> {
        let now = self.service.now();
        let plan = Plan {
            id: PlanId::new(),
            event_id: input.event_id,
            name: required(&input.name, "name")?,
            url: required(&input.url, "url")?,
            width: input.width,
            height: input.height,
            pixels_per_meter: input.pixels_per_meter,
            created_at: now,
            updated_at: now,
        };
        validate_plan(&plan)?;

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_plan(plan.clone()).await?;
                Ok(plan)
            })
        })
        .await
    }

    /// Update plan metadata.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` as for [`Registry::create_plan`].
    pub async fn update_plan(&self, id: PlanId, patch: PlanPatch) -> Result<Plan, ReservationError> {
        let mut plan = self.plan(id).await?;
        if let Some(name) = patch.name {
            plan.name = required(&name, "name")?;
        }
        if let Some(url) = patch.url {
            plan.url = required(&url, "url")?;
        }
        plan.width = patch.width.unwrap_or(plan.width);
        plan.height = patch.height.unwrap_or(plan.height);
        if patch.pixels_per_meter.is_some() {
            plan.pixels_per_meter = patch.pixels_per_meter;
        }
        plan.updated_at = self.service.now();
        validate_plan(&plan)?;

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_plan(plan.clone()).await?;
                Ok(plan)
            })
        })
        .await
    }

    /// Delete a plan with its spaces, zones and reservations.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn delete_plan(&self, id: PlanId) -> Result<(), ReservationError> {
        self.write(|uow, _| {
            Box::pin(async move {
                found(uow.delete_plan(id).await?, "Plan", id)
            })
        })
        .await
    }

    async fn plan(&self, id: PlanId) -> Result<Plan, ReservationError> {
        self.gateway()
            .plan(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Plan", id))
    }

    // ------------------------------------------------------------------
    // Spaces
    // ------------------------------------------------------------------

    /// Spaces of a plan.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_spaces(&self, plan_id: PlanId) -> Result<Vec<Space>, ReservationError> {
        Ok(self.gateway().spaces(plan_id).await?)
    }

    /// One space.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_space(&self, id: SpaceId) -> Result<Space, ReservationError> {
        self.gateway()
            .space(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Space", id))
    }

    /// Create a space.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, bad geometry, an unknown plan or a zone
    /// of another plan.
    pub async fn create_space(&self, input: NewSpace) -> Result<Space, ReservationError> {
        input
            .geometry
            .validate()
            .map_err(ReservationError::Validation)?;
        self.check_zone(input.zone_id, input.plan_id).await?;

        let now = self.service.now();
        let space = Space {
            id: SpaceId::new(),
            plan_id: input.plan_id,
            zone_id: input.zone_id,
            name: required(&input.name, "name")?,
            geometry: input.geometry,
            price: input.price,
            active: input.active,
            created_at: now,
            updated_at: now,
        };

        self.write(|uow, outbox| {
            Box::pin(async move {
                uow.save_space(space.clone()).await?;
                outbox.space(space.clone());
                Ok(space)
            })
        })
        .await
    }

    /// Update a space's name, zone, geometry or price.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` as for [`Registry::create_space`].
    pub async fn update_space(
        &self,
        id: SpaceId,
        patch: SpacePatch,
    ) -> Result<Space, ReservationError> {
        let current = self.get_space(id).await?;
        self.check_zone(patch.zone_id, current.plan_id).await?;
        let name = patch
            .name
            .as_deref()
            .map(|name| required(name, "name"))
            .transpose()?;
        let now = self.service.now();

        self.write(|uow, outbox| {
            Box::pin(async move {
                let mut space = uow
                    .lock_space(id)
                    .await?
                    .ok_or_else(|| ReservationError::not_found("Space", id))?;
                if let Some(name) = name {
                    space.name = name;
                }
                if patch.zone_id.is_some() {
                    space.zone_id = patch.zone_id;
                }
                if patch.price.is_some() {
                    space.price = patch.price;
                }
                patch.geometry.apply(&mut space.geometry);
                space
                    .geometry
                    .validate()
                    .map_err(ReservationError::Validation)?;
                space.updated_at = now;

                uow.save_space(space.clone()).await?;
                outbox.space(space.clone());
                Ok(space)
            })
        })
        .await
    }

    /// Delete a space.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Conflict` while a reservation occupies it.
    pub async fn delete_space(&self, id: SpaceId) -> Result<(), ReservationError> {
        self.write(|uow, _| {
            Box::pin(async move {
                uow.lock_space(id)
                    .await?
                    .ok_or_else(|| ReservationError::not_found("Space", id))?;
                if uow.active_reservation(id).await?.is_some() {
                    return Err(ReservationError::Conflict(ConflictKind::Active));
                }
                found(uow.delete_space(id).await?, "Space", id)
            })
        })
        .await
    }

    /// Drive a space to a coarse status.
    ///
    /// | status | effect |
    /// |---|---|
    /// | `AVAILABLE` | cancel the occupant, open the space |
    /// | `BLOCKED` | cancel the occupant, block the space |
    /// | `PENDING` | hold for `actor` unless already PENDING |
    /// | `RESERVED` | create and/or confirm, or deny a cancellation request |
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown space, `Validation` when holding a blocked
    /// space, `Conflict` when asking PENDING of a confirmed space.
    pub async fn set_space_status(
        &self,
        id: SpaceId,
        status: SpaceStatus,
        actor: Option<UserId>,
        asignee: &str,
    ) -> Result<SpaceState, ReservationError> {
        let service = self.service.clone();
        let asignee = asignee.to_string();
        let state = self
            .write(|uow, outbox| {
                Box::pin(async move {
                    let space = uow
                        .lock_space(id)
                        .await?
                        .ok_or_else(|| ReservationError::not_found("Space", id))?;
                    let occupant = uow.active_reservation(id).await?;

                    let reservation = match status {
                        SpaceStatus::Available | SpaceStatus::Blocked => {
                            if let Some(occupant) = occupant {
                                release(&service, uow, outbox, &occupant).await?;
                            }
                            let active = status == SpaceStatus::Available;
                            if space.active != active {
                                let space = Space {
                                    active,
                                    updated_at: service.now(),
                                    ..space
                                };
                                uow.save_space(space).await?;
                            }
                            None
                        }
                        SpaceStatus::Pending => {
                            require_open(&space)?;
                            match occupant {
                                None => Some(
                                    service
                                        .create_in(uow, outbox, id, actor, &asignee)
                                        .await?,
                                ),
                                Some(r) if r.state == ReservationState::Pending => Some(r),
                                Some(_) => {
                                    return Err(ReservationError::Conflict(ConflictKind::Reserved));
                                }
                            }
                        }
                        SpaceStatus::Reserved => {
                            require_open(&space)?;
                            let reservation = match occupant {
                                None => {
                                    let created = service
                                        .create_in(uow, outbox, id, actor, &asignee)
                                        .await?;
                                    service.confirm_in(uow, outbox, created.id).await?.0
                                }
                                Some(r) => match r.state {
                                    ReservationState::Pending => {
                                        service.confirm_in(uow, outbox, r.id).await?.0
                                    }
                                    ReservationState::CancellationRequested => {
                                        let action = ReservationAction::DenyCancellation {
                                            reservation_id: r.id,
                                        };
                                        service.transition_in(uow, outbox, action).await?
                                    }
                                    _ => r,
                                },
                            };
                            Some(reservation)
                        }
                    };

                    let space = uow
                        .space(id)
                        .await?
                        .ok_or_else(|| ReservationError::not_found("Space", id))?;
                    outbox.space(space.clone());
                    let reservation = match reservation {
                        Some(r) => Some(service.view_in(uow, r).await?),
                        None => None,
                    };
                    Ok(SpaceState { space, reservation })
                })
            })
            .await?;

        tracing::info!(
            space_id = %id,
            status = ?status,
            reservation_id = ?state.reservation.as_ref().map(|r| r.reservation.id),
            "Space status set"
        );
        Ok(state)
    }

    async fn check_zone(
        &self,
        zone_id: Option<ZoneId>,
        plan_id: PlanId,
    ) -> Result<(), ReservationError> {
        let Some(zone_id) = zone_id else {
            return Ok(());
        };
        let zone = self.get_zone(zone_id).await?;
        if zone.plan_id == plan_id {
            Ok(())
        } else {
            Err(ReservationError::Validation(format!(
                "zone {zone_id} belongs to another plan"
            )))
        }
    }

    // ------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------

    /// Zones of a plan.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn list_zones(&self, plan_id: PlanId) -> Result<Vec<Zone>, ReservationError> {
        Ok(self.gateway().zones(plan_id).await?)
    }

    /// One zone.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_zone(&self, id: ZoneId) -> Result<Zone, ReservationError> {
        self.gateway()
            .zone(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Zone", id))
    }

    /// Create a zone.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank name, bad geometry or an unknown plan.
    pub async fn create_zone(&self, input: NewZone) -> Result<Zone, ReservationError> {
        input
            .geometry
            .validate()
            .map_err(ReservationError::Validation)?;
        let now = self.service.now();
        let zone = Zone {
            id: ZoneId::new(),
            plan_id: input.plan_id,
            name: required(&input.name, "name")?,
            description: input.description,
            geometry: input.geometry,
            price: input.price,
            active: input.active,
            created_at: now,
            updated_at: now,
        };

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_zone(zone.clone()).await?;
                Ok(zone)
            })
        })
        .await
    }

    /// Update a zone.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Validation` as for [`Registry::create_zone`].
    pub async fn update_zone(&self, id: ZoneId, patch: ZonePatch) -> Result<Zone, ReservationError> {
        let mut zone = self.get_zone(id).await?;
        if let Some(name) = patch.name {
            zone.name = required(&name, "name")?;
        }
        if patch.description.is_some() {
            zone.description = patch.description;
        }
        if patch.price.is_some() {
            zone.price = patch.price;
        }
        zone.active = patch.active.unwrap_or(zone.active);
        patch.geometry.apply(&mut zone.geometry);
        zone.geometry
            .validate()
            .map_err(ReservationError::Validation)?;
        zone.updated_at = self.service.now();

        self.write(|uow, _| {
            Box::pin(async move {
                uow.save_zone(zone.clone()).await?;
                Ok(zone)
            })
        })
        .await
    }

    /// Delete a zone. Its spaces stay on the plan without a zone.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn delete_zone(&self, id: ZoneId) -> Result<(), ReservationError> {
        let zone = self.get_zone(id).await?;
        let detached: Vec<Space> = self
            .gateway()
            .spaces(zone.plan_id)
            .await?
            .into_iter()
            .filter(|space| space.zone_id == Some(id))
            .collect();
        let now = self.service.now();

        self.write(|uow, outbox| {
            Box::pin(async move {
                found(uow.delete_zone(id).await?, "Zone", id)?;
                for space in detached {
                    outbox.space(Space {
                        zone_id: None,
                        updated_at: now,
                        ..space
                    });
                }
                Ok(())
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// A user's profile.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user never saved one.
    pub async fn profile(&self, user_id: &UserId) -> Result<UserProfile, ReservationError> {
        self.gateway()
            .profile(user_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Profile", user_id))
    }

    /// Whether the user may reserve: their profile carries an email.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn profile_complete(&self, user_id: &UserId) -> Result<bool, ReservationError> {
        Ok(self
            .gateway()
            .profile(user_id)
            .await?
            .is_some_and(|profile| profile.is_complete()))
    }

    /// Create or update a profile.
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure.
    pub async fn upsert_profile(
        &self,
        user_id: UserId,
        fields: ProfileFields,
    ) -> Result<UserProfile, ReservationError> {
        let now = self.service.now();
        let profile = self
            .write(|uow, _| {
                Box::pin(async move {
                    let mut profile = uow.profile(&user_id).await?.unwrap_or(UserProfile {
                        user_id: user_id.clone(),
                        email: None,
                        phone: None,
                        linkedin: None,
                        company: None,
                        position: None,
                        notes: None,
                        created_at: now,
                        updated_at: now,
                    });
                    merge(&mut profile.email, fields.email);
                    merge(&mut profile.phone, fields.phone);
                    merge(&mut profile.linkedin, fields.linkedin);
                    merge(&mut profile.company, fields.company);
                    merge(&mut profile.position, fields.position);
                    merge(&mut profile.notes, fields.notes);
                    profile.updated_at = now;

                    uow.save_profile(profile.clone()).await?;
                    Ok(profile)
                })
            })
            .await?;

        tracing::debug!(user_id = %profile.user_id, complete = profile.is_complete(), "Profile saved");
        Ok(profile)
    }

    /// Run `body` in a unit of work and broadcast what it queued.
    async fn write<T, F>(&self, body: F) -> Result<T, ReservationError>
    where
        F: for<'u> FnOnce(
            &'u mut dyn UnitOfWork,
            &'u mut Outbox,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, ReservationError>> + Send + 'u>,
        >,
    {
        let mut uow = self.gateway().begin().await?;
        let mut outbox = Outbox::default();
        let result = body(uow.as_mut(), &mut outbox).await;
        self.service.finish(uow, outbox, result).await
    }
}

/// Free the space held by `occupant`.
async fn release(
    service: &ReservationService,
    uow: &mut dyn UnitOfWork,
    outbox: &mut Outbox,
    occupant: &Reservation,
) -> Result<Reservation, ReservationError> {
    let action = if occupant.state == ReservationState::CancellationRequested {
        ReservationAction::ApproveCancellation {
            reservation_id: occupant.id,
        }
    } else {
        ReservationAction::Cancel {
            reservation_id: occupant.id,
            requester: None,
        }
    };
    service.transition_in(uow, outbox, action).await
}

fn require_open(space: &Space) -> Result<(), ReservationError> {
    if space.active {
        Ok(())
    } else {
        Err(ReservationError::Validation(format!(
            "space {} is blocked",
            space.name
        )))
    }
}

fn required(value: &str, field: &str) -> Result<String, ReservationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ReservationError::Validation(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

fn validate_plan(plan: &Plan) -> Result<(), ReservationError> {
    if plan.width > 0 && plan.height > 0 {
        Ok(())
    } else {
        Err(ReservationError::Validation(
            "plan width and height must be positive".to_string(),
        ))
    }
}

fn found(deleted: bool, resource: &'static str, id: impl ToString) -> Result<(), ReservationError> {
    if deleted {
        Ok(())
    } else {
        Err(ReservationError::not_found(resource, id))
    }
}

fn merge(field: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        let value = value.trim();
        *field = (!value.is_empty()).then(|| value.to_string());
    }
}
