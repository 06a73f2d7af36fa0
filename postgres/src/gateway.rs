//! [`PersistenceGateway`] over a `PostgreSQL` pool.

use crate::error::store_error;
use crate::rows::{
    self, EVENT_COLUMNS, PLAN_COLUMNS, PROFILE_COLUMNS, RESERVATION_COLUMNS, SPACE_COLUMNS,
    ZONE_COLUMNS,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use standbook_core::gateway::{
    GatewayFuture, PersistenceGateway, ReservationFilter, StoreError, UnitOfWork,
};
use standbook_core::{
    Event, EventId, Plan, PlanId, Reservation, ReservationId, ReservationState, Space, SpaceId,
    UserId, UserProfile, Zone, ZoneId,
};
use std::time::Duration;

fn active_states() -> Vec<String> {
    ReservationState::ACTIVE
        .iter()
        .map(|state| state.as_str().to_string())
        .collect()
}

/// PostgreSQL-backed gateway.
///
/// Units of work are database transactions. `lock_space` and
/// `lock_reservation` take `FOR UPDATE` row locks, and a partial unique index
/// on `reservations(space_id)` rejects a second active reservation even if a
/// caller skipped the lock.
///
/// # Example
///
/// ```no_run
/// use standbook_postgres::PostgresGateway;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = PostgresGateway::connect(
///     "postgres://localhost/standbook",
///     10,
///     Duration::from_secs(5),
/// )
/// .await?;
/// gateway.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    /// Gateway over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached
    /// within `acquire_timeout`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PersistenceGateway for PostgresGateway {
    fn begin(&self) -> GatewayFuture<'_, Box<dyn UnitOfWork>> {
        Box::pin(async move {
            let tx = self.pool.begin().await.map_err(store_error)?;
            Ok(Box::new(PostgresUnitOfWork { tx }) as Box<dyn UnitOfWork>)
        })
    }

    fn ping(&self) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(store_error)?;
            Ok(())
        })
    }

    fn reservation(&self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>> {
        Box::pin(async move {
            let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::reservation)
                .transpose()
        })
    }

    fn reservations(&self, filter: ReservationFilter) -> GatewayFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            let mut query = QueryBuilder::<Postgres>::new(format!(
                "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE TRUE"
            ));
            if let Some(space_id) = filter.space_id {
                query.push(" AND space_id = ").push_bind(*space_id.as_uuid());
            }
            if let Some(user_id) = filter.user_id {
                query
                    .push(" AND user_id = ")
                    .push_bind(user_id.as_str().to_string());
            }
            if !filter.states.is_empty() {
                let states: Vec<String> = filter
                    .states
                    .iter()
                    .map(|state| state.as_str().to_string())
                    .collect();
                query.push(" AND state = ANY(").push_bind(states).push(")");
            }
            if let Some(cutoff) = filter.expires_before {
                query.push(" AND expires_at < ").push_bind(cutoff);
            }
            query.push(" ORDER BY created_at, id");

            let found = query
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
            rows::all(&found, rows::reservation)
        })
    }

    fn space(&self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        Box::pin(async move {
            let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::space)
                .transpose()
        })
    }

    fn spaces(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Space>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {SPACE_COLUMNS} FROM spaces WHERE plan_id = $1 ORDER BY created_at, id"
            );
            let found = sqlx::query(&sql)
                .bind(*plan_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
            rows::all(&found, rows::space)
        })
    }

    fn zone(&self, id: ZoneId) -> GatewayFuture<'_, Option<Zone>> {
        Box::pin(async move {
            let sql = format!("SELECT {ZONE_COLUMNS} FROM zones WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::zone)
                .transpose()
        })
    }

    fn zones(&self, plan_id: PlanId) -> GatewayFuture<'_, Vec<Zone>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {ZONE_COLUMNS} FROM zones WHERE plan_id = $1 ORDER BY created_at, id"
            );
            let found = sqlx::query(&sql)
                .bind(*plan_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
            rows::all(&found, rows::zone)
        })
    }

    fn plan(&self, id: PlanId) -> GatewayFuture<'_, Option<Plan>> {
        Box::pin(async move {
            let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::plan)
                .transpose()
        })
    }

    fn plans(&self, event_id: Option<EventId>) -> GatewayFuture<'_, Vec<Plan>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {PLAN_COLUMNS} FROM plans \
                 WHERE $1::uuid IS NULL OR event_id = $1 ORDER BY created_at, id"
            );
            let found = sqlx::query(&sql)
                .bind(event_id.map(|id| *id.as_uuid()))
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
            rows::all(&found, rows::plan)
        })
    }

    fn event(&self, id: EventId) -> GatewayFuture<'_, Option<Event>> {
        Box::pin(async move {
            let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::event)
                .transpose()
        })
    }

    fn events(&self, visible_only: bool) -> GatewayFuture<'_, Vec<Event>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM events \
                 WHERE visible OR NOT $1 ORDER BY created_at, id"
            );
            let found = sqlx::query(&sql)
                .bind(visible_only)
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;
            rows::all(&found, rows::event)
        })
    }

    fn profile<'a>(&'a self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>> {
        Box::pin(async move {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1");
            sqlx::query(&sql)
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::profile)
                .transpose()
        })
    }
}

/// One database transaction.
///
/// Dropping it without commit rolls the transaction back.
struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    async fn affected(&mut self, sql: &str, id: uuid::Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() > 0)
    }
}

impl UnitOfWork for PostgresUnitOfWork {
    fn lock_space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        Box::pin(async move {
            let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1 FOR UPDATE");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::space)
                .transpose()
        })
    }

    fn space(&mut self, id: SpaceId) -> GatewayFuture<'_, Option<Space>> {
        Box::pin(async move {
            let sql = format!("SELECT {SPACE_COLUMNS} FROM spaces WHERE id = $1");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::space)
                .transpose()
        })
    }

    fn lock_reservation(&mut self, id: ReservationId) -> GatewayFuture<'_, Option<Reservation>> {
        Box::pin(async move {
            let sql =
                format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE");
            sqlx::query(&sql)
                .bind(*id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::reservation)
                .transpose()
        })
    }

    fn active_reservation(&mut self, space_id: SpaceId) -> GatewayFuture<'_, Option<Reservation>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {RESERVATION_COLUMNS} FROM reservations \
                 WHERE space_id = $1 AND state = ANY($2)"
            );
            sqlx::query(&sql)
                .bind(*space_id.as_uuid())
                .bind(active_states())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::reservation)
                .transpose()
        })
    }

    fn profile<'a>(&'a mut self, user_id: &'a UserId) -> GatewayFuture<'a, Option<UserProfile>> {
        Box::pin(async move {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE user_id = $1");
            sqlx::query(&sql)
                .bind(user_id.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(store_error)?
                .as_ref()
                .map(rows::profile)
                .transpose()
        })
    }

    fn insert_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO reservations
                    (id, space_id, user_id, asignee, state, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(*reservation.id.as_uuid())
            .bind(*reservation.space_id.as_uuid())
            .bind(reservation.user_id.as_ref().map(UserId::as_str))
            .bind(&reservation.asignee)
            .bind(reservation.state.as_str())
            .bind(reservation.expires_at)
            .bind(reservation.created_at)
            .bind(reservation.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn update_reservation(&mut self, reservation: Reservation) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE reservations
                SET asignee = $2, state = $3, expires_at = $4, updated_at = $5
                WHERE id = $1
                ",
            )
            .bind(*reservation.id.as_uuid())
            .bind(&reservation.asignee)
            .bind(reservation.state.as_str())
            .bind(reservation.expires_at)
            .bind(reservation.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Database(format!(
                    "reservation {} does not exist",
                    reservation.id
                )));
            }
            Ok(())
        })
    }

    fn save_space(&mut self, space: Space) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO spaces (id, plan_id, zone_id, name, kind, x, y, width, height,
                                    rotation, color, price, active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO UPDATE SET
                    zone_id = EXCLUDED.zone_id,
                    name = EXCLUDED.name,
                    kind = EXCLUDED.kind,
                    x = EXCLUDED.x,
                    y = EXCLUDED.y,
                    width = EXCLUDED.width,
                    height = EXCLUDED.height,
                    rotation = EXCLUDED.rotation,
                    color = EXCLUDED.color,
                    price = EXCLUDED.price,
                    active = EXCLUDED.active,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(*space.id.as_uuid())
            .bind(*space.plan_id.as_uuid())
            .bind(space.zone_id.map(|id| *id.as_uuid()))
            .bind(&space.name)
            .bind(space.geometry.kind.as_str())
            .bind(space.geometry.x)
            .bind(space.geometry.y)
            .bind(space.geometry.width)
            .bind(space.geometry.height)
            .bind(space.geometry.rotation)
            .bind(&space.geometry.color)
            .bind(space.price)
            .bind(space.active)
            .bind(space.created_at)
            .bind(space.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn delete_space(&mut self, id: SpaceId) -> GatewayFuture<'_, bool> {
        Box::pin(async move {
            self.affected("DELETE FROM spaces WHERE id = $1", *id.as_uuid())
                .await
        })
    }

    fn save_zone(&mut self, zone: Zone) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO zones (id, plan_id, name, description, kind, x, y, width, height,
                                   rotation, color, price, active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    description = EXCLUDED.description,
                    kind = EXCLUDED.kind,
                    x = EXCLUDED.x,
                    y = EXCLUDED.y,
                    width = EXCLUDED.width,
                    height = EXCLUDED.height,
                    rotation = EXCLUDED.rotation,
                    color = EXCLUDED.color,
                    price = EXCLUDED.price,
                    active = EXCLUDED.active,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(*zone.id.as_uuid())
            .bind(*zone.plan_id.as_uuid())
            .bind(&zone.name)
            .bind(zone.description.as_deref())
            .bind(zone.geometry.kind.as_str())
            .bind(zone.geometry.x)
            .bind(zone.geometry.y)
            .bind(zone.geometry.width)
            .bind(zone.geometry.height)
            .bind(zone.geometry.rotation)
            .bind(&zone.geometry.color)
            .bind(zone.price)
            .bind(zone.active)
            .bind(zone.created_at)
            .bind(zone.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn delete_zone(&mut self, id: ZoneId) -> GatewayFuture<'_, bool> {
        // Spaces of the zone are detached by ON DELETE SET NULL.
        Box::pin(async move {
            self.affected("DELETE FROM zones WHERE id = $1", *id.as_uuid())
                .await
        })
    }

    fn save_plan(&mut self, plan: Plan) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO plans (id, event_id, name, url, width, height, pixels_per_meter,
                                   created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO UPDATE SET
                    event_id = EXCLUDED.event_id,
                    name = EXCLUDED.name,
                    url = EXCLUDED.url,
                    width = EXCLUDED.width,
                    height = EXCLUDED.height,
                    pixels_per_meter = EXCLUDED.pixels_per_meter,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(*plan.id.as_uuid())
            .bind(plan.event_id.map(|id| *id.as_uuid()))
            .bind(&plan.name)
            .bind(&plan.url)
            .bind(plan.width)
            .bind(plan.height)
            .bind(plan.pixels_per_meter)
            .bind(plan.created_at)
            .bind(plan.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn delete_plan(&mut self, id: PlanId) -> GatewayFuture<'_, bool> {
        Box::pin(async move {
            self.affected("DELETE FROM plans WHERE id = $1", *id.as_uuid())
                .await
        })
    }

    fn save_event(&mut self, event: Event) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO events (id, name, reservable_from, reservable_until, visible,
                                    created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    reservable_from = EXCLUDED.reservable_from,
                    reservable_until = EXCLUDED.reservable_until,
                    visible = EXCLUDED.visible,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(*event.id.as_uuid())
            .bind(&event.name)
            .bind(event.reservable_from)
            .bind(event.reservable_until)
            .bind(event.visible)
            .bind(event.created_at)
            .bind(event.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn delete_event(&mut self, id: EventId) -> GatewayFuture<'_, bool> {
        Box::pin(async move {
            self.affected("DELETE FROM events WHERE id = $1", *id.as_uuid())
                .await
        })
    }

    fn save_profile(&mut self, profile: UserProfile) -> GatewayFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO user_profiles (user_id, email, phone, linkedin, company, position,
                                           notes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (user_id) DO UPDATE SET
                    email = EXCLUDED.email,
                    phone = EXCLUDED.phone,
                    linkedin = EXCLUDED.linkedin,
                    company = EXCLUDED.company,
                    position = EXCLUDED.position,
                    notes = EXCLUDED.notes,
                    updated_at = EXCLUDED.updated_at
                ",
            )
            .bind(profile.user_id.as_str())
            .bind(profile.email.as_deref())
            .bind(profile.phone.as_deref())
            .bind(profile.linkedin.as_deref())
            .bind(profile.company.as_deref())
            .bind(profile.position.as_deref())
            .bind(profile.notes.as_deref())
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> GatewayFuture<'static, ()> {
        Box::pin(async move { self.tx.commit().await.map_err(store_error) })
    }

    fn rollback(self: Box<Self>) -> GatewayFuture<'static, ()> {
        Box::pin(async move { self.tx.rollback().await.map_err(store_error) })
    }
}
