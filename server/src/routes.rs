//! Router configuration for the Standbook server.
//!
//! Builds the complete Axum router with all endpoints.

use crate::api::{events, plans, profiles, reservations, spaces, zones};
use crate::state::AppState;
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use standbook_web::propagate_correlation_id;
use standbook_web::handlers::{health_check, metrics, readiness, websocket};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready`, `/metrics` (no authentication)
/// - `/ws` realtime channel
/// - reservation, catalogue and profile endpoints under `/api`
///
/// `cors_origins` lists the allowed browser origins; empty allows any.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let api_routes = Router::new()
        // Reservations
        .route("/reservations", post(reservations::create_reservation))
        .route("/reservations/mine", get(reservations::my_reservations))
        .route("/reservations/pending", get(reservations::pending_reservations))
        .route(
            "/reservations/cancellation-requests",
            get(reservations::cancellation_requests),
        )
        .route(
            "/reservations/:id",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route("/reservations/:id/status", get(reservations::reservation_status))
        .route("/reservations/:id/hold", post(reservations::refresh_hold))
        .route(
            "/reservations/:id/request-cancellation",
            post(reservations::request_cancellation),
        )
        .route("/reservations/:id/confirm", post(reservations::confirm_reservation))
        .route("/reservations/:id/reject", post(reservations::reject_reservation))
        .route(
            "/reservations/:id/approve-cancellation",
            post(reservations::approve_cancellation),
        )
        .route(
            "/reservations/:id/deny-cancellation",
            post(reservations::deny_cancellation),
        )
        // Events
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        // Plans
        .route("/plans", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/plans/:id",
            get(plans::get_plan)
                .patch(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/plans/:id/spaces", get(spaces::list_spaces))
        .route("/plans/:id/zones", get(zones::list_zones))
        // Spaces
        .route("/spaces", post(spaces::create_space))
        .route(
            "/spaces/:id",
            get(spaces::get_space)
                .patch(spaces::update_space)
                .delete(spaces::delete_space),
        )
        .route("/spaces/:id/status", put(spaces::set_space_status))
        .route("/spaces/:id/reservations", get(reservations::space_reservations))
        .route(
            "/spaces/:id/reservations/active",
            get(reservations::active_space_reservation),
        )
        // Zones
        .route("/zones", post(zones::create_zone))
        .route(
            "/zones/:id",
            get(zones::get_zone)
                .patch(zones::update_zone)
                .delete(zones::delete_zone),
        )
        // Profiles
        .route(
            "/profiles/me",
            get(profiles::my_profile).put(profiles::update_my_profile),
        )
        .route("/profiles/me/complete", get(profiles::my_profile_complete))
        .route("/profiles/:user_id", get(profiles::get_profile));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/ws", get(websocket::handle))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(propagate_correlation_id))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
