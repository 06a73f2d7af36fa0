//! # Standbook Server
//!
//! HTTP application for Standbook: stand reservations on trade-fair floor
//! plans.
//!
//! - **Reservations**: users hold a space, admins confirm or reject; holds
//!   lapse through the expiry store and the reconciliation sweep
//! - **Catalogue**: events, plans, spaces and zones, edited by admins
//! - **Profiles**: a complete profile is required before reserving
//! - **Realtime**: every domain event is pushed to every `/ws` client
//!
//! # Architecture
//!
//! ```text
//!  HTTP / WebSocket ──► standbook-web guards ──► api handlers
//!                                                   │
//!                          ┌────────────────────────┴──────────┐
//!                          ▼                                   ▼
//!                  ReservationService ◄──────────────────── Registry
//!                   │       │      │
//!         PostgresGateway   │   Broadcaster ──► /ws clients
//!                           ▼
//!                  RedisExpiryStore ──lapse──► ExpiryListener
//! ```

pub mod api;
pub mod config;
pub mod hooks;
pub mod routes;
pub mod state;

pub use config::Config;
pub use hooks::SpaceNamingHook;
pub use routes::build_router;
pub use state::AppState;
