//! In-memory implementations of the collaborator traits.
//!
//! They honour the same contracts as the production adapters (serialized
//! units of work, single active reservation per space, lapse notifications)
//! and add switches for injecting failures.

mod auth;
mod expiry;
mod gateway;

pub use auth::StaticAuthenticator;
pub use expiry::InMemoryExpiryStore;
pub use gateway::InMemoryGateway;
