//! REST API handlers, mounted under `/api`.

pub mod events;
pub mod plans;
pub mod profiles;
pub mod reservations;
pub mod spaces;
pub mod zones;
