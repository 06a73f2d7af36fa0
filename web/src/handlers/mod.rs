//! HTTP request handlers shared by Standbook binaries.

pub mod health;
pub mod websocket;

pub use health::{health_check, metrics, readiness};
