//! `PostgreSQL` persistence for Standbook.
//!
//! Implements the `PersistenceGateway` trait from `standbook-core` with sqlx:
//!
//! - Units of work are database transactions
//! - `FOR UPDATE` row locks serialize commands on one space or reservation
//! - A partial unique index keeps at most one active reservation per space
//! - Schema migrations ship with the crate (`migrations/`)
//!
//! # Example
//!
//! ```ignore
//! use standbook_postgres::PostgresGateway;
//! use std::sync::Arc;
//!
//! let gateway = PostgresGateway::connect(&config.database_url, 10).await?;
//! gateway.migrate().await?;
//! let gateway: Arc<dyn PersistenceGateway> = Arc::new(gateway);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod gateway;
mod rows;

pub use gateway::PostgresGateway;
