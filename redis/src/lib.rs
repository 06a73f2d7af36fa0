//! Redis adapters for Standbook.
//!
//! - [`RedisExpiryStore`]: hold markers as keys with a TTL, lapses delivered
//!   through keyspace notifications (`__keyevent@{db}__:expired`)
//! - [`RedisSessionAuthenticator`]: bearer tokens resolved against JSON session
//!   records written by the identity front-end
//!
//! Both share one multiplexed `ConnectionManager`, which reconnects on its own.
//!
//! # Example
//!
//! ```no_run
//! use standbook_redis::RedisExpiryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisExpiryStore::connect("redis://127.0.0.1:6379/0").await?;
//! store.configure_notifications().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod expiry;
mod session;

pub use expiry::RedisExpiryStore;
pub use session::{DEFAULT_SESSION_PREFIX, RedisSessionAuthenticator};
