//! Public types shared by the Barrage ticking client crates.
//!
//! Everything in this crate is plain data: configuration structures that can
//! be deserialized from YAML or JSON, and the [`Ticket`] that names a table on
//! the server.

pub mod config;
pub mod ticket;

pub use config::{ClientConfig, ConfigError, SubscriptionOptions};
pub use ticket::Ticket;
