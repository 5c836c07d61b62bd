//! Client configuration.
//!
//! A [`ClientConfig`] carries the per-call headers attached to every streaming
//! call and the default [`SubscriptionOptions`] sent to the server with each
//! subscription request.  Every field has a default, so an empty YAML or JSON
//! document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Header used to carry [`ClientConfig::authorization`].
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Default value of [`SubscriptionOptions::batch_size`].
pub const fn default_batch_size() -> u32 {
    4096
}

/// Default value of [`SubscriptionOptions::max_message_size`].
pub const fn default_max_message_size() -> u32 {
    100 * 1024 * 1024
}

/// Default value of [`ClientConfig::flight_executor_name`].
fn default_flight_executor_name() -> String {
    "barrage-flight-executor".to_string()
}

/// Invalid client configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'batch_size' must be greater than zero")]
    ZeroBatchSize,

    #[error("'max_message_size' must be greater than zero")]
    ZeroMaxMessageSize,

    #[error("header name '{0}' is empty or contains whitespace")]
    InvalidHeaderName(String),

    #[error("header '{0}' is set both by 'authorization' and 'extra_headers'")]
    ConflictingHeader(String),
}

/// Options the server applies to one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionOptions {
    /// Ask the server to encode nulls with the server's sentinel values
    /// instead of Arrow validity bitmaps.
    pub use_deephaven_nulls: bool,

    /// Minimum interval between two updates, in milliseconds.  Zero lets the
    /// server choose.
    pub min_update_interval_ms: u32,

    /// Maximum number of rows per record batch.
    pub batch_size: u32,

    /// Maximum size of one message, in bytes.
    pub max_message_size: u32,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            use_deephaven_nulls: false,
            min_update_interval_ms: 0,
            batch_size: default_batch_size(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Value of the `authorization` header sent with each call, e.g.
    /// `Bearer <token>`.
    pub authorization: Option<String>,

    /// Additional headers sent with each call.
    pub extra_headers: BTreeMap<String, String>,

    /// Options sent with every subscription request.
    pub subscription: SubscriptionOptions,

    /// Name of the thread that performs subscription setup.
    pub flight_executor_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            authorization: None,
            extra_headers: BTreeMap::new(),
            subscription: SubscriptionOptions::default(),
            flight_executor_name: default_flight_executor_name(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscription.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.subscription.max_message_size == 0 {
            return Err(ConfigError::ZeroMaxMessageSize);
        }
        for name in self.extra_headers.keys() {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidHeaderName(name.clone()));
            }
            if self.authorization.is_some() && name.eq_ignore_ascii_case(AUTHORIZATION_HEADER) {
                return Err(ConfigError::ConflictingHeader(name.clone()));
            }
        }
        Ok(())
    }

    /// Returns the `(name, value)` pairs to attach to each call.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.extra_headers.len() + 1);
        if let Some(authorization) = &self.authorization {
            headers.push((AUTHORIZATION_HEADER.to_string(), authorization.clone()));
        }
        headers.extend(
            self.extra_headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        headers
    }
}
