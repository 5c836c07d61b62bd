use anyhow::Error as AnyError;
use barrage_core::callbacks::CallbackError;
use barrage_core::ticking::ProtocolError;
use barrage_types::ConfigError;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("executor has shut down")]
    Shutdown,

    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[source] IoError),
}

/// Failure to construct a [`Client`](crate::Client).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Failure to establish a subscription.  Reported synchronously to the
/// caller of `subscribe`; the ticking callback is never invoked.
#[derive(Error, Debug)]
pub enum SubscribeError {
    #[error("subscription setup failed: {0:#}")]
    Setup(AnyError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Setup was abandoned before it reported a result, e.g. because the
    /// client shut down.
    #[error("subscription setup was cancelled")]
    Cancelled,
}

impl From<CallbackError> for SubscribeError {
    fn from(error: CallbackError) -> Self {
        match error {
            CallbackError::Abandoned => SubscribeError::Cancelled,
            CallbackError::AlreadyFulfilled => SubscribeError::Setup(AnyError::new(error)),
        }
    }
}

/// Abnormal termination of an established subscription, delivered through
/// [`TickingCallback::on_failure`](crate::TickingCallback::on_failure).
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolError),

    #[error("transport error: {0:#}")]
    Transport(AnyError),

    #[error("server closed the stream")]
    StreamClosed,

    #[error("ticking callback panicked: {0}")]
    CallbackPanicked(String),

    /// The subscription was cancelled.  Never passed to `on_failure` after a
    /// caller-initiated cancel.
    #[error("subscription was cancelled")]
    Cancelled,
}
