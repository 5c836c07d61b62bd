//! Subscriptions to ticking tables served over the Barrage protocol.
//!
//! A [`Client`] opens one Flight exchange per subscription and runs one
//! thread per subscription.  Each thread decodes the frames it receives
//! into [`TickingUpdate`](barrage_core::ticking::TickingUpdate)s and hands
//! them to the subscriber's [`TickingCallback`], in order.  Cancelling a
//! subscription waits for its thread to exit.

mod callback;
mod client;
mod error;
mod executor;
mod server;
mod subscription;
pub mod tokio;
pub mod transport;

#[cfg(test)]
mod test;

pub use callback::{FnTickingCallback, TickingCallback};
pub use client::Client;
pub use error::{ClientError, ExecutorError, SubscribeError, SubscriptionError};
pub use executor::Executor;
pub use server::Server;
pub use subscription::{SubscriptionHandle, SubscriptionThread};
