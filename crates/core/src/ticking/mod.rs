//! Decoding of Barrage ticking streams.
//!
//! A subscription receives a sequence of frames.  Each frame is a record
//! batch plus optional application metadata; the metadata of a message's
//! first frame is an [`UpdateMetadata`] describing which rows were removed,
//! shifted, added and modified.  The [`BarrageProcessor`] reassembles frames
//! into logical messages and applies them to the table state it retains,
//! producing one [`TickingUpdate`] per message.

mod error;
pub mod metadata;
mod processor;
mod update;


pub use error::ProtocolError;
pub use metadata::{SubscriptionRequest, UpdateMetadata, BARRAGE_MAGIC};
pub use processor::BarrageProcessor;
pub use update::{TickingUpdate, UpdateKind};
