//! Core data model of the Barrage ticking client.
//!
//! This crate knows nothing about threads or transports.  It provides:
//!
//! - [`Schema`]: the immutable column layout of a subscribed table.
//! - [`ColumnSource`]: a typed, zero-copy view over one column of a received
//!   frame.
//! - [`RowSequence`]: sorted sets of row keys and row positions.
//! - [`ClientTable`]: an immutable table snapshot.
//! - [`ticking::BarrageProcessor`]: the stateful decoder that turns Barrage
//!   frames into [`ticking::TickingUpdate`]s.
//! - [`callbacks`]: a single-fire callback/future bridge between threads.

pub mod callbacks;
pub mod column;
pub mod element_type;
pub mod rowset;
pub mod schema;
pub mod table;
pub mod ticking;

pub use column::{ColumnError, ColumnSource, Value};
pub use element_type::ElementTypeId;
pub use rowset::{RowSequence, RowSequenceBuilder};
pub use schema::{Schema, SchemaError};
pub use table::ClientTable;
