use crate::column::ColumnError;
use crate::element_type::ElementTypeId;
use crate::table::TableError;
use arrow::error::ArrowError;
use bytes::TryGetError;
use thiserror::Error;

/// The server sent something the decoder cannot interpret.
///
/// Protocol violations are unrecoverable: the decoder's retained state is no
/// longer trustworthy and the subscription must end.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("received a frame without metadata while no message was in progress")]
    MissingMetadata,

    #[error("received new message metadata before the previous message was complete")]
    UnexpectedMetadata,

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unexpected message type {0}")]
    UnexpectedMessageType(u8),

    #[error("truncated metadata: needed {requested} more bytes, {available} available")]
    Truncated { requested: usize, available: usize },

    #[error("{0} trailing bytes after metadata")]
    TrailingBytes(usize),

    #[error("malformed row set: {0}")]
    MalformedRowSet(String),

    #[error("shift ranges are malformed or reorder rows")]
    InvalidShifts,

    #[error("frame has {actual} columns, the schema has {expected}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("metadata describes modifications of {actual} columns, the schema has {expected}")]
    ModifiedColumnCountMismatch { expected: usize, actual: usize },

    #[error("frame column {column} has type {actual}, the schema says {expected}")]
    ColumnTypeMismatch {
        column: usize,
        expected: ElementTypeId,
        actual: ElementTypeId,
    },

    #[error("frame column {column} declares {size} rows but holds {len}")]
    SizeMismatch { column: usize, size: usize, len: usize },

    #[error("add frame columns have different sizes")]
    UnevenAddColumns,

    #[error("column {column} received {received} rows, the message declared {declared}")]
    TooManyRows {
        column: usize,
        declared: u64,
        received: u64,
    },

    #[error("removed row key is not in the current row set")]
    RemovedRowNotFound,

    #[error("added row key is already in the row set")]
    AddedRowExists,

    #[error("modified row key in column {column} is not in the row set")]
    ModifiedRowNotFound { column: usize },

    #[error(transparent)]
    Column(#[from] ColumnError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("error assembling column data: {0}")]
    Arrow(#[from] ArrowError),
}

impl From<TryGetError> for ProtocolError {
    fn from(error: TryGetError) -> Self {
        ProtocolError::Truncated {
            requested: error.requested,
            available: error.available,
        }
    }
}
