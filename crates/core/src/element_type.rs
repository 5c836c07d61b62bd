use arrow::datatypes::{DataType, TimeUnit};
use std::fmt::{self, Display, Formatter};

/// Type of the elements of one column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementTypeId {
    /// A UTF-16 code unit.
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Bool,
    String,
    /// Nanoseconds since the Unix epoch, UTC.
    Timestamp,
}

impl ElementTypeId {
    pub const ALL: [ElementTypeId; 10] = [
        ElementTypeId::Char,
        ElementTypeId::Int8,
        ElementTypeId::Int16,
        ElementTypeId::Int32,
        ElementTypeId::Int64,
        ElementTypeId::Float,
        ElementTypeId::Double,
        ElementTypeId::Bool,
        ElementTypeId::String,
        ElementTypeId::Timestamp,
    ];

    /// The Arrow type that carries values of this element type.
    pub fn data_type(self) -> DataType {
        match self {
            ElementTypeId::Char => DataType::UInt16,
            ElementTypeId::Int8 => DataType::Int8,
            ElementTypeId::Int16 => DataType::Int16,
            ElementTypeId::Int32 => DataType::Int32,
            ElementTypeId::Int64 => DataType::Int64,
            ElementTypeId::Float => DataType::Float32,
            ElementTypeId::Double => DataType::Float64,
            ElementTypeId::Bool => DataType::Boolean,
            ElementTypeId::String => DataType::Utf8,
            ElementTypeId::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }

    /// Maps an Arrow type to an element type.  Timestamps are accepted with
    /// any timezone annotation.
    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        let element_type = match data_type {
            DataType::UInt16 => ElementTypeId::Char,
            DataType::Int8 => ElementTypeId::Int8,
            DataType::Int16 => ElementTypeId::Int16,
            DataType::Int32 => ElementTypeId::Int32,
            DataType::Int64 => ElementTypeId::Int64,
            DataType::Float32 => ElementTypeId::Float,
            DataType::Float64 => ElementTypeId::Double,
            DataType::Boolean => ElementTypeId::Bool,
            DataType::Utf8 => ElementTypeId::String,
            DataType::Timestamp(TimeUnit::Nanosecond, _) => ElementTypeId::Timestamp,
            _ => return None,
        };
        Some(element_type)
    }
}

impl Display for ElementTypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementTypeId::Char => "char",
            ElementTypeId::Int8 => "int8",
            ElementTypeId::Int16 => "int16",
            ElementTypeId::Int32 => "int32",
            ElementTypeId::Int64 => "int64",
            ElementTypeId::Float => "float",
            ElementTypeId::Double => "double",
            ElementTypeId::Bool => "bool",
            ElementTypeId::String => "string",
            ElementTypeId::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}
