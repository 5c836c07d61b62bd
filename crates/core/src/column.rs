//! Typed read-only views over the columns of a received frame.
//!
//! A [`ColumnSource`] wraps a typed Arrow array.  Arrow arrays share their
//! buffers through reference counts, so building a column source from a
//! record batch never copies element data: the record batch's storage stays
//! alive for as long as any column source built from it does.

use crate::element_type::ElementTypeId;
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float32Array, Float64Array, GenericListArray,
    Int16Array, Int32Array, Int64Array, Int8Array, ListArray, OffsetSizeTrait, StringArray,
    TimestampNanosecondArray, UInt16Array,
};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    TimeUnit, TimestampNanosecondType, UInt16Type,
};
use chrono::{DateTime, Utc};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Error converting a frame column into a [`ColumnSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unsupported column type {0}")]
    UnsupportedColumnType(DataType),
}

/// One value read from a [`ColumnSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Char(u16),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(&'a str),
    Timestamp(DateTime<Utc>),
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Char(v) => match char::from_u32(*v as u32) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{v:04x}"),
            },
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

/// A typed, read-only, zero-copy view over one column's values.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    Char(UInt16Array),
    Int8(Int8Array),
    Int16(Int16Array),
    Int32(Int32Array),
    Int64(Int64Array),
    Float(Float32Array),
    Double(Float64Array),
    Bool(BooleanArray),
    String(StringArray),
    Timestamp(TimestampNanosecondArray),
}

impl ColumnSource {
    /// Unwraps the single-element list that carries one column across the
    /// stream and wraps its payload.
    pub fn from_envelope(envelope: &ArrayRef) -> Result<Self, ColumnError> {
        let payload = if let Some(list) = envelope.as_list_opt::<i32>() {
            Self::envelope_payload(list)?
        } else if let Some(list) = envelope.as_list_opt::<i64>() {
            Self::envelope_payload(list)?
        } else {
            return Err(ColumnError::MalformedFrame(format!(
                "expected a list envelope, got {}",
                envelope.data_type()
            )));
        };
        Self::try_from_array(payload)
    }

    fn envelope_payload<O: OffsetSizeTrait>(
        list: &GenericListArray<O>,
    ) -> Result<ArrayRef, ColumnError> {
        if list.len() != 1 {
            return Err(ColumnError::MalformedFrame(format!(
                "expected envelope of length 1, got {}",
                list.len()
            )));
        }
        if list.is_null(0) {
            return Err(ColumnError::MalformedFrame("envelope is null".to_string()));
        }
        Ok(list.value(0))
    }

    /// Wraps an array whose data type is one of the supported element types.
    pub fn try_from_array(array: ArrayRef) -> Result<Self, ColumnError> {
        let column = match array.data_type() {
            DataType::UInt16 => ColumnSource::Char(array.as_primitive::<UInt16Type>().clone()),
            DataType::Int8 => ColumnSource::Int8(array.as_primitive::<Int8Type>().clone()),
            DataType::Int16 => ColumnSource::Int16(array.as_primitive::<Int16Type>().clone()),
            DataType::Int32 => ColumnSource::Int32(array.as_primitive::<Int32Type>().clone()),
            DataType::Int64 => ColumnSource::Int64(array.as_primitive::<Int64Type>().clone()),
            DataType::Float32 => ColumnSource::Float(array.as_primitive::<Float32Type>().clone()),
            DataType::Float64 => ColumnSource::Double(array.as_primitive::<Float64Type>().clone()),
            DataType::Boolean => ColumnSource::Bool(array.as_boolean().clone()),
            DataType::Utf8 => ColumnSource::String(array.as_string::<i32>().clone()),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => ColumnSource::Timestamp(
                array
                    .as_primitive::<TimestampNanosecondType>()
                    .clone()
                    .with_timezone_opt(None::<String>),
            ),
            other => return Err(ColumnError::UnsupportedColumnType(other.clone())),
        };
        Ok(column)
    }

    /// An empty column of the given type.
    pub fn empty(element_type: ElementTypeId) -> Self {
        match element_type {
            ElementTypeId::Char => ColumnSource::Char(UInt16Array::from(Vec::<u16>::new())),
            ElementTypeId::Int8 => ColumnSource::Int8(Int8Array::from(Vec::<i8>::new())),
            ElementTypeId::Int16 => ColumnSource::Int16(Int16Array::from(Vec::<i16>::new())),
            ElementTypeId::Int32 => ColumnSource::Int32(Int32Array::from(Vec::<i32>::new())),
            ElementTypeId::Int64 => ColumnSource::Int64(Int64Array::from(Vec::<i64>::new())),
            ElementTypeId::Float => ColumnSource::Float(Float32Array::from(Vec::<f32>::new())),
            ElementTypeId::Double => ColumnSource::Double(Float64Array::from(Vec::<f64>::new())),
            ElementTypeId::Bool => ColumnSource::Bool(BooleanArray::from(Vec::<bool>::new())),
            ElementTypeId::String => ColumnSource::String(StringArray::from(Vec::<&str>::new())),
            ElementTypeId::Timestamp => {
                ColumnSource::Timestamp(TimestampNanosecondArray::from(Vec::<i64>::new()))
            }
        }
    }

    pub fn element_type(&self) -> ElementTypeId {
        match self {
            ColumnSource::Char(_) => ElementTypeId::Char,
            ColumnSource::Int8(_) => ElementTypeId::Int8,
            ColumnSource::Int16(_) => ElementTypeId::Int16,
            ColumnSource::Int32(_) => ElementTypeId::Int32,
            ColumnSource::Int64(_) => ElementTypeId::Int64,
            ColumnSource::Float(_) => ElementTypeId::Float,
            ColumnSource::Double(_) => ElementTypeId::Double,
            ColumnSource::Bool(_) => ElementTypeId::Bool,
            ColumnSource::String(_) => ElementTypeId::String,
            ColumnSource::Timestamp(_) => ElementTypeId::Timestamp,
        }
    }

    /// The underlying Arrow array.
    pub fn as_array(&self) -> &dyn Array {
        match self {
            ColumnSource::Char(a) => a,
            ColumnSource::Int8(a) => a,
            ColumnSource::Int16(a) => a,
            ColumnSource::Int32(a) => a,
            ColumnSource::Int64(a) => a,
            ColumnSource::Float(a) => a,
            ColumnSource::Double(a) => a,
            ColumnSource::Bool(a) => a,
            ColumnSource::String(a) => a,
            ColumnSource::Timestamp(a) => a,
        }
    }

    /// A shared reference to the underlying Arrow array.
    pub fn to_array_ref(&self) -> ArrayRef {
        match self {
            ColumnSource::Char(a) => Arc::new(a.clone()),
            ColumnSource::Int8(a) => Arc::new(a.clone()),
            ColumnSource::Int16(a) => Arc::new(a.clone()),
            ColumnSource::Int32(a) => Arc::new(a.clone()),
            ColumnSource::Int64(a) => Arc::new(a.clone()),
            ColumnSource::Float(a) => Arc::new(a.clone()),
            ColumnSource::Double(a) => Arc::new(a.clone()),
            ColumnSource::Bool(a) => Arc::new(a.clone()),
            ColumnSource::String(a) => Arc::new(a.clone()),
            ColumnSource::Timestamp(a) => Arc::new(a.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.as_array().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.as_array().null_count()
    }

    /// Reads the value at `row`, or `None` if it is null.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    pub fn get(&self, row: usize) -> Option<Value<'_>> {
        assert!(
            row < self.len(),
            "row {row} out of bounds for a column of length {}",
            self.len()
        );
        if self.as_array().is_null(row) {
            return None;
        }
        let value = match self {
            ColumnSource::Char(a) => Value::Char(a.value(row)),
            ColumnSource::Int8(a) => Value::Int8(a.value(row)),
            ColumnSource::Int16(a) => Value::Int16(a.value(row)),
            ColumnSource::Int32(a) => Value::Int32(a.value(row)),
            ColumnSource::Int64(a) => Value::Int64(a.value(row)),
            ColumnSource::Float(a) => Value::Float(a.value(row)),
            ColumnSource::Double(a) => Value::Double(a.value(row)),
            ColumnSource::Bool(a) => Value::Bool(a.value(row)),
            ColumnSource::String(a) => Value::String(a.value(row)),
            ColumnSource::Timestamp(a) => {
                Value::Timestamp(DateTime::from_timestamp_nanos(a.value(row)))
            }
        };
        Some(value)
    }

    /// Iterates over all values in row order.
    pub fn values(&self) -> impl Iterator<Item = Option<Value<'_>>> + '_ {
        (0..self.len()).map(|row| self.get(row))
    }
}

/// Wraps `values` in a single-element list, the way ticking streams carry a
/// column.  Inverse of [`ColumnSource::from_envelope`].
pub fn wrap_in_envelope(values: ArrayRef) -> ArrayRef {
    let field = Arc::new(Field::new_list_field(values.data_type().clone(), true));
    let offsets = OffsetBuffer::from_lengths([values.len()]);
    Arc::new(ListArray::new(field, offsets, values, None))
}

#[cfg(test)]
mod test {
    use super::{wrap_in_envelope, ColumnError, ColumnSource, Value};
    use crate::ElementTypeId;
    use arrow::array::{
        Array, ArrayRef, Float64Array, Int32Array, ListArray, StringArray, TimestampNanosecondArray,
    };
    use arrow::buffer::OffsetBuffer;
    use arrow::datatypes::{DataType, Field, Int32Type};
    use chrono::DateTime;
    use std::sync::Arc;

    #[test]
    fn unwrap_envelope() {
        let values: ArrayRef = Arc::new(StringArray::from(vec![Some("AAPL"), None, Some("ZNGA")]));
        let envelope = wrap_in_envelope(values);
        let column = ColumnSource::from_envelope(&envelope).unwrap();
        assert_eq!(column.element_type(), ElementTypeId::String);
        assert_eq!(column.len(), 3);
        assert_eq!(column.null_count(), 1);
        assert_eq!(
            column.values().collect::<Vec<_>>(),
            vec![Some(Value::String("AAPL")), None, Some(Value::String("ZNGA"))]
        );
    }

    #[test]
    fn unwrap_is_repeatable() {
        let values: ArrayRef = Arc::new(Float64Array::from(vec![23.5, 538.2]));
        let envelope = wrap_in_envelope(values);
        let first = ColumnSource::from_envelope(&envelope).unwrap();
        let second = ColumnSource::from_envelope(&envelope).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.get(1), Some(Value::Double(538.2)));
    }

    #[test]
    fn unwrap_does_not_copy() {
        let values: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let envelope = wrap_in_envelope(values.clone());
        let column = ColumnSource::from_envelope(&envelope).unwrap();
        let ColumnSource::Int32(array) = column else {
            panic!("expected an int32 column");
        };
        assert_eq!(
            array.values().inner().as_ptr(),
            values.to_data().buffers()[0].as_ptr()
        );
    }

    #[test]
    fn envelope_must_have_one_element() {
        let values: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let field = Arc::new(Field::new_list_field(DataType::Int32, true));
        let envelope: ArrayRef = Arc::new(ListArray::new(
            field,
            OffsetBuffer::from_lengths([1, 2]),
            values.clone(),
            None,
        ));
        assert!(matches!(
            ColumnSource::from_envelope(&envelope),
            Err(ColumnError::MalformedFrame(_))
        ));
        assert!(matches!(
            ColumnSource::from_envelope(&values),
            Err(ColumnError::MalformedFrame(_))
        ));
    }

    #[test]
    fn unsupported_payload() {
        let values: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1)]),
        ]));
        let envelope = wrap_in_envelope(values);
        assert!(matches!(
            ColumnSource::from_envelope(&envelope),
            Err(ColumnError::UnsupportedColumnType(DataType::List(_)))
        ));
    }

    #[test]
    fn timestamp_timezone_is_dropped() {
        let values: ArrayRef = Arc::new(
            TimestampNanosecondArray::from(vec![1_500_000_000_000_000_000]).with_timezone("UTC"),
        );
        let column = ColumnSource::try_from_array(values).unwrap();
        assert_eq!(
            column.as_array().data_type(),
            &ElementTypeId::Timestamp.data_type()
        );
        assert_eq!(
            column.get(0),
            Some(Value::Timestamp(DateTime::from_timestamp_nanos(
                1_500_000_000_000_000_000
            )))
        );
    }

    #[test]
    fn empty_columns_have_canonical_types() {
        for element_type in ElementTypeId::ALL {
            let column = ColumnSource::empty(element_type);
            assert!(column.is_empty());
            assert_eq!(column.element_type(), element_type);
            assert_eq!(column.as_array().data_type(), &element_type.data_type());
        }
    }
}
