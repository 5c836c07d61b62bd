//! Column layout of a subscribed table.

use crate::element_type::ElementTypeId;
use arrow::datatypes::{DataType, Schema as ArrowSchema};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error building or querying a [`Schema`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("sizes differ: {names} column names vs {types} column types")]
    LengthMismatch { names: usize, types: usize },

    #[error("duplicate column name: '{0}'")]
    DuplicateColumn(String),

    #[error("column name '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedFieldType { column: String, data_type: DataType },
}

/// Ordered `(name, type)` pairs with unique names.
///
/// A schema cannot be modified after construction, so every consumer of one
/// subscription observes the same column order.  It is shared as
/// `Arc<Schema>`.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    names: Vec<String>,
    types: Vec<ElementTypeId>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn create(
        names: Vec<String>,
        types: Vec<ElementTypeId>,
    ) -> Result<Arc<Self>, SchemaError> {
        if names.len() != types.len() {
            return Err(SchemaError::LengthMismatch {
                names: names.len(),
                types: types.len(),
            });
        }
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Arc::new(Self {
            names,
            types,
            index,
        }))
    }

    /// Builds a schema from the Arrow schema of a subscribed table.
    ///
    /// Ticking streams wrap each column in a single-element list, so list
    /// fields are described by their item type.
    pub fn from_arrow(schema: &ArrowSchema) -> Result<Arc<Self>, SchemaError> {
        let mut names = Vec::with_capacity(schema.fields().len());
        let mut types = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let data_type = match field.data_type() {
                DataType::List(item) | DataType::LargeList(item) => item.data_type(),
                data_type => data_type,
            };
            let element_type = ElementTypeId::from_data_type(data_type).ok_or_else(|| {
                SchemaError::UnsupportedFieldType {
                    column: field.name().clone(),
                    data_type: field.data_type().clone(),
                }
            })?;
            names.push(field.name().clone());
            types.push(element_type);
        }
        Self::create(names, types)
    }

    /// Returns the position of column `name`.
    ///
    /// When the column does not exist, returns `Ok(None)` if `strict` is
    /// false and [`SchemaError::ColumnNotFound`] otherwise.
    pub fn get_column_index(&self, name: &str, strict: bool) -> Result<Option<usize>, SchemaError> {
        match self.index.get(name) {
            Some(i) => Ok(Some(*i)),
            None if strict => Err(SchemaError::ColumnNotFound(name.to_string())),
            None => Ok(None),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[ElementTypeId] {
        &self.types
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }
}
