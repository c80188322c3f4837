//! Table and column descriptors consumed from the schema registry.

use thiserror::Error;

use crate::codec::Codec;
use crate::value::{ScalarType, Value};

/// Schema validation failures. These are fatal: provisioning must refuse
/// to create any container when one descriptor is malformed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Table has no primary-key column
    #[error("table '{table}' has no primary-key column")]
    MissingPrimaryKey { table: String },

    /// Table has more than one primary-key column
    #[error("table '{table}' has multiple primary-key columns")]
    MultiplePrimaryKeys { table: String },

    /// Duplicate column name within a table
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// Duplicate table name within the schema
    #[error("duplicate table '{table}' in schema")]
    DuplicateTable { table: String },

    /// Table descriptor has no columns at all
    #[error("table '{table}' has no columns")]
    NoColumns { table: String },
}

/// Column descriptor: name, scalar tag, constraints, and the codec
/// resolved from the tag.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Scalar type tag
    pub tag: ScalarType,
    /// Primary-key flag (exactly one per table)
    pub primary: bool,
    /// Whether the column accepts `Null`
    pub nullable: bool,
    /// Default value filled in on insert when the caller omits the column
    pub default: Option<Value>,
    /// Codec resolved from `tag` at construction time
    pub codec: Codec,
}

impl ColumnDescriptor {
    /// Creates a nullable, non-primary column of the given scalar type.
    pub fn new(name: impl Into<String>, tag: ScalarType) -> Self {
        Self {
            name: name.into(),
            tag,
            primary: false,
            nullable: true,
            default: None,
            codec: Codec::for_tag(tag),
        }
    }

    /// Marks the column as the table's primary key. Primary keys are
    /// always non-nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    /// Marks the column as non-nullable.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value used when an insert omits this column.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Returns `true` if this column is eligible for a secondary index:
    /// non-primary and tagged with a supported scalar type.
    pub fn indexable(&self) -> bool {
        !self.primary && self.tag.supports_index()
    }
}

/// Table descriptor: unique name plus ordered columns. Immutable for the
/// process lifetime once handed to the client facade.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Ordered column descriptors
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a table descriptor. Validation happens at provisioning,
    /// not here, so a malformed descriptor fails the whole open.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Returns the primary-key column, or the schema error that makes
    /// this descriptor unusable.
    pub fn primary_column(&self) -> Result<&ColumnDescriptor, SchemaError> {
        let mut primaries = self.columns.iter().filter(|c| c.primary);
        let first = primaries.next().ok_or_else(|| SchemaError::MissingPrimaryKey {
            table: self.name.clone(),
        })?;
        if primaries.next().is_some() {
            return Err(SchemaError::MultiplePrimaryKeys {
                table: self.name.clone(),
            });
        }
        Ok(first)
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the names of the secondary indexes this table provisions:
    /// one per non-primary column with a supported scalar tag.
    pub fn index_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.indexable())
            .map(|c| c.name.as_str())
            .collect()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns {
                table: self.name.clone(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        self.primary_column().map(|_| ())
    }
}

/// Validates a whole schema before any container is created.
pub fn validate_schema(tables: &[TableDescriptor]) -> Result<(), SchemaError> {
    let mut seen = std::collections::HashSet::new();
    for table in tables {
        if !seen.insert(table.name.as_str()) {
            return Err(SchemaError::DuplicateTable {
                table: table.name.clone(),
            });
        }
        table.validate()?;
    }
    Ok(())
}
