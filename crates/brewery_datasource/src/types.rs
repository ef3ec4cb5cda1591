//! Type descriptors a connector offers to model definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column type a model attribute can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Short string.
    String,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Floating point number.
    Float,
    /// Boolean flag.
    Boolean,
    /// Timestamp.
    Date,
    /// Arbitrary JSON document.
    Json,
    /// UUID.
    Uuid,
}

impl DataType {
    /// Every data type with its conventional name.
    pub const ALL: [(&'static str, DataType); 9] = [
        ("STRING", DataType::String),
        ("TEXT", DataType::Text),
        ("INTEGER", DataType::Integer),
        ("BIGINT", DataType::BigInt),
        ("FLOAT", DataType::Float),
        ("BOOLEAN", DataType::Boolean),
        ("DATE", DataType::Date),
        ("JSON", DataType::Json),
        ("UUID", DataType::Uuid),
    ];

    /// Checks whether a JSON value fits this type. `null` always fits.
    #[must_use]
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (self, value) {
            (DataType::Integer | DataType::BigInt, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (_, Value::Null)
            | (DataType::Json, _)
            | (DataType::String | DataType::Text | DataType::Date | DataType::Uuid, Value::String(_))
            | (DataType::Boolean, Value::Bool(_))
            | (DataType::Float, Value::Number(_)) => true,
            _ => false,
        }
    }
}

/// Named type table handed to each model's `define` function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDescriptors {
    types: IndexMap<String, DataType>,
}

impl TypeDescriptors {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table every built-in connector offers.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            types: DataType::ALL
                .iter()
                .map(|(name, ty)| ((*name).to_owned(), *ty))
                .collect(),
        }
    }

    /// Adds or replaces a named type.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, ty: DataType) -> Self {
        self.types.insert(name.into(), ty);
        self
    }

    /// Looks up a type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<DataType> {
        self.types.get(name).copied()
    }

    /// Type names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of named types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
