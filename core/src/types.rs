//! Table and column type definitions.
//!
//! Two families of types live here. [`TableDefinition`] and
//! [`ColumnDefinition`] describe tables as they are *declared* in the schema
//! file. [`TableInfo`] and [`ColumnInfo`] describe tables as they *exist* in
//! the live database, as reported by introspection.

use serde::{Deserialize, Serialize};

/// Name of the implicit primary-key column added to every table.
pub const ID_COLUMN: &str = "id";

/// Declared type token of the implicit primary-key column.
pub const ID_COLUMN_TYPE: &str = "Int";

/// Attributes of the implicit primary-key column.
pub const ID_COLUMN_ATTRIBUTES: &str = "@id @default(autoincrement())";

/// A single row: column name to scalar JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A column as declared in the schema file.
///
/// The type token is free-form (`String`, `Int?`, `TEXT`, ...). A trailing
/// `?` marks the column as nullable. Attributes are kept as raw text so they
/// round-trip through the schema file untouched.
///
/// # Examples
///
/// ```
/// use dynatable_core::ColumnDefinition;
///
/// let col = ColumnDefinition::new("nickname", "String?")
///     .with_attributes("@default(\"anon\")");
/// assert!(col.is_optional());
/// assert_eq!(col.base_type(), "String");
/// assert_eq!(col.default_value(), Some("\"anon\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Declared type token, including an optional `?` suffix.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Raw attribute text (e.g. `@id @default(autoincrement())`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attributes: String,
}

impl ColumnDefinition {
    /// Creates a column with no attributes.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            attributes: String::new(),
        }
    }

    /// Builder: sets the raw attribute text.
    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = attributes.into();
        self
    }

    /// The implicit auto-incrementing `id` column.
    pub fn primary_key() -> Self {
        Self::new(ID_COLUMN, ID_COLUMN_TYPE).with_attributes(ID_COLUMN_ATTRIBUTES)
    }

    /// Returns `true` if the type token carries the `?` nullability marker.
    pub fn is_optional(&self) -> bool {
        self.column_type.ends_with('?')
    }

    /// Returns the type token without the nullability marker.
    pub fn base_type(&self) -> &str {
        self.column_type.trim_end_matches('?')
    }

    /// Returns `true` if the attributes mark this column as the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.attributes.split_whitespace().any(|attr| attr == "@id")
    }

    /// Returns the raw argument of the `@default(...)` attribute, if any.
    ///
    /// Parentheses are matched with awareness of quoted strings, so
    /// `@default("a)b")` yields `"a)b"`.
    pub fn default_value(&self) -> Option<&str> {
        const MARKER: &str = "@default(";
        let start = self.attributes.find(MARKER)? + MARKER.len();
        let rest = &self.attributes[start..];

        let mut depth = 1usize;
        let mut in_string = false;
        let mut escaped = false;
        for (idx, ch) in rest.char_indices() {
            if in_string {
                match ch {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => in_string = false,
                    _ => escaped = false,
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(rest[..idx].trim());
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// A table as declared in the schema file.
///
/// # Examples
///
/// ```
/// use dynatable_core::{ColumnDefinition, TableDefinition};
///
/// let table = TableDefinition::new("users")
///     .with_column(ColumnDefinition::primary_key())
///     .with_column(ColumnDefinition::new("email", "String"));
/// assert_eq!(table.column_names(), vec!["id", "email"]);
/// assert!(table.find_column("email").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Creates a table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Builder: appends a column.
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Finds a column by name.
    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds a column by name, mutably.
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Column metadata reported by the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Zero-based column position.
    pub cid: i64,
    /// Column name.
    pub name: String,
    /// Declared SQL type.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column carries a `NOT NULL` constraint.
    pub notnull: bool,
    /// Default value expression, if any.
    pub dflt_value: Option<String>,
    /// Whether the column is part of the primary key.
    pub pk: bool,
}

/// A live table with its column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Columns in table order.
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
