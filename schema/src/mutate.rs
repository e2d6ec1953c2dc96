//! Text-in, text-out schema mutations.
//!
//! Each function parses the schema text, applies one structural edit to the
//! [`SchemaDocument`], and serializes it again. None of them touch the
//! database. On error the caller still holds the original text, so an
//! invalid request never changes the schema.

use dynatable_core::{ColumnDefinition, TableDefinition};

use crate::document::SchemaDocument;
use crate::error::Result;

/// Appends a table definition with an implicit `id` primary key.
///
/// # Examples
///
/// ```
/// use dynatable_core::ColumnDefinition;
///
/// let text = dynatable_schema::add_table("", "users", vec![ColumnDefinition::new("email", "TEXT")]).unwrap();
/// assert!(text.contains("model users {"));
/// assert!(dynatable_schema::add_table(&text, "users", vec![ColumnDefinition::new("x", "TEXT")]).is_err());
/// ```
pub fn add_table(schema_text: &str, name: &str, columns: Vec<ColumnDefinition>) -> Result<String> {
    let mut doc = SchemaDocument::parse(schema_text)?;
    doc.add_table(name, columns)?;
    Ok(doc.to_string())
}

/// Removes a table definition block.
pub fn remove_table(schema_text: &str, name: &str) -> Result<String> {
    let mut doc = SchemaDocument::parse(schema_text)?;
    doc.remove_table(name)?;
    Ok(doc.to_string())
}

/// Renames one column of one table.
pub fn rename_column(
    schema_text: &str,
    table: &str,
    old_name: &str,
    new_name: &str,
) -> Result<String> {
    let mut doc = SchemaDocument::parse(schema_text)?;
    doc.rename_column(table, old_name, new_name)?;
    Ok(doc.to_string())
}

/// Looks up a single table definition.
pub fn find_table(schema_text: &str, name: &str) -> Result<Option<TableDefinition>> {
    Ok(SchemaDocument::parse(schema_text)?.table(name))
}
