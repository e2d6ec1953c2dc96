//! SQL generation for declared tables.
//!
//! Turns [`TableDefinition`]s from the schema file into SQLite DDL. Every
//! identifier goes through [`quote_identifier`] first, so a name that
//! slipped past earlier checks still cannot break out of its quotes.
//!
//! # Type mapping
//!
//! | Declared | SQLite |
//! |---|---|
//! | `Int`, `BigInt` | `INTEGER` |
//! | `String`, `Json` | `TEXT` |
//! | `Float` | `REAL` |
//! | `Decimal` | `DECIMAL` |
//! | `Boolean` | `BOOLEAN` |
//! | `DateTime` | `DATETIME` |
//! | `Bytes` | `BLOB` |
//! | anything else | the token, upper-cased |
//!
//! A column without the `?` marker is `NOT NULL`.

use dynatable_core::{ColumnDefinition, TableDefinition, quote_identifier};

use crate::error::{Result, SqliteError};

/// History table recording every applied schema change.
pub const MIGRATIONS_TABLE: &str = "_dynatable_migrations";

/// Tables hidden from listings and row operations unless configured
/// otherwise.
pub const DEFAULT_SYSTEM_TABLES: &[&str] = &[MIGRATIONS_TABLE, "_prisma_migrations", "sqlite_sequence"];

/// Maps a declared type token to a SQLite column type.
pub fn sql_type(column: &ColumnDefinition) -> String {
    match column.base_type() {
        "Int" | "BigInt" => "INTEGER".to_string(),
        "String" | "Json" => "TEXT".to_string(),
        "Float" => "REAL".to_string(),
        "Decimal" => "DECIMAL".to_string(),
        "Boolean" => "BOOLEAN".to_string(),
        "DateTime" => "DATETIME".to_string(),
        "Bytes" => "BLOB".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

/// Converts a `@default(...)` argument into a SQL `DEFAULT` expression.
///
/// `autoincrement()` has no SQL default; it is expressed through the
/// primary-key clause instead and yields `None`.
///
/// # Errors
///
/// Returns [`SqliteError::ConversionError`] for generator functions SQLite
/// cannot evaluate (e.g. `uuid()`).
pub(crate) fn default_expression(raw: &str) -> Result<Option<String>> {
    let raw = raw.trim();
    match raw {
        "autoincrement()" => return Ok(None),
        "now()" => return Ok(Some("CURRENT_TIMESTAMP".to_string())),
        "true" => return Ok(Some("1".to_string())),
        "false" => return Ok(Some("0".to_string())),
        "null" => return Ok(Some("NULL".to_string())),
        _ => {}
    }

    if raw.parse::<i64>().is_ok() || raw.parse::<f64>().is_ok_and(f64::is_finite) {
        return Ok(Some(raw.to_string()));
    }

    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let unescaped = inner.replace("\\\"", "\"").replace("\\\\", "\\");
        return Ok(Some(sql_string_literal(&unescaped)));
    }

    if raw.ends_with(')') {
        return Err(SqliteError::ConversionError(format!(
            "unsupported default function: {raw}"
        )));
    }

    // Bare words are enum-style constants.
    Ok(Some(sql_string_literal(raw)))
}

fn sql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Generates the column clause for one declared column.
pub fn column_sql(column: &ColumnDefinition) -> Result<String> {
    let name = quote_identifier(&column.name)?;
    let ty = sql_type(column);
    let default = match column.default_value() {
        Some(raw) => default_expression(raw)?,
        None => None,
    };

    if column.is_primary_key() {
        if column.default_value() == Some("autoincrement()") && ty == "INTEGER" {
            return Ok(format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"));
        }
        return Ok(format!("{name} {ty} PRIMARY KEY NOT NULL"));
    }

    let mut sql = format!("{name} {ty}");
    if !column.is_optional() {
        sql.push_str(" NOT NULL");
    }
    if column.attributes.split_whitespace().any(|a| a == "@unique") {
        sql.push_str(" UNIQUE");
    }
    if let Some(expr) = default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&expr);
    }
    Ok(sql)
}

/// Generates `CREATE TABLE` for a declared table.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidIdentifier`] for a bad table or column
/// name, or [`SqliteError::ConversionError`] for an unsupported default or
/// a table without columns.
pub fn create_table_sql(table: &TableDefinition) -> Result<String> {
    let name = quote_identifier(&table.name)?;
    if table.columns.is_empty() {
        return Err(SqliteError::ConversionError(format!(
            "table {} has no columns",
            table.name
        )));
    }

    let columns = table
        .columns
        .iter()
        .map(column_sql)
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE {name} (\n    {}\n);",
        columns.join(",\n    ")
    ))
}

/// Generates `DROP TABLE IF EXISTS`.
pub fn drop_table_sql(table: &str) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {};", quote_identifier(table)?))
}

/// Generates `ALTER TABLE ... RENAME COLUMN`.
pub fn rename_column_sql(table: &str, from: &str, to: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {};",
        quote_identifier(table)?,
        quote_identifier(from)?,
        quote_identifier(to)?
    ))
}

/// Generates the migration history table.
pub fn migrations_table_sql() -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    statements TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDefinition {
        TableDefinition::new("users")
            .with_column(ColumnDefinition::primary_key())
            .with_column(ColumnDefinition::new("email", "String").with_attributes("@unique"))
            .with_column(ColumnDefinition::new("nickname", "String?"))
            .with_column(ColumnDefinition::new("active", "Boolean").with_attributes("@default(true)"))
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(&users()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\n    \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n    \"email\" TEXT NOT NULL UNIQUE,\n    \"nickname\" TEXT,\n    \"active\" BOOLEAN NOT NULL DEFAULT 1\n);"
        );
    }

    #[test]
    fn test_sql_type_passes_unknown_tokens_through() {
        assert_eq!(sql_type(&ColumnDefinition::new("a", "TEXT")), "TEXT");
        assert_eq!(sql_type(&ColumnDefinition::new("a", "varchar?")), "VARCHAR");
        assert_eq!(sql_type(&ColumnDefinition::new("a", "Float?")), "REAL");
    }

    #[test]
    fn test_default_expressions() {
        assert_eq!(default_expression("now()").unwrap().as_deref(), Some("CURRENT_TIMESTAMP"));
        assert_eq!(default_expression("42").unwrap().as_deref(), Some("42"));
        assert_eq!(default_expression("-1.5").unwrap().as_deref(), Some("-1.5"));
        assert_eq!(
            default_expression(r#""it's \"ok\"""#).unwrap().as_deref(),
            Some(r#"'it''s "ok"'"#)
        );
        assert_eq!(default_expression("ACTIVE").unwrap().as_deref(), Some("'ACTIVE'"));
        assert_eq!(default_expression("autoincrement()").unwrap(), None);
        assert!(matches!(
            default_expression("uuid()"),
            Err(SqliteError::ConversionError(_))
        ));
    }

    #[test]
    fn test_invalid_identifiers_are_rejected() {
        let bad = TableDefinition::new("users; --").with_column(ColumnDefinition::primary_key());
        assert!(matches!(
            create_table_sql(&bad),
            Err(SqliteError::InvalidIdentifier(_))
        ));
        assert!(drop_table_sql("x\"y").is_err());
        assert!(rename_column_sql("users", "a", "b c").is_err());
    }

    #[test]
    fn test_rename_and_drop_sql() {
        assert_eq!(
            rename_column_sql("users", "mail", "email").unwrap(),
            "ALTER TABLE \"users\" RENAME COLUMN \"mail\" TO \"email\";"
        );
        assert_eq!(drop_table_sql("users").unwrap(), "DROP TABLE IF EXISTS \"users\";");
    }
}
