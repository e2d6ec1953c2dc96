//! Raw query execution: live-table introspection and row CRUD.
//!
//! Provides [`RecordQuery`] for reading the live catalog and manipulating
//! rows of user tables. Values are always bound as parameters. Table and
//! column names cannot be bound, so they are validated and quoted before
//! being interpolated.
//!
//! Every row operation first checks that the table exists in the live
//! catalog and is not a system table. A missing table is reported as
//! [`SqliteError::TableNotFound`] before any statement touches it.
//!
//! # Example
//!
//! ```no_run
//! use dynatable_sqlite::{Page, RecordQuery};
//! use rusqlite::Connection;
//! use serde_json::json;
//!
//! let conn = Connection::open("dev.db").unwrap();
//! let query = RecordQuery::new(&conn);
//!
//! let mut row = dynatable_core::Row::new();
//! row.insert("email".into(), json!("a@b.com"));
//! let id = query.insert_row("users", &row).unwrap();
//!
//! let loaded = query.get_row("users", id).unwrap();
//! assert!(loaded.is_some());
//!
//! let rows = query.list_rows("users", Page::default()).unwrap();
//! println!("{} rows", rows.len());
//! ```

use dynatable_core::{ColumnInfo, ID_COLUMN, Row, TableInfo, quote_identifier};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::debug;

use crate::convert::{json_to_sql, read_row};
use crate::error::{Result, SqliteError};
use crate::schema::DEFAULT_SYSTEM_TABLES;

/// Offset/limit window for row listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return; `None` returns the rest.
    pub limit: Option<u64>,
}

/// Query interface for the live database.
///
/// Wraps a borrowed connection and the set of system tables that are
/// hidden from listings and closed to row operations.
pub struct RecordQuery<'a> {
    conn: &'a Connection,
    system_tables: Vec<String>,
}

impl<'a> RecordQuery<'a> {
    /// Creates a query interface hiding [`DEFAULT_SYSTEM_TABLES`].
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            system_tables: DEFAULT_SYSTEM_TABLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Builder: replaces the system-table list.
    pub fn with_system_tables(mut self, tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.system_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if `name` is a system or SQLite-internal table.
    pub fn is_system_table(&self, name: &str) -> bool {
        name.to_ascii_lowercase().starts_with("sqlite_")
            || self
                .system_tables
                .iter()
                .any(|t| t.eq_ignore_ascii_case(name))
    }

    /// Lists every user table with its column metadata, in creation order.
    pub fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid")?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names.into_iter().filter(|n| !self.is_system_table(n)) {
            let columns = self.columns(&name)?;
            tables.push(TableInfo { name, columns });
        }
        Ok(tables)
    }

    /// Names of every user table, in creation order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.list_tables()?.into_iter().map(|t| t.name).collect())
    }

    /// Loads one user table's metadata, or `None` if it does not exist.
    pub fn table_info(&self, name: &str) -> Result<Option<TableInfo>> {
        let Some(actual) = self.resolve_table(name)? else {
            return Ok(None);
        };
        let columns = self.columns(&actual)?;
        Ok(Some(TableInfo {
            name: actual,
            columns,
        }))
    }

    /// Returns `true` if a user table with this name exists.
    ///
    /// Matching is case-insensitive, like SQLite's own name resolution.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve_table(name)?.is_some())
    }

    /// Inserts a row and returns its id.
    ///
    /// An empty map inserts a row of defaults.
    ///
    /// # Errors
    ///
    /// [`SqliteError::TableNotFound`] if the table is missing,
    /// [`SqliteError::InvalidIdentifier`] for a bad column name, or
    /// [`SqliteError::ValidationError`] when SQLite rejects the row.
    pub fn insert_row(&self, table: &str, columns: &Row) -> Result<i64> {
        let table_sql = self.require_table(table)?;

        let sql = if columns.is_empty() {
            format!("INSERT INTO {table_sql} DEFAULT VALUES")
        } else {
            let names = columns
                .keys()
                .map(|k| quote_identifier(k))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let placeholders = (1..=names.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>();
            format!(
                "INSERT INTO {table_sql} ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            )
        };
        let values = bind_values(columns)?;

        debug!(%sql, "Inserting row");
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| SqliteError::ValidationError(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lists rows in insertion order within `page`.
    pub fn list_rows(&self, table: &str, page: Page) -> Result<Vec<Row>> {
        let table_sql = self.require_table(table)?;
        let limit = page
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let offset = i64::try_from(page.offset).unwrap_or(i64::MAX);

        let sql = format!("SELECT * FROM {table_sql} ORDER BY rowid LIMIT ?1 OFFSET ?2");
        debug!(%sql, "Listing rows");
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params![limit, offset], |row| read_row(row, &names))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Counts the rows of a table.
    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let table_sql = self.require_table(table)?;
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table_sql}"), [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Loads one row by id.
    pub fn get_row(&self, table: &str, id: i64) -> Result<Option<Row>> {
        let table_sql = self.require_table(table)?;
        let sql = format!("SELECT * FROM {table_sql} WHERE {} = ?1", quote_identifier(ID_COLUMN)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let row = stmt
            .query_row([id], |row| read_row(row, &names))
            .optional()?;
        Ok(row)
    }

    /// Updates the given columns of one row.
    ///
    /// # Errors
    ///
    /// [`SqliteError::TableNotFound`], [`SqliteError::RecordNotFound`], or
    /// [`SqliteError::ValidationError`] for an empty map, an attempt to
    /// change `id`, or a constraint violation.
    pub fn update_row(&self, table: &str, id: i64, columns: &Row) -> Result<()> {
        let table_sql = self.require_table(table)?;
        if columns.is_empty() {
            return Err(SqliteError::ValidationError(
                "no columns to update".to_string(),
            ));
        }
        if columns.keys().any(|k| k.eq_ignore_ascii_case(ID_COLUMN)) {
            return Err(SqliteError::ValidationError(
                "the id column cannot be changed".to_string(),
            ));
        }
        self.require_record(table, &table_sql, id)?;

        let assignments = columns
            .keys()
            .enumerate()
            .map(|(i, k)| Ok(format!("{} = ?{}", quote_identifier(k)?, i + 1)))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "UPDATE {table_sql} SET {} WHERE {} = ?{}",
            assignments.join(", "),
            quote_identifier(ID_COLUMN)?,
            columns.len() + 1
        );
        let mut values = bind_values(columns)?;
        values.push(SqlValue::Integer(id));

        debug!(%sql, "Updating row");
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| SqliteError::ValidationError(e.to_string()))?;
        Ok(())
    }

    /// Deletes one row by id.
    pub fn delete_row(&self, table: &str, id: i64) -> Result<()> {
        let table_sql = self.require_table(table)?;
        self.require_record(table, &table_sql, id)?;

        let sql = format!("DELETE FROM {table_sql} WHERE {} = ?1", quote_identifier(ID_COLUMN)?);
        debug!(%sql, "Deleting row");
        self.conn.execute(&sql, [id])?;
        Ok(())
    }

    /// Finds the stored spelling of a user table name.
    fn resolve_table(&self, name: &str) -> Result<Option<String>> {
        if self.is_system_table(name) {
            return Ok(None);
        }
        let actual = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(actual)
    }

    /// Validates the name, checks the live catalog, and returns the quoted
    /// identifier.
    fn require_table(&self, name: &str) -> Result<String> {
        let quoted = quote_identifier(name)?;
        if !self.table_exists(name)? {
            return Err(SqliteError::TableNotFound(name.to_string()));
        }
        Ok(quoted)
    }

    fn require_record(&self, table: &str, table_sql: &str, id: i64) -> Result<()> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {table_sql} WHERE {} = ?1)",
            quote_identifier(ID_COLUMN)?
        );
        let exists: bool = self.conn.query_row(&sql, [id], |row| row.get(0))?;
        if !exists {
            return Err(SqliteError::RecordNotFound {
                table: table.to_string(),
                id,
            });
        }
        Ok(())
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    column_type: row.get(2)?,
                    notnull: row.get::<_, i64>(3)? != 0,
                    dflt_value: row.get(4)?,
                    pk: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

fn bind_values(columns: &Row) -> Result<Vec<SqlValue>> {
    columns
        .iter()
        .map(|(name, value)| json_to_sql(name, value))
        .collect()
}
