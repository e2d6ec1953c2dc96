//! Migration of the live database towards the schema document.
//!
//! Provides [`Migration`], the in-process runner that turns a
//! [`SchemaChange`] into DDL, applies it inside a transaction, and records
//! it in the [`MIGRATIONS_TABLE`] history. [`Migration::sync`] reconciles
//! a whole document at once and [`Migration::status`] reports drift
//! without changing anything.
//!
//! # Example
//!
//! ```no_run
//! use dynatable_core::{ColumnDefinition, TableDefinition};
//! use dynatable_sqlite::{Migration, MigrationRunner, SchemaChange};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("dev.db").unwrap();
//! let mut migration = Migration::new(&conn).unwrap();
//! migration.up().unwrap();
//!
//! let users = TableDefinition::new("users")
//!     .with_column(ColumnDefinition::primary_key())
//!     .with_column(ColumnDefinition::new("email", "String"));
//! let report = migration
//!     .apply(&SchemaChange::AddTable(users), "model users { ... }")
//!     .unwrap();
//! println!("applied {}", report.name);
//! ```

use chrono::Utc;
use dynatable_core::TableDefinition;
use dynatable_schema::{SchemaDocument, checksum};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SqliteError};
use crate::query::RecordQuery;
use crate::schema::{
    DEFAULT_SYSTEM_TABLES, MIGRATIONS_TABLE, create_table_sql, drop_table_sql,
    migrations_table_sql, rename_column_sql,
};

/// One structural change to apply to the live database.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaChange {
    /// Create a table exactly as declared.
    AddTable(TableDefinition),
    /// Drop a table and its rows.
    RemoveTable(String),
    /// Rename one column, keeping its data.
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
}

impl SchemaChange {
    /// Name recorded in the migration history, e.g. `add-users`.
    pub fn migration_name(&self) -> String {
        match self {
            Self::AddTable(table) => format!("add-{}", table.name),
            Self::RemoveTable(name) => format!("remove-{name}"),
            Self::RenameColumn { from, to, .. } => format!("rename-{from}-to-{to}"),
        }
    }

    /// Table the change applies to.
    pub fn table_name(&self) -> &str {
        match self {
            Self::AddTable(table) => &table.name,
            Self::RemoveTable(name) => name,
            Self::RenameColumn { table, .. } => table,
        }
    }

    /// DDL statements implementing the change.
    pub fn statements(&self) -> Result<Vec<String>> {
        let sql = match self {
            Self::AddTable(table) => create_table_sql(table)?,
            Self::RemoveTable(name) => drop_table_sql(name)?,
            Self::RenameColumn { table, from, to } => rename_column_sql(table, from, to)?,
        };
        Ok(vec![sql])
    }
}

/// Something that can bring the live database in line with one change.
///
/// Implementations block until the change is fully applied or has failed;
/// a returned error means the caller must treat the change as not applied.
pub trait MigrationRunner {
    /// Applies `change`. `schema_text` is the schema document the change
    /// produced and is used for the history checksum.
    fn apply(&mut self, change: &SchemaChange, schema_text: &str) -> Result<MigrationReport>;
}

/// Result of one applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// History name, see [`SchemaChange::migration_name`].
    pub name: String,
    /// Statements executed, empty when an external tool did the work.
    pub statements: Vec<String>,
    /// SHA-256 of the schema text the change produced.
    pub checksum: String,
    /// RFC 3339 timestamp.
    pub applied_at: String,
}

/// One row of the migration history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub checksum: String,
    pub statements: String,
    pub applied_at: String,
}

/// Drift between the schema document and the live database.
///
/// Returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Whether the history table exists.
    pub history_exists: bool,
    /// Number of recorded migrations.
    pub applied_count: usize,
    /// Tables declared in the document but missing from the database.
    pub pending: Vec<String>,
    /// Live user tables the document does not declare.
    pub orphaned: Vec<String>,
}

impl MigrationStatus {
    /// Returns `true` when document and database agree.
    pub fn is_in_sync(&self) -> bool {
        self.pending.is_empty() && self.orphaned.is_empty()
    }
}

/// Tables touched by [`Migration::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub dropped: Vec<String>,
}

/// In-process migration runner over a borrowed connection.
///
/// Every change runs in its own transaction together with its history row,
/// so either both land or neither does.
pub struct Migration<'a> {
    conn: &'a Connection,
    system_tables: Vec<String>,
}

impl<'a> Migration<'a> {
    /// Creates a runner and enables foreign-key enforcement.
    pub fn new(conn: &'a Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            system_tables: DEFAULT_SYSTEM_TABLES.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Builder: replaces the system-table list. The history table is always
    /// treated as a system table.
    pub fn with_system_tables(mut self, tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.system_tables = tables.into_iter().map(Into::into).collect();
        if !self
            .system_tables
            .iter()
            .any(|t| t.eq_ignore_ascii_case(MIGRATIONS_TABLE))
        {
            self.system_tables.push(MIGRATIONS_TABLE.to_string());
        }
        self
    }

    /// Creates the history table. Safe to call repeatedly.
    pub fn up(&mut self) -> Result<()> {
        self.conn
            .execute_batch(&migrations_table_sql())
            .map_err(|e| {
                SqliteError::MigrationError(format!("failed to create history table: {e}"))
            })?;
        Ok(())
    }

    /// Applies one change and records it in the history.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::MigrationError`] if any statement fails; the
    /// transaction is rolled back and no history row is written.
    pub fn apply_change(&mut self, change: &SchemaChange, schema_text: &str) -> Result<MigrationReport> {
        self.up()?;
        let name = change.migration_name();
        let statements = change.statements()?;

        let tx = self.conn.unchecked_transaction()?;
        for sql in &statements {
            debug!(migration = %name, %sql, "Executing migration statement");
            tx.execute_batch(sql)
                .map_err(|e| SqliteError::MigrationError(format!("{name}: {e}")))?;
        }

        let report = MigrationReport {
            name,
            checksum: checksum(schema_text),
            applied_at: Utc::now().to_rfc3339(),
            statements,
        };
        tx.execute(
            &format!(
                "INSERT INTO {MIGRATIONS_TABLE} (name, checksum, statements, applied_at) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                report.name,
                report.checksum,
                report.statements.join("\n"),
                report.applied_at
            ],
        )?;
        tx.commit()?;

        info!(migration = %report.name, table = change.table_name(), "Migration applied");
        Ok(report)
    }

    /// Creates every declared table that is missing from the database.
    ///
    /// With `prune`, live user tables the document does not declare are
    /// dropped as well. Tables present on both sides are left alone; column
    /// drift is not reconciled.
    pub fn sync(&mut self, doc: &SchemaDocument, schema_text: &str, prune: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let status = self.status(doc)?;

        for name in &status.pending {
            if let Some(table) = doc.table(name) {
                self.apply_change(&SchemaChange::AddTable(table), schema_text)?;
                report.created.push(name.clone());
            }
        }

        if prune {
            for name in &status.orphaned {
                self.apply_change(&SchemaChange::RemoveTable(name.clone()), schema_text)?;
                report.dropped.push(name.clone());
            }
        }

        if !report.created.is_empty() || !report.dropped.is_empty() {
            info!(
                created = report.created.len(),
                dropped = report.dropped.len(),
                "Database synchronized with schema"
            );
        }
        Ok(report)
    }

    /// Compares the document with the live database.
    pub fn status(&self, doc: &SchemaDocument) -> Result<MigrationStatus> {
        let history_exists = self.history_exists()?;
        let applied_count = if history_exists {
            let count: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {MIGRATIONS_TABLE}"),
                [],
                |row| row.get(0),
            )?;
            usize::try_from(count).unwrap_or(0)
        } else {
            0
        };

        let live = RecordQuery::new(self.conn)
            .with_system_tables(self.system_tables.iter().cloned())
            .table_names()?;
        let declared = doc.table_names();

        let pending = declared
            .iter()
            .filter(|d| !live.iter().any(|l| l.eq_ignore_ascii_case(d)))
            .map(|d| d.to_string())
            .collect();
        let orphaned = live
            .iter()
            .filter(|l| !declared.iter().any(|d| d.eq_ignore_ascii_case(l)))
            .cloned()
            .collect();

        Ok(MigrationStatus {
            history_exists,
            applied_count,
            pending,
            orphaned,
        })
    }

    /// Recorded migrations, oldest first.
    pub fn history(&self) -> Result<Vec<MigrationRecord>> {
        if !self.history_exists()? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name, checksum, statements, applied_at FROM {MIGRATIONS_TABLE} ORDER BY id"
        ))?;
        let records = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    checksum: row.get(2)?,
                    statements: row.get(3)?,
                    applied_at: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn history_exists(&self) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [MIGRATIONS_TABLE],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl MigrationRunner for Migration<'_> {
    fn apply(&mut self, change: &SchemaChange, schema_text: &str) -> Result<MigrationReport> {
        self.apply_change(change, schema_text)
    }
}
