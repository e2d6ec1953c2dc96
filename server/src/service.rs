//! Table and record operations behind the HTTP handlers.
//!
//! [`Backend`] owns the single SQLite connection and the schema store. All
//! methods are blocking and are called from tokio's blocking pool.
//!
//! Schema mutations hold the connection lock from reading the schema text
//! until the migration has been applied, so two requests can never edit the
//! schema from the same stale copy. If the migration fails the previous
//! schema text is written back before the error is returned.

use std::sync::{Mutex, MutexGuard};

use dynatable_core::{ColumnDefinition, Row, TableInfo};
use dynatable_schema::{SchemaDocument, SchemaStore, default_header};
use dynatable_sqlite::{
    CommandMigrator, Migration, MigrationReport, MigrationRunner, Page, RecordQuery,
    SchemaChange, SyncReport, create_table_sql,
};
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ApiError, Result as ServerResult, ServerError};

/// Result alias for request-level operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A page of rows plus the table's total row count.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPage {
    pub rows: Vec<Row>,
    pub offset: u64,
    pub total: u64,
}

/// Shared backend state.
pub struct Backend {
    conn: Mutex<Connection>,
    store: SchemaStore,
    system_tables: Vec<String>,
    command: Option<CommandMigrator>,
}

impl Backend {
    /// Opens the database and schema file named by `config`.
    ///
    /// Creates the schema file with a default header if it is missing. In
    /// in-process mode, tables declared in the schema but missing from the
    /// database are created; nothing is dropped.
    pub fn open(config: &ServerConfig) -> ServerResult<Self> {
        let conn = Connection::open(&config.database)?;
        let backend = Self::with_connection(conn, config)?;

        if backend.store.init(&default_header(&config.database_url()))? {
            info!(path = %backend.store.path().display(), "Created schema file");
        }
        if backend.command.is_none() {
            let report = backend.sync(false)?;
            if !report.created.is_empty() {
                info!(tables = ?report.created, "Created tables declared in schema");
            }
        }
        Ok(backend)
    }

    /// Wraps an already open connection. Nothing is read or written.
    pub fn with_connection(conn: Connection, config: &ServerConfig) -> ServerResult<Self> {
        Ok(Self {
            conn: Mutex::new(conn),
            store: SchemaStore::new(&config.schema),
            system_tables: config.system_tables.clone(),
            command: config.migration.command_migrator()?,
        })
    }

    /// Reconciles the database with the schema file.
    pub fn sync(&self, prune: bool) -> ServerResult<SyncReport> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ServerError::Config("database lock poisoned".to_string()))?;
        let text = self.store.read_text()?;
        let doc = SchemaDocument::parse(&text)?;
        let report = self.migration(&conn)?.sync(&doc, &text, prune)?;
        Ok(report)
    }

    /// Lists live user tables with their columns.
    pub fn list_tables(&self) -> ApiResult<Vec<TableInfo>> {
        let conn = self.lock()?;
        Ok(self.query(&conn).list_tables()?)
    }

    /// Loads one live table.
    pub fn get_table(&self, name: &str) -> ApiResult<TableInfo> {
        let conn = self.lock()?;
        self.query(&conn)
            .table_info(name)?
            .ok_or_else(|| ApiError::TableNotFound(name.to_string()))
    }

    /// Declares a new table and migrates it into the database.
    pub fn create_table(&self, name: &str, columns: Vec<ColumnDefinition>) -> ApiResult<MigrationReport> {
        let conn = self.lock()?;
        if self.query(&conn).table_exists(name)? {
            return Err(ApiError::DuplicateTable(name.to_string()));
        }

        let before = self.store.read_text()?;
        let mut doc = SchemaDocument::parse(&before)?;
        let table = doc.add_table(name, columns)?;
        // Surface unsupported defaults before anything is written.
        create_table_sql(&table)?;

        let report = self.migrate(&conn, &before, &doc, SchemaChange::AddTable(table))?;
        info!(table = name, migration = %report.name, "Table created");
        Ok(report)
    }

    /// Removes a table from the schema and drops it.
    pub fn delete_table(&self, name: &str) -> ApiResult<MigrationReport> {
        let conn = self.lock()?;
        let before = self.store.read_text()?;
        let mut doc = SchemaDocument::parse(&before)?;
        let removed = doc.remove_table(name)?;

        let report = self.migrate(&conn, &before, &doc, SchemaChange::RemoveTable(removed.name))?;
        info!(table = name, migration = %report.name, "Table deleted");
        Ok(report)
    }

    /// Renames a column in the schema and in the database.
    pub fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> ApiResult<MigrationReport> {
        let conn = self.lock()?;
        let before = self.store.read_text()?;
        let mut doc = SchemaDocument::parse(&before)?;
        doc.rename_column(table, old_name, new_name)?;
        if old_name == new_name {
            return Err(ApiError::Validation(format!(
                "column {old_name} already has that name"
            )));
        }

        let change = SchemaChange::RenameColumn {
            table: doc
                .table(table)
                .map_or_else(|| table.to_string(), |t| t.name),
            from: old_name.to_string(),
            to: new_name.to_string(),
        };
        let report = self.migrate(&conn, &before, &doc, change)?;
        info!(table, from = old_name, to = new_name, "Column renamed");
        Ok(report)
    }

    /// Inserts a row and returns its id.
    pub fn insert_record(&self, table: &str, row: &Row) -> ApiResult<i64> {
        let conn = self.lock()?;
        Ok(self.query(&conn).insert_row(table, row)?)
    }

    /// Lists rows within `page` together with the total count.
    pub fn list_records(&self, table: &str, page: Page) -> ApiResult<RowPage> {
        let conn = self.lock()?;
        let query = self.query(&conn);
        let rows = query.list_rows(table, page)?;
        let total = query.count_rows(table)?;
        Ok(RowPage {
            rows,
            offset: page.offset,
            total,
        })
    }

    /// Loads one row.
    pub fn get_record(&self, table: &str, id: i64) -> ApiResult<Row> {
        let conn = self.lock()?;
        self.query(&conn)
            .get_row(table, id)?
            .ok_or_else(|| ApiError::RecordNotFound {
                table: table.to_string(),
                id,
            })
    }

    /// Updates one row.
    pub fn update_record(&self, table: &str, id: i64, row: &Row) -> ApiResult<()> {
        let conn = self.lock()?;
        Ok(self.query(&conn).update_row(table, id, row)?)
    }

    /// Deletes one row.
    pub fn delete_record(&self, table: &str, id: i64) -> ApiResult<()> {
        let conn = self.lock()?;
        Ok(self.query(&conn).delete_row(table, id)?)
    }

    /// Writes the new schema, applies `change`, and restores `before` if
    /// the migration fails.
    fn migrate(
        &self,
        conn: &Connection,
        before: &str,
        doc: &SchemaDocument,
        change: SchemaChange,
    ) -> ApiResult<MigrationReport> {
        let after = doc.to_string();
        self.store.write_text(&after)?;

        let result = match &self.command {
            Some(command) => command.clone().apply(&change, &after),
            None => self
                .migration(conn)
                .and_then(|mut migration| migration.apply(&change, &after)),
        };

        match result {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(migration = %change.migration_name(), error = %err, "Migration failed, restoring schema");
                if let Err(restore) = self.store.write_text(before) {
                    error!(error = %restore, "Failed to restore schema file");
                }
                Err(ApiError::MigrationFailure(err.to_string()))
            }
        }
    }

    fn migration<'c>(&self, conn: &'c Connection) -> dynatable_sqlite::Result<Migration<'c>> {
        Ok(Migration::new(conn)?.with_system_tables(self.system_tables.iter().cloned()))
    }

    fn query<'c>(&self, conn: &'c Connection) -> RecordQuery<'c> {
        RecordQuery::new(conn).with_system_tables(self.system_tables.iter().cloned())
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{MigrationConfig, MigrationMode};

    fn backend(dir: &tempfile::TempDir) -> Backend {
        let config = ServerConfig {
            database: dir.path().join("dev.db"),
            schema: dir.path().join("schema.dyn"),
            ..ServerConfig::default()
        };
        Backend::open(&config).unwrap()
    }

    fn email() -> Vec<ColumnDefinition> {
        vec![ColumnDefinition::new("email", "String")]
    }

    #[test]
    fn test_open_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let text = backend.store.read_text().unwrap();
        assert!(text.starts_with("datasource db {"));
        assert!(backend.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_create_table_updates_schema_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let report = backend.create_table("users", email()).unwrap();
        assert_eq!(report.name, "add-users");

        assert!(backend.store.load().unwrap().contains_table("users"));
        let users = backend.get_table("users").unwrap();
        assert_eq!(users.column_names(), vec!["id", "email"]);
    }

    #[test]
    fn test_duplicate_create_leaves_schema_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend.create_table("users", email()).unwrap();
        let before = backend.store.read_text().unwrap();

        let err = backend.create_table("users", email()).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateTable(_)));
        assert_eq!(backend.store.read_text().unwrap(), before);
    }

    #[test]
    fn test_live_table_missing_from_schema_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend
            .lock()
            .unwrap()
            .execute_batch("CREATE TABLE legacy (id INTEGER PRIMARY KEY);")
            .unwrap();
        assert!(matches!(
            backend.create_table("legacy", email()),
            Err(ApiError::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_unsupported_default_is_rejected_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        let before = backend.store.read_text().unwrap();
        let columns = vec![ColumnDefinition::new("token", "String").with_attributes("@default(uuid())")];
        assert!(matches!(
            backend.create_table("keys", columns),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(backend.store.read_text().unwrap(), before);
    }

    #[test]
    fn test_failed_migration_restores_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend(&dir);
        backend.command = MigrationConfig {
            mode: MigrationMode::Command,
            command: vec!["false".to_string()],
            timeout_secs: 5,
        }
        .command_migrator()
        .unwrap();
        let before = backend.store.read_text().unwrap();

        let err = backend.create_table("users", email()).unwrap_err();
        assert!(matches!(err, ApiError::MigrationFailure(_)));
        assert_eq!(backend.store.read_text().unwrap(), before);
    }

    #[test]
    fn test_delete_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend.create_table("users", email()).unwrap();

        backend.rename_column("users", "email", "mail").unwrap();
        assert_eq!(
            backend.get_table("users").unwrap().column_names(),
            vec!["id", "mail"]
        );

        let err = backend.rename_column("users", "phone", "mobile").unwrap_err();
        assert!(matches!(err, ApiError::ColumnNotFound { .. }));

        backend.delete_table("users").unwrap();
        assert!(matches!(backend.get_table("users"), Err(ApiError::TableNotFound(_))));
        assert!(matches!(
            backend.delete_table("users"),
            Err(ApiError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_record_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend.create_table("users", email()).unwrap();

        let row = json!({"email": "a@b.com"}).as_object().cloned().unwrap();
        let id = backend.insert_record("users", &row).unwrap();
        assert_eq!(id, 1);

        let page = backend.list_records("users", Page::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0]["email"], json!("a@b.com"));

        backend.delete_record("users", id).unwrap();
        assert!(matches!(
            backend.get_record("users", id),
            Err(ApiError::RecordNotFound { id: 1, .. })
        ));
    }

    #[test]
    fn test_open_syncs_declared_tables() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.dyn");
        let text = dynatable_schema::add_table("", "notes", vec![ColumnDefinition::new("body", "String?")])
            .unwrap();
        std::fs::write(&schema, text).unwrap();

        let backend = backend(&dir);
        assert_eq!(backend.get_table("notes").unwrap().name, "notes");
    }
}
