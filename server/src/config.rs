//! Server configuration.
//!
//! Defines the YAML-serializable configuration for the HTTP server: where it
//! listens, which database and schema file it manages, and how schema
//! changes are migrated. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! listen: "127.0.0.1:3000"
//! database: "dev.db"
//! schema: "schema.dyn"
//! log_level: "info"
//! system_tables:
//!   - _dynatable_migrations
//!   - _prisma_migrations
//!   - sqlite_sequence
//! migration:
//!   mode: in_process
//!   command: []
//!   timeout_secs: 60
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dynatable_sqlite::{CommandMigrator, DEFAULT_SYSTEM_TABLES};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// How schema changes reach the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Generate and run DDL on the server's own connection.
    #[default]
    InProcess,
    /// Run an external migration command.
    Command,
}

/// Migration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Which runner applies schema changes.
    pub mode: MigrationMode,
    /// Argument vector for [`MigrationMode::Command`]; the migration name is
    /// appended as `--name <name>`.
    pub command: Vec<String>,
    /// Seconds an external command may run before it is killed.
    pub timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::InProcess,
            command: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl MigrationConfig {
    /// Builds the external runner, or `None` in in-process mode.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when command mode has no command.
    pub fn command_migrator(&self) -> Result<Option<CommandMigrator>> {
        match self.mode {
            MigrationMode::InProcess => Ok(None),
            MigrationMode::Command => {
                let runner = CommandMigrator::new(&self.command)
                    .map_err(|e| ServerError::Config(e.to_string()))?
                    .with_timeout(Duration::from_secs(self.timeout_secs));
                Ok(Some(runner))
            }
        }
    }
}

/// Top-level server configuration.
///
/// # Examples
///
/// ```
/// use dynatable_server::ServerConfig;
///
/// let config: ServerConfig = serde_yaml::from_str("listen: 0.0.0.0:8080").unwrap();
/// assert_eq!(config.listen, "0.0.0.0:8080");
/// assert_eq!(config.database.to_str(), Some("dev.db"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Configuration format version.
    pub version: String,
    /// Socket address to bind.
    pub listen: String,
    /// SQLite database path; `:memory:` is allowed.
    pub database: PathBuf,
    /// Schema file path.
    pub schema: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Tables hidden from listings and closed to row operations.
    pub system_tables: Vec<String>,
    /// Migration settings.
    pub migration: MigrationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            listen: "127.0.0.1:3000".to_string(),
            database: PathBuf::from("dev.db"),
            schema: PathBuf::from("schema.dyn"),
            log_level: "info".to_string(),
            system_tables: DEFAULT_SYSTEM_TABLES.iter().map(|t| t.to_string()).collect(),
            migration: MigrationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ServerError::IoError) if the file cannot be read,
    /// or [`YamlError`](ServerError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// SQLite connection target as a string, used in the schema header.
    pub fn database_url(&self) -> String {
        self.database.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
listen: "0.0.0.0:8080"
database: "data/app.db"
schema: "data/schema.dyn"
log_level: "debug"
system_tables:
  - _prisma_migrations
migration:
  mode: command
  command: [npx, prisma, migrate, dev]
  timeout_secs: 120
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: ServerConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8080");
        assert_eq!(config.database, PathBuf::from("data/app.db"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.system_tables, vec!["_prisma_migrations"]);
        assert_eq!(config.migration.mode, MigrationMode::Command);
        assert_eq!(config.migration.command.len(), 4);
        assert_eq!(config.migration.timeout_secs, 120);
        assert!(config.migration.command_migrator().unwrap().is_some());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ServerConfig = serde_yaml::from_str("log_level: warn\n").unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.listen, "127.0.0.1:3000");
        assert_eq!(config.schema, PathBuf::from("schema.dyn"));
        assert_eq!(config.migration, MigrationConfig::default());
        assert_eq!(config.system_tables.len(), DEFAULT_SYSTEM_TABLES.len());
        assert!(config.migration.command_migrator().unwrap().is_none());
    }

    #[test]
    fn test_command_mode_requires_command() {
        let config: ServerConfig = serde_yaml::from_str("migration:\n  mode: command\n").unwrap();
        assert!(matches!(
            config.migration.command_migrator(),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynatable.yml");
        let mut config = ServerConfig::default();
        config.listen = "127.0.0.1:4000".to_string();
        config.save(&path).unwrap();

        let loaded = ServerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load_or_default(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        assert!(ServerConfig::load("/nonexistent/path/dynatable.yml").is_err());
    }
}
