//! Migration through an external command.
//!
//! [`CommandMigrator`] hands each change to a configured tool, appending
//! `--name <migration>` to its arguments, and waits for it to exit. The
//! tool is expected to read the schema file itself.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::Utc;
use dynatable_schema::checksum;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::{Result, SqliteError};
use crate::migration::{MigrationReport, MigrationRunner, SchemaChange};

/// Default time an external migration may run.
pub const DEFAULT_MIGRATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs an external migration tool for every change.
#[derive(Debug, Clone)]
pub struct CommandMigrator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandMigrator {
    /// Builds a runner from an argv list, e.g.
    /// `["npx", "prisma", "migrate", "dev"]`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::MigrationError`] if `argv` is empty.
    pub fn new(argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            SqliteError::MigrationError("migration command is empty".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: DEFAULT_MIGRATION_TIMEOUT,
            working_dir: None,
        })
    }

    /// Builder: sets how long the tool may run before it is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: runs the tool from `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument list for one migration.
    fn argv(&self, migration: &str) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push("--name".to_string());
        argv.push(migration.to_string());
        argv
    }

    fn run(&self, migration: &str) -> Result<()> {
        let args = self.argv(migration);
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!(program = %self.program, ?args, "Spawning migration command");
        let mut child = command.spawn().map_err(|e| {
            SqliteError::MigrationError(format!("failed to start {}: {e}", self.program))
        })?;

        // Drain both pipes so a chatty tool cannot block on a full buffer.
        let stdout_thread = child.stdout.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });
        let stderr_thread = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(
                    program = %self.program,
                    timeout_secs = self.timeout.as_secs(),
                    "Migration command timed out, killing process"
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(SqliteError::MigrationError(format!(
                    "{migration}: timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SqliteError::MigrationError(format!(
                    "{migration}: wait failed: {e}"
                )));
            }
        };

        let stdout = stdout_thread
            .and_then(|t| t.join().ok())
            .unwrap_or_default();
        let stderr = stderr_thread
            .and_then(|t| t.join().ok())
            .unwrap_or_default();
        debug!(
            stdout = %String::from_utf8_lossy(&stdout).trim(),
            "Migration command output"
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            let code = status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(SqliteError::MigrationError(format!(
                "{migration}: exited with {code}: {stderr}"
            )));
        }
        Ok(())
    }
}

impl MigrationRunner for CommandMigrator {
    fn apply(&mut self, change: &SchemaChange, schema_text: &str) -> Result<MigrationReport> {
        let name = change.migration_name();
        self.run(&name)?;
        info!(migration = %name, program = %self.program, "External migration applied");
        Ok(MigrationReport {
            name,
            statements: Vec::new(),
            checksum: checksum(schema_text),
            applied_at: Utc::now().to_rfc3339(),
        })
    }
}
