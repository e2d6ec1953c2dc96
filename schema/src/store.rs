//! Durable schema file access.
//!
//! [`SchemaStore`] reads the schema file in full and writes it in full. A
//! write goes to a sibling temporary file first and is then renamed over
//! the original, so a crash mid-write leaves the previous schema intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::document::SchemaDocument;
use crate::error::Result;

/// Handle to the schema file on disk.
///
/// # Examples
///
/// ```no_run
/// use dynatable_schema::SchemaStore;
///
/// let store = SchemaStore::new("schema.dyn");
/// let doc = store.load().unwrap();
/// for name in doc.table_names() {
///     println!("{name}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SchemaStore {
    path: PathBuf,
}

impl SchemaStore {
    /// Creates a handle for the schema file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the schema file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw schema text. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SchemaError::IoError) for any read failure
    /// other than the file not existing.
    pub fn read_text(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads and parses the schema file.
    pub fn load(&self) -> Result<SchemaDocument> {
        SchemaDocument::parse(&self.read_text()?)
    }

    /// Replaces the schema file with `text`.
    pub fn write_text(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, text)?;
        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), bytes = text.len(), "Schema file written");
        Ok(())
    }

    /// Serializes and writes `doc`.
    pub fn save(&self, doc: &SchemaDocument) -> Result<()> {
        self.write_text(&doc.to_string())
    }

    /// Writes `header` as the initial schema if no schema file exists yet.
    ///
    /// Returns `true` when a new file was created.
    pub fn init(&self, header: &str) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.write_text(header)?;
        Ok(true)
    }
}

/// Default schema header for a SQLite-backed store.
pub fn default_header(database_url: &str) -> String {
    format!("datasource db {{\n  provider = \"sqlite\"\n  url      = \"file:{database_url}\"\n}}\n")
}

/// SHA-256 hex digest of schema text.
///
/// Recorded alongside each applied migration so the history shows which
/// schema version a change produced.
pub fn checksum(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path().join("schema.dyn"));
        assert_eq!(store.read_text().unwrap(), "");
        assert!(store.load().unwrap().tables().is_empty());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("schema.dyn");
        let store = SchemaStore::new(&path);
        store.write_text("model a {\n  id Int\n}\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "model a {\n  id Int\n}\n");
        assert!(!dir.path().join("nested").join("schema.dyn.tmp").exists());
    }

    #[test]
    fn test_init_only_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path().join("schema.dyn"));
        assert!(store.init(&default_header("dev.db")).unwrap());
        store.write_text("// changed\n").unwrap();
        assert!(!store.init(&default_header("dev.db")).unwrap());
        assert_eq!(store.read_text().unwrap(), "// changed\n");
    }

    #[test]
    fn test_default_header_parses_without_tables() {
        let doc = SchemaDocument::parse(&default_header("dev.db")).unwrap();
        assert!(doc.tables().is_empty());
        assert_eq!(doc.to_string(), default_header("dev.db"));
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let a = checksum("model a {}\n");
        assert_eq!(a.len(), 64);
        assert_eq!(a, checksum("model a {}\n"));
        assert_ne!(a, checksum("model b {}\n"));
    }
}
