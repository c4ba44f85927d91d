use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// How rows are marshalled for bridge callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowShape {
    /// `{"column": value, ...}`
    #[default]
    Object,
    /// `[value, ...]` in column order
    Array,
}

/// What `close` does when statements prepared on the database are still open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloseBehavior {
    /// Fail the close; the database stays open and usable.
    #[default]
    Refuse,
    /// Finalize the outstanding statements, then close.
    FinalizeStatements,
}

/// Options for the bridge adapter and every database it opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Relative filenames are resolved against this directory when set.
    pub base_dir: Option<PathBuf>,
    pub journal_mode_wal: bool,
    pub busy_timeout: Option<Duration>,
    pub foreign_keys: bool,
    pub row_shape: RowShape,
    pub close_behavior: CloseBehavior,
    pub database_id_prefix: String,
    pub statement_id_prefix: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            base_dir: None,
            journal_mode_wal: true,
            busy_timeout: Some(Duration::from_millis(5000)),
            foreign_keys: false,
            row_shape: RowShape::Object,
            close_behavior: CloseBehavior::Refuse,
            database_id_prefix: "db".into(),
            statement_id_prefix: "stmt".into(),
        }
    }
}

impl BridgeOptions {
    #[must_use]
    pub fn builder() -> BridgeOptionsBuilder {
        BridgeOptionsBuilder::new()
    }

    /// Map a caller-supplied filename onto the path handed to `SQLite`.
    ///
    /// In-memory names and `file:` URIs pass through untouched.
    #[must_use]
    pub fn resolve_path(&self, filename: &str) -> PathBuf {
        if filename == ":memory:" || filename.starts_with("file:") {
            return PathBuf::from(filename);
        }
        let path = Path::new(filename);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Apply connection-level pragmas right after open.
    ///
    /// # Errors
    /// Returns `BridgeError` if a PRAGMA cannot be executed.
    pub fn apply_pragmas(&self, conn: &Connection) -> Result<(), BridgeError> {
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        if self.journal_mode_wal {
            // in-memory databases stay in "memory" mode
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        if self.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        Ok(())
    }
}

/// Fluent builder for [`BridgeOptions`].
#[derive(Debug, Clone, Default)]
pub struct BridgeOptionsBuilder {
    opts: BridgeOptions,
}

impl BridgeOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.opts.base_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn journal_mode_wal(mut self, enabled: bool) -> Self {
        self.opts.journal_mode_wal = enabled;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn row_shape(mut self, shape: RowShape) -> Self {
        self.opts.row_shape = shape;
        self
    }

    #[must_use]
    pub fn close_behavior(mut self, behavior: CloseBehavior) -> Self {
        self.opts.close_behavior = behavior;
        self
    }

    #[must_use]
    pub fn id_prefixes(mut self, database: impl Into<String>, statement: impl Into<String>) -> Self {
        self.opts.database_id_prefix = database.into();
        self.opts.statement_id_prefix = statement.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> BridgeOptions {
        self.opts
    }

    /// Spawn a bridge module on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Unavailable` outside a tokio runtime.
    pub fn build(self) -> Result<crate::bridge::BridgeModule, BridgeError> {
        crate::bridge::BridgeModule::spawn(self.finish())
    }
}
