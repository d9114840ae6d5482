//! Engine configuration (§3 "Ambient: configuration types").
//!
//! Mirrors the teacher's `database/builder.rs` fluent pattern, trimmed to the
//! knobs this engine actually has: no durability modes, no config file, since
//! the store is purely in-memory and never touches a filesystem.

use docdb_core::DEFAULT_DATABASE;

/// Default number of documents returned in a cursor's first batch/`getMore`
/// batch when the command omits `batchSize`.
pub const DEFAULT_CURSOR_BATCH_SIZE: usize = 101;

/// Upper bound on `batchSize`, regardless of what the client requests.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Engine-wide configuration, built via [`DatabaseConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    default_database: String,
    default_cursor_batch_size: usize,
    max_batch_size: usize,
}

impl DatabaseConfig {
    /// Starts a [`DatabaseConfigBuilder`] with the engine's defaults.
    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::new()
    }

    /// The database name used when a command omits `$db`.
    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Batch size used when a command omits `batchSize`.
    pub fn default_cursor_batch_size(&self) -> usize {
        self.default_cursor_batch_size
    }

    /// Hard ceiling on any requested `batchSize`.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            default_database: DEFAULT_DATABASE.to_string(),
            default_cursor_batch_size: DEFAULT_CURSOR_BATCH_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Fluent builder for [`DatabaseConfig`].
#[derive(Debug, Clone)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    /// Starts from the engine's defaults.
    pub fn new() -> Self {
        DatabaseConfigBuilder {
            config: DatabaseConfig::default(),
        }
    }

    /// Sets the database used when a command omits `$db`.
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.config.default_database = name.into();
        self
    }

    /// Sets the batch size used when a command omits `batchSize`.
    pub fn default_cursor_batch_size(mut self, size: usize) -> Self {
        self.config.default_cursor_batch_size = size;
        self
    }

    /// Sets the hard ceiling on any requested `batchSize`.
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    /// Builds the immutable [`DatabaseConfig`].
    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}

impl Default for DatabaseConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
