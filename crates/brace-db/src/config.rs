use std::env;
use std::path::{Path, PathBuf};

/// Database configuration.
///
/// Reads from the `BRACE_DATABASE_URL` environment variable, falling back to
/// a SQLite file under the platform data directory when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full SQLite connection URL (`sqlite://<path>` or `sqlite::memory:`).
    pub database_url: String,
}

impl DbConfig {
    /// Environment variable consulted by [`Self::from_env`].
    pub const ENV_VAR: &str = "BRACE_DATABASE_URL";

    /// URL of a private in-memory database.
    pub const MEMORY_URL: &str = "sqlite::memory:";

    /// The default connection URL used when no environment variable is set.
    ///
    /// `sqlite://<data dir>/brace/brace.db`, or `./brace.db` when the
    /// platform has no data directory.
    pub fn default_url() -> String {
        let path = dirs::data_dir()
            .map(|d| d.join("brace").join("brace.db"))
            .unwrap_or_else(|| PathBuf::from("brace.db"));
        format!("sqlite://{}", path.display())
    }

    /// Build a config from the environment.
    ///
    /// Priority: `BRACE_DATABASE_URL` env var, then [`Self::default_url`].
    pub fn from_env() -> Self {
        let database_url = env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::default_url());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Build a config pointing at a database file.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self::new(format!("sqlite://{}", path.as_ref().display()))
    }

    /// Whether the URL names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Extract the database file path from the URL.
    ///
    /// Returns `None` for in-memory databases and for URLs that are not
    /// `sqlite:` URLs. Query parameters (`?mode=rwc`) are stripped.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.is_memory() {
            return None;
        }
        let rest = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().filter(|s| !s.is_empty())?;
        Some(PathBuf::from(path))
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
