//! Shared test utilities for brace integration tests.
//!
//! Each test gets its own SQLite database file inside a temporary
//! directory. The directory (and the database with it) is removed when the
//! returned [`TestDb`] is dropped.

use sqlx::SqlitePool;
use tempfile::TempDir;

use brace_db::config::DbConfig;
use brace_db::pool;

/// A migrated throw-away database.
pub struct TestDb {
    pub pool: SqlitePool,
    pub config: DbConfig,
    /// Held to keep the directory alive for the lifetime of the pool.
    _dir: TempDir,
}

impl TestDb {
    /// Close the pool. The files are removed when `self` drops.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Create a temporary database with migrations applied.
pub async fn create_test_db() -> TestDb {
    let (pool, config, dir) = create_unmigrated_db().await;

    pool::run_migrations(&pool)
        .await
        .expect("migrations should succeed");

    TestDb {
        pool,
        config,
        _dir: dir,
    }
}

/// Create a temporary database without running migrations.
///
/// Returns the pool, its config and the directory guard.
pub async fn create_unmigrated_db() -> (SqlitePool, DbConfig, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let config = DbConfig::for_path(dir.path().join("brace_test.db"));

    let pool = pool::create_pool(&config)
        .await
        .unwrap_or_else(|e| panic!("failed to open temp database {}: {e}", config.database_url));

    (pool, config, dir)
}
