//! Database initialization
//!
//! Opens (creating if needed) the SQLite results database and makes sure
//! both append-only result tables exist. Safe to run on every start-up.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Table holding one row per annotated stereotype item
pub const ANNOTATIONS_TABLE: &str = "annotations";
/// Table holding one row per (participant, target region) familiarity rating
pub const FAMILIARITY_TABLE: &str = "familiarity";

/// How long a writer waits on a locked database before failing
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Applied to every pooled connection, not just the first one
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Limited to a single connection that is never recycled: every SQLite
/// `:memory:` connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create both result tables (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_annotations_table(pool).await?;
    create_familiarity_table(pool).await?;
    Ok(())
}

async fn create_annotations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            native_region TEXT NOT NULL,
            target_region TEXT NOT NULL,
            participant_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            sex TEXT NOT NULL,
            category TEXT NOT NULL,
            superset_attribute TEXT NOT NULL,
            annotation TEXT NOT NULL
                CHECK (annotation IN ('Stereotype', 'Not a Stereotype', 'Not sure')),
            offensiveness_rating INTEGER NOT NULL DEFAULT -1
                CHECK (offensiveness_rating BETWEEN -1 AND 5),
            timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotations_target ON annotations(target_region)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_familiarity_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS familiarity (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            native_region TEXT NOT NULL,
            target_region TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 0 AND 5),
            participant_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            sex TEXT NOT NULL,
            timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
