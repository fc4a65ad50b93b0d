/// SQLite connection pool and schema management
///
/// One database holds users, workflows with their phases and tasks, and the
/// project rows that reference workflows. The schema is created at startup
/// and is safe to initialise repeatedly (uses IF NOT EXISTS).

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the application pool for a `sqlite:` connection string
///
/// Creates the parent directory and the database file when missing, enables
/// foreign keys on every connection, then initialises the schema.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| anyhow::anyhow!("Invalid DATABASE_URL '{}': {}", url, e))?
        .create_if_missing(true)
        .foreign_keys(true);

    if let Some(parent) = Path::new(options.get_filename()).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create database directory '{}': {}", parent.display(), e)
            })?;
        }
    }

    tracing::info!("🗄️ Opening database: {}", options.get_filename().display());
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    init_schema(&pool).await?;
    tracing::info!("✅ Database schema ready");

    Ok(pool)
}

/// Open a private in-memory database
///
/// Limited to a single connection because every SQLite in-memory connection
/// is its own database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and index used by the application
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('ADMIN', 'MANAGER', 'USER')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_search TEXT NOT NULL DEFAULT '',
            description TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            metadata TEXT,
            created_by_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS phases (
            id TEXT PRIMARY KEY,
            workflow_id TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            "order" INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            phase_id TEXT NOT NULL REFERENCES phases(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            priority TEXT NOT NULL DEFAULT 'MEDIUM',
            man_hours REAL,
            form_template TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Projects live outside this service; only the workflow reference matters here
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            workflow_id TEXT REFERENCES workflows(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before the folded search column get it added and backfilled
    let name_search_columns: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('workflows') WHERE name = 'name_search'",
    )
    .fetch_one(pool)
    .await?;
    if name_search_columns == 0 {
        tracing::info!("Adding name_search column to workflows");
        sqlx::query("ALTER TABLE workflows ADD COLUMN name_search TEXT NOT NULL DEFAULT ''")
            .execute(pool)
            .await?;
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, name FROM workflows")
            .fetch_all(pool)
            .await?;
        for (id, name) in rows {
            sqlx::query("UPDATE workflows SET name_search = ? WHERE id = ?")
                .bind(search_key(&name))
                .bind(&id)
                .execute(pool)
                .await?;
        }
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_workflows_name ON workflows(name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_phases_workflow ON phases(workflow_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_phase ON tasks(phase_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_workflow ON projects(workflow_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Case-folded form of a name, used for case-insensitive substring search
///
/// Folding happens in Rust because SQLite's `LOWER` only handles ASCII.
pub fn search_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Current UTC time in the text format stored by every table
///
/// Microsecond precision keeps creation order visible between rows written
/// in quick succession.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
