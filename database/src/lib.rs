use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub mod error;
pub mod init;
pub mod measurements;
pub mod models;
pub mod snapshot;
pub mod storage;

pub use error::{DatabaseError, Result};

pub use models::{
    AccessTokenRecord, GroupUpdate, Measurement, MeasurementKind, MeasurementPoint,
    MeasurementSeries, NewGroup, NewMeasurement, NewProject, Node, NodeTree, Project, ProjectTree,
    Sensor, SensorType, UserRecord, Zone, ZoneTree,
};

pub use init::{initialize_database, DatabaseConfig};
pub use storage::IotStorage;

/// Schema of the telemetry store. Every child row cascades with its parent,
/// grant rows cascade with either side.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        is_superuser INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS access_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        snippet_title TEXT NOT NULL DEFAULT '',
        snippet_image TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS zones (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zone_id INTEGER NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sensors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        zone_id INTEGER NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
        node_id INTEGER REFERENCES nodes(id) ON DELETE CASCADE,
        ambiental INTEGER NOT NULL,
        sensor_type TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sensor_id INTEGER NOT NULL REFERENCES sensors(id) ON DELETE CASCADE,
        measurement_type TEXT NOT NULL,
        value REAL NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS project_access_keys (
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        token_id INTEGER NOT NULL REFERENCES access_tokens(id) ON DELETE CASCADE,
        PRIMARY KEY (project_id, token_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS zone_access_keys (
        zone_id INTEGER NOT NULL REFERENCES zones(id) ON DELETE CASCADE,
        token_id INTEGER NOT NULL REFERENCES access_tokens(id) ON DELETE CASCADE,
        PRIMARY KEY (zone_id, token_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS node_access_keys (
        node_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
        token_id INTEGER NOT NULL REFERENCES access_tokens(id) ON DELETE CASCADE,
        PRIMARY KEY (node_id, token_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_zones_project ON zones(project_id)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_zone ON nodes(zone_id)",
    "CREATE INDEX IF NOT EXISTS idx_sensors_zone ON sensors(zone_id)",
    "CREATE INDEX IF NOT EXISTS idx_sensors_node ON sensors(node_id)",
    "CREATE INDEX IF NOT EXISTS idx_measurements_sensor ON measurements(sensor_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_project_keys_token ON project_access_keys(token_id)",
    "CREATE INDEX IF NOT EXISTS idx_zone_keys_token ON zone_access_keys(token_id)",
    "CREATE INDEX IF NOT EXISTS idx_node_keys_token ON node_access_keys(token_id)",
];

/// Database connection pool
#[derive(Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::with_max_connections(database_path, 5).await
    }

    /// Create a new database connection with a bounded pool
    pub async fn with_max_connections(database_path: &str, max_connections: u32) -> Result<Self> {
        // Ensure the data directory exists
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Connecting to database at: {}", database_path);

        let connection_string = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite://{}", database_path)
        };

        debug!("Using connection string: {}", connection_string);

        // Cascades rely on foreign key enforcement, which SQLite enables per connection
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        debug!("Database connection established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create every table and index of the telemetry schema
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        }
        info!("Database migrations completed");
        Ok(())
    }

    /// Check if a table exists
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let query = r#"
            SELECT COUNT(*) as count
            FROM sqlite_master
            WHERE type='table' AND name=?
        "#;

        let result: (i32,) = sqlx::query_as(query)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0 > 0)
    }

    /// Storage operations over this database
    pub fn storage(&self) -> IotStorage<'_> {
        IotStorage::new(self)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// A migrated database in a temporary directory. Keep the directory alive
    /// for as long as the database is used.
    pub async fn migrated_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("telemetry_test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        db.migrate().await.unwrap();
        (temp_dir, db)
    }
}
