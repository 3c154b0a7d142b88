use crate::{Database, DatabaseError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Database initialization configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Whether to create tables on initialization
    pub create_tables: bool,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data").join("telemetry.db"),
            create_tables: true,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration with default paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new database configuration with a specific database path
    pub fn new_with_path(database_path: PathBuf) -> Self {
        Self {
            database_path,
            ..Self::default()
        }
    }

    /// Set a custom database path
    pub fn with_database_path(mut self, path: PathBuf) -> Self {
        self.database_path = path;
        self
    }

    /// Set whether to create tables on initialization
    pub fn with_create_tables(mut self, create: bool) -> Self {
        self.create_tables = create;
        self
    }

    /// Set the pool size
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

/// Initialize the database with the given configuration
pub async fn initialize_database(config: DatabaseConfig) -> Result<Arc<Database>> {
    info!("Initializing database with configuration");

    // Ensure the data directory exists
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            info!("Created data directory at: {:?}", parent);
        }
    }

    let db_path_str = config
        .database_path
        .to_str()
        .ok_or_else(|| DatabaseError::Other("Invalid database path".into()))?;

    let db = Database::with_max_connections(db_path_str, config.max_connections).await?;
    info!("Database connection established");

    if config.create_tables {
        db.migrate().await?;
    }

    Ok(Arc::new(db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data").join("test.db");

        let config = DatabaseConfig::new()
            .with_database_path(db_path.clone())
            .with_max_connections(2);

        let db = initialize_database(config).await.unwrap();

        assert!(db_path.exists());
        assert!(db.table_exists("sensors").await.unwrap());

        assert!(db.pool().acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_initialization_without_tables() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new_with_path(temp_dir.path().join("bare.db"))
            .with_create_tables(false);

        let db = initialize_database(config).await.unwrap();
        assert!(!db.table_exists("projects").await.unwrap());
    }

    #[test]
    fn test_config_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.create_tables);
        assert_eq!(config.max_connections, 5);
        assert!(config.database_path.ends_with("telemetry.db"));
    }
}
