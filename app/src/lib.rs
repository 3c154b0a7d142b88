//! Telemetry server binary support: configuration, logging and startup.

pub mod config;
pub mod logging;

use config::AppConfig;
use database::{initialize_database, Database, DatabaseConfig};
use std::sync::Arc;
use tracing::{error, info};
use user::CredentialResolver;

/// Create the configured superuser unless an account with that name exists
pub async fn bootstrap_admin(
    db: &Arc<Database>,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some((username, password)) = &config.bootstrap_admin else {
        return Ok(());
    };

    if db.storage().find_user_by_username(username).await?.is_some() {
        info!("Superuser {} already present", username);
        return Ok(());
    }

    CredentialResolver::new(db.clone())
        .register_user(username, password, true)
        .await?;
    info!("Created superuser {}", username);
    Ok(())
}

/// Open the database and serve the API until the server stops or Ctrl-C
/// is received
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Data path: {:?}", config.data_path);
    std::fs::create_dir_all(&config.data_path)?;

    let db = initialize_database(DatabaseConfig::new_with_path(config.database_path.clone()))
        .await?;
    bootstrap_admin(&db, &config).await?;

    let api_config = api::ApiConfig::new()
        .with_host(config.api_host.clone())
        .with_port(config.api_port);

    tokio::select! {
        result = api::start_server_with_config(db, api_config) => {
            if let Err(e) = result {
                error!("API server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
