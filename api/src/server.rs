use crate::{create_router, AppState};
use std::sync::Arc;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
        }
    }
}

impl ApiConfig {
    /// Create a new API configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

/// Start the API server with the given configuration
pub async fn start_server_with_config(
    db: Arc<database::Database>,
    config: ApiConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(db);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on {}", addr);
    info!(
        "Swagger UI available at http://localhost:{}/api/v1/swagger",
        config.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
