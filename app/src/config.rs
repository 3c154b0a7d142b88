use std::path::{Path, PathBuf};

/// Server configuration, read from the environment and an optional `.env` file
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub database_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    /// Superuser created at startup when it does not exist yet
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();
        let base = std::env::current_dir()?;
        Self::from_vars(&base, |key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup. Relative paths are
    /// resolved against `base`.
    pub fn from_vars(
        base: &Path,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let resolve = |path: String| -> PathBuf {
            let path = PathBuf::from(path);
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };

        let data_path = resolve(var("DATA_PATH").unwrap_or_else(|| "./data".to_string()));
        let database_path = match var("DATABASE_PATH") {
            Some(path) => resolve(path),
            None => data_path.join("telemetry.db"),
        };

        let api_port = match var("API_PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| format!("Invalid API_PORT {:?}: {}", port, e))?,
            None => 3030,
        };

        let bootstrap_admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        };

        Ok(Self {
            data_path,
            database_path,
            api_host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port,
            bootstrap_admin,
        })
    }

    pub fn logs_path(&self) -> PathBuf {
        self.data_path.join("logs")
    }
}
