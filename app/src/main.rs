use telemetry_server::{config::AppConfig, logging, run};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = match logging::init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("=== Telemetry server starting ===");

    if let Err(e) = run(config).await {
        tracing::error!("Telemetry server stopped with an error: {}", e);
        logging::log_shutdown();
        std::process::exit(1);
    }

    logging::log_shutdown();
}
