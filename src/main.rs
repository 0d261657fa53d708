use chat_relay::modules::{self, logger};
use chat_relay::proxy::AxumServer;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    logger::init_logger();

    let mut config = match modules::load_app_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let overrides = modules::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    if overrides > 0 {
        info!("Applied {} setting(s) from environment", overrides);
    }

    info!("--------------------------------------------------");
    info!("chat-relay {} starting...", env!("CARGO_PKG_VERSION"));
    info!("Listen: {}:{}", config.server.host, config.server.port);
    info!(
        "Access codes: {}",
        if config.access.codes.is_empty() {
            "disabled".to_string()
        } else {
            format!("{} configured", config.access.codes.len())
        }
    );
    info!("Caller keys allowed: {}", !config.access.hide_user_api_key);
    info!("--------------------------------------------------");

    let (server, handle) = match AxumServer::start(&config).await {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start relay: {}", e);
            std::process::exit(1);
        }
    };

    let mut handle = handle;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            server.stop();
        }
        _ = &mut handle => {
            error!("Relay stopped unexpectedly");
            return;
        }
    }
    let _ = handle.await;
}
