//! Easel - collaborative whiteboard server

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use easel_net::{Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable naming a config file
const CONFIG_ENV: &str = "EASEL_CONFIG";

/// File name looked up in the platform config directory
const CONFIG_FILE: &str = "server.toml";

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting Easel");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let server = match Server::start(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start server");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %server.addr(), "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    server.shutdown();
    tracing::info!("Easel stopped");
}

fn load_config() -> easel_net::Result<ServerConfig> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let platform = ProjectDirs::from("dev", "easel", "easel")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE));

    match config_path(explicit, from_env, platform.as_deref()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            ServerConfig::load(&path)
        }
        None => {
            tracing::info!("No configuration file found, using defaults");
            Ok(ServerConfig::default())
        }
    }
}

/// Pick the config file: CLI argument, then the environment, then the
/// platform config directory if the file exists there.
fn config_path(
    explicit: Option<PathBuf>,
    from_env: Option<PathBuf>,
    platform: Option<&Path>,
) -> Option<PathBuf> {
    explicit
        .or(from_env)
        .or_else(|| platform.filter(|p| p.is_file()).map(Path::to_path_buf))
}
