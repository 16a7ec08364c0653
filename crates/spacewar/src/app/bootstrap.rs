use frame_engine::{load_config, EngineConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::spacewar::Spacewar;

const WINDOW_TITLE: &str = "Spacewar";

pub(crate) struct AppWiring {
    pub(crate) config: EngineConfig,
    pub(crate) game: Spacewar,
}

/// `None` when the configuration could not be loaded; the error is already logged.
pub(crate) fn build_app() -> Option<AppWiring> {
    init_tracing();
    info!("=== Spacewar Startup ===");

    let mut config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, severity = ?err.severity(), "config_failed");
            return None;
        }
    };
    if config.window_title == EngineConfig::default().window_title {
        config.window_title = WINDOW_TITLE.to_string();
    }

    let game = Spacewar::new(config.width, config.height);
    Some(AppWiring { config, game })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
