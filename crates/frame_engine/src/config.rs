use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::app::{FramePacing, SurfaceSettings};
use crate::ErrorSeverity;

/// Optional path to a JSON file with [`EngineConfig`] fields.
pub const CONFIG_ENV_VAR: &str = "FRAME_ENGINE_CONFIG";
pub const TARGET_FPS_ENV_VAR: &str = "FRAME_ENGINE_TARGET_FPS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub window_title: String,
    pub window_class: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    /// Minimum fullscreen refresh rate; 0 accepts any.
    pub refresh_rate_hz: u32,
    pub target_fps: f32,
    pub min_fps: f32,
    pub lost_device_backoff_ms: u64,
    pub metrics_log_interval_ms: u64,
    pub vsync: bool,
    pub force_software_vertex: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_title: "Frame Engine".to_string(),
            window_class: "FrameEngineWindow".to_string(),
            width: 640,
            height: 480,
            fullscreen: false,
            refresh_rate_hz: 0,
            target_fps: 200.0,
            min_fps: 10.0,
            lost_device_backoff_ms: 100,
            metrics_log_interval_ms: 1000,
            vsync: false,
            force_software_vertex: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file '{}' does not exist", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file '{}' at {field}: {source}", path.display())]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// A missing file falls back to defaults; anything the user wrote but got wrong stops startup.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ConfigError::Missing { .. } => ErrorSeverity::Warning,
            ConfigError::Read { .. } | ConfigError::Parse { .. } => ErrorSeverity::Fatal,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(path, &raw)
    }

    fn from_json_str(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, EngineConfig>(&mut deserializer).map_err(|error| {
            let field = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                field,
                source: error.into_inner(),
            }
        })
    }

    pub fn pacing(&self) -> FramePacing {
        FramePacing::from_rates(self.target_fps, self.min_fps)
    }

    pub fn surface_settings(&self) -> SurfaceSettings {
        SurfaceSettings {
            width: self.width,
            height: self.height,
            fullscreen: self.fullscreen,
            refresh_rate_hz: self.refresh_rate_hz,
            vsync: self.vsync,
        }
    }

    pub fn lost_device_backoff(&self) -> Duration {
        Duration::from_millis(self.lost_device_backoff_ms)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        if self.metrics_log_interval_ms == 0 {
            return Duration::from_secs(1);
        }
        Duration::from_millis(self.metrics_log_interval_ms)
    }
}

/// Reads the config named by [`CONFIG_ENV_VAR`] (defaults when unset) and applies
/// the [`TARGET_FPS_ENV_VAR`] override.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    let path = match env::var(CONFIG_ENV_VAR) {
        Ok(value) => Some(PathBuf::from(value)),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = CONFIG_ENV_VAR,
                error = %err,
                "unable to read config env var; using defaults"
            );
            None
        }
    };
    let target_fps_override = match env::var(TARGET_FPS_ENV_VAR) {
        Ok(value) => Some(value),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!(
                env_var = TARGET_FPS_ENV_VAR,
                error = %err,
                "unable to read target-fps env var; falling back to config"
            );
            None
        }
    };
    load_config_from(path.as_deref(), target_fps_override.as_deref())
}

fn load_config_from(
    path: Option<&Path>,
    target_fps_override: Option<&str>,
) -> Result<EngineConfig, ConfigError> {
    let mut config = match path.map(EngineConfig::from_file) {
        None => EngineConfig::default(),
        Some(Ok(config)) => config,
        Some(Err(error)) if error.severity() == ErrorSeverity::Warning => {
            warn!(error = %error, "config_fallback_to_defaults");
            EngineConfig::default()
        }
        Some(Err(error)) => return Err(error),
    };
    config.target_fps = resolve_target_fps(config.target_fps, target_fps_override);

    info!(
        source = %path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
        width = config.width,
        height = config.height,
        fullscreen = config.fullscreen,
        target_fps = config.target_fps,
        min_fps = config.min_fps,
        vsync = config.vsync,
        "config_loaded"
    );
    Ok(config)
}

fn resolve_target_fps(config_target_fps: f32, env_value: Option<&str>) -> f32 {
    let Some(value) = env_value else {
        return config_target_fps;
    };
    match value.trim().parse::<f32>() {
        Ok(fps) if fps.is_finite() && fps >= 1.0 => fps,
        _ => {
            warn!(
                env_var = TARGET_FPS_ENV_VAR,
                value,
                "invalid target-fps env var value; falling back to config"
            );
            config_target_fps
        }
    }
}
