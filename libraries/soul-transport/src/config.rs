//! Transport and player configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML file, and `SOUL_TRANSPORT_*` environment variables.

use crate::error::{Result, TransportError};
use crate::types::LoopMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SOUL_TRANSPORT";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Fade duration in milliseconds (0 disables fading, default: 500)
    #[serde(default = "default_fade_duration")]
    pub fade_duration_ms: u64,

    /// Output volume 0.0-1.0 (default: 0.5)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Load timeout in milliseconds (default: 10000)
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Bind the platform media session (default: false)
    #[serde(default)]
    pub media_session: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: default_fade_duration(),
            volume: default_volume(),
            timeout_ms: default_timeout(),
            media_session: false,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(TransportError::Config(format!(
                "volume must be within 0.0-1.0, got {}",
                self.volume
            )));
        }

        if self.timeout_ms == 0 {
            return Err(TransportError::Config(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Player configuration
///
/// Flat so every key maps to one `SOUL_TRANSPORT_<KEY>` variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_fade_duration")]
    pub fade_duration_ms: u64,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub media_session: bool,

    /// Initial loop mode (default: list)
    #[serde(default)]
    pub loop_mode: LoopMode,

    /// Advance to the next track when one ends (default: false)
    #[serde(default)]
    pub auto_next: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            fade_duration_ms: transport.fade_duration_ms,
            volume: transport.volume,
            timeout_ms: transport.timeout_ms,
            media_session: transport.media_session,
            loop_mode: LoopMode::default(),
            auto_next: false,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path.to_path_buf()));
        }

        settings = settings.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = settings
            .build()
            .map_err(|e| TransportError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TransportError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.transport().validate()
    }

    /// Engine part of the configuration
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            fade_duration_ms: self.fade_duration_ms,
            volume: self.volume,
            timeout_ms: self.timeout_ms,
            media_session: self.media_session,
        }
    }
}

fn default_fade_duration() -> u64 {
    500
}

fn default_volume() -> f32 {
    0.5
}

fn default_timeout() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.fade_duration_ms, 500);
        assert_eq!(config.volume, 0.5);
        assert_eq!(config.timeout_ms, 10_000);
        assert!(!config.media_session);
        assert_eq!(config.loop_mode, LoopMode::List);
        assert!(!config.auto_next);
        assert_eq!(config.transport(), TransportConfig::default());
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = TransportConfig {
            volume: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = PlayerConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"loop_mode": "random"}"#).unwrap();
        assert_eq!(config.loop_mode, LoopMode::Random);
        assert_eq!(config.fade_duration_ms, 500);
    }

    // Only test touching SOUL_TRANSPORT_* variables, keeps env mutation contained
    #[test]
    fn load_layers_file_and_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "fade_duration_ms = 250\nloop_mode = \"single\"\nvolume = 0.8").unwrap();

        std::env::set_var("SOUL_TRANSPORT_AUTO_NEXT", "true");
        std::env::set_var("SOUL_TRANSPORT_VOLUME", "0.25");
        let config = PlayerConfig::load(Some(file.path()));
        std::env::remove_var("SOUL_TRANSPORT_AUTO_NEXT");
        std::env::remove_var("SOUL_TRANSPORT_VOLUME");

        let config = config.unwrap();
        assert_eq!(config.fade_duration_ms, 250);
        assert_eq!(config.loop_mode, LoopMode::Single);
        assert_eq!(config.volume, 0.25);
        assert!(config.auto_next);
        assert_eq!(config.timeout_ms, 10_000);
    }
}
