use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::ranking::SortField;

/// Environment variables starting with `FORMATRANK_` override file values.
pub const ENV_PREFIX: &str = "FORMATRANK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// Tuning knobs for the ranking engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Per-protocol scores layered over the built-in table (higher is better)
    pub protocol_preference: HashMap<String, f64>,
    /// Score for protocols found in neither table
    pub unknown_protocol_preference: f64,
    /// Prefer open containers (webm/ogg/opus) over mp4/m4a
    pub prefer_free_formats: bool,
    /// Container orders, worst first
    pub video_ext_order: Vec<String>,
    pub free_video_ext_order: Vec<String>,
    pub audio_ext_order: Vec<String>,
    pub free_audio_ext_order: Vec<String>,
    /// Subtracted from the preference of split streams. Off by default;
    /// see [`RankConfig::with_stream_penalties`].
    pub audio_only_penalty: f64,
    pub video_only_penalty: f64,
    /// Applied to f4f/f4m renditions that carry no explicit preference
    pub unsupported_ext_penalty: f64,
    /// Replaces the default sort key order when set
    pub field_preference: Option<Vec<SortField>>,
    /// Never pick anything ranked above this format id
    pub format_limit: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            protocol_preference: HashMap::new(),
            unknown_protocol_preference: -10.0,
            prefer_free_formats: false,
            video_ext_order: strings(&["flv", "webm", "mp4"]),
            free_video_ext_order: strings(&["flv", "mp4", "webm"]),
            audio_ext_order: strings(&["webm", "opus", "ogg", "mp3", "aac", "m4a"]),
            free_audio_ext_order: strings(&["aac", "mp3", "m4a", "webm", "ogg", "opus"]),
            audio_only_penalty: 0.0,
            video_only_penalty: 0.0,
            unsupported_ext_penalty: 0.0,
            field_preference: None,
            format_limit: None,
        }
    }
}

/// Built-in transport ranking: plain HTTP first, RTMP and friends last.
fn builtin_protocol_preference(protocol: &str) -> Option<f64> {
    let score = match protocol {
        "http" | "https" => 0.0,
        "m3u8_native" => -1.0,
        "http_dash_segments" => -2.0,
        "m3u8" => -3.0,
        "f4m" => -4.0,
        "rtmp" => -5.0,
        "rtsp" | "mms" => -6.0,
        _ => return None,
    };
    Some(score)
}

impl RankConfig {
    /// `<config dir>/formatrank/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("formatrank").join("config.toml"))
    }

    /// Layer defaults, a TOML file and `FORMATRANK_*` environment variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                info!("Loading ranking config from: {}", path.display());
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    debug!("Looking for ranking config at: {}", default_path.display());
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Demote audio-only, video-only and f4f/f4m renditions so that muxed
    /// progressive files win, as youtube-dl's comparator does.
    pub fn with_stream_penalties(self) -> Self {
        Self {
            audio_only_penalty: 50.0,
            video_only_penalty: 40.0,
            unsupported_ext_penalty: 0.5,
            ..self
        }
    }

    pub fn protocol_score(&self, protocol: &str) -> f64 {
        self.protocol_preference
            .get(protocol)
            .copied()
            .or_else(|| builtin_protocol_preference(protocol))
            .unwrap_or(self.unknown_protocol_preference)
    }

    pub fn video_ext_order(&self) -> &[String] {
        if self.prefer_free_formats {
            &self.free_video_ext_order
        } else {
            &self.video_ext_order
        }
    }

    pub fn audio_ext_order(&self) -> &[String] {
        if self.prefer_free_formats {
            &self.free_audio_ext_order
        } else {
            &self.audio_ext_order
        }
    }
}
