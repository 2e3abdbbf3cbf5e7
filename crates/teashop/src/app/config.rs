use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::shop::{ServeTuning, TutorialSettings, DEFAULT_REQUIRED_STEEPS};

pub(crate) const CONFIG_FILE_NAME: &str = "teashop.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ShopConfig {
    pub(crate) serve: ServeConfig,
    pub(crate) tutorial: TutorialConfig,
    pub(crate) grading: GradingConfig,
    pub(crate) session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServeConfig {
    pub(crate) render_order_boost: i32,
    pub(crate) slide_seconds: f32,
    pub(crate) fade_seconds: f32,
    pub(crate) request_replacement: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        let tuning = ServeTuning::default();
        Self {
            render_order_boost: tuning.render_order_boost,
            slide_seconds: tuning.slide_seconds,
            fade_seconds: tuning.fade_seconds,
            request_replacement: tuning.request_replacement,
        }
    }
}

impl ServeConfig {
    pub(crate) fn tuning(&self) -> ServeTuning {
        ServeTuning {
            render_order_boost: self.render_order_boost,
            slide_seconds: self.slide_seconds,
            fade_seconds: self.fade_seconds,
            request_replacement: self.request_replacement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TutorialConfig {
    pub(crate) enabled: bool,
    pub(crate) recipe_def: String,
    pub(crate) poll_interval_seconds: f32,
    pub(crate) reminder_after_seconds: f32,
    pub(crate) scripted_prompt_seconds: f32,
}

impl Default for TutorialConfig {
    fn default() -> Self {
        let settings = TutorialSettings::default();
        Self {
            enabled: true,
            recipe_def: "tea.lavender_hot".to_string(),
            poll_interval_seconds: settings.poll_interval_seconds,
            reminder_after_seconds: settings.reminder_after_seconds,
            scripted_prompt_seconds: settings.scripted_prompt_seconds,
        }
    }
}

impl TutorialConfig {
    pub(crate) fn settings(&self) -> TutorialSettings {
        TutorialSettings {
            poll_interval_seconds: self.poll_interval_seconds,
            reminder_after_seconds: self.reminder_after_seconds,
            scripted_prompt_seconds: self.scripted_prompt_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GradingConfig {
    /// Soft mismatches tolerated before a drink fails; absent means no limit.
    pub(crate) max_soft_mismatches_for_good: Option<u32>,
    pub(crate) required_steeps: u32,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            max_soft_mismatches_for_good: None,
            required_steeps: DEFAULT_REQUIRED_STEEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SessionConfig {
    pub(crate) target_tps: u32,
    pub(crate) max_ticks: Option<u64>,
    pub(crate) realtime: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks: Some(7_200),
            realtime: false,
        }
    }
}

/// Reads `path`, falling back to defaults when the file does not exist.
pub(crate) fn load_shop_config(path: &Path) -> Result<ShopConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config_defaults_used");
            return Ok(ShopConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = parse_shop_config(path, &raw)?;
    validate(&config)?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

fn parse_shop_config(path: &Path, raw: &str) -> Result<ShopConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ShopConfig>(&mut deserializer).map_err(|error| {
        let json_path = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            json_path,
            source: error.into_inner(),
        }
    })
}

fn validate(config: &ShopConfig) -> Result<(), ConfigError> {
    non_negative("serve.slide_seconds", config.serve.slide_seconds)?;
    non_negative("serve.fade_seconds", config.serve.fade_seconds)?;
    non_negative(
        "tutorial.reminder_after_seconds",
        config.tutorial.reminder_after_seconds,
    )?;
    non_negative(
        "tutorial.scripted_prompt_seconds",
        config.tutorial.scripted_prompt_seconds,
    )?;
    if !(config.tutorial.poll_interval_seconds.is_finite()
        && config.tutorial.poll_interval_seconds > 0.0)
    {
        return Err(ConfigError::Invalid {
            field: "tutorial.poll_interval_seconds",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.grading.required_steeps == 0 {
        return Err(ConfigError::Invalid {
            field: "grading.required_steeps",
            message: "must be at least 1".to_string(),
        });
    }
    if config.session.target_tps == 0 {
        return Err(ConfigError::Invalid {
            field: "session.target_tps",
            message: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("expected a finite non-negative number, got {value}"),
        })
    }
}
