use engine::{resolve_app_paths, ContentPlanRequest, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{load_shop_config, ConfigError, ShopConfig, CONFIG_FILE_NAME};
use super::shop;

const ENABLED_MODS_ENV_VAR: &str = "TEASHOP_ENABLED_MODS";
const MAX_TICKS_ENV_VAR: &str = "TEASHOP_MAX_TICKS";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Tea Shop Startup ===");

    let app_paths = resolve_app_paths()?;
    let mut shop_config = load_shop_config(&app_paths.base_content_dir.join(CONFIG_FILE_NAME))?;
    apply_env_overrides(&mut shop_config);

    let config = loop_config(&shop_config, parse_enabled_mods_from_env());
    info!(
        enabled_mods = ?config.content_plan_request.enabled_mods,
        max_ticks = ?config.max_ticks,
        tutorial_enabled = shop_config.tutorial.enabled,
        "bootstrap_ready"
    );

    Ok(AppWiring {
        config,
        scene: shop::build_shop_scene(shop_config),
    })
}

fn loop_config(shop_config: &ShopConfig, enabled_mods: Vec<String>) -> LoopConfig {
    LoopConfig {
        target_tps: shop_config.session.target_tps,
        max_ticks: shop_config.session.max_ticks,
        realtime: shop_config.session.realtime,
        content_plan_request: ContentPlanRequest {
            enabled_mods,
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        },
        ..LoopConfig::default()
    }
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

fn apply_env_overrides(shop_config: &mut ShopConfig) {
    let Ok(raw) = std::env::var(MAX_TICKS_ENV_VAR) else {
        return;
    };
    match parse_max_ticks(&raw) {
        Some(max_ticks) => shop_config.session.max_ticks = max_ticks,
        None => warn!(var = MAX_TICKS_ENV_VAR, value = %raw, "env_override_invalid"),
    }
}

/// `0` or `none` lifts the tick budget.
fn parse_max_ticks(raw: &str) -> Option<Option<u64>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    match raw.parse::<u64>() {
        Ok(0) => Some(None),
        Ok(ticks) => Some(Some(ticks)),
        Err(_) => None,
    }
}

fn parse_enabled_mods_from_env() -> Vec<String> {
    std::env::var(ENABLED_MODS_ENV_VAR)
        .ok()
        .map(|raw| parse_mod_list(&raw))
        .unwrap_or_default()
}

fn parse_mod_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}
