use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    build_or_load_recipe_database, resolve_app_paths, ContentPipelineError, ContentPlanRequest,
    StartupError,
};

use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator};
use super::{Scene, SceneCommand, SceneWorld};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    /// `None` runs until the scene asks to quit.
    pub max_ticks: Option<u64>,
    /// When set, ticks are paced against the wall clock instead of running
    /// back to back.
    pub realtime: bool,
    pub metrics_log_interval: Duration,
    pub content_plan_request: ContentPlanRequest,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_ticks: None,
            realtime: false,
            metrics_log_interval: Duration::from_secs(1),
            content_plan_request: ContentPlanRequest::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to build or load content database: {0}")]
    ContentPipeline(#[from] ContentPipelineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SceneQuit,
    TickBudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub stop_reason: StopReason,
    /// Averages over the whole run.
    pub metrics: LoopMetricsSnapshot,
}

pub fn run_app(config: LoopConfig, mut scene: Box<dyn Scene>) -> Result<LoopSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        mods_dir = %app_paths.mods_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );
    let recipe_database = build_or_load_recipe_database(&app_paths, &config.content_plan_request)?;

    let mut world = SceneWorld::default();
    world.set_recipe_database(recipe_database);
    scene.load(&mut world);
    world.apply_pending();
    info!(entity_count = world.entity_count(), "scene_loaded");

    let summary = run_ticks(&config, scene.as_mut(), &mut world);

    scene.unload(&mut world);
    world.clear();
    info!(
        ticks_run = summary.ticks_run,
        stop_reason = ?summary.stop_reason,
        tps = summary.metrics.tps,
        tick_time_ms = summary.metrics.tick_time_ms,
        "shutdown"
    );
    Ok(summary)
}

/// Drives an already loaded scene at a fixed step until it quits or the tick
/// budget runs out.
pub fn run_ticks(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    world: &mut SceneWorld,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    info!(
        target_tps,
        max_ticks = ?config.max_ticks,
        realtime = config.realtime,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut next_deadline = Instant::now();
    let mut ticks_run = 0u64;
    let mut last_title: Option<String> = None;

    loop {
        if config.max_ticks.is_some_and(|budget| ticks_run >= budget) {
            return LoopSummary {
                ticks_run,
                stop_reason: StopReason::TickBudgetExhausted,
                metrics: metrics_accumulator.session_snapshot(Instant::now()),
            };
        }

        let tick_start = Instant::now();
        let command = scene.update(fixed_dt_seconds, world);
        world.apply_pending();
        ticks_run = ticks_run.saturating_add(1);
        metrics_accumulator.record_tick(tick_start.elapsed());

        let title = scene.debug_title(world);
        if title != last_title {
            if let Some(title) = &title {
                info!(title = %title, "scene_title");
            }
            last_title = title;
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                total_ticks = snapshot.total_ticks,
                entity_count = world.entity_count(),
                "loop_metrics"
            );
        }

        if command == SceneCommand::Quit {
            return LoopSummary {
                ticks_run,
                stop_reason: StopReason::SceneQuit,
                metrics: metrics_accumulator.session_snapshot(Instant::now()),
            };
        }

        if config.realtime {
            next_deadline += fixed_dt;
            let now = Instant::now();
            if next_deadline > now {
                thread::sleep(next_deadline - now);
            } else if now.saturating_duration_since(next_deadline) > fixed_dt * 5 {
                warn!(
                    behind_ms = now.saturating_duration_since(next_deadline).as_millis() as u64,
                    "loop_behind_schedule"
                );
                next_deadline = now;
            }
        }
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
