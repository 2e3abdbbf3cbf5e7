mod loop_runner;
mod metrics;
mod scene;
mod timing;
mod visual;

pub use loop_runner::{
    run_app, run_ticks, AppError, LoopConfig, LoopSummary, StopReason,
};
pub use metrics::LoopMetricsSnapshot;
pub use scene::{
    Entity, EntityId, RenderableDesc, Scene, SceneCommand, SceneWorld, Transform, Vec2,
};
pub use timing::{ease_in_out, Countdown, PollInterval, Stopwatch};
pub use visual::{RenderOrderKey, RenderOrderSlot, VisualKind, VisualNode};
