use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_app(app.config, app.scene) {
        Ok(summary) => {
            info!(
                ticks_run = summary.ticks_run,
                stop_reason = ?summary.stop_reason,
                tps = summary.metrics.tps,
                tick_time_ms = summary.metrics.tick_time_ms,
                "session_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
