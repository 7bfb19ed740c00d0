mod app;

use std::process::ExitCode;

use tracing::{error, info};

fn main() -> ExitCode {
    app::bootstrap::init_tracing();
    info!("=== Roadbot Startup ===");

    match app::bootstrap::build_app() {
        Ok(wiring) => app::loop_runner::run(wiring),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}
