use std::process::ExitCode;

use frame_engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring { config, mut game } = app;
    match run_app(&config, &mut game) {
        Ok(code) => {
            info!(exit_code = code, "spacewar_exited");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(err) => {
            error!(error = %err, severity = ?err.severity(), "startup_failed");
            ExitCode::FAILURE
        }
    }
}
