use std::env;
use std::path::PathBuf;

use roadbot_engine::{resolve_app_paths, LoopConfig, SimConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::session::SessionError;

const MAPS_ENV_VAR: &str = "ROADBOT_MAPS";
const STEP_SIZE_ENV_VAR: &str = "ROADBOT_STEP_SIZE";
const SUMMARY_ENV_VAR: &str = "ROADBOT_SUMMARY";
const DEFAULT_SESSION: &str = "first_win.session";

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) sim_config: SimConfig,
    pub(crate) maps_file: PathBuf,
    pub(crate) session_file: PathBuf,
    pub(crate) summary_file: Option<PathBuf>,
}

pub(crate) fn build_app() -> Result<AppWiring, SessionError> {
    let paths = resolve_app_paths()?;
    let maps_file = env_path(MAPS_ENV_VAR).unwrap_or(paths.maps_file);
    let session_file = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.sessions_dir.join(DEFAULT_SESSION));
    let step_size = parse_step_size(env::var(STEP_SIZE_ENV_VAR).ok().as_deref());

    info!(
        root = %paths.root.display(),
        maps_file = %maps_file.display(),
        session_file = %session_file.display(),
        step_size,
        "startup"
    );

    Ok(AppWiring {
        loop_config: LoopConfig::default(),
        sim_config: SimConfig::with_step_size(step_size),
        maps_file,
        session_file,
        summary_file: env_path(SUMMARY_ENV_VAR),
    })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn parse_step_size(raw: Option<&str>) -> f32 {
    let default = SimConfig::default().step_size;
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<f32>() {
        Ok(step_size) if step_size.is_finite() && step_size > 0.0 => step_size,
        _ => {
            warn!(
                env_var = STEP_SIZE_ENV_VAR,
                value = raw,
                "invalid step size; falling back to default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_size_defaults_when_unset_or_invalid() {
        let default = SimConfig::default().step_size;
        assert_eq!(parse_step_size(None), default);
        assert_eq!(parse_step_size(Some("fast")), default);
        assert_eq!(parse_step_size(Some("-3")), default);
        assert_eq!(parse_step_size(Some("0")), default);
        assert_eq!(parse_step_size(Some(" 12.5 ")), 12.5);
    }
}
