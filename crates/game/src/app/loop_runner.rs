use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use roadbot_engine::{load_map_set, AppFlowController, Pick};
use serde::Serialize;
use tracing::{error, info, warn};

use super::bootstrap::AppWiring;
use super::session::{load_script, SessionCommand, SessionError, SessionLine, DEFAULT_FRAME_MS};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionSummary {
    pub(crate) final_state: String,
    pub(crate) bot_state: String,
    pub(crate) score: i64,
    pub(crate) ticks: u64,
    pub(crate) maps: Vec<MapSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MapSummary {
    pub(crate) index: usize,
    pub(crate) mapid: u32,
    pub(crate) name: String,
    pub(crate) high_score: i64,
    pub(crate) completion_rate: f64,
    pub(crate) medal: String,
}

pub(crate) fn run(wiring: AppWiring) -> ExitCode {
    match run_session(&wiring) {
        Ok(summary) => {
            log_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "session_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_session(wiring: &AppWiring) -> Result<SessionSummary, SessionError> {
    let maps = load_map_set(&wiring.maps_file)?;
    let script = load_script(&wiring.session_file)?;
    let mut app = AppFlowController::new(maps, &wiring.sim_config, &wiring.loop_config);

    let mut driver = SessionDriver::default();
    for line in &script {
        driver.execute(&mut app, line)?;
    }

    let summary = summarize(&app, driver.ticks);
    if let Some(path) = &wiring.summary_file {
        let encoded = serde_json::to_string_pretty(&summary)?;
        fs::write(path, encoded).map_err(|source| SessionError::WriteSummary {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "session_summary_written");
    }
    Ok(summary)
}

struct SessionDriver {
    frame: Duration,
    ticks: u64,
}

impl Default for SessionDriver {
    fn default() -> Self {
        Self {
            frame: Duration::from_millis(DEFAULT_FRAME_MS),
            ticks: 0,
        }
    }
}

impl SessionDriver {
    fn execute(
        &mut self,
        app: &mut AppFlowController,
        line: &SessionLine,
    ) -> Result<(), SessionError> {
        match &line.command {
            SessionCommand::Asset { jobs } => {
                for job in jobs {
                    app.asset_ready(job);
                }
            }
            SessionCommand::Fail { job, reason } => app.asset_failed(job, reason),
            SessionCommand::Pick(pick) => app.handle_pick(pick),
            SessionCommand::Press(instruction) => {
                app.handle_pick(&Pick::Button(instruction.code()));
            }
            SessionCommand::FrameMs(frame_ms) => {
                self.frame = Duration::from_millis(*frame_ms);
            }
            SessionCommand::Run { seconds } => {
                let frames = frames_for(*seconds, self.frame);
                for _ in 0..frames {
                    self.ticks += u64::from(app.advance_frame(self.frame));
                }
            }
            SessionCommand::ExpectState(expected) => {
                if app.state() != *expected {
                    return Err(SessionError::Expectation {
                        line: line.line,
                        expected: format!("state {expected}"),
                        actual: format!("state {}", app.state()),
                    });
                }
            }
            SessionCommand::ExpectScore(expected) => {
                if app.score() != *expected {
                    return Err(SessionError::Expectation {
                        line: line.line,
                        expected: format!("score {expected}"),
                        actual: format!("score {}", app.score()),
                    });
                }
            }
        }
        Ok(())
    }
}

fn frames_for(seconds: f32, frame: Duration) -> u64 {
    let frame_seconds = frame.as_secs_f64();
    if frame_seconds <= 0.0 {
        return 0;
    }
    (f64::from(seconds) / frame_seconds).ceil() as u64
}

fn summarize(app: &AppFlowController, ticks: u64) -> SessionSummary {
    let records = app.records();
    let maps = app
        .maps()
        .maps()
        .iter()
        .enumerate()
        .map(|(index, map)| {
            let medal = records
                .record(index)
                .map(|record| format!("{:?}", record.medal()))
                .unwrap_or_else(|| "None".to_string());
            MapSummary {
                index,
                mapid: map.mapid,
                name: map.name.clone(),
                high_score: records.high_score(index),
                completion_rate: records.completion_rate(index),
                medal,
            }
        })
        .collect();
    SessionSummary {
        final_state: app.state().to_string(),
        bot_state: format!("{:?}", app.bot().state()),
        score: app.score(),
        ticks,
        maps,
    }
}

fn log_summary(summary: &SessionSummary) {
    info!(
        final_state = %summary.final_state,
        bot_state = %summary.bot_state,
        score = summary.score,
        ticks = summary.ticks,
        "session_complete"
    );
    for map in &summary.maps {
        info!(
            index = map.index,
            mapid = map.mapid,
            name = %map.name,
            high_score = map.high_score,
            completion_rate = map.completion_rate,
            medal = %map.medal,
            "map_record"
        );
    }
    if summary.maps.iter().all(|map| map.high_score == 0) {
        warn!("no_map_scored");
    }
}
