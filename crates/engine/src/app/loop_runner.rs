use std::time::Duration;

use tracing::{info, warn};

const DEFAULT_TICK: Duration = Duration::from_millis(33);
const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub tick_seconds: f64,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_seconds: DEFAULT_TICK.as_secs_f64(),
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            max_ticks_per_frame: 5,
        }
    }
}

/// Converts variable real frame times into a whole number of fixed simulation ticks.
#[derive(Debug)]
pub struct FixedStepper {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FixedStepper {
    pub fn new(config: &LoopConfig) -> Self {
        let fixed_dt = if config.tick_seconds.is_finite() && config.tick_seconds > 0.0 {
            Duration::from_secs_f64(config.tick_seconds)
        } else {
            warn!(tick_seconds = config.tick_seconds, "invalid tick length; using default");
            DEFAULT_TICK
        };
        let stepper = Self {
            fixed_dt: normalize_non_zero_duration(fixed_dt, DEFAULT_TICK),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                DEFAULT_MAX_FRAME_DELTA,
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        };
        info!(
            tick_ms = stepper.fixed_dt.as_millis() as u64,
            max_frame_delta_ms = stepper.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame = stepper.max_ticks_per_frame,
            "loop_config"
        );
        stepper
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt.as_secs_f32()
    }

    pub fn pending(&self) -> Duration {
        self.accumulator
    }

    /// Accumulates one real frame and returns how many ticks to run for it.
    pub fn plan_frame(&mut self, raw_frame_dt: Duration) -> u32 {
        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        step_plan.ticks_to_run
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
