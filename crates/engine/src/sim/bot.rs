use std::f32::consts::{FRAC_PI_2, PI};

use tracing::{debug, warn};

use super::bus::{MapStatus, Notification, SharedInbox};
use super::instructions::{Instruction, InstructionProgram};
use super::{InvalidOperation, SimContext, Vec3};

/// Seconds one instruction takes to play out.
pub const OP_TIME_STEP: f32 = 2.0;
/// Seconds the fall-off-the-map sequence lasts.
pub const OP_DEATH_TIME_STEP: f32 = 4.0;
/// Pause between two instructions.
pub const OP_DELAY: f32 = 0.5;
pub const ROTATE_STEP: f32 = FRAC_PI_2;
/// Height above the bot's origin the tile probe starts from.
const TILE_PROBE_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Initial,
    Ready,
    Waiting,
    Executing,
    Dying,
    Dead,
}

/// Axis the bot tumbles about while falling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeathSpin {
    #[default]
    Unknown,
    Left,
    Right,
    Back,
    Forwards,
}

impl DeathSpin {
    /// Quantizes yaw to the nearest quarter turn and picks the tumble that
    /// continues the bot's motion; reversing flips it.
    pub fn from_heading(yaw_radians: f32, reversing: bool) -> Self {
        let quarter_turns = (yaw_radians / FRAC_PI_2).round() as i64;
        let forward = match quarter_turns.rem_euclid(4) {
            0 => DeathSpin::Forwards,
            1 => DeathSpin::Left,
            2 => DeathSpin::Back,
            _ => DeathSpin::Right,
        };
        if reversing {
            forward.flipped()
        } else {
            forward
        }
    }

    fn flipped(self) -> Self {
        match self {
            DeathSpin::Forwards => DeathSpin::Back,
            DeathSpin::Back => DeathSpin::Forwards,
            DeathSpin::Left => DeathSpin::Right,
            DeathSpin::Right => DeathSpin::Left,
            DeathSpin::Unknown => DeathSpin::Unknown,
        }
    }
}

/// Logical pose read by renderers; only the controller mutates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotTransform {
    pub position: Vec3,
    pub yaw: f32,
    pub scale: f32,
    pub spin: f32,
    pub death_spin: DeathSpin,
}

impl Default for BotTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            scale: 1.0,
            spin: 0.0,
            death_spin: DeathSpin::Unknown,
        }
    }
}

pub struct BotController {
    state: BotState,
    transform: BotTransform,
    step_size: f32,
    timer: f32,
    delay: f32,
    death_timer: f32,
    current_instruction: Option<Instruction>,
    map_status: MapStatus,
    loaded: bool,
    instruction_ready: bool,
    respawn_requested: bool,
    inbox: SharedInbox,
}

impl BotController {
    /// `inbox` must be subscribed to STATE_CHANGE notifications.
    pub fn new(step_size: f32, inbox: SharedInbox) -> Self {
        Self {
            state: BotState::Initial,
            transform: BotTransform::default(),
            step_size,
            timer: 0.0,
            delay: 0.0,
            death_timer: 0.0,
            current_instruction: None,
            map_status: MapStatus::None,
            loaded: false,
            instruction_ready: false,
            respawn_requested: false,
            inbox,
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn transform(&self) -> &BotTransform {
        &self.transform
    }

    pub fn map_status(&self) -> MapStatus {
        self.map_status
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }

    pub fn current_instruction(&self) -> Option<Instruction> {
        self.current_instruction
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            BotState::Executing | BotState::Waiting | BotState::Dying
        ) || self.instruction_ready
    }

    pub fn is_dead(&self) -> bool {
        self.state == BotState::Dead
    }

    /// Fraction of the running instruction already played out.
    pub fn instruction_progress(&self) -> f32 {
        if self.state != BotState::Executing {
            return 0.0;
        }
        (1.0 - self.timer / OP_TIME_STEP).clamp(0.0, 1.0)
    }

    /// Fraction of the death sequence already played out.
    pub fn death_progress(&self) -> f32 {
        match self.state {
            BotState::Dying => (1.0 - self.death_timer / OP_DEATH_TIME_STEP).clamp(0.0, 1.0),
            BotState::Dead => 1.0,
            _ => 0.0,
        }
    }

    /// Load-complete signal from the asset side.
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn prepare_for_new_instruction(
        &mut self,
        program: &InstructionProgram,
    ) -> Result<(), InvalidOperation> {
        if self.is_busy() {
            return Err(InvalidOperation::BotBusy { state: self.state });
        }
        if program.current().is_none() {
            return Err(InvalidOperation::NoPendingInstruction);
        }
        self.instruction_ready = true;
        Ok(())
    }

    pub fn respawn_bot(&mut self) {
        self.reset_bot();
        self.respawn_requested = true;
    }

    fn reset_bot(&mut self) {
        self.transform = BotTransform::default();
        self.map_status = MapStatus::None;
    }

    pub fn update(&mut self, dt: f32, ctx: &mut SimContext) {
        self.act_on_state(dt);
        self.update_state(ctx);
    }

    fn act_on_state(&mut self, dt: f32) {
        match self.state {
            BotState::Executing => {
                let work_time = dt.min(self.timer).max(0.0);
                self.timer -= work_time;
                self.apply_instruction_motion(work_time);
            }
            BotState::Waiting => {
                self.delay -= dt;
            }
            BotState::Dying => {
                let work_time = dt.min(self.death_timer).max(0.0);
                self.death_timer -= work_time;
                self.apply_fall(work_time);
            }
            BotState::Initial | BotState::Ready | BotState::Dead => {}
        }
    }

    fn apply_instruction_motion(&mut self, work_time: f32) {
        let distance = work_time * (self.step_size / OP_TIME_STEP);
        let turn = work_time * (ROTATE_STEP / OP_TIME_STEP);
        match self.current_instruction {
            Some(Instruction::Forward) => self.translate(distance),
            Some(Instruction::Back) => self.translate(-distance),
            Some(Instruction::Left) => self.transform.yaw += turn,
            Some(Instruction::Right) => self.transform.yaw -= turn,
            _ => {}
        }
    }

    fn translate(&mut self, distance: f32) {
        let (sin, cos) = self.transform.yaw.sin_cos();
        self.transform.position.x += sin * distance;
        self.transform.position.z += cos * distance;
    }

    fn apply_fall(&mut self, work_time: f32) {
        let fall_speed = self.step_size * 4.0;
        self.transform.position.y -= work_time * (fall_speed / OP_TIME_STEP);
        self.transform.spin += work_time * (ROTATE_STEP / OP_TIME_STEP);
        self.transform.scale = (self.transform.scale - work_time / OP_DEATH_TIME_STEP).max(0.0);
    }

    fn absorb_notifications(&mut self) {
        let received = self.inbox.borrow_mut().drain();
        for notification in received {
            if let Notification::StateChange(state) = notification {
                if let Some(status) = MapStatus::from_state_change(state) {
                    self.map_status = status;
                }
            }
        }
    }

    fn update_state(&mut self, ctx: &mut SimContext) {
        if self.state == BotState::Executing {
            let probe = Vec3 {
                y: self.transform.position.y + TILE_PROBE_HEIGHT,
                ..self.transform.position
            };
            ctx.tiles.activate_tile_under_position(probe, &ctx.bus);
        }
        self.absorb_notifications();
        let respawn_requested = std::mem::take(&mut self.respawn_requested);

        let next = match self.state {
            BotState::Initial if self.loaded => Some(BotState::Ready),
            BotState::Ready if self.instruction_ready => Some(BotState::Executing),
            BotState::Executing if self.map_status == MapStatus::Bad => Some(BotState::Dying),
            BotState::Executing if self.timer <= 0.0 => Some(BotState::Waiting),
            BotState::Waiting if self.delay <= 0.0 => Some(BotState::Ready),
            BotState::Dying if self.death_timer <= 0.0 => Some(BotState::Dead),
            BotState::Dead if respawn_requested => Some(BotState::Ready),
            _ => None,
        };

        if let Some(next) = next {
            debug!(from = ?self.state, to = ?next, "bot_state_changed");
            self.on_exit_state(ctx);
            self.state = next;
            self.on_enter_state(ctx);
        }
    }

    fn on_enter_state(&mut self, ctx: &SimContext) {
        match self.state {
            BotState::Ready => {
                self.transform.scale = 1.0;
            }
            BotState::Executing => {
                self.delay = 0.0;
                self.timer = OP_TIME_STEP;
                self.current_instruction = ctx.program.current();
                if self.current_instruction.is_none() {
                    warn!("bot_executing_without_instruction");
                }
            }
            BotState::Waiting => {
                self.delay = OP_DELAY;
            }
            BotState::Dying => {
                self.death_timer = OP_DEATH_TIME_STEP;
                self.transform.spin = 0.0;
                self.transform.death_spin = DeathSpin::from_heading(
                    self.transform.yaw,
                    self.current_instruction == Some(Instruction::Back),
                );
                debug!(death_spin = ?self.transform.death_spin, "bot_falling");
            }
            BotState::Initial | BotState::Dead => {}
        }
    }

    fn on_exit_state(&mut self, ctx: &mut SimContext) {
        match self.state {
            BotState::Ready => {
                self.instruction_ready = false;
            }
            BotState::Executing => {
                self.timer = 0.0;
                if let Some(instruction) = self.current_instruction {
                    ctx.tiles
                        .handle_instruction_completed(instruction, &ctx.bus, &mut ctx.records);
                }
            }
            BotState::Dying => {
                self.death_timer = 0.0;
            }
            BotState::Dead => {
                self.reset_bot();
            }
            BotState::Initial | BotState::Waiting => {}
        }
    }
}

/// Yaw wrapped into (-PI, PI], mainly for display.
pub fn normalized_yaw(yaw: f32) -> f32 {
    let wrapped = (yaw + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}
