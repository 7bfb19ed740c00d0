mod bot;
mod bus;
mod flair;
mod instructions;
mod score;
mod state;
mod tiles;

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

pub use bot::{
    normalized_yaw, BotController, BotState, BotTransform, DeathSpin, OP_DEATH_TIME_STEP,
    OP_DELAY, OP_TIME_STEP, ROTATE_STEP,
};
pub use bus::{
    MapStatus, Notification, NotificationInbox, NotificationKind, Observer, ObserverBus,
    SharedInbox, SharedObserver, SubscriptionId, MAX_FOLLOW_UPS_PER_PUBLISH,
};
pub use flair::{
    Bird, BirdState, BusStop, FlairEffect, FlairEntity, Lady, BIRD_HONK_REWARD,
    BIRD_SCARED_PENALTY, LADY_BOARDING_REWARD, LADY_HONK_PENALTY,
};
pub use instructions::{HintTracker, Instruction, InstructionProgram};
pub use score::{AttemptProgress, MapRecord, MapRecordTable, Medal, ScoreLedger};
pub use state::AppState;
pub use tiles::{
    GridCoord, GridTileResolver, Tile, TileGraph, TileResolver, TileRole, ROLE_BUS_STOP,
    ROLE_NO_TILE, ROLE_SPECIAL_BIRD,
};

pub const DEFAULT_STEP_SIZE: f32 = 10.0;
/// Tile spacing measured in bot steps: two FORWARDs carry the bot from one
/// tile centre to the next.
pub const STEPS_PER_TILE: f32 = 2.0;
pub const DEFAULT_MAP_BATCH_SIZE: usize = 3;
pub const STARTUP_JOBS: [&str; 5] = ["bot", "sky", "map", "winner audio", "audio"];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub step_size: f32,
    pub tile_length: f32,
    pub map_batch_size: usize,
    pub startup_jobs: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::with_step_size(DEFAULT_STEP_SIZE)
    }
}

impl SimConfig {
    /// Tiles are laid out `STEPS_PER_TILE` bot steps apart.
    pub fn with_step_size(step_size: f32) -> Self {
        Self {
            step_size,
            tile_length: step_size * STEPS_PER_TILE,
            map_batch_size: DEFAULT_MAP_BATCH_SIZE,
            startup_jobs: STARTUP_JOBS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A mutator was called in a state where the UI should never allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOperation {
    #[error("cannot {action} instructions while the program is running")]
    ProgramRunning { action: &'static str },
    #[error("cannot start an empty program")]
    EmptyProgram,
    #[error("{instruction:?} is a control-panel action, not a program step")]
    NotAProgramStep { instruction: Instruction },
    #[error("bot is busy ({state:?}) and cannot take a new instruction")]
    BotBusy { state: BotState },
    #[error("no instruction is pending for the bot")]
    NoPendingInstruction,
    #[error("map index {index} is out of range; {available} maps are loaded")]
    UnknownMap { index: usize, available: usize },
}

/// Handles shared by every simulation component for one session.
pub struct SimContext {
    pub bus: ObserverBus,
    pub program: InstructionProgram,
    pub tiles: TileGraph,
    pub records: MapRecordTable,
    score: Rc<RefCell<ScoreLedger>>,
    hint: Rc<RefCell<HintTracker>>,
}

impl SimContext {
    pub fn new(config: &SimConfig, map_count: usize) -> Self {
        Self::with_tiles(TileGraph::with_grid(config.tile_length), map_count)
    }

    /// Subscribes the score ledger and the instruction hint, in that order.
    pub fn with_tiles(tiles: TileGraph, map_count: usize) -> Self {
        let mut bus = ObserverBus::new();
        let score = Rc::new(RefCell::new(ScoreLedger::default()));
        let hint = Rc::new(RefCell::new(HintTracker::default()));
        bus.subscribe(score.clone());
        bus.subscribe(hint.clone());
        Self {
            bus,
            program: InstructionProgram::new(),
            tiles,
            records: MapRecordTable::new(map_count),
            score,
            hint,
        }
    }

    pub fn subscribe_inbox(&mut self, kinds: &[NotificationKind]) -> SharedInbox {
        let inbox = NotificationInbox::shared(kinds);
        self.bus.subscribe(inbox.clone());
        inbox
    }

    pub fn score(&self) -> i64 {
        self.score.borrow().total()
    }

    pub fn reset_score(&self) {
        self.score.borrow_mut().reset();
    }

    pub fn hint(&self) -> MapStatus {
        self.hint.borrow().hint()
    }

    pub fn reset_hint(&self) {
        self.hint.borrow_mut().reset();
    }
}
