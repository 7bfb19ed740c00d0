use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::content::MapSet;
use crate::sim::{
    AppState, BotController, Instruction, InstructionProgram, InvalidOperation, MapRecordTable,
    MapStatus, Notification, NotificationKind, Observer, SharedObserver, SimConfig, SimContext,
    SubscriptionId, TileGraph, TileRole,
};

use super::input::{
    Pick, CHOOSE_MAP_BUTTON, MAP_SELECT_NEXT_ARROW, MAP_SELECT_PREV_ARROW, RETRY_BUTTON,
};
use super::loading::LoadingGate;
use super::loop_runner::{FixedStepper, LoopConfig};

const BOT_JOB: &str = "bot";

/// Turns "bot left the map" into an app-level death notice on the same publish.
#[derive(Debug, Default)]
pub struct OffMapRelay;

impl Observer for OffMapRelay {
    fn on_notify(&mut self, notification: &Notification, follow_ups: &mut Vec<Notification>) {
        if let Notification::TileChange(TileRole::NoTile) = notification {
            follow_ups.push(Notification::StateChange(AppState::Dead));
        }
    }
}

/// Screen collaborators shown and hidden at app state boundaries.
pub trait ScreenHooks {
    fn on_enter(&mut self, _state: AppState) {}
    fn on_exit(&mut self, _state: AppState) {}
}

#[derive(Debug, Default)]
pub struct NoScreens;

impl ScreenHooks for NoScreens {}

/// Top-level game flow. Owns the fixed step and drives the bot, tiles and
/// flair once per tick.
pub struct AppFlowController {
    state: AppState,
    ctx: SimContext,
    bot: BotController,
    maps: MapSet,
    loading: LoadingGate,
    startup_jobs: Vec<String>,
    map_batch_size: usize,
    stepper: FixedStepper,
    screens: Box<dyn ScreenHooks>,
    current_map: Option<usize>,
    pending_map: Option<usize>,
    map_select_index: usize,
    grid_visible: bool,
    continue_requested: bool,
    retry_requested: bool,
    select_map_requested: bool,
}

impl AppFlowController {
    pub fn new(maps: MapSet, config: &SimConfig, loop_config: &LoopConfig) -> Self {
        let tiles = TileGraph::with_grid(config.tile_length);
        Self::with_tiles(maps, config, loop_config, tiles)
    }

    /// Uses a caller-supplied tile graph, e.g. one with a custom tile resolver.
    pub fn with_tiles(
        maps: MapSet,
        config: &SimConfig,
        loop_config: &LoopConfig,
        tiles: TileGraph,
    ) -> Self {
        let mut ctx = SimContext::with_tiles(tiles, maps.len());
        ctx.bus.subscribe(Rc::new(RefCell::new(OffMapRelay)));
        let bot_inbox = ctx.subscribe_inbox(&[NotificationKind::StateChange]);
        let bot = BotController::new(config.step_size, bot_inbox);

        Self {
            state: AppState::Initial,
            ctx,
            bot,
            maps,
            loading: LoadingGate::new(config.startup_jobs.iter().cloned()),
            startup_jobs: config.startup_jobs.clone(),
            map_batch_size: config.map_batch_size.max(1),
            stepper: FixedStepper::new(loop_config),
            screens: Box::new(NoScreens),
            current_map: None,
            pending_map: None,
            map_select_index: 0,
            grid_visible: false,
            continue_requested: false,
            retry_requested: false,
            select_map_requested: false,
        }
    }

    pub fn with_screens(mut self, screens: Box<dyn ScreenHooks>) -> Self {
        self.screens = screens;
        self
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn bot(&self) -> &BotController {
        &self.bot
    }

    pub fn score(&self) -> i64 {
        self.ctx.score()
    }

    pub fn tiles(&self) -> &TileGraph {
        &self.ctx.tiles
    }

    pub fn records(&self) -> &MapRecordTable {
        &self.ctx.records
    }

    pub fn hint(&self) -> MapStatus {
        self.ctx.hint()
    }

    pub fn program(&self) -> &InstructionProgram {
        &self.ctx.program
    }

    pub fn maps(&self) -> &MapSet {
        &self.maps
    }

    pub fn loading(&self) -> &LoadingGate {
        &self.loading
    }

    pub fn grid_visible(&self) -> bool {
        self.grid_visible
    }

    pub fn current_map(&self) -> Option<usize> {
        self.current_map
    }

    pub fn fixed_dt(&self) -> Duration {
        self.stepper.fixed_dt()
    }

    /// Index range of the maps on the current map-select page.
    pub fn visible_maps(&self) -> Range<usize> {
        let start = self.map_select_index.min(self.maps.len());
        let end = start.saturating_add(self.map_batch_size).min(self.maps.len());
        start..end
    }

    pub fn subscribe(&mut self, observer: SharedObserver) -> SubscriptionId {
        self.ctx.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.ctx.bus.unsubscribe(id)
    }

    pub fn asset_ready(&mut self, job: &str) {
        if self.loading.mark_complete(job) && job == BOT_JOB {
            self.bot.mark_loaded();
        }
    }

    pub fn asset_failed(&mut self, job: &str, reason: &str) {
        if self.loading.mark_failed(job, reason) {
            warn!(job, reason, "asset_load_failed");
        }
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> Result<(), InvalidOperation> {
        self.ctx.program.append(instruction)
    }

    pub fn clear_instructions(&mut self) -> Result<(), InvalidOperation> {
        self.ctx.program.clear()?;
        self.ctx.reset_hint();
        Ok(())
    }

    /// Starts the program and hands its first entry to the bot.
    pub fn start_instructions(&mut self) -> Result<(), InvalidOperation> {
        if self.bot.is_busy() {
            return Err(InvalidOperation::BotBusy {
                state: self.bot.state(),
            });
        }
        self.ctx.program.start()?;
        self.bot.prepare_for_new_instruction(&self.ctx.program)
    }

    /// Chooses the map to play next; takes effect from the map-select screen.
    pub fn select_map(&mut self, index: usize) -> Result<(), InvalidOperation> {
        if index >= self.maps.len() {
            return Err(InvalidOperation::UnknownMap {
                index,
                available: self.maps.len(),
            });
        }
        self.pending_map = Some(index);
        Ok(())
    }

    pub fn request_continue(&mut self) {
        self.continue_requested = true;
    }

    pub fn request_map_select(&mut self) {
        self.select_map_requested = true;
    }

    pub fn retry(&mut self) {
        self.retry_requested = true;
    }

    /// Feeds one real frame through the fixed step. Returns the ticks run.
    pub fn advance_frame(&mut self, frame_dt: Duration) -> u32 {
        let ticks = self.stepper.plan_frame(frame_dt);
        let dt = self.stepper.fixed_dt_seconds();
        for _ in 0..ticks {
            self.tick(dt);
        }
        ticks
    }

    pub fn tick(&mut self, dt: f32) {
        self.act_on_state(dt);
        self.update_state();
    }

    pub fn handle_pick(&mut self, pick: &Pick) {
        match self.state {
            AppState::Loaded => self.request_continue(),
            AppState::Ready => {
                if let Pick::Button(code) = pick {
                    self.handle_control_button(*code);
                }
            }
            AppState::Win => self.request_map_select(),
            AppState::Dead => {
                if pick.is_named(RETRY_BUTTON) {
                    self.retry();
                } else if pick.is_named(CHOOSE_MAP_BUTTON) {
                    self.request_map_select();
                }
            }
            AppState::SelectMap => self.handle_map_select_pick(pick),
            AppState::Initial | AppState::Setup | AppState::Running | AppState::Retry => {}
        }
    }

    fn handle_control_button(&mut self, code: i64) {
        let Some(instruction) = Instruction::from_code(code) else {
            debug!(code, "unknown_control_button");
            return;
        };
        let result = match instruction {
            Instruction::Clear => {
                if self.ctx.program.is_running() {
                    Ok(())
                } else {
                    self.clear_instructions()
                }
            }
            Instruction::Go => {
                if self.ctx.program.is_running() || self.ctx.program.count() == 0 {
                    Ok(())
                } else {
                    self.start_instructions()
                }
            }
            Instruction::Grid => {
                self.grid_visible = !self.grid_visible;
                debug!(grid_visible = self.grid_visible, "grid_toggled");
                Ok(())
            }
            step => self.add_instruction(step),
        };
        if let Err(error) = result {
            warn!(error = %error, ?instruction, "control_button_rejected");
        }
    }

    fn handle_map_select_pick(&mut self, pick: &Pick) {
        let map_count = self.maps.len();
        let batch_size = self.map_batch_size;
        match pick {
            Pick::Named(name) if name == MAP_SELECT_PREV_ARROW => {
                let batch = (self.map_select_index / batch_size).saturating_sub(1);
                self.map_select_index = batch * batch_size;
            }
            Pick::Named(name) if name == MAP_SELECT_NEXT_ARROW => {
                let mut batch = self.map_select_index / batch_size + 1;
                if batch * batch_size >= map_count {
                    batch -= 1;
                }
                self.map_select_index = batch * batch_size;
            }
            Pick::Button(index) => match usize::try_from(*index) {
                Ok(index) if index < map_count => self.pending_map = Some(index),
                _ => debug!(index, map_count, "map_pick_out_of_range"),
            },
            Pick::Named(_) | Pick::Nothing => {}
        }
    }

    fn act_on_state(&mut self, dt: f32) {
        if self.state == AppState::Running
            && !self.bot.is_busy()
            && self.ctx.program.advance().is_some()
        {
            if let Err(error) = self.bot.prepare_for_new_instruction(&self.ctx.program) {
                warn!(error = %error, "bot_prepare_failed");
            }
        }

        if !matches!(self.state, AppState::Initial | AppState::Dead) {
            self.bot.update(dt, &mut self.ctx);
            self.ctx.tiles.update(&self.ctx.bus, &mut self.ctx.records);
        }
    }

    fn update_state(&mut self) {
        let continue_requested = std::mem::take(&mut self.continue_requested);
        let retry_requested = std::mem::take(&mut self.retry_requested);
        let select_map_requested = std::mem::take(&mut self.select_map_requested);

        let next = match self.state {
            AppState::Initial => Some(AppState::Setup),
            AppState::Setup if self.loading.load_complete(&self.startup_jobs) => {
                Some(AppState::Loaded)
            }
            AppState::Loaded if continue_requested => Some(if self.current_map.is_some() {
                AppState::Ready
            } else {
                AppState::SelectMap
            }),
            AppState::Ready if self.ctx.program.is_running() => Some(AppState::Running),
            AppState::Running if self.bot.is_dead() => Some(AppState::Dead),
            AppState::Running if !self.ctx.program.is_running() && !self.bot.is_busy() => {
                if self.ctx.tiles.is_current_map_complete() {
                    Some(AppState::Win)
                } else {
                    Some(AppState::Dead)
                }
            }
            AppState::Win if select_map_requested => Some(AppState::SelectMap),
            AppState::Dead if retry_requested => Some(AppState::Retry),
            AppState::Dead if select_map_requested => Some(AppState::SelectMap),
            AppState::Retry if !self.bot.is_dead() => Some(AppState::Ready),
            AppState::SelectMap => self.pending_map.map(|index| {
                self.current_map = Some(index);
                AppState::Retry
            }),
            _ => None,
        };

        if let Some(next) = next {
            if next == AppState::Win {
                self.ctx.bus.publish(Notification::StateChange(AppState::Win));
            }
            info!(from = %self.state, to = %next, "app_state_changed");
            self.on_exit_state();
            self.state = next;
            self.on_enter_state();
        }
    }

    fn on_enter_state(&mut self) {
        match self.state {
            AppState::Retry => self.reset_play_area(),
            AppState::SelectMap => {
                self.pending_map = None;
                self.map_select_index = self.current_map.unwrap_or(0);
            }
            AppState::Initial
            | AppState::Setup
            | AppState::Loaded
            | AppState::Ready
            | AppState::Running
            | AppState::Win
            | AppState::Dead => {}
        }
        self.screens.on_enter(self.state);
    }

    fn on_exit_state(&mut self) {
        if self.state == AppState::Running {
            if let Some(map_index) = self.current_map {
                let score = self.ctx.score();
                self.ctx.records.apply_score(map_index, score);
                info!(
                    map_index,
                    score,
                    high_score = self.ctx.records.high_score(map_index),
                    "attempt_scored"
                );
            }
        }
        self.screens.on_exit(self.state);
    }

    /// New attempt on the current map: empty program, fresh tiles and flair,
    /// respawned bot, zero score.
    fn reset_play_area(&mut self) {
        self.ctx.program.reset();
        self.ctx.reset_hint();
        match self.current_map {
            Some(index) => match self.maps.get(index) {
                Some(definition) => self.ctx.tiles.load_map(index, definition),
                None => warn!(map_index = index, "selected_map_missing"),
            },
            None => warn!("retry_without_selected_map"),
        }
        self.bot.respawn_bot();
        self.ctx.reset_score();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MapDefinition, TileLayout};
    use crate::sim::{
        BotState, NotificationInbox, LADY_BOARDING_REWARD, ROLE_BUS_STOP, STARTUP_JOBS,
    };

    const DT: f32 = 0.033;

    fn map(name: &str, tiles: &[(i32, i32, Option<&str>)]) -> MapDefinition {
        MapDefinition {
            mapid: 0,
            name: name.to_string(),
            instructions: format!("Drive the {name} route"),
            difficulty: 1,
            success_criteria: 1,
            maximum_score: 1,
            tile_layout: tiles
                .iter()
                .map(|(x, z, role)| TileLayout {
                    x: *x,
                    z: *z,
                    id: "straight".to_string(),
                    role: role.map(ToString::to_string),
                })
                .collect(),
        }
    }

    fn app_with(maps: Vec<MapDefinition>, config: SimConfig) -> AppFlowController {
        AppFlowController::new(MapSet::new(maps), &config, &LoopConfig::default())
    }

    fn tick_until(
        app: &mut AppFlowController,
        max_ticks: u32,
        done: impl Fn(&AppFlowController) -> bool,
    ) -> u32 {
        for tick in 1..=max_ticks {
            app.tick(DT);
            if done(app) {
                return tick;
            }
        }
        panic!(
            "condition not reached in {max_ticks} ticks; app {} bot {:?}",
            app.state(),
            app.bot().state()
        );
    }

    fn boot_to_ready(app: &mut AppFlowController, map_index: usize) {
        app.tick(DT);
        assert_eq!(app.state(), AppState::Setup);
        for job in STARTUP_JOBS {
            app.asset_ready(job);
        }
        app.tick(DT);
        assert_eq!(app.state(), AppState::Loaded);
        app.handle_pick(&Pick::Nothing);
        app.tick(DT);
        assert_eq!(app.state(), AppState::SelectMap);
        app.handle_pick(&Pick::Button(map_index as i64));
        app.tick(DT);
        assert_eq!(app.state(), AppState::Retry);
        app.tick(DT);
        assert_eq!(app.state(), AppState::Ready);
        assert_eq!(app.bot().state(), BotState::Ready);
    }

    fn press(app: &mut AppFlowController, instruction: Instruction) {
        app.handle_pick(&Pick::Button(instruction.code()));
    }

    #[test]
    fn setup_waits_for_every_startup_job() {
        let mut app = app_with(vec![map("a", &[(0, 0, None)])], SimConfig::default());
        assert_eq!(app.state(), AppState::Initial);
        app.tick(DT);
        assert_eq!(app.state(), AppState::Setup);

        app.asset_ready("bot");
        app.asset_ready("sky");
        app.asset_failed("audio", "no output device");
        for _ in 0..10 {
            app.tick(DT);
        }
        assert_eq!(app.state(), AppState::Setup);
        assert_eq!(app.bot().state(), BotState::Ready);
        assert_eq!(app.loading().failed_jobs(), vec![("audio", "no output device")]);

        app.asset_ready("not a job");
        for job in STARTUP_JOBS {
            app.asset_ready(job);
        }
        app.tick(DT);
        assert_eq!(app.state(), AppState::Loaded);
    }

    #[test]
    fn two_forwards_and_a_pause_reach_the_passenger_and_win() {
        let mut app = app_with(
            vec![map("two tiles", &[(0, 0, None), (0, 1, Some(ROLE_BUS_STOP))])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);

        press(&mut app, Instruction::Forward);
        press(&mut app, Instruction::Forward);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Go);
        assert!(app.program().is_running());
        app.tick(DT);
        assert_eq!(app.state(), AppState::Running);
        assert_eq!(app.bot().state(), BotState::Executing);

        tick_until(&mut app, 1000, |app| app.state() != AppState::Running);
        assert_eq!(app.state(), AppState::Win);
        assert!(app.tiles().is_current_map_complete());
        assert!(!app.program().is_running());
        assert_eq!(app.score(), LADY_BOARDING_REWARD);
        assert_eq!(app.records().high_score(0), LADY_BOARDING_REWARD);
        assert_eq!(app.records().completion_rate(0), 1.0);
        assert_eq!(app.hint(), MapStatus::Good);

        app.tick(DT);
        assert_eq!(app.bot().map_status(), MapStatus::Good);
    }

    #[test]
    fn driving_off_the_map_dies_in_the_same_tick_and_keeps_the_score() {
        let mut app = app_with(
            vec![map("stub", &[(0, 0, Some(ROLE_BUS_STOP))])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);
        app.add_instruction(Instruction::Pause).expect("pause");
        app.add_instruction(Instruction::Forward).expect("forward");
        app.add_instruction(Instruction::Forward).expect("forward");
        app.start_instructions().expect("start");

        let mut left_tile = false;
        for _ in 0..1000 {
            let had_tile = app.tiles().active_tile().is_some();
            app.tick(DT);
            if had_tile && app.tiles().active_tile().is_none() {
                left_tile = true;
                break;
            }
        }
        assert!(left_tile, "bot never left the map");
        assert_eq!(app.bot().state(), BotState::Dying);
        assert_eq!(app.state(), AppState::Running);
        assert_eq!(app.score(), LADY_BOARDING_REWARD);

        tick_until(&mut app, 1000, |app| app.state() != AppState::Running);
        assert_eq!(app.state(), AppState::Dead);
        assert!(app.bot().is_dead());
        assert_eq!(app.records().high_score(0), LADY_BOARDING_REWARD);
        assert_eq!(app.hint(), MapStatus::Bad);
    }

    #[test]
    fn retry_after_death_resets_the_play_area() {
        let mut app = app_with(
            vec![map("stub", &[(0, 0, Some(ROLE_BUS_STOP))])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Forward);
        press(&mut app, Instruction::Forward);
        press(&mut app, Instruction::Go);
        tick_until(&mut app, 1000, |app| app.state() == AppState::Dead);

        app.handle_pick(&Pick::Named("somewhere else".to_string()));
        app.tick(DT);
        assert_eq!(app.state(), AppState::Dead);

        app.handle_pick(&Pick::Named(RETRY_BUTTON.to_string()));
        app.tick(DT);
        assert_eq!(app.state(), AppState::Retry);
        assert_eq!(app.score(), 0);
        assert_eq!(app.program().count(), 0);
        assert!(!app.program().is_running());
        assert_eq!(app.tiles().progress().successes(), 0);

        app.tick(DT);
        assert_eq!(app.state(), AppState::Ready);
        assert_eq!(app.bot().state(), BotState::Ready);
        assert_eq!(app.bot().transform().position.z, 0.0);
        assert_eq!(app.bot().map_status(), MapStatus::None);
        assert_eq!(app.hint(), MapStatus::None);
        assert_eq!(app.records().high_score(0), LADY_BOARDING_REWARD);
    }

    #[test]
    fn finishing_the_program_without_the_goal_is_a_death() {
        let mut app = app_with(
            vec![map("plain", &[(0, 0, None), (0, 1, None)])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Go);

        tick_until(&mut app, 1000, |app| app.state() != AppState::Running);
        assert_eq!(app.state(), AppState::Dead);
        assert!(!app.bot().is_dead());
        assert_eq!(app.records().high_score(0), 0);

        app.handle_pick(&Pick::Named(CHOOSE_MAP_BUTTON.to_string()));
        app.tick(DT);
        assert_eq!(app.state(), AppState::SelectMap);
        assert_eq!(app.visible_maps(), 0..1);
    }

    #[test]
    fn clearing_is_rejected_while_running() {
        let mut app = app_with(
            vec![map("plain", &[(0, 0, None), (0, 1, None)])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);
        for instruction in [Instruction::Left, Instruction::Right, Instruction::Pause] {
            app.add_instruction(instruction).expect("append");
        }
        assert_eq!(app.program().count(), 3);
        app.clear_instructions().expect("clear");
        assert_eq!(app.program().count(), 0);
        assert!(!app.program().is_running());

        app.add_instruction(Instruction::Left).expect("append");
        app.start_instructions().expect("start");
        assert_eq!(
            app.clear_instructions(),
            Err(InvalidOperation::ProgramRunning { action: "clear" })
        );
        assert!(matches!(
            app.start_instructions(),
            Err(InvalidOperation::BotBusy { .. })
        ));

        press(&mut app, Instruction::Clear);
        assert_eq!(app.program().count(), 1);
    }

    #[test]
    fn control_panel_buttons_in_ready() {
        let mut app = app_with(vec![map("a", &[(0, 0, None)])], SimConfig::default());
        boot_to_ready(&mut app, 0);

        press(&mut app, Instruction::Go);
        assert!(!app.program().is_running());

        press(&mut app, Instruction::Grid);
        assert!(app.grid_visible());
        press(&mut app, Instruction::Grid);
        assert!(!app.grid_visible());

        press(&mut app, Instruction::Fire);
        press(&mut app, Instruction::Left);
        app.handle_pick(&Pick::Button(42));
        app.handle_pick(&Pick::Named(RETRY_BUTTON.to_string()));
        assert_eq!(
            app.program().instructions(),
            &[Instruction::Fire, Instruction::Left]
        );

        press(&mut app, Instruction::Clear);
        assert_eq!(app.program().count(), 0);
    }

    #[test]
    fn map_select_pages_in_batches() {
        let maps = (0..7)
            .map(|index| map(&format!("map {index}"), &[(0, 0, None)]))
            .collect();
        let mut app = app_with(maps, SimConfig::default());
        app.tick(DT);
        for job in STARTUP_JOBS {
            app.asset_ready(job);
        }
        app.tick(DT);
        app.request_continue();
        app.tick(DT);
        assert_eq!(app.state(), AppState::SelectMap);
        assert_eq!(app.visible_maps(), 0..3);

        let next = Pick::Named(MAP_SELECT_NEXT_ARROW.to_string());
        let prev = Pick::Named(MAP_SELECT_PREV_ARROW.to_string());
        app.handle_pick(&next);
        assert_eq!(app.visible_maps(), 3..6);
        app.handle_pick(&next);
        assert_eq!(app.visible_maps(), 6..7);
        app.handle_pick(&next);
        assert_eq!(app.visible_maps(), 6..7);
        app.handle_pick(&prev);
        assert_eq!(app.visible_maps(), 3..6);
        app.handle_pick(&prev);
        app.handle_pick(&prev);
        assert_eq!(app.visible_maps(), 0..3);

        app.handle_pick(&Pick::Button(9));
        app.tick(DT);
        assert_eq!(app.state(), AppState::SelectMap);

        assert_eq!(
            app.select_map(7),
            Err(InvalidOperation::UnknownMap {
                index: 7,
                available: 7
            })
        );
        app.select_map(4).expect("select");
        app.tick(DT);
        assert_eq!(app.state(), AppState::Retry);
        assert_eq!(app.current_map(), Some(4));
        assert_eq!(app.tiles().map_index(), Some(4));
    }

    #[test]
    fn win_screen_pick_returns_to_map_select_at_current_map() {
        let maps = (0..5)
            .map(|index| map(&format!("map {index}"), &[(0, 0, Some(ROLE_BUS_STOP))]))
            .collect();
        let mut app = app_with(maps, SimConfig::default());
        boot_to_ready(&mut app, 4);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Go);
        tick_until(&mut app, 1000, |app| app.state() != AppState::Running);
        assert_eq!(app.state(), AppState::Win);

        app.tick(DT);
        assert_eq!(app.state(), AppState::Win);
        app.handle_pick(&Pick::Nothing);
        app.tick(DT);
        assert_eq!(app.state(), AppState::SelectMap);
        assert_eq!(app.visible_maps(), 4..5);

        app.handle_pick(&Pick::Named(MAP_SELECT_PREV_ARROW.to_string()));
        assert_eq!(app.visible_maps(), 0..3);
    }

    #[test]
    fn stale_requests_do_not_leak_into_later_states() {
        let mut app = app_with(
            vec![map("plain", &[(0, 0, None), (0, 1, None)])],
            SimConfig::default(),
        );
        boot_to_ready(&mut app, 0);
        app.retry();
        app.request_map_select();
        app.tick(DT);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Go);
        tick_until(&mut app, 1000, |app| app.state() == AppState::Dead);
        app.tick(DT);
        assert_eq!(app.state(), AppState::Dead);
    }

    #[test]
    fn frames_drive_whole_ticks() {
        let mut app = app_with(vec![map("a", &[(0, 0, None)])], SimConfig::default());
        assert_eq!(app.fixed_dt(), Duration::from_millis(33));
        assert_eq!(app.advance_frame(Duration::from_millis(16)), 0);
        assert_eq!(app.state(), AppState::Initial);
        assert_eq!(app.advance_frame(Duration::from_millis(20)), 1);
        assert_eq!(app.state(), AppState::Setup);
    }

    struct ScreenLog {
        entries: Rc<RefCell<Vec<String>>>,
    }

    impl ScreenHooks for ScreenLog {
        fn on_enter(&mut self, state: AppState) {
            self.entries.borrow_mut().push(format!("show {state}"));
        }

        fn on_exit(&mut self, state: AppState) {
            self.entries.borrow_mut().push(format!("hide {state}"));
        }
    }

    #[test]
    fn screen_hooks_bracket_each_state() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let screens = ScreenLog {
            entries: entries.clone(),
        };
        let mut app = app_with(vec![map("a", &[(0, 0, None)])], SimConfig::default())
            .with_screens(Box::new(screens));
        boot_to_ready(&mut app, 0);
        assert_eq!(
            entries.borrow().as_slice(),
            [
                "hide INITIAL",
                "show SETUP",
                "hide SETUP",
                "show LOADED",
                "hide LOADED",
                "show SELECTMAP",
                "hide SELECTMAP",
                "show RETRY",
                "hide RETRY",
                "show READY",
            ]
        );
    }

    #[test]
    fn external_subscribers_see_win_notice() {
        let mut app = app_with(
            vec![map("stop", &[(0, 0, Some(ROLE_BUS_STOP))])],
            SimConfig::default(),
        );
        let inbox = NotificationInbox::shared(&[NotificationKind::StateChange]);
        let id = app.subscribe(inbox.clone());
        boot_to_ready(&mut app, 0);
        press(&mut app, Instruction::Pause);
        press(&mut app, Instruction::Go);
        tick_until(&mut app, 1000, |app| app.state() == AppState::Win);

        assert_eq!(
            inbox.borrow_mut().drain(),
            vec![Notification::StateChange(AppState::Win)]
        );
        assert!(app.unsubscribe(id));
        assert!(!app.unsubscribe(id));
    }
}
