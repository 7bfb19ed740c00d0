use tracing::debug;

use super::instructions::Instruction;

pub const LADY_BOARDING_REWARD: i64 = 1000;
pub const LADY_HONK_PENALTY: i64 = -100;
pub const BIRD_SCARED_PENALTY: i64 = -100;
pub const BIRD_HONK_REWARD: i64 = 5000;

/// Score consequence of a flair reaction, applied by the owning tile graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlairEffect {
    pub score_delta: i64,
    pub counts_toward_completion: bool,
}

impl FlairEffect {
    pub const fn success(score_delta: i64, counts_toward_completion: bool) -> Self {
        Self {
            score_delta,
            counts_toward_completion,
        }
    }

    pub const fn failure(score_delta: i64) -> Self {
        Self {
            score_delta,
            counts_toward_completion: false,
        }
    }
}

/// NPC decoration attached to a tile.
#[derive(Debug, Clone)]
pub enum FlairEntity {
    BusStop(BusStop),
    Lady(Lady),
    Bird(Bird),
}

impl FlairEntity {
    pub fn name(&self) -> &str {
        match self {
            FlairEntity::BusStop(stop) => &stop.name,
            FlairEntity::Lady(lady) => &lady.name,
            FlairEntity::Bird(bird) => &bird.name,
        }
    }

    pub fn activate(&mut self) {
        if let FlairEntity::Bird(bird) = self {
            bird.bot_present = true;
        }
    }

    pub fn deactivate(&mut self) {
        if let FlairEntity::Bird(bird) = self {
            bird.bot_present = false;
        }
    }

    pub fn do_special(&mut self, instruction: Instruction, effects: &mut Vec<FlairEffect>) {
        match self {
            FlairEntity::BusStop(_) => {}
            FlairEntity::Lady(lady) => lady.do_special(instruction, effects),
            FlairEntity::Bird(bird) => bird.do_special(instruction),
        }
    }

    pub fn update(&mut self, effects: &mut Vec<FlairEffect>) {
        if let FlairEntity::Bird(bird) = self {
            bird.update(effects);
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusStop {
    name: String,
}

impl BusStop {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Waiting passenger. Boards once on PAUSE; objects to every honk.
#[derive(Debug, Clone)]
pub struct Lady {
    name: String,
    boarded: bool,
}

impl Lady {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boarded: false,
        }
    }

    pub fn has_boarded(&self) -> bool {
        self.boarded
    }

    fn do_special(&mut self, instruction: Instruction, effects: &mut Vec<FlairEffect>) {
        match instruction {
            Instruction::Pause if !self.boarded => {
                self.boarded = true;
                debug!(flair = %self.name, "lady_boarded");
                effects.push(FlairEffect::success(LADY_BOARDING_REWARD, true));
            }
            // No one-shot guard: every honk near her costs points.
            Instruction::Fire => {
                debug!(flair = %self.name, "lady_startled");
                effects.push(FlairEffect::failure(LADY_HONK_PENALTY));
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirdState {
    Initial,
    Ready,
    HelloBot,
    GoodbyeBot,
    Gone,
    DoingSpecial,
}

#[derive(Debug, Clone)]
pub struct Bird {
    name: String,
    state: BirdState,
    bot_present: bool,
    special_triggered: bool,
    done_special: bool,
    flown_away: bool,
}

impl Bird {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: BirdState::Initial,
            bot_present: false,
            special_triggered: false,
            done_special: false,
            flown_away: false,
        }
    }

    pub fn state(&self) -> BirdState {
        self.state
    }

    pub fn has_flown_away(&self) -> bool {
        self.flown_away
    }

    fn do_special(&mut self, instruction: Instruction) {
        if instruction == Instruction::Fire && !self.special_triggered {
            self.special_triggered = true;
        }
    }

    fn update(&mut self, effects: &mut Vec<FlairEffect>) {
        self.act_on_state(effects);
        self.update_state(effects);
    }

    fn act_on_state(&mut self, effects: &mut Vec<FlairEffect>) {
        if self.state == BirdState::DoingSpecial {
            self.done_special = true;
            self.flown_away = true;
            effects.push(FlairEffect::success(BIRD_HONK_REWARD, false));
        }
    }

    fn update_state(&mut self, effects: &mut Vec<FlairEffect>) {
        let next = if self.flown_away {
            BirdState::Gone
        } else {
            match self.state {
                BirdState::Initial => BirdState::Ready,
                BirdState::Ready if self.bot_present => BirdState::HelloBot,
                BirdState::Ready if self.special_triggered && !self.done_special => {
                    BirdState::DoingSpecial
                }
                // Unreachable while entering HelloBot sets `flown_away`.
                BirdState::HelloBot if !self.bot_present => BirdState::GoodbyeBot,
                BirdState::GoodbyeBot if self.bot_present => BirdState::HelloBot,
                BirdState::DoingSpecial => BirdState::HelloBot,
                current => current,
            }
        };

        if next != self.state {
            debug!(flair = %self.name, from = ?self.state, to = ?next, "bird_state_changed");
            self.state = next;
            self.on_enter_state(effects);
        }
    }

    fn on_enter_state(&mut self, effects: &mut Vec<FlairEffect>) {
        if self.state == BirdState::HelloBot && !self.done_special {
            // Startled bird flies at the camera and is not seen again.
            self.flown_away = true;
            effects.push(FlairEffect::failure(BIRD_SCARED_PENALTY));
        }
    }
}
