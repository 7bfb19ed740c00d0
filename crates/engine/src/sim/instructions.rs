use std::fmt::Write as _;

use super::bus::{MapStatus, Notification, Observer};
use super::InvalidOperation;

/// One bot command as issued by the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Forward,
    Back,
    Left,
    Right,
    Go,
    Fire,
    Pause,
    Clear,
    Grid,
}

impl Instruction {
    pub const ALL: [Instruction; 9] = [
        Instruction::Forward,
        Instruction::Back,
        Instruction::Left,
        Instruction::Right,
        Instruction::Go,
        Instruction::Fire,
        Instruction::Pause,
        Instruction::Clear,
        Instruction::Grid,
    ];

    /// Button id used by the control panel.
    pub const fn code(self) -> i64 {
        match self {
            Instruction::Forward => 1,
            Instruction::Back => 2,
            Instruction::Left => 3,
            Instruction::Right => 4,
            Instruction::Go => 5,
            Instruction::Fire => 6,
            Instruction::Pause => 7,
            Instruction::Clear => 8,
            Instruction::Grid => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|instruction| instruction.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let instruction = match lowered.as_str() {
            "forward" => Instruction::Forward,
            "back" => Instruction::Back,
            "left" => Instruction::Left,
            "right" => Instruction::Right,
            "go" => Instruction::Go,
            "fire" | "honk" => Instruction::Fire,
            "pause" => Instruction::Pause,
            "clear" => Instruction::Clear,
            "grid" => Instruction::Grid,
            _ => return None,
        };
        Some(instruction)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Instruction::Forward => "forward",
            Instruction::Back => "back",
            Instruction::Left => "left",
            Instruction::Right => "right",
            Instruction::Go => "go",
            Instruction::Fire => "honk!",
            Instruction::Pause => "pause..",
            Instruction::Clear | Instruction::Grid => "",
        }
    }

    /// GO, CLEAR and GRID drive the panel and never enter a program.
    pub const fn is_program_step(self) -> bool {
        !matches!(
            self,
            Instruction::Go | Instruction::Clear | Instruction::Grid
        )
    }
}

/// Ordered instruction list plus an execution cursor.
#[derive(Debug, Clone, Default)]
pub struct InstructionProgram {
    instructions: Vec<Instruction>,
    cursor: Option<usize>,
}

impl InstructionProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, instruction: Instruction) -> Result<(), InvalidOperation> {
        if self.is_running() {
            return Err(InvalidOperation::ProgramRunning { action: "append" });
        }
        if !instruction.is_program_step() {
            return Err(InvalidOperation::NotAProgramStep { instruction });
        }
        self.instructions.push(instruction);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), InvalidOperation> {
        if self.is_running() {
            return Err(InvalidOperation::ProgramRunning { action: "clear" });
        }
        self.reset();
        Ok(())
    }

    /// Drops the program regardless of cursor position; used when the play
    /// area is rebuilt after a death mid-program.
    pub fn reset(&mut self) {
        self.instructions.clear();
        self.cursor = None;
    }

    pub fn start(&mut self) -> Result<(), InvalidOperation> {
        if self.is_running() {
            return Err(InvalidOperation::ProgramRunning { action: "start" });
        }
        if self.instructions.is_empty() {
            return Err(InvalidOperation::EmptyProgram);
        }
        self.cursor = Some(0);
        Ok(())
    }

    pub fn current(&self) -> Option<Instruction> {
        self.cursor
            .and_then(|index| self.instructions.get(index).copied())
    }

    /// Moves to the next instruction. Running off the end stops the program.
    pub fn advance(&mut self) -> Option<Instruction> {
        let index = self.cursor?;
        let next = index + 1;
        if next >= self.instructions.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(next);
        self.instructions.get(next).copied()
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn count(&self) -> usize {
        self.instructions.len()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// One label per line; the running entry is wrapped in a hint marker.
    pub fn listing(&self, hint: MapStatus) -> String {
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            if Some(index) == self.cursor {
                let marker = match hint {
                    MapStatus::None => '>',
                    MapStatus::Bad => '!',
                    MapStatus::Good => '*',
                };
                let _ = writeln!(out, "{marker} {}", instruction.label());
            } else {
                let _ = writeln!(out, "  {}", instruction.label());
            }
        }
        out
    }
}

/// Tracks the good/bad colouring the instruction list shows for the
/// currently running entry.
#[derive(Debug, Default)]
pub struct HintTracker {
    hint: MapStatus,
}

impl HintTracker {
    pub fn hint(&self) -> MapStatus {
        self.hint
    }

    pub fn reset(&mut self) {
        self.hint = MapStatus::None;
    }
}

impl Observer for HintTracker {
    fn on_notify(&mut self, notification: &Notification, _follow_ups: &mut Vec<Notification>) {
        match notification {
            Notification::StateChange(state) => {
                if let Some(status) = MapStatus::from_state_change(*state) {
                    self.hint = status;
                }
            }
            Notification::ScoreChange(delta) => {
                self.hint = if *delta < 0 {
                    MapStatus::Bad
                } else {
                    MapStatus::Good
                };
            }
            Notification::TileChange(_) => {}
        }
    }
}
