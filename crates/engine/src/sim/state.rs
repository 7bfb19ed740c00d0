use std::fmt;

/// Screen-level phase of a session. `Dead` and `Win` also travel on the bus
/// as state-change notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Initial,
    Setup,
    Loaded,
    Ready,
    Running,
    Win,
    Dead,
    Retry,
    SelectMap,
}

impl AppState {
    pub const ALL: [AppState; 9] = [
        AppState::Initial,
        AppState::Setup,
        AppState::Loaded,
        AppState::Ready,
        AppState::Running,
        AppState::Win,
        AppState::Dead,
        AppState::Retry,
        AppState::SelectMap,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AppState::Initial => "INITIAL",
            AppState::Setup => "SETUP",
            AppState::Loaded => "LOADED",
            AppState::Ready => "READY",
            AppState::Running => "RUNNING",
            AppState::Win => "WIN",
            AppState::Dead => "DEAD",
            AppState::Retry => "RETRY",
            AppState::SelectMap => "SELECTMAP",
        }
    }

    /// Case-insensitive lookup by the upper-case state name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
