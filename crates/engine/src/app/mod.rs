mod flow;
mod input;
mod loading;
mod loop_runner;

pub use flow::{AppFlowController, NoScreens, OffMapRelay, ScreenHooks};
pub use input::{
    Pick, CHOOSE_MAP_BUTTON, MAP_SELECT_NEXT_ARROW, MAP_SELECT_PREV_ARROW, RETRY_BUTTON,
};
pub use loading::{JobStatus, LoadingGate};
pub use loop_runner::{FixedStepper, LoopConfig};
