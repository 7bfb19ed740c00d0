/// Button names resolved by the picking collaborator.
pub const RETRY_BUTTON: &str = "retryButton";
pub const CHOOSE_MAP_BUTTON: &str = "chooseMapButton";
pub const MAP_SELECT_NEXT_ARROW: &str = "mapSelectNextArrow";
pub const MAP_SELECT_PREV_ARROW: &str = "mapSelectPrevArrow";

/// Logical result of a click: nothing hit, a numbered button, or a named object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    Nothing,
    Button(i64),
    Named(String),
}

impl Pick {
    /// Numbers become buttons; negative numbers and blank ids mean nothing was hit.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Pick::Nothing;
        }
        match raw.parse::<i64>() {
            Ok(id) if id < 0 => Pick::Nothing,
            Ok(id) => Pick::Button(id),
            Err(_) => Pick::Named(raw.to_string()),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Pick::Named(value) if value == name)
    }
}
