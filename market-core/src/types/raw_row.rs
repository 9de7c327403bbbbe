use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// Direction of the 24h change as signalled by the page's markup rather than
/// its text (e.g. a `down` class on the percentage cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
}

const DOWN_MARKERS: &[&str] = &["down", "negative", "fall", "loss", "sell", "red"];
const UP_MARKERS: &[&str] = &["up", "positive", "rise", "gain", "buy", "green"];

impl ChangeDirection {
    /// Classify a `class` attribute value. Each class name is split on `-`
    /// and `_` so that `price-down` and `is_negative` both count, while
    /// `download` or `group` do not.
    pub fn from_class_list(classes: &str) -> Option<Self> {
        let mut found = None;
        for fragment in classes
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|f| !f.is_empty())
        {
            let fragment = fragment.to_ascii_lowercase();
            if DOWN_MARKERS.contains(&fragment.as_str()) {
                return Some(Self::Down);
            }
            if UP_MARKERS.contains(&fragment.as_str()) {
                found = Some(Self::Up);
            }
        }
        found
    }
}

/// One listing row as lifted from the rendered document, before any token
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub symbol: Symbol,
    /// The row's full text content, whitespace-collapsed to one line.
    pub text: String,
    pub direction: Option<ChangeDirection>,
}

impl RawRow {
    pub fn new(symbol: impl Into<Symbol>, text: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            text: text.into(),
            direction: None,
        }
    }

    pub fn with_direction(mut self, direction: Option<ChangeDirection>) -> Self {
        self.direction = direction;
        self
    }
}
