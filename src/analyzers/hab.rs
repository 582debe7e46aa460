use serde::{Deserialize, Serialize};

/// Harmful-algal-bloom severity of a `ci_cyano` reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabLevel {
    Low,
    Medium,
    High,
}

impl HabLevel {
    pub fn is_high(self) -> bool {
        self == HabLevel::High
    }

    pub fn is_medium(self) -> bool {
        self == HabLevel::Medium
    }

    pub fn is_high_or_medium(self) -> bool {
        self >= HabLevel::Medium
    }
}

/// Classification thresholds on `ci_cyano`.
///
/// | Range                   | Level  |
/// |-------------------------|--------|
/// | >= high                 | high   |
/// | >= medium and < high    | medium |
/// | otherwise (incl. NaN)   | low    |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HabThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for HabThresholds {
    fn default() -> Self {
        Self {
            high: 0.016,
            medium: 0.001,
        }
    }
}

impl HabThresholds {
    pub fn classify(&self, ci_cyano: f64) -> HabLevel {
        match ci_cyano {
            c if c >= self.high => HabLevel::High,
            c if c >= self.medium => HabLevel::Medium,
            _ => HabLevel::Low,
        }
    }
}
