//! Host memory pressure levels.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::priority::Priority;

/// Memory pressure reported by the host.
///
/// Ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    #[default]
    Normal,
    Elevated,
    High,
    Critical,
}

impl PressureLevel {
    /// Highest priority that is shed from the queue at this level, if any.
    ///
    /// - High: background
    /// - Critical: background and low
    pub fn shed_up_to(self) -> Option<Priority> {
        match self {
            PressureLevel::Normal | PressureLevel::Elevated => None,
            PressureLevel::High => Some(Priority::Background),
            PressureLevel::Critical => Some(Priority::Low),
        }
    }
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PressureLevel::Normal => "normal",
            PressureLevel::Elevated => "elevated",
            PressureLevel::High => "high",
            PressureLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}
