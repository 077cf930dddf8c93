//! Task priority levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority of a task.
///
/// Ordering is meaningful: `Background < Low < Normal < High < Urgent`.
/// Deadlock resolution and memory-pressure shedding pick victims from the
/// low end of this ordering.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Background,
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Background,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];

    /// Base score contributed by this priority level.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Background => 100.0,
            Priority::Low => 250.0,
            Priority::Normal => 500.0,
            Priority::High => 750.0,
            Priority::Urgent => 1000.0,
        }
    }

    /// Next level up (aging promotion). `Urgent` stays `Urgent`.
    pub fn promoted(self) -> Self {
        match self {
            Priority::Background => Priority::Low,
            Priority::Low => Priority::Normal,
            Priority::Normal => Priority::High,
            Priority::High | Priority::Urgent => Priority::Urgent,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Background => "background",
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ordering_matches_victim_selection_order() {
        let mut shuffled = vec![
            Priority::High,
            Priority::Background,
            Priority::Urgent,
            Priority::Low,
            Priority::Normal,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Priority::ALL.to_vec());
    }

    #[rstest]
    #[case::background(Priority::Background, Priority::Low)]
    #[case::low(Priority::Low, Priority::Normal)]
    #[case::normal(Priority::Normal, Priority::High)]
    #[case::high(Priority::High, Priority::Urgent)]
    #[case::urgent_is_capped(Priority::Urgent, Priority::Urgent)]
    fn promotion_moves_one_level(#[case] from: Priority, #[case] to: Priority) {
        assert_eq!(from.promoted(), to);
    }

    #[test]
    fn weights_are_strictly_increasing() {
        for pair in Priority::ALL.windows(2) {
            assert!(pair[0].weight() < pair[1].weight());
        }
    }

    #[test]
    fn serializes_as_snake_case() {
        let s = serde_json::to_string(&Priority::Background).unwrap();
        assert_eq!(s, "\"background\"");
    }
}
