//! Proficiency levels and their total order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course/student proficiency level.
///
/// Variants are declared in ascending order so the derived `Ord` is the
/// level order used by skill matching and waiting-demand lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Starter,
    Beginner,
    Elementary,
    #[serde(rename = "Pre-Intermediate")]
    PreIntermediate,
    Intermediate,
    #[serde(rename = "Upper-Intermediate")]
    UpperIntermediate,
    Advanced,
    Expert,
}

impl Level {
    /// All levels, lowest first.
    pub const ORDER: [Level; 8] = [
        Level::Starter,
        Level::Beginner,
        Level::Elementary,
        Level::PreIntermediate,
        Level::Intermediate,
        Level::UpperIntermediate,
        Level::Advanced,
        Level::Expert,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The level immediately below this one, if any.
    pub fn previous(self) -> Option<Level> {
        self.index().checked_sub(1).map(|i| Level::ORDER[i])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Starter => "Starter",
            Level::Beginner => "Beginner",
            Level::Elementary => "Elementary",
            Level::PreIntermediate => "Pre-Intermediate",
            Level::Intermediate => "Intermediate",
            Level::UpperIntermediate => "Upper-Intermediate",
            Level::Advanced => "Advanced",
            Level::Expert => "Expert",
        }
    }

    /// Short code used when generating class codes.
    pub fn code(self) -> &'static str {
        match self {
            Level::Starter => "ST",
            Level::Beginner => "BG",
            Level::Elementary => "EL",
            Level::PreIntermediate => "PI",
            Level::Intermediate => "IN",
            Level::UpperIntermediate => "UI",
            Level::Advanced => "AD",
            Level::Expert => "EX",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ORDER
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown level: {}", s))
    }
}
