//! Engine configuration file support.
//!
//! Settings are read from a TOML file (`timetable.toml`) and then overridden
//! from the environment. Every field has a default, so an empty file, or no
//! file at all, yields a working configuration.
//!
//! No holiday calendar is built in. Session expansion skips only the dates
//! listed under `[[holidays]]`, so national public holidays (including
//! lunar-calendar ones such as Tết) must be listed for every year classes may
//! run into.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 9000
//!
//! [repository]
//! seed_file = "seed.json"
//!
//! [scheduler]
//! min_gap_days = 1
//!
//! [scoring]
//! preferred_teacher = 100
//!
//! [[holidays]]
//! date = "2026-04-30"
//! name = "Reunification Day"
//!
//! [[holidays]]
//! date = "2026-05-01"
//! name = "Labour Day"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduling::{HolidayInfo, HolidayList, ScoringWeights};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TIMETABLE_CONFIG";
/// Environment variable overriding `[repository] seed_file`.
pub const SEED_ENV: &str = "TIMETABLE_SEED";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub repository: RepositorySettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub holidays: Vec<HolidayInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// JSON document pre-populating the local repository.
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Minimum number of free days between two weekly slots of one class.
    #[serde(default = "default_min_gap_days")]
    pub min_gap_days: u8,
    /// Progress is logged every this many classes.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
    /// How far ahead dated sessions are read when seeding occupancy.
    #[serde(default = "default_horizon_weeks")]
    pub horizon_weeks: u32,
    /// Session expansion gives up after this many weeks.
    #[serde(default = "default_max_expansion_weeks")]
    pub max_expansion_weeks: u64,
    #[serde(default = "default_success_threshold")]
    pub default_success_threshold: f64,
}

fn default_min_gap_days() -> u8 {
    1
}

fn default_progress_every() -> usize {
    5
}

fn default_horizon_weeks() -> u32 {
    26
}

fn default_max_expansion_weeks() -> u64 {
    520
}

fn default_success_threshold() -> f64 {
    0.8
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            min_gap_days: default_min_gap_days(),
            progress_every: default_progress_every(),
            horizon_weeks: default_horizon_weeks(),
            max_expansion_weeks: default_max_expansion_weeks(),
            default_success_threshold: default_success_threshold(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse engine config")
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `timetable.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    ///
    /// Returns `Ok(None)` when no file exists.
    pub fn from_default_location() -> Result<Option<Self>> {
        let search_paths = [
            PathBuf::from("timetable.toml"),
            PathBuf::from("backend/timetable.toml"),
            PathBuf::from("../timetable.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Resolve the configuration the way the server does.
    ///
    /// `TIMETABLE_CONFIG` wins over the default search; environment overrides
    /// are applied last.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => match Self::from_default_location()? {
                Some(config) => config,
                None => {
                    log::info!("No timetable.toml found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `HOST`, `PORT` and `TIMETABLE_SEED`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        if let Ok(seed) = std::env::var(SEED_ENV) {
            if !seed.trim().is_empty() {
                self.repository.seed_file = Some(PathBuf::from(seed.trim()));
            }
        }
        Ok(())
    }

    pub fn holiday_calendar(&self) -> HolidayList {
        HolidayList::new(self.holidays.iter().cloned())
    }
}
