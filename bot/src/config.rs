use crate::{
    backoff::DEFAULT_FAILURE_THRESHOLD,
    gate::BlackoutHours,
    round::{DwellPolicy, RewardPolicy},
    session::SessionConfig,
    solver::SolverConfig,
};
use chrono::FixedOffset;
use dropplay_client::DEFAULT_REQUEST_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Upper bound for any single pacing or dwell setting.
pub const MAX_ROUND_SECS: u64 = 60 * 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no accounts configured")]
    NoAccounts,
    #[error("duplicate account name: {0}")]
    DuplicateAccount(String),
    #[error("every hour of the day is blacked out")]
    FullDayBlackout,
    #[error("invalid utc offset: {0} minutes")]
    InvalidOffset(i32),
    #[error("empty range for {0}")]
    EmptyRange(&'static str),
    #[error("{0} exceeds one hour")]
    TooLong(&'static str),
}

/// Per-account settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    /// Bearer token for the game service.
    pub token: String,
    /// Quota to assume when the profile cannot be loaded.
    #[serde(default)]
    pub play_passes: u32,
}

/// Round pacing and reward tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundSettings {
    pub pacing_secs: u64,
    pub dwell_base_secs: u64,
    /// Half-open `[min, max)` range of extra dwell seconds.
    pub dwell_jitter_secs: [u64; 2],
    /// Half-open `[min, max)` range of points per claim.
    pub points: [u32; 2],
    /// Half-open `[min, max)` range of the bonus fraction.
    pub bonus_factor: [f64; 2],
    pub failure_threshold: u32,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            pacing_secs: 2,
            dwell_base_secs: 30,
            dwell_jitter_secs: [5, 10],
            points: [150, 190],
            bonus_factor: [0.10, 0.20],
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// Bot configuration (from config file).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Offset of the service's reference timezone.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default)]
    pub blackout_hours: BlackoutHours,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Minutes to wait after a completed session before the next one.
    #[serde(default = "default_idle_minutes")]
    pub idle_minutes: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub round: RoundSettings,
    pub solver: SolverConfig,
    pub accounts: Vec<AccountConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_utc_offset_minutes() -> i32 {
    7 * 60
}

fn default_currency() -> String {
    "BP".to_string()
}

fn default_idle_minutes() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        let mut names = std::collections::HashSet::new();
        for account in &self.accounts {
            if !names.insert(account.name.as_str()) {
                return Err(ConfigError::DuplicateAccount(account.name.clone()));
            }
        }
        if self.blackout_hours.is_full_day() {
            return Err(ConfigError::FullDayBlackout);
        }
        self.reference_offset()?;

        let round = &self.round;
        for (name, secs) in [
            ("pacing_secs", round.pacing_secs),
            ("dwell_base_secs", round.dwell_base_secs),
            ("dwell_jitter_secs", round.dwell_jitter_secs[1]),
        ] {
            if secs > MAX_ROUND_SECS {
                return Err(ConfigError::TooLong(name));
            }
        }
        if round.dwell_jitter_secs[0] > round.dwell_jitter_secs[1] {
            return Err(ConfigError::EmptyRange("dwell_jitter_secs"));
        }
        if round.points[0] >= round.points[1] {
            return Err(ConfigError::EmptyRange("points"));
        }
        if !(round.bonus_factor[0] < round.bonus_factor[1]) {
            return Err(ConfigError::EmptyRange("bonus_factor"));
        }
        Ok(())
    }

    pub fn reference_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(self.utc_offset_minutes))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_minutes.saturating_mul(60))
    }

    pub fn session_config(&self) -> SessionConfig {
        let round = &self.round;
        SessionConfig {
            blackout: self.blackout_hours.clone(),
            pacing: Duration::from_secs(round.pacing_secs),
            dwell: DwellPolicy {
                base: Duration::from_secs(round.dwell_base_secs),
                jitter_secs: round.dwell_jitter_secs[0]..round.dwell_jitter_secs[1],
            },
            rewards: RewardPolicy {
                points: round.points[0]..round.points[1],
                bonus_factor: round.bonus_factor[0]..round.bonus_factor[1],
            },
            failure_threshold: round.failure_threshold,
            currency: self.currency.clone(),
        }
    }
}
