// Copyright (c) 2024 Botho Foundation

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use zmt_rewards::{Amount, BoostCurve, ExchangeRate, FeeRateBps, BPS_SCALE};

use crate::ledger::TaskCadence;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub mining: MiningConfig,

    #[serde(default)]
    pub referral: ReferralConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    /// Boost catalog
    #[serde(default = "default_boosts")]
    pub boosts: Vec<BoostTier>,

    /// Task catalog
    #[serde(default = "default_tasks")]
    pub tasks: Vec<TaskReward>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            mining: MiningConfig::default(),
            referral: ReferralConfig::default(),
            exchange: ExchangeConfig::default(),
            clock: ClockConfig::default(),
            boosts: default_boosts(),
            tasks: default_tasks(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding the LMDB file. Defaults to `ledger/` next to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// LMDB map size in MiB
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: u64,

    /// Retries of a critical section after a storage or lock failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff step between retries; attempt `n` sleeps `n * retry_backoff_ms`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Longest wait for a per-account lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_map_size_mb() -> u64 {
    1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    10
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            map_size_mb: default_map_size_mb(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Rate given to new accounts, in ZMT per second
    #[serde(default = "default_mining_rate", with = "amount_str")]
    pub default_rate: Amount,

    /// Accrual cap for a single session
    #[serde(default = "default_max_session_secs")]
    pub max_session_secs: u64,

    /// Multiplier added per boost level, in basis points (5000 = +0.5x)
    #[serde(default = "default_boost_step_bps")]
    pub boost_step_bps: u64,
}

fn default_mining_rate() -> Amount {
    // 0.000001 ZMT/s
    Amount::from_picos(1_000_000)
}

fn default_max_session_secs() -> u64 {
    // 30 days
    30 * 24 * 60 * 60
}

fn default_boost_step_bps() -> u64 {
    5_000
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            default_rate: default_mining_rate(),
            max_session_secs: default_max_session_secs(),
            boost_step_bps: default_boost_step_bps(),
        }
    }
}

impl MiningConfig {
    pub fn boost_curve(&self) -> BoostCurve {
        BoostCurve::new(self.boost_step_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostTier {
    pub level: u32,
    #[serde(with = "amount_str")]
    pub price: Amount,
}

fn default_boosts() -> Vec<BoostTier> {
    [(1, 10), (2, 25), (3, 50), (4, 100), (5, 200)]
        .into_iter()
        .map(|(level, zmt)| BoostTier {
            level,
            price: Amount::from_zmt(zmt),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Credited to the referrer once per referred account
    #[serde(default = "default_referral_reward", with = "amount_str")]
    pub reward: Amount,
}

fn default_referral_reward() -> Amount {
    // 0.000005 ZMT
    Amount::from_picos(5_000_000)
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            reward: default_referral_reward(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReward {
    pub task_type: String,
    #[serde(with = "amount_str")]
    pub reward: Amount,
    /// `daily` or `once`
    #[serde(default)]
    pub cadence: TaskCadence,
}

fn default_tasks() -> Vec<TaskReward> {
    [
        ("daily_login", 10_000_000, TaskCadence::Daily),
        ("telegram_join", 100_000_000, TaskCadence::Once),
        ("tiktok_share", 100_000_000, TaskCadence::Once),
    ]
    .into_iter()
    .map(|(task_type, picos, cadence)| TaskReward {
        task_type: task_type.to_string(),
        reward: Amount::from_picos(picos),
        cadence,
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Fee withheld from each exchange, in basis points (100 = 1%)
    #[serde(default = "default_fee_bps")]
    pub fee_bps: FeeRateBps,

    /// Fixed external units per ZMT, in parts per million
    #[serde(default = "default_rate_ppm")]
    pub rate_ppm: u64,
}

fn default_fee_bps() -> FeeRateBps {
    100
}

fn default_rate_ppm() -> u64 {
    2_000_000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
            rate_ppm: default_rate_ppm(),
        }
    }
}

impl ExchangeConfig {
    pub fn rate(&self) -> ExchangeRate {
        ExchangeRate::from_ppm(self.rate_ppm)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Minutes east of UTC used to decide calendar days
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config at {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining.default_rate.is_zero() {
            bail!("mining.default_rate must be positive");
        }
        if self.mining.max_session_secs == 0 {
            bail!("mining.max_session_secs must be positive");
        }
        if u64::from(self.exchange.fee_bps) > BPS_SCALE {
            bail!("exchange.fee_bps {} exceeds 100%", self.exchange.fee_bps);
        }
        if self.exchange.rate_ppm == 0 {
            bail!("exchange.rate_ppm must be positive");
        }
        if self.referral.reward.is_zero() {
            bail!("referral.reward must be positive");
        }

        let mut levels = HashSet::new();
        for tier in &self.boosts {
            if tier.level == 0 {
                bail!("boost level 0 is the unboosted baseline and cannot be sold");
            }
            if tier.price.is_zero() {
                bail!("boost level {} has no price", tier.level);
            }
            if !levels.insert(tier.level) {
                bail!("duplicate boost level {}", tier.level);
            }
        }

        let mut task_types = HashSet::new();
        for task in &self.tasks {
            if task.reward.is_zero() {
                bail!("task {} has no reward", task.task_type);
            }
            if !task_types.insert(task.task_type.as_str()) {
                bail!("duplicate task type {}", task.task_type);
            }
        }

        Ok(())
    }

    /// Ledger directory: `ledger.data_dir` if set, else `ledger/` beside the config file.
    pub fn ledger_path(&self, config_path: &Path) -> PathBuf {
        self.ledger
            .data_dir
            .clone()
            .unwrap_or_else(|| ledger_db_path_from_config(config_path))
    }

    pub fn boost_price(&self, level: u32) -> Option<Amount> {
        self.boosts.iter().find(|t| t.level == level).map(|t| t.price)
    }
}

/// Get the default data directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zmt")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

/// Get the ledger database path from config file path
pub fn ledger_db_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(config_path)
        .join("ledger")
}

/// Amounts as decimal ZMT strings ("0.000001") so config files stay readable.
mod amount_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use zmt_rewards::Amount;

    pub fn serialize<S: Serializer>(amount: &Amount, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Amount, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(D::Error::custom)
    }
}
