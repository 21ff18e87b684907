use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveTime};
use serde::Deserialize;

use crate::error::DatasetError;
use crate::features::RollingConfig;
use crate::target::TargetConfig;

pub const CONFIG_PATH_ENV: &str = "TICK_DATASET_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetSection,
    pub features: FeatureSection,
    pub output: OutputSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetSection {
    pub normalize_by_vol: bool,
    pub clip: bool,
    pub clip_quantiles: [f64; 2],
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            normalize_by_vol: true,
            clip: true,
            clip_quantiles: [0.01, 0.99],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureSection {
    pub daily_lookback: usize,
    pub intraday_lookback: usize,
    pub intraday_cadence: String,
    pub session_cutoff: String,
}

impl Default for FeatureSection {
    fn default() -> Self {
        Self {
            daily_lookback: 20,
            intraday_lookback: 26,
            intraday_cadence: "15m".to_string(),
            session_cutoff: "15:30:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Multiplier applied to every dataset cell (1e4 = basis points).
    pub scale: f64,
    pub standardize_target: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            scale: 1e4,
            standardize_target: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Parse an interval string (e.g. "30s", "15m", "1h", "1d") into a duration.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let split = match s.char_indices().last() {
        Some((idx, _)) if idx > 0 => idx,
        _ => bail!("invalid interval '{}': expected format like '15m'", s),
    };

    let (num_str, suffix) = s.split_at(split);
    let n: i64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n <= 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_secs: i64 = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d",
            s,
            suffix
        ),
    };

    let secs = n
        .checked_mul(unit_secs)
        .with_context(|| format!("invalid interval '{}': value is too large", s))?;
    Ok(Duration::seconds(secs))
}

pub fn parse_cutoff(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("invalid session cutoff '{}': expected HH:MM[:SS]", s))
}

impl TargetSection {
    pub fn target_config(&self) -> TargetConfig {
        TargetConfig {
            normalize_by_vol: self.normalize_by_vol,
            clip_quantiles: self
                .clip
                .then_some((self.clip_quantiles[0], self.clip_quantiles[1])),
        }
    }
}

impl FeatureSection {
    pub fn rolling_config(&self) -> Result<RollingConfig> {
        Ok(RollingConfig {
            daily_lookback: self.daily_lookback,
            intraday_lookback: self.intraday_lookback,
            intraday_cadence: parse_interval(&self.intraday_cadence)
                .context("features.intraday_cadence is invalid")?,
            cutoff: self.cutoff()?,
        })
    }

    pub fn cutoff(&self) -> Result<NaiveTime> {
        parse_cutoff(&self.session_cutoff).context("features.session_cutoff is invalid")
    }
}

impl Config {
    /// Loads `path`, else `$TICK_DATASET_CONFIG`, else `config/default.toml`.
    /// Only the implicit default path may be absent, in which case built-in
    /// defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));
        let config_path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = if explicit.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let config_str = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&config_str)
                .with_context(|| format!("failed to parse {}", config_path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let [lo, hi] = self.target.clip_quantiles;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
            return Err(DatasetError::Config(format!(
                "target.clip_quantiles must satisfy 0 <= lo < hi <= 1, got [{}, {}]",
                lo, hi
            ))
            .into());
        }
        if self.features.daily_lookback == 0 || self.features.intraday_lookback == 0 {
            return Err(DatasetError::Config("lookback lengths must be > 0".to_string()).into());
        }
        if !self.output.scale.is_finite() {
            return Err(DatasetError::Config("output.scale must be finite".to_string()).into());
        }
        self.features.rolling_config()?;
        Ok(())
    }
}
