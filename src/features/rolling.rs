use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::error::DatasetError;
use crate::features::tick_returns::{TickFeature, TickFeatures};
use crate::features::window::padded_windows;
use crate::model::{by_asset, finite_or_missing, AssetDay, DailySeries};

pub const DAILY_RETURN_PREFIX: &str = "ResidReturnD-";
pub const INTRADAY_RETURN_PREFIX: &str = "ResidReturnT-";
pub const INTRADAY_VOLUME_PREFIX: &str = "Volume-";

/// Named columns plus one row per (asset, day); every row has exactly
/// `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBlock {
    pub columns: Vec<String>,
    pub rows: BTreeMap<AssetDay, Vec<Option<f64>>>,
}

impl FeatureBlock {
    pub fn get(&self, key: &AssetDay) -> Option<&[Option<f64>]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingConfig {
    pub daily_lookback: usize,
    pub intraday_lookback: usize,
    pub intraday_cadence: Duration,
    pub cutoff: NaiveTime,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            daily_lookback: 20,
            intraday_lookback: 26,
            intraday_cadence: Duration::minutes(15),
            cutoff: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RollingWindowBuilder {
    cfg: RollingConfig,
}

impl RollingWindowBuilder {
    pub fn new(cfg: RollingConfig) -> Self {
        Self { cfg }
    }

    /// Return and volume windows over the last `intraday_lookback` ticks,
    /// kept only for ticks stamped exactly at the cutoff.
    pub fn intraday(&self, features: &TickFeatures) -> Result<FeatureBlock, DatasetError> {
        let k = self.cfg.intraday_lookback;
        let mut columns = lag_columns(INTRADAY_RETURN_PREFIX, k);
        columns.extend(lag_columns(INTRADAY_VOLUME_PREFIX, k));

        let mut rows = BTreeMap::new();
        let mut gaps = 0;
        for (asset, ticks) in features {
            gaps += count_cadence_gaps(ticks, self.cfg.intraday_cadence);
            let rets: Vec<Option<f64>> = ticks.iter().map(|t| finite_or_missing(t.ret)).collect();
            let vols: Vec<Option<f64>> = ticks
                .iter()
                .map(|t| finite_or_missing(t.volume))
                .collect();
            let ret_windows = padded_windows(&rets, k)?;
            let vol_windows = padded_windows(&vols, k)?;

            for (i, tick) in ticks.iter().enumerate() {
                if tick.timestamp.time() != self.cfg.cutoff {
                    continue;
                }
                let mut row = ret_windows[i].clone();
                row.extend_from_slice(&vol_windows[i]);
                rows.insert(AssetDay::new(asset, tick.timestamp.date()), row);
            }
        }

        if gaps > 0 {
            tracing::warn!(
                gaps,
                cadence_minutes = self.cfg.intraday_cadence.num_minutes(),
                "Tick spacing differs from the configured cadence; windows are positional"
            );
        }
        tracing::info!(rows = rows.len(), columns = columns.len(), "Intraday windows built");
        Ok(FeatureBlock { columns, rows })
    }

    /// Windows over the previous days' realized targets, one row per
    /// observed day whose previous observed day has a realized target.
    /// `observed` lists every day each asset traded on, so a day cut at
    /// the session close still gets a row.
    pub fn daily(
        &self,
        target: &DailySeries,
        observed: &BTreeMap<&str, Vec<NaiveDate>>,
    ) -> Result<FeatureBlock, DatasetError> {
        let w = self.cfg.daily_lookback;
        let columns = lag_columns(DAILY_RETURN_PREFIX, w);
        let lagged = lag_one_day(target, observed);

        let mut rows = BTreeMap::new();
        for (asset, days) in by_asset(&lagged) {
            let values: Vec<Option<f64>> = days.iter().map(|(_, v)| *v).collect();
            let windows = padded_windows(&values, w)?;
            for ((day, _), window) in days.iter().zip(windows) {
                rows.insert(AssetDay::new(asset, *day), window);
            }
        }

        tracing::info!(rows = rows.len(), columns = columns.len(), "Daily windows built");
        Ok(FeatureBlock { columns, rows })
    }
}

/// Each asset's value moved onto its next observed day. The first day of
/// an asset and days whose previous value is missing are dropped.
pub fn lag_one_day(
    series: &DailySeries,
    observed: &BTreeMap<&str, Vec<NaiveDate>>,
) -> DailySeries {
    let mut out = DailySeries::new();
    for (asset, days) in observed {
        for pair in days.windows(2) {
            if let Some(Some(prev)) = series.get(&AssetDay::new(asset, pair[0])) {
                out.insert(AssetDay::new(asset, pair[1]), Some(*prev));
            }
        }
    }
    out
}

/// `prefix-n, ..., prefix-1`: oldest lag first, most recent last.
pub fn lag_columns(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).rev().map(|i| format!("{}{}", prefix, i)).collect()
}

/// Consecutive same-day ticks whose spacing is not the nominal cadence.
pub fn count_cadence_gaps(ticks: &[TickFeature], cadence: Duration) -> usize {
    ticks
        .windows(2)
        .filter(|pair| pair[0].timestamp.date() == pair[1].timestamp.date())
        .filter(|pair| pair[1].timestamp - pair[0].timestamp != cadence)
        .count()
}
