use std::collections::BTreeMap;

use crate::model::{day_groups, finite_or_missing, AssetDay, DailySeries, TickPanel};
use crate::target::session::SessionTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetConfig {
    pub normalize_by_vol: bool,
    /// Lower/upper quantiles for winsorizing; `None` disables clipping.
    pub clip_quantiles: Option<(f64, f64)>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            normalize_by_vol: true,
            clip_quantiles: Some((0.01, 0.99)),
        }
    }
}

/// Close-to-close target from the regular-session close of the previous
/// observed day to the regular-session close of the current day.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetBuilder {
    cfg: TargetConfig,
}

impl TargetBuilder {
    pub fn new(cfg: TargetConfig) -> Self {
        Self { cfg }
    }

    pub fn build(&self, panel: &TickPanel, sessions: &SessionTable) -> DailySeries {
        let extended = extended_returns(sessions);
        let shifted = shift_to_next_day(sessions, &extended);
        let regular = regular_leg(sessions);
        let mut target = compose_legs(&shifted, &regular);
        tracing::info!(rows = target.len(), "Raw targets composed");

        if self.cfg.normalize_by_vol {
            target = normalize_by_vol(&target, &daily_est_vol(panel));
        }

        if let Some((lower_q, upper_q)) = self.cfg.clip_quantiles {
            if let Some(bounds) = QuantileBounds::from_series(&target, lower_q, upper_q) {
                tracing::debug!(lower = bounds.lower, upper = bounds.upper, "Clipping targets");
                bounds.clip(&mut target);
            }
        }

        let missing = target.values().filter(|v| v.is_none()).count();
        tracing::info!(rows = target.len(), missing, "Targets built");
        target
    }
}

/// `RE(d) = (1 + C_ext) / (1 + C_reg) - 1` for every complete day.
pub fn extended_returns(sessions: &SessionTable) -> BTreeMap<AssetDay, f64> {
    sessions
        .complete
        .iter()
        .map(|(key, snap)| {
            (
                key.clone(),
                (1.0 + snap.extended) / (1.0 + snap.regular) - 1.0,
            )
        })
        .collect()
}

/// Moves each day's extended-session return onto the asset's next observed
/// day. The next day only receives a value when the day before it was
/// complete, so an incomplete day breaks the chain.
pub fn shift_to_next_day(
    sessions: &SessionTable,
    extended: &BTreeMap<AssetDay, f64>,
) -> BTreeMap<AssetDay, f64> {
    let mut out = BTreeMap::new();
    for (asset, days) in sessions.observed_days() {
        for pair in days.windows(2) {
            if let Some(re) = extended.get(&AssetDay::new(asset, pair[0])) {
                out.insert(AssetDay::new(asset, pair[1]), *re);
            }
        }
    }
    out
}

/// Cumulative return at the regular-session close, i.e. since the previous
/// day's session end.
pub fn regular_leg(sessions: &SessionTable) -> BTreeMap<AssetDay, f64> {
    sessions
        .complete
        .iter()
        .map(|(key, snap)| (key.clone(), snap.regular))
        .collect()
}

/// Inner join of the two legs followed by `prod(1 + leg) - 1`.
pub fn compose_legs(
    shifted_extended: &BTreeMap<AssetDay, f64>,
    regular: &BTreeMap<AssetDay, f64>,
) -> DailySeries {
    shifted_extended
        .iter()
        .filter_map(|(key, re)| {
            let reg = regular.get(key)?;
            let legs = [*re, *reg];
            let compounded = legs.iter().map(|r| 1.0 + r).product::<f64>() - 1.0;
            Some((key.clone(), finite_or_missing(compounded)))
        })
        .collect()
}

/// First finite volatility estimate of each (asset, day).
pub fn daily_est_vol(panel: &TickPanel) -> BTreeMap<AssetDay, f64> {
    let mut out = BTreeMap::new();
    for (asset, ticks) in panel.assets() {
        for (day, group) in day_groups(ticks) {
            if let Some(vol) = group
                .iter()
                .filter_map(|t| t.est_vol)
                .find(|v| v.is_finite())
            {
                out.insert(AssetDay::new(asset, day), vol);
            }
        }
    }
    out
}

/// Divides by the day's volatility estimate. A missing estimate or a
/// non-finite quotient (zero vol) yields a missing target.
pub fn normalize_by_vol(target: &DailySeries, est_vol: &BTreeMap<AssetDay, f64>) -> DailySeries {
    target
        .iter()
        .map(|(key, value)| {
            let scaled = match (value, est_vol.get(key)) {
                (Some(v), Some(vol)) => finite_or_missing(v / vol),
                _ => None,
            };
            (key.clone(), scaled)
        })
        .collect()
}

/// Linear-interpolated quantile of an ascending slice. `q` in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileBounds {
    pub lower: f64,
    pub upper: f64,
}

impl QuantileBounds {
    /// Bounds from every non-missing value in the series, pooled across
    /// assets and days. `None` when nothing is observed.
    pub fn from_series(series: &DailySeries, lower_q: f64, upper_q: f64) -> Option<Self> {
        let mut values: Vec<f64> = series.values().flatten().copied().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(Self {
            lower: quantile(&values, lower_q)?,
            upper: quantile(&values, upper_q)?,
        })
    }

    /// In-place winsorizing; missing values stay missing.
    pub fn clip(&self, series: &mut DailySeries) {
        for value in series.values_mut().flatten() {
            *value = value.max(self.lower).min(self.upper);
        }
    }
}
