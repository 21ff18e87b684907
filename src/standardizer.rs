use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::model::{by_asset, DailySeries};

/// Reserved key holding the cross-asset fallback statistics.
pub const GLOBAL_KEY: &str = "_MEAN";

/// Per-asset z-scoring, fitted once and applied to any daily column.
///
/// `None` statistics are undefined (no observation for the mean, fewer
/// than two for the standard deviation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: BTreeMap<String, Option<f64>>,
    stds: BTreeMap<String, Option<f64>>,
}

impl Standardizer {
    pub fn fit(series: &DailySeries) -> Self {
        let mut means = BTreeMap::new();
        let mut stds = BTreeMap::new();
        for (asset, days) in by_asset(series) {
            let values: Vec<f64> = days.iter().filter_map(|(_, v)| *v).collect();
            means.insert(asset.to_string(), mean(&values));
            stds.insert(asset.to_string(), sample_std(&values));
        }

        let defined_means: Vec<f64> = means.values().flatten().copied().collect();
        let defined_stds: Vec<f64> = stds.values().flatten().copied().collect();
        means.insert(GLOBAL_KEY.to_string(), mean(&defined_means));
        stds.insert(GLOBAL_KEY.to_string(), mean(&defined_stds));

        tracing::debug!(assets = means.len() - 1, "Standardizer fitted");
        Self { means, stds }
    }

    pub fn mean(&self, asset: &str) -> Option<f64> {
        self.means.get(asset).copied().flatten()
    }

    pub fn std(&self, asset: &str) -> Option<f64> {
        self.stds.get(asset).copied().flatten()
    }

    pub fn is_known(&self, asset: &str) -> bool {
        asset != GLOBAL_KEY && self.stds.contains_key(asset)
    }

    /// `(x - mean) / std` with the asset's statistics, the global pair for
    /// unseen assets, and identity when the chosen std is zero or undefined.
    pub fn transform(&self, series: &DailySeries) -> DailySeries {
        self.apply(series, |x, mean, std| (x - mean) / std)
    }

    /// Algebraic inverse of [`Standardizer::transform`].
    pub fn inverse_transform(&self, series: &DailySeries) -> DailySeries {
        self.apply(series, |z, mean, std| z * std + mean)
    }

    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let payload = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&payload)?)
    }

    fn apply(&self, series: &DailySeries, f: impl Fn(f64, f64, f64) -> f64) -> DailySeries {
        series
            .iter()
            .map(|(key, value)| {
                let scaled = match (value, self.scale_for(&key.asset)) {
                    (Some(x), Some((mean, std))) => Some(f(*x, mean, std)),
                    (other, _) => *other,
                };
                (key.clone(), scaled)
            })
            .collect()
    }

    /// `None` means the column passes through unscaled.
    fn scale_for(&self, asset: &str) -> Option<(f64, f64)> {
        let key = if self.is_known(asset) { asset } else { GLOBAL_KEY };
        let std = self.std(key).filter(|s| *s != 0.0)?;
        let mean = self.mean(key)?;
        Some((mean, std))
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
