use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::features::FeatureBlock;
use crate::model::{AssetDay, DailySeries};

pub const TARGET_COLUMN: &str = "Target";
pub const WEIGHTS_COLUMN: &str = "Sample Weights";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetMode {
    /// Features plus the realized target.
    Training,
    /// Features only, for an external predictor.
    Inference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub key: AssetDay,
    pub features: Vec<Option<f64>>,
    pub target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub mode: DatasetMode,
    pub feature_columns: Vec<String>,
    pub rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows grouped by day in one pass, row order kept within a day.
    pub fn rows_by_day(&self) -> BTreeMap<NaiveDate, Vec<&DatasetRow>> {
        let mut out: BTreeMap<NaiveDate, Vec<&DatasetRow>> = BTreeMap::new();
        for row in &self.rows {
            out.entry(row.key.day).or_default().push(row);
        }
        out
    }

    pub fn target_series(&self) -> DailySeries {
        self.rows
            .iter()
            .map(|r| (r.key.clone(), r.target))
            .collect()
    }

    /// Replaces targets row by row; rows absent from `series` become missing.
    pub fn set_targets(&mut self, series: &DailySeries) {
        for row in &mut self.rows {
            row.target = series.get(&row.key).copied().flatten();
        }
    }

    pub fn feature_series(&self, column: &str) -> Option<DailySeries> {
        let idx = self.feature_columns.iter().position(|c| c == column)?;
        Some(
            self.rows
                .iter()
                .map(|r| (r.key.clone(), r.features[idx]))
                .collect(),
        )
    }
}

/// Why the join left an asset-day out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    NoTarget,
    NoDailyFeatures,
    NoIntradayFeatures,
}

/// Keys seen in any input but missing from the dataset, with the first
/// filter that rejected them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinReport {
    pub dropped: BTreeMap<AssetDay, DropReason>,
}

impl JoinReport {
    pub fn count(&self, reason: DropReason) -> usize {
        self.dropped.values().filter(|r| **r == reason).count()
    }
}

/// Inner-joins the target with both feature blocks and scales every cell.
#[derive(Debug, Clone, Copy)]
pub struct DatasetAssembler {
    scale: f64,
}

impl Default for DatasetAssembler {
    fn default() -> Self {
        Self { scale: 1e4 }
    }
}

impl DatasetAssembler {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }

    /// With `target == None` the dataset is built in inference mode and no
    /// target filter applies.
    pub fn assemble(
        &self,
        target: Option<&DailySeries>,
        daily: &FeatureBlock,
        intraday: &FeatureBlock,
    ) -> (Dataset, JoinReport) {
        let mut keys: BTreeSet<&AssetDay> = daily.rows.keys().chain(intraday.rows.keys()).collect();
        if let Some(target) = target {
            keys.extend(target.keys());
        }

        let mut report = JoinReport::default();
        let mut rows = Vec::new();
        for key in keys {
            let target_value = match target {
                Some(t) => match t.get(key) {
                    Some(v) => *v,
                    None => {
                        report.dropped.insert(key.clone(), DropReason::NoTarget);
                        continue;
                    }
                },
                None => None,
            };
            let Some(daily_row) = daily.get(key) else {
                report.dropped.insert(key.clone(), DropReason::NoDailyFeatures);
                continue;
            };
            let Some(intraday_row) = intraday.get(key) else {
                report
                    .dropped
                    .insert(key.clone(), DropReason::NoIntradayFeatures);
                continue;
            };

            let features = daily_row
                .iter()
                .chain(intraday_row)
                .map(|cell| cell.map(|v| v * self.scale))
                .collect();
            rows.push(DatasetRow {
                key: key.clone(),
                features,
                target: target_value.map(|v| v * self.scale),
            });
        }

        let mut feature_columns = daily.columns.clone();
        feature_columns.extend(intraday.columns.iter().cloned());
        let mode = if target.is_some() {
            DatasetMode::Training
        } else {
            DatasetMode::Inference
        };

        tracing::info!(
            rows = rows.len(),
            no_target = report.count(DropReason::NoTarget),
            no_daily = report.count(DropReason::NoDailyFeatures),
            no_intraday = report.count(DropReason::NoIntradayFeatures),
            "Dataset assembled"
        );
        (
            Dataset {
                mode,
                feature_columns,
                rows,
            },
            report,
        )
    }
}
