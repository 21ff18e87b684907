use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// (asset, calendar day) key shared by every daily table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetDay {
    pub asset: String,
    pub day: NaiveDate,
}

impl AssetDay {
    pub fn new(asset: &str, day: NaiveDate) -> Self {
        Self {
            asset: asset.to_string(),
            day,
        }
    }
}

/// One scalar per (asset, day); `None` is the missing-value marker.
pub type DailySeries = BTreeMap<AssetDay, Option<f64>>;

/// Maps NaN and ±inf to the missing-value marker.
pub fn finite_or_missing(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Groups a daily series by asset, keeping day order within each asset.
pub fn by_asset(series: &DailySeries) -> BTreeMap<&str, Vec<(NaiveDate, Option<f64>)>> {
    let mut out: BTreeMap<&str, Vec<(NaiveDate, Option<f64>)>> = BTreeMap::new();
    for (key, value) in series {
        out.entry(key.asset.as_str())
            .or_default()
            .push((key.day, *value));
    }
    out
}
