use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::DatasetError;
use crate::model::tick::TickRecord;

/// Raw ticks grouped by asset, each asset sorted by timestamp.
#[derive(Debug, Clone, Default)]
pub struct TickPanel {
    by_asset: BTreeMap<String, Vec<TickRecord>>,
}

impl TickPanel {
    /// Groups and orders raw records. Fails on an empty input and on two
    /// ticks sharing the same (asset, timestamp).
    pub fn from_records(records: Vec<TickRecord>) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::NoInputData(
                "no tick records to process".to_string(),
            ));
        }

        let mut by_asset: BTreeMap<String, Vec<TickRecord>> = BTreeMap::new();
        for record in records {
            by_asset.entry(record.asset.clone()).or_default().push(record);
        }

        for (asset, ticks) in by_asset.iter_mut() {
            ticks.sort_by_key(|t| t.timestamp);
            if let Some(pair) = ticks
                .windows(2)
                .find(|pair| pair[0].timestamp == pair[1].timestamp)
            {
                return Err(DatasetError::InvalidInput(format!(
                    "duplicate tick for asset '{}' at {}",
                    asset, pair[1].timestamp
                )));
            }
        }

        Ok(Self { by_asset })
    }

    pub fn assets(&self) -> impl Iterator<Item = (&str, &[TickRecord])> {
        self.by_asset
            .iter()
            .map(|(asset, ticks)| (asset.as_str(), ticks.as_slice()))
    }

    pub fn ticks(&self, asset: &str) -> Option<&[TickRecord]> {
        self.by_asset.get(asset).map(Vec::as_slice)
    }

    pub fn asset_count(&self) -> usize {
        self.by_asset.len()
    }

    pub fn len(&self) -> usize {
        self.by_asset.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits one asset's time-ordered ticks into calendar-day runs.
pub fn day_groups(ticks: &[TickRecord]) -> impl Iterator<Item = (NaiveDate, &[TickRecord])> {
    ticks
        .chunk_by(|a, b| a.day() == b.day())
        .map(|group| (group[0].day(), group))
}
