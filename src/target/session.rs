use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::model::{day_groups, AssetDay, TickPanel, TickRecord};

/// Last cumulative return seen on each side of the session cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    pub regular: f64,
    pub extended: f64,
}

/// Why an observed asset-day has no snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionGap {
    MissingRegular,
    MissingExtended,
    MissingBoth,
}

#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    pub complete: BTreeMap<AssetDay, SessionSnapshot>,
    pub incomplete: BTreeMap<AssetDay, SessionGap>,
}

impl SessionTable {
    /// Every day each asset traded on, complete or not, in calendar order.
    pub fn observed_days(&self) -> BTreeMap<&str, Vec<NaiveDate>> {
        let mut out: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
        for key in self.complete.keys().chain(self.incomplete.keys()) {
            out.entry(key.asset.as_str()).or_default().push(key.day);
        }
        for days in out.values_mut() {
            days.sort_unstable();
        }
        out
    }
}

/// Splits each trading day at `cutoff` into a regular session (time <= cutoff)
/// and an extended session (time > cutoff).
#[derive(Debug, Clone, Copy)]
pub struct SessionAligner {
    cutoff: NaiveTime,
}

impl SessionAligner {
    pub fn new(cutoff: NaiveTime) -> Self {
        Self { cutoff }
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    pub fn align(&self, panel: &TickPanel) -> SessionTable {
        let mut table = SessionTable::default();
        for (asset, ticks) in panel.assets() {
            for (day, group) in day_groups(ticks) {
                let key = AssetDay::new(asset, day);
                let regular = self.last_value(group, false);
                let extended = self.last_value(group, true);
                match (regular, extended) {
                    (Some(regular), Some(extended)) => {
                        table
                            .complete
                            .insert(key, SessionSnapshot { regular, extended });
                    }
                    (None, Some(_)) => {
                        table.incomplete.insert(key, SessionGap::MissingRegular);
                    }
                    (Some(_), None) => {
                        table.incomplete.insert(key, SessionGap::MissingExtended);
                    }
                    (None, None) => {
                        table.incomplete.insert(key, SessionGap::MissingBoth);
                    }
                }
            }
        }

        for (key, gap) in &table.incomplete {
            tracing::debug!(
                asset = %key.asset,
                day = %key.day,
                gap = ?gap,
                "Dropping incomplete session day"
            );
        }
        tracing::info!(
            complete = table.complete.len(),
            incomplete = table.incomplete.len(),
            "Session snapshots aligned"
        );
        table
    }

    fn last_value(&self, group: &[TickRecord], extended: bool) -> Option<f64> {
        group
            .iter()
            .rev()
            .filter(|t| (t.timestamp.time() > self.cutoff) == extended)
            .map(|t| t.cum_return)
            .find(|v| v.is_finite())
    }
}
