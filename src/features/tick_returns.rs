use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::model::{day_groups, TickPanel};

/// Non-cumulative return and volume of one tick period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickFeature {
    pub timestamp: NaiveDateTime,
    pub ret: f64,
    pub volume: f64,
}

/// Per-asset tick features, each asset sorted by timestamp.
pub type TickFeatures = BTreeMap<String, Vec<TickFeature>>;

/// De-accumulates each (asset, day) run. The first tick of a day has no
/// predecessor and keeps its cumulative values as the period values.
pub fn extract_tick_features(panel: &TickPanel) -> TickFeatures {
    let mut out = TickFeatures::new();
    for (asset, ticks) in panel.assets() {
        let mut features = Vec::with_capacity(ticks.len());
        for (_, group) in day_groups(ticks) {
            let mut prev: Option<(f64, f64)> = None;
            for tick in group {
                let (ret, volume) = match prev {
                    None => (tick.cum_return, tick.cum_volume),
                    Some((prev_ret, prev_vol)) => (
                        (1.0 + tick.cum_return) / (1.0 + prev_ret) - 1.0,
                        tick.cum_volume - prev_vol,
                    ),
                };
                features.push(TickFeature {
                    timestamp: tick.timestamp,
                    ret,
                    volume,
                });
                prev = Some((tick.cum_return, tick.cum_volume));
            }
        }
        out.insert(asset.to_string(), features);
    }
    tracing::info!(
        assets = out.len(),
        ticks = out.values().map(Vec::len).sum::<usize>(),
        "Tick features extracted"
    );
    out
}
