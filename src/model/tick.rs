use chrono::{NaiveDate, NaiveDateTime};

/// One raw intraday observation for an asset.
///
/// `cum_return` and `cum_volume` accumulate from the start of the trading
/// day and reset at the next one. The daily fields come from the daily
/// files and repeat on every tick of the same (asset, day).
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub asset: String,
    pub timestamp: NaiveDateTime,
    pub cum_return: f64,
    pub cum_volume: f64,
    pub est_vol: Option<f64>,
    pub mdv_63: Option<f64>,
    pub daily_volume: Option<f64>,
}

impl TickRecord {
    /// Tick without daily metrics (mostly for fixtures).
    pub fn new(asset: &str, timestamp: NaiveDateTime, cum_return: f64, cum_volume: f64) -> Self {
        Self {
            asset: asset.to_string(),
            timestamp,
            cum_return,
            cum_volume,
            est_vol: None,
            mdv_63: None,
            daily_volume: None,
        }
    }

    pub fn with_est_vol(mut self, est_vol: f64) -> Self {
        self.est_vol = Some(est_vol);
        self
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
