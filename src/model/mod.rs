pub mod panel;
pub mod series;
pub mod tick;

pub use panel::{day_groups, TickPanel};
pub use series::{by_asset, finite_or_missing, AssetDay, DailySeries};
pub use tick::TickRecord;
