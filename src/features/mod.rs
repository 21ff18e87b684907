pub mod rolling;
pub mod tick_returns;
pub mod window;

pub use rolling::{FeatureBlock, RollingConfig, RollingWindowBuilder};
pub use tick_returns::{extract_tick_features, TickFeature, TickFeatures};
pub use window::{padded_windows, sliding_windows};
