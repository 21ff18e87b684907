pub mod builder;
pub mod session;

pub use builder::{QuantileBounds, TargetBuilder, TargetConfig};
pub use session::{SessionAligner, SessionGap, SessionSnapshot, SessionTable};
