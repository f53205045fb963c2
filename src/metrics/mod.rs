pub mod aggregator;
pub mod snapshot;
pub mod stream;

pub use aggregator::Stats;
pub use snapshot::{format_duration, StatsSnapshot};
