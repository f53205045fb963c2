pub mod layer;
pub mod recorder;
pub mod timing;

pub use layer::{StatsLayer, StatsService};
pub use recorder::{Recorder, RecordingSink, ResponseBuffer, ResponseSink};
pub use timing::stats_middleware;
