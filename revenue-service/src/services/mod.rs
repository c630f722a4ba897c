pub mod cache;
pub mod metrics;
pub mod source;

pub use cache::{fingerprint, ForecastCache};
pub use metrics::{get_metrics, init_metrics};
pub use source::{JsonSnapshotSource, SourceSnapshot, SubscriptionSource};
