mod activation_stats;
mod device;
mod lr_finder;
mod metrics;
mod progress;
mod recorder;
mod schedule;

pub use activation_stats::{ActivationStatsCB, LayerStats};
pub use device::{Device, DeviceCB, ToDevice};
pub use lr_finder::{LRFinderCB, LrPoint};
pub use metrics::{Accuracy, EpochMetrics, MeanMetric, Metric, MetricsCB};
pub use progress::{LossCurves, ProgressCB};
pub use recorder::RecorderCB;
pub use schedule::{BatchSchedulerCB, ExponentialLr, LrScheduler, OneCycleLr};
