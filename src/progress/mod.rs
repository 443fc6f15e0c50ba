//! Progress estimation and reporting for monitored builds

mod estimator;
mod handler;
mod logging;

pub use estimator::{eta_for, ProgressChange, ProgressEstimator, ProgressState, ETA_MIN_PROGRESS};
pub use handler::{NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
