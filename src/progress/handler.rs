//! Progress handler trait and events

use crate::hang::HangState;
use std::time::Duration;

/// Events emitted while a build is monitored
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Monitoring started
    Started {
        session_id: String,
        command: String,
    },

    /// A new target became current
    TargetStarted { target: String },

    /// The previous target finished
    TargetCompleted {
        target: String,
        completed: usize,
        total: usize,
    },

    /// The build moved into a different phase
    PhaseChanged { phase: String },

    /// Combined progress moved forward
    Progress {
        fraction: f64,
        eta: Option<Duration>,
    },

    /// Hang detector changed state
    HangStateChanged {
        from: HangState,
        to: HangState,
        stalled_for: Duration,
    },

    /// A cancellation was requested
    Cancelling { reason: String },

    /// Build finished, successfully or not
    Completed {
        success: bool,
        errors: usize,
        warnings: usize,
        total_time: Duration,
    },

    /// Monitoring failed
    Failed { error: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Started {
            session_id: "s".to_string(),
            command: "xcodebuild".to_string(),
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::TargetStarted {
            target: "Core".to_string(),
        });
        handler.on_progress(&ProgressEvent::Progress {
            fraction: 0.4,
            eta: Some(Duration::from_secs(30)),
        });
        handler.on_progress(&ProgressEvent::Completed {
            success: true,
            errors: 0,
            warnings: 2,
            total_time: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::PhaseChanged {
            phase: "Linking".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("PhaseChanged"));
        assert!(debug_str.contains("Linking"));
    }
}
