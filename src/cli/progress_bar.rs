//! Terminal progress display for `watch`

use crate::hang::HangState;
use crate::progress::{ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_LENGTH: u64 = 1000;

/// Renders session events as a single progress bar.
/// Disabled instances draw nothing, for piped or machine-readable output.
pub struct ProgressBarHandler {
    bar: ProgressBar,
    enabled: bool,
}

impl ProgressBarHandler {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                enabled: false,
            };
        }

        let bar = ProgressBar::new(BAR_LENGTH);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar.set_message("Starting...");
        bar.enable_steady_tick(Duration::from_millis(200));

        Self { bar, enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_fraction(&self, fraction: f64) {
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * BAR_LENGTH as f64) as u64);
    }
}

impl ProgressHandler for ProgressBarHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }

        match event {
            ProgressEvent::Started { command, .. } => {
                self.bar.set_message(command.clone());
            }
            ProgressEvent::TargetStarted { target } => {
                self.bar.set_message(format!("Target {}", target));
            }
            ProgressEvent::TargetCompleted {
                completed, total, ..
            } if *total > 0 => {
                self.bar
                    .set_message(format!("{}/{} targets", completed, total));
            }
            ProgressEvent::TargetCompleted { .. } => {}
            ProgressEvent::PhaseChanged { phase } => {
                self.bar.set_message(phase.clone());
            }
            ProgressEvent::Progress { fraction, eta } => {
                self.set_fraction(*fraction);
                if let Some(eta) = eta {
                    self.bar
                        .set_message(format!("~{}s remaining", eta.as_secs()));
                }
            }
            ProgressEvent::HangStateChanged { to, stalled_for, .. } => match to {
                HangState::Suspect | HangState::Hanging => {
                    self.bar.set_message(format!(
                        "⚠ {} ({}s without progress)",
                        to,
                        stalled_for.as_secs()
                    ));
                }
                HangState::Idle | HangState::Active => {}
            },
            ProgressEvent::Cancelling { reason } => {
                self.bar.set_message(format!("Cancelling: {}", reason));
            }
            ProgressEvent::Completed { success, .. } => {
                if *success {
                    self.set_fraction(1.0);
                    self.bar.finish_with_message("✅ Build succeeded");
                } else {
                    self.bar.abandon_with_message("❌ Build failed");
                }
            }
            ProgressEvent::Failed { error } => {
                self.bar.abandon_with_message(format!("❌ {}", error));
            }
        }
    }
}
