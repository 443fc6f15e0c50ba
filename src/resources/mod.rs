//! System resource sampling
//!
//! The data source is a [`SystemMetricsProvider`]; the sampler only keeps the
//! current reading and running peaks. Peaks never decrease.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::System;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Metrics provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),
}

/// One reading from a metrics provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

impl ResourceSample {
    /// `used / total` clamped to `[0, 1]`; zero when the total is unknown
    pub fn memory_pressure(&self) -> f64 {
        if self.memory_total_bytes == 0 {
            return 0.0;
        }
        (self.memory_used_bytes as f64 / self.memory_total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Capability that yields CPU and memory readings
pub trait SystemMetricsProvider: Send + Sync {
    fn name(&self) -> &str;

    fn sample(&self) -> Result<ResourceSample, MetricsError>;
}

/// Host-wide readings from `sysinfo`
pub struct SysinfoMetricsProvider {
    system: Mutex<System>,
}

impl Default for SysinfoMetricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoMetricsProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes, so prime it once
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl SystemMetricsProvider for SysinfoMetricsProvider {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn sample(&self) -> Result<ResourceSample, MetricsError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let sample = ResourceSample {
            cpu_percent: system.global_cpu_usage(),
            memory_used_bytes: system.used_memory(),
            memory_total_bytes: system.total_memory(),
        };
        if !sample.cpu_percent.is_finite() {
            return Err(MetricsError::InvalidSample(format!(
                "cpu usage {}",
                sample.cpu_percent
            )));
        }
        Ok(sample)
    }
}

/// Current and peak usage over a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub current: Option<ResourceSample>,
    pub peak_cpu_percent: f32,
    pub peak_memory_bytes: u64,
    pub samples: u64,
}

impl ResourceUsage {
    pub fn record(&mut self, sample: ResourceSample) {
        self.peak_cpu_percent = self.peak_cpu_percent.max(sample.cpu_percent);
        self.peak_memory_bytes = self.peak_memory_bytes.max(sample.memory_used_bytes);
        self.current = Some(sample);
        self.samples += 1;
    }

    pub fn memory_pressure(&self) -> f64 {
        self.current
            .map(|s| s.memory_pressure())
            .unwrap_or_default()
    }
}

pub struct ResourceSampler {
    provider: Arc<dyn SystemMetricsProvider>,
    usage: ResourceUsage,
}

impl ResourceSampler {
    pub fn new(provider: Arc<dyn SystemMetricsProvider>) -> Self {
        Self {
            provider,
            usage: ResourceUsage::default(),
        }
    }

    pub fn usage(&self) -> &ResourceUsage {
        &self.usage
    }

    /// Takes one reading. A failed reading is logged and leaves usage as is.
    pub fn sample_once(&mut self) -> &ResourceUsage {
        match self.provider.sample() {
            Ok(sample) => {
                debug!(
                    cpu = sample.cpu_percent,
                    memory_used = sample.memory_used_bytes,
                    "Resource sample"
                );
                self.usage.record(sample);
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Resource sample failed");
            }
        }
        &self.usage
    }

    /// Samples every `interval` and publishes usage until `shutdown` flips to true
    pub fn spawn(
        mut self,
        interval: Duration,
        publisher: Arc<watch::Sender<ResourceUsage>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<ResourceUsage> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let usage = self.sample_once().clone();
                        publisher.send_replace(usage);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!(samples = self.usage.samples, "Resource sampler stopping");
                            break;
                        }
                    }
                }
            }
            self.usage
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence; `None` entries fail
    pub(crate) struct ScriptedProvider {
        samples: Vec<Option<ResourceSample>>,
        next: AtomicUsize,
    }

    impl ScriptedProvider {
        pub(crate) fn new(samples: Vec<Option<ResourceSample>>) -> Self {
            Self {
                samples,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl SystemMetricsProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn sample(&self) -> Result<ResourceSample, MetricsError> {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let entry = self
                .samples
                .get(index.min(self.samples.len().saturating_sub(1)))
                .copied()
                .flatten();
            entry.ok_or_else(|| MetricsError::Unavailable("scripted failure".to_string()))
        }
    }

    pub(crate) fn sample(cpu: f32, used: u64) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            memory_used_bytes: used,
            memory_total_bytes: 1000,
        }
    }

    #[test]
    fn test_peaks_never_decrease() {
        let provider = ScriptedProvider::new(vec![
            Some(sample(40.0, 300)),
            Some(sample(90.0, 200)),
            Some(sample(10.0, 800)),
        ]);
        let mut sampler = ResourceSampler::new(Arc::new(provider));

        sampler.sample_once();
        sampler.sample_once();
        let usage = sampler.sample_once();

        assert_eq!(usage.peak_cpu_percent, 90.0);
        assert_eq!(usage.peak_memory_bytes, 800);
        assert_eq!(usage.current, Some(sample(10.0, 800)));
        assert_eq!(usage.samples, 3);
        assert!((usage.memory_pressure() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_failed_sample_keeps_usage() {
        let provider = ScriptedProvider::new(vec![Some(sample(50.0, 500)), None]);
        let mut sampler = ResourceSampler::new(Arc::new(provider));

        sampler.sample_once();
        let before = sampler.usage().clone();
        sampler.sample_once();
        assert_eq!(sampler.usage(), &before);
    }

    #[test]
    fn test_memory_pressure_unknown_total() {
        let reading = ResourceSample {
            cpu_percent: 0.0,
            memory_used_bytes: 10,
            memory_total_bytes: 0,
        };
        assert_eq!(reading.memory_pressure(), 0.0);
        assert_eq!(ResourceUsage::default().memory_pressure(), 0.0);
    }

    #[test]
    fn test_sysinfo_provider_reports_memory() {
        let provider = SysinfoMetricsProvider::new();
        let reading = provider.sample().unwrap();
        assert!(reading.memory_total_bytes > 0);
        assert!((0.0..=1.0).contains(&reading.memory_pressure()));
    }

    #[tokio::test]
    async fn test_spawned_sampler_publishes_and_stops() {
        let provider = ScriptedProvider::new(vec![Some(sample(20.0, 100))]);
        let sampler = ResourceSampler::new(Arc::new(provider));
        let (tx, mut rx) = watch::channel(ResourceUsage::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = sampler.spawn(Duration::from_millis(5), Arc::new(tx), stop_rx);
        rx.changed().await.unwrap();
        assert!(rx.borrow().samples >= 1);

        stop_tx.send(true).unwrap();
        let usage = handle.await.unwrap();
        assert!(usage.samples >= 1);
        assert_eq!(usage.peak_memory_bytes, 100);
    }
}
