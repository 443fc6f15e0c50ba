//! Configuration for build monitoring
//!
//! `BuildPulseConfig::default()` reads environment variables and falls back
//! to built-in defaults for anything missing or unparseable. CLI flags
//! override individual fields afterwards.
//!
//! # Environment Variables
//!
//! - `BUILDPULSE_SUSPECT_AFTER_SECS`: no-progress time before a build is suspect - default: 60
//! - `BUILDPULSE_HANG_AFTER_SECS`: no-progress time before a build is hanging - default: 180
//! - `BUILDPULSE_TICK_INTERVAL_MS`: hang detector tick - default: 1000
//! - `BUILDPULSE_SAMPLE_INTERVAL_MS`: resource sampling interval - default: 2000
//! - `BUILDPULSE_BUILD_TIMEOUT_SECS`: overall build timeout - default: 3600
//! - `BUILDPULSE_MIN_SEVERITY`: lowest diagnostic severity kept - default: "info"
//! - `BUILDPULSE_TOTAL_TARGETS`: expected number of targets - default: 0 (unknown)
//! - `BUILDPULSE_CANCEL_ON_HANG`: cancel when hanging (true|false) - default: true
//! - `BUILDPULSE_LOG_LEVEL`: logging level - default: "info"

use crate::analysis::Severity;
use crate::hang::HangThresholds;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_SUSPECT_AFTER_SECS: u64 = 60;
const DEFAULT_HANG_AFTER_SECS: u64 = 180;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 2000;
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_MIN_SEVERITY: &str = "info";
const DEFAULT_CANCEL_ON_HANG: bool = true;
const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildPulseConfig {
    pub suspect_after_secs: u64,
    pub hang_after_secs: u64,
    pub tick_interval_ms: u64,
    pub sample_interval_ms: u64,
    pub build_timeout_secs: u64,
    /// Raw threshold text; unrecognized values disable filtering
    pub min_severity: String,
    /// 0 when unknown
    pub total_targets: usize,
    pub cancel_on_hang: bool,
    pub log_level: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for BuildPulseConfig {
    fn default() -> Self {
        Self {
            suspect_after_secs: env_or("BUILDPULSE_SUSPECT_AFTER_SECS", DEFAULT_SUSPECT_AFTER_SECS),
            hang_after_secs: env_or("BUILDPULSE_HANG_AFTER_SECS", DEFAULT_HANG_AFTER_SECS),
            tick_interval_ms: env_or("BUILDPULSE_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS),
            sample_interval_ms: env_or("BUILDPULSE_SAMPLE_INTERVAL_MS", DEFAULT_SAMPLE_INTERVAL_MS),
            build_timeout_secs: env_or("BUILDPULSE_BUILD_TIMEOUT_SECS", DEFAULT_BUILD_TIMEOUT_SECS),
            min_severity: env::var("BUILDPULSE_MIN_SEVERITY")
                .unwrap_or_else(|_| DEFAULT_MIN_SEVERITY.to_string())
                .to_lowercase(),
            total_targets: env_or("BUILDPULSE_TOTAL_TARGETS", 0),
            cancel_on_hang: env_or("BUILDPULSE_CANCEL_ON_HANG", DEFAULT_CANCEL_ON_HANG),
            log_level: env::var("BUILDPULSE_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

impl BuildPulseConfig {
    /// Checks intervals, thresholds and the log level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "Tick interval must be at least 1ms".to_string(),
            ));
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "Sample interval must be at least 1ms".to_string(),
            ));
        }
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be at least 1 second".to_string(),
            ));
        }
        if self.hang_after_secs <= self.suspect_after_secs {
            return Err(ConfigError::ValidationFailed(format!(
                "Hang threshold ({}s) must be greater than suspect threshold ({}s)",
                self.hang_after_secs, self.suspect_after_secs
            )));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Valid options: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    pub fn hang_thresholds(&self) -> HangThresholds {
        HangThresholds::new(
            Duration::from_secs(self.suspect_after_secs),
            Duration::from_secs(self.hang_after_secs),
        )
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn min_severity(&self) -> Severity {
        Severity::threshold(&self.min_severity)
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(
            "suspect_after_secs".to_string(),
            self.suspect_after_secs.to_string(),
        );
        map.insert("hang_after_secs".to_string(), self.hang_after_secs.to_string());
        map.insert("tick_interval_ms".to_string(), self.tick_interval_ms.to_string());
        map.insert(
            "sample_interval_ms".to_string(),
            self.sample_interval_ms.to_string(),
        );
        map.insert(
            "build_timeout_secs".to_string(),
            self.build_timeout_secs.to_string(),
        );
        map.insert("min_severity".to_string(), self.min_severity.clone());
        map.insert("total_targets".to_string(), self.total_targets.to_string());
        map.insert("cancel_on_hang".to_string(), self.cancel_on_hang.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        map
    }
}

impl fmt::Display for BuildPulseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BuildPulse Configuration:")?;
        writeln!(
            f,
            "  Hang Thresholds: suspect after {}s, hanging after {}s",
            self.suspect_after_secs, self.hang_after_secs
        )?;
        writeln!(f, "  Tick Interval: {}ms", self.tick_interval_ms)?;
        writeln!(f, "  Sample Interval: {}ms", self.sample_interval_ms)?;
        writeln!(f, "  Build Timeout: {}s", self.build_timeout_secs)?;
        writeln!(f, "  Min Severity: {}", self.min_severity)?;
        writeln!(f, "  Total Targets: {}", self.total_targets)?;
        writeln!(f, "  Cancel On Hang: {}", self.cancel_on_hang)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
