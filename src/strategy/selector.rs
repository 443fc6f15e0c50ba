//! Rebuild strategy selection
//!
//! Rules are evaluated in priority order; the first match produces the
//! strategy. Selection is pure: no I/O, no clock, no randomness.

use crate::util::serde_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Derived data above this size (bytes, exclusive) counts as large
pub const LARGE_DERIVED_DATA_BYTES: u64 = 1_000_000_000;

/// Memory pressure above this fraction (exclusive) counts as high
pub const HIGH_MEMORY_PRESSURE: f64 = 0.8;

const BUILD_TOOL: &str = "xcodebuild";
const CLEAN_TIMEOUT: Duration = Duration::from_secs(300);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(120);
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(600);
const SETUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Xcode's derived data location, relative to the home directory
pub const DEFAULT_DERIVED_DATA_DIR: &str = "Library/Developer/Xcode/DerivedData";

/// Snapshot of the build environment, collected before any build runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStateAnalysis {
    pub derived_data_size: u64,
    pub has_build_artifacts: bool,
    pub has_stale_cache: bool,
    pub has_dependency_conflicts: bool,
    /// Fraction in `[0, 1]`
    pub memory_pressure: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildCommand {
    pub description: String,
    /// Program followed by its arguments
    pub arguments: Vec<String>,
    pub is_critical: bool,
    #[serde(rename = "timeout_ms", with = "serde_duration::option_millis")]
    pub timeout: Option<Duration>,
}

impl RebuildCommand {
    fn new(description: &str, arguments: Vec<String>, is_critical: bool) -> Self {
        Self {
            description: description.to_string(),
            arguments,
            is_critical,
            timeout: None,
        }
    }

    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.arguments.first().map(String::as_str)
    }

    pub fn command_line(&self) -> String {
        self.arguments.join(" ")
    }
}

impl fmt::Display for RebuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.description, self.command_line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildStrategy {
    pub name: String,
    pub rationale: String,
    pub commands: Vec<RebuildCommand>,
}

/// Parameters for generated commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOptions {
    /// Requested build parallelism; `None` leaves the tool default
    pub parallel_jobs: Option<usize>,
    /// Appended to every build-tool invocation (project, scheme, ...)
    pub extra_arguments: Vec<String>,
    /// `None` means Xcode's default location under `$HOME`, resolved by the
    /// shell when the command runs
    pub derived_data_path: Option<String>,
}

impl StrategyOptions {
    fn remove_derived_data(&self) -> RebuildCommand {
        let arguments = match &self.derived_data_path {
            Some(path) => vec!["rm".to_string(), "-rf".to_string(), path.clone()],
            None => vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("rm -rf \"${{HOME:?}}/{}\"", DEFAULT_DERIVED_DATA_DIR),
            ],
        };
        RebuildCommand::new("Remove derived data", arguments, false).with_timeout(REMOVE_TIMEOUT)
    }

    fn tool(&self, action: &[&str]) -> Vec<String> {
        std::iter::once(BUILD_TOOL)
            .chain(action.iter().copied())
            .map(String::from)
            .chain(self.extra_arguments.iter().cloned())
            .collect()
    }

    fn clean(&self, is_critical: bool) -> RebuildCommand {
        RebuildCommand::new("Clean build products", self.tool(&["clean"]), is_critical)
            .with_timeout(CLEAN_TIMEOUT)
    }

    fn build(&self, description: &str) -> RebuildCommand {
        let mut arguments = self.tool(&["build"]);
        if let Some(jobs) = self.parallel_jobs {
            arguments.extend(["-jobs".to_string(), jobs.to_string()]);
        }
        RebuildCommand::new(description, arguments, true)
    }
}

pub trait StrategyRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, analysis: &BuildStateAnalysis) -> bool;
    fn strategy(&self, analysis: &BuildStateAnalysis, options: &StrategyOptions) -> RebuildStrategy;
}

pub struct CleanWithCacheResetRule;

impl StrategyRule for CleanWithCacheResetRule {
    fn name(&self) -> &'static str {
        "Clean with Cache Reset"
    }

    fn matches(&self, analysis: &BuildStateAnalysis) -> bool {
        analysis.has_stale_cache && analysis.derived_data_size > LARGE_DERIVED_DATA_BYTES
    }

    fn strategy(&self, analysis: &BuildStateAnalysis, options: &StrategyOptions) -> RebuildStrategy {
        RebuildStrategy {
            name: self.name().to_string(),
            rationale: format!(
                "Stale cache with {:.1} GB of derived data; removing it before a full rebuild",
                analysis.derived_data_size as f64 / 1e9
            ),
            commands: vec![
                options.remove_derived_data(),
                options.clean(true),
                options.build("Full rebuild"),
            ],
        }
    }
}

pub struct MemoryOptimizedRule;

impl StrategyRule for MemoryOptimizedRule {
    fn name(&self) -> &'static str {
        "Memory-Optimized Rebuild"
    }

    fn matches(&self, analysis: &BuildStateAnalysis) -> bool {
        analysis.memory_pressure > HIGH_MEMORY_PRESSURE
    }

    fn strategy(&self, analysis: &BuildStateAnalysis, options: &StrategyOptions) -> RebuildStrategy {
        // Sequential regardless of the requested parallelism
        let mut arguments = options.tool(&["build"]);
        arguments.extend(["-jobs".to_string(), "1".to_string()]);

        RebuildStrategy {
            name: self.name().to_string(),
            rationale: format!(
                "Memory pressure at {:.0}%; building sequentially to limit peak usage",
                analysis.memory_pressure * 100.0
            ),
            commands: vec![
                options.clean(false),
                RebuildCommand::new("Sequential rebuild", arguments, true),
            ],
        }
    }
}

pub struct DependencyResolutionRule;

impl StrategyRule for DependencyResolutionRule {
    fn name(&self) -> &'static str {
        "Dependency Resolution Rebuild"
    }

    fn matches(&self, analysis: &BuildStateAnalysis) -> bool {
        analysis.has_dependency_conflicts
    }

    fn strategy(&self, _analysis: &BuildStateAnalysis, options: &StrategyOptions) -> RebuildStrategy {
        RebuildStrategy {
            name: self.name().to_string(),
            rationale: "Dependency conflicts detected; resolving packages before a clean build"
                .to_string(),
            commands: vec![
                RebuildCommand::new(
                    "Resolve package dependencies",
                    options.tool(&["-resolvePackageDependencies"]),
                    true,
                )
                .with_timeout(RESOLVE_TIMEOUT),
                options.clean(true),
                options.build("Full rebuild"),
            ],
        }
    }
}

pub struct FastIncrementalRule;

impl StrategyRule for FastIncrementalRule {
    fn name(&self) -> &'static str {
        "Fast Incremental Rebuild"
    }

    fn matches(&self, _analysis: &BuildStateAnalysis) -> bool {
        true
    }

    fn strategy(&self, _analysis: &BuildStateAnalysis, options: &StrategyOptions) -> RebuildStrategy {
        let mut commands = Vec::new();
        if let Some(jobs) = options.parallel_jobs.filter(|jobs| *jobs > 1) {
            commands.push(
                RebuildCommand::new(
                    "Configure parallel compilation",
                    vec![
                        "defaults".to_string(),
                        "write".to_string(),
                        "com.apple.dt.Xcode".to_string(),
                        "IDEBuildOperationMaxNumberOfConcurrentCompileTasks".to_string(),
                        jobs.to_string(),
                    ],
                    false,
                )
                .with_timeout(SETUP_TIMEOUT),
            );
        }
        commands.push(options.build("Incremental build"));

        RebuildStrategy {
            name: self.name().to_string(),
            rationale: "No cache, memory or dependency issues; reusing existing build products"
                .to_string(),
            commands,
        }
    }
}

pub struct RebuildStrategySelector {
    rules: Vec<Box<dyn StrategyRule>>,
    options: StrategyOptions,
}

impl Default for RebuildStrategySelector {
    fn default() -> Self {
        Self::new(StrategyOptions::default())
    }
}

impl RebuildStrategySelector {
    pub fn new(options: StrategyOptions) -> Self {
        Self {
            rules: vec![
                Box::new(CleanWithCacheResetRule),
                Box::new(MemoryOptimizedRule),
                Box::new(DependencyResolutionRule),
                Box::new(FastIncrementalRule),
            ],
            options,
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn StrategyRule>>, options: StrategyOptions) -> Self {
        Self { rules, options }
    }

    pub fn options(&self) -> &StrategyOptions {
        &self.options
    }

    pub fn select(&self, analysis: &BuildStateAnalysis) -> RebuildStrategy {
        self.rules
            .iter()
            .find(|rule| rule.matches(analysis))
            .map(|rule| rule.strategy(analysis, &self.options))
            .unwrap_or_else(|| FastIncrementalRule.strategy(analysis, &self.options))
    }
}

/// Selects with default options
pub fn select_strategy(analysis: &BuildStateAnalysis) -> RebuildStrategy {
    RebuildStrategySelector::default().select(analysis)
}
