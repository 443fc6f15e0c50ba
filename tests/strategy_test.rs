//! Rebuild strategy selection and execution tests

use async_trait::async_trait;
use buildpulse::strategy::{
    select_strategy, BuildStateAnalysis, CommandError, CommandRunner, RebuildCommand,
    RebuildStrategy, RebuildStrategySelector, StrategyExecutor, StrategyOptions, StrategyRule,
    HIGH_MEMORY_PRESSURE, LARGE_DERIVED_DATA_BYTES,
};
use std::sync::Mutex;
use std::time::Duration;

/// Records every command and fails the ones whose program matches
struct RecordingRunner {
    failing_program: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl RecordingRunner {
    fn new(failing_program: Option<&'static str>) -> Self {
        Self {
            failing_program,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &RebuildCommand) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(command.command_line());
        match (self.failing_program, command.program()) {
            (Some(failing), Some(program)) if failing == program => {
                Err(CommandError::NonZeroExit {
                    code: 1,
                    stderr: "simulated".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[test]
fn test_rule_priority() {
    let everything = BuildStateAnalysis {
        derived_data_size: LARGE_DERIVED_DATA_BYTES + 1,
        has_build_artifacts: true,
        has_stale_cache: true,
        has_dependency_conflicts: true,
        memory_pressure: 0.95,
    };
    let first = select_strategy(&everything);

    let memory_only = BuildStateAnalysis {
        memory_pressure: 0.95,
        has_dependency_conflicts: true,
        ..Default::default()
    };
    let second = select_strategy(&memory_only);

    let deps_only = BuildStateAnalysis {
        has_dependency_conflicts: true,
        ..Default::default()
    };
    let third = select_strategy(&deps_only);

    let names = [&first.name, &second.name, &third.name];
    assert_eq!(
        names.iter().collect::<std::collections::HashSet<_>>().len(),
        3,
        "each condition selects a different strategy"
    );
    assert!(first
        .commands
        .iter()
        .any(|c| c.command_line().contains("rm -rf")));
    assert!(third
        .commands
        .iter()
        .any(|c| c.arguments.iter().any(|a| a == "-resolvePackageDependencies")));
}

#[test]
fn test_thresholds_are_exclusive() {
    let at_limits = BuildStateAnalysis {
        derived_data_size: LARGE_DERIVED_DATA_BYTES,
        has_stale_cache: true,
        memory_pressure: HIGH_MEMORY_PRESSURE,
        ..Default::default()
    };
    let clean_slate = BuildStateAnalysis::default();

    assert_eq!(select_strategy(&at_limits), select_strategy(&clean_slate));
}

#[test]
fn test_selection_is_deterministic() {
    let analysis = BuildStateAnalysis {
        has_build_artifacts: true,
        memory_pressure: 0.4,
        ..Default::default()
    };
    let selector = RebuildStrategySelector::default();
    assert_eq!(selector.select(&analysis), selector.select(&analysis));
}

#[test]
fn test_options_flow_into_commands() {
    let selector = RebuildStrategySelector::new(StrategyOptions {
        parallel_jobs: Some(6),
        extra_arguments: vec!["-scheme".to_string(), "App".to_string()],
        derived_data_path: Some("/tmp/dd".to_string()),
    });

    let strategy = selector.select(&BuildStateAnalysis::default());
    let build = strategy
        .commands
        .last()
        .expect("strategy ends with a build");
    assert_eq!(build.program(), Some("xcodebuild"));
    assert!(build.command_line().contains("-scheme App"));
    assert!(build.command_line().ends_with("-jobs 6"));

    let reset = selector.select(&BuildStateAnalysis {
        has_stale_cache: true,
        derived_data_size: 5_000_000_000,
        ..Default::default()
    });
    assert!(reset.commands[0].command_line().contains("/tmp/dd"));
}

struct AlwaysRule;

impl StrategyRule for AlwaysRule {
    fn name(&self) -> &'static str {
        "always"
    }

    fn matches(&self, _analysis: &BuildStateAnalysis) -> bool {
        true
    }

    fn strategy(&self, _analysis: &BuildStateAnalysis, _options: &StrategyOptions) -> RebuildStrategy {
        RebuildStrategy {
            name: "Custom".to_string(),
            rationale: "always matches".to_string(),
            commands: Vec::new(),
        }
    }
}

#[test]
fn test_custom_rules() {
    let selector = RebuildStrategySelector::with_rules(
        vec![Box::new(AlwaysRule)],
        StrategyOptions::default(),
    );
    assert_eq!(selector.select(&BuildStateAnalysis::default()).name, "Custom");

    let empty = RebuildStrategySelector::with_rules(Vec::new(), StrategyOptions::default());
    let fallback = empty.select(&BuildStateAnalysis::default());
    assert_eq!(fallback, select_strategy(&BuildStateAnalysis::default()));
}

#[tokio::test]
async fn test_non_critical_failure_continues() {
    let strategy = select_strategy(&BuildStateAnalysis {
        has_stale_cache: true,
        derived_data_size: 2_000_000_000,
        ..Default::default()
    });
    let runner = RecordingRunner::new(Some("sh"));
    let executor = StrategyExecutor::new(runner);

    let result = executor.execute(&strategy).await;
    assert!(result.success);
    assert!(!result.aborted);
    assert_eq!(result.failures.len(), 1);
    assert!(!result.failures[0].is_critical);
    assert_eq!(result.completed.len(), strategy.commands.len() - 1);
}

#[tokio::test]
async fn test_critical_failure_aborts() {
    let strategy = select_strategy(&BuildStateAnalysis {
        has_dependency_conflicts: true,
        ..Default::default()
    });
    let runner = RecordingRunner::new(Some("xcodebuild"));
    let executor = StrategyExecutor::new(runner);

    let result = executor.execute(&strategy).await;
    assert!(!result.success);
    assert!(result.aborted);
    assert!(result.completed.is_empty());
    assert_eq!(result.skipped.len(), strategy.commands.len() - 1);
}

#[test]
fn test_strategy_serializes_timeouts_in_millis() {
    let strategy = select_strategy(&BuildStateAnalysis {
        has_dependency_conflicts: true,
        ..Default::default()
    });
    let json = serde_json::to_value(&strategy).unwrap();
    let resolve = &json["commands"][0];
    assert_eq!(
        resolve["timeout_ms"].as_u64(),
        Some(Duration::from_secs(600).as_millis() as u64)
    );
}
