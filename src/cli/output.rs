//! Output formatting for multiple formats
//!
//! Results render as JSON, YAML or human-readable text, in one of four views:
//! the full result, the compact counts, a one-line summary, or the summary
//! followed by every diagnostic.
//!
//! # Example
//!
//! ```ignore
//! use buildpulse::cli::output::{OutputFormat, OutputFormatter, View};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Json, View::Compact);
//! let output = formatter.format_analysis(&report)?;
//! println!("{}", output);
//! ```

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::{AnalysisReport, BuildResult};
use crate::error::ErrorReport;
use crate::hang::HangState;
use crate::session::{SessionOutcome, Termination};
use crate::strategy::{RebuildResult, RebuildStrategy};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// How much of a build result to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Full,
    Compact,
    Summary,
    Detailed,
}

#[derive(Serialize)]
struct SummaryView<'a> {
    status: String,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    termination: Option<&'a Termination>,
}

#[derive(Serialize)]
struct DetailedView<'a> {
    status: String,
    summary: String,
    diagnostics: &'a [crate::analysis::Diagnostic],
    #[serde(skip_serializing_if = "Option::is_none")]
    termination: Option<&'a Termination>,
}

#[derive(Serialize)]
struct StrategyView<'a> {
    strategy: &'a RebuildStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<&'a RebuildResult>,
}

/// Output formatter for build results
pub struct OutputFormatter {
    format: OutputFormat,
    view: View,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, view: View) -> Self {
        Self { format, view }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Formats the analysis of a captured log
    pub fn format_analysis(&self, report: &AnalysisReport) -> Result<String> {
        match self.view {
            View::Full => match self.format {
                OutputFormat::Human => Ok(self.human_full(&report.result, None)),
                _ => self.serialize(report),
            },
            _ => self.format_result(&report.result, None),
        }
    }

    /// Formats the outcome of a monitored build
    pub fn format_session(&self, outcome: &SessionOutcome) -> Result<String> {
        match self.view {
            View::Full => match self.format {
                OutputFormat::Human => Ok(self.human_full(&outcome.result, Some(outcome))),
                _ => self.serialize(outcome),
            },
            _ => self.format_result(&outcome.result, outcome.termination.as_ref()),
        }
    }

    fn format_result(
        &self,
        result: &BuildResult,
        termination: Option<&Termination>,
    ) -> Result<String> {
        match (self.view, self.format) {
            (View::Compact, OutputFormat::Human) => {
                let compact = result.compact();
                Ok(format!(
                    "status: {}\nerrors: {}\nwarnings: {}\nfiles: {}\nduration: {:.1}s\n",
                    compact.status,
                    compact.error_count,
                    compact.warning_count,
                    compact.compiled_file_count,
                    compact.total_duration.as_secs_f64()
                ))
            }
            (View::Compact, _) => self.serialize(&result.compact()),
            (View::Summary, OutputFormat::Human) => {
                let mut output = result.summary_line();
                if let Some(termination) = termination {
                    output.push_str(&format!(" [{}]", termination_label(termination)));
                }
                output.push('\n');
                Ok(output)
            }
            (View::Summary, _) => self.serialize(&SummaryView {
                status: result.status.to_string(),
                summary: result.summary_line(),
                termination,
            }),
            (View::Detailed, OutputFormat::Human) => {
                let mut output = result.detailed_report();
                if let Some(termination) = termination {
                    output.push_str(&format!("Terminated: {}\n", termination_label(termination)));
                }
                Ok(output)
            }
            (View::Detailed, _) => self.serialize(&DetailedView {
                status: result.status.to_string(),
                summary: result.summary_line(),
                diagnostics: &result.diagnostics,
                termination,
            }),
            (View::Full, _) => self.serialize(result),
        }
    }

    /// Formats a selected strategy and, when it ran, its execution result
    pub fn format_strategy(
        &self,
        strategy: &RebuildStrategy,
        execution: Option<&RebuildResult>,
    ) -> Result<String> {
        if self.format != OutputFormat::Human {
            return self.serialize(&StrategyView {
                strategy,
                execution,
            });
        }

        let mut output = String::new();
        output.push_str(&format!("Rebuild Strategy: {}\n", strategy.name));
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format!("Rationale: {}\n\n", strategy.rationale));

        output.push_str("Commands:\n");
        for (i, command) in strategy.commands.iter().enumerate() {
            let is_last = i == strategy.commands.len() - 1;
            let connector = if is_last { "\u{2514}" } else { "\u{251C}" };
            let critical = if command.is_critical { "" } else { " (optional)" };
            output.push_str(&format!(
                "{}\u{2500} {}{}\n   $ {}\n",
                connector,
                command.description,
                critical,
                command.command_line()
            ));
        }

        if let Some(result) = execution {
            output.push('\n');
            let symbol = if result.success { "\u{2713}" } else { "\u{2717}" };
            output.push_str(&format!(
                "{} Execution {} ({} completed, {} failed)\n",
                symbol,
                if result.success { "succeeded" } else { "failed" },
                result.completed.len(),
                result.failures.len()
            ));
            for failure in &result.failures {
                output.push_str(&format!("  - {}: {}\n", failure.description, failure.error));
            }
            if result.aborted && !result.skipped.is_empty() {
                output.push_str(&format!("  Skipped: {}\n", result.skipped.join(", ")));
            }
        }

        Ok(output)
    }

    /// Formats a structured error report
    pub fn format_error(&self, report: &ErrorReport) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(report.to_string()),
            _ => self.serialize(report),
        }
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")
            }
            OutputFormat::Yaml | OutputFormat::Human => {
                serde_yaml::to_string(value).context("Failed to serialize output to YAML")
            }
        }
    }

    fn human_full(&self, result: &BuildResult, outcome: Option<&SessionOutcome>) -> String {
        let mut output = String::new();

        output.push_str("Build Result\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&result.detailed_report());

        if !result.metrics.compiled_files.is_empty() {
            output.push_str(&format!(
                "\nCompiled Files ({}):\n",
                result.metrics.compiled_files.len()
            ));
            for file in &result.metrics.compiled_files {
                output.push_str(&format!("  - {}\n", file));
            }
        }

        if let (Some(start), Some(end)) = (result.timing.start_time, result.timing.end_time) {
            output.push_str(&format!(
                "\nTiming: {} \u{2192} {}\n",
                start.to_rfc3339(),
                end.to_rfc3339()
            ));
        }

        let Some(outcome) = outcome else {
            return output;
        };

        output.push_str("\nSession:\n");
        output.push_str(&format!("\u{251C}\u{2500} Id:         {}\n", outcome.session_id));
        output.push_str(&format!(
            "\u{251C}\u{2500} Exit Code:  {}\n",
            outcome
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        ));
        output.push_str(&format!(
            "\u{251C}\u{2500} Progress:   {:.0}% ({}/{} targets)\n",
            outcome.progress.percent(),
            outcome.progress.completed_targets.len(),
            outcome.progress.total_targets
        ));
        output.push_str(&format!(
            "\u{2514}\u{2500} Terminated: {}\n",
            outcome
                .termination
                .as_ref()
                .map(termination_label)
                .unwrap_or_else(|| "no".to_string())
        ));

        if outcome.hang.state != HangState::Idle && outcome.hang.state != HangState::Active {
            output.push_str(&format!(
                "\n\u{26A0} Build {} after {}s without progress\n",
                outcome.hang.state,
                outcome.hang.time_elapsed.as_secs()
            ));
            if let Some(phase) = &outcome.hang.suspected_phase {
                output.push_str(&format!("  Phase: {}\n", phase));
            }
            if let Some(file) = &outcome.hang.suspected_file {
                output.push_str(&format!("  File:  {}\n", file));
            }
            for recommendation in &outcome.hang.recommendations {
                output.push_str(&format!("  - {}\n", recommendation));
            }
        }

        if outcome.resources.samples > 0 {
            output.push_str(&format!(
                "\nResources: peak CPU {:.0}%, peak memory {} MB ({} samples)\n",
                outcome.resources.peak_cpu_percent,
                outcome.resources.peak_memory_bytes / (1024 * 1024),
                outcome.resources.samples
            ));
        }

        output
    }
}

fn termination_label(termination: &Termination) -> String {
    match termination {
        Termination::Timeout => "timeout".to_string(),
        Termination::HangDetected => "hang detected".to_string(),
        Termination::Cancelled => "cancelled".to_string(),
        Termination::NonZeroExit { code } => format!("exit code {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BuildLogAnalyzer;
    use crate::strategy::{select_strategy, BuildStateAnalysis};

    const LOG: &str = "\
=== BUILD TARGET Core OF PROJECT App ===
Compiling Model.swift (1/1)
/src/Model.swift:4:2: error: cannot find 'x' in scope
** BUILD FAILED **
";

    fn report() -> AnalysisReport {
        BuildLogAnalyzer::default().analyze_str(LOG, "test").unwrap()
    }

    #[test]
    fn test_summary_human() {
        let formatter = OutputFormatter::new(OutputFormat::Human, View::Summary);
        let output = formatter.format_analysis(&report()).unwrap();
        assert!(output.starts_with("\u{2717} Build failed"));
        assert!(output.contains("1 errors"));
    }

    #[test]
    fn test_compact_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json, View::Compact);
        let output = formatter.format_analysis(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_count"], 1);
        assert!(value.get("diagnostics").is_none());
    }

    #[test]
    fn test_full_json_includes_progress() {
        let formatter = OutputFormatter::new(OutputFormat::Json, View::Full);
        let output = formatter.format_analysis(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["result"]["diagnostics"][0]["severity"], "error");
        assert!(value["progress"]["lines_processed"].is_number());
    }

    #[test]
    fn test_detailed_yaml_lists_diagnostics() {
        let formatter = OutputFormatter::new(OutputFormat::Yaml, View::Detailed);
        let output = formatter.format_analysis(&report()).unwrap();
        assert!(output.contains("diagnostics:"));
        assert!(output.contains("cannot find 'x' in scope"));
    }

    #[test]
    fn test_full_human_lists_files() {
        let formatter = OutputFormatter::new(OutputFormat::Human, View::Full);
        let output = formatter.format_analysis(&report()).unwrap();
        assert!(output.contains("Build Result"));
        assert!(output.contains("Compiled Files (1):"));
        assert!(output.contains("Model.swift"));
    }

    #[test]
    fn test_strategy_human_and_json() {
        let strategy = select_strategy(&BuildStateAnalysis {
            has_dependency_conflicts: true,
            ..Default::default()
        });

        let human = OutputFormatter::new(OutputFormat::Human, View::Summary)
            .format_strategy(&strategy, None)
            .unwrap();
        assert!(human.contains(&format!("Rebuild Strategy: {}", strategy.name)));
        assert!(human.contains("-resolvePackageDependencies"));

        let json = OutputFormatter::new(OutputFormat::Json, View::Summary)
            .format_strategy(&strategy, None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["strategy"]["name"], strategy.name.as_str());
        assert!(value.get("execution").is_none());
    }

    #[test]
    fn test_error_report_formats() {
        let report = crate::error::BuildPulseError::empty_input("stdin").report();
        let human = OutputFormatter::new(OutputFormat::Human, View::Summary)
            .format_error(&report)
            .unwrap();
        assert!(human.contains("Error [EMPTY_INPUT]"));

        let json = OutputFormatter::new(OutputFormat::Json, View::Summary)
            .format_error(&report)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["code"], "EMPTY_INPUT");
    }

    #[test]
    fn test_termination_labels() {
        assert_eq!(termination_label(&Termination::HangDetected), "hang detected");
        assert_eq!(
            termination_label(&Termination::NonZeroExit { code: 65 }),
            "exit code 65"
        );
    }
}
