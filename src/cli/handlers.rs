//! Command handlers
//!
//! Each handler returns the process exit code: 0 on success, 1 when the
//! build or strategy failed, 2 when an error report was printed instead of
//! a result.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisReport, BuildLogAnalyzer, Severity};
use crate::cli::commands::{AnalyzeArgs, MemoryPressureArg, StrategyArgs, WatchArgs};
use crate::cli::output::{OutputFormat, OutputFormatter, View};
use crate::cli::progress_bar::ProgressBarHandler;
use crate::config::BuildPulseConfig;
use crate::error::BuildPulseError;
use crate::progress::{LoggingHandler, ProgressHandler};
use crate::resources::{SysinfoMetricsProvider, SystemMetricsProvider};
use crate::session::{BuildSession, CancelReason, ProcessDriver, SessionOutcome};
use crate::strategy::{
    BuildStateAnalysis, ProcessCommandRunner, RebuildStrategySelector, StrategyExecutor,
    StrategyOptions,
};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

fn report_error(formatter: &OutputFormatter, err: &BuildPulseError) -> i32 {
    error!(code = err.code(), "{}", err);
    match formatter.format_error(&err.report()) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => eprintln!("{}\n{:#}", err, e),
    }
    EXIT_ERROR
}

fn emit(output: &str, destination: Option<&Path>, quiet: bool) -> anyhow::Result<()> {
    match destination {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output written to: {}", path.display());
            if !quiet {
                eprintln!("Output written to: {}", path.display());
            }
        }
        None => println!("{}", output.trim_end()),
    }
    Ok(())
}

/// Unrecognized thresholds mean no filtering
fn severity_threshold(value: &str) -> Severity {
    value.parse().unwrap_or_else(|e: String| {
        warn!("{}; keeping all diagnostics", e);
        Severity::Info
    })
}

fn read_report(args: &AnalyzeArgs, analyzer: &BuildLogAnalyzer) -> crate::error::Result<AnalysisReport> {
    match args.input.as_deref() {
        Some(path) if path != Path::new("-") => {
            let source_name = path.display().to_string();
            let file = File::open(path)?;
            analyzer.analyze_reader(BufReader::new(file), &source_name)
        }
        _ => analyzer.analyze_reader(io::stdin().lock(), "stdin"),
    }
}

pub fn handle_analyze(args: &AnalyzeArgs, quiet: bool) -> i32 {
    let formatter = OutputFormatter::new(args.format.into(), args.view.into());

    let mut config = BuildPulseConfig::default();
    if let Some(total) = args.total_targets {
        config.total_targets = total;
    }
    let min_severity = match &args.min_severity {
        Some(value) => severity_threshold(value),
        None => config.min_severity(),
    };

    let analyzer = BuildLogAnalyzer::new(min_severity, config.total_targets);
    let report = match read_report(args, &analyzer) {
        Ok(report) => report,
        Err(e) => return report_error(&formatter, &e),
    };

    let output = match formatter.format_analysis(&report) {
        Ok(output) => output,
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            return EXIT_ERROR;
        }
    };
    if let Err(e) = emit(&output, args.output.as_deref(), quiet) {
        error!("{:#}", e);
        return EXIT_ERROR;
    }

    if report.result.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Applies `watch` flags on top of the environment configuration
pub fn watch_config(args: &WatchArgs) -> Result<BuildPulseConfig, BuildPulseError> {
    let mut config = BuildPulseConfig::default();
    if let Some(timeout) = args.timeout {
        config.build_timeout_secs = timeout;
    }
    if let Some(suspect) = args.suspect_after {
        config.suspect_after_secs = suspect;
    }
    if let Some(hang) = args.hang_after {
        config.hang_after_secs = hang;
    }
    if let Some(total) = args.total_targets {
        config.total_targets = total;
    }
    if let Some(severity) = &args.min_severity {
        config.min_severity = severity_threshold(severity).as_str().to_string();
    }
    if args.no_cancel_on_hang {
        config.cancel_on_hang = false;
    }
    config.validate()?;
    Ok(config)
}

pub async fn handle_watch(args: &WatchArgs, quiet: bool) -> i32 {
    let format: OutputFormat = args.format.into();
    let view: View = args.view.into();
    let formatter = OutputFormatter::new(format, view);

    let config = match watch_config(args) {
        Ok(config) => config,
        Err(e) => return report_error(&formatter, &e),
    };
    debug!("{}", config);

    let Some((program, program_args)) = args.command.split_first() else {
        return report_error(
            &formatter,
            &BuildPulseError::Session("no build command given".to_string()),
        );
    };

    let mut driver = match ProcessDriver::spawn(program, program_args) {
        Ok(driver) => driver,
        Err(e) => return report_error(&formatter, &BuildPulseError::from(e)),
    };

    let interactive = atty::is(atty::Stream::Stderr);
    let show_bar = interactive && !quiet && format == OutputFormat::Human;
    let handler: Arc<dyn ProgressHandler> = if show_bar {
        Arc::new(ProgressBarHandler::new(true))
    } else {
        Arc::new(LoggingHandler)
    };

    let mut session = BuildSession::new(config).with_handler(handler);
    if !args.no_resources {
        session = session.with_metrics_provider(Arc::new(SysinfoMetricsProvider::new()));
    }

    let canceller = session.canceller();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel(CancelReason::User);
        }
    });

    let outcome = session.run(&mut driver).await;
    interrupt.abort();

    let outcome: SessionOutcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => return report_error(&formatter, &e),
    };

    match formatter.format_session(&outcome) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            return EXIT_ERROR;
        }
    }

    if outcome.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Builds the environment snapshot from `strategy` flags
pub fn strategy_analysis(
    args: &StrategyArgs,
    metrics: &dyn SystemMetricsProvider,
) -> Result<BuildStateAnalysis, BuildPulseError> {
    let memory_pressure = match args.memory_pressure {
        MemoryPressureArg::Fixed(value) => value,
        MemoryPressureArg::Auto => {
            let sample = metrics.sample()?;
            debug!(provider = metrics.name(), pressure = sample.memory_pressure(), "Sampled memory pressure");
            sample.memory_pressure()
        }
    };

    Ok(BuildStateAnalysis {
        derived_data_size: args.derived_data_size,
        has_build_artifacts: args.has_artifacts,
        has_stale_cache: args.stale_cache,
        has_dependency_conflicts: args.dependency_conflicts,
        memory_pressure,
    })
}

pub async fn handle_strategy(args: &StrategyArgs) -> i32 {
    let formatter = OutputFormatter::new(args.format.into(), View::Summary);

    let provider = SysinfoMetricsProvider::new();
    let analysis = match strategy_analysis(args, &provider) {
        Ok(analysis) => analysis,
        Err(e) => return report_error(&formatter, &e),
    };

    let options = StrategyOptions {
        parallel_jobs: args.parallel_jobs,
        extra_arguments: args.build_arguments.clone(),
        derived_data_path: args.derived_data_path.clone(),
    };

    let strategy = RebuildStrategySelector::new(options).select(&analysis);
    info!(strategy = %strategy.name, "Selected rebuild strategy");

    let execution = if args.execute {
        Some(
            StrategyExecutor::new(ProcessCommandRunner)
                .execute(&strategy)
                .await,
        )
    } else {
        None
    };

    match formatter.format_strategy(&strategy, execution.as_ref()) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            return EXIT_ERROR;
        }
    }

    match execution {
        Some(result) if !result.success => EXIT_FAILURE,
        _ => EXIT_SUCCESS,
    }
}
