use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Live build-output analysis for Xcode and SwiftPM builds
#[derive(Parser, Debug)]
#[command(
    name = "buildpulse",
    about = "Live build-output analysis: diagnostics, progress, hang detection and rebuild strategies",
    version,
    author,
    long_about = "buildpulse reads build output line by line, extracts diagnostics, estimates \
                  progress and remaining time, detects stalled builds and recommends a \
                  rebuild strategy for the current state of the build environment."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Increase verbosity (can be used multiple times)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Analyze a captured build log",
        long_about = "Analyzes a finished build log and reports status, diagnostics, \
                      metrics and timing.\n\n\
                      Examples:\n  \
                      buildpulse analyze build.log\n  \
                      xcodebuild build 2>&1 | buildpulse analyze\n  \
                      buildpulse analyze build.log --format json --view compact"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "Run and monitor a live build",
        long_about = "Runs a build command, monitors its output and cancels it when it \
                      hangs or exceeds the timeout.\n\n\
                      Examples:\n  \
                      buildpulse watch -- xcodebuild -scheme App build\n  \
                      buildpulse watch --hang-after 300 --total-targets 12 -- swift build"
    )]
    Watch(WatchArgs),

    #[command(
        about = "Recommend a rebuild strategy",
        long_about = "Selects a rebuild strategy from the state of the build environment \
                      and optionally executes it.\n\n\
                      Examples:\n  \
                      buildpulse strategy --stale-cache --derived-data-size 2000000000\n  \
                      buildpulse strategy --memory-pressure auto --parallel-jobs 8 --execute"
    )]
    Strategy(StrategyArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        value_name = "FILE",
        help = "Build log to analyze ('-' or omitted reads stdin)"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, value_enum, default_value = "summary", help = "Result view")]
    pub view: ViewArg,

    #[arg(
        long,
        value_name = "SEVERITY",
        help = "Lowest diagnostic severity to list (info, warning, error, critical; anything else lists all)"
    )]
    pub min_severity: Option<String>,

    #[arg(long, value_name = "N", help = "Expected number of targets")]
    pub total_targets: Option<usize>,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct WatchArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, value_enum, default_value = "summary", help = "Result view")]
    pub view: ViewArg,

    #[arg(long, value_name = "SECONDS", help = "Overall build timeout")]
    pub timeout: Option<u64>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Time without progress before the build is suspect"
    )]
    pub suspect_after: Option<u64>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Time without progress before the build is hanging"
    )]
    pub hang_after: Option<u64>,

    #[arg(long, help = "Keep running when the build is hanging")]
    pub no_cancel_on_hang: bool,

    #[arg(long, value_name = "N", help = "Expected number of targets")]
    pub total_targets: Option<usize>,

    #[arg(
        long,
        value_name = "SEVERITY",
        help = "Lowest diagnostic severity to list (info, warning, error, critical; anything else lists all)"
    )]
    pub min_severity: Option<String>,

    #[arg(long, help = "Disable CPU and memory sampling")]
    pub no_resources: bool,

    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        last = true,
        help = "Build command and its arguments"
    )]
    pub command: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct StrategyArgs {
    #[arg(
        long,
        value_name = "BYTES",
        default_value = "0",
        help = "Size of the derived data directory"
    )]
    pub derived_data_size: u64,

    #[arg(long, help = "Previous build products exist")]
    pub has_artifacts: bool,

    #[arg(long, help = "Build cache is known to be stale")]
    pub stale_cache: bool,

    #[arg(long, help = "Package dependencies are in conflict")]
    pub dependency_conflicts: bool,

    #[arg(
        long,
        value_name = "FRACTION|auto",
        value_parser = parse_memory_pressure,
        default_value = "0",
        help = "Memory pressure in [0, 1], or 'auto' to sample the host"
    )]
    pub memory_pressure: MemoryPressureArg,

    #[arg(long, value_name = "N", help = "Build parallelism for generated commands")]
    pub parallel_jobs: Option<usize>,

    #[arg(long, value_name = "PATH", help = "Derived data directory to reset")]
    pub derived_data_path: Option<String>,

    #[arg(long, help = "Execute the selected strategy")]
    pub execute: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        value_name = "BUILD_ARG",
        last = true,
        help = "Extra arguments for every build-tool invocation"
    )]
    pub build_arguments: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewArg {
    Full,
    Compact,
    Summary,
    Detailed,
}

impl From<ViewArg> for super::output::View {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Full => super::output::View::Full,
            ViewArg::Compact => super::output::View::Compact,
            ViewArg::Summary => super::output::View::Summary,
            ViewArg::Detailed => super::output::View::Detailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryPressureArg {
    Auto,
    Fixed(f64),
}

fn parse_memory_pressure(s: &str) -> Result<MemoryPressureArg, String> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(MemoryPressureArg::Auto);
    }
    let value: f64 = s
        .parse()
        .map_err(|_| format!("Invalid memory pressure: {}. Use a fraction or 'auto'", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("Memory pressure must be within [0, 1], got {}", value));
    }
    Ok(MemoryPressureArg::Fixed(value))
}
