pub mod commands;
pub mod handlers;
pub mod output;
pub mod progress_bar;

pub use commands::{AnalyzeArgs, CliArgs, Commands, StrategyArgs, WatchArgs};
pub use output::{OutputFormat, OutputFormatter, View};
pub use progress_bar::ProgressBarHandler;
