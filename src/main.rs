use buildpulse::cli::commands::{CliArgs, Commands};
use buildpulse::cli::handlers::{handle_analyze, handle_strategy, handle_watch};
use buildpulse::util::logging::{self, LoggingConfig};
use buildpulse::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("buildpulse v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args, args.quiet),
        Commands::Watch(watch_args) => handle_watch(watch_args, args.quiet).await,
        Commands::Strategy(strategy_args) => handle_strategy(strategy_args).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = logging::config_from_env();
    config.level = if let Some(level_str) = &args.log_level {
        logging::parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        config.level
    };

    logging::init_logging(LoggingConfig {
        include_target: args.verbose,
        ..config
    });
}
