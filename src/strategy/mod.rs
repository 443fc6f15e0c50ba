//! Recovery strategy selection and execution

pub mod executor;
pub mod selector;

pub use executor::{
    CommandError, CommandFailure, CommandRunner, ProcessCommandRunner, RebuildResult,
    StrategyExecutor,
};
pub use selector::{
    select_strategy, BuildStateAnalysis, RebuildCommand, RebuildStrategy,
    RebuildStrategySelector, StrategyOptions, StrategyRule, DEFAULT_DERIVED_DATA_DIR,
    HIGH_MEMORY_PRESSURE, LARGE_DERIVED_DATA_BYTES,
};
