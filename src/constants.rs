// model-fuzzing/src/constants.rs
//! Shared constants for the walking engine

/// Walk without a step bound.
pub const UNBOUNDED_STEPS: i64 = -1;

/// First step index of a walk (step counters are 1-based).
pub const FIRST_STEP: u64 = 1;

/// Default fuzz magnitude for value-disruption consumers (1.0 = full set of
/// generated variants, lower values proportionally truncate the queue).
pub const DEFAULT_FUZZ_MAGNITUDE: f64 = 1.0;

/// Default per-node sub-iteration cap used by consumers that do not run a
/// node to exhaustion (-1 = no cap).
pub const DEFAULT_MAX_RUNS_PER_NODE: i64 = -1;

/// Default minimum sub-iterations per node (-1 = no minimum).
pub const DEFAULT_MIN_RUNS_PER_NODE: i64 = -1;

/// Name of the default (base) node configuration.
pub const BASE_CONF: &str = "base";
