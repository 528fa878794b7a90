//! Per-VM resource limits, checked by the main loop on every iteration (or
//! on push/call, where noted).

use std::time::Duration;

/// Resource limits for one `execute`/`resume` call. Defaults match the
/// reference values: generous enough for any well-behaved script, tight
/// enough that a runaway or hostile one can't stall the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Max instructions dispatched in a single `execute`/`resume` call.
    pub max_instructions: u64,
    /// Max number of values the stack may hold at once.
    pub max_stack_depth: usize,
    /// Max nested `CALL` depth.
    pub max_call_depth: usize,
    /// Max wall-clock time for a single `execute`/`resume` call.
    pub max_wall_clock: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_instructions: 100_000_000,
            max_stack_depth: 10_000,
            max_call_depth: 1_000,
            max_wall_clock: Duration::from_millis(60_000),
        }
    }
}
