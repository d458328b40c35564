//! Run configuration.
//!
//! These knobs correspond to what a test author would otherwise hard-wire at
//! build time: repetition count, output verbosity, and the exit-code policy.
//! A config is built once at the entry point and passed to the run loop.

/// Configuration for one harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// How many times each test body runs before being judged. A later
    /// repetition is not attempted once one has failed. Must be at least 1.
    pub repeat_count: u32,
    /// Raise SIGTRAP on every expectation failure so an attached debugger
    /// stops at the failure site. Only useful under a debugger; without one
    /// the trap terminates the test process.
    pub trigger_debugger_on_failure: bool,
    /// Print a line for passing tests.
    pub print_success: bool,
    /// Print the reason of skipped tests when one was given.
    pub print_skip_reason: bool,
    /// Include wall time in the final summary.
    pub print_elapsed_time: bool,
    /// Process exit status when at least one test failed.
    pub failure_exit_code: i32,
    /// Colorize the per-test status words.
    pub use_colors: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            trigger_debugger_on_failure: false,
            print_success: true,
            print_skip_reason: false,
            print_elapsed_time: true,
            failure_exit_code: 1,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}
