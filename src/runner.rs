//! The run loop.
//!
//! Iterates the registry in registration order, supervises each test in its
//! own process, records the outcome, and advances unconditionally: a faulted
//! or failed test never aborts the run, every registered test gets its
//! chance. One outcome event is emitted per test, as it happens, followed by
//! the final tally.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::config::RunConfig;
use crate::error::HarnessError;
use crate::expect;
use crate::isolation::{self, Supervision};
use crate::outcome::{Tally, TestOutcome};
use crate::registry::{Handler, Registry, Test};
use crate::report::{ConsoleReporter, Reporter};
use crate::translate;

/// Execute every registered test and return the cumulative tally.
pub fn run(
    registry: &Registry,
    config: &RunConfig,
    reporter: &mut dyn Reporter,
) -> Result<Tally, HarnessError> {
    if let Err(warning) = isolation::install() {
        eprintln!("WARN: {warning}");
    }
    expect::set_debug_trap(config.trigger_debugger_on_failure);

    let _quiet = QuietPanicHook::engage();
    let started = Instant::now();
    let repeat_count = config.repeat_count.max(1);
    let mut tally = Tally::default();

    for test in registry.tests() {
        let supervised =
            isolation::run_isolated(|| judge_repetitions(test, repeat_count, registry.handlers()))?;
        let outcome = match supervised {
            Supervision::Completed(outcome) => outcome,
            Supervision::Signaled { signo, fault_addr } => TestOutcome::Fail {
                message: isolation::describe_signal(signo, fault_addr),
            },
        };
        reporter.outcome(test.name(), &outcome);
        tally.record(&outcome);
    }

    let elapsed = config.print_elapsed_time.then(|| started.elapsed());
    reporter.summary(&tally, elapsed);
    Ok(tally)
}

/// Entry-point helper: run everything with the console reporter and derive
/// the process exit status from the tally.
pub fn run_main(registry: &Registry, config: &RunConfig) -> i32 {
    let mut reporter = ConsoleReporter::from_config(config);
    match run(registry, config, &mut reporter) {
        Ok(tally) => {
            if tally.failed > 0 {
                config.failure_exit_code
            } else {
                0
            }
        }
        Err(error) => {
            eprintln!("testudo: {error}");
            config.failure_exit_code
        }
    }
}

/// Runs inside the test process. Invokes the body once per repetition with a
/// clean countdown each time; the first failing repetition judges the whole
/// test and later repetitions are not attempted.
fn judge_repetitions(test: &Test, repeat_count: u32, handlers: &[Handler]) -> TestOutcome {
    for _ in 0..repeat_count {
        isolation::clear_timeout();
        match panic::catch_unwind(AssertUnwindSafe(|| test.call())) {
            Ok(()) => {}
            Err(payload) => return translate::classify(payload, handlers),
        }
    }
    TestOutcome::Pass
}

/// Suppresses the default "thread panicked at ..." chatter while the run is
/// active; every panic inside a test process is caught and classified, so
/// the default hook would only duplicate the reporter's output.
struct QuietPanicHook {
    previous: Option<Box<dyn Fn(&panic::PanicHookInfo<'_>) + Send + Sync>>,
}

impl QuietPanicHook {
    fn engage() -> Self {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        Self {
            previous: Some(previous),
        }
    }
}

impl Drop for QuietPanicHook {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            panic::set_hook(previous);
        }
    }
}
