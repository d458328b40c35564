//! A crash-surviving unit test harness.
//!
//! Tests are registered in an explicit [`Registry`] and executed one at a
//! time, each in its own supervised process. A test that segfaults, executes
//! an illegal instruction, aborts, or overruns its timeout is recorded as a
//! failure and the run simply continues with the next test; the suite never
//! loses the results of the tests that came after a crash.
//!
//! ```no_run
//! use testudo::{check, Registry, RunConfig};
//!
//! fn main() {
//!     let mut registry = Registry::new();
//!
//!     registry.register_test("arithmetic", || {
//!         check!(2 + 2, 4);
//!     });
//!
//!     registry.register_test("crashes_safely", || unsafe {
//!         std::ptr::write_volatile(std::ptr::null_mut::<i32>(), 42);
//!     });
//!
//!     std::process::exit(testudo::run_main(&registry, &RunConfig::default()));
//! }
//! ```
//!
//! Unix only: fault isolation is built on fork, sigaction and interval
//! timers. `run_main` should be called from the main thread before any other
//! threads are spawned.

#[cfg(not(unix))]
compile_error!("testudo isolates tests with fork/signals and requires a Unix platform");

pub mod config;
pub mod error;
pub mod expect;
pub mod isolation;
pub mod outcome;
pub mod registry;
pub mod report;
pub mod runner;
mod translate;

pub use config::RunConfig;
pub use error::HarnessError;
pub use expect::{expect_signal, raise_failure, raise_skip};
pub use isolation::{clear_timeout, install, run_isolated, set_timeout, signal_name, Supervision};
pub use outcome::{Tally, TestFail, TestOutcome, TestSkip};
pub use registry::{Handler, Registry, Test};
pub use report::{BufferReporter, ConsoleReporter, Reporter};
pub use runner::{run, run_main};
