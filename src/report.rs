//! Outcome reporting.
//!
//! The run loop emits one event per test, as it happens, plus a final
//! summary. `ConsoleReporter` renders them as the familiar line-oriented
//! output; `BufferReporter` collects them for programmatic inspection.

use std::io::Write;
use std::time::Duration;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::config::RunConfig;
use crate::outcome::{Tally, TestOutcome};

/// Consumer of per-test outcome events and the final tally.
pub trait Reporter {
    /// Called once per test, immediately after its outcome is known.
    fn outcome(&mut self, name: &str, outcome: &TestOutcome);

    /// Called once after all tests ran. `elapsed` is present when the run
    /// was configured to report wall time.
    fn summary(&mut self, tally: &Tally, elapsed: Option<Duration>);
}

/// Line-oriented colorized reporter for terminals.
pub struct ConsoleReporter {
    out: StandardStream,
    print_success: bool,
    print_skip_reason: bool,
}

impl ConsoleReporter {
    pub fn from_config(config: &RunConfig) -> Self {
        let choice = if config.use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            out: StandardStream::stdout(choice),
            print_success: config.print_success,
            print_skip_reason: config.print_skip_reason,
        }
    }

    fn write_status(&mut self, word: &str, color: Color) {
        let _ = self
            .out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(self.out, "{word}");
        let _ = self.out.reset();
    }
}

impl Reporter for ConsoleReporter {
    fn outcome(&mut self, name: &str, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Pass => {
                if !self.print_success {
                    return;
                }
                let _ = write!(self.out, "Test '{name}' ");
                self.write_status("successful", Color::Green);
                let _ = writeln!(self.out, "!");
            }
            TestOutcome::Fail { message } => {
                let _ = write!(self.out, "Test '{name}' ");
                self.write_status("failed", Color::Red);
                let _ = writeln!(self.out, "! Error: {message}");
            }
            TestOutcome::Skipped { reason } => {
                let _ = write!(self.out, "Test '{name}' ");
                self.write_status("skipped", Color::Yellow);
                match reason {
                    Some(reason) if self.print_skip_reason => {
                        let _ = writeln!(self.out, ". Reason: {reason}");
                    }
                    _ => {
                        let _ = writeln!(self.out, ".");
                    }
                }
            }
        }
        let _ = self.out.flush();
    }

    fn summary(&mut self, tally: &Tally, elapsed: Option<Duration>) {
        let executed = tally.executed();
        let noun = if executed == 1 { "test" } else { "tests" };
        let _ = write!(
            self.out,
            "\nExecuted {executed} {noun}, {} failed, {} succeeded",
            tally.failed, tally.succeeded
        );
        if tally.skipped > 0 {
            let _ = write!(self.out, ", {} skipped", tally.skipped);
        }
        let _ = write!(self.out, ".");
        if let Some(elapsed) = elapsed {
            let millis = elapsed.as_secs_f64() * 1000.0;
            let _ = write!(self.out, " (time: {millis:.1}ms)");
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}

/// Collects events instead of printing them. Used by the harness's own tests.
#[derive(Debug, Default)]
pub struct BufferReporter {
    pub events: Vec<(String, TestOutcome)>,
    pub tally: Option<Tally>,
    pub elapsed: Option<Duration>,
}

impl Reporter for BufferReporter {
    fn outcome(&mut self, name: &str, outcome: &TestOutcome) {
        self.events.push((name.to_string(), outcome.clone()));
    }

    fn summary(&mut self, tally: &Tally, elapsed: Option<Duration>) {
        self.tally = Some(*tally);
        self.elapsed = elapsed;
    }
}
