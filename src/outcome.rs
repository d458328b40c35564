//! Per-test outcomes, the harness's own control-flow payloads, and the
//! cumulative tally of a run.

/// The judged result of a single test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// The body returned normally on every repetition.
    Pass,
    /// An expectation was violated, an unhandled panic occurred, or the test
    /// process was killed by a fault.
    Fail { message: String },
    /// The test voluntarily excluded itself from judgment.
    Skipped { reason: Option<String> },
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, TestOutcome::Fail { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TestOutcome::Skipped { .. })
    }
}

/// Panic payload for an expectation violation.
///
/// This is the harness's own failure signal. It is raised by the expectation
/// primitives via `panic_any`, caught at the per-test recovery boundary, and
/// never handed to the translation pipeline.
#[derive(Debug, Clone)]
pub struct TestFail {
    pub message: String,
}

/// Panic payload for a voluntary skip. Like [`TestFail`], it is caught at the
/// recovery boundary and never translated.
#[derive(Debug, Clone)]
pub struct TestSkip {
    pub reason: Option<String>,
}

/// Cumulative counters for one run. A skip is not a failure: it counts into
/// `succeeded`, with `skipped` tracking it separately so true passes remain
/// distinguishable. Only `failed` decides the exit status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub failed: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

impl Tally {
    /// Every test that produced an outcome, regardless of which one.
    pub fn executed(&self) -> usize {
        self.failed + self.succeeded
    }

    pub fn record(&mut self, outcome: &TestOutcome) {
        match outcome {
            TestOutcome::Pass => self.succeeded += 1,
            TestOutcome::Fail { .. } => self.failed += 1,
            TestOutcome::Skipped { .. } => {
                self.succeeded += 1;
                self.skipped += 1;
            }
        }
    }
}
