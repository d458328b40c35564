//! Infrastructure errors for the harness itself.
//!
//! Test-level conditions (assertion failures, skips, faults) are never
//! represented here; they become [`crate::outcome::TestOutcome`] values. This
//! type only covers the supervision machinery failing underneath a run.

use thiserror::Error;

/// An error raised by the supervision machinery, not by a test.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Installing the fault-interception handlers failed. The run can still
    /// proceed, but a crashing test will take the whole process down.
    #[error("failed to install fault interception: {0}")]
    Install(String),

    /// The report pipe between supervisor and test process could not be made.
    #[error("failed to create report pipe: {0}")]
    Pipe(#[source] std::io::Error),

    /// The test process could not be forked.
    #[error("failed to fork test process: {0}")]
    Fork(#[source] std::io::Error),

    /// Waiting on the test process failed.
    #[error("failed to wait for test process: {0}")]
    Wait(#[source] std::io::Error),
}
