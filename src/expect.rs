//! Expectation primitives: the assertion vocabulary a test body invokes.
//!
//! All primitives execute synchronously inside the calling test's stack
//! frame. On violation they raise the harness's own failure signal, which the
//! per-test recovery boundary catches and records. The macro front-ends
//! (`check!`, `ensure!`, `fail!`, `skip!`, `expect_any!`, `expect_throws!`)
//! exist to capture the literal source text of the checked expressions;
//! `#[track_caller]` supplies the call site embedded in every failure
//! message.

use std::any::{type_name, Any};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::isolation::{self, Supervision};
use crate::outcome::{TestFail, TestOutcome, TestSkip};
use crate::translate;

static TRAP_ON_FAILURE: AtomicBool = AtomicBool::new(false);

pub(crate) fn set_debug_trap(enabled: bool) {
    TRAP_ON_FAILURE.store(enabled, Ordering::Relaxed);
}

/// Raise a failure with the caller's location appended. This is the single
/// exit point of every violated expectation.
#[track_caller]
pub fn raise_failure(message: String) -> ! {
    if TRAP_ON_FAILURE.load(Ordering::Relaxed) {
        unsafe {
            libc::raise(libc::SIGTRAP);
        }
    }
    let location = Location::caller();
    panic::panic_any(TestFail {
        message: format!("{message}, at {}:{}!", location.file(), location.line()),
    });
}

/// Raise a skip. Distinct from failure so the run loop can tally it
/// separately; never offered to the translation pipeline.
pub fn raise_skip(reason: Option<String>) -> ! {
    panic::panic_any(TestSkip { reason });
}

/// Equality check behind `check!`. Both operands are evaluated exactly once
/// by the macro; a mismatch embeds their renderings and source text.
#[track_caller]
pub fn check_eq<A, B>(actual: &A, expected: &B, actual_text: &str, expected_text: &str)
where
    A: fmt::Debug + PartialEq<B>,
    B: fmt::Debug,
{
    if actual != expected {
        raise_failure(format!(
            "Expected {actual:?} to be equal {expected:?}, {actual_text} != {expected_text}"
        ));
    }
}

/// Run `block` and require that it panics with *something*. A harness
/// failure or skip raised inside the block is re-raised unchanged; any other
/// payload satisfies the expectation and is discarded.
#[track_caller]
pub fn expect_any_panic(block: impl FnOnce()) {
    match panic::catch_unwind(AssertUnwindSafe(block)) {
        Ok(()) => raise_failure("Expected exception".to_string()),
        Err(payload) => {
            if payload.is::<TestFail>() || payload.is::<TestSkip>() {
                panic::resume_unwind(payload);
            }
        }
    }
}

/// Run `block` and require that it panics with a payload of type `E`. A
/// payload of a different type is its own failure, distinct from the block
/// not panicking at all.
#[track_caller]
pub fn expect_panic_of<E: Any>(block: impl FnOnce()) {
    match panic::catch_unwind(AssertUnwindSafe(block)) {
        Ok(()) => raise_failure("Expected exception".to_string()),
        Err(payload) => {
            if payload.is::<TestFail>() || payload.is::<TestSkip>() {
                panic::resume_unwind(payload);
            }
            if !payload.is::<E>() {
                raise_failure(format!("Expected exception of type {}", type_name::<E>()));
            }
        }
    }
}

/// Run `block` in an inner supervised unit and require that exactly `signo`
/// terminates it. On the anticipated signal the primitive returns normally
/// and execution continues after the block.
///
/// An armed countdown is handed to the inner unit for the block's duration
/// (interval timers do not survive fork) and re-armed with the remaining
/// budget afterwards; anticipating SIGALRM therefore consumes the countdown.
#[track_caller]
pub fn expect_signal(signo: i32, block: impl FnOnce()) {
    let carried = isolation::take_timeout();
    let block_started = Instant::now();
    let supervised = isolation::run_isolated(move || {
        if let Some(budget) = carried {
            isolation::set_timeout(budget);
        }
        match panic::catch_unwind(AssertUnwindSafe(block)) {
            Ok(()) => TestOutcome::Pass,
            // Handlers live on the other side of the process boundary; the
            // generic rendering has to do for foreign payloads here.
            Err(payload) => translate::classify(payload, &[]),
        }
    });
    let supervised = match supervised {
        Ok(supervised) => supervised,
        Err(error) => raise_failure(format!("Could not supervise signal expectation: {error}")),
    };
    match supervised {
        Supervision::Signaled {
            signo: received, ..
        } if received == signo => {
            if signo != libc::SIGALRM {
                if let Some(budget) = carried {
                    let remaining = budget.saturating_sub(block_started.elapsed());
                    isolation::set_timeout(remaining.max(Duration::from_millis(1)));
                }
            }
        }
        Supervision::Signaled {
            signo: received,
            fault_addr,
        } => raise_failure(isolation::describe_signal(received, fault_addr)),
        Supervision::Completed(TestOutcome::Pass) => raise_failure(format!(
            "Expected signal {}",
            isolation::signal_name(signo)
        )),
        Supervision::Completed(TestOutcome::Fail { message }) => {
            panic::panic_any(TestFail { message })
        }
        Supervision::Completed(TestOutcome::Skipped { reason }) => {
            panic::panic_any(TestSkip { reason })
        }
    }
}

// ============================================================================
// MACRO FRONT-ENDS
// ============================================================================

/// Check that two expressions compare equal.
///
/// ```
/// use testudo::check;
/// let values = vec![1, 2, 3];
/// check!(values[0], 1);
/// ```
#[macro_export]
macro_rules! check {
    ($actual:expr, $expected:expr $(,)?) => {
        $crate::expect::check_eq(
            &$actual,
            &$expected,
            stringify!($actual),
            stringify!($expected),
        )
    };
}

/// Assert that a condition holds, with an optional custom reason.
#[macro_export]
macro_rules! ensure {
    ($condition:expr) => {
        if !($condition) {
            $crate::expect::raise_failure(format!(
                "Expected {} to be true, but it was not",
                stringify!($condition)
            ));
        }
    };
    ($condition:expr, $reason:expr) => {
        if !($condition) {
            $crate::expect::raise_failure(format!("{}", $reason));
        }
    };
}

/// Unconditionally fail the current test with the given reason.
#[macro_export]
macro_rules! fail {
    ($reason:expr) => {
        $crate::expect::raise_failure(format!("{}", $reason))
    };
}

/// Skip the current test, optionally with a reason.
#[macro_export]
macro_rules! skip {
    () => {
        $crate::expect::raise_skip(None)
    };
    ($reason:expr) => {
        $crate::expect::raise_skip(Some(format!("{}", $reason)))
    };
}

/// Require that the block panics with anything.
#[macro_export]
macro_rules! expect_any {
    ($($body:tt)*) => {
        $crate::expect::expect_any_panic(|| {
            $($body)*
        })
    };
}

/// Require that the block panics with a payload of the given type.
#[macro_export]
macro_rules! expect_throws {
    ($payload:ty, $($body:tt)*) => {
        $crate::expect::expect_panic_of::<$payload>(|| {
            $($body)*
        })
    };
}
