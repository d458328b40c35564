//! Translation of foreign panic payloads into test failures.
//!
//! Consulted only for payloads that are not already the harness's own
//! [`TestFail`]/[`TestSkip`] signals. Ordinary `panic!` messages are printed
//! directly; anything else is offered to the registered handlers in
//! registration order, and whatever no handler claims is rendered by a
//! best-effort fallback. Every translated payload classifies as a failure.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::outcome::{TestFail, TestOutcome, TestSkip};
use crate::registry::Handler;

pub(crate) fn classify(payload: Box<dyn Any + Send>, handlers: &[Handler]) -> TestOutcome {
    if let Some(fail) = payload.downcast_ref::<TestFail>() {
        return TestOutcome::Fail {
            message: fail.message.clone(),
        };
    }
    if let Some(skip) = payload.downcast_ref::<TestSkip>() {
        return TestOutcome::Skipped {
            reason: skip.reason.clone(),
        };
    }

    // Standard panic shape: already carries a printable description, no
    // handler consultation.
    if let Some(message) = printable_payload(payload.as_ref()) {
        return TestOutcome::Fail { message };
    }

    for handler in handlers {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload.as_ref())));
        match attempt {
            // No raise: the handler declined.
            Ok(()) => {}
            Err(converted) => {
                if let Some(fail) = converted.downcast_ref::<TestFail>() {
                    return TestOutcome::Fail {
                        message: fail.message.clone(),
                    };
                }
                // A handler that raised something else is skipped too.
            }
        }
    }

    TestOutcome::Fail {
        message: fallback_description(payload.as_ref()),
    }
}

fn printable_payload(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        return Some(format!("Unhandled panic: {text}"));
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return Some(format!("Unhandled panic: {text}"));
    }
    None
}

fn fallback_description(payload: &(dyn Any + Send)) -> String {
    if let Some(value) = payload.downcast_ref::<i32>() {
        format!("Unhandled panic: (i32) {value}")
    } else if let Some(value) = payload.downcast_ref::<i64>() {
        format!("Unhandled panic: (i64) {value}")
    } else if let Some(value) = payload.downcast_ref::<u32>() {
        format!("Unhandled panic: (u32) {value}")
    } else if let Some(value) = payload.downcast_ref::<u64>() {
        format!("Unhandled panic: (u64) {value}")
    } else {
        "Unhandled panic: unknown payload type".to_string()
    }
}
