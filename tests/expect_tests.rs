//! Unit tests for the expectation primitives: silent success, message
//! contents (operand renderings, source text, call sites), and the
//! propagation rules for harness signals raised inside expectation blocks.

use std::panic::{catch_unwind, panic_any, AssertUnwindSafe};

use testudo::{check, ensure, expect_any, expect_throws, fail, skip};
use testudo::{TestFail, TestSkip};

/// Runs the closure and returns the failure message it raised.
fn failure_message(block: impl FnOnce()) -> String {
    let payload = catch_unwind(AssertUnwindSafe(block)).expect_err("expected a failure");
    payload
        .downcast_ref::<TestFail>()
        .expect("payload should be the harness failure signal")
        .message
        .clone()
}

#[test]
fn check_on_equal_values_is_silent() {
    check!(1, 1);
    let text = String::from("abc");
    check!(text, "abc");
}

#[test]
fn check_mismatch_embeds_renderings_and_source_text() {
    let values = vec![1, 2, 3];
    let message = failure_message(|| check!(values[1], 4));
    assert!(message.contains("Expected 2 to be equal 4"), "{message}");
    assert!(message.contains("values[1] != 4"), "{message}");
    assert!(message.contains("expect_tests.rs"), "{message}");
}

#[test]
fn ensure_derives_a_message_from_the_condition_text() {
    let message = failure_message(|| ensure!(1 + 1 == 3));
    assert!(
        message.contains("Expected 1 + 1 == 3 to be true, but it was not"),
        "{message}"
    );
}

#[test]
fn ensure_with_custom_reason_uses_it() {
    let message = failure_message(|| ensure!(false, "Joker"));
    assert!(message.starts_with("Joker"), "{message}");
}

#[test]
fn ensure_holds_silently() {
    ensure!(21 * 2 == 42);
    ensure!(true, "never shown");
}

#[test]
fn fail_appends_the_call_site() {
    let message = failure_message(|| fail!("Oops"));
    assert!(message.starts_with("Oops, at "), "{message}");
    assert!(message.contains("expect_tests.rs"), "{message}");
}

#[test]
fn skip_carries_its_reason() {
    let payload = catch_unwind(AssertUnwindSafe(|| skip!("later"))).expect_err("should raise");
    let s = payload.downcast_ref::<TestSkip>().expect("skip payload");
    assert_eq!(s.reason.as_deref(), Some("later"));

    let payload = catch_unwind(AssertUnwindSafe(|| skip!())).expect_err("should raise");
    let s = payload.downcast_ref::<TestSkip>().expect("skip payload");
    assert_eq!(s.reason, None);
}

#[test]
fn expect_any_fails_when_nothing_is_raised() {
    let message = failure_message(|| expect_any!({}));
    assert!(message.contains("Expected exception"), "{message}");
}

#[test]
fn expect_any_swallows_foreign_panics() {
    expect_any!({
        panic_any(7);
    });
    expect_any!({
        panic!("plain panic");
    });
}

#[test]
fn expect_any_reraises_harness_failures_unchanged() {
    let message = failure_message(|| {
        expect_any!({
            fail!("inner");
        })
    });
    assert!(message.starts_with("inner, at "), "{message}");
}

#[test]
fn expect_throws_accepts_matching_payload_type() {
    expect_throws!(String, {
        panic_any("typed".to_string());
    });
    expect_throws!(i32, {
        panic_any(42);
    });
}

#[test]
fn expect_throws_type_mismatch_is_distinct_from_no_panic() {
    let mismatch = failure_message(|| {
        expect_throws!(String, {
            panic_any(5i32);
        })
    });
    assert!(mismatch.contains("Expected exception of type"), "{mismatch}");
    assert!(mismatch.contains("String"), "{mismatch}");

    let silent = failure_message(|| expect_throws!(String, {}));
    assert!(silent.contains("Expected exception"), "{silent}");
    assert!(!silent.contains("of type"), "{silent}");
}

#[test]
fn expect_throws_propagates_skip_instead_of_reinterpreting_it() {
    let payload = catch_unwind(AssertUnwindSafe(|| {
        expect_throws!(String, {
            skip!("not an exception");
        })
    }))
    .expect_err("should raise");
    let s = payload.downcast_ref::<TestSkip>().expect("skip payload");
    assert_eq!(s.reason.as_deref(), Some("not an exception"));
}
