//! Integration tests for crash survival: supervised execution, fault
//! diagnostics, timeouts, and signal expectations. These fork real processes
//! and trip real segfaults, so each scenario keeps its blast radius inside a
//! supervised child.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use testudo::{
    expect_signal, run, run_isolated, set_timeout, BufferReporter, Registry, RunConfig,
    Supervision, TestFail, TestOutcome,
};

fn quiet_config() -> RunConfig {
    RunConfig {
        use_colors: false,
        print_elapsed_time: false,
        ..RunConfig::default()
    }
}

fn failure_of(reporter: &BufferReporter, index: usize) -> &str {
    match &reporter.events[index].1 {
        TestOutcome::Fail { message } => message,
        other => panic!("expected a failure at index {index}, got {other:?}"),
    }
}

#[test]
fn supervised_body_reports_its_verdict() {
    let supervised = run_isolated(|| TestOutcome::Pass).expect("supervision should not error");
    assert_eq!(supervised, Supervision::Completed(TestOutcome::Pass));

    let supervised = run_isolated(|| TestOutcome::Fail {
        message: "carried across the pipe".to_string(),
    })
    .expect("supervision should not error");
    assert_eq!(
        supervised,
        Supervision::Completed(TestOutcome::Fail {
            message: "carried across the pipe".to_string()
        })
    );
}

#[test]
fn supervised_body_killed_by_a_signal_is_observed() {
    let supervised = run_isolated(|| {
        unsafe { libc::raise(libc::SIGSEGV) };
        TestOutcome::Pass
    })
    .expect("supervision should not error");
    match supervised {
        Supervision::Signaled { signo, .. } => assert_eq!(signo, libc::SIGSEGV),
        other => panic!("expected a signal death, got {other:?}"),
    }
}

#[test]
fn supervised_body_that_exits_without_a_verdict_is_a_failure() {
    let supervised =
        run_isolated(|| unsafe { libc::_exit(0) }).expect("supervision should not error");
    match supervised {
        Supervision::Completed(TestOutcome::Fail { message }) => {
            assert!(message.contains("without reporting a verdict"), "{message}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }

    let supervised =
        run_isolated(|| unsafe { libc::_exit(3) }).expect("supervision should not error");
    match supervised {
        Supervision::Completed(TestOutcome::Fail { message }) => {
            assert!(message.contains("exited early with status 3"), "{message}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn a_segfault_fails_one_test_and_the_run_continues() {
    let mut registry = Registry::new();
    registry.register_test("dereferences_null", || unsafe {
        std::ptr::write_volatile(std::ptr::null_mut::<i32>(), 42);
    });
    registry.register_test("still_runs_afterwards", || {});

    let mut reporter = BufferReporter::default();
    let tally = run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    let message = failure_of(&reporter, 0);
    assert!(message.contains("SIGSEGV"), "{message}");
    assert!(message.contains("0x0"), "{message}");
    assert!(reporter.events[1].1.is_pass());
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.succeeded, 1);
}

#[test]
fn abort_in_a_test_is_reported_by_name() {
    let mut registry = Registry::new();
    registry.register_test("aborts", || unsafe {
        libc::abort();
    });

    let mut reporter = BufferReporter::default();
    run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    let message = failure_of(&reporter, 0);
    assert!(message.contains("SIGABRT"), "{message}");
}

#[test]
fn expect_signal_resumes_execution_after_the_anticipated_signal() {
    let marker = std::env::temp_dir().join(format!("testudo-resume-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);

    let mut registry = Registry::new();
    let path = marker.clone();
    registry.register_test("anticipated_crash", move || {
        expect_signal(libc::SIGSEGV, || unsafe {
            std::ptr::write_volatile(std::ptr::null_mut::<i32>(), 42);
        });
        // Only reachable if the expectation returned normally.
        std::fs::write(&path, b"resumed").unwrap();
    });

    let mut reporter = BufferReporter::default();
    let tally = run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    let resumed = std::fs::read(&marker).unwrap_or_default();
    let _ = std::fs::remove_file(&marker);
    assert_eq!(resumed, b"resumed");
    assert_eq!(tally.succeeded, 1);
}

#[test]
fn expect_signal_fails_when_the_block_returns_normally() {
    let payload = catch_unwind(AssertUnwindSafe(|| {
        expect_signal(libc::SIGSEGV, || {});
    }))
    .expect_err("expected a failure");
    let message = &payload
        .downcast_ref::<TestFail>()
        .expect("harness failure payload")
        .message;
    assert!(message.contains("Expected signal SIGSEGV"), "{message}");
}

#[test]
fn expect_signal_fails_on_a_different_signal() {
    let payload = catch_unwind(AssertUnwindSafe(|| {
        expect_signal(libc::SIGSEGV, || unsafe {
            libc::raise(libc::SIGILL);
        });
    }))
    .expect_err("expected a failure");
    let message = &payload
        .downcast_ref::<TestFail>()
        .expect("harness failure payload")
        .message;
    assert!(message.contains("SIGILL"), "{message}");
}

#[test]
fn expect_signal_propagates_an_inner_expectation_failure() {
    let payload = catch_unwind(AssertUnwindSafe(|| {
        expect_signal(libc::SIGSEGV, || {
            testudo::raise_failure("inner violation".to_string());
        });
    }))
    .expect_err("expected a failure");
    let message = &payload
        .downcast_ref::<TestFail>()
        .expect("harness failure payload")
        .message;
    assert!(message.contains("inner violation"), "{message}");
}

#[test]
fn an_overrun_countdown_fails_the_test_as_a_timeout() {
    let mut registry = Registry::new();
    registry.register_test("slow", || {
        set_timeout(Duration::from_millis(100));
        loop {
            std::thread::sleep(Duration::from_millis(20));
        }
    });
    registry.register_test("prompt", || {
        set_timeout(Duration::from_secs(5));
    });

    let mut reporter = BufferReporter::default();
    let tally = run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    let message = failure_of(&reporter, 0);
    assert!(message.contains("Timed out"), "{message}");
    assert!(
        reporter.events[1].1.is_pass(),
        "an armed countdown must not bleed into the next test"
    );
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.succeeded, 1);
}

#[test]
fn a_stale_alarm_with_no_countdown_armed_is_ignored() {
    let mut registry = Registry::new();
    registry.register_test("raises_an_unarmed_alarm", || unsafe {
        libc::raise(libc::SIGALRM);
    });

    let mut reporter = BufferReporter::default();
    let tally = run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    assert!(reporter.events[0].1.is_pass(), "{:?}", reporter.events[0].1);
    assert_eq!(tally.failed, 0);
}

#[test]
fn the_alarm_itself_can_be_the_anticipated_signal() {
    let mut registry = Registry::new();
    registry.register_test("waits_for_the_alarm", || {
        set_timeout(Duration::from_millis(100));
        expect_signal(libc::SIGALRM, || loop {
            std::thread::sleep(Duration::from_millis(20));
        });
    });

    let mut reporter = BufferReporter::default();
    let tally = run(&registry, &quiet_config(), &mut reporter).expect("run should not error");

    assert!(reporter.events[0].1.is_pass(), "{:?}", reporter.events[0].1);
    assert_eq!(tally.succeeded, 1);
}

#[test]
fn signal_names_cover_the_intercepted_set() {
    assert_eq!(testudo::signal_name(libc::SIGSEGV), "SIGSEGV");
    assert_eq!(testudo::signal_name(libc::SIGBUS), "SIGBUS");
    assert_eq!(testudo::signal_name(libc::SIGILL), "SIGILL");
    assert_eq!(testudo::signal_name(libc::SIGFPE), "SIGFPE");
    assert_eq!(testudo::signal_name(libc::SIGABRT), "SIGABRT");
    assert_eq!(testudo::signal_name(libc::SIGTERM), "SIGTERM");
    assert_eq!(testudo::signal_name(libc::SIGALRM), "SIGALRM");
    assert_eq!(testudo::signal_name(250), "signal 250");
}
