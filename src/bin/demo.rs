// Demonstration suite for the testudo harness: a bit of everything,
// including a deliberate segfault that the run survives. Most of these tests
// fail on purpose, so the process exits nonzero.
//
// Usage: cargo run --bin demo

use std::process;
use std::time::Duration;

use testudo::{check, ensure, expect_any, expect_throws, fail, skip};
use testudo::{expect_signal, run_main, set_timeout, Registry, RunConfig};

#[derive(Debug)]
struct DemoError {
    detail: String,
}

fn main() {
    let mut registry = Registry::new();

    // Test names need not be unique.
    registry.register_test("demo_check", || {
        let values = vec![1, 2, 3, 4, 5, 6, 7, 8];
        check!(values[0], 1);
        check!(values[2], 3);
        check!(values[3], 4);
        // prints: Expected 2 to be equal 4, values[1] != 4, at ...
        check!(values[1], 4);
    });

    registry.register_test("demo_fail", || {
        let oops = true;
        if oops {
            fail!("Oops");
        }
    });

    registry.register_test("demo_assert", || {
        let a = 21;
        let b = 42;
        ensure!(a * 2 == b);
        ensure!(a == b / 2, "Joker");
        // prints: Error: Thief, at ...
        ensure!(a == b / 3, "Thief");
    });

    registry.register_test("demo_expect", || {
        expect_any!({
            std::panic::panic_any("oh my!");
        });
        expect_throws!(String, {
            std::panic::panic_any("an error of a stringy persuasion".to_string());
        });
        expect_throws!(i32, {
            std::panic::panic_any(42);
        });
        // prints: Error: Expected exception of type ..., at ...
        expect_throws!(String, {
            std::panic::panic_any(7u8);
        });
    });

    registry.register_test("demo_signal", || {
        set_timeout(Duration::from_secs(1));
        expect_signal(libc::SIGSEGV, || unsafe {
            std::ptr::write_volatile(std::ptr::null_mut::<i32>(), 42);
        });
    });

    registry.register_test("demo_fault", || unsafe {
        // prints: Error: Received SIGSEGV while trying to access 0x0
        std::ptr::write_volatile(std::ptr::null_mut::<i32>(), 42);
    });

    registry.register_test("demo_timeout", || {
        set_timeout(Duration::from_millis(300));
        loop {
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    registry.register_test("demo_skip", || {
        skip!("I don't feel like testing rn");
    });

    registry.register_test("demo_handler", || {
        std::panic::panic_any(DemoError {
            detail: "teapot".to_string(),
        });
    });

    registry.register_handler(|error| {
        if let Some(demo) = error.downcast_ref::<DemoError>() {
            fail!(format!("DemoError: {}", demo.detail));
        }
    });

    // Proof that demo_fault did not take the whole run down with it.
    registry.register_test("demo_final", || {});

    let config = RunConfig {
        print_skip_reason: true,
        print_elapsed_time: false,
        use_colors: false,
        ..RunConfig::default()
    };
    process::exit(run_main(&registry, &config));
}
