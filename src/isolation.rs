//! Fault interception and process-level test isolation.
//!
//! The original recovery mechanism for this kind of harness is a non-local
//! jump out of a signal handler, which cannot be expressed in safe Rust:
//! jumping over Rust frames skips destructors and leaves the abandoned stack
//! in an unobservable state. Instead, every test body runs in a forked child
//! process, so the recovery checkpoint is the process boundary itself. The
//! child reports its verdict over a pipe and exits; the supervisor drains the
//! pipe, reaps the child, and decodes the wait status. A child killed by a
//! signal is exactly the case where the checkpoint "fires": the supervisor
//! records a failure and simply moves on, with nothing to unwind.
//!
//! Fatal signals are still intercepted inside the test process, for one
//! reason only: diagnostics. The handler runs on a dedicated alternate stack
//! (so a test that corrupted the stack pointer can still be reported), writes
//! a fixed-width fault record with the signal number and faulting address to
//! the report pipe, then restores the default disposition and re-raises so
//! the exit status carries the signal.
//!
//! The timeout subsystem is a one-shot `ITIMER_REAL` countdown. The "is a
//! timeout armed" flag lives in the SIGALRM disposition itself: SIG_IGN while
//! disarmed (a stale alarm is ignored and cannot kill anything), SIG_DFL
//! while armed (an elapsed countdown terminates the test process, which the
//! supervisor reports as a timeout failure).

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::error::HarnessError;
use crate::outcome::TestOutcome;

/// What the supervisor observed about one isolated execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Supervision {
    /// The child ran to completion and reported a verdict.
    Completed(TestOutcome),
    /// The child was killed by a signal. `fault_addr` is the faulting address
    /// for memory-access faults, when the in-process handler managed to
    /// report one.
    Signaled { signo: i32, fault_addr: Option<u64> },
}

/// Write end of the report pipe in the current process, or -1 outside any
/// supervised child. Read by the fault handler, so it must stay a plain
/// atomic scalar.
static REPORT_FD: AtomicI32 = AtomicI32::new(-1);

static INSTALLED: OnceCell<Result<(), String>> = OnceCell::new();

const FAULT_STACK_SIZE: usize = 64 * 1024;

const FATAL_SIGNALS: [libc::c_int; 6] = [
    libc::SIGSEGV,
    libc::SIGBUS,
    libc::SIGILL,
    libc::SIGFPE,
    libc::SIGABRT,
    libc::SIGTERM,
];

// Report pipe wire format. Verdict records are written once by the child just
// before _exit; the fault record is written from the signal handler and must
// be buildable without allocation.
const TAG_PASS: u8 = b'P';
const TAG_FAIL: u8 = b'F';
const TAG_SKIP: u8 = b'S';
const TAG_FAULT: u8 = b'X';
const FAULT_RECORD_LEN: usize = 13; // tag + i32 signo + u64 addr

/// Install the fault-interception handlers and the alternate signal stack.
/// Idempotent; the first result is cached. Children inherit everything, so
/// one install before the run covers every test process.
pub fn install() -> Result<(), HarnessError> {
    INSTALLED
        .get_or_init(|| unsafe { install_handlers() })
        .clone()
        .map_err(HarnessError::Install)
}

unsafe fn install_handlers() -> Result<(), String> {
    let stack = Box::leak(vec![0u8; FAULT_STACK_SIZE].into_boxed_slice());
    let altstack = libc::stack_t {
        ss_sp: stack.as_mut_ptr() as *mut libc::c_void,
        ss_flags: 0,
        ss_size: FAULT_STACK_SIZE,
    };
    if libc::sigaltstack(&altstack, std::ptr::null_mut()) != 0 {
        return Err(format!("sigaltstack: {}", io::Error::last_os_error()));
    }

    let handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void) =
        fault_handler;
    for &signo in &FATAL_SIGNALS {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signo, &action, std::ptr::null_mut()) != 0 {
            return Err(format!(
                "sigaction({}): {}",
                signal_name(signo),
                io::Error::last_os_error()
            ));
        }
    }

    // No countdown is armed yet; a stray alarm must not kill anything.
    if libc::signal(libc::SIGALRM, libc::SIG_IGN) == libc::SIG_ERR {
        return Err(format!("signal(SIGALRM): {}", io::Error::last_os_error()));
    }
    Ok(())
}

/// Async-signal-safe by construction: a couple of scalar reads, a byte-array
/// fill, one write(2), then re-raise with the default disposition.
extern "C" fn fault_handler(
    signo: libc::c_int,
    info: *mut libc::siginfo_t,
    _context: *mut libc::c_void,
) {
    let fd = REPORT_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let addr = if (signo == libc::SIGSEGV || signo == libc::SIGBUS) && !info.is_null() {
            unsafe { (*info).si_addr() as usize as u64 }
        } else {
            0
        };
        let mut record = [0u8; FAULT_RECORD_LEN];
        record[0] = TAG_FAULT;
        record[1..5].copy_from_slice(&signo.to_le_bytes());
        record[5..13].copy_from_slice(&addr.to_le_bytes());
        unsafe {
            let _ = libc::write(fd, record.as_ptr() as *const libc::c_void, record.len());
        }
    }
    unsafe {
        libc::signal(signo, libc::SIG_DFL);
        libc::raise(signo);
    }
}

/// Run `body` in a forked child process and report what happened to it.
///
/// The child computes a [`TestOutcome`], writes it to the report pipe, and
/// `_exit`s without returning into the caller's stack. The supervisor never
/// sees the child's panics or faults directly, only the verdict or the
/// terminating signal.
pub fn run_isolated<F>(body: F) -> Result<Supervision, HarnessError>
where
    F: FnOnce() -> TestOutcome,
{
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(HarnessError::Pipe(io::Error::last_os_error()));
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        let error = io::Error::last_os_error();
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
        return Err(HarnessError::Fork(error));
    }

    if pid == 0 {
        // Test process. Nested isolation (expect_signal) re-points REPORT_FD
        // at its own pipe, so the fault handler always reports to the
        // nearest supervisor.
        unsafe { libc::close(read_fd) };
        REPORT_FD.store(write_fd, Ordering::SeqCst);
        let outcome = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|_| {
            TestOutcome::Fail {
                message: "internal: verdict computation panicked".to_string(),
            }
        });
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        write_all(write_fd, &encode_verdict(&outcome));
        unsafe { libc::_exit(0) };
    }

    // Supervisor. Drain before reaping so a large failure message cannot
    // deadlock against a full pipe.
    unsafe { libc::close(write_fd) };
    let report = drain(read_fd);
    unsafe { libc::close(read_fd) };
    let status = wait_for(pid)?;

    let (verdict, fault) = decode_records(&report);
    if libc::WIFSIGNALED(status) {
        let signo = libc::WTERMSIG(status);
        let fault_addr = match fault {
            Some((recorded, addr))
                if recorded == signo && (signo == libc::SIGSEGV || signo == libc::SIGBUS) =>
            {
                Some(addr)
            }
            _ => None,
        };
        return Ok(Supervision::Signaled { signo, fault_addr });
    }
    if libc::WIFEXITED(status) {
        let code = libc::WEXITSTATUS(status);
        if code == 0 {
            return Ok(Supervision::Completed(verdict.unwrap_or_else(|| {
                TestOutcome::Fail {
                    message: "The test process exited without reporting a verdict".to_string(),
                }
            })));
        }
        return Ok(Supervision::Completed(TestOutcome::Fail {
            message: format!("The test process exited early with status {code}"),
        }));
    }
    Ok(Supervision::Completed(TestOutcome::Fail {
        message: "The test process stopped in an unexpected way".to_string(),
    }))
}

// ============================================================================
// TIMEOUT SUBSYSTEM
// ============================================================================

/// Arm a one-shot countdown for the remainder of the current test. Re-arming
/// replaces the previous countdown; a zero duration disarms it. When the
/// countdown elapses before the test returns, the alarm terminates the test
/// process and the supervisor records a timeout failure.
pub fn set_timeout(timeout: Duration) {
    if timeout.is_zero() {
        clear_timeout();
        return;
    }
    let mut usec = timeout.subsec_micros();
    if timeout.as_secs() == 0 && usec == 0 {
        usec = 1; // sub-microsecond requests still have to fire
    }
    let timer = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: usec as libc::suseconds_t,
        },
    };
    unsafe {
        // Disposition first: arming before SIG_DFL could lose the alarm.
        libc::signal(libc::SIGALRM, libc::SIG_DFL);
        libc::setitimer(libc::ITIMER_REAL, &timer, std::ptr::null_mut());
    }
}

/// Disarm any pending countdown and park SIGALRM back at SIG_IGN so a stale
/// alarm cannot be mistaken for a timeout.
pub fn clear_timeout() {
    let disarm = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
    };
    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &disarm, std::ptr::null_mut());
        libc::signal(libc::SIGALRM, libc::SIG_IGN);
    }
}

/// Read the remaining countdown and disarm it, for handing the budget to an
/// inner supervised unit (interval timers are not inherited across fork).
pub(crate) fn take_timeout() -> Option<Duration> {
    let mut current = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
    };
    if unsafe { libc::getitimer(libc::ITIMER_REAL, &mut current) } != 0 {
        return None;
    }
    let remaining = Duration::new(
        current.it_value.tv_sec as u64,
        (current.it_value.tv_usec as u32).saturating_mul(1000),
    );
    if remaining.is_zero() {
        return None;
    }
    clear_timeout();
    Some(remaining)
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Human-readable name for the signals this harness deals in.
pub fn signal_name(signo: i32) -> String {
    match signo {
        libc::SIGSEGV => "SIGSEGV".to_string(),
        libc::SIGBUS => "SIGBUS".to_string(),
        libc::SIGILL => "SIGILL".to_string(),
        libc::SIGFPE => "SIGFPE".to_string(),
        libc::SIGABRT => "SIGABRT".to_string(),
        libc::SIGTERM => "SIGTERM".to_string(),
        libc::SIGALRM => "SIGALRM".to_string(),
        libc::SIGTRAP => "SIGTRAP".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        _ => format!("signal {signo}"),
    }
}

/// Failure message for a test process killed by `signo`. The alarm gets a
/// timeout-specific shape so it is distinguishable from a real crash.
pub(crate) fn describe_signal(signo: i32, fault_addr: Option<u64>) -> String {
    match (signo, fault_addr) {
        (libc::SIGALRM, _) => {
            "Timed out, the armed countdown elapsed before the test returned".to_string()
        }
        (libc::SIGSEGV | libc::SIGBUS, Some(addr)) => format!(
            "Received {} while trying to access 0x{:x}",
            signal_name(signo),
            addr
        ),
        _ => format!("Received {}", signal_name(signo)),
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

fn encode_verdict(outcome: &TestOutcome) -> Vec<u8> {
    match outcome {
        TestOutcome::Pass => vec![TAG_PASS],
        TestOutcome::Fail { message } => {
            let mut record = Vec::with_capacity(5 + message.len());
            record.push(TAG_FAIL);
            record.extend_from_slice(&(message.len() as u32).to_le_bytes());
            record.extend_from_slice(message.as_bytes());
            record
        }
        TestOutcome::Skipped { reason } => {
            let mut record = vec![TAG_SKIP];
            match reason {
                Some(reason) => {
                    record.push(1);
                    record.extend_from_slice(&(reason.len() as u32).to_le_bytes());
                    record.extend_from_slice(reason.as_bytes());
                }
                None => record.push(0),
            }
            record
        }
    }
}

/// Pick the verdict and the last fault record out of the report stream.
/// Truncated trailing bytes (a child dying mid-write) are ignored.
fn decode_records(report: &[u8]) -> (Option<TestOutcome>, Option<(i32, u64)>) {
    let mut verdict = None;
    let mut fault = None;
    let mut at = 0;
    while at < report.len() {
        match report[at] {
            TAG_PASS => {
                verdict = Some(TestOutcome::Pass);
                at += 1;
            }
            TAG_FAIL => {
                let Some((message, len)) = read_string(report, at + 1) else {
                    break;
                };
                at += 5 + len;
                verdict = Some(TestOutcome::Fail { message });
            }
            TAG_SKIP => {
                let Some(&flag) = report.get(at + 1) else {
                    break;
                };
                if flag == 0 {
                    verdict = Some(TestOutcome::Skipped { reason: None });
                    at += 2;
                } else {
                    let Some((reason, len)) = read_string(report, at + 2) else {
                        break;
                    };
                    at += 6 + len;
                    verdict = Some(TestOutcome::Skipped {
                        reason: Some(reason),
                    });
                }
            }
            TAG_FAULT => {
                if at + FAULT_RECORD_LEN > report.len() {
                    break;
                }
                let signo = i32::from_le_bytes(report[at + 1..at + 5].try_into().unwrap());
                let addr = u64::from_le_bytes(report[at + 5..at + 13].try_into().unwrap());
                fault = Some((signo, addr));
                at += FAULT_RECORD_LEN;
            }
            _ => break,
        }
    }
    (verdict, fault)
}

/// Reads a length-prefixed string and returns it with the wire length, which
/// the cursor must advance by (lossy UTF-8 decoding can change the byte
/// count).
fn read_string(report: &[u8], at: usize) -> Option<(String, usize)> {
    let len_bytes: [u8; 4] = report.get(at..at + 4)?.try_into().ok()?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let bytes = report.get(at + 4..at + 4 + len)?;
    Some((String::from_utf8_lossy(bytes).into_owned(), len))
}

// ============================================================================
// RAW FD PLUMBING
// ============================================================================

fn write_all(fd: libc::c_int, bytes: &[u8]) {
    let mut written = 0;
    while written < bytes.len() {
        let count = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if count > 0 {
            written += count as usize;
            continue;
        }
        if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        break;
    }
}

fn drain(fd: libc::c_int) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let count = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if count > 0 {
            data.extend_from_slice(&buf[..count as usize]);
            continue;
        }
        if count == 0 {
            break;
        }
        if io::Error::last_os_error().raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        break;
    }
    data
}

fn wait_for(pid: libc::pid_t) -> Result<libc::c_int, HarnessError> {
    let mut status = 0;
    loop {
        let reaped = unsafe { libc::waitpid(pid, &mut status, 0) };
        if reaped == pid {
            return Ok(status);
        }
        if reaped < 0 {
            let error = io::Error::last_os_error();
            if error.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(HarnessError::Wait(error));
        }
    }
}
