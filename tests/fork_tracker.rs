//! Integration tests for the fork-safety tracker
//!
//! Tracker state is process-wide, so everything runs inside a single test
//! in its own test binary.
#![cfg(unix)]

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult};
use session_launch::kernel::fork::{fork_hooks_installed, forks_observed};
use session_launch::{init_thread_id, is_main_thread, setup_fork_handlers, was_forked, LaunchError};

#[test]
fn test_main_thread_identity_and_fork_detection() {
    assert!(!is_main_thread(), "no thread is main before init");

    init_thread_id().unwrap();
    assert!(matches!(init_thread_id(), Err(LaunchError::AlreadyInitialized)));

    assert!(is_main_thread());
    let from_other_thread = std::thread::spawn(is_main_thread).join().unwrap();
    assert!(!from_other_thread);

    assert!(!fork_hooks_installed());
    setup_fork_handlers().unwrap();
    assert!(fork_hooks_installed());
    // Installing twice must not register the hooks twice
    setup_fork_handlers().unwrap();

    assert!(!was_forked());
    let forks_before = forks_observed();

    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            // Only async-signal-safe work in the child: atomic reads and _exit.
            let code = if was_forked() && was_forked() { 0 } else { 1 };
            unsafe { libc::_exit(code) };
        }
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).unwrap();
            assert_eq!(status, WaitStatus::Exited(child, 0), "child must observe was_forked");
            assert!(!was_forked(), "parent is never marked as forked");
            assert_eq!(forks_observed(), forks_before + 1);
        }
    }

    // Still the main thread after forking
    assert!(is_main_thread());
}
