//! Process lifecycle: memory locking, termination hooks, cleanup.
//!
//! Secrets must not reach disk or outlive the process. Startup locks every
//! present and future page against swapping, then wires the same cleanup
//! (wipe all sensitive buffers, restore terminal echo) into both an exit
//! hook and a handler for every catchable termination signal. The signal
//! path is async-signal-safe: it loads atomics, writes bytes, touches the
//! terminal, and exits; it never allocates or locks.

use anyhow::{Result, ensure};
use tracing::debug;

use crate::secret;

/// Every catchable signal that can end the process.
const TERMINATION_SIGNALS: &[libc::c_int] = &[
    libc::SIGABRT,
    libc::SIGALRM,
    libc::SIGBUS,
    libc::SIGFPE,
    libc::SIGHUP,
    libc::SIGILL,
    libc::SIGINT,
    libc::SIGIO,
    libc::SIGPIPE,
    libc::SIGPROF,
    libc::SIGPWR,
    libc::SIGQUIT,
    libc::SIGSEGV,
    libc::SIGSTKFLT,
    libc::SIGSYS,
    libc::SIGTERM,
    libc::SIGTRAP,
    libc::SIGUSR1,
    libc::SIGUSR2,
    libc::SIGVTALRM,
    libc::SIGXCPU,
    libc::SIGXFSZ,
];

/// Best-effort echo restore for the cleanup paths, which cannot report
/// errors.
fn restore_echo() {
    unsafe {
        if libc::isatty(libc::STDIN_FILENO) == 0 {
            return;
        }

        let mut term: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(libc::STDIN_FILENO, &mut term) == 0 {
            term.c_lflag |= libc::ECHO;
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &term);
        }
    }
}

extern "C" fn signal_cleanup(_signal: libc::c_int) {
    secret::wipe_all();
    restore_echo();
    unsafe { libc::_exit(1) };
}

extern "C" fn exit_cleanup() {
    secret::wipe_all();
    restore_echo();
}

/// Locks memory and installs the cleanup hooks.
///
/// Must run before any secret enters the process. Failure to lock memory
/// is fatal: an unlocked page can be swapped to disk with a secret in it.
pub fn init() -> Result<()> {
    ensure!(unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } == 0, "Internal error: could not lock memory");

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        libc::sigemptyset(&mut action.sa_mask);
        let handler: extern "C" fn(libc::c_int) = signal_cleanup;
        action.sa_sigaction = handler as usize;

        for &signal in TERMINATION_SIGNALS {
            ensure!(
                libc::sigaction(signal, &action, std::ptr::null_mut()) == 0,
                "Internal error: could not install handler for signal {signal}"
            );
        }

        ensure!(libc::atexit(exit_cleanup) == 0, "Internal error: could not install exit handler");
    }

    // A previous run may have died with echo off.
    crate::ui::turn_echo_on(true)?;

    debug!("memory locked, cleanup hooks installed");

    Ok(())
}
