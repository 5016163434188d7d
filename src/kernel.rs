//! Kernel bootstrap and panic behaviour (C11).
//!
//! `boot` is the AVR entry point reached after the runtime's `.bss`/`.data`
//! setup: it hands off to `scheduler::run`, which never returns. `panic`
//! is the kernel-context half of the error model (§7 case 2): a misuse
//! detected while already inside the kernel or an ISR, where there is no
//! "current task" to blame, so the whole system halts or resets instead.

use crate::config::{Config, PanicBehavior};
use crate::diagnostics::{self, Event};
use crate::ports::ActivePort;
use crate::scheduler::Misuse;

/// Entry point for application code: register tasks, then call
/// [`crate::scheduler::run`]. Kept as a thin wrapper so `main.rs`/the
/// application only ever calls one function regardless of target.
pub fn boot() -> ! {
    diagnostics::report(Event::Boot("kernel boot"));
    crate::scheduler::run()
}

/// A misuse condition detected in kernel or ISR context (§7 case 2), where
/// there is no task to blame. Diverges into the configured [`PanicBehavior`].
pub fn panic(kind: Misuse) -> ! {
    halt(match kind {
        Misuse::InterruptIdOutOfRange(_) => "kernel-context: interrupt id out of range",
        Misuse::NullPointer => "kernel-context: null pointer passed to a kernel API",
    })
}

/// Any other fatal kernel-context condition (a Rust-level panic reaching
/// the `#[panic_handler]`, an internal invariant violation). Same
/// destination as [`panic`], under a caller-supplied reason string.
pub fn halt(reason: &'static str) -> ! {
    diagnostics::report(Event::Misuse(reason));

    match Config::PANIC_BEHAVIOR {
        PanicBehavior::InfiniteLoop => {
            ActivePort::disable_interrupts();
            loop {
                ActivePort::sleep();
            }
        }
        PanicBehavior::SoftwareReset => software_reset(),
    }
}

#[cfg(target_arch = "avr")]
fn software_reset() -> ! {
    // SAFETY: jumping to address 0 on AVR re-enters the reset vector, the
    // standard software-reset idiom when no dedicated watchdog trick is set
    // up; interrupts are left disabled by the caller.
    unsafe {
        core::arch::asm!("jmp 0", options(noreturn));
    }
}

#[cfg(not(target_arch = "avr"))]
fn software_reset() -> ! {
    unreachable!("software reset is only meaningful on the AVR target")
}
