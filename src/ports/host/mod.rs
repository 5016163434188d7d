//! Host/mock port (C13).
//!
//! Mirrors the teacher's `ports::mok::Mok`: a `Port` implementation with no
//! real hardware behind it, so the scheduler core can run under `cargo test`
//! on the development machine. There is no tick timer to program; tests drive
//! the clock by calling `Scheduler::on_tick()` directly instead of waiting for
//! an interrupt, and `restore_context_and_return_from_interrupt` is never
//! actually reached in host tests because nothing calls `Scheduler::run()`
//! off-target.

use crate::ports::{InterruptState, Port, TickSource};

/// Non-AVR stand-in for the real architecture port.
pub struct Host;

impl TickSource for Host {
    fn init_tick(_frequency_hz: u32) {}
    fn start_tick() {}
}

impl Port for Host {
    fn disable_interrupts() -> InterruptState {
        InterruptState(true)
    }

    fn restore_interrupts(_state: InterruptState) {}

    fn sleep() {}

    unsafe fn restore_context_and_return_from_interrupt(_stack_pointer: usize) -> ! {
        unreachable!("the host port never actually dispatches a task stack")
    }
}
