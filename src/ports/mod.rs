//! Architecture abstraction layer (C3/C4/C13).
//!
//! The scheduler core is written once and is generic over nothing; instead,
//! exactly one of these modules is compiled in, selected by `target_arch`,
//! the same way the teacher selects `ports::xtensa_esp32` vs `ports::mok`.
//! `ActivePort` is the concrete type the rest of the kernel calls through.

#[cfg(target_arch = "avr")]
pub mod avr;
#[cfg(not(target_arch = "avr"))]
pub mod host;

#[cfg(target_arch = "avr")]
pub use avr::Avr as ActivePort;
#[cfg(not(target_arch = "avr"))]
pub use host::Host as ActivePort;

/// Programs and enables the periodic clock tick (C3).
pub trait TickSource {
    /// Programs the tick timer for `frequency_hz`. Does not enable it yet.
    fn init_tick(frequency_hz: u32);
    /// Enables the tick interrupt. After this call the tick handler may fire.
    fn start_tick();
}

/// Everything the scheduler core needs from the machine it's running on.
pub trait Port: TickSource {
    /// Disables interrupts, returning whatever state is needed to restore
    /// them. Scheduler queue mutations outside the tick ISR run inside a
    /// `disable_interrupts()` / `restore_interrupts()` bracket.
    fn disable_interrupts() -> InterruptState;

    /// Restores interrupts to the state `disable_interrupts` captured.
    fn restore_interrupts(state: InterruptState);

    /// Puts the core into its lowest-power wait state until the next
    /// interrupt. Used by the idle task and by `sleep_until_end_of_time_slice`.
    fn sleep();

    /// Sets the CPU stack pointer to `stack_pointer`, restores the saved
    /// register file found there, and returns from interrupt. Never returns.
    ///
    /// # Safety
    ///
    /// `stack_pointer` must point into a stack region previously prepared
    /// either by `Task::fabricate_initial_frame` or by a prior context save
    /// for this exact task; anything else is undefined behavior on real
    /// hardware.
    unsafe fn restore_context_and_return_from_interrupt(stack_pointer: usize) -> !;
}

/// Opaque interrupt-enable state as captured by [`Port::disable_interrupts`].
#[derive(Debug, Clone, Copy)]
pub struct InterruptState(pub(crate) bool);
