//! Kernel configuration surface (C10).
//!
//! Lazuli selects its behaviour at compile time rather than through a runtime
//! configuration object, the way the teacher selects whole scheduler
//! backends through Cargo features (`cooperative`/`preemptive`) instead of a
//! runtime switch. Numeric knobs live here as associated constants on
//! [`Config`]; whole-module selection (`clock24`, `mutex`, `serial`) lives in
//! `Cargo.toml` under `[features]`.

/// A duration or deadline expressed in ticks of [`Config::TICK_FREQUENCY_HZ`].
/// `period`, `completion` and every `wait_timer` argument are `TickCount`s.
pub type TickCount = u32;

/// Behaviour selected for a kernel panic (misuse detected in kernel/ISR
/// context, see `kernel::panic`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicBehavior {
    /// Disable interrupts and loop forever.
    InfiniteLoop,
    /// Perform a software reset (watchdog-equivalent).
    SoftwareReset,
}

/// Compile-time kernel configuration.
///
/// A unit struct carrying associated constants, mirroring the way the
/// original C kernel groups every `LZ_CONFIG_*` macro in a single header.
pub struct Config;

impl Config {
    /// System clock tick resolution, in Hertz. Every timing parameter
    /// (`period`, `completion`, `wait_timer` units) is expressed in ticks of
    /// this frequency.
    pub const TICK_FREQUENCY_HZ: u32 = 50;

    /// The machine's oscillator frequency, in Hertz. Used to derive the
    /// hardware timer's compare value for [`Self::TICK_FREQUENCY_HZ`].
    pub const MACHINE_CLOCK_FREQUENCY_HZ: u32 = 16_000_000;

    /// Maximum number of application tasks the kernel can hold. The task
    /// pool reserves one additional slot beyond this for the idle task (see
    /// `scheduler::TASK_POOL_SIZE`).
    pub const MAX_TASKS: usize = 16;

    /// Highest admissible interrupt id a task may wait on with
    /// `task_wait_interrupt`.
    pub const MAX_IRQ: u8 = 7;

    /// Default stack size, in bytes, applied when a task's configuration
    /// leaves `stack_size` at zero.
    pub const DEFAULT_STACK_SIZE: usize = 96;

    /// Default priority applied to `PriorityRT` tasks that don't set one.
    pub const DEFAULT_PRIORITY: i16 = 0;

    /// Safety distance, in bytes, the bump allocator keeps between its `brk`
    /// and the machine stack pointer.
    pub const BREAK_STACK_GAP: usize = 50;

    /// When true, the idle task puts the CPU to sleep; when false it
    /// busy-loops. Sleeping saves power but makes cycle-accurate timing
    /// benchmarks harder to reason about on real hardware.
    pub const IDLE_CPU_SLEEPS: bool = true;

    /// Whether `register_task`, mutex and list operations validate their
    /// pointer/handle arguments before using them. Disabling this trades
    /// safety for a few cycles, as in the original kernel.
    pub const CHECK_NULL_PARAMETERS: bool = true;

    /// Panic behaviour selected for this build.
    pub const PANIC_BEHAVIOR: PanicBehavior = PanicBehavior::InfiniteLoop;

    /// Capacity of the diagnostics ring buffer (see [`crate::diagnostics`]).
    pub const DIAGNOSTICS_CAPACITY: usize = 8;
}
