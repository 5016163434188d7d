//! AVR ATmega328P port.
//!
//! Programs Timer/Counter 1 in CTC mode as the tick source and implements
//! the interrupt-disable and context-restore primitives the scheduler core
//! needs. Register addresses are the ATmega328P's, taken from its I/O memory
//! map (`TCCR1A`/`TCCR1B`/`TCNT1`/`OCR1A`/`TIMSK1`, `SREG`).
//!
//! The tick itself is caught by `__vector_11`, the raw `TIMER1_COMPA`
//! interrupt vector defined at the bottom of this file in hand-written
//! assembly: it pushes the interrupted task's full register file, hands its
//! stack pointer to the scheduler, and tail-jumps into
//! `avr_restore_context_and_return_from_interrupt` to dispatch whichever
//! task got elected next.

use volatile::Volatile;

use crate::ports::{InterruptState, Port, TickSource};

const TCCR1A: usize = 0x80;
const TCCR1B: usize = 0x81;
const TCNT1L: usize = 0x84;
const OCR1AL: usize = 0x88;
const TIMSK1: usize = 0x6f;
const SREG: usize = 0x5f;

const WGM12: u8 = 1 << 3; // CTC mode, top = OCR1A
const CS11: u8 = 1 << 1; // clk/8 prescaler
const OCIE1A: u8 = 1 << 1; // Timer/Counter1 Output Compare A Match interrupt enable
const SREG_I: u8 = 1 << 7; // global interrupt enable bit

unsafe fn register(address: usize) -> Volatile<&'static mut u8> {
    Volatile::new(&mut *(address as *mut u8))
}

/// The real hardware port.
pub struct Avr;

impl TickSource for Avr {
    fn init_tick(frequency_hz: u32) {
        // CTC top value for a given prescaler: top = clock / (prescaler * hz) - 1.
        let top = crate::config::Config::MACHINE_CLOCK_FREQUENCY_HZ / (8 * frequency_hz) - 1;
        debug_assert!(top <= u16::MAX as u32, "tick frequency too low for this prescaler");

        // SAFETY: these addresses are the ATmega328P's memory-mapped I/O
        // registers for Timer/Counter1; this function runs once at boot,
        // before the tick interrupt is enabled.
        unsafe {
            register(TCCR1A).write(0);
            register(TCCR1B).write(WGM12 | CS11);
            register(OCR1AL).write(top as u8);
            let _ = register(TCNT1L); // high byte of TCNT1/OCR1A omitted: top fits one byte at 50 Hz/16 MHz
        }
    }

    fn start_tick() {
        // SAFETY: see `init_tick`.
        unsafe { register(TIMSK1).write(OCIE1A) };
    }
}

impl Port for Avr {
    fn disable_interrupts() -> InterruptState {
        // SAFETY: SREG is the AVR status register; reading then clearing the
        // global interrupt bit is the standard AVR critical-section entry.
        let was_enabled = unsafe {
            let sreg = register(SREG).read();
            core::arch::asm!("cli");
            sreg & SREG_I != 0
        };
        InterruptState(was_enabled)
    }

    fn restore_interrupts(state: InterruptState) {
        if state.0 {
            // SAFETY: only re-enables interrupts that `disable_interrupts`
            // observed as enabled; this is the matching half of that call.
            unsafe { core::arch::asm!("sei") };
        }
    }

    fn sleep() {
        // SAFETY: SLEEP with the default sleep mode (idle) is always safe to
        // issue; it returns as soon as any enabled interrupt fires.
        unsafe { core::arch::asm!("sleep") };
    }

    unsafe fn restore_context_and_return_from_interrupt(stack_pointer: usize) -> ! {
        // SAFETY: forwards to the free function the tick ISR (`__vector_11`
        // below) also tail-jumps into; caller contract is documented on the
        // trait method.
        unsafe { avr_restore_context_and_return_from_interrupt(stack_pointer) }
    }
}

/// Sets the hardware stack pointer to `stack_pointer`, pops the full
/// register file and status register that either a real ISR prologue or
/// `Task::fabricate_initial_frame` laid out there, then executes `reti`.
/// `#[no_mangle]` so the tick vector below can tail-jump into it by name.
///
/// # Safety
///
/// `stack_pointer` must point at a register file of exactly the shape
/// `Task::fabricate_initial_frame` or a prior context save produced: 17
/// bytes (r1, r0, SREG, r18..=r31) followed by a saved program counter.
#[no_mangle]
unsafe extern "C" fn avr_restore_context_and_return_from_interrupt(stack_pointer: usize) -> ! {
    // SAFETY: see function doc; this is the exact pop order
    // `Task::fabricate_initial_frame`'s push order (see `task.rs`) mirrors.
    unsafe {
        core::arch::asm!(
            "out 0x3e, {sp_hi}",
            "out 0x3d, {sp_lo}",
            "pop r31",
            "pop r30",
            "pop r29",
            "pop r28",
            "pop r27",
            "pop r26",
            "pop r25",
            "pop r24",
            "pop r23",
            "pop r22",
            "pop r21",
            "pop r20",
            "pop r19",
            "pop r18",
            "pop r0",
            "out 0x3f, r0", // SREG
            "pop r0",
            "pop r1",
            "reti",
            sp_hi = in(reg) ((stack_pointer >> 8) as u8),
            sp_lo = in(reg) (stack_pointer as u8),
            options(noreturn),
        )
    }
}

/// Bridges the tick vector's raw register-argument convention to
/// [`crate::scheduler::on_tick_isr`]'s normal `unsafe fn` signature.
///
/// # Safety
/// Same contract as `scheduler::on_tick_isr`: only ever entered from
/// `__vector_11`'s tail call below.
#[no_mangle]
unsafe extern "C" fn avr_tick_isr(interrupted_sp: usize) -> usize {
    // SAFETY: see function doc.
    unsafe { crate::scheduler::on_tick_isr(interrupted_sp) }
}

// The tick interrupt vector itself (TIMER1_COMPA, vector 11 on the
// ATmega328P). No Rust function can be this entry point: the hardware
// jumps here directly with no register saved but PC, so the full context
// must be pushed by hand, in exactly the order `avr_restore_context_and_return_from_interrupt`
// pops it, before any normal Rust code (which assumes its call-clobbered
// registers are free to use) can run. After the scheduler picks the next
// task, this tail-jumps into the shared restore routine instead of
// returning, so the elected task's context is popped instead of the
// interrupted one's.
core::arch::global_asm!(
    ".global __vector_11",
    "__vector_11:",
    "push r1",
    "push r0",
    "in r0, 0x3f", // SREG
    "push r0",
    "push r18",
    "push r19",
    "push r20",
    "push r21",
    "push r22",
    "push r23",
    "push r24",
    "push r25",
    "push r26",
    "push r27",
    "push r28",
    "push r29",
    "push r30",
    "push r31",
    "in r24, 0x3d", // SPL
    "in r25, 0x3e", // SPH: r24:r25 now holds the interrupted task's saved sp
    "call avr_tick_isr",
    "jmp avr_restore_context_and_return_from_interrupt",
);
