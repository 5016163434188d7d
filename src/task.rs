//! Task control block (C5).
//!
//! Every task the kernel knows about lives in the scheduler's fixed-capacity
//! task pool ([`crate::config::Config::MAX_TASKS`]), addressed by
//! [`crate::list::NodeId`]. A `Task` is never moved or freed once registered;
//! only its `state_queue_link` moves between the scheduler's queues.

use crate::config::TickCount;
use crate::context::InitialFrame;
use crate::list::{Link, Linked};
use crate::message::MessageChannel;

/// Bytes of register-file overhead a real context save/restore needs on top
/// of a task's configured `stack_size`: the saved general-purpose registers,
/// SREG and r0/r1 (17 bytes, see `fabricate_initial_frame`), the saved
/// program counter, and the return slot a task's own entry point eventually
/// `ret`s into. `register_task` adds this to every stack reservation, and
/// `fabricate_initial_frame` writes a dummy frame of exactly this size, the
/// same way the original's `Lz_RegisterTask` adds
/// `sizeof(TaskContextLayout) + sizeof(void *)` to the caller's requested
/// size.
pub(crate) const CONTEXT_RESERVE_BYTES: usize = 17 + 2 * core::mem::size_of::<usize>();

/// The scheduling policy a task is registered under.
///
/// The C original dispatches per-policy behaviour through a function table;
/// a tagged variant with a `match` in the scheduler core compiles down to
/// the same jump table without needing a runtime-populated vtable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Periodic task scheduled by ascending period (rate-monotonic order).
    CyclicRT { period: TickCount, completion: TickCount },
    /// Fixed-priority task scheduled by descending priority.
    PriorityRT { priority: i16 },
}

impl Policy {
    pub fn period(&self) -> Option<TickCount> {
        match self {
            Policy::CyclicRT { period, .. } => Some(*period),
            Policy::PriorityRT { .. } => None,
        }
    }

    pub fn priority(&self) -> Option<i16> {
        match self {
            Policy::CyclicRT { .. } => None,
            Policy::PriorityRT { priority } => Some(*priority),
        }
    }
}

/// Caller-supplied parameters for [`crate::scheduler::Scheduler::register_task`].
#[derive(Debug, Clone, Copy)]
pub struct TaskConfiguration {
    pub name: Option<&'static str>,
    pub policy: Policy,
    pub stack_size: usize,
}

/// Fills in a default configuration: `PriorityRT` at the default priority,
/// the default stack size, no name. Mirrors `task_configuration_default`.
pub fn task_configuration_default() -> TaskConfiguration {
    TaskConfiguration {
        name: None,
        policy: Policy::PriorityRT {
            priority: crate::config::Config::DEFAULT_PRIORITY,
        },
        stack_size: crate::config::Config::DEFAULT_STACK_SIZE,
    }
}

/// The task control block.
pub struct Task {
    pub(crate) name: Option<&'static str>,
    pub(crate) entry_point: fn(),
    pub(crate) stack_origin: usize,
    pub(crate) stack_size: usize,
    pub(crate) stack_pointer: usize,
    pub(crate) policy: Policy,
    /// Ticks remaining until the next cyclic activation, or until a parked
    /// software timer expires (the two uses never overlap for one task).
    pub(crate) time_until_activation: TickCount,
    /// Ticks remaining in the current cyclic period before a deadline miss.
    pub(crate) time_until_completion: TickCount,
    /// Ticks remaining on a `WaitSoftwareTimer` park.
    pub(crate) time_until_timer_expiration: TickCount,
    pub(crate) state_queue_link: Link,
    pub(crate) message: MessageChannel,
}

impl Task {
    /// Builds a task in its pre-dispatch state: queued nowhere yet (the
    /// caller links it into a ready queue immediately after), with timing
    /// counters reset to a fresh period/timer.
    pub(crate) fn new(
        name: Option<&'static str>,
        entry_point: fn(),
        stack: crate::memory::Region,
        policy: Policy,
    ) -> Self {
        let frame = InitialFrame::new(entry_point as usize, terminate_trampoline as usize);
        let stack_pointer = fabricate_initial_frame(stack, frame);
        let (time_until_activation, time_until_completion) = match policy {
            Policy::CyclicRT { period, completion } => (period, completion),
            Policy::PriorityRT { .. } => (0, 0),
        };
        Task {
            name,
            entry_point,
            stack_origin: stack.base,
            stack_size: stack.size,
            stack_pointer,
            policy,
            time_until_activation,
            time_until_completion,
            time_until_timer_expiration: 0,
            state_queue_link: Link::unlinked(),
            message: MessageChannel::new(),
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// An unused task-pool slot. Never scheduled: `Scheduler` only ever
    /// reads the slots below its registration count, but every slot needs a
    /// valid `Task` up front since the pool is a plain fixed-size array
    /// rather than an array of `Option<Task>`.
    pub(crate) fn placeholder() -> Self {
        Task {
            name: None,
            entry_point: || {},
            stack_origin: 0,
            stack_size: 0,
            stack_pointer: 0,
            policy: Policy::PriorityRT { priority: i16::MIN },
            time_until_activation: 0,
            time_until_completion: 0,
            time_until_timer_expiration: 0,
            state_queue_link: Link::unlinked(),
            message: MessageChannel::new(),
        }
    }
}

impl Linked for Task {
    fn link(&self) -> &Link {
        &self.state_queue_link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.state_queue_link
    }
}

/// Where a task's saved program counter points if its entry point returns
/// normally: this is the bridge from "fell off the end of `entry_point`" to
/// the `Terminate` message, the implicit-terminate suspension point.
fn terminate_trampoline() {
    crate::scheduler::task_terminate();
}

/// Writes an initial register file at the top of `stack`, shaped so a real
/// context restore can pop it exactly as it would a genuinely saved context:
/// a zeroed general-purpose register file, then the saved program counter
/// (`frame.entry_point`), then the return slot a task's own entry point
/// eventually `ret`s into (`frame.return_trampoline`). Returns the resulting
/// stack pointer.
///
/// On the host port this stack region is never actually popped by real
/// hardware (see `ports::host`), so the write is skipped there; only the
/// resulting pointer arithmetic needs to be plausible for scheduler
/// bookkeeping and its tests to treat every task uniformly.
fn fabricate_initial_frame(stack: crate::memory::Region, frame: InitialFrame) -> usize {
    let entry_point = crate::context::reverse_bytes_of_function_pointer(frame.entry_point);
    let return_trampoline =
        crate::context::reverse_bytes_of_function_pointer(frame.return_trampoline);

    #[cfg(target_arch = "avr")]
    {
        // r1, r0, SREG, r18..=r31: the exact set `Port::restore_context_and_return_from_interrupt`
        // pops, in the same total size, so a task's first dispatch goes
        // through the same restore path as every later one.
        const REGISTER_FILE_BYTES: usize = 17;
        let pc_size = core::mem::size_of::<usize>();

        // SAFETY: `stack` was just reserved fresh from the bump allocator,
        // which reserves at least `task::CONTEXT_RESERVE_BYTES` beyond the
        // requested `stack_size`, and is owned exclusively by this task;
        // nothing else can be writing to it.
        unsafe {
            let top = (stack.base + stack.size) as *mut u8;
            let frame_base = top.sub(CONTEXT_RESERVE_BYTES);
            core::ptr::write_bytes(frame_base, 0, REGISTER_FILE_BYTES);

            let pc_slot = frame_base.add(REGISTER_FILE_BYTES) as *mut usize;
            pc_slot.write_unaligned(entry_point);

            let return_slot = frame_base.add(REGISTER_FILE_BYTES + pc_size) as *mut usize;
            return_slot.write_unaligned(return_trampoline);

            frame_base as usize
        }
    }
    #[cfg(not(target_arch = "avr"))]
    {
        let _ = (entry_point, return_trampoline);
        stack.base + stack.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Region;

    fn dummy_entry() {}

    #[test]
    fn new_task_starts_unlinked_with_fresh_counters() {
        let stack = Region { base: 0x200, size: 96 };
        let task = Task::new(
            Some("t"),
            dummy_entry,
            stack,
            Policy::CyclicRT {
                period: 4,
                completion: 1,
            },
        );
        assert_eq!(task.time_until_activation, 4);
        assert_eq!(task.time_until_completion, 1);
    }

    #[test]
    fn task_configuration_default_is_priority_rt_with_default_priority() {
        let cfg = task_configuration_default();
        assert_eq!(
            cfg.policy.priority(),
            Some(crate::config::Config::DEFAULT_PRIORITY)
        );
        assert_eq!(cfg.stack_size, crate::config::Config::DEFAULT_STACK_SIZE);
    }

    #[test]
    fn task_configuration_default_is_idempotent() {
        // L3: calling it twice yields equal configurations.
        let a = task_configuration_default();
        let b = task_configuration_default();
        assert_eq!(a.name, b.name);
        assert_eq!(a.stack_size, b.stack_size);
        assert_eq!(a.policy.priority(), b.policy.priority());
    }
}
