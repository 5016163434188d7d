//! Task-to-scheduler message protocol (C7).
//!
//! A task never calls directly into code that needs interrupts disabled.
//! Instead it deposits a [`MessageParam`] (if the message carries one),
//! then stores a [`Message`] code into a single atomic word, then sleeps.
//! The scheduler, running in the tick ISR, loads that word once per tick,
//! and only if it is non-[`Message::None`] does it go on to read
//! `message_param` — exactly the ordering invariant 8 and §4.7 require.
//!
//! `message` is widened to a `portable_atomic::AtomicU8`, the same crate the
//! teacher depends on (under its `xtensa-esp32/hello-world` example's `auto`
//! feature) specifically to get a single-instruction atomic on targets that
//! don't guarantee one natively for the word size in question.

use core::cell::UnsafeCell;
use portable_atomic::{AtomicU8, Ordering};

use crate::config::TickCount;
use crate::mutex::Mutex;

/// A message a task deposits for the scheduler to act on at the next tick.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Nothing pending; fall through to the normal per-policy re-queue.
    None = 0,
    /// Cyclic task finished its work early this period.
    WaitActivation = 1,
    /// Park until the interrupt named in `message_param` fires.
    WaitInterrupt = 2,
    /// Park for the tick count named in `message_param`.
    WaitSoftwareTimer = 3,
    /// Park on the mutex named in `message_param`.
    WaitMutex = 4,
    /// The task is ending voluntarily.
    Terminate = 5,
    /// The kernel is killing the task following detected misuse.
    AbortTask = 6,
}

impl Message {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Message::None,
            1 => Message::WaitActivation,
            2 => Message::WaitInterrupt,
            3 => Message::WaitSoftwareTimer,
            4 => Message::WaitMutex,
            5 => Message::Terminate,
            6 => Message::AbortTask,
            _ => unreachable!("Message tag {} has no variant", tag),
        }
    }
}

/// The payload that accompanies a [`Message`], if any.
///
/// Holds a `'static` mutex reference rather than a raw pointer: every mutex
/// a task can wait on is a `'static` kernel object (a global, exactly as in
/// the C original, where mutexes are always statically allocated), so the
/// lifetime is free and the indirection stays safe.
#[derive(Debug, Clone, Copy)]
pub enum MessageParam {
    None,
    InterruptId(u8),
    TimerUnits(TickCount),
    Mutex(&'static Mutex),
}

/// The single-word channel a task uses to talk to the scheduler.
///
/// # Safety
///
/// `message_param` is a plain (non-atomic) cell. The task-side protocol
/// (`deposit`) writes it *before* publishing the atomic `message` tag with
/// `Release` ordering; the scheduler-side protocol (`take`) loads the tag
/// with `Acquire` ordering and only reads `message_param` when the tag is
/// non-[`Message::None`]. Because exactly one task ever calls `deposit` (the
/// task that owns this channel, about itself) and exactly one consumer ever
/// calls `take` (the scheduler, from the tick path), this handshake is race
/// free without needing `message_param` itself to be atomic.
pub struct MessageChannel {
    tag: AtomicU8,
    param: UnsafeCell<MessageParam>,
}

// SAFETY: see the struct-level safety comment: the single-writer /
// single-reader handshake through `tag` makes concurrent access to `param`
// impossible in practice, even though `UnsafeCell` is itself not `Sync`.
unsafe impl Sync for MessageChannel {}

impl MessageChannel {
    pub const fn new() -> Self {
        MessageChannel {
            tag: AtomicU8::new(Message::None as u8),
            param: UnsafeCell::new(MessageParam::None),
        }
    }

    /// Called by the owning task. Deposits `param` then publishes `message`.
    pub fn deposit(&self, message: Message, param: MessageParam) {
        debug_assert_ne!(message, Message::None, "None is never deposited by a task");
        // SAFETY: see struct-level comment; only the owning task writes here.
        unsafe { *self.param.get() = param };
        self.tag.store(message as u8, Ordering::Release);
    }

    /// Called by the scheduler. Reads the current message and, if it is not
    /// `None`, the parameter that goes with it, then resets the channel to
    /// `None` so the next tick observes nothing pending.
    pub fn take(&self) -> (Message, MessageParam) {
        let message = Message::from_tag(self.tag.load(Ordering::Acquire));
        let param = if message == Message::None {
            MessageParam::None
        } else {
            // SAFETY: see struct-level comment; only the scheduler reads
            // here, and only after observing a non-`None` tag published
            // with `Release` by the single owning task.
            unsafe { *self.param.get() }
        };
        self.tag.store(Message::None as u8, Ordering::Release);
        (message, param)
    }

    /// Peeks at the current message without consuming it. Used by the
    /// scheduler to decide how to react without losing the payload.
    pub fn peek(&self) -> Message {
        Message::from_tag(self.tag.load(Ordering::Acquire))
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_then_take_round_trips_payload() {
        let channel = MessageChannel::new();
        assert_eq!(channel.peek(), Message::None);

        channel.deposit(Message::WaitSoftwareTimer, MessageParam::TimerUnits(7));
        assert_eq!(channel.peek(), Message::WaitSoftwareTimer);

        let (message, param) = channel.take();
        assert_eq!(message, Message::WaitSoftwareTimer);
        match param {
            MessageParam::TimerUnits(units) => assert_eq!(units, 7),
            other => panic!("unexpected param {other:?}"),
        }

        // Invariant 8: scheduler's take() resets to None.
        assert_eq!(channel.peek(), Message::None);
    }

    #[test]
    fn take_on_empty_channel_yields_none_param() {
        let channel = MessageChannel::new();
        let (message, param) = channel.take();
        assert_eq!(message, Message::None);
        assert!(matches!(param, MessageParam::None));
    }
}
