//! Scheduler core (C6).
//!
//! Holds the task pool and every scheduler queue as a single global
//! singleton, the same shape as the teacher's `static mut TASK_MANAGER`. All
//! mutation here happens either inside the tick ISR or with interrupts
//! disabled, which is what makes direct indexing into `tasks` safe without a
//! lock: the scheduler is never reentered.

use crate::config::{Config, TickCount};
use crate::context::InitialFrame;
use crate::diagnostics::{self, Event};
use crate::list::{List, Linked, NodeId};
use crate::memory::{BumpAllocator, OutOfMemory};
use crate::message::{Message, MessageParam};
use crate::mutex::Mutex;
use crate::ports::{ActivePort, Port, TickSource};
use crate::task::{Policy, Task, TaskConfiguration};

#[cfg(feature = "clock24")]
use crate::clock24::Clock24;

/// Opaque handle to a registered task, returned by [`register_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(NodeId);

/// Why [`register_task`] refused a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// A `CyclicRT` config had `period == 0`, `completion == 0`, or
    /// `completion > period`.
    BadCyclicConfig,
    /// The bump allocator couldn't satisfy the TCB + stack reservation.
    OutOfMemory,
}

impl From<OutOfMemory> for RegisterError {
    fn from(_: OutOfMemory) -> Self {
        RegisterError::OutOfMemory
    }
}

/// A misuse condition caused by a task, not by the kernel itself. Always
/// resolved by aborting the offending task; see [`misuse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    /// `task_wait_interrupt` was called with an id beyond `Config::MAX_IRQ`.
    InterruptIdOutOfRange(u8),
    /// A required out-pointer or handle (e.g. a C API mutex) was null.
    NullPointer,
}

const IRQ_QUEUE_COUNT: usize = Config::MAX_IRQ as usize + 1;

/// One extra task-pool slot reserved for the idle task, so `Config::MAX_TASKS`
/// reads as "how many application tasks you can register" rather than having
/// to leave headroom for the idle task by convention.
const TASK_POOL_SIZE: usize = Config::MAX_TASKS + 1;

/// The scheduler's singleton state.
pub struct Scheduler {
    tasks: [Task; TASK_POOL_SIZE],
    len: usize,
    current: Option<NodeId>,
    idle_task: Option<NodeId>,
    ready_cyclic: List,
    ready_priority: List,
    waiting_activation: List,
    waiting_interrupt: [List; IRQ_QUEUE_COUNT],
    waiting_timer: List,
    terminated: List,
    aborted: List,
    allocator: BumpAllocator,
    #[cfg(feature = "clock24")]
    clock: Clock24,
    #[cfg(test)]
    diagnostics: diagnostics::Ring,
}

impl Scheduler {
    fn new() -> Self {
        Scheduler {
            tasks: core::array::from_fn(|_| Task::placeholder()),
            len: 0,
            current: None,
            idle_task: None,
            ready_cyclic: List::new(),
            ready_priority: List::new(),
            waiting_activation: List::new(),
            waiting_interrupt: core::array::from_fn(|_| List::new()),
            waiting_timer: List::new(),
            terminated: List::new(),
            aborted: List::new(),
            allocator: BumpAllocator::new(0, TASK_POOL_SIZE * 256, Config::BREAK_STACK_GAP),
            #[cfg(feature = "clock24")]
            clock: Clock24::new(),
            #[cfg(test)]
            diagnostics: diagnostics::Ring::new(),
        }
    }

    fn insert_sorted_cyclic(list: &mut List, tasks: &mut [Task], id: NodeId) {
        let period = tasks[id].policy().period().expect("cyclic task");
        let mut anchor = None;
        for existing in list.for_each(tasks) {
            if tasks[existing].policy().period().expect("cyclic task") > period {
                anchor = Some(existing);
                break;
            }
        }
        match anchor {
            Some(a) => list.insert_before(tasks, a, id),
            None => list.append(tasks, id),
        }
    }

    fn insert_sorted_priority(list: &mut List, tasks: &mut [Task], id: NodeId) {
        let priority = tasks[id].policy().priority().expect("priority task");
        let mut anchor = None;
        for existing in list.for_each(tasks) {
            if tasks[existing].policy().priority().expect("priority task") < priority {
                anchor = Some(existing);
                break;
            }
        }
        match anchor {
            Some(a) => list.insert_before(tasks, a, id),
            None => list.append(tasks, id),
        }
    }

    /// Registers a new task. Fails the config validation of invariant 4 or
    /// the bump allocator's capacity before mutating any queue.
    pub fn register_task(
        &mut self,
        entry: fn(),
        config: TaskConfiguration,
    ) -> Result<TaskId, RegisterError> {
        if let Policy::CyclicRT { period, completion } = config.policy {
            if period == 0 || completion == 0 || completion > period {
                return Err(RegisterError::BadCyclicConfig);
            }
        }

        if self.len >= Config::MAX_TASKS {
            return Err(RegisterError::OutOfMemory);
        }

        let stack = self
            .allocator
            .reserve(config.stack_size + crate::task::CONTEXT_RESERVE_BYTES)?;
        let id = self.len;
        self.tasks[id] = Task::new(config.name, entry, stack, config.policy);
        self.len += 1;

        match config.policy {
            Policy::CyclicRT { .. } => {
                Self::insert_sorted_cyclic(&mut self.ready_cyclic, &mut self.tasks, id)
            }
            Policy::PriorityRT { .. } => {
                Self::insert_sorted_priority(&mut self.ready_priority, &mut self.tasks, id)
            }
        }

        Ok(TaskId(id))
    }

    /// Idempotent: safe to call every time `run()` starts. `register_task`
    /// caps `self.len` at `Config::MAX_TASKS`, and the pool holds
    /// `TASK_POOL_SIZE = Config::MAX_TASKS + 1` slots, so the idle task
    /// always has room regardless of how many application tasks registered.
    fn register_idle_task(&mut self) {
        if self.idle_task.is_some() {
            return;
        }
        let stack = self
            .allocator
            .reserve(Config::DEFAULT_STACK_SIZE + crate::task::CONTEXT_RESERVE_BYTES)
            .expect("idle task reservation must always succeed");
        let id = self.len;
        self.tasks[id] = Task::new(
            Some("idle"),
            idle_entry,
            stack,
            Policy::PriorityRT { priority: i16::MIN },
        );
        self.len += 1;
        self.idle_task = Some(id);
    }

    /// Election (4.6.1): the head of `ready[CyclicRT]`, else the head of
    /// `ready[PriorityRT]`, else the idle task. The elected task is detached
    /// from its queue (invariant 2: `current` is never enqueued).
    fn pick_task_to_run(&mut self) -> NodeId {
        if let Some(id) = self.ready_cyclic.pick_first(&mut self.tasks) {
            return id;
        }
        if let Some(id) = self.ready_priority.pick_first(&mut self.tasks) {
            return id;
        }
        self.idle_task.expect("idle task must be registered before scheduling")
    }

    /// `schedule()` (4.6.3). Called from the tick ISR with `current` already
    /// pointing at the task that was running when the tick fired.
    fn schedule(&mut self) {
        self.expire_software_timers();

        if self.current != self.idle_task {
            if let Some(id) = self.current {
                self.dispatch_current_message(id);
            }
        }

        self.advance_cyclic_tasks();

        self.current = Some(self.pick_task_to_run());
    }

    fn expire_software_timers(&mut self) {
        let Scheduler {
            waiting_timer,
            tasks,
            ready_priority,
            ..
        } = self;

        crate::list::removable_for_each(waiting_timer, tasks, |list, tasks, id| {
            tasks[id].time_until_timer_expiration =
                tasks[id].time_until_timer_expiration.saturating_sub(1);
            if tasks[id].time_until_timer_expiration == 0 {
                list.remove(tasks, id);
                Self::insert_sorted_priority(ready_priority, tasks, id);
            }
            true
        });
    }

    fn dispatch_current_message(&mut self, id: NodeId) {
        let (message, param) = self.tasks[id].message.take();

        match message {
            Message::None => self.requeue_by_policy(id, Message::None, MessageParam::None),
            Message::AbortTask => {
                self.aborted.append(&mut self.tasks, id);
                diagnostics::report(Event::Misuse("task aborted"));
            }
            Message::Terminate => {
                self.terminated.append(&mut self.tasks, id);
            }
            other => self.requeue_by_policy(id, other, param),
        }
    }

    fn requeue_by_policy(&mut self, id: NodeId, message: Message, param: MessageParam) {
        match self.tasks[id].policy() {
            Policy::CyclicRT { .. } => {
                self.tasks[id].time_until_completion =
                    self.tasks[id].time_until_completion.saturating_sub(1);
                if message == Message::WaitActivation || self.tasks[id].time_until_completion == 0
                {
                    self.waiting_activation.append(&mut self.tasks, id);
                } else {
                    Self::insert_sorted_cyclic(&mut self.ready_cyclic, &mut self.tasks, id);
                }
            }
            Policy::PriorityRT { .. } => match message {
                Message::WaitInterrupt => {
                    let irq = match param {
                        MessageParam::InterruptId(irq) => irq,
                        _ => unreachable!("WaitInterrupt always carries an InterruptId"),
                    };
                    if irq as usize >= self.waiting_interrupt.len() {
                        self.aborted.append(&mut self.tasks, id);
                        diagnostics::report(Event::Misuse("interrupt id out of range"));
                    } else {
                        self.waiting_interrupt[irq as usize].prepend(&mut self.tasks, id);
                    }
                }
                Message::WaitSoftwareTimer => {
                    let units = match param {
                        MessageParam::TimerUnits(units) => units,
                        _ => unreachable!("WaitSoftwareTimer always carries TimerUnits"),
                    };
                    if units == 0 {
                        Self::insert_sorted_priority(&mut self.ready_priority, &mut self.tasks, id);
                    } else {
                        self.tasks[id].time_until_timer_expiration = units;
                        self.waiting_timer.append(&mut self.tasks, id);
                    }
                }
                Message::WaitMutex => {
                    let mutex = match param {
                        MessageParam::Mutex(mutex) => mutex,
                        _ => unreachable!("WaitMutex always carries a Mutex reference"),
                    };
                    // SAFETY: called from inside `schedule()`, which only
                    // ever runs with interrupts disabled (tick ISR).
                    unsafe { mutex.waiters_mut() }.prepend(&mut self.tasks, id);
                }
                Message::None => {
                    Self::insert_sorted_priority(&mut self.ready_priority, &mut self.tasks, id);
                }
                Message::AbortTask | Message::Terminate => unreachable!("handled by caller"),
            },
        }
    }

    fn advance_cyclic_tasks(&mut self) {
        {
            let Scheduler {
                ready_cyclic, tasks, ..
            } = self;
            // Deadline-miss tasks stay in `ready_cyclic`; period never
            // changes so the sort order is unaffected.
            crate::list::removable_for_each(ready_cyclic, tasks, |_list, tasks, id| {
                tasks[id].time_until_activation =
                    tasks[id].time_until_activation.saturating_sub(1);
                if tasks[id].time_until_activation == 0 {
                    diagnostics::report(Event::DeadlineMiss {
                        task: tasks[id].name().unwrap_or("<unnamed>"),
                    });
                    let period = tasks[id].policy().period().expect("cyclic task");
                    tasks[id].time_until_activation = period;
                    if let Policy::CyclicRT { completion, .. } = tasks[id].policy() {
                        tasks[id].time_until_completion = completion;
                    }
                }
                true
            });
        }

        let Scheduler {
            waiting_activation,
            tasks,
            ready_cyclic,
            ..
        } = self;
        crate::list::removable_for_each(waiting_activation, tasks, |list, tasks, id| {
            tasks[id].time_until_activation = tasks[id].time_until_activation.saturating_sub(1);
            if tasks[id].time_until_activation == 0 {
                list.remove(tasks, id);
                let period = tasks[id].policy().period().expect("cyclic task");
                if let Policy::CyclicRT { completion, .. } = tasks[id].policy() {
                    tasks[id].time_until_completion = completion;
                }
                tasks[id].time_until_activation = period;
                Self::insert_sorted_cyclic(ready_cyclic, tasks, id);
            }
            true
        });
    }

    /// Tick handler (4.6.2), minus the context save/restore bookends which
    /// are the ISR prologue/epilogue's job, not the scheduler's.
    pub fn on_tick(&mut self) {
        #[cfg(feature = "clock24")]
        self.clock.advance();

        self.schedule();
    }

    /// `handle_clock_tick(saved_sp)` (4.6.2): records where the interrupted
    /// task's context landed, runs the tick handler, and returns the stack
    /// pointer of whichever task `schedule()` elected next. Called only from
    /// the tick ISR, after its prologue has pushed the interrupted task's
    /// full register file; the returned pointer is handed straight to
    /// `Port::restore_context_and_return_from_interrupt`.
    fn handle_clock_tick(&mut self, interrupted_sp: usize) -> usize {
        if let Some(id) = self.current {
            self.tasks[id].stack_pointer = interrupted_sp;
        }
        self.on_tick();
        self.tasks[self.current.expect("on_tick always elects a task")].stack_pointer
    }

    /// Interrupt wake path (4.6.4): drains `waiting_interrupt[id]` entirely
    /// into `ready[PriorityRT]`, preserving priority order.
    pub fn handle_interrupt(&mut self, id: u8) {
        if id as usize >= self.waiting_interrupt.len() {
            return;
        }
        let Scheduler {
            waiting_interrupt,
            tasks,
            ready_priority,
            ..
        } = self;
        let queue = &mut waiting_interrupt[id as usize];
        while let Some(task_id) = queue.pick_first(tasks) {
            Self::insert_sorted_priority(ready_priority, tasks, task_id);
        }
    }

    /// Mutex unlock wake path (4.6.5).
    pub(crate) fn wake_tasks_waiting_mutex(&mut self, mutex: &'static Mutex) {
        // SAFETY: called only from `mutex_unlock`, inside a
        // disable_interrupts/restore_interrupts bracket.
        let waiters = unsafe { mutex.waiters_mut() };
        while let Some(id) = waiters.pick_first(&mut self.tasks) {
            Self::insert_sorted_priority(&mut self.ready_priority, &mut self.tasks, id);
        }
    }

    /// `run()` (4.6.8): registers the idle task if needed, elects the first
    /// task, starts the tick, and dispatches. Never returns.
    pub fn run(&mut self) -> ! {
        self.register_idle_task();
        self.current = Some(self.pick_task_to_run());
        diagnostics::report(Event::Boot("scheduler starting"));

        ActivePort::init_tick(Config::TICK_FREQUENCY_HZ);
        ActivePort::start_tick();

        let sp = self.tasks[self.current.expect("current set above")].stack_pointer;
        // SAFETY: `sp` was just fabricated by `Task::new` for a task that
        // was never dispatched before; it points at a well-formed initial
        // frame.
        unsafe { ActivePort::restore_context_and_return_from_interrupt(sp) }
    }

    #[cfg(test)]
    fn queue_len(&self, select: impl Fn(&Self) -> &List) -> usize {
        select(self).len()
    }
}

fn idle_entry() {
    loop {
        if Config::IDLE_CPU_SLEEPS {
            ActivePort::sleep();
        }
    }
}

static mut SCHEDULER: Option<Scheduler> = None;

/// Accessor for the scheduler singleton.
///
/// # Safety
///
/// Lazuli is single-core and non-reentrant with respect to scheduler state:
/// every caller either runs inside the tick ISR or brackets its access with
/// `Port::disable_interrupts()`/`restore_interrupts()`, exactly as for any
/// other scheduler queue (see the concurrency model). That discipline, not
/// the type system, is what makes this safe.
pub(crate) fn scheduler() -> &'static mut Scheduler {
    unsafe {
        let s: *mut Option<Scheduler> = core::ptr::addr_of_mut!(SCHEDULER);
        (*s).get_or_insert_with(Scheduler::new)
    }
}

/// Registers a task with the global scheduler. See [`Scheduler::register_task`].
pub fn register_task(entry: fn(), config: TaskConfiguration) -> Result<TaskId, RegisterError> {
    scheduler().register_task(entry, config)
}

/// Starts the scheduler. Never returns. See [`Scheduler::run`].
pub fn run() -> ! {
    scheduler().run()
}

/// The tick ISR's entry point into the scheduler. See
/// [`Scheduler::handle_clock_tick`].
///
/// # Safety
///
/// Must be called only from the tick interrupt, after its prologue has
/// pushed the interrupted task's complete register file at `interrupted_sp`;
/// the returned pointer must be handed straight to
/// `Port::restore_context_and_return_from_interrupt` without running any
/// further code that could itself be preempted.
#[cfg(target_arch = "avr")]
pub(crate) unsafe fn on_tick_isr(interrupted_sp: usize) -> usize {
    scheduler().handle_clock_tick(interrupted_sp)
}

fn deposit_current_message(message: Message, param: MessageParam) {
    let sched = scheduler();
    if let Some(id) = sched.current {
        sched.tasks[id].message.deposit(message, param);
    }
}

fn sleep_until_end_of_time_slice() {
    loop {
        ActivePort::sleep();
        let sched = scheduler();
        let still_pending = sched
            .current
            .map(|id| sched.tasks[id].message.peek() != Message::None)
            .unwrap_or(false);
        if !still_pending {
            return;
        }
    }
}

/// Valid only for `CyclicRT`: parks until the next period.
pub fn task_wait_activation() {
    deposit_current_message(Message::WaitActivation, MessageParam::None);
    sleep_until_end_of_time_slice();
}

/// Valid only for `PriorityRT`: parks until interrupt `id` fires. An `id`
/// beyond `Config::MAX_IRQ` is a task misuse, resolved by the scheduler
/// aborting this task instead of actually parking it.
pub fn task_wait_interrupt(id: u8) {
    deposit_current_message(Message::WaitInterrupt, MessageParam::InterruptId(id));
    sleep_until_end_of_time_slice();
}

/// Valid only for `PriorityRT`: parks for approximately `units` ticks.
/// `units == 0` returns immediately (B2).
pub fn wait_timer(units: TickCount) {
    if units == 0 {
        return;
    }
    deposit_current_message(Message::WaitSoftwareTimer, MessageParam::TimerUnits(units));
    sleep_until_end_of_time_slice();
}

/// The calling task's own name, or `None` if it was registered without one.
pub fn task_get_name() -> Option<&'static str> {
    let sched = scheduler();
    sched.current.and_then(|id| sched.tasks[id].name())
}

/// Reads the kernel's 24-hour clock. Safe to call from any task context;
/// the lock-free optimistic read (C9) never blocks on the tick handler.
#[cfg(feature = "clock24")]
pub fn clock24_get() -> crate::clock24::TimeOfDay {
    scheduler().clock.get()
}

/// Ends the calling task. Never returns; the task never runs again.
pub fn task_terminate() -> ! {
    deposit_current_message(Message::Terminate, MessageParam::None);
    loop {
        ActivePort::sleep();
    }
}

/// Called by the scheduler itself on behalf of a task when it detects a
/// misuse condition originating from that task (§7, case 1). Diverges into
/// `abort_current_task`.
pub fn misuse(kind: Misuse) -> ! {
    diagnostics::report(Event::Misuse(match kind {
        Misuse::InterruptIdOutOfRange(_) => "interrupt id out of range",
        Misuse::NullPointer => "null pointer passed to a kernel API",
    }));
    abort_current_task()
}

fn abort_current_task() -> ! {
    deposit_current_message(Message::AbortTask, MessageParam::None);
    loop {
        ActivePort::sleep();
    }
}

/// Acquires `mutex`, blocking (by parking and re-trying across ticks) while
/// it is held by another task.
pub fn mutex_lock(mutex: &'static Mutex) {
    loop {
        if mutex.try_acquire() {
            return;
        }
        deposit_current_message(Message::WaitMutex, MessageParam::Mutex(mutex));
        sleep_until_end_of_time_slice();
    }
}

/// Releases `mutex` and wakes every task parked on it.
pub fn mutex_unlock(mutex: &'static Mutex) {
    let state = ActivePort::disable_interrupts();
    mutex.release();
    scheduler().wake_tasks_waiting_mutex(mutex);
    ActivePort::restore_interrupts(state);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Resets the global scheduler to a fresh, empty state. Every test that
    /// touches [`scheduler()`] must call this first and run under
    /// `#[sequential]`.
    pub fn reset() {
        unsafe {
            let s: *mut Option<Scheduler> = core::ptr::addr_of_mut!(SCHEDULER);
            *s = Some(Scheduler::new());
        }
    }

    pub fn diagnostics_ring() -> &'static mut diagnostics::Ring {
        &mut scheduler().diagnostics
    }

    pub fn ready_cyclic_len() -> usize {
        scheduler().queue_len(|s| &s.ready_cyclic)
    }

    pub fn ready_priority_len() -> usize {
        scheduler().queue_len(|s| &s.ready_priority)
    }

    pub fn waiting_activation_len() -> usize {
        scheduler().queue_len(|s| &s.waiting_activation)
    }

    pub fn waiting_timer_len() -> usize {
        scheduler().queue_len(|s| &s.waiting_timer)
    }

    pub fn terminated_len() -> usize {
        scheduler().queue_len(|s| &s.terminated)
    }

    pub fn aborted_len() -> usize {
        scheduler().queue_len(|s| &s.aborted)
    }

    pub fn waiting_interrupt_len(id: u8) -> usize {
        scheduler().waiting_interrupt[id as usize].len()
    }

    pub fn set_current(id: TaskId) {
        scheduler().current = Some(id.0);
    }

    pub fn current_is_idle() -> bool {
        let sched = scheduler();
        sched.current == sched.idle_task
    }

    pub fn deposit(id: TaskId, message: Message, param: MessageParam) {
        scheduler().tasks[id.0].message.deposit(message, param);
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use sequential_test::sequential;

    fn noop() {}

    fn cyclic(period: TickCount, completion: TickCount) -> TaskConfiguration {
        TaskConfiguration {
            name: Some("cyclic"),
            policy: Policy::CyclicRT { period, completion },
            stack_size: 32,
        }
    }

    fn priority(priority: i16) -> TaskConfiguration {
        TaskConfiguration {
            name: Some("priority"),
            policy: Policy::PriorityRT { priority },
            stack_size: 32,
        }
    }

    #[test]
    #[sequential]
    fn register_task_rejects_bad_cyclic_config() {
        reset();
        assert_eq!(
            register_task(noop, cyclic(0, 1)),
            Err(RegisterError::BadCyclicConfig)
        );
        assert_eq!(
            register_task(noop, cyclic(4, 0)),
            Err(RegisterError::BadCyclicConfig)
        );
        assert_eq!(
            register_task(noop, cyclic(4, 5)),
            Err(RegisterError::BadCyclicConfig)
        );
    }

    #[test]
    #[sequential]
    fn ready_queues_stay_sorted_on_registration() {
        // I3
        reset();
        register_task(noop, cyclic(12, 3)).unwrap();
        register_task(noop, cyclic(4, 1)).unwrap();
        register_task(noop, cyclic(6, 2)).unwrap();
        assert_eq!(ready_cyclic_len(), 3);

        register_task(noop, priority(5)).unwrap();
        register_task(noop, priority(15)).unwrap();
        register_task(noop, priority(10)).unwrap();
        assert_eq!(ready_priority_len(), 3);

        let sched = scheduler();
        let periods: std::vec::Vec<TickCount> = sched
            .ready_cyclic
            .for_each(&sched.tasks)
            .map(|id| sched.tasks[id].policy().period().unwrap())
            .collect();
        assert_eq!(periods, std::vec![4, 6, 12]);

        let priorities: std::vec::Vec<i16> = sched
            .ready_priority
            .for_each(&sched.tasks)
            .map(|id| sched.tasks[id].policy().priority().unwrap())
            .collect();
        assert_eq!(priorities, std::vec![15, 10, 5]);
    }

    #[test]
    #[sequential]
    fn wait_timer_zero_keeps_task_ready() {
        // B2
        reset();
        let id = register_task(noop, priority(0)).unwrap();
        set_current(id);
        deposit(id, Message::WaitSoftwareTimer, MessageParam::TimerUnits(0));
        scheduler().schedule();
        assert_eq!(ready_priority_len(), 1);
        assert_eq!(waiting_timer_len(), 0);
    }

    #[test]
    #[sequential]
    fn wait_timer_parks_then_wakes_after_expiration() {
        reset();
        let id = register_task(noop, priority(0)).unwrap();
        set_current(id);
        deposit(id, Message::WaitSoftwareTimer, MessageParam::TimerUnits(2));
        scheduler().schedule();
        assert_eq!(waiting_timer_len(), 1);

        scheduler().on_tick();
        assert_eq!(waiting_timer_len(), 1, "one tick remaining");

        scheduler().on_tick();
        assert_eq!(waiting_timer_len(), 0);
        assert_eq!(ready_priority_len(), 1);
    }

    #[test]
    #[sequential]
    fn wait_interrupt_out_of_range_aborts_the_task() {
        // B3
        reset();
        let id = register_task(noop, priority(0)).unwrap();
        set_current(id);
        deposit(
            id,
            Message::WaitInterrupt,
            MessageParam::InterruptId(Config::MAX_IRQ + 1),
        );
        scheduler().schedule();
        assert_eq!(aborted_len(), 1);
    }

    #[test]
    #[sequential]
    fn wait_interrupt_in_range_parks_then_handle_interrupt_wakes_it() {
        reset();
        let id = register_task(noop, priority(0)).unwrap();
        set_current(id);
        deposit(id, Message::WaitInterrupt, MessageParam::InterruptId(2));
        scheduler().schedule();
        assert_eq!(waiting_interrupt_len(2), 1);

        scheduler().handle_interrupt(2);
        assert_eq!(waiting_interrupt_len(2), 0);
        assert_eq!(ready_priority_len(), 1);
    }

    #[test]
    #[sequential]
    fn terminate_is_sticky() {
        // S6
        reset();
        let id = register_task(noop, priority(0)).unwrap();
        set_current(id);
        deposit(id, Message::Terminate, MessageParam::None);
        scheduler().schedule();
        assert_eq!(terminated_len(), 1);

        for _ in 0..1000 {
            scheduler().on_tick();
        }
        assert_eq!(terminated_len(), 1);
        assert!(current_is_idle() || scheduler().current != Some(id.0));
    }

    #[test]
    #[sequential]
    fn rate_monotonic_schedule_reports_a_deadline_miss_within_the_lcm_window() {
        // S3
        reset();
        register_task(noop, cyclic(4, 1)).unwrap();
        register_task(noop, cyclic(6, 2)).unwrap();
        register_task(noop, cyclic(12, 3)).unwrap();
        scheduler().register_idle_task();
        scheduler().current = scheduler().idle_task;

        let mut misses = 0usize;
        for _ in 0..12 {
            scheduler().on_tick();
        }
        for event in diagnostics_ring().recent() {
            if matches!(event, Event::DeadlineMiss { .. }) {
                misses += 1;
            }
        }
        assert!(misses >= 1, "expected at least one deadline miss in 12 ticks");
    }

    #[test]
    #[sequential]
    fn mutex_lock_and_unlock_round_trip_leaves_no_waiters() {
        // I4 / L1
        reset();
        static M: Mutex = Mutex::new();
        assert!(M.try_acquire());
        M.release();
        assert!(M.try_acquire());
        M.release();
    }

    #[test]
    #[sequential]
    fn a_registered_task_lives_in_exactly_one_queue() {
        // I1
        reset();
        let cyclic_id = register_task(noop, cyclic(4, 1)).unwrap();
        let priority_id = register_task(noop, priority(5)).unwrap();

        let sched = scheduler();
        let queues: [&List; 6] = [
            &sched.ready_cyclic,
            &sched.ready_priority,
            &sched.waiting_activation,
            &sched.waiting_timer,
            &sched.terminated,
            &sched.aborted,
        ];
        for id in [cyclic_id.0, priority_id.0] {
            let containing = queues
                .iter()
                .filter(|q| q.for_each(&sched.tasks).any(|n| n == id))
                .count();
            assert_eq!(containing, 1, "task {id} must be in exactly one queue");
        }
    }

    #[test]
    #[sequential]
    fn cyclic_counters_stay_within_their_period_and_completion_bounds() {
        // I2
        reset();
        register_task(noop, cyclic(4, 2)).unwrap();
        scheduler().register_idle_task();
        scheduler().current = scheduler().idle_task;

        for _ in 0..20 {
            scheduler().on_tick();
            let sched = scheduler();
            for id in sched
                .ready_cyclic
                .for_each(&sched.tasks)
                .chain(sched.waiting_activation.for_each(&sched.tasks))
                .collect::<std::vec::Vec<_>>()
            {
                let task = &sched.tasks[id];
                if let Policy::CyclicRT { period, completion } = task.policy {
                    assert!(task.time_until_activation <= period);
                    assert!(task.time_until_completion <= completion);
                }
            }
        }
    }

    #[test]
    #[sequential]
    fn task_get_name_reflects_the_current_task() {
        reset();
        let id = register_task(noop, priority(1)).unwrap();
        assert_eq!(task_get_name(), None);
        set_current(id);
        assert_eq!(task_get_name(), Some("priority"));
    }
}
