//! `extern "C"` surface for applications written in C (§6.1), enabled by
//! the `c-library` feature. Each function is a thin wrapper around the
//! matching Rust entry point; Rust-only types (`Policy`'s two variants,
//! `Result`) get flattened into C-friendly structs and booleans at the
//! boundary rather than exposed directly.

use core::ffi::{c_char, CStr};

use crate::config::Config;
use crate::mutex::Mutex;
use crate::task::{Policy, TaskConfiguration};

/// C-compatible mirror of [`TaskConfiguration`]. A tagged Rust enum has no
/// stable `repr(C)` layout with payload, so the two policies' fields sit
/// side by side and `is_cyclic` selects which half is meaningful, the usual
/// shape for a struct a C caller fills in by hand.
#[repr(C)]
pub struct CTaskConfiguration {
    /// Null, or a NUL-terminated, `'static`-lifetime name.
    pub name: *const c_char,
    pub is_cyclic: bool,
    pub period: u32,
    pub completion: u32,
    pub priority: i16,
    pub stack_size: usize,
}

unsafe fn name_from_c(ptr: *const c_char) -> Option<&'static str> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: caller contract (documented on every function taking a name)
    // is a NUL-terminated string living for the program's lifetime, exactly
    // like a C string literal.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// # Safety
/// `out`, if non-null, must point at writable, suitably aligned storage for
/// a [`CTaskConfiguration`].
#[no_mangle]
pub unsafe extern "C" fn task_configuration_default(out: *mut CTaskConfiguration) {
    if out.is_null() {
        return;
    }
    let cfg = crate::task_configuration_default();
    let filled = CTaskConfiguration {
        name: core::ptr::null(),
        is_cyclic: false,
        period: 0,
        completion: 0,
        priority: cfg.policy.priority().unwrap_or(0),
        stack_size: cfg.stack_size,
    };
    // SAFETY: `out` was just checked non-null; the caller owns the pointee.
    unsafe { out.write(filled) };
}

/// Registers a task. Returns `false` on a null config, bad cyclic config, or
/// out-of-memory, matching §6.1's boolean-success convention.
///
/// # Safety
///
/// `entry` is stored as a bare address and never invoked through a Rust
/// function pointer call, so the ABI mismatch between `extern "C" fn()` and
/// `fn()` is immaterial here; `config`, if non-null, must point at a valid
/// `CTaskConfiguration`.
#[no_mangle]
pub unsafe extern "C" fn register_task(
    entry: extern "C" fn(),
    config: *const CTaskConfiguration,
) -> bool {
    if config.is_null() {
        return false;
    }
    // SAFETY: checked non-null above; caller contract covers validity.
    let config = unsafe { &*config };
    let policy = if config.is_cyclic {
        Policy::CyclicRT {
            period: config.period,
            completion: config.completion,
        }
    } else {
        Policy::PriorityRT {
            priority: config.priority,
        }
    };
    // SAFETY: see `name_from_c`.
    let name = unsafe { name_from_c(config.name) };
    let rust_config = TaskConfiguration {
        name,
        policy,
        stack_size: config.stack_size,
    };
    // SAFETY: see function-level comment; the pointer value is never called
    // through this cast, only taken with `as usize` while fabricating the
    // task's initial stack frame.
    let entry: fn() = unsafe { core::mem::transmute(entry) };
    crate::register_task(entry, rust_config).is_ok()
}

#[no_mangle]
pub extern "C" fn run() -> ! {
    crate::run()
}

#[no_mangle]
pub extern "C" fn task_wait_activation() {
    crate::task_wait_activation();
}

#[no_mangle]
pub extern "C" fn task_wait_interrupt(id: u8) {
    crate::task_wait_interrupt(id);
}

#[no_mangle]
pub extern "C" fn wait_timer(units: u32) {
    crate::wait_timer(units);
}

#[no_mangle]
pub extern "C" fn task_terminate() -> ! {
    crate::task_terminate()
}

/// The current task's name, or null. The returned pointer is only a valid C
/// string if the name was registered as NUL-terminated; names are otherwise
/// borrowed `'static` bytes with no guaranteed trailing NUL.
#[no_mangle]
pub extern "C" fn task_get_name() -> *const c_char {
    match crate::task_get_name() {
        Some(name) => name.as_ptr() as *const c_char,
        None => core::ptr::null(),
    }
}

/// Opaque storage for a [`Mutex`] on the C side. `mutex_storage_size`/
/// `mutex_storage_align` let a C header size a static buffer without
/// depending on Rust's layout of `Mutex` itself.
#[repr(transparent)]
pub struct CMutex(Mutex);

#[no_mangle]
pub extern "C" fn mutex_storage_size() -> usize {
    core::mem::size_of::<CMutex>()
}

#[no_mangle]
pub extern "C" fn mutex_storage_align() -> usize {
    core::mem::align_of::<CMutex>()
}

/// # Safety
/// `out` must point at `mutex_storage_size()` bytes of writable, suitably
/// aligned storage with `'static` duration (a C global, not a stack local).
#[no_mangle]
pub unsafe extern "C" fn mutex_init(out: *mut CMutex) {
    if out.is_null() {
        return;
    }
    // SAFETY: see function-level comment.
    unsafe { out.write(CMutex(Mutex::new())) };
}

/// # Safety
/// Same contract as [`mutex_init`].
#[no_mangle]
pub unsafe extern "C" fn mutex_init_locked(out: *mut CMutex) {
    if out.is_null() {
        return;
    }
    // SAFETY: see function-level comment.
    unsafe { out.write(CMutex(Mutex::new_locked())) };
}

/// # Safety
/// `mutex` must have been initialized by [`mutex_init`]/[`mutex_init_locked`]
/// and have `'static` storage duration. Null is a misuse (§7 case 1) when
/// `Config::CHECK_NULL_PARAMETERS` is on; with the check compiled out, a
/// null pointer is undefined behavior, exactly as in the original kernel.
#[no_mangle]
pub unsafe extern "C" fn mutex_lock(mutex: *const CMutex) {
    if Config::CHECK_NULL_PARAMETERS && mutex.is_null() {
        crate::misuse(crate::Misuse::NullPointer);
    }
    // SAFETY: see function-level comment.
    let mutex: &'static Mutex = unsafe { &(*mutex).0 };
    crate::mutex_lock(mutex);
}

/// # Safety
/// Same contract as [`mutex_lock`].
#[no_mangle]
pub unsafe extern "C" fn mutex_unlock(mutex: *const CMutex) {
    if Config::CHECK_NULL_PARAMETERS && mutex.is_null() {
        crate::misuse(crate::Misuse::NullPointer);
    }
    // SAFETY: see function-level comment.
    let mutex: &'static Mutex = unsafe { &(*mutex).0 };
    crate::mutex_unlock(mutex);
}

/// # Safety
/// `out`, if non-null, must point at writable, suitably aligned storage for
/// a [`crate::clock24::TimeOfDay`].
#[cfg(feature = "clock24")]
#[no_mangle]
pub unsafe extern "C" fn clock24_get(out: *mut crate::clock24::TimeOfDay) {
    if out.is_null() {
        return;
    }
    // SAFETY: checked non-null above; caller owns the pointee.
    unsafe { out.write(crate::clock24_get()) };
}
