use crate::config::types::{LaunchError, Result};
/// Fork-safety and main-thread identity tracking
///
/// The host process records its main thread once at startup and installs
/// fork hooks so that code which is only safe on the original main thread,
/// or only in the original process, can check cheaply where it is running.
///
/// Call order at startup (single-threaded, before spawning any thread):
/// 1. `init_thread_id()`
/// 2. `setup_fork_handlers()`
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, ThreadId};

/// Thread that called `init_thread_id()`
static MAIN_THREAD_ID: OnceLock<ThreadId> = OnceLock::new();

/// Set in the child after fork; never reset
static WAS_FORKED: AtomicBool = AtomicBool::new(false);

/// Forks observed by the parent hook on the main thread
static FORKS_OBSERVED: AtomicU64 = AtomicU64::new(0);

/// Hooks the trampolines dispatch to; the first hooks offered for installation
static INSTALLED_HOOKS: OnceLock<&'static (dyn ForkHooks + Sync)> = OnceLock::new();

/// Set only once the platform has accepted the registration
static HOOKS_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Serializes installation attempts
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static IS_MAIN_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Reactions to the three points of a fork.
///
/// `on_forked_child` runs in the child of a possibly multi-threaded process
/// and must restrict itself to async-signal-safe work: no allocation, no
/// locks, no logging.
pub trait ForkHooks {
    fn on_pre_fork(&self);
    fn on_forked_parent(&self);
    fn on_forked_child(&self);
}

/// The process-wide tracker's fork reactions
pub struct ForkTracker;

static TRACKER: ForkTracker = ForkTracker;

impl ForkTracker {
    pub fn global() -> &'static ForkTracker {
        &TRACKER
    }
}

impl ForkHooks for ForkTracker {
    fn on_pre_fork(&self) {
        // Only forks from the main thread are tracked; other threads may be
        // racing with non-reentrant code owned by the main thread.
        if !sys_is_main_thread() {
            return;
        }
    }

    fn on_forked_parent(&self) {
        if !sys_is_main_thread() {
            return;
        }
        FORKS_OBSERVED.fetch_add(1, Ordering::Relaxed);
    }

    fn on_forked_child(&self) {
        WAS_FORKED.store(true, Ordering::SeqCst);
    }
}

/// Record the calling thread as the main thread.
///
/// Must run once, before other threads read tracker state.
pub fn init_thread_id() -> Result<()> {
    let current = thread::current().id();
    MAIN_THREAD_ID
        .set(current)
        .map_err(|_| LaunchError::AlreadyInitialized)?;
    IS_MAIN_THREAD.with(|flag| flag.set(true));
    log::debug!("Main thread recorded: {:?}", current);
    Ok(())
}

/// Identity comparison against the recorded main thread
fn sys_is_main_thread() -> bool {
    MAIN_THREAD_ID
        .get()
        .is_some_and(|main| *main == thread::current().id())
}

/// Whether the caller is on the thread that ran `init_thread_id()`.
///
/// Answers from the thread-local flag. The identity lookup is a consistency
/// check only: a mismatch is logged, never raised.
pub fn is_main_thread() -> bool {
    let flagged = IS_MAIN_THREAD.with(Cell::get);
    if flagged != sys_is_main_thread() {
        log::error!("isMainThread check - thread-local flag disagrees with thread identity");
    }
    flagged
}

/// Whether this process is a forked child of the process that installed the hooks
pub fn was_forked() -> bool {
    WAS_FORKED.load(Ordering::SeqCst)
}

/// Forks the parent hook has seen from the main thread
pub fn forks_observed() -> u64 {
    FORKS_OBSERVED.load(Ordering::Relaxed)
}

/// Install the tracker's fork hooks with the platform (idempotent)
pub fn setup_fork_handlers() -> Result<()> {
    install_fork_hooks(ForkTracker::global())
}

/// Whether fork hooks are registered with the platform
pub fn fork_hooks_installed() -> bool {
    HOOKS_REGISTERED.load(Ordering::SeqCst)
}

/// Register `hooks` around fork(). Only the first successful registration
/// takes effect; a failed one can be retried.
#[cfg(unix)]
pub fn install_fork_hooks(hooks: &'static (dyn ForkHooks + Sync)) -> Result<()> {
    install_with(hooks, register_trampolines)
}

/// No fork semantics: nothing to register, `was_forked()` stays false
#[cfg(not(unix))]
pub fn install_fork_hooks(hooks: &'static (dyn ForkHooks + Sync)) -> Result<()> {
    let _ = INSTALLED_HOOKS.set(hooks);
    Ok(())
}

#[cfg(unix)]
fn install_with(
    hooks: &'static (dyn ForkHooks + Sync),
    register: impl FnOnce() -> libc::c_int,
) -> Result<()> {
    let _guard = INSTALL_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if HOOKS_REGISTERED.load(Ordering::SeqCst) {
        log::debug!("Fork handlers already installed");
        return Ok(());
    }

    // The slot keeps the first hooks offered, even across a failed attempt.
    if INSTALLED_HOOKS.set(hooks).is_err() {
        log::debug!("Retrying fork handler registration with the original hooks");
    }

    let rc = register();
    if rc != 0 {
        let err = std::io::Error::from_raw_os_error(rc);
        log::error!("Failed to install fork handlers: {}", err);
        return Err(LaunchError::Process(format!(
            "pthread_atfork failed: {}",
            err
        )));
    }

    HOOKS_REGISTERED.store(true, Ordering::SeqCst);
    log::info!("Fork handlers installed");
    Ok(())
}

#[cfg(unix)]
fn register_trampolines() -> libc::c_int {
    unsafe {
        libc::pthread_atfork(
            Some(prepare_fork_trampoline),
            Some(at_fork_parent_trampoline),
            Some(at_fork_child_trampoline),
        )
    }
}

#[cfg(unix)]
unsafe extern "C" fn prepare_fork_trampoline() {
    if let Some(hooks) = INSTALLED_HOOKS.get() {
        hooks.on_pre_fork();
    }
}

#[cfg(unix)]
unsafe extern "C" fn at_fork_parent_trampoline() {
    if let Some(hooks) = INSTALLED_HOOKS.get() {
        hooks.on_forked_parent();
    }
}

#[cfg(unix)]
unsafe extern "C" fn at_fork_child_trampoline() {
    if let Some(hooks) = INSTALLED_HOOKS.get() {
        hooks.on_forked_child();
    }
}

/// Something that may own running child processes or tasks
pub trait ChildActivity {
    fn has_active_children(&self) -> bool;
}

impl<F: Fn() -> bool> ChildActivity for F {
    fn has_active_children(&self) -> bool {
        self()
    }
}

/// True if either the process supervisor or the authoring subsystem still
/// has running children
pub fn have_active_children(
    supervisor: &dyn ChildActivity,
    authoring: &dyn ChildActivity,
) -> bool {
    supervisor.has_active_children() || authoring.has_active_children()
}
