//! Ambient, dynamically scoped values.
//!
//! A [`ContextVar`] is a typed key into the current execution [`Context`].
//! Values are installed for the duration of a scope (a guard, a closure or
//! a future) and are visible to every log call made inside it. The context
//! is per thread, follows a future across polls when wrapped with
//! [`ContextFutureExt`], and is inherited by child tasks and threads started
//! through [`spawn`] and [`spawn_thread`].

use pin_project::pin_project;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::Poll;

type Slot = Arc<dyn Any + Send + Sync>;

static NEXT_KEY: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::default());
}

/// Immutable snapshot of every context variable visible at some point.
///
/// Cheap to clone; setting a variable produces a new snapshot and leaves
/// the old one untouched.
#[derive(Clone, Default)]
pub struct Context {
    vars: Arc<HashMap<usize, Slot>>,
}

impl Context {
    /// Snapshot of the calling thread's (or task's) context.
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    pub fn get<T: Send + Sync + 'static>(&self, var: &ContextVar<T>) -> Option<Arc<T>> {
        let slot = self.vars.get(&var.key())?.clone();
        slot.downcast::<T>().ok()
    }

    /// Copy of this context with `var` bound to `value`.
    pub fn with_value<T: Send + Sync + 'static>(&self, var: &ContextVar<T>, value: Arc<T>) -> Self {
        self.with_slot(var.key(), Some(value as Slot))
    }

    /// Copy of this context with `var` unbound.
    pub fn without<T: Send + Sync + 'static>(&self, var: &ContextVar<T>) -> Self {
        self.with_slot(var.key(), None)
    }

    fn with_slot(&self, key: usize, slot: Option<Slot>) -> Self {
        if slot.is_none() && !self.vars.contains_key(&key) {
            return self.clone();
        }
        let mut vars = (*self.vars).clone();
        match slot {
            Some(slot) => vars.insert(key, slot),
            None => vars.remove(&key),
        };
        Self {
            vars: Arc::new(vars),
        }
    }

    /// Make this the current context until the guard is dropped.
    pub fn enter(self) -> ContextGuard {
        ContextGuard::new(Restore::Snapshot(swap(self)))
    }

    /// Run `f` with this as the current context.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vars", &self.vars.len())
            .finish()
    }
}

fn swap(context: Context) -> Context {
    CURRENT.with(|current| current.replace(context))
}

/// Undoes one context change on drop.
///
/// A guard from [`ContextVar::set`] restores only the variable it set, so
/// guards of different variables may be dropped in any order. A guard from
/// [`Context::enter`] restores the whole previous snapshot. Guards belong
/// to the thread that created them, which is why they are not `Send`.
#[must_use = "the context is reset as soon as the guard is dropped"]
pub struct ContextGuard {
    restore: Option<Restore>,
    _not_send: PhantomData<*const ()>,
}

enum Restore {
    Snapshot(Context),
    Var { key: usize, previous: Option<Slot> },
}

impl ContextGuard {
    fn new(restore: Restore) -> Self {
        Self {
            restore: Some(restore),
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        // Thread-local may already be gone during thread teardown.
        let _ = CURRENT.try_with(|current| {
            let mut current = current.borrow_mut();
            *current = match restore {
                Restore::Snapshot(previous) => previous,
                Restore::Var { key, previous } => current.with_slot(key, previous),
            };
        });
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard").finish_non_exhaustive()
    }
}

/// Typed key into the ambient [`Context`].
///
/// Declared as a `static`; the key is allocated on first use.
///
/// ```
/// use tracing_record_formatter::context::ContextVar;
///
/// static REQUEST_ID: ContextVar<String> = ContextVar::new("request_id");
///
/// assert!(REQUEST_ID.get().is_none());
/// REQUEST_ID.scope("abc".to_string(), || {
///     assert_eq!(REQUEST_ID.get().as_deref().map(String::as_str), Some("abc"));
/// });
/// assert!(REQUEST_ID.get().is_none());
/// ```
pub struct ContextVar<T> {
    name: &'static str,
    key: OnceLock<usize>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ContextVar<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            key: OnceLock::new(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn key(&self) -> usize {
        *self
            .key
            .get_or_init(|| NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Current value, `None` outside of any scope that set it.
    pub fn get(&self) -> Option<Arc<T>> {
        CURRENT.with(|current| current.borrow().get(self))
    }

    pub fn set(&self, value: T) -> ContextGuard {
        self.set_arc(Arc::new(value))
    }

    pub fn set_arc(&self, value: Arc<T>) -> ContextGuard {
        let key = self.key();
        let previous = CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            let previous = current.vars.get(&key).cloned();
            *current = current.with_slot(key, Some(value as Slot));
            previous
        });
        ContextGuard::new(Restore::Var { key, previous })
    }

    pub fn scope<R>(&self, value: T, f: impl FnOnce() -> R) -> R {
        let _guard = self.set(value);
        f()
    }

    /// Bind `value` for every poll of `future`.
    pub fn scope_future<F: Future>(&self, value: T, future: F) -> WithContext<F> {
        future.with_context(Context::current().with_value(self, Arc::new(value)))
    }
}

impl<T> fmt::Debug for ContextVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextVar").field("name", &self.name).finish()
    }
}

/// Future that runs inside its own [`Context`].
///
/// Changes the wrapped future makes to the context persist across its
/// polls and never leak into whoever polls it.
#[pin_project]
#[derive(Debug)]
pub struct WithContext<F> {
    #[pin]
    inner: F,
    context: Option<Context>,
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let entered = this.context.take().unwrap_or_default();
        let restore = PollScope {
            slot: this.context,
            outer: Some(swap(entered)),
        };
        let result = this.inner.poll(cx);
        drop(restore);
        result
    }
}

/// Swaps the task's context back out after a poll, also on unwind.
struct PollScope<'a> {
    slot: &'a mut Option<Context>,
    outer: Option<Context>,
}

impl Drop for PollScope<'_> {
    fn drop(&mut self) {
        if let Some(outer) = self.outer.take() {
            *self.slot = Some(swap(outer));
        }
    }
}

pub trait ContextFutureExt: Future + Sized {
    fn with_context(self, context: Context) -> WithContext<Self> {
        WithContext {
            inner: self,
            context: Some(context),
        }
    }

    fn with_current_context(self) -> WithContext<Self> {
        self.with_context(Context::current())
    }
}

impl<F: Future> ContextFutureExt for F {}

/// Spawn a tokio task that inherits the caller's context.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.with_current_context())
}

/// Spawn an OS thread that inherits the caller's context.
pub fn spawn_thread<F, R>(f: F) -> std::thread::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let context = Context::current();
    std::thread::spawn(move || context.run(f))
}
