use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::Context;
use super::config::ContextConfig;
use super::gpu::GpuContext;
use crate::error::{Error, Result};

/// Every context that has not been destroyed. Thread state only holds weak
/// references, so a thread exiting never drops a device from inside its
/// thread-local destructors.
static LIVE: Mutex<Vec<Arc<GpuContext>>> = Mutex::new(Vec::new());

fn live() -> MutexGuard<'static, Vec<Arc<GpuContext>>> {
    LIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-thread context state.
#[derive(Default)]
struct ThreadContexts {
    current: Option<Weak<GpuContext>>,
    /// Contexts replaced by `make_context_current(Some(..))`, innermost last.
    saved: Vec<Option<Weak<GpuContext>>>,
    /// A host-owned context was shared on this thread.
    shared: bool,
}

impl ThreadContexts {
    fn push(&mut self, ctx: &Arc<GpuContext>) {
        let previous = self.current.replace(Arc::downgrade(ctx));
        self.saved.push(previous);
    }

    fn current(&self) -> Option<Arc<GpuContext>> {
        self.current.as_ref().and_then(Weak::upgrade)
    }
}

thread_local! {
    static CONTEXTS: RefCell<ThreadContexts> = RefCell::new(ThreadContexts::default());
}

fn register(ctx: GpuContext) -> Arc<GpuContext> {
    let ctx = Arc::new(ctx);
    live().push(Arc::clone(&ctx));
    ctx
}

/// Creates a runtime-owned context with the default configuration and makes
/// it current.
pub fn create_context() -> anyhow::Result<Context> {
    create_context_with(ContextConfig::default())
}

/// Creates a runtime-owned context and makes it current, pushing the
/// previously current one.
pub fn create_context_with(config: ContextConfig) -> anyhow::Result<Context> {
    let ctx = register(GpuContext::create(&config)?);
    CONTEXTS.with_borrow_mut(|t| t.push(&ctx));
    log::debug!("context {} created", ctx.id());
    Ok(Context::new(ctx))
}

/// Makes a host-owned device and queue the current context and switches this
/// thread to shared mode: resource/context affinity is no longer checked and
/// destroying the returned context leaves the device alive.
pub fn share_context(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Context {
    let ctx = register(GpuContext::shared(device, queue));
    CONTEXTS.with_borrow_mut(|t| {
        t.shared = true;
        t.push(&ctx);
    });
    log::debug!("context {} shared", ctx.id());
    Context::new(ctx)
}

/// `Some(ctx)` makes `ctx` current and remembers the previous one; `None`
/// restores whatever was current before the matching `Some` call.
pub fn make_context_current(ctx: Option<&Context>) {
    CONTEXTS.with_borrow_mut(|t| match ctx {
        Some(ctx) => t.push(&ctx.inner),
        None => t.current = t.saved.pop().flatten(),
    });
}

/// Invalidates `ctx` and removes it from this thread's current and saved
/// slots. No-op on `None`.
///
/// A context stays alive until it is destroyed, even after the thread that
/// created it exits.
pub fn destroy_context(ctx: Option<Context>) {
    let Some(ctx) = ctx else {
        return;
    };
    let id = ctx.inner.id();
    ctx.inner.destroy();
    let removed: Vec<_> = {
        let mut live = live();
        let (gone, kept): (Vec<_>, Vec<_>) = live.drain(..).partition(|c| c.id() == id);
        *live = kept;
        gone
    };
    drop(removed);
    CONTEXTS.with_borrow_mut(|t| {
        let target = Arc::as_ptr(&ctx.inner);
        let is_ctx = |slot: &Option<Weak<GpuContext>>| slot.as_ref().is_some_and(|c| c.as_ptr() == target);
        if is_ctx(&t.current) {
            t.current = None;
        }
        for slot in &mut t.saved {
            if is_ctx(slot) {
                *slot = None;
            }
        }
        if ctx.inner.is_shared() {
            t.shared = false;
        }
    });
}

/// The live context current on this thread, if any.
pub fn current_context() -> Option<Context> {
    CONTEXTS
        .with_borrow(ThreadContexts::current)
        .filter(|c| !c.is_destroyed())
        .map(Context::new)
}

/// The current context, creating a default one when none is current.
///
/// In shared mode nothing is created and this fails with
/// [`Error::NoContext`].
pub fn ensure_context() -> Result<Context> {
    if let Some(ctx) = current_context() {
        return Ok(ctx);
    }
    if CONTEXTS.with_borrow(|t| t.shared) {
        return Err(Error::NoContext);
    }
    log::info!("no current context, creating a default one");
    create_context().map_err(|e| Error::Device(format!("{e:#}")))
}

/// Checks that a resource created under `owner` may be used right now.
pub(crate) fn check_affinity(owner: &GpuContext, what: &'static str) -> Result<()> {
    if owner.is_destroyed() {
        return Err(Error::ContextDestroyed);
    }
    CONTEXTS.with_borrow(|t| {
        if t.shared {
            return Ok(());
        }
        match t.current() {
            Some(current) if current.id() == owner.id() => Ok(()),
            Some(_) => Err(Error::ForeignResource { what }),
            None => Err(Error::NoContext),
        }
    })
}

/// Whether resources of `a` and `b` may be used together. Always true in
/// shared mode, where affinity is not checked.
pub(crate) fn same_context(a: &GpuContext, b: &GpuContext) -> bool {
    a.id() == b.id() || CONTEXTS.with_borrow(|t| t.shared)
}
