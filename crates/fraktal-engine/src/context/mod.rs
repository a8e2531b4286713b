//! GPU context management.
//!
//! A context wraps a wgpu device and queue. Each thread has at most one
//! current context plus a stack of previously current ones:
//!
//! - [`create_context`] / [`create_context_with`] acquire a runtime-owned device
//! - [`share_context`] wraps a device owned by the host application
//! - [`make_context_current`] pushes (`Some`) or pops (`None`)
//!
//! Handles are `!Send`; a context is only ever used from the thread that
//! created it. A context lives until [`destroy_context`], whether or not a
//! handle to it is still held.

mod config;
mod current;
mod gpu;

use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

pub use config::ContextConfig;
pub use current::{
    create_context, create_context_with, current_context, destroy_context, ensure_context,
    make_context_current, share_context,
};

pub(crate) use current::{check_affinity, same_context};
pub(crate) use gpu::{GpuContext, next_id};

/// Handle to a GPU context.
#[derive(Clone)]
pub struct Context {
    pub(crate) inner: Arc<GpuContext>,
    _thread: PhantomData<Rc<()>>,
}

impl Context {
    pub(crate) fn new(inner: Arc<GpuContext>) -> Self {
        Self { inner, _thread: PhantomData }
    }

    /// Process-unique id of the context.
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    pub fn device(&self) -> &wgpu::Device {
        self.inner.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.inner.queue()
    }

    /// Adapter the device was created on; `None` for shared contexts.
    pub fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.inner.adapter_info()
    }

    pub fn is_shared(&self) -> bool {
        self.inner.is_shared()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Context {}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("shared", &self.is_shared())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
