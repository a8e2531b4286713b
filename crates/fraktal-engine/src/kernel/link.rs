//! Link state wrappers that report failures to the diagnostic log.

use std::path::Path;
use std::rc::Rc;

use fraktal_kernel::LinkState;

use super::{Kernel, KernelInner};
use crate::context::ensure_context;
use crate::diagnostics;
use crate::error::Result;

pub fn create_link() -> LinkState {
    LinkState::new()
}

/// Compiles `source` and appends it to `link`. The text is copied.
///
/// A failure is logged and marks `link` as failed, so the next
/// [`link_kernel`] fails too.
pub fn add_link_data(link: &mut LinkState, source: &str, name: Option<&str>) -> Result<()> {
    link.add_source(source, name).map_err(|e| {
        diagnostics::push(e.to_string());
        e.into()
    })
}

/// Like [`add_link_data`], reading the fragment from `path`.
pub fn add_link_file(link: &mut LinkState, path: impl AsRef<Path>) -> Result<()> {
    link.add_file(path).map_err(|e| {
        diagnostics::push(e.to_string());
        e.into()
    })
}

/// Links every fragment added so far into a kernel on the current context.
///
/// The fragments are consumed either way; `link` can be reused.
pub fn link_kernel(link: &mut LinkState) -> Result<Kernel> {
    let program = link.link().map_err(|e| {
        diagnostics::push(format!("link failed: {e}"));
        e
    })?;
    let inner = KernelInner::build(ensure_context()?.inner, program);
    log::debug!(
        "kernel {}: {} param(s), {} output(s)",
        inner.id,
        inner.program.params().len(),
        inner.program.outputs().len()
    );
    Ok(Kernel { inner: Rc::new(inner) })
}

/// Drops a link state. No-op on `None`.
pub fn destroy_link(link: Option<LinkState>) {
    drop(link);
}

/// Compiles and links a single file.
pub fn load_kernel(path: impl AsRef<Path>) -> Result<Kernel> {
    let mut link = create_link();
    add_link_file(&mut link, path)?;
    link_kernel(&mut link)
}
