//! GPU runtime for fraktal kernels.
//!
//! This crate owns the wgpu side: contexts, arrays, linked kernels and their
//! dispatch. Kernel source is compiled and linked by `fraktal-kernel`.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`context`] | `Context`, `ContextConfig`, per-thread current context stack |
//! | [`array`] | `Array`, creation, zeroing, readback, introspection |
//! | [`kernel`] | `Kernel`, linking, parameter setters, `run_kernel` |
//! | [`diagnostics`] | shared compile/link log |
//! | [`error`] | `Error`, `Result` |
//! | [`ffi`] | `extern "C"` surface |
//! | [`logging`] | `env_logger` setup |
//!
//! # Quick start
//!
//! ```no_run
//! use fraktal_engine::*;
//!
//! let _ctx = create_context()?;
//! let mut link = create_link();
//! add_link_data(&mut link, "#param(float, c)\n#out(float, y)\nfn main() { y = c; }", None)?;
//! let kernel = link_kernel(&mut link)?;
//!
//! let out = create_array(None, 16, 0, 1, ArrayFormat::Float, AccessMode::ReadWrite)?;
//! use_kernel(Some(&kernel));
//! param_1f(kernel.param_offset("c"), 0.5);
//! run_kernel(&out)?;
//! run_kernel(&out)?;
//!
//! let mut bytes = vec![0; out.byte_size()];
//! to_cpu(&mut bytes, &out)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod array;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod kernel;
pub mod logging;

pub use array::{
    AccessMode, Array, ArrayDesc, ArrayFormat, array_access, array_byte_size, array_channels, array_format,
    array_size, create_array, destroy_array, is_valid_array, to_cpu, zero_array,
};
pub use context::{
    Context, ContextConfig, create_context, create_context_with, current_context, destroy_context, ensure_context,
    make_context_current, share_context,
};
pub use error::{Error, Result};
pub use fraktal_kernel::LinkState;
pub use kernel::link::{add_link_data, add_link_file, create_link, destroy_link, link_kernel, load_kernel};
pub use kernel::params::{
    param_1f, param_1i, param_2f, param_2i, param_3f, param_3i, param_4f, param_4i, param_array, param_matrix4f,
    param_transpose_matrix4f,
};
pub use kernel::run::{run_kernel, run_kernel_targets, use_kernel};
pub use kernel::{Kernel, destroy_kernel, get_param_offset};
