//! C API.
//!
//! Handles are boxed and passed as opaque pointers. Every `destroy` function
//! accepts `NULL`; introspection returns sentinels on `NULL` (size `-1, -1`,
//! format `-1`, channels `0`). Failing calls return `NULL`, `false` or `-1`
//! and leave a message for `fraktal_last_error`.
//!
//! Symbols follow `fraktal.h`. Calls that are `void` there return a status
//! here (`0` or `-1`), which C callers may ignore. `fraktal_array_access`,
//! `fraktal_last_error`, `fraktal_get_log` and `fraktal_clear_log` are
//! additions.
//!
//! There is no C counterpart of [`crate::share_context`]: sharing needs a
//! `wgpu::Device`, which only Rust hosts have.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;

use fraktal_kernel::LinkState;

use crate::array::{self, AccessMode, Array, ArrayFormat};
use crate::context::{self, Context};
use crate::kernel::{self, Kernel, link, params, run};
use crate::{diagnostics, error::Error};

pub const FRAKTAL_READ_ONLY: c_int = 0;
pub const FRAKTAL_READ_WRITE: c_int = 1;
pub const FRAKTAL_FLOAT: c_int = 2;
pub const FRAKTAL_UINT8: c_int = 3;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static LOG_COPY: RefCell<CString> = RefCell::new(CString::default());
}

fn c_string(msg: &str) -> CString {
    CString::new(msg.replace('\0', " ")).unwrap_or_default()
}

fn write_error(msg: impl std::fmt::Display) {
    let msg = msg.to_string();
    LAST_ERROR.with_borrow_mut(|slot| *slot = Some(c_string(&msg)));
}

fn clear_error() {
    LAST_ERROR.with_borrow_mut(|slot| *slot = None);
}

fn boxed<T>(result: Result<T, impl std::fmt::Display>) -> *mut T {
    match result {
        Ok(v) => Box::into_raw(Box::new(v)),
        Err(e) => {
            write_error(e);
            ptr::null_mut()
        }
    }
}

fn status(result: crate::Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            write_error(e);
            -1
        }
    }
}

/// # Safety
///
/// `p` must be `NULL` or a pointer obtained from this API and not yet destroyed.
unsafe fn handle<'a, T>(p: *const T) -> Option<&'a T> {
    unsafe { p.as_ref() }
}

/// # Safety
///
/// `s` must be `NULL` or a NUL-terminated string.
unsafe fn text<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s) }.to_str().ok()
}

fn format_from_c(v: c_int) -> Option<ArrayFormat> {
    match v {
        FRAKTAL_FLOAT => Some(ArrayFormat::Float),
        FRAKTAL_UINT8 => Some(ArrayFormat::Uint8),
        _ => None,
    }
}

fn access_from_c(v: c_int) -> Option<AccessMode> {
    match v {
        FRAKTAL_READ_ONLY => Some(AccessMode::ReadOnly),
        FRAKTAL_READ_WRITE => Some(AccessMode::ReadWrite),
        _ => None,
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────

/// Message of the last failed call on this thread, or `NULL`.
#[unsafe(no_mangle)]
pub extern "C" fn fraktal_last_error() -> *const c_char {
    LAST_ERROR.with_borrow(|slot| slot.as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

/// The compile/link diagnostic log. Valid until the next call on this thread.
#[unsafe(no_mangle)]
pub extern "C" fn fraktal_get_log() -> *const c_char {
    let log = c_string(&diagnostics::contents());
    LOG_COPY.with_borrow_mut(|copy| {
        *copy = log;
        copy.as_ptr()
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_clear_log() {
    diagnostics::clear();
}

// ── Contexts ──────────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_create_context() -> *mut Context {
    clear_error();
    boxed(context::create_context().map_err(|e| format!("{e:#}")))
}

/// # Safety
///
/// `ctx` must be `NULL` or a live context from [`fraktal_create_context`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_destroy_context(ctx: *mut Context) {
    if !ctx.is_null() {
        context::destroy_context(Some(*unsafe { Box::from_raw(ctx) }));
    }
}

/// `NULL` restores the previously current context.
///
/// # Safety
///
/// `ctx` must be `NULL` or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_make_context_current(ctx: *const Context) {
    context::make_context_current(unsafe { handle(ctx) });
}

// ── Arrays ────────────────────────────────────────────────────────────────

/// # Safety
///
/// `data` must be `NULL` or point to `width * max(height,1) * channels`
/// values of `format`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_create_array(
    data: *const c_void,
    width: c_int,
    height: c_int,
    channels: c_int,
    format: c_int,
    access: c_int,
) -> *mut Array {
    clear_error();
    let (Some(format), Some(access)) = (format_from_c(format), access_from_c(access)) else {
        write_error(Error::InvalidArray(format!("bad format {format} or access {access}")));
        return ptr::null_mut();
    };
    let desc = array::ArrayDesc { width, height, channels, format, access };
    if !desc.is_valid() {
        return boxed(array::create_array(None, width, height, channels, format, access));
    }
    let bytes = (!data.is_null())
        .then(|| unsafe { std::slice::from_raw_parts(data.cast::<u8>(), desc.byte_size()) });
    boxed(array::create_array(bytes, width, height, channels, format, access))
}

/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_destroy_array(a: *mut Array) {
    if !a.is_null() {
        array::destroy_array(Some(*unsafe { Box::from_raw(a) }));
    }
}

/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_zero_array(a: *const Array) -> c_int {
    clear_error();
    let Some(a) = (unsafe { handle(a) }) else {
        write_error("fraktal_zero_array: null array");
        return -1;
    };
    status(array::zero_array(a))
}

/// # Safety
///
/// `dst` must have room for the array's byte size.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_to_cpu(dst: *mut c_void, a: *const Array) -> c_int {
    clear_error();
    let Some(a) = (unsafe { handle(a) }) else {
        write_error("fraktal_to_cpu: null array");
        return -1;
    };
    if dst.is_null() {
        write_error("fraktal_to_cpu: null destination");
        return -1;
    }
    let dst = unsafe { std::slice::from_raw_parts_mut(dst.cast::<u8>(), a.byte_size()) };
    status(array::to_cpu(dst, a))
}

/// # Safety
///
/// `a` must be `NULL` or a live array; `width`/`height` may be `NULL`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_array_size(a: *const Array, width: *mut c_int, height: *mut c_int) {
    let (w, h) = array::array_size(unsafe { handle(a) });
    unsafe {
        if let Some(width) = width.as_mut() {
            *width = w;
        }
        if let Some(height) = height.as_mut() {
            *height = h;
        }
    }
}

/// `FRAKTAL_FLOAT`, `FRAKTAL_UINT8`, or `-1` on `NULL`.
///
/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_array_format(a: *const Array) -> c_int {
    match array::array_format(unsafe { handle(a) }) {
        Some(ArrayFormat::Float) => FRAKTAL_FLOAT,
        Some(ArrayFormat::Uint8) => FRAKTAL_UINT8,
        None => -1,
    }
}

/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_array_access(a: *const Array) -> c_int {
    match array::array_access(unsafe { handle(a) }) {
        Some(AccessMode::ReadOnly) => FRAKTAL_READ_ONLY,
        Some(AccessMode::ReadWrite) => FRAKTAL_READ_WRITE,
        None => -1,
    }
}

/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_array_channels(a: *const Array) -> c_int {
    array::array_channels(unsafe { handle(a) })
}

/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_is_valid_array(a: *const Array) -> bool {
    array::is_valid_array(unsafe { handle(a) })
}

// ── Linking ───────────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_create_link() -> *mut LinkState {
    Box::into_raw(Box::new(link::create_link()))
}

/// # Safety
///
/// `link` must be `NULL` or a live link state.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_destroy_link(link: *mut LinkState) {
    if !link.is_null() {
        link::destroy_link(Some(*unsafe { Box::from_raw(link) }));
    }
}

/// Adds `size` bytes of kernel source; `name` may be `NULL`. A `size` of 0
/// reads `data` up to its NUL terminator.
///
/// # Safety
///
/// `link` must be a live link state, `data` must hold `size` bytes (or be
/// NUL-terminated when `size` is 0) and `name` must be `NULL` or
/// NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_add_link_data(
    link: *mut LinkState,
    data: *const c_char,
    size: usize,
    name: *const c_char,
) -> bool {
    clear_error();
    let Some(link) = (unsafe { link.as_mut() }) else {
        write_error("fraktal_add_link_data: null link");
        return false;
    };
    if data.is_null() {
        write_error("fraktal_add_link_data: null data");
        return false;
    }
    let bytes = match size {
        0 => unsafe { CStr::from_ptr(data) }.to_bytes(),
        _ => unsafe { std::slice::from_raw_parts(data.cast::<u8>(), size) },
    };
    let source = String::from_utf8_lossy(bytes);
    let name = unsafe { text(name) };
    match link::add_link_data(link, &source, name) {
        Ok(()) => true,
        Err(e) => {
            write_error(e);
            false
        }
    }
}

/// # Safety
///
/// `link` must be a live link state and `path` NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_add_link_file(link: *mut LinkState, path: *const c_char) -> bool {
    clear_error();
    let (Some(link), Some(path)) = (unsafe { link.as_mut() }, unsafe { text(path) }) else {
        write_error("fraktal_add_link_file: null link or path");
        return false;
    };
    match link::add_link_file(link, path) {
        Ok(()) => true,
        Err(e) => {
            write_error(e);
            false
        }
    }
}

/// # Safety
///
/// `link` must be a live link state.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_link_kernel(link: *mut LinkState) -> *mut Kernel {
    clear_error();
    let Some(link) = (unsafe { link.as_mut() }) else {
        write_error("fraktal_link_kernel: null link");
        return ptr::null_mut();
    };
    boxed(link::link_kernel(link))
}

/// # Safety
///
/// `path` must be NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_load_kernel(path: *const c_char) -> *mut Kernel {
    clear_error();
    let Some(path) = (unsafe { text(path) }) else {
        write_error("fraktal_load_kernel: null path");
        return ptr::null_mut();
    };
    boxed(link::load_kernel(path))
}

/// # Safety
///
/// `kernel` must be `NULL` or a live kernel.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_destroy_kernel(kernel: *mut Kernel) {
    if !kernel.is_null() {
        kernel::destroy_kernel(Some(*unsafe { Box::from_raw(kernel) }));
    }
}

/// # Safety
///
/// `kernel` must be `NULL` or a live kernel; `name` NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_get_param_offset(kernel: *const Kernel, name: *const c_char) -> c_int {
    match unsafe { text(name) } {
        Some(name) => kernel::get_param_offset(unsafe { handle(kernel) }, name),
        None => -1,
    }
}

// ── Running ───────────────────────────────────────────────────────────────

/// # Safety
///
/// `kernel` must be `NULL` or a live kernel.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_use_kernel(kernel: *const Kernel) {
    run::use_kernel(unsafe { handle(kernel) });
}

/// # Safety
///
/// `out` must be a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_run_kernel(out: *const Array) -> c_int {
    clear_error();
    let Some(out) = (unsafe { handle(out) }) else {
        write_error("fraktal_run_kernel: null target");
        return -1;
    };
    status(run::run_kernel(out))
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_1f(offset: c_int, x: f32) {
    params::param_1f(offset, x);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_2f(offset: c_int, x: f32, y: f32) {
    params::param_2f(offset, x, y);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_3f(offset: c_int, x: f32, y: f32, z: f32) {
    params::param_3f(offset, x, y, z);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_4f(offset: c_int, x: f32, y: f32, z: f32, w: f32) {
    params::param_4f(offset, x, y, z, w);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_1i(offset: c_int, x: c_int) {
    params::param_1i(offset, x);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_2i(offset: c_int, x: c_int, y: c_int) {
    params::param_2i(offset, x, y);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_3i(offset: c_int, x: c_int, y: c_int, z: c_int) {
    params::param_3i(offset, x, y, z);
}

#[unsafe(no_mangle)]
pub extern "C" fn fraktal_param_4i(offset: c_int, x: c_int, y: c_int, z: c_int, w: c_int) {
    params::param_4i(offset, x, y, z, w);
}

/// # Safety
///
/// `m` must point to 16 floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_param_matrix4f(offset: c_int, m: *const [f32; 16]) {
    if let Some(m) = unsafe { m.as_ref() } {
        params::param_matrix4f(offset, m);
    }
}

/// # Safety
///
/// `m` must point to 16 floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_param_transpose_matrix4f(offset: c_int, m: *const [f32; 16]) {
    if let Some(m) = unsafe { m.as_ref() } {
        params::param_transpose_matrix4f(offset, m);
    }
}

/// Binds `a` to an array parameter. `tex_unit` is accepted for source
/// compatibility and ignored: each array parameter has its own binding slot.
///
/// # Safety
///
/// `a` must be `NULL` or a live array.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fraktal_param_array(offset: c_int, _tex_unit: c_int, a: *const Array) {
    match unsafe { handle(a) } {
        Some(a) => params::param_array(offset, a),
        None => log::warn!("fraktal_param_array: null array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles() {
        unsafe {
            fraktal_destroy_array(ptr::null_mut());
            fraktal_destroy_kernel(ptr::null_mut());
            fraktal_destroy_link(ptr::null_mut());
            fraktal_destroy_context(ptr::null_mut());
            let (mut w, mut h) = (0, 0);
            fraktal_array_size(ptr::null(), &mut w, &mut h);
            assert_eq!((w, h), (-1, -1));
            assert_eq!(fraktal_array_format(ptr::null()), -1);
            assert_eq!(fraktal_array_access(ptr::null()), -1);
            assert_eq!(fraktal_array_channels(ptr::null()), 0);
            assert!(!fraktal_is_valid_array(ptr::null()));
            assert_eq!(fraktal_get_param_offset(ptr::null(), c"x".as_ptr()), -1);
            assert_eq!(fraktal_run_kernel(ptr::null()), -1);
            assert!(!fraktal_last_error().is_null());
        }
    }

    #[test]
    fn bad_format_is_rejected_before_touching_the_device() {
        let a = unsafe { fraktal_create_array(ptr::null(), 4, 0, 1, 7, FRAKTAL_READ_WRITE) };
        assert!(a.is_null());
        let msg = unsafe { CStr::from_ptr(fraktal_last_error()) };
        assert!(msg.to_string_lossy().contains("bad format 7"));
    }

    #[test]
    fn link_errors_reach_the_log() {
        let link = fraktal_create_link();
        let src = "#bogus(1)\n";
        let ok = unsafe { fraktal_add_link_data(link, src.as_ptr().cast(), src.len(), c"bad.f".as_ptr()) };
        assert!(!ok);
        let log = unsafe { CStr::from_ptr(fraktal_get_log()) };
        assert!(log.to_string_lossy().contains("bad.f:1:"));
        unsafe { fraktal_destroy_link(link) };
    }

    #[test]
    fn zero_size_reads_to_the_terminator() {
        let link = fraktal_create_link();
        let ok = unsafe {
            fraktal_add_link_data(link, c"#out(float, r)\nfn main() { r = 1.0; }\n".as_ptr(), 0, ptr::null())
        };
        assert!(ok);
        let program = unsafe { &mut *link }.link().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(program.outputs().len(), 1);
        unsafe { fraktal_destroy_link(link) };
    }

    #[test]
    fn explicit_size_stops_early() {
        let link = fraktal_create_link();
        let src = c"#out(float, r)\nfn main() { r = 1.0; }\n#bogus(1)\n";
        let len = "#out(float, r)\nfn main() { r = 1.0; }\n".len();
        assert!(unsafe { fraktal_add_link_data(link, src.as_ptr(), len, ptr::null()) });
        assert!(unsafe { &mut *link }.link().is_ok());
        unsafe { fraktal_destroy_link(link) };
    }

    #[test]
    fn param_array_ignores_texture_unit() {
        // No kernel in use and no array: both are ignored without effect.
        unsafe { fraktal_param_array(0, 3, ptr::null()) };
    }
}
