//! Parameter setters.
//!
//! Every setter acts on the kernel in use (see [`super::run::use_kernel`]) and
//! takes the offset returned by [`super::get_param_offset`]. Offset `-1` is
//! ignored so a parameter the kernel does not use can be set unconditionally.
//! A type mismatch, or calling without a kernel in use, is logged and the
//! call has no effect.

use std::rc::Rc;

use fraktal_kernel::{ParamBinding, ValueType};

use super::run::active_kernel;
use crate::array::Array;
use crate::context::same_context;

fn set_value(what: &str, offset: i32, ty: ValueType, bytes: &[u8]) {
    if offset == -1 {
        return;
    }
    let Some(kernel) = active_kernel() else {
        log::warn!("{what}: no kernel in use");
        return;
    };
    let Some(slot) = kernel.program.param(offset) else {
        log::warn!("{what}: kernel has no parameter at offset {offset}");
        return;
    };
    match slot.binding {
        ParamBinding::Value { ty: declared, offset: at } if declared == ty => {
            let at = at as usize;
            kernel.uniforms.borrow_mut()[at..at + bytes.len()].copy_from_slice(bytes);
        }
        ParamBinding::Value { ty: declared, .. } => {
            log::warn!("{what}: `{}` is declared as {declared:?}, ignoring", slot.name);
        }
        ParamBinding::Array { .. } => {
            log::warn!("{what}: `{}` is an array parameter, ignoring", slot.name);
        }
    }
}

pub fn param_1f(offset: i32, x: f32) {
    set_value("param_1f", offset, ValueType::Float, bytemuck::bytes_of(&x));
}

pub fn param_2f(offset: i32, x: f32, y: f32) {
    set_value("param_2f", offset, ValueType::Vec2, bytemuck::cast_slice(&[x, y]));
}

pub fn param_3f(offset: i32, x: f32, y: f32, z: f32) {
    set_value("param_3f", offset, ValueType::Vec3, bytemuck::cast_slice(&[x, y, z]));
}

pub fn param_4f(offset: i32, x: f32, y: f32, z: f32, w: f32) {
    set_value("param_4f", offset, ValueType::Vec4, bytemuck::cast_slice(&[x, y, z, w]));
}

pub fn param_1i(offset: i32, x: i32) {
    set_value("param_1i", offset, ValueType::Int, bytemuck::bytes_of(&x));
}

pub fn param_2i(offset: i32, x: i32, y: i32) {
    set_value("param_2i", offset, ValueType::IVec2, bytemuck::cast_slice(&[x, y]));
}

pub fn param_3i(offset: i32, x: i32, y: i32, z: i32) {
    set_value("param_3i", offset, ValueType::IVec3, bytemuck::cast_slice(&[x, y, z]));
}

pub fn param_4i(offset: i32, x: i32, y: i32, z: i32, w: i32) {
    set_value("param_4i", offset, ValueType::IVec4, bytemuck::cast_slice(&[x, y, z, w]));
}

/// Sets a `mat4` from 16 column-major values.
pub fn param_matrix4f(offset: i32, m: &[f32; 16]) {
    set_value("param_matrix4f", offset, ValueType::Mat4, bytemuck::cast_slice(m));
}

/// Sets a `mat4` from 16 row-major values.
pub fn param_transpose_matrix4f(offset: i32, m: &[f32; 16]) {
    set_value("param_transpose_matrix4f", offset, ValueType::Mat4, bytemuck::cast_slice(&transpose(m)));
}

/// Binds `a` to an `array1D` / `array2D` parameter for subsequent runs.
///
/// The kernel keeps the array's buffer alive while it is bound.
pub fn param_array(offset: i32, a: &Array) {
    if offset == -1 {
        return;
    }
    let Some(kernel) = active_kernel() else {
        log::warn!("param_array: no kernel in use");
        return;
    };
    let Some(param) = kernel.program.param(offset) else {
        log::warn!("param_array: kernel has no parameter at offset {offset}");
        return;
    };
    let ParamBinding::Array { slot, channels, .. } = param.binding else {
        log::warn!("param_array: `{}` is a value parameter, ignoring", param.name);
        return;
    };
    if a.is_destroyed() {
        log::warn!("param_array: array for `{}` has been destroyed, ignoring", param.name);
        return;
    }
    if !same_context(&a.inner.context, &kernel.context) {
        log::warn!("param_array: array for `{}` belongs to another context, ignoring", param.name);
        return;
    }
    if a.channels() as u32 != channels {
        log::debug!(
            "param_array: `{}` declared with {channels} channel(s), array has {}",
            param.name,
            a.channels()
        );
    }
    kernel.arrays.borrow_mut()[slot as usize] = Some(Rc::clone(&a.inner));
}

fn transpose(m: &[f32; 16]) -> [f32; 16] {
    std::array::from_fn(|i| m[(i % 4) * 4 + i / 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let m: [f32; 16] = std::array::from_fn(|i| i as f32);
        let t = transpose(&m);
        assert_eq!(t[1], 4.0);
        assert_eq!(t[4], 1.0);
        assert_eq!(t[15], 15.0);
        assert_eq!(transpose(&t), m);
    }

    #[test]
    fn setters_without_kernel_are_ignored() {
        param_1f(0, 1.0);
        param_4i(3, 1, 2, 3, 4);
        param_matrix4f(-1, &[0.0; 16]);
    }
}
