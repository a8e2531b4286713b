//! A linked kernel program and its parameter table.

use crate::compiler::OutputDecl;
use crate::types::{ArrayKind, ValueType};

/// Entry point used for 1D grids (`height == 0`).
pub const ENTRY_1D: &str = "fraktal_main_1d";
/// Entry point used for 2D grids.
pub const ENTRY_2D: &str = "fraktal_main_2d";
/// Workgroup size of [`ENTRY_1D`].
pub const WORKGROUP_1D: u32 = 64;
/// Workgroup edge of [`ENTRY_2D`] (square).
pub const WORKGROUP_2D: u32 = 8;
/// Binding of the uniform block.
pub const UNIFORM_BINDING: u32 = 0;
/// Storage bindings (outputs + arrays) a kernel may use. Matches the
/// default `max_storage_buffers_per_shader_stage` of wgpu.
pub const MAX_STORAGE_BINDINGS: usize = 8;

/// Where a parameter's value goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBinding {
    /// Bytes inside the uniform block.
    Value { ty: ValueType, offset: u32 },
    /// A storage buffer binding; `slot` indexes the kernel's arrays and
    /// `info_offset` locates its `(width, height, channels)` in the
    /// uniform block.
    Array { kind: ArrayKind, channels: u32, slot: u32, info_offset: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub binding: ParamBinding,
}

/// Output of a successful link.
///
/// Parameter offsets are indices into [`Program::params`]; they are stable
/// for the lifetime of the program.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) source: String,
    pub(crate) params: Vec<ParamSlot>,
    pub(crate) outputs: Vec<OutputDecl>,
    pub(crate) array_count: usize,
    pub(crate) target_info_offsets: Vec<u32>,
    pub(crate) uniform_size: u32,
}

impl Program {
    /// The combined, validated WGSL module.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Offset of a used parameter, or -1 if it is undeclared or unused.
    pub fn param_offset(&self, name: &str) -> i32 {
        self.params
            .iter()
            .position(|p| p.name == name)
            .map_or(-1, |i| i as i32)
    }

    pub fn param(&self, offset: i32) -> Option<&ParamSlot> {
        usize::try_from(offset).ok().and_then(|i| self.params.get(i))
    }

    /// Declared outputs, in target order.
    pub fn outputs(&self) -> &[OutputDecl] {
        &self.outputs
    }

    pub fn array_count(&self) -> usize {
        self.array_count
    }

    /// Size of the uniform block in bytes (a multiple of 16).
    pub fn uniform_size(&self) -> u32 {
        self.uniform_size
    }

    /// Offset of the `(width, height, dims, 0)` grid vector.
    pub fn grid_offset(&self) -> u32 {
        0
    }

    /// Offset of the `(channels, quantize, 0, 0)` vector of target `i`.
    pub fn target_info_offset(&self, i: usize) -> Option<u32> {
        self.target_info_offsets.get(i).copied()
    }

    pub fn target_binding(&self, i: usize) -> u32 {
        1 + i as u32
    }

    pub fn array_binding(&self, slot: u32) -> u32 {
        1 + self.outputs.len() as u32 + slot
    }

    /// Total bindings, uniform block included.
    pub fn binding_count(&self) -> u32 {
        1 + (self.outputs.len() + self.array_count) as u32
    }
}

// ── Uniform layout ────────────────────────────────────────────────────────

/// Assigns offsets inside a WGSL uniform struct.
#[derive(Debug, Default)]
pub(crate) struct UniformLayout {
    size: u32,
}

impl UniformLayout {
    pub(crate) fn push(&mut self, size: u32, align: u32) -> u32 {
        let offset = self.size.next_multiple_of(align);
        self.size = offset + size;
        offset
    }

    /// Struct size: the largest member alignment is 16, so round up to it.
    pub(crate) fn finish(&self) -> u32 {
        self.size.next_multiple_of(16).max(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_follows_wgsl_alignment() {
        let mut l = UniformLayout::default();
        assert_eq!(l.push(16, 16), 0);
        assert_eq!(l.push(4, 4), 16); // f32
        assert_eq!(l.push(12, 16), 32); // vec3 aligns to 16
        assert_eq!(l.push(4, 4), 44); // f32 packs after vec3
        assert_eq!(l.push(8, 8), 48); // vec2
        assert_eq!(l.push(64, 16), 64); // mat4
        assert_eq!(l.finish(), 128);
    }
}
