//! GPU-resident arrays.
//!
//! An array is a 1D (`height == 0`) or 2D grid of elements with 1, 2 or 4
//! channels. Storage on the device is always one `f32` per channel; `Uint8`
//! arrays are normalized on upload and quantized on readback.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::context::{GpuContext, check_affinity, ensure_context, next_id};
use crate::error::{Error, Result};

// ── Descriptors ───────────────────────────────────────────────────────────

/// CPU-side element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayFormat {
    Float,
    Uint8,
}

impl ArrayFormat {
    /// Bytes per channel on the CPU side.
    pub fn size(self) -> usize {
        match self {
            ArrayFormat::Float => 4,
            ArrayFormat::Uint8 => 1,
        }
    }
}

/// Whether kernels may write into the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayDesc {
    pub width: i32,
    /// `0` for a 1D array.
    pub height: i32,
    pub channels: i32,
    pub format: ArrayFormat,
    pub access: AccessMode,
}

impl ArrayDesc {
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height >= 0 && matches!(self.channels, 1 | 2 | 4)
    }

    /// `width * max(height, 1)`.
    pub fn element_count(&self) -> usize {
        self.width.max(0) as usize * self.height.max(1) as usize
    }

    pub fn value_count(&self) -> usize {
        self.element_count() * self.channels.max(0) as usize
    }

    /// Size of the CPU representation in bytes.
    pub fn byte_size(&self) -> usize {
        self.value_count() * self.format.size()
    }

    fn gpu_size(&self) -> u64 {
        (self.value_count() * std::mem::size_of::<f32>()) as u64
    }
}

// ── Handle ────────────────────────────────────────────────────────────────

pub(crate) struct ArrayInner {
    pub(crate) id: u64,
    pub(crate) desc: ArrayDesc,
    pub(crate) context: Arc<GpuContext>,
    pub(crate) buffer: wgpu::Buffer,
    destroyed: Cell<bool>,
}

impl ArrayInner {
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Fails unless the array is alive and usable under the current context.
    pub(crate) fn check(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ArrayDestroyed);
        }
        check_affinity(&self.context, "array")
    }
}

/// Handle to a GPU array. Dropping it releases the buffer once no kernel
/// still has it bound.
pub struct Array {
    pub(crate) inner: Rc<ArrayInner>,
}

impl Array {
    pub fn desc(&self) -> ArrayDesc {
        self.inner.desc
    }

    pub fn width(&self) -> i32 {
        self.inner.desc.width
    }

    pub fn height(&self) -> i32 {
        self.inner.desc.height
    }

    pub fn channels(&self) -> i32 {
        self.inner.desc.channels
    }

    pub fn format(&self) -> ArrayFormat {
        self.inner.desc.format
    }

    pub fn access(&self) -> AccessMode {
        self.inner.desc.access
    }

    pub fn byte_size(&self) -> usize {
        self.inner.desc.byte_size()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.inner.id)
            .field("desc", &self.inner.desc)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

// ── Operations ────────────────────────────────────────────────────────────

/// Creates an array under the current context (creating one if needed).
///
/// `data`, when given, must hold exactly [`ArrayDesc::byte_size`] bytes in
/// `format`; otherwise the array starts zeroed.
pub fn create_array(
    data: Option<&[u8]>,
    width: i32,
    height: i32,
    channels: i32,
    format: ArrayFormat,
    access: AccessMode,
) -> Result<Array> {
    let desc = ArrayDesc { width, height, channels, format, access };
    if !desc.is_valid() {
        return Err(Error::InvalidArray(format!(
            "{width}x{height} with {channels} channel(s); width must be > 0, height >= 0, channels 1, 2 or 4"
        )));
    }
    if let Some(data) = data
        && data.len() != desc.byte_size()
    {
        return Err(Error::InvalidArray(format!(
            "initial data has {} bytes, expected {}",
            data.len(),
            desc.byte_size()
        )));
    }

    let ctx = ensure_context()?.inner;
    let limit = u64::from(ctx.device().limits().max_storage_buffer_binding_size);
    if desc.gpu_size() > limit {
        return Err(Error::InvalidArray(format!(
            "{} bytes exceeds the device storage binding limit of {limit}",
            desc.gpu_size()
        )));
    }

    let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
    let buffer = match data {
        Some(data) => {
            let values = decode(data, format);
            ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fraktal array"),
                contents: bytemuck::cast_slice(&values),
                usage,
            })
        }
        None => ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("fraktal array"),
            size: desc.gpu_size(),
            usage,
            mapped_at_creation: false,
        }),
    };

    let id = next_id();
    log::debug!("array {id}: {width}x{height}x{channels} {format:?} {access:?}");
    Ok(Array {
        inner: Rc::new(ArrayInner { id, desc, context: ctx, buffer, destroyed: Cell::new(false) }),
    })
}

/// Releases the array's GPU memory. No-op on `None`.
pub fn destroy_array(a: Option<Array>) {
    let Some(a) = a else {
        return;
    };
    if !a.inner.destroyed.replace(true) {
        a.inner.buffer.destroy();
        log::debug!("array {} destroyed", a.inner.id);
    }
}

/// Sets every channel of every element to zero.
pub fn zero_array(a: &Array) -> Result<()> {
    a.inner.check()?;
    let ctx = &a.inner.context;
    let mut encoder = ctx.encoder("fraktal zero");
    encoder.clear_buffer(&a.inner.buffer, 0, None);
    ctx.submit(encoder);
    Ok(())
}

/// Copies the array into `dst`, waiting for all submitted kernels.
///
/// `dst.len()` must equal [`Array::byte_size`].
pub fn to_cpu(dst: &mut [u8], a: &Array) -> Result<()> {
    a.inner.check()?;
    let desc = a.inner.desc;
    if dst.len() != desc.byte_size() {
        return Err(Error::BufferSize { expected: desc.byte_size(), actual: dst.len() });
    }
    let raw = a.inner.context.read_buffer(&a.inner.buffer, desc.gpu_size())?;
    encode(&raw, dst, desc.format);
    Ok(())
}

// ── Introspection ─────────────────────────────────────────────────────────

/// `(width, height)`, or `(-1, -1)` on `None`.
pub fn array_size(a: Option<&Array>) -> (i32, i32) {
    a.map_or((-1, -1), |a| (a.width(), a.height()))
}

pub fn array_format(a: Option<&Array>) -> Option<ArrayFormat> {
    a.map(Array::format)
}

pub fn array_access(a: Option<&Array>) -> Option<AccessMode> {
    a.map(Array::access)
}

/// Channel count, or `0` on `None`.
pub fn array_channels(a: Option<&Array>) -> i32 {
    a.map_or(0, Array::channels)
}

/// CPU byte size, or `0` on `None`.
pub fn array_byte_size(a: Option<&Array>) -> usize {
    a.map_or(0, Array::byte_size)
}

/// Structural validity of a live array.
pub fn is_valid_array(a: Option<&Array>) -> bool {
    a.is_some_and(|a| !a.is_destroyed() && a.inner.desc.is_valid())
}

// ── Conversion ────────────────────────────────────────────────────────────

fn decode(data: &[u8], format: ArrayFormat) -> Vec<f32> {
    match format {
        ArrayFormat::Float => floats(data),
        ArrayFormat::Uint8 => data.iter().map(|&v| f32::from(v) / 255.0).collect(),
    }
}

fn encode(raw: &[u8], dst: &mut [u8], format: ArrayFormat) {
    match format {
        ArrayFormat::Float => dst.copy_from_slice(raw),
        ArrayFormat::Uint8 => {
            for (d, v) in dst.iter_mut().zip(floats(raw)) {
                *d = quantize(v);
            }
        }
    }
}

/// Reads native-endian `f32`s from a byte slice of any alignment.
fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: i32, height: i32, channels: i32) -> ArrayDesc {
        ArrayDesc { width, height, channels, format: ArrayFormat::Float, access: AccessMode::ReadWrite }
    }

    #[test]
    fn validity() {
        assert!(desc(4, 0, 1).is_valid());
        assert!(desc(4, 3, 4).is_valid());
        assert!(!desc(0, 3, 4).is_valid());
        assert!(!desc(4, -1, 4).is_valid());
        assert!(!desc(4, 3, 3).is_valid());
    }

    #[test]
    fn sizes() {
        assert_eq!(desc(5, 0, 2).byte_size(), 40);
        let d = ArrayDesc { format: ArrayFormat::Uint8, ..desc(3, 2, 4) };
        assert_eq!(d.byte_size(), 24);
        assert_eq!(d.gpu_size(), 96);
    }

    #[test]
    fn uint8_round_trips_through_f32() {
        let data: Vec<u8> = (0..=255).collect();
        let values = decode(&data, ArrayFormat::Uint8);
        let raw: &[u8] = bytemuck::cast_slice(&values);
        let mut back = vec![0; data.len()];
        encode(raw, &mut back, ArrayFormat::Uint8);
        assert_eq!(back, data);
    }

    #[test]
    fn quantize_clamps() {
        assert_eq!(quantize(-1.0), 0);
        assert_eq!(quantize(2.0), 255);
        assert_eq!(quantize(0.5), 128);
    }

    #[test]
    fn null_sentinels() {
        assert_eq!(array_size(None), (-1, -1));
        assert_eq!(array_format(None), None);
        assert_eq!(array_access(None), None);
        assert_eq!(array_channels(None), 0);
        assert_eq!(array_byte_size(None), 0);
        assert!(!is_valid_array(None));
        destroy_array(None);
    }
}
