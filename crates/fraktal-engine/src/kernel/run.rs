//! The kernel in use and dispatch.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fraktal_kernel::program::{WORKGROUP_1D, WORKGROUP_2D};
use fraktal_kernel::{ParamBinding, Program};

use super::{Kernel, KernelInner};
use crate::array::{AccessMode, Array, ArrayFormat, ArrayInner};
use crate::context::{check_affinity, same_context};
use crate::error::{Error, Result};

thread_local! {
    // Weak, so a thread exiting never drops GPU objects from its destructors.
    static ACTIVE: RefCell<Option<Weak<KernelInner>>> = const { RefCell::new(None) };
}

/// `Some(k)` makes `k` the kernel parameter setters and runs act on; `None`
/// clears it. The caller keeps `k` alive; a dropped kernel is no longer in
/// use.
pub fn use_kernel(kernel: Option<&Kernel>) {
    ACTIVE.with_borrow_mut(|active| *active = kernel.map(|k| Rc::downgrade(&k.inner)));
}

pub(crate) fn active_kernel() -> Option<Rc<KernelInner>> {
    ACTIVE.with_borrow(|active| active.as_ref().and_then(Weak::upgrade))
}

/// Clears the kernel in use if it is `id`.
pub(crate) fn forget_kernel(id: u64) {
    ACTIVE.with_borrow_mut(|active| {
        if active.as_ref().and_then(Weak::upgrade).is_some_and(|k| k.id == id) {
            *active = None;
        }
    });
}

/// Runs the kernel in use over `target`'s grid, adding its output into
/// `target`. Returns once the work is submitted; [`crate::to_cpu`] waits.
pub fn run_kernel(target: &Array) -> Result<()> {
    run_kernel_targets(&[target])
}

/// Like [`run_kernel`] for kernels with several `#out` declarations; the
/// n-th target receives the n-th output.
pub fn run_kernel_targets(targets: &[&Array]) -> Result<()> {
    let kernel = active_kernel().ok_or(Error::NoActiveKernel)?;
    if kernel.is_destroyed() {
        return Err(Error::KernelDestroyed);
    }
    check_affinity(&kernel.context, "kernel")?;

    let program = &kernel.program;
    let expected = program.outputs().len();
    let [first, ..] = targets else {
        return Err(Error::TargetCount { expected, actual: 0 });
    };
    if targets.len() != expected {
        return Err(Error::TargetCount { expected, actual: targets.len() });
    }
    let (width, height) = (first.width(), first.height());
    for t in targets {
        t.inner.check()?;
        if !same_context(&t.inner.context, &kernel.context) {
            return Err(Error::ForeignResource { what: "target array" });
        }
        if t.access() != AccessMode::ReadWrite {
            return Err(Error::ReadOnlyTarget);
        }
        if (t.width(), t.height()) != (width, height) {
            return Err(Error::TargetShape);
        }
    }

    let arrays = kernel.arrays.borrow();
    check_inputs(program, &arrays, targets)?;

    let ctx = &kernel.context;
    let limit = ctx.device().limits().max_compute_workgroups_per_dimension;
    let (w, h) = (width as u32, height.max(1) as u32);
    let (pipeline, groups) = if height == 0 {
        (&kernel.pipeline_1d, (w.div_ceil(WORKGROUP_1D), 1))
    } else {
        (&kernel.pipeline_2d, (w.div_ceil(WORKGROUP_2D), h.div_ceil(WORKGROUP_2D)))
    };
    if groups.0 > limit || groups.1 > limit {
        return Err(Error::GridTooLarge { width, height });
    }

    {
        let mut uniforms = kernel.uniforms.borrow_mut();
        let dims = if height == 0 { 1 } else { 2 };
        write_i32x4(&mut uniforms, program.grid_offset(), [width, height.max(1), dims, 0]);
        for (i, t) in targets.iter().enumerate() {
            if let Some(offset) = program.target_info_offset(i) {
                let quantize = i32::from(t.format() == ArrayFormat::Uint8);
                write_i32x4(&mut uniforms, offset, [t.channels(), quantize, 0, 0]);
            }
        }
        for p in program.params() {
            if let ParamBinding::Array { slot, info_offset, .. } = p.binding {
                let info = arrays[slot as usize]
                    .as_ref()
                    .map_or([0; 4], |a| [a.desc.width, a.desc.height, a.desc.channels, 0]);
                write_i32x4(&mut uniforms, info_offset, info);
            }
        }
        ctx.queue().write_buffer(&kernel.uniform_buffer, 0, &uniforms);
    }

    let mut entries = vec![wgpu::BindGroupEntry {
        binding: fraktal_kernel::program::UNIFORM_BINDING,
        resource: kernel.uniform_buffer.as_entire_binding(),
    }];
    for (i, t) in targets.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: program.target_binding(i),
            resource: t.inner.buffer.as_entire_binding(),
        });
    }
    for (slot, bound) in arrays.iter().enumerate() {
        let buffer = bound.as_ref().map_or(&kernel.empty_array, |a| &a.buffer);
        entries.push(wgpu::BindGroupEntry {
            binding: program.array_binding(slot as u32),
            resource: buffer.as_entire_binding(),
        });
    }
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("fraktal kernel bind group"),
        layout: &kernel.layout,
        entries: &entries,
    });

    let mut encoder = ctx.encoder("fraktal run");
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("fraktal run"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups.0, groups.1, 1);
    }
    ctx.submit(encoder);

    log::trace!(
        "kernel {}: dispatched {}x{} over {width}x{height} into {} target(s)",
        kernel.id,
        groups.0,
        groups.1,
        targets.len()
    );
    Ok(())
}

/// Bound inputs must be alive and must not also be targets of the run.
fn check_inputs(program: &Program, arrays: &[Option<Rc<ArrayInner>>], targets: &[&Array]) -> Result<()> {
    for p in program.params() {
        let ParamBinding::Array { slot, .. } = p.binding else {
            continue;
        };
        let Some(array) = &arrays[slot as usize] else {
            continue;
        };
        if array.is_destroyed() {
            return Err(Error::ArrayDestroyed);
        }
        if targets.iter().any(|t| Rc::ptr_eq(&t.inner, array)) {
            return Err(Error::Aliased { param: p.name.clone() });
        }
    }
    Ok(())
}

fn write_i32x4(uniforms: &mut [u8], offset: u32, v: [i32; 4]) {
    let at = offset as usize;
    uniforms[at..at + 16].copy_from_slice(bytemuck::cast_slice(&v));
}
