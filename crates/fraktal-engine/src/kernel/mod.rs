//! Linked kernels on the device.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`link`] | link state wrappers, `link_kernel`, `load_kernel` |
//! | [`params`] | `param_*` setters for the kernel in use |
//! | [`run`] | `use_kernel`, `run_kernel`, `run_kernel_targets` |

pub mod link;
pub mod params;
pub mod run;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use fraktal_kernel::Program;
use fraktal_kernel::program::{ENTRY_1D, ENTRY_2D};

use crate::array::ArrayInner;
use crate::context::{GpuContext, next_id};

/// Size of the placeholder buffer bound to array slots nothing is bound to.
const EMPTY_ARRAY_SIZE: u64 = 16;

/// GPU objects and parameter state of one linked program.
pub(crate) struct KernelInner {
    pub(crate) id: u64,
    pub(crate) context: Arc<GpuContext>,
    pub(crate) program: Program,
    pub(crate) layout: wgpu::BindGroupLayout,
    pub(crate) pipeline_1d: wgpu::ComputePipeline,
    pub(crate) pipeline_2d: wgpu::ComputePipeline,
    pub(crate) uniform_buffer: wgpu::Buffer,
    pub(crate) empty_array: wgpu::Buffer,
    /// CPU copy of the uniform block, uploaded on every run.
    pub(crate) uniforms: RefCell<Vec<u8>>,
    /// Array bound to each array slot.
    pub(crate) arrays: RefCell<Vec<Option<Rc<ArrayInner>>>>,
    destroyed: Cell<bool>,
}

impl KernelInner {
    pub(crate) fn build(context: Arc<GpuContext>, program: Program) -> Self {
        let device = context.device();

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fraktal kernel"),
            source: wgpu::ShaderSource::Wgsl(program.source().to_owned().into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..program.binding_count())
            .map(|binding| {
                let ty = if binding == fraktal_kernel::program::UNIFORM_BINDING {
                    wgpu::BufferBindingType::Uniform
                } else {
                    let output = (binding as usize) <= program.outputs().len();
                    wgpu::BufferBindingType::Storage { read_only: !output }
                };
                wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer { ty, has_dynamic_offset: false, min_binding_size: None },
                    count: None,
                }
            })
            .collect();

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fraktal kernel bind group layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fraktal kernel pipeline layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let pipeline_1d = pipeline(ENTRY_1D);
        let pipeline_2d = pipeline(ENTRY_2D);

        let uniform_size = program.uniform_size();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fraktal kernel uniforms"),
            size: u64::from(uniform_size),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let empty_array = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fraktal empty array"),
            size: EMPTY_ARRAY_SIZE,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let arrays = vec![None; program.array_count()];
        Self {
            id: next_id(),
            context,
            layout,
            pipeline_1d,
            pipeline_2d,
            uniform_buffer,
            empty_array,
            uniforms: RefCell::new(vec![0; uniform_size as usize]),
            arrays: RefCell::new(arrays),
            program,
            destroyed: Cell::new(false),
        }
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

/// Handle to a linked kernel.
pub struct Kernel {
    pub(crate) inner: Rc<KernelInner>,
}

impl Kernel {
    pub fn program(&self) -> &Program {
        &self.inner.program
    }

    /// Offset of a used parameter, or `-1`.
    pub fn param_offset(&self, name: &str) -> i32 {
        self.inner.program.param_offset(name)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("id", &self.inner.id)
            .field("params", &self.inner.program.params().len())
            .field("outputs", &self.inner.program.outputs().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Offset of `name` in `kernel`, or `-1` when the kernel is `None` or the
/// parameter is absent or unused.
pub fn get_param_offset(kernel: Option<&Kernel>, name: &str) -> i32 {
    kernel.map_or(-1, |k| k.param_offset(name))
}

/// Releases the kernel's pipelines and unbinds its arrays. No-op on `None`.
pub fn destroy_kernel(kernel: Option<Kernel>) {
    let Some(kernel) = kernel else {
        return;
    };
    if kernel.inner.destroyed.replace(true) {
        return;
    }
    kernel.inner.arrays.borrow_mut().iter_mut().for_each(|slot| *slot = None);
    kernel.inner.uniform_buffer.destroy();
    run::forget_kernel(kernel.inner.id);
    log::debug!("kernel {} destroyed", kernel.inner.id);
}
