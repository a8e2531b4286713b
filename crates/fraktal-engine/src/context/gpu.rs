use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context as _;

use super::config::ContextConfig;
use crate::error::{Error, Result};

/// How long [`GpuContext::read_buffer`] waits for the device.
const READBACK_TIMEOUT: Duration = Duration::from_secs(60);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Owns (or borrows, in shared mode) the wgpu device and queue.
///
/// Every array and kernel keeps an `Arc` to the context it was created under,
/// so the device outlives its resources even after `destroy_context`.
pub(crate) struct GpuContext {
    id: u64,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_info: Option<wgpu::AdapterInfo>,
    /// Device and queue belong to the host.
    shared: bool,
    destroyed: AtomicBool,
}

impl GpuContext {
    /// Acquires an adapter and device. Blocks on wgpu's async requests.
    pub(crate) fn create(config: &ContextConfig) -> anyhow::Result<Self> {
        pollster::block_on(Self::request(config))
    }

    async fn request(config: &ContextConfig) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?}, {:?})", info.name, info.device_type, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: config.label.as_deref(),
                required_features: config.required_features,
                required_limits: config.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        Ok(Self {
            id: next_id(),
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info: Some(info),
            shared: false,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Wraps a host-owned device and queue.
    pub(crate) fn shared(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            id: next_id(),
            device,
            queue,
            adapter_info: None,
            shared: true,
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub(crate) fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.adapter_info.as_ref()
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.shared
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Invalidates the context. A runtime-owned device is destroyed too.
    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.shared {
            self.device.destroy();
        }
        log::debug!("context {} destroyed", self.id);
    }

    pub(crate) fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub(crate) fn submit(&self, encoder: wgpu::CommandEncoder) -> wgpu::SubmissionIndex {
        self.queue.submit(Some(encoder.finish()))
    }

    /// Copies `size` bytes of `buffer` back to the CPU, waiting for all work
    /// submitted so far.
    pub(crate) fn read_buffer(&self, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fraktal readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("fraktal readback");
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        let submission = self.submit(encoder);

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(READBACK_TIMEOUT),
            })
            .map_err(|e| Error::Readback(format!("device poll failed: {e}")))?;

        receiver
            .recv()
            .map_err(|_| Error::Readback("map_async callback was not invoked".into()))?
            .map_err(|e| Error::Readback(format!("map_async failed: {e}")))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}
