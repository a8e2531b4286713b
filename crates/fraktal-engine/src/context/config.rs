/// Initialization parameters for a runtime-owned GPU context.
///
/// Keep this structure small. Add flags only when a concrete backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Backends wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Accept a software adapter (e.g. lavapipe, WARP) only.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Kernels only need core compute, so the default set is empty.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Debug label of the device.
    pub label: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            label: Some("fraktal device".to_owned()),
        }
    }
}
