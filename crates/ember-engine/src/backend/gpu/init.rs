use crate::error::RendererError;

/// Initialization parameters for the wgpu backend.
///
/// Keep this structure minimal. Add flags only when a concrete platform or
/// backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Backends the instance may pick from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Use a software adapter (e.g. for CI without a GPU).
    pub force_fallback_adapter: bool,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Request outline rasterization when the adapter supports it.
    pub wireframe: bool,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_limits: wgpu::Limits::default(),
            wireframe: true,
        }
    }
}

impl GpuInit {
    pub fn with_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }
}

/// Device, queue and the adapter they came from.
pub(super) struct HeadlessDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub info: wgpu::AdapterInfo,
}

/// Creates a device without a surface.
///
/// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
pub(super) fn request_headless_device(init: &GpuInit) -> Result<HeadlessDevice, RendererError> {
    pollster::block_on(request_device_async(init))
}

async fn request_device_async(init: &GpuInit) -> Result<HeadlessDevice, RendererError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: init.backends,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: init.power_preference,
            compatible_surface: None,
            force_fallback_adapter: init.force_fallback_adapter,
        })
        .await
        .map_err(|e| RendererError::NoAdapter(e.to_string()))?;

    let mut required_features = wgpu::Features::empty();
    if init.wireframe && adapter.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
        required_features |= wgpu::Features::POLYGON_MODE_LINE;
    }

    // Never ask for more than the adapter offers.
    let required_limits = init
        .required_limits
        .clone()
        .using_resolution(adapter.limits());

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("ember-engine device"),
            required_features,
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| RendererError::Device(e.to_string()))?;

    let info = adapter.get_info();
    log::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

    Ok(HeadlessDevice { device, queue, info })
}
