//! GPU context management.
//!
//! A `Context` owns every long-lived GPU resource: adapter, device, queue,
//! shader library, pipelines, texture loader, video texture cache and the
//! idle texture pool. It is created once through a failable constructor and
//! shared between views behind an `Arc`.

use std::sync::Arc;

use metaltool_core::{MetalToolError, PresentationState, Result, RotateMode, Size};
use metaltool_imaging::ImageContext;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::library::ShaderLibrary;
use crate::options::{ContextOptions, WorkingPixelFormat};
use crate::pipeline::{BlitPipeline, FilterPipeline};
use crate::texture::GpuTexture;
use crate::texture_loader::TextureLoader;
use crate::texture_pool::{TextureKey, TexturePool};
use crate::video_texture_cache::VideoTextureCache;

/// Which device a context should run on.
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for DeviceRequest {
    fn default() -> Self {
        // Prefer Metal on macOS, Vulkan on others
        #[cfg(target_os = "macos")]
        let backends = wgpu::Backends::METAL;
        #[cfg(not(target_os = "macos"))]
        let backends = wgpu::Backends::VULKAN | wgpu::Backends::DX12;

        Self {
            backends,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

impl DeviceRequest {
    pub fn with_backends(backends: wgpu::Backends) -> Self {
        Self {
            backends,
            ..Default::default()
        }
    }

    async fn request_adapter(&self) -> Option<(wgpu::Instance, wgpu::Adapter)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: self.backends,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: self.power_preference,
                compatible_surface: None,
                force_fallback_adapter: self.force_fallback_adapter,
            })
            .await?;
        Some((instance, adapter))
    }
}

/// GPU image-processing context.
pub struct Context {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    options: ContextOptions,
    library: ShaderLibrary,
    blit: BlitPipeline,
    filter: FilterPipeline,
    texture_loader: TextureLoader,
    image_context: ImageContext,
    video_texture_cache: VideoTextureCache,
    pool: Mutex<TexturePool<GpuTexture>>,
    presentation: Mutex<PresentationState>,
    supports_compute: bool,
}

impl Context {
    /// Create a context with default options (blocking).
    pub fn new(request: &DeviceRequest) -> Result<Self> {
        Self::with_options(request, ContextOptions::default())
    }

    /// Create a context with explicit options (blocking).
    pub fn with_options(request: &DeviceRequest, options: ContextOptions) -> Result<Self> {
        pollster::block_on(Self::with_options_async(request, options))
    }

    /// Create a context.
    ///
    /// Fails when the options are invalid, no adapter matches `request`,
    /// the device cannot be created or the shader library fails validation.
    pub async fn with_options_async(request: &DeviceRequest, options: ContextOptions) -> Result<Self> {
        options.validate()?;

        let (instance, adapter) = request
            .request_adapter()
            .await
            .ok_or_else(|| MetalToolError::Gpu("No suitable GPU adapter found".to_string()))?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(&options.label),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| MetalToolError::Gpu(format!("Failed to create device: {}", e)))?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let library = ShaderLibrary::default_library(&device)?;
        let blit = BlitPipeline::new(&device, &library, options.working_pixel_format.texture_format())?;
        let filter = FilterPipeline::new(&device, &library)?;

        let supports_compute = adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);

        info!(
            label = %options.label,
            format = options.working_pixel_format.name(),
            optimize = options.enables_render_graph_optimization,
            "context created"
        );

        Ok(Self {
            texture_loader: TextureLoader::new(device.clone(), queue.clone()),
            image_context: ImageContext::new(options.image_context_options.clone().unwrap_or_default()),
            video_texture_cache: VideoTextureCache::new(device.clone(), queue.clone()),
            pool: Mutex::new(TexturePool::new(options.idle_resource_budget)),
            presentation: Mutex::new(PresentationState::default()),
            _instance: instance,
            adapter,
            device,
            queue,
            options,
            library,
            blit,
            filter,
            supports_compute,
        })
    }

    /// Whether the default adapter can run compute shaders.
    ///
    /// `false` when no adapter is available.
    pub fn default_device_supports_compute() -> bool {
        pollster::block_on(DeviceRequest::default().request_adapter())
            .map(|(_, adapter)| {
                adapter
                    .get_downlevel_capabilities()
                    .flags
                    .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
            })
            .unwrap_or(false)
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Get adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn default_library(&self) -> &ShaderLibrary {
        &self.library
    }

    pub fn texture_loader(&self) -> &TextureLoader {
        &self.texture_loader
    }

    pub fn image_context(&self) -> &ImageContext {
        &self.image_context
    }

    pub fn video_texture_cache(&self) -> &VideoTextureCache {
        &self.video_texture_cache
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn working_pixel_format(&self) -> WorkingPixelFormat {
        self.options.working_pixel_format
    }

    pub fn is_render_graph_optimization_enabled(&self) -> bool {
        self.options.enables_render_graph_optimization
    }

    pub fn label(&self) -> &str {
        &self.options.label
    }

    pub fn supports_compute_acceleration(&self) -> bool {
        self.supports_compute
    }

    pub(crate) fn blit_pipeline(&self) -> &BlitPipeline {
        &self.blit
    }

    pub(crate) fn filter_pipeline(&self) -> &FilterPipeline {
        &self.filter
    }

    // Texture pool

    /// Intermediate texture in the working pixel format.
    pub fn acquire_texture(&self, width: u32, height: u32) -> GpuTexture {
        self.acquire_texture_with_format(width, height, self.options.working_pixel_format.texture_format())
    }

    pub fn acquire_texture_with_format(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> GpuTexture {
        let key = TextureKey::new(width, height, format);
        self.pool
            .lock()
            .acquire(key, |key| GpuTexture::intermediate(&self.device, key))
    }

    /// Return a texture to the idle pool. Dropped when over budget.
    pub fn recycle_texture(&self, texture: GpuTexture) {
        if !self.pool.lock().release(texture) {
            debug!("idle pool over budget, texture dropped");
        }
    }

    /// Drop every idle texture and let the device free the memory.
    pub fn reclaim_resources(&self) {
        let (size, count) = (self.idle_resource_size(), self.idle_resource_count());
        self.trim_resources(0);
        self.device.poll(wgpu::Maintain::Wait);
        debug!(bytes = size, textures = count, "idle resources reclaimed");
    }

    /// Drop idle textures until at most `target` bytes stay pooled.
    ///
    /// Intermediates go before frame textures, which every draw reuses.
    pub fn trim_resources(&self, target: usize) {
        let frames = self.video_texture_cache.idle_size();
        let remaining = {
            let mut pool = self.pool.lock();
            pool.evict_to(target.saturating_sub(frames));
            target.saturating_sub(pool.memory_usage())
        };
        self.video_texture_cache.trim(remaining);
    }

    /// Bytes held by idle pooled textures.
    pub fn idle_resource_size(&self) -> usize {
        self.pool.lock().memory_usage() + self.video_texture_cache.idle_size()
    }

    /// Number of idle pooled textures.
    pub fn idle_resource_count(&self) -> usize {
        self.pool.lock().texture_count() + self.video_texture_cache.idle_count()
    }

    // Presentation state

    pub fn presentation(&self) -> PresentationState {
        *self.presentation.lock()
    }

    pub fn set_presentation(&self, state: PresentationState) {
        *self.presentation.lock() = state;
    }

    pub fn set_rotate_mode(&self, rotate_mode: RotateMode) {
        self.presentation.lock().rotate_mode = rotate_mode;
    }

    pub fn set_video_size(&self, width: i32, height: i32) {
        let mut state = self.presentation.lock();
        state.video_width = width;
        state.video_height = height;
    }

    pub fn set_view_size(&self, size: Size) {
        self.presentation.lock().view_size = size;
    }

    pub fn set_view_offset(&self, x: f32, y: f32) {
        let mut state = self.presentation.lock();
        state.view_offset_x = x;
        state.view_offset_y = y;
    }

    pub fn set_blend_enable(&self, enable: bool) {
        self.presentation.lock().blend_enable = enable;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("label", &self.options.label)
            .field("adapter", &self.adapter.get_info().name)
            .field("working_pixel_format", &self.options.working_pixel_format)
            .finish_non_exhaustive()
    }
}
