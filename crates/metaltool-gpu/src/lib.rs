//! MetalTool GPU - wgpu-based rendering pipeline
//!
//! Uses the Metal backend on macOS. Provides the `Context` that owns the
//! device, shader library, pipelines and texture pools, and executes render
//! graphs on the GPU.

pub mod context;
pub mod executor;
pub mod library;
pub mod options;
pub mod pipeline;
pub mod readback;
pub mod texture;
pub mod texture_loader;
pub mod texture_pool;
pub mod video_texture_cache;

pub use context::{Context, DeviceRequest};
pub use executor::execute_graph;
pub use library::{ShaderLibrary, ShaderSource, BUILTIN_SHADERS};
pub use options::{ContextOptions, WorkingPixelFormat};
pub use pipeline::{BlitPipeline, FilterPipeline};
pub use readback::read_texture;
pub use texture::GpuTexture;
pub use texture_loader::TextureLoader;
pub use texture_pool::{PooledResource, TextureKey, TexturePool};
pub use video_texture_cache::VideoTextureCache;
