//! Shader library: compiled WGSL modules by name.

use std::collections::BTreeMap;

use metaltool_core::{MetalToolError, Result};
use tracing::debug;

/// One WGSL source and the entry points it provides.
#[derive(Debug, Clone, Copy)]
pub struct ShaderSource {
    pub name: &'static str,
    pub source: &'static str,
    pub entry_points: &'static [&'static str],
}

/// Built-in shader modules.
pub const BUILTIN_SHADERS: &[ShaderSource] = &[
    ShaderSource {
        name: "blit",
        source: include_str!("../shaders/blit.wgsl"),
        entry_points: &["vs_main", "fs_main"],
    },
    ShaderSource {
        name: "filter",
        source: include_str!("../shaders/filter.wgsl"),
        entry_points: &["vs_fullscreen", "fs_blur", "fs_sharpen"],
    },
];

struct LibraryEntry {
    module: wgpu::ShaderModule,
    entry_points: &'static [&'static str],
}

/// A set of validated shader modules.
pub struct ShaderLibrary {
    modules: BTreeMap<&'static str, LibraryEntry>,
}

impl ShaderLibrary {
    /// Compile the built-in shaders.
    pub fn default_library(device: &wgpu::Device) -> Result<Self> {
        Self::from_sources(device, BUILTIN_SHADERS)
    }

    /// Compile `sources` inside a validation error scope.
    ///
    /// Any validation error fails the whole library.
    pub fn from_sources(device: &wgpu::Device, sources: &[ShaderSource]) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut modules = BTreeMap::new();
        for source in sources {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.name),
                source: wgpu::ShaderSource::Wgsl(source.source.into()),
            });
            modules.insert(
                source.name,
                LibraryEntry {
                    module,
                    entry_points: source.entry_points,
                },
            );
        }

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(MetalToolError::Shader(err.to_string()));
        }

        debug!(modules = modules.len(), "shader library compiled");
        Ok(Self { modules })
    }

    /// Module by name.
    pub fn module(&self, name: &str) -> Option<&wgpu::ShaderModule> {
        self.modules.get(name).map(|entry| &entry.module)
    }

    /// Module by name, or a `Shader` error when absent.
    pub(crate) fn require(&self, name: &str) -> Result<&wgpu::ShaderModule> {
        self.module(name)
            .ok_or_else(|| MetalToolError::Shader(format!("shader module '{}' not found", name)))
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.keys().copied().collect()
    }

    /// Every entry point, qualified as `module::function`.
    pub fn function_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(name, entry)| {
                entry
                    .entry_points
                    .iter()
                    .map(move |function| format!("{}::{}", name, function))
            })
            .collect()
    }
}
