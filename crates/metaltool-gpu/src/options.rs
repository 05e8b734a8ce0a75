//! Context configuration.
//!
//! `ContextOptions` is a plain value: a context copies it at construction
//! and never mutates it. Options can be stored as JSON; missing fields take
//! their defaults and unknown fields are rejected.

use std::path::Path;

use metaltool_core::memory_budget::IDLE_RESOURCE_BUDGET;
use metaltool_core::{MetalToolError, Result};
use metaltool_imaging::ImageContextOptions;
use serde::{Deserialize, Serialize};

/// Pixel format of rendered output textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingPixelFormat {
    #[default]
    Bgra8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
}

impl WorkingPixelFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            Self::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            Self::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bgra8Unorm => "bgra8_unorm",
            Self::Rgba8Unorm => "rgba8_unorm",
            Self::Rgba8UnormSrgb => "rgba8_unorm_srgb",
        }
    }
}

/// Options for creating a `Context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContextOptions {
    /// Label attached to the device and logged on creation.
    pub label: String,
    /// Format of rendered output textures.
    pub working_pixel_format: WorkingPixelFormat,
    /// Run the render-graph optimizer before each draw.
    pub enables_render_graph_optimization: bool,
    /// CPU image context options. `None` uses the defaults.
    pub image_context_options: Option<ImageContextOptions>,
    /// Bytes of idle textures kept for reuse.
    pub idle_resource_budget: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            label: "metaltool.context".to_string(),
            working_pixel_format: WorkingPixelFormat::default(),
            enables_render_graph_optimization: true,
            image_context_options: None,
            idle_resource_budget: IDLE_RESOURCE_BUDGET,
        }
    }
}

impl ContextOptions {
    /// Check the options before a context is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(MetalToolError::InvalidParameter(
                "context label must not be empty".to_string(),
            ));
        }
        if self.idle_resource_budget == 0 {
            return Err(MetalToolError::InvalidParameter(
                "idle resource budget must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| MetalToolError::Serialization(format!("Failed to serialize options: {}", e)))
    }

    /// Deserialize and validate from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let options: Self = serde_json::from_slice(data)
            .map_err(|e| MetalToolError::Serialization(format!("Invalid context options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load options from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ContextOptions::default();
        assert_eq!(options.label, "metaltool.context");
        assert_eq!(options.working_pixel_format, WorkingPixelFormat::Bgra8Unorm);
        assert!(options.enables_render_graph_optimization);
        assert!(options.image_context_options.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let options =
            ContextOptions::from_json(br#"{"working_pixel_format": "rgba8_unorm_srgb"}"#).unwrap();
        assert_eq!(options.working_pixel_format, WorkingPixelFormat::Rgba8UnormSrgb);
        assert_eq!(options.label, "metaltool.context");
        assert_eq!(
            options.working_pixel_format.texture_format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ContextOptions {
            label: "preview".to_string(),
            enables_render_graph_optimization: false,
            image_context_options: Some(ImageContextOptions {
                parallel: false,
                max_blur_radius: 16,
            }),
            ..Default::default()
        };
        let restored = ContextOptions::from_json(&options.to_json().unwrap()).unwrap();
        assert_eq!(restored, options);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ContextOptions::from_json(br#"{"colour_space": "p3"}"#).unwrap_err();
        assert!(matches!(err, MetalToolError::Serialization(_)));
    }

    #[test]
    fn test_validation() {
        let empty_label = ContextOptions {
            label: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            empty_label.validate(),
            Err(MetalToolError::InvalidParameter(_))
        ));

        let err = ContextOptions::from_json(br#"{"idle_resource_budget": 0}"#).unwrap_err();
        assert!(matches!(err, MetalToolError::InvalidParameter(_)));
    }
}
