//! Integration tests for context configuration files.

use metaltool_core::MetalToolError;
use metaltool_gpu::{ContextOptions, WorkingPixelFormat};
use metaltool_imaging::ImageContextOptions;

#[test]
fn options_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");

    let options = ContextOptions {
        label: "studio.preview".to_string(),
        working_pixel_format: WorkingPixelFormat::Rgba8Unorm,
        enables_render_graph_optimization: false,
        image_context_options: Some(ImageContextOptions {
            parallel: false,
            max_blur_radius: 24,
        }),
        idle_resource_budget: 64 * 1024 * 1024,
    };
    options.save_to_file(&path).unwrap();

    let loaded = ContextOptions::load_from_file(&path).unwrap();
    assert_eq!(loaded, options);
}

#[test]
fn options_file_missing_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ContextOptions::load_from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, MetalToolError::Io(_)));
}

#[test]
fn options_file_with_nested_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    std::fs::write(&path, br#"{"image_context_options": {"parallel": false}}"#).unwrap();

    let loaded = ContextOptions::load_from_file(&path).unwrap();
    let image = loaded.image_context_options.unwrap();
    assert!(!image.parallel);
    assert_eq!(image.max_blur_radius, ImageContextOptions::default().max_blur_radius);
    assert_eq!(loaded.working_pixel_format, WorkingPixelFormat::Bgra8Unorm);
}

#[test]
fn options_file_rejects_unknown_format() {
    let err = ContextOptions::from_json(br#"{"working_pixel_format": "rgb565"}"#).unwrap_err();
    assert!(matches!(err, MetalToolError::Serialization(_)));
}
