//! MetalTool - frame presentation from the command line
//!
//! `metaltool info` reports the GPU context; `metaltool render` presents a
//! raw frame (or a color-bar test pattern) through a `MetalView` and writes
//! the snapshot as PNG.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metaltool_core::{Color, DisplayMode, PixelBuffer, PixelFormat, RotateMode};
use metaltool_gpu::{Context, ContextOptions, DeviceRequest};
use metaltool_imaging::ImageContext;
use metaltool_view::{MetalView, SoftwareRenderer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "metaltool")]
#[command(about = "Present video frames with rotation, scaling, blur and alpha blending")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print GPU adapter and context information
    Info {
        /// Context options file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render a frame and write the snapshot as PNG
    Render(RenderArgs),
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Raw frame file; a test pattern is used when absent
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Frame width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Raw frame pixel format
    #[arg(long, value_enum, default_value = "bgra8")]
    format: FormatArg,

    /// View size, WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720")]
    view: String,

    /// Clockwise rotation in degrees (0, 90, 180, 270)
    #[arg(long, default_value = "0")]
    rotate: i32,

    /// Mirror the rotated frame horizontally
    #[arg(long)]
    mirror: bool,

    /// How the frame is scaled into the view
    #[arg(long, value_enum, default_value = "in")]
    display: DisplayArg,

    /// Horizontal offset in view pixels
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    translate_x: f32,

    /// Vertical offset in view pixels
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    translate_y: f32,

    /// Fill the letterbox with a blurred copy of the frame
    #[arg(long)]
    edge_blur: bool,

    /// Sharpen the frame
    #[arg(long)]
    enhance: bool,

    /// Blend the frame's alpha over the canvas
    #[arg(long)]
    alpha: bool,

    /// Canvas color, RRGGBB or RRGGBBAA
    #[arg(long, default_value = "000000")]
    canvas: String,

    /// Render on the CPU instead of the GPU
    #[arg(long)]
    software: bool,

    /// Context options file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output PNG path
    #[arg(long, short = 'o', default_value = "snapshot.png")]
    output: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Bgra8,
    Rgba8,
    Nv12,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Bgra8 => PixelFormat::Bgra8,
            FormatArg::Rgba8 => PixelFormat::Rgba8,
            FormatArg::Nv12 => PixelFormat::Nv12,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DisplayArg {
    In,
    Out,
    Full,
}

impl From<DisplayArg> for DisplayMode {
    fn from(arg: DisplayArg) -> Self {
        match arg {
            DisplayArg::In => DisplayMode::ScaleIn,
            DisplayArg::Out => DisplayMode::ScaleOut,
            DisplayArg::Full => DisplayMode::ScaleFull,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match Args::parse().command {
        Command::Info { config } => run_info(config),
        Command::Render(args) => run_render(args),
    }
}

fn load_options(path: Option<&PathBuf>) -> Result<ContextOptions> {
    match path {
        Some(path) => ContextOptions::load_from_file(path)
            .with_context(|| format!("loading context options from {}", path.display())),
        None => Ok(ContextOptions::default()),
    }
}

fn run_info(config: Option<PathBuf>) -> Result<()> {
    let options = load_options(config.as_ref())?;
    let context = Context::with_options(&DeviceRequest::default(), options)?;
    let adapter = context.adapter_info();

    println!("Adapter:          {} ({:?}, {:?})", adapter.name, adapter.backend, adapter.device_type);
    println!("Driver:           {} {}", adapter.driver, adapter.driver_info);
    println!("Compute shaders:  {}", context.supports_compute_acceleration());
    println!("Working format:   {}", context.working_pixel_format().name());
    println!("Graph optimizer:  {}", context.is_render_graph_optimization_enabled());
    println!("Label:            {}", context.label());
    println!("Shaders:          {}", context.default_library().function_names().join(", "));
    Ok(())
}

fn parse_view_size(view: &str) -> Result<(u32, u32)> {
    let Some((w, h)) = view.split_once(['x', 'X']) else {
        bail!("view size must be WIDTHxHEIGHT, got '{}'", view);
    };
    Ok((w.trim().parse()?, h.trim().parse()?))
}

fn load_frame(args: &RenderArgs) -> Result<PixelBuffer> {
    match &args.input {
        Some(path) => {
            let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(PixelBuffer::from_raw(args.width, args.height, args.format.into(), &data)?)
        }
        None => Ok(PixelBuffer::test_pattern(args.width, args.height)),
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    let (view_w, view_h) = parse_view_size(&args.view)?;
    let Some(rotate_mode) = RotateMode::from_degrees(args.rotate, args.mirror) else {
        bail!("rotation must be a multiple of 90 degrees, got {}", args.rotate);
    };
    let canvas = Color::from_hex(&args.canvas)?;
    let options = load_options(args.config.as_ref())?;
    let frame = load_frame(&args)?;

    let mut view = if args.software {
        let image_context = ImageContext::new(options.image_context_options.clone().unwrap_or_default());
        let renderer =
            SoftwareRenderer::new(image_context).with_optimization(options.enables_render_graph_optimization);
        MetalView::with_renderer(Box::new(renderer), view_w, view_h)
    } else {
        let context = Context::with_options(&DeviceRequest::default(), options)?;
        MetalView::new(Arc::new(context), view_w, view_h)
    };

    view.set_canvas_color(canvas);
    view.set_rotate_mode(rotate_mode);
    view.set_display_mode(args.display.into());
    view.translate_x(args.translate_x);
    view.translate_y(args.translate_y);
    view.enable_edge_blur(args.edge_blur);
    view.enable_quality_enhancer(args.enhance);
    view.enable_alpha(args.alpha);

    view.try_draw(&frame)?;
    let Some(snapshot) = view.try_snapshot()? else {
        bail!("nothing was rendered");
    };
    snapshot
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(
        renderer = view.renderer_name(),
        width = view_w,
        height = view_h,
        output = %args.output.display(),
        "snapshot written"
    );
    Ok(())
}
