use clap::*;
use pane_host::*;
use std::path::*;
use std::time::*;

/// Runs a module against the headless graphics backend.
#[derive(Debug, Parser)]
#[command(about = "Drives a pane module for a number of frames and reports what it drew")]
struct Options {
    /// The compiled module, for example `example_module.wasm`.
    module: PathBuf,
    /// The number of frames to render.
    #[arg(long, default_value_t = 60)]
    frames: u64,
    /// The surface width passed to `init`.
    #[arg(long, default_value_t = 800)]
    width: u32,
    /// The surface height passed to `init`.
    #[arg(long, default_value_t = 600)]
    height: u32,
    /// Milliseconds between frames.
    #[arg(long, default_value_t = 16)]
    interval: u64,
    /// Accept input layouts that name attributes the program lacks.
    #[arg(long)]
    permissive: bool,
    /// A log filter such as "debug" or "pane_host=trace". Defaults to `PANE_LOG`.
    #[arg(long)]
    log: Option<String>
}

pub struct ExampleHost;

impl Host for ExampleHost {
    type Engine = wasmi_runtime_layer::Engine;
    type Graphics = HeadlessGraphics;

    fn create_engine() -> Self::Engine {
        wasmi_runtime_layer::Engine::default()
    }
}

fn main() -> anyhow::Result<()> {
    let args = Options::parse();
    init_logging(LoggingConfig {
        filter: args.log.clone(),
        ..Default::default()
    });

    let config = BridgeConfig::default()
        .with_surface_size(args.width, args.height)
        .with_frame_interval(Duration::from_millis(args.interval))
        .with_max_frames(Some(args.frames))
        .with_attribute_policy(if args.permissive { AttributePolicy::Permissive } else { AttributePolicy::Strict });

    let host = PaneHost::<ExampleHost>::new(config);
    let module = host.load(std::fs::File::open(&args.module)?)?;
    let mut instance = host.instantiate(&module, HeadlessGraphics::new())?;

    let report = RenderDriver::from_config(host.config()).run(&mut instance)?;

    let api = instance.bridge().api();
    log::info!("Rendered {} frames with {} draw calls and {} live objects", report.frames, api.draw_count(), instance.bridge().table().len());
    if let Some(draw) = api.last_draw() {
        log::info!("Last draw: {} {:?} vertices from program {}", draw.count, draw.primitive, draw.program);
    }
    for error in api.errors() {
        log::warn!("Graphics error: {error}");
    }

    Ok(())
}
