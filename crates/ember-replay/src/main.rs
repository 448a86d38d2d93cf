mod scene;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use ember_engine::logging::{init_logging, LoggingConfig};
use ember_engine::{
    Backend, ColorDepth, DrawConfig, Frame, GpuInit, Renderer, RendererSettings, SoftwareBackend, StaticSettings,
    WgpuBackend,
};

use scene::DemoScene;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum BackendKind {
    /// CPU reference rasterizer
    Software,
    /// wgpu on a headless device
    Wgpu,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Depth {
    #[value(name = "16")]
    Bits16,
    #[value(name = "32")]
    Bits32,
}

#[derive(Parser, Debug)]
#[command(name = "ember-replay")]
#[command(about = "Replay the built-in draw-command stream and save the last frame", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, value_enum, default_value_t = BackendKind::Software)]
    backend: BackendKind,

    /// Number of frames to replay
    #[arg(short, long, default_value_t = 1)]
    frames: u32,

    /// Internal resolution multiplier
    #[arg(short, long, default_value_t = 1)]
    upscaling: u32,

    /// Internal color depth in bits
    #[arg(long, value_enum, default_value_t = Depth::Bits16)]
    depth: Depth,

    /// Present all of VRAM instead of the display region
    #[arg(long)]
    full_vram: bool,

    /// Ask wgpu for a software adapter
    #[arg(long)]
    fallback_adapter: bool,

    /// PNG written with the last presented frame
    #[arg(short, long, default_value = "ember-frame.png")]
    output: PathBuf,

    /// Suppress log output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        init_logging(LoggingConfig::default());
    }

    let settings = StaticSettings::new(
        RendererSettings {
            upscaling: cli.upscaling,
            color_depth: match cli.depth {
                Depth::Bits16 => ColorDepth::Bits16,
                Depth::Bits32 => ColorDepth::Bits32,
            },
            display_full_vram: cli.full_vram,
            ..RendererSettings::default()
        }
        .sanitized(),
    );

    let frame = match cli.backend {
        BackendKind::Software => replay(SoftwareBackend::new()?, &cli, settings)?,
        BackendKind::Wgpu => {
            let init = GpuInit::default().with_fallback_adapter(cli.fallback_adapter);
            replay(WgpuBackend::new(init)?, &cli, settings)?
        }
    };

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba8())
        .context("frame buffer does not match its dimensions")?;
    image
        .save(&cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    log::info!("wrote {}x{} frame to {}", frame.width, frame.height, cli.output.display());
    Ok(())
}

fn replay<B: Backend>(backend: B, cli: &Cli, settings: StaticSettings) -> anyhow::Result<Frame> {
    let mut renderer = Renderer::new(backend, DrawConfig::default(), settings)?;
    let scene = DemoScene::new();

    for cmd in scene.setup() {
        renderer.draw(cmd)?;
    }

    let mut frame = Frame::default();
    for index in 0..cli.frames.max(1) {
        renderer.prepare_render();
        for cmd in scene.frame(index) {
            renderer.draw(cmd)?;
        }
        frame = renderer.finalize_frame();

        let faults = renderer.faults();
        if !faults.is_empty() {
            log::warn!("frame {index}: {} dropped commands", faults.len());
        }
    }

    if let Some(downgrade) = renderer.last_downgrade() {
        log::warn!(
            "requested {}x upscaling, rendered at {}x: {}",
            downgrade.requested,
            downgrade.kept,
            downgrade.reason
        );
    }
    log::info!("replayed {} frames at {}x", cli.frames.max(1), renderer.backend().upscaling());
    Ok(frame)
}
