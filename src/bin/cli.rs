use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

use tubecity::amp::{ParameterAddress, TubeKernel};
use tubecity::io::renderer::{Automation, Renderer};
use tubecity::io::writer::timestamped_path;
use tubecity::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "tubecity")]
#[command(version)]
#[command(about = "Render a WAV file through the tube saturation kernel.")]
struct Args {
    #[arg(help = "Input WAV file")]
    input: PathBuf,
    #[arg(long, short, help = "Output WAV file (defaults to a timestamped file in the render directory)")]
    output: Option<PathBuf>,
    #[arg(
        long,
        env = "TUBECITY_RENDER_DIR",
        help = "Directory for timestamped renders"
    )]
    render_dir: Option<String>,
    #[arg(long, help = "Drive into the clipper, 0..=2")]
    tube_gain: Option<f32>,
    #[arg(long, help = "Neutral tube mix, 0..=1")]
    neutral: Option<f32>,
    #[arg(long, help = "Warm tube mix, 0..=1")]
    warm: Option<f32>,
    #[arg(long, help = "Aggressive tube mix, 0..=1")]
    aggressive: Option<f32>,
    #[arg(long, help = "Output volume, 0..=2")]
    output_volume: Option<f32>,
    #[arg(long, help = "Pass the input through untouched")]
    bypass: bool,
    #[arg(long, help = "Frames per processing block")]
    block_size: Option<usize>,
    #[arg(
        long = "automate",
        value_name = "ID@FRAME=VALUE",
        help = "Schedule a parameter change, e.g. warmtube@48000=0.5 (repeatable)"
    )]
    automation: Vec<Automation>,
    #[arg(long, help = "Store the resulting parameters as the new defaults")]
    save_settings: bool,
}

impl Args {
    /// Fold command-line overrides into the loaded settings.
    fn apply_to(&self, settings: &mut Settings) {
        let params = &mut settings.parameters;
        let overrides = [
            (self.tube_gain, &mut params.tube_gain),
            (self.neutral, &mut params.neutral_tube),
            (self.warm, &mut params.warm_tube),
            (self.aggressive, &mut params.aggressive_tube),
            (self.output_volume, &mut params.output_volume),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        if self.bypass {
            params.bypass = true;
        }
        if let Some(block_size) = self.block_size {
            settings.render.block_size = block_size;
        }
        if let Some(dir) = &self.render_dir {
            settings.render.render_dir.clone_from(dir);
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    info!("Tubecity v{}", env!("CARGO_PKG_VERSION"));
    info!("Args: {:?}", args);

    let mut settings = Settings::load().context("failed to load settings")?;
    args.apply_to(&mut settings);
    settings.validate().context("invalid parameters")?;
    info!("Settings:\n{settings}");

    if args.save_settings {
        settings.save().context("failed to save settings")?;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| timestamped_path(Path::new(&settings.render.render_dir)));

    let mut kernel = TubeKernel::new();
    kernel.set_maximum_frames_to_render(settings.render.max_frames);
    settings.parameters.apply(&mut kernel);

    let mut renderer = Renderer::new(kernel, settings.render.block_size);
    let summary = renderer
        .render_file(&args.input, &output, &args.automation)
        .with_context(|| format!("failed to render '{}'", args.input.display()))?;

    let meter = renderer.kernel().meter().info();
    info!(
        "Done: {} frames, {} ch @ {} Hz -> {}",
        summary.frames,
        summary.channels,
        summary.sample_rate,
        output.display()
    );
    info!(
        "Final {}: {:.1} dB{}",
        ParameterAddress::SignalLevel,
        meter.level_db,
        if meter.is_clipping { " (clipping)" } else { "" }
    );
    println!("{}", output.display());

    Ok(())
}
