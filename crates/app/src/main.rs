use std::{f32::consts::TAU, path::PathBuf};

use clap::{Parser, Subcommand};
use live_visualiser_core::{
    AudioNode, ConfigOptions, ManualScheduler, RecordingSurface, SoftwareGraph, SourceNode,
    VisualizationConfig, Visualiser,
};
use tracing_subscriber::EnvFilter;

const FRAME_MS: f64 = 1000.0 / 60.0;

fn main() -> live_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            preset,
            mode,
            frames,
            width,
            height,
            tones,
            output,
        } => {
            let mut options = load_options(preset.as_ref())?;
            if mode.is_some() {
                options.mode = mode;
            }
            run_render(&options, frames, width, height, &tones, output.as_ref())
        }
        Commands::Config { preset } => {
            let options = load_options(preset.as_ref())?;
            let config = VisualizationConfig::from_options(&options);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run_render(
    options: &ConfigOptions,
    frames: u32,
    width: f32,
    height: f32,
    tones: &[f32],
    output: Option<&PathBuf>,
) -> live_visualiser_core::Result<()> {
    let mut graph = SoftwareGraph::new();
    let source = graph.create_source()?;
    let source_id = source.id();
    let mut visualiser = Visualiser::new(
        SourceNode::Audio(Box::new(source)),
        RecordingSurface::new(width, height),
        &mut graph,
        ManualScheduler::new(),
        options,
    )?;
    tracing::info!(
        frames,
        width,
        height,
        mode = %visualiser.configuration().config.mode(),
        "starting headless render"
    );

    let mut synth = ToneMix::new(tones, graph.sample_rate() as f32);
    let block_len = (graph.sample_rate() as f64 * FRAME_MS / 1000.0).round() as usize;
    let mut painted = 0;
    let mut last_frame = Vec::new();

    visualiser.start_full_surface()?;
    for frame in 0..frames {
        graph.push_samples(source_id, &synth.next_block(block_len))?;
        for stats in visualiser.advance(FRAME_MS) {
            painted += 1;
            tracing::debug!(frame, bars = stats.bars, points = stats.points, "painted frame");
        }
        let commands = visualiser.surface_mut().take_commands();
        if !commands.is_empty() {
            last_frame = commands;
        }
        if !visualiser.is_running() {
            break;
        }
    }

    if let Some(fault) = visualiser.last_fault() {
        tracing::warn!(fault, "render loop reported a fault");
    }

    if let Some(path) = output {
        let dump = serde_json::json!({
            "configuration": visualiser.configuration(),
            "commands": last_frame,
        });
        std::fs::write(path, serde_json::to_vec_pretty(&dump)?)?;
        tracing::info!(?path, "wrote last frame display list");
    }

    visualiser.destroy();
    tracing::info!(painted, "render finished");
    Ok(())
}

fn load_options(preset: Option<&PathBuf>) -> live_visualiser_core::Result<ConfigOptions> {
    match preset {
        Some(path) => {
            tracing::info!(?path, "loading preset");
            ConfigOptions::from_path(path)
        }
        None => Ok(ConfigOptions::default()),
    }
}

/// Sum of equal-amplitude sine tones, normalised to stay within [-1, 1].
struct ToneMix {
    frequencies: Vec<f32>,
    phases: Vec<f32>,
    sample_rate: f32,
}

impl ToneMix {
    fn new(frequencies: &[f32], sample_rate: f32) -> Self {
        Self {
            frequencies: frequencies.to_vec(),
            phases: vec![0.0; frequencies.len()],
            sample_rate,
        }
    }

    fn next_block(&mut self, len: usize) -> Vec<f32> {
        let gain = 1.0 / self.frequencies.len().max(1) as f32;
        (0..len)
            .map(|_| {
                let mut sample = 0.0;
                for (frequency, phase) in self.frequencies.iter().zip(&mut self.phases) {
                    sample += phase.sin();
                    *phase = (*phase + TAU * frequency / self.sample_rate) % TAU;
                }
                sample * gain
            })
            .collect()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Spectrum and oscilloscope visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the visualiser headless against a synthesised tone mix.
    Render {
        /// Optional JSON preset with visualisation options.
        #[arg(short, long)]
        preset: Option<PathBuf>,
        /// Overrides the preset mode (`bars` or `oscilloscope`).
        #[arg(short, long)]
        mode: Option<String>,
        /// Number of 60 Hz host frames to simulate.
        #[arg(long, default_value_t = 120)]
        frames: u32,
        #[arg(long, default_value_t = 800.0)]
        width: f32,
        #[arg(long, default_value_t = 200.0)]
        height: f32,
        /// Tone frequencies in Hz mixed into the source signal.
        #[arg(long = "tone", default_values_t = [110.0, 440.0, 1760.0])]
        tones: Vec<f32>,
        /// Where to write the last painted frame as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the configuration a preset resolves to.
    Config {
        /// Optional JSON preset with visualisation options.
        preset: Option<PathBuf>,
    },
}
