//! Rebound CLI
//!
//! Simulate springs, convert between config units, and inspect preset files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rebound_core::conversion::{origami_from_friction, origami_from_tension};
use rebound_core::{BouncyConversion, PresetFile, SpringConfig, SIXTY_FPS};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod simulate;

use config::ConfigSource;
use simulate::Simulation;

#[derive(Parser)]
#[command(name = "rebound")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Spring physics simulation toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a spring from one value to another and print every tick
    Simulate {
        /// Spring tension (origami units unless --raw)
        #[arg(long, conflicts_with = "preset")]
        tension: Option<f64>,

        /// Spring friction (origami units unless --raw)
        #[arg(long, conflicts_with = "preset")]
        friction: Option<f64>,

        /// Interpret --tension and --friction as raw values
        #[arg(long)]
        raw: bool,

        /// Named preset to load from --presets
        #[arg(long, requires = "presets")]
        preset: Option<String>,

        /// TOML preset file
        #[arg(long)]
        presets: Option<PathBuf>,

        /// Start value
        #[arg(long, default_value = "0")]
        from: f64,

        /// End value
        #[arg(long, default_value = "1")]
        to: f64,

        /// Milliseconds per tick
        #[arg(long, default_value_t = SIXTY_FPS)]
        time_step: f64,

        /// Stop the spring as soon as it passes the end value
        #[arg(long)]
        clamp: bool,

        /// Give up after this many simulated milliseconds
        #[arg(long, default_value = "10000")]
        max_duration: f64,

        /// Print samples as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert bounciness/speed into tension/friction
    Convert {
        /// Bounciness, 0 to 20
        #[arg(short, long)]
        bounciness: f64,

        /// Speed, 0 to 20
        #[arg(short, long)]
        speed: f64,
    },

    /// List the presets in a preset file
    Presets {
        /// TOML preset file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Simulate {
            tension,
            friction,
            raw,
            preset,
            presets,
            from,
            to,
            time_step,
            clamp,
            max_duration,
            json,
        } => {
            let source = ConfigSource {
                tension,
                friction,
                raw,
                preset: preset.as_deref(),
                presets_file: presets.as_deref(),
            };
            let simulation = Simulation {
                config: source.resolve()?,
                from,
                to,
                time_step_ms: time_step,
                overshoot_clamping: clamp,
                max_duration_ms: max_duration,
            };
            cmd_simulate(&simulation, json)
        }

        Commands::Convert { bounciness, speed } => cmd_convert(bounciness, speed),

        Commands::Presets { file } => cmd_presets(&file),
    }
}

fn cmd_simulate(simulation: &Simulation, json: bool) -> Result<()> {
    info!(
        "Simulating tension {:.3}, friction {:.3}",
        simulation.config.tension(),
        simulation.config.friction()
    );

    let trajectory = simulation.run()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trajectory.samples)?);
    } else {
        println!("{:>10}  {:>12}  {:>12}", "time (ms)", "position", "velocity");
        for sample in &trajectory.samples {
            println!(
                "{:>10.1}  {:>12.5}  {:>12.5}",
                sample.time_ms, sample.position, sample.velocity
            );
        }
    }

    let elapsed = trajectory.samples.last().map_or(0.0, |s| s.time_ms);
    if trajectory.settled {
        info!("At rest after {:.1} ms", elapsed);
    } else {
        anyhow::bail!("Spring did not come to rest within {:.1} ms", elapsed);
    }

    Ok(())
}

fn cmd_convert(bounciness: f64, speed: f64) -> Result<()> {
    print!("{}", format_conversion(bounciness, speed)?);
    Ok(())
}

fn format_conversion(bounciness: f64, speed: f64) -> Result<String> {
    if !bounciness.is_finite() || !speed.is_finite() {
        anyhow::bail!("Bounciness and speed must be finite");
    }

    let conversion = BouncyConversion::new(speed, bounciness);
    let config = SpringConfig::from_bounciness_and_speed(bounciness, speed);

    let mut out = String::new();
    writeln!(out, "Bounciness {} / speed {}", bounciness, speed)?;
    writeln!(
        out,
        "  origami:  tension {:.4}  friction {:.4}",
        conversion.bouncy_tension(),
        conversion.bouncy_friction()
    )?;
    writeln!(
        out,
        "  raw:      tension {:.4}  friction {:.4}",
        config.tension(),
        config.friction()
    )?;
    Ok(out)
}

fn cmd_presets(file: &Path) -> Result<()> {
    let presets = config::load_preset_file(file)?;

    if presets.presets.is_empty() {
        info!("No presets in {}", file.display());
        return Ok(());
    }

    print!("{}", format_presets(&presets)?);
    Ok(())
}

fn format_presets(presets: &PresetFile) -> Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "{:<24}  {:>10}  {:>10}  {:>10}  {:>10}",
        "name", "tension", "friction", "o.tension", "o.friction"
    )?;
    for (name, config) in presets.configs()? {
        writeln!(
            out,
            "{:<24}  {:>10.3}  {:>10.3}  {:>10.2}  {:>10.2}",
            name,
            config.tension(),
            config.friction(),
            origami_from_tension(config.tension()),
            origami_from_friction(config.friction())
        )?;
    }
    Ok(out)
}
