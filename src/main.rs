//! Lull CLI - Procedural Sleep Soundscapes
//!
//! Command-line interface for rendering and playing Lull presets.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lull::cli::{commands, Cli, Commands};
use lull::config::EngineConfig;
use lull::LullError;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        if let Some(lull_err) = err.downcast_ref::<LullError>() {
            for suggestion in lull_err.recovery_suggestions() {
                eprintln!("  - {}", suggestion);
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Lull v{}", env!("CARGO_PKG_VERSION"));

    let mut config = EngineConfig::load_or_default(cli.config.as_deref())
        .with_context(|| "failed to load engine configuration")?;
    let library = cli.library.as_deref();

    match cli.command {
        Some(Commands::Presets { json }) => commands::list_presets(library, json)?,
        Some(Commands::Render {
            preset,
            seconds,
            out,
            bit_depth,
            seed,
        }) => {
            if let Some(seed) = seed {
                config.seed = Some(seed);
            }
            commands::render(&config, library, &preset, seconds, &out, bit_depth)?
        }
        Some(Commands::Noise {
            color,
            seconds,
            out,
            seed,
        }) => {
            if let Some(seed) = seed {
                config.seed = Some(seed);
            }
            commands::noise(&config, color, seconds, &out)?
        }
        #[cfg(feature = "cpal-output")]
        Some(Commands::Play {
            preset,
            seconds,
            device,
        }) => commands::play(&config, library, &preset, seconds, device.as_deref())?,
        None => {
            println!("Lull v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
        }
    }
    Ok(())
}
