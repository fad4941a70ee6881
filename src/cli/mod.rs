//! CLI Module
//!
//! Command-line interface for Lull soundscapes.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::NoiseColor;

/// Lull - procedural sleep soundscapes
#[derive(Parser, Debug)]
#[command(name = "lull")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra presets: a TOML file or a directory of them
    #[arg(short, long, global = true)]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available presets
    #[command(name = "presets")]
    Presets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render a preset's soundscape to a WAV file
    #[command(name = "render")]
    Render {
        /// Preset id
        #[arg(short, long)]
        preset: String,

        /// Length in seconds
        #[arg(short, long, default_value_t = 30.0)]
        seconds: f64,

        /// Output WAV path
        #[arg(short, long)]
        out: PathBuf,

        /// Bit depth: 16, 24 or 32
        #[arg(short, long, default_value_t = 24)]
        bit_depth: u16,

        /// Fixed RNG seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write one looped noise buffer to a WAV file
    #[command(name = "noise")]
    Noise {
        /// pink or brown
        #[arg(long)]
        color: NoiseColor,

        /// Loop length in seconds
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f32,

        /// Output WAV path
        #[arg(short, long)]
        out: PathBuf,

        /// Fixed RNG seed for reproducible noise
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Play a preset on the audio device
    #[cfg(feature = "cpal-output")]
    #[command(name = "play")]
    Play {
        /// Preset id
        #[arg(short, long)]
        preset: String,

        /// Stop after this many seconds
        #[arg(short, long, default_value_t = 60.0)]
        seconds: f64,

        /// Output device name; default device when absent
        #[arg(long)]
        device: Option<String>,
    },
}
