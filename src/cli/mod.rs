//! CLI interface for Carillon

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SoundFont 2 wavetable MIDI synthesizer
#[derive(Parser)]
#[command(name = "carillon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play live from a MIDI input port
    Play {
        /// Configuration file path
        #[arg(short, long, default_value = "carillon.yaml")]
        config: PathBuf,

        /// MIDI input port name (substring match, default: first port)
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Render a demo scale to a WAV file
    Render {
        /// Configuration file path
        #[arg(short, long, default_value = "carillon.yaml")]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Render a mono file instead of stereo
        #[arg(long)]
        mono: bool,
    },

    /// Print the metadata and presets of a SoundFont file
    Info {
        /// SoundFont file path
        soundfont: PathBuf,
    },

    /// List available audio and MIDI devices
    Devices,

    /// Generate an example configuration file
    Init,
}
