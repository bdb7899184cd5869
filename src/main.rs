//! Carillon - SoundFont 2 wavetable MIDI synthesizer

use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use carillon::config;
use carillon::engine::{midi, player, MidiListener, Player, Recorder, Synthesizer};
use carillon::SoundFont;

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config: config_path, port } => {
            let cfg = config::load_config(&config_path)?;
            let settings = config::settings_from_config(&cfg)?;

            let mut synthesizer = Synthesizer::new(settings);
            synthesizer.load_soundfont(SoundFont::load(&cfg.soundfont)?)?;
            synthesizer.set_master_volume(cfg.master.volume_db);

            for channel in &cfg.channels {
                if !synthesizer.configure_channel(channel.channel, channel.bank, channel.preset) {
                    println!(
                        "Warning: preset {}:{} not found for channel {}",
                        channel.bank, channel.preset, channel.channel
                    );
                }
            }

            let synthesizer = Arc::new(Mutex::new(synthesizer));

            let mut player = Player::new();
            player.start(Arc::clone(&synthesizer))?;

            let _listener = MidiListener::connect(port.as_deref(), Arc::clone(&synthesizer))?;

            info!("playing, press Ctrl-C to stop");

            loop {
                std::thread::sleep(std::time::Duration::from_millis(250));
            }
        }

        Commands::Render {
            config: config_path,
            output,
            mono,
        } => {
            let cfg = config::load_config(&config_path)?;
            let settings = config::settings_from_config(&cfg)?;
            let sample_rate = settings.sample_rate();

            let mut synthesizer = Synthesizer::new(settings);
            synthesizer.load_soundfont(SoundFont::load(&cfg.soundfont)?)?;
            synthesizer.set_master_volume(cfg.master.volume_db);

            for channel in &cfg.channels {
                synthesizer.configure_channel(channel.channel, channel.bank, channel.preset);
            }

            println!("Rendering a C major scale to {:?}...", output);

            // One ascending octave, 0.4 second per note, plus a final
            // interval to let the last release fade out.
            let notes = [60u8, 62, 64, 65, 67, 69, 71, 72];
            let note_duration = (0.4 * sample_rate as f64) as usize;

            let nb_channels = if mono { 1 } else { 2 };
            let mut recorder = Recorder::new(&output, sample_rate, nb_channels)?;

            let mut left = vec![0.0f32; note_duration];
            let mut right = vec![0.0f32; note_duration];

            for i in 0..=notes.len() {
                if i > 0 {
                    synthesizer.note_off(0, notes[i - 1]);
                }
                if i < notes.len() {
                    synthesizer.note_on(0, notes[i], 100);
                }

                if mono {
                    synthesizer.render_mono(&mut left);
                    recorder.write_mono(&left)?;
                } else {
                    synthesizer.render_stereo(&mut left, &mut right);
                    recorder.write_stereo(&left, &right)?;
                }
            }

            let duration = recorder.duration_secs();
            recorder.finalize()?;

            println!("Wrote {:.1}s of audio to {:?}", duration, output);
        }

        Commands::Info { soundfont } => {
            let bank = SoundFont::load(&soundfont)?;
            let information = bank.information();

            println!("File:     {:?}", soundfont);
            println!(
                "Version:  {}.{}",
                information.major_version, information.minor_version
            );
            println!("Name:     {}", information.name);
            if !information.target_engine.is_empty() {
                println!("Engine:   {}", information.target_engine);
            }
            if !information.creation_date.is_empty() {
                println!("Date:     {}", information.creation_date);
            }
            if !information.creation_tool.is_empty() {
                println!("Tool:     {}", information.creation_tool);
            }
            if !information.copyright.is_empty() {
                println!("(c)       {}", information.copyright);
            }

            println!();
            println!(
                "{} samples, {} instruments, {} presets",
                bank.samples().len(),
                bank.instruments().len(),
                bank.presets().len()
            );

            println!();
            println!("Presets:");
            for (id, preset) in bank.presets() {
                println!("  {:3}:{:<3} {}", id.bank, id.number, preset.name);
            }
        }

        Commands::Devices => {
            println!("Audio output devices:\n");

            if let Some(name) = player::default_device_name() {
                println!("Default output: {}\n", name);
            }

            for (name, config) in player::list_output_devices() {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }

            println!("\nMIDI input ports:\n");
            match midi::list_midi_ports() {
                Ok(ports) if ports.is_empty() => println!("  (none)"),
                Ok(ports) => {
                    for port in ports {
                        println!("  - {}", port);
                    }
                }
                Err(e) => println!("  Error listing ports: {}", e),
            }
        }

        Commands::Init => {
            let example_config = include_str!("../carillon.example.yaml");

            let path = "carillon.yaml";
            if std::path::Path::new(path).exists() {
                println!("carillon.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created carillon.yaml with example configuration.");
            }
        }
    }

    Ok(())
}
