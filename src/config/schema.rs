//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for Carillon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarillonConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Master settings
    #[serde(default)]
    pub master: MasterConfig,

    /// Path to the SoundFont bank file
    pub soundfont: PathBuf,

    /// Per-channel preset assignments
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl CarillonConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate < 16000 || self.audio.sample_rate > 192000 {
            bail!("sample rate must be between 16000 and 192000");
        }
        if self.audio.block_size < 8 || self.audio.block_size > 1024 {
            bail!("block size must be between 8 and 1024");
        }
        if self.audio.maximum_polyphony < 8 || self.audio.maximum_polyphony > 256 {
            bail!("maximum polyphony must be between 8 and 256");
        }

        for channel in &self.channels {
            if channel.channel > 15 {
                bail!("channel number {} is out of range (0-15)", channel.channel);
            }
        }

        Ok(())
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Synthesis block size in samples (default: 64)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Maximum number of concurrent notes (default: 64)
    #[serde(default = "default_maximum_polyphony")]
    pub maximum_polyphony: usize,

    /// Whether reverb and chorus send levels are produced (default: true)
    #[serde(default = "default_reverb_and_chorus")]
    pub reverb_and_chorus: bool,

    /// Output device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            maximum_polyphony: default_maximum_polyphony(),
            reverb_and_chorus: default_reverb_and_chorus(),
            device: None,
        }
    }
}

fn default_sample_rate() -> u32 {
    44100
}
fn default_block_size() -> usize {
    64
}
fn default_maximum_polyphony() -> usize {
    64
}
fn default_reverb_and_chorus() -> bool {
    true
}

/// Master settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Master volume in decibels (default: 0)
    #[serde(default)]
    pub volume_db: f32,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self { volume_db: 0.0 }
    }
}

/// Preset assignment for one MIDI channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// MIDI channel number (0-15)
    pub channel: u8,

    /// Bank number of the preset
    #[serde(default)]
    pub bank: u8,

    /// Preset number
    #[serde(default)]
    pub preset: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let yaml = "soundfont: bank.sf2";
        let config: CarillonConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.soundfont, PathBuf::from("bank.sf2"));
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.block_size, 64);
        assert_eq!(config.audio.maximum_polyphony, 64);
        assert!(config.audio.reverb_and_chorus);
        assert_eq!(config.master.volume_db, 0.0);
        assert!(config.channels.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
soundfont: /banks/general_midi.sf2

audio:
  sample_rate: 22050
  block_size: 128
  maximum_polyphony: 32
  reverb_and_chorus: false

master:
  volume_db: -6.0

channels:
  - channel: 0
    bank: 0
    preset: 0
  - channel: 9
    bank: 128
    preset: 0
"#;
        let config: CarillonConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.block_size, 128);
        assert!(!config.audio.reverb_and_chorus);
        assert_eq!(config.master.volume_db, -6.0);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[1].bank, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let yaml = r#"
soundfont: bank.sf2
audio:
  sample_rate: 8000
"#;
        let config: CarillonConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
soundfont: bank.sf2
audio:
  block_size: 4096
"#;
        let config: CarillonConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
soundfont: bank.sf2
channels:
  - channel: 16
"#;
        let config: CarillonConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
