//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::engine::SynthesizerSettings;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<CarillonConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {:?}", path))?;
    let config: CarillonConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Build validated synthesizer settings from a configuration
pub fn settings_from_config(config: &CarillonConfig) -> Result<SynthesizerSettings> {
    let mut settings = SynthesizerSettings::new(config.audio.sample_rate)?;
    settings.set_block_size(config.audio.block_size)?;
    settings.set_maximum_polyphony(config.audio.maximum_polyphony)?;
    settings.enable_reverb_and_chorus(config.audio.reverb_and_chorus);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
soundfont: bank.sf2

audio:
  sample_rate: 22050
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.audio.sample_rate, 22050);

        let settings = settings_from_config(&config).unwrap();
        assert_eq!(settings.sample_rate(), 22050);
        assert_eq!(settings.block_size(), 64);
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let yaml = r#"
soundfont: bank.sf2
audio:
  sample_rate: 300000
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(load_config(file.path()).is_err());
    }
}
