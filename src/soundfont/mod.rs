//! SoundFont 2 bank
//!
//! Owns the decoded contents of a SoundFont file (wavetable, sample headers,
//! instruments and presets) and resolves a (bank, preset, key, velocity)
//! tuple into the merged generator and modulator values a voice needs.

mod parser;
mod types;

pub use types::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

/// A loaded SoundFont bank
pub struct SoundFont {
    information: Information,
    buffer: Arc<Vec<f32>>,
    presets: PresetMap,
    instruments: Vec<Instrument>,
    samples: Vec<Sample>,
}

impl SoundFont {
    /// Load a SoundFont file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read SoundFont file {:?}", path))?;
        Self::from_bytes(&bytes)
    }

    /// Load a SoundFont from its raw file contents
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let soundfont = parser::parse(bytes)?;

        info!(
            name = %soundfont.information.name,
            presets = soundfont.presets.len(),
            instruments = soundfont.instruments.len(),
            samples = soundfont.samples.len(),
            "loaded SoundFont bank"
        );

        Ok(soundfont)
    }

    /// Build a bank from already-decoded parts
    ///
    /// This is the structured-data entry point for callers with their own
    /// decoder. Zones must be pre-flattened: global zones merged into their
    /// siblings, every preset zone carrying an `Instrument` generator and
    /// every instrument zone a `SampleId` generator.
    pub fn from_parts(
        information: Information,
        buffer: Vec<f32>,
        presets: PresetMap,
        instruments: Vec<Instrument>,
        samples: Vec<Sample>,
    ) -> Self {
        Self {
            information,
            buffer: Arc::new(buffer),
            presets,
            instruments,
            samples,
        }
    }

    pub fn information(&self) -> &Information {
        &self.information
    }

    /// The wavetable all sample regions index into
    pub fn buffer(&self) -> &Arc<Vec<f32>> {
        &self.buffer
    }

    pub fn presets(&self) -> &PresetMap {
        &self.presets
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The preset identified by bank:number, if present
    pub fn preset(&self, bank: u16, number: u16) -> Option<&Preset> {
        self.presets.get(&PresetId { bank, number })
    }

    /// Resolve everything needed to synthesize a key with a given preset
    ///
    /// Scans the preset zones in order for the first whose key and velocity
    /// ranges contain the note, follows its instrument reference the same
    /// way, and merges the preset generators and modulators on top of the
    /// instrument ones. A stereo sample pulls in the paired instrument zone
    /// (the one matching the note with a different sample id) for the other
    /// channel.
    pub fn key_info(&self, bank: u16, number: u16, key: u8, velocity: u8) -> Option<KeyInfo> {
        let preset = self.preset(bank, number)?;

        let preset_zone = find_zone(&preset.zones, key, velocity, None)?;

        let instrument_index = preset_zone
            .generators
            .get(&GeneratorType::Instrument)?
            .ivalue();
        let instrument = self.instruments.get(instrument_index as usize)?;

        let instrument_zone = find_zone(&instrument.zones, key, velocity, None)?;

        let sample_id = instrument_zone
            .generators
            .get(&GeneratorType::SampleId)?
            .ivalue();
        let sample = self.samples.get(sample_id as usize)?;

        if sample.sample_type.is_mono() {
            return Some(KeyInfo {
                stereo: false,
                left: fill_sample_info(instrument_zone, preset_zone, sample.clone()),
                right: None,
            });
        }

        let instrument_zone2 = find_zone(&instrument.zones, key, velocity, Some(sample_id))?;
        let sample_id2 = instrument_zone2
            .generators
            .get(&GeneratorType::SampleId)?
            .ivalue();
        let sample2 = self.samples.get(sample_id2 as usize)?;

        let first = fill_sample_info(instrument_zone, preset_zone, sample.clone());
        let second = fill_sample_info(instrument_zone2, preset_zone, sample2.clone());

        let (left, right) = if sample.sample_type.is_left() {
            (first, second)
        } else {
            (second, first)
        };

        Some(KeyInfo {
            stereo: true,
            left,
            right: Some(right),
        })
    }
}

/// First zone whose ranges contain the key/velocity pair, in list order
///
/// Overlapping zones are legal and the scan order is load-bearing: some
/// banks rely on it to select timbres. `exclude_sample_id` skips the zone
/// already used for the first channel of a stereo pair.
fn find_zone<'a>(
    zones: &'a [Zone],
    key: u8,
    velocity: u8,
    exclude_sample_id: Option<i16>,
) -> Option<&'a Zone> {
    zones.iter().find(|zone| {
        zone.keys_range.contains(key)
            && zone.velocities_range.contains(velocity)
            && match exclude_sample_id {
                Some(excluded) => zone
                    .generators
                    .get(&GeneratorType::SampleId)
                    .map(|amount| amount.ivalue() != excluded)
                    .unwrap_or(true),
                None => true,
            }
    })
}

/// Generators the preset level contributes as unsigned additions
const UNSIGNED_SUM_GENERATORS: [GeneratorType; 8] = [
    GeneratorType::InitialFilterCutoffFrequency,
    GeneratorType::InitialFilterQ,
    GeneratorType::ChorusEffectsSend,
    GeneratorType::ReverbEffectsSend,
    GeneratorType::SustainModulationEnvelope,
    GeneratorType::SustainVolumeEnvelope,
    GeneratorType::InitialAttenuation,
    GeneratorType::ScaleTuning,
];

/// Generators the preset level contributes as signed additions
const SIGNED_SUM_GENERATORS: [GeneratorType; 27] = [
    GeneratorType::ModulationLfoToPitch,
    GeneratorType::VibratoLfoToPitch,
    GeneratorType::ModulationEnvelopeToPitch,
    GeneratorType::ModulationLfoToFilterCutoffFrequency,
    GeneratorType::ModulationEnvelopeToFilterCutoffFrequency,
    GeneratorType::ModulationLfoToVolume,
    GeneratorType::Pan,
    GeneratorType::DelayModulationLfo,
    GeneratorType::FrequencyModulationLfo,
    GeneratorType::DelayVibratoLfo,
    GeneratorType::FrequencyVibratoLfo,
    GeneratorType::DelayModulationEnvelope,
    GeneratorType::AttackModulationEnvelope,
    GeneratorType::HoldModulationEnvelope,
    GeneratorType::DecayModulationEnvelope,
    GeneratorType::ReleaseModulationEnvelope,
    GeneratorType::KeyNumberToModulationEnvelopeHold,
    GeneratorType::KeyNumberToModulationEnvelopeDecay,
    GeneratorType::DelayVolumeEnvelope,
    GeneratorType::AttackVolumeEnvelope,
    GeneratorType::HoldVolumeEnvelope,
    GeneratorType::DecayVolumeEnvelope,
    GeneratorType::ReleaseVolumeEnvelope,
    GeneratorType::KeyNumberToVolumeEnvelopeHold,
    GeneratorType::KeyNumberToVolumeEnvelopeDecay,
    GeneratorType::CoarseTune,
    GeneratorType::FineTune,
];

/// Merge the preset zone on top of the instrument zone
///
/// The instrument map (which already contains the bank defaults and the
/// instrument's global zone) is the base. Preset generators add to it:
/// unsigned or signed depending on the generator kind. Any other preset
/// generator (ranges, references, key/velocity overrides) is not
/// preset-legal and is ignored. Modulator amounts add on identity matches.
fn fill_sample_info(instrument_zone: &Zone, preset_zone: &Zone, sample: Sample) -> SampleInfo {
    let mut generators = instrument_zone.generators.clone();

    for (&generator_type, &amount) in &preset_zone.generators {
        if UNSIGNED_SUM_GENERATORS.contains(&generator_type) {
            generators
                .entry(generator_type)
                .and_modify(|existing| {
                    *existing = GeneratorAmount(existing.uvalue().wrapping_add(amount.uvalue()))
                })
                .or_insert(amount);
        } else if SIGNED_SUM_GENERATORS.contains(&generator_type) {
            generators
                .entry(generator_type)
                .and_modify(|existing| {
                    *existing =
                        GeneratorAmount::from_i16(existing.ivalue().wrapping_add(amount.ivalue()))
                })
                .or_insert(amount);
        }
    }

    let mut modulators = instrument_zone.modulators.clone();

    for (&modulator_id, &modulator) in &preset_zone.modulators {
        modulators
            .entry(modulator_id)
            .and_modify(|existing| {
                existing.amount = existing.amount.wrapping_add(modulator.amount)
            })
            .or_insert(modulator);
    }

    SampleInfo {
        generators,
        modulators,
        sample,
    }
}
