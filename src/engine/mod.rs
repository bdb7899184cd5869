//! The synthesizer engine
//!
//! Ties the SoundFont bank, the sixteen MIDI channels and the voice pool
//! together: MIDI dispatch, note lifecycle with the GM preset fallback, and
//! the block-based renderer that mixes the active voices into mono or
//! stereo output with per-block gain interpolation.

pub mod midi;
pub mod player;
pub mod recorder;

pub use midi::MidiListener;
pub use player::Player;
pub use recorder::Recorder;

use anyhow::{bail, Result};
use tracing::debug;

use crate::soundfont::{GeneratorType, PresetId, SoundFont};
use crate::synth::{decibels_to_linear, linear_to_decibels, Channel, VoiceCollection, NON_AUDIBLE};

const CHANNEL_COUNT: usize = 16;
const PERCUSSION_CHANNEL: usize = 9;

/// Settings for a synthesizer
///
/// Assigned at construction and fixed for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct SynthesizerSettings {
    sample_rate: u32,
    block_size: usize,
    maximum_polyphony: usize,
    reverb_and_chorus_enabled: bool,
}

impl SynthesizerSettings {
    const DEFAULT_BLOCK_SIZE: usize = 64;
    const DEFAULT_MAXIMUM_POLYPHONY: usize = 64;

    /// Create settings with the given output sample rate
    pub fn new(sample_rate: u32) -> Result<Self> {
        if !(16000..=192000).contains(&sample_rate) {
            bail!("the sample rate must be between 16000 and 192000");
        }

        Ok(Self {
            sample_rate,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            maximum_polyphony: Self::DEFAULT_MAXIMUM_POLYPHONY,
            reverb_and_chorus_enabled: true,
        })
    }

    /// Set the block size used internally during synthesis
    pub fn set_block_size(&mut self, block_size: usize) -> Result<()> {
        if !(8..=1024).contains(&block_size) {
            bail!("the block size must be between 8 and 1024");
        }
        self.block_size = block_size;
        Ok(())
    }

    /// Set the maximum number of notes playing at any single time
    pub fn set_maximum_polyphony(&mut self, maximum_polyphony: usize) -> Result<()> {
        if !(8..=256).contains(&maximum_polyphony) {
            bail!("the maximum polyphony must be between 8 and 256");
        }
        self.maximum_polyphony = maximum_polyphony;
        Ok(())
    }

    /// Enable or disable the reverb and chorus send outputs
    pub fn enable_reverb_and_chorus(&mut self, enable: bool) {
        self.reverb_and_chorus_enabled = enable;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn maximum_polyphony(&self) -> usize {
        self.maximum_polyphony
    }

    pub fn reverb_and_chorus_enabled(&self) -> bool {
        self.reverb_and_chorus_enabled
    }
}

/// A MIDI synthesizer driven by a SoundFont bank
///
/// A bank must be loaded before any synthesis can happen; until then
/// note-on has no effect. The engine is controlled either with raw MIDI
/// messages through `process_midi_message` or with the dedicated methods.
pub struct Synthesizer {
    settings: SynthesizerSettings,

    soundfont: Option<SoundFont>,
    default_preset: PresetId,

    channels: Vec<Channel>,
    voices: VoiceCollection,

    block_left: Vec<f32>,
    block_right: Vec<f32>,
    blocks_offset: usize,
    inverse_block_size: f32,

    nb_rendered_samples: u64,
    master_volume: f32,
}

impl Synthesizer {
    pub fn new(settings: SynthesizerSettings) -> Self {
        let channels = (0..CHANNEL_COUNT)
            .map(|i| Channel::new(i == PERCUSSION_CHANNEL))
            .collect();

        let voices = VoiceCollection::new(
            settings.maximum_polyphony(),
            settings.sample_rate(),
            settings.block_size(),
            settings.reverb_and_chorus_enabled(),
        );

        let block_size = settings.block_size();

        Self {
            settings,
            soundfont: None,
            default_preset: PresetId { bank: 0, number: 0 },
            channels,
            voices,
            block_left: vec![0.0; block_size],
            block_right: vec![0.0; block_size],
            blocks_offset: block_size,
            inverse_block_size: 1.0 / block_size as f32,
            nb_rendered_samples: 0,
            master_volume: 1.0,
        }
    }

    /// Load a SoundFont bank into the synthesizer
    pub fn load_soundfont(&mut self, soundfont: SoundFont) -> Result<()> {
        let default_preset = match soundfont.presets().keys().next() {
            Some(id) => *id,
            None => bail!("the SoundFont bank has no preset"),
        };

        self.soundfont = Some(soundfont);
        self.default_preset = default_preset;

        Ok(())
    }

    pub fn soundfont(&self) -> Option<&SoundFont> {
        self.soundfont.as_ref()
    }

    pub fn settings(&self) -> &SynthesizerSettings {
        &self.settings
    }

    /// Process a MIDI channel message
    ///
    /// Returns false (with no other effect) when the channel is out of
    /// range; unknown commands and controllers are ignored.
    pub fn process_midi_message(
        &mut self,
        channel: u8,
        command: u8,
        data1: u8,
        data2: u8,
    ) -> bool {
        if channel as usize >= self.channels.len() {
            return false;
        }

        match command {
            // Note Off
            0x80 => self.note_off(channel, data1),

            // Note On
            0x90 => self.note_on(channel, data1, data2),

            // Controller
            0xB0 => {
                let channel_info = &mut self.channels[channel as usize];
                match data1 {
                    // Bank Selection
                    0x00 => channel_info.set_bank(data2),
                    // Modulation Coarse
                    0x01 => channel_info.set_modulation_coarse(data2),
                    // Modulation Fine
                    0x21 => channel_info.set_modulation_fine(data2),
                    // Data Entry Coarse
                    0x06 => channel_info.set_data_entry_coarse(data2),
                    // Data Entry Fine
                    0x26 => channel_info.set_data_entry_fine(data2),
                    // Channel Volume Coarse
                    0x07 => channel_info.set_volume_coarse(data2),
                    // Channel Volume Fine
                    0x27 => channel_info.set_volume_fine(data2),
                    // Pan Coarse
                    0x0A => channel_info.set_pan_coarse(data2),
                    // Pan Fine
                    0x2A => channel_info.set_pan_fine(data2),
                    // Expression Coarse
                    0x0B => channel_info.set_expression_coarse(data2),
                    // Expression Fine
                    0x2B => channel_info.set_expression_fine(data2),
                    // Sustain
                    0x40 => channel_info.set_sustain(data2),
                    // Reverb Send
                    0x5B => channel_info.set_reverb_send(data2),
                    // Chorus Send
                    0x5D => channel_info.set_chorus_send(data2),
                    // RPN Coarse
                    0x65 => channel_info.set_rpn_coarse(data2),
                    // RPN Fine
                    0x64 => channel_info.set_rpn_fine(data2),
                    // All Sound Off
                    0x78 => self.all_notes_off_channel(channel, true),
                    // Reset All Controllers
                    0x79 => self.reset_controllers(channel),
                    // All Notes Off
                    0x7B => self.all_notes_off_channel(channel, false),
                    _ => {}
                }
            }

            // Program Change
            0xC0 => self.channels[channel as usize].set_preset(data1),

            // Pitch Bend
            0xE0 => self.channels[channel as usize].set_pitch_bend(data1, data2),

            _ => {}
        }

        true
    }

    /// Start to press a key
    pub fn note_on(&mut self, channel: u8, key: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, key);
            return;
        }

        if channel as usize >= self.channels.len() {
            return;
        }

        let soundfont = match &self.soundfont {
            Some(soundfont) => soundfont,
            None => return,
        };

        let channel_info = &self.channels[channel as usize];

        let mut preset_id = PresetId {
            bank: channel_info.bank() as u16,
            number: channel_info.preset() as u16,
        };

        let mut key_info = soundfont.key_info(preset_id.bank, preset_id.number, key, velocity);

        if key_info.is_none() {
            // Fall back to the GM sound set. The preset number with bank 0
            // normally works; for drums (bank >= 128) the standard set 128:0
            // is the better choice.
            if preset_id.bank < 128 {
                preset_id.bank = 0;
            } else {
                preset_id.bank = 128;
                preset_id.number = 0;
            }

            key_info = soundfont.key_info(preset_id.bank, preset_id.number, key, velocity);
        }

        if key_info.is_none() {
            // No corresponding preset was found. Use the default one.
            key_info = soundfont.key_info(
                self.default_preset.bank,
                self.default_preset.number,
                key,
                velocity,
            );
        }

        let key_info = match key_info {
            Some(key_info) => key_info,
            None => {
                debug!(channel, key, "no preset zone matches the key, note dropped");
                return;
            }
        };

        let exclusive_class = key_info
            .left
            .generator(GeneratorType::ExclusiveClass, 0)
            .uvalue();

        let buffer = std::sync::Arc::clone(soundfont.buffer());

        let index = self.voices.request(channel, exclusive_class);
        self.voices
            .voice_mut(index)
            .start(&key_info, &buffer, channel, key, velocity);
    }

    /// Release a key
    pub fn note_off(&mut self, channel: u8, key: u8) {
        if channel as usize >= self.channels.len() {
            return;
        }

        for voice in self.voices.active_voices_mut() {
            if voice.channel() == channel && voice.key() == key {
                voice.end();
            }
        }
    }

    /// Release all keys on all channels
    pub fn all_notes_off(&mut self, immediate: bool) {
        if immediate {
            self.voices.clear();
        } else {
            for voice in self.voices.active_voices_mut() {
                voice.end();
            }
        }
    }

    /// Release all keys of one channel
    pub fn all_notes_off_channel(&mut self, channel: u8, immediate: bool) {
        for voice in self.voices.active_voices_mut() {
            if voice.channel() == channel {
                if immediate {
                    voice.kill();
                } else {
                    voice.end();
                }
            }
        }
    }

    /// Reset the controllers of all channels
    pub fn reset_all_controllers(&mut self) {
        for channel in &mut self.channels {
            channel.reset_controllers();
        }
    }

    /// Reset the controllers of one channel
    pub fn reset_controllers(&mut self, channel: u8) {
        if let Some(channel) = self.channels.get_mut(channel as usize) {
            channel.reset_controllers();
        }
    }

    /// Reset the synthesizer, as if nothing had been played or rendered
    pub fn reset(&mut self) {
        self.voices.clear();

        for channel in &mut self.channels {
            channel.reset();
        }

        self.blocks_offset = self.settings.block_size();
        self.nb_rendered_samples = 0;
    }

    /// Assign a preset to a channel; false if the preset does not exist
    pub fn configure_channel(&mut self, channel: u8, bank: u8, preset: u8) -> bool {
        if channel as usize >= self.channels.len() {
            return false;
        }

        let soundfont = match &self.soundfont {
            Some(soundfont) => soundfont,
            None => return false,
        };

        if soundfont.preset(bank as u16, preset as u16).is_none() {
            return false;
        }

        let channel_info = &mut self.channels[channel as usize];
        channel_info.set_bank(bank);
        channel_info.set_preset(preset);

        true
    }

    /// Names of all the presets in the loaded bank
    pub fn preset_names(&self) -> Vec<(PresetId, String)> {
        match &self.soundfont {
            Some(soundfont) => soundfont
                .presets()
                .iter()
                .map(|(id, preset)| (*id, preset.name.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn channel(&self, channel: u8) -> Option<&Channel> {
        self.channels.get(channel as usize)
    }

    pub fn nb_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn nb_active_voices(&self) -> usize {
        self.voices.nb_active_voices()
    }

    pub fn nb_rendered_samples(&self) -> u64 {
        self.nb_rendered_samples
    }

    /// Set the master volume, in decibels
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = decibels_to_linear(volume);
    }

    /// The master volume, in decibels
    pub fn master_volume(&self) -> f32 {
        linear_to_decibels(self.master_volume)
    }

    /// Render stereo audio into the left and right buffers
    ///
    /// Both buffers must have the same length; that many samples are
    /// produced.
    pub fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        assert_eq!(left.len(), right.len());

        let block_size = self.settings.block_size();
        let mut nb_written = 0;

        while nb_written < left.len() {
            if self.blocks_offset == block_size {
                self.render_block_stereo();
                self.blocks_offset = 0;
            }

            let src_remainder = block_size - self.blocks_offset;
            let dst_remainder = left.len() - nb_written;
            let remainder = src_remainder.min(dst_remainder);

            left[nb_written..nb_written + remainder]
                .copy_from_slice(&self.block_left[self.blocks_offset..self.blocks_offset + remainder]);
            right[nb_written..nb_written + remainder].copy_from_slice(
                &self.block_right[self.blocks_offset..self.blocks_offset + remainder],
            );

            self.blocks_offset += remainder;
            nb_written += remainder;
        }

        self.nb_rendered_samples += nb_written as u64;
    }

    /// Render mono audio into the buffer
    pub fn render_mono(&mut self, buffer: &mut [f32]) {
        let block_size = self.settings.block_size();
        let mut nb_written = 0;

        while nb_written < buffer.len() {
            if self.blocks_offset == block_size {
                self.render_block_mono();
                self.blocks_offset = 0;
            }

            let src_remainder = block_size - self.blocks_offset;
            let dst_remainder = buffer.len() - nb_written;
            let remainder = src_remainder.min(dst_remainder);

            buffer[nb_written..nb_written + remainder]
                .copy_from_slice(&self.block_left[self.blocks_offset..self.blocks_offset + remainder]);

            self.blocks_offset += remainder;
            nb_written += remainder;
        }

        self.nb_rendered_samples += nb_written as u64;
    }

    fn render_block_stereo(&mut self) {
        self.voices.process(&self.channels);

        self.block_left.fill(0.0);
        self.block_right.fill(0.0);

        let master_volume = self.master_volume;
        let inverse_block_size = self.inverse_block_size;

        for voice in self.voices.active_voices() {
            let previous_gain = master_volume * voice.previous_mix_gain_left();
            let current_gain = master_volume * voice.current_mix_gain_left();
            write_block(
                previous_gain,
                current_gain,
                voice.block_left(),
                &mut self.block_left,
                inverse_block_size,
            );

            let previous_gain = master_volume * voice.previous_mix_gain_right();
            let current_gain = master_volume * voice.current_mix_gain_right();
            write_block(
                previous_gain,
                current_gain,
                if voice.stereo() {
                    voice.block_right()
                } else {
                    voice.block_left()
                },
                &mut self.block_right,
                inverse_block_size,
            );
        }
    }

    fn render_block_mono(&mut self) {
        self.voices.process(&self.channels);

        self.block_left.fill(0.0);

        let master_volume = self.master_volume;
        let inverse_block_size = self.inverse_block_size;

        for voice in self.voices.active_voices() {
            if voice.stereo() {
                let previous_gain = master_volume * voice.previous_mix_gain_left();
                let current_gain = master_volume * voice.current_mix_gain_left();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_left(),
                    &mut self.block_left,
                    inverse_block_size,
                );

                let previous_gain = master_volume * voice.previous_mix_gain_right();
                let current_gain = master_volume * voice.current_mix_gain_right();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_right(),
                    &mut self.block_left,
                    inverse_block_size,
                );
            } else {
                let previous_gain = master_volume * voice.previous_mix_gain_left();
                let current_gain = master_volume * voice.current_mix_gain_left();
                write_block(
                    previous_gain,
                    current_gain,
                    voice.block_left(),
                    &mut self.block_left,
                    inverse_block_size,
                );
            }
        }
    }
}

/// Accumulate a voice block into an output block with gain interpolation
///
/// A gain change below 1e-3 is applied flat; otherwise the gain ramps
/// linearly from the previous block's value to the current one.
fn write_block(
    previous_gain: f32,
    current_gain: f32,
    source: &[f32],
    destination: &mut [f32],
    inverse_block_size: f32,
) {
    if previous_gain.max(current_gain) < NON_AUDIBLE {
        return;
    }

    if (current_gain - previous_gain).abs() < 1.0e-3 {
        for (destination, source) in destination.iter_mut().zip(source) {
            *destination += current_gain * source;
        }
    } else {
        let step = inverse_block_size * (current_gain - previous_gain);
        let mut gain = previous_gain;

        for (destination, source) in destination.iter_mut().zip(source) {
            *destination += gain * source;
            gain += step;
        }
    }
}
