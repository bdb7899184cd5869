//! Per-note voice
//!
//! A voice owns one or two tracks (mono, or a left/right sample pair), each
//! with its own sampler, envelopes, LFOs and filter. At note-on the
//! SoundFont generator values are resolved into runtime parameters; each
//! rendered block advances the sub-components and produces a sample block
//! and a pair of mix gains for the output accumulator.

use std::sync::Arc;

use crate::soundfont::{GeneratorType, KeyInfo, SampleInfo};

use super::channel::Channel;
use super::envelope::{ModulationEnvelope, VolumeEnvelope, NON_AUDIBLE};
use super::filter::BiQuadFilter;
use super::lfo::Lfo;
use super::sampler::{LoopMode, Sampler};
use super::{
    cents_to_hertz, cents_to_multiplying_factor, decibels_to_linear,
    key_number_to_multiplying_factor, linear_to_decibels, timecents_to_seconds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceState {
    Playing,
    ReleaseRequested,
    Released,
}

/// One synthesis chain: sampler through filter, with its own gains
struct Track {
    volume_envelope: VolumeEnvelope,
    modulation_envelope: ModulationEnvelope,

    vibrato_lfo: Lfo,
    modulation_lfo: Lfo,

    sampler: Sampler,
    filter: BiQuadFilter,

    note_gain: f32,

    cutoff: f32,
    resonance: f32,

    vib_lfo_to_pitch: f32,
    mod_lfo_to_pitch: f32,
    mod_env_to_pitch: f32,

    mod_lfo_to_cutoff: i16,
    mod_env_to_cutoff: i16,
    dynamic_cutoff: bool,

    mod_lfo_to_volume: f32,
    dynamic_volume: bool,

    instrument_pan: f32,
    instrument_reverb: f32,
    instrument_chorus: f32,

    // Some instruments require fast cutoff change, which can cause pop
    // noise. This is used to smooth out the cutoff frequency.
    smoothed_cutoff: f32,

    block: Vec<f32>,

    previous_mix_gain: f32,
    current_mix_gain: f32,
}

impl Track {
    fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            volume_envelope: VolumeEnvelope::new(sample_rate),
            modulation_envelope: ModulationEnvelope::new(sample_rate),
            vibrato_lfo: Lfo::new(sample_rate, block_size as u32),
            modulation_lfo: Lfo::new(sample_rate, block_size as u32),
            sampler: Sampler::new(sample_rate),
            filter: BiQuadFilter::new(sample_rate),
            note_gain: 0.0,
            cutoff: 0.0,
            resonance: 0.0,
            vib_lfo_to_pitch: 0.0,
            mod_lfo_to_pitch: 0.0,
            mod_env_to_pitch: 0.0,
            mod_lfo_to_cutoff: 0,
            mod_env_to_cutoff: 0,
            dynamic_cutoff: false,
            mod_lfo_to_volume: 0.0,
            dynamic_volume: false,
            instrument_pan: 0.0,
            instrument_reverb: 0.0,
            instrument_chorus: 0.0,
            smoothed_cutoff: 0.0,
            block: vec![0.0; block_size],
            previous_mix_gain: 0.0,
            current_mix_gain: 0.0,
        }
    }

    /// Resolve the generator values into runtime parameters and start the
    /// sub-components
    fn start(&mut self, sample_info: &SampleInfo, buffer: Arc<Vec<f32>>, key: u8, velocity: u8) {
        if velocity > 0 {
            // The declared initial attenuation is applied only fractionally,
            // matching common player practice.
            let sample_attenuation = 0.1
                * 0.1
                * sample_info
                    .generator(GeneratorType::InitialAttenuation, 0)
                    .uvalue() as f32;

            let filter_attenuation = 0.5
                * 0.1
                * sample_info.generator(GeneratorType::InitialFilterQ, 0).uvalue() as f32;

            let decibels = -linear_to_decibels(127.0 / velocity as f32)
                - sample_attenuation
                - filter_attenuation;

            self.note_gain = decibels_to_linear(decibels);
        } else {
            self.note_gain = 0.0;
        }

        self.cutoff = cents_to_hertz(
            sample_info
                .generator(GeneratorType::InitialFilterCutoffFrequency, 13500)
                .uvalue() as f32,
        );

        self.resonance = decibels_to_linear(
            0.1 * sample_info.generator(GeneratorType::InitialFilterQ, 0).uvalue() as f32,
        );

        self.vib_lfo_to_pitch =
            0.01 * sample_info.generator(GeneratorType::VibratoLfoToPitch, 0).ivalue() as f32;
        self.mod_lfo_to_pitch = 0.01
            * sample_info
                .generator(GeneratorType::ModulationLfoToPitch, 0)
                .ivalue() as f32;
        self.mod_env_to_pitch = 0.01
            * sample_info
                .generator(GeneratorType::ModulationEnvelopeToPitch, 0)
                .ivalue() as f32;

        self.mod_lfo_to_cutoff = sample_info
            .generator(GeneratorType::ModulationLfoToFilterCutoffFrequency, 0)
            .ivalue();
        self.mod_env_to_cutoff = sample_info
            .generator(GeneratorType::ModulationEnvelopeToFilterCutoffFrequency, 0)
            .ivalue();
        self.dynamic_cutoff = self.mod_lfo_to_cutoff != 0 || self.mod_env_to_cutoff != 0;

        self.mod_lfo_to_volume = 0.1
            * sample_info
                .generator(GeneratorType::ModulationLfoToVolume, 0)
                .ivalue() as f32;
        self.dynamic_volume = self.mod_lfo_to_volume > 0.05;

        self.instrument_pan =
            (0.1 * sample_info.generator(GeneratorType::Pan, 0).ivalue() as f32).clamp(-50.0, 50.0);
        self.instrument_reverb = 0.01
            * 0.1
            * sample_info
                .generator(GeneratorType::ReverbEffectsSend, 0)
                .uvalue() as f32;
        self.instrument_chorus = 0.01
            * 0.1
            * sample_info
                .generator(GeneratorType::ChorusEffectsSend, 0)
                .uvalue() as f32;

        {
            let delay = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::DelayVolumeEnvelope, -12000)
                    .ivalue() as f32,
            );
            let attack = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::AttackVolumeEnvelope, -12000)
                    .ivalue() as f32,
            );
            let hold = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::HoldVolumeEnvelope, -12000)
                    .ivalue() as f32,
            ) * key_number_to_multiplying_factor(
                sample_info
                    .generator(GeneratorType::KeyNumberToVolumeEnvelopeHold, 0)
                    .ivalue(),
                key,
            );
            let decay = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::DecayVolumeEnvelope, -12000)
                    .ivalue() as f32,
            ) * key_number_to_multiplying_factor(
                sample_info
                    .generator(GeneratorType::KeyNumberToVolumeEnvelopeDecay, 0)
                    .ivalue(),
                key,
            );
            let sustain = decibels_to_linear(
                -0.1 * sample_info
                    .generator(GeneratorType::SustainVolumeEnvelope, 0)
                    .uvalue() as f32,
            );
            let release = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::ReleaseVolumeEnvelope, -12000)
                    .ivalue() as f32,
            )
            .max(0.01);

            self.volume_envelope.start(delay, attack, hold, decay, sustain, release);
        }

        {
            let delay = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::DelayModulationEnvelope, -12000)
                    .ivalue() as f32,
            );
            let attack = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::AttackModulationEnvelope, -12000)
                    .ivalue() as f32,
            ) * ((145.0 - velocity as f32) / 144.0);
            let hold = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::HoldModulationEnvelope, -12000)
                    .ivalue() as f32,
            ) * key_number_to_multiplying_factor(
                sample_info
                    .generator(GeneratorType::KeyNumberToModulationEnvelopeHold, 0)
                    .ivalue(),
                key,
            );
            let decay = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::DecayModulationEnvelope, -12000)
                    .ivalue() as f32,
            ) * key_number_to_multiplying_factor(
                sample_info
                    .generator(GeneratorType::KeyNumberToModulationEnvelopeDecay, 0)
                    .ivalue(),
                key,
            );
            let sustain = 1.0
                - sample_info
                    .generator(GeneratorType::SustainModulationEnvelope, 0)
                    .uvalue() as f32
                    / 100.0;
            let release = timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::ReleaseModulationEnvelope, -12000)
                    .ivalue() as f32,
            );

            self.modulation_envelope.start(delay, attack, hold, decay, sustain, release);
        }

        self.vibrato_lfo.start(
            timecents_to_seconds(
                sample_info.generator(GeneratorType::DelayVibratoLfo, -12000).ivalue() as f32,
            ),
            cents_to_hertz(
                sample_info
                    .generator(GeneratorType::FrequencyVibratoLfo, 0)
                    .ivalue() as f32,
            ),
        );

        self.modulation_lfo.start(
            timecents_to_seconds(
                sample_info
                    .generator(GeneratorType::DelayModulationLfo, -12000)
                    .ivalue() as f32,
            ),
            cents_to_hertz(
                sample_info
                    .generator(GeneratorType::FrequencyModulationLfo, 0)
                    .ivalue() as f32,
            ),
        );

        let overriding_root_key = sample_info
            .generator(GeneratorType::OverridingRootKey, -1)
            .ivalue();
        let loop_mode = LoopMode::from_raw(
            sample_info.generator(GeneratorType::SampleModes, 0).uvalue(),
        );
        let coarse_tune = sample_info.generator(GeneratorType::CoarseTune, 0).ivalue();
        let fine_tune = sample_info.generator(GeneratorType::FineTune, 0).ivalue();
        let scale_tuning = sample_info.generator(GeneratorType::ScaleTuning, 100).uvalue();

        let sample = &sample_info.sample;
        let root_key = if overriding_root_key >= 0 {
            overriding_root_key as u8
        } else {
            sample.original_pitch
        };

        self.sampler.start(
            buffer,
            sample.start,
            sample.end,
            loop_mode,
            sample.loop_start,
            sample.loop_end,
            sample.sample_rate,
            root_key,
            coarse_tune,
            fine_tune + sample.pitch_correction as i16,
            scale_tuning,
        );

        self.filter.clear_buffer();
        self.filter.set_low_pass(self.cutoff, self.resonance);

        self.smoothed_cutoff = self.cutoff;

        self.previous_mix_gain = 0.0;
        self.current_mix_gain = 0.0;
    }

    fn release(&mut self) {
        self.volume_envelope.release();
        self.modulation_envelope.release();
        self.sampler.release();
    }

    /// Advance all sub-components by one block and refresh the mix gain
    fn process(&mut self, channel: &Channel, key: u8) -> bool {
        let block_size = self.block.len() as u32;

        if !self.volume_envelope.process(block_size) {
            return false;
        }

        self.modulation_envelope.process(block_size);
        self.vibrato_lfo.process();
        self.modulation_lfo.process();

        let vib_pitch_change = (0.01 * channel.modulation() + self.vib_lfo_to_pitch)
            * self.vibrato_lfo.value();
        let mod_pitch_change = self.mod_lfo_to_pitch * self.modulation_lfo.value()
            + self.mod_env_to_pitch * self.modulation_envelope.value();
        let channel_pitch_change = channel.tune() + channel.pitch_bend();

        let pitch = key as f32 + vib_pitch_change + mod_pitch_change + channel_pitch_change;

        let sampler = &mut self.sampler;
        if !sampler.process(&mut self.block, pitch) {
            return false;
        }

        if self.dynamic_cutoff {
            let cents = self.mod_lfo_to_cutoff as f32 * self.modulation_lfo.value()
                + self.mod_env_to_cutoff as f32 * self.modulation_envelope.value();

            let new_cutoff = cents_to_multiplying_factor(cents) * self.cutoff;

            // The cutoff change is limited within x0.5 and x2 to reduce pop
            // noise.
            let lower_limit = 0.5 * self.smoothed_cutoff;
            let upper_limit = 2.0 * self.smoothed_cutoff;
            self.smoothed_cutoff = new_cutoff.clamp(lower_limit, upper_limit);

            self.filter.set_low_pass(self.smoothed_cutoff, self.resonance);
        }

        self.filter.process(&mut self.block);

        let channel_gain = decibels_to_linear(channel.volume()) * channel.expression();

        let mut mix_gain = self.note_gain * channel_gain * self.volume_envelope.value();
        if self.dynamic_volume {
            let decibels = self.mod_lfo_to_volume * self.modulation_lfo.value();
            mix_gain *= decibels_to_linear(decibels);
        }

        self.current_mix_gain = mix_gain;

        true
    }
}

/// A voice plays one note on one channel
pub struct Voice {
    sample_rate: u32,
    reverb_and_chorus_enabled: bool,

    stereo: bool,
    left: Track,
    right: Track,

    previous_reverb_send: f32,
    previous_chorus_send: f32,
    current_reverb_send: f32,
    current_chorus_send: f32,

    exclusive_class: u16,
    channel: u8,
    key: u8,
    velocity: u8,

    state: VoiceState,
    voice_length: u32,
}

impl Voice {
    pub fn new(sample_rate: u32, block_size: usize, reverb_and_chorus_enabled: bool) -> Self {
        Self {
            sample_rate,
            reverb_and_chorus_enabled,
            stereo: false,
            left: Track::new(sample_rate, block_size),
            right: Track::new(sample_rate, block_size),
            previous_reverb_send: 0.0,
            previous_chorus_send: 0.0,
            current_reverb_send: 0.0,
            current_chorus_send: 0.0,
            exclusive_class: 0,
            channel: 0,
            key: 0,
            velocity: 0,
            state: VoiceState::Playing,
            voice_length: 0,
        }
    }

    /// Start playing a key
    pub fn start(
        &mut self,
        key_info: &KeyInfo,
        buffer: &Arc<Vec<f32>>,
        channel: u8,
        key: u8,
        velocity: u8,
    ) {
        self.stereo = key_info.stereo;

        self.exclusive_class = key_info
            .left
            .generator(GeneratorType::ExclusiveClass, 0)
            .uvalue();
        self.channel = channel;
        self.key = key;
        self.velocity = velocity;

        self.left.start(&key_info.left, Arc::clone(buffer), key, velocity);

        if let Some(right) = &key_info.right {
            self.right.start(right, Arc::clone(buffer), key, velocity);
        } else {
            self.right.previous_mix_gain = 0.0;
            self.right.current_mix_gain = 0.0;
        }

        self.state = VoiceState::Playing;
        self.voice_length = 0;
    }

    /// Request the release of the key; the actual envelope release happens
    /// in `process` once the click-avoidance gate has passed
    pub fn end(&mut self) {
        if self.state == VoiceState::Playing {
            self.state = VoiceState::ReleaseRequested;
        }
    }

    /// Silence the voice; it is reclaimed on the next block
    pub fn kill(&mut self) {
        self.left.note_gain = 0.0;
        self.right.note_gain = 0.0;
    }

    /// Advance the voice by one block
    ///
    /// Returns false when the voice is finished and can be reclaimed.
    pub fn process(&mut self, channel_info: &Channel) -> bool {
        if self.left.note_gain < NON_AUDIBLE
            && (!self.stereo || self.right.note_gain < NON_AUDIBLE)
        {
            return false;
        }

        // Honoring a note-off earlier than 2 ms after the attack produces an
        // audible click, so the release is gated on a minimum age.
        if self.voice_length >= self.sample_rate / 500
            && self.state == VoiceState::ReleaseRequested
            && !channel_info.sustain()
        {
            self.left.release();
            if self.stereo {
                self.right.release();
            }

            self.state = VoiceState::Released;
        }

        self.left.previous_mix_gain = self.left.current_mix_gain;
        self.right.previous_mix_gain = self.right.current_mix_gain;

        let mut success = self.left.process(channel_info, self.key);

        if self.stereo {
            success = self.right.process(channel_info, self.key) || success;
        }

        if !success {
            return false;
        }

        if !self.stereo {
            // A mono source expands into both output gains through the
            // constant-power pan law. Saturated pan keeps the plain gain.
            let pan = channel_info.pan() + self.left.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (std::f32::consts::FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (std::f32::consts::SQRT_2 - 1.0) * angle.cos();

                let gain = self.left.current_mix_gain;

                self.left.current_mix_gain = gain * (50.0 - pan) / 100.0 * factor;
                self.right.current_mix_gain = gain * (50.0 + pan) / 100.0 * factor;
            }
        } else {
            let pan = channel_info.pan() + self.left.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (std::f32::consts::FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (std::f32::consts::SQRT_2 - 1.0) * angle.cos();

                self.left.current_mix_gain *= (50.0 - pan) / 100.0 * factor;
            }

            let pan = channel_info.pan() + self.right.instrument_pan;
            if pan > -50.0 && pan < 50.0 {
                let angle = (std::f32::consts::FRAC_PI_2 / 50.0) * pan;
                let factor = 1.0 + (std::f32::consts::SQRT_2 - 1.0) * angle.cos();

                self.right.current_mix_gain *= (50.0 + pan) / 100.0 * factor;
            }
        }

        self.previous_reverb_send = self.current_reverb_send;
        self.previous_chorus_send = self.current_chorus_send;

        if self.reverb_and_chorus_enabled {
            let (instrument_reverb, instrument_chorus) = if self.stereo {
                (
                    (self.left.instrument_reverb + self.right.instrument_reverb) * 0.5,
                    (self.left.instrument_chorus + self.right.instrument_chorus) * 0.5,
                )
            } else {
                (self.left.instrument_reverb, self.left.instrument_chorus)
            };

            self.current_reverb_send =
                (channel_info.reverb_send() + instrument_reverb).clamp(0.0, 1.0);
            self.current_chorus_send =
                (channel_info.chorus_send() + instrument_chorus).clamp(0.0, 1.0);
        } else {
            self.current_reverb_send = 0.0;
            self.current_chorus_send = 0.0;
        }

        if self.voice_length == 0 {
            self.left.previous_mix_gain = self.left.current_mix_gain;
            self.right.previous_mix_gain = self.right.current_mix_gain;
            self.previous_reverb_send = self.current_reverb_send;
            self.previous_chorus_send = self.current_chorus_send;
        }

        self.voice_length += self.left.block.len() as u32;

        true
    }

    /// Priority for voice stealing; the quietest voice goes first
    pub fn priority(&self) -> f32 {
        if self.stereo {
            if self.left.note_gain < NON_AUDIBLE && self.right.note_gain < NON_AUDIBLE {
                return 0.0;
            }

            self.left
                .volume_envelope
                .priority()
                .max(self.right.volume_envelope.priority())
        } else {
            if self.left.note_gain < NON_AUDIBLE {
                return 0.0;
            }

            self.left.volume_envelope.priority()
        }
    }

    pub fn stereo(&self) -> bool {
        self.stereo
    }

    pub fn block_left(&self) -> &[f32] {
        &self.left.block
    }

    pub fn block_right(&self) -> &[f32] {
        &self.right.block
    }

    pub fn previous_mix_gain_left(&self) -> f32 {
        self.left.previous_mix_gain
    }

    pub fn previous_mix_gain_right(&self) -> f32 {
        self.right.previous_mix_gain
    }

    pub fn current_mix_gain_left(&self) -> f32 {
        self.left.current_mix_gain
    }

    pub fn current_mix_gain_right(&self) -> f32 {
        self.right.current_mix_gain
    }

    pub fn previous_reverb_send(&self) -> f32 {
        self.previous_reverb_send
    }

    pub fn previous_chorus_send(&self) -> f32 {
        self.previous_chorus_send
    }

    pub fn current_reverb_send(&self) -> f32 {
        self.current_reverb_send
    }

    pub fn current_chorus_send(&self) -> f32 {
        self.current_chorus_send
    }

    pub fn exclusive_class(&self) -> u16 {
        self.exclusive_class
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn voice_length(&self) -> u32 {
        self.voice_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soundfont::{
        default_generators, GeneratorAmount, ModulatorMap, Sample, SampleType,
    };

    fn test_sample() -> Sample {
        Sample {
            name: "test".to_string(),
            start: 0,
            end: 8000,
            loop_start: 0,
            loop_end: 8000,
            sample_rate: 22050,
            original_pitch: 69,
            pitch_correction: 0,
            sample_type: SampleType::Mono,
            sample_link: 0,
        }
    }

    fn sample_info(extra: &[(GeneratorType, i16)]) -> SampleInfo {
        let mut generators = default_generators();
        generators.remove(&GeneratorType::KeyRange);
        generators.remove(&GeneratorType::VelocityRange);
        for (generator_type, value) in extra {
            generators.insert(*generator_type, GeneratorAmount::from_i16(*value));
        }
        SampleInfo {
            generators,
            modulators: ModulatorMap::new(),
            sample: test_sample(),
        }
    }

    fn mono_key_info(extra: &[(GeneratorType, i16)]) -> KeyInfo {
        KeyInfo {
            stereo: false,
            left: sample_info(extra),
            right: None,
        }
    }

    fn test_buffer() -> Arc<Vec<f32>> {
        // Constant signal makes the gain math easy to observe.
        Arc::new(vec![0.5; 8101])
    }

    #[test]
    fn test_voice_gain_resolution() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);
        assert!(voice.process(&channel));

        // note gain for velocity 100 is (100/127); channel gain combines the
        // default volume and expression; pan is nearly centered.
        let note_gain = 100.0 / 127.0;
        let channel_gain = decibels_to_linear(channel.volume()) * channel.expression();
        let expected = note_gain * channel_gain * 0.5 * std::f32::consts::SQRT_2;

        assert!((voice.current_mix_gain_left() - expected).abs() < 1e-3);
        assert!((voice.current_mix_gain_right() - expected).abs() < 1e-3);

        // First block: no ramp from zero.
        assert_eq!(voice.previous_mix_gain_left(), voice.current_mix_gain_left());
    }

    #[test]
    fn test_voice_attenuation_generators() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        let plain = {
            voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);
            voice.process(&channel);
            voice.current_mix_gain_left()
        };

        // 100 centibels of declared attenuation scale down to 1 dB.
        voice.start(
            &mono_key_info(&[(GeneratorType::InitialAttenuation, 100)]),
            &test_buffer(),
            0,
            69,
            100,
        );
        voice.process(&channel);
        let attenuated = voice.current_mix_gain_left();

        assert!((attenuated / plain - decibels_to_linear(-1.0)).abs() < 1e-3);
    }

    #[test]
    fn test_voice_zero_velocity_is_silent() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 0);

        // note gain 0 means the voice reports itself dead immediately.
        assert!(!voice.process(&channel));
        assert_eq!(voice.priority(), 0.0);
    }

    #[test]
    fn test_voice_kill_is_immediate() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);
        assert!(voice.process(&channel));

        voice.kill();
        assert!(!voice.process(&channel));
    }

    #[test]
    fn test_voice_release_gate_and_decay() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);

        // Note-off before the first block: the 2 ms gate postpones the
        // release, so the first process still plays at full level.
        voice.end();
        assert!(voice.process(&channel));
        assert!(voice.current_mix_gain_left() > 0.1);

        // Subsequent blocks release and fade out until reclaim.
        let mut blocks = 0;
        while voice.process(&channel) {
            blocks += 1;
            assert!(blocks < 100, "released voice never finished");
        }
    }

    #[test]
    fn test_voice_sustain_pedal_defers_release() {
        let mut voice = Voice::new(22050, 64, true);
        let mut channel = Channel::new(false);
        channel.set_sustain(127);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);
        voice.end();

        for _ in 0..50 {
            assert!(voice.process(&channel), "sustained voice must keep playing");
        }

        // Releasing the pedal lets the voice fade.
        channel.set_sustain(0);
        let mut blocks = 0;
        while voice.process(&channel) {
            blocks += 1;
            assert!(blocks < 100, "voice never finished after pedal release");
        }
    }

    #[test]
    fn test_voice_exclusive_class_from_generators() {
        let mut voice = Voice::new(22050, 64, true);

        voice.start(
            &mono_key_info(&[(GeneratorType::ExclusiveClass, 3)]),
            &test_buffer(),
            4,
            42,
            80,
        );

        assert_eq!(voice.exclusive_class(), 3);
        assert_eq!(voice.channel(), 4);
        assert_eq!(voice.key(), 42);
        assert_eq!(voice.velocity(), 80);
    }

    #[test]
    fn test_voice_priority_shape() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(&mono_key_info(&[]), &test_buffer(), 0, 69, 100);

        let mut previous = f32::MAX;
        voice.process(&channel);
        for _ in 0..20 {
            voice.process(&channel);
            let priority = voice.priority();
            assert!(priority >= 0.0 && priority <= 3.0 + 1e-6);
            assert!(priority <= previous + 1e-6);
            previous = priority;
        }

        // After note-off, priority keeps falling until reclaim.
        voice.end();
        while voice.process(&channel) {
            let priority = voice.priority();
            assert!(priority <= previous + 1e-6);
            previous = priority;
        }
    }

    #[test]
    fn test_voice_sends_follow_channel_and_instrument() {
        let mut voice = Voice::new(22050, 64, true);
        let channel = Channel::new(false);

        voice.start(
            &mono_key_info(&[(GeneratorType::ReverbEffectsSend, 500)]),
            &test_buffer(),
            0,
            69,
            100,
        );
        voice.process(&channel);

        // Channel default 40/127 plus 0.5 instrument contribution.
        let expected = 40.0 / 127.0 + 0.5;
        assert!((voice.current_reverb_send() - expected).abs() < 1e-4);
        assert_eq!(voice.current_chorus_send(), 0.0);
    }

    #[test]
    fn test_voice_sends_disabled() {
        let mut voice = Voice::new(22050, 64, false);
        let channel = Channel::new(false);

        voice.start(
            &mono_key_info(&[(GeneratorType::ReverbEffectsSend, 500)]),
            &test_buffer(),
            0,
            69,
            100,
        );
        voice.process(&channel);

        assert_eq!(voice.current_reverb_send(), 0.0);
        assert_eq!(voice.current_chorus_send(), 0.0);
    }
}
