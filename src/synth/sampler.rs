//! Wavetable sampler
//!
//! Reads a sample region out of the shared wavetable buffer with
//! pitch-scaled linear interpolation and loop handling.

use std::sync::Arc;

/// How the sample region loops during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play the region once, then go silent
    None,
    /// Loop between the loop points forever
    Continuous,
    /// Loop until the key is released, then play through to the end
    UntilRelease,
}

impl LoopMode {
    /// Decode the raw `sample_modes` generator value
    pub fn from_raw(value: u16) -> Self {
        match value {
            1 => LoopMode::Continuous,
            3 => LoopMode::UntilRelease,
            _ => LoopMode::None,
        }
    }
}

/// Plays one sample region of the wavetable at a variable pitch
pub struct Sampler {
    dest_sample_rate: u32,

    buffer: Option<Arc<Vec<f32>>>,
    start: u32,
    end: u32,
    loop_mode: LoopMode,
    loop_start: u32,
    loop_end: u32,
    root_key: u8,

    current_index: f64,
    looping: bool,
    tune: f32,
    pitch_change_scale: f32,
    sample_rate_ratio: f32,
}

impl Sampler {
    /// Create a sampler producing samples at the given output rate
    pub fn new(dest_sample_rate: u32) -> Self {
        Self {
            dest_sample_rate,
            buffer: None,
            start: 0,
            end: 0,
            loop_mode: LoopMode::None,
            loop_start: 0,
            loop_end: 0,
            root_key: 60,
            current_index: 0.0,
            looping: false,
            tune: 0.0,
            pitch_change_scale: 1.0,
            sample_rate_ratio: 1.0,
        }
    }

    /// Start playing a sample region
    ///
    /// `root_key` is the MIDI key at which the region plays back unshifted,
    /// `coarse_tune` is in semitones, `fine_tune` in cents and `scale_tuning`
    /// in cents per key.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        buffer: Arc<Vec<f32>>,
        start: u32,
        end: u32,
        loop_mode: LoopMode,
        loop_start: u32,
        loop_end: u32,
        sample_rate: u32,
        root_key: u8,
        coarse_tune: i16,
        fine_tune: i16,
        scale_tuning: u16,
    ) {
        self.buffer = Some(buffer);
        self.start = start;
        self.end = end;
        self.loop_mode = loop_mode;
        self.loop_start = loop_start;
        self.loop_end = loop_end;
        self.root_key = root_key;

        self.tune = coarse_tune as f32 + 0.01 * fine_tune as f32;
        self.pitch_change_scale = 0.01 * scale_tuning as f32;
        self.sample_rate_ratio = sample_rate as f32 / self.dest_sample_rate as f32;

        self.looping = loop_mode != LoopMode::None;
        self.current_index = start as f64;
    }

    /// Must be called when the key is released
    pub fn release(&mut self) {
        if self.loop_mode == LoopMode::UntilRelease {
            self.looping = false;
        }
    }

    /// Fill `dest` with interpolated samples at the given pitch (MIDI key units)
    ///
    /// Returns false once the region is exhausted. The block during which the
    /// region ends is zero-padded and still reported as success; the next call
    /// returns false.
    pub fn process(&mut self, dest: &mut [f32], pitch: f32) -> bool {
        let buffer = match &self.buffer {
            Some(buffer) => buffer,
            None => return false,
        };

        let pitch_change =
            self.pitch_change_scale * (pitch - self.root_key as f32) + self.tune;
        let pitch_ratio =
            (self.sample_rate_ratio * (pitch_change / 12.0).exp2()) as f64;

        let loop_length = self.loop_end - self.loop_start;

        for i in 0..dest.len() {
            let index = self.current_index.floor() as u32;
            let mut index2 = index + 1;

            if !self.looping {
                if index >= self.end {
                    if i == 0 {
                        return false;
                    }

                    for value in dest[i..].iter_mut() {
                        *value = 0.0;
                    }

                    return true;
                }
            } else if index2 >= self.loop_end {
                index2 -= loop_length;
            }

            let x1 = buffer[index as usize];
            let x2 = buffer[index2 as usize];
            let a = (self.current_index - index as f64) as f32;
            dest[i] = x1 + a * (x2 - x1);

            self.current_index += pitch_ratio;

            if self.looping && self.current_index >= self.loop_end as f64 {
                self.current_index -= loop_length as f64;
            }
        }

        true
    }
}
