//! Voice pool
//!
//! Fixed-capacity pool of voices with the active ones packed at the front.
//! Allocation reuses an in-flight voice of the same exclusive class, then
//! takes a free slot, and only then steals the lowest-priority voice.

use tracing::trace;

use super::channel::Channel;
use super::voice::Voice;

/// Pool of pre-allocated voices
pub struct VoiceCollection {
    voices: Vec<Voice>,
    nb_active_voices: usize,
}

impl VoiceCollection {
    pub fn new(
        maximum_polyphony: usize,
        sample_rate: u32,
        block_size: usize,
        reverb_and_chorus_enabled: bool,
    ) -> Self {
        let voices = (0..maximum_polyphony)
            .map(|_| Voice::new(sample_rate, block_size, reverb_and_chorus_enabled))
            .collect();

        Self {
            voices,
            nb_active_voices: 0,
        }
    }

    /// Find a voice for a new note; never fails
    ///
    /// Returns the slot index of the voice to start. A nonzero exclusive
    /// class cuts off the in-flight voice of the same class on the same
    /// channel (open hi-hat silencing the closed one). Otherwise a free slot
    /// is activated, or the voice with the lowest priority is stolen, ties
    /// going to the oldest.
    pub fn request(&mut self, channel: u8, exclusive_class: u16) -> usize {
        if exclusive_class != 0 {
            for i in 0..self.nb_active_voices {
                let voice = &self.voices[i];
                if voice.exclusive_class() == exclusive_class && voice.channel() == channel {
                    return i;
                }
            }
        }

        if self.nb_active_voices < self.voices.len() {
            let index = self.nb_active_voices;
            self.nb_active_voices += 1;
            return index;
        }

        let mut candidate = 0;
        let mut lowest_priority = f32::MAX;

        for (i, voice) in self.voices.iter().enumerate() {
            let priority = voice.priority();

            if priority < lowest_priority {
                lowest_priority = priority;
                candidate = i;
            } else if priority == lowest_priority
                && voice.voice_length() > self.voices[candidate].voice_length()
            {
                // Same priority: the older one is more suitable for reuse.
                candidate = i;
            }
        }

        trace!(
            slot = candidate,
            priority = lowest_priority,
            "stealing voice"
        );

        candidate
    }

    /// Advance all active voices by one block, reclaiming finished ones
    ///
    /// Reclaiming swaps the finished voice with the last active slot, so the
    /// active order is not preserved.
    pub fn process(&mut self, channels: &[Channel]) {
        let mut i = 0;

        while i != self.nb_active_voices {
            let channel = self.voices[i].channel() as usize;
            if self.voices[i].process(&channels[channel]) {
                i += 1;
            } else {
                self.nb_active_voices -= 1;
                self.voices.swap(i, self.nb_active_voices);
            }
        }
    }

    /// Drop all active voices at once
    pub fn clear(&mut self) {
        self.nb_active_voices = 0;
    }

    pub fn nb_active_voices(&self) -> usize {
        self.nb_active_voices
    }

    /// The active voices, in pool order
    pub fn active_voices(&self) -> &[Voice] {
        &self.voices[..self.nb_active_voices]
    }

    /// All active voices, mutable
    pub fn active_voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices[..self.nb_active_voices]
    }

    pub fn voice_mut(&mut self, index: usize) -> &mut Voice {
        &mut self.voices[index]
    }
}
