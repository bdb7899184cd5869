//! Low frequency oscillator
//!
//! Delayed triangle wave used for vibrato and modulation. The value is only
//! updated once per rendered block, which is plenty for sub-audio rates.

/// Triangle LFO advanced block-wise
pub struct Lfo {
    sample_rate: u32,
    block_size: u32,

    active: bool,
    delay: f32,
    period: f32,

    nb_processed_samples: u32,
    value: f32,
}

impl Lfo {
    pub fn new(sample_rate: u32, block_size: u32) -> Self {
        Self {
            sample_rate,
            block_size,
            active: false,
            delay: 0.0,
            period: 0.0,
            nb_processed_samples: 0,
            value: 0.0,
        }
    }

    /// Start oscillating after `delay` seconds at `frequency` Hz
    ///
    /// A frequency at or below 1 mHz leaves the LFO inactive at zero.
    pub fn start(&mut self, delay: f32, frequency: f32) {
        if frequency > 0.001 {
            self.active = true;
            self.delay = delay;
            self.period = 1.0 / frequency;
            self.nb_processed_samples = 0;
            self.value = 0.0;
        } else {
            self.active = false;
            self.value = 0.0;
        }
    }

    /// Advance by one block
    pub fn process(&mut self) {
        if !self.active {
            return;
        }

        self.nb_processed_samples += self.block_size;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        if current_time < self.delay {
            self.value = 0.0;
        } else {
            let phase = ((current_time - self.delay) % self.period) / self.period;

            if phase < 0.25 {
                self.value = 4.0 * phase;
            } else if phase < 0.75 {
                self.value = 4.0 * (0.5 - phase);
            } else {
                self.value = 4.0 * (phase - 1.0);
            }
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}
