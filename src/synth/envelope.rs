//! DAHDSR envelope generators
//!
//! Two envelope flavors drive each voice: the volume envelope shapes the
//! audible gain with exponential decay and release segments, and the
//! modulation envelope feeds pitch and filter modulation with linear ramps.
//! Both advance block-wise through delay, attack, hold, decay and release
//! stages and report whether the signal is still audible.

/// Linear gain below which a signal is considered silent
pub const NON_AUDIBLE: f32 = 0.001;

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EnvelopeStage {
    Delay,
    Attack,
    Hold,
    Decay,
    Release,
}

/// Exponential with a hard cutoff to zero below the audible floor
fn exp_cutoff(x: f32) -> f32 {
    if x < NON_AUDIBLE.ln() {
        return 0.0;
    }
    x.exp()
}

/// Volume envelope with exponential decay and release
///
/// The decay and release slopes use the constant 9.226 ≈ ln(10⁴), the time
/// needed for an 80 dB drop. Exposes a priority signal used by voice
/// stealing: higher while the note is young, falling with the gain.
pub struct VolumeEnvelope {
    sample_rate: u32,

    attack_slope: f32,
    decay_slope: f32,
    release_slope: f32,

    attack_start_time: f32,
    hold_start_time: f32,
    decay_start_time: f32,
    release_start_time: f32,

    sustain_level: f32,
    release_level: f32,

    nb_processed_samples: u32,
    stage: EnvelopeStage,

    value: f32,
    priority: f32,
}

impl VolumeEnvelope {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            attack_slope: 0.0,
            decay_slope: 0.0,
            release_slope: 0.0,
            attack_start_time: 0.0,
            hold_start_time: 0.0,
            decay_start_time: 0.0,
            release_start_time: 0.0,
            sustain_level: 0.0,
            release_level: 0.0,
            nb_processed_samples: 0,
            stage: EnvelopeStage::Delay,
            value: 0.0,
            priority: 3.0,
        }
    }

    /// Start a new envelope; all times are in seconds, sustain in linear gain
    pub fn start(
        &mut self,
        delay: f32,
        attack: f32,
        hold: f32,
        decay: f32,
        sustain: f32,
        release: f32,
    ) {
        self.attack_slope = 1.0 / attack;
        self.decay_slope = -9.226 / decay;
        self.release_slope = -9.226 / release;

        self.attack_start_time = delay;
        self.hold_start_time = self.attack_start_time + attack;
        self.decay_start_time = self.hold_start_time + hold;
        self.release_start_time = 0.0;

        self.sustain_level = sustain.clamp(0.0, 1.0);
        self.release_level = 0.0;

        self.nb_processed_samples = 0;
        self.stage = EnvelopeStage::Delay;
        self.value = 0.0;

        self.process(0);
    }

    /// Must be called when the key is released
    pub fn release(&mut self) {
        self.stage = EnvelopeStage::Release;
        self.release_start_time = self.nb_processed_samples as f32 / self.sample_rate as f32;
        self.release_level = self.value;
    }

    /// Advance by `nb_samples` and recompute the value
    ///
    /// Returns true while the envelope still lets the signal be heard.
    pub fn process(&mut self, nb_samples: u32) -> bool {
        self.nb_processed_samples += nb_samples;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        while self.stage <= EnvelopeStage::Hold {
            let end = match self.stage {
                EnvelopeStage::Delay => self.attack_start_time,
                EnvelopeStage::Attack => self.hold_start_time,
                EnvelopeStage::Hold => self.decay_start_time,
                _ => unreachable!(),
            };

            if current_time < end {
                break;
            }

            self.stage = match self.stage {
                EnvelopeStage::Delay => EnvelopeStage::Attack,
                EnvelopeStage::Attack => EnvelopeStage::Hold,
                _ => EnvelopeStage::Decay,
            };
        }

        match self.stage {
            EnvelopeStage::Delay => {
                self.value = 0.0;
                self.priority = 3.0;
                true
            }
            EnvelopeStage::Attack => {
                self.value = self.attack_slope * (current_time - self.attack_start_time);
                self.priority = 3.0 - self.value;
                true
            }
            EnvelopeStage::Hold => {
                self.value = 1.0;
                self.priority = 2.0;
                true
            }
            EnvelopeStage::Decay => {
                self.value = exp_cutoff(self.decay_slope * (current_time - self.decay_start_time))
                    .max(self.sustain_level);
                self.priority = 1.0 + self.value;
                self.value > NON_AUDIBLE
            }
            EnvelopeStage::Release => {
                self.value = self.release_level
                    * exp_cutoff(self.release_slope * (current_time - self.release_start_time));
                self.priority = self.value;
                self.value > NON_AUDIBLE
            }
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }
}

/// Modulation envelope with linear decay and release ramps
pub struct ModulationEnvelope {
    sample_rate: u32,

    attack_slope: f32,
    decay_slope: f32,
    release_slope: f32,

    attack_start_time: f32,
    hold_start_time: f32,
    decay_start_time: f32,

    decay_end_time: f32,
    release_end_time: f32,

    sustain_level: f32,
    release_level: f32,

    nb_processed_samples: u32,
    stage: EnvelopeStage,

    value: f32,
}

impl ModulationEnvelope {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            attack_slope: 0.0,
            decay_slope: 0.0,
            release_slope: 0.0,
            attack_start_time: 0.0,
            hold_start_time: 0.0,
            decay_start_time: 0.0,
            decay_end_time: 0.0,
            release_end_time: 0.0,
            sustain_level: 0.0,
            release_level: 0.0,
            nb_processed_samples: 0,
            stage: EnvelopeStage::Delay,
            value: 0.0,
        }
    }

    /// Start a new envelope; all times are in seconds, sustain in [0, 1]
    pub fn start(
        &mut self,
        delay: f32,
        attack: f32,
        hold: f32,
        decay: f32,
        sustain: f32,
        release: f32,
    ) {
        self.attack_slope = 1.0 / attack;
        self.decay_slope = 1.0 / decay;
        self.release_slope = 1.0 / release;

        self.attack_start_time = delay;
        self.hold_start_time = self.attack_start_time + attack;
        self.decay_start_time = self.hold_start_time + hold;

        self.decay_end_time = self.decay_start_time + decay;
        self.release_end_time = release;

        self.sustain_level = sustain.clamp(0.0, 1.0);
        self.release_level = 0.0;

        self.nb_processed_samples = 0;
        self.stage = EnvelopeStage::Delay;
        self.value = 0.0;

        self.process(0);
    }

    /// Must be called when the key is released
    pub fn release(&mut self) {
        self.stage = EnvelopeStage::Release;
        self.release_end_time += self.nb_processed_samples as f32 / self.sample_rate as f32;
        self.release_level = self.value;
    }

    /// Advance by `nb_samples` and recompute the value
    pub fn process(&mut self, nb_samples: u32) -> bool {
        self.nb_processed_samples += nb_samples;

        let current_time = self.nb_processed_samples as f32 / self.sample_rate as f32;

        while self.stage <= EnvelopeStage::Hold {
            let end = match self.stage {
                EnvelopeStage::Delay => self.attack_start_time,
                EnvelopeStage::Attack => self.hold_start_time,
                EnvelopeStage::Hold => self.decay_start_time,
                _ => unreachable!(),
            };

            if current_time < end {
                break;
            }

            self.stage = match self.stage {
                EnvelopeStage::Delay => EnvelopeStage::Attack,
                EnvelopeStage::Attack => EnvelopeStage::Hold,
                _ => EnvelopeStage::Decay,
            };
        }

        match self.stage {
            EnvelopeStage::Delay => {
                self.value = 0.0;
                true
            }
            EnvelopeStage::Attack => {
                self.value = self.attack_slope * (current_time - self.attack_start_time);
                true
            }
            EnvelopeStage::Hold => {
                self.value = 1.0;
                true
            }
            EnvelopeStage::Decay => {
                self.value = (self.decay_slope * (self.decay_end_time - current_time))
                    .max(self.sustain_level);
                self.value > NON_AUDIBLE
            }
            EnvelopeStage::Release => {
                self.value = (self.release_level
                    * self.release_slope
                    * (self.release_end_time - current_time))
                    .max(0.0);
                self.value > NON_AUDIBLE
            }
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}
