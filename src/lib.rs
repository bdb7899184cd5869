//! Carillon - SoundFont 2 wavetable MIDI synthesizer
//!
//! A polyphonic synthesizer engine driven by a SoundFont bank. Consumes
//! key-on / key-off / controller events and produces floating-point audio,
//! suitable for offline rendering or real-time callbacks.

pub mod config;
pub mod engine;
pub mod soundfont;
pub mod synth;

pub use engine::{Synthesizer, SynthesizerSettings};
pub use soundfont::SoundFont;
