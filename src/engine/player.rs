//! Real-time audio playback using cpal

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

use super::Synthesizer;

/// Real-time audio player
///
/// Pulls stereo blocks from a shared synthesizer and feeds them to the
/// default output device. The synthesizer keeps being usable from other
/// threads (MIDI input) through the mutex.
pub struct Player {
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start playing audio from the synthesizer
    pub fn start(&mut self, synthesizer: Arc<Mutex<Synthesizer>>) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;

        let config = device.default_output_config()?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        let stream = match sample_format {
            SampleFormat::F32 => {
                self.build_stream::<f32>(&device, &stream_config, synthesizer, running)?
            }
            SampleFormat::I16 => {
                self.build_stream::<i16>(&device, &stream_config, synthesizer, running)?
            }
            SampleFormat::U16 => {
                self.build_stream::<u16>(&device, &stream_config, synthesizer, running)?
            }
            _ => return Err(anyhow!("unsupported sample format")),
        };

        stream.play()?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Stop playback
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.stream = None;
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
        &self,
        device: &Device,
        config: &StreamConfig,
        synthesizer: Arc<Mutex<Synthesizer>>,
        running: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        let mut left = Vec::new();
        let mut right = Vec::new();

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::SeqCst) {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                    return;
                }

                let nb_frames = data.len() / channels;
                left.resize(nb_frames, 0.0);
                right.resize(nb_frames, 0.0);

                if let Ok(mut synth) = synthesizer.try_lock() {
                    synth.render_stereo(&mut left, &mut right);

                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        match frame.len() {
                            1 => {
                                frame[0] = T::from_sample(0.5 * (left[i] + right[i]));
                            }
                            _ => {
                                frame[0] = T::from_sample(left[i]);
                                frame[1] = T::from_sample(right[i]);
                                for sample in frame[2..].iter_mut() {
                                    *sample = T::from_sample(0.0f32);
                                }
                            }
                        }
                    }
                } else {
                    // Mutex contended, fill with silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0f32);
                    }
                }
            },
            |err| {
                error!("audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
