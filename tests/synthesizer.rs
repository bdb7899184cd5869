//! End-to-end rendering tests
//!
//! Drives a synthesizer against a small in-memory bank holding a 440 Hz
//! sine recorded at A4: preset 0:0 is a hard-panned stereo pair, preset 0:1
//! is the same signal as a mono sample. The expected gains follow from the
//! default channel state: (100/127) note gain x volume x expression, and
//! the near-center pan of 0.003.

use carillon::soundfont::{
    default_generators, default_modulators, GeneratorAmount, GeneratorMap, GeneratorType,
    Information, Instrument, ModulatorMap, Preset, PresetId, PresetMap, Range, Sample, SampleInfo,
    SampleType, Zone,
};
use carillon::{SoundFont, Synthesizer, SynthesizerSettings};

const SAMPLE_RATE: u32 = 22050;
const WAVETABLE_LEN: usize = 4001;

fn wavetable() -> Vec<f32> {
    (0..WAVETABLE_LEN)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn sample(name: &str, sample_type: SampleType) -> Sample {
    Sample {
        name: name.to_string(),
        start: 0,
        end: (WAVETABLE_LEN - 1) as u32,
        loop_start: 0,
        loop_end: (WAVETABLE_LEN - 1) as u32,
        sample_rate: SAMPLE_RATE,
        original_pitch: 69,
        pitch_correction: 0,
        sample_type,
        sample_link: 0,
    }
}

fn instrument_zone(sample_id: i16, pan: Option<i16>, exclusive_class: i16) -> Zone {
    let mut generators = default_generators();
    generators.remove(&GeneratorType::KeyRange);
    generators.remove(&GeneratorType::VelocityRange);
    generators.insert(GeneratorType::SampleId, GeneratorAmount::from_i16(sample_id));
    if let Some(pan) = pan {
        generators.insert(GeneratorType::Pan, GeneratorAmount::from_i16(pan));
    }
    if exclusive_class != 0 {
        generators.insert(
            GeneratorType::ExclusiveClass,
            GeneratorAmount::from_i16(exclusive_class),
        );
    }

    Zone {
        keys_range: Range::FULL,
        velocities_range: Range::FULL,
        generators,
        modulators: default_modulators(),
    }
}

fn preset_zone(instrument: i16) -> Zone {
    let mut generators = GeneratorMap::new();
    generators.insert(GeneratorType::Instrument, GeneratorAmount::from_i16(instrument));

    Zone {
        keys_range: Range::FULL,
        velocities_range: Range::FULL,
        generators,
        modulators: ModulatorMap::new(),
    }
}

/// Bank with a stereo preset at 0:0 and a mono preset at 0:1
fn test_bank() -> SoundFont {
    let mut presets = PresetMap::new();
    presets.insert(
        PresetId { bank: 0, number: 0 },
        Preset {
            name: "Sine stereo".to_string(),
            zones: vec![preset_zone(0)],
        },
    );
    presets.insert(
        PresetId { bank: 0, number: 1 },
        Preset {
            name: "Sine mono".to_string(),
            zones: vec![preset_zone(1)],
        },
    );

    let instruments = vec![
        Instrument {
            name: "Sine stereo".to_string(),
            zones: vec![
                instrument_zone(0, Some(-500), 0),
                instrument_zone(1, Some(500), 0),
            ],
        },
        Instrument {
            name: "Sine mono".to_string(),
            zones: vec![instrument_zone(2, None, 0)],
        },
    ];

    let samples = vec![
        sample("SineL", SampleType::Left),
        sample("SineR", SampleType::Right),
        sample("Sine", SampleType::Mono),
    ];

    SoundFont::from_parts(
        Information::default(),
        wavetable(),
        presets,
        instruments,
        samples,
    )
}

fn synthesizer() -> Synthesizer {
    let settings = SynthesizerSettings::new(SAMPLE_RATE).unwrap();
    let mut synthesizer = Synthesizer::new(settings);
    synthesizer.load_soundfont(test_bank()).unwrap();
    synthesizer
}

/// The sampler's linear interpolation at the given pitch ratio, reproduced
/// for reference curves
fn resample(buffer: &[f32], ratio: f64, count: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(count);
    let mut position = 0.0f64;

    for _ in 0..count {
        let index = position.floor() as usize;
        let a = (position - index as f64) as f32;
        let x1 = buffer[index];
        let x2 = buffer[index + 1];
        out.push(x1 + a * (x2 - x1));
        position += ratio;
    }

    out
}

#[test]
fn test_mono_render_from_mono_bank_a4() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 1));
    synth.note_on(0, 69, 100);

    let mut buffer = vec![0.0f32; 640];
    synth.render_mono(&mut buffer);

    // A4 is the recorded pitch, so the output is the raw sample scaled by
    // the resolved gain.
    let reference = wavetable();
    for i in 0..640 {
        assert!(
            (buffer[i] - 0.33726 * reference[i]).abs() < 0.0001,
            "sample {}: {} != {}",
            i,
            buffer[i],
            0.33726 * reference[i]
        );
    }
}

#[test]
fn test_mono_render_from_mono_bank_c4() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 1));
    synth.note_on(0, 60, 100);

    let mut buffer = vec![0.0f32; 640];
    synth.render_mono(&mut buffer);

    // C4 is nine semitones below the recorded pitch.
    let ratio = ((-9.0f32 / 12.0).exp2()) as f64;
    let reference = resample(&wavetable(), ratio, 640);
    for i in 0..640 {
        assert!(
            (buffer[i] - 0.33726 * reference[i]).abs() < 0.0001,
            "sample {}: {} != {}",
            i,
            buffer[i],
            0.33726 * reference[i]
        );
    }
}

#[test]
fn test_stereo_render_from_stereo_bank_a4() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 0));
    synth.note_on(0, 69, 100);

    let mut left = vec![0.0f32; 640];
    let mut right = vec![0.0f32; 640];
    synth.render_stereo(&mut left, &mut right);

    // The instrument pan saturates both tracks, so each side carries the
    // plain resolved gain (the left side passes through the pan law just
    // inside the boundary, hence the tiny asymmetry).
    let reference = wavetable();
    for i in 0..640 {
        assert!(
            (left[i] - 0.47693 * reference[i]).abs() < 0.0001,
            "left sample {}: {} != {}",
            i,
            left[i],
            0.47693 * reference[i]
        );
        assert!(
            (right[i] - 0.47692 * reference[i]).abs() < 0.0001,
            "right sample {}: {} != {}",
            i,
            right[i],
            0.47692 * reference[i]
        );
    }
}

#[test]
fn test_stereo_render_from_mono_bank_a4() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 1));
    synth.note_on(0, 69, 100);

    let mut left = vec![0.0f32; 640];
    let mut right = vec![0.0f32; 640];
    synth.render_stereo(&mut left, &mut right);

    // A mono voice expands into both outputs through the pan law; the
    // default channel pan sits a hair right of center.
    let reference = wavetable();
    for i in 0..640 {
        assert!(
            (left[i] - 0.33726 * reference[i]).abs() < 0.0001,
            "left sample {}",
            i
        );
        assert!(
            (right[i] - 0.33722 * reference[i]).abs() < 0.0001,
            "right sample {}",
            i
        );
    }
}

#[test]
fn test_mono_render_from_stereo_bank_sums_both_tracks() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 0));
    synth.note_on(0, 69, 100);

    let mut buffer = vec![0.0f32; 640];
    synth.render_mono(&mut buffer);

    // Mono output accumulates the left and right tracks.
    let reference = wavetable();
    for i in 0..640 {
        assert!(
            (buffer[i] - (0.47693 + 0.47692) * reference[i]).abs() < 0.0002,
            "sample {}: {} != {}",
            i,
            buffer[i],
            (0.47693 + 0.47692) * reference[i]
        );
    }
}

#[test]
fn test_exclusive_class_cuts_previous_note() {
    // A drum-style bank where every zone carries exclusive class 1.
    let mut presets = PresetMap::new();
    presets.insert(
        PresetId { bank: 0, number: 0 },
        Preset {
            name: "Hats".to_string(),
            zones: vec![preset_zone(0)],
        },
    );

    let bank = SoundFont::from_parts(
        Information::default(),
        wavetable(),
        presets,
        vec![Instrument {
            name: "Hats".to_string(),
            zones: vec![instrument_zone(2, None, 1)],
        }],
        vec![
            sample("SineL", SampleType::Left),
            sample("SineR", SampleType::Right),
            sample("Sine", SampleType::Mono),
        ],
    );

    let settings = SynthesizerSettings::new(SAMPLE_RATE).unwrap();
    let mut synth = Synthesizer::new(settings);
    synth.load_soundfont(bank).unwrap();

    synth.note_on(0, 42, 100);
    assert_eq!(synth.nb_active_voices(), 1);

    // The second note must reuse the first voice's slot.
    synth.note_on(0, 46, 100);
    assert_eq!(synth.nb_active_voices(), 1);

    // A different channel gets its own voice.
    synth.note_on(1, 46, 100);
    assert_eq!(synth.nb_active_voices(), 2);
}

#[test]
fn test_polyphony_is_bounded_by_stealing() {
    let settings = {
        let mut settings = SynthesizerSettings::new(SAMPLE_RATE).unwrap();
        settings.set_maximum_polyphony(8).unwrap();
        settings
    };
    let mut synth = Synthesizer::new(settings);
    synth.load_soundfont(test_bank()).unwrap();
    assert!(synth.configure_channel(0, 0, 1));

    let mut buffer = vec![0.0f32; 64];
    for key in 40..80 {
        synth.note_on(0, key, 100);
        synth.render_mono(&mut buffer);
        assert!(synth.nb_active_voices() <= 8);
    }
}

#[test]
fn test_note_off_fades_to_silence() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 1));

    synth.note_on(0, 69, 100);
    let mut buffer = vec![0.0f32; 2205];
    synth.render_mono(&mut buffer);

    synth.note_off(0, 69);

    // The default release is clamped to 10 ms; after a quarter second the
    // voice is gone and the output is flat zero.
    let mut tail = vec![0.0f32; 5512];
    synth.render_mono(&mut tail);
    assert_eq!(synth.nb_active_voices(), 0);
    assert!(tail[4000..].iter().all(|&s| s == 0.0));
}

#[test]
fn test_rendered_sample_counter_matches_output() {
    let mut synth = synthesizer();

    let mut left = vec![0.0f32; 123];
    let mut right = vec![0.0f32; 123];
    synth.render_stereo(&mut left, &mut right);
    assert_eq!(synth.nb_rendered_samples(), 123);

    let mut mono = vec![0.0f32; 77];
    synth.render_mono(&mut mono);
    assert_eq!(synth.nb_rendered_samples(), 200);
}

#[test]
fn test_replay_after_reset_is_bit_identical() {
    let mut synth = synthesizer();
    assert!(synth.configure_channel(0, 0, 0));

    let play = |synth: &mut Synthesizer| -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0f32; 1000];
        let mut right = vec![0.0f32; 1000];
        synth.note_on(0, 69, 100);
        synth.note_on(0, 72, 80);
        synth.render_stereo(&mut left[..500], &mut right[..500]);
        synth.note_off(0, 69);
        synth.process_midi_message(0, 0xE0, 0x00, 0x50);
        let (_, left_tail) = left.split_at_mut(500);
        let (_, right_tail) = right.split_at_mut(500);
        synth.render_stereo(left_tail, right_tail);
        (left, right)
    };

    let (left_one, right_one) = play(&mut synth);

    synth.reset();

    // configure_channel state is cleared by reset; restore it.
    assert!(synth.configure_channel(0, 0, 0));
    let (left_two, right_two) = play(&mut synth);

    assert_eq!(left_one, left_two);
    assert_eq!(right_one, right_two);
}

#[test]
fn test_resolved_key_info_matches_bank_layout() {
    let bank = test_bank();

    let stereo = bank.key_info(0, 0, 69, 100).unwrap();
    assert!(stereo.stereo);
    assert_eq!(stereo.left.sample.name, "SineL");
    assert_eq!(stereo.right.as_ref().unwrap().sample.name, "SineR");

    let mono: SampleInfo = bank.key_info(0, 1, 69, 100).unwrap().left;
    assert_eq!(mono.sample.name, "Sine");
    assert_eq!(mono.generator(GeneratorType::Pan, 0).ivalue(), 0);
}
