//! SoundFont RIFF decoder
//!
//! Decodes the `sfbk` RIFF envelope: the INFO metadata list, the sample data
//! (16-bit `smpl`, optionally widened to 24 bits by `sm24`) and the nine
//! Hydra lists describing presets, instruments and samples. Global zones are
//! merged into their local siblings here, so the rest of the crate only ever
//! sees addressable zones.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::types::*;
use super::SoundFont;

/// Cursor over the raw file contents
struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.bytes.len() {
            bail!("seek past the end of the file");
        }
        self.position = position;
        Ok(())
    }

    fn read(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.position + count > self.bytes.len() {
            bail!("unexpected end of file");
        }
        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_fourcc(&mut self) -> Result<[u8; 4]> {
        let bytes = self.read(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Fixed-size, zero-padded ASCII name field
    fn read_name(&mut self, size: usize) -> Result<String> {
        let bytes = self.read(size)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(size);
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// A chunk header: FOURCC type, size, FOURCC id
struct ChunkHeader {
    chunk_type: [u8; 4],
    size: u32,
    id: [u8; 4],
}

fn read_chunk_header(reader: &mut Reader) -> Result<ChunkHeader> {
    Ok(ChunkHeader {
        chunk_type: reader.read_fourcc()?,
        size: reader.read_u32()?,
        id: reader.read_fourcc()?,
    })
}

/// A field header inside a LIST chunk: FOURCC id, size
fn read_field_info(reader: &mut Reader) -> Result<([u8; 4], u32)> {
    Ok((reader.read_fourcc()?, reader.read_u32()?))
}

/// Parse a complete SoundFont file image
pub fn parse(bytes: &[u8]) -> Result<SoundFont> {
    let mut reader = Reader::new(bytes);

    let header = read_chunk_header(&mut reader).context("sfbk header")?;
    if &header.chunk_type != b"RIFF" || &header.id != b"sfbk" {
        bail!("not a SoundFont file (missing RIFF sfbk header)");
    }

    // INFO list
    let info_header = read_chunk_header(&mut reader).context("INFO header")?;
    if &info_header.chunk_type != b"LIST" || &info_header.id != b"INFO" {
        bail!("missing INFO chunk");
    }

    let end_of_chunk = reader.position() + info_header.size as usize - 4;
    let information = parse_information(&mut reader, end_of_chunk).context("INFO chunk")?;
    reader.seek(end_of_chunk)?;

    // Sample data list
    let sdta_header = read_chunk_header(&mut reader).context("sdta header")?;
    if &sdta_header.chunk_type != b"LIST" || &sdta_header.id != b"sdta" {
        bail!("missing sdta chunk");
    }

    let end_of_chunk = reader.position() + sdta_header.size as usize - 4;
    let buffer = if sdta_header.size != 4 {
        parse_sample_data(&mut reader).context("sdta chunk")?
    } else {
        Vec::new()
    };
    reader.seek(end_of_chunk)?;

    // Hydra list
    let pdta_header = read_chunk_header(&mut reader).context("pdta header")?;
    if &pdta_header.chunk_type != b"LIST" || &pdta_header.id != b"pdta" {
        bail!("missing pdta chunk");
    }

    let (presets, instruments, samples) = parse_hydra(&mut reader).context("pdta chunk")?;

    debug!(
        buffer_len = buffer.len(),
        presets = presets.len(),
        instruments = instruments.len(),
        samples = samples.len(),
        "decoded SoundFont chunks"
    );

    Ok(SoundFont {
        information,
        buffer: Arc::new(buffer),
        presets,
        instruments,
        samples,
    })
}

fn parse_information(reader: &mut Reader, end_of_chunk: usize) -> Result<Information> {
    let mut information = Information::default();

    while reader.position() < end_of_chunk {
        let (id, size) = read_field_info(reader)?;
        let size = size as usize;

        match &id {
            b"ifil" => {
                if size != 4 {
                    bail!("malformed ifil field");
                }
                information.major_version = reader.read_u16()?;
                information.minor_version = reader.read_u16()?;
            }
            b"iver" => {
                if size != 4 {
                    bail!("malformed iver field");
                }
                information.rom_major_version = reader.read_u16()?;
                information.rom_minor_version = reader.read_u16()?;
            }
            b"INAM" => information.name = reader.read_name(size)?,
            b"isng" => information.target_engine = reader.read_name(size)?,
            b"irom" => information.rom_name = reader.read_name(size)?,
            b"ICRD" => information.creation_date = reader.read_name(size)?,
            b"IENG" => information.engineers = reader.read_name(size)?,
            b"IPRD" => information.product = reader.read_name(size)?,
            b"ICOP" => information.copyright = reader.read_name(size)?,
            b"ICMT" => information.comments = reader.read_name(size)?,
            b"ISFT" => information.creation_tool = reader.read_name(size)?,
            _ => {
                reader.read(size)?;
            }
        }
    }

    Ok(information)
}

/// Decode `smpl` (and optionally `sm24`) into a normalized f32 wavetable
fn parse_sample_data(reader: &mut Reader) -> Result<Vec<f32>> {
    let (id, size) = read_field_info(reader)?;
    if &id != b"smpl" {
        bail!("missing smpl field");
    }

    let sample_bytes = reader.read(size as usize)?;
    let nb_samples = size as usize / 2;

    // A trailing sm24 field holds the low bytes of 24-bit samples.
    let lsb_bytes = match read_field_info(reader) {
        Ok((id, sm24_size)) if &id == b"sm24" => Some(reader.read(sm24_size as usize)?),
        _ => None,
    };

    let mut buffer = Vec::with_capacity(nb_samples);

    match lsb_bytes {
        Some(lsb) if lsb.len() >= nb_samples => {
            for i in 0..nb_samples {
                let msb = i16::from_le_bytes([sample_bytes[2 * i], sample_bytes[2 * i + 1]]);
                let value = ((msb as i32) << 8) | lsb[i] as i32;
                buffer.push(value as f32 / 8388608.0);
            }
        }
        _ => {
            for i in 0..nb_samples {
                let value = i16::from_le_bytes([sample_bytes[2 * i], sample_bytes[2 * i + 1]]);
                buffer.push(value as f32 / 32767.0);
            }
        }
    }

    Ok(buffer)
}

/// Raw phdr record
struct RawPreset {
    name: String,
    preset: u16,
    bank: u16,
    bag_index: u16,
}

/// Raw pbag/ibag record
struct RawBag {
    generators_index: u16,
    modulators_index: u16,
}

/// Raw pmod/imod record
struct RawModulator {
    src_operation: u16,
    dest_operation: u16,
    amount: i16,
    amount_src_operation: u16,
    transform_operation: u16,
}

/// Raw pgen/igen record
struct RawGenerator {
    generator_type: u16,
    amount: u16,
}

/// Raw inst record
struct RawInstrument {
    name: String,
    bag_index: u16,
}

fn parse_hydra(reader: &mut Reader) -> Result<(PresetMap, Vec<Instrument>, Vec<Sample>)> {
    // phdr
    let (id, size) = read_field_info(reader)?;
    if &id != b"phdr" {
        bail!("missing phdr field");
    }
    let mut raw_presets = Vec::with_capacity(size as usize / 38);
    for _ in 0..size / 38 {
        raw_presets.push(RawPreset {
            name: reader.read_name(20)?,
            preset: reader.read_u16()?,
            bank: reader.read_u16()?,
            bag_index: reader.read_u16()?,
        });
        // library, genre, morphology: reserved
        reader.read(12)?;
    }

    // pbag
    let (id, size) = read_field_info(reader)?;
    if &id != b"pbag" {
        bail!("missing pbag field");
    }
    let mut preset_bags = Vec::with_capacity(size as usize / 4);
    for _ in 0..size / 4 {
        preset_bags.push(RawBag {
            generators_index: reader.read_u16()?,
            modulators_index: reader.read_u16()?,
        });
    }

    // pmod
    let (id, size) = read_field_info(reader)?;
    if &id != b"pmod" {
        bail!("missing pmod field");
    }
    let preset_modulators = read_modulators(reader, size)?;

    // pgen
    let (id, size) = read_field_info(reader)?;
    if &id != b"pgen" {
        bail!("missing pgen field");
    }
    let preset_generators = read_generators(reader, size)?;

    // inst
    let (id, size) = read_field_info(reader)?;
    if &id != b"inst" {
        bail!("missing inst field");
    }
    let mut raw_instruments = Vec::with_capacity(size as usize / 22);
    for _ in 0..size / 22 {
        raw_instruments.push(RawInstrument {
            name: reader.read_name(20)?,
            bag_index: reader.read_u16()?,
        });
    }

    // ibag
    let (id, size) = read_field_info(reader)?;
    if &id != b"ibag" {
        bail!("missing ibag field");
    }
    let mut instrument_bags = Vec::with_capacity(size as usize / 4);
    for _ in 0..size / 4 {
        instrument_bags.push(RawBag {
            generators_index: reader.read_u16()?,
            modulators_index: reader.read_u16()?,
        });
    }

    // imod
    let (id, size) = read_field_info(reader)?;
    if &id != b"imod" {
        bail!("missing imod field");
    }
    let instrument_modulators = read_modulators(reader, size)?;

    // igen
    let (id, size) = read_field_info(reader)?;
    if &id != b"igen" {
        bail!("missing igen field");
    }
    let instrument_generators = read_generators(reader, size)?;

    // shdr
    let (id, size) = read_field_info(reader)?;
    if &id != b"shdr" {
        bail!("missing shdr field");
    }
    let mut raw_samples = Vec::with_capacity(size as usize / 46);
    for _ in 0..size / 46 {
        let name = reader.read_name(20)?;
        raw_samples.push(Sample {
            name,
            start: reader.read_u32()?,
            end: reader.read_u32()?,
            loop_start: reader.read_u32()?,
            loop_end: reader.read_u32()?,
            sample_rate: reader.read_u32()?,
            original_pitch: reader.read_u8()?,
            pitch_correction: reader.read_i8()?,
            sample_link: reader.read_u16()?,
            sample_type: SampleType::from_raw(reader.read_u16()?),
        });
    }

    // Build the internal representation. Each list ends with a terminator
    // record that only delimits the last real entry, hence the len - 1
    // loops: dropping it by accident silently loses a preset or instrument.
    let mut presets = PresetMap::new();

    if raw_presets.is_empty() || preset_bags.is_empty() {
        bail!("preset lists are empty");
    }

    for i in 0..raw_presets.len() - 1 {
        let raw = &raw_presets[i];

        let mut preset = Preset {
            name: raw.name.clone(),
            zones: Vec::new(),
        };

        let mut globals: Option<Zone> = None;

        for j in raw.bag_index as usize..raw_presets[i + 1].bag_index as usize {
            let bag = &preset_bags[j];
            let next_bag = &preset_bags[j + 1];

            let mut zone = Zone::default();

            zone.generators
                .insert(GeneratorType::KeyRange, GeneratorAmount::from_range(0, 127));
            zone.generators.insert(
                GeneratorType::VelocityRange,
                GeneratorAmount::from_range(0, 127),
            );

            if let Some(globals) = &globals {
                for (&generator_type, &amount) in &globals.generators {
                    zone.generators.insert(generator_type, amount);
                }
            }

            for k in bag.generators_index as usize..next_bag.generators_index as usize {
                let raw_generator = &preset_generators[k];
                if let Some(generator_type) = GeneratorType::from_raw(raw_generator.generator_type)
                {
                    zone.generators
                        .insert(generator_type, GeneratorAmount(raw_generator.amount));
                }
            }

            if let Some(globals) = &globals {
                for (&modulator_id, &modulator) in &globals.modulators {
                    zone.modulators.insert(modulator_id, modulator);
                }
            }

            for k in bag.modulators_index as usize..next_bag.modulators_index as usize {
                if let Some((modulator_id, modulator)) =
                    decode_modulator(&preset_modulators[k])
                {
                    zone.modulators.insert(modulator_id, modulator);
                }
            }

            if !zone.generators.contains_key(&GeneratorType::Instrument) {
                globals = Some(zone);
            } else {
                extract_ranges(&mut zone);
                preset.zones.push(zone);
            }
        }

        presets.insert(
            PresetId {
                bank: raw.bank,
                number: raw.preset,
            },
            preset,
        );
    }

    let mut instruments = Vec::new();

    if raw_instruments.is_empty() || instrument_bags.is_empty() {
        bail!("instrument lists are empty");
    }

    for i in 0..raw_instruments.len() - 1 {
        let raw = &raw_instruments[i];

        let mut instrument = Instrument {
            name: raw.name.clone(),
            zones: Vec::new(),
        };

        let mut globals: Option<Zone> = None;

        for j in raw.bag_index as usize..raw_instruments[i + 1].bag_index as usize {
            let bag = &instrument_bags[j];
            let next_bag = &instrument_bags[j + 1];

            let mut zone = Zone::default();

            // A local zone starts from the bank defaults unless a global
            // zone already replaced them.
            match &globals {
                Some(globals) => {
                    for (&generator_type, &amount) in &globals.generators {
                        zone.generators.insert(generator_type, amount);
                    }
                }
                None => zone.generators = default_generators(),
            }

            for k in bag.generators_index as usize..next_bag.generators_index as usize {
                let raw_generator = &instrument_generators[k];
                if let Some(generator_type) = GeneratorType::from_raw(raw_generator.generator_type)
                {
                    zone.generators
                        .insert(generator_type, GeneratorAmount(raw_generator.amount));
                }
            }

            match &globals {
                Some(globals) => {
                    for (&modulator_id, &modulator) in &globals.modulators {
                        zone.modulators.insert(modulator_id, modulator);
                    }
                }
                None => zone.modulators = default_modulators(),
            }

            for k in bag.modulators_index as usize..next_bag.modulators_index as usize {
                if let Some((modulator_id, modulator)) =
                    decode_modulator(&instrument_modulators[k])
                {
                    zone.modulators.insert(modulator_id, modulator);
                }
            }

            if !zone.generators.contains_key(&GeneratorType::SampleId) {
                globals = Some(zone);
            } else {
                extract_ranges(&mut zone);
                instrument.zones.push(zone);
            }
        }

        instruments.push(instrument);
    }

    if raw_samples.is_empty() {
        bail!("sample list is empty");
    }
    raw_samples.pop();

    Ok((presets, instruments, raw_samples))
}

fn read_modulators(reader: &mut Reader, size: u32) -> Result<Vec<RawModulator>> {
    let mut modulators = Vec::with_capacity(size as usize / 10);
    for _ in 0..size / 10 {
        modulators.push(RawModulator {
            src_operation: reader.read_u16()?,
            dest_operation: reader.read_u16()?,
            amount: reader.read_i16()?,
            amount_src_operation: reader.read_u16()?,
            transform_operation: reader.read_u16()?,
        });
    }
    Ok(modulators)
}

fn read_generators(reader: &mut Reader, size: u32) -> Result<Vec<RawGenerator>> {
    let mut generators = Vec::with_capacity(size as usize / 4);
    for _ in 0..size / 4 {
        generators.push(RawGenerator {
            generator_type: reader.read_u16()?,
            amount: reader.read_u16()?,
        });
    }
    Ok(generators)
}

/// Decode one raw modulator record; None when the destination is unknown
fn decode_modulator(raw: &RawModulator) -> Option<(ModulatorId, Modulator)> {
    let dest = GeneratorType::from_raw(raw.dest_operation)?;

    Some((
        ModulatorId {
            src: ModulatorSource::from_raw(raw.src_operation),
            dest,
            amount_src: ModulatorSource::from_raw(raw.amount_src_operation),
        },
        Modulator {
            amount: raw.amount,
            transform: raw.transform_operation,
        },
    ))
}

/// Move the key and velocity ranges out of the generator map
fn extract_ranges(zone: &mut Zone) {
    if let Some(amount) = zone.generators.remove(&GeneratorType::KeyRange) {
        zone.keys_range = amount.range();
    }
    if let Some(amount) = zone.generators.remove(&GeneratorType::VelocityRange) {
        zone.velocities_range = amount.range();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble a minimal, valid sfbk image: one mono sample, one
    /// instrument, two presets (the second in bank 1).
    fn build_test_file() -> Vec<u8> {
        let mut smpl: Vec<u8> = Vec::new();
        for i in 0..200i16 {
            smpl.extend_from_slice(&i.to_le_bytes());
        }

        let mut info = Vec::new();
        push_field(&mut info, b"ifil", &{
            let mut v = Vec::new();
            v.extend_from_slice(&2u16.to_le_bytes());
            v.extend_from_slice(&1u16.to_le_bytes());
            v
        });
        push_field(&mut info, b"INAM", b"Test Bank\0");

        let mut sdta = Vec::new();
        push_field(&mut sdta, b"smpl", &smpl);

        // phdr: two presets + terminator
        let mut phdr = Vec::new();
        push_preset(&mut phdr, "Piano", 0, 0, 0);
        push_preset(&mut phdr, "Piano 2", 1, 1, 1);
        push_preset(&mut phdr, "EOP", 0, 0, 2);

        // pbag: one zone per preset + terminator
        let mut pbag = Vec::new();
        push_bag(&mut pbag, 0, 0);
        push_bag(&mut pbag, 1, 0);
        push_bag(&mut pbag, 2, 0);

        // pmod: terminator only
        let pmod = vec![0u8; 10];

        // pgen: each preset zone references instrument 0 + terminator
        let mut pgen = Vec::new();
        push_generator(&mut pgen, 41, 0);
        push_generator(&mut pgen, 41, 0);
        push_generator(&mut pgen, 0, 0);

        // inst: one instrument + terminator
        let mut inst = Vec::new();
        push_instrument(&mut inst, "Sine", 0);
        push_instrument(&mut inst, "EOI", 2);

        // ibag: a global zone, a local zone + terminator
        let mut ibag = Vec::new();
        push_bag(&mut ibag, 0, 0);
        push_bag(&mut ibag, 1, 0);
        push_bag(&mut ibag, 3, 0);

        // imod: terminator only
        let imod = vec![0u8; 10];

        // igen: global zone sets pan 250; local zone has a key range and a
        // sample id (the range must precede the sample id per the format).
        let mut igen = Vec::new();
        push_generator(&mut igen, 17, 250);
        push_generator(&mut igen, 43, 0x3C00); // keys 0..=60
        push_generator(&mut igen, 53, 0);
        push_generator(&mut igen, 0, 0);

        // shdr: one sample + terminator
        let mut shdr = Vec::new();
        push_sample(&mut shdr, "sine", 0, 199, 50, 150, 22050, 69, 0, 1);
        push_sample(&mut shdr, "EOS", 0, 0, 0, 0, 0, 0, 0, 0);

        let mut pdta = Vec::new();
        push_field(&mut pdta, b"phdr", &phdr);
        push_field(&mut pdta, b"pbag", &pbag);
        push_field(&mut pdta, b"pmod", &pmod);
        push_field(&mut pdta, b"pgen", &pgen);
        push_field(&mut pdta, b"inst", &inst);
        push_field(&mut pdta, b"ibag", &ibag);
        push_field(&mut pdta, b"imod", &imod);
        push_field(&mut pdta, b"igen", &igen);
        push_field(&mut pdta, b"shdr", &shdr);

        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        let info_list = 4 + info.len();
        let sdta_list = 4 + sdta.len();
        let pdta_list = 4 + pdta.len();
        let total = 4 + 8 + info_list + 8 + sdta_list + 8 + pdta_list;
        file.extend_from_slice(&(total as u32).to_le_bytes());
        file.extend_from_slice(b"sfbk");

        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&(info_list as u32).to_le_bytes());
        file.extend_from_slice(b"INFO");
        file.extend_from_slice(&info);

        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&(sdta_list as u32).to_le_bytes());
        file.extend_from_slice(b"sdta");
        file.extend_from_slice(&sdta);

        file.extend_from_slice(b"LIST");
        file.extend_from_slice(&(pdta_list as u32).to_le_bytes());
        file.extend_from_slice(b"pdta");
        file.extend_from_slice(&pdta);

        file
    }

    fn push_field(out: &mut Vec<u8>, id: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(id);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }

    fn push_name(out: &mut Vec<u8>, name: &str) {
        let mut bytes = [0u8; 20];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&bytes);
    }

    fn push_preset(out: &mut Vec<u8>, name: &str, number: u16, bank: u16, bag_index: u16) {
        push_name(out, name);
        out.extend_from_slice(&number.to_le_bytes());
        out.extend_from_slice(&bank.to_le_bytes());
        out.extend_from_slice(&bag_index.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
    }

    fn push_bag(out: &mut Vec<u8>, generators_index: u16, modulators_index: u16) {
        out.extend_from_slice(&generators_index.to_le_bytes());
        out.extend_from_slice(&modulators_index.to_le_bytes());
    }

    fn push_generator(out: &mut Vec<u8>, generator_type: u16, amount: u16) {
        out.extend_from_slice(&generator_type.to_le_bytes());
        out.extend_from_slice(&amount.to_le_bytes());
    }

    fn push_instrument(out: &mut Vec<u8>, name: &str, bag_index: u16) {
        push_name(out, name);
        out.extend_from_slice(&bag_index.to_le_bytes());
    }

    #[allow(clippy::too_many_arguments)]
    fn push_sample(
        out: &mut Vec<u8>,
        name: &str,
        start: u32,
        end: u32,
        loop_start: u32,
        loop_end: u32,
        sample_rate: u32,
        original_pitch: u8,
        pitch_correction: i8,
        sample_type: u16,
    ) {
        push_name(out, name);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&end.to_le_bytes());
        out.extend_from_slice(&loop_start.to_le_bytes());
        out.extend_from_slice(&loop_end.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.push(original_pitch);
        out.push(pitch_correction as u8);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&sample_type.to_le_bytes());
    }

    #[test]
    fn test_parse_information_and_counts() {
        let soundfont = parse(&build_test_file()).unwrap();

        assert_eq!(soundfont.information().major_version, 2);
        assert_eq!(soundfont.information().minor_version, 1);
        assert_eq!(soundfont.information().name, "Test Bank");

        // The terminator records must not survive as entries.
        assert_eq!(soundfont.presets().len(), 2);
        assert_eq!(soundfont.instruments().len(), 1);
        assert_eq!(soundfont.samples().len(), 1);
    }

    #[test]
    fn test_parse_sample_normalization() {
        let soundfont = parse(&build_test_file()).unwrap();

        let buffer = soundfont.buffer();
        assert_eq!(buffer.len(), 200);
        assert_eq!(buffer[0], 0.0);
        assert!((buffer[100] - 100.0 / 32767.0).abs() < 1e-7);
    }

    #[test]
    fn test_parse_presets_by_bank_and_number() {
        let soundfont = parse(&build_test_file()).unwrap();

        assert_eq!(soundfont.preset(0, 0).unwrap().name, "Piano");
        assert_eq!(soundfont.preset(1, 1).unwrap().name, "Piano 2");
        assert!(soundfont.preset(0, 1).is_none());
    }

    #[test]
    fn test_global_zone_is_merged_into_locals() {
        let soundfont = parse(&build_test_file()).unwrap();

        let instrument = &soundfont.instruments()[0];
        assert_eq!(instrument.name, "Sine");
        // The global zone itself is not addressable.
        assert_eq!(instrument.zones.len(), 1);

        let zone = &instrument.zones[0];
        // Global pan carried into the local zone, defaults still present.
        assert_eq!(zone.generators[&GeneratorType::Pan].ivalue(), 250);
        assert_eq!(
            zone.generators[&GeneratorType::InitialFilterCutoffFrequency].uvalue(),
            13500
        );
        // Ranges extracted out of the map.
        assert_eq!(zone.keys_range, Range { lo: 0, hi: 60 });
        assert!(!zone.generators.contains_key(&GeneratorType::KeyRange));
        assert!(zone.generators.contains_key(&GeneratorType::SampleId));
    }

    #[test]
    fn test_parse_sample_header() {
        let soundfont = parse(&build_test_file()).unwrap();

        let sample = &soundfont.samples()[0];
        assert_eq!(sample.name, "sine");
        assert_eq!(sample.start, 0);
        assert_eq!(sample.end, 199);
        assert_eq!(sample.loop_start, 50);
        assert_eq!(sample.loop_end, 150);
        assert_eq!(sample.sample_rate, 22050);
        assert_eq!(sample.original_pitch, 69);
        assert_eq!(sample.sample_type, SampleType::Mono);
    }

    #[test]
    fn test_rejects_non_soundfont_data() {
        assert!(parse(b"RIFF\x04\x00\x00\x00WAVE").is_err());
        assert!(parse(b"garbage").is_err());
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_truncated_file_fails_cleanly() {
        let file = build_test_file();
        assert!(parse(&file[..file.len() / 2]).is_err());
    }
}
