//! MIDI input for the synthesizer
//!
//! Connects a midir input port and forwards channel messages to a shared
//! synthesizer instance.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use midir::{MidiInput, MidiInputConnection};
use tracing::{debug, info};

use super::Synthesizer;

/// Live MIDI input feeding a synthesizer
pub struct MidiListener {
    connection: Option<MidiInputConnection<()>>,
}

impl MidiListener {
    /// Connect to a MIDI input port and start dispatching to the synthesizer
    ///
    /// With no port name, the first available port is used.
    pub fn connect(
        port_name: Option<&str>,
        synthesizer: Arc<Mutex<Synthesizer>>,
    ) -> Result<Self> {
        let midi_in = MidiInput::new("Carillon MIDI Input")?;
        let ports = midi_in.ports();

        if ports.is_empty() {
            return Err(anyhow!("no MIDI input ports available"));
        }

        let port = if let Some(name) = port_name {
            ports
                .iter()
                .find(|p| {
                    midi_in
                        .port_name(p)
                        .map(|n| n.contains(name))
                        .unwrap_or(false)
                })
                .ok_or_else(|| anyhow!("MIDI port '{}' not found", name))?
                .clone()
        } else {
            ports[0].clone()
        };

        let port_name_actual = midi_in.port_name(&port)?;

        let connection = midi_in
            .connect(
                &port,
                "carillon-input",
                move |_timestamp, message, _| {
                    dispatch(&synthesizer, message);
                },
                (),
            )
            .map_err(|e| anyhow!("failed to connect to MIDI port: {}", e))?;

        info!(port = %port_name_actual, "MIDI input connected");

        Ok(Self {
            connection: Some(connection),
        })
    }

    /// Close the MIDI connection
    pub fn close(&mut self) {
        self.connection = None;
    }
}

/// Forward one raw MIDI message to the synthesizer
fn dispatch(synthesizer: &Arc<Mutex<Synthesizer>>, message: &[u8]) {
    if message.is_empty() {
        return;
    }

    let status = message[0];
    let command = status & 0xF0;
    let channel = status & 0x0F;

    // System messages (0xF0..) are not channel messages.
    if command == 0xF0 {
        return;
    }

    let data1 = message.get(1).copied().unwrap_or(0);
    let data2 = message.get(2).copied().unwrap_or(0);

    match synthesizer.lock() {
        Ok(mut synth) => {
            synth.process_midi_message(channel, command, data1, data2);
        }
        Err(_) => debug!("synthesizer mutex poisoned, MIDI message dropped"),
    }
}

/// List available MIDI input ports
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("Carillon MIDI List")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

/// Get the default MIDI input port name
pub fn default_port_name() -> Option<String> {
    let midi_in = MidiInput::new("Carillon MIDI Default").ok()?;
    let ports = midi_in.ports();
    ports.first().and_then(|p| midi_in.port_name(p).ok())
}
