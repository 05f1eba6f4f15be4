use midir::{Ignore, MidiInput, MidiInputPort};
use tracing::debug;

use crate::error::{MacroError, Result};

const CLIENT_NAME: &str = "midi-macros";

// Clock ticks never carry a velocity, so drop them before they reach the callback
pub fn open_input() -> Result<MidiInput> {
    let mut midi_in = MidiInput::new(CLIENT_NAME)?;
    midi_in.ignore(Ignore::Time);
    Ok(midi_in)
}

pub fn input_port_names() -> Result<Vec<String>> {
    let midi_in = open_input()?;

    let names = midi_in
        .ports()
        .iter()
        .map(|port| midi_in.port_name(port))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!("Found MIDI input ports: {:?}", names);
    Ok(names)
}

/// Exact name match first, then the first port whose name contains `wanted`.
pub fn find_port(midi_in: &MidiInput, wanted: &str) -> Result<MidiInputPort> {
    let named: Vec<(MidiInputPort, String)> = midi_in
        .ports()
        .into_iter()
        .filter_map(|port| midi_in.port_name(&port).ok().map(|name| (port, name)))
        .collect();

    pick_port(named, wanted).ok_or_else(|| MacroError::PortNotFound(wanted.to_string()))
}

fn pick_port<P>(named: Vec<(P, String)>, wanted: &str) -> Option<P> {
    let exact = named.iter().position(|(_, name)| name == wanted);
    let index = exact.or_else(|| named.iter().position(|(_, name)| name.contains(wanted)))?;
    named.into_iter().nth(index).map(|(port, _)| port)
}
