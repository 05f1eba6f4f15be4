use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::util;

/*
    A decoded channel message, shaped like the records stored in the macro file.

    Only the fields that belong to a message kind are populated:
        note_on / note_off:  channel, note, velocity
        polytouch:           channel, note, value
        control_change:      channel, control, value
        program_change:      channel, program
        aftertouch:          channel, value
        pitchwheel:          channel (pitch is not kept)

    Absent fields serialize as null so existing macro files keep their layout.
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    NoteOn,
    NoteOff,
    Polytouch,
    ControlChange,
    ProgramChange,
    Aftertouch,
    Pitchwheel,
}

impl MessageKind {
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::NoteOn => "note_on",
            MessageKind::NoteOff => "note_off",
            MessageKind::Polytouch => "polytouch",
            MessageKind::ControlChange => "control_change",
            MessageKind::ProgramChange => "program_change",
            MessageKind::Aftertouch => "aftertouch",
            MessageKind::Pitchwheel => "pitchwheel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MidiMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub channel: Option<u8>,
    pub note: Option<u8>,
    pub velocity: Option<u8>,
    pub control: Option<u8>,
    pub value: Option<u8>,
    pub program: Option<u8>,
    #[serde(default)]
    pub time: f64,
}

impl MidiMessage {
    fn empty(kind: MessageKind, channel: u8) -> MidiMessage {
        MidiMessage {
            kind,
            channel: Some(channel),
            note: None,
            velocity: None,
            control: None,
            value: None,
            program: None,
            time: 0.0,
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> MidiMessage {
        MidiMessage {
            note: Some(note),
            velocity: Some(velocity),
            ..MidiMessage::empty(MessageKind::NoteOn, channel)
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> MidiMessage {
        MidiMessage {
            note: Some(note),
            velocity: Some(velocity),
            ..MidiMessage::empty(MessageKind::NoteOff, channel)
        }
    }

    pub fn polytouch(channel: u8, note: u8, value: u8) -> MidiMessage {
        MidiMessage {
            note: Some(note),
            value: Some(value),
            ..MidiMessage::empty(MessageKind::Polytouch, channel)
        }
    }

    pub fn control_change(channel: u8, control: u8, value: u8) -> MidiMessage {
        MidiMessage {
            control: Some(control),
            value: Some(value),
            ..MidiMessage::empty(MessageKind::ControlChange, channel)
        }
    }

    pub fn program_change(channel: u8, program: u8) -> MidiMessage {
        MidiMessage {
            program: Some(program),
            ..MidiMessage::empty(MessageKind::ProgramChange, channel)
        }
    }

    pub fn aftertouch(channel: u8, value: u8) -> MidiMessage {
        MidiMessage {
            value: Some(value),
            ..MidiMessage::empty(MessageKind::Aftertouch, channel)
        }
    }

    pub fn pitchwheel(channel: u8) -> MidiMessage {
        MidiMessage::empty(MessageKind::Pitchwheel, channel)
    }

    /// Release-style events carry a velocity of exactly zero. Kinds without a
    /// velocity field never qualify.
    pub fn is_release(&self) -> bool {
        self.velocity == Some(0)
    }

    /// Stable key identifying the physical control, e.g. `note_on_ch0_note60`.
    ///
    /// Velocity and value are left out so every press of the same control maps
    /// to the same macro. Saved macro files are keyed by this string, so the
    /// format must not change.
    pub fn fingerprint(&self) -> String {
        let address = [
            self.channel.map(|c| format!("ch{}", c)),
            self.note.map(|n| format!("note{}", n)),
            self.control.map(|c| format!("cc{}", c)),
            self.program.map(|p| format!("prog{}", p)),
        ];

        std::iter::once(self.kind.name().to_string())
            .chain(address.into_iter().flatten())
            .join("_")
    }

    /// Default human name for a learned control, e.g. `Note_On | Ch.0 | Note 60`.
    pub fn display_name(&self) -> String {
        let address = [
            self.channel.map(|c| format!("Ch.{}", c)),
            self.note.map(|n| format!("Note {}", n)),
            self.control.map(|c| format!("CC {}", c)),
            self.program.map(|p| format!("Prog {}", p)),
        ];

        std::iter::once(util::title_case(self.kind.name()))
            .chain(address.into_iter().flatten())
            .join(" | ")
    }

    /// One-line description for the debug log, every present field included.
    pub fn log_line(&self) -> String {
        let fields = [
            self.channel.map(|c| format!("Ch:{}", c)),
            self.note.map(|n| format!("Note:{}", n)),
            self.velocity.map(|v| format!("Vel:{}", v)),
            self.control.map(|c| format!("CC:{}", c)),
            self.value.map(|v| format!("Val:{}", v)),
            self.program.map(|p| format!("Prog:{}", p)),
        ];

        std::iter::once(format!("[{}]", self.kind.name()))
            .chain(fields.into_iter().flatten())
            .join(" ")
    }
}
