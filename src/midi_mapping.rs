use crate::midi_model::MidiMessage;

/*
    Raw channel message layout: [status, data1, data2]
        - status high nibble is the message kind, low nibble the 0-based channel
        - 0x80 note off        [note, velocity]
        - 0x90 note on         [note, velocity]
        - 0xA0 polytouch       [note, pressure]
        - 0xB0 control change  [control, value]
        - 0xC0 program change  [program]
        - 0xD0 aftertouch      [pressure]
        - 0xE0 pitchwheel      [lsb, msb]
    System messages (0xF0 and up, clock included) are not mapped.
*/

const DATA_MASK: u8 = 0x7F;

fn data_len(status: u8) -> Option<usize> {
    match status & 0xF0 {
        0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => Some(2),
        0xC0 | 0xD0 => Some(1),
        _ => None,
    }
}

pub fn map(event: &[u8]) -> Option<MidiMessage> {
    let (&status, data) = event.split_first()?;

    let expected = data_len(status)?;
    if data.len() < expected {
        return None;
    }

    let channel = status & 0x0F;
    let first = data[0] & DATA_MASK;
    let second = data.get(1).map(|b| b & DATA_MASK).unwrap_or(0);

    let message = match status & 0xF0 {
        0x80 => MidiMessage::note_off(channel, first, second),
        0x90 => MidiMessage::note_on(channel, first, second),
        0xA0 => MidiMessage::polytouch(channel, first, second),
        0xB0 => MidiMessage::control_change(channel, first, second),
        0xC0 => MidiMessage::program_change(channel, first),
        0xD0 => MidiMessage::aftertouch(channel, first),
        0xE0 => MidiMessage::pitchwheel(channel),
        _ => return None,
    };

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_model::MessageKind;

    #[test]
    fn maps_notes() {
        let off = map(&[0x80, 60, 0]).unwrap();
        assert_eq!(off, MidiMessage::note_off(0, 60, 0));

        // Note on with zero velocity stays a note on, as the device sent it
        let on = map(&[0x93, 36, 0]).unwrap();
        assert_eq!(on.kind, MessageKind::NoteOn);
        assert_eq!(on.channel, Some(3));
        assert_eq!(on.velocity, Some(0));
        assert_eq!(on.fingerprint(), "note_on_ch3_note36");
    }

    #[test]
    fn maps_controls_and_programs() {
        assert_eq!(
            map(&[0xB1, 74, 100]).unwrap(),
            MidiMessage::control_change(1, 74, 100)
        );
        assert_eq!(map(&[0xC0, 5]).unwrap(), MidiMessage::program_change(0, 5));
        assert_eq!(map(&[0xD2, 40]).unwrap(), MidiMessage::aftertouch(2, 40));
        assert_eq!(map(&[0xEF, 0, 64]).unwrap(), MidiMessage::pitchwheel(15));
    }

    #[test]
    fn ignores_system_and_short_messages() {
        assert_eq!(map(&[0xF8]), None);
        assert_eq!(map(&[0xF0, 0x7E, 0xF7]), None);
        assert_eq!(map(&[0x90, 60]), None);
        assert_eq!(map(&[]), None);
    }
}
