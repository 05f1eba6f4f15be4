use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use midir::MidiInputConnection;
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{info, trace, warn};

use crate::error::{MacroError, Result};
use crate::midi_mapping;
use crate::midi_model::MidiMessage;
use crate::midi_reading;

pub const PIPE_CAPACITY: usize = 256;

pub type MidiPublisher = HeapProd<MidiMessage>;
pub type MidiSubscriber = HeapCons<MidiMessage>;

pub fn pipe() -> (MidiPublisher, MidiSubscriber) {
    HeapRb::<MidiMessage>::new(PIPE_CAPACITY).split()
}

// Only release-style messages (velocity 0) leave the listener
pub fn forward(raw: &[u8]) -> Option<MidiMessage> {
    let message = midi_mapping::map(raw)?;
    if message.is_release() {
        Some(message)
    } else {
        trace!("Ignoring {}", message.log_line());
        None
    }
}

/// Reads one MIDI input port on midir's callback thread and publishes
/// release events into the pipe drained by the UI thread.
pub struct MidiListener {
    publisher: Arc<Mutex<MidiPublisher>>,
    listening: Arc<AtomicBool>,
    connection: Option<MidiInputConnection<()>>,
    port_name: Option<String>,
}

impl MidiListener {
    pub fn new(publisher: MidiPublisher) -> MidiListener {
        MidiListener {
            publisher: Arc::new(Mutex::new(publisher)),
            listening: Arc::new(AtomicBool::new(false)),
            connection: None,
            port_name: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn start_listening(&mut self, wanted: &str) -> Result<()> {
        if self.is_listening() {
            self.stop_listening();
        }

        let midi_in = midi_reading::open_input()?;
        let port = midi_reading::find_port(&midi_in, wanted)?;
        let port_name = midi_in.port_name(&port)?;

        let publisher = self.publisher.clone();
        let listening = self.listening.clone();

        // The connection must stay alive for as long as we want callbacks
        let connection = midi_in
            .connect(
                &port,
                "midi-macros-input",
                move |_stamp, raw, _| {
                    if !listening.load(Ordering::SeqCst) {
                        return;
                    }

                    if let Some(message) = forward(raw) {
                        let pushed = match publisher.lock() {
                            Ok(mut publisher) => publisher.try_push(message).is_ok(),
                            Err(_) => false,
                        };
                        if !pushed {
                            warn!("MIDI pipe full, dropping event");
                        }
                    }
                },
                (),
            )
            .map_err(|e| MacroError::Connect {
                port: port_name.clone(),
                reason: e.to_string(),
            })?;

        self.listening.store(true, Ordering::SeqCst);
        self.connection = Some(connection);
        info!("Listening on '{}'", port_name);
        self.port_name = Some(port_name);

        Ok(())
    }

    pub fn stop_listening(&mut self) {
        self.listening.store(false, Ordering::SeqCst);

        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }

        if let Some(name) = self.port_name.take() {
            info!("Stopped listening on '{}'", name);
        }
    }
}

impl Drop for MidiListener {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Consumer;

    #[test]
    fn forwards_only_release_events() {
        assert_eq!(forward(&[0x90, 60, 0]), Some(MidiMessage::note_on(0, 60, 0)));
        assert_eq!(forward(&[0x81, 62, 0]), Some(MidiMessage::note_off(1, 62, 0)));

        assert_eq!(forward(&[0x90, 60, 100]), None);
        assert_eq!(forward(&[0x80, 60, 64]), None);
        assert_eq!(forward(&[0xB0, 1, 0]), None);
        assert_eq!(forward(&[0xA0, 60, 0]), None);
        assert_eq!(forward(&[0xF8]), None);
    }

    #[test]
    fn new_listener_is_idle() {
        let (publisher, mut subscriber) = pipe();
        let mut listener = MidiListener::new(publisher);

        assert!(!listener.is_listening());
        assert_eq!(listener.port_name(), None);

        listener.stop_listening();
        assert!(subscriber.try_pop().is_none());
    }
}
