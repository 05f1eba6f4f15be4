use std::time::{Duration, Instant};

use ringbuf::traits::Consumer;
use tracing::{debug, info, trace, warn};

use crate::action::ActionKind;
use crate::automation::InputInjector;
use crate::dispatch::{Dispatch, Dispatcher, Mode};
use crate::error::Result;
use crate::macro_table::{MacroRecord, MacroTable};
use crate::midi_model::MidiMessage;
use crate::midi_read_daemon::{self, MidiListener, MidiSubscriber};
use crate::midi_reading;
use crate::settings::Settings;

pub const NO_PORTS: &str = "No MIDI ports found";
const HIGHLIGHT_FOR: Duration = Duration::from_millis(500);

/// A macro table row as the front end shows it.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub fingerprint: String,
    pub name: String,
    pub action: String,
    pub highlighted: bool,
}

/// Everything the window does, minus the drawing. All mutation happens on the
/// thread that owns the `App`; the MIDI callback only feeds the pipe.
pub struct App<I: InputInjector> {
    table: MacroTable,
    dispatcher: Dispatcher,
    listener: MidiListener,
    subscriber: MidiSubscriber,
    injector: I,
    mode: Mode,
    learning: bool,
    captured: Option<MidiMessage>,
    ports: Vec<String>,
    selected_port: usize,
    status: String,
    highlight: Option<(String, Instant)>,
}

impl<I: InputInjector> App<I> {
    pub fn new(settings: &Settings, injector: I) -> App<I> {
        let (publisher, subscriber) = midi_read_daemon::pipe();

        App {
            table: MacroTable::load(&settings.macro_file),
            dispatcher: Dispatcher::new(settings.debounce),
            listener: MidiListener::new(publisher),
            subscriber,
            injector,
            mode: settings.mode,
            learning: false,
            captured: None,
            ports: Vec::new(),
            selected_port: 0,
            status: "Ready - Connect to a MIDI port to begin".to_string(),
            highlight: None,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_learning(&self) -> bool {
        self.learning
    }

    pub fn captured(&self) -> Option<&MidiMessage> {
        self.captured.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.listener.is_listening()
    }

    pub fn connected_port(&self) -> Option<&str> {
        self.listener.port_name()
    }

    pub fn table(&self) -> &MacroTable {
        &self.table
    }

    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    pub fn selected_port(&self) -> Option<&str> {
        self.ports.get(self.selected_port).map(String::as_str)
    }

    pub fn select_port(&mut self, offset: isize) {
        if self.ports.is_empty() {
            return;
        }
        let count = self.ports.len() as isize;
        self.selected_port = (self.selected_port as isize + offset).rem_euclid(count) as usize;
    }

    pub fn rows(&self, now: Instant) -> Vec<Row> {
        let lit = self
            .highlight
            .as_ref()
            .filter(|(_, since)| now.saturating_duration_since(*since) < HIGHLIGHT_FOR)
            .map(|(fingerprint, _)| fingerprint.as_str());

        self.table
            .iter()
            .map(|(fingerprint, record)| Row {
                fingerprint: fingerprint.clone(),
                name: record.name(),
                action: record.display(),
                highlighted: lit == Some(fingerprint.as_str()),
            })
            .collect()
    }

    pub fn refresh_ports(&mut self) {
        let scan = midi_reading::input_port_names();
        self.apply_port_scan(scan);
    }

    fn apply_port_scan(&mut self, scan: Result<Vec<String>>) {
        match scan {
            Ok(ports) if ports.is_empty() => {
                self.ports = Vec::new();
                self.status = "No MIDI input ports found".to_string();
            }
            Ok(ports) => {
                self.status = format!("Found {} MIDI input port(s)", ports.len());
                self.ports = ports;
            }
            Err(err) => {
                self.ports = Vec::new();
                self.status = format!("Error scanning MIDI ports: {}", err);
            }
        }
        self.selected_port = 0;
    }

    /// Moves the selection onto the first port whose name contains `wanted`.
    pub fn prefer_port(&mut self, wanted: &str) -> bool {
        match self.ports.iter().position(|name| name.contains(wanted)) {
            Some(index) => {
                self.selected_port = index;
                true
            }
            None => false,
        }
    }

    pub fn toggle_connection(&mut self) {
        if self.listener.is_listening() {
            self.listener.stop_listening();
            self.learning = false;
            self.captured = None;
            self.status = "Disconnected from MIDI port".to_string();
            return;
        }

        let Some(port) = self.selected_port().map(str::to_string) else {
            self.status = NO_PORTS.to_string();
            return;
        };

        match self.listener.start_listening(&port) {
            Ok(()) => self.status = format!("Connected to {}", port),
            Err(err) => {
                warn!("Connection to '{}' failed: {}", port, err);
                self.status = format!("Failed to connect to {}", port);
            }
        }
    }

    /// Drains the MIDI pipe. Returns true when anything arrived.
    pub fn poll_midi(&mut self, now: Instant) -> bool {
        let mut received = false;
        while let Some(message) = self.subscriber.try_pop() {
            self.on_midi_message(message, now);
            received = true;
        }
        received
    }

    pub fn on_midi_message(&mut self, message: MidiMessage, now: Instant) {
        let has_macro = self.table.contains(&message.fingerprint());
        debug!(
            "{}{}",
            message.log_line(),
            if has_macro { " -> HAS MACRO" } else { "" }
        );

        // Only release events reach this point from the listener
        if !message.is_release() {
            return;
        }

        if self.learning {
            self.learning = false;
            self.status = format!("Captured {} - choose an action", message.display_name());
            self.captured = Some(message);
            return;
        }

        let outcome = self.dispatcher.dispatch(
            &self.table,
            &message,
            self.mode,
            &mut self.injector,
            now,
        );

        let fired = match outcome {
            Dispatch::NoMacro => false,
            Dispatch::Debounced { elapsed } => {
                trace!("Repeat suppressed after {:?}", elapsed);
                false
            }
            Dispatch::Simulated { display } => {
                self.status = format!("TEST MODE - Would execute: {}", display);
                true
            }
            Dispatch::Executed { display } => {
                self.status = format!("LIVE MODE - Executing: {}", display);
                true
            }
            Dispatch::Failed { display: label, error } => {
                warn!("{} failed: {}", label, error);
                self.status = format!("Error executing action: {}", error);
                true
            }
        };

        if fired {
            self.highlight = Some((message.fingerprint(), now));
        }
    }

    pub fn start_learning(&mut self) -> bool {
        if !self.is_connected() {
            self.status = "Connect to a MIDI port before adding a macro".to_string();
            return false;
        }

        self.learning = true;
        self.captured = None;
        self.status = "Learning mode: Press a MIDI key or control to assign an action".to_string();
        true
    }

    pub fn cancel_learning(&mut self) {
        self.learning = false;
        self.captured = None;
        self.status = "Macro creation cancelled".to_string();
    }

    /// Second half of learning: attach an action to the captured control.
    /// An empty payload abandons the macro.
    pub fn create_macro(&mut self, kind: ActionKind, payload: &str) -> Option<String> {
        let message = self.captured.take()?;
        let payload = normalize(kind, payload);

        if payload.is_empty() {
            self.status = cancelled(kind);
            return None;
        }

        let record = MacroRecord::new(message, kind, payload);
        let created = format!("Macro created: {} -> {}", record.name(), record.display());
        let fingerprint = self.table.insert(record);
        info!("{}", created);

        self.status = created;
        self.persist();
        Some(fingerprint)
    }

    pub fn abandon_configuration(&mut self, kind: ActionKind) {
        self.captured = None;
        self.status = cancelled(kind);
    }

    pub fn edit_macro(&mut self, fingerprint: &str, payload: &str) -> bool {
        let Some(record) = self.table.get_mut(fingerprint) else {
            return false;
        };

        let payload = normalize(record.action, payload);
        if payload.is_empty() {
            return false;
        }

        record.set_payload(payload);
        self.status = "Macro updated".to_string();
        self.persist();
        true
    }

    pub fn rename_macro(&mut self, fingerprint: &str, name: &str) -> bool {
        let Some(record) = self.table.get_mut(fingerprint) else {
            return false;
        };

        record.custom_name = Some(name.to_string());
        self.status = "Macro renamed".to_string();
        self.persist();
        true
    }

    pub fn delete_macro(&mut self, fingerprint: &str) -> bool {
        if self.table.remove(fingerprint).is_none() {
            return false;
        }

        self.dispatcher.forget(fingerprint);
        self.status = "Macro deleted".to_string();
        self.persist();
        true
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.status = format!("Switched to {}", self.mode.label());
        info!("{}", self.status);
    }

    pub fn shutdown(&mut self) {
        self.listener.stop_listening();
    }

    // Save failures are reported but never lose the in-memory table
    fn persist(&mut self) {
        if let Err(err) = self.table.save() {
            warn!("Failed to save macros to {}: {}", self.table.path().display(), err);
            self.status = format!("Failed to save macros: {}", err);
        }
    }

    #[cfg(test)]
    pub fn injector(&self) -> &I {
        &self.injector
    }

    #[cfg(test)]
    pub fn capture(&mut self, message: MidiMessage) {
        self.learning = true;
        self.on_midi_message(message, Instant::now());
    }
}

fn normalize(kind: ActionKind, payload: &str) -> &str {
    match kind {
        ActionKind::SendKeys => payload.trim(),
        ActionKind::WriteText => payload,
    }
}

fn cancelled(kind: ActionKind) -> String {
    match kind {
        ActionKind::SendKeys => "Key configuration cancelled".to_string(),
        ActionKind::WriteText => "Text configuration cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Key;
    use crate::automation::{Injected, RecordingInjector};
    use crate::dispatch::DEBOUNCE_WINDOW;
    use crate::error::MacroError;
    use std::path::Path;

    fn settings(path: &Path, mode: Mode) -> Settings {
        Settings {
            macro_file: path.to_path_buf(),
            debug_log: None,
            mode,
            debounce: DEBOUNCE_WINDOW,
            preferred_port: None,
        }
    }

    fn learn(
        app: &mut App<RecordingInjector>,
        message: MidiMessage,
        kind: ActionKind,
        payload: &str,
    ) -> Option<String> {
        app.capture(message);
        app.create_macro(kind, payload)
    }

    #[test]
    fn learning_captures_next_release_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macros.json");
        let mut app = App::new(&settings(&path, Mode::Test), RecordingInjector::default());

        let message = MidiMessage::note_on(0, 60, 0);
        let fingerprint = learn(&mut app, message, ActionKind::SendKeys, "  ctrl+c ").unwrap();

        assert_eq!(fingerprint, "note_on_ch0_note60");
        assert!(!app.is_learning());
        assert!(app.captured().is_none());
        assert_eq!(app.status(), "Macro created: Note_On | Ch.0 | Note 60 -> Send Keys: ctrl+c");

        let reloaded = MacroTable::load(&path);
        assert_eq!(reloaded.get(&fingerprint).unwrap().payload(), "ctrl+c");
    }

    #[test]
    fn press_events_neither_learn_nor_fire() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Live),
            RecordingInjector::default(),
        );

        app.learning = true;
        app.on_midi_message(MidiMessage::note_on(0, 60, 100), Instant::now());
        assert!(app.is_learning());
        assert!(app.captured().is_none());

        app.on_midi_message(MidiMessage::note_on(0, 60, 0), Instant::now());
        app.create_macro(ActionKind::WriteText, "hi").unwrap();

        app.on_midi_message(MidiMessage::note_on(0, 60, 127), Instant::now());
        assert!(app.injector().calls.is_empty());

        app.on_midi_message(MidiMessage::note_on(0, 60, 0), Instant::now());
        assert_eq!(app.injector().calls, vec![Injected::Text("hi".to_string())]);
    }

    #[test]
    fn empty_configuration_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Test),
            RecordingInjector::default(),
        );

        let message = MidiMessage::note_off(0, 40, 0);
        assert!(learn(&mut app, message.clone(), ActionKind::SendKeys, "   ").is_none());
        assert_eq!(app.status(), "Key configuration cancelled");
        assert!(app.table().is_empty());

        assert!(learn(&mut app, message, ActionKind::WriteText, "").is_none());
        assert_eq!(app.status(), "Text configuration cancelled");

        app.learning = true;
        app.cancel_learning();
        assert!(!app.is_learning());
        assert_eq!(app.status(), "Macro creation cancelled");
    }

    #[test]
    fn dispatch_status_and_highlight() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Test),
            RecordingInjector::default(),
        );
        learn(&mut app, MidiMessage::note_on(0, 60, 0), ActionKind::SendKeys, "F5");

        let now = Instant::now();
        app.on_midi_message(MidiMessage::note_on(0, 60, 0), now);
        assert_eq!(app.status(), "TEST MODE - Would execute: Send Keys: F5");
        assert!(app.injector().calls.is_empty());
        assert!(app.rows(now)[0].highlighted);
        assert!(!app.rows(now + Duration::from_millis(600))[0].highlighted);

        app.toggle_mode();
        assert_eq!(app.status(), "Switched to LIVE MODE");

        app.on_midi_message(MidiMessage::note_on(0, 60, 0), now + Duration::from_millis(100));
        assert_eq!(app.status(), "Switched to LIVE MODE");

        app.on_midi_message(MidiMessage::note_on(0, 60, 0), now + Duration::from_millis(500));
        assert_eq!(app.status(), "LIVE MODE - Executing: Send Keys: F5");
        assert_eq!(app.injector().calls, vec![Injected::Combo(vec![Key::F(5)])]);
    }

    #[test]
    fn bad_keys_report_error_without_crashing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Live),
            RecordingInjector::default(),
        );
        learn(&mut app, MidiMessage::note_on(0, 60, 0), ActionKind::SendKeys, "ctrl+nope");

        app.on_midi_message(MidiMessage::note_on(0, 60, 0), Instant::now());

        assert_eq!(app.status(), "Error executing action: Unknown key name 'nope'");
        assert!(app.injector().calls.is_empty());
    }

    #[test]
    fn edit_rename_delete_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let mut app = App::new(&settings(&path, Mode::Test), RecordingInjector::default());
        let message = MidiMessage::note_on(2, 50, 0);
        let fingerprint = learn(&mut app, message, ActionKind::WriteText, "old").unwrap();

        assert!(app.edit_macro(&fingerprint, "new text"));
        assert_eq!(app.status(), "Macro updated");
        assert!(!app.edit_macro(&fingerprint, ""));

        assert!(app.rename_macro(&fingerprint, "Pad A"));
        let saved = MacroTable::load(&path);
        let record = saved.get(&fingerprint).unwrap();
        assert_eq!(record.payload(), "new text");
        assert_eq!(record.display(), "Write Text: new text");
        assert_eq!(record.name(), "Pad A");

        assert!(app.delete_macro(&fingerprint));
        assert_eq!(app.status(), "Macro deleted");
        assert!(MacroTable::load(&path).is_empty());
        assert!(!app.delete_macro(&fingerprint));
    }

    #[test]
    fn save_failure_keeps_table_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        let mut app = App::new(&settings(&path, Mode::Test), RecordingInjector::default());

        learn(&mut app, MidiMessage::note_on(0, 1, 0), ActionKind::SendKeys, "a");

        assert!(app.status().starts_with("Failed to save macros: "));
        assert_eq!(app.table().len(), 1);
    }

    #[test]
    fn port_scan_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Test),
            RecordingInjector::default(),
        );

        app.apply_port_scan(Ok(vec!["Through".to_string(), "MiniLab".to_string()]));
        assert_eq!(app.status(), "Found 2 MIDI input port(s)");
        assert_eq!(app.selected_port(), Some("Through"));

        app.select_port(1);
        assert_eq!(app.selected_port(), Some("MiniLab"));
        app.select_port(1);
        assert_eq!(app.selected_port(), Some("Through"));
        app.select_port(-1);
        assert_eq!(app.selected_port(), Some("MiniLab"));

        assert!(app.prefer_port("Thr"));
        assert_eq!(app.selected_port(), Some("Through"));

        app.apply_port_scan(Ok(Vec::new()));
        assert_eq!(app.status(), "No MIDI input ports found");
        assert_eq!(app.selected_port(), None);

        app.apply_port_scan(Err(MacroError::PortNotFound("x".to_string())));
        assert!(app.status().starts_with("Error scanning MIDI ports: "));
    }

    #[test]
    fn learning_requires_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::new(
            &settings(&dir.path().join("m.json"), Mode::Test),
            RecordingInjector::default(),
        );

        assert!(!app.start_learning());
        assert!(!app.is_learning());

        app.toggle_connection();
        assert_eq!(app.status(), NO_PORTS);
        assert!(!app.is_connected());
    }
}
