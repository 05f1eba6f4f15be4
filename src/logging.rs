use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::{MacroError, Result};

const DEBUG_FILTER: &str = "midi_macros=debug";
const DEBUG_TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Installs the global subscriber.
///
/// The debug file (when enabled) receives every event of this crate at debug
/// level. Stderr is only attached for non-interactive commands, since the
/// terminal interface owns the screen.
pub fn init(debug_log: Option<&Path>, to_stderr: bool) -> Result<()> {
    let file_layer = match debug_log {
        Some(path) => Some(debug_file_layer::<Registry>(start_debug_log(path)?)),
        None => None,
    };

    let stderr_layer = to_stderr.then(|| {
        fmt::layer().with_writer(std::io::stderr).with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| MacroError::Logging(e.to_string()))
}

/// One `HH:MM:SS.mmm message` line per event, without level or target.
pub fn debug_file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_timer(ChronoLocal::new(DEBUG_TIME_FORMAT.to_string()))
        .with_level(false)
        .with_target(false)
        .with_filter(EnvFilter::new(DEBUG_FILTER))
}

// Truncates the log and writes the session header
fn start_debug_log(path: &Path) -> Result<File> {
    let mut file = File::create(path)?;
    writeln!(
        file,
        "MIDI Macros Debug Log - Started at {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f")
    )?;
    writeln!(file, "{}", "=".repeat(50))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::app::App;
    use crate::automation::RecordingInjector;
    use crate::dispatch::{Mode, DEBOUNCE_WINDOW};
    use crate::midi_model::MidiMessage;
    use crate::settings::Settings;
    use std::fs;
    use std::time::{Duration, Instant};

    fn has_timestamp(line: &str) -> bool {
        let bytes = line.as_bytes();
        bytes.len() > 13
            && bytes[..12].iter().enumerate().all(|(i, b)| match i {
                2 | 5 => *b == b':',
                8 => *b == b'.',
                _ => b.is_ascii_digit(),
            })
            && bytes[12] == b' '
    }

    #[test]
    fn debug_log_is_truncated_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        fs::write(&path, "stale line from a previous session\n").unwrap();

        drop(start_debug_log(&path).unwrap());

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("MIDI Macros Debug Log - Started at "));
        assert_eq!(lines[1], "=".repeat(50));
    }

    #[test]
    fn debug_log_records_events_and_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("debug.log");
        let settings = Settings {
            macro_file: dir.path().join("macros.json"),
            debug_log: Some(log_path.clone()),
            mode: Mode::Test,
            debounce: DEBOUNCE_WINDOW,
            preferred_port: None,
        };

        let mut app = App::new(&settings, RecordingInjector::default());
        app.capture(MidiMessage::note_on(0, 60, 0));
        app.create_macro(ActionKind::SendKeys, "ctrl+c").unwrap();

        let file = start_debug_log(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry().with(debug_file_layer::<Registry>(file));
        let now = Instant::now();

        tracing::subscriber::with_default(subscriber, || {
            app.on_midi_message(MidiMessage::note_on(0, 60, 0), now);
            app.on_midi_message(
                MidiMessage::note_on(0, 60, 0),
                now + Duration::from_millis(120),
            );
            app.on_midi_message(MidiMessage::note_on(0, 61, 0), now);
        });

        let contents = fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().skip(2).collect();

        assert!(!lines.is_empty());
        assert!(lines.iter().all(|line| has_timestamp(line)), "{}", contents);
        assert!(lines
            .iter()
            .any(|line| line.ends_with("[note_on] Ch:0 Note:60 Vel:0 -> HAS MACRO")));
        assert!(lines
            .iter()
            .any(|line| line.contains("   TEST MODE: Send Keys: ctrl+c")));
        assert!(lines
            .iter()
            .any(|line| line.contains("   DEBOUNCED (too recent: 0.12s)")));
        assert!(lines
            .iter()
            .any(|line| line.ends_with("[note_on] Ch:0 Note:61 Vel:0")));
        assert!(!lines.iter().any(|line| line.contains("EXECUTING")));
    }
}
