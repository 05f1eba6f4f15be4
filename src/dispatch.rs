use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::action;
use crate::automation::InputInjector;
use crate::error::MacroError;
use crate::macro_table::MacroTable;
use crate::midi_model::MidiMessage;

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Test,
    Live,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Test => "TEST MODE",
            Mode::Live => "LIVE MODE",
        }
    }

    pub fn toggled(&self) -> Mode {
        match self {
            Mode::Test => Mode::Live,
            Mode::Live => Mode::Test,
        }
    }
}

#[derive(Debug)]
pub enum Dispatch {
    NoMacro,
    Debounced { elapsed: Duration },
    Simulated { display: String },
    Executed { display: String },
    Failed { display: String, error: MacroError },
}

/// Decides, per incoming event, whether a learned macro fires.
pub struct Dispatcher {
    window: Duration,
    last_fired: HashMap<String, Instant>,
}

impl Dispatcher {
    pub fn new(window: Duration) -> Dispatcher {
        Dispatcher {
            window,
            last_fired: HashMap::new(),
        }
    }

    pub fn dispatch(
        &mut self,
        table: &MacroTable,
        message: &MidiMessage,
        mode: Mode,
        injector: &mut dyn InputInjector,
        now: Instant,
    ) -> Dispatch {
        let fingerprint = message.fingerprint();

        let Some(record) = table.get(&fingerprint) else {
            return Dispatch::NoMacro;
        };

        if let Some(last) = self.last_fired.get(&fingerprint) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                debug!("   DEBOUNCED (too recent: {:.2}s)", elapsed.as_secs_f64());
                return Dispatch::Debounced { elapsed };
            }
        }

        self.last_fired.insert(fingerprint, now);

        let label = record.display();

        match mode {
            Mode::Test => {
                info!("   TEST MODE: {}", label);
                Dispatch::Simulated { display: label }
            }
            Mode::Live => {
                info!("   EXECUTING: {}", label);
                match action::execute(record.action, &record.action_config, injector) {
                    Ok(()) => Dispatch::Executed { display: label },
                    Err(error) => Dispatch::Failed { display: label, error },
                }
            }
        }
    }

    // Forget the debounce timestamp of a deleted macro
    pub fn forget(&mut self, fingerprint: &str) {
        self.last_fired.remove(fingerprint);
    }
}
