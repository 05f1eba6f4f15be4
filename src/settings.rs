use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::{Mode, DEBOUNCE_WINDOW};
use crate::error::{MacroError, Result};

pub const MACRO_FILE_NAME: &str = ".midi_macros_config.json";
pub const DEBUG_LOG_NAME: &str = ".midi_macros_debug.log";
pub const DEBUG_ENV: &str = "DEBUG";

/*
    Runtime configuration, resolved once at startup from the command line,
    the environment and the home directory.
*/

#[derive(Clone, Debug)]
pub struct Settings {
    pub macro_file: PathBuf,
    pub debug_log: Option<PathBuf>,
    pub mode: Mode,
    pub debounce: Duration,
    pub preferred_port: Option<String>,
}

impl Settings {
    /// Settings for the interactive editor. `DEBUG=true` enables the debug log.
    pub fn resolve(
        macro_file: Option<PathBuf>,
        live: bool,
        preferred_port: Option<String>,
    ) -> Result<Settings> {
        let debug = debug_enabled(std::env::var(DEBUG_ENV).ok().as_deref());
        Settings::build(macro_file, live, preferred_port, debug)
    }

    /// Settings for one-shot commands such as `list` and `remove`. These never
    /// open the debug log, which would truncate a running session's log.
    pub fn one_shot(macro_file: Option<PathBuf>) -> Result<Settings> {
        Settings::build(macro_file, false, None, false)
    }

    fn build(
        macro_file: Option<PathBuf>,
        live: bool,
        preferred_port: Option<String>,
        debug: bool,
    ) -> Result<Settings> {
        let home = dirs::home_dir();

        let macro_file = match (macro_file, &home) {
            (Some(path), _) => path,
            (None, Some(home)) => home.join(MACRO_FILE_NAME),
            (None, None) => return Err(MacroError::NoHomeDir),
        };

        let debug_log = debug.then(|| debug_log_path(home.as_deref(), &macro_file));

        Ok(Settings {
            macro_file,
            debug_log,
            mode: if live { Mode::Live } else { Mode::Test },
            debounce: DEBOUNCE_WINDOW,
            preferred_port,
        })
    }
}

pub fn debug_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

// Next to the home directory when there is one, else beside the macro file
fn debug_log_path(home: Option<&Path>, macro_file: &Path) -> PathBuf {
    match home {
        Some(home) => home.join(DEBUG_LOG_NAME),
        None => macro_file.with_file_name(DEBUG_LOG_NAME),
    }
}
