use std::io;

pub type Result<T> = std::result::Result<T, MacroError>;

#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("Could not open MIDI input: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("Could not read MIDI port name: {0}")]
    PortInfo(#[from] midir::PortInfoError),

    #[error("No MIDI input port named '{0}'")]
    PortNotFound(String),

    #[error("Failed to connect to {port}: {reason}")]
    Connect { port: String, reason: String },

    #[error("Unknown key name '{0}'")]
    UnknownKey(String),

    #[error("Input injection failed: {0}")]
    Injection(String),

    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<enigo::InputError> for MacroError {
    fn from(err: enigo::InputError) -> Self {
        MacroError::Injection(err.to_string())
    }
}

impl From<enigo::NewConError> for MacroError {
    fn from(err: enigo::NewConError) -> Self {
        MacroError::Injection(err.to_string())
    }
}
