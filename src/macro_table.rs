use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::{ActionConfig, ActionKind};
use crate::error::Result;
use crate::midi_model::MidiMessage;

/// One learned macro, stored under its fingerprint in the macro file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub action: ActionKind,
    #[serde(default)]
    pub action_display: String,
    #[serde(default)]
    pub action_config: ActionConfig,
    pub msg_data: MidiMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl MacroRecord {
    pub fn new(message: MidiMessage, kind: ActionKind, payload: &str) -> MacroRecord {
        MacroRecord {
            action: kind,
            action_display: kind.display(payload),
            action_config: ActionConfig::for_kind(kind, payload),
            custom_name: Some(message.display_name()),
            msg_data: message,
        }
    }

    pub fn name(&self) -> String {
        self.custom_name
            .clone()
            .unwrap_or_else(|| self.msg_data.display_name())
    }

    pub fn display(&self) -> String {
        if self.action_display.is_empty() {
            self.action.label().to_string()
        } else {
            self.action_display.clone()
        }
    }

    pub fn payload(&self) -> &str {
        self.action_config.payload(self.action)
    }

    pub fn set_payload(&mut self, payload: &str) {
        self.action_config = ActionConfig::for_kind(self.action, payload);
        self.action_display = self.action.display(payload);
    }
}

/// Fingerprint -> macro mapping backed by a JSON file.
pub struct MacroTable {
    path: PathBuf,
    macros: BTreeMap<String, MacroRecord>,
}

impl MacroTable {
    pub fn empty(path: &Path) -> MacroTable {
        MacroTable {
            path: path.to_path_buf(),
            macros: BTreeMap::new(),
        }
    }

    /// Missing or unreadable files give an empty table.
    pub fn load(path: &Path) -> MacroTable {
        let mut table = MacroTable::empty(path);

        if !path.exists() {
            debug!("No macro file at {}", path.display());
            return table;
        }

        match read_macros(path) {
            Ok(macros) => {
                info!("Loaded {} macro(s) from {}", macros.len(), path.display());
                table.macros = macros;
            }
            Err(err) => warn!("Ignoring macro file {}: {}", path.display(), err),
        }

        table
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.macros)?;
        fs::write(&self.path, json)?;

        debug!("Saved {} macro(s) to {}", self.macros.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, fingerprint: &str) -> Option<&MacroRecord> {
        self.macros.get(fingerprint)
    }

    pub fn get_mut(&mut self, fingerprint: &str) -> Option<&mut MacroRecord> {
        self.macros.get_mut(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.macros.contains_key(fingerprint)
    }

    /// Replaces any macro already learned for the same control.
    pub fn insert(&mut self, record: MacroRecord) -> String {
        let fingerprint = record.msg_data.fingerprint();
        self.macros.insert(fingerprint.clone(), record);
        fingerprint
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<MacroRecord> {
        self.macros.remove(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MacroRecord)> {
        self.macros.iter()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.macros.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

fn read_macros(path: &Path) -> Result<BTreeMap<String, MacroRecord>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
