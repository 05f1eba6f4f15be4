use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use crate::app::App;
use crate::automation::EnigoInjector;
use crate::macro_table::MacroTable;
use crate::settings::Settings;
use crate::terminal_daemon::TerminalDaemon;

mod action;
mod app;
mod automation;
mod dispatch;
mod error;
mod logging;
mod macro_table;
mod midi_mapping;
mod midi_model;
mod midi_read_daemon;
mod midi_reading;
mod settings;
mod terminal_daemon;
mod util;

#[derive(Parser)]
#[clap(
    version = crate_version!(),
    about = "Trigger keystrokes and typed text from a MIDI controller."
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Opens the macro editor and dispatches learned macros (the default).
    Run {
        /// Start in live mode instead of test mode.
        #[clap(long)]
        live: bool,
        /// Macro file to use instead of ~/.midi_macros_config.json.
        #[clap(long)]
        config: Option<PathBuf>,
        /// Connect to the first input port whose name contains this text.
        #[clap(long)]
        port: Option<String>,
    },
    /// Lists the available MIDI input ports.
    Ports {},
    /// Prints the learned macros.
    List {
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Removes the macro learned for a fingerprint, e.g. note_on_ch0_note60.
    Remove {
        fingerprint: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    match run() {
        Ok(_) => (),
        Err(err) => eprintln!("Error: {}", err),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        live: false,
        config: None,
        port: None,
    });

    match command {
        Commands::Run { live, config, port } => {
            let settings = Settings::resolve(config, live, port)?;
            logging::init(settings.debug_log.as_deref(), false)?;
            run_interactive(&settings)?;
        }
        Commands::Ports {} => {
            logging::init(None, true)?;
            let names = midi_reading::input_port_names()?;
            if names.is_empty() {
                println!("No MIDI input ports found");
            }
            for name in names {
                println!("{}", name);
            }
        }
        Commands::List { config } => {
            let settings = Settings::one_shot(config)?;
            logging::init(None, true)?;
            print_macros(&MacroTable::load(&settings.macro_file));
        }
        Commands::Remove { fingerprint, config } => {
            let settings = Settings::one_shot(config)?;
            logging::init(None, true)?;

            let mut table = MacroTable::load(&settings.macro_file);
            match table.remove(&fingerprint) {
                Some(record) => {
                    table.save()?;
                    println!("Removed {} ({})", fingerprint, record.name());
                }
                None => println!("No macro learned for {}", fingerprint),
            }
        }
    }

    Ok(())
}

fn run_interactive(settings: &Settings) -> Result<(), Box<dyn Error>> {
    info!(
        "Starting in {} with macros from {}",
        settings.mode.label(),
        settings.macro_file.display()
    );

    let mut app = App::new(settings, EnigoInjector::new());
    app.refresh_ports();

    if let Some(port) = &settings.preferred_port {
        if app.prefer_port(port) {
            app.toggle_connection();
        }
    }

    TerminalDaemon::new().begin(&mut app)?;
    Ok(())
}

fn print_macros(table: &MacroTable) {
    if table.is_empty() {
        println!("No macros in {}", table.path().display());
        return;
    }

    for (fingerprint, record) in table.iter() {
        println!(
            "{:<24} {:<32} {}",
            fingerprint,
            record.name(),
            util::single_line(&record.display())
        );
    }
}
