use std::io::{stdout, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use crate::action::ActionKind;
use crate::app::{App, Row, NO_PORTS};
use crate::automation::InputInjector;
use crate::dispatch::Mode;
use crate::error::Result;
use crate::util;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const KEYS_HELP: &str = "Keys to send, e.g. ctrl+c, alt+tab, F5, space, ctrl+shift+t (commas separate combinations)";
const TEXT_HELP: &str = "Text to type exactly as entered (Alt+Enter for a new line)";
const MAIN_HELP: &str =
    "a add  e edit  n rename  d delete  m live/test  c connect  r refresh  ←/→ port  ↑/↓ macro  q quit";

// Restores the terminal however the loop ends
struct ScreenGuard;

impl ScreenGuard {
    fn enter() -> Result<ScreenGuard> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        Ok(ScreenGuard)
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[derive(Clone, Debug, PartialEq)]
enum InputPurpose {
    NewMacro(ActionKind),
    Edit { fingerprint: String, kind: ActionKind },
    Rename { fingerprint: String },
}

#[derive(Clone, Debug, PartialEq)]
enum Prompt {
    Idle,
    ChooseAction { selected: usize },
    Input { purpose: InputPurpose, buffer: String },
}

pub struct TerminalDaemon {
    prompt: Prompt,
    selected_row: usize,
}

impl TerminalDaemon {
    pub fn new() -> TerminalDaemon {
        TerminalDaemon {
            prompt: Prompt::Idle,
            selected_row: 0,
        }
    }

    pub fn begin<I: InputInjector>(mut self, app: &mut App<I>) -> Result<()> {
        let _guard = ScreenGuard::enter()?;
        let mut out = stdout();

        loop {
            let now = Instant::now();
            app.poll_midi(now);

            if app.captured().is_some() && self.prompt == Prompt::Idle {
                self.prompt = Prompt::ChooseAction { selected: 0 };
            }

            self.draw(&mut out, app, now)?;

            if !event::poll(POLL_INTERVAL)? {
                continue;
            }

            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release && !self.handle_key(app, key) {
                    break;
                }
            }
        }

        app.shutdown();
        Ok(())
    }

    // Returns false when the user asked to quit
    fn handle_key<I: InputInjector>(&mut self, app: &mut App<I>, key: KeyEvent) -> bool {
        match std::mem::replace(&mut self.prompt, Prompt::Idle) {
            Prompt::Idle => return self.handle_main_key(app, key),
            Prompt::ChooseAction { selected } => self.handle_choice_key(app, key, selected),
            Prompt::Input { purpose, buffer } => self.handle_input_key(app, key, purpose, buffer),
        }
        true
    }

    fn handle_main_key<I: InputInjector>(&mut self, app: &mut App<I>, key: KeyEvent) -> bool {
        let rows = app.rows(Instant::now());
        let row_count = rows.len();
        let selected = rows.get(self.selected_row).map(|row| row.fingerprint.clone());

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Esc if app.is_learning() => app.cancel_learning(),
            KeyCode::Char('r') => app.refresh_ports(),
            KeyCode::Left => app.select_port(-1),
            KeyCode::Right => app.select_port(1),
            KeyCode::Char('c') => app.toggle_connection(),
            KeyCode::Char('m') => app.toggle_mode(),
            KeyCode::Char('a') => {
                app.start_learning();
            }
            KeyCode::Up => self.selected_row = self.selected_row.saturating_sub(1),
            KeyCode::Down => {
                if self.selected_row + 1 < row_count {
                    self.selected_row += 1;
                }
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(fingerprint) = selected {
                    if let Some(record) = app.table().get(&fingerprint) {
                        self.prompt = Prompt::Input {
                            buffer: record.payload().to_string(),
                            purpose: InputPurpose::Edit {
                                kind: record.action,
                                fingerprint,
                            },
                        };
                    }
                }
            }
            KeyCode::Char('n') => {
                if let Some(fingerprint) = selected {
                    if let Some(record) = app.table().get(&fingerprint) {
                        self.prompt = Prompt::Input {
                            buffer: record.name(),
                            purpose: InputPurpose::Rename { fingerprint },
                        };
                    }
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(fingerprint) = selected {
                    app.delete_macro(&fingerprint);
                    self.selected_row = self.selected_row.min(app.table().len().saturating_sub(1));
                }
            }
            _ => {}
        }

        true
    }

    fn handle_choice_key<I: InputInjector>(
        &mut self,
        app: &mut App<I>,
        key: KeyEvent,
        selected: usize,
    ) {
        let choices = ActionKind::ALL.len();

        self.prompt = match key.code {
            KeyCode::Up => Prompt::ChooseAction {
                selected: selected.saturating_sub(1),
            },
            KeyCode::Down => Prompt::ChooseAction {
                selected: (selected + 1).min(choices - 1),
            },
            KeyCode::Char('1') => new_macro_input(ActionKind::ALL[0]),
            KeyCode::Char('2') => new_macro_input(ActionKind::ALL[1]),
            KeyCode::Enter => new_macro_input(ActionKind::ALL[selected]),
            KeyCode::Esc => {
                app.cancel_learning();
                Prompt::Idle
            }
            _ => Prompt::ChooseAction { selected },
        };
    }

    fn handle_input_key<I: InputInjector>(
        &mut self,
        app: &mut App<I>,
        key: KeyEvent,
        purpose: InputPurpose,
        mut buffer: String,
    ) {
        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => buffer.push('\n'),
            KeyCode::Enter => {
                match purpose {
                    InputPurpose::NewMacro(kind) => {
                        if let Some(fingerprint) = app.create_macro(kind, &buffer) {
                            self.select_fingerprint(app, &fingerprint);
                        }
                    }
                    InputPurpose::Edit { fingerprint, .. } => {
                        app.edit_macro(&fingerprint, &buffer);
                    }
                    InputPurpose::Rename { fingerprint } => {
                        app.rename_macro(&fingerprint, buffer.trim());
                    }
                }
                return;
            }
            KeyCode::Esc => {
                if let InputPurpose::NewMacro(kind) = purpose {
                    app.abandon_configuration(kind);
                }
                return;
            }
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(ch) => buffer.push(ch),
            KeyCode::Tab => buffer.push('\t'),
            _ => {}
        }

        self.prompt = Prompt::Input { purpose, buffer };
    }

    fn select_fingerprint<I: InputInjector>(&mut self, app: &App<I>, fingerprint: &str) {
        if let Some(index) = app.table().fingerprints().iter().position(|f| f == fingerprint) {
            self.selected_row = index;
        }
    }

    fn draw<I: InputInjector>(&self, out: &mut Stdout, app: &App<I>, now: Instant) -> Result<()> {
        let (width, height) = terminal::size()?;
        let width = width as usize;
        let mut y: u16 = 0;

        // Title line with connection and mode indicators
        let (connection, connection_color) = match app.connected_port() {
            Some(port) if app.is_connected() => (format!("● CONNECTED ({})", port), Color::Green),
            _ => ("● DISCONNECTED".to_string(), Color::Red),
        };
        let mode_color = match app.mode() {
            Mode::Test => Color::Yellow,
            Mode::Live => Color::Magenta,
        };
        queue!(
            out,
            MoveTo(0, y),
            Print("Midi Macros   "),
            SetForegroundColor(connection_color),
            Print(connection),
            SetForegroundColor(mode_color),
            Print(format!("   [{}]", app.mode().label())),
            ResetColor,
            Clear(ClearType::UntilNewLine)
        )?;
        y += 2;

        let port = app.selected_port().unwrap_or(NO_PORTS);
        line(
            out,
            &mut y,
            &format!("Input port: < {} >   ({} found)", port, app.ports().len()),
            width,
        )?;
        y += 1;

        let learning = if app.is_learning() {
            "   (press a MIDI key/control...)"
        } else {
            ""
        };
        line(out, &mut y, &format!("MIDI Macros{}", learning), width)?;

        let rows = app.rows(now);
        let name_width = rows
            .iter()
            .map(|row| row.name.chars().count())
            .max()
            .unwrap_or(0)
            .clamp(10, 40);
        line(
            out,
            &mut y,
            &format!("  {:<w$}  {}", "MIDI Input", "Action", w = name_width),
            width,
        )?;

        for (index, row) in rows.iter().enumerate() {
            self.draw_row(out, &mut y, index, row, name_width, width)?;
        }
        if rows.is_empty() {
            line(out, &mut y, "  (no macros yet)", width)?;
        }
        y += 1;

        for prompt_line in self.prompt_lines() {
            line(out, &mut y, &prompt_line, width)?;
        }

        queue!(out, MoveTo(0, y), Clear(ClearType::FromCursorDown))?;

        let mut footer = height.saturating_sub(2).max(y);
        line(out, &mut footer, app.status(), width)?;
        line(out, &mut footer, MAIN_HELP, width)?;

        out.flush()?;
        Ok(())
    }

    fn draw_row(
        &self,
        out: &mut Stdout,
        y: &mut u16,
        index: usize,
        row: &Row,
        name_width: usize,
        width: usize,
    ) -> Result<()> {
        let marker = if index == self.selected_row { ">" } else { " " };
        let text = format!(
            "{} {:<w$}  {}",
            marker,
            truncate(&row.name, name_width),
            util::single_line(&row.action),
            w = name_width
        );

        if row.highlighted {
            queue!(out, SetBackgroundColor(Color::Green), SetForegroundColor(Color::Black))?;
        }
        line(out, y, &text, width)?;
        queue!(out, ResetColor)?;
        Ok(())
    }

    fn prompt_lines(&self) -> Vec<String> {
        match &self.prompt {
            Prompt::Idle => Vec::new(),
            Prompt::ChooseAction { selected } => {
                let mut lines = vec!["Choose an action for this MIDI input:".to_string()];
                for (index, kind) in ActionKind::ALL.iter().enumerate() {
                    let marker = if index == *selected { ">" } else { " " };
                    lines.push(format!("  {} {}. {}", marker, index + 1, kind));
                }
                lines.push("Enter select   Esc cancel".to_string());
                lines
            }
            Prompt::Input { purpose, buffer } => {
                let title = match purpose {
                    InputPurpose::NewMacro(ActionKind::SendKeys)
                    | InputPurpose::Edit {
                        kind: ActionKind::SendKeys,
                        ..
                    } => KEYS_HELP,
                    InputPurpose::NewMacro(ActionKind::WriteText)
                    | InputPurpose::Edit {
                        kind: ActionKind::WriteText,
                        ..
                    } => TEXT_HELP,
                    InputPurpose::Rename { .. } => "New name for this macro",
                };
                vec![
                    title.to_string(),
                    format!("> {}_", util::single_line(buffer)),
                    "Enter confirm   Esc cancel".to_string(),
                ]
            }
        }
    }
}

fn new_macro_input(kind: ActionKind) -> Prompt {
    Prompt::Input {
        purpose: InputPurpose::NewMacro(kind),
        buffer: String::new(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn line(out: &mut Stdout, y: &mut u16, text: &str, width: usize) -> Result<()> {
    queue!(
        out,
        MoveTo(0, *y),
        Print(truncate(text, width)),
        Clear(ClearType::UntilNewLine)
    )?;
    *y += 1;
    Ok(())
}
