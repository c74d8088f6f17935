// Keys:
//   any text      typed into the command line (when it has focus)
//   Enter         submit the line
//   Backspace     delete
//   Tab           move focus between command line and monitor
//   Shift+Space   hold the macro picked by `macro` (command line focus only)
//   Esc           quit
//
// Every key press and release is also forwarded to the event bus, tagged
// with whether the command line had focus, so instrument macros can react.

use std::time::Duration;

use basalt::events::{EventKind, HostEvent, Key, LocalBus};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::mode::{Focus, TuiState};

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Line(String),
    Quit,
}

pub fn poll_input(timeout: Duration, ts: &mut TuiState, bus: &LocalBus) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }
    if let Event::Key(key) = event::read()? {
        return Ok(handle_key(key, ts, bus));
    }
    Ok(vec![])
}

fn host_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        _ => Key::Other,
    }
}

fn handle_key(key: KeyEvent, ts: &mut TuiState, bus: &LocalBus) -> Vec<InputEvent> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let event = HostEvent {
        key: host_key(key.code),
        shift,
        console_focused: ts.focus == Focus::Console,
    };

    if key.kind == KeyEventKind::Release {
        bus.emit(EventKind::KeyUp, &event);
        return vec![];
    }

    // without release reports a plain space stands in for letting go
    if !ts.reports_release && event.key == Key::Space && ts.shift_space_held && !shift {
        bus.emit(EventKind::KeyUp, &event);
        ts.shift_space_held = false;
        return vec![];
    }
    bus.emit(EventKind::KeyDown, &event);

    let chord = event.key == Key::Space && shift;
    if chord && event.console_focused {
        ts.shift_space_held = true;
    }

    match key.code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Tab => {
            ts.toggle_focus();
            vec![]
        }
        _ if ts.focus == Focus::Monitor => vec![],
        KeyCode::Enter => {
            let line = std::mem::take(&mut ts.input);
            if line.trim().is_empty() {
                vec![]
            } else {
                vec![InputEvent::Line(line)]
            }
        }
        KeyCode::Backspace => {
            ts.input.pop();
            vec![]
        }
        // the chord is a macro, not text
        KeyCode::Char(_) if chord => vec![],
        KeyCode::Char(c) => {
            ts.input.push(c);
            vec![]
        }
        _ => vec![],
    }
}
