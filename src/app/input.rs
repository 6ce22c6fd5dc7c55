use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::ui::DirectoryChoice;

use super::event_loop::NodeAction;
use super::App;

/// Result of handling a key: Quit the app, or key was consumed (needs render).
/// None means the key was not handled.
pub enum InputResult {
    Quit,
    Consumed,
}

/// Handle a key event. Alerts, then prompts, then the log filter take the
/// key before the node-table bindings do.
pub fn handle_key(app: &mut App, key_event: KeyEvent) -> Option<InputResult> {
    let KeyEvent { code, modifiers, kind, .. } = key_event;
    if kind == KeyEventKind::Release {
        return None;
    }

    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Some(InputResult::Quit);
    }

    if app.console.alert.take().is_some() {
        return Some(InputResult::Consumed);
    }

    if let Some(prompt) = app.console.prompts.front() {
        // unrecognised keys leave the prompt waiting
        let reply = prompt_reply(prompt.is_directory_choice(), code)?;
        if let Some(prompt) = app.console.prompts.pop_front() {
            match reply {
                PromptKey::Answer(yes) => prompt.answer(yes),
                PromptKey::Choose(choice) => prompt.choose(choice),
            }
        }
        return Some(InputResult::Consumed);
    }

    if app.console.log.filter_mode {
        return handle_filter(app, code);
    }

    handle_nodes(app, code)
}

#[derive(Debug, PartialEq, Eq)]
enum PromptKey {
    Answer(bool),
    Choose(DirectoryChoice),
}

fn prompt_reply(directory: bool, code: KeyCode) -> Option<PromptKey> {
    if directory {
        let choice = match code {
            KeyCode::Char('d') | KeyCode::Char('D') => DirectoryChoice::DeleteContents,
            KeyCode::Char('m') | KeyCode::Char('M') => DirectoryChoice::Merge,
            KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Esc => DirectoryChoice::Abort,
            _ => return None,
        };
        return Some(PromptKey::Choose(choice));
    }
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(PromptKey::Answer(true)),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(PromptKey::Answer(false)),
        _ => None,
    }
}

fn handle_filter(app: &mut App, code: KeyCode) -> Option<InputResult> {
    let log = &mut app.console.log;
    match code {
        KeyCode::Enter => log.filter_mode = false,
        KeyCode::Esc => {
            log.filter_mode = false;
            log.filter.clear();
        }
        KeyCode::Backspace => {
            log.filter.pop();
        }
        KeyCode::Char(c) => log.filter.push(c),
        _ => return None,
    }
    Some(InputResult::Consumed)
}

fn handle_nodes(app: &mut App, code: KeyCode) -> Option<InputResult> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return Some(InputResult::Quit),
        KeyCode::Up => return app.console.select_prev().then_some(InputResult::Consumed),
        KeyCode::Down => return app.console.select_next().then_some(InputResult::Consumed),
        KeyCode::PageUp => {
            app.console.log.scroll_offset = app.console.log.scroll_offset.saturating_add(10);
            return Some(InputResult::Consumed);
        }
        KeyCode::PageDown => {
            app.console.log.scroll_offset = app.console.log.scroll_offset.saturating_sub(10);
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('/') => {
            app.console.log.filter_mode = true;
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('c') => {
            app.console.log.clear();
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('f') => {
            app.poller.refresh_now();
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('X') => {
            app.spawn_stop_all();
            return Some(InputResult::Consumed);
        }
        KeyCode::Char('U') => {
            match app.library.clone() {
                Some(library) => app.spawn_update_all(library),
                None => app.ui.warn("No library configured (--library)"),
            }
            return Some(InputResult::Consumed);
        }
        _ => {}
    }

    let action = match code {
        KeyCode::Char('s') => NodeAction::Start,
        KeyCode::Char('x') => NodeAction::Stop,
        KeyCode::Char('r') => NodeAction::Restart,
        KeyCode::Char('u') => match app.library.clone() {
            Some(library) => NodeAction::UpdateLibrary(library),
            None => {
                app.ui.warn("No library configured (--library)");
                return Some(InputResult::Consumed);
            }
        },
        KeyCode::Char('d') => match app.archive.clone() {
            Some(archive) => NodeAction::Deploy(archive),
            None => {
                app.ui.warn("No archive configured (--archive)");
                return Some(InputResult::Consumed);
            }
        },
        _ => return None,
    };

    let Some(node) = app.console.selected_node().cloned() else {
        return None;
    };
    if node.is_localhost() {
        app.ui.warn(format!("{} is the local host; commands are not sent to it", node.name));
        return Some(InputResult::Consumed);
    }
    app.spawn_node_action(node.name, action);
    Some(InputResult::Consumed)
}
