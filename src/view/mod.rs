mod shared;
mod nodes;
mod logs;
mod confirmation;

use std::io::{self, Write};
use crossterm::{execute, cursor, queue, style::{Color, SetForegroundColor, ResetColor}, terminal};

use crate::app::ConsoleState;
use crate::model::LogPane;
use crate::ui::Prompt;

pub use shared::{truncate_str, safe_truncate, status_color, wrap_lines};

pub struct Presenter;

/// Minimum terminal dimensions for usable rendering.
pub const MIN_COLS: u16 = 80;
pub const MIN_ROWS: u16 = 16;

impl Presenter {
    /// Check if the terminal is large enough. If not, render a "too small"
    /// message and return `true` (meaning "skip normal rendering").
    pub fn render_size_guard() -> io::Result<bool> {
        let (cols, rows) = terminal::size()?;
        if cols < MIN_COLS || rows < MIN_ROWS {
            let mut out = std::io::stdout();
            execute!(out, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0))?;
            let msg = format!(
                "Terminal too small ({}x{}). Resize to at least {}x{}.",
                cols, rows, MIN_COLS, MIN_ROWS
            );
            let y = rows / 2;
            let x = cols.saturating_sub(msg.len() as u16) / 2;
            queue!(out, cursor::MoveTo(x, y), SetForegroundColor(Color::Yellow))?;
            write!(out, "{}", msg)?;
            queue!(out, ResetColor)?;
            out.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn render_header(out: &mut impl Write, console: &ConsoleState) -> io::Result<()> {
        nodes::render_header(out, console)
    }

    pub fn render_nodes(out: &mut impl Write, console: &ConsoleState, max_rows: u16) -> io::Result<()> {
        nodes::render_nodes(out, console, max_rows)
    }

    pub fn render_log(out: &mut impl Write, log: &LogPane, top: u16, height: u16) -> io::Result<()> {
        logs::render_log(out, log, top, height)
    }

    pub fn render_footer(out: &mut impl Write, console: &ConsoleState) -> io::Result<()> {
        logs::render_footer(out, console)
    }

    pub fn render_confirmation(out: &mut impl Write, prompt: &Prompt, cols: u16, rows: u16) -> io::Result<()> {
        confirmation::render_confirmation(out, prompt, cols, rows)
    }

    pub fn render_alert(out: &mut impl Write, title: &str, message: &str, cols: u16, rows: u16) -> io::Result<()> {
        confirmation::render_alert(out, title, message, cols, rows)
    }
}
