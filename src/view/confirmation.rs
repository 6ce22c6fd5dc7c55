use std::io::{self, Write};
use crossterm::{cursor::MoveTo, queue, style::{Color, SetBackgroundColor, SetForegroundColor, SetAttribute, Attribute, ResetColor}};

use crate::ui::Prompt;
use super::shared::{safe_truncate, wrap_lines};

/// Draw a titled box anchored to the bottom of a `cols` x `rows` screen.
/// Body lines wrap instead of being cut, so long commands stay readable.
fn render_box(
    out: &mut impl Write,
    cols: u16,
    rows: u16,
    title: &str,
    body: &str,
    hint: &str,
    background: Color,
) -> io::Result<()> {
    let width = cols as usize;
    let mut body_lines = wrap_lines(body, width.saturating_sub(2));
    // keep title and hint on screen when the body is taller than the terminal
    let room = (rows as usize).saturating_sub(3);
    if body_lines.len() > room {
        body_lines.drain(..body_lines.len() - room);
    }
    let height = body_lines.len() as u16 + 2;
    let mut y = rows.saturating_sub(height + 1);

    queue!(out, SetBackgroundColor(background), SetForegroundColor(Color::White), SetAttribute(Attribute::Bold))?;
    queue!(out, MoveTo(0, y))?;
    write!(out, "{:<width$}", safe_truncate(&format!("  {}", title), width), width = width)?;
    queue!(out, SetAttribute(Attribute::Reset), SetBackgroundColor(background), SetForegroundColor(Color::White))?;
    for line in &body_lines {
        y += 1;
        queue!(out, MoveTo(0, y))?;
        write!(out, "{:<width$}", format!("  {}", line), width = width)?;
    }
    y += 1;
    queue!(out, MoveTo(0, y), SetAttribute(Attribute::Bold))?;
    write!(out, "{:<width$}", safe_truncate(&format!("  ({})", hint), width), width = width)?;
    queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
    out.flush()?;
    Ok(())
}

pub fn render_confirmation(out: &mut impl Write, prompt: &Prompt, cols: u16, rows: u16) -> io::Result<()> {
    let hint = if prompt.is_directory_choice() {
        "d: delete existing content | m: merge | a/Esc: abort"
    } else {
        "y/Enter to confirm, n/Esc to cancel"
    };
    render_box(out, cols, rows, &prompt.title, &prompt.body, hint, Color::DarkRed)
}

pub fn render_alert(out: &mut impl Write, title: &str, message: &str, cols: u16, rows: u16) -> io::Result<()> {
    render_box(out, cols, rows, title, message, "any key to dismiss", Color::Red)
}
