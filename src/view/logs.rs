use std::io::{self, Write};
use crossterm::{cursor::MoveTo, queue, style::{Color, SetForegroundColor, ResetColor}, terminal};

use crate::app::ConsoleState;
use crate::model::{LogLevel, LogPane};
use super::shared::{progress_bar, safe_truncate};

pub fn render_log(out: &mut impl Write, log: &LogPane, top: u16, height: u16) -> io::Result<()> {
    let (cols, _) = terminal::size()?;
    let width = cols as usize;

    queue!(out, MoveTo(0, top))?;
    if log.filter_mode {
        queue!(out, SetForegroundColor(Color::Cyan))?;
        write!(out, "  Filter: {}_\r\n", log.filter)?;
        queue!(out, ResetColor)?;
    } else {
        let title = if log.filter.is_empty() {
            " Log ".to_string()
        } else {
            format!(" Log (filter: \"{}\") ", log.filter)
        };
        let sep = format!("──{}{}", title, "─".repeat(width.saturating_sub(title.chars().count() + 2)));
        queue!(out, SetForegroundColor(Color::DarkGrey))?;
        write!(out, "{}\r\n", sep)?;
        queue!(out, ResetColor)?;
    }

    let lines = log.visible();
    let area = height as usize;
    let bottom_start = lines.len().saturating_sub(area);
    let start = bottom_start.saturating_sub(log.scroll_offset);
    for line in lines.iter().skip(start).take(area) {
        let color = match line.level {
            LogLevel::Info => None,
            LogLevel::Warning => Some(Color::Yellow),
            LogLevel::Error => Some(Color::Red),
        };
        if let Some(color) = color {
            queue!(out, SetForegroundColor(color))?;
        }
        write!(out, "{}\r\n", safe_truncate(&line.to_string(), width))?;
        if color.is_some() {
            queue!(out, ResetColor)?;
        }
    }
    Ok(())
}

pub fn render_footer(out: &mut impl Write, console: &ConsoleState) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let width = cols as usize;

    if let Some(p) = &console.progress {
        let line = format!("  {} {}: {} {}%", p.node, p.stage, progress_bar(p.percent, 20), p.percent);
        queue!(out, MoveTo(0, rows.saturating_sub(2)), SetForegroundColor(Color::Cyan))?;
        write!(out, "{:<width$}", safe_truncate(&line, width), width = width)?;
        queue!(out, ResetColor)?;
    }

    let help = if console.log.filter_mode {
        "Type to filter | Enter: Keep | Esc: Clear"
    } else {
        "q: Quit | ↑/↓: Select | s/x/r: Start/Stop/Restart | u: Update lib | d: Deploy | X: Stop all | U: Update all | f: Refresh | /: Filter | c: Clear log"
    };
    queue!(
        out,
        MoveTo(1, rows.saturating_sub(1)),
        SetForegroundColor(Color::DarkGrey),
        crossterm::style::Print(format!("{:<width$}", safe_truncate(help, width.saturating_sub(1)), width = width.saturating_sub(1))),
        ResetColor
    )?;
    out.flush()
}
