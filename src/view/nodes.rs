use std::io::{self, Write};
use crossterm::{queue, style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor}};

use crate::app::ConsoleState;
use super::shared::{status_color, truncate_str, write_selectable, writeln};

pub fn render_header(out: &mut impl Write, console: &ConsoleState) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Bold))?;
    write!(out, "  blmctl › {} nodes", console.nodes.len())?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    for (status, count) in console.summary() {
        write!(out, "  ")?;
        queue!(out, SetForegroundColor(status_color(status)))?;
        write!(out, "{} {}", count, status)?;
        queue!(out, ResetColor)?;
    }
    write!(out, "\r\n")
}

/// Node table, scrolled so the selected row stays visible.
pub fn render_nodes(out: &mut impl Write, console: &ConsoleState, max_rows: u16) -> io::Result<()> {
    if console.nodes.is_empty() {
        writeln(out, "")?;
        writeln(out, "  No nodes in the node table.")?;
        return Ok(());
    }

    queue!(out, SetAttribute(Attribute::Bold))?;
    write!(out, "  {:<24} {:<16} {}", "NODE", "ADDRESS", "STATUS")?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    write!(out, "\r\n")?;

    let visible = (max_rows as usize).saturating_sub(2).max(1);
    let start = console.selected.saturating_sub(visible - 1);
    for (idx, node) in console.nodes.iter().enumerate().skip(start).take(visible) {
        let selected = idx == console.selected;
        let status = console.statuses.get(&node.name);
        let line = format!("  {:<24} {:<16} ", truncate_str(&node.name, 24), truncate_str(&node.address, 16));
        if selected {
            write_selectable(out, &format!("{}{}", line, status), true)?;
        } else {
            write!(out, "{}", line)?;
            queue!(out, SetForegroundColor(status_color(status)))?;
            write!(out, "{}\r\n", status)?;
            queue!(out, ResetColor)?;
        }
    }

    if console.nodes.len() > visible {
        queue!(out, SetForegroundColor(Color::DarkGrey))?;
        writeln(out, &format!("  ({}/{})", console.selected + 1, console.nodes.len()))?;
        queue!(out, ResetColor)?;
    }
    Ok(())
}
