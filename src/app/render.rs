use std::io;

use crossterm::{cursor::MoveTo, execute, terminal::{self, Clear, ClearType}};

use crate::view::Presenter;

use super::App;

pub fn render(app: &App) -> io::Result<()> {
    let mut out = io::stdout();
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    let (cols, rows) = terminal::size()?;
    let console = &app.console;
    // node table gets up to half the screen, the log pane the rest
    let table_rows = (console.nodes.len() as u16 + 3).min(rows / 2);

    Presenter::render_header(&mut out, console)?;
    Presenter::render_nodes(&mut out, console, table_rows)?;
    Presenter::render_log(&mut out, &console.log, table_rows + 2, rows.saturating_sub(table_rows + 5))?;
    Presenter::render_footer(&mut out, console)?;

    if let Some(alert) = &console.alert {
        Presenter::render_alert(&mut out, &alert.title, &alert.message, cols, rows)?;
    } else if let Some(prompt) = console.prompts.front() {
        Presenter::render_confirmation(&mut out, prompt, cols, rows)?;
    }
    Ok(())
}
