use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

const MAX_LOG_LINES: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

/// One timestamped operator-log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    pub fn now(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:<7} {}", self.timestamp, self.level, self.text)
    }
}

// --- Log pane state ---

pub struct LogPane {
    pub lines: VecDeque<LogLine>,
    pub scroll_offset: usize, // 0 = at bottom (following)
    pub filter_mode: bool,    // true while typing a filter
    pub filter: String,
}

impl Default for LogPane {
    fn default() -> Self {
        Self {
            lines: VecDeque::with_capacity(MAX_LOG_LINES),
            scroll_offset: 0,
            filter_mode: false,
            filter: String::new(),
        }
    }
}

impl LogPane {
    pub fn push_line(&mut self, line: LogLine) {
        if self.lines.len() >= MAX_LOG_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll_offset = 0;
    }

    /// Lines matching the current filter (case-insensitive substring).
    pub fn visible(&self) -> Vec<&LogLine> {
        if self.filter.is_empty() {
            return self.lines.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.lines
            .iter()
            .filter(|l| l.to_string().to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_line_caps_history() {
        let mut pane = LogPane::default();
        for i in 0..MAX_LOG_LINES + 10 {
            pane.push_line(LogLine::now(LogLevel::Info, format!("line {}", i)));
        }
        assert_eq!(pane.lines.len(), MAX_LOG_LINES);
        assert_eq!(pane.lines.front().map(|l| l.text.as_str()), Some("line 10"));
    }

    #[test]
    fn filter_matches_level_and_text() {
        let mut pane = LogPane::default();
        pane.push_line(LogLine::now(LogLevel::Info, "Status updated for A: Running"));
        pane.push_line(LogLine::now(LogLevel::Error, "Authentication failed for B"));
        pane.filter = "error".into();
        let visible = pane.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].level, LogLevel::Error);
    }

    #[test]
    fn display_includes_level_tag() {
        let line = LogLine {
            timestamp: "2026-01-01 00:00:00".into(),
            level: LogLevel::Warning,
            text: "slow".into(),
        };
        assert_eq!(line.to_string(), "[2026-01-01 00:00:00] WARNING slow");
    }
}
