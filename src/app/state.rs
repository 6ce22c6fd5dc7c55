use std::collections::VecDeque;

use crate::model::{LogLine, LogPane, NodeIdentity, ServiceStatus, StatusTable};
use crate::ui::{Prompt, ProgressUpdate, UiSink};

/// Blocking error notice; dismissed by any key.
pub struct Alert {
    pub title: String,
    pub message: String,
}

/// Everything the console renders. Only the UI thread touches it, through
/// the [`UiSink`] drain or key handling.
#[derive(Default)]
pub struct ConsoleState {
    pub nodes: Vec<NodeIdentity>,
    pub statuses: StatusTable,
    pub log: LogPane,
    pub selected: usize,
    pub progress: Option<ProgressUpdate>,
    pub prompts: VecDeque<Prompt>,
    pub alert: Option<Alert>,
}

impl ConsoleState {
    pub fn new(nodes: Vec<NodeIdentity>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn selected_node(&self) -> Option<&NodeIdentity> {
        self.nodes.get(self.selected)
    }

    pub fn select_prev(&mut self) -> bool {
        if self.selected > 0 {
            self.selected -= 1;
            return true;
        }
        false
    }

    pub fn select_next(&mut self) -> bool {
        if self.selected + 1 < self.nodes.len() {
            self.selected += 1;
            return true;
        }
        false
    }

    /// Nodes per status, in display order.
    pub fn summary(&self) -> Vec<(ServiceStatus, usize)> {
        let order = [
            ServiceStatus::Running,
            ServiceStatus::Standalone,
            ServiceStatus::Stopped,
            ServiceStatus::Updating,
            ServiceStatus::Error,
            ServiceStatus::Localhost,
            ServiceStatus::Unknown,
        ];
        order
            .into_iter()
            .map(|s| (s, self.nodes.iter().filter(|n| self.statuses.get(&n.name) == s).count()))
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

impl UiSink for ConsoleState {
    fn on_status_changed(&mut self, node: &str, status: ServiceStatus) {
        self.statuses.set(node, status);
    }

    fn append_log_line(&mut self, line: LogLine) {
        self.log.push_line(line);
    }

    fn on_progress(&mut self, update: Option<ProgressUpdate>) {
        self.progress = update;
    }

    fn on_alert(&mut self, title: String, message: String) {
        self.alert = Some(Alert { title, message });
    }

    fn on_prompt(&mut self, prompt: Prompt) {
        self.prompts.push_back(prompt);
    }
}
