use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Service state of one node as last observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ServiceStatus {
    Localhost,
    Running,
    Standalone,
    Stopped,
    Updating,
    Error,
    #[default]
    Unknown,
}

impl ServiceStatus {
    pub fn label(self) -> &'static str {
        match self {
            ServiceStatus::Localhost => "Localhost",
            ServiceStatus::Running => "Running",
            ServiceStatus::Standalone => "Standalone",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Updating => "Updating...",
            ServiceStatus::Error => "Error",
            ServiceStatus::Unknown => "Unknown",
        }
    }

    /// Service process exists, with or without the session wrapper.
    pub fn is_active(self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Standalone)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Node name → status, owned by the UI thread.
#[derive(Clone, Debug, Default)]
pub struct StatusTable {
    entries: HashMap<String, ServiceStatus>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unpolled nodes read as `Unknown`.
    pub fn get(&self, node: &str) -> ServiceStatus {
        self.entries.get(node).copied().unwrap_or_default()
    }

    /// Returns true when the stored status changed.
    pub fn set(&mut self, node: &str, status: ServiceStatus) -> bool {
        match self.entries.insert(node.to_string(), status) {
            Some(prev) => prev != status,
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, status: ServiceStatus) -> usize {
        self.entries.values().filter(|s| **s == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpolled_nodes_read_unknown() {
        let table = StatusTable::new();
        assert_eq!(table.get("A"), ServiceStatus::Unknown);
    }

    #[test]
    fn set_reports_change() {
        let mut table = StatusTable::new();
        assert!(table.set("A", ServiceStatus::Running));
        assert!(!table.set("A", ServiceStatus::Running));
        assert!(table.set("A", ServiceStatus::Stopped));
        assert_eq!(table.count(ServiceStatus::Stopped), 1);
    }
}
