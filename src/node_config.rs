//! The per-node `node.config` file: `key = value` lines, `#` to disable.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::commands::NODE_CONFIG_PATH;
use crate::executor::{self, CommandError};
use crate::registry::NodeRegistry;
use crate::ssh::RemoteSession;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ConfigEntry {
    Blank,
    Setting {
        key: String,
        value: Option<String>,
        enabled: bool,
    },
}

impl fmt::Display for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigEntry::Blank => Ok(()),
            ConfigEntry::Setting { key, value, enabled } => {
                if !enabled {
                    f.write_str("#")?;
                }
                match value {
                    Some(value) => write!(f, "{} = {}", key, value),
                    None => f.write_str(key),
                }
            }
        }
    }
}

pub fn parse(text: &str) -> Vec<ConfigEntry> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return ConfigEntry::Blank;
            }
            let (enabled, body) = match line.strip_prefix('#') {
                Some(rest) => (false, rest.trim()),
                None => (true, line),
            };
            let (key, value) = match body.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
                None => (body, None),
            };
            ConfigEntry::Setting {
                key: key.to_string(),
                value,
                enabled,
            }
        })
        .collect()
}

pub fn render(entries: &[ConfigEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

pub async fn fetch_node_config(
    registry: &NodeRegistry,
    session: &Arc<dyn RemoteSession>,
    node: &str,
) -> Result<Vec<ConfigEntry>, CommandError> {
    let target = executor::resolve_remote(registry, node)?;
    let bytes = session.download(&target, NODE_CONFIG_PATH).await?;
    let entries = parse(&String::from_utf8_lossy(&bytes));
    tracing::info!(node, entries = entries.len(), "fetched node.config");
    Ok(entries)
}

pub async fn push_node_config(
    registry: &NodeRegistry,
    session: &Arc<dyn RemoteSession>,
    node: &str,
    entries: &[ConfigEntry],
) -> Result<(), CommandError> {
    let target = executor::resolve_remote(registry, node)?;
    let text = render(entries);
    session.upload(&target, text.as_bytes(), NODE_CONFIG_PATH, None).await?;
    tracing::info!(node, entries = entries.len(), "pushed node.config");
    Ok(())
}
