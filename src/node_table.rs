//! The node table kept on each node at `FileDB/NODES.tsv`. Columns are kept
//! as found so a fetch and push never drops fields this crate does not read.

use std::sync::Arc;

use crate::commands::NODE_TABLE_PATH;
use crate::executor::{self, CommandError};
use crate::registry::{self, NodeRegistry, NodeRow, RegistryError};
use crate::ssh::RemoteSession;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeTable {
    /// Column names without the leading `#`.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NodeTable {
    /// First line is the header; rows with no content are dropped.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines();
        let headers = lines
            .next()
            .map(|header| {
                header
                    .split('\t')
                    .map(|h| h.trim_start_matches('#').to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = lines
            .map(|line| line.split('\t').map(str::to_string).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|field| !field.trim().is_empty()))
            .collect();
        Self { headers, rows }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| format!("#{}", h)).collect();
        out.push_str(&header.join("\t"));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Rows as the registry would load them; fails when a required column is missing.
    pub fn node_rows(&self) -> Result<Vec<NodeRow>, RegistryError> {
        registry::parse_node_table(&self.render())
    }
}

pub async fn fetch_node_table(
    registry: &NodeRegistry,
    session: &Arc<dyn RemoteSession>,
    node: &str,
) -> Result<NodeTable, CommandError> {
    let target = executor::resolve_remote(registry, node)?;
    let bytes = session.download(&target, NODE_TABLE_PATH).await?;
    let table = NodeTable::parse(&String::from_utf8_lossy(&bytes));
    tracing::info!(node, rows = table.rows.len(), "fetched NODES.tsv");
    Ok(table)
}

pub async fn push_node_table(
    registry: &NodeRegistry,
    session: &Arc<dyn RemoteSession>,
    node: &str,
    table: &NodeTable,
) -> Result<(), CommandError> {
    let target = executor::resolve_remote(registry, node)?;
    let text = table.render();
    session.upload(&target, text.as_bytes(), NODE_TABLE_PATH, None).await?;
    tracing::info!(node, rows = table.rows.len(), "pushed NODES.tsv");
    Ok(())
}
