//! Node Registry: name → address, credentials and launch parameters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use thiserror::Error as ThisError;

use crate::model::{Credentials, NodeIdentity, ServiceParameters, Target};

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("node table is empty")]
    Empty,
    #[error("node table has no {0} column")]
    MissingColumn(&'static str),
    #[error("invalid parameter map: {0}")]
    Json(#[from] serde_json::Error),
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("{0} cannot be empty")]
    EmptyParameter(&'static str),
}

/// One parsed row of the node table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRow {
    pub identity: NodeIdentity,
    pub credentials: Option<Credentials>,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<NodeIdentity>,
    credentials: HashMap<String, Credentials>,
    params: HashMap<String, ServiceParameters>,
}

/// Shared, in-memory registry. Clones share state.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl NodeRegistry {
    pub fn new(nodes: Vec<NodeIdentity>) -> Self {
        let registry = Self::default();
        registry.replace_nodes(nodes);
        registry
    }

    pub fn from_rows(rows: Vec<NodeRow>) -> Self {
        let registry = Self::default();
        {
            let mut inner = registry.write();
            for row in rows {
                if let Some(creds) = row.credentials {
                    inner.credentials.insert(row.identity.name.clone(), creds);
                }
                inner.nodes.push(row.identity);
            }
        }
        registry
    }

    /// Replace the node list; credentials and parameters are kept by name.
    pub fn replace_nodes(&self, nodes: Vec<NodeIdentity>) {
        self.write().nodes = nodes;
    }

    /// Snapshot of all nodes in table order.
    pub fn list_nodes(&self) -> Vec<NodeIdentity> {
        self.read().nodes.clone()
    }

    pub fn resolve(&self, name: &str) -> Option<NodeIdentity> {
        self.read().nodes.iter().find(|n| n.name == name).cloned()
    }

    pub fn credentials(&self, name: &str) -> Credentials {
        self.read().credentials.get(name).cloned().unwrap_or_default()
    }

    pub fn set_credentials(&self, name: &str, credentials: Credentials) -> Result<(), RegistryError> {
        if credentials.username.trim().is_empty() {
            return Err(RegistryError::EmptyUsername);
        }
        self.write().credentials.insert(name.to_string(), credentials);
        tracing::info!(node = name, "updated credentials");
        Ok(())
    }

    /// Parameters for `name`, synthesizing and storing defaults on first access.
    pub fn service_parameters(&self, name: &str) -> ServiceParameters {
        if let Some(p) = self.read().params.get(name) {
            return p.clone();
        }
        self.write()
            .params
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn set_service_parameters(&self, name: &str, params: ServiceParameters) -> Result<(), RegistryError> {
        if params.install_path.trim().is_empty() {
            return Err(RegistryError::EmptyParameter("install path"));
        }
        if params.node_name.trim().is_empty() {
            return Err(RegistryError::EmptyParameter("node name"));
        }
        self.write().params.insert(name.to_string(), params);
        tracing::info!(node = name, "updated service parameters");
        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<Target> {
        let node = self.resolve(name)?;
        Some(Target {
            credentials: self.credentials(name),
            name: node.name,
            address: node.address,
        })
    }

    /// Apply a BDMap-style parameter map. Returns how many nodes matched.
    ///
    /// The first matching key in file order wins; `map` keeps insertion
    /// order (`preserve_order`). Non-string values are ignored.
    pub fn import_parameter_map(&self, map: &Map<String, Value>) -> usize {
        let mut updated = 0;
        for node in self.list_nodes() {
            let mut params = self.service_parameters(&node.name);
            let matched = map.iter().find_map(|(key, value)| {
                if !(key.starts_with("BD") && key.contains("BLMER") && key.contains(node.name.as_str())) {
                    return None;
                }
                let macros = value.as_str()?.split('|').nth(2)?;
                Some((key.clone(), macros.to_string()))
            });

            let Some((key, macros)) = matched else { continue };
            params.node_name = key;
            for pair in macros.split(',') {
                if let Some((k, v)) = pair.split_once('=') {
                    params.apply_macro(k, v);
                }
            }
            params.install_path = "/opt/LACCS".to_string();
            self.write().params.insert(node.name.clone(), params);
            updated += 1;
        }
        updated
    }

    pub fn import_parameter_file(&self, path: &Path) -> Result<usize, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let map: Map<String, Value> = serde_json::from_str(&text)?;
        let updated = self.import_parameter_map(&map);
        tracing::info!(path = %path.display(), updated, "loaded service parameters");
        Ok(updated)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parse a node table. The header row carries `#`-prefixed column names.
pub fn parse_node_table(text: &str) -> Result<Vec<NodeRow>, RegistryError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or(RegistryError::Empty)?;
    let columns: Vec<String> = header
        .split('\t')
        .map(|c| c.trim().trim_start_matches('#').to_lowercase())
        .collect();
    let find = |name: &str| columns.iter().position(|c| c == name);

    let name_col = find("node_name").ok_or(RegistryError::MissingColumn("node_name"))?;
    let ip_col = find("local_ip").ok_or(RegistryError::MissingColumn("local_ip"))?;
    let user_col = find("username");
    let pass_col = find("password");

    let mut rows = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let (Some(name), Some(ip)) = (fields.get(name_col), fields.get(ip_col)) else {
            continue;
        };
        if name.is_empty() || ip.is_empty() || ip.eq_ignore_ascii_case("none") {
            continue;
        }
        let credentials = user_col
            .and_then(|c| fields.get(c))
            .filter(|u| !u.is_empty())
            .map(|u| {
                let password = pass_col.and_then(|c| fields.get(c)).copied().unwrap_or_default();
                Credentials::new(*u, password)
            });
        rows.push(NodeRow {
            identity: NodeIdentity::new(*name, *ip),
            credentials,
        });
    }
    Ok(rows)
}

pub fn load_node_table(path: &Path) -> Result<Vec<NodeRow>, RegistryError> {
    let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let rows = parse_node_table(&text)?;
    tracing::info!(path = %path.display(), nodes = rows.len(), "loaded node table");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "#node_name\t#local_ip\t#location\n\
        BLM01\t10.0.0.1\tring\n\
        \n\
        BLM02\tnone\tring\n\
        LOCAL\t127.0.0.1\tdesk\n";

    #[test]
    fn parse_skips_blank_and_none_rows() {
        let rows = parse_node_table(TABLE).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.identity.name.as_str()).collect();
        assert_eq!(names, ["BLM01", "LOCAL"]);
        assert!(rows[1].identity.is_localhost());
        assert!(rows[0].credentials.is_none());
    }

    #[test]
    fn parse_requires_ip_column() {
        let err = parse_node_table("#node_name\t#ip\nA\t1.2.3.4\n").unwrap_err();
        assert!(matches!(err, RegistryError::MissingColumn("local_ip")));
    }

    #[test]
    fn parse_reads_optional_credentials() {
        let rows = parse_node_table("#NODE_NAME\t#LOCAL_IP\t#username\t#password\nA\t10.0.0.1\tops\ts3cret\n").unwrap();
        assert_eq!(rows[0].credentials, Some(Credentials::new("ops", "s3cret")));
    }

    #[test]
    fn credentials_fall_back_to_defaults() {
        let registry = NodeRegistry::new(vec![NodeIdentity::new("A", "10.0.0.1")]);
        assert_eq!(registry.credentials("A"), Credentials::default());
        registry.set_credentials("A", Credentials::new("ops", "pw")).unwrap();
        assert_eq!(registry.target("A").unwrap().credentials.username, "ops");
        assert!(registry.set_credentials("A", Credentials::new(" ", "pw")).is_err());
    }

    #[test]
    fn parameters_are_synthesized_once() {
        let registry = NodeRegistry::new(vec![NodeIdentity::new("A", "10.0.0.1")]);
        let mut p = registry.service_parameters("A");
        p.device_name = "HIAF:X".into();
        registry.set_service_parameters("A", p.clone()).unwrap();
        assert_eq!(registry.service_parameters("A"), p);
    }

    #[test]
    fn import_parameter_map_matches_blmer_keys() {
        let registry = NodeRegistry::new(vec![
            NodeIdentity::new("N07", "10.0.0.7"),
            NodeIdentity::new("N08", "10.0.0.8"),
        ]);
        let map: Map<String, Value> = serde_json::from_str(
            r#"{"BDBLMER_N07": "x|y|{device_name}=HIAF:BLM07,{ch00}=L0,{ch05}=L5"}"#,
        )
        .unwrap();
        assert_eq!(registry.import_parameter_map(&map), 1);
        let p = registry.service_parameters("N07");
        assert_eq!(p.node_name, "BDBLMER_N07");
        assert_eq!(p.device_name, "HIAF:BLM07");
        assert_eq!(p.channels[0], "L0");
        assert_eq!(p.channels[5], "L5");
        assert_eq!(p.install_path, "/opt/LACCS");
        assert_eq!(registry.service_parameters("N08"), ServiceParameters::default());
    }

    #[test]
    fn first_matching_key_in_file_order_wins() {
        let registry = NodeRegistry::new(vec![NodeIdentity::new("N07", "10.0.0.7")]);
        // "BDBLMER_Z_N07" sorts after "BDBLMER_A_N07" but comes first in the file
        let map: Map<String, Value> = serde_json::from_str(
            r#"{
                "BDBLMER_N07_BAD": 7,
                "BDBLMER_Z_N07": "x|y|{device_name}=FIRST",
                "BDBLMER_A_N07": "x|y|{device_name}=SECOND"
            }"#,
        )
        .unwrap();
        assert_eq!(registry.import_parameter_map(&map), 1);
        let p = registry.service_parameters("N07");
        assert_eq!(p.node_name, "BDBLMER_Z_N07");
        assert_eq!(p.device_name, "FIRST");
    }

    #[test]
    fn unknown_node_has_no_target() {
        let registry = NodeRegistry::default();
        assert!(registry.target("ghost").is_none());
    }
}
