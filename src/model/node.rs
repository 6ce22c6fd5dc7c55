use serde::{Deserialize, Serialize};

/// Loopback address; nodes registered under it are never probed or commanded.
pub const LOCALHOST_IP: &str = "127.0.0.1";

pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_PASSWORD: &str = "imp";

/// Name and address of one fleet node, as listed by the node table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub name: String,
    pub address: String,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn is_localhost(&self) -> bool {
        self.address.trim() == LOCALHOST_IP
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

/// Everything a Remote Session needs to reach a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub address: String,
    pub credentials: Credentials,
}

/// Launch parameters of the monitor service on one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceParameters {
    pub install_path: String,
    pub node_name: String,
    pub device_name: String,
    pub channels: [String; 6],
}

impl Default for ServiceParameters {
    fn default() -> Self {
        let node_name = "BDBLM00".to_string();
        Self {
            install_path: "/opt/LACCS#".to_string(),
            device_name: format!("HIAF:{}", node_name),
            node_name,
            channels: std::array::from_fn(|i| format!("CH{:02}", i)),
        }
    }
}

impl ServiceParameters {
    /// Apply a `{key}=value` macro override. Returns false for unknown keys.
    pub fn apply_macro(&mut self, key: &str, value: &str) -> bool {
        let key = key.trim().trim_start_matches('{').trim_end_matches('}');
        match key {
            "node_name" => self.node_name = value.to_string(),
            "device_name" => self.device_name = value.to_string(),
            "laccs_path" | "install_path" => self.install_path = value.to_string(),
            _ => {
                let Some(idx) = key
                    .strip_prefix("ch")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|&n| n < self.channels.len())
                else {
                    return false;
                };
                self.channels[idx] = value.to_string();
            }
        }
        true
    }

    /// Directory the service is relaunched from after a library swap:
    /// the install path with `#` markers removed and a trailing slash.
    pub fn library_launch_dir(&self) -> String {
        let mut dir = self.install_path.replace('#', "");
        if !dir.ends_with('/') {
            dir.push('/');
        }
        dir
    }
}
