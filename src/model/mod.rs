// Re-export all model types from submodules.

pub use log::{LogLevel, LogLine, LogPane};
pub use node::{
    Credentials, NodeIdentity, ServiceParameters, Target, DEFAULT_PASSWORD, DEFAULT_USERNAME,
    LOCALHOST_IP,
};
pub use status::{ServiceStatus, StatusTable};

mod log;
mod node;
mod status;
