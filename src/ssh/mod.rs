//! Remote Session: one authenticated SSH connection per call.
//!
//! Every operation opens a fresh connection, performs exactly one command or
//! one file transfer, and closes the connection on every exit path. There is
//! no retry here; callers own retry and backoff.

mod client;
mod error;

use std::time::Duration;

use async_trait::async_trait;

use crate::model::Target;

pub use client::SshSession;
pub use error::{FailureKind, SessionError};

/// Captured result of one remote command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Transfer progress callback: `(bytes_done, bytes_total)`.
pub type Progress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run `command` on the node. `timeout` bounds connect+auth and the
    /// command itself; `None` uses the session's default connect timeout and
    /// waits for the command indefinitely.
    async fn execute(
        &self,
        target: &Target,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, SessionError>;

    async fn upload(
        &self,
        target: &Target,
        contents: &[u8],
        remote_path: &str,
        progress: Option<Progress<'_>>,
    ) -> Result<(), SessionError>;

    async fn download(&self, target: &Target, remote_path: &str) -> Result<Vec<u8>, SessionError>;
}
