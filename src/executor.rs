//! Single-node lifecycle commands: start, stop, restart and library update.
//!
//! Every operation re-probes the node before acting, shows the operator the
//! exact remote commands, and only then touches the node. Terminal status
//! transitions are marshaled after a settle delay so the remote side has
//! caught up by the time the table changes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::classifier;
use crate::commands::{self, KILL_PROCESS, LIBRARY_BACKUP, STOP_SESSION};
use crate::config::Settings;
use crate::model::{ServiceStatus, Target};
use crate::registry::NodeRegistry;
use crate::ssh::{CommandOutput, Progress, RemoteSession, SessionError};
use crate::ui::{Operator, UiHandle};

pub const RESTART_STOPPED_DELAY: Duration = Duration::from_millis(500);
pub const RESTART_RUNNING_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("unknown node {0}")]
    UnknownNode(String),
    #[error("{0} is the local host and is not managed remotely")]
    Localhost(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("`{command}` failed on {node} with exit code {exit_code}: {stderr}")]
    Remote {
        node: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The operator declined a confirmation; nothing was executed.
    Declined,
}

/// Resolve a node for remote work. Loopback nodes are rejected.
pub fn resolve_remote(registry: &NodeRegistry, node: &str) -> Result<Target, CommandError> {
    let target = registry
        .target(node)
        .ok_or_else(|| CommandError::UnknownNode(node.to_string()))?;
    if target.address.trim() == crate::model::LOCALHOST_IP {
        return Err(CommandError::Localhost(node.to_string()));
    }
    Ok(target)
}

/// Run a command that must exit 0.
pub(crate) async fn run_checked(
    session: &dyn RemoteSession,
    target: &Target,
    command: &str,
) -> Result<CommandOutput, CommandError> {
    tracing::debug!(node = %target.name, command, "executing");
    let out = session.execute(target, command, None).await?;
    if !out.success() {
        return Err(CommandError::Remote {
            node: target.name.clone(),
            command: command.to_string(),
            exit_code: out.exit_code,
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}

/// Run a command whose non-zero exit is only worth a warning (quitting an
/// absent session, killing an absent process).
pub(crate) async fn run_lenient(
    session: &dyn RemoteSession,
    ui: &UiHandle,
    target: &Target,
    command: &str,
) -> Result<CommandOutput, CommandError> {
    tracing::debug!(node = %target.name, command, "executing");
    let out = session.execute(target, command, None).await?;
    if !out.success() {
        ui.warn(format!(
            "{}: `{}` exited with code {}",
            target.name, command, out.exit_code
        ));
    }
    Ok(out)
}

pub(crate) async fn read_local(path: &Path) -> Result<(String, Vec<u8>), CommandError> {
    let io_err = |source| CommandError::Io {
        path: path.display().to_string(),
        source,
    };
    let bytes = tokio::fs::read(path).await.map_err(io_err)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file")))?;
    Ok((filename, bytes))
}

pub(crate) fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        100
    } else {
        (sent.min(total) * 100 / total) as u8
    }
}

/// Kill command for the given live status, if any.
fn kill_command(status: ServiceStatus) -> Option<&'static str> {
    match status {
        ServiceStatus::Running => Some(STOP_SESSION),
        ServiceStatus::Standalone => Some(KILL_PROCESS),
        _ => None,
    }
}

#[derive(Clone)]
pub struct CommandExecutor {
    registry: NodeRegistry,
    session: Arc<dyn RemoteSession>,
    operator: Arc<dyn Operator>,
    ui: UiHandle,
    settings: Settings,
}

impl CommandExecutor {
    pub fn new(
        registry: NodeRegistry,
        session: Arc<dyn RemoteSession>,
        operator: Arc<dyn Operator>,
        ui: UiHandle,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            session,
            operator,
            ui,
            settings,
        }
    }

    /// Fresh probe; a failed probe aborts the command without a status change.
    async fn current_status(&self, target: &Target) -> Result<ServiceStatus, CommandError> {
        let c = classifier::probe(self.session.as_ref(), target, self.settings.probe_timeout).await;
        match c.error {
            Some(e) => Err(e.into()),
            None => Ok(c.status),
        }
    }

    pub async fn start(&self, node: &str) -> Result<Outcome, CommandError> {
        let target = resolve_remote(&self.registry, node)?;
        let launch = commands::start_command(&self.registry.service_parameters(node));
        let current = self.current_status(&target).await?;
        let kill = kill_command(current);

        let (title, body) = match kill {
            Some(kill) => (
                "Service Already Running",
                format!(
                    "{} is {}. Stop the existing instance with:\n  {}\nthen start it with:\n  {}",
                    node, current, kill, launch
                ),
            ),
            None => (
                "Start Service",
                format!("Start the service on {} with:\n  {}", node, launch),
            ),
        };
        if !self.operator.confirm(title, &body).await {
            self.ui.info(format!("Start on {} cancelled", node));
            return Ok(Outcome::Declined);
        }

        if let Some(kill) = kill {
            run_lenient(self.session.as_ref(), &self.ui, &target, kill).await?;
            tokio::time::sleep(self.settings.stop_settle).await;
        }
        let started = self.launch(&target, &launch).await;
        let status = if started.is_ok() {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        };
        self.ui.set_status_after(node, status, self.settings.status_settle);
        started.map(|_| Outcome::Completed)
    }

    pub async fn stop(&self, node: &str) -> Result<Outcome, CommandError> {
        let target = resolve_remote(&self.registry, node)?;
        let current = self.current_status(&target).await?;
        let command = kill_command(current).unwrap_or(STOP_SESSION);

        let body = if current.is_active() {
            format!("Stop the service on {} with:\n  {}", node, command)
        } else {
            format!(
                "{} does not appear to be running ({}). Run anyway:\n  {}",
                node, current, command
            )
        };
        if !self.operator.confirm("Stop Service", &body).await {
            self.ui.info(format!("Stop on {} cancelled", node));
            return Ok(Outcome::Declined);
        }

        run_lenient(self.session.as_ref(), &self.ui, &target, command).await?;
        self.ui.info(format!("{}: stop command sent", node));
        self.ui.set_status_after(node, ServiceStatus::Stopped, self.settings.status_settle);
        Ok(Outcome::Completed)
    }

    /// Stop, wait, start. The stop command is always issued first.
    pub async fn restart(&self, node: &str) -> Result<Outcome, CommandError> {
        let target = resolve_remote(&self.registry, node)?;
        let launch = commands::start_command(&self.registry.service_parameters(node));
        let current = self.current_status(&target).await?;
        let stop = kill_command(current).unwrap_or(STOP_SESSION);

        let body = format!(
            "Restart the service on {} ({}):\n  {}\nthen after {}ms:\n  {}",
            node,
            current,
            stop,
            self.settings.stop_settle.as_millis(),
            launch
        );
        if !self.operator.confirm("Restart Service", &body).await {
            self.ui.info(format!("Restart on {} cancelled", node));
            return Ok(Outcome::Declined);
        }

        run_lenient(self.session.as_ref(), &self.ui, &target, stop).await?;
        tokio::time::sleep(self.settings.stop_settle).await;
        let started = self.launch(&target, &launch).await;

        self.ui.set_status_after(node, ServiceStatus::Stopped, RESTART_STOPPED_DELAY);
        if started.is_ok() {
            self.ui.set_status_after(node, ServiceStatus::Running, RESTART_RUNNING_DELAY);
        }
        started.map(|_| Outcome::Completed)
    }

    /// Replace the shared library on one node, then optionally restart it.
    pub async fn update_library(&self, node: &str, library: &Path) -> Result<Outcome, CommandError> {
        let target = resolve_remote(&self.registry, node)?;
        let (filename, bytes) = read_local(library).await?;
        let params = self.registry.service_parameters(node);
        let remote_path = commands::library_path(&filename);

        let body = format!(
            "Update the library on {}:\n  {}\n  {} (if the session quit fails)\n  {}\n  upload {} -> {}\nA restart will be offered afterwards.",
            node, STOP_SESSION, KILL_PROCESS, LIBRARY_BACKUP, filename, remote_path
        );
        if !self.operator.confirm("Update Library", &body).await {
            self.ui.info(format!("Library update on {} cancelled", node));
            return Ok(Outcome::Declined);
        }

        self.ui.set_status(node, ServiceStatus::Updating);
        let result = self.swap_library(&target, &bytes, &remote_path).await;
        self.ui.clear_progress();
        if let Err(e) = result {
            self.ui.set_status(node, ServiceStatus::Error);
            return Err(e);
        }
        self.ui.info(format!("{}: uploaded {}", node, remote_path));

        let launch = commands::start_command_in(&params.library_launch_dir(), &params);
        let restart = self
            .operator
            .confirm("Restart Service", &format!("Restart {} now with:\n  {}", node, launch))
            .await;
        if !restart {
            self.ui.info(format!("{}: library updated, service left stopped", node));
            self.ui.set_status_after(node, ServiceStatus::Stopped, self.settings.status_settle);
            return Ok(Outcome::Completed);
        }

        let started = self.launch(&target, &launch).await;
        let status = if started.is_ok() {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        };
        self.ui.set_status_after(node, status, self.settings.status_settle);
        started.map(|_| Outcome::Completed)
    }

    async fn swap_library(&self, target: &Target, bytes: &[u8], remote_path: &str) -> Result<(), CommandError> {
        let session = self.session.as_ref();
        let quit = session.execute(target, STOP_SESSION, None).await;
        if !matches!(&quit, Ok(out) if out.success()) {
            run_lenient(session, &self.ui, target, KILL_PROCESS).await?;
        }
        tokio::time::sleep(self.settings.stop_settle).await;
        run_checked(session, target, LIBRARY_BACKUP).await?;

        let ui = self.ui.clone();
        let node = target.name.clone();
        let report = move |sent: u64, total: u64| {
            ui.progress(&node, "Uploading library", percent(sent, total));
        };
        let progress: Progress<'_> = &report;
        session.upload(target, bytes, remote_path, Some(progress)).await?;
        Ok(())
    }

    async fn launch(&self, target: &Target, launch: &str) -> Result<(), CommandError> {
        run_checked(self.session.as_ref(), target, launch).await?;
        self.ui.info(format!("{}: service started", target.name));
        Ok(())
    }
}
