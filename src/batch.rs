//! Fleet-wide operations on their own bounded pool.
//!
//! One confirmation covers the whole batch. Per-node failures (errors and
//! panics alike) mark that node `Error` and never abort the rest; the summary
//! line is written only after every node task has finished.

use std::path::Path;
use std::sync::Arc;

use crate::commands::{self, KILL_PROCESS, LIBRARY_BACKUP, STOP_SESSION};
use crate::config::Settings;
use crate::executor::{self, CommandError};
use crate::model::{ServiceStatus, Target};
use crate::pool;
use crate::registry::NodeRegistry;
use crate::ssh::RemoteSession;
use crate::ui::{Operator, UiHandle};

/// Library read once and shared by every node upload.
#[derive(Clone)]
pub struct SharedLibrary {
    pub filename: String,
    pub bytes: Arc<[u8]>,
}

impl SharedLibrary {
    pub async fn load(path: &Path) -> Result<Self, CommandError> {
        let (filename, bytes) = executor::read_local(path).await?;
        Ok(Self {
            filename,
            bytes: bytes.into(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    fn from_results(results: Vec<(Target, Result<Result<(), CommandError>, String>)>, ui: &UiHandle) -> Self {
        let mut summary = BatchSummary::default();
        for (target, result) in results {
            let failure = match result {
                Ok(Ok(())) => {
                    summary.succeeded.push(target.name);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("internal error: {}", panic),
            };
            ui.error(format!("{}: {}", target.name, failure));
            ui.set_status(&target.name, ServiceStatus::Error);
            summary.failed.push((target.name, failure));
        }
        summary.succeeded.sort();
        summary.failed.sort();
        summary
    }
}

#[derive(Clone)]
pub struct BatchCoordinator {
    registry: NodeRegistry,
    session: Arc<dyn RemoteSession>,
    operator: Arc<dyn Operator>,
    ui: UiHandle,
    settings: Settings,
}

impl BatchCoordinator {
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

    /// Every registered non-loopback node.
    fn remote_targets(&self) -> Vec<Target> {
        self.registry
            .list_nodes()
            .into_iter()
            .filter(|n| !n.is_localhost())
            .filter_map(|n| self.registry.target(&n.name))
            .collect()
    }

    /// Stop the service on every remote node. `None` when declined.
    pub async fn stop_all(&self) -> Option<BatchSummary> {
        let targets = self.remote_targets();
        let body = format!(
            "Stop the service on {} nodes with:\n  {}\n  {}",
            targets.len(),
            STOP_SESSION,
            KILL_PROCESS
        );
        if !self.operator.confirm("Stop All Services", &body).await {
            self.ui.info("Stop all cancelled");
            return None;
        }

        let session = Arc::clone(&self.session);
        let ui = self.ui.clone();
        let settle = self.settings.status_settle;
        let results = pool::run_bounded(targets, self.settings.stop_workers, move |target: Target| {
            let session = Arc::clone(&session);
            let ui = ui.clone();
            async move {
                executor::run_lenient(session.as_ref(), &ui, &target, STOP_SESSION).await?;
                executor::run_lenient(session.as_ref(), &ui, &target, KILL_PROCESS).await?;
                ui.set_status_after(&target.name, ServiceStatus::Stopped, settle);
                Ok::<(), CommandError>(())
            }
        })
        .await;

        let summary = BatchSummary::from_results(results, &self.ui);
        self.ui.info(format!(
            "Stop all finished: {} stopped, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        ));
        Some(summary)
    }

    /// Swap the shared library on every remote node and restart each with its
    /// own parameters. `Ok(None)` when declined.
    pub async fn update_library_all(&self, library: &Path) -> Result<Option<BatchSummary>, CommandError> {
        let library = SharedLibrary::load(library).await?;
        let targets = self.remote_targets();
        let body = format!(
            "Update {} on {} nodes. Each node runs:\n  {}\n  {}\n  {}\n  upload -> {}\n  restart from the library directory",
            library.filename,
            targets.len(),
            STOP_SESSION,
            KILL_PROCESS,
            LIBRARY_BACKUP,
            commands::library_path(&library.filename)
        );
        if !self.operator.confirm("Update Library On All Nodes", &body).await {
            self.ui.info("Library update cancelled");
            return Ok(None);
        }

        let this = self.clone();
        let results = pool::run_bounded(targets, self.settings.update_workers, move |target: Target| {
            let this = this.clone();
            let library = library.clone();
            async move { this.update_node(&target, &library).await }
        })
        .await;

        let summary = BatchSummary::from_results(results, &self.ui);
        self.ui.info(format!(
            "Library update finished: {} updated, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        ));
        Ok(Some(summary))
    }

    async fn update_node(&self, target: &Target, library: &SharedLibrary) -> Result<(), CommandError> {
        let session = self.session.as_ref();
        let node = target.name.as_str();
        self.ui.set_status(node, ServiceStatus::Updating);

        executor::run_lenient(session, &self.ui, target, STOP_SESSION).await?;
        executor::run_lenient(session, &self.ui, target, KILL_PROCESS).await?;
        tokio::time::sleep(self.settings.stop_settle).await;
        executor::run_checked(session, target, LIBRARY_BACKUP).await?;

        // concurrent uploads share no progress line
        session
            .upload(target, &library.bytes, &commands::library_path(&library.filename), None)
            .await?;

        let params = self.registry.service_parameters(node);
        let launch = commands::start_command_in(&params.library_launch_dir(), &params);
        executor::run_checked(session, target, &launch).await?;
        self.ui.set_status(node, ServiceStatus::Running);
        self.ui.info(format!("{}: library updated and service restarted", node));
        Ok(())
    }
}
