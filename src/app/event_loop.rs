use std::path::PathBuf;

use crate::pool;

use super::App;

/// Marshaled events applied per loop iteration.
const EVENTS_PER_TICK: usize = 200;

/// Single-node action requested from the console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeAction {
    Start,
    Stop,
    Restart,
    UpdateLibrary(PathBuf),
    Deploy(PathBuf),
}

impl NodeAction {
    fn label(&self) -> &'static str {
        match self {
            NodeAction::Start => "Start",
            NodeAction::Stop => "Stop",
            NodeAction::Restart => "Restart",
            NodeAction::UpdateLibrary(_) => "Library update",
            NodeAction::Deploy(_) => "Deployment",
        }
    }
}

impl App {
    /// Drain marshaled worker events into the console. Returns true if anything changed.
    pub fn poll_events(&mut self) -> bool {
        self.ui_rx.drain(&mut self.console, EVENTS_PER_TICK) > 0
    }

    /// Run a single-node action on a supervised task.
    pub fn spawn_node_action(&self, node: String, action: NodeAction) {
        let label = format!("{} on {}", action.label(), node);
        self.ui.info(format!("{} requested", label));
        let handle = self.rt.handle();
        let (ui, operator) = (self.ui.clone(), self.operator.clone());

        match action {
            NodeAction::Start => {
                let executor = self.executor.clone();
                pool::supervise(handle, ui, operator, label, async move { executor.start(&node).await });
            }
            NodeAction::Stop => {
                let executor = self.executor.clone();
                pool::supervise(handle, ui, operator, label, async move { executor.stop(&node).await });
            }
            NodeAction::Restart => {
                let executor = self.executor.clone();
                pool::supervise(handle, ui, operator, label, async move { executor.restart(&node).await });
            }
            NodeAction::UpdateLibrary(library) => {
                let executor = self.executor.clone();
                pool::supervise(handle, ui, operator, label, async move {
                    executor.update_library(&node, &library).await
                });
            }
            NodeAction::Deploy(archive) => {
                let deployer = self.deployer.clone();
                let target_dir = self.deploy_target.clone();
                pool::supervise(handle, ui, operator, label, async move {
                    deployer.deploy(&node, &archive, &target_dir).await
                });
            }
        }
    }

    pub fn spawn_stop_all(&self) {
        let batch = self.batch.clone();
        pool::supervise(
            self.rt.handle(),
            self.ui.clone(),
            self.operator.clone(),
            "Stop all".to_string(),
            async move { Ok::<_, std::convert::Infallible>(batch.stop_all().await) },
        );
    }

    pub fn spawn_update_all(&self, library: PathBuf) {
        let batch = self.batch.clone();
        pool::supervise(
            self.rt.handle(),
            self.ui.clone(),
            self.operator.clone(),
            "Library update on all nodes".to_string(),
            async move { batch.update_library_all(&library).await },
        );
    }
}
