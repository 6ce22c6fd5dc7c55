//! Status Poller: periodic, bounded fan-out of status probes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::classifier::{self, TrackerEffect};
use crate::config::Settings;
use crate::model::{ServiceStatus, Target};
use crate::pool;
use crate::registry::NodeRegistry;
use crate::ssh::RemoteSession;
use crate::tracker::TimeoutTracker;
use crate::ui::UiHandle;

/// What one sweep did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepReport {
    pub localhost: Vec<String>,
    pub skipped: Vec<String>,
    pub probed: Vec<(String, ServiceStatus)>,
}

pub struct StatusPoller {
    registry: NodeRegistry,
    session: Arc<dyn RemoteSession>,
    tracker: Arc<TimeoutTracker>,
    ui: UiHandle,
    settings: Settings,
    refresh: Notify,
    localhost_marked: Mutex<HashSet<String>>,
    last_seen: Arc<Mutex<HashMap<String, ServiceStatus>>>,
}

impl StatusPoller {
    pub fn new(
        registry: NodeRegistry,
        session: Arc<dyn RemoteSession>,
        tracker: Arc<TimeoutTracker>,
        ui: UiHandle,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            session,
            tracker,
            ui,
            settings,
            refresh: Notify::new(),
            localhost_marked: Mutex::new(HashSet::new()),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn tracker(&self) -> &TimeoutTracker {
        &self.tracker
    }

    /// Sweep, then sleep out the rest of the period, until `token` fires.
    /// A forced refresh cuts the sleep short.
    pub async fn run(self: Arc<Self>, token: CancellationToken) {
        tracing::info!(period = ?self.settings.poll_interval, workers = self.settings.poll_workers, "status poller started");
        while !token.is_cancelled() {
            let started = Instant::now();
            let report = self.sweep().await;
            tracing::debug!(
                probed = report.probed.len(),
                skipped = report.skipped.len(),
                elapsed = ?started.elapsed(),
                "sweep finished"
            );

            let remaining = self.settings.poll_interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(remaining) => {}
                _ = self.refresh.notified() => tracing::debug!("forced refresh"),
            }
        }
        tracing::info!("status poller stopped");
    }

    /// Forget all timeout records and sweep immediately.
    pub fn refresh_now(&self) {
        self.tracker.clear_all();
        self.ui.info("Refreshing all nodes");
        self.refresh.notify_one();
    }

    /// One pass over the registry. Returns once every probe has finished.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut eligible: Vec<Target> = Vec::new();

        for node in self.registry.list_nodes() {
            if node.is_localhost() {
                if self.lock_marked().insert(node.name.clone()) {
                    self.ui.set_status(&node.name, ServiceStatus::Localhost);
                }
                report.localhost.push(node.name);
                continue;
            }
            if self.tracker.should_skip(&node.name) {
                tracing::debug!(node = %node.name, "skipped after connection timeouts");
                report.skipped.push(node.name);
                continue;
            }
            if let Some(target) = self.registry.target(&node.name) {
                eligible.push(target);
            }
        }

        let session = Arc::clone(&self.session);
        let tracker = Arc::clone(&self.tracker);
        let ui = self.ui.clone();
        let last_seen = Arc::clone(&self.last_seen);
        let timeout = self.settings.probe_timeout;

        let results = pool::run_bounded(eligible, self.settings.poll_workers, move |target: Target| {
            let session = Arc::clone(&session);
            let tracker = Arc::clone(&tracker);
            let ui = ui.clone();
            let last_seen = Arc::clone(&last_seen);
            async move {
                let c = classifier::probe(session.as_ref(), &target, timeout).await;
                match c.tracker {
                    TrackerEffect::RecordSuccess => tracker.record_success(&target.name),
                    TrackerEffect::RecordTimeout => tracker.record_timeout(&target.name),
                    TrackerEffect::Unchanged => {}
                }
                ui.set_status(&target.name, c.status);

                let previous = last_seen
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(target.name.clone(), c.status);
                match c.error {
                    Some(e) => ui.warn(format!("{} ({}): {}", target.name, target.address, e)),
                    None if previous != Some(c.status) => {
                        ui.info(format!("{} ({}): {}", target.name, target.address, c.status))
                    }
                    None => {}
                }
                c.status
            }
        })
        .await;

        for (target, result) in results {
            let status = match result {
                Ok(status) => status,
                Err(panic) => {
                    self.ui.error(format!("{}: status probe crashed: {}", target.name, panic));
                    self.ui.set_status(&target.name, ServiceStatus::Error);
                    ServiceStatus::Error
                }
            };
            report.probed.push((target.name, status));
        }
        report
    }

    fn lock_marked(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.localhost_marked.lock().unwrap_or_else(|p| p.into_inner())
    }
}
