//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use blmctl::model::{LogLevel, LogLine, NodeIdentity, ServiceStatus, Target};
use blmctl::registry::NodeRegistry;
use blmctl::ssh::{CommandOutput, Progress, RemoteSession, SessionError};
use blmctl::ui::{self, DirectoryChoice, Operator, UiHandle, UiReceiver, UiSink};

/// What the fake node answers to one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Exit(i32),
    Stdout(String),
    Timeout,
    Auth,
    Panic,
}

type Responder = dyn Fn(&str, &str) -> Reply + Send + Sync;

/// In-memory `RemoteSession`. Every call is recorded as `(node, command)`;
/// transfers are recorded as `upload <path>` / `download <path>`.
pub struct FakeSession {
    responder: Box<Responder>,
    latency: Duration,
    calls: Mutex<Vec<(String, String)>>,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSession {
    pub fn new(responder: impl Fn(&str, &str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Self::with_latency(Duration::ZERO, responder)
    }

    pub fn with_latency(
        latency: Duration,
        responder: impl Fn(&str, &str) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            latency,
            calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Every command succeeds with exit code 0.
    pub fn healthy() -> Arc<Self> {
        Self::new(|_, _| Reply::Exit(0))
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, node: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(n, _)| n == node)
            .map(|(_, c)| c)
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn answer(&self, target: &Target, command: &str) -> Reply {
        self.calls
            .lock()
            .unwrap()
            .push((target.name.clone(), command.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(&target.name, command)
    }
}

fn into_result(target: &Target, reply: Reply) -> Result<CommandOutput, SessionError> {
    match reply {
        Reply::Exit(code) => Ok(CommandOutput {
            exit_code: code,
            ..Default::default()
        }),
        Reply::Stdout(stdout) => Ok(CommandOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        }),
        Reply::Timeout => Err(SessionError::Timeout {
            address: target.address.clone(),
            after: Duration::from_secs(5),
        }),
        Reply::Auth => Err(SessionError::Auth {
            address: target.address.clone(),
            username: target.credentials.username.clone(),
        }),
        Reply::Panic => panic!("scripted panic on {}", target.name),
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn execute(
        &self,
        target: &Target,
        command: &str,
        _timeout: Option<Duration>,
    ) -> Result<CommandOutput, SessionError> {
        let reply = self.answer(target, command).await;
        into_result(target, reply)
    }

    async fn upload(
        &self,
        target: &Target,
        contents: &[u8],
        remote_path: &str,
        progress: Option<Progress<'_>>,
    ) -> Result<(), SessionError> {
        let reply = self.answer(target, &format!("upload {}", remote_path)).await;
        into_result(target, reply)?;
        if let Some(progress) = progress {
            let total = contents.len() as u64;
            progress(total / 2, total);
            progress(total, total);
        }
        self.uploads
            .lock()
            .unwrap()
            .push((target.name.clone(), remote_path.to_string(), contents.to_vec()));
        Ok(())
    }

    async fn download(&self, target: &Target, remote_path: &str) -> Result<Vec<u8>, SessionError> {
        let reply = self.answer(target, &format!("download {}", remote_path)).await;
        into_result(target, reply).map(|out| out.stdout.into_bytes())
    }
}

/// Operator with fixed answers that records what it was asked.
pub struct ScriptedOperator {
    confirm: Mutex<Vec<bool>>,
    default_confirm: bool,
    directory: DirectoryChoice,
    pub asked: Mutex<Vec<(String, String)>>,
    pub alerts: Mutex<Vec<(String, String)>>,
}

impl ScriptedOperator {
    pub fn answering(confirm: bool) -> Arc<Self> {
        Self::new(confirm, DirectoryChoice::Abort)
    }

    pub fn new(confirm: bool, directory: DirectoryChoice) -> Arc<Self> {
        Arc::new(Self {
            confirm: Mutex::new(Vec::new()),
            default_confirm: confirm,
            directory,
            asked: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        })
    }

    /// Answer the next confirmations in order, then fall back to the default.
    pub fn then_answer(self: Arc<Self>, answers: &[bool]) -> Arc<Self> {
        let mut queue = self.confirm.lock().unwrap();
        queue.extend(answers.iter().rev());
        drop(queue);
        self
    }

    pub fn titles(&self) -> Vec<String> {
        self.asked.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm(&self, title: &str, body: &str) -> bool {
        self.asked
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        self.confirm.lock().unwrap().pop().unwrap_or(self.default_confirm)
    }

    async fn resolve_directory_conflict(&self, node: &str, dir: &str) -> DirectoryChoice {
        self.asked
            .lock()
            .unwrap()
            .push(("Directory Exists".to_string(), format!("{}:{}", node, dir)));
        self.directory
    }

    fn alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Records every marshaled event.
#[derive(Default)]
pub struct CollectingSink {
    pub statuses: Vec<(String, ServiceStatus)>,
    pub lines: Vec<LogLine>,
}

impl CollectingSink {
    pub fn last_status(&self, node: &str) -> Option<ServiceStatus> {
        self.statuses
            .iter()
            .rev()
            .find(|(n, _)| n == node)
            .map(|(_, s)| *s)
    }

    pub fn history(&self, node: &str) -> Vec<ServiceStatus> {
        self.statuses
            .iter()
            .filter(|(n, _)| n == node)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn has_line(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .iter()
            .any(|l| l.level == level && l.text.contains(needle))
    }
}

impl UiSink for CollectingSink {
    fn on_status_changed(&mut self, node: &str, status: ServiceStatus) {
        self.statuses.push((node.to_string(), status));
    }

    fn append_log_line(&mut self, line: LogLine) {
        self.lines.push(line);
    }
}

pub struct Harness {
    pub registry: NodeRegistry,
    pub ui: UiHandle,
    pub rx: UiReceiver,
    pub token: CancellationToken,
    pub sink: CollectingSink,
}

impl Harness {
    pub fn new(nodes: &[(&str, &str)]) -> Self {
        let registry = NodeRegistry::new(
            nodes
                .iter()
                .map(|(name, ip)| NodeIdentity::new(*name, *ip))
                .collect(),
        );
        let token = CancellationToken::new();
        let (ui, rx) = ui::channel(token.clone());
        Self {
            registry,
            ui,
            rx,
            token,
            sink: CollectingSink::default(),
        }
    }

    /// Apply every queued event to the sink.
    pub fn drain(&mut self) -> &CollectingSink {
        while self.rx.drain(&mut self.sink, usize::MAX) > 0 {}
        &self.sink
    }

    /// Let delayed status transitions fire, then drain.
    pub async fn settle(&mut self) -> &CollectingSink {
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.drain()
    }
}
