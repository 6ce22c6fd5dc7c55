//! Marshaling of worker results onto the single UI thread.
//!
//! Background tasks never touch UI state. They enqueue [`UiEvent`]s through a
//! [`UiHandle`]; the front-end drains the matching [`UiReceiver`] from its
//! event loop and applies each event to a [`UiSink`]. Both sides consult the
//! shared cancellation token, so nothing is applied after teardown.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::model::{LogLevel, LogLine, ServiceStatus};

/// How to proceed when the deployment target directory already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryChoice {
    DeleteContents,
    Merge,
    Abort,
}

pub enum PromptReply {
    Confirm(oneshot::Sender<bool>),
    Directory(oneshot::Sender<DirectoryChoice>),
}

/// A question awaiting an operator answer.
pub struct Prompt {
    pub title: String,
    pub body: String,
    pub reply: PromptReply,
}

impl Prompt {
    /// Answer yes/no; for directory prompts `true` maps to delete-contents.
    pub fn answer(self, yes: bool) {
        match self.reply {
            PromptReply::Confirm(tx) => {
                let _ = tx.send(yes);
            }
            PromptReply::Directory(tx) => {
                let choice = if yes { DirectoryChoice::DeleteContents } else { DirectoryChoice::Abort };
                let _ = tx.send(choice);
            }
        }
    }

    pub fn choose(self, choice: DirectoryChoice) {
        match self.reply {
            PromptReply::Directory(tx) => {
                let _ = tx.send(choice);
            }
            PromptReply::Confirm(tx) => {
                let _ = tx.send(choice != DirectoryChoice::Abort);
            }
        }
    }

    pub fn is_directory_choice(&self) -> bool {
        matches!(self.reply, PromptReply::Directory(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub node: String,
    pub stage: String,
    pub percent: u8,
}

pub enum UiEvent {
    Status { node: String, status: ServiceStatus },
    Log(LogLine),
    Progress(Option<ProgressUpdate>),
    Alert { title: String, message: String },
    Prompt(Prompt),
}

/// UI-thread side of the marshaling channel.
pub trait UiSink {
    fn on_status_changed(&mut self, node: &str, status: ServiceStatus);
    fn append_log_line(&mut self, line: LogLine);
    fn on_progress(&mut self, _update: Option<ProgressUpdate>) {}
    fn on_alert(&mut self, _title: String, _message: String) {}
    /// Prompts not accepted by the sink are declined.
    fn on_prompt(&mut self, prompt: Prompt) {
        prompt.answer(false);
    }
}

/// Cloneable producer handle given to workers.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
    token: CancellationToken,
}

pub struct UiReceiver {
    rx: mpsc::UnboundedReceiver<UiEvent>,
    token: CancellationToken,
}

pub fn channel(token: CancellationToken) -> (UiHandle, UiReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        UiHandle {
            tx,
            token: token.clone(),
        },
        UiReceiver { rx, token },
    )
}

impl UiHandle {
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    fn send(&self, event: UiEvent) -> bool {
        self.is_live() && self.tx.send(event).is_ok()
    }

    pub fn set_status(&self, node: &str, status: ServiceStatus) {
        self.send(UiEvent::Status {
            node: node.to_string(),
            status,
        });
    }

    /// Enqueue a status transition once `delay` has elapsed.
    pub fn set_status_after(&self, node: &str, status: ServiceStatus, delay: Duration) {
        let handle = self.clone();
        let node = node.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::select! {
                        _ = handle.token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => handle.set_status(&node, status),
                    }
                });
            }
            Err(_) => handle.set_status(&node, status),
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{}", text);
        self.send(UiEvent::Log(LogLine::now(LogLevel::Info, text)));
    }

    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{}", text);
        self.send(UiEvent::Log(LogLine::now(LogLevel::Warning, text)));
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::error!("{}", text);
        self.send(UiEvent::Log(LogLine::now(LogLevel::Error, text)));
    }

    pub fn progress(&self, node: &str, stage: &str, percent: u8) {
        self.send(UiEvent::Progress(Some(ProgressUpdate {
            node: node.to_string(),
            stage: stage.to_string(),
            percent: percent.min(100),
        })));
    }

    pub fn clear_progress(&self) {
        self.send(UiEvent::Progress(None));
    }

    pub fn alert(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(UiEvent::Alert {
            title: title.into(),
            message: message.into(),
        });
    }

    fn prompt(&self, title: &str, body: &str, reply: PromptReply) -> bool {
        self.send(UiEvent::Prompt(Prompt {
            title: title.to_string(),
            body: body.to_string(),
            reply,
        }))
    }
}

impl UiReceiver {
    /// Apply up to `max` pending events. Returns how many were applied.
    pub fn drain(&mut self, sink: &mut dyn UiSink, max: usize) -> usize {
        let mut applied = 0;
        while applied < max {
            let Ok(event) = self.rx.try_recv() else { break };
            if self.token.is_cancelled() {
                // dropping a prompt closes its reply channel, which declines it
                continue;
            }
            apply(sink, event);
            applied += 1;
        }
        applied
    }
}

fn apply(sink: &mut dyn UiSink, event: UiEvent) {
    match event {
        UiEvent::Status { node, status } => sink.on_status_changed(&node, status),
        UiEvent::Log(line) => sink.append_log_line(line),
        UiEvent::Progress(update) => sink.on_progress(update),
        UiEvent::Alert { title, message } => sink.on_alert(title, message),
        UiEvent::Prompt(prompt) => sink.on_prompt(prompt),
    }
}

/// Operator decisions requested by command operations.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn confirm(&self, title: &str, body: &str) -> bool;
    async fn resolve_directory_conflict(&self, node: &str, dir: &str) -> DirectoryChoice;
    /// Blocking error notice for operator-triggered actions.
    fn alert(&self, title: &str, message: &str);
}

/// Operator backed by the UI prompt queue.
pub struct UiOperator {
    ui: UiHandle,
}

impl UiOperator {
    pub fn new(ui: UiHandle) -> Self {
        Self { ui }
    }
}

#[async_trait]
impl Operator for UiOperator {
    async fn confirm(&self, title: &str, body: &str) -> bool {
        let (tx, rx) = oneshot::channel();
        if !self.ui.prompt(title, body, PromptReply::Confirm(tx)) {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    async fn resolve_directory_conflict(&self, node: &str, dir: &str) -> DirectoryChoice {
        let (tx, rx) = oneshot::channel();
        let body = format!("The directory {} already exists on {}.", dir, node);
        if !self.ui.prompt("Directory Exists", &body, PromptReply::Directory(tx)) {
            return DirectoryChoice::Abort;
        }
        rx.await.unwrap_or(DirectoryChoice::Abort)
    }

    fn alert(&self, title: &str, message: &str) {
        self.ui.alert(title, message);
    }
}
