use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, AuthResult, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;

use crate::model::Target;

use super::{CommandOutput, Progress, RemoteSession, SessionError};

const UPLOAD_CHUNK: usize = 32 * 1024;

/// Minimal russh client handler.
#[derive(Clone, Debug, Default)]
struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    // TODO: pin host key fingerprints from an extra NODES.tsv column
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Password-authenticated SSH transport backed by russh.
pub struct SshSession {
    config: Arc<client::Config>,
    port: u16,
    connect_timeout: Duration,
}

impl SshSession {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: None,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            port,
            connect_timeout,
        }
    }

    async fn connect(
        &self,
        target: &Target,
        limit: Duration,
    ) -> Result<Handle<ClientHandler>, SessionError> {
        let address = target.address.as_str();
        tracing::debug!(node = %target.name, %address, "opening ssh connection");

        let connecting = client::connect(self.config.clone(), (address, self.port), ClientHandler);
        let mut handle = match tokio::time::timeout(limit, connecting).await {
            Err(_) => return Err(timed_out(address, limit)),
            Ok(Err(e)) => return Err(SessionError::from_russh(address, limit, e)),
            Ok(Ok(handle)) => handle,
        };

        let authenticating = handle.authenticate_password(
            target.credentials.username.clone(),
            target.credentials.password.clone(),
        );
        let auth = match tokio::time::timeout(limit, authenticating).await {
            Err(_) => Err(timed_out(address, limit)),
            Ok(Err(e)) => Err(SessionError::from_russh(address, limit, e)),
            Ok(Ok(result)) => Ok(result),
        };

        match auth {
            Ok(AuthResult::Success) => Ok(handle),
            Ok(AuthResult::Failure { .. }) => {
                close(handle).await;
                Err(SessionError::Auth {
                    address: address.to_string(),
                    username: target.credentials.username.clone(),
                })
            }
            Err(e) => {
                close(handle).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(
        &self,
        target: &Target,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, SessionError> {
        let address = target.address.as_str();
        let handle = self
            .connect(target, timeout.unwrap_or(self.connect_timeout))
            .await?;

        let running = run_command(&handle, command);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, running).await {
                Ok(r) => r.map_err(|e| SessionError::from_russh(address, limit, e)),
                Err(_) => Err(timed_out(address, limit)),
            },
            None => running
                .await
                .map_err(|e| SessionError::from_russh(address, self.connect_timeout, e)),
        };

        close(handle).await;
        result
    }

    async fn upload(
        &self,
        target: &Target,
        contents: &[u8],
        remote_path: &str,
        progress: Option<Progress<'_>>,
    ) -> Result<(), SessionError> {
        let address = target.address.as_str();
        let handle = self.connect(target, self.connect_timeout).await?;

        let result: Result<(), SessionError> = async {
            let sftp = open_sftp(&handle, address, self.connect_timeout).await?;
            let written = write_file(&sftp, address, contents, remote_path, progress).await;
            let _ = sftp.close().await;
            written
        }
        .await;

        close(handle).await;
        result
    }

    async fn download(&self, target: &Target, remote_path: &str) -> Result<Vec<u8>, SessionError> {
        let address = target.address.as_str();
        let handle = self.connect(target, self.connect_timeout).await?;

        let result: Result<Vec<u8>, SessionError> = async {
            let sftp = open_sftp(&handle, address, self.connect_timeout).await?;
            let read = sftp
                .read(remote_path)
                .await
                .map_err(|e| SessionError::from_sftp(address, e));
            let _ = sftp.close().await;
            read
        }
        .await;

        close(handle).await;
        result
    }
}

fn timed_out(address: &str, after: Duration) -> SessionError {
    SessionError::Timeout {
        address: address.to_string(),
        after,
    }
}

async fn close(handle: Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!("error while closing ssh connection: {}", e);
    }
}

/// Fold one channel message into the captured output. Returns true once the
/// channel is closed.
fn collect_message(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut Option<i32>,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = Some(*exit_status as i32);
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

async fn run_command(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<CommandOutput, russh::Error> {
    let mut channel = handle.channel_open_session().await?;
    tracing::trace!("executing '{}'", command);
    channel.exec(true, command).await?;

    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut code = None;
    while let Some(msg) = channel.wait().await {
        if collect_message(&msg, &mut out, &mut err, &mut code) {
            break;
        }
    }
    let _ = channel.close().await;

    Ok(CommandOutput {
        // no exit-status message means the remote side dropped the channel
        exit_code: code.unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    })
}

async fn open_sftp(
    handle: &Handle<ClientHandler>,
    address: &str,
    limit: Duration,
) -> Result<SftpSession, SessionError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SessionError::from_russh(address, limit, e))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| SessionError::from_russh(address, limit, e))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| SessionError::from_sftp(address, e))
}

async fn write_file(
    sftp: &SftpSession,
    address: &str,
    contents: &[u8],
    remote_path: &str,
    progress: Option<Progress<'_>>,
) -> Result<(), SessionError> {
    let io_err = |e: std::io::Error| SessionError::Connection {
        address: address.to_string(),
        message: format!("writing {}: {}", remote_path, e),
    };

    let mut file = sftp
        .create(remote_path)
        .await
        .map_err(|e| SessionError::from_sftp(address, e))?;

    let total = contents.len() as u64;
    let mut done = 0u64;
    for chunk in contents.chunks(UPLOAD_CHUNK) {
        file.write_all(chunk).await.map_err(io_err)?;
        done += chunk.len() as u64;
        if let Some(report) = progress {
            report(done, total);
        }
    }
    file.flush().await.map_err(io_err)?;
    file.shutdown().await.map_err(io_err)?;
    Ok(())
}
