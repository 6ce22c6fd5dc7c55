//! Deployment Pipeline: upload an archive and unpack it on one node.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error as ThisError;

use crate::commands;
use crate::executor::{self, CommandError, Outcome};
use crate::model::Target;
use crate::registry::NodeRegistry;
use crate::ssh::{Progress, RemoteSession, SessionError};
use crate::ui::{DirectoryChoice, Operator, UiHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployStage {
    Upload,
    CheckDirectory,
    CreateDirectory,
    ClearDirectory,
    Extract,
    Cleanup,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeployStage::Upload => "upload",
            DeployStage::CheckDirectory => "directory check",
            DeployStage::CreateDirectory => "directory creation",
            DeployStage::ClearDirectory => "directory cleanup",
            DeployStage::Extract => "extraction",
            DeployStage::Cleanup => "temporary file removal",
        })
    }
}

#[derive(Debug, ThisError)]
pub enum DeployError {
    #[error(transparent)]
    Target(CommandError),
    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} failed on {node}: {source}")]
    Stage {
        node: String,
        stage: DeployStage,
        #[source]
        source: CommandError,
    },
}

/// Normalized extraction directory: always ends with a single `/`.
pub fn deploy_dir(target_dir: &str) -> String {
    format!("{}/", target_dir.trim_end_matches('/'))
}

pub struct DeploymentPipeline {
    registry: NodeRegistry,
    session: Arc<dyn RemoteSession>,
    operator: Arc<dyn Operator>,
    ui: UiHandle,
}

impl DeploymentPipeline {
    pub fn new(
        registry: NodeRegistry,
        session: Arc<dyn RemoteSession>,
        operator: Arc<dyn Operator>,
        ui: UiHandle,
    ) -> Self {
        Self {
            registry,
            session,
            operator,
            ui,
        }
    }

    /// Upload, check/clear/create the directory, extract, remove the upload.
    /// Fails fast at the first broken stage; nothing is rolled back.
    pub async fn deploy(&self, node: &str, archive: &Path, target_dir: &str) -> Result<Outcome, DeployError> {
        let target = executor::resolve_remote(&self.registry, node).map_err(DeployError::Target)?;
        let bytes = tokio::fs::read(archive).await.map_err(|source| DeployError::Archive {
            path: archive.display().to_string(),
            source,
        })?;
        let filename = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive.tar.gz".to_string());
        let dir = deploy_dir(target_dir);
        let tmp = commands::upload_tmp_path(&filename);

        let body = format!(
            "Deploy {} ({} bytes) to {}:{}\n  upload -> {}\n  {}\n  {}",
            filename,
            bytes.len(),
            node,
            dir,
            tmp,
            commands::extract_archive(&tmp, &dir),
            commands::remove_file(&tmp)
        );
        if !self.operator.confirm("Deploy Archive", &body).await {
            self.ui.info(format!("Deployment to {} cancelled", node));
            return Ok(Outcome::Declined);
        }

        let result = self.run_stages(&target, &bytes, &tmp, &dir).await;
        self.ui.clear_progress();
        match &result {
            Ok(Outcome::Completed) => self.ui.info(format!("{}: deployed {} to {}", node, filename, dir)),
            Ok(Outcome::Declined) => self.ui.warn(format!("{}: deployment aborted at directory conflict", node)),
            Err(_) => {}
        }
        result
    }

    async fn run_stages(&self, target: &Target, bytes: &[u8], tmp: &str, dir: &str) -> Result<Outcome, DeployError> {
        let node = target.name.as_str();
        let stage = |stage: DeployStage| {
            move |source: CommandError| DeployError::Stage {
                node: node.to_string(),
                stage,
                source,
            }
        };

        let ui = self.ui.clone();
        let owned = node.to_string();
        let report = move |sent: u64, total: u64| {
            ui.progress(&owned, "Uploading archive", executor::percent(sent, total));
        };
        let progress: Progress<'_> = &report;
        self.session
            .upload(target, bytes, tmp, Some(progress))
            .await
            .map_err(|e: SessionError| stage(DeployStage::Upload)(e.into()))?;

        self.ui.progress(node, "Checking target directory", 100);
        let check = executor::run_checked(self.session.as_ref(), target, &commands::dir_exists_check(dir))
            .await
            .map_err(stage(DeployStage::CheckDirectory))?;

        if check.stdout.trim() == "exists" {
            match self.operator.resolve_directory_conflict(node, dir).await {
                DirectoryChoice::DeleteContents => {
                    self.ui.progress(node, "Clearing target directory", 100);
                    executor::run_checked(self.session.as_ref(), target, &commands::clear_dir(dir))
                        .await
                        .map_err(stage(DeployStage::ClearDirectory))?;
                }
                DirectoryChoice::Merge => {
                    self.ui.info(format!("{}: extracting over existing content of {}", node, dir));
                }
                DirectoryChoice::Abort => return Ok(Outcome::Declined),
            }
        } else {
            executor::run_checked(self.session.as_ref(), target, &commands::make_dir(dir))
                .await
                .map_err(stage(DeployStage::CreateDirectory))?;
        }

        self.ui.progress(node, "Extracting archive", 100);
        executor::run_checked(self.session.as_ref(), target, &commands::extract_archive(tmp, dir))
            .await
            .map_err(stage(DeployStage::Extract))?;
        executor::run_checked(self.session.as_ref(), target, &commands::remove_file(tmp))
            .await
            .map_err(stage(DeployStage::Cleanup))?;
        Ok(Outcome::Completed)
    }
}
