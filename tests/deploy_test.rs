mod common;

use std::path::PathBuf;
use std::sync::Arc;

use blmctl::commands;
use blmctl::deploy::{DeployError, DeployStage, DeploymentPipeline};
use blmctl::executor::Outcome;
use blmctl::model::LogLevel;
use blmctl::ssh::RemoteSession;
use blmctl::ui::{DirectoryChoice, Operator};

use common::{FakeSession, Harness, Reply, ScriptedOperator};

const DIR: &str = "/opt/LACCS#/";
const TMP: &str = "/tmp/release.tar.gz";

fn pipeline(h: &Harness, session: &Arc<FakeSession>, operator: &Arc<ScriptedOperator>) -> DeploymentPipeline {
    let session: Arc<dyn RemoteSession> = Arc::clone(session) as Arc<dyn RemoteSession>;
    let operator: Arc<dyn Operator> = Arc::clone(operator) as Arc<dyn Operator>;
    DeploymentPipeline::new(h.registry.clone(), session, operator, h.ui.clone())
}

fn archive(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("release.tar.gz");
    std::fs::write(&path, vec![0x1f; 4096]).unwrap();
    path
}

/// Target directory check reports `existing`; every other command exits 0.
fn node_with_dir(existing: bool) -> Arc<FakeSession> {
    let check = commands::dir_exists_check(DIR);
    FakeSession::new(move |_, command| {
        if command == check {
            Reply::Stdout(if existing { "exists\n" } else { "not exists\n" }.to_string())
        } else {
            Reply::Exit(0)
        }
    })
}

#[tokio::test]
async fn deploy_into_new_directory_creates_it() {
    let mut h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = node_with_dir(false);
    let operator = ScriptedOperator::answering(true);

    let outcome = pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), "/opt/LACCS#")
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(
        session.calls_for("A"),
        vec![
            format!("upload {}", TMP),
            commands::dir_exists_check(DIR),
            commands::make_dir(DIR),
            commands::extract_archive(TMP, DIR),
            commands::remove_file(TMP),
        ]
    );
    assert_eq!(session.uploads()[0].2.len(), 4096);
    assert_eq!(operator.titles(), vec!["Deploy Archive".to_string()]);
    assert!(h.drain().has_line(LogLevel::Info, "A: deployed release.tar.gz"));
}

#[tokio::test]
async fn existing_directory_is_cleared_on_delete() {
    let h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = node_with_dir(true);
    let operator = ScriptedOperator::new(true, DirectoryChoice::DeleteContents);

    pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap();
    let calls = session.calls_for("A");
    assert_eq!(calls[2], "rm -rf /opt/LACCS#/*");
    assert_eq!(&calls[3..], &[commands::extract_archive(TMP, DIR), commands::remove_file(TMP)]);
    assert_eq!(operator.titles()[1], "Directory Exists");
}

#[tokio::test]
async fn merge_extracts_over_existing_content() {
    let h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = node_with_dir(true);
    let operator = ScriptedOperator::new(true, DirectoryChoice::Merge);

    let outcome = pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed);
    let calls = session.calls_for("A");
    assert_eq!(calls.len(), 4);
    assert!(!calls.iter().any(|c| c.starts_with("rm -rf") || c.starts_with("mkdir")));
    assert_eq!(calls[2], commands::extract_archive(TMP, DIR));
}

#[tokio::test]
async fn abort_stops_before_extraction() {
    let mut h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = node_with_dir(true);
    let operator = ScriptedOperator::new(true, DirectoryChoice::Abort);

    let outcome = pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Declined);
    assert_eq!(
        session.calls_for("A"),
        vec![format!("upload {}", TMP), commands::dir_exists_check(DIR)]
    );
    assert!(h.drain().has_line(LogLevel::Warning, "aborted"));
}

#[tokio::test]
async fn failing_stage_is_named_and_later_stages_skipped() {
    let h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let extract = commands::extract_archive(TMP, DIR);
    let check = commands::dir_exists_check(DIR);
    let session = FakeSession::new(move |_, command| {
        if command == extract {
            Reply::Exit(2)
        } else if command == check {
            Reply::Stdout("not exists".to_string())
        } else {
            Reply::Exit(0)
        }
    });
    let operator = ScriptedOperator::answering(true);

    let err = pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Stage { stage: DeployStage::Extract, .. }));
    assert!(err.to_string().starts_with("extraction failed on A"));
    assert!(!session.calls_for("A").contains(&commands::remove_file(TMP)));
}

#[tokio::test]
async fn upload_failure_reports_upload_stage() {
    let h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = FakeSession::new(|_, command| {
        if command.starts_with("upload") { Reply::Timeout } else { Reply::Exit(0) }
    });
    let operator = ScriptedOperator::answering(true);

    let err = pipeline(&h, &session, &operator)
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Stage { stage: DeployStage::Upload, .. }));
    assert_eq!(session.calls_for("A").len(), 1);
}

#[tokio::test]
async fn declined_or_missing_archive_runs_nothing() {
    let h = Harness::new(&[("A", "10.0.0.1")]);
    let tmp = tempfile::tempdir().unwrap();
    let session = node_with_dir(false);

    let declined = pipeline(&h, &session, &ScriptedOperator::answering(false))
        .deploy("A", &archive(&tmp), DIR)
        .await
        .unwrap();
    assert_eq!(declined, Outcome::Declined);

    let missing = pipeline(&h, &session, &ScriptedOperator::answering(true))
        .deploy("A", &tmp.path().join("absent.tar.gz"), DIR)
        .await
        .unwrap_err();
    assert!(matches!(missing, DeployError::Archive { .. }));
    assert!(session.calls().is_empty());
}
