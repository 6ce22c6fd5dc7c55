//! End-to-end checks across the registry, node.config transfer and the
//! console state/view layer.

mod common;

use std::sync::Arc;

use blmctl::app::ConsoleState;
use blmctl::commands::{self, NODE_CONFIG_PATH, NODE_TABLE_PATH};
use blmctl::executor::CommandError;
use blmctl::model::{LogLevel, NodeIdentity, ServiceParameters, ServiceStatus};
use blmctl::node_config::{self, ConfigEntry};
use blmctl::node_table;
use blmctl::registry::{self, NodeRegistry};
use blmctl::ssh::RemoteSession;
use blmctl::ui::{self, Prompt, PromptReply};
use blmctl::view::{safe_truncate, truncate_str, wrap_lines, Presenter};
use tokio_util::sync::CancellationToken;

use common::{FakeSession, Reply};

const TABLE: &str = "#node_name\t#local_ip\t#username\t#password\n\
    BLMER01\t10.1.0.1\t\t\n\
    BLMER02\t10.1.0.2\tops\tsecret\n\
    SPARE\tnone\t\t\n\
    DESK\t127.0.0.1\t\t\n";

#[test]
fn node_table_and_parameter_file_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("NODES.tsv");
    std::fs::write(&table, TABLE).unwrap();
    let params = dir.path().join("BDMap.json");
    std::fs::write(
        &params,
        r#"{"BDBLMER01_X": "a|b|{device_name}=HIAF:BLMER01,{ch00}=LOSS0"}"#,
    )
    .unwrap();

    let registry = NodeRegistry::from_rows(registry::load_node_table(&table).unwrap());
    let names: Vec<String> = registry.list_nodes().into_iter().map(|n| n.name).collect();
    assert_eq!(names, ["BLMER01", "BLMER02", "DESK"]);
    assert_eq!(registry.credentials("BLMER02").username, "ops");
    assert_eq!(registry.credentials("BLMER01").username, "root");

    assert_eq!(registry.import_parameter_file(&params).unwrap(), 1);
    let p = registry.service_parameters("BLMER01");
    assert_eq!(p.device_name, "HIAF:BLMER01");
    assert_eq!(p.channels[0], "LOSS0");
    assert!(commands::start_command(&p).contains("--D:ch00=LOSS0"));
    assert_eq!(registry.service_parameters("BLMER02").device_name, "HIAF:BDBLM00");
}

#[test]
fn missing_node_table_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = registry::load_node_table(&dir.path().join("absent.tsv")).unwrap_err();
    assert!(matches!(err, registry::RegistryError::Io { .. }));
}

#[tokio::test]
async fn node_config_fetch_edit_push() {
    let registry = NodeRegistry::new(vec![NodeIdentity::new("A", "10.0.0.1")]);
    let fake = FakeSession::new(|_, command| {
        if command.starts_with("download") {
            Reply::Stdout("#threshold = 5\nmode = fast\n".to_string())
        } else {
            Reply::Exit(0)
        }
    });
    let session: Arc<dyn RemoteSession> = Arc::clone(&fake) as Arc<dyn RemoteSession>;

    let mut entries = node_config::fetch_node_config(&registry, &session, "A").await.unwrap();
    assert_eq!(entries.len(), 2);
    if let ConfigEntry::Setting { enabled, .. } = &mut entries[0] {
        *enabled = true;
    }
    node_config::push_node_config(&registry, &session, "A", &entries).await.unwrap();

    assert_eq!(
        fake.calls_for("A"),
        vec![format!("download {}", NODE_CONFIG_PATH), format!("upload {}", NODE_CONFIG_PATH)]
    );
    let uploaded = String::from_utf8(fake.uploads()[0].2.clone()).unwrap();
    assert_eq!(uploaded, "threshold = 5\nmode = fast\n");
}

#[tokio::test]
async fn node_table_fetch_edit_push() {
    let registry = NodeRegistry::new(vec![NodeIdentity::new("A", "10.0.0.1")]);
    let remote = "#node_name\t#local_ip\t#rack\nBLMER01\t10.1.0.1\tR3\n\t\t\nBLMER02\tnone\tR4\n";
    let fake = FakeSession::new(move |_, command| {
        if command.starts_with("download") {
            Reply::Stdout(remote.to_string())
        } else {
            Reply::Exit(0)
        }
    });
    let session: Arc<dyn RemoteSession> = Arc::clone(&fake) as Arc<dyn RemoteSession>;

    let mut table = node_table::fetch_node_table(&registry, &session, "A").await.unwrap();
    assert_eq!(table.headers, ["node_name", "local_ip", "rack"]);
    assert_eq!(table.rows.len(), 2);
    table.rows[1][1] = "10.1.0.2".to_string();
    assert_eq!(table.node_rows().unwrap().len(), 2);
    node_table::push_node_table(&registry, &session, "A", &table).await.unwrap();

    assert_eq!(
        fake.calls_for("A"),
        vec![format!("download {}", NODE_TABLE_PATH), format!("upload {}", NODE_TABLE_PATH)]
    );
    let uploaded = String::from_utf8(fake.uploads()[0].2.clone()).unwrap();
    assert_eq!(uploaded, "#node_name\t#local_ip\t#rack\nBLMER01\t10.1.0.1\tR3\nBLMER02\t10.1.0.2\tR4\n");
}

#[tokio::test]
async fn node_config_refuses_localhost() {
    let registry = NodeRegistry::new(vec![NodeIdentity::new("DESK", "127.0.0.1")]);
    let fake = FakeSession::healthy();
    let session: Arc<dyn RemoteSession> = Arc::clone(&fake) as Arc<dyn RemoteSession>;
    let err = node_config::fetch_node_config(&registry, &session, "DESK").await.unwrap_err();
    assert!(matches!(err, CommandError::Localhost(_)));
    assert!(fake.calls().is_empty());
}

#[test]
fn console_state_follows_marshaled_events() {
    let token = CancellationToken::new();
    let (handle, mut rx) = ui::channel(token.clone());
    let mut console = ConsoleState::new(vec![
        NodeIdentity::new("A", "10.0.0.1"),
        NodeIdentity::new("B", "10.0.0.2"),
    ]);

    handle.set_status("A", ServiceStatus::Running);
    handle.set_status("B", ServiceStatus::Error);
    handle.warn("B (10.0.0.2): connection timed out");
    handle.progress("A", "Uploading library", 40);
    assert_eq!(rx.drain(&mut console, usize::MAX), 4);

    assert_eq!(console.statuses.get("A"), ServiceStatus::Running);
    assert_eq!(console.log.lines.back().map(|l| l.level), Some(LogLevel::Warning));
    assert_eq!(console.progress.as_ref().map(|p| p.percent), Some(40));
    assert_eq!(
        console.summary(),
        vec![(ServiceStatus::Running, 1), (ServiceStatus::Error, 1)]
    );

    token.cancel();
    handle.set_status("A", ServiceStatus::Stopped);
    rx.drain(&mut console, usize::MAX);
    assert_eq!(console.statuses.get("A"), ServiceStatus::Running);
}

#[test]
fn node_table_renders_each_status() {
    let mut console = ConsoleState::new(vec![
        NodeIdentity::new("BLMER01", "10.1.0.1"),
        NodeIdentity::new("DESK", "127.0.0.1"),
    ]);
    console.statuses.set("BLMER01", ServiceStatus::Standalone);
    console.statuses.set("DESK", ServiceStatus::Localhost);

    let mut out = Vec::new();
    Presenter::render_nodes(&mut out, &console, 10).unwrap();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("BLMER01"));
    assert!(text.contains(&ServiceStatus::Standalone.to_string()));
    assert!(text.contains(&ServiceStatus::Localhost.to_string()));

    let mut header = Vec::new();
    Presenter::render_header(&mut header, &console).unwrap();
    assert!(String::from_utf8_lossy(&header).contains("2 nodes"));
}

#[test]
fn start_prompt_shows_the_whole_command() {
    let launch = commands::start_command(&ServiceParameters::default());
    assert!(launch.chars().count() > 200);
    let (tx, _rx) = tokio::sync::oneshot::channel();
    let prompt = Prompt {
        title: "Start Service".to_string(),
        body: format!("Start the service on BLMER01 with:\n  {}", launch),
        reply: PromptReply::Confirm(tx),
    };

    let mut out = Vec::new();
    Presenter::render_confirmation(&mut out, &prompt, 80, 24).unwrap();
    let text = String::from_utf8_lossy(&out);
    let rows = wrap_lines(&prompt.body, 78);
    assert!(rows.len() > 3);
    for row in &rows {
        assert!(text.contains(row.as_str()), "missing row {:?}", row);
    }
    let tail: String = launch.chars().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect();
    assert!(rows.last().unwrap().ends_with(&tail));
}

#[test]
fn view_helpers_pure() {
    assert_eq!(truncate_str("BLMER01", 7), "BLMER01");
    assert_eq!(truncate_str("HIAF:BLMER01:CH00", 8), "HIAF:...");
    assert_eq!(safe_truncate("café", 10), "café");
}
