use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use blmctl::app::{self, ConsoleConfig};
use blmctl::config::{Cli, Command, Settings};
use blmctl::model::{LogLine, ServiceStatus, StatusTable};
use blmctl::node_config;
use blmctl::node_table::{self, NodeTable};
use blmctl::poller::StatusPoller;
use blmctl::registry::{self, NodeRegistry};
use blmctl::ssh::{RemoteSession, SshSession};
use blmctl::tracker::TimeoutTracker;
use blmctl::ui::{self, UiSink};
use blmctl::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.command.is_some());

    let rt = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(4)
            .build()
            .expect("Failed to create tokio runtime"),
    );

    match run(&cli, rt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("blmctl: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, rt: Arc<tokio::runtime::Runtime>) -> Result<(), Box<dyn std::error::Error>> {
    let settings = cli.settings();
    let registry = load_registry(cli)?;
    let session: Arc<dyn RemoteSession> = Arc::new(SshSession::new(settings.ssh_port, settings.connect_timeout));

    match &cli.command {
        None => {
            let should_quit = Arc::new(AtomicBool::new(false));
            signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&should_quit))?;
            signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&should_quit))?;

            let config = ConsoleConfig {
                registry,
                session,
                settings,
                library: cli.library.clone(),
                archive: cli.archive.clone(),
                deploy_target: cli.deploy_target.clone(),
            };
            if let Err(e) = app::run(should_quit, rt, config) {
                app::restore_terminal();
                return Err(e.into());
            }
            Ok(())
        }
        Some(Command::Status { json }) => rt.block_on(print_status(registry, session, settings, *json)),
        Some(Command::FetchConfig { node, output }) => {
            let entries = rt.block_on(node_config::fetch_node_config(&registry, &session, node))?;
            let text = node_config::render(&entries);
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => io::stdout().write_all(text.as_bytes())?,
            }
            Ok(())
        }
        Some(Command::PushConfig { node, file }) => {
            let text = std::fs::read_to_string(file)?;
            let entries = node_config::parse(&text);
            rt.block_on(node_config::push_node_config(&registry, &session, node, &entries))?;
            println!("pushed {} entries to {}", entries.len(), node);
            Ok(())
        }
        Some(Command::FetchTable { node, output }) => {
            let table = rt.block_on(node_table::fetch_node_table(&registry, &session, node))?;
            let text = table.render();
            match output {
                Some(path) => std::fs::write(path, text)?,
                None => io::stdout().write_all(text.as_bytes())?,
            }
            Ok(())
        }
        Some(Command::PushTable { node, file }) => {
            let table = NodeTable::parse(&std::fs::read_to_string(file)?);
            let nodes = table.node_rows()?.len();
            rt.block_on(node_table::push_node_table(&registry, &session, node, &table))?;
            println!("pushed {} rows ({} reachable nodes) to {}", table.rows.len(), nodes, node);
            Ok(())
        }
    }
}

fn load_registry(cli: &Cli) -> Result<NodeRegistry, registry::RegistryError> {
    let registry = NodeRegistry::from_rows(registry::load_node_table(&cli.nodes)?);
    if let Some(params) = &cli.params {
        registry.import_parameter_file(params)?;
    }
    Ok(registry)
}

/// Collects sweep results for the one-shot status command. Log lines already
/// reach stderr through tracing.
#[derive(Default)]
struct Collector {
    statuses: StatusTable,
}

impl UiSink for Collector {
    fn on_status_changed(&mut self, node: &str, status: ServiceStatus) {
        self.statuses.set(node, status);
    }

    fn append_log_line(&mut self, _line: LogLine) {}
}

#[derive(Serialize)]
struct StatusRow<'a> {
    node: &'a str,
    address: &'a str,
    status: ServiceStatus,
}

async fn print_status(
    registry: NodeRegistry,
    session: Arc<dyn RemoteSession>,
    settings: Settings,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = CancellationToken::new();
    let (handle, mut rx) = ui::channel(token);
    let tracker = Arc::new(TimeoutTracker::new(settings.skip_policy));
    let poller = StatusPoller::new(registry.clone(), session, tracker, handle, settings);
    poller.sweep().await;

    let mut collector = Collector::default();
    while rx.drain(&mut collector, usize::MAX) > 0 {}

    let nodes = registry.list_nodes();
    let rows: Vec<StatusRow<'_>> = nodes
        .iter()
        .map(|n| StatusRow {
            node: &n.name,
            address: &n.address,
            status: collector.statuses.get(&n.name),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{:<24} {:<16} {}", "NODE", "ADDRESS", "STATUS");
        for row in &rows {
            println!("{:<24} {:<16} {}", row.node, row.address, row.status);
        }
    }
    Ok(())
}
