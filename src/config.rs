//! Command-line configuration and the resolved settings handed to the core.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::tracker::{SkipPolicy, MAX_CONSECUTIVE_TIMEOUTS, TIMEOUT_RETRY_INTERVAL};

pub const DEFAULT_DEPLOY_TARGET: &str = "/opt/LACCS#";

/// Timing and pool sizing shared by the poller, executor and batch coordinator.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub ssh_port: u16,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    pub poll_workers: usize,
    pub stop_workers: usize,
    pub update_workers: usize,
    pub skip_policy: SkipPolicy,
    /// Pause between stopping and (re)starting the service.
    pub stop_settle: Duration,
    /// Delay before a command's terminal status is shown.
    pub status_settle: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ssh_port: 22,
            poll_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(15),
            poll_workers: 5,
            stop_workers: 10,
            update_workers: 20,
            skip_policy: SkipPolicy::default(),
            stop_settle: Duration::from_secs(1),
            status_settle: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SkipPolicyArg {
    /// Skip a node for the rest of the session after its first timeout.
    Permanent,
    /// Retry a node once the retry interval has passed.
    Retry,
}

#[derive(Parser, Debug)]
#[command(name = "blmctl", version, about = "Beam-loss monitor fleet console")]
pub struct Cli {
    /// Node table (tab-separated, `#`-prefixed header with node_name and local_ip).
    #[arg(long, env = "BLMCTL_NODES", default_value = "FileDB/NODES.tsv")]
    pub nodes: PathBuf,

    /// Service-parameter map (BDMap.json) applied at startup.
    #[arg(long, env = "BLMCTL_PARAMS")]
    pub params: Option<PathBuf>,

    /// Shared library offered by the update actions.
    #[arg(long, env = "BLMCTL_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Archive offered by the deploy action.
    #[arg(long, env = "BLMCTL_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Remote directory the archive is extracted into.
    #[arg(long, env = "BLMCTL_DEPLOY_TARGET", default_value = DEFAULT_DEPLOY_TARGET)]
    pub deploy_target: String,

    #[arg(long, env = "BLMCTL_PORT", default_value_t = 22)]
    pub port: u16,

    /// Seconds between status sweeps.
    #[arg(long, env = "BLMCTL_POLL_INTERVAL", default_value_t = 30)]
    pub poll_interval: u64,

    /// Seconds allowed for a status probe to connect and answer.
    #[arg(long, env = "BLMCTL_PROBE_TIMEOUT", default_value_t = 5)]
    pub probe_timeout: u64,

    #[arg(long, env = "BLMCTL_POLL_WORKERS", default_value_t = 5)]
    pub poll_workers: usize,

    #[arg(long, env = "BLMCTL_STOP_WORKERS", default_value_t = 10)]
    pub stop_workers: usize,

    #[arg(long, env = "BLMCTL_UPDATE_WORKERS", default_value_t = 20)]
    pub update_workers: usize,

    #[arg(long, env = "BLMCTL_SKIP_POLICY", value_enum, default_value_t = SkipPolicyArg::Retry)]
    pub skip_policy: SkipPolicyArg,

    #[arg(long, env = "BLMCTL_MAX_CONSECUTIVE_TIMEOUTS", default_value_t = MAX_CONSECUTIVE_TIMEOUTS)]
    pub max_consecutive_timeouts: u32,

    /// Seconds before a skipped node is probed again.
    #[arg(long, env = "BLMCTL_TIMEOUT_RETRY_INTERVAL", default_value_t = TIMEOUT_RETRY_INTERVAL.as_secs())]
    pub timeout_retry_interval: u64,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one status sweep and print the table.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Download a node's node.config.
    FetchConfig {
        node: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a local file as a node's node.config.
    PushConfig { node: String, file: PathBuf },
    /// Download the NODES.tsv table kept on a node.
    FetchTable {
        node: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Upload a local file as a node's NODES.tsv after checking it parses.
    PushTable { node: String, file: PathBuf },
}

impl Cli {
    pub fn settings(&self) -> Settings {
        let skip_policy = match self.skip_policy {
            SkipPolicyArg::Permanent => SkipPolicy::Permanent,
            SkipPolicyArg::Retry => SkipPolicy::RetryAfterInterval {
                max_consecutive: self.max_consecutive_timeouts.max(1),
                retry_interval: Duration::from_secs(self.timeout_retry_interval),
            },
        };
        Settings {
            ssh_port: self.port,
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            probe_timeout: Duration::from_secs(self.probe_timeout.max(1)),
            poll_workers: self.poll_workers.max(1),
            stop_workers: self.stop_workers.max(1),
            update_workers: self.update_workers.max(1),
            skip_policy,
            ..Settings::default()
        }
    }
}
