use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Registry};

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Compact,
}

/// Log to a file; the terminal belongs to the console.
///
/// `to_stderr` is used by the one-shot subcommands instead of a file.
pub fn init(verbose: bool, to_stderr: bool) {
    let filter = build_filter(verbose);
    let registry = Registry::default().with(filter);

    if to_stderr {
        let layer = tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr);
        registry.with(layer).init();
        return;
    }

    let Some((writer, guard)) = build_file_writer() else {
        registry.init();
        return;
    };
    let _ = FILE_GUARD.set(guard);
    match parse_format() {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().json().with_ansi(false).with_writer(writer);
            registry.with(layer).init();
        }
        LogFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer().compact().with_ansi(false).with_writer(writer);
            registry.with(layer).init();
        }
    }
}

fn build_filter(verbose: bool) -> EnvFilter {
    match env::var("BLMCTL_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }
    }
}

fn parse_format() -> LogFormat {
    match env::var("BLMCTL_LOG_FORMAT")
        .ok()
        .as_deref()
        .map(str::trim)
        .map(|value| value.to_ascii_lowercase())
    {
        Some(value) if value == "json" => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

fn log_file_path() -> PathBuf {
    env::var("BLMCTL_LOG_FILE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let stamp = chrono::Local::now().format("%Y.%m.%d-%H.%M.%S");
            PathBuf::from("Logs").join(format!("blmctl-{}.log", stamp))
        })
}

fn build_file_writer() -> Option<(NonBlocking, WorkerGuard)> {
    let path = log_file_path();
    let file_name = path.file_name()?.to_string_lossy().to_string();
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
