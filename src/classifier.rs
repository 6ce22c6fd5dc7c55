//! Maps raw probe outcomes onto the service-status vocabulary.

use std::time::Duration;

use crate::commands::{SESSION_PROBE, STANDALONE_PROBE};
use crate::model::{ServiceStatus, Target};
use crate::ssh::{CommandOutput, FailureKind, RemoteSession, SessionError};

/// What the Timeout Tracker should do with a probe result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerEffect {
    RecordSuccess,
    RecordTimeout,
    Unchanged,
}

#[derive(Clone, Debug)]
pub struct Classification {
    pub status: ServiceStatus,
    pub tracker: TrackerEffect,
    pub error: Option<SessionError>,
}

/// Classify the session probe and, when it was run, the standalone probe.
///
/// Only timeouts count against the skip policy; authentication failures are
/// configuration problems and leave the tracker untouched.
pub fn classify(
    session: &Result<CommandOutput, SessionError>,
    standalone: Option<&Result<CommandOutput, SessionError>>,
) -> Classification {
    let failure = |e: &SessionError| Classification {
        status: ServiceStatus::Error,
        tracker: if e.kind() == FailureKind::Timeout {
            TrackerEffect::RecordTimeout
        } else {
            TrackerEffect::Unchanged
        },
        error: Some(e.clone()),
    };
    let reached = |status| Classification {
        status,
        tracker: TrackerEffect::RecordSuccess,
        error: None,
    };

    match session {
        Err(e) => failure(e),
        Ok(out) if out.success() => reached(ServiceStatus::Running),
        Ok(_) => match standalone {
            Some(Err(e)) => failure(e),
            Some(Ok(out)) if out.success() => reached(ServiceStatus::Standalone),
            _ => reached(ServiceStatus::Stopped),
        },
    }
}

/// Issue the status probes against one node. The standalone probe only runs
/// when the session probe completed without finding the session.
pub async fn probe(session: &dyn RemoteSession, target: &Target, timeout: Duration) -> Classification {
    let first = session.execute(target, SESSION_PROBE, Some(timeout)).await;
    let second = match &first {
        Ok(out) if !out.success() => Some(session.execute(target, STANDALONE_PROBE, Some(timeout)).await),
        _ => None,
    };
    classify(&first, second.as_ref())
}
