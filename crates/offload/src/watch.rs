// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle watcher.
//!
//! Drives one transcode job from submission to a terminal state using a
//! single-object watch plus one point-in-time fetch to close the race
//! where the job finished before the watch was established.
//!
//! Reconnection is deliberately not attempted here: if the watch stream
//! closes without a terminal event that is surfaced as an error and the
//! caller decides whether to retry the whole wait.

use futures_util::{Stream, StreamExt};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, WatchParams};
use kube::core::WatchEvent;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Observed state of a transcode job. Produced only from orchestrator
/// events, never constructed from local assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Deleted,
    /// Status shapes this version does not recognize. Explicitly
    /// non-terminal so new upstream states fail closed.
    Unknown,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed | JobPhase::Deleted)
    }
}

/// Total mapping from an observed job object to a phase.
pub fn job_phase(job: &Job) -> JobPhase {
    let Some(status) = &job.status else {
        return JobPhase::Unknown;
    };
    if status.failed.unwrap_or(0) > 0 {
        JobPhase::Failed
    } else if status.succeeded.unwrap_or(0) > 0 {
        JobPhase::Succeeded
    } else if status.active.unwrap_or(0) > 0 {
        JobPhase::Running
    } else {
        JobPhase::Pending
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("failed to watch job {name:?}: {source}")]
    Watch {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("unable to fetch job {name:?} for the initial check: {source}")]
    Lookup {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("job {name:?} failed: {reason}")]
    JobFailed { name: String, reason: String },

    #[error("job {name:?} deleted unexpectedly while waiting for completion")]
    DeletedEarly { name: String },

    #[error("watch stream for job {name:?} closed before a terminal state was observed")]
    StreamClosed { name: String },

    #[error("wait terminated by signal or supervisor cancellation")]
    Cancelled,
}

/// Block until the named job reaches a terminal state or `cancel` fires.
pub async fn wait_for_completion(
    cancel: &CancellationToken,
    jobs: &Api<Job>,
    name: &str,
) -> Result<(), WaitError> {
    // Single-object watch; a broad list-watch would deliver every job in
    // the namespace.
    let wp = WatchParams::default().fields(&format!("metadata.name={name}"));
    let stream = jobs
        .watch(&wp, "0")
        .await
        .map_err(|source| WaitError::Watch { name: name.to_string(), source })?
        .boxed();

    // The job may already have finished before the watch existed.
    let job = jobs
        .get(name)
        .await
        .map_err(|source| WaitError::Lookup { name: name.to_string(), source })?;
    if let Some(result) = terminal_result(&job, name) {
        return result;
    }

    watch_events(cancel, stream, name).await
}

/// `Some` once the job has terminally succeeded or failed.
fn terminal_result(job: &Job, name: &str) -> Option<Result<(), WaitError>> {
    match job_phase(job) {
        JobPhase::Succeeded => Some(Ok(())),
        JobPhase::Failed => Some(Err(WaitError::JobFailed {
            name: name.to_string(),
            reason: failure_reason(job).unwrap_or_else(|| "job reported failure".to_string()),
        })),
        _ => None,
    }
}

/// The job's own reported failure reason, verbatim, for operator
/// correlation with orchestrator-side diagnostics.
fn failure_reason(job: &Job) -> Option<String> {
    let conditions = job.status.as_ref()?.conditions.as_ref()?;
    let failed = conditions.iter().find(|c| c.type_ == "Failed" && c.status == "True")?;
    match (&failed.reason, &failed.message) {
        (Some(reason), Some(message)) => Some(format!("{reason}: {message}")),
        (Some(reason), None) => Some(reason.clone()),
        (None, Some(message)) => Some(message.clone()),
        (None, None) => None,
    }
}

/// Consume watch events until a terminal observation, stream failure, or
/// cancellation. Observations are evaluated strictly in delivery order;
/// only the first terminal one matters.
async fn watch_events<S>(
    cancel: &CancellationToken,
    mut stream: S,
    name: &str,
) -> Result<(), WaitError>
where
    S: Stream<Item = Result<WatchEvent<Job>, kube::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            event = stream.next() => match event {
                // Initial-sync echo of the object; the direct fetch above
                // already covered it.
                Some(Ok(WatchEvent::Added(_))) => trace!(job = name, "watch sync event"),
                Some(Ok(WatchEvent::Modified(job))) => {
                    debug!(job = name, "received a job update");
                    if let Some(result) = terminal_result(&job, name) {
                        return result;
                    }
                }
                Some(Ok(WatchEvent::Deleted(_))) => {
                    return Err(WaitError::DeletedEarly { name: name.to_string() });
                }
                Some(Ok(WatchEvent::Bookmark(_))) => {}
                Some(Ok(WatchEvent::Error(e))) => {
                    return Err(WaitError::Watch {
                        name: name.to_string(),
                        source: kube::Error::Api(e),
                    });
                }
                Some(Err(source)) => {
                    return Err(WaitError::Watch { name: name.to_string(), source });
                }
                None => return Err(WaitError::StreamClosed { name: name.to_string() }),
            },
        }
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
