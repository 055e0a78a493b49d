//! Async job polling
//!
//! Mutating calls may answer with a job id instead of a result. The poller
//! blocks the calling thread, querying the job every `poll_interval` until it
//! reaches a terminal status. There is no upper bound on the number of polls;
//! bound the run externally if that matters.

use crate::api::{CloudClient, JobState, Submission};
use crate::error::{Error, Result};
use log::debug;
use serde_json::Value;
use std::thread;
use std::time::Duration;

/// Resolve a submission to its final result.
///
/// A synchronous result is returned unchanged; a job is polled until done.
pub fn await_submission(
    client: &CloudClient,
    submission: Submission,
    poll_interval: Duration,
) -> Result<Value> {
    match submission {
        Submission::Completed(result) => Ok(result),
        Submission::Job { job_id } => await_job(client, &job_id, poll_interval),
    }
}

/// Poll a job until it finishes; a job error is returned immediately
pub fn await_job(client: &CloudClient, job_id: &str, poll_interval: Duration) -> Result<Value> {
    let mut polls = 0_u32;
    loop {
        let status = client.query_job(job_id)?;
        polls += 1;

        if status.state() == JobState::Done {
            if let Some(text) = status.error_text() {
                return Err(Error::RemoteOperation(text));
            }
            debug!("job {job_id}: done after {polls} poll(s)");
            return Ok(status.result.unwrap_or(Value::Null));
        }

        debug!("job {job_id}: pending (poll {polls})");
        if !poll_interval.is_zero() {
            thread::sleep(poll_interval);
        }
    }
}

/// Pick the named sub-object out of a result.
///
/// List-shaped results (`{"count": 1, "template": [...]}`) yield their first
/// entry. Without a key the whole result is returned.
pub fn extract(result: Value, key: Option<&str>) -> Result<Value> {
    let Some(key) = key else {
        return Ok(result);
    };
    match result.get(key) {
        Some(Value::Array(items)) => items
            .first()
            .cloned()
            .ok_or_else(|| Error::InvalidResponse(format!("empty '{key}' in result"))),
        Some(value) => Ok(value.clone()),
        None => Err(Error::InvalidResponse(format!("missing '{key}' in result"))),
    }
}
