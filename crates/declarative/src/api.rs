//! Remote API client
//!
//! The [`Transport`] trait is the only seam to the cloud: it sends one
//! command and returns the unwrapped response object. [`CloudClient`] layers
//! error-text detection and typed decoding on top of it.

use crate::error::{Error, Result};
use crate::params::Params;
use crate::types::{ResourceDescriptor, value_as_text};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Transport for API commands.
///
/// Implementations authenticate, send the request and strip the
/// `<command>response` envelope. They must not interpret `errortext`;
/// that is the client's job.
pub trait Transport: Send + Sync {
    /// Send one command with its arguments
    fn request(&self, command: &str, params: &Params) -> Result<Value>;
}

/// A mutating call ready to dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// API command name
    pub command: &'static str,
    /// Validated arguments
    pub params: Params,
    /// Key of the resource record inside the (job) result
    pub result_key: Option<&'static str>,
}

impl Operation {
    pub fn new(command: &'static str, params: Params) -> Self {
        Self {
            command,
            params,
            result_key: None,
        }
    }

    /// Extract the resource record from this key of the result
    pub fn returning(mut self, key: &'static str) -> Self {
        self.result_key = Some(key);
        self
    }
}

/// What a mutating call answered with
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Accepted as an asynchronous job
    Job { job_id: String },
    /// Completed synchronously with this result
    Completed(Value),
}

impl Submission {
    /// Classify a raw response
    pub fn from_response(response: Value) -> Self {
        match response.get("jobid").and_then(value_as_text) {
            Some(job_id) => Self::Job { job_id },
            None => Self::Completed(response),
        }
    }
}

/// Status of an async job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Done,
}

/// Response of `queryAsyncJobResult`
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    #[serde(rename = "jobstatus", default)]
    pub status: i64,
    /// `Some(Value::Null)` when the field is sent as `null`, `None` when absent
    #[serde(rename = "jobresult", default, deserialize_with = "present")]
    pub result: Option<Value>,
}

fn present<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl JobStatus {
    /// A job is done once it reports a non-zero status together with a
    /// `jobresult` field, even a null one
    pub fn state(&self) -> JobState {
        if self.status != 0 && self.result.is_some() {
            JobState::Done
        } else {
            JobState::Pending
        }
    }

    /// Error text carried by a finished job
    pub fn error_text(&self) -> Option<String> {
        self.result
            .as_ref()
            .and_then(|r| r.get("errortext"))
            .and_then(value_as_text)
    }
}

/// Client shared by every component of a run
pub struct CloudClient {
    transport: Box<dyn Transport>,
}

impl CloudClient {
    /// Create a client over a transport
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a command; an `errortext` in the response becomes an error
    pub fn call(&self, command: &str, params: &Params) -> Result<Value> {
        debug!("api: {} {:?}", command, params.encode());
        let response = self.transport.request(command, params)?;
        if let Some(text) = response.get("errortext").and_then(value_as_text) {
            return Err(Error::RemoteOperation(text));
        }
        Ok(response)
    }

    /// Send a list command and decode the entries under `key`
    ///
    /// An empty listing omits the key entirely; that decodes as no entries.
    pub fn list<T: DeserializeOwned>(
        &self,
        command: &str,
        params: &Params,
        key: &str,
    ) -> Result<Vec<T>> {
        let response = self.call(command, params)?;
        match response.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(entries) => serde_json::from_value(entries.clone())
                .map_err(|e| Error::InvalidResponse(format!("{command}: {e}"))),
        }
    }

    /// Send a list command and return the entries as opaque records
    pub fn list_records(
        &self,
        command: &str,
        params: &Params,
        key: &str,
    ) -> Result<Vec<ResourceDescriptor>> {
        self.list::<Value>(command, params, key)?
            .into_iter()
            .map(ResourceDescriptor::from_value)
            .collect()
    }

    /// Dispatch a mutating operation
    pub fn submit(&self, operation: &Operation) -> Result<Submission> {
        let response = self.call(operation.command, &operation.params)?;
        Ok(Submission::from_response(response))
    }

    /// Query the status of an async job
    pub fn query_job(&self, job_id: &str) -> Result<JobStatus> {
        let response = self.call(
            "queryAsyncJobResult",
            &Params::new().with("jobid", job_id),
        )?;
        serde_json::from_value(response)
            .map_err(|e| Error::InvalidResponse(format!("queryAsyncJobResult: {e}")))
    }
}
