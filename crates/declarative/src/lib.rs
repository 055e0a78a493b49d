//! # Declarative
//!
//! Declarative reconciliation of cloud resources.
//!
//! Given the desired configuration of one resource, a run resolves where the
//! resource lives (domain, account, project, zone), fetches its current
//! remote state, issues the minimal create/update/delete calls to converge
//! it, waits for asynchronous jobs, and reconciles the resource's tags and
//! group members.
//!
//! ## Core Concepts
//!
//! - **RunContext**: Per-run state holding the client, options and every memoized lookup
//! - **ResourceType**: Capability set of one resource type (lookup, create, update, delete)
//! - **Action**: What the driver decided to do; planning is separate from executing
//! - **RunReport**: The flat output record with the `changed` flag
//!
//! ## Example
//!
//! ```
//! use declarative::mock::MockTransport;
//! use declarative::{CloudClient, RunContext, RunOptions, ScopeKind, ScopeRequest};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.respond("listZones", json!({"zone": [{"id": "z1", "name": "ch-gva-2"}]}));
//! let client = CloudClient::with_transport(Box::new(mock.clone()));
//!
//! let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());
//! let zone = ctx.resolve(ScopeKind::Zone)?.unwrap();
//! assert_eq!(zone.name, "ch-gva-2");
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Transport
//!
//! The crate never talks HTTP itself. Everything goes through the
//! [`Transport`] trait, so a signed HTTP client and the in-memory
//! [`mock::MockTransport`] are interchangeable.

pub mod api;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod job;
pub mod membership;
pub mod mock;
pub mod params;
pub mod reconcile;
pub mod report;
pub mod resource;
pub mod scope;
pub mod tags;
pub mod types;

// Re-export main types at crate root
pub use api::{CloudClient, JobState, JobStatus, Operation, Submission, Transport};
pub use context::{RunContext, ScopeRequest};
pub use diff::has_changed;
pub use error::{Error, ErrorCategory, Result};
pub use executor::{Action, converge, execute, plan};
pub use job::{await_job, await_submission, extract};
pub use params::{DesiredState, FieldValue, Params};
pub use reconcile::{SetDiff, reconcile};
pub use report::{COMMON_RETURNS, Coerce, FieldMapping, RunReport};
pub use resource::{ResourceType, Update};
pub use types::{
    DEFAULT_POLL_INTERVAL, ResourceDescriptor, RunOptions, ScopeKind, ScopeReference, State, Tag,
};
