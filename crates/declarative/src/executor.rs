//! Lifecycle driver - plans and applies one resource toward its target state
//!
//! [`plan`] decides what has to happen and [`execute`] makes it happen.
//! Dry runs only skip the second step, so `changed` is computed the same way
//! in both modes.

use crate::api::{Operation, Submission};
use crate::context::RunContext;
use crate::diff::has_changed;
use crate::error::Result;
use crate::job::{await_submission, extract};
use crate::report::RunReport;
use crate::resource::{ResourceType, Update};
use crate::types::{ResourceDescriptor, State, Tag};
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;

/// What the driver decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Nothing to do; carries the existing resource, if any
    Unchanged(Option<ResourceDescriptor>),
    Create(Operation),
    Update {
        existing: ResourceDescriptor,
        operation: Operation,
    },
    Replace {
        existing: ResourceDescriptor,
        delete: Operation,
        create: Operation,
    },
    Delete {
        existing: ResourceDescriptor,
        operation: Operation,
    },
}

impl Action {
    /// Whether executing this action mutates remote state
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }

    /// The resource the action starts from
    pub fn existing(&self) -> Option<&ResourceDescriptor> {
        match self {
            Self::Unchanged(existing) => existing.as_ref(),
            Self::Create(_) => None,
            Self::Update { existing, .. }
            | Self::Replace { existing, .. }
            | Self::Delete { existing, .. } => Some(existing),
        }
    }

    /// Remote calls this action issues, in order
    pub fn commands(&self) -> Vec<&'static str> {
        match self {
            Self::Unchanged(_) => Vec::new(),
            Self::Create(op) => vec![op.command],
            Self::Update { operation, .. } | Self::Delete { operation, .. } => {
                vec![operation.command]
            }
            Self::Replace { delete, create, .. } => vec![delete.command, create.command],
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Unchanged(_) => "unchanged",
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Replace { .. } => "replace",
            Self::Delete { .. } => "delete",
        };
        write!(f, "{verb}")
    }
}

/// Decide what it takes to bring `resource` to `state`
pub fn plan(ctx: &mut RunContext<'_>, resource: &dyn ResourceType, state: State) -> Result<Action> {
    resource.validate(state)?;
    let existing = resource.fetch_existing(ctx)?;

    let action = match (state, existing) {
        (State::Present, None) => Action::Create(resource.build_create(ctx)?),
        (State::Present, Some(existing)) => match resource.build_update(ctx, &existing)? {
            Some(Update::InPlace {
                operation,
                mutable_keys,
            }) if has_changed(&operation.params, &existing, Some(mutable_keys)) => {
                Action::Update {
                    existing,
                    operation,
                }
            }
            Some(Update::Replace {
                desired,
                delete,
                create,
            }) if has_changed(&desired, &existing, None) => Action::Replace {
                existing,
                delete,
                create,
            },
            _ => Action::Unchanged(Some(existing)),
        },
        (State::Absent, None) => Action::Unchanged(None),
        (State::Absent, Some(existing)) => {
            let operation = resource.build_delete(ctx, &existing)?;
            Action::Delete {
                existing,
                operation,
            }
        }
    };

    debug!("plan: {} {} -> {action}", resource.kind(), resource.name());
    Ok(action)
}

/// Issue the calls of a planned action.
///
/// Returns the resulting resource record; a deleted resource is reported as
/// it was last seen. `None` means there is no record: nothing existed, or an
/// async creation was not awaited.
pub fn execute(
    ctx: &mut RunContext<'_>,
    resource: &dyn ResourceType,
    action: Action,
) -> Result<Option<ResourceDescriptor>> {
    if ctx.dry_run() && action.is_change() {
        warn!(
            "dry run: not applying {action} of {} {}",
            resource.kind(),
            resource.name()
        );
        return Ok(action.existing().cloned());
    }

    match action {
        Action::Unchanged(existing) => Ok(existing),
        Action::Create(operation) => {
            info!("creating {} {}", resource.kind(), resource.name());
            dispatch(ctx, &operation, false)?
                .map(ResourceDescriptor::from_value)
                .transpose()
        }
        Action::Update {
            existing,
            operation,
        } => {
            info!("updating {} {}", resource.kind(), resource.name());
            match dispatch(ctx, &operation, false)? {
                Some(record) => ResourceDescriptor::from_value(record).map(Some),
                None => Ok(Some(existing)),
            }
        }
        Action::Replace {
            existing,
            delete,
            create,
        } => {
            info!(
                "replacing {} {} ({})",
                resource.kind(),
                resource.name(),
                existing.id()
            );
            dispatch(ctx, &delete, true)?;
            dispatch(ctx, &create, false)?
                .map(ResourceDescriptor::from_value)
                .transpose()
        }
        Action::Delete {
            existing,
            operation,
        } => {
            info!(
                "deleting {} {} ({})",
                resource.kind(),
                resource.name(),
                existing.id()
            );
            dispatch(ctx, &operation, false)?;
            Ok(Some(existing))
        }
    }
}

/// Submit one operation and, unless told not to wait, resolve its result
fn dispatch(ctx: &RunContext<'_>, operation: &Operation, force_wait: bool) -> Result<Option<Value>> {
    let client = ctx.client();
    let submission = client.submit(operation)?;
    if let Submission::Job { job_id } = &submission
        && !force_wait
        && !ctx.options().wait_for_async
    {
        info!("{}: submitted job {job_id}, not waiting", operation.command);
        return Ok(None);
    }
    let result = await_submission(client, submission, ctx.options().poll_interval)?;
    extract(result, operation.result_key).map(Some)
}

/// Converge one resource toward `state` and report the outcome.
///
/// Tags are reconciled only when `tags` is given and the resource type and
/// record support them. Any error aborts the run; nothing is rolled back.
pub fn converge(
    ctx: &mut RunContext<'_>,
    resource: &dyn ResourceType,
    state: State,
    tags: Option<&[Tag]>,
) -> Result<RunReport> {
    let action = plan(ctx, resource, state)?;
    let mut changed = action.is_change();

    let Some(mut record) = execute(ctx, resource, action)? else {
        return Ok(RunReport::empty(changed));
    };

    if state == State::Present {
        if let (Some(desired), Some(tag_type)) = (tags, resource.tag_resource_type())
            && record.has_tags_field()
        {
            changed |= ctx.reconcile_tags(&mut record, tag_type, desired)?;
        }
        changed |= resource.post_convergence(ctx, &mut record)?;
    }

    Ok(RunReport::from_resource(changed, &record, resource.returns()))
}
