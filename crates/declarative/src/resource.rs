//! Capability trait implemented by every resource type
//!
//! A resource type knows how to find its remote record and how to build the
//! create, update and delete calls for it. The lifecycle driver in
//! [`crate::executor`] decides which of them to issue.

use crate::api::Operation;
use crate::context::RunContext;
use crate::error::Result;
use crate::params::Params;
use crate::report::FieldMapping;
use crate::types::{ResourceDescriptor, State};

/// How an existing resource is brought up to date
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// One update call; only `mutable_keys` of its arguments are compared
    InPlace {
        operation: Operation,
        mutable_keys: &'static [&'static str],
    },
    /// Delete the old resource and create a new one when `desired` differs
    Replace {
        desired: Params,
        delete: Operation,
        create: Operation,
    },
}

/// A manageable cloud resource type.
///
/// # Example
///
/// ```
/// use declarative::{Operation, Params, ResourceDescriptor, ResourceType, Result, RunContext};
///
/// struct Network {
///     name: String,
/// }
///
/// impl ResourceType for Network {
///     fn kind(&self) -> &'static str {
///         "network"
///     }
///
///     fn name(&self) -> String {
///         self.name.clone()
///     }
///
///     fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>> {
///         let params = ctx.scoped_params(true)?;
///         let networks = ctx.client().list_records("listNetworks", &params, "network")?;
///         Ok(networks
///             .into_iter()
///             .find(|n| n.get_str("name").as_deref() == Some(self.name.as_str())))
///     }
///
///     fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation> {
///         let params = ctx.scoped_params(true)?.with("name", &self.name);
///         Ok(Operation::new("createNetwork", params).returning("network"))
///     }
///
///     fn build_delete(
///         &self,
///         _ctx: &mut RunContext<'_>,
///         existing: &ResourceDescriptor,
///     ) -> Result<Operation> {
///         Ok(Operation::new("deleteNetwork", Params::new().with("id", existing.id())))
///     }
/// }
/// ```
pub trait ResourceType {
    /// Type name used in input files and logs
    fn kind(&self) -> &'static str;

    /// Human-readable identity of this resource
    fn name(&self) -> String;

    /// Resource type used by the tag API; `None` if the type is not taggable
    fn tag_resource_type(&self) -> Option<&'static str> {
        None
    }

    /// Type-specific output fields
    fn returns(&self) -> &'static [FieldMapping] {
        &[]
    }

    /// Reject input combinations that cannot work for `state`
    fn validate(&self, _state: State) -> Result<()> {
        Ok(())
    }

    /// Look up the existing resource by its discriminating key
    fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>>;

    /// Build the create call
    fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation>;

    /// Build the update for an existing resource; `None` if the type has none
    fn build_update(
        &self,
        _ctx: &mut RunContext<'_>,
        _existing: &ResourceDescriptor,
    ) -> Result<Option<Update>> {
        Ok(None)
    }

    /// Build the delete call; may refuse with a state conflict
    fn build_delete(
        &self,
        ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Operation>;

    /// Extra convergence after create/update and tags. Returns whether it changed anything.
    fn post_convergence(
        &self,
        _ctx: &mut RunContext<'_>,
        _resource: &mut ResourceDescriptor,
    ) -> Result<bool> {
        Ok(false)
    }
}
