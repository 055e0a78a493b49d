//! Resource types managed by stratus
//!
//! Each submodule describes one cloud resource type: the fields it accepts
//! in a declaration, how an existing instance is found and which API calls
//! create, update and delete it. The lifecycle itself is driven by
//! [`declarative::converge`].

pub mod ip_address;
pub mod loadbalancer_rule;
pub mod portforward;
pub mod template;

use declarative::{
    Action, CloudClient, Error, Result, ResourceType, RunContext, RunOptions, RunReport,
    ScopeRequest, State, Tag, converge, plan,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Fields shared by every declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Common {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: State,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    /// `None` leaves tags alone; an empty list removes every tag
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default = "default_wait")]
    pub wait_for_async_completion: bool,
}

const fn default_wait() -> bool {
    true
}

impl Common {
    /// Scope lookups shared by every type
    pub fn scope(&self) -> ScopeRequest {
        ScopeRequest {
            domain: self.domain.clone(),
            account: self.account.clone(),
            project: self.project.clone(),
            zone: self.zone.clone(),
            ..Default::default()
        }
    }

    /// The declared name; most types cannot work without one
    pub fn require_name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::config("name is required"))
    }
}

/// One parsed declaration, ready to run
pub struct Declared {
    pub common: Common,
    pub scope: ScopeRequest,
    pub resource: Box<dyn ResourceType>,
}

impl Declared {
    /// Run options derived from the declaration
    pub fn options(&self, dry_run: bool) -> RunOptions {
        RunOptions {
            dry_run,
            wait_for_async: self.common.wait_for_async_completion,
            ..Default::default()
        }
    }

    /// Converge the resource in a fresh run context
    pub fn run(&self, client: &CloudClient, dry_run: bool) -> Result<RunReport> {
        let mut ctx = RunContext::new(client, self.scope.clone(), self.options(dry_run));
        converge(
            &mut ctx,
            self.resource.as_ref(),
            self.common.state,
            self.common.tags.as_deref(),
        )
    }

    /// Only decide what would happen
    pub fn plan(&self, client: &CloudClient) -> Result<Action> {
        let mut ctx = RunContext::new(client, self.scope.clone(), self.options(true));
        plan(&mut ctx, self.resource.as_ref(), self.common.state)
    }
}

/// A supported resource type
pub struct TypeInfo {
    pub name: &'static str,
    pub key: &'static str,
    pub description: &'static str,
}

pub const TYPES: &[TypeInfo] = &[
    TypeInfo {
        name: loadbalancer_rule::KIND,
        key: "name, public_ip, zone",
        description: "Load balancer rule with members",
    },
    TypeInfo {
        name: ip_address::KIND,
        key: "ip_address",
        description: "Public IP address",
    },
    TypeInfo {
        name: template::KIND,
        key: "checksum, else name",
        description: "Template registered from a URL or created from a VM",
    },
    TypeInfo {
        name: portforward::KIND,
        key: "protocol, public_port, ip_address",
        description: "Port forwarding rule",
    },
];

/// Parse a declaration body for the named type
pub fn declare(kind: &str, body: Value) -> Result<Declared> {
    match kind {
        loadbalancer_rule::KIND => loadbalancer_rule::declare(body),
        ip_address::KIND => ip_address::declare(body),
        template::KIND => template::declare(body),
        portforward::KIND => portforward::declare(body),
        other => Err(Error::config(format!(
            "unknown resource type '{other}' (see `stratus types`)"
        ))),
    }
}

fn parse<T: DeserializeOwned>(kind: &str, body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| Error::config(format!("invalid {kind} declaration: {e}")))
}
