//! Per-run context
//!
//! A [`RunContext`] owns every memoized lookup of exactly one reconciliation
//! run. It is built fresh for each run, passed by `&mut` through every
//! operation and dropped at the end; nothing is cached across runs.

use crate::api::CloudClient;
use crate::types::{RunOptions, ScopeKind, ScopeReference, Tag};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Identifiers requested for each lookup kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScopeRequest {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub vm: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub hypervisor: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl ScopeRequest {
    /// Requested identifier for a kind; empty strings count as not requested
    pub fn requested(&self, kind: ScopeKind) -> Option<&str> {
        let value = match kind {
            ScopeKind::Domain => &self.domain,
            ScopeKind::Account => &self.account,
            ScopeKind::Project => &self.project,
            ScopeKind::Zone => &self.zone,
            ScopeKind::VirtualMachine => &self.vm,
            ScopeKind::OsType => &self.os_type,
            ScopeKind::Hypervisor => &self.hypervisor,
            ScopeKind::IpAddress => &self.ip_address,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// State owned by one reconciliation run
pub struct RunContext<'a> {
    client: &'a CloudClient,
    options: RunOptions,
    request: ScopeRequest,
    scopes: HashMap<ScopeKind, ScopeReference>,
    capabilities: Option<Map<String, Value>>,
    tags: Option<(String, BTreeSet<Tag>)>,
}

impl<'a> RunContext<'a> {
    /// Create a fresh context for one run
    pub fn new(client: &'a CloudClient, request: ScopeRequest, options: RunOptions) -> Self {
        Self {
            client,
            options,
            request,
            scopes: HashMap::new(),
            capabilities: None,
            tags: None,
        }
    }

    /// The API client of this run
    pub fn client(&self) -> &'a CloudClient {
        self.client
    }

    /// Run options
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Whether mutating calls are suppressed
    pub fn dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Requested lookup identifiers
    pub fn request(&self) -> &ScopeRequest {
        &self.request
    }

    pub(crate) fn cached_scope(&self, kind: ScopeKind) -> Option<&ScopeReference> {
        self.scopes.get(&kind)
    }

    pub(crate) fn remember_scope(&mut self, reference: ScopeReference) {
        self.scopes.insert(reference.kind, reference);
    }

    pub(crate) fn cached_capabilities(&self) -> Option<&Map<String, Value>> {
        self.capabilities.as_ref()
    }

    pub(crate) fn remember_capabilities(&mut self, capabilities: Map<String, Value>) {
        self.capabilities = Some(capabilities);
    }

    pub(crate) fn cached_tags(&self, resource_id: &str) -> Option<&BTreeSet<Tag>> {
        match &self.tags {
            Some((id, tags)) if id == resource_id => Some(tags),
            _ => None,
        }
    }

    pub(crate) fn remember_tags(&mut self, resource_id: &str, tags: BTreeSet<Tag>) {
        self.tags = Some((resource_id.to_string(), tags));
    }

    /// Drop the tag cache so the next read goes to the API
    pub fn invalidate_tags(&mut self) {
        self.tags = None;
    }
}
