//! Scope resolution
//!
//! Resolves the domain → account → project → zone hierarchy plus the
//! auxiliary lookups (virtual machine, OS type, hypervisor, public IP) by name
//! or id. Every kind is looked up at most once per run; later calls are
//! answered from the [`RunContext`] cache.

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::params::Params;
use crate::types::{ScopeKind, ScopeReference, value_as_text};
use log::debug;
use serde_json::{Map, Value};

type Record = Map<String, Value>;

impl RunContext<'_> {
    /// Resolve a lookup kind to its entity.
    ///
    /// Returns `Ok(None)` when the kind was not requested and has no default.
    /// Zone and hypervisor fall back to the first listed entity when no
    /// identifier was given.
    pub fn resolve(&mut self, kind: ScopeKind) -> Result<Option<ScopeReference>> {
        if let Some(cached) = self.cached_scope(kind) {
            debug!("scope: {kind} served from cache");
            return Ok(Some(cached.clone()));
        }

        let requested = self.request().requested(kind).map(str::to_string);
        if requested.is_none() && !kind.defaults_to_first() {
            return Ok(None);
        }
        if kind == ScopeKind::Account && self.request().requested(ScopeKind::Domain).is_none() {
            return Err(Error::config("Account must be specified with Domain"));
        }

        let candidates = self.list_candidates(kind, requested.as_deref())?;
        let reference = select(kind, requested.as_deref(), candidates)?;
        debug!("scope: {kind} resolved to {} ({})", reference.name, reference.id);
        self.remember_scope(reference.clone());
        Ok(Some(reference))
    }

    /// Resolve a kind that the calling resource cannot work without
    pub fn require(&mut self, kind: ScopeKind) -> Result<ScopeReference> {
        self.resolve(kind)?
            .ok_or_else(|| Error::config(format!("{kind} is required")))
    }

    pub fn domain_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::Domain)?.map(|d| d.id))
    }

    pub fn account_name(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::Account)?.map(|a| a.name))
    }

    pub fn project_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::Project)?.map(|p| p.id))
    }

    pub fn zone_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::Zone)?.map(|z| z.id))
    }

    pub fn vm_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::VirtualMachine)?.map(|v| v.id))
    }

    pub fn os_type_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::OsType)?.map(|o| o.id))
    }

    pub fn hypervisor_name(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::Hypervisor)?.map(|h| h.name))
    }

    pub fn ip_address_id(&mut self) -> Result<Option<String>> {
        Ok(self.resolve(ScopeKind::IpAddress)?.map(|ip| ip.id))
    }

    /// `account`, `domainid` and `projectid` filters, plus `zoneid` if asked
    pub fn scoped_params(&mut self, with_zone: bool) -> Result<Params> {
        let mut params = Params::new()
            .with_opt("account", self.account_name()?)
            .with_opt("domainid", self.domain_id()?)
            .with_opt("projectid", self.project_id()?);
        if with_zone {
            params.set_opt("zoneid", self.zone_id()?);
        }
        Ok(params)
    }

    /// Platform capabilities, fetched once per run
    pub fn capabilities(&mut self) -> Result<Map<String, Value>> {
        if let Some(cached) = self.cached_capabilities() {
            return Ok(cached.clone());
        }
        let response = self.client().call("listCapabilities", &Params::new())?;
        let capabilities = match response.get("capability") {
            Some(Value::Object(map)) => map.clone(),
            _ => {
                return Err(Error::InvalidResponse(
                    "listCapabilities: missing capability record".to_string(),
                ));
            }
        };
        self.remember_capabilities(capabilities.clone());
        Ok(capabilities)
    }

    fn list_candidates(&mut self, kind: ScopeKind, requested: Option<&str>) -> Result<Vec<Record>> {
        let client = self.client();
        let (command, key, params) = match kind {
            ScopeKind::Domain => ("listDomains", "domain", Params::new().with("listall", true)),
            ScopeKind::Account => (
                "listAccounts",
                "account",
                Params::new()
                    .with_opt("name", requested)
                    .with_opt("domainid", self.domain_id()?)
                    .with("listall", true),
            ),
            ScopeKind::Project => (
                "listProjects",
                "project",
                Params::new()
                    .with_opt("account", self.account_name()?)
                    .with_opt("domainid", self.domain_id()?),
            ),
            ScopeKind::Zone => ("listZones", "zone", Params::new()),
            ScopeKind::VirtualMachine => (
                "listVirtualMachines",
                "virtualmachine",
                self.scoped_params(true)?,
            ),
            ScopeKind::OsType => ("listOsTypes", "ostype", Params::new()),
            ScopeKind::Hypervisor => ("listHypervisors", "hypervisor", Params::new()),
            ScopeKind::IpAddress => (
                "listPublicIpAddresses",
                "publicipaddress",
                self.scoped_params(false)?.with_opt("ipaddress", requested),
            ),
        };
        client.list(command, &params, key)
    }
}

fn field(record: &Record, key: &str) -> Option<String> {
    record.get(key).and_then(value_as_text)
}

fn matches(kind: ScopeKind, wanted: &str, record: &Record) -> bool {
    let wanted_lc = wanted.to_lowercase();
    let id_matches = field(record, "id").as_deref() == Some(wanted);
    let equals_ci = |key: &str| field(record, key).is_some_and(|v| v.to_lowercase() == wanted_lc);
    let equals = |key: &str| field(record, key).as_deref() == Some(wanted);

    match kind {
        ScopeKind::Domain => {
            id_matches
                || field(record, "path").is_some_and(|path| {
                    let path = path.to_lowercase();
                    path == wanted_lc
                        || path == format!("root/{wanted_lc}")
                        || path == format!("root{wanted_lc}")
                })
        }
        ScopeKind::Account | ScopeKind::Project | ScopeKind::Zone => {
            id_matches || equals_ci("name")
        }
        ScopeKind::VirtualMachine => id_matches || equals("name") || equals("displayname"),
        ScopeKind::OsType => id_matches || equals_ci("description"),
        ScopeKind::Hypervisor => equals_ci("name"),
        ScopeKind::IpAddress => id_matches || equals("ipaddress"),
    }
}

fn to_reference(kind: ScopeKind, record: Record) -> ScopeReference {
    let name = match kind {
        ScopeKind::OsType => field(&record, "description"),
        ScopeKind::IpAddress => field(&record, "ipaddress"),
        _ => field(&record, "name"),
    }
    .unwrap_or_default();
    // Hypervisor records have no id of their own
    let id = field(&record, "id").unwrap_or_else(|| name.clone());
    ScopeReference {
        kind,
        id,
        name,
        path: field(&record, "path"),
        record,
    }
}

fn select(kind: ScopeKind, requested: Option<&str>, candidates: Vec<Record>) -> Result<ScopeReference> {
    let Some(wanted) = requested else {
        return candidates
            .into_iter()
            .next()
            .map(|record| to_reference(kind, record))
            .ok_or_else(|| Error::NotFound(format!("No {kind} available")));
    };

    let mut hits: Vec<Record> = candidates
        .into_iter()
        .filter(|record| matches(kind, wanted, record))
        .collect();

    // A domain name must identify exactly one path
    if kind == ScopeKind::Domain && hits.len() != 1 {
        return Err(Error::not_found(kind, wanted));
    }
    if hits.is_empty() {
        return Err(Error::not_found(kind, wanted));
    }
    Ok(to_reference(kind, hits.swap_remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CloudClient;
    use crate::context::ScopeRequest;
    use crate::mock::MockTransport;
    use crate::types::RunOptions;
    use serde_json::json;

    fn client_with(mock: &MockTransport) -> CloudClient {
        CloudClient::with_transport(Box::new(mock.clone()))
    }

    fn domains(mock: &MockTransport) {
        mock.respond(
            "listDomains",
            json!({"count": 2, "domain": [
                {"id": "d-root", "name": "ROOT", "path": "ROOT"},
                {"id": "d-cust", "name": "customers", "path": "ROOT/customers"}
            ]}),
        );
    }

    #[test]
    fn test_domain_matches_root_prefixed_path() {
        let mock = MockTransport::new();
        domains(&mock);
        let client = client_with(&mock);

        for wanted in ["customers", "ROOT/Customers", "/customers"] {
            let request = ScopeRequest {
                domain: Some(wanted.into()),
                ..Default::default()
            };
            let mut ctx = RunContext::new(&client, request, RunOptions::default());
            assert_eq!(ctx.domain_id().unwrap().as_deref(), Some("d-cust"), "{wanted}");
        }
    }

    #[test]
    fn test_unknown_domain_is_not_found() {
        let mock = MockTransport::new();
        domains(&mock);
        let client = client_with(&mock);
        let request = ScopeRequest {
            domain: Some("suppliers".into()),
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, request, RunOptions::default());

        let err = ctx.resolve(ScopeKind::Domain).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_account_requires_domain() {
        let mock = MockTransport::new();
        let client = client_with(&mock);
        let request = ScopeRequest {
            account: Some("ops".into()),
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, request, RunOptions::default());

        let err = ctx.resolve(ScopeKind::Account).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_account_resolves_under_domain() {
        let mock = MockTransport::new();
        domains(&mock);
        mock.respond(
            "listAccounts",
            json!({"account": [{"id": "a1", "name": "ops"}]}),
        );
        let client = client_with(&mock);
        let request = ScopeRequest {
            domain: Some("customers".into()),
            account: Some("OPS".into()),
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, request, RunOptions::default());

        assert_eq!(ctx.account_name().unwrap().as_deref(), Some("ops"));
        let args = &mock.calls_to("listAccounts")[0];
        assert_eq!(args.get_text("domainid").as_deref(), Some("d-cust"));
    }

    #[test]
    fn test_zone_memoized() {
        let mock = MockTransport::new();
        mock.respond(
            "listZones",
            json!({"zone": [{"id": "z1", "name": "ch-gva-2"}, {"id": "z2", "name": "ch-dk-2"}]}),
        );
        let client = client_with(&mock);
        let request = ScopeRequest {
            zone: Some("CH-DK-2".into()),
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, request, RunOptions::default());

        let first = ctx.resolve(ScopeKind::Zone).unwrap();
        let second = ctx.resolve(ScopeKind::Zone).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap().id, "z2");
        assert_eq!(mock.count("listZones"), 1);
    }

    #[test]
    fn test_zone_and_hypervisor_default_to_first() {
        let mock = MockTransport::new();
        mock.respond("listZones", json!({"zone": [{"id": "z1", "name": "ch-gva-2"}]}));
        mock.respond(
            "listHypervisors",
            json!({"hypervisor": [{"name": "KVM"}, {"name": "XenServer"}]}),
        );
        let client = client_with(&mock);
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());

        assert_eq!(ctx.zone_id().unwrap().as_deref(), Some("z1"));
        assert_eq!(ctx.hypervisor_name().unwrap().as_deref(), Some("KVM"));
    }

    #[test]
    fn test_unrequested_kinds_skip_the_api() {
        let mock = MockTransport::new();
        let client = client_with(&mock);
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());

        assert!(ctx.domain_id().unwrap().is_none());
        assert!(ctx.project_id().unwrap().is_none());
        assert!(ctx.vm_id().unwrap().is_none());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_vm_matches_display_name_within_scope() {
        let mock = MockTransport::new();
        mock.respond("listZones", json!({"zone": [{"id": "z1", "name": "ch-gva-2"}]}));
        mock.respond(
            "listVirtualMachines",
            json!({"virtualmachine": [
                {"id": "vm-1", "name": "i-2-11-VM", "displayname": "web01"}
            ]}),
        );
        let client = client_with(&mock);
        let request = ScopeRequest {
            vm: Some("web01".into()),
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, request, RunOptions::default());

        assert_eq!(ctx.vm_id().unwrap().as_deref(), Some("vm-1"));
        let args = &mock.calls_to("listVirtualMachines")[0];
        assert_eq!(args.get_text("zoneid").as_deref(), Some("z1"));
    }

    #[test]
    fn test_capabilities_cached() {
        let mock = MockTransport::new();
        mock.respond(
            "listCapabilities",
            json!({"capability": {"cloudstackversion": "4.5.1", "securitygroupsenabled": false}}),
        );
        let client = client_with(&mock);
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());

        let caps = ctx.capabilities().unwrap();
        ctx.capabilities().unwrap();
        assert_eq!(caps.get("cloudstackversion"), Some(&json!("4.5.1")));
        assert_eq!(mock.count("listCapabilities"), 1);
    }
}
