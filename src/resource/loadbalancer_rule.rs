//! Load balancer rule resource
//!
//! A rule is identified by its name on a public IP in a zone. The algorithm
//! and description can be updated in place; everything else needs a new rule.
//! When `members` is declared, the rule's virtual machines are reconciled
//! toward exactly that list.

use super::{Common, Declared, parse};
use declarative::{
    Error, FieldMapping, Operation, Params, ResourceDescriptor, ResourceType, Result, RunContext,
    State, Update,
};
use serde::Deserialize;
use serde_json::Value;

pub const KIND: &str = "loadbalancer_rule";

const RETURNS: &[FieldMapping] = &[
    FieldMapping::new("publicip", "public_ip"),
    FieldMapping::new("algorithm", "algorithm"),
    FieldMapping::new("cidrlist", "cidr"),
    FieldMapping::new("members", "members"),
    FieldMapping::integer("publicport", "public_port"),
    FieldMapping::integer("privateport", "private_port"),
];

/// Declared load balancer rule
#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerRule {
    #[serde(flatten)]
    pub common: Common,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub private_port: Option<u16>,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default, alias = "ip_address")]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub open_firewall: bool,
    /// Names of the virtual machines behind the rule
    #[serde(default)]
    pub members: Option<Vec<String>>,
}

fn default_algorithm() -> String {
    "source".to_string()
}

pub fn declare(body: Value) -> Result<Declared> {
    let rule: LoadBalancerRule = parse(KIND, body)?;
    let mut scope = rule.common.scope();
    scope.ip_address = rule.public_ip.clone();
    Ok(Declared {
        common: rule.common.clone(),
        scope,
        resource: Box::new(rule),
    })
}

impl LoadBalancerRule {
    /// Arguments that locate the rule: scope, zone, public IP and name
    fn locator(&self, ctx: &mut RunContext<'_>) -> Result<Params> {
        Ok(ctx
            .scoped_params(true)?
            .with_opt("publicipid", ctx.ip_address_id()?)
            .with("name", self.common.require_name()?))
    }
}

impl ResourceType for LoadBalancerRule {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn name(&self) -> String {
        self.common.name.clone().unwrap_or_default()
    }

    fn tag_resource_type(&self) -> Option<&'static str> {
        Some("LoadBalancer")
    }

    fn returns(&self) -> &'static [FieldMapping] {
        RETURNS
    }

    fn validate(&self, state: State) -> Result<()> {
        self.common.require_name()?;
        if self.public_ip.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config("public_ip is required"));
        }
        if state == State::Present {
            let mut missing = Vec::new();
            if self.algorithm.is_empty() {
                missing.push("algorithm");
            }
            if self.private_port.is_none() {
                missing.push("private_port");
            }
            if self.public_port.is_none() {
                missing.push("public_port");
            }
            if !missing.is_empty() {
                return Err(Error::config(format!(
                    "missing required arguments: {}",
                    missing.join(",")
                )));
            }
        }
        Ok(())
    }

    fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>> {
        let params = self.locator(ctx)?;
        let name = self.common.require_name()?;
        let rules = ctx
            .client()
            .list_records("listLoadBalancerRules", &params, "loadbalancerrule")?;
        Ok(rules
            .into_iter()
            .find(|r| r.get_str("name").as_deref() == Some(name)))
    }

    fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation> {
        let params = self
            .locator(ctx)?
            .with("algorithm", &self.algorithm)
            .with_opt("privateport", self.private_port)
            .with_opt("publicport", self.public_port)
            .with_opt("cidrlist", self.cidr.as_deref())
            .with_opt("description", self.description.as_deref())
            .with("openfirewall", self.open_firewall);
        Ok(Operation::new("createLoadBalancerRule", params).returning("loadbalancer"))
    }

    fn build_update(
        &self,
        _ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Option<Update>> {
        let params = Params::new()
            .with("id", existing.id())
            .with("algorithm", &self.algorithm)
            .with_opt("description", self.description.as_deref());
        Ok(Some(Update::InPlace {
            operation: Operation::new("updateLoadBalancerRule", params).returning("loadbalancer"),
            mutable_keys: &["algorithm", "description"],
        }))
    }

    fn build_delete(
        &self,
        _ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Operation> {
        Ok(Operation::new(
            "deleteLoadBalancerRule",
            Params::new().with("id", existing.id()),
        ))
    }

    fn post_convergence(
        &self,
        ctx: &mut RunContext<'_>,
        resource: &mut ResourceDescriptor,
    ) -> Result<bool> {
        match &self.members {
            Some(members) => ctx.reconcile_members(resource, members),
            None => Ok(false),
        }
    }
}
