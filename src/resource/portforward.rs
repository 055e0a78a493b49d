//! Port forwarding rule resource
//!
//! A rule is identified by protocol and public port on a public IP. Rules
//! cannot be edited: a changed port range, target VM or guest IP replaces the
//! rule.

use super::{Common, Declared, parse};
use declarative::{
    Error, FieldMapping, Operation, Params, ResourceDescriptor, ResourceType, Result, RunContext,
    State, Update,
};
use serde::Deserialize;
use serde_json::Value;

pub const KIND: &str = "portforward";

const RETURNS: &[FieldMapping] = &[
    FieldMapping::new("virtualmachinedisplayname", "vm_display_name"),
    FieldMapping::new("virtualmachinename", "vm_name"),
    FieldMapping::new("ipaddress", "ip_address"),
    FieldMapping::new("vmguestip", "vm_guest_ip"),
    FieldMapping::new("publicip", "public_ip"),
    FieldMapping::new("protocol", "protocol"),
    FieldMapping::integer("publicport", "public_port"),
    FieldMapping::integer("publicendport", "public_end_port"),
    FieldMapping::integer("privateport", "private_port"),
    FieldMapping::integer("privateendport", "private_end_port"),
];

/// Declared port forwarding rule
#[derive(Debug, Clone, Deserialize)]
pub struct PortForward {
    #[serde(flatten)]
    pub common: Common,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub public_port: Option<u16>,
    #[serde(default)]
    pub public_end_port: Option<u16>,
    #[serde(default)]
    pub private_port: Option<u16>,
    #[serde(default)]
    pub private_end_port: Option<u16>,
    #[serde(default)]
    pub open_firewall: bool,
    /// Guest IP on the VM's default NIC; its primary address when unset
    #[serde(default)]
    pub vm_guest_ip: Option<String>,
    #[serde(default)]
    pub vm: Option<String>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

pub fn declare(body: Value) -> Result<Declared> {
    let rule: PortForward = parse(KIND, body)?;
    let mut scope = rule.common.scope();
    scope.ip_address = rule.ip_address.clone();
    scope.vm = rule.vm.clone();
    Ok(Declared {
        common: rule.common.clone(),
        scope,
        resource: Box::new(rule),
    })
}

impl PortForward {
    fn public_port(&self) -> Result<u16> {
        self.public_port
            .ok_or_else(|| Error::config("missing required arguments: public_port"))
    }

    /// Guest IP the rule forwards to, checked against the VM's default NIC
    fn guest_ip(&self, ctx: &mut RunContext<'_>) -> Result<Option<String>> {
        let params = Params::new()
            .with_opt("virtualmachineid", ctx.vm_id()?)
            .with("isdefault", true);
        let nics = ctx.client().list_records("listNics", &params, "nic")?;
        let Some(nic) = nics
            .into_iter()
            .find(|n| n.get_bool("isdefault"))
        else {
            return Ok(self.vm_guest_ip.clone());
        };

        let Some(wanted) = self.vm_guest_ip.as_deref().filter(|ip| !ip.is_empty()) else {
            return Ok(nic.get_str("ipaddress"));
        };
        if nic.get_str("ipaddress").as_deref() == Some(wanted) {
            return Ok(Some(wanted.to_string()));
        }
        let secondary = nic
            .get("secondaryip")
            .and_then(Value::as_array)
            .is_some_and(|ips| {
                ips.iter()
                    .any(|ip| ip.get("ipaddress").and_then(Value::as_str) == Some(wanted))
            });
        if !secondary {
            return Err(Error::NotFound(format!(
                "Secondary IP '{wanted}' not assigned to VM"
            )));
        }
        Ok(Some(wanted.to_string()))
    }

    fn create_operation(&self, params: Params) -> Operation {
        let params = params.with("openfirewall", self.open_firewall);
        Operation::new("createPortForwardingRule", params).returning("portforwardingrule")
    }

    fn create_params(&self, ctx: &mut RunContext<'_>) -> Result<Params> {
        let public_port = self.public_port()?;
        let private_port = self
            .private_port
            .ok_or_else(|| Error::config("missing required arguments: private_port"))?;
        Ok(Params::new()
            .with_opt("ipaddressid", ctx.ip_address_id()?)
            .with("protocol", &self.protocol)
            .with("publicport", public_port)
            .with("publicendport", self.public_end_port.unwrap_or(public_port))
            .with("privateport", private_port)
            .with("privateendport", self.private_end_port.unwrap_or(private_port))
            .with_opt("virtualmachineid", ctx.vm_id()?)
            .with_opt("vmguestip", self.guest_ip(ctx)?))
    }
}

impl ResourceType for PortForward {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn name(&self) -> String {
        format!(
            "{}/{} on {}",
            self.protocol,
            self.public_port.map(|p| p.to_string()).unwrap_or_default(),
            self.ip_address.as_deref().unwrap_or_default()
        )
    }

    fn tag_resource_type(&self) -> Option<&'static str> {
        Some("PortForwardingRule")
    }

    fn returns(&self) -> &'static [FieldMapping] {
        RETURNS
    }

    fn validate(&self, state: State) -> Result<()> {
        if self.ip_address.as_deref().is_none_or(str::is_empty) {
            return Err(Error::config("ip_address is required"));
        }
        self.public_port()?;
        if state == State::Present {
            if self.private_port.is_none() {
                return Err(Error::config("missing required arguments: private_port"));
            }
            if self.vm.as_deref().is_none_or(str::is_empty) {
                return Err(Error::config("vm is required"));
            }
        }
        Ok(())
    }

    fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>> {
        let public_port = i64::from(self.public_port()?);
        let params = Params::new()
            .with_opt("ipaddressid", ctx.ip_address_id()?)
            .with_opt("projectid", ctx.project_id()?);
        let rules = ctx
            .client()
            .list_records("listPortForwardingRules", &params, "portforwardingrule")?;
        Ok(rules.into_iter().find(|r| {
            r.get_str("protocol")
                .is_some_and(|p| p.eq_ignore_ascii_case(&self.protocol))
                && r.get_str("publicport")
                    .and_then(|p| p.parse::<i64>().ok())
                    == Some(public_port)
        }))
    }

    fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation> {
        let params = self.create_params(ctx)?;
        Ok(self.create_operation(params))
    }

    fn build_update(
        &self,
        ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Option<Update>> {
        let desired = self.create_params(ctx)?;
        let delete = self.build_delete(ctx, existing)?;
        let create = self.create_operation(desired.clone());
        Ok(Some(Update::Replace {
            desired,
            delete,
            create,
        }))
    }

    fn build_delete(
        &self,
        _ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Operation> {
        Ok(Operation::new(
            "deletePortForwardingRule",
            Params::new().with("id", existing.id()),
        ))
    }
}
