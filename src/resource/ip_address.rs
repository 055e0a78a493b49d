//! Public IP address resource
//!
//! `present` without an `ip_address` acquires a new address; with one, the
//! address must already be allocated to the scope. An address bound by a
//! static NAT mapping cannot be released.

use super::{Common, Declared, parse};
use declarative::{
    Error, FieldMapping, Operation, Params, ResourceDescriptor, ResourceType, Result, RunContext,
    State,
};
use serde::Deserialize;
use serde_json::Value;

pub const KIND: &str = "ip_address";

const RETURNS: &[FieldMapping] = &[FieldMapping::new("ipaddress", "ip_address")];

/// Declared public IP address
#[derive(Debug, Clone, Deserialize)]
pub struct IpAddress {
    #[serde(flatten)]
    pub common: Common,
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Network name, display text or id to acquire the address for
    #[serde(default)]
    pub network: Option<String>,
}

pub fn declare(body: Value) -> Result<Declared> {
    let address: IpAddress = parse(KIND, body)?;
    Ok(Declared {
        common: address.common.clone(),
        scope: address.common.scope(),
        resource: Box::new(address),
    })
}

impl IpAddress {
    fn requested(&self) -> Option<&str> {
        self.ip_address.as_deref().filter(|ip| !ip.is_empty())
    }

    fn network_id(&self, ctx: &mut RunContext<'_>) -> Result<Option<String>> {
        let Some(wanted) = self.network.as_deref().filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        let params = ctx.scoped_params(true)?;
        let networks = ctx.client().list_records("listNetworks", &params, "network")?;
        if networks.is_empty() {
            return Err(Error::NotFound("No networks available".to_string()));
        }
        networks
            .iter()
            .find(|n| {
                n.id() == wanted
                    || n.get_str("name").as_deref() == Some(wanted)
                    || n.get_str("displaytext").as_deref() == Some(wanted)
            })
            .map(|n| Some(n.id().to_string()))
            .ok_or_else(|| Error::not_found("Network", wanted))
    }
}

impl ResourceType for IpAddress {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn name(&self) -> String {
        self.requested().unwrap_or("(new)").to_string()
    }

    fn tag_resource_type(&self) -> Option<&'static str> {
        Some("PublicIpAddress")
    }

    fn returns(&self) -> &'static [FieldMapping] {
        RETURNS
    }

    fn validate(&self, state: State) -> Result<()> {
        if state == State::Absent && self.requested().is_none() {
            return Err(Error::config("ip_address is required to release an address"));
        }
        Ok(())
    }

    fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>> {
        let Some(ip) = self.requested() else {
            return Ok(None);
        };
        let params = ctx.scoped_params(false)?.with("ipaddress", ip);
        let addresses =
            ctx.client()
                .list_records("listPublicIpAddresses", &params, "publicipaddress")?;
        Ok(addresses
            .into_iter()
            .find(|a| a.get_str("ipaddress").as_deref() == Some(ip)))
    }

    fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation> {
        if let Some(ip) = self.requested() {
            // A specific address cannot be requested, only found
            return Err(Error::not_found("IP address", ip));
        }
        let params = ctx
            .scoped_params(true)?
            .with_opt("networkid", self.network_id(ctx)?);
        Ok(Operation::new("associateIpAddress", params).returning("ipaddress"))
    }

    fn build_delete(
        &self,
        _ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Operation> {
        if existing.get_bool("isstaticnat") {
            return Err(Error::StateConflict(
                "IP address is allocated via static nat".to_string(),
            ));
        }
        Ok(Operation::new(
            "disassociateIpAddress",
            Params::new().with("id", existing.id()),
        ))
    }
}
