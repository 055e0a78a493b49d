//! Template resource
//!
//! A template is either registered from a URL or created from a virtual
//! machine's root volume (optionally through one of its snapshots). It is
//! found by checksum when one is declared, by name otherwise. Templates are
//! never updated; only tags follow the declaration of an existing one.

use super::{Common, Declared, parse};
use declarative::{
    Error, FieldMapping, Operation, Params, ResourceDescriptor, ResourceType, Result, RunContext,
    State,
};
use serde::Deserialize;
use serde_json::Value;

pub const KIND: &str = "template";

const RETURNS: &[FieldMapping] = &[
    FieldMapping::new("checksum", "checksum"),
    FieldMapping::new("status", "status"),
    FieldMapping::new("isready", "is_ready"),
    FieldMapping::new("templatetag", "template_tag"),
    FieldMapping::new("sshkeyenabled", "sshkey_enabled"),
    FieldMapping::new("passwordenabled", "password_enabled"),
    FieldMapping::new("templatetype", "template_type"),
    FieldMapping::new("ostypename", "os_type"),
    FieldMapping::new("crossZones", "cross_zones"),
    FieldMapping::new("isextractable", "is_extractable"),
    FieldMapping::new("isfeatured", "is_featured"),
    FieldMapping::new("ispublic", "is_public"),
    FieldMapping::new("format", "format"),
    FieldMapping::new("hypervisor", "hypervisor"),
];

/// Declared template
#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    #[serde(flatten)]
    pub common: Common,
    #[serde(default)]
    pub display_text: Option<String>,
    /// Register from this URL
    #[serde(default)]
    pub url: Option<String>,
    /// Create from this virtual machine's root volume
    #[serde(default)]
    pub vm: Option<String>,
    /// Create from this snapshot of the VM's root volume
    #[serde(default)]
    pub snapshot: Option<String>,
    #[serde(default)]
    pub os_type: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default = "yes")]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_dynamically_scalable: bool,
    #[serde(default)]
    pub is_extractable: bool,
    #[serde(default)]
    pub is_routing: Option<bool>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default = "default_filter")]
    pub template_filter: String,
    #[serde(default)]
    pub hypervisor: Option<String>,
    #[serde(default)]
    pub requires_hvm: bool,
    #[serde(default)]
    pub password_enabled: bool,
    #[serde(default)]
    pub template_tag: Option<String>,
    #[serde(default)]
    pub sshkey_enabled: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_bits")]
    pub bits: u32,
    #[serde(default)]
    pub cross_zones: bool,
}

const fn yes() -> bool {
    true
}

fn default_filter() -> String {
    "self".to_string()
}

const fn default_bits() -> u32 {
    64
}

pub fn declare(body: Value) -> Result<Declared> {
    let template: Template = parse(KIND, body)?;
    let mut scope = template.common.scope();
    scope.vm = template.vm.clone();
    scope.os_type = template.os_type.clone();
    scope.hypervisor = template.hypervisor.clone();
    Ok(Declared {
        common: template.common.clone(),
        scope,
        resource: Box::new(template),
    })
}

fn filled(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl Template {
    fn display_text(&self) -> Result<&str> {
        match filled(self.display_text.as_ref()) {
            Some(text) => Ok(text),
            None => self.common.require_name(),
        }
    }

    /// Zone filter; cross-zone templates are not bound to one zone
    fn zone_id(&self, ctx: &mut RunContext<'_>) -> Result<Option<String>> {
        if self.cross_zones {
            return Ok(None);
        }
        ctx.zone_id()
    }

    /// Flags shared by registration and creation
    fn flags(&self, params: Params) -> Params {
        params
            .with("bits", self.bits)
            .with("isdynamicallyscalable", self.is_dynamically_scalable)
            .with("isfeatured", self.is_featured)
            .with("ispublic", self.is_public)
            .with("passwordenabled", self.password_enabled)
            .with("requireshvm", self.requires_hvm)
            .with("sshkeyenabled", self.sshkey_enabled)
            .with_opt("templatetag", filled(self.template_tag.as_ref()))
    }

    fn register(&self, ctx: &mut RunContext<'_>, url: &str) -> Result<Operation> {
        let hypervisor = ctx.hypervisor_name()?;
        let zone_id = if self.cross_zones {
            Some("-1".to_string())
        } else {
            ctx.zone_id()?
        };
        let params = ctx
            .scoped_params(false)?
            .with("name", self.common.require_name()?)
            .with("displaytext", self.display_text()?)
            .with("url", url)
            .with_opt("format", filled(self.format.as_ref()))
            .with_opt("hypervisor", hypervisor)
            .with_opt("ostypeid", ctx.os_type_id()?)
            .with_opt("zoneid", zone_id)
            .with_opt("checksum", filled(self.checksum.as_ref()))
            .with("isextractable", self.is_extractable)
            .with_opt("isrouting", self.is_routing);
        Ok(Operation::new("registerTemplate", self.flags(params)).returning("template"))
    }

    fn create_from_vm(&self, ctx: &mut RunContext<'_>, vm: &str) -> Result<Operation> {
        let volume_id = self.root_volume_id(ctx, vm)?;
        let source = match filled(self.snapshot.as_ref()) {
            Some(snapshot) => {
                Params::new().with("snapshotid", snapshot_id(ctx, &volume_id, snapshot)?)
            }
            None => Params::new().with("volumeid", volume_id),
        };
        let params = source
            .with("name", self.common.require_name()?)
            .with("displaytext", self.display_text()?)
            .with_opt("ostypeid", ctx.os_type_id()?);
        Ok(Operation::new("createTemplate", self.flags(params)).returning("template"))
    }

    fn root_volume_id(&self, ctx: &mut RunContext<'_>, vm: &str) -> Result<String> {
        let params = ctx
            .scoped_params(true)?
            .with_opt("virtualmachineid", ctx.vm_id()?)
            .with("type", "ROOT");
        ctx.client()
            .list_records("listVolumes", &params, "volume")?
            .into_iter()
            .next()
            .map(|volume| volume.id().to_string())
            .ok_or_else(|| Error::NotFound(format!("Root volume for '{vm}' not found")))
    }
}

fn snapshot_id(ctx: &mut RunContext<'_>, volume_id: &str, snapshot: &str) -> Result<String> {
    let params = ctx.scoped_params(false)?.with("volumeid", volume_id);
    ctx.client()
        .list_records("listSnapshots", &params, "snapshot")?
        .into_iter()
        .find(|s| s.id() == snapshot || s.get_str("name").as_deref() == Some(snapshot))
        .map(|s| s.id().to_string())
        .ok_or_else(|| Error::not_found("Snapshot", snapshot))
}

impl ResourceType for Template {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn name(&self) -> String {
        self.common.name.clone().unwrap_or_default()
    }

    fn tag_resource_type(&self) -> Option<&'static str> {
        Some("Template")
    }

    fn returns(&self) -> &'static [FieldMapping] {
        RETURNS
    }

    fn validate(&self, state: State) -> Result<()> {
        self.common.require_name()?;
        if state == State::Absent {
            return Ok(());
        }
        if filled(self.os_type.as_ref()).is_none() {
            return Err(Error::config("Missing required arguments: os_type"));
        }
        match (filled(self.url.as_ref()), filled(self.vm.as_ref())) {
            (Some(_), Some(_)) => Err(Error::config(
                "parameters are mutually exclusive: url, vm",
            )),
            (None, None) => Err(Error::config("one of the following is required: url, vm")),
            (Some(_), None) if filled(self.format.as_ref()).is_none() => {
                Err(Error::config("Missing required arguments: format"))
            }
            _ => Ok(()),
        }
    }

    fn fetch_existing(&self, ctx: &mut RunContext<'_>) -> Result<Option<ResourceDescriptor>> {
        let name = self.common.require_name()?;
        let checksum = filled(self.checksum.as_ref());
        let zone_id = self.zone_id(ctx)?;
        let mut params = ctx
            .scoped_params(false)?
            .with("isready", self.is_ready)
            .with("templatefilter", &self.template_filter)
            .with_opt("zoneid", zone_id);
        if checksum.is_none() {
            params.set("name", name);
        }
        let templates = ctx
            .client()
            .list_records("listTemplates", &params, "template")?;

        Ok(match checksum {
            Some(sum) => templates
                .into_iter()
                .find(|t| t.get_str("checksum").as_deref() == Some(sum)),
            None => templates.into_iter().next(),
        })
    }

    fn build_create(&self, ctx: &mut RunContext<'_>) -> Result<Operation> {
        if let Some(url) = filled(self.url.as_ref()) {
            return self.register(ctx, url);
        }
        match filled(self.vm.as_ref()) {
            Some(vm) => self.create_from_vm(ctx, vm),
            None => Err(Error::config("one of the following is required: url, vm")),
        }
    }

    fn build_delete(
        &self,
        ctx: &mut RunContext<'_>,
        existing: &ResourceDescriptor,
    ) -> Result<Operation> {
        let params = Params::new()
            .with("id", existing.id())
            .with_opt("zoneid", self.zone_id(ctx)?);
        Ok(Operation::new("deleteTemplate", params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::CloudClient;
    use declarative::mock::MockTransport;
    use serde_json::json;

    fn client(mock: &MockTransport) -> CloudClient {
        CloudClient::with_transport(Box::new(mock.clone()))
    }

    fn cloud() -> MockTransport {
        let mock = MockTransport::new();
        mock.respond("listZones", json!({"zone": [{"id": "z1", "name": "ch-gva-2"}]}));
        mock.respond(
            "listOsTypes",
            json!({"ostype": [
                {"id": "os-1", "description": "Debian GNU/Linux 12 (64-bit)"},
                {"id": "os-2", "description": "Other Linux (64-bit)"}
            ]}),
        );
        mock.respond("listHypervisors", json!({"hypervisor": [{"name": "KVM"}]}));
        mock
    }

    #[test]
    fn test_register_from_url() {
        let mock = cloud();
        mock.respond("listTemplates", json!({}));
        mock.respond(
            "registerTemplate",
            json!({"count": 1, "template": [{
                "id": "t1", "name": "debian", "checksum": "abc", "isready": false,
                "ostypename": "Debian GNU/Linux 12 (64-bit)", "zonename": "ch-gva-2", "tags": []
            }]}),
        );
        let declared = declare(json!({
            "name": "debian",
            "url": "https://images.example/debian.qcow2",
            "format": "QCOW2",
            "os_type": "Debian GNU/Linux 12 (64-bit)",
            "checksum": "abc"
        }))
        .unwrap();

        let report = declared.run(&client(&mock), false).unwrap();
        assert!(report.changed);
        assert_eq!(report.get("checksum"), Some(&json!("abc")));
        assert_eq!(report.get("os_type"), Some(&json!("Debian GNU/Linux 12 (64-bit)")));

        let args = &mock.calls_to("registerTemplate")[0];
        assert_eq!(args.get_text("ostypeid").as_deref(), Some("os-1"));
        assert_eq!(args.get_text("hypervisor").as_deref(), Some("KVM"));
        assert_eq!(args.get_text("zoneid").as_deref(), Some("z1"));
        assert_eq!(args.get_text("displaytext").as_deref(), Some("debian"));
        assert_eq!(args.get_text("bits").as_deref(), Some("64"));
        assert_eq!(mock.count("queryAsyncJobResult"), 0);
    }

    #[test]
    fn test_found_by_checksum() {
        let mock = cloud();
        mock.respond(
            "listTemplates",
            json!({"template": [
                {"id": "t1", "name": "debian", "checksum": "old"},
                {"id": "t2", "name": "debian", "checksum": "abc"}
            ]}),
        );
        let declared = declare(json!({
            "name": "debian",
            "url": "https://images.example/debian.qcow2",
            "format": "QCOW2",
            "os_type": "Debian GNU/Linux 12 (64-bit)",
            "checksum": "abc"
        }))
        .unwrap();

        let report = declared.run(&client(&mock), false).unwrap();
        assert!(!report.changed);
        assert_eq!(report.get("id"), Some(&json!("t2")));
        assert!(!mock.calls_to("listTemplates")[0].contains("name"));
        assert_eq!(mock.count("registerTemplate"), 0);
    }

    #[test]
    fn test_cross_zone_registration() {
        let mock = cloud();
        mock.respond("listTemplates", json!({}));
        mock.respond("registerTemplate", json!({"template": [{"id": "t1", "name": "debian"}]}));
        let declared = declare(json!({
            "name": "debian",
            "url": "https://images.example/debian.qcow2",
            "format": "QCOW2",
            "os_type": "Other Linux (64-bit)",
            "cross_zones": true
        }))
        .unwrap();

        declared.run(&client(&mock), false).unwrap();
        assert!(!mock.calls_to("listTemplates")[0].contains("zoneid"));
        let args = &mock.calls_to("registerTemplate")[0];
        assert_eq!(args.get_text("zoneid").as_deref(), Some("-1"));
    }

    #[test]
    fn test_create_from_vm_snapshot() {
        let mock = cloud();
        mock.respond("listTemplates", json!({}));
        mock.respond(
            "listVirtualMachines",
            json!({"virtualmachine": [{"id": "vm-1", "name": "web01"}]}),
        );
        mock.respond("listVolumes", json!({"volume": [{"id": "vol-1", "type": "ROOT"}]}));
        mock.respond(
            "listSnapshots",
            json!({"snapshot": [{"id": "snap-1", "name": "nightly"}]}),
        );
        mock.respond("createTemplate", json!({"jobid": "j1", "id": "t1"}));
        mock.respond(
            "queryAsyncJobResult",
            json!({"jobstatus": 1, "jobresult": {"template": {"id": "t1", "name": "web"}}}),
        );
        let declared = declare(json!({
            "name": "web",
            "vm": "web01",
            "snapshot": "nightly",
            "os_type": "Other Linux (64-bit)"
        }))
        .unwrap();

        let report = declared.run(&client(&mock), false).unwrap();
        assert!(report.changed);
        let args = &mock.calls_to("createTemplate")[0];
        assert_eq!(args.get_text("snapshotid").as_deref(), Some("snap-1"));
        assert!(!args.contains("volumeid"));
        assert_eq!(
            mock.calls_to("listVolumes")[0].get_text("virtualmachineid").as_deref(),
            Some("vm-1")
        );
    }

    #[test]
    fn test_missing_root_volume() {
        let mock = cloud();
        mock.respond("listTemplates", json!({}));
        mock.respond(
            "listVirtualMachines",
            json!({"virtualmachine": [{"id": "vm-1", "name": "web01"}]}),
        );
        mock.respond("listVolumes", json!({}));
        let declared = declare(json!({
            "name": "web",
            "vm": "web01",
            "os_type": "Other Linux (64-bit)"
        }))
        .unwrap();

        let err = declared.run(&client(&mock), false).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Root volume for 'web01' not found"));
    }

    #[test]
    fn test_validation() {
        let url_and_vm = declare(json!({
            "name": "t", "url": "https://x", "vm": "web01", "format": "QCOW2", "os_type": "x"
        }))
        .unwrap();
        assert!(url_and_vm.resource.validate(State::Present).is_err());

        let no_os_type = declare(json!({"name": "t", "url": "https://x", "format": "QCOW2"})).unwrap();
        let err = no_os_type.resource.validate(State::Present).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("os_type")));

        let absent = declare(json!({"name": "t", "state": "absent"})).unwrap();
        assert!(absent.resource.validate(State::Absent).is_ok());
    }

    #[test]
    fn test_delete_in_zone() {
        let mock = cloud();
        mock.respond("listTemplates", json!({"template": [{"id": "t1", "name": "debian"}]}));
        mock.respond("deleteTemplate", json!({"jobid": "j1"}));
        mock.respond("queryAsyncJobResult", json!({"jobstatus": 1, "jobresult": {"success": true}}));

        let report = declare(json!({"name": "debian", "state": "absent"}))
            .unwrap()
            .run(&client(&mock), false)
            .unwrap();
        assert!(report.changed);
        let args = &mock.calls_to("deleteTemplate")[0];
        assert_eq!(args.get_text("id").as_deref(), Some("t1"));
        assert_eq!(args.get_text("zoneid").as_deref(), Some("z1"));
    }
}
