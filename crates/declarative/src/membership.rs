//! Load balancer membership reconciliation
//!
//! Members are declared by virtual machine name. Every name must resolve to
//! an id before anything is changed.

use crate::api::Operation;
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::job::await_submission;
use crate::params::Params;
use crate::reconcile::reconcile;
use crate::types::ResourceDescriptor;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Deserialize)]
struct Instance {
    id: String,
    #[serde(default)]
    name: String,
}

impl RunContext<'_> {
    /// Map member names to virtual machine ids within the run's scope
    pub fn resolve_members(&mut self, names: &[String]) -> Result<BTreeMap<String, String>> {
        let params = self.scoped_params(true)?;
        let vms: Vec<Instance> =
            self.client()
                .list("listVirtualMachines", &params, "virtualmachine")?;

        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();
        for name in names {
            match vms.iter().find(|vm| &vm.name == name) {
                Some(vm) => {
                    resolved.insert(name.clone(), vm.id.clone());
                }
                None => missing.push(name.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(Error::NotFound(format!(
                "One or more members could not be found: {}",
                missing.join(", ")
            )));
        }
        Ok(resolved)
    }

    /// Ids of the virtual machines currently assigned to a rule
    pub fn observed_members(&mut self, rule_id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .rule_instances(rule_id)?
            .into_iter()
            .map(|vm| vm.id)
            .collect())
    }

    fn rule_instances(&self, rule_id: &str) -> Result<Vec<Instance>> {
        self.client().list(
            "listLoadBalancerRuleInstances",
            &Params::new().with("id", rule_id),
            "loadbalancerruleinstance",
        )
    }

    /// Converge the members of a load balancer rule toward `desired` names.
    ///
    /// Removals are sent before assignments. The rule's `members` field is
    /// set to the names the server lists once the calls are done; in a dry
    /// run it holds the desired names.
    pub fn reconcile_members(
        &mut self,
        rule: &mut ResourceDescriptor,
        desired: &[String],
    ) -> Result<bool> {
        let wanted: BTreeSet<String> = self.resolve_members(desired)?.into_values().collect();
        let instances = self.rule_instances(rule.id())?;
        let observed: BTreeSet<String> = instances.iter().map(|vm| vm.id.clone()).collect();
        let diff = reconcile(&wanted, &observed);

        if diff.is_empty() {
            set_members(rule, instances.into_iter().map(|vm| vm.name));
            return Ok(false);
        }
        if self.dry_run() {
            warn!(
                "dry run: skipping member update on {} (-{} +{})",
                rule.id(),
                diff.to_remove.len(),
                diff.to_add.len()
            );
            set_members(rule, desired.iter().cloned());
            return Ok(true);
        }

        if !diff.to_remove.is_empty() {
            self.send_members("removeFromLoadBalancerRule", rule.id(), &diff.to_remove)?;
        }
        if !diff.to_add.is_empty() {
            self.send_members("assignToLoadBalancerRule", rule.id(), &diff.to_add)?;
        }
        let current = self.rule_instances(rule.id())?;
        set_members(rule, current.into_iter().map(|vm| vm.name));
        Ok(true)
    }

    fn send_members(
        &mut self,
        command: &'static str,
        rule_id: &str,
        vm_ids: &BTreeSet<String>,
    ) -> Result<()> {
        info!("{command}: {} member(s) on rule {rule_id}", vm_ids.len());
        let ids: Vec<String> = vm_ids.iter().cloned().collect();
        let operation = Operation::new(
            command,
            Params::new().with("id", rule_id).with("virtualmachineids", ids),
        );
        let client = self.client();
        let submission = client.submit(&operation)?;
        await_submission(client, submission, self.options().poll_interval)?;
        Ok(())
    }
}

fn set_members(rule: &mut ResourceDescriptor, names: impl Iterator<Item = String>) {
    rule.set("members", Value::Array(names.map(Value::String).collect()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CloudClient;
    use crate::context::ScopeRequest;
    use crate::mock::MockTransport;
    use crate::types::RunOptions;
    use serde_json::json;
    use std::time::Duration;

    fn fleet(mock: &MockTransport) {
        mock.respond("listZones", json!({"zone": [{"id": "z1", "name": "ch-gva-2"}]}));
        mock.respond(
            "listVirtualMachines",
            json!({"virtualmachine": [
                {"id": "vm-1", "name": "web01"},
                {"id": "vm-2", "name": "web02"},
                {"id": "vm-3", "name": "web03"}
            ]}),
        );
        mock.respond(
            "listLoadBalancerRuleInstances",
            instances(&[("vm-2", "web02"), ("vm-3", "web03")]),
        );
        mock.respond("assignToLoadBalancerRule", json!({"jobid": "j-add"}));
        mock.respond("removeFromLoadBalancerRule", json!({"jobid": "j-rm"}));
        mock.respond("queryAsyncJobResult", json!({"jobstatus": 1, "jobresult": {"success": true}}));
    }

    fn instances(members: &[(&str, &str)]) -> Value {
        let list: Vec<Value> = members
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();
        json!({"loadbalancerruleinstance": list})
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_and_remove_only_the_difference() {
        let mock = MockTransport::new();
        fleet(&mock);
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let options = RunOptions {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        mock.respond_sequence(
            "listLoadBalancerRuleInstances",
            vec![
                instances(&[("vm-2", "web02"), ("vm-3", "web03")]),
                instances(&[("vm-1", "web01"), ("vm-2", "web02")]),
            ],
        );
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options);
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        let changed = ctx
            .reconcile_members(&mut rule, &names(&["web01", "web02"]))
            .unwrap();
        assert!(changed);

        let removed = mock.calls_to("removeFromLoadBalancerRule");
        let assigned = mock.calls_to("assignToLoadBalancerRule");
        assert_eq!(removed.len(), 1);
        assert_eq!(assigned.len(), 1);
        assert_eq!(removed[0].get_text("virtualmachineids").as_deref(), Some("vm-3"));
        assert_eq!(assigned[0].get_text("virtualmachineids").as_deref(), Some("vm-1"));
        assert_eq!(assigned[0].get_text("id").as_deref(), Some("lb1"));

        let order: Vec<String> = mock
            .commands()
            .into_iter()
            .filter(|c| c.ends_with("LoadBalancerRule"))
            .collect();
        assert_eq!(order, vec!["removeFromLoadBalancerRule", "assignToLoadBalancerRule"]);
        assert_eq!(rule.get("members"), Some(&json!(["web01", "web02"])));
    }

    #[test]
    fn test_unknown_member_fails_before_any_change() {
        let mock = MockTransport::new();
        fleet(&mock);
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        let err = ctx
            .reconcile_members(&mut rule, &names(&["web01", "db01"]))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("db01")));
        assert_eq!(mock.count("assignToLoadBalancerRule"), 0);
        assert_eq!(mock.count("removeFromLoadBalancerRule"), 0);
    }

    #[test]
    fn test_dry_run_reports_change_only() {
        let mock = MockTransport::new();
        fleet(&mock);
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let options = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options);
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        assert!(ctx.reconcile_members(&mut rule, &names(&["web02"])).unwrap());
        assert_eq!(mock.count("removeFromLoadBalancerRule"), 0);
    }

    #[test]
    fn test_matching_members_unchanged() {
        let mock = MockTransport::new();
        fleet(&mock);
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), RunOptions::default());
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        let changed = ctx
            .reconcile_members(&mut rule, &names(&["web03", "web02"]))
            .unwrap();
        assert!(!changed);
        assert_eq!(rule.get("members"), Some(&json!(["web02", "web03"])));
        assert_eq!(mock.count("listLoadBalancerRuleInstances"), 1);
    }

    #[test]
    fn test_members_reread_after_partial_change() {
        let mock = MockTransport::new();
        fleet(&mock);
        mock.respond_sequence(
            "listLoadBalancerRuleInstances",
            vec![
                instances(&[("vm-2", "web02"), ("vm-3", "web03")]),
                instances(&[("vm-2", "web02")]),
            ],
        );
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let options = RunOptions {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options);
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        assert!(ctx
            .reconcile_members(&mut rule, &names(&["web01", "web02"]))
            .unwrap());
        assert_eq!(mock.count("listLoadBalancerRuleInstances"), 2);
        assert_eq!(rule.get("members"), Some(&json!(["web02"])));
    }

    #[test]
    fn test_member_jobs_awaited_without_async_wait() {
        let mock = MockTransport::new();
        fleet(&mock);
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let options = RunOptions {
            wait_for_async: false,
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options);
        let mut rule = ResourceDescriptor::from_value(json!({"id": "lb1"})).unwrap();

        ctx.reconcile_members(&mut rule, &names(&["web01", "web02"]))
            .unwrap();
        assert_eq!(mock.count("queryAsyncJobResult"), 2);
    }
}
