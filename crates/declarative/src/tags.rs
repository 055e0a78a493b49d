//! Tag reconciliation

use crate::api::Operation;
use crate::context::RunContext;
use crate::error::Result;
use crate::job::await_submission;
use crate::params::Params;
use crate::reconcile::reconcile;
use crate::types::{ResourceDescriptor, Tag};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Deserialize)]
struct TagEntry {
    key: String,
    value: String,
}

impl RunContext<'_> {
    /// Tags currently attached to a resource, cached per resource id
    pub fn observed_tags(&mut self, resource_id: &str) -> Result<BTreeSet<Tag>> {
        if let Some(cached) = self.cached_tags(resource_id) {
            debug!("tags: {resource_id} served from cache");
            return Ok(cached.clone());
        }
        let params = Params::new()
            .with_opt("projectid", self.project_id()?)
            .with_opt("account", self.account_name()?)
            .with_opt("domainid", self.domain_id()?)
            .with("resourceid", resource_id);
        let tags: BTreeSet<Tag> = self
            .client()
            .list::<TagEntry>("listTags", &params, "tag")?
            .into_iter()
            .map(|t| Tag::new(t.key, t.value))
            .collect();
        self.remember_tags(resource_id, tags.clone());
        Ok(tags)
    }

    /// Converge the tags of `resource` toward `desired`.
    ///
    /// Stale tags are deleted before new ones are created. Afterwards the
    /// resource's `tags` field holds what the API reports. Returns whether
    /// anything had to change.
    pub fn reconcile_tags(
        &mut self,
        resource: &mut ResourceDescriptor,
        resource_type: &str,
        desired: &[Tag],
    ) -> Result<bool> {
        let desired: BTreeSet<Tag> = desired.iter().cloned().collect();
        let observed = self.observed_tags(resource.id())?;
        let diff = reconcile(&desired, &observed);

        if diff.is_empty() {
            resource.set_tags(&observed.into_iter().collect::<Vec<_>>());
            return Ok(false);
        }

        if self.dry_run() {
            warn!(
                "dry run: skipping tag update on {} (-{} +{})",
                resource.id(),
                diff.to_remove.len(),
                diff.to_add.len()
            );
            resource.set_tags(&observed.into_iter().collect::<Vec<_>>());
            return Ok(true);
        }

        if !diff.to_remove.is_empty() {
            self.send_tags("deleteTags", resource.id(), resource_type, &diff.to_remove)?;
        }
        if !diff.to_add.is_empty() {
            self.send_tags("createTags", resource.id(), resource_type, &diff.to_add)?;
        }

        self.invalidate_tags();
        let current = self.observed_tags(resource.id())?;
        resource.set_tags(&current.into_iter().collect::<Vec<_>>());
        Ok(true)
    }

    fn send_tags(
        &mut self,
        command: &'static str,
        resource_id: &str,
        resource_type: &str,
        tags: &BTreeSet<Tag>,
    ) -> Result<()> {
        let tags: Vec<Tag> = tags.iter().cloned().collect();
        info!("{command}: {} tag(s) on {resource_type} {resource_id}", tags.len());
        let operation = Operation::new(
            command,
            Params::new()
                .with("resourceids", resource_id)
                .with("resourcetype", resource_type)
                .with("tags", tags.as_slice()),
        );
        let client = self.client();
        let submission = client.submit(&operation)?;
        await_submission(client, submission, self.options().poll_interval)?;
        Ok(())
    }
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

    fn options(dry_run: bool) -> RunOptions {
        RunOptions {
            dry_run,
            poll_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn rule() -> ResourceDescriptor {
        ResourceDescriptor::from_value(json!({"id": "lb1", "tags": []})).unwrap()
    }

    #[test]
    fn test_delete_before_create_then_refetch() {
        let mock = MockTransport::new();
        mock.respond_sequence(
            "listTags",
            vec![
                json!({"tag": [{"key": "env", "value": "staging"}, {"key": "team", "value": "web"}]}),
                json!({"tag": [{"key": "env", "value": "prod"}, {"key": "team", "value": "web"}]}),
            ],
        );
        mock.respond("deleteTags", json!({"jobid": "j1"}));
        mock.respond("createTags", json!({"jobid": "j2"}));
        mock.respond("queryAsyncJobResult", json!({"jobstatus": 1, "jobresult": {"success": true}}));
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options(false));

        let mut resource = rule();
        let desired = [Tag::new("env", "prod"), Tag::new("team", "web")];
        assert!(ctx.reconcile_tags(&mut resource, "LoadBalancer", &desired).unwrap());

        let commands: Vec<String> = mock
            .commands()
            .into_iter()
            .filter(|c| c.ends_with("Tags"))
            .collect();
        assert_eq!(commands, vec!["listTags", "deleteTags", "createTags", "listTags"]);

        let deleted = &mock.calls_to("deleteTags")[0];
        let encoded = deleted.encode();
        assert!(encoded.contains(&("tags[0].key".to_string(), "env".to_string())));
        assert!(encoded.contains(&("tags[0].value".to_string(), "staging".to_string())));
        assert_eq!(deleted.get_text("resourcetype").as_deref(), Some("LoadBalancer"));
        assert_eq!(resource.tags(), desired.to_vec());
    }

    #[test]
    fn test_matching_tags_issue_no_calls() {
        let mock = MockTransport::new();
        mock.respond("listTags", json!({"tag": [{"key": "env", "value": "prod"}]}));
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options(false));

        let mut resource = rule();
        let changed = ctx
            .reconcile_tags(&mut resource, "LoadBalancer", &[Tag::new("env", "prod")])
            .unwrap();
        assert!(!changed);
        assert_eq!(mock.commands(), vec!["listTags"]);
    }

    #[test]
    fn test_dry_run_reports_without_mutating() {
        let mock = MockTransport::new();
        mock.respond("listTags", json!({"tag": [{"key": "env", "value": "prod"}]}));
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options(true));

        let mut resource = rule();
        assert!(ctx.reconcile_tags(&mut resource, "LoadBalancer", &[]).unwrap());
        assert_eq!(mock.count("deleteTags"), 0);
        assert_eq!(resource.tags(), vec![Tag::new("env", "prod")]);
    }

    #[test]
    fn test_observed_tags_cached_per_resource() {
        let mock = MockTransport::new();
        mock.respond("listTags", json!({}));
        let client = CloudClient::with_transport(Box::new(mock.clone()));
        let mut ctx = RunContext::new(&client, ScopeRequest::default(), options(false));

        ctx.observed_tags("a").unwrap();
        ctx.observed_tags("a").unwrap();
        ctx.observed_tags("b").unwrap();
        assert_eq!(mock.count("listTags"), 2);
    }
}
