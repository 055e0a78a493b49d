//! Set reconciliation
//!
//! The symmetric-difference step shared by tag and membership reconciliation.

use std::collections::BTreeSet;

/// Operations needed to turn an observed set into a desired one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T: Ord> {
    /// Observed but not desired
    pub to_remove: BTreeSet<T>,
    /// Desired but not observed
    pub to_add: BTreeSet<T>,
}

impl<T: Ord + Clone> SetDiff<T> {
    /// Compute `observed \ desired` and `desired \ observed`
    pub fn between(desired: &BTreeSet<T>, observed: &BTreeSet<T>) -> Self {
        Self {
            to_remove: observed.difference(desired).cloned().collect(),
            to_add: desired.difference(observed).cloned().collect(),
        }
    }

    /// Whether the sets already agree
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Apply the diff to `observed`, removals first
    pub fn apply(&self, observed: &BTreeSet<T>) -> BTreeSet<T> {
        let mut result: BTreeSet<T> = observed.difference(&self.to_remove).cloned().collect();
        result.extend(self.to_add.iter().cloned());
        result
    }
}

/// Shorthand for [`SetDiff::between`]
pub fn reconcile<T: Ord + Clone>(desired: &BTreeSet<T>, observed: &BTreeSet<T>) -> SetDiff<T> {
    SetDiff::between(desired, observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tag;

    fn tags(pairs: &[(&str, &str)]) -> BTreeSet<Tag> {
        pairs.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
    }

    #[test]
    fn test_changed_value_is_remove_plus_add() {
        let desired = tags(&[("env", "prod"), ("team", "web")]);
        let observed = tags(&[("env", "staging"), ("team", "web"), ("old", "x")]);

        let diff = reconcile(&desired, &observed);
        assert_eq!(diff.to_remove, tags(&[("env", "staging"), ("old", "x")]));
        assert_eq!(diff.to_add, tags(&[("env", "prod")]));
        assert_eq!(diff.apply(&observed), desired);
    }

    #[test]
    fn test_identical_sets_are_idempotent() {
        let set = tags(&[("env", "prod")]);
        assert!(reconcile(&set, &set).is_empty());
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let observed = tags(&[("a", "1"), ("b", "2")]);
        let diff = reconcile(&BTreeSet::new(), &observed);
        assert_eq!(diff.to_remove, observed);
        assert!(diff.to_add.is_empty());
        assert!(diff.apply(&observed).is_empty());
    }

    #[test]
    fn test_membership_ids() {
        let desired: BTreeSet<String> = ["vm-1", "vm-2"].iter().map(|s| s.to_string()).collect();
        let observed: BTreeSet<String> = ["vm-2", "vm-3"].iter().map(|s| s.to_string()).collect();

        let diff = reconcile(&desired, &observed);
        assert_eq!(diff.to_add.into_iter().collect::<Vec<_>>(), vec!["vm-1"]);
        assert_eq!(diff.to_remove.into_iter().collect::<Vec<_>>(), vec!["vm-3"]);
    }
}
