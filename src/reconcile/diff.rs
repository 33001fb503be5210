//! Desired vs. live set algebra, shared by topics and ACL entries

use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta<T: Ord> {
    /// desired - live
    pub to_create: BTreeSet<T>,
    /// live - desired; empty unless unknown resources may be deleted
    pub to_delete_unknown: BTreeSet<T>,
    /// desired ∩ live; only consumed by teardown
    pub to_delete_provisioned: BTreeSet<T>,
}

impl<T: Ord> Default for Delta<T> {
    fn default() -> Self {
        Self {
            to_create: BTreeSet::new(),
            to_delete_unknown: BTreeSet::new(),
            to_delete_provisioned: BTreeSet::new(),
        }
    }
}

impl<T: Ord> Delta<T> {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete_unknown.is_empty()
    }
}

pub fn diff<T: Ord + Clone>(desired: &BTreeSet<T>, live: &BTreeSet<T>, delete_unknown: bool) -> Delta<T> {
    Delta {
        to_create: desired.difference(live).cloned().collect(),
        to_delete_unknown: if delete_unknown {
            live.difference(desired).cloned().collect()
        } else {
            BTreeSet::new()
        },
        to_delete_provisioned: desired.intersection(live).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_diff_correctness() {
        let live = set(&["a", "b", "c"]);
        let desired = set(&["b", "c", "d"]);

        let delta = diff(&desired, &live, true);
        assert_eq!(delta.to_create, set(&["d"]));
        assert_eq!(delta.to_delete_unknown, set(&["a"]));
        assert_eq!(delta.to_delete_provisioned, set(&["b", "c"]));
    }

    #[test]
    fn test_unknown_kept_when_disabled() {
        let delta = diff(&set(&["b"]), &set(&["a", "b"]), false);
        assert!(delta.to_delete_unknown.is_empty());
        assert!(delta.is_empty());
        assert_eq!(delta.to_delete_provisioned, set(&["b"]));
    }
}
