// model-fuzzing/src/consumers/alt_conf.rs
//! Alternate-configuration switching strategy

use std::collections::HashMap;

use regex::Regex;

use crate::model::{ModelTree, NodeCriteria, NodeId};
use crate::walker::{ConsumerPolicy, NodeBackup, NodeConsumer, NodeInterest};

/// Iterates an ordered list of configuration names over every node owning
/// at least one of them: each existing configuration is switched in for one
/// step (names absent on a given node are passed over), then the node is
/// restored exactly as it was found.
pub struct AltConfConsumer {
    policy: ConsumerPolicy,
    confs: Vec<String>,
    /// Per-node position in the configuration list.
    cursors: HashMap<NodeId, usize>,
    backup: NodeBackup,
    interest: NodeInterest,
}

impl AltConfConsumer {
    pub fn new<I, S>(policy: ConsumerPolicy, confs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            policy,
            confs: confs.into_iter().map(Into::into).collect(),
            cursors: HashMap::new(),
            backup: NodeBackup::new(),
            interest: NodeInterest::new(),
        }
    }

    pub fn confs(&self) -> &[String] {
        &self.confs
    }

    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.interest.set_node_interest(criteria, path_regex);
    }

    fn remaining_conf(&self, tree: &ModelTree, node: NodeId) -> Option<usize> {
        let start = self.cursors.get(&node).copied().unwrap_or(0);
        (start..self.confs.len()).find(|&i| {
            tree.is_conf_existing(node, &self.confs[i]) && tree.current_conf(node) != self.confs[i]
        })
    }
}

impl NodeConsumer for AltConfConsumer {
    fn policy(&self) -> &ConsumerPolicy {
        &self.policy
    }

    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        self.remaining_conf(tree, node).is_some() && self.interest.matches(tree, node)
    }

    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
        let Some(idx) = self.remaining_conf(tree, node) else {
            return false;
        };
        tree.set_current_conf(node, &self.confs[idx]);
        tree.freeze(node);
        self.cursors.insert(node, idx + 1);
        true
    }

    fn wait_for_exhaustion(&self, _tree: &ModelTree, _node: NodeId) -> i64 {
        // A positive cap lets the walk draw several values from within the
        // active alternate configuration before moving to the next one.
        match self.policy.max_runs_per_node {
            n if n > 0 => n - 1,
            _ => 0,
        }
    }

    fn still_interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        self.remaining_conf(tree, node).is_some()
    }

    fn save_node(&mut self, tree: &ModelTree, node: NodeId) {
        self.backup.save(tree, node);
    }

    fn recover_node(&mut self, tree: &mut ModelTree, node: NodeId) {
        self.backup.recover(tree, node);
        self.cursors.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypedValue;
    use crate::walker::ModelWalker;

    fn tree_with_alt() -> ModelTree {
        let mut tree = ModelTree::new();
        let head = tree.add_string("head", &["GET"]);
        let body = tree.add_string("body", &["plain"]);
        tree.add_alt_conf_value(body, "compact", TypedValue::fixed(b"zip".to_vec()));
        tree.add_alt_conf_value(body, "verbose", TypedValue::fixed(b"plain+trace".to_vec()));
        let root = tree.add_nonterm("root", vec![head, body]);
        tree.set_root(root);
        tree
    }

    #[test]
    fn switches_each_listed_conf_then_restores() {
        let consumer =
            AltConfConsumer::new(ConsumerPolicy::default(), ["compact", "missing", "verbose"]);
        let mut walker = ModelWalker::new(tree_with_alt(), consumer, true, false, -1, 1).unwrap();

        let first = walker.next_step().unwrap().unwrap();
        assert_eq!(first.consumed_path, "root/body");
        assert_eq!(first.original_value, b"plain");
        assert_eq!(walker.render(), b"GETzip");

        // "missing" does not exist on the node and is passed over.
        let second = walker.next_step().unwrap().unwrap();
        assert_eq!(second.consumed_path, "root/body");
        assert_eq!(walker.render(), b"GETplain+trace");

        assert!(walker.next_step().unwrap().is_none());
        // Interest ended: the node is back on its base configuration.
        assert_eq!(walker.render(), b"GETplain");
    }

    #[test]
    fn no_owning_node_means_no_steps() {
        let consumer = AltConfConsumer::new(ConsumerPolicy::default(), ["absent"]);
        let mut walker = ModelWalker::new(tree_with_alt(), consumer, true, false, -1, 1).unwrap();
        assert!(walker.next_step().unwrap().is_none());
    }
}
