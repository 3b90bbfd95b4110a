// model-fuzzing/src/consumers/separator.rs
//! Separator substitution strategy

use std::collections::{HashMap, VecDeque};

use log::debug;
use regex::Regex;

use crate::model::{ModelTree, NodeCriteria, NodeId};
use crate::walker::{ConsumerPolicy, NodeBackup, NodeConsumer, NodeInterest};

/// Replaces each separator occurrence with the empty string and with every
/// other distinct separator value found in the tree, never with its own
/// value, then restores the original.
pub struct SeparatorDisruption {
    policy: ConsumerPolicy,
    pool: Vec<Vec<u8>>,
    queues: HashMap<NodeId, VecDeque<Vec<u8>>>,
    backup: NodeBackup,
    interest: NodeInterest,
}

impl SeparatorDisruption {
    pub fn new(mut policy: ConsumerPolicy) -> Self {
        // Separators are frequently flagged immutable in models; mutability
        // is not a meaningful gate for this strategy.
        policy.ignore_mutable_attr = true;
        Self {
            policy,
            pool: Vec::new(),
            queues: HashMap::new(),
            backup: NodeBackup::new(),
            interest: NodeInterest::new(),
        }
    }

    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.interest.set_node_interest(criteria, path_regex);
    }
}

impl Default for SeparatorDisruption {
    fn default() -> Self {
        Self::new(ConsumerPolicy::default())
    }
}

impl NodeConsumer for SeparatorDisruption {
    fn policy(&self) -> &ConsumerPolicy {
        &self.policy
    }

    fn preload(&mut self, tree: &mut ModelTree) {
        self.pool = tree.collect_separator_values();
        debug!("separator pool: {} distinct value(s)", self.pool.len());
    }

    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        tree.is_separator(node) && self.interest.matches(tree, node)
    }

    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
        if !self.queues.contains_key(&node) {
            let original = tree.to_bytes(node);
            let mut queue: VecDeque<Vec<u8>> = VecDeque::new();
            queue.push_back(Vec::new());
            for value in &self.pool {
                if *value != original {
                    queue.push_back(value.clone());
                }
            }
            self.queues.insert(node, queue);
        }
        let Some(next) = self.queues.get_mut(&node).and_then(|q| q.pop_front()) else {
            return false;
        };
        tree.force_bytes_value(node, next);
        true
    }

    fn wait_for_exhaustion(&self, _tree: &ModelTree, _node: NodeId) -> i64 {
        -1
    }

    fn still_interested_by(&self, _tree: &ModelTree, node: NodeId) -> bool {
        self.queues.get(&node).is_some_and(|q| !q.is_empty())
    }

    fn save_node(&mut self, tree: &ModelTree, node: NodeId) {
        self.backup.save(tree, node);
    }

    fn recover_node(&mut self, tree: &mut ModelTree, node: NodeId) {
        self.backup.recover(tree, node);
        self.queues.remove(&node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::ModelWalker;

    fn spaced_tree() -> ModelTree {
        let mut tree = ModelTree::new();
        let a = tree.add_string("a", &["one"]);
        let s1 = tree.add_separator("s1", " ");
        let b = tree.add_string("b", &["two"]);
        let s2 = tree.add_separator("s2", ",");
        let c = tree.add_string("c", &["three"]);
        let root = tree.add_nonterm("root", vec![a, s1, b, s2, c]);
        tree.set_root(root);
        tree
    }

    #[test]
    fn substitutes_empty_and_foreign_separators_only() {
        let mut walker =
            ModelWalker::new(spaced_tree(), SeparatorDisruption::default(), true, false, -1, 1)
                .unwrap();
        let mut renders = Vec::new();
        while let Some(_step) = walker.next_step().unwrap() {
            renders.push(walker.render());
        }
        assert_eq!(
            renders,
            vec![
                b"onetwo,three".to_vec(),
                b"one,two,three".to_vec(),
                b"one twothree".to_vec(),
                b"one two three".to_vec(),
            ]
        );
        assert_eq!(walker.render(), b"one two,three");
    }

    #[test]
    fn original_separator_never_reappears_as_a_variant() {
        let mut walker =
            ModelWalker::new(spaced_tree(), SeparatorDisruption::default(), true, false, -1, 1)
                .unwrap();
        while let Some(step) = walker.next_step().unwrap() {
            let current = walker.tree().typed_value(step.consumed).unwrap();
            assert_ne!(current.current_bytes(), step.original_value);
        }
    }
}
