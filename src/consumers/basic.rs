// model-fuzzing/src/consumers/basic.rs
//! Exhaustive terminal-value walker

use regex::Regex;

use crate::model::{Attr, ModelTree, NodeCriteria, NodeId};
use crate::walker::{ConsumerPolicy, NodeConsumer, NodeInterest};

/// Walks every non-exhausted terminal and draws its next value, one draw
/// per visit. Non-terminals are never consumed; instead they trigger a
/// reset so the walker re-descends until the whole subtree is exhausted,
/// which makes the walk cover the full value combination space of the
/// terminals below them.
pub struct BasicVisitor {
    policy: ConsumerPolicy,
    interest: NodeInterest,
    consume_also_singletons: bool,
}

impl BasicVisitor {
    pub fn new(policy: ConsumerPolicy) -> Self {
        Self {
            policy,
            interest: NodeInterest::new(),
            consume_also_singletons: false,
        }
    }

    /// Also visit terminals with a single candidate value (they are
    /// exhausted from the start and skipped by default).
    pub fn consume_also_singletons(mut self, on: bool) -> Self {
        self.consume_also_singletons = on;
        self
    }

    /// Restrict the visit to nodes matching `criteria` and/or `path_regex`.
    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.interest.set_node_interest(criteria, path_regex);
    }
}

impl Default for BasicVisitor {
    fn default() -> Self {
        Self::new(ConsumerPolicy::default())
    }
}

impl NodeConsumer for BasicVisitor {
    fn policy(&self) -> &ConsumerPolicy {
        &self.policy
    }

    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        let drawable = !tree.is_exhausted(node)
            || (self.consume_also_singletons && tree.cardinality(node) <= 1);
        !tree.is_nonterm(node)
            && !tree.is_generator(node)
            && drawable
            && (self.policy.ignore_mutable_attr || tree.has_attr(node, Attr::Mutable))
            && self.interest.matches(tree, node)
    }

    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
        tree.unfreeze(node, false, false, false);
        tree.freeze(node);
        true
    }

    fn need_reset(&self, tree: &ModelTree, node: NodeId) -> bool {
        tree.is_nonterm(node)
    }

    fn wait_for_exhaustion(&self, _tree: &ModelTree, _node: NodeId) -> i64 {
        match self.policy.max_runs_per_node {
            n if n > 0 => n - 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::ModelWalker;

    fn two_by_two() -> ModelTree {
        let mut tree = ModelTree::new();
        let t1 = tree.add_string("t1", &["a1", "a2"]);
        let t2 = tree.add_string("t2", &["b1", "b2"]);
        let root = tree.add_nonterm("root", vec![t1, t2]);
        tree.set_root(root);
        tree
    }

    #[test]
    fn covers_the_full_combination_space() {
        let mut walker =
            ModelWalker::new(two_by_two(), BasicVisitor::default(), true, false, -1, 1).unwrap();
        let mut renders = Vec::new();
        while let Some(_step) = walker.next_step().unwrap() {
            renders.push(walker.render());
        }
        assert_eq!(
            renders,
            vec![
                b"a2b1".to_vec(),
                b"a2b2".to_vec(),
                b"a1b2".to_vec(),
                b"a1b1".to_vec(),
            ]
        );
    }

    #[test]
    fn original_value_reports_the_pre_draw_bytes() {
        let mut walker =
            ModelWalker::new(two_by_two(), BasicVisitor::default(), true, false, -1, 1).unwrap();
        let step = walker.next_step().unwrap().unwrap();
        assert_eq!(step.consumed_path, "root/t1");
        assert_eq!(step.original_value, b"a1");
    }

    #[test]
    fn immutable_terminals_are_passed_over() {
        let mut tree = two_by_two();
        let root = tree.root();
        let t1 = tree.reachable(root, &NodeCriteria::new(), Some(1), true)[0];
        tree.set_attr(t1, Attr::Mutable, false);

        let mut walker =
            ModelWalker::new(tree, BasicVisitor::default(), true, false, -1, 1).unwrap();
        let mut paths = Vec::new();
        while let Some(step) = walker.next_step().unwrap() {
            paths.push(step.consumed_path);
        }
        assert!(paths.iter().all(|p| p == "root/t2"));
    }

    #[test]
    fn singleton_terminals_are_visited_on_request() {
        let mut tree = ModelTree::new();
        let only = tree.add_string("only", &["fixed"]);
        let root = tree.add_nonterm("root", vec![only]);
        tree.set_root(root);

        let mut skipping =
            ModelWalker::new(tree.clone(), BasicVisitor::default(), true, false, -1, 1).unwrap();
        assert!(skipping.next_step().unwrap().is_none());

        let consumer = BasicVisitor::default().consume_also_singletons(true);
        let mut visiting = ModelWalker::new(tree, consumer, true, false, -1, 1).unwrap();
        let step = visiting.next_step().unwrap().unwrap();
        assert_eq!(step.consumed_path, "root/only");
        assert_eq!(visiting.render(), b"fixed");
    }

    #[test]
    fn path_interest_narrows_the_walk() {
        let mut consumer = BasicVisitor::default();
        consumer.set_node_interest(None, Some(Regex::new(r"t2$").unwrap()));
        let mut walker = ModelWalker::new(two_by_two(), consumer, true, false, -1, 1).unwrap();
        let mut paths = Vec::new();
        while let Some(step) = walker.next_step().unwrap() {
            paths.push(step.consumed_path);
        }
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p == "root/t2"));
    }
}
