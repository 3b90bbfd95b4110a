// model-fuzzing/src/consumers/nonterm.rs
//! Shape walker for non-terminal nodes

use regex::Regex;

use crate::model::{Attr, ModelTree, NodeCriteria, NodeId};
use crate::walker::{ConsumerPolicy, NodeConsumer, NodeInterest};

/// Walks non-terminal nodes whose child set can still change, advancing
/// exactly one shape per offer. Interest in the node then ends for the
/// current pass; remaining shapes surface on later offers, after the
/// node's siblings have had their turn, via resets of enclosing
/// non-terminals.
///
/// Shape changes are deliberately not rolled back when interest ends: the
/// point of the walk is to surface each structural form of the data, and
/// shape state is monotonic within a walk anyway.
pub struct NonTermVisitor {
    policy: ConsumerPolicy,
    interest: NodeInterest,
}

impl NonTermVisitor {
    pub fn new(policy: ConsumerPolicy) -> Self {
        Self {
            policy,
            interest: NodeInterest::new(),
        }
    }

    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.interest.set_node_interest(criteria, path_regex);
    }
}

impl Default for NonTermVisitor {
    fn default() -> Self {
        Self::new(ConsumerPolicy::default())
    }
}

impl NodeConsumer for NonTermVisitor {
    fn policy(&self) -> &ConsumerPolicy {
        &self.policy
    }

    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        tree.is_nonterm(node)
            && tree.structure_will_change(node)
            && (self.policy.ignore_mutable_attr || tree.has_attr(node, Attr::Mutable))
            && self.interest.matches(tree, node)
    }

    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
        tree.unfreeze(node, false, true, false);
        tree.freeze(node);
        true
    }

    /// Enclosing non-terminals (their own shape settled) are reset so the
    /// walk re-descends and offers the next shape of the nodes below; a
    /// node still mid-enumeration is left alone, keeping one shape change
    /// per offer.
    fn need_reset(&self, tree: &ModelTree, node: NodeId) -> bool {
        tree.is_nonterm(node) && !tree.structure_will_change(node)
    }
}
