// model-fuzzing/src/walker/consumer.rs
//! The consumer protocol: the interface a mutation strategy implements

use std::collections::HashMap;

use regex::Regex;

use crate::constants;
use crate::model::{ModelTree, NodeCriteria, NodeId, NodeSnapshot};

/// Explicit configuration of a consumer, passed at construction.
#[derive(Debug, Clone)]
pub struct ConsumerPolicy {
    /// Honor the structural order of siblings during traversal.
    pub respect_order: bool,
    /// Scale factor applied to generated fuzz-variant queues (1.0 = all).
    pub fuzz_magnitude: f64,
    /// Cap on sub-iterations per node (-1 = no cap).
    pub max_runs_per_node: i64,
    /// Minimum sub-iterations per node (-1 = no minimum).
    pub min_runs_per_node: i64,
    /// Offer nodes regardless of their mutable attribute.
    pub ignore_mutable_attr: bool,
    /// Replay already-processed siblings when a node's structure changes.
    pub consider_side_effects_on_sibling: bool,
    /// Re-visit a node after its structure changed, so the child set of the
    /// new shape gets offered too.
    pub need_reset_when_structure_change: bool,
    /// Ask the environment to re-resolve constraints after each mutation.
    pub fix_constraints: bool,
    /// Suppress steps on nodes whose constraint set is unsatisfiable.
    pub csp_compliance_matters: bool,
}

impl Default for ConsumerPolicy {
    fn default() -> Self {
        Self {
            respect_order: true,
            fuzz_magnitude: constants::DEFAULT_FUZZ_MAGNITUDE,
            max_runs_per_node: constants::DEFAULT_MAX_RUNS_PER_NODE,
            min_runs_per_node: constants::DEFAULT_MIN_RUNS_PER_NODE,
            ignore_mutable_attr: false,
            consider_side_effects_on_sibling: false,
            need_reset_when_structure_change: false,
            fix_constraints: false,
            csp_compliance_matters: false,
        }
    }
}

/// Accumulated interest criteria of a consumer.
///
/// Internals criteria, semantic criteria, configuration membership and the
/// path pattern are independently configurable and AND-combined; with no
/// criteria set, every node is of interest.
#[derive(Debug, Clone, Default)]
pub struct NodeInterest {
    criteria: Option<NodeCriteria>,
    path_regex: Option<Regex>,
}

impl NodeInterest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refine the matching criteria; replaces any previously set criteria.
    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.criteria = criteria;
        self.path_regex = path_regex;
    }

    pub fn matches(&self, tree: &ModelTree, node: NodeId) -> bool {
        if let Some(crit) = &self.criteria {
            if !crit.matches(tree, node) {
                return false;
            }
        }
        if let Some(re) = &self.path_regex {
            match tree.path_from_root(node) {
                Some(path) => {
                    if !re.is_match(&path) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

/// Default save/recover support: verbatim internal-representation backups,
/// keyed per node. Strategies with specialized internal knowledge may skip
/// this and implement a cheaper restore.
#[derive(Debug, Default)]
pub struct NodeBackup {
    snapshots: HashMap<NodeId, NodeSnapshot>,
}

impl NodeBackup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, tree: &ModelTree, node: NodeId) {
        self.snapshots.insert(node, tree.backup_node(node));
    }

    pub fn recover(&mut self, tree: &mut ModelTree, node: NodeId) {
        if let Some(snap) = self.snapshots.remove(&node) {
            tree.restore_node(node, snap);
        }
    }
}

/// A mutation strategy driven by the model walker.
///
/// The walker offers nodes one at a time; the consumer decides whether a
/// node is of interest, mutates it in place, and controls how many variants
/// to produce before the walker moves on.
pub trait NodeConsumer {
    fn policy(&self) -> &ConsumerPolicy;

    /// One-time setup before traversal starts (e.g. pre-scanning the tree).
    fn preload(&mut self, _tree: &mut ModelTree) {}

    /// Whether the consumer wants this node at all.
    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool;

    /// Mutate `node` for the current sub-iteration. Returns `false` when the
    /// node turns out not to be actionable after all; this is re-checked on
    /// every sub-iteration, unlike `interested_by`.
    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool;

    /// Whether the walker should force a fresh unfreeze/refreeze cycle on
    /// this node after declining or finishing with it.
    fn need_reset(&self, _tree: &ModelTree, _node: NodeId) -> bool {
        false
    }

    /// Remaining forced sub-iterations on this node: -1 = until the node
    /// reports exhaustion, 0 = yield once then move on, N-1 = at most N.
    fn wait_for_exhaustion(&self, _tree: &ModelTree, _node: NodeId) -> i64 {
        0
    }

    /// After the node reports exhaustion, whether more variants are queued
    /// for it (triggers another `consume_node` instead of moving on).
    fn still_interested_by(&self, _tree: &ModelTree, _node: NodeId) -> bool {
        false
    }

    /// Snapshot hook invoked right before the first consumption of a node.
    fn save_node(&mut self, _tree: &ModelTree, _node: NodeId) {}

    /// Restore hook invoked when interest in a node ends; must leave the
    /// node and any entangled peers as they were found.
    fn recover_node(&mut self, _tree: &mut ModelTree, _node: NodeId) {}

    /// Notification that the walker reset this node.
    fn do_after_reset(&mut self, _tree: &mut ModelTree, _node: NodeId) {}
}
