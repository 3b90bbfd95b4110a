// model-fuzzing/src/walker/mod.rs
//! The model walker: exhaustive traversal driving a consumer over a tree

pub mod consumer;

pub use consumer::{ConsumerPolicy, NodeBackup, NodeConsumer, NodeInterest};

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::constants;
use crate::error::WalkError;
use crate::model::{Attr, ModelTree, NodeCriteria, NodeId};

/// One externally observable output of the engine: the node that was
/// mutated, its resolved path, its value before this sub-iteration's
/// mutation, and a 1-based monotonic step counter over the whole walk.
#[derive(Debug, Clone)]
pub struct WalkStep {
    pub consumed: NodeId,
    pub consumed_path: String,
    pub original_value: Vec<u8>,
    pub step_index: u64,
}

/// Traversal stage of the node currently handled by a frame.
#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Freeze the node and descend into its direct subnodes first.
    Visit,
    /// Offer the node to the consumer.
    Offer,
    /// Mid-consumption: the bounded sub-iteration loop of the protocol.
    /// `runs` counts sub-iterations already produced on this node.
    SubLoop { budget: i64, runs: i64 },
    /// Consumption over; handle structural-change side effects.
    PostOffer,
    /// Move to the next sibling in this frame.
    Advance,
}

/// One pending traversal level: an ordered sibling list being walked.
#[derive(Debug)]
struct Frame {
    nodes: Vec<NodeId>,
    idx: usize,
    stage: Stage,
    shape_before: Option<usize>,
    structure_changed: bool,
}

impl Frame {
    fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            idx: 0,
            stage: Stage::Visit,
            shape_before: None,
            structure_changed: false,
        }
    }
}

/// Walks every reachable node of a tree depth-first, offering each one to a
/// consumer and yielding one [`WalkStep`] per mutation sub-iteration.
///
/// The walker owns the tree for its whole lifetime: between pulls nothing
/// else may mutate node state. A walk cannot be restarted; build a new
/// walker from a fresh tree clone instead.
pub struct ModelWalker<C: NodeConsumer> {
    tree: ModelTree,
    consumer: C,
    max_steps: i64,
    initial_step: u64,
    counter: u64,
    frames: Vec<Frame>,
    memo: HashSet<NodeId>,
    /// Internal events produced so far; resets are refused when a node's
    /// previous reset yielded no new event, which guarantees termination.
    yields: u64,
    last_reset_at: HashMap<NodeId, u64>,
    started: bool,
    finished: bool,
}

impl<C: NodeConsumer> ModelWalker<C> {
    /// Force the tree into its finite form, fix determinism if requested,
    /// perform the initial freeze and let the consumer preload.
    pub fn new(
        mut tree: ModelTree,
        mut consumer: C,
        make_determinist: bool,
        make_random: bool,
        max_steps: i64,
        initial_step: u64,
    ) -> Result<Self, WalkError> {
        if make_determinist && make_random {
            return Err(WalkError::InvalidWalkerConfig(
                "make_determinist and make_random are mutually exclusive".into(),
            ));
        }
        if max_steps != constants::UNBOUNDED_STEPS && max_steps <= 0 {
            return Err(WalkError::InvalidWalkerConfig(format!(
                "max_steps must be positive or -1, got {max_steps}"
            )));
        }
        if initial_step < constants::FIRST_STEP {
            return Err(WalkError::InvalidWalkerConfig(format!(
                "initial_step must be >= 1, got {initial_step}"
            )));
        }
        if !tree.has_root() {
            return Err(WalkError::InvalidWalkerConfig(
                "tree has no root node".into(),
            ));
        }

        tree.make_finite(true, true);
        if make_determinist {
            tree.make_determinist(true, true);
        } else if make_random {
            tree.make_random(true, true);
        }
        tree.freeze_root();
        consumer.preload(&mut tree);

        Ok(Self {
            tree,
            consumer,
            max_steps,
            initial_step,
            counter: constants::FIRST_STEP,
            frames: Vec::new(),
            memo: HashSet::new(),
            yields: 0,
            last_reset_at: HashMap::new(),
            started: false,
            finished: false,
        })
    }

    pub fn tree(&self) -> &ModelTree {
        &self.tree
    }

    /// Materialized bytes of the whole tree in its current (mutated) state.
    pub fn render(&mut self) -> Vec<u8> {
        self.tree.freeze_root()
    }

    /// Hand the tree and consumer back on early abandonment.
    pub fn into_parts(self) -> (ModelTree, C) {
        (self.tree, self.consumer)
    }

    /// Iterator adapter over [`ModelWalker::next_step`].
    pub fn steps(&mut self) -> Steps<'_, C> {
        Steps { walker: self }
    }

    /// Pull the next mutation step. `Ok(None)` is normal exhaustion of the
    /// walk; errors are consumer contract violations and end the walk.
    pub fn next_step(&mut self) -> Result<Option<WalkStep>, WalkError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let event = match self.pump() {
                Ok(ev) => ev,
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            };
            let Some((node, original_value)) = event else {
                self.finished = true;
                return Ok(None);
            };
            self.yields += 1;

            // Materialize generator-driven side effects (recomputed lengths,
            // checksums) before the caller reads bytes.
            self.tree.freeze_root();

            let step_index = self.counter;
            self.counter += 1;
            let stop = self.max_steps != constants::UNBOUNDED_STEPS
                && step_index >= self.initial_step + self.max_steps as u64 - 1;

            if step_index >= self.initial_step {
                if let Some(consumed_path) = self.tree.path_from_root(node) {
                    if stop {
                        self.finished = true;
                    }
                    return Ok(Some(WalkStep {
                        consumed: node,
                        consumed_path,
                        original_value,
                        step_index,
                    }));
                }
                // An existence condition removed the node between mutation
                // and yield; the step is dropped, traversal continues.
                debug!(
                    "step {}: consumed node '{}' vanished from the tree, dropped",
                    step_index,
                    self.tree.name(node)
                );
            }
            if stop {
                self.finished = true;
                return Ok(None);
            }
        }
    }

    /// Drive the traversal state machine until the next internal event
    /// (consumed node + its pre-mutation value) or until exhaustion.
    fn pump(&mut self) -> Result<Option<(NodeId, Vec<u8>)>, WalkError> {
        if !self.started {
            self.started = true;
            let root = self.tree.root();
            self.frames.push(Frame::new(vec![root]));
        }
        loop {
            let Some(fi) = self.frames.len().checked_sub(1) else {
                return Ok(None);
            };
            if self.frames[fi].idx >= self.frames[fi].nodes.len() {
                self.frames.pop();
                continue;
            }
            let node = self.frames[fi].nodes[self.frames[fi].idx];

            match self.frames[fi].stage {
                Stage::Visit => {
                    self.tree.freeze(node);
                    self.frames[fi].shape_before = self.tree.current_shape_idx(node);
                    let kids = self.child_candidates(node);
                    self.frames[fi].stage = Stage::Offer;
                    if !kids.is_empty() {
                        trace!(
                            "descending into {} subnode(s) of '{}'",
                            kids.len(),
                            self.tree.name(node)
                        );
                        self.frames.push(Frame::new(kids));
                    }
                }

                Stage::Offer => {
                    if self.consumer.policy().csp_compliance_matters
                        && !self.tree.csp_satisfiable(node)
                    {
                        // Expected consequence of constraint interaction:
                        // skip without advancing the node's own cursor.
                        debug!(
                            "unsatisfiable constraint set on '{}', step suppressed",
                            self.tree.name(node)
                        );
                        self.frames[fi].stage = Stage::PostOffer;
                        continue;
                    }
                    let interested = !self.memo.contains(&node)
                        && self.consumer.interested_by(&self.tree, node);
                    if !interested {
                        self.decline(fi, node);
                        continue;
                    }
                    let original = self.tree.to_bytes(node);
                    self.consumer.save_node(&self.tree, node);
                    if !self.consumer.consume_node(&mut self.tree, node) {
                        // Not actionable after all; possibly reset, never
                        // re-enter this node's sub-loop.
                        self.decline(fi, node);
                        continue;
                    }
                    self.memo.insert(node);
                    self.freeze_consumed(node);
                    let budget = self.consumer.wait_for_exhaustion(&self.tree, node);
                    self.frames[fi].stage = Stage::SubLoop { budget, runs: 1 };
                    return Ok(Some((node, original)));
                }

                Stage::SubLoop { budget, runs } => {
                    let min_runs = self.consumer.policy().min_runs_per_node;
                    let below_minimum = min_runs > 0 && runs < min_runs;
                    if self.tree.is_exhausted(node) && !below_minimum {
                        if self.consumer.interested_by(&self.tree, node)
                            && self.consumer.still_interested_by(&self.tree, node)
                        {
                            return self.consume_again(fi, node);
                        }
                        self.consumer.recover_node(&mut self.tree, node);
                        self.frames[fi].stage = Stage::PostOffer;
                    } else if budget != 0 || below_minimum {
                        let prev = self.tree.to_bytes(node);
                        self.tree.unfreeze(node, false, true, false);
                        self.freeze_consumed(node);
                        let budget = if budget > 0 { budget - 1 } else { budget };
                        self.frames[fi].stage = Stage::SubLoop {
                            budget,
                            runs: runs + 1,
                        };
                        return Ok(Some((node, prev)));
                    } else if self.consumer.interested_by(&self.tree, node)
                        && self.consumer.still_interested_by(&self.tree, node)
                    {
                        return self.consume_again(fi, node);
                    } else {
                        self.consumer.recover_node(&mut self.tree, node);
                        if self.try_reset(fi, node) {
                            self.frames[fi].stage = Stage::Visit;
                        } else {
                            self.frames[fi].stage = Stage::PostOffer;
                        }
                    }
                }

                Stage::PostOffer => {
                    let changed = self.frames[fi].structure_changed
                        || self.tree.current_shape_idx(node) != self.frames[fi].shape_before;
                    self.frames[fi].structure_changed = false;
                    if !changed {
                        self.frames[fi].stage = Stage::Advance;
                        continue;
                    }
                    // Earlier consumption marks are stale relative to the
                    // new shape: forget everything below this node.
                    self.forget_subtree(node);
                    let revisit = self.consumer.policy().need_reset_when_structure_change;
                    let replay = self.consumer.policy().consider_side_effects_on_sibling
                        && self.frames[fi].idx > 0;
                    self.frames[fi].stage = if revisit { Stage::Visit } else { Stage::Advance };
                    if replay {
                        let preceding: Vec<NodeId> =
                            self.frames[fi].nodes[..self.frames[fi].idx].to_vec();
                        debug!(
                            "structure change on '{}': replaying {} preceding sibling(s)",
                            self.tree.name(node),
                            preceding.len()
                        );
                        for p in &preceding {
                            self.forget_subtree(*p);
                        }
                        self.frames.push(Frame::new(preceding));
                    }
                }

                Stage::Advance => {
                    let frame = &mut self.frames[fi];
                    frame.idx += 1;
                    frame.stage = Stage::Visit;
                    frame.shape_before = None;
                    frame.structure_changed = false;
                }
            }
        }
    }

    /// Another variant family for an exhausted (or budget-spent) node.
    fn consume_again(
        &mut self,
        fi: usize,
        node: NodeId,
    ) -> Result<Option<(NodeId, Vec<u8>)>, WalkError> {
        let prev = self.tree.to_bytes(node);
        if !self.consumer.consume_node(&mut self.tree, node) {
            return Err(WalkError::protocol(
                self.tree.name(node),
                "still_interested_by() granted another variant but consume_node() refused",
            ));
        }
        self.freeze_consumed(node);
        let (budget, runs) = match self.frames[fi].stage {
            Stage::SubLoop { budget, runs } => (budget, runs),
            _ => (0, 1),
        };
        self.frames[fi].stage = Stage::SubLoop {
            budget,
            runs: runs + 1,
        };
        Ok(Some((node, prev)))
    }

    /// Declined offer: attempt a reset if the consumer wants one and the
    /// node still has something to draw, otherwise proceed.
    fn decline(&mut self, fi: usize, node: NodeId) {
        if self.try_reset(fi, node) {
            self.frames[fi].stage = Stage::Visit;
        } else {
            self.frames[fi].stage = Stage::PostOffer;
        }
    }

    /// A reset is only granted when the node is resettable, not exhausted,
    /// and at least one event was produced since its previous reset (a
    /// barren reset would repeat forever).
    fn try_reset(&mut self, fi: usize, node: NodeId) -> bool {
        if !self.consumer.need_reset(&self.tree, node) || self.tree.is_exhausted(node) {
            return false;
        }
        if self.last_reset_at.get(&node).copied() == Some(self.yields) {
            return false;
        }
        self.last_reset_at.insert(node, self.yields);
        self.do_reset(fi, node);
        true
    }

    fn do_reset(&mut self, fi: usize, node: NodeId) {
        trace!("resetting node '{}'", self.tree.name(node));
        let before = self.tree.current_shape_idx(node);
        self.tree.unfreeze(node, false, true, false);
        if self.tree.current_shape_idx(node) != before {
            self.frames[fi].structure_changed = true;
        }
        self.tree.freeze_root();
        self.consumer.do_after_reset(&mut self.tree, node);
        self.forget_subtree(node);
    }

    /// Materialize a just-consumed node, re-resolving constraints first
    /// when the consumer asks for it.
    fn freeze_consumed(&mut self, node: NodeId) {
        if self.consumer.policy().fix_constraints {
            self.tree.fix_constraints(node);
        } else {
            self.tree.freeze(node);
        }
    }

    fn forget_subtree(&mut self, node: NodeId) {
        for d in self.tree.descendants(node) {
            self.memo.remove(&d);
        }
    }

    /// Direct reachable subnodes to descend into: finite nodes, and mutable
    /// ones unless the consumer ignores mutability. Without `respect_order`
    /// terminals are visited ahead of non-terminal siblings.
    fn child_candidates(&self, node: NodeId) -> Vec<NodeId> {
        let mut crit = NodeCriteria::new().with_attr(Attr::Finite);
        if !self.consumer.policy().ignore_mutable_attr {
            crit = crit.with_attr(Attr::Mutable);
        }
        let mut kids = self.tree.reachable(node, &crit, Some(1), true);
        if !self.consumer.policy().respect_order {
            kids.sort_by_key(|kid| self.tree.is_nonterm(*kid));
        }
        kids
    }
}

/// Borrowing iterator over walk steps.
pub struct Steps<'a, C: NodeConsumer> {
    walker: &'a mut ModelWalker<C>,
}

impl<C: NodeConsumer> Iterator for Steps<'_, C> {
    type Item = Result<WalkStep, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.walker.next_step() {
            Ok(Some(step)) => Some(Ok(step)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EveryTerminal {
        policy: ConsumerPolicy,
    }

    impl EveryTerminal {
        fn new() -> Self {
            Self {
                policy: ConsumerPolicy::default(),
            }
        }
    }

    impl NodeConsumer for EveryTerminal {
        fn policy(&self) -> &ConsumerPolicy {
            &self.policy
        }
        fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
            !tree.is_nonterm(node) && !tree.is_exhausted(node)
        }
        fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
            tree.unfreeze(node, false, true, false);
            tree.freeze(node);
            true
        }
    }

    fn small_tree() -> ModelTree {
        let mut tree = ModelTree::new();
        let t1 = tree.add_string("t1", &["a", "b"]);
        let t2 = tree.add_string("t2", &["x", "y"]);
        let root = tree.add_nonterm("root", vec![t1, t2]);
        tree.set_root(root);
        tree
    }

    #[test]
    fn rejects_contradictory_modes() {
        let err = ModelWalker::new(small_tree(), EveryTerminal::new(), true, true, -1, 1);
        assert!(matches!(err, Err(WalkError::InvalidWalkerConfig(_))));
    }

    #[test]
    fn rejects_zero_max_steps() {
        let err = ModelWalker::new(small_tree(), EveryTerminal::new(), true, false, 0, 1);
        assert!(matches!(err, Err(WalkError::InvalidWalkerConfig(_))));
    }

    #[test]
    fn rejects_initial_step_below_one() {
        let err = ModelWalker::new(small_tree(), EveryTerminal::new(), true, false, -1, 0);
        assert!(matches!(err, Err(WalkError::InvalidWalkerConfig(_))));
    }

    #[test]
    fn walk_visits_each_terminal_once() {
        let mut walker =
            ModelWalker::new(small_tree(), EveryTerminal::new(), true, false, -1, 1).unwrap();
        let mut paths = Vec::new();
        while let Some(step) = walker.next_step().unwrap() {
            paths.push(step.consumed_path);
        }
        assert_eq!(paths, vec!["root/t1".to_string(), "root/t2".to_string()]);
    }

    #[test]
    fn step_indices_are_monotonic_from_one() {
        let mut walker =
            ModelWalker::new(small_tree(), EveryTerminal::new(), true, false, -1, 1).unwrap();
        let mut expect = 1;
        while let Some(step) = walker.next_step().unwrap() {
            assert_eq!(step.step_index, expect);
            expect += 1;
        }
    }

    #[test]
    fn max_steps_bounds_the_walk() {
        let mut walker =
            ModelWalker::new(small_tree(), EveryTerminal::new(), true, false, 1, 1).unwrap();
        assert!(walker.next_step().unwrap().is_some());
        assert!(walker.next_step().unwrap().is_none());
    }

    #[test]
    fn csp_unsatisfiable_node_is_skipped_silently() {
        let mut tree = small_tree();
        let crit = NodeCriteria::new().without_attr(Attr::Separator);
        let root = tree.root();
        let terminals = tree.reachable(root, &crit, Some(1), true);
        tree.mark_csp_unsat(terminals[0]);

        let mut consumer = EveryTerminal::new();
        consumer.policy.csp_compliance_matters = true;
        let mut walker = ModelWalker::new(tree, consumer, true, false, -1, 1).unwrap();
        let mut paths = Vec::new();
        while let Some(step) = walker.next_step().unwrap() {
            paths.push(step.consumed_path);
        }
        assert_eq!(paths, vec!["root/t2".to_string()]);
    }

    struct Contradictory {
        policy: ConsumerPolicy,
        consumed: bool,
    }

    impl NodeConsumer for Contradictory {
        fn policy(&self) -> &ConsumerPolicy {
            &self.policy
        }
        fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
            !tree.is_nonterm(node)
        }
        fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
            if self.consumed {
                return false;
            }
            self.consumed = true;
            tree.force_bytes_value(node, b"zz".to_vec());
            true
        }
        fn still_interested_by(&self, _tree: &ModelTree, _node: NodeId) -> bool {
            // Claims another variant but consume_node will refuse it.
            true
        }
    }

    #[test]
    fn contradictory_consumer_is_a_protocol_violation() {
        let consumer = Contradictory {
            policy: ConsumerPolicy::default(),
            consumed: false,
        };
        let mut walker = ModelWalker::new(small_tree(), consumer, true, false, -1, 1).unwrap();
        assert!(walker.next_step().unwrap().is_some());
        let err = walker.next_step();
        assert!(matches!(err, Err(WalkError::ProtocolViolation { .. })));
        // The fault ends the walk.
        assert!(walker.next_step().unwrap().is_none());
    }
}
