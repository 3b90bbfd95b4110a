// model-fuzzing/src/consumers/typed.rs
//! Value disruption for typed terminals

use std::collections::{HashMap, VecDeque};

use regex::Regex;

use crate::consumers::scaled_len;
use crate::model::{Attr, IntValue, ModelTree, NodeCriteria, NodeId};
use crate::walker::{ConsumerPolicy, NodeBackup, NodeConsumer, NodeInterest};

/// Replaces each typed terminal with a queue of fuzz variants derived from
/// its declared type, one step per variant, then restores the original.
///
/// Integer variants are the out-of-range neighbors of the declared bounds,
/// the bounds themselves and the extremes of the storage type; byte-string
/// variants probe emptiness, length amplification and control bytes. The
/// queue is truncated according to the policy's fuzz magnitude.
pub struct TypedNodeDisruption {
    policy: ConsumerPolicy,
    queues: HashMap<NodeId, VecDeque<Vec<u8>>>,
    /// Separator values observed across the tree, spliced around byte
    /// values as additional variants.
    separators: Vec<Vec<u8>>,
    backup: NodeBackup,
    interest: NodeInterest,
}

impl TypedNodeDisruption {
    pub fn new(policy: ConsumerPolicy) -> Self {
        Self {
            policy,
            queues: HashMap::new(),
            separators: Vec::new(),
            backup: NodeBackup::new(),
            interest: NodeInterest::new(),
        }
    }

    pub fn set_node_interest(&mut self, criteria: Option<NodeCriteria>, path_regex: Option<Regex>) {
        self.interest.set_node_interest(criteria, path_regex);
    }

    fn build_queue(&self, tree: &mut ModelTree, node: NodeId) -> VecDeque<Vec<u8>> {
        let variants = match tree.typed_value(node) {
            Some(value) => match value.as_int() {
                Some(int) => int_variants(int),
                None => bytes_variants(&value.current_bytes(), &self.separators),
            },
            None => Vec::new(),
        };
        let keep = scaled_len(variants.len(), self.policy.fuzz_magnitude);
        variants.into_iter().take(keep).collect()
    }
}

impl Default for TypedNodeDisruption {
    fn default() -> Self {
        Self::new(ConsumerPolicy::default())
    }
}

fn int_variants(value: &IntValue) -> Vec<Vec<u8>> {
    let mut texts: Vec<String> = Vec::new();
    if let Some((lo, hi)) = value.bounds {
        texts.extend([
            (lo as i128 - 1).to_string(),
            (hi as i128 + 1).to_string(),
            lo.to_string(),
            hi.to_string(),
        ]);
    }
    let (tmin, tmax) = type_extremes(value.bits, value.signed);
    texts.extend([tmin, tmax, "0".to_string()]);

    let mut out: Vec<Vec<u8>> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for t in texts {
        if !seen.contains(&t) {
            out.push(t.clone().into_bytes());
            seen.push(t);
        }
    }
    out
}

/// Decimal renderings of the declared storage type's extremes. Computed in
/// 128-bit so a full unsigned 64-bit range keeps its true maximum.
fn type_extremes(bits: u32, signed: bool) -> (String, String) {
    let bits = bits.clamp(1, 64);
    if signed {
        let half = 1i128 << (bits - 1);
        ((-half).to_string(), (half - 1).to_string())
    } else {
        let max = (1u128 << bits) - 1;
        ("0".to_string(), max.to_string())
    }
}

fn bytes_variants(current: &[u8], separators: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut doubled = current.to_vec();
    doubled.extend_from_slice(current);
    let mut out = vec![Vec::new(), doubled, vec![0u8], vec![b'A'; 256]];
    for sep in separators {
        let mut before = sep.clone();
        before.extend_from_slice(current);
        let mut after = current.to_vec();
        after.extend_from_slice(sep);
        out.push(before);
        out.push(after);
    }
    out
}

impl NodeConsumer for TypedNodeDisruption {
    fn policy(&self) -> &ConsumerPolicy {
        &self.policy
    }

    fn preload(&mut self, tree: &mut ModelTree) {
        self.separators = tree.collect_separator_values();
    }

    fn interested_by(&self, tree: &ModelTree, node: NodeId) -> bool {
        tree.typed_value(node).is_some()
            && (self.policy.ignore_mutable_attr || tree.has_attr(node, Attr::Mutable))
            && self.interest.matches(tree, node)
    }

    fn consume_node(&mut self, tree: &mut ModelTree, node: NodeId) -> bool {
        if !self.queues.contains_key(&node) {
            let queue = self.build_queue(tree, node);
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
