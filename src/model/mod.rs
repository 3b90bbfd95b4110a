// model-fuzzing/src/model/mod.rs
//! Arena-backed reference implementation of the grammar-tree contract
//!
//! The walking engine only relies on the operation contracts exposed here
//! (freeze/unfreeze, exhaustion, reachability, configurations, structural
//! change); it never assumes anything about how values are produced.

pub mod criteria;
pub mod value;

pub use criteria::{Attr, KindSel, NodeCriteria};
pub use value::{BytesValue, IntValue, TypedValue};

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Index of a node inside its owning [`ModelTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Per-node attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttrs {
    pub mutable: bool,
    pub finite: bool,
    pub determinist: bool,
    pub separator: bool,
    /// A locked node keeps its forced value across general refreezes.
    pub locked: bool,
}

impl Default for NodeAttrs {
    fn default() -> Self {
        Self {
            mutable: true,
            finite: false,
            determinist: true,
            separator: false,
            locked: false,
        }
    }
}

/// Recompute-on-freeze functions for generator nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum GenFunc {
    /// Decimal byte length of another node's materialized value.
    LenOf(NodeId),
}

/// Content of a node under one configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Ordered child lists; more than one shape means the child set will
    /// change over the course of a walk.
    NonTerm {
        shapes: Vec<Vec<NodeId>>,
        shape_idx: usize,
    },
    /// Terminal holding a typed value.
    Typed(TypedValue),
    /// Generator terminal; `forced` overrides the function output once a
    /// disruption consumer has installed a fuzzed value.
    Gen {
        func: GenFunc,
        forced: Option<TypedValue>,
    },
}

#[derive(Debug, Clone)]
struct NodeEntry {
    name: String,
    kind: NodeKind,
    alt_confs: Vec<(String, NodeKind)>,
    current_conf: String,
    attrs: NodeAttrs,
    frozen: Option<Vec<u8>>,
    entangled: Vec<NodeId>,
    csp_unsat: bool,
}

/// Verbatim backup of a node's internal representation, used by the default
/// save/recover strategy of consumers.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    kind: NodeKind,
    alt_confs: Vec<(String, NodeKind)>,
    current_conf: String,
    attrs: NodeAttrs,
}

/// The grammar tree. Nodes are owned by the arena; children and entangled
/// peers are referenced by index, never by shared pointers.
#[derive(Debug, Clone)]
pub struct ModelTree {
    nodes: Vec<NodeEntry>,
    root: Option<NodeId>,
    rng: StdRng,
}

enum FreezePlan {
    Concat(Vec<NodeId>),
    Bytes(Vec<u8>),
    Gen(GenFunc),
}

impl Default for ModelTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Seed the RNG used for non-deterministic draws.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn push(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            name: name.to_string(),
            kind,
            alt_confs: Vec::new(),
            current_conf: crate::constants::BASE_CONF.to_string(),
            attrs: NodeAttrs::default(),
            frozen: None,
            entangled: Vec::new(),
            csp_unsat: false,
        });
        id
    }

    // --- construction -----------------------------------------------------

    pub fn add_typed(&mut self, name: &str, value: TypedValue) -> NodeId {
        self.push(name, NodeKind::Typed(value))
    }

    pub fn add_string(&mut self, name: &str, values: &[&str]) -> NodeId {
        let candidates = values.iter().map(|s| s.as_bytes().to_vec()).collect();
        self.add_typed(name, TypedValue::bytes(candidates))
    }

    pub fn add_int_field(
        &mut self,
        name: &str,
        candidates: Vec<i64>,
        bounds: Option<(i64, i64)>,
        bits: u32,
        signed: bool,
    ) -> NodeId {
        self.add_typed(name, TypedValue::int(candidates, bounds, bits, signed))
    }

    /// Separator terminal: a fixed single value carrying the separator
    /// attribute.
    pub fn add_separator(&mut self, name: &str, value: &str) -> NodeId {
        let id = self.add_typed(name, TypedValue::fixed(value.as_bytes().to_vec()));
        self.nodes[id.0].attrs.separator = true;
        id
    }

    pub fn add_nonterm(&mut self, name: &str, children: Vec<NodeId>) -> NodeId {
        self.add_nonterm_with_shapes(name, vec![children])
    }

    pub fn add_nonterm_with_shapes(&mut self, name: &str, shapes: Vec<Vec<NodeId>>) -> NodeId {
        self.push(
            name,
            NodeKind::NonTerm {
                shapes,
                shape_idx: 0,
            },
        )
    }

    pub fn add_len_gen(&mut self, name: &str, target: NodeId) -> NodeId {
        self.push(
            name,
            NodeKind::Gen {
                func: GenFunc::LenOf(target),
                forced: None,
            },
        )
    }

    /// Attach an alternate named configuration to a node.
    pub fn add_alt_conf(&mut self, id: NodeId, conf: &str, kind: NodeKind) {
        self.nodes[id.0].alt_confs.push((conf.to_string(), kind));
    }

    pub fn add_alt_conf_children(&mut self, id: NodeId, conf: &str, children: Vec<NodeId>) {
        self.add_alt_conf(
            id,
            conf,
            NodeKind::NonTerm {
                shapes: vec![children],
                shape_idx: 0,
            },
        );
    }

    pub fn add_alt_conf_value(&mut self, id: NodeId, conf: &str, value: TypedValue) {
        self.add_alt_conf(id, conf, NodeKind::Typed(value));
    }

    /// Declare two nodes entangled: value draws propagate between them.
    pub fn entangle(&mut self, a: NodeId, b: NodeId) {
        if !self.nodes[a.0].entangled.contains(&b) {
            self.nodes[a.0].entangled.push(b);
        }
        if !self.nodes[b.0].entangled.contains(&a) {
            self.nodes[b.0].entangled.push(a);
        }
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// Panics when no root has been set; walkers validate this upfront.
    pub fn root(&self) -> NodeId {
        self.root.expect("tree has no root")
    }

    pub fn mark_csp_unsat(&mut self, id: NodeId) {
        self.nodes[id.0].csp_unsat = true;
    }

    pub fn set_attr(&mut self, id: NodeId, attr: Attr, on: bool) {
        let attrs = &mut self.nodes[id.0].attrs;
        match attr {
            Attr::Mutable => attrs.mutable = on,
            Attr::Finite => attrs.finite = on,
            Attr::Determinist => attrs.determinist = on,
            Attr::Separator => attrs.separator = on,
            Attr::Locked => attrs.locked = on,
        }
    }

    // --- introspection ----------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn has_attr(&self, id: NodeId, attr: Attr) -> bool {
        let attrs = &self.nodes[id.0].attrs;
        match attr {
            Attr::Mutable => attrs.mutable,
            Attr::Finite => attrs.finite,
            Attr::Determinist => attrs.determinist,
            Attr::Separator => attrs.separator,
            Attr::Locked => attrs.locked,
        }
    }

    pub fn kind_sel(&self, id: NodeId) -> KindSel {
        match &self.nodes[id.0].kind {
            NodeKind::NonTerm { .. } => KindSel::NonTerm,
            NodeKind::Typed(_) => KindSel::Typed,
            NodeKind::Gen { .. } => KindSel::Generator,
        }
    }

    pub fn is_nonterm(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::NonTerm { .. })
    }

    pub fn is_generator(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Gen { .. })
    }

    pub fn is_separator(&self, id: NodeId) -> bool {
        self.nodes[id.0].attrs.separator
    }

    /// The typed value of a terminal, including a generator's forced value.
    pub fn typed_value(&self, id: NodeId) -> Option<&TypedValue> {
        match &self.nodes[id.0].kind {
            NodeKind::Typed(v) => Some(v),
            NodeKind::Gen {
                forced: Some(v), ..
            } => Some(v),
            _ => None,
        }
    }

    pub fn cardinality(&self, id: NodeId) -> usize {
        self.typed_value(id).map(|v| v.cardinality()).unwrap_or(1)
    }

    /// Children of the node's current shape under its current configuration.
    pub fn direct_children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id.0].kind {
            NodeKind::NonTerm { shapes, shape_idx } => {
                shapes.get(*shape_idx).cloned().unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// The node and every node reachable below it (current shapes/confs).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            let mut kids = self.direct_children(n);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    pub fn current_shape_idx(&self, id: NodeId) -> Option<usize> {
        match &self.nodes[id.0].kind {
            NodeKind::NonTerm { shape_idx, .. } => Some(*shape_idx),
            _ => None,
        }
    }

    /// True while the node's child set will still change on a later freeze.
    pub fn structure_will_change(&self, id: NodeId) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::NonTerm { shapes, shape_idx } => *shape_idx + 1 < shapes.len(),
            _ => false,
        }
    }

    pub fn csp_satisfiable(&self, id: NodeId) -> bool {
        !self.nodes[id.0].csp_unsat
    }

    /// Constraint re-resolution hook. Satisfiability is a static marker in
    /// this model, so re-resolution amounts to refreshing cached values.
    pub fn fix_constraints(&mut self, id: NodeId) {
        self.nodes[id.0].frozen = None;
        self.clear_branch_caches();
        self.freeze(id);
    }

    // --- configurations ---------------------------------------------------

    pub fn current_conf(&self, id: NodeId) -> &str {
        &self.nodes[id.0].current_conf
    }

    pub fn is_conf_existing(&self, id: NodeId, conf: &str) -> bool {
        self.nodes[id.0].current_conf == conf
            || self.nodes[id.0].alt_confs.iter().any(|(n, _)| n == conf)
    }

    /// Switch a node to one of its alternate configurations. The previous
    /// content is stashed under the previous configuration name, so node
    /// identity is preserved and the switch is reversible.
    pub fn set_current_conf(&mut self, id: NodeId, conf: &str) {
        if self.nodes[id.0].current_conf == conf {
            return;
        }
        let Some(pos) = self.nodes[id.0]
            .alt_confs
            .iter()
            .position(|(n, _)| n == conf)
        else {
            return;
        };
        let (new_name, new_kind) = self.nodes[id.0].alt_confs.remove(pos);
        let entry = &mut self.nodes[id.0];
        let old_kind = std::mem::replace(&mut entry.kind, new_kind);
        let old_name = std::mem::replace(&mut entry.current_conf, new_name);
        entry.alt_confs.push((old_name, old_kind));
        self.clear_branch_caches();
        self.nodes[id.0].frozen = None;
    }

    // --- freeze / unfreeze ------------------------------------------------

    /// Materialize the node's current value. Idempotent: repeated calls
    /// without an intervening unfreeze return the same bytes.
    pub fn freeze(&mut self, id: NodeId) -> Vec<u8> {
        if let Some(bytes) = &self.nodes[id.0].frozen {
            return bytes.clone();
        }
        let plan = match &self.nodes[id.0].kind {
            NodeKind::NonTerm { shapes, shape_idx } => {
                FreezePlan::Concat(shapes.get(*shape_idx).cloned().unwrap_or_default())
            }
            NodeKind::Typed(v) => FreezePlan::Bytes(v.current_bytes()),
            NodeKind::Gen {
                forced: Some(v), ..
            } => FreezePlan::Bytes(v.current_bytes()),
            NodeKind::Gen { func, .. } => FreezePlan::Gen(func.clone()),
        };
        let bytes = match plan {
            FreezePlan::Bytes(b) => b,
            FreezePlan::Concat(kids) => {
                let mut out = Vec::new();
                for kid in kids {
                    out.extend(self.freeze(kid));
                }
                out
            }
            FreezePlan::Gen(GenFunc::LenOf(target)) => {
                let len = self.freeze(target).len();
                len.to_string().into_bytes()
            }
        };
        self.nodes[id.0].frozen = Some(bytes.clone());
        bytes
    }

    pub fn freeze_root(&mut self) -> Vec<u8> {
        let root = self.root();
        self.freeze(root)
    }

    pub fn to_bytes(&mut self, id: NodeId) -> Vec<u8> {
        self.freeze(id)
    }

    /// Discard the cached value so the next freeze may redraw. Unless
    /// `dont_change_state`, the node's draw state advances: terminals move
    /// to their next candidate, multi-shape non-terminals move to their next
    /// shape. Entangled peers are kept in sync unless `ignore_entanglement`.
    pub fn unfreeze(
        &mut self,
        id: NodeId,
        recursive: bool,
        ignore_entanglement: bool,
        dont_change_state: bool,
    ) {
        self.nodes[id.0].frozen = None;
        if recursive {
            for d in self.descendants(id) {
                self.nodes[d.0].frozen = None;
            }
        }
        // Branch values depend on descendants, so every non-terminal and
        // generator cache is stale once any node redraws.
        self.clear_branch_caches();

        if dont_change_state {
            return;
        }
        self.advance_state(id);

        if !ignore_entanglement {
            let peers = self.nodes[id.0].entangled.clone();
            if !peers.is_empty() {
                if let Some(v) = self.typed_value(id).cloned() {
                    for peer in peers {
                        if let Some(pv) = self.typed_value_mut(peer) {
                            pv.sync_from(&v);
                        }
                        self.nodes[peer.0].frozen = None;
                    }
                }
            }
        }
    }

    fn advance_state(&mut self, id: NodeId) {
        let determinist = self.nodes[id.0].attrs.determinist;
        let ModelTree { nodes, rng, .. } = self;
        match &mut nodes[id.0].kind {
            NodeKind::Typed(v) => v.advance(if determinist { None } else { Some(rng) }),
            NodeKind::Gen {
                forced: Some(v), ..
            } => v.advance(if determinist { None } else { Some(rng) }),
            NodeKind::Gen { .. } => {}
            NodeKind::NonTerm { shapes, shape_idx } => {
                if *shape_idx + 1 < shapes.len() {
                    *shape_idx += 1;
                }
            }
        }
    }

    fn typed_value_mut(&mut self, id: NodeId) -> Option<&mut TypedValue> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Typed(v) => Some(v),
            NodeKind::Gen {
                forced: Some(v), ..
            } => Some(v),
            _ => None,
        }
    }

    fn clear_branch_caches(&mut self) {
        for entry in &mut self.nodes {
            if matches!(
                entry.kind,
                NodeKind::NonTerm { .. } | NodeKind::Gen { forced: None, .. }
            ) {
                entry.frozen = None;
            }
        }
    }

    /// No further distinct values or shapes remain to be drawn.
    pub fn is_exhausted(&self, id: NodeId) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Typed(v) => v.is_exhausted(),
            NodeKind::Gen {
                forced: Some(v), ..
            } => v.is_exhausted(),
            NodeKind::Gen { .. } => true,
            NodeKind::NonTerm { shapes, shape_idx } => {
                *shape_idx + 1 >= shapes.len()
                    && self
                        .direct_children(id)
                        .iter()
                        .all(|kid| self.is_exhausted(*kid))
            }
        }
    }

    // --- walk-state helpers -----------------------------------------------

    pub fn make_finite(&mut self, _all_conf: bool, recursive: bool) {
        if recursive {
            for entry in &mut self.nodes {
                entry.attrs.finite = true;
            }
        } else if let Some(root) = self.root {
            self.nodes[root.0].attrs.finite = true;
        }
    }

    pub fn make_determinist(&mut self, _all_conf: bool, recursive: bool) {
        self.set_determinism(true, recursive);
    }

    pub fn make_random(&mut self, _all_conf: bool, recursive: bool) {
        self.set_determinism(false, recursive);
    }

    fn set_determinism(&mut self, on: bool, recursive: bool) {
        if recursive {
            for entry in &mut self.nodes {
                entry.attrs.determinist = on;
            }
        } else if let Some(root) = self.root {
            self.nodes[root.0].attrs.determinist = on;
        }
    }

    // --- search -----------------------------------------------------------

    /// Nodes under `from` matching `crit`, in structural (depth-first)
    /// order. `relative_depth` bounds the descent: 1 means direct children
    /// only.
    pub fn reachable(
        &self,
        from: NodeId,
        crit: &NodeCriteria,
        relative_depth: Option<usize>,
        exclude_self: bool,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.reachable_rec(from, crit, relative_depth, exclude_self, 0, &mut out);
        out
    }

    fn reachable_rec(
        &self,
        node: NodeId,
        crit: &NodeCriteria,
        max_depth: Option<usize>,
        exclude: bool,
        depth: usize,
        out: &mut Vec<NodeId>,
    ) {
        if !exclude && crit.matches(self, node) {
            out.push(node);
        }
        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }
        for kid in self.direct_children(node) {
            self.reachable_rec(kid, crit, max_depth, false, depth + 1, out);
        }
    }

    /// Slash-joined name path from the root, or `None` when the node is not
    /// reachable through the current shapes and configurations.
    pub fn path_from_root(&self, id: NodeId) -> Option<String> {
        let root = self.root?;
        let mut path = Vec::new();
        if self.find_path(root, id, &mut path) {
            Some(path.join("/"))
        } else {
            None
        }
    }

    fn find_path(&self, current: NodeId, target: NodeId, path: &mut Vec<String>) -> bool {
        path.push(self.nodes[current.0].name.clone());
        if current == target {
            return true;
        }
        for kid in self.direct_children(current) {
            if self.find_path(kid, target, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    // --- consumer support -------------------------------------------------

    /// Verbatim backup of the node's internal representation.
    pub fn backup_node(&self, id: NodeId) -> NodeSnapshot {
        let entry = &self.nodes[id.0];
        NodeSnapshot {
            kind: entry.kind.clone(),
            alt_confs: entry.alt_confs.clone(),
            current_conf: entry.current_conf.clone(),
            attrs: entry.attrs.clone(),
        }
    }

    /// Restore a backup taken with [`ModelTree::backup_node`]. Entangled
    /// peers are re-synchronized with the restored value.
    pub fn restore_node(&mut self, id: NodeId, snap: NodeSnapshot) {
        {
            let entry = &mut self.nodes[id.0];
            entry.kind = snap.kind;
            entry.alt_confs = snap.alt_confs;
            entry.current_conf = snap.current_conf;
            entry.attrs = snap.attrs;
            entry.frozen = None;
        }
        self.clear_branch_caches();
        let peers = self.nodes[id.0].entangled.clone();
        if let Some(v) = self.typed_value(id).cloned() {
            for peer in peers {
                if let Some(pv) = self.typed_value_mut(peer) {
                    pv.sync_from(&v);
                }
                self.nodes[peer.0].frozen = None;
            }
        }
    }

    /// Install a single fixed value on a terminal and lock it so it survives
    /// the general refreeze that follows a mutation step.
    pub fn force_bytes_value(&mut self, id: NodeId, value: Vec<u8>) {
        let forced = TypedValue::fixed(value);
        match &mut self.nodes[id.0].kind {
            NodeKind::Typed(v) => *v = forced,
            NodeKind::Gen { forced: slot, .. } => *slot = Some(forced),
            NodeKind::NonTerm { .. } => return,
        }
        self.nodes[id.0].attrs.locked = true;
        self.nodes[id.0].attrs.determinist = true;
        self.nodes[id.0].frozen = None;
        self.clear_branch_caches();
    }

    /// All distinct separator values present in the tree (used by separator
    /// disruption preload).
    pub fn collect_separator_values(&mut self) -> Vec<Vec<u8>> {
        let crit = NodeCriteria::new().with_attr(Attr::Separator);
        let root = self.root();
        let ids = self.reachable(root, &crit, None, false);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            let bytes = self.freeze(id);
            if seen.insert(bytes.clone()) {
                out.push(bytes);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> (ModelTree, NodeId, NodeId, NodeId) {
        let mut tree = ModelTree::new();
        let t1 = tree.add_string("t1", &["a1", "a2"]);
        let t2 = tree.add_string("t2", &["b1", "b2"]);
        let root = tree.add_nonterm("root", vec![t1, t2]);
        tree.set_root(root);
        (tree, root, t1, t2)
    }

    #[test]
    fn freeze_is_idempotent() {
        let (mut tree, root, ..) = two_by_two();
        let first = tree.freeze(root);
        let second = tree.freeze(root);
        assert_eq!(first, second);
        assert_eq!(first, b"a1b1");
    }

    #[test]
    fn unfreeze_redraws_single_node() {
        let (mut tree, root, t1, _) = two_by_two();
        tree.freeze(root);
        tree.unfreeze(t1, false, true, false);
        assert_eq!(tree.freeze(root), b"a2b1");
    }

    #[test]
    fn unfreeze_without_state_change_keeps_value() {
        let (mut tree, root, t1, _) = two_by_two();
        tree.freeze(root);
        tree.unfreeze(t1, false, true, true);
        assert_eq!(tree.freeze(root), b"a1b1");
    }

    #[test]
    fn nonterm_exhaustion_requires_all_children() {
        let (mut tree, root, t1, t2) = two_by_two();
        tree.freeze(root);
        assert!(!tree.is_exhausted(root));
        tree.unfreeze(t1, false, true, false);
        tree.unfreeze(t1, false, true, false);
        assert!(tree.is_exhausted(t1));
        assert!(!tree.is_exhausted(root));
        tree.unfreeze(t2, false, true, false);
        tree.unfreeze(t2, false, true, false);
        assert!(tree.is_exhausted(root));
    }

    #[test]
    fn shape_change_advances_on_unfreeze() {
        let mut tree = ModelTree::new();
        let a = tree.add_string("a", &["x"]);
        let b = tree.add_string("b", &["y"]);
        let root = tree.add_nonterm_with_shapes("root", vec![vec![a], vec![b]]);
        tree.set_root(root);
        assert!(tree.structure_will_change(root));
        assert_eq!(tree.freeze(root), b"x");
        tree.unfreeze(root, false, true, false);
        assert!(!tree.structure_will_change(root));
        assert_eq!(tree.freeze(root), b"y");
        // The node from the abandoned shape has no path anymore.
        assert!(tree.path_from_root(a).is_none());
        assert_eq!(tree.path_from_root(b).as_deref(), Some("root/b"));
    }

    #[test]
    fn conf_switch_is_reversible() {
        let mut tree = ModelTree::new();
        let t = tree.add_string("t", &["plain"]);
        let root = tree.add_nonterm("root", vec![t]);
        tree.set_root(root);
        tree.add_alt_conf_value(t, "alt", TypedValue::fixed(b"other".to_vec()));

        assert_eq!(tree.freeze_root(), b"plain");
        assert!(tree.is_conf_existing(t, "alt"));
        tree.set_current_conf(t, "alt");
        assert_eq!(tree.current_conf(t), "alt");
        assert_eq!(tree.freeze_root(), b"other");
        tree.set_current_conf(t, crate::constants::BASE_CONF);
        assert_eq!(tree.freeze_root(), b"plain");
    }

    #[test]
    fn len_generator_recomputes_after_redraw() {
        let mut tree = ModelTree::new();
        let payload = tree.add_string("payload", &["abc", "abcdef"]);
        let len = tree.add_len_gen("len", payload);
        let root = tree.add_nonterm("root", vec![len, payload]);
        tree.set_root(root);

        assert_eq!(tree.freeze_root(), b"3abc");
        tree.unfreeze(payload, false, true, false);
        assert_eq!(tree.freeze_root(), b"6abcdef");
    }

    #[test]
    fn entangled_peers_stay_in_sync() {
        let mut tree = ModelTree::new();
        let a = tree.add_string("a", &["x", "y"]);
        let b = tree.add_string("b", &["x", "y"]);
        let root = tree.add_nonterm("root", vec![a, b]);
        tree.set_root(root);
        tree.entangle(a, b);

        tree.freeze_root();
        tree.unfreeze(a, false, false, false);
        assert_eq!(tree.freeze_root(), b"yy");
    }

    #[test]
    fn backup_restore_roundtrip() {
        let (mut tree, root, t1, _) = two_by_two();
        tree.freeze(root);
        let snap = tree.backup_node(t1);
        tree.force_bytes_value(t1, b"ZZZ".to_vec());
        assert_eq!(tree.freeze(root), b"ZZZb1");
        assert!(tree.has_attr(t1, Attr::Locked));
        tree.restore_node(t1, snap);
        assert_eq!(tree.freeze(root), b"a1b1");
        assert!(!tree.has_attr(t1, Attr::Locked));
    }

    #[test]
    fn reachable_respects_depth_and_criteria() {
        let mut tree = ModelTree::new();
        let leaf = tree.add_string("leaf", &["v"]);
        let sep = tree.add_separator("sep", " ");
        let inner = tree.add_nonterm("inner", vec![leaf, sep]);
        let root = tree.add_nonterm("root", vec![inner]);
        tree.set_root(root);

        let all = tree.reachable(root, &NodeCriteria::new(), None, true);
        assert_eq!(all.len(), 3);

        let direct = tree.reachable(root, &NodeCriteria::new(), Some(1), true);
        assert_eq!(direct, vec![inner]);

        let seps = tree.reachable(
            root,
            &NodeCriteria::new().with_attr(Attr::Separator),
            None,
            true,
        );
        assert_eq!(seps, vec![sep]);
    }

    #[test]
    fn separator_collection_dedups() {
        let mut tree = ModelTree::new();
        let s1 = tree.add_separator("s1", " ");
        let s2 = tree.add_separator("s2", "  ");
        let s3 = tree.add_separator("s3", " ");
        let root = tree.add_nonterm("root", vec![s1, s2, s3]);
        tree.set_root(root);
        let seps = tree.collect_separator_values();
        assert_eq!(seps, vec![b" ".to_vec(), b"  ".to_vec()]);
    }
}
