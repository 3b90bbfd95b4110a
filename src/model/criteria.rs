// model-fuzzing/src/model/criteria.rs
//! Criteria-based node matching

use regex::Regex;

use crate::model::{ModelTree, NodeId};

/// Node attributes a criteria set can require or exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Mutable,
    Finite,
    Determinist,
    Separator,
    Locked,
}

/// Node content kinds a criteria set can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSel {
    NonTerm,
    Typed,
    Generator,
}

/// Search/interest criteria over nodes.
///
/// All configured constraints are AND-combined; an empty criteria set
/// matches every node. Used both by `ModelTree::reachable` and by consumers
/// to express node interest.
#[derive(Debug, Clone, Default)]
pub struct NodeCriteria {
    required_attrs: Vec<Attr>,
    negative_attrs: Vec<Attr>,
    kinds: Option<Vec<KindSel>>,
    negative_kinds: Vec<KindSel>,
    owned_conf: Option<String>,
    path_regex: Option<Regex>,
}

impl NodeCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.required_attrs.push(attr);
        self
    }

    pub fn without_attr(mut self, attr: Attr) -> Self {
        self.negative_attrs.push(attr);
        self
    }

    pub fn with_kind(mut self, kind: KindSel) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    pub fn without_kind(mut self, kind: KindSel) -> Self {
        self.negative_kinds.push(kind);
        self
    }

    /// Require that the node owns a configuration with this name.
    pub fn with_conf(mut self, name: impl Into<String>) -> Self {
        self.owned_conf = Some(name.into());
        self
    }

    /// Require that the node's path from the root matches this pattern.
    pub fn with_path_regex(mut self, re: Regex) -> Self {
        self.path_regex = Some(re);
        self
    }

    pub fn matches(&self, tree: &ModelTree, node: NodeId) -> bool {
        for attr in &self.required_attrs {
            if !tree.has_attr(node, *attr) {
                return false;
            }
        }
        for attr in &self.negative_attrs {
            if tree.has_attr(node, *attr) {
                return false;
            }
        }
        let kind = tree.kind_sel(node);
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&kind) {
                return false;
            }
        }
        if self.negative_kinds.contains(&kind) {
            return false;
        }
        if let Some(conf) = &self.owned_conf {
            if !tree.is_conf_existing(node, conf) {
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
