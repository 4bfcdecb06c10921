//! Concurrent symbol prefix tree: a global, cross-index symbol directory.
//!
//! Nodes live in an arena (`Vec<Node>`) addressed by [`NodeId`], and a
//! child→parent back-reference is stored as a plain `NodeId` rather than a
//! `Weak<RefCell<..>>` — per the design note in `spec.md` §9, this avoids
//! reference-counted ownership cycles entirely: the arena (owned by
//! [`SymbolPrefixTree`]) is the only owner, `parent` is just an index.

use crate::symbol::parse_symbol;
use crate::types::{Descriptor, SymbolInformation};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct SymbolVersionEntry {
    pub info: Option<SymbolInformation>,
    pub document_path: String,
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    /// scheme + package id recorded at the leaf.
    preamble: String,
    children: HashMap<Descriptor, NodeId>,
    symbol_versions: HashMap<String, SymbolVersionEntry>,
    revision: i64,
}

impl Node {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            preamble: String::new(),
            children: HashMap::new(),
            symbol_versions: HashMap::new(),
            revision: 0,
        }
    }

    fn is_leaf(&self) -> bool {
        !self.symbol_versions.is_empty()
    }
}

/// Concurrent-safe in the sense required by `spec.md` §5: the tree itself
/// holds no internal lock (its owner, `PartialIndex`, serializes writes
/// with a modification lock and guards readers with a read-write lock
/// around the whole tree).
#[derive(Debug)]
pub struct SymbolPrefixTree {
    arena: Vec<Node>,
    root: NodeId,
}

impl Default for SymbolPrefixTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolPrefixTree {
    pub fn new() -> Self {
        Self {
            arena: vec![Node::new(None)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, parent: NodeId) -> NodeId {
        self.arena.push(Node::new(Some(parent)));
        NodeId(self.arena.len() - 1)
    }

    pub fn node_revision(&self, id: NodeId) -> i64 {
        self.arena[id.0].revision
    }

    pub fn node_symbol_versions(&self, id: NodeId) -> &HashMap<String, SymbolVersionEntry> {
        &self.arena[id.0].symbol_versions
    }

    pub fn node_preamble(&self, id: NodeId) -> &str {
        &self.arena[id.0].preamble
    }

    pub fn node_parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id.0].parent
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id.0].is_leaf()
    }

    /// Parse `info.symbol`, walk/create its descriptor chain, record a
    /// per-version entry at the leaf. Returns the leaf node and whether it
    /// was created by this call.
    pub fn add_symbol(
        &mut self,
        document_path: &str,
        info: SymbolInformation,
        revision: i64,
    ) -> Result<(NodeId, bool), crate::error::SymbolError> {
        let parsed = parse_symbol(&info.symbol)?;
        if parsed.is_local() {
            // Local symbols are never traversed in the tree; callers that
            // need to know this should check `ParsedSymbol::is_local` first.
            return Ok((self.root, false));
        }

        let mut current = self.root;
        let mut is_new = false;
        for descriptor in &parsed.descriptors {
            if let Some(&child) = self.arena[current.0].children.get(descriptor) {
                current = child;
            } else {
                let child = self.alloc(current);
                self.arena[current.0]
                    .children
                    .insert(descriptor.clone(), child);
                current = child;
                is_new = true;
            }
        }

        let preamble = format!("{} {}", parsed.scheme, parsed.package.id());
        let version = parsed.package.version.clone();
        let node = &mut self.arena[current.0];
        node.preamble = preamble;
        node.symbol_versions.insert(
            version,
            SymbolVersionEntry {
                info: Some(info),
                document_path: document_path.to_string(),
            },
        );
        node.revision = node.revision.max(revision);

        Ok((current, is_new))
    }

    /// Parse and walk; `None` if any intermediate descriptor is missing.
    pub fn get_node(&self, symbol: &str) -> Result<Option<NodeId>, crate::error::SymbolError> {
        let parsed = parse_symbol(symbol)?;
        if parsed.is_local() {
            return Ok(None);
        }
        let mut current = self.root;
        for descriptor in &parsed.descriptors {
            match self.arena[current.0].children.get(descriptor) {
                Some(&child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Walk an already-parsed descriptor chain directly (no symbol string
    /// to parse); used by descriptor-based lookups.
    pub fn get_node_by_descriptors(&self, descriptors: &[Descriptor]) -> Option<NodeId> {
        let mut current = self.root;
        for descriptor in descriptors {
            match self.arena[current.0].children.get(descriptor) {
                Some(&child) => current = child,
                None => return None,
            }
        }
        Some(current)
    }

    /// Destructive union: subtrees present only in `other` are re-parented
    /// and spliced in wholesale (no copy); subtrees present in both are
    /// merged recursively, per-version last-writer-wins, whole-node
    /// revision max-wins.
    pub fn merge(&mut self, other: SymbolPrefixTree) {
        let other_root = other.root;
        let mut other = other;
        self.merge_into(self.root, &mut other, other_root);
    }

    fn merge_into(&mut self, local: NodeId, other: &mut SymbolPrefixTree, other_node: NodeId) {
        let other_children: Vec<(Descriptor, NodeId)> = other.arena[other_node.0]
            .children
            .iter()
            .map(|(d, &id)| (d.clone(), id))
            .collect();
        for (descriptor, other_child) in other_children {
            if let Some(&local_child) = self.arena[local.0].children.get(&descriptor) {
                for (version, entry) in
                    std::mem::take(&mut other.arena[other_child.0].symbol_versions)
                {
                    self.arena[local_child.0]
                        .symbol_versions
                        .insert(version, entry);
                }
                let other_preamble = std::mem::take(&mut other.arena[other_child.0].preamble);
                if !other_preamble.is_empty() {
                    self.arena[local_child.0].preamble = other_preamble;
                }
                self.arena[local_child.0].revision = self.arena[local_child.0]
                    .revision
                    .max(other.arena[other_child.0].revision);
                self.merge_into(local_child, other, other_child);
            } else {
                let new_id = self.graft_subtree(other, other_child, local);
                self.arena[local.0].children.insert(descriptor, new_id);
            }
        }
    }

    /// Deep-copies a subtree rooted at `src_node` (from `src` tree) into
    /// `self`, attached under `new_parent`. This is the only place an
    /// actual byte copy happens during merge — grafting a whole subtree
    /// that has no local counterpart is still cheaper than per-node
    /// recursive comparison against an empty local side.
    fn graft_subtree(
        &mut self,
        src: &SymbolPrefixTree,
        src_node: NodeId,
        new_parent: NodeId,
    ) -> NodeId {
        let new_id = self.alloc(new_parent);
        {
            let src_n = &src.arena[src_node.0];
            let dst_n = &mut self.arena[new_id.0];
            dst_n.preamble = src_n.preamble.clone();
            dst_n.symbol_versions = src_n.symbol_versions.clone();
            dst_n.revision = src_n.revision;
        }
        let children: Vec<(Descriptor, NodeId)> = src.arena[src_node.0]
            .children
            .iter()
            .map(|(d, &id)| (d.clone(), id))
            .collect();
        for (descriptor, child) in children {
            let new_child = self.graft_subtree(src, child, new_id);
            self.arena[new_id.0].children.insert(descriptor, new_child);
        }
        new_id
    }

    /// Depth-first from `subtree_root`: delete every child whose
    /// `revision < revision` AND whose `symbol_versions` contains an entry
    /// with `document_path == path`; otherwise recurse into the child.
    /// Pruning is local to the subtree from which it is called.
    pub fn prune(&mut self, subtree_root: NodeId, path: &str, revision: i64) {
        let children: Vec<(Descriptor, NodeId)> = self.arena[subtree_root.0]
            .children
            .iter()
            .map(|(d, &id)| (d.clone(), id))
            .collect();

        for (descriptor, child) in children {
            let should_delete = self.arena[child.0].revision < revision
                && self.arena[child.0]
                    .symbol_versions
                    .values()
                    .any(|e| e.document_path == path);

            if should_delete {
                self.arena[subtree_root.0].children.remove(&descriptor);
                // Arena slots are intentionally leaked (not compacted): a
                // shrinking arena would invalidate NodeIds held elsewhere.
            } else {
                self.prune(child, path, revision);
            }
        }
    }
}
