//! Per-statement transient tracking (`spec.md` §3.4, §4.4).
//!
//! Two small keyed tables, scoped to one statement's lowering rather than
//! hung off a global compiler context (`spec.md` §9): **transients** are
//! fresh `new`-allocations awaiting a `check_ptr` balance; **loaded
//! transients** are counted/destructor-owning values returned from calls,
//! awaiting an unconditional decrement unless something consumes them.
//! Both are keyed by the identity of the producing AST node, matching the
//! source's use of the AST pointer as a hashtable key.

use egl_ast::Node;
use egl_ir::Place;
use fnv::FnvHashMap;

/// Identifies an AST node by address for the lifetime of one statement's
/// lowering. Safe here because the AST tree outlives the lowering of any
/// statement within it and is never mutated structurally during lowering.
pub type NodeKey = usize;

pub fn key_of(node: &Node) -> NodeKey {
    node as *const Node as usize
}

#[derive(Default)]
pub struct TransientTables {
    /// Fresh allocations from `new`, not yet consumed by an assignment.
    transients: FnvHashMap<NodeKey, Place>,
    /// Counted/destructor-owning values returned from calls.
    loaded_transients: FnvHashMap<NodeKey, Place>,
}

impl TransientTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transient(&mut self, node: &Node, place: Place) {
        self.transients.insert(key_of(node), place);
    }

    pub fn record_loaded(&mut self, node: &Node, place: Place) {
        self.loaded_transients.insert(key_of(node), place);
    }

    /// Remove and return a plain transient if `node` produced one,
    /// without affecting whether it was "consumed" for refcounting
    /// purposes (matches the source's unconditional removal from the
    /// plain `transients` table on assignment).
    pub fn take_transient(&mut self, node: &Node) -> Option<Place> {
        self.transients.remove(&key_of(node))
    }

    /// Remove and return a loaded transient, signalling that whatever
    /// consumed it should not re-increment (the `transient` flag in
    /// `ac_build_store`).
    pub fn take_loaded(&mut self, node: &Node) -> Option<Place> {
        self.loaded_transients.remove(&key_of(node))
    }

    pub fn is_empty(&self) -> bool {
        self.transients.is_empty() && self.loaded_transients.is_empty()
    }

    /// Drain both tables, returning their contents so the caller can emit
    /// `check_ptr`/`decr_ptr` runtime calls for each before clearing — the
    /// statement-boundary flush required by invariant 5 (`spec.md` §8).
    pub fn drain(&mut self) -> (Vec<Place>, Vec<Place>) {
        let transients = self.transients.drain().map(|(_, p)| p).collect();
        let loaded = self.loaded_transients.drain().map(|(_, p)| p).collect();
        (transients, loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_both_tables() {
        let node = Node::int(1, egl_ast::node::IntWidth::W32, 1);
        let mut tables = TransientTables::new();
        tables.record_transient(&node, Place::return_place());
        assert!(!tables.is_empty());
        let (transients, loaded) = tables.drain();
        assert_eq!(transients.len(), 1);
        assert!(loaded.is_empty());
        assert!(tables.is_empty());
    }
}
