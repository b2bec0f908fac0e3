//! The Scope Manager (`spec.md` §4.2): a stack of lexical scopes mapping
//! identifiers to a storage slot and type, plus scope-exit callbacks used
//! to inject cleanup code.
//!
//! `spec.md` §9 asks for scope-exit cleanup to be modelled as droppable
//! handles rather than function pointers hung off scope entries. Each
//! [`Callback`] here is exactly that: an owned closure, run in
//! reverse-registration order by [`ScopeManager::run_callbacks_through`].

use egl_ir::{BasicBlock, ControlFlowGraph, Local};
use egl_types::TypeId;

/// A scope-exit cleanup action: decrement a counted/weak local, decrement
/// every counted pointer in an array, or call a struct's destructor. The
/// closure captures the place and type it acts on at registration time and
/// is handed the live control-flow graph and the block to emit into when
/// it actually runs, so cleanup is emitted wherever `return`/`break`/block
/// exit happens to be, not at registration time.
pub type Callback = Box<dyn Fn(&mut ControlFlowGraph, BasicBlock, u32)>;

struct CallbackEntry {
    callback: Callback,
}

struct Entry {
    name: String,
    local: Option<Local>,
    ty: TypeId,
}

/// One lexical scope: declarations in registration order, plus the
/// cleanup callbacks registered against any of them, also in registration
/// order so they can be run in reverse.
#[derive(Default)]
struct Scope {
    entries: Vec<Entry>,
    callbacks: Vec<CallbackEntry>,
}

/// A handle identifying a scope on the stack, used as the `target_scope`
/// argument to [`ScopeManager::run_callbacks_through`] (e.g. the function
/// scope for `return`, the loop body scope for `break`/`continue`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeMark(usize);

pub struct ScopeManager {
    scopes: Vec<Scope>,
}

impl ScopeManager {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn push(&mut self) -> ScopeMark {
        self.scopes.push(Scope::default());
        self.mark()
    }

    /// Ordinary nesting; callbacks are never run implicitly here — the
    /// code generator runs them explicitly via
    /// [`Self::run_callbacks_through`] at the appropriate control-flow
    /// exit point.
    pub fn pop(&mut self) {
        self.scopes.pop().expect("scope stack underflow");
    }

    pub fn mark(&self) -> ScopeMark {
        ScopeMark(self.scopes.len() - 1)
    }

    /// `put(name, slot, type)`: duplicates in the same scope are only
    /// permitted when the earlier entry has no slot yet (a forward
    /// declaration of an `auto` variable awaiting its first assignment).
    pub fn put(&mut self, name: &str, local: Option<Local>, ty: TypeId) {
        let scope = self.scopes.last_mut().expect("no active scope");
        if let Some(existing) = scope.entries.iter_mut().find(|e| e.name == name) {
            assert!(existing.local.is_none(), "redeclaration of `{name}` in the same scope");
            existing.local = local;
            existing.ty = ty;
            return;
        }
        scope.entries.push(Entry { name: name.to_string(), local, ty });
    }

    /// `get(name) → entry | null`: innermost to outermost search.
    pub fn get(&self, name: &str) -> Option<(Local, TypeId)> {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.entries.iter().find(|e| e.name == name) {
                return entry.local.map(|local| (local, entry.ty));
            }
        }
        None
    }

    /// The declared type of a name whose scope entry has no slot yet — a
    /// forward-declared `auto` awaiting the assignment that fixes its type
    /// (`spec.md` §4.3's var-decl rule), searched innermost to outermost.
    /// Returns `None` once the name has an allocated slot, or isn't declared.
    pub fn pending_declaration(&self, name: &str) -> Option<TypeId> {
        for scope in self.scopes.iter().rev() {
            if let Some(entry) = scope.entries.iter().find(|e| e.name == name) {
                return if entry.local.is_none() { Some(entry.ty) } else { None };
            }
        }
        None
    }

    /// Rewrite an `auto` declaration's resolved type and slot once its
    /// first assignment fixes them (`spec.md` §4.3 var-decl rules).
    pub fn resolve_auto(&mut self, name: &str, local: Local, ty: TypeId) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(entry) = scope.entries.iter_mut().find(|e| e.name == name) {
                entry.local = Some(local);
                entry.ty = ty;
                return;
            }
        }
        panic!("resolve_auto: `{name}` not declared in any active scope");
    }

    /// `add_callback(name, fn, ctx)`: attach a cleanup callback,
    /// associated with the innermost scope currently on the stack (the
    /// scope the declaration lives in).
    pub fn add_callback(&mut self, callback: Callback) {
        let scope = self.scopes.last_mut().expect("no active scope");
        scope.callbacks.push(CallbackEntry { callback });
    }

    /// Run and discard callbacks from the current scope out through (but
    /// not past) `target`, in reverse-registration order within each
    /// scope and outermost-scope-last across scopes — i.e. the most
    /// recently registered cleanup runs first. Emits into `block` of `cfg`.
    pub fn run_callbacks_through(
        &mut self,
        target: ScopeMark,
        cfg: &mut ControlFlowGraph,
        block: BasicBlock,
        line: u32,
    ) {
        debug_assert!(target.0 < self.scopes.len(), "target scope not on the stack");
        for scope in self.scopes[target.0..].iter_mut().rev() {
            for entry in scope.callbacks.iter().rev() {
                (entry.callback)(cfg, block, line);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egl_types::TypeRegistry;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn callbacks_run_in_reverse_registration_order() {
        let mut scopes = ScopeManager::new();
        scopes.push();

        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            scopes.add_callback(Box::new(move |_, _, _| log.borrow_mut().push(i)));
        }

        let mark = scopes.mark();
        let mut cfg = ControlFlowGraph::new();
        let block = cfg.entry_block();
        scopes.run_callbacks_through(mark, &mut cfg, block, 1);
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn get_searches_innermost_first() {
        let reg = TypeRegistry::new();
        let mut scopes = ScopeManager::new();
        scopes.push();
        scopes.put("x", Some(egl_ir::Local::from_usize_unchecked(0)), reg.int32());
        scopes.push();
        scopes.put("x", Some(egl_ir::Local::from_usize_unchecked(1)), reg.double());

        let (local, ty) = scopes.get("x").unwrap();
        assert_eq!(local, egl_ir::Local::from_usize_unchecked(1));
        assert_eq!(ty, reg.double());
    }

    #[test]
    fn forward_declared_auto_can_be_resolved() {
        let reg = TypeRegistry::new();
        let mut scopes = ScopeManager::new();
        scopes.push();
        scopes.put("x", None, reg.auto_type());
        assert!(scopes.get("x").is_none());

        scopes.resolve_auto("x", egl_ir::Local::from_usize_unchecked(3), reg.int32());
        assert_eq!(scopes.get("x"), Some((egl_ir::Local::from_usize_unchecked(3), reg.int32())));
    }
}
