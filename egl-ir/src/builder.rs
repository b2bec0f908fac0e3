//! The control-flow graph builder: owns the growing list of basic blocks
//! for one function body and the single mutable insertion point every
//! lowering rule mutates (`spec.md` §5). Components that must emit code
//! away from the current insertion point (entry-block local allocation is
//! the canonical example, `spec.md` §3.4) save the point, relocate, emit,
//! and restore it — violating that discipline corrupts subsequent
//! emission, so the save/restore pair is the only sanctioned way to move
//! the cursor temporarily.

use crate::ir::{
    BasicBlock, BasicBlockData, Local, LocalDecl, Place, RValue, Statement, StatementKind,
    Terminator, TerminatorKind,
};

/// A saved insertion point, restored via [`ControlFlowGraph::restore_insertion_point`].
#[derive(Copy, Clone, Debug)]
pub struct SavedPoint(BasicBlock);

/// Wraps a value produced while lowering together with the block lowering
/// should continue from — the same `BlockAnd<T>` idiom the teacher's
/// builder uses so that emitting into a possibly-new block composes
/// without threading `&mut BasicBlock` through every call by hand.
pub struct BlockAnd<T> {
    pub block: BasicBlock,
    pub value: T,
}

pub trait BlockAndExtend {
    fn and<T>(self, value: T) -> BlockAnd<T>;
    fn unit(self) -> BlockAnd<()>;
}

impl BlockAndExtend for BasicBlock {
    fn and<T>(self, value: T) -> BlockAnd<T> {
        BlockAnd { block: self, value }
    }

    fn unit(self) -> BlockAnd<()> {
        BlockAnd { block: self, value: () }
    }
}

/// Unpacks a [`BlockAnd<T>`], reassigning the `block` binding to the block
/// lowering should continue from and yielding the carried value.
#[macro_export]
macro_rules! unpack {
    ($block:ident = $expr:expr) => {{
        let block_and = $expr;
        $block = block_and.block;
        block_and.value
    }};
    ($expr:expr) => {{
        let block_and = $expr;
        block_and.value
    }};
}

pub struct ControlFlowGraph {
    pub basic_blocks: index_vec::IndexVec<BasicBlock, BasicBlockData>,
    current: BasicBlock,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        let mut basic_blocks = index_vec::IndexVec::new();
        let entry = basic_blocks.push(BasicBlockData::new());
        Self { basic_blocks, current: entry }
    }

    pub fn entry_block(&self) -> BasicBlock {
        BasicBlock::from_usize_unchecked(0)
    }

    pub fn current_block(&self) -> BasicBlock {
        self.current
    }

    /// Append a new, empty block and make it the current insertion point.
    pub fn start_new_block(&mut self) -> BasicBlock {
        let block = self.basic_blocks.push(BasicBlockData::new());
        self.current = block;
        block
    }

    /// Save the current insertion point without changing it. Pairs with
    /// [`Self::restore_insertion_point`].
    pub fn save_insertion_point(&self) -> SavedPoint {
        SavedPoint(self.current)
    }

    pub fn restore_insertion_point(&mut self, saved: SavedPoint) {
        self.current = saved.0;
    }

    /// Temporarily relocate the insertion point to `block`, run `f`, then
    /// restore. This is the save/relocate/emit/restore pattern §5 requires
    /// for entry-block allocations.
    pub fn with_insertion_point<T>(&mut self, block: BasicBlock, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.save_insertion_point();
        self.current = block;
        let result = f(self);
        self.restore_insertion_point(saved);
        result
    }

    pub fn push_statement(&mut self, block: BasicBlock, kind: StatementKind, line: u32) {
        self.basic_blocks[block].statements.push(Statement { kind, line });
    }

    pub fn push_assign(&mut self, block: BasicBlock, place: Place, rvalue: RValue, line: u32) {
        self.push_statement(block, StatementKind::Assign(place, rvalue), line);
    }

    pub fn set_terminator(&mut self, block: BasicBlock, kind: TerminatorKind, line: u32) {
        debug_assert!(
            self.basic_blocks[block].terminator.is_none(),
            "block {block:?} already terminated"
        );
        self.basic_blocks[block].terminator = Some(Terminator { kind, line });
    }

    pub fn goto(&mut self, from: BasicBlock, to: BasicBlock, line: u32) {
        if self.basic_blocks[from].terminator.is_none() {
            self.set_terminator(from, TerminatorKind::Goto(to), line);
        }
    }

    pub fn is_terminated(&self, block: BasicBlock) -> bool {
        self.basic_blocks[block].is_terminated()
    }
}

impl Default for ControlFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the growing locals table for a function body, separate from the
/// `ControlFlowGraph` so that entry-block allocation code can borrow both
/// independently.
pub struct LocalsBuilder {
    pub locals: index_vec::IndexVec<Local, LocalDecl>,
}

impl LocalsBuilder {
    pub fn new(return_decl: LocalDecl) -> Self {
        let mut locals = index_vec::IndexVec::new();
        locals.push(return_decl);
        Self { locals }
    }

    pub fn push(&mut self, decl: LocalDecl) -> Local {
        self.locals.push(decl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Const, Operand};

    #[test]
    fn start_new_block_advances_current() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.entry_block();
        let next = cfg.start_new_block();
        assert_ne!(entry, next);
        assert_eq!(cfg.current_block(), next);
    }

    #[test]
    fn save_restore_returns_to_prior_point() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.entry_block();
        let saved = cfg.save_insertion_point();
        cfg.start_new_block();
        cfg.restore_insertion_point(saved);
        assert_eq!(cfg.current_block(), entry);
    }

    #[test]
    fn with_insertion_point_relocates_and_restores() {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.entry_block();
        let other = cfg.start_new_block();
        cfg.with_insertion_point(entry, |cfg| {
            cfg.push_assign(
                entry,
                Place::from_local(Local::from_usize_unchecked(0)),
                RValue::Use(Operand::Constant(Const::Zero)),
                1,
            );
        });
        assert_eq!(cfg.current_block(), other);
        assert_eq!(cfg.basic_blocks[entry].statements.len(), 1);
    }
}
