//! The low-level IR that the AST dispatcher lowers into: basic blocks,
//! locals, places, rvalues, statements and terminators, plus a builder
//! that owns the single mutable insertion point the rest of the compiler
//! mutates (`spec.md` §5).

pub mod builder;
pub mod ir;

pub use builder::{BlockAnd, BlockAndExtend, ControlFlowGraph, LocalsBuilder};
pub use ir::*;
