//! Top-level declaration shapes that never appear inside the lowerable
//! node tree. `spec.md` §6.3's AST contract lists value/binary/unary/
//! var-decl/type-decl/if-block/loop-block/cast/struct-member-get/
//! function-call/function-decl/struct-decl/alloc as the only node kinds the
//! parser produces — `interface`/`enum` declarations have no node of their
//! own. They still need registering against the type registry before
//! `declare_types` runs (a class's `interfaces: Vec<String>` field and a
//! `var x : I` type-decl both resolve a bare interface/enum name), so the
//! driver collects them separately and hands them to the pipeline alongside
//! the node list.

use crate::node::{NamedTypeDecl, Node};

/// One method an interface declares: name plus parameter/return type-decl
/// nodes, resolved the same way a class method's signature is.
#[derive(Clone, Debug)]
pub struct InterfaceMethodSig {
    pub name: String,
    pub params: Vec<NamedTypeDecl>,
    pub ret_type: Node,
}

/// `interface I : A, B { fn m(); }` (or a plain `interface I { fn m(); }`
/// with an empty `composed` list). `composed` holds only the names this
/// interface is explicitly declared to compose from; a plain interface
/// composes nothing else, so `class_implements_interface` treats its own
/// name as its sole composed name (`spec.md`:61).
#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub name: String,
    pub composed: Vec<String>,
    pub methods: Vec<InterfaceMethodSig>,
}

/// `enum E { A, B = 5, C }`. An item with no explicit value takes one more
/// than the previous item's value, starting at `0`.
#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub name: String,
    pub items: Vec<(String, Option<i64>)>,
}
