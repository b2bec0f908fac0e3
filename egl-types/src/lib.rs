//! The type registry: interns named types, stores their member layouts and
//! methods, answers structural queries, and maps each typed entity to its
//! concrete low-level IR type (`spec.md` §3, §4.1).

pub mod lowering;
pub mod queries;
pub mod registry;
pub mod ty;

pub use registry::{
    ClassDef, EnumDef, InterfaceDef, Method, StructDef, TypeRegistry, NOT_LAID_OUT, NOT_FOUND,
};
pub use ty::{ClosureKind, Type, TypeId};
