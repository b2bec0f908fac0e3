//! The tagged-variant `Type` representation (`spec.md` §3.1).
//!
//! The source models types with a single-tag-plus-struct-prefix pattern
//! (every `EagleTypeType` begins with a `type` field, then callers cast the
//! pointer to the matching concrete struct). `spec.md` §9 calls for a true
//! sum type instead; [`Type`] is that sum type, and matching on its variant
//! replaces the prefix-cast idiom entirely.

slotmap::new_key_type! {
    /// A handle into the registry's type pool. Base-type requests are
    /// memoised so repeated lookups return the same handle (invariant 1,
    /// `spec.md` §8); aggregate constructors (pointer/array/function) mint a
    /// fresh handle per call, matching the source's "tracked by a memory
    /// pool, disposed at teardown" aggregate allocation model.
    pub struct TypeId;
}

/// How a function type captures its environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    None,
    /// Captures itself, for direct recursion without an external binding.
    Recurse,
    /// A true closure: carries a captured-variable environment record.
    Closed,
}

/// A type is a tagged variant, not a hierarchy (`spec.md` §3.1, §9).
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// The "no type" poison value `promotion`/typechecking routes errors
    /// through; never a valid resultant type for a well-typed expression.
    None,
    Any,
    /// Placeholder for `auto`-declared locals, resolved at first assignment
    /// and never observed past declaration lowering.
    Auto,
    /// The type of the `nil` literal before it is coerced to `*any`.
    Nil,
    Void,
    Int1,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    CString,
    Pointer {
        to: TypeId,
        counted: bool,
        weak: bool,
        /// A "closed" pointer may not be further dereferenced without a
        /// cast (mirrors the `*any` dereference-forbidding rule, §4.3).
        closed: bool,
    },
    Array {
        of: TypeId,
        /// `None` for a dynamically-sized array (`-1` in the source).
        count: Option<u64>,
    },
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
        closure: ClosureKind,
        generator: bool,
    },
    Generator {
        yields: TypeId,
    },
    Struct(String),
    Class(String, Vec<String>),
    /// An interface's name is the ordered, composed list of names it
    /// unions together (`spec.md` calls this `composed_names`).
    Interface(Vec<String>),
    Enum(String),
}

impl Type {
    /// The numeric ordinal used by [`crate::queries::promotion`]'s widening
    /// rule: the operand with the larger ordinal wins.
    pub fn numeric_ordinal(&self) -> Option<u8> {
        match self {
            Type::Int1 => Some(0),
            Type::Int8 => Some(1),
            Type::UInt8 => Some(2),
            Type::Int16 => Some(3),
            Type::UInt16 => Some(4),
            Type::Int32 => Some(5),
            Type::UInt32 => Some(6),
            Type::Int64 => Some(7),
            Type::UInt64 => Some(8),
            Type::Float => Some(9),
            Type::Double => Some(10),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_ordinal().is_some()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }
}
