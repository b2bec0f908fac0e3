//! Core IR data types.

use std::fmt;

index_vec::define_index_type! {
    /// Identifies a basic block within a function body.
    pub struct BasicBlock = u32;
    MAX_INDEX = i32::max_value() as usize;
    DEBUG_FORMAT = "bb{}";
}

index_vec::define_index_type! {
    /// Identifies a local (parameter, named variable, or compiler-generated
    /// temporary) within a function body. Every local corresponds to exactly
    /// one `alloca`-style slot, allocated once in the entry block regardless
    /// of where its declaration appears textually (`spec.md` §3.4).
    pub struct Local = u32;
    MAX_INDEX = i32::max_value() as usize;
    DEBUG_FORMAT = "_{}";
}

/// `_0` is reserved for the return place, mirroring the convention that a
/// function's return slot is a local like any other.
pub const RETURN_LOCAL: Local = Local::from_usize_unchecked(0);

/// The low-level, concrete representation a [`egl_types`]-level `Type` is
/// mapped down to. Distinct from the type registry's tagged `Type` so that
/// this crate has no dependency on type interning; `egl-types` is the one
/// that knows how to produce an `IrType` for a given `Type`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
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
    Void,
    /// A pointer to another IR type. `counted` tracks whether this pointer
    /// is the counted-header-prefixed representation (used to decide
    /// whether increment/decrement calls apply at all, mirroring
    /// `ET_IS_COUNTED`/`ET_IS_WEAK` checks in the source).
    Pointer { to: Box<IrType>, counted: bool, weak: bool },
    Array { of: Box<IrType>, count: Option<u64> },
    /// A named aggregate, declared with [`IrType::Opaque`] before its body
    /// is known (two-pass struct codegen, `spec.md` §4.4) and then filled in.
    Struct { name: String, fields: Vec<IrType> },
    /// A forward-declared, not-yet-laid-out named aggregate.
    Opaque { name: String },
    Function { ret: Box<IrType>, params: Vec<IrType>, variadic: bool },
    /// The six-field counted allocation header (`spec.md` §3.3/§6.2):
    /// `{i64 refcount, i16 weak_count, i16 flags, *i8 weak_list,
    /// *fn(*i8,i1) destructor, T payload}`. Cached per payload type by the
    /// type registry.
    CountedHeader { payload: Box<IrType> },
}

impl IrType {
    pub fn pointer_to(self, counted: bool, weak: bool) -> IrType {
        IrType::Pointer { to: Box::new(self), counted, weak }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Pointer { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            IrType::Int1
                | IrType::Int8
                | IrType::Int16
                | IrType::Int32
                | IrType::Int64
                | IrType::UInt8
                | IrType::UInt16
                | IrType::UInt32
                | IrType::UInt64
                | IrType::Float
                | IrType::Double
        )
    }

    /// ABI size used by `sizeof` (`spec.md` §4.3's unary `s` rule).
    /// Struct sizes are the unpadded sum of field sizes — alignment is a
    /// backend concern this core does not model.
    pub fn abi_size(&self) -> egl_utils::Size {
        use egl_utils::Size;
        match self {
            IrType::Int1 | IrType::Int8 | IrType::UInt8 => Size::from_bytes(1u64),
            IrType::Int16 | IrType::UInt16 => Size::from_bytes(2u64),
            IrType::Int32 | IrType::UInt32 | IrType::Float => Size::from_bytes(4u64),
            IrType::Int64 | IrType::UInt64 | IrType::Double => Size::from_bytes(8u64),
            IrType::Void => Size::ZERO,
            IrType::Pointer { .. } => Size::from_bytes(8u64),
            IrType::Array { of, count } => {
                let elem = of.abi_size();
                Size::from_bytes(count.unwrap_or(0) * elem.bytes())
            }
            IrType::Struct { fields, .. } => {
                fields.iter().fold(Size::ZERO, |acc, f| acc + f.abi_size())
            }
            IrType::Opaque { .. } => Size::ZERO,
            IrType::Function { .. } => Size::from_bytes(8u64),
            IrType::CountedHeader { payload } => {
                // refcount(8) + weak_count(2) + flags(2) + weak_list(8) + destructor(8)
                Size::from_bytes(28u64) + payload.abi_size()
            }
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Int1 => write!(f, "i1"),
            IrType::Int8 => write!(f, "i8"),
            IrType::Int16 => write!(f, "i16"),
            IrType::Int32 => write!(f, "i32"),
            IrType::Int64 => write!(f, "i64"),
            IrType::UInt8 => write!(f, "u8"),
            IrType::UInt16 => write!(f, "u16"),
            IrType::UInt32 => write!(f, "u32"),
            IrType::UInt64 => write!(f, "u64"),
            IrType::Float => write!(f, "float"),
            IrType::Double => write!(f, "double"),
            IrType::Void => write!(f, "void"),
            IrType::Pointer { to, counted, weak } => {
                let tag = if *counted { "^" } else if *weak { "~" } else { "*" };
                write!(f, "{tag}{to}")
            }
            IrType::Array { of, count } => match count {
                Some(n) => write!(f, "[{n} x {of}]"),
                None => write!(f, "[{of}]"),
            },
            IrType::Struct { name, .. } | IrType::Opaque { name } => write!(f, "%{name}"),
            IrType::Function { ret, params, variadic } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if *variadic {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> {ret}")
            }
            IrType::CountedHeader { payload } => write!(f, "header<{payload}>"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

#[derive(Clone, Debug)]
pub struct LocalDecl {
    pub ty: IrType,
    pub mutability: Mutability,
    pub name: Option<String>,
}

impl LocalDecl {
    pub fn new(ty: IrType, mutability: Mutability) -> Self {
        Self { ty, mutability, name: None }
    }

    pub fn named(ty: IrType, mutability: Mutability, name: impl Into<String>) -> Self {
        Self { ty, mutability, name: Some(name.into()) }
    }
}

/// One step of an l-value projection out of a local: field access, array
/// indexing, or pointer dereference.
#[derive(Clone, Debug)]
pub enum PlaceProjection {
    Field(usize),
    Index(Operand),
    Deref,
}

/// An l-value: a local plus zero or more projections.
#[derive(Clone, Debug)]
pub struct Place {
    pub local: Local,
    pub projections: Vec<PlaceProjection>,
}

impl Place {
    pub fn from_local(local: Local) -> Self {
        Self { local, projections: Vec::new() }
    }

    pub fn return_place() -> Self {
        Self::from_local(RETURN_LOCAL)
    }

    pub fn field(mut self, index: usize) -> Self {
        self.projections.push(PlaceProjection::Field(index));
        self
    }

    pub fn index(mut self, operand: Operand) -> Self {
        self.projections.push(PlaceProjection::Index(operand));
        self
    }

    pub fn deref(mut self) -> Self {
        self.projections.push(PlaceProjection::Deref);
        self
    }
}

#[derive(Clone, Debug)]
pub enum Const {
    Int { value: i128, ty: IrType },
    Float(f64),
    Bool(bool),
    /// A null pointer literal of the given pointer type (`nil`, §4.3).
    Null(IrType),
    /// A private global byte-array constant, for C-string literals.
    Str(String),
    /// The function/global referenced by name, used for callee operands.
    FnRef(String),
    Zero,
}

#[derive(Clone, Debug)]
pub enum Operand {
    Copy(Place),
    Move(Place),
    Constant(Const),
}

impl Operand {
    pub fn place(&self) -> Option<&Place> {
        match self {
            Operand::Copy(p) | Operand::Move(p) => Some(p),
            Operand::Constant(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CastKind {
    IntToInt,
    IntToFloat,
    FloatToInt,
    FloatToFloat,
    IntToBool,
    FloatToBool,
    PtrToPtr,
    PtrToInt,
    IntToPtr,
    ArrayToPtr,
}

#[derive(Clone, Debug)]
pub enum RValue {
    Use(Operand),
    Ref(Place),
    BinaryOp(BinOp, Operand, Operand),
    UnaryOp(UnaryOp, Operand),
    Cast(CastKind, Operand, IrType),
    /// Address of the Nth element of an aggregate/array, before load; the
    /// bool distinguishes the "keep a fixed two-GEP vs one-GEP indexing
    /// scheme" for statically-sized arrays vs pointers (`spec.md` §4.3).
    GepIndex { base: Operand, index: Operand, statically_sized: bool },
    /// Construct an aggregate value from field operands in declaration
    /// order, used by struct literal/constructor lowering.
    Aggregate(Vec<Operand>),
}

/// A call to one of the six runtime ABI helpers (`spec.md` §6.1) or a
/// generated struct init/copy/destroy function (§4.4). These are modelled
/// as plain statements rather than terminators because none of them can
/// diverge or unwind in this language.
#[derive(Clone, Debug)]
pub enum RuntimeCall {
    IncrPtr(Operand),
    DecrPtr(Operand),
    CheckPtr(Operand),
    ArrayFillNil { array: Operand, count: u64 },
    ArrayDecrPtrs { array: Operand, count: u64 },
    /// Call `__egl_i_<Name>` / `__egl_c_<Name>` / `__egl_x_<Name>`.
    StructInit { name: String, target: Operand },
    StructCopy { name: String, target: Operand },
    StructDestroy { name: String, target: Operand, through_header: bool },
    /// Clear a weak pointer's registration on its target's `weak_list`
    /// before the slot is overwritten or goes out of scope (`spec.md`
    /// §3.3/§4.4). Not one of the six named ABI helpers in §6.1 but implied
    /// by the header's `weak_list` field — no counted pointer can be freed
    /// safely without it.
    WeakUnregister(Operand),
    /// Register `weak_slot` against `target`'s `weak_list` so that freeing
    /// `target` clears `weak_slot` (`spec.md` §4.4's weak assignment rule).
    WeakRegister { weak_slot: Operand, target: Operand },
    /// `new T` (§4.4's "Allocation lowering"): allocate a fresh counted
    /// header sized for `target`'s pointee, refcount/weak_count/flags/
    /// weak_list zeroed, `destructor` installed (`None` means the payload
    /// needs no destructor call at all — a plain counted-of-plain
    /// allocation), and the payload zero-filled, storing the header pointer
    /// into `target`.
    AllocCounted { target: Operand, destructor: Option<String> },
}

#[derive(Clone, Debug)]
pub enum StatementKind {
    Assign(Place, RValue),
    Runtime(RuntimeCall),
    Nop,
}

#[derive(Clone, Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: u32,
}

#[derive(Clone, Debug)]
pub enum TerminatorKind {
    Goto(BasicBlock),
    If { condition: Operand, then_block: BasicBlock, else_block: BasicBlock },
    Return,
    /// A direct, method, or closure call (`spec.md` §4.3's three calling
    /// conventions are all resolved to a callee operand before this point).
    Call {
        callee: Operand,
        args: Vec<Operand>,
        destination: Option<Place>,
        target: BasicBlock,
    },
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct Terminator {
    pub kind: TerminatorKind,
    pub line: u32,
}

#[derive(Clone, Debug, Default)]
pub struct BasicBlockData {
    pub statements: Vec<Statement>,
    pub terminator: Option<Terminator>,
}

impl BasicBlockData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// A complete lowered function body.
#[derive(Clone, Debug)]
pub struct Body {
    pub name: String,
    pub locals: index_vec::IndexVec<Local, LocalDecl>,
    pub basic_blocks: index_vec::IndexVec<BasicBlock, BasicBlockData>,
    pub arg_count: usize,
    pub return_ty: IrType,
}

impl Body {
    pub fn new(name: impl Into<String>, return_ty: IrType) -> Self {
        let mut locals = index_vec::IndexVec::new();
        locals.push(LocalDecl::new(return_ty.clone(), Mutability::Mutable));
        Self {
            name: name.into(),
            locals,
            basic_blocks: index_vec::IndexVec::new(),
            arg_count: 0,
            return_ty,
        }
    }
}
