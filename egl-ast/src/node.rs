//! AST node shapes.

use crate::op::{BinOpCode, UnaryOpCode};
use egl_types::TypeId;
use std::cell::Cell;

#[derive(Clone, Debug)]
pub enum Literal {
    Int { value: i64, width: IntWidth },
    Double(f64),
    Nil,
    CString(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntWidth {
    W1,
    W8,
    W16,
    W32,
    W64,
}

/// A parameter or field declaration: a name paired with its type-decl node.
#[derive(Clone, Debug)]
pub struct NamedTypeDecl {
    pub name: String,
    pub type_decl: Node,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Value(Literal),
    Ident(String),

    Binary { op: BinOpCode, left: Box<Node>, right: Box<Node> },
    Unary { op: UnaryOpCode, operand: Box<Node> },

    /// A type reference by source name (e.g. `Foo^`, `int`, `*byte`); the
    /// lowerer resolves it through the type registry's `parse_type_name`.
    /// Pointer/array wrapping is represented by nesting: a `TypeDecl` whose
    /// `pointer` or `array_count` fields wrap an inner `TypeDecl`.
    TypeDecl {
        name: String,
        pointer: Option<Box<PointerMarker>>,
        array_count: Option<Box<Node>>,
    },

    VarDecl { ident: String, type_decl: Box<Node> },

    IfBlock {
        test: Box<Node>,
        block: Vec<Node>,
        if_next: Option<Box<Node>>,
    },

    Loop {
        setup: Option<Box<Node>>,
        test: Option<Box<Node>>,
        update: Option<Box<Node>>,
        block: Vec<Node>,
    },

    Cast { type_decl: Box<Node>, value: Box<Node> },

    StructMemberGet { object: Box<Node>, member: String },

    FunctionCall { callee: Box<Node>, args: Vec<Node> },

    FunctionDecl {
        ident: String,
        params: Vec<NamedTypeDecl>,
        ret_type: Box<Node>,
        body: Option<Vec<Node>>,
    },

    StructDecl {
        name: String,
        fields: Vec<NamedTypeDecl>,
        is_class: bool,
        interfaces: Vec<String>,
        methods: Vec<Node>,
    },

    /// `new T` or `new T { initialiser }`.
    Alloc { type_decl: Box<Node>, initialiser: Option<Box<Node>> },

    /// `break` / `continue`.
    Break,
    Continue,
}

/// Marks a `TypeDecl` as wrapping a pointer to its named target, tracking
/// counted/weak/closed per `spec.md` §3.1.
#[derive(Clone, Debug)]
pub struct PointerMarker {
    pub counted: bool,
    pub weak: bool,
    pub closed: bool,
}

/// One AST node: a kind tag, its source line, and the resultant type slot
/// the lowerer writes back into (`spec.md` §6.3). Resultant type is
/// interior-mutable because the dispatcher receives `&Node` while
/// recursing, matching the "annotates the AST node" wording of §4.3.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub resultant_type: Cell<Option<TypeId>>,
}

impl Node {
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Self { kind, line, resultant_type: Cell::new(None) }
    }

    pub fn resultant_type(&self) -> Option<TypeId> {
        self.resultant_type.get()
    }

    pub fn set_resultant_type(&self, ty: TypeId) {
        self.resultant_type.set(Some(ty));
    }

    // --- builder helpers, used by tests to construct trees directly ---

    pub fn int(value: i64, width: IntWidth, line: u32) -> Self {
        Self::new(NodeKind::Value(Literal::Int { value, width }), line)
    }

    pub fn double(value: f64, line: u32) -> Self {
        Self::new(NodeKind::Value(Literal::Double(value)), line)
    }

    pub fn nil(line: u32) -> Self {
        Self::new(NodeKind::Value(Literal::Nil), line)
    }

    pub fn cstring(value: impl Into<String>, line: u32) -> Self {
        Self::new(NodeKind::Value(Literal::CString(value.into())), line)
    }

    pub fn ident(name: impl Into<String>, line: u32) -> Self {
        Self::new(NodeKind::Ident(name.into()), line)
    }

    pub fn binary(op: BinOpCode, left: Node, right: Node, line: u32) -> Self {
        Self::new(NodeKind::Binary { op, left: Box::new(left), right: Box::new(right) }, line)
    }

    pub fn unary(op: UnaryOpCode, operand: Node, line: u32) -> Self {
        Self::new(NodeKind::Unary { op, operand: Box::new(operand) }, line)
    }

    pub fn type_decl(name: impl Into<String>, line: u32) -> Self {
        Self::new(
            NodeKind::TypeDecl { name: name.into(), pointer: None, array_count: None },
            line,
        )
    }

    pub fn pointer_type_decl(
        name: impl Into<String>,
        counted: bool,
        weak: bool,
        line: u32,
    ) -> Self {
        Self::new(
            NodeKind::TypeDecl {
                name: name.into(),
                pointer: Some(Box::new(PointerMarker { counted, weak, closed: false })),
                array_count: None,
            },
            line,
        )
    }

    pub fn var_decl(ident: impl Into<String>, type_decl: Node, line: u32) -> Self {
        Self::new(
            NodeKind::VarDecl { ident: ident.into(), type_decl: Box::new(type_decl) },
            line,
        )
    }

    pub fn if_block(test: Node, block: Vec<Node>, if_next: Option<Node>, line: u32) -> Self {
        Self::new(
            NodeKind::IfBlock {
                test: Box::new(test),
                block,
                if_next: if_next.map(Box::new),
            },
            line,
        )
    }

    pub fn while_loop(test: Node, block: Vec<Node>, line: u32) -> Self {
        Self::new(
            NodeKind::Loop { setup: None, test: Some(Box::new(test)), update: None, block },
            line,
        )
    }

    pub fn for_loop(
        setup: Option<Node>,
        test: Option<Node>,
        update: Option<Node>,
        block: Vec<Node>,
        line: u32,
    ) -> Self {
        Self::new(
            NodeKind::Loop {
                setup: setup.map(Box::new),
                test: test.map(Box::new),
                update: update.map(Box::new),
                block,
            },
            line,
        )
    }

    pub fn cast(type_decl: Node, value: Node, line: u32) -> Self {
        Self::new(NodeKind::Cast { type_decl: Box::new(type_decl), value: Box::new(value) }, line)
    }

    pub fn struct_member_get(object: Node, member: impl Into<String>, line: u32) -> Self {
        Self::new(
            NodeKind::StructMemberGet { object: Box::new(object), member: member.into() },
            line,
        )
    }

    pub fn call(callee: Node, args: Vec<Node>, line: u32) -> Self {
        Self::new(NodeKind::FunctionCall { callee: Box::new(callee), args }, line)
    }

    pub fn func_decl(
        ident: impl Into<String>,
        params: Vec<NamedTypeDecl>,
        ret_type: Node,
        body: Option<Vec<Node>>,
        line: u32,
    ) -> Self {
        Self::new(
            NodeKind::FunctionDecl {
                ident: ident.into(),
                params,
                ret_type: Box::new(ret_type),
                body,
            },
            line,
        )
    }

    pub fn struct_decl(
        name: impl Into<String>,
        fields: Vec<NamedTypeDecl>,
        is_class: bool,
        interfaces: Vec<String>,
        methods: Vec<Node>,
        line: u32,
    ) -> Self {
        Self::new(
            NodeKind::StructDecl { name: name.into(), fields, is_class, interfaces, methods },
            line,
        )
    }

    pub fn alloc(type_decl: Node, initialiser: Option<Node>, line: u32) -> Self {
        Self::new(
            NodeKind::Alloc { type_decl: Box::new(type_decl), initialiser: initialiser.map(Box::new) },
            line,
        )
    }

    pub fn r#break(line: u32) -> Self {
        Self::new(NodeKind::Break, line)
    }

    pub fn r#continue(line: u32) -> Self {
        Self::new(NodeKind::Continue, line)
    }
}
