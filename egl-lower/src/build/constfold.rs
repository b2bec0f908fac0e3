//! A parallel constant lowerer (`spec.md` §4.4's closing paragraph): folds
//! the same literal kinds and numeric casts the main expression lowerer
//! handles, but never touches the reference-counting machinery and rejects
//! any operand that is not itself a compile-time constant (identifiers,
//! calls, allocations). Used for global initialisers and for the constant
//! array-count position of a type declaration (`Foo[8]`).

use egl_ast::{BinOpCode, Literal, Node, NodeKind};
use egl_ir::Const;
use egl_reporting::{die, CompileError, ErrorKind};
use egl_types::{Type, TypeId, TypeRegistry};

pub type ConstResult<T> = Result<T, CompileError>;

/// Fold `node` into a constant IR value plus its registry type.
pub fn fold_const(registry: &TypeRegistry, node: &Node) -> ConstResult<(Const, TypeId)> {
    match &node.kind {
        NodeKind::Value(Literal::Int { value, width }) => {
            let ty = match width {
                egl_ast::node::IntWidth::W1 => registry.int1(),
                egl_ast::node::IntWidth::W8 => registry.int8(),
                egl_ast::node::IntWidth::W16 => registry.int16(),
                egl_ast::node::IntWidth::W32 => registry.int32(),
                egl_ast::node::IntWidth::W64 => registry.int64(),
            };
            let ir_ty = registry.to_ir_type(ty);
            node.set_resultant_type(ty);
            Ok((Const::Int { value: *value as i128, ty: ir_ty }, ty))
        }
        NodeKind::Value(Literal::Double(value)) => {
            let ty = registry.double();
            node.set_resultant_type(ty);
            Ok((Const::Float(*value), ty))
        }
        NodeKind::Value(Literal::Nil) => {
            let any = registry.any_type();
            let ptr = registry.pointer_type(any, false, false);
            node.set_resultant_type(ptr);
            Ok((Const::Null(registry.to_ir_type(ptr)), ptr))
        }
        NodeKind::Value(Literal::CString(_)) => die!(
            ErrorKind::InternalCompilerError,
            node.line,
            "string literals cannot appear in a constant-folded position"
        ),
        NodeKind::Cast { type_decl, value } => fold_cast(registry, node.line, type_decl, value),
        NodeKind::Binary { op, left, right } => fold_binary(registry, node.line, *op, left, right),
        _ => die!(
            ErrorKind::InternalCompilerError,
            node.line,
            "expression is not a compile-time constant"
        ),
    }
}

fn fold_cast(
    registry: &TypeRegistry,
    line: u32,
    type_decl: &Node,
    value: &Node,
) -> ConstResult<(Const, TypeId)> {
    let NodeKind::TypeDecl { name, pointer, .. } = &type_decl.kind else {
        die!(ErrorKind::InternalCompilerError, line, "cast target is not a type declaration");
    };
    if pointer.is_some() {
        die!(ErrorKind::InvalidCast, line, "pointer casts are not valid in a constant expression");
    }
    let Some(target_ty) = registry.parse_type_name(name) else {
        die!(ErrorKind::UndeclaredIdentifier, line, "unknown type name `{name}`");
    };
    let (source_const, source_ty) = fold_const(registry, value)?;
    let source = registry.get(source_ty);
    let target = registry.get(target_ty);
    if !source.is_numeric() || !target.is_numeric() {
        die!(ErrorKind::InvalidCast, line, "constant casts are only valid between numeric types");
    }

    let folded = match (source_const, &target) {
        (Const::Int { value, .. }, Type::Float | Type::Double) => Const::Float(value as f64),
        (Const::Int { value, .. }, _) => {
            Const::Int { value, ty: registry.to_ir_type(target_ty) }
        }
        (Const::Float(value), Type::Float | Type::Double) => Const::Float(value),
        (Const::Float(value), _) => Const::Int { value: value as i128, ty: registry.to_ir_type(target_ty) },
        _ => die!(ErrorKind::InvalidCast, line, "unsupported constant cast"),
    };
    Ok((folded, target_ty))
}

fn fold_binary(
    registry: &TypeRegistry,
    line: u32,
    op: BinOpCode,
    left: &Node,
    right: &Node,
) -> ConstResult<(Const, TypeId)> {
    let (lv, lty) = fold_const(registry, left)?;
    let (rv, rty) = fold_const(registry, right)?;
    let result_ty = registry.promotion(lty, rty);
    if matches!(registry.get(result_ty), Type::None) {
        die!(ErrorKind::TypeMismatch, line, "constant operands do not share a common numeric type");
    }

    match (lv, rv) {
        (Const::Int { value: a, .. }, Const::Int { value: b, .. }) => {
            let value = match op {
                BinOpCode::Add => a + b,
                BinOpCode::Sub => a - b,
                BinOpCode::Mul => a * b,
                BinOpCode::Div => a / b,
                _ => die!(ErrorKind::InvalidCast, line, "operator is not valid in a constant expression"),
            };
            Ok((Const::Int { value, ty: registry.to_ir_type(result_ty) }, result_ty))
        }
        (Const::Float(a), Const::Float(b)) => {
            let value = match op {
                BinOpCode::Add => a + b,
                BinOpCode::Sub => a - b,
                BinOpCode::Mul => a * b,
                BinOpCode::Div => a / b,
                _ => die!(ErrorKind::InvalidCast, line, "operator is not valid in a constant expression"),
            };
            Ok((Const::Float(value), result_ty))
        }
        _ => die!(ErrorKind::TypeMismatch, line, "mixed constant operand kinds in a constant expression"),
    }
}

/// Fold a constant expression to a non-negative `u64`, for array-count
/// type-declaration positions (`Foo[8]`).
pub fn fold_usize_const(registry: &TypeRegistry, node: &Node) -> ConstResult<u64> {
    let (value, _) = fold_const(registry, node)?;
    match value {
        Const::Int { value, .. } if value >= 0 => Ok(value as u64),
        _ => die!(
            ErrorKind::TypeMismatch,
            node.line,
            "array count must be a non-negative integer constant"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egl_ast::node::IntWidth;

    #[test]
    fn folds_integer_literal_arithmetic() {
        let registry = TypeRegistry::new();
        let node = Node::binary(
            BinOpCode::Add,
            Node::int(3, IntWidth::W32, 1),
            Node::int(4, IntWidth::W32, 1),
            1,
        );
        let (value, ty) = fold_const(&registry, &node).unwrap();
        assert_eq!(ty, registry.int32());
        match value {
            Const::Int { value, .. } => assert_eq!(value, 7),
            other => panic!("expected int constant, got {other:?}"),
        }
    }

    #[test]
    fn rejects_identifiers() {
        let registry = TypeRegistry::new();
        let node = Node::ident("x", 1);
        assert!(fold_const(&registry, &node).is_err());
    }
}
