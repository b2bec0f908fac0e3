//! L-value resolution: identifiers, dereferences, indexing, and struct
//! member access, used by `&x` and by the left-hand side of assignment
//! (`spec.md` §4.3's unary `&` rule and §4.4's assignment policy).

use super::{FunctionLowerer, LowerResult};
use crate::env::GlobalEnv;
use egl_ast::{BinOpCode, Node, NodeKind, UnaryOpCode};
use egl_ir::{BasicBlock, BlockAndExtend, Operand, Place, RValue};
use egl_reporting::{die, ErrorKind};
use egl_types::{Type, TypeId};

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    /// Resolve `node` to an l-value `Place` plus its declared type, without
    /// loading it. Valid only for identifiers, `*p`, `a[i]`, and `x.f` —
    /// anything else is `non-assignable-lhs`.
    pub(super) fn lower_place(
        &mut self,
        block: BasicBlock,
        node: &Node,
    ) -> LowerResult<egl_ir::BlockAnd<(Place, TypeId)>> {
        match &node.kind {
            NodeKind::Ident(name) => {
                let Some((local, ty)) = self.scopes.get(name) else {
                    die!(ErrorKind::UndeclaredIdentifier, node.line, "undeclared identifier `{name}`")
                };
                node.set_resultant_type(ty);
                Ok(block.and((Place::from_local(local), ty)))
            }
            NodeKind::Unary { op: UnaryOpCode::Deref, operand } => {
                let block_and = self.lower_operand(block, operand)?;
                let block = block_and.block;
                let pointee_ty = match self.env.registry().get(block_and.value.ty) {
                    Type::Pointer { to, closed: false, .. } => to,
                    _ => die!(
                        ErrorKind::InvalidDereference,
                        node.line,
                        "cannot dereference a non-pointer or `*any` value"
                    ),
                };
                let operand_place = match block_and.value.value.place() {
                    Some(p) => p.clone(),
                    None => die!(
                        ErrorKind::InvalidDereference,
                        node.line,
                        "cannot dereference a constant"
                    ),
                };
                node.set_resultant_type(pointee_ty);
                Ok(block.and((operand_place.deref(), pointee_ty)))
            }
            NodeKind::Binary { op: BinOpCode::Index, left, right } => {
                self.lower_index_place(block, node, left, right)
            }
            NodeKind::StructMemberGet { object, member } => {
                self.lower_member_place(block, node, object, member)
            }
            _ => die!(
                ErrorKind::NonAssignableLhs,
                node.line,
                "expression is not an l-value"
            ),
        }
    }

    fn lower_index_place(
        &mut self,
        block: BasicBlock,
        node: &Node,
        left: &Node,
        right: &Node,
    ) -> LowerResult<egl_ir::BlockAnd<(Place, TypeId)>> {
        let base = self.lower_operand(block, left)?;
        let block = base.block;
        let idx = self.lower_operand(block, right)?;
        let block = idx.block;
        let int64 = self.env.registry().int64();
        let index_operand = self.coerce_operand(block, idx.value.value, idx.value.ty, int64, right.line)?;

        let (elem_ty, statically_sized) = match self.env.registry().get(base.value.ty) {
            Type::Pointer { to, closed: false, .. } => (to, false),
            Type::Array { of, count } => (of, count.is_some()),
            _ => die!(ErrorKind::InvalidDereference, node.line, "only pointers and arrays may be indexed"),
        };

        let base_place = match base.value.value {
            Operand::Copy(p) | Operand::Move(p) => {
                if statically_sized {
                    p
                } else {
                    p.deref()
                }
            }
            Operand::Constant(_) => {
                die!(ErrorKind::InvalidDereference, node.line, "cannot index a constant")
            }
        };

        node.set_resultant_type(elem_ty);
        Ok(block.and((base_place.index(index_operand), elem_ty)))
    }

    fn lower_member_place(
        &mut self,
        block: BasicBlock,
        node: &Node,
        object: &Node,
        member: &str,
    ) -> LowerResult<egl_ir::BlockAnd<(Place, TypeId)>> {
        let base = self.lower_place(block, object)?;
        let block = base.block;
        let (object_place, object_ty) = base.value;

        if !matches!(self.env.registry().get(object_ty), Type::Struct(_) | Type::Class(_, _)) {
            die!(ErrorKind::UnknownMember, node.line, "`{member}` is not a struct or class member");
        }

        let (index, field_ty) = self.env.registry().struct_member_index(object_ty, member);
        if index == egl_types::NOT_FOUND {
            die!(ErrorKind::UnknownMember, node.line, "no member named `{member}`");
        }
        if index == egl_types::NOT_LAID_OUT {
            die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "member access on a type that has not been laid out yet"
            );
        }
        let field_ty = field_ty.expect("laid-out member always has a type");
        node.set_resultant_type(field_ty);
        Ok(block.and((object_place.field(index as usize), field_ty)))
    }

    /// Numeric-to-numeric coercion used wherever the spec requires an
    /// argument/index/assignment RHS to match a declared type exactly
    /// (`spec.md` §4.3's cast rule, applied implicitly).
    pub(super) fn coerce_operand(
        &mut self,
        block: BasicBlock,
        operand: Operand,
        from: TypeId,
        to: TypeId,
        line: u32,
    ) -> LowerResult<Operand> {
        if self.env.registry().are_same(from, to) {
            return Ok(operand);
        }
        let (from_ty, to_ty) = (self.env.registry().get(from), self.env.registry().get(to));
        if from_ty.is_numeric() && to_ty.is_numeric() {
            let ir_to = self.env.registry().to_ir_type(to);
            let kind = numeric_cast_kind(&from_ty, &to_ty);
            let temp = self.new_temp(to);
            let place = Place::from_local(temp);
            self.cfg.push_assign(block, place.clone(), RValue::Cast(kind, operand, ir_to), line);
            return Ok(Operand::Copy(place));
        }
        die!(ErrorKind::InvalidCast, line, "no implicit conversion between these types")
    }
}

fn numeric_cast_kind(from: &Type, to: &Type) -> egl_ir::CastKind {
    let from_float = matches!(from, Type::Float | Type::Double);
    let to_float = matches!(to, Type::Float | Type::Double);
    match (from_float, to_float) {
        (false, false) => egl_ir::CastKind::IntToInt,
        (false, true) => egl_ir::CastKind::IntToFloat,
        (true, false) => egl_ir::CastKind::FloatToInt,
        (true, true) => egl_ir::CastKind::FloatToFloat,
    }
}
