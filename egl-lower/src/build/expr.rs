//! The Expression Lowerer (`spec.md` §4.3): produces an IR operand for
//! every expression kind and annotates the AST node with its resultant
//! type.

use super::{FunctionLowerer, LowerResult, Typed};
use crate::env::GlobalEnv;
use egl_ast::{BinOpCode, Literal, Node, NodeKind, UnaryOpCode};
use egl_ir::{
    BasicBlock, BinOp, BlockAnd, BlockAndExtend, CastKind, Const, Operand, Place, RValue, UnaryOp,
};
use egl_reporting::{die, ErrorKind};
use egl_types::Type;

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    pub(super) fn lower_operand(
        &mut self,
        block: BasicBlock,
        node: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        match &node.kind {
            NodeKind::Value(lit) => self.lower_literal(block, node, lit),
            NodeKind::Ident(name) => self.lower_ident(block, node, name),
            NodeKind::Binary { op, left, right } => self.lower_binary(block, node, *op, left, right),
            NodeKind::Unary { op, operand } => self.lower_unary(block, node, *op, operand),
            NodeKind::Cast { type_decl, value } => self.lower_cast(block, node, type_decl, value),
            NodeKind::StructMemberGet { object, member } => {
                let place_and = self.lower_member_operand(block, node, object, member)?;
                Ok(place_and)
            }
            NodeKind::FunctionCall { callee, args } => self.lower_call(block, node, callee, args),
            NodeKind::Alloc { type_decl, initialiser } => {
                self.lower_alloc(block, node, type_decl, initialiser.as_deref())
            }
            _ => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "node kind is not a value-producing expression"
            ),
        }
    }

    fn lower_literal(
        &mut self,
        block: BasicBlock,
        node: &Node,
        lit: &Literal,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let registry = self.env.registry();
        let (ty, value) = match lit {
            Literal::Int { value, width } => {
                let ty = match width {
                    egl_ast::node::IntWidth::W1 => registry.int1(),
                    egl_ast::node::IntWidth::W8 => registry.int8(),
                    egl_ast::node::IntWidth::W16 => registry.int16(),
                    egl_ast::node::IntWidth::W32 => registry.int32(),
                    egl_ast::node::IntWidth::W64 => registry.int64(),
                };
                let ir_ty = registry.to_ir_type(ty);
                (ty, Const::Int { value: *value as i128, ty: ir_ty })
            }
            Literal::Double(value) => (registry.double(), Const::Float(*value)),
            Literal::Nil => {
                let any = registry.any_type();
                let ptr_ty = registry.pointer_type(any, false, false);
                let ir_ty = registry.to_ir_type(ptr_ty);
                (ptr_ty, Const::Null(ir_ty))
            }
            Literal::CString(text) => {
                let symbol = self.env.intern_cstring(text);
                (registry.cstring(), Const::Str(symbol))
            }
        };
        node.set_resultant_type(ty);
        Ok(block.and(Typed { value: Operand::Constant(value), ty }))
    }

    fn lower_ident(
        &mut self,
        block: BasicBlock,
        node: &Node,
        name: &str,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let Some((local, ty)) = self.scopes.get(name) else {
            die!(ErrorKind::UndeclaredIdentifier, node.line, "undeclared identifier `{name}`")
        };
        node.set_resultant_type(ty);
        let place = Place::from_local(local);
        let value = match self.env.registry().get(ty) {
            // Callable entries are used directly, never loaded.
            Type::Function { .. } => Operand::Copy(place),
            // Arrays and aggregates decay to their slot address.
            Type::Array { .. } | Type::Struct(_) | Type::Class(_, _) => {
                let addr_ty = self.env.registry().pointer_type(ty, false, false);
                let addr_local = self.new_temp(addr_ty);
                let addr_place = Place::from_local(addr_local);
                self.cfg.push_assign(block, addr_place.clone(), RValue::Ref(place), node.line);
                Operand::Copy(addr_place)
            }
            _ => Operand::Copy(place),
        };
        Ok(block.and(Typed { value, ty }))
    }

    fn lower_member_operand(
        &mut self,
        block: BasicBlock,
        node: &Node,
        object: &Node,
        member: &str,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let place_and = self.lower_place(block, node)?;
        let block = place_and.block;
        let (place, ty) = place_and.value;
        let _ = (object, member);
        let value = match self.env.registry().get(ty) {
            Type::Array { .. } | Type::Struct(_) | Type::Class(_, _) => {
                let addr_ty = self.env.registry().pointer_type(ty, false, false);
                let addr_local = self.new_temp(addr_ty);
                let addr_place = Place::from_local(addr_local);
                self.cfg.push_assign(block, addr_place.clone(), RValue::Ref(place), node.line);
                Operand::Copy(addr_place)
            }
            _ => Operand::Copy(place),
        };
        Ok(block.and(Typed { value, ty }))
    }

    fn lower_cast(
        &mut self,
        block: BasicBlock,
        node: &Node,
        type_decl: &Node,
        value: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let target_ty = self.resolve_type_decl(type_decl)?;
        let operand_and = self.lower_operand(block, value)?;
        let block = operand_and.block;
        let Typed { value: operand, ty: source_ty } = operand_and.value;

        let (source, target) = (self.env.registry().get(source_ty), self.env.registry().get(target_ty));
        let kind = if source.is_numeric() && target.is_numeric() {
            numeric_cast_kind(&source, &target)
        } else if source.is_pointer() && target.is_pointer() {
            CastKind::PtrToPtr
        } else if source.is_pointer() && target.is_numeric() {
            CastKind::PtrToInt
        } else if source.is_numeric() && target.is_pointer() {
            CastKind::IntToPtr
        } else if matches!(source, Type::Array { .. }) && target.is_pointer() {
            CastKind::ArrayToPtr
        } else {
            die!(ErrorKind::InvalidCast, node.line, "no valid conversion between these types")
        };

        let ir_target = self.env.registry().to_ir_type(target_ty);
        let temp = self.new_temp(target_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(block, place.clone(), RValue::Cast(kind, operand, ir_target), node.line);
        node.set_resultant_type(target_ty);
        Ok(block.and(Typed { value: Operand::Copy(place), ty: target_ty }))
    }

    fn lower_binary(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        left: &Node,
        right: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        match op {
            BinOpCode::Assign => self.lower_assign(block, node, left, right),
            BinOpCode::AddAssign | BinOpCode::SubAssign | BinOpCode::MulAssign | BinOpCode::DivAssign => {
                self.lower_compound_assign(block, node, op, left, right)
            }
            BinOpCode::Index => {
                let place_and = self.lower_place(block, node)?;
                let block = place_and.block;
                let (place, ty) = place_and.value;
                Ok(block.and(Typed { value: Operand::Copy(place), ty }))
            }
            BinOpCode::And | BinOpCode::Or => self.lower_short_circuit(block, node, op, left, right),
            BinOpCode::Eq | BinOpCode::Neq | BinOpCode::Gt | BinOpCode::Lt | BinOpCode::Ge | BinOpCode::Le => {
                self.lower_comparison(block, node, op, left, right)
            }
            BinOpCode::Add | BinOpCode::Sub | BinOpCode::Mul | BinOpCode::Div => {
                self.lower_arithmetic(block, node, op, left, right)
            }
        }
    }

    fn lower_arithmetic(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        left: &Node,
        right: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let lhs = self.lower_operand(block, left)?;
        let block = lhs.block;
        let rhs = self.lower_operand(block, right)?;
        let block = rhs.block;

        let lhs_is_ptr = self.env.registry().get(lhs.value.ty).is_pointer();
        let rhs_is_ptr = self.env.registry().get(rhs.value.ty).is_pointer();
        if lhs_is_ptr || rhs_is_ptr {
            return self.lower_pointer_arithmetic(block, node, op, lhs.value, rhs.value);
        }

        let result_ty = self.env.registry().promotion(lhs.value.ty, rhs.value.ty);
        if matches!(self.env.registry().get(result_ty), Type::None) {
            die!(ErrorKind::TypeMismatch, node.line, "operands do not share a common numeric type");
        }
        let lhs_op = self.coerce_operand(block, lhs.value.value, lhs.value.ty, result_ty, left.line)?;
        let rhs_op = self.coerce_operand(block, rhs.value.value, rhs.value.ty, result_ty, right.line)?;

        let bin_op = match op {
            BinOpCode::Add => BinOp::Add,
            BinOpCode::Sub => BinOp::Sub,
            BinOpCode::Mul => BinOp::Mul,
            BinOpCode::Div => BinOp::Div,
            _ => unreachable!(),
        };
        let temp = self.new_temp(result_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(block, place.clone(), RValue::BinaryOp(bin_op, lhs_op, rhs_op), node.line);
        node.set_resultant_type(result_ty);
        Ok(block.and(Typed { value: Operand::Copy(place), ty: result_ty }))
    }

    fn lower_pointer_arithmetic(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        lhs: Typed<Operand>,
        rhs: Typed<Operand>,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        if !matches!(op, BinOpCode::Add | BinOpCode::Sub) {
            die!(ErrorKind::InvalidPointerArithmetic, node.line, "only + and - apply to pointers");
        }
        let lhs_is_ptr = self.env.registry().get(lhs.ty).is_pointer();
        let (ptr, index, ptr_ty, index_ty) = if lhs_is_ptr {
            if self.env.registry().get(rhs.ty).is_pointer() {
                die!(ErrorKind::InvalidPointerArithmetic, node.line, "cannot combine two pointers");
            }
            (lhs.value, rhs.value, lhs.ty, rhs.ty)
        } else {
            (rhs.value, lhs.value, rhs.ty, lhs.ty)
        };
        let pointee_is_any = matches!(
            self.env.registry().get(ptr_ty),
            Type::Pointer { to, .. } if matches!(self.env.registry().get(to), Type::Any)
        );
        if pointee_is_any {
            die!(ErrorKind::InvalidPointerArithmetic, node.line, "cannot offset a `*any` pointer");
        }

        let int64 = self.env.registry().int64();
        let index = self.coerce_operand(block, index, index_ty, int64, node.line)?;
        let index = if matches!(op, BinOpCode::Sub) {
            let temp = self.new_temp(int64);
            let place = Place::from_local(temp);
            self.cfg.push_assign(
                block,
                place.clone(),
                RValue::UnaryOp(UnaryOp::Neg, index),
                node.line,
            );
            Operand::Copy(place)
        } else {
            index
        };

        let temp = self.new_temp(ptr_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(
            block,
            place.clone(),
            RValue::GepIndex { base: ptr, index, statically_sized: false },
            node.line,
        );
        node.set_resultant_type(ptr_ty);
        Ok(block.and(Typed { value: Operand::Copy(place), ty: ptr_ty }))
    }

    fn lower_comparison(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        left: &Node,
        right: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let lhs = self.lower_operand(block, left)?;
        let block = lhs.block;
        let rhs = self.lower_operand(block, right)?;
        let block = rhs.block;

        let result_ty = self.env.registry().promotion(lhs.value.ty, rhs.value.ty);
        let lhs_op = self.coerce_operand(block, lhs.value.value, lhs.value.ty, result_ty, left.line)?;
        let rhs_op = self.coerce_operand(block, rhs.value.value, rhs.value.ty, result_ty, right.line)?;

        let bin_op = match op {
            BinOpCode::Eq => BinOp::Eq,
            BinOpCode::Neq => BinOp::Neq,
            BinOpCode::Gt => BinOp::Gt,
            BinOpCode::Lt => BinOp::Lt,
            BinOpCode::Ge => BinOp::Ge,
            BinOpCode::Le => BinOp::Le,
            _ => unreachable!(),
        };
        let bool_ty = self.env.registry().int1();
        let temp = self.new_temp(bool_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(block, place.clone(), RValue::BinaryOp(bin_op, lhs_op, rhs_op), node.line);
        node.set_resultant_type(bool_ty);
        Ok(block.and(Typed { value: Operand::Copy(place), ty: bool_ty }))
    }

    fn lower_unary(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: UnaryOpCode,
        operand: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        match op {
            UnaryOpCode::Return => self.lower_return(block, node, operand),
            UnaryOpCode::AddressOf => {
                let place_and = self.lower_place(block, operand)?;
                let block = place_and.block;
                let (place, pointee_ty) = place_and.value;
                let ptr_ty = self.env.registry().pointer_type(pointee_ty, false, false);
                let temp = self.new_temp(ptr_ty);
                let result = Place::from_local(temp);
                self.cfg.push_assign(block, result.clone(), RValue::Ref(place), node.line);
                node.set_resultant_type(ptr_ty);
                Ok(block.and(Typed { value: Operand::Copy(result), ty: ptr_ty }))
            }
            UnaryOpCode::Deref => {
                let place_and = self.lower_place(block, node)?;
                let block = place_and.block;
                let (place, ty) = place_and.value;
                node.set_resultant_type(ty);
                Ok(block.and(Typed { value: Operand::Copy(place), ty }))
            }
            UnaryOpCode::Not => {
                let operand_and = self.lower_operand(block, operand)?;
                let block = operand_and.block;
                let test_and = self.lower_test(block, operand_and.value.value, operand_and.value.ty, node.line)?;
                let bool_ty = self.env.registry().int1();
                let block = test_and.block;
                let temp = self.new_temp(bool_ty);
                let place = Place::from_local(temp);
                self.cfg.push_assign(
                    block,
                    place.clone(),
                    RValue::UnaryOp(UnaryOp::Not, test_and.value),
                    node.line,
                );
                node.set_resultant_type(bool_ty);
                Ok(block.and(Typed { value: Operand::Copy(place), ty: bool_ty }))
            }
            UnaryOpCode::Print => {
                let operand_and = self.lower_operand(block, operand)?;
                let block = operand_and.block;
                let format = print_format_for(self.env.registry(), operand_and.value.ty);
                let fmt_symbol = self.env.intern_cstring(format);
                let next = self.cfg.start_new_block();
                self.cfg.set_terminator(
                    block,
                    egl_ir::TerminatorKind::Call {
                        callee: Operand::Constant(Const::FnRef("printf".to_string())),
                        args: vec![Operand::Constant(Const::Str(fmt_symbol)), operand_and.value.value],
                        destination: None,
                        target: next,
                    },
                    node.line,
                );
                let void_ty = self.env.registry().void_type();
                node.set_resultant_type(void_ty);
                Ok(next.and(Typed { value: Operand::Constant(Const::Zero), ty: void_ty }))
            }
            UnaryOpCode::Unwrap => {
                let operand_and = self.lower_operand(block, operand)?;
                let block = operand_and.block;
                let Typed { value: ptr_operand, ty: ptr_ty } = operand_and.value;
                if !self.env.registry().is_counted(ptr_ty) && !self.env.registry().is_weak(ptr_ty) {
                    die!(ErrorKind::InvalidDereference, node.line, "`unwrap` requires a counted or weak pointer");
                }
                let payload_ty = match self.env.registry().get(ptr_ty) {
                    Type::Pointer { to, .. } => {
                        self.env.registry().pointer_type(to, false, false)
                    }
                    _ => unreachable!(),
                };
                let temp = self.new_temp(payload_ty);
                let place = Place::from_local(temp);
                let ir_payload = self.env.registry().to_ir_type(payload_ty);
                self.cfg.push_assign(
                    block,
                    place.clone(),
                    RValue::Cast(CastKind::PtrToPtr, ptr_operand, ir_payload),
                    node.line,
                );
                node.set_resultant_type(payload_ty);
                Ok(block.and(Typed { value: Operand::Copy(place), ty: payload_ty }))
            }
            UnaryOpCode::SizeOf => {
                let target_ty = self.resolve_type_decl(operand)?;
                let size = self.env.registry().to_ir_type(target_ty).abi_size();
                let int64 = self.env.registry().int64();
                node.set_resultant_type(int64);
                let ir64 = self.env.registry().to_ir_type(int64);
                Ok(block.and(Typed {
                    value: Operand::Constant(Const::Int { value: size.bytes() as i128, ty: ir64 }),
                    ty: int64,
                }))
            }
            UnaryOpCode::CountOf => {
                let operand_and = self.lower_operand(block, operand)?;
                let block = operand_and.block;
                let Typed { value: array_operand, ty: array_ty } = operand_and.value;
                if !matches!(self.env.registry().get(array_ty), Type::Array { .. }) {
                    die!(ErrorKind::TypeMismatch, node.line, "`countof` requires an array operand");
                }
                let int64 = self.env.registry().int64();
                let temp = self.new_temp(int64);
                let place = Place::from_local(temp);
                self.cfg.push_assign(
                    block,
                    place.clone(),
                    RValue::GepIndex {
                        base: array_operand,
                        index: Operand::Constant(Const::Zero),
                        statically_sized: true,
                    },
                    node.line,
                );
                node.set_resultant_type(int64);
                Ok(block.and(Typed { value: Operand::Copy(place), ty: int64 }))
            }
            UnaryOpCode::TransmuteToCounted => self.lower_transmute_to_counted(block, node, operand),
        }
    }

    fn lower_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        callee: &Node,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        self.lower_call_conventions(block, node, callee, args)
    }
}

fn numeric_cast_kind(from: &Type, to: &Type) -> CastKind {
    let from_float = matches!(from, Type::Float | Type::Double);
    let to_float = matches!(to, Type::Float | Type::Double);
    match (from_float, to_float) {
        (false, false) => CastKind::IntToInt,
        (false, true) => CastKind::IntToFloat,
        (true, false) => CastKind::FloatToInt,
        (true, true) => CastKind::FloatToFloat,
    }
}

/// `print e` format-string selection (`spec.md` §4.3, recovered from
/// `ac_compile_unary`'s `'p'` arm, `SPEC_FULL.md` §2).
fn print_format_for(registry: &egl_types::TypeRegistry, ty: egl_types::TypeId) -> &'static str {
    match registry.get(ty) {
        Type::Float | Type::Double => "%lf",
        Type::Int1 => "(Bool) %d",
        Type::Int64 | Type::UInt64 => "%ld",
        Type::Pointer { to, .. } if matches!(registry.get(to), Type::Int8) => "%s",
        Type::Pointer { .. } => "%p",
        _ => "%d",
    }
}
