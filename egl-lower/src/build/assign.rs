//! The Memory-Management Inserter's assignment policy (`spec.md` §4.4):
//! `lhs = rhs` and the compound-assignment forms, cased on `lhs`'s
//! declared type.

use super::{FunctionLowerer, LowerResult, Typed};
use crate::env::GlobalEnv;
use egl_ast::{BinOpCode, Node, NodeKind};
use egl_ir::{BasicBlock, BinOp, BlockAnd, BlockAndExtend, Operand, Place, RValue, RuntimeCall, StatementKind};
use egl_types::{Type, TypeId};

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    pub(super) fn lower_assign(
        &mut self,
        block: BasicBlock,
        node: &Node,
        lhs: &Node,
        rhs: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        if let NodeKind::Ident(name) = &lhs.kind {
            if self.scopes.pending_declaration(name).is_some() {
                return self.lower_auto_assign(block, node, name, rhs);
            }
        }

        let place_and = self.lower_place(block, lhs)?;
        let block = place_and.block;
        let (place, lhs_ty) = place_and.value;

        let rhs_and = self.lower_operand(block, rhs)?;
        let block = rhs_and.block;
        let Typed { value: rhs_value, ty: rhs_ty } = rhs_and.value;
        let rhs_value = self.coerce_operand(block, rhs_value, rhs_ty, lhs_ty, rhs.line)?;

        let consumed = self.transients.take_loaded(rhs).is_some();
        self.transients.take_transient(rhs);

        self.apply_store_policy(block, &place, lhs_ty, rhs_value.clone(), consumed, rhs.line);

        node.set_resultant_type(lhs_ty);
        Ok(block.and(Typed { value: rhs_value, ty: lhs_ty }))
    }

    /// `x := rhs` where `x` was forward-declared with type `auto` and no
    /// storage slot. The first assignment fixes the type: allocate now
    /// (entry-block, via the usual [`FunctionLowerer::declare_local`] path)
    /// and rewrite the scope entry (`spec.md` §4.3's var-decl rule).
    fn lower_auto_assign(
        &mut self,
        block: BasicBlock,
        node: &Node,
        name: &str,
        rhs: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let rhs_and = self.lower_operand(block, rhs)?;
        let block = rhs_and.block;
        let Typed { value, ty } = rhs_and.value;

        let local = self.declare_local(Some(name), ty, node.line)?;
        self.scopes.resolve_auto(name, local, ty);
        let place = Place::from_local(local);

        let consumed = self.transients.take_loaded(rhs).is_some();
        self.transients.take_transient(rhs);
        self.apply_store_policy(block, &place, ty, value.clone(), consumed, rhs.line);

        node.set_resultant_type(ty);
        Ok(block.and(Typed { value, ty }))
    }

    pub(super) fn lower_compound_assign(
        &mut self,
        block: BasicBlock,
        node: &Node,
        op: BinOpCode,
        lhs: &Node,
        rhs: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let place_and = self.lower_place(block, lhs)?;
        let block = place_and.block;
        let (place, lhs_ty) = place_and.value;

        let rhs_and = self.lower_operand(block, rhs)?;
        let block = rhs_and.block;
        let Typed { value: rhs_value, ty: rhs_ty } = rhs_and.value;

        let common = self.env.registry().promotion(lhs_ty, rhs_ty);
        let current = self.coerce_operand(block, Operand::Copy(place.clone()), lhs_ty, common, lhs.line)?;
        let rhs_value = self.coerce_operand(block, rhs_value, rhs_ty, common, rhs.line)?;

        let bin_op = match op {
            BinOpCode::AddAssign => BinOp::Add,
            BinOpCode::SubAssign => BinOp::Sub,
            BinOpCode::MulAssign => BinOp::Mul,
            BinOpCode::DivAssign => BinOp::Div,
            _ => unreachable!("lower_compound_assign only called for compound-assignment ops"),
        };
        let temp = self.new_temp(common);
        let temp_place = Place::from_local(temp);
        self.cfg.push_assign(
            block,
            temp_place.clone(),
            RValue::BinaryOp(bin_op, current, rhs_value),
            node.line,
        );
        let result = self.coerce_operand(block, Operand::Copy(temp_place), common, lhs_ty, node.line)?;

        // Compound assignment reuses the value already at `lhs`; the
        // pre/post refcounting hooks in the table below do not apply.
        self.cfg.push_assign(block, place, RValue::Use(result.clone()), node.line);

        node.set_resultant_type(lhs_ty);
        Ok(block.and(Typed { value: result, ty: lhs_ty }))
    }

    /// Apply the pre/post-store action from `spec.md` §4.4's table for a
    /// plain `=` store of `rhs_value` into `place` of type `lhs_ty`.
    /// `consumed` means `rhs` was a loaded transient: the caller must not
    /// re-increment / re-copy-construct.
    pub(super) fn apply_store_policy(
        &mut self,
        block: BasicBlock,
        place: &Place,
        lhs_ty: TypeId,
        rhs_value: Operand,
        consumed: bool,
        line: u32,
    ) {
        let registry = self.env.registry();
        if registry.is_counted(lhs_ty) {
            self.cfg.push_statement(
                block,
                StatementKind::Runtime(RuntimeCall::DecrPtr(Operand::Copy(place.clone()))),
                line,
            );
            self.cfg.push_assign(block, place.clone(), RValue::Use(rhs_value.clone()), line);
            if !consumed {
                self.cfg.push_statement(
                    block,
                    StatementKind::Runtime(RuntimeCall::IncrPtr(Operand::Copy(place.clone()))),
                    line,
                );
            }
            return;
        }
        if self.env.registry().is_weak(lhs_ty) {
            // `weak_slot` is the slot's own address, not the pointer value
            // stored in it (`egl-ir`'s `WeakRegister` doc comment): the
            // runtime needs an address it can null out when `target` frees.
            let addr = self.address_of(block, place.clone(), lhs_ty, line);
            self.cfg.push_statement(
                block,
                StatementKind::Runtime(RuntimeCall::WeakUnregister(addr.clone())),
                line,
            );
            self.cfg.push_assign(block, place.clone(), RValue::Use(rhs_value.clone()), line);
            self.cfg.push_statement(
                block,
                StatementKind::Runtime(RuntimeCall::WeakRegister {
                    weak_slot: addr,
                    target: rhs_value,
                }),
                line,
            );
            return;
        }
        let struct_name = match self.env.registry().get(lhs_ty) {
            Type::Struct(name) if self.env.registry().needs_destructor(lhs_ty) => Some(name),
            Type::Class(name, _) if self.env.registry().needs_destructor(lhs_ty) => Some(name),
            _ => None,
        };
        if let Some(struct_name) = struct_name {
            self.cfg.push_statement(
                block,
                StatementKind::Runtime(RuntimeCall::StructDestroy {
                    name: struct_name.clone(),
                    target: Operand::Copy(place.clone()),
                    through_header: false,
                }),
                line,
            );
            self.cfg.push_assign(block, place.clone(), RValue::Use(rhs_value), line);
            if !consumed {
                self.cfg.push_statement(
                    block,
                    StatementKind::Runtime(RuntimeCall::StructCopy {
                        name: struct_name,
                        target: Operand::Copy(place.clone()),
                    }),
                    line,
                );
            }
            return;
        }

        // Plain numeric / pointer: no pre/post action, just the store.
        self.cfg.push_assign(block, place.clone(), RValue::Use(rhs_value), line);
    }
}
