//! Allocation lowering (`spec.md` §4.4's "Allocation lowering" paragraph)
//! and the `^` transmute-to-counted operator (`SPEC_FULL.md` §3, Open
//! Question 1).

use super::{FunctionLowerer, LowerResult, Typed};
use crate::env::GlobalEnv;
use egl_ast::Node;
use egl_ir::{
    BasicBlock, BlockAnd, BlockAndExtend, CastKind, Operand, Place, RValue, RuntimeCall,
    StatementKind,
};
use egl_reporting::{die, ErrorKind};
use egl_types::{Type, TypeId};

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    /// `new T` / `new T { initialiser }`: allocate a counted header sized
    /// for `T`, zero-init the housekeeping fields and the payload, store the
    /// initialiser (if any) through the same assignment policy an ordinary
    /// store would use, and record the result as a transient awaiting the
    /// statement-boundary `check_ptr` balance.
    pub(super) fn lower_alloc(
        &mut self,
        block: BasicBlock,
        node: &Node,
        type_decl: &Node,
        initialiser: Option<&Node>,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let payload_ty = self.resolve_type_decl(type_decl)?;
        let result_ty = self.env.registry().pointer_type(payload_ty, true, false);

        let destructor = self.alloc_destructor_for(payload_ty);

        let result_local = self.new_temp(result_ty);
        let result_place = Place::from_local(result_local);
        self.cfg.push_statement(
            block,
            StatementKind::Runtime(RuntimeCall::AllocCounted {
                target: Operand::Move(result_place.clone()),
                destructor,
            }),
            node.line,
        );

        let mut block = block;
        if let Some(init) = initialiser {
            let init_and = self.lower_operand(block, init)?;
            block = init_and.block;
            let Typed { value, ty } = init_and.value;
            let value = self.coerce_operand(block, value, ty, payload_ty, init.line)?;

            let consumed = self.transients.take_loaded(init).is_some();
            self.transients.take_transient(init);

            let payload_place = result_place.clone().deref();
            self.apply_store_policy(block, &payload_place, payload_ty, value, consumed, init.line);
        }

        self.transients.record_transient(node, result_place.clone());
        node.set_resultant_type(result_ty);
        Ok(block.and(Typed { value: Operand::Copy(result_place), ty: result_ty }))
    }

    /// The destructor to install in a fresh allocation's header: the
    /// generated `__egl_x_<Name>` for a struct/class payload that needs
    /// one, the generic `__egl_counted_destructor` for a payload that is
    /// itself counted/weak or an array transitively holding counted
    /// pointers, `None` otherwise (`spec.md` §4.4).
    fn alloc_destructor_for(&mut self, payload_ty: TypeId) -> Option<String> {
        match self.env.registry().get(payload_ty) {
            Type::Struct(name) | Type::Class(name, _) if self.env.registry().needs_destructor(payload_ty) => {
                self.env.ensure_struct_codegen(&name);
                Some(format!("__egl_x_{name}"))
            }
            Type::Pointer { counted, weak, .. } if counted || weak => {
                Some("__egl_counted_destructor".to_string())
            }
            Type::Array { of, .. } if super::array_has_counted(self.env.registry(), of) => {
                Some("__egl_counted_destructor".to_string())
            }
            _ => None,
        }
    }

    /// `^p` (Open Question 1): reinterpret a plain pointer to `T` as a
    /// counted pointer to `T` without allocating a fresh header — the
    /// inverse of `unwrap`, and relying on the same backend convention that
    /// a `PtrToPtr` cast between a counted-header pointer and its plain
    /// payload pointer type computes the header-relative offset in
    /// whichever direction the cast runs. Participates in transient
    /// tracking exactly like `new`.
    pub(super) fn lower_transmute_to_counted(
        &mut self,
        block: BasicBlock,
        node: &Node,
        operand: &Node,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let operand_and = self.lower_operand(block, operand)?;
        let block = operand_and.block;
        let Typed { value, ty } = operand_and.value;

        let payload_ty = match self.env.registry().get(ty) {
            Type::Pointer { to, counted: false, weak: false, closed: false } => to,
            _ => die!(
                ErrorKind::InvalidCast,
                node.line,
                "`^` requires a plain, non-counted, non-closed pointer operand"
            ),
        };

        let result_ty = self.env.registry().pointer_type(payload_ty, true, false);
        let ir_result_ty = self.env.registry().to_ir_type(result_ty);

        let temp = self.new_temp(result_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(block, place.clone(), RValue::Cast(CastKind::PtrToPtr, value, ir_result_ty), node.line);

        self.transients.record_transient(node, place.clone());
        node.set_resultant_type(result_ty);
        Ok(block.and(Typed { value: Operand::Copy(place), ty: result_ty }))
    }
}
