//! Function-call lowering: the three calling conventions of `spec.md`
//! §4.3 — plain function, method (implicit receiver), and closure
//! (env-carrying function pointer pair).

use super::{FunctionLowerer, LowerResult, Typed};
use crate::env::GlobalEnv;
use egl_ast::Node;
use egl_ir::{
    BasicBlock, BinOp, BlockAnd, BlockAndExtend, CastKind, Const, Operand, Place, RValue,
    TerminatorKind,
};
use egl_reporting::{die, ErrorKind};
use egl_types::{ClosureKind, Type, TypeId};

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    pub(super) fn lower_call_conventions(
        &mut self,
        block: BasicBlock,
        node: &Node,
        callee: &Node,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        if let egl_ast::NodeKind::StructMemberGet { object, member } = &callee.kind {
            let object_and = self.lower_operand(block, object)?;
            let block = object_and.block;
            let Typed { value: receiver, ty: object_ty } = object_and.value;

            match self.env.registry().get(object_ty) {
                Type::Class(name, _) => {
                    let method =
                        self.env.registry().classes.get(&name).and_then(|d| d.methods.get(member).cloned());
                    return match method {
                        Some(method) => {
                            self.lower_method_call(block, node, receiver, &name, member, method.ty, args)
                        }
                        None => die!(
                            ErrorKind::UnknownMember,
                            node.line,
                            "`{member}` is not a callable method"
                        ),
                    };
                }
                // Interfaces may compose several interface names (`spec.md`
                // §3.3); `offsets[slot]` holds the vtable base for the
                // composed interface at `slot`, `interface_offset` holds the
                // method's position within it.
                Type::Interface(composed) => {
                    let found = {
                        let registry = self.env.registry();
                        composed.iter().enumerate().find_map(|(slot, iface_name)| {
                            registry
                                .interface_offset(iface_name, member)
                                .map(|local_offset| (slot, iface_name.clone(), local_offset))
                        })
                    };
                    return match found {
                        Some((slot, iface_name, local_offset)) => {
                            let method_ty = self
                                .env
                                .registry()
                                .interface_method_type(&iface_name, member)
                                .expect("interface_offset succeeded so the method exists");
                            self.lower_interface_call(
                                block,
                                node,
                                receiver,
                                slot,
                                local_offset,
                                method_ty,
                                args,
                            )
                        }
                        None => die!(
                            ErrorKind::UnknownMember,
                            node.line,
                            "`{member}` is not declared on this interface"
                        ),
                    };
                }
                _ => die!(
                    ErrorKind::UnknownMember,
                    node.line,
                    "`{member}` is not a callable method"
                ),
            }
        }

        let callee_and = self.lower_operand(block, callee)?;
        let block = callee_and.block;
        let Typed { value: callee_operand, ty: callee_ty } = callee_and.value;
        match self.env.registry().get(callee_ty) {
            Type::Function { closure: ClosureKind::Closed, .. } => {
                self.lower_closure_call(block, node, callee_operand, callee_ty, args)
            }
            Type::Function { .. } => self.lower_plain_call(block, node, callee_operand, callee_ty, args),
            _ => die!(ErrorKind::TypeMismatch, node.line, "callee is not callable"),
        }
    }

    /// Lower each argument, coercing to the declared parameter type where
    /// one exists (variadic tails pass through unchanged), and remove any
    /// transient the argument produced from the tracking tables — passing
    /// a fresh allocation as an argument transfers it to the callee
    /// (`spec.md` §4.3's call rule).
    fn lower_args(
        &mut self,
        mut block: BasicBlock,
        args: &[Node],
        param_tys: &[TypeId],
    ) -> LowerResult<BlockAnd<Vec<Operand>>> {
        let mut operands = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let arg_and = self.lower_operand(block, arg)?;
            block = arg_and.block;
            let Typed { value, ty } = arg_and.value;
            let value = match param_tys.get(i) {
                Some(param_ty) => self.coerce_operand(block, value, ty, *param_ty, arg.line)?,
                None => value,
            };
            self.transients.take_transient(arg);
            self.transients.take_loaded(arg);
            operands.push(value);
        }
        Ok(block.and(operands))
    }

    fn lower_plain_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        callee_operand: Operand,
        callee_ty: TypeId,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let (ret_ty, param_tys) = match self.env.registry().get(callee_ty) {
            Type::Function { ret, params, .. } => (ret, params),
            _ => unreachable!("callee_ty was just matched as Function"),
        };
        let args_and = self.lower_args(block, args, &param_tys)?;
        let block = args_and.block;
        self.finish_call(block, node, callee_operand, args_and.value, ret_ty)
    }

    fn lower_method_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        receiver: Operand,
        class_name: &str,
        method: &str,
        method_ty: TypeId,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let (ret_ty, param_tys) = match self.env.registry().get(method_ty) {
            Type::Function { ret, params, .. } => (ret, params),
            _ => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "method `{method}` does not have a function type"
            ),
        };

        let byte = self.env.registry().int8();
        let byte_ptr_ty = self.env.registry().pointer_type(byte, false, false);
        let ir_byte_ptr = self.env.registry().to_ir_type(byte_ptr_ty);
        let receiver_local = self.new_temp(byte_ptr_ty);
        let receiver_place = Place::from_local(receiver_local);
        self.cfg.push_assign(
            block,
            receiver_place.clone(),
            RValue::Cast(CastKind::PtrToPtr, receiver, ir_byte_ptr),
            node.line,
        );

        let args_and = self.lower_args(block, args, &param_tys)?;
        let block = args_and.block;
        let mut call_args = vec![Operand::Copy(receiver_place)];
        call_args.extend(args_and.value);

        let callee = Operand::Constant(Const::FnRef(format!("{class_name}::{method}")));
        self.finish_call(block, node, callee, call_args, ret_ty)
    }

    /// Indirect dispatch through an interface's vtable (`spec.md` §3.3's
    /// `__egl_interface_ref` descriptor): `composed_slot` selects which of
    /// the interface's composed names owns the method, `local_offset` is
    /// its position within that name's own method table, and the two are
    /// added together against the descriptor's per-composed-name base
    /// offsets to get the final slot in the single combined vtable.
    fn lower_interface_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        interface_ref: Operand,
        composed_slot: usize,
        local_offset: usize,
        method_ty: TypeId,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let (ret_ty, param_tys) = match self.env.registry().get(method_ty) {
            Type::Function { ret, params, .. } => (ret, params),
            _ => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "interface method does not have a function type"
            ),
        };

        let ref_place = match interface_ref.place() {
            Some(p) => p.clone(),
            None => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "interface value has no backing storage"
            ),
        };

        let byte = self.env.registry().int8();
        let byte_ptr_ty = self.env.registry().pointer_type(byte, false, false);
        let ir_byte_ptr = self.env.registry().to_ir_type(byte_ptr_ty);
        let int64_ty = self.env.registry().int64();
        let ir_int64 = self.env.registry().to_ir_type(int64_ty);
        let double_ptr_ty = self.env.registry().pointer_type(byte_ptr_ty, false, false);

        // `offsets` (field 2, `*i64`): the composed name's base offset into
        // the shared vtable, plus the method's own offset within that name.
        let base_local = self.new_temp(int64_ty);
        let base_place = Place::from_local(base_local);
        let slot_index = Operand::Constant(Const::Int { value: composed_slot as i128, ty: ir_int64.clone() });
        self.cfg.push_assign(
            block,
            base_place.clone(),
            RValue::Use(Operand::Copy(ref_place.clone().field(2).deref().index(slot_index))),
            node.line,
        );
        let total_local = self.new_temp(int64_ty);
        let total_place = Place::from_local(total_local);
        let local_offset_operand = Operand::Constant(Const::Int { value: local_offset as i128, ty: ir_int64 });
        self.cfg.push_assign(
            block,
            total_place.clone(),
            RValue::BinaryOp(BinOp::Add, Operand::Copy(base_place), local_offset_operand),
            node.line,
        );

        // `vtable` (field 1, `**i8`): the callee function pointer at the
        // resolved slot.
        let vtable_local = self.new_temp(double_ptr_ty);
        let vtable_place = Place::from_local(vtable_local);
        self.cfg.push_assign(
            block,
            vtable_place.clone(),
            RValue::Use(Operand::Copy(ref_place.clone().field(1))),
            node.line,
        );
        let fn_ptr_local = self.new_temp(byte_ptr_ty);
        let fn_ptr_place = Place::from_local(fn_ptr_local);
        self.cfg.push_assign(
            block,
            fn_ptr_place.clone(),
            RValue::Use(Operand::Copy(vtable_place.deref().index(Operand::Copy(total_place)))),
            node.line,
        );

        // `object` (field 3): the implementing instance, cast down to the
        // plain receiver pointer every method body expects.
        let object_local = self.new_temp(double_ptr_ty);
        let object_place = Place::from_local(object_local);
        self.cfg.push_assign(
            block,
            object_place.clone(),
            RValue::Use(Operand::Copy(ref_place.field(3))),
            node.line,
        );
        let receiver_local = self.new_temp(byte_ptr_ty);
        let receiver_place = Place::from_local(receiver_local);
        self.cfg.push_assign(
            block,
            receiver_place.clone(),
            RValue::Cast(CastKind::PtrToPtr, Operand::Copy(object_place), ir_byte_ptr),
            node.line,
        );

        let args_and = self.lower_args(block, args, &param_tys)?;
        let block = args_and.block;
        let mut call_args = vec![Operand::Copy(receiver_place)];
        call_args.extend(args_and.value);

        self.finish_call(block, node, Operand::Copy(fn_ptr_place), call_args, ret_ty)
    }

    /// A closure value is the `{code, env}` pair (`spec.md` §3.3); `env`
    /// is passed as the implicit first argument and `code` is the callee.
    /// The real backend would cast `code` to the closure's concrete
    /// signature (`ret(env, params...)`) before calling through it; this
    /// core stops at the raw function-pointer representation since no
    /// backend consumes the IR here.
    fn lower_closure_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        closure_operand: Operand,
        closure_ty: TypeId,
        args: &[Node],
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let (ret_ty, param_tys) = match self.env.registry().get(closure_ty) {
            Type::Function { ret, params, .. } => (ret, params),
            _ => unreachable!("closure_ty was just matched as Function"),
        };
        let closure_place = match closure_operand.place() {
            Some(p) => p.clone(),
            None => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "closure value has no backing storage"
            ),
        };

        let byte = self.env.registry().int8();
        let raw_ptr_ty = self.env.registry().pointer_type(byte, false, false);

        let code_local = self.new_temp(raw_ptr_ty);
        let code_place = Place::from_local(code_local);
        self.cfg.push_assign(
            block,
            code_place.clone(),
            RValue::Use(Operand::Copy(closure_place.clone().field(0))),
            node.line,
        );

        let env_local = self.new_temp(raw_ptr_ty);
        let env_place = Place::from_local(env_local);
        self.cfg.push_assign(
            block,
            env_place.clone(),
            RValue::Use(Operand::Copy(closure_place.field(1))),
            node.line,
        );

        let args_and = self.lower_args(block, args, &param_tys)?;
        let block = args_and.block;
        let mut call_args = vec![Operand::Copy(env_place)];
        call_args.extend(args_and.value);
        self.finish_call(block, node, Operand::Copy(code_place), call_args, ret_ty)
    }

    /// Shared terminator emission: ends `block` with a `Call`, starts a
    /// fresh continuation block, and records the return value as a loaded
    /// transient when it owns a counted reference or a destructor
    /// (`spec.md` §4.3's "Return values... recorded in the loaded-transients
    /// table").
    fn finish_call(
        &mut self,
        block: BasicBlock,
        node: &Node,
        callee: Operand,
        args: Vec<Operand>,
        ret_ty: TypeId,
    ) -> LowerResult<BlockAnd<Typed<Operand>>> {
        let is_void = matches!(self.env.registry().get(ret_ty), Type::Void | Type::None);
        let destination = if is_void { None } else { Some(Place::from_local(self.new_temp(ret_ty))) };
        let next = self.cfg.start_new_block();
        self.cfg.set_terminator(
            block,
            TerminatorKind::Call { callee, args, destination: destination.clone(), target: next },
            node.line,
        );
        node.set_resultant_type(ret_ty);

        let value = match destination {
            Some(place) => {
                let registry = self.env.registry();
                if registry.is_counted(ret_ty) || registry.is_weak(ret_ty) || registry.needs_destructor(ret_ty) {
                    self.transients.record_loaded(node, place.clone());
                }
                Operand::Copy(place)
            }
            None => Operand::Constant(Const::Zero),
        };
        Ok(next.and(Typed { value, ty: ret_ty }))
    }
}
