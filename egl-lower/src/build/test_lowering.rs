//! Generic test-against-zero lowering (`spec.md` §4.3.2): produces an `i1`
//! by comparing an operand against its type's zero value. Shared by `if`,
//! loop tests, `!e`, and the short-circuit `&&`/`||` chains.

use super::{FunctionLowerer, LowerResult};
use crate::env::GlobalEnv;
use egl_ir::{BasicBlock, BinOp, BlockAnd, BlockAndExtend, Const, Operand, Place, RValue};
use egl_reporting::{die, ErrorKind};
use egl_types::{Type, TypeId};

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    /// Compare `value` (of type `ty`) against its zero and yield an `i1`
    /// operand. Booleans compare against `false`, integers against zero of
    /// their own width, doubles against `0.0` with an ordered not-equal,
    /// pointers against null. Any other type is a compile error.
    pub(super) fn lower_test(
        &mut self,
        block: BasicBlock,
        value: Operand,
        ty: TypeId,
        line: u32,
    ) -> LowerResult<BlockAnd<Operand>> {
        let registry = self.env.registry();
        let ty_kind = registry.get(ty);
        let ir_ty = registry.to_ir_type(ty);

        let zero = match &ty_kind {
            Type::Double | Type::Float => Operand::Constant(Const::Float(0.0)),
            _ if ty_kind.is_numeric() => Operand::Constant(Const::Int { value: 0, ty: ir_ty }),
            Type::Pointer { .. } => Operand::Constant(Const::Null(ir_ty)),
            _ => die!(
                ErrorKind::TypeMismatch,
                line,
                "cannot test a value of this type for truthiness"
            ),
        };

        // `BinOp::Neq` models every case uniformly; the backend picks
        // signed/unsigned/ordered comparison from the operand's `IrType`.
        let bool_ty = self.env.registry().int1();
        let temp = self.new_temp(bool_ty);
        let place = Place::from_local(temp);
        self.cfg.push_assign(block, place.clone(), RValue::BinaryOp(BinOp::Neq, value, zero), line);
        Ok(block.and(Operand::Copy(place)))
    }
}
