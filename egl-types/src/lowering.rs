//! Mapping from the registry's tagged `Type` down to the concrete
//! low-level `egl_ir::IrType` (`ett_llvm_type` in the source).

use crate::registry::TypeRegistry;
use crate::ty::{ClosureKind, Type, TypeId};
use egl_ir::IrType;

impl TypeRegistry {
    pub fn to_ir_type(&self, ty: TypeId) -> IrType {
        match self.get(ty) {
            Type::None | Type::Void => IrType::Void,
            // `any` has no concrete shape of its own; it is only ever
            // observed through a pointer, represented as an opaque byte.
            Type::Any => IrType::Int8,
            Type::Auto => {
                panic!("internal error: `auto` must be resolved before IR lowering")
            }
            Type::Nil => IrType::Pointer {
                to: Box::new(IrType::Int8),
                counted: false,
                weak: false,
            },
            Type::Int1 => IrType::Int1,
            Type::Int8 => IrType::Int8,
            Type::Int16 => IrType::Int16,
            Type::Int32 => IrType::Int32,
            Type::Int64 => IrType::Int64,
            Type::UInt8 => IrType::UInt8,
            Type::UInt16 => IrType::UInt16,
            Type::UInt32 => IrType::UInt32,
            Type::UInt64 => IrType::UInt64,
            Type::Float => IrType::Float,
            Type::Double => IrType::Double,
            Type::CString => {
                IrType::Pointer { to: Box::new(IrType::Int8), counted: false, weak: false }
            }
            Type::Pointer { to, counted, weak, .. } => {
                let payload = self.to_ir_type(to);
                if counted || weak {
                    let header = self.get_counted_header_type(payload);
                    IrType::Pointer { to: Box::new(header), counted, weak }
                } else {
                    IrType::Pointer { to: Box::new(payload), counted: false, weak: false }
                }
            }
            Type::Array { of, count } => {
                IrType::Array { of: Box::new(self.to_ir_type(of)), count }
            }
            Type::Function { ret, params, variadic, closure, generator } => {
                let ret_ty = self.to_ir_type(ret);
                let mut param_tys: Vec<IrType> = params.iter().map(|p| self.to_ir_type(*p)).collect();
                if generator {
                    // represented abstractly; the generator's concrete
                    // frame layout is out of this core's scope.
                }
                if matches!(closure, ClosureKind::Closed) {
                    param_tys.insert(
                        0,
                        IrType::Pointer { to: Box::new(IrType::Int8), counted: false, weak: false },
                    );
                }
                IrType::Function { ret: Box::new(ret_ty), params: param_tys, variadic }
            }
            Type::Generator { yields } => {
                let _ = yields;
                IrType::Pointer { to: Box::new(IrType::Int8), counted: false, weak: false }
            }
            Type::Struct(name) => self.struct_ir_type(&name),
            Type::Class(name, _) => self.struct_ir_type(&name),
            Type::Enum(_) => IrType::Int64,
            // Abstract interface reference: `{typeid: i32, vtable: **i8,
            // offsets: *i64, object: **i8}` (`spec.md` §3.3).
            Type::Interface(_) => IrType::Struct {
                name: "__egl_interface_ref".to_string(),
                fields: vec![
                    IrType::Int32,
                    IrType::Pointer {
                        to: Box::new(IrType::Pointer {
                            to: Box::new(IrType::Int8),
                            counted: false,
                            weak: false,
                        }),
                        counted: false,
                        weak: false,
                    },
                    IrType::Pointer { to: Box::new(IrType::Int64), counted: false, weak: false },
                    IrType::Pointer {
                        to: Box::new(IrType::Pointer {
                            to: Box::new(IrType::Int8),
                            counted: false,
                            weak: false,
                        }),
                        counted: false,
                        weak: false,
                    },
                ],
            },
        }
    }

    fn struct_ir_type(&self, name: &str) -> IrType {
        let fields = self
            .structs
            .get(&name.to_string())
            .map(|d| d.types)
            .or_else(|| self.classes.get(&name.to_string()).map(|d| d.types));

        let Some(fields) = fields else {
            return IrType::Opaque { name: name.to_string() };
        };

        let mut field_tys: Vec<IrType> = fields.iter().map(|f| self.to_ir_type(*f)).collect();

        // Classes receive a hidden leading vtable-pointer slot (`spec.md` §3.3).
        if self.classes.contains(&name.to_string()) {
            field_tys.insert(
                0,
                IrType::Pointer { to: Box::new(IrType::Int8), counted: false, weak: false },
            );
        }

        IrType::Struct { name: name.to_string(), fields: field_tys }
    }

    /// `get_counted_header_type(payload_ir_type) → ir_type`: the interned
    /// header struct for a given payload, cached by stringified IR type to
    /// avoid duplicate struct definitions for the same payload shape.
    pub fn get_counted_header_type(&self, payload: IrType) -> IrType {
        self.counted_header_cache_get_or_insert(&payload, || IrType::CountedHeader {
            payload: Box::new(payload.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counted_header_cache_is_stable_per_payload_shape() {
        let reg = TypeRegistry::new();
        let a = reg.get_counted_header_type(IrType::Int32);
        let b = reg.get_counted_header_type(IrType::Int32);
        assert_eq!(a, b);
    }

    #[test]
    fn counted_pointer_lowers_through_header() {
        let reg = TypeRegistry::new();
        let i32_ty = reg.int32();
        let counted = reg.pointer_type(i32_ty, true, false);
        let lowered = reg.to_ir_type(counted);
        match lowered {
            IrType::Pointer { to, counted: true, .. } => {
                assert!(matches!(*to, IrType::CountedHeader { .. }));
            }
            other => panic!("expected counted pointer, got {other:?}"),
        }
    }
}
