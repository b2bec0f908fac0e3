//! Generated struct/class support functions (`spec.md` §4.4's struct
//! codegen paragraph): `__egl_i_<Name>` zero-initialises a fresh instance,
//! `__egl_c_<Name>` deep-copies one (incrementing/re-registering every
//! counted/weak field), and `__egl_x_<Name>` tears one down (decrementing
//! counted fields, clearing weak registrations, recursing into nested
//! structs/classes). Unlike the rest of this crate these bodies are built
//! directly against [`ControlFlowGraph`]/[`LocalsBuilder`] rather than
//! through [`super::FunctionLowerer`] — there is no source AST to dispatch,
//! only a field layout to walk.

use egl_ir::{
    BasicBlock, Body, Const, ControlFlowGraph, IrType, Local, LocalDecl, LocalsBuilder, Mutability,
    Operand, Place, RValue, RuntimeCall, StatementKind, TerminatorKind,
};
use egl_types::{Type, TypeId, TypeRegistry};

fn byte_ptr_ir() -> IrType {
    IrType::Pointer { to: Box::new(IrType::Int8), counted: false, weak: false }
}

/// The struct/class's own fields, each paired with its physical slot index
/// (shifted `+1` for classes to skip the hidden vtable slot, mirroring
/// [`TypeRegistry::struct_member_index`]).
fn fields_of(registry: &TypeRegistry, name: &str) -> Vec<(usize, TypeId)> {
    if let Some(def) = registry.structs.get(&name.to_string()) {
        def.types.iter().copied().enumerate().collect()
    } else if let Some(def) = registry.classes.get(&name.to_string()) {
        def.types.iter().copied().enumerate().map(|(i, t)| (i + 1, t)).collect()
    } else {
        Vec::new()
    }
}

/// Cast the raw `*i8 target` parameter down to `*%Name` so field
/// projections can be built against it, and return the place it lands in.
fn cast_target_to_self(
    cfg: &mut ControlFlowGraph,
    locals: &mut LocalsBuilder,
    block: BasicBlock,
    target_local: Local,
    self_ir_ptr: IrType,
) -> Place {
    let self_local = locals.push(LocalDecl::new(self_ir_ptr.clone(), Mutability::Mutable));
    let self_place = Place::from_local(self_local);
    cfg.push_assign(
        block,
        self_place.clone(),
        RValue::Cast(egl_ir::CastKind::PtrToPtr, Operand::Copy(Place::from_local(target_local)), self_ir_ptr),
        0,
    );
    self_place
}

/// Take the address of `place` by emitting an `RValue::Ref` into a fresh
/// temp (the same construction `FunctionLowerer::address_of` builds for the
/// rest of this crate), used wherever a runtime call needs the field's own
/// storage location rather than the value currently stored there — weak
/// pointer register/unregister being the case here.
fn address_of(
    cfg: &mut ControlFlowGraph,
    locals: &mut LocalsBuilder,
    block: BasicBlock,
    place: Place,
    pointee_ty: TypeId,
    registry: &TypeRegistry,
) -> Place {
    let pointee_ir = registry.to_ir_type(pointee_ty);
    let addr_ir = IrType::Pointer { to: Box::new(pointee_ir), counted: false, weak: false };
    let addr_local = locals.push(LocalDecl::new(addr_ir, Mutability::Mutable));
    let addr_place = Place::from_local(addr_local);
    cfg.push_assign(block, addr_place.clone(), RValue::Ref(place), 0);
    addr_place
}

/// A field's handling in init/copy/destroy: does it own a counted pointer,
/// a weak pointer, a nested struct/class needing its own codegen, or an
/// array of counted pointers — or none of the above, in which case the
/// three generated functions have nothing to do for it.
enum FieldKind {
    Counted,
    Weak,
    Nested(String),
    CountedArray(u64),
    Plain,
}

fn classify(registry: &TypeRegistry, field_ty: TypeId) -> FieldKind {
    match registry.get(field_ty) {
        Type::Pointer { counted: true, .. } => FieldKind::Counted,
        Type::Pointer { weak: true, .. } => FieldKind::Weak,
        Type::Struct(name) | Type::Class(name, _) if registry.needs_destructor(field_ty) => {
            FieldKind::Nested(name)
        }
        Type::Array { of, count: Some(count) } if super::array_has_counted(registry, of) => {
            FieldKind::CountedArray(count)
        }
        _ => FieldKind::Plain,
    }
}

/// `__egl_i_<Name>(target: *i8)`: null every counted/weak field, recurse
/// `__egl_i_` into every nested struct/class field, nil-fill every
/// counted-holding array field. Plain fields are left as whatever garbage
/// the allocator handed back — the language has no notion of a zero value
/// for them independent of an explicit initialiser.
pub fn build_init(registry: &TypeRegistry, name: &str) -> Body {
    let self_ir_ptr = self_pointer_ir(registry, name);
    let target_param = LocalDecl::named(byte_ptr_ir(), Mutability::Mutable, "target");

    let mut locals = LocalsBuilder::new(LocalDecl::new(IrType::Void, Mutability::Mutable));
    let target_local = locals.push(target_param);
    let mut cfg = ControlFlowGraph::new();
    let entry = cfg.entry_block();

    let self_place = cast_target_to_self(&mut cfg, &mut locals, entry, target_local, self_ir_ptr);

    for (index, field_ty) in fields_of(registry, name) {
        let field_place = self_place.clone().deref().field(index);
        match classify(registry, field_ty) {
            FieldKind::Counted | FieldKind::Weak => {
                let ir_ty = registry.to_ir_type(field_ty);
                cfg.push_assign(
                    entry,
                    field_place,
                    RValue::Use(Operand::Constant(Const::Null(ir_ty))),
                    0,
                );
            }
            FieldKind::Nested(nested_name) => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::StructInit {
                        name: nested_name,
                        target: Operand::Move(field_place),
                    }),
                    0,
                );
            }
            FieldKind::CountedArray(count) => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::ArrayFillNil {
                        array: Operand::Move(field_place),
                        count,
                    }),
                    0,
                );
            }
            FieldKind::Plain => {}
        }
    }

    cfg.set_terminator(entry, TerminatorKind::Return, 0);
    Body { name: format!("__egl_i_{name}"), locals: locals.locals, basic_blocks: cfg.basic_blocks, arg_count: 1, return_ty: IrType::Void }
}

/// `__egl_c_<Name>(target: *i8)`: increment every counted field already
/// stored at `target`, re-register every weak field against its current
/// referent, and recurse `__egl_c_` into nested struct/class fields — the
/// "this instance now has one more owner" half of a struct copy (`spec.md`
/// §4.4's `StructCopy` rule).
pub fn build_copy(registry: &TypeRegistry, name: &str) -> Body {
    let self_ir_ptr = self_pointer_ir(registry, name);
    let target_param = LocalDecl::named(byte_ptr_ir(), Mutability::Mutable, "target");

    let mut locals = LocalsBuilder::new(LocalDecl::new(IrType::Void, Mutability::Mutable));
    let target_local = locals.push(target_param);
    let mut cfg = ControlFlowGraph::new();
    let entry = cfg.entry_block();

    let self_place = cast_target_to_self(&mut cfg, &mut locals, entry, target_local, self_ir_ptr);

    for (index, field_ty) in fields_of(registry, name) {
        let field_place = self_place.clone().deref().field(index);
        match classify(registry, field_ty) {
            FieldKind::Counted => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::IncrPtr(Operand::Copy(field_place))),
                    0,
                );
            }
            FieldKind::Weak => {
                let addr_place = address_of(&mut cfg, &mut locals, entry, field_place.clone(), field_ty, registry);
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::WeakRegister {
                        weak_slot: Operand::Copy(addr_place),
                        target: Operand::Copy(field_place),
                    }),
                    0,
                );
            }
            FieldKind::Nested(nested_name) => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::StructCopy {
                        name: nested_name,
                        target: Operand::Move(field_place),
                    }),
                    0,
                );
            }
            FieldKind::CountedArray(_) | FieldKind::Plain => {}
        }
    }

    cfg.set_terminator(entry, TerminatorKind::Return, 0);
    Body { name: format!("__egl_c_{name}"), locals: locals.locals, basic_blocks: cfg.basic_blocks, arg_count: 1, return_ty: IrType::Void }
}

/// `__egl_x_<Name>(target: *i8, through_header: i1)`: decrement every
/// counted field, clear every weak field's registration, recurse `__egl_x_`
/// into nested struct/class fields, and whole-array-decrement any
/// counted-holding array field. `through_header` is threaded straight
/// through to `StructDestroy` on nested struct/class fields; this function
/// itself does not otherwise branch on it — the flag only matters to the
/// backend's choice of where the counted header sits relative to `target`.
pub fn build_destroy(registry: &TypeRegistry, name: &str) -> Body {
    let self_ir_ptr = self_pointer_ir(registry, name);
    let target_param = LocalDecl::named(byte_ptr_ir(), Mutability::Mutable, "target");
    let through_header_param = LocalDecl::named(IrType::Int1, Mutability::Immutable, "through_header");

    let mut locals = LocalsBuilder::new(LocalDecl::new(IrType::Void, Mutability::Mutable));
    let target_local = locals.push(target_param);
    let _through_header_local = locals.push(through_header_param);
    let mut cfg = ControlFlowGraph::new();
    let entry = cfg.entry_block();

    let self_place = cast_target_to_self(&mut cfg, &mut locals, entry, target_local, self_ir_ptr);

    for (index, field_ty) in fields_of(registry, name) {
        let field_place = self_place.clone().deref().field(index);
        match classify(registry, field_ty) {
            FieldKind::Counted => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::DecrPtr(Operand::Copy(field_place))),
                    0,
                );
            }
            FieldKind::Weak => {
                let addr_place = address_of(&mut cfg, &mut locals, entry, field_place, field_ty, registry);
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::WeakUnregister(Operand::Copy(addr_place))),
                    0,
                );
            }
            FieldKind::Nested(nested_name) => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::StructDestroy {
                        name: nested_name,
                        target: Operand::Move(field_place),
                        through_header: false,
                    }),
                    0,
                );
            }
            FieldKind::CountedArray(count) => {
                cfg.push_statement(
                    entry,
                    StatementKind::Runtime(RuntimeCall::ArrayDecrPtrs { array: Operand::Move(field_place), count }),
                    0,
                );
            }
            FieldKind::Plain => {}
        }
    }

    cfg.set_terminator(entry, TerminatorKind::Return, 0);
    Body { name: format!("__egl_x_{name}"), locals: locals.locals, basic_blocks: cfg.basic_blocks, arg_count: 2, return_ty: IrType::Void }
}

fn self_type(registry: &TypeRegistry, name: &str) -> TypeId {
    if registry.classes.contains(&name.to_string()) {
        let interfaces = registry.classes.get(&name.to_string()).map(|d| d.interfaces).unwrap_or_default();
        registry.class_type(name, interfaces)
    } else {
        registry.struct_type(name)
    }
}

/// Pointer-to-aggregate IR type for `name`'s own struct/class shape, used
/// as the cast target for the raw `*i8 target` parameter every generated
/// function receives.
fn self_pointer_ir(registry: &TypeRegistry, name: &str) -> IrType {
    let self_ty = self_type(registry, name);
    IrType::Pointer { to: Box::new(registry.to_ir_type(self_ty)), counted: false, weak: false }
}
