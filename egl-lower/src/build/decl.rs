//! The AST Dispatcher (`spec.md` §4.3): type-declaration resolution,
//! statement dispatch, and the two entry points `egl-pipeline` calls —
//! [`declare_functions`] (the early-declaration pass) and [`lower_function`]
//! (one function body, `SPEC_FULL.md` §2).

use super::{FunctionLowerer, LowerResult};
use crate::env::GlobalEnv;
use egl_ast::node::NamedTypeDecl;
use egl_ast::{EnumDecl, InterfaceDecl, Node, NodeKind};
use egl_ir::{BasicBlock, Body};
use egl_reporting::{die, ErrorKind};
use egl_types::{ClosureKind, Method, Type, TypeId, TypeRegistry};
use indexmap::IndexMap;
use std::collections::HashMap;

impl<'a, E: GlobalEnv> FunctionLowerer<'a, E> {
    /// Resolve a `TypeDecl` node to a registry `TypeId`, interning the
    /// array-count constant through [`super::constfold`] when present.
    pub(super) fn resolve_type_decl(&mut self, node: &Node) -> LowerResult<TypeId> {
        resolve_type_decl_on(self.env.registry(), node)
    }

    fn lower_var_decl(
        &mut self,
        block: BasicBlock,
        node: &Node,
        ident: &str,
        type_decl: &Node,
    ) -> LowerResult<BasicBlock> {
        let ty = self.resolve_type_decl(type_decl)?;
        if matches!(self.env.registry().get(ty), Type::Auto) {
            self.scopes.put(ident, None, ty);
        } else {
            self.declare_local(Some(ident), ty, node.line)?;
        }
        node.set_resultant_type(ty);
        Ok(block)
    }

    /// Dispatch one statement. Every statement ends with the per-statement
    /// transient flush (invariant 5, `spec.md` §4.4) unless it already
    /// terminated the block (`return`/`break`/`continue`, which flush and
    /// run their own scope-exit callbacks as part of lowering).
    pub(super) fn lower_statement(&mut self, block: BasicBlock, node: &Node) -> LowerResult<BasicBlock> {
        match &node.kind {
            NodeKind::VarDecl { ident, type_decl } => {
                let block = self.lower_var_decl(block, node, ident, type_decl)?;
                self.flush_transients(block, node.line);
                Ok(block)
            }
            NodeKind::IfBlock { .. } => Ok(self.lower_if_block(block, node)?.block),
            NodeKind::Loop { .. } => Ok(self.lower_loop(block, node)?.block),
            NodeKind::Break => self.lower_break(block, node),
            NodeKind::Continue => self.lower_continue(block, node),
            NodeKind::StructDecl { .. } | NodeKind::FunctionDecl { .. } => die!(
                ErrorKind::InternalCompilerError,
                node.line,
                "nested declarations are not valid statements"
            ),
            _ => {
                let operand_and = self.lower_operand(block, node)?;
                let block = operand_and.block;
                if !self.cfg.is_terminated(block) {
                    self.flush_transients(block, node.line);
                }
                Ok(block)
            }
        }
    }
}

/// Resolve a `TypeDecl` node without a live [`FunctionLowerer`] — used by
/// [`declare_functions`], which runs before any function body is lowered.
pub(super) fn resolve_type_decl_on(registry: &TypeRegistry, node: &Node) -> LowerResult<TypeId> {
    let NodeKind::TypeDecl { name, pointer, array_count } = &node.kind else {
        die!(ErrorKind::InternalCompilerError, node.line, "expected a type declaration node");
    };
    let Some(base) = registry.parse_type_name(name) else {
        die!(ErrorKind::UndeclaredIdentifier, node.line, "unknown type name `{name}`");
    };

    let ty = if let Some(marker) = pointer {
        if marker.closed {
            registry.closed_pointer_type(base)
        } else {
            registry.pointer_type(base, marker.counted, marker.weak)
        }
    } else if let Some(count_node) = array_count {
        let count = super::constfold::fold_usize_const(registry, count_node)?;
        registry.array_type(base, Some(count))
    } else {
        base
    };
    node.set_resultant_type(ty);
    Ok(ty)
}

fn resolve_params(registry: &TypeRegistry, params: &[NamedTypeDecl]) -> LowerResult<Vec<TypeId>> {
    params.iter().map(|p| resolve_type_decl_on(registry, &p.type_decl)).collect()
}

/// Register every declared `interface`/`enum` definition (`SPEC_FULL.md`
/// §2) before [`declare_types`] runs: a class's `interfaces: Vec<String>`
/// field and any `var x : I`/`var x : E` type-decl both resolve a bare
/// name through `parse_type_name`, which only finds it once it has been
/// registered here. Neither declaration has an AST node of its own
/// (`spec.md` §6.3's node contract lists no `interface-decl`/`enum-decl`
/// kind) — they are driver-level inputs, collected separately from the
/// lowerable node tree and passed in alongside it.
///
/// A plain (non-composed) interface's sole composed name is itself, so
/// `class_implements_interface` correctly treats `class C : I` as
/// implementing `I` (`spec.md`:61's composed-name-set rule). An enum item
/// with no explicit value takes one more than the previous item's value,
/// starting at `0`.
pub fn declare_interfaces_and_enums(
    registry: &TypeRegistry,
    interfaces: &[InterfaceDecl],
    enums: &[EnumDecl],
) -> LowerResult<()> {
    for decl in interfaces {
        let mut method_table = IndexMap::new();
        for method in &decl.methods {
            let ret_ty = resolve_type_decl_on(registry, &method.ret_type)?;
            let param_types = resolve_params(registry, &method.params)?;
            let fn_ty = registry.function_type(ret_ty, param_types, false, ClosureKind::None, false);
            method_table.insert(method.name.clone(), Method { name: method.name.clone(), ty: fn_ty });
        }
        let composed = if decl.composed.is_empty() { vec![decl.name.clone()] } else { decl.composed.clone() };
        registry.add_interface_def(&decl.name, composed, method_table);
    }

    for decl in enums {
        let mut items = IndexMap::new();
        let mut next_value = 0i64;
        for (item_name, explicit) in &decl.items {
            let value = explicit.unwrap_or(next_value);
            items.insert(item_name.clone(), value);
            next_value = value + 1;
        }
        registry.add_enum_def(&decl.name, items);
    }
    Ok(())
}

/// Register every top-level `struct`/`class` declaration's field layout
/// (and, for classes, its implemented interfaces and method table) into
/// the registry before any function signature or body is resolved, so
/// `struct_member_index`/`needs_destructor`/`class_implements_interface`
/// answer correctly everywhere else (`spec.md` §3.2). Must run after
/// [`declare_interfaces_and_enums`], since a class's implemented interface
/// names and a field's interface/enum-typed `TypeDecl` both resolve
/// through the registry entries that pass registers.
pub fn declare_types(registry: &TypeRegistry, decls: &[Node]) -> LowerResult<()> {
    for decl in decls {
        let NodeKind::StructDecl { name, fields, is_class, interfaces, methods } = &decl.kind else {
            continue;
        };

        let field_names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
        let field_types: Vec<TypeId> = fields
            .iter()
            .map(|f| resolve_type_decl_on(registry, &f.type_decl))
            .collect::<LowerResult<Vec<_>>>()?;

        if *is_class {
            let mut method_table = IndexMap::new();
            for method in methods {
                let NodeKind::FunctionDecl { ident, params, ret_type, .. } = &method.kind else {
                    die!(ErrorKind::InternalCompilerError, method.line, "expected a method declaration");
                };
                let ret_ty = resolve_type_decl_on(registry, ret_type)?;
                let param_types = resolve_params(registry, params)?;
                let fn_ty = registry.function_type(ret_ty, param_types, false, ClosureKind::None, false);
                method_table.insert(ident.clone(), Method { name: ident.clone(), ty: fn_ty });
            }
            registry.add_class_def(name, field_names, field_types, interfaces.clone(), method_table);
        } else {
            registry.add_struct_def(name, field_names, field_types);
        }
    }
    Ok(())
}

/// The early-declaration pass (`SPEC_FULL.md` §2): resolve every top-level
/// function's signature into a `Type::Function` before any body is
/// lowered, so forward and mutually-recursive calls resolve. Struct/class
/// methods are declared the same way, keyed `"Name::method"` to match the
/// synthesized callee name `lower_method_call` emits.
pub fn declare_functions(registry: &TypeRegistry, decls: &[Node]) -> LowerResult<HashMap<String, TypeId>> {
    let mut table = HashMap::new();
    for decl in decls {
        match &decl.kind {
            NodeKind::FunctionDecl { ident, params, ret_type, .. } => {
                let ret_ty = resolve_type_decl_on(registry, ret_type)?;
                let param_types = resolve_params(registry, params)?;
                let fn_ty = registry.function_type(ret_ty, param_types, false, ClosureKind::None, false);
                table.insert(ident.clone(), fn_ty);
            }
            NodeKind::StructDecl { name, methods, .. } => {
                for method in methods {
                    let NodeKind::FunctionDecl { ident, params, ret_type, .. } = &method.kind else {
                        die!(ErrorKind::InternalCompilerError, method.line, "expected a method declaration");
                    };
                    let ret_ty = resolve_type_decl_on(registry, ret_type)?;
                    let param_types = resolve_params(registry, params)?;
                    let fn_ty = registry.function_type(ret_ty, param_types, false, ClosureKind::None, false);
                    table.insert(format!("{name}::{ident}"), fn_ty);
                }
            }
            _ => {}
        }
    }
    Ok(table)
}

/// Lower one function body (`spec.md` §4.2's per-function `FunctionLowerer`
/// construction, `SPEC_FULL.md` §9's explicit-threading note). `decl` must
/// be a `FunctionDecl` with a body; `lookup_function`/struct codegen for
/// anything the body references must already be available on `env`.
pub fn lower_function<E: GlobalEnv>(env: &mut E, decl: &Node) -> LowerResult<Body> {
    let NodeKind::FunctionDecl { ident, params, ret_type, body } = &decl.kind else {
        die!(ErrorKind::InternalCompilerError, decl.line, "expected a function declaration");
    };
    let Some(body) = body else {
        die!(ErrorKind::InternalCompilerError, decl.line, "function has no body to lower");
    };

    let return_ty = resolve_type_decl_on(env.registry(), ret_type)?;
    let mut lowerer = FunctionLowerer::new(env, return_ty);
    for param in params {
        let param_ty = lowerer.resolve_type_decl(&param.type_decl)?;
        lowerer.declare_param(&param.name, param_ty);
    }

    let mut block = lowerer.cfg.entry_block();
    for stmt in body {
        block = lowerer.lower_statement(block, stmt)?;
    }
    if !lowerer.cfg.is_terminated(block) {
        let void_ty = lowerer.return_ty();
        if !matches!(lowerer.env.registry().get(void_ty), Type::Void | Type::None) {
            die!(ErrorKind::MissingReturn, decl.line, "function `{ident}` may fall off its end without a return");
        }
        let function_scope = lowerer.function_scope;
        lowerer.scopes.run_callbacks_through(function_scope, &mut lowerer.cfg, block, decl.line);
        lowerer.cfg.set_terminator(block, egl_ir::TerminatorKind::Return, decl.line);
    }

    Ok(lowerer.finish(ident.clone(), params.len()))
}

/// Lower one class/struct method body (`spec.md` §4.3's "method on a
/// class/struct" calling convention). The receiver is not part of the
/// method's declared `Type::Function` signature — it is an implicit first
/// argument, cast to `*byte` at every call site (`lower_method_call`) — so
/// it is bound here under the reserved name `self`, typed `*byte`, ahead of
/// the method's own explicit parameters. A method body that needs to read
/// or write a field casts `self` back to `Name^`/`Name*` itself, the same
/// way any other `*byte` is narrowed.
pub fn lower_method<E: GlobalEnv>(env: &mut E, struct_name: &str, decl: &Node) -> LowerResult<Body> {
    let NodeKind::FunctionDecl { ident, params, ret_type, body } = &decl.kind else {
        die!(ErrorKind::InternalCompilerError, decl.line, "expected a method declaration");
    };
    let Some(body) = body else {
        die!(ErrorKind::InternalCompilerError, decl.line, "method `{struct_name}::{ident}` has no body to lower");
    };

    let return_ty = resolve_type_decl_on(env.registry(), ret_type)?;
    let mut lowerer = FunctionLowerer::new(env, return_ty);

    let byte_ptr_ty = {
        let registry = lowerer.env.registry();
        let byte = registry.parse_type_name("byte").expect("`byte` is a reserved built-in type name");
        registry.pointer_type(byte, false, false)
    };
    lowerer.declare_param("self", byte_ptr_ty);

    for param in params {
        let param_ty = lowerer.resolve_type_decl(&param.type_decl)?;
        lowerer.declare_param(&param.name, param_ty);
    }

    let mut block = lowerer.cfg.entry_block();
    for stmt in body {
        block = lowerer.lower_statement(block, stmt)?;
    }
    if !lowerer.cfg.is_terminated(block) {
        let void_ty = lowerer.return_ty();
        if !matches!(lowerer.env.registry().get(void_ty), Type::Void | Type::None) {
            die!(
                ErrorKind::MissingReturn,
                decl.line,
                "method `{struct_name}::{ident}` may fall off its end without a return"
            );
        }
        let function_scope = lowerer.function_scope;
        lowerer.scopes.run_callbacks_through(function_scope, &mut lowerer.cfg, block, decl.line);
        lowerer.cfg.set_terminator(block, egl_ir::TerminatorKind::Return, decl.line);
    }

    Ok(lowerer.finish(format!("{struct_name}::{ident}"), params.len() + 1))
}
