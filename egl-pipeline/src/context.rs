//! The module-level compiler context (`SPEC_FULL.md` §2's fourth
//! component): owns the [`TypeRegistry`], the global function table, the
//! interned C-string table, and struct-codegen bookkeeping that outlives
//! any single function body, and drives the three-pass compile of one
//! source unit (`declare_types` -> `declare_functions` -> per-function and
//! per-method lowering).

use std::collections::{HashMap, HashSet};

use egl_ast::{EnumDecl, InterfaceDecl, Node, NodeKind};
use egl_ir::Body;
use egl_lower::{
    build_copy, build_destroy, build_init, declare_functions, declare_interfaces_and_enums,
    declare_types, lower_function, lower_method, GlobalEnv, LowerResult,
};
use egl_reporting::{die, ErrorKind};
use egl_types::TypeRegistry;
use egl_utils::CompilationId;
use log::debug;

use crate::settings::CompilerSettings;

/// Everything one compilation produces: every lowered function/method body
/// plus the literal C-strings the runtime needs to place as private
/// globals (`spec.md` §6.3's AST contract has no node for a literal's
/// backing storage — that's this context's job).
#[derive(Debug, Default)]
pub struct CompiledModule {
    pub bodies: Vec<Body>,
    pub cstrings: Vec<(String, String)>,
}

/// The `egl_lower::GlobalEnv` implementation, and the driver for one
/// compilation. `spec.md` §5 treats the type registry, global function
/// table, and struct-codegen bookkeeping as process-wide shared state that
/// must be reset between compilations — [`CompilerContext::new`] always
/// starts from a fresh [`TypeRegistry`], and nothing here is ever reused
/// across two [`CompilationId`]s.
pub struct CompilerContext {
    pub id: CompilationId,
    pub settings: CompilerSettings,
    registry: TypeRegistry,
    functions: HashMap<String, egl_types::TypeId>,
    codegen_done: HashSet<String>,
    codegen_pending: Vec<String>,
    cstrings: Vec<(String, String)>,
    cstring_counter: u32,
}

impl CompilerContext {
    pub fn new(settings: CompilerSettings) -> Self {
        let registry = TypeRegistry::new();
        let functions = declare_runtime_functions(&registry);
        Self {
            id: CompilationId::new(),
            settings,
            registry,
            functions,
            codegen_done: HashSet::new(),
            codegen_pending: Vec::new(),
            cstrings: Vec::new(),
            cstring_counter: 0,
        }
    }

    /// Release every piece of process-wide state this context holds
    /// (`spec.md` §5's teardown contract). Called automatically on drop;
    /// exposed directly so a long-lived host (e.g. a language server) can
    /// reset between compilations without dropping the context itself.
    pub fn teardown(&mut self) {
        self.registry.teardown();
        self.functions = declare_runtime_functions(&self.registry);
        self.codegen_done.clear();
        self.codegen_pending.clear();
        self.cstrings.clear();
        self.cstring_counter = 0;
    }

    /// Compile one source unit end to end: register every declared
    /// `interface`/`enum` (`interfaces`/`enums` — driver-level inputs with
    /// no AST node of their own, `spec.md` §6.3), then every struct/class
    /// layout, then declare every function and method signature, then
    /// lower each body in turn. `struct_decl`'s own `interfaces`/methods are
    /// resolved by [`egl_lower::declare_types`] before any body is lowered,
    /// so forward references to sibling types/functions/methods all
    /// resolve regardless of declaration order.
    pub fn compile_module(
        &mut self,
        interfaces: &[InterfaceDecl],
        enums: &[EnumDecl],
        decls: &[Node],
    ) -> LowerResult<CompiledModule> {
        declare_interfaces_and_enums(&self.registry, interfaces, enums)?;
        declare_types(&self.registry, decls)?;
        self.functions.extend(declare_functions(&self.registry, decls)?);

        let mut bodies = Vec::new();
        for decl in decls {
            match &decl.kind {
                NodeKind::FunctionDecl { .. } => {
                    debug!("lowering function");
                    bodies.push(lower_function(self, decl)?);
                }
                NodeKind::StructDecl { name, is_class, methods, .. } => {
                    if *is_class {
                        for method in methods {
                            debug!("lowering method {name}::_");
                            bodies.push(lower_method(self, name, method)?);
                        }
                    }
                }
                _ => die!(
                    ErrorKind::InternalCompilerError,
                    decl.line,
                    "unexpected top-level declaration"
                ),
            }
        }

        // Every struct/class a body's allocation/assignment lowering
        // touched queued a codegen request via `ensure_struct_codegen`;
        // flush them now rather than mid-lowering so a struct referenced
        // only by another struct's own generated destructor is still
        // covered (`spec.md` §4.4's struct codegen paragraph).
        while let Some(name) = self.codegen_pending.pop() {
            bodies.push(build_init(&self.registry, &name));
            bodies.push(build_copy(&self.registry, &name));
            bodies.push(build_destroy(&self.registry, &name));
        }

        Ok(CompiledModule { bodies, cstrings: std::mem::take(&mut self.cstrings) })
    }
}

/// The six-helper runtime ABI (`spec.md` §6.1) plus `printf`, declared once
/// per module before any lowering begins (`SPEC_FULL.md` §2's
/// `ac_prepare_module` note). Nothing in this crate's lowering path
/// actually consults these entries today — runtime calls are emitted as
/// `RuntimeCall` variants, and `printf` is referenced by a bare `FnRef`
/// (`spec.md` §4.3) — but a future backend/linker walks this table to know
/// what to declare as external symbols, and `lookup_function("printf")`
/// resolving correctly keeps the global function table honest.
fn declare_runtime_functions(registry: &TypeRegistry) -> HashMap<String, egl_types::TypeId> {
    use egl_types::ClosureKind;

    let void = registry.void_type();
    let int1 = registry.int1();
    let int64 = registry.int64();
    let byte = registry.int8();
    let byte_ptr = registry.pointer_type(byte, false, false);
    let byte_ptr_ptr = registry.pointer_type(byte_ptr, false, false);
    let int64_ptr = registry.pointer_type(int64, false, false);

    let mut table = HashMap::new();
    let mut declare = |name: &str, params: Vec<egl_types::TypeId>, variadic: bool| {
        let ty = registry.function_type(void, params, variadic, ClosureKind::None, false);
        table.insert(name.to_string(), ty);
    };

    declare("__egl_incr_ptr", vec![int64_ptr], false);
    declare("__egl_decr_ptr", vec![int64_ptr], false);
    declare("__egl_check_ptr", vec![int64_ptr], false);
    declare("__egl_array_fill_nil", vec![byte_ptr, int64], false);
    declare("__egl_array_decr_ptrs", vec![byte_ptr_ptr, int64], false);
    declare("__egl_counted_destructor", vec![byte_ptr, int1], false);
    declare("printf", vec![byte_ptr], true);

    table
}

impl GlobalEnv for CompilerContext {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn lookup_function(&self, name: &str) -> Option<egl_types::TypeId> {
        self.functions.get(name).copied()
    }

    fn intern_cstring(&mut self, value: &str) -> String {
        let symbol = format!("__egl_str_{}", self.cstring_counter);
        self.cstring_counter += 1;
        self.cstrings.push((symbol.clone(), value.to_string()));
        symbol
    }

    fn ensure_struct_codegen(&mut self, struct_name: &str) -> bool {
        let needs_destructor = {
            let ty = self
                .registry
                .parse_type_name(struct_name)
                .expect("struct codegen requested for an undeclared type");
            self.registry.needs_destructor(ty)
        };
        if needs_destructor && self.codegen_done.insert(struct_name.to_string()) {
            self.codegen_pending.push(struct_name.to_string());
        }
        needs_destructor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egl_ast::node::NamedTypeDecl;

    fn void_decl(line: u32) -> Node {
        Node::type_decl("void", line)
    }

    #[test]
    fn compiles_an_empty_function() {
        let mut ctx = CompilerContext::new(CompilerSettings::new());
        let decl = Node::new(
            NodeKind::FunctionDecl {
                ident: "main".into(),
                params: vec![],
                ret_type: Box::new(void_decl(1)),
                body: Some(vec![]),
            },
            1,
        );

        let module =
            ctx.compile_module(&[], &[], &[decl]).expect("empty body with a void return should lower");
        assert_eq!(module.bodies.len(), 1);
        assert_eq!(module.bodies[0].name, "main");
        assert_eq!(module.bodies[0].arg_count, 0);
    }

    #[test]
    fn method_body_gets_an_implicit_receiver_and_qualified_name() {
        let mut ctx = CompilerContext::new(CompilerSettings::new());
        let method = Node::new(
            NodeKind::FunctionDecl {
                ident: "bark".into(),
                params: vec![],
                ret_type: Box::new(void_decl(1)),
                body: Some(vec![]),
            },
            1,
        );
        let class_decl = Node::new(
            NodeKind::StructDecl {
                name: "Dog".into(),
                fields: vec![],
                is_class: true,
                interfaces: vec![],
                methods: vec![method],
            },
            1,
        );

        let module =
            ctx.compile_module(&[], &[], &[class_decl]).expect("a fieldless class method should lower");
        assert_eq!(module.bodies.len(), 1);
        assert_eq!(module.bodies[0].name, "Dog::bark");
        assert_eq!(module.bodies[0].arg_count, 1);
    }

    #[test]
    fn teardown_resets_registry_but_keeps_runtime_declarations() {
        let mut ctx = CompilerContext::new(CompilerSettings::new());
        let decl = Node::new(
            NodeKind::StructDecl {
                name: "Empty".into(),
                fields: vec![NamedTypeDecl { name: "x".into(), type_decl: Node::type_decl("int", 1) }],
                is_class: false,
                interfaces: vec![],
                methods: vec![],
            },
            1,
        );
        ctx.compile_module(&[], &[], &[decl]).unwrap();
        assert!(ctx.registry().parse_type_name("Empty").is_some());

        ctx.teardown();
        assert!(ctx.registry().parse_type_name("Empty").is_none());
        assert!(ctx.lookup_function("printf").is_some());
    }

    #[test]
    fn class_implementing_an_interface_resolves_through_compile_module() {
        use egl_ast::{InterfaceDecl, InterfaceMethodSig};

        let mut ctx = CompilerContext::new(CompilerSettings::new());
        let interfaces = vec![InterfaceDecl {
            name: "Greeter".into(),
            composed: vec![],
            methods: vec![InterfaceMethodSig { name: "greet".into(), params: vec![], ret_type: void_decl(1) }],
        }];
        let method = Node::new(
            NodeKind::FunctionDecl {
                ident: "greet".into(),
                params: vec![],
                ret_type: Box::new(void_decl(1)),
                body: Some(vec![]),
            },
            1,
        );
        let class_decl = Node::new(
            NodeKind::StructDecl {
                name: "Dog".into(),
                fields: vec![],
                is_class: true,
                interfaces: vec!["Greeter".into()],
                methods: vec![method],
            },
            1,
        );

        ctx.compile_module(&interfaces, &[], &[class_decl]).expect("class implementing Greeter should lower");

        assert!(ctx.registry().class_implements_interface("Dog", "Greeter"));
        assert_eq!(ctx.registry().interface_offset("Greeter", "greet"), Some(0));
        let interface_ty = ctx.registry().parse_type_name("Greeter").expect("Greeter should resolve");
        assert!(matches!(ctx.registry().get(interface_ty), egl_types::Type::Interface(names) if names == vec!["Greeter".to_string()]));
    }
}
