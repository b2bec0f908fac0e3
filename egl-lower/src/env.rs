//! The boundary between one function's [`crate::build::Builder`] and the
//! rest of a compilation: the type registry, the global function table,
//! and the module-level struct-codegen/string-literal bookkeeping that
//! outlives any single function body.

use egl_types::{TypeId, TypeRegistry};

/// Implemented by the module-level compiler context (`egl-pipeline`). Kept
/// as a trait so this crate never depends back on its owner.
pub trait GlobalEnv {
    fn registry(&self) -> &TypeRegistry;

    /// The function type of a top-level declared function, populated by
    /// the early-declaration pass (`SPEC_FULL.md` §2) before any body is
    /// lowered, so forward/mutual recursion resolves.
    fn lookup_function(&self, name: &str) -> Option<TypeId>;

    /// Intern a C-string literal as a private global, returning its
    /// symbol name for the IR to reference.
    fn intern_cstring(&mut self, value: &str) -> String;

    /// Ensure the given struct/class type has its `__egl_i_/_c_/_x_`
    /// functions generated if it needs a destructor, and return whether it
    /// needs one (`spec.md` §4.4's struct codegen paragraph).
    fn ensure_struct_codegen(&mut self, struct_name: &str) -> bool;
}
