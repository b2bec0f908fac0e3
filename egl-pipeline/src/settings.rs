//! Compiler-wide configuration (`SPEC_FULL.md` §1's "Configuration"
//! paragraph), constructed from CLI flags by the `egl` binary.

/// Settings that apply to the whole compilation run. Kept deliberately
/// small: the core has no optimisation passes, no incremental mode, and
/// no worker pool to configure (`spec.md` §1's Non-goals rule all three
/// out), so this only covers what actually varies between invocations.
#[derive(Debug, Clone)]
pub struct CompilerSettings {
    /// Enables `trace`/`debug`-level log output from the lowerer and
    /// pipeline (block creation, scope push/pop, transient flush, stage
    /// timing).
    pub debug: bool,

    /// Pretty-print the parsed top-level declarations before lowering.
    pub dump_ast: bool,

    /// Pretty-print every lowered function body after compilation finishes.
    pub dump_ir: bool,

    /// Maximum stack size, in bytes, for the running instance — threaded
    /// through to the eventual backend/linker, unused by the core itself.
    pub stack_size: usize,

    /// Target triple placeholder; the core has no target-specific layout
    /// logic (`egl-ir::IrType::abi_size` is target-independent), but the
    /// eventual backend needs to know what it's building for.
    pub target: String,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            debug: false,
            dump_ast: false,
            dump_ir: false,
            stack_size: 10_000,
            target: std::env::consts::ARCH.to_string(),
        }
    }
}

impl CompilerSettings {
    pub fn new() -> Self {
        Self::default()
    }
}
