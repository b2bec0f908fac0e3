//! The fourth component (`spec.md` §2): wires the type registry, global
//! declaration passes, and per-function/per-method lowering together into
//! one `CompilerContext`, and carries the settings the `egl` binary builds
//! from CLI flags.

pub mod context;
pub mod settings;

pub use context::{CompiledModule, CompilerContext};
pub use settings::CompilerSettings;
