//! Command-line arguments (`SPEC_FULL.md` §1's "Configuration" paragraph):
//! a modern `#[derive(Parser)]` surface, not the deprecated `Clap` trait the
//! teacher's oldest snapshot used.

use clap::Parser;
use egl_pipeline::CompilerSettings;

/// `egl <file> [flags]` — the whole CLI surface this core needs. There is
/// no subcommand system: the core has a single compilation stage (AST in,
/// IR out), unlike the teacher's multi-stage `SubCmd` (`spec.md` §1's
/// Non-goals rule out incremental/staged compilation here).
#[derive(Parser, Debug)]
#[command(name = "egl", version, about = "Eagle AST-to-IR code generator")]
pub struct CompilerOptions {
    /// Source file to compile. Parsing itself is an external collaborator
    /// (`spec.md` §6.3) — this binary hands the file path down to whatever
    /// frontend produced the AST; it does not lex/parse source text itself.
    pub filename: String,

    /// Enable `trace`/`debug`-level log output from the lowerer and
    /// pipeline.
    #[arg(long)]
    pub debug: bool,

    /// Pretty-print the parsed top-level declarations before lowering.
    #[arg(long)]
    pub dump_ast: bool,

    /// Pretty-print every lowered function/method body after compilation.
    #[arg(long)]
    pub dump_ir: bool,

    /// Maximum stack size, in bytes, for the running instance.
    #[arg(long, default_value = "10000")]
    pub stack_size: usize,

    /// Target triple placeholder, threaded through to the eventual
    /// backend/linker; the core itself has no target-specific layout logic.
    #[arg(long, default_value = std::env::consts::ARCH)]
    pub target: String,
}

impl From<&CompilerOptions> for CompilerSettings {
    fn from(opts: &CompilerOptions) -> Self {
        CompilerSettings {
            debug: opts.debug,
            dump_ast: opts.dump_ast,
            dump_ir: opts.dump_ir,
            stack_size: opts.stack_size,
            target: opts.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_carry_through_to_settings() {
        let opts = CompilerOptions {
            filename: "main.eg".into(),
            debug: true,
            dump_ast: false,
            dump_ir: true,
            stack_size: 4096,
            target: "x86_64".into(),
        };
        let settings: CompilerSettings = (&opts).into();
        assert!(settings.debug);
        assert!(!settings.dump_ast);
        assert!(settings.dump_ir);
        assert_eq!(settings.stack_size, 4096);
        assert_eq!(settings.target, "x86_64");
    }
}
