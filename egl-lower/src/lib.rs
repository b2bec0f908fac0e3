//! Lowers a parsed Eagle AST into the IR defined by `egl-ir`: the AST
//! Dispatcher, Expression Lowerer, Memory-Management Inserter and
//! generated struct support functions (`spec.md` §4).

pub mod build;
pub mod env;
pub mod scope;
pub mod transients;

pub use build::{
    build_copy, build_destroy, build_init, declare_functions, declare_interfaces_and_enums,
    declare_types, lower_function, lower_method, LowerResult,
};
pub use env::GlobalEnv;
