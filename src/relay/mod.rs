//! The consumed source IR: a type-annotated functional expression language
//! with globals, tuples, algebraic data types and kernel calls.
//!
//! This is the output of the upstream type checker. Nothing here validates
//! scoping or typing; the lowerer trusts the annotations it finds.

pub mod expr;
pub mod free_vars;
pub mod module;
pub mod op;

pub use expr::{scalar, Clause, Expr, Function, GlobalVar, Pattern, Var, VarId};
pub use free_vars::{free_vars, function_free_vars};
pub use module::{ConstructorDef, ConstructorInfo, Module, TypeData};
