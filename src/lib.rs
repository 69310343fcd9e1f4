//! aotc: an ahead-of-time lowering compiler for a typed functional tensor IR.
//!
//! Compiler pipeline:
//!
//! ```text
//! relay::Module / relay::Function  (typed source IR)
//!   → lower (CompileContext + FunctionTable) → [ir::Program]
//!   → interp (CompiledModule / CompiledFunction) → Value
//!   → codegen::printer → text for the external code generator
//! ```
//!
//! Lowering stages (per function):
//! 1. Reserve the global's name and signature in the function table
//! 2. Translate the body construct by construct into low-level AST nodes
//! 3. Check match exhaustiveness against the module's ADT definitions
//! 4. Install the finished `CppFunction` and freeze the table into a `Program`

pub mod codegen;
pub mod config;
pub mod error;
pub mod interp;
pub mod ir;
pub mod kernel;
pub mod lower;
pub mod relay;

pub use config::{CompileOptions, EvalOptions};
pub use error::Error;
pub use interp::{CompiledFunction, CompiledModule, TypeTable, Value};
pub use kernel::{Kernel, KernelArity, KernelRegistry};
pub use lower::{compile, compile_module, lower_module};

/// Lowers every global of `module` and renders the result as text.
///
/// This is the hand-off format for an external code generator.
pub fn emit_text(
    module: &relay::Module,
    kernels: &KernelRegistry,
    options: &CompileOptions,
) -> Result<String, Error> {
    let program = lower_module(module, kernels, options)?;
    let text = codegen::printer::emit_program_text(&program)?;
    Ok(text)
}
