//! Source IR → low-level AST lowering.
//!
//! A `CompileContext` owns the global function table for one compilation
//! unit. Globals are lowered on first reference: the name and signature are
//! reserved in the table before the body is lowered, so self and mutual
//! recursion resolve to a stable `FunctionId`. Every function body is then
//! translated by an `FnLowerer` (see `expr.rs`) that threads the environment
//! from source variables to generated binding names.
//!
//! Binding names are generated from a counter that restarts at every
//! top-level function, so lowering the same input twice yields identical
//! output.

mod expr;
mod pattern;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codegen::printer::emit_program_text;
use crate::config::CompileOptions;
use crate::error::LowerError;
use crate::interp::{CompiledFunction, CompiledModule, TypeTable};
use crate::ir::program::{FunctionId, FunctionTable, Program, Signature};
use crate::ir::types::Type;
use crate::kernel::KernelRegistry;
use crate::relay::{Expr, Function, Module, Var};

use expr::FnLowerer;

/// Per-compilation-unit state threaded through every lowering call.
///
/// Created per unit, consumed by `finish` into a frozen `Program`.
pub struct CompileContext<'m> {
    module: &'m Module,
    kernels: &'m KernelRegistry,
    options: CompileOptions,
    table: FunctionTable,
    /// Globals whose return type is currently being inferred.
    resolving: HashSet<String>,
}

impl<'m> CompileContext<'m> {
    pub fn new(module: &'m Module, kernels: &'m KernelRegistry, options: CompileOptions) -> Self {
        Self {
            module,
            kernels,
            options,
            table: FunctionTable::new(),
            resolving: HashSet::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Returns the id of global `name`, lowering it first if this is its
    /// first reference. `requester` names the function being compiled, for
    /// diagnostics.
    pub fn ensure_global(&mut self, name: &str, requester: &str) -> Result<FunctionId, LowerError> {
        if let Some(id) = self.table.lookup(name) {
            return Ok(id);
        }
        let module = self.module;
        let func = module.function(name).ok_or_else(|| LowerError::UndefinedGlobal {
            func: requester.to_owned(),
            name: name.to_owned(),
        })?;
        self.lower_global(name, func)
    }

    /// Reserves `name`, lowers `func` as its body and installs the result.
    pub fn lower_global(&mut self, name: &str, func: &Function) -> Result<FunctionId, LowerError> {
        if self.table.lookup(name).is_some() {
            return Err(LowerError::DuplicateFunction {
                name: name.to_owned(),
            });
        }
        let sig = self.signature_of(name, func)?;
        let param_count = sig.params.len();
        let id = self
            .table
            .reserve(name, sig)
            .map_err(|_| LowerError::DuplicateFunction {
                name: name.to_owned(),
            })?;
        debug!(function = name, id = %id, params = param_count, "reserved global function");

        let mut lowerer = FnLowerer::new(self, name);
        let lowered = lowerer.lower_global_body(func)?;
        let bindings = lowerer.names_issued();

        self.table
            .define(id, lowered)
            .map_err(|_| LowerError::DuplicateFunction {
                name: name.to_owned(),
            })?;
        debug!(function = name, id = %id, bindings, "finalized global function");
        Ok(id)
    }

    /// Signature of a global as known before its body is lowered.
    fn signature_of(&mut self, name: &str, func: &Function) -> Result<Signature, LowerError> {
        let mut params = Vec::with_capacity(func.params.len());
        for p in &func.params {
            if !p.ty().is_resolved() {
                return Err(LowerError::UnresolvedType {
                    func: name.to_owned(),
                    construct: "function parameter",
                });
            }
            params.push(p.ty().clone());
        }
        let ret = self
            .global_ret_type(name, Some(func))
            .ok_or_else(|| LowerError::UnresolvedType {
                func: name.to_owned(),
                construct: "function return type",
            })?;
        Ok(Signature { params, ret })
    }

    /// Return type of a global: from the table once reserved, otherwise from
    /// the declaration or, failing that, from the body's annotations.
    fn global_ret_type(&mut self, name: &str, func: Option<&Function>) -> Option<Type> {
        if let Some(id) = self.table.lookup(name) {
            return self.table.signature(id).map(|s| s.ret.clone());
        }
        let module = self.module;
        let func = func.or_else(|| module.function(name))?;
        if func.ret_type.is_resolved() {
            return Some(func.ret_type.clone());
        }
        if !self.resolving.insert(name.to_owned()) {
            return None;
        }
        let ty = self.infer_type(&func.body, &mut |_: &Var| None);
        self.resolving.remove(name);
        ty
    }

    /// Best-effort type of a source expression whose own annotation may be
    /// missing. `local` supplies types for variables the caller has bound.
    pub(crate) fn infer_type(
        &mut self,
        expr: &Expr,
        local: &mut dyn FnMut(&Var) -> Option<Type>,
    ) -> Option<Type> {
        let ty = expr.ty();
        if ty.is_resolved() {
            return Some(ty);
        }
        match expr {
            Expr::Var(v) => local(v),
            Expr::Global(gv) => {
                let name = gv.name().to_owned();
                let module = self.module;
                let func = module.function(&name);
                let params = match (self.table.lookup(&name), func) {
                    (Some(id), _) => self.table.signature(id)?.params.clone(),
                    (None, Some(f)) => f.params.iter().map(|p| p.ty().clone()).collect(),
                    (None, None) => return None,
                };
                let ret = self.global_ret_type(&name, None)?;
                Some(Type::func(params, ret))
            }
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Global(gv) => self.global_ret_type(gv.name(), None),
                Expr::Op(_) => None,
                other => match self.infer_type(other, local)? {
                    Type::Func { ret, .. } => Some(*ret),
                    _ => None,
                },
            },
            Expr::Let { body, .. } => self.infer_type(body, local),
            Expr::If {
                then_branch,
                else_branch,
                ..
            } => self
                .infer_type(then_branch, local)
                .or_else(|| self.infer_type(else_branch, local)),
            Expr::Tuple { fields, .. } => {
                let mut tys = Vec::with_capacity(fields.len());
                for f in fields {
                    tys.push(self.infer_type(f, local)?);
                }
                Some(Type::Tuple(tys))
            }
            Expr::Match { clauses, .. } => clauses
                .iter()
                .find_map(|c| self.infer_type(&c.body, local)),
            Expr::Function(f) => {
                let params: Vec<Type> = f.params.iter().map(|p| p.ty().clone()).collect();
                let ret = if f.ret_type.is_resolved() {
                    f.ret_type.clone()
                } else {
                    self.infer_type(&f.body, local)?
                };
                Some(Type::func(params, ret))
            }
            Expr::Constant(_) | Expr::Op(_) | Expr::Construct { .. } => None,
        }
    }

    /// Freezes the function table into a read-only `Program`.
    pub fn finish(self) -> Result<Program, LowerError> {
        let dump = self.options.dump_lowered;
        let program = self
            .table
            .freeze()
            .map_err(|name| LowerError::UndefinedGlobal {
                func: name.clone(),
                name,
            })?;
        if dump {
            match emit_program_text(&program) {
                Ok(text) => debug!(functions = program.len(), "lowered program:\n{}", text),
                Err(e) => warn!(error = %e, "could not print the lowered program"),
            }
        }
        Ok(program)
    }
}

/// Lowers every global of `module`, in definition order.
pub fn lower_module(
    module: &Module,
    kernels: &KernelRegistry,
    options: &CompileOptions,
) -> Result<Program, LowerError> {
    let mut cx = CompileContext::new(module, kernels, options.clone());
    for (gv, _) in module.globals() {
        cx.ensure_global(gv.name(), gv.name())?;
    }
    cx.finish()
}

/// Lowers a whole module and makes each of its globals callable by name.
pub fn compile_module(
    module: &Module,
    kernels: &KernelRegistry,
    options: &CompileOptions,
) -> Result<CompiledModule, LowerError> {
    let program = lower_module(module, kernels, options)?;
    Ok(CompiledModule::new(
        program,
        Arc::new(kernels.clone()),
        TypeTable::from_module(module),
    ))
}

/// Compiles `func` as the entry point of a unit that also contains every
/// global of `module` it reaches. The entry is registered as
/// `options.entry_name`.
pub fn compile(
    module: &Module,
    func: &Function,
    kernels: &KernelRegistry,
    options: &CompileOptions,
) -> Result<CompiledFunction, LowerError> {
    let entry_name = options.entry_name.clone();
    if module.function(&entry_name).is_some() {
        return Err(LowerError::DuplicateFunction { name: entry_name });
    }
    let mut cx = CompileContext::new(module, kernels, options.clone());
    let entry = cx.lower_global(&entry_name, func)?;
    let program = cx.finish()?;
    let compiled = CompiledModule::new(
        program,
        Arc::new(kernels.clone()),
        TypeTable::from_module(module),
    );
    Ok(CompiledFunction::new(compiled, entry))
}
