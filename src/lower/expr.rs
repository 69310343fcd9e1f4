use std::collections::HashMap;
use std::mem;

use crate::error::{AstError, LowerError};
use crate::ir::node::{
    Callee, CppConstructor, CppFunction, CppIf, CppTuple, Decl, GlobalRef, Ident, Invoke, Node,
    PackedCall, Param,
};
use crate::ir::types::Type;
use crate::kernel::KernelArity;
use crate::lower::CompileContext;
use crate::relay::{function_free_vars, Expr, Function, Var, VarId};

/// What a source variable lowered to.
#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub ident: Ident,
    pub ty: Type,
}

/// Lowers the body of one top-level function.
///
/// `bindings` is the binding list of the innermost open scope. Lowering a
/// `let` appends to it; function bodies, `if` branches and match clauses
/// open a fresh list that is closed into a `Decl` around their result, so
/// their bindings are never hoisted out of them.
pub(super) struct FnLowerer<'c, 'm> {
    pub(super) cx: &'c mut CompileContext<'m>,
    pub(super) func_name: String,
    pub(super) env: HashMap<VarId, Binding>,
    bindings: Vec<(Ident, Node)>,
    counter: usize,
}

impl<'c, 'm> FnLowerer<'c, 'm> {
    pub(super) fn new(cx: &'c mut CompileContext<'m>, func_name: &str) -> Self {
        Self {
            cx,
            func_name: func_name.to_owned(),
            env: HashMap::new(),
            bindings: Vec::new(),
            counter: 0,
        }
    }

    /// Number of binding names generated so far.
    pub(super) fn names_issued(&self) -> usize {
        self.counter
    }

    /// Lowers a global's body. Globals have no captures; they refer to
    /// themselves and to each other through the function table.
    pub(super) fn lower_global_body(&mut self, func: &Function) -> Result<CppFunction, LowerError> {
        let id = self.cx.table.lookup(&self.func_name);
        let ret = id
            .and_then(|id| self.cx.table.signature(id))
            .map(|sig| sig.ret.clone());
        self.lower_function(func, None, Vec::new(), ret)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub(super) fn fresh(&mut self, hint: &str) -> Ident {
        let base: String = hint
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        let n = self.counter;
        self.counter += 1;
        if base.is_empty() {
            Ident::new(format!("v_{}", n))
        } else {
            Ident::new(format!("{}_{}", base, n))
        }
    }

    fn lookup(&self, var: &Var) -> Result<&Binding, LowerError> {
        self.env.get(&var.id()).ok_or_else(|| LowerError::UnboundVariable {
            func: self.func_name.clone(),
            name: var.name().to_owned(),
        })
    }

    /// Type of `expr`, filling missing annotations from the environment and
    /// the module's signatures.
    pub(super) fn type_of(&mut self, expr: &Expr) -> Option<Type> {
        let env = &self.env;
        self.cx.infer_type(expr, &mut |v: &Var| {
            env.get(&v.id())
                .map(|b| b.ty.clone())
                .filter(Type::is_resolved)
        })
    }

    fn require_type(&mut self, expr: &Expr, construct: &'static str) -> Result<Type, LowerError> {
        self.type_of(expr).ok_or_else(|| LowerError::UnresolvedType {
            func: self.func_name.clone(),
            construct,
        })
    }

    pub(super) fn invalid(&self, source: AstError) -> LowerError {
        LowerError::InvalidNode {
            func: self.func_name.clone(),
            source,
        }
    }

    pub(super) fn mismatch(&self, construct: &'static str, detail: String) -> LowerError {
        LowerError::TypeMismatch {
            func: self.func_name.clone(),
            construct,
            detail,
        }
    }

    pub(super) fn check_arity(&self, callee: String, expected: usize, found: usize) -> Result<(), LowerError> {
        if expected == found {
            Ok(())
        } else {
            Err(LowerError::ArityMismatch {
                func: self.func_name.clone(),
                callee,
                expected,
                found,
            })
        }
    }

    /// Lowers `expr` in a scope of its own and closes the scope's bindings
    /// into a `Decl` around the result.
    pub(super) fn lower_scope(&mut self, expr: &Expr) -> Result<Node, LowerError> {
        let outer = mem::take(&mut self.bindings);
        let result = self.lower_expr(expr);
        let inner = mem::replace(&mut self.bindings, outer);
        let body = result?;
        Decl::wrap(inner, body).map_err(|e| self.invalid(e))
    }

    fn lower_args(&mut self, args: &[Expr]) -> Result<Vec<Node>, LowerError> {
        args.iter().map(|a| self.lower_expr(a)).collect()
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<Node, LowerError> {
        match expr {
            Expr::Var(v) => Ok(Node::Var(self.lookup(v)?.ident.clone())),
            Expr::Constant(t) => Ok(Node::Literal(t.clone())),
            Expr::Let { var, value, body } => {
                self.lower_let(var, value)?;
                self.lower_expr(body)
            }
            Expr::Function(f) => self.lower_closure(f, None).map(Node::Function),
            Expr::Global(gv) => {
                let id = self.cx.ensure_global(gv.name(), &self.func_name)?;
                Ok(Node::Global(GlobalRef {
                    id,
                    name: gv.name().to_owned(),
                }))
            }
            Expr::Op(name) => Err(self.mismatch(
                "operator",
                format!("kernel '{}' can only appear as the callee of a call", name),
            )),
            Expr::Call { callee, args, ty } => self.lower_call(callee, args, ty),
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.lower_if(expr, cond, then_branch, else_branch),
            Expr::Tuple { fields, .. } => {
                let nodes = self.lower_args(fields)?;
                let ty = self.require_type(expr, "tuple")?;
                CppTuple::new(nodes, ty)
                    .map(Node::Tuple)
                    .map_err(|e| self.invalid(e))
            }
            Expr::Match { data, clauses, .. } => self.lower_match(expr, data, clauses),
            Expr::Construct {
                constructor,
                fields,
                ty,
            } => self.lower_construct(constructor, fields, ty),
        }
    }

    /// Appends the binding for `var` to the current scope. A function value
    /// becomes a named local function that can call itself.
    ///
    /// The current scope is the enclosing function body or `if` branch, not
    /// the expression position. A `let` inside a call argument is therefore
    /// hoisted: its value is evaluated before every argument of that call,
    /// including the ones to its left.
    fn lower_let(&mut self, var: &Var, value: &Expr) -> Result<(), LowerError> {
        let ident = self.fresh(var.name());
        let node = match value {
            Expr::Function(f) => {
                self.env.insert(
                    var.id(),
                    Binding {
                        ident: ident.clone(),
                        ty: f.fn_type(),
                    },
                );
                let func = self.lower_closure(f, Some((var.id(), ident.clone())))?;
                if let Some(b) = self.env.get_mut(&var.id()) {
                    b.ty = func.fn_type();
                }
                Node::Function(func)
            }
            _ => {
                let node = self.lower_expr(value)?;
                let ty = if var.ty().is_resolved() {
                    var.ty().clone()
                } else {
                    self.type_of(value).unwrap_or(Type::Infer)
                };
                self.env.insert(
                    var.id(),
                    Binding {
                        ident: ident.clone(),
                        ty,
                    },
                );
                node
            }
        };
        self.bindings.push((ident, node));
        Ok(())
    }

    /// Lowers a function literal, capturing its free variables from the
    /// current environment. `self_ref` names a let-bound function so its body
    /// can refer to itself without capturing itself.
    fn lower_closure(&mut self, f: &Function, self_ref: Option<(VarId, Ident)>) -> Result<CppFunction, LowerError> {
        let self_id = self_ref.as_ref().map(|(id, _)| *id);
        let mut captures = Vec::new();
        for v in function_free_vars(f) {
            if Some(v.id()) == self_id {
                continue;
            }
            let b = self.lookup(&v)?;
            captures.push(Param::new(b.ident.clone(), b.ty.clone()));
        }
        self.lower_function(f, self_ref.map(|(_, ident)| ident), captures, None)
    }

    fn lower_function(
        &mut self,
        f: &Function,
        name: Option<Ident>,
        captures: Vec<Param>,
        ret: Option<Type>,
    ) -> Result<CppFunction, LowerError> {
        let saved_env = self.env.clone();
        let mut params = Vec::with_capacity(f.params.len());
        for p in &f.params {
            if !p.ty().is_resolved() {
                return Err(LowerError::UnresolvedType {
                    func: self.func_name.clone(),
                    construct: "function parameter",
                });
            }
            let ident = self.fresh(p.name());
            self.env.insert(
                p.id(),
                Binding {
                    ident: ident.clone(),
                    ty: p.ty().clone(),
                },
            );
            params.push(Param::new(ident, p.ty().clone()));
        }
        let body = self.lower_scope(&f.body)?;
        let ret_type = match ret {
            Some(t) => t,
            None if f.ret_type.is_resolved() => f.ret_type.clone(),
            None => self.require_type(&f.body, "function return type")?,
        };
        self.env = saved_env;
        CppFunction::new(name, params, captures, body, ret_type).map_err(|e| self.invalid(e))
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], ty: &Type) -> Result<Node, LowerError> {
        match callee {
            Expr::Op(name) => self.lower_kernel_call(name, args, ty),
            Expr::Global(gv) => {
                let id = self.cx.ensure_global(gv.name(), &self.func_name)?;
                let expected = self
                    .cx
                    .table
                    .signature(id)
                    .map_or(args.len(), |sig| sig.params.len());
                self.check_arity(format!("function '{}'", gv.name()), expected, args.len())?;
                let args = self.lower_args(args)?;
                let target = GlobalRef {
                    id,
                    name: gv.name().to_owned(),
                };
                Ok(Node::Invoke(Invoke::new(Callee::Global(target), args)))
            }
            other => {
                if let Some(Type::Func { params, .. }) = self.type_of(other) {
                    self.check_arity(format!("{} value", other.kind()), params.len(), args.len())?;
                }
                let func = self.lower_expr(other)?;
                let args = self.lower_args(args)?;
                Ok(Node::Invoke(Invoke::new(Callee::Value(Box::new(func)), args)))
            }
        }
    }

    fn lower_kernel_call(&mut self, name: &str, args: &[Expr], ty: &Type) -> Result<Node, LowerError> {
        let kernels = self.cx.kernels;
        let kernel = kernels.get(name).ok_or_else(|| LowerError::UnknownKernel {
            func: self.func_name.clone(),
            name: name.to_owned(),
        })?;
        if !ty.is_resolved() {
            return Err(LowerError::UnresolvedType {
                func: self.func_name.clone(),
                construct: "kernel call output",
            });
        }
        let label = format!("kernel '{}'", name);
        let (arity, packed) = match kernel.arity() {
            KernelArity::Fixed(n) => {
                self.check_arity(label, n, args.len())?;
                (n, false)
            }
            KernelArity::Packed => {
                self.check_arity(label, 1, args.len())?;
                let width = match self.type_of(&args[0]) {
                    Some(Type::Tuple(fields)) => fields.len(),
                    Some(other) => {
                        return Err(self.mismatch(
                            "packed kernel call",
                            format!("kernel '{}' takes one tuple argument, found '{}'", name, other),
                        ))
                    }
                    None => {
                        return Err(LowerError::UnresolvedType {
                            func: self.func_name.clone(),
                            construct: "packed kernel argument",
                        })
                    }
                };
                (width, true)
            }
        };
        let nodes = self.lower_args(args)?;
        PackedCall::new(name, arity, nodes, ty.clone(), packed)
            .map(Node::PackedCall)
            .map_err(|e| self.invalid(e))
    }

    fn lower_if(&mut self, expr: &Expr, cond: &Expr, then_branch: &Expr, else_branch: &Expr) -> Result<Node, LowerError> {
        let cond_node = self.lower_expr(cond)?;
        if let Some(ct) = self.type_of(cond) {
            if !ct.is_bool_scalar() {
                return Err(self.mismatch(
                    "if condition",
                    format!("expected a bool scalar, found '{}'", ct),
                ));
            }
        }
        let t = self.lower_scope(then_branch)?;
        let f = self.lower_scope(else_branch)?;
        let ty = self.require_type(expr, "if")?;
        CppIf::new(cond_node, t, f, ty)
            .map(Node::If)
            .map_err(|e| self.invalid(e))
    }

    fn lower_construct(&mut self, name: &str, fields: &[Expr], ty: &Type) -> Result<Node, LowerError> {
        let module = self.cx.module;
        let info = module
            .constructor(name)
            .ok_or_else(|| LowerError::UnknownConstructor {
                func: self.func_name.clone(),
                name: name.to_owned(),
            })?;
        let adt_ty = Type::Adt(info.adt.name.clone());
        if ty.is_resolved() && *ty != adt_ty {
            return Err(self.mismatch(
                "constructor application",
                format!("'{}' builds '{}', but the node is annotated '{}'", name, adt_ty, ty),
            ));
        }
        let arity = info.def.fields.len();
        self.check_arity(format!("constructor '{}'", name), arity, fields.len())?;
        let nodes = self.lower_args(fields)?;
        CppConstructor::new(info.tag, name, arity, nodes, adt_ty)
            .map(Node::Constructor)
            .map_err(|e| self.invalid(e))
    }
}
