//! Tree-walking executor for lowered programs.
//!
//! Evaluation is strict and call-by-value. `Decl` bindings run in order,
//! `CppIf` evaluates exactly one branch and `CppMatch` exactly one clause.
//! Each function invocation gets a fresh frame; binding names are unique
//! within a lowered top-level function, so one flat map per frame suffices.
//!
//! Every invocation runs on its own thread with a stack sized from
//! `EvalOptions`, so `max_call_depth` is reached before the host stack is.

pub mod value;

pub use value::{Closure, TypeTable, Value};

use std::collections::HashMap;
use std::panic;
use std::sync::Arc;
use std::thread;

use tracing::{dispatcher, trace};

use crate::config::EvalOptions;
use crate::error::{InterpError, KernelError};
use crate::ir::node::{Callee, CppFunction, Ident, Node, PackedCall, Pattern};
use crate::ir::program::{FunctionId, Program};
use crate::ir::tensor::Tensor;
use crate::kernel::KernelRegistry;

use value::ClosureCode;

/// A frozen program together with the kernels it calls and the ADT
/// definitions its values are checked against.
///
/// Read-only after construction; cloning shares the program and registry.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    program: Arc<Program>,
    kernels: Arc<KernelRegistry>,
    types: Arc<TypeTable>,
    options: EvalOptions,
}

impl CompiledModule {
    pub fn new(program: Program, kernels: Arc<KernelRegistry>, types: TypeTable) -> Self {
        Self {
            program: Arc::new(program),
            kernels,
            types: Arc::new(types),
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Names of every callable function, in `FunctionId` order.
    pub fn function_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.program.functions().map(|(_, name, _)| name)
    }

    /// Calls global `name` with `args`, checking the argument count and the
    /// type of every argument against the function's parameters.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, InterpError> {
        let id = self
            .program
            .id_of(name)
            .ok_or_else(|| InterpError::UnknownFunction {
                name: name.to_owned(),
            })?;
        self.invoke_id(id, args)
    }

    /// Runs the invocation on a thread with an enlarged stack, forwarding the
    /// caller's tracing subscriber. A panicking kernel resumes on the caller.
    fn invoke_id(&self, id: FunctionId, args: &[Value]) -> Result<Value, InterpError> {
        let stack_size = self.options.thread_stack_size();
        let dispatch = dispatcher::get_default(|d| d.clone());
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name("aotc-eval".to_owned())
                .stack_size(stack_size)
                .spawn_scoped(scope, || dispatcher::with_default(&dispatch, || self.run(id, args)));
            match worker {
                Ok(handle) => handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)),
                Err(e) => Err(InterpError::Executor { detail: e.to_string() }),
            }
        })
    }

    fn run(&self, id: FunctionId, args: &[Value]) -> Result<Value, InterpError> {
        let func = self
            .program
            .function(id)
            .ok_or_else(|| InterpError::UnknownFunction { name: id.to_string() })?;
        let name = self.program.name(id).unwrap_or_default();
        if args.len() != func.params().len() {
            return Err(InterpError::ArityMismatch {
                callee: format!("function '{}'", name),
                expected: func.params().len(),
                found: args.len(),
            });
        }
        for (arg, param) in args.iter().zip(func.params()) {
            if !arg.conforms_to(&param.ty, &self.types) {
                return Err(InterpError::TypeMismatch {
                    node: "argument",
                    expected: param.ty.to_string(),
                    found: describe(arg),
                });
            }
        }
        let mut machine = Machine {
            program: &self.program,
            kernels: &self.kernels,
            types: &self.types,
            options: self.options,
            depth: 0,
        };
        let result = machine.call_global(id, args.to_vec())?;
        if !result.conforms_to(func.ret_type(), &self.types) {
            return Err(InterpError::TypeMismatch {
                node: "return value",
                expected: func.ret_type().to_string(),
                found: describe(&result),
            });
        }
        Ok(result)
    }
}

/// One entry function of a compiled unit, callable directly.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    module: CompiledModule,
    entry: FunctionId,
}

impl CompiledFunction {
    pub fn new(module: CompiledModule, entry: FunctionId) -> Self {
        Self { module, entry }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.module = self.module.with_options(options);
        self
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, InterpError> {
        self.module.invoke_id(self.entry, args)
    }

    pub fn name(&self) -> &str {
        self.module.program.name(self.entry).unwrap_or_default()
    }

    pub fn entry(&self) -> FunctionId {
        self.entry
    }

    /// The whole unit, including every global the entry reaches.
    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    /// The lowered entry function.
    pub fn function(&self) -> Option<&CppFunction> {
        self.module.program.function(self.entry)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

type Frame = HashMap<Ident, Value>;

struct Machine<'a> {
    program: &'a Program,
    kernels: &'a KernelRegistry,
    types: &'a TypeTable,
    options: EvalOptions,
    depth: usize,
}

impl<'a> Machine<'a> {
    fn enter(&mut self) -> Result<(), InterpError> {
        if self.depth >= self.options.max_call_depth {
            return Err(InterpError::DepthExceeded {
                limit: self.options.max_call_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn call_global(&mut self, id: FunctionId, args: Vec<Value>) -> Result<Value, InterpError> {
        let program = self.program;
        let func = program
            .function(id)
            .ok_or_else(|| InterpError::UnknownFunction { name: id.to_string() })?;
        let name = program.name(id).unwrap_or_default();
        trace!(callee = name, depth = self.depth, "invoke");
        self.call_function(func, name, Vec::new(), args)
    }

    fn call_closure(&mut self, closure: &Arc<Closure>, args: Vec<Value>) -> Result<Value, InterpError> {
        match &closure.code {
            ClosureCode::Global(id) => self.call_global(*id, args),
            ClosureCode::Local(func) => {
                let mut bound = Vec::with_capacity(closure.captures.len() + 1);
                if let Some(name) = func.name() {
                    bound.push((name.clone(), Value::Closure(Arc::clone(closure))));
                }
                for (param, value) in func.captures().iter().zip(&closure.captures) {
                    bound.push((param.name.clone(), value.clone()));
                }
                let label = func.name().map(Ident::as_str).unwrap_or("<closure>");
                trace!(callee = label, depth = self.depth, "invoke");
                self.call_function(func, label, bound, args)
            }
        }
    }

    fn call_function(
        &mut self,
        func: &CppFunction,
        label: &str,
        bound: Vec<(Ident, Value)>,
        args: Vec<Value>,
    ) -> Result<Value, InterpError> {
        if args.len() != func.params().len() {
            return Err(InterpError::ArityMismatch {
                callee: format!("function '{}'", label),
                expected: func.params().len(),
                found: args.len(),
            });
        }
        self.enter()?;
        let mut frame: Frame = bound.into_iter().collect();
        for (param, value) in func.params().iter().zip(args) {
            frame.insert(param.name.clone(), value);
        }
        let result = self.eval(func.body(), &mut frame);
        self.depth -= 1;
        result
    }

    fn eval_all(&mut self, nodes: &[Node], frame: &mut Frame) -> Result<Vec<Value>, InterpError> {
        nodes.iter().map(|n| self.eval(n, frame)).collect()
    }

    fn eval(&mut self, node: &Node, frame: &mut Frame) -> Result<Value, InterpError> {
        match node {
            Node::Var(name) => frame.get(name).cloned().ok_or_else(|| unbound(name)),
            Node::Literal(t) => Ok(Value::Tensor(t.clone())),
            Node::Global(g) => Ok(Value::Closure(Arc::new(Closure {
                code: ClosureCode::Global(g.id),
                captures: Vec::new(),
            }))),
            Node::Decl(decl) => {
                for (name, bound) in decl.bindings() {
                    let v = self.eval(bound, frame)?;
                    frame.insert(name.clone(), v);
                }
                self.eval(decl.body(), frame)
            }
            Node::PackedCall(call) => self.eval_packed(call, frame),
            Node::Invoke(inv) => match inv.callee() {
                Callee::Global(target) => {
                    let args = self.eval_all(inv.args(), frame)?;
                    self.call_global(target.id, args)
                }
                Callee::Value(callee) => {
                    let f = self.eval(callee, frame)?;
                    let args = self.eval_all(inv.args(), frame)?;
                    match f {
                        Value::Closure(c) => self.call_closure(&c, args),
                        other => Err(mismatch("Invoke", "a function value", &other)),
                    }
                }
            },
            Node::Function(func) => {
                let mut captures = Vec::with_capacity(func.captures().len());
                for c in func.captures() {
                    let v = frame.get(&c.name).cloned().ok_or_else(|| unbound(&c.name))?;
                    captures.push(v);
                }
                Ok(Value::Closure(Arc::new(Closure {
                    code: ClosureCode::Local(func.clone()),
                    captures,
                })))
            }
            Node::If(cif) => {
                let cond = self.eval(cif.cond(), frame)?;
                match cond.as_tensor().and_then(Tensor::as_bool) {
                    Some(true) => self.eval(cif.true_branch(), frame),
                    Some(false) => self.eval(cif.false_branch(), frame),
                    None => Err(mismatch("CPPIf", "a bool scalar condition", &cond)),
                }
            }
            Node::Tuple(t) => Ok(Value::Tuple(self.eval_all(t.fields(), frame)?)),
            Node::Match(m) => {
                let data = self.eval(m.data(), frame)?;
                for clause in m.clauses() {
                    let mut bound = Vec::new();
                    if bind_pattern(&clause.pattern, &data, &mut bound) {
                        frame.extend(bound);
                        return self.eval(&clause.body, frame);
                    }
                }
                Err(no_clause(&data))
            }
            Node::Constructor(c) => Ok(Value::Adt {
                tag: c.tag(),
                fields: self.eval_all(c.fields(), frame)?,
            }),
        }
    }

    fn eval_packed(&mut self, call: &PackedCall, frame: &mut Frame) -> Result<Value, InterpError> {
        let kernels = self.kernels;
        let kernel = kernels.get(call.name()).ok_or_else(|| InterpError::Kernel {
            kernel: call.name().to_owned(),
            source: KernelError::Invalid {
                detail: "kernel is not registered with this module".to_owned(),
            },
        })?;
        let mut args = self.eval_all(call.args(), frame)?;
        if call.args_is_tuple() {
            args = match args.pop() {
                Some(Value::Tuple(fields)) if fields.len() == call.arity() => fields,
                Some(Value::Tuple(fields)) => {
                    return Err(InterpError::ArityMismatch {
                        callee: format!("kernel '{}'", call.name()),
                        expected: call.arity(),
                        found: fields.len(),
                    })
                }
                Some(other) => {
                    return Err(InterpError::TypeMismatch {
                        node: "PackedCall",
                        expected: "a packed tuple argument".to_owned(),
                        found: describe(&other),
                    })
                }
                None => {
                    return Err(InterpError::ArityMismatch {
                        callee: format!("kernel '{}'", call.name()),
                        expected: 1,
                        found: 0,
                    })
                }
            };
        }
        trace!(kernel = call.name(), arity = call.arity(), packed = call.args_is_tuple(), "packed call");
        let out = kernel.call(&args).map_err(|source| InterpError::Kernel {
            kernel: call.name().to_owned(),
            source,
        })?;
        if self.options.check_kernel_outputs && !out.conforms_to(call.output_type(), self.types) {
            return Err(mismatch("PackedCall", call.output_type(), &out));
        }
        Ok(out)
    }
}

/// Collects the bindings `pattern` makes against `value`, or returns `false`
/// if it does not match.
fn bind_pattern(pattern: &Pattern, value: &Value, out: &mut Vec<(Ident, Value)>) -> bool {
    match (pattern, value) {
        (Pattern::Wildcard, _) => true,
        (Pattern::Bind(name), v) => {
            out.push((name.clone(), v.clone()));
            true
        }
        (
            Pattern::Constructor { tag, fields, .. },
            Value::Adt {
                tag: actual,
                fields: values,
            },
        ) => {
            tag == actual
                && fields.len() == values.len()
                && fields.iter().zip(values).all(|(p, v)| bind_pattern(p, v, out))
        }
        (Pattern::Tuple(fields), Value::Tuple(values)) => {
            fields.len() == values.len() && fields.iter().zip(values).all(|(p, v)| bind_pattern(p, v, out))
        }
        _ => false,
    }
}

// Error construction stays out of line to keep `eval` frames small.

#[cold]
fn unbound(name: &Ident) -> InterpError {
    InterpError::UnboundVariable {
        name: name.to_string(),
    }
}

#[cold]
fn mismatch(node: &'static str, expected: impl ToString, found: &Value) -> InterpError {
    InterpError::TypeMismatch {
        node,
        expected: expected.to_string(),
        found: describe(found),
    }
}

#[cold]
fn no_clause(value: &Value) -> InterpError {
    InterpError::NonExhaustiveMatch {
        value: describe(value),
    }
}

/// Renders a value for diagnostics, with its type when it is a tensor.
fn describe(value: &Value) -> String {
    match value {
        Value::Tensor(t) => format!("{} of type {}", t, t.ty()),
        other => format!("{} {}", other.kind(), other),
    }
}
