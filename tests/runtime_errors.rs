// runtime_errors.rs — Invocation failures
//
// Covers:
//   - argument count and argument type checks at the entry
//   - calling a name the unit does not contain
//   - the call depth guard, including deep recursion under default options
//   - ADT and closure arguments checked against their declared types
//   - kernel failures and kernel output checks
//   - diagnostic codes and messages on the top-level error

use aotc::error::{InterpError, KernelError};
use aotc::ir::tensor::Tensor;
use aotc::ir::types::{DType, Type};
use aotc::relay::{op, Clause, ConstructorDef, Expr, Function, GlobalVar, Module, Pattern, TypeData, Var};
use aotc::{
    compile, compile_module, CompileOptions, Error, EvalOptions, Kernel, KernelArity, KernelRegistry, Value,
};

fn f32_ty() -> Type {
    Type::scalar(DType::F32)
}

fn i32_ty() -> Type {
    Type::scalar(DType::I32)
}

fn f32v(x: f32) -> Value {
    Value::Tensor(Tensor::scalar_f32(x))
}

fn i32v(x: i32) -> Value {
    Value::Tensor(Tensor::scalar_i32(x))
}

fn identity() -> aotc::CompiledFunction {
    let x = Var::new("x", f32_ty());
    let func = Function::new(vec![x.clone()], Expr::var(&x));
    compile(&Module::new(), &func, &KernelRegistry::default(), &CompileOptions::default()).unwrap()
}

// ── Test 1: argument checks ───────────────────────────────────────────────

#[test]
fn test_wrong_argument_count() {
    let err = identity().call(&[f32v(1.0), f32v(2.0)]).unwrap_err();
    assert_eq!(
        err,
        InterpError::ArityMismatch {
            callee: "function 'main'".to_owned(),
            expected: 1,
            found: 2,
        }
    );
}

#[test]
fn test_wrong_argument_type() {
    let err = identity().call(&[i32v(1)]).unwrap_err();
    match err {
        InterpError::TypeMismatch { node, expected, found } => {
            assert_eq!(node, "argument");
            assert_eq!(expected, "tensor<float32, []>");
            assert!(found.contains("int32"), "found: {}", found);
        }
        other => panic!("expected TypeMismatch, got {}", other),
    }

    let err = identity().call(&[Value::Tuple(vec![f32v(1.0)])]).unwrap_err();
    assert!(matches!(err, InterpError::TypeMismatch { node: "argument", .. }));
}

// ── Test 2: unknown function ──────────────────────────────────────────────

#[test]
fn test_unknown_function() {
    let compiled = identity();
    let err = compiled.module().invoke("nope", &[]).unwrap_err();
    assert_eq!(err, InterpError::UnknownFunction { name: "nope".to_owned() });

    let main = compiled.module().invoke("main", &[f32v(3.0)]).unwrap();
    assert_eq!(main, f32v(3.0));
}

// ── Test 3: call depth guard ──────────────────────────────────────────────

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let mut module = Module::new();
    let spin = GlobalVar::new("spin");
    let x = Var::new("x", f32_ty());
    module
        .define(
            &spin,
            Function::with_ret_type(vec![x.clone()], spin.call(vec![Expr::var(&x)]), f32_ty()),
        )
        .unwrap();

    let compiled = compile_module(&module, &KernelRegistry::default(), &CompileOptions::default())
        .unwrap()
        .with_options(EvalOptions::new().max_call_depth(64));
    let err = compiled.invoke("spin", &[f32v(0.0)]).unwrap_err();
    assert_eq!(err, InterpError::DepthExceeded { limit: 64 });
}

#[test]
fn test_depth_limit_allows_bounded_recursion() {
    let mut module = Module::new();
    let sum = GlobalVar::new("sum");
    let x = Var::new("x", i32_ty());
    let body = Expr::if_(
        op::less(Expr::var(&x), Expr::i32(0)),
        Expr::i32(0),
        op::add(Expr::var(&x), sum.call(vec![op::subtract(Expr::var(&x), Expr::i32(1))])),
    );
    module.define(&sum, Function::with_ret_type(vec![x], body, i32_ty())).unwrap();

    let compiled = compile_module(&module, &KernelRegistry::default(), &CompileOptions::default())
        .unwrap()
        .with_options(EvalOptions::new().max_call_depth(20));
    assert_eq!(compiled.invoke("sum", &[i32v(10)]).unwrap(), i32v(55));
    assert!(matches!(
        compiled.invoke("sum", &[i32v(30)]),
        Err(InterpError::DepthExceeded { limit: 20 })
    ));
}

fn sum_module() -> Module {
    let mut module = Module::new();
    let sum = GlobalVar::new("sum");
    let x = Var::new("x", i32_ty());
    let body = Expr::if_(
        op::less(Expr::var(&x), Expr::i32(0)),
        Expr::i32(0),
        op::add(Expr::var(&x), sum.call(vec![op::subtract(Expr::var(&x), Expr::i32(1))])),
    );
    module.define(&sum, Function::with_ret_type(vec![x], body, i32_ty())).unwrap();
    module
}

#[test]
fn test_default_options_allow_deep_recursion() {
    let compiled = compile_module(&sum_module(), &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert_eq!(*compiled.options(), EvalOptions::default());
    assert_eq!(compiled.invoke("sum", &[i32v(450)]).unwrap(), i32v(101475));
}

#[test]
fn test_default_limit_reports_depth_error() {
    let compiled = compile_module(&sum_module(), &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert_eq!(
        compiled.invoke("sum", &[i32v(1000)]).unwrap_err(),
        InterpError::DepthExceeded { limit: 500 }
    );

    let mut module = Module::new();
    let spin = GlobalVar::new("spin");
    let x = Var::new("x", f32_ty());
    module
        .define(
            &spin,
            Function::with_ret_type(vec![x.clone()], spin.call(vec![Expr::var(&x)]), f32_ty()),
        )
        .unwrap();
    let compiled = compile_module(&module, &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert_eq!(
        compiled.invoke("spin", &[f32v(0.0)]).unwrap_err(),
        InterpError::DepthExceeded { limit: 500 }
    );
}

#[test]
fn test_raised_limit_grows_the_stack() {
    let compiled = compile_module(&sum_module(), &KernelRegistry::default(), &CompileOptions::default())
        .unwrap()
        .with_options(EvalOptions::new().max_call_depth(2000));
    assert_eq!(compiled.invoke("sum", &[i32v(1500)]).unwrap(), i32v(1125750));
}

// ── Test 4: structured arguments ──────────────────────────────────────────

fn head_module() -> Module {
    let mut module = Module::new();
    module
        .add_type_data(TypeData::new(
            "List",
            vec![
                ConstructorDef::new("Nil", vec![]),
                ConstructorDef::new("Cons", vec![i32_ty(), Type::adt("List")]),
            ],
        ))
        .unwrap();

    let head = GlobalVar::new("head");
    let l = Var::new("l", Type::adt("List"));
    let h = Var::new("h", i32_ty());
    let body = Expr::match_(
        Expr::var(&l),
        vec![
            Clause::new(Pattern::constructor("Nil", vec![]), Expr::i32(0)),
            Clause::new(
                Pattern::constructor("Cons", vec![Pattern::Var(h.clone()), Pattern::Wildcard]),
                Expr::var(&h),
            ),
        ],
        i32_ty(),
    );
    module.define(&head, Function::with_ret_type(vec![l], body, i32_ty())).unwrap();
    module
}

fn nil() -> Value {
    Value::Adt { tag: 0, fields: vec![] }
}

fn cons(h: Value, t: Value) -> Value {
    Value::Adt { tag: 1, fields: vec![h, t] }
}

#[test]
fn test_adt_argument_accepted() {
    let compiled = compile_module(&head_module(), &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    let list = cons(i32v(4), cons(i32v(5), nil()));
    assert_eq!(compiled.invoke("head", &[list]).unwrap(), i32v(4));
    assert_eq!(compiled.invoke("head", &[nil()]).unwrap(), i32v(0));
}

#[test]
fn test_adt_argument_with_unknown_tag_rejected() {
    let compiled = compile_module(&head_module(), &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    let err = compiled
        .invoke("head", &[Value::Adt { tag: 7, fields: vec![] }])
        .unwrap_err();
    match err {
        InterpError::TypeMismatch { node, expected, .. } => {
            assert_eq!(node, "argument");
            assert!(expected.contains("List"), "expected: {}", expected);
        }
        other => panic!("expected TypeMismatch, got {}", other),
    }
}

#[test]
fn test_adt_argument_with_bad_fields_rejected() {
    let compiled = compile_module(&head_module(), &KernelRegistry::default(), &CompileOptions::default()).unwrap();

    let wrong_dtype = cons(f32v(1.5), nil());
    assert!(matches!(
        compiled.invoke("head", &[wrong_dtype]),
        Err(InterpError::TypeMismatch { node: "argument", .. })
    ));

    let short = Value::Adt { tag: 1, fields: vec![i32v(1)] };
    assert!(matches!(
        compiled.invoke("head", &[short]),
        Err(InterpError::TypeMismatch { node: "argument", .. })
    ));

    // The tail is checked too.
    let bad_tail = cons(i32v(1), cons(i32v(2), Value::Tuple(vec![])));
    assert!(matches!(
        compiled.invoke("head", &[bad_tail]),
        Err(InterpError::TypeMismatch { node: "argument", .. })
    ));
}

#[test]
fn test_closure_argument_checked_by_arity() {
    let k = Var::new("k", f32_ty());
    let x = Var::new("x", f32_ty());
    let inner = Function::new(vec![x.clone()], op::multiply(Expr::var(&x), Expr::var(&k)));
    let make_scale = Function::new(vec![k.clone()], Expr::function(inner));
    let scale = compile(&Module::new(), &make_scale, &KernelRegistry::default(), &CompileOptions::default())
        .unwrap()
        .call(&[f32v(2.0)])
        .unwrap();

    let unary = Var::new("f", Type::func(vec![f32_ty()], f32_ty()));
    let apply = Function::new(
        vec![unary.clone()],
        Expr::apply(Expr::var(&unary), vec![Expr::f32(3.0)]),
    );
    let compiled = compile(&Module::new(), &apply, &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert_eq!(compiled.call(&[scale.clone()]).unwrap(), f32v(6.0));

    let binary = Var::new("g", Type::func(vec![f32_ty(), f32_ty()], f32_ty()));
    let apply2 = Function::new(
        vec![binary.clone()],
        Expr::apply(Expr::var(&binary), vec![Expr::f32(3.0), Expr::f32(4.0)]),
    );
    let compiled = compile(&Module::new(), &apply2, &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert!(matches!(
        compiled.call(&[scale]),
        Err(InterpError::TypeMismatch { node: "argument", .. })
    ));
}

// ── Test 5: kernel failures ───────────────────────────────────────────────

#[test]
fn test_integer_division_by_zero() {
    let x = Var::new("x", i32_ty());
    let func = Function::new(vec![x.clone()], op::divide(Expr::i32(10), Expr::var(&x)));
    let compiled = compile(&Module::new(), &func, &KernelRegistry::default(), &CompileOptions::default()).unwrap();

    assert_eq!(compiled.call(&[i32v(3)]).unwrap(), i32v(3));
    match compiled.call(&[i32v(0)]).unwrap_err() {
        InterpError::Kernel { kernel, source } => {
            assert_eq!(kernel, "divide");
            assert!(matches!(source, KernelError::Invalid { .. }));
        }
        other => panic!("expected a kernel error, got {}", other),
    }
}

#[test]
fn test_kernel_output_checked_against_annotation() {
    let mut kernels = KernelRegistry::with_builtins();
    kernels.register(Kernel::new("truncate", KernelArity::Fixed(1), |_args| {
        Ok(Value::Tensor(Tensor::scalar_i32(0)))
    }));

    let x = Var::new("x", f32_ty());
    let func = Function::new(
        vec![x.clone()],
        Expr::call(Expr::op("truncate"), vec![Expr::var(&x)], f32_ty()),
    );
    let compiled = compile(&Module::new(), &func, &kernels, &CompileOptions::default()).unwrap();

    match compiled.call(&[f32v(1.5)]).unwrap_err() {
        InterpError::TypeMismatch { node, expected, .. } => {
            assert_eq!(node, "PackedCall");
            assert_eq!(expected, "tensor<float32, []>");
        }
        other => panic!("expected TypeMismatch, got {}", other),
    }

    // With the kernel check off, the entry's return check still catches it.
    let unchecked = compiled.with_options(EvalOptions::new().check_kernel_outputs(false));
    assert!(matches!(
        unchecked.call(&[f32v(1.5)]),
        Err(InterpError::TypeMismatch { node: "return value", .. })
    ));
}

#[test]
fn test_kernel_dtype_mismatch_at_runtime() {
    let mut kernels = KernelRegistry::with_builtins();
    kernels.register(Kernel::new("as_int", KernelArity::Fixed(1), |_args| {
        Ok(Value::Tensor(Tensor::scalar_i32(1)))
    }));

    // The annotation lies about the kernel's output; `add` then sees mixed dtypes.
    let x = Var::new("x", f32_ty());
    let func = Function::new(
        vec![x.clone()],
        op::add(Expr::var(&x), Expr::call(Expr::op("as_int"), vec![Expr::var(&x)], f32_ty())),
    );
    let compiled = compile(&Module::new(), &func, &kernels, &CompileOptions::default())
        .unwrap()
        .with_options(EvalOptions::new().check_kernel_outputs(false));

    match compiled.call(&[f32v(1.0)]).unwrap_err() {
        InterpError::Kernel { kernel, source } => {
            assert_eq!(kernel, "add");
            assert!(matches!(source, KernelError::DType { .. }));
        }
        other => panic!("expected a kernel error, got {}", other),
    }
}

// ── Test 6: diagnostics ───────────────────────────────────────────────────

#[test]
fn test_runtime_error_codes_and_messages() {
    let err: Error = InterpError::DepthExceeded { limit: 8 }.into();
    assert_eq!(err.diagnostic_code(), "E0406");
    let msg = err.to_string();
    assert!(msg.starts_with("[runtime error]"), "got: {}", msg);
    assert!(msg.contains("max_call_depth"), "got: {}", msg);

    let err: Error = InterpError::UnknownFunction { name: "f".to_owned() }.into();
    assert_eq!(err.diagnostic_code(), "E0400");

    let err: Error = InterpError::Executor {
        detail: "out of memory".to_owned(),
    }
    .into();
    assert_eq!(err.diagnostic_code(), "E0407");

    let err: Error = InterpError::Kernel {
        kernel: "divide".to_owned(),
        source: KernelError::Invalid {
            detail: "integer division by zero".to_owned(),
        },
    }
    .into();
    assert_eq!(err.diagnostic_code(), "E0405");
    assert!(err.to_string().contains("integer division by zero"));
}
