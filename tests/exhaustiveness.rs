// exhaustiveness.rs — Static match coverage
//
// Covers:
//   - a missing top-level constructor is rejected with a witness
//   - nested and tuple patterns report the uncovered shape
//   - wildcards and binders make a match exhaustive
//   - with checking disabled, an uncovered value faults at run time

use aotc::error::{InterpError, LowerError};
use aotc::ir::tensor::Tensor;
use aotc::ir::types::{DType, Type};
use aotc::relay::{Clause, ConstructorDef, Expr, Function, Module, Pattern, TypeData, Var};
use aotc::{compile, CompileOptions, KernelRegistry, Value};

fn i32_ty() -> Type {
    Type::scalar(DType::I32)
}

fn i32v(x: i32) -> Value {
    Value::Tensor(Tensor::scalar_i32(x))
}

fn list_module() -> Module {
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
    module
}

fn nil() -> Pattern {
    Pattern::constructor("Nil", vec![])
}

fn cons(head: Pattern, tail: Pattern) -> Pattern {
    Pattern::constructor("Cons", vec![head, tail])
}

/// `fn(l: List) -> int32 { match l { clauses } }`, each clause returning its index.
fn matcher(patterns: Vec<Pattern>) -> Function {
    let l = Var::new("l", Type::adt("List"));
    let clauses = patterns
        .into_iter()
        .enumerate()
        .map(|(i, p)| Clause::new(p, Expr::i32(i as i32)))
        .collect();
    Function::new(vec![l.clone()], Expr::match_(Expr::var(&l), clauses, i32_ty()))
}

fn missing_of(result: Result<aotc::CompiledFunction, LowerError>) -> String {
    match result {
        Err(LowerError::NonExhaustiveMatch { missing, .. }) => missing,
        Err(other) => panic!("expected NonExhaustiveMatch, got {}", other),
        Ok(_) => panic!("expected NonExhaustiveMatch, but compilation succeeded"),
    }
}

// ── Test 1: missing constructor ───────────────────────────────────────────

#[test]
fn test_missing_nil_is_rejected() {
    let module = list_module();
    let func = matcher(vec![cons(Pattern::Wildcard, Pattern::Wildcard)]);
    let result = compile(&module, &func, &KernelRegistry::default(), &CompileOptions::default());

    match result {
        Err(LowerError::NonExhaustiveMatch { func, ty, missing }) => {
            assert_eq!(func, "main");
            assert_eq!(ty, "List");
            assert_eq!(missing, "Nil");
        }
        Err(other) => panic!("expected NonExhaustiveMatch, got {}", other),
        Ok(_) => panic!("a match without a Nil clause must be rejected"),
    }
}

#[test]
fn test_missing_cons_reports_fields() {
    let module = list_module();
    let result = compile(&module, &matcher(vec![nil()]), &KernelRegistry::default(), &CompileOptions::default());
    assert_eq!(missing_of(result), "Cons(_, _)");
}

// ── Test 2: nested and tuple witnesses ────────────────────────────────────

#[test]
fn test_nested_witness() {
    let module = list_module();
    let func = matcher(vec![nil(), cons(Pattern::Wildcard, nil())]);
    let result = compile(&module, &func, &KernelRegistry::default(), &CompileOptions::default());
    assert_eq!(missing_of(result), "Cons(_, Cons(_, _))");
}

#[test]
fn test_tuple_witness() {
    let module = list_module();
    let a = Var::new("a", Type::adt("List"));
    let b = Var::new("b", Type::adt("List"));
    let func = Function::new(
        vec![a.clone(), b.clone()],
        Expr::match_(
            Expr::tuple(vec![Expr::var(&a), Expr::var(&b)]),
            vec![
                Clause::new(Pattern::Tuple(vec![nil(), Pattern::Wildcard]), Expr::i32(0)),
                Clause::new(Pattern::Tuple(vec![Pattern::Wildcard, nil()]), Expr::i32(1)),
            ],
            i32_ty(),
        ),
    );
    let result = compile(&module, &func, &KernelRegistry::default(), &CompileOptions::default());
    assert_eq!(missing_of(result), "(Cons(_, _), Cons(_, _))");
}

// ── Test 3: exhaustive matches compile ────────────────────────────────────

#[test]
fn test_wildcard_and_binder_cover_everything() {
    let module = list_module();
    let kernels = KernelRegistry::default();
    let options = CompileOptions::default();

    assert!(compile(&module, &matcher(vec![Pattern::Wildcard]), &kernels, &options).is_ok());

    let rest = Var::new("rest", Type::adt("List"));
    let func = matcher(vec![cons(Pattern::Wildcard, nil()), Pattern::Var(rest)]);
    let compiled = compile(&module, &func, &kernels, &options).unwrap();

    let single = Value::Adt {
        tag: 1,
        fields: vec![i32v(3), Value::Adt { tag: 0, fields: vec![] }],
    };
    assert_eq!(compiled.call(&[single]).unwrap(), i32v(0));
    assert_eq!(compiled.call(&[Value::Adt { tag: 0, fields: vec![] }]).unwrap(), i32v(1));
}

#[test]
fn test_nested_patterns_fully_covered() {
    let module = list_module();
    let func = matcher(vec![
        nil(),
        cons(Pattern::Wildcard, nil()),
        cons(Pattern::Wildcard, cons(Pattern::Wildcard, Pattern::Wildcard)),
    ]);
    let compiled = compile(&module, &func, &KernelRegistry::default(), &CompileOptions::default()).unwrap();

    let nil_v = Value::Adt { tag: 0, fields: vec![] };
    let one = Value::Adt {
        tag: 1,
        fields: vec![i32v(1), nil_v.clone()],
    };
    let two = Value::Adt {
        tag: 1,
        fields: vec![i32v(2), one.clone()],
    };
    assert_eq!(compiled.call(&[nil_v]).unwrap(), i32v(0));
    assert_eq!(compiled.call(&[one]).unwrap(), i32v(1));
    assert_eq!(compiled.call(&[two]).unwrap(), i32v(2));
}

#[test]
fn test_tensor_scrutinee_with_binder() {
    let x = Var::new("x", i32_ty());
    let y = Var::new("y", i32_ty());
    let func = Function::new(
        vec![x.clone()],
        Expr::match_(Expr::var(&x), vec![Clause::new(Pattern::Var(y.clone()), Expr::var(&y))], i32_ty()),
    );
    let compiled = compile(&Module::new(), &func, &KernelRegistry::default(), &CompileOptions::default()).unwrap();
    assert_eq!(compiled.call(&[i32v(17)]).unwrap(), i32v(17));
}

// ── Test 4: runtime fault when unchecked ──────────────────────────────────

#[test]
fn test_unchecked_match_faults_at_runtime() {
    let module = list_module();
    let func = matcher(vec![cons(Pattern::Wildcard, Pattern::Wildcard)]);
    let options = CompileOptions::new().check_exhaustiveness(false);
    let compiled = compile(&module, &func, &KernelRegistry::default(), &options).unwrap();

    let cons_v = Value::Adt {
        tag: 1,
        fields: vec![i32v(1), Value::Adt { tag: 0, fields: vec![] }],
    };
    assert_eq!(compiled.call(&[cons_v]).unwrap(), i32v(0));

    let err = compiled.call(&[Value::Adt { tag: 0, fields: vec![] }]).unwrap_err();
    match err {
        InterpError::NonExhaustiveMatch { value } => assert_eq!(value, "adt variant(0)"),
        other => panic!("expected NonExhaustiveMatch, got {}", other),
    }
}
