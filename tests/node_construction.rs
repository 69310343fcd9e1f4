// node_construction.rs — Checked low-level AST constructors
//
// Nodes are only built through constructors that enforce their
// invariants. Covers PackedCall, Decl, CppFunction, CppTuple,
// CppConstructor, CppIf, CppMatch and the two-phase function table.

use aotc::error::AstError;
use aotc::ir::tensor::Tensor;
use aotc::ir::types::{DType, Type};
use aotc::ir::{
    CppConstructor, CppFunction, CppIf, CppMatch, CppTuple, Decl, FunctionId, FunctionTable, Ident, Node,
    PackedCall, Param, Signature,
};
use aotc::Error;

fn f32_ty() -> Type {
    Type::scalar(DType::F32)
}

fn var(name: &str) -> Node {
    Node::Var(Ident::new(name))
}

fn lit(x: f32) -> Node {
    Node::Literal(Tensor::scalar_f32(x))
}

fn identity(name: &str) -> CppFunction {
    CppFunction::new(
        None,
        vec![Param::new(Ident::new("x_0"), f32_ty())],
        vec![],
        var("x_0"),
        f32_ty(),
    )
    .unwrap_or_else(|e| panic!("building '{}': {}", name, e))
}

// ── Test 1: PackedCall ────────────────────────────────────────────────────

#[test]
fn test_packed_call_checks_arity() {
    let ok = PackedCall::new("add", 2, vec![var("a"), var("b")], f32_ty(), false).unwrap();
    assert_eq!(ok.arity(), 2);
    assert!(!ok.args_is_tuple());

    let err = PackedCall::new("add", 2, vec![var("a")], f32_ty(), false).unwrap_err();
    assert_eq!(
        err,
        AstError::ArityMismatch {
            node: "PackedCall",
            expected: 2,
            found: 1,
        }
    );
}

#[test]
fn test_packed_call_requires_resolved_output() {
    let err = PackedCall::new("add", 2, vec![var("a"), var("b")], Type::Infer, false).unwrap_err();
    assert!(matches!(err, AstError::UnresolvedType { node: "PackedCall", .. }));

    let partial = Type::Tuple(vec![f32_ty(), Type::Infer]);
    assert!(PackedCall::new("f", 1, vec![var("a")], partial, false).is_err());
}

#[test]
fn test_packed_call_tuple_argument() {
    let pair_ty = Type::Tuple(vec![f32_ty(), f32_ty()]);
    let pair = CppTuple::new(vec![lit(1.0), lit(2.0)], pair_ty.clone()).unwrap();

    let ok = PackedCall::new("add_n", 2, vec![Node::Tuple(pair.clone())], f32_ty(), true).unwrap();
    assert!(ok.args_is_tuple());
    assert_eq!(ok.args().len(), 1);

    let wrong_width = PackedCall::new("add_n", 3, vec![Node::Tuple(pair)], f32_ty(), true).unwrap_err();
    assert!(matches!(wrong_width, AstError::ArityMismatch { expected: 3, found: 2, .. }));

    let two_args = PackedCall::new("add_n", 2, vec![var("a"), var("b")], f32_ty(), true).unwrap_err();
    assert!(matches!(two_args, AstError::ArityMismatch { expected: 1, found: 2, .. }));

    // A tuple-valued variable is accepted; its width is checked by the lowerer.
    assert!(PackedCall::new("add_n", 4, vec![var("t")], f32_ty(), true).is_ok());
}

// ── Test 2: Decl ──────────────────────────────────────────────────────────

#[test]
fn test_decl_rejects_empty_and_duplicates() {
    assert_eq!(Decl::new(vec![], var("x")).unwrap_err(), AstError::EmptyDecl);

    let dup = Decl::new(
        vec![(Ident::new("a_1"), lit(1.0)), (Ident::new("a_1"), lit(2.0))],
        var("a_1"),
    )
    .unwrap_err();
    assert_eq!(dup, AstError::DuplicateBinding { name: "a_1".to_owned() });

    let ok = Decl::new(
        vec![(Ident::new("a_1"), lit(1.0)), (Ident::new("b_2"), var("a_1"))],
        var("b_2"),
    )
    .unwrap();
    let names: Vec<&str> = ok.bindings().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a_1", "b_2"]);
}

#[test]
fn test_decl_wrap_elides_empty_scope() {
    let bare = Decl::wrap(vec![], var("x")).unwrap();
    assert_eq!(bare, var("x"));

    let wrapped = Decl::wrap(vec![(Ident::new("y"), lit(0.5))], var("y")).unwrap();
    assert!(matches!(wrapped, Node::Decl(_)));
}

// ── Test 3: CppFunction ───────────────────────────────────────────────────

#[test]
fn test_function_rejects_duplicate_names() {
    let err = CppFunction::new(
        None,
        vec![
            Param::new(Ident::new("x"), f32_ty()),
            Param::new(Ident::new("x"), f32_ty()),
        ],
        vec![],
        var("x"),
        f32_ty(),
    )
    .unwrap_err();
    assert!(matches!(err, AstError::DuplicateParam { ref name, .. } if name == "x"));

    let capture_clash = CppFunction::new(
        Some(Ident::new("f")),
        vec![Param::new(Ident::new("x"), f32_ty())],
        vec![Param::new(Ident::new("x"), f32_ty())],
        var("x"),
        f32_ty(),
    )
    .unwrap_err();
    assert_eq!(
        capture_clash,
        AstError::DuplicateParam {
            func: "f".to_owned(),
            name: "x".to_owned(),
        }
    );

    let self_clash = CppFunction::new(
        Some(Ident::new("f")),
        vec![Param::new(Ident::new("f"), f32_ty())],
        vec![],
        var("f"),
        f32_ty(),
    );
    assert!(self_clash.is_err(), "a parameter may not shadow the function's own name");
}

#[test]
fn test_function_requires_resolved_types() {
    let err = CppFunction::new(
        None,
        vec![Param::new(Ident::new("x"), Type::Infer)],
        vec![],
        var("x"),
        f32_ty(),
    )
    .unwrap_err();
    assert!(matches!(err, AstError::UnresolvedType { node: "CPPFunction", .. }));

    assert!(CppFunction::new(None, vec![], vec![], lit(1.0), Type::Infer).is_err());
}

#[test]
fn test_function_type() {
    let f = identity("id");
    assert_eq!(f.fn_type(), Type::func(vec![f32_ty()], f32_ty()));
    assert!(f.name().is_none());
    assert!(f.captures().is_empty());
}

// ── Test 4: tuples, constructors, conditionals, matches ───────────────────

#[test]
fn test_tuple_checks_width_and_type() {
    let ty = Type::Tuple(vec![f32_ty(), f32_ty()]);
    assert!(CppTuple::new(vec![lit(1.0), lit(2.0)], ty.clone()).is_ok());
    assert!(matches!(
        CppTuple::new(vec![lit(1.0)], ty).unwrap_err(),
        AstError::ArityMismatch { expected: 2, found: 1, .. }
    ));
    assert!(matches!(
        CppTuple::new(vec![lit(1.0)], f32_ty()).unwrap_err(),
        AstError::TypeMismatch { .. }
    ));
}

#[test]
fn test_constructor_checks_arity_and_type() {
    let list = Type::adt("List");
    let nil = CppConstructor::new(0, "Nil", 0, vec![], list.clone()).unwrap();
    assert_eq!(nil.tag(), 0);
    assert_eq!(nil.name(), "Nil");

    let err = CppConstructor::new(1, "Cons", 2, vec![lit(1.0)], list).unwrap_err();
    assert!(matches!(err, AstError::ArityMismatch { node: "CPPConstructor", expected: 2, found: 1 }));

    assert!(CppConstructor::new(0, "Nil", 0, vec![], Type::Infer).is_err());
}

#[test]
fn test_if_and_match_require_resolved_type() {
    let cond = Node::Literal(Tensor::scalar_bool(true));
    assert!(CppIf::new(cond.clone(), lit(1.0), lit(2.0), f32_ty()).is_ok());
    assert!(matches!(
        CppIf::new(cond, lit(1.0), lit(2.0), Type::Infer).unwrap_err(),
        AstError::UnresolvedType { node: "CPPIf", .. }
    ));

    assert!(CppMatch::new(var("d"), vec![], f32_ty()).is_ok());
    assert!(CppMatch::new(var("d"), vec![], Type::Infer).is_err());
}

// ── Test 5: function table ────────────────────────────────────────────────

#[test]
fn test_function_table_two_phase() {
    let sig = Signature {
        params: vec![f32_ty()],
        ret: f32_ty(),
    };
    let mut table = FunctionTable::new();
    let id = table.reserve("f", sig.clone()).unwrap();
    assert_eq!(id, FunctionId(0));
    assert_eq!(table.lookup("f"), Some(id));
    assert_eq!(table.signature(id), Some(&sig));
    assert!(table.function(id).is_none(), "reserved but not yet defined");

    assert!(table.reserve("f", sig.clone()).is_err());

    let g = table.reserve("g", sig).unwrap();
    assert_eq!(g, FunctionId(1));

    table.define(id, identity("f")).unwrap();
    assert!(table.define(id, identity("f")).is_err(), "a body is installed once");

    // `g` is still only reserved.
    match table.freeze() {
        Ok(_) => panic!("freezing with an undefined entry must fail"),
        Err(name) => assert_eq!(name, "g"),
    }
}

#[test]
fn test_freeze_produces_program() {
    let sig = Signature {
        params: vec![f32_ty()],
        ret: f32_ty(),
    };
    let mut table = FunctionTable::new();
    let f = table.reserve("f", sig.clone()).unwrap();
    let g = table.reserve("g", sig).unwrap();
    table.define(g, identity("g")).unwrap();
    table.define(f, identity("f")).unwrap();

    let program = table.freeze().unwrap();
    assert_eq!(program.len(), 2);
    let names: Vec<&str> = program.functions().map(|(_, n, _)| n).collect();
    assert_eq!(names, vec!["f", "g"], "functions are listed in reservation order");
    assert_eq!(program.id_of("g"), Some(g));
    assert_eq!(program.name(f), Some("f"));
    assert!(program.function_by_name("h").is_none());
}

// ── Test 6: diagnostics ───────────────────────────────────────────────────

#[test]
fn test_node_error_codes() {
    let cases = vec![
        (
            AstError::ArityMismatch {
                node: "PackedCall",
                expected: 2,
                found: 1,
            },
            "E0200",
        ),
        (AstError::EmptyDecl, "E0203"),
        (AstError::DuplicateBinding { name: "a".into() }, "E0204"),
    ];
    for (ast, code) in cases {
        let err = Error::from(ast);
        assert_eq!(err.diagnostic_code(), code);
        assert!(err.to_string().starts_with("[invalid node]"));
    }
}
