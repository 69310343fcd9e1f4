use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ir::tensor::Tensor;
use crate::ir::types::{DType, Type};

static NEXT_VAR_ID: AtomicU32 = AtomicU32::new(0);

/// Identity of a source variable. Two `Var`s with the same name hint are
/// still different variables unless their ids agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u32);

/// A typed source variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    id: VarId,
    name: String,
    ty: Type,
}

impl Var {
    /// Creates a variable with a fresh identity.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            id: VarId(NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            ty,
        }
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    /// The name hint. Not unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

/// Name of a function in a source `Module`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVar(String);

impl GlobalVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Application of this global to `args`; the result type comes from the module.
    pub fn call(&self, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::Global(self.clone()), args, Type::Infer)
    }
}

impl fmt::Display for GlobalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A function literal. `ret_type` may be `Type::Infer` when the body's type
/// is enough to determine it.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<Var>,
    pub body: Box<Expr>,
    pub ret_type: Type,
}

impl Function {
    pub fn new(params: Vec<Var>, body: Expr) -> Self {
        Self {
            params,
            body: Box::new(body),
            ret_type: Type::Infer,
        }
    }

    pub fn with_ret_type(params: Vec<Var>, body: Expr, ret_type: Type) -> Self {
        Self {
            params,
            body: Box::new(body),
            ret_type,
        }
    }

    /// Declared return type, falling back to the body's annotation.
    pub fn result_type(&self) -> Type {
        if self.ret_type.is_resolved() {
            self.ret_type.clone()
        } else {
            self.body.ty()
        }
    }

    pub fn fn_type(&self) -> Type {
        Type::func(
            self.params.iter().map(|p| p.ty().clone()).collect(),
            self.result_type(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard,
    Var(Var),
    Constructor { name: String, fields: Vec<Pattern> },
    Tuple(Vec<Pattern>),
}

impl Pattern {
    pub fn constructor(name: impl Into<String>, fields: Vec<Pattern>) -> Self {
        Pattern::Constructor {
            name: name.into(),
            fields,
        }
    }

    /// Variables bound by this pattern, left to right.
    pub fn bound_vars(&self) -> Vec<&Var> {
        fn go<'a>(p: &'a Pattern, out: &mut Vec<&'a Var>) {
            match p {
                Pattern::Wildcard => {}
                Pattern::Var(v) => out.push(v),
                Pattern::Constructor { fields, .. } | Pattern::Tuple(fields) => {
                    for f in fields {
                        go(f, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        go(self, &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub pattern: Pattern,
    pub body: Expr,
}

impl Clause {
    pub fn new(pattern: Pattern, body: Expr) -> Self {
        Self { pattern, body }
    }
}

/// A type-annotated source expression.
///
/// Nodes that produce values the checker must type carry their result type
/// (`ty`); `Type::Infer` means the annotation is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(Var),
    Constant(Tensor),
    Let {
        var: Var,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    Function(Function),
    Global(GlobalVar),
    /// A kernel, by registry name. Only meaningful as a callee.
    Op(String),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        ty: Type,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        ty: Type,
    },
    Tuple {
        fields: Vec<Expr>,
        ty: Type,
    },
    Match {
        data: Box<Expr>,
        clauses: Vec<Clause>,
        ty: Type,
    },
    Construct {
        constructor: String,
        fields: Vec<Expr>,
        ty: Type,
    },
}

impl Expr {
    /// The node's annotated type as far as it can be read off the node itself.
    /// Calls to globals report `Infer`; the lowerer resolves them against the module.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Var(v) => v.ty().clone(),
            Expr::Constant(t) => t.ty(),
            Expr::Let { body, .. } => body.ty(),
            Expr::Function(f) => f.fn_type(),
            Expr::Global(_) | Expr::Op(_) => Type::Infer,
            Expr::Call { ty, .. }
            | Expr::If { ty, .. }
            | Expr::Tuple { ty, .. }
            | Expr::Match { ty, .. }
            | Expr::Construct { ty, .. } => ty.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Var(_) => "variable",
            Expr::Constant(_) => "constant",
            Expr::Let { .. } => "let",
            Expr::Function(_) => "function",
            Expr::Global(_) => "global reference",
            Expr::Op(_) => "operator",
            Expr::Call { .. } => "call",
            Expr::If { .. } => "if",
            Expr::Tuple { .. } => "tuple",
            Expr::Match { .. } => "match",
            Expr::Construct { .. } => "constructor application",
        }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    pub fn var(v: &Var) -> Self {
        Expr::Var(v.clone())
    }

    pub fn constant(t: Tensor) -> Self {
        Expr::Constant(t)
    }

    /// A `float32` scalar literal.
    pub fn f32(x: f32) -> Self {
        Expr::Constant(Tensor::scalar_f32(x))
    }

    /// An `int32` scalar literal.
    pub fn i32(x: i32) -> Self {
        Expr::Constant(Tensor::scalar_i32(x))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Constant(Tensor::scalar_bool(b))
    }

    pub fn let_(var: &Var, value: Expr, body: Expr) -> Self {
        Expr::Let {
            var: var.clone(),
            value: Box::new(value),
            body: Box::new(body),
        }
    }

    pub fn function(f: Function) -> Self {
        Expr::Function(f)
    }

    pub fn global(gv: &GlobalVar) -> Self {
        Expr::Global(gv.clone())
    }

    pub fn op(name: impl Into<String>) -> Self {
        Expr::Op(name.into())
    }

    pub fn call(callee: Expr, args: Vec<Expr>, ty: Type) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
            ty,
        }
    }

    /// Calls a function-valued expression, taking the result type from its function type.
    pub fn apply(callee: Expr, args: Vec<Expr>) -> Self {
        let ty = match callee.ty() {
            Type::Func { ret, .. } => *ret,
            _ => Type::Infer,
        };
        Expr::call(callee, args, ty)
    }

    /// Conditional typed after whichever branch has a resolved type.
    pub fn if_(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        let ty = match then_branch.ty() {
            t if t.is_resolved() => t,
            _ => else_branch.ty(),
        };
        Expr::if_typed(cond, then_branch, else_branch, ty)
    }

    pub fn if_typed(cond: Expr, then_branch: Expr, else_branch: Expr, ty: Type) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            ty,
        }
    }

    pub fn tuple(fields: Vec<Expr>) -> Self {
        let ty = Type::Tuple(fields.iter().map(Expr::ty).collect());
        Expr::Tuple { fields, ty }
    }

    pub fn match_(data: Expr, clauses: Vec<Clause>, ty: Type) -> Self {
        Expr::Match {
            data: Box::new(data),
            clauses,
            ty,
        }
    }

    /// Applies constructor `name` of the ADT `adt`.
    pub fn construct(name: impl Into<String>, fields: Vec<Expr>, adt: impl Into<String>) -> Self {
        Expr::Construct {
            constructor: name.into(),
            fields,
            ty: Type::Adt(adt.into()),
        }
    }
}

/// Scalar type helper for builders: `scalar(DType::F32)`.
pub fn scalar(dtype: DType) -> Type {
    Type::scalar(dtype)
}
