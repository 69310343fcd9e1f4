//! The low-level AST: the closed node set the lowering compiler emits into.
//!
//! Nodes are plain data. Each kind with an invariant is built through a
//! checked constructor that fails with an `AstError` instead of producing a
//! malformed node, so a code generator can trust every field (types, arities,
//! tags) without going back to the source IR.

use std::collections::HashSet;
use std::fmt;

use crate::error::AstError;
use crate::ir::program::FunctionId;
use crate::ir::tensor::Tensor;
use crate::ir::types::Type;

/// A generated binding name. Unique within the lowered function that introduces it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A back-reference into the global function table. Never owns the function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalRef {
    pub id: FunctionId,
    pub name: String,
}

/// A typed name: a function parameter or a captured value.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
}

impl Param {
    pub fn new(name: Ident, ty: Type) -> Self {
        Self { name, ty }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Reference to a parameter, capture, or earlier binding.
    Var(Ident),
    /// Inline constant.
    Literal(Tensor),
    /// A global function used as a first-class value.
    Global(GlobalRef),
    Decl(Decl),
    PackedCall(PackedCall),
    Invoke(Invoke),
    /// A local function; evaluates to a closure over its `captures`.
    Function(CppFunction),
    If(CppIf),
    Tuple(CppTuple),
    Match(CppMatch),
    Constructor(CppConstructor),
}

impl Node {
    /// Short node-kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Var(_) => "Var",
            Node::Literal(_) => "Literal",
            Node::Global(_) => "Global",
            Node::Decl(_) => "Decl",
            Node::PackedCall(_) => "PackedCall",
            Node::Invoke(_) => "Invoke",
            Node::Function(_) => "CPPFunction",
            Node::If(_) => "CPPIf",
            Node::Tuple(_) => "CPPTuple",
            Node::Match(_) => "CPPMatch",
            Node::Constructor(_) => "CPPConstructor",
        }
    }
}

// ---------------------------------------------------------------------------
// Decl
// ---------------------------------------------------------------------------

/// Sequential bindings followed by a body. Binding order is evaluation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    bindings: Vec<(Ident, Node)>,
    body: Box<Node>,
}

impl Decl {
    pub fn new(bindings: Vec<(Ident, Node)>, body: Node) -> Result<Self, AstError> {
        if bindings.is_empty() {
            return Err(AstError::EmptyDecl);
        }
        let mut seen = HashSet::new();
        for (name, _) in &bindings {
            if !seen.insert(name) {
                return Err(AstError::DuplicateBinding {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self {
            bindings,
            body: Box::new(body),
        })
    }

    /// Wraps `body` in a `Decl` when there is anything to bind, otherwise returns it unchanged.
    pub fn wrap(bindings: Vec<(Ident, Node)>, body: Node) -> Result<Node, AstError> {
        if bindings.is_empty() {
            Ok(body)
        } else {
            Ok(Node::Decl(Decl::new(bindings, body)?))
        }
    }

    pub fn bindings(&self) -> &[(Ident, Node)] {
        &self.bindings
    }

    pub fn body(&self) -> &Node {
        &self.body
    }
}

// ---------------------------------------------------------------------------
// PackedCall
// ---------------------------------------------------------------------------

/// Invocation of a precompiled kernel.
///
/// With `args_is_tuple` set, `args` holds exactly one tuple-valued node whose
/// field count is `arity`; otherwise `args.len() == arity`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedCall {
    name: String,
    arity: usize,
    args: Vec<Node>,
    output_type: Type,
    args_is_tuple: bool,
}

impl PackedCall {
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        args: Vec<Node>,
        output_type: Type,
        args_is_tuple: bool,
    ) -> Result<Self, AstError> {
        if !output_type.is_resolved() {
            return Err(AstError::UnresolvedType {
                node: "PackedCall",
                ty: output_type.to_string(),
            });
        }
        if args_is_tuple {
            if args.len() != 1 {
                return Err(AstError::ArityMismatch {
                    node: "PackedCall",
                    expected: 1,
                    found: args.len(),
                });
            }
            // A literal tuple node can be checked here; other tuple-valued
            // nodes are checked by the lowerer against their type.
            if let Node::Tuple(t) = &args[0] {
                if t.fields().len() != arity {
                    return Err(AstError::ArityMismatch {
                        node: "PackedCall",
                        expected: arity,
                        found: t.fields().len(),
                    });
                }
            }
        } else if args.len() != arity {
            return Err(AstError::ArityMismatch {
                node: "PackedCall",
                expected: arity,
                found: args.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            arity,
            args,
            output_type,
            args_is_tuple,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn args(&self) -> &[Node] {
        &self.args
    }

    pub fn output_type(&self) -> &Type {
        &self.output_type
    }

    pub fn args_is_tuple(&self) -> bool {
        self.args_is_tuple
    }
}

// ---------------------------------------------------------------------------
// Invoke
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    /// A function in the global table, by handle.
    Global(GlobalRef),
    /// Any node evaluating to a function value.
    Value(Box<Node>),
}

/// A call to another lowered function.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    callee: Callee,
    args: Vec<Node>,
}

impl Invoke {
    pub fn new(callee: Callee, args: Vec<Node>) -> Self {
        Self { callee, args }
    }

    pub fn callee(&self) -> &Callee {
        &self.callee
    }

    pub fn args(&self) -> &[Node] {
        &self.args
    }
}

// ---------------------------------------------------------------------------
// CppFunction
// ---------------------------------------------------------------------------

/// A lowered function definition.
///
/// `captures` are the free variables of the body that come from an enclosing
/// scope. They are read once, when the function value is created, and are
/// distinct from the formal `params`. A named local function may refer to
/// itself through `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct CppFunction {
    name: Option<Ident>,
    params: Vec<Param>,
    captures: Vec<Param>,
    body: Box<Node>,
    ret_type: Type,
}

impl CppFunction {
    pub fn new(
        name: Option<Ident>,
        params: Vec<Param>,
        captures: Vec<Param>,
        body: Node,
        ret_type: Type,
    ) -> Result<Self, AstError> {
        let display_name = name
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "<anonymous>".to_owned());
        let mut seen: HashSet<&Ident> = HashSet::new();
        if let Some(n) = &name {
            seen.insert(n);
        }
        for p in params.iter().chain(captures.iter()) {
            if !seen.insert(&p.name) {
                return Err(AstError::DuplicateParam {
                    func: display_name,
                    name: p.name.to_string(),
                });
            }
            if !p.ty.is_resolved() {
                return Err(AstError::UnresolvedType {
                    node: "CPPFunction",
                    ty: p.ty.to_string(),
                });
            }
        }
        if !ret_type.is_resolved() {
            return Err(AstError::UnresolvedType {
                node: "CPPFunction",
                ty: ret_type.to_string(),
            });
        }
        Ok(Self {
            name,
            params,
            captures,
            body: Box::new(body),
            ret_type,
        })
    }

    pub fn name(&self) -> Option<&Ident> {
        self.name.as_ref()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn captures(&self) -> &[Param] {
        &self.captures
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    pub fn ret_type(&self) -> &Type {
        &self.ret_type
    }

    pub fn fn_type(&self) -> Type {
        Type::func(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret_type.clone(),
        )
    }
}

// ---------------------------------------------------------------------------
// CppIf / CppTuple
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CppIf {
    cond: Box<Node>,
    true_branch: Box<Node>,
    false_branch: Box<Node>,
    ty: Type,
}

impl CppIf {
    pub fn new(cond: Node, true_branch: Node, false_branch: Node, ty: Type) -> Result<Self, AstError> {
        require_resolved("CPPIf", &ty)?;
        Ok(Self {
            cond: Box::new(cond),
            true_branch: Box::new(true_branch),
            false_branch: Box::new(false_branch),
            ty,
        })
    }

    pub fn cond(&self) -> &Node {
        &self.cond
    }

    pub fn true_branch(&self) -> &Node {
        &self.true_branch
    }

    pub fn false_branch(&self) -> &Node {
        &self.false_branch
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CppTuple {
    fields: Vec<Node>,
    ty: Type,
}

impl CppTuple {
    pub fn new(fields: Vec<Node>, ty: Type) -> Result<Self, AstError> {
        require_resolved("CPPTuple", &ty)?;
        let declared = ty.tuple_fields().ok_or_else(|| AstError::TypeMismatch {
            node: "CPPTuple",
            expected: "a tuple type",
            found: ty.to_string(),
        })?;
        if declared.len() != fields.len() {
            return Err(AstError::ArityMismatch {
                node: "CPPTuple",
                expected: declared.len(),
                found: fields.len(),
            });
        }
        Ok(Self { fields, ty })
    }

    pub fn fields(&self) -> &[Node] {
        &self.fields
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

// ---------------------------------------------------------------------------
// CppMatch
// ---------------------------------------------------------------------------

/// A low-level pattern. Constructor patterns carry the resolved tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard,
    Bind(Ident),
    Constructor {
        tag: usize,
        name: String,
        fields: Vec<Pattern>,
    },
    Tuple(Vec<Pattern>),
}

impl Pattern {
    /// Names this pattern binds, left to right.
    pub fn bound_names(&self) -> Vec<&Ident> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pattern::Wildcard => {}
            Pattern::Bind(name) => out.push(name),
            Pattern::Constructor { fields, .. } | Pattern::Tuple(fields) => {
                for f in fields {
                    f.collect_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub pattern: Pattern,
    pub body: Node,
}

/// First-match-wins dispatch over a tagged value.
#[derive(Debug, Clone, PartialEq)]
pub struct CppMatch {
    data: Box<Node>,
    clauses: Vec<MatchClause>,
    ty: Type,
}

impl CppMatch {
    pub fn new(data: Node, clauses: Vec<MatchClause>, ty: Type) -> Result<Self, AstError> {
        require_resolved("CPPMatch", &ty)?;
        Ok(Self {
            data: Box::new(data),
            clauses,
            ty,
        })
    }

    pub fn data(&self) -> &Node {
        &self.data
    }

    pub fn clauses(&self) -> &[MatchClause] {
        &self.clauses
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

// ---------------------------------------------------------------------------
// CppConstructor
// ---------------------------------------------------------------------------

/// Builds a tagged value. `tag` indexes the variant list of the ADT.
#[derive(Debug, Clone, PartialEq)]
pub struct CppConstructor {
    tag: usize,
    name: String,
    fields: Vec<Node>,
    ty: Type,
}

impl CppConstructor {
    pub fn new(
        tag: usize,
        name: impl Into<String>,
        arity: usize,
        fields: Vec<Node>,
        ty: Type,
    ) -> Result<Self, AstError> {
        require_resolved("CPPConstructor", &ty)?;
        if fields.len() != arity {
            return Err(AstError::ArityMismatch {
                node: "CPPConstructor",
                expected: arity,
                found: fields.len(),
            });
        }
        Ok(Self {
            tag,
            name: name.into(),
            fields,
            ty,
        })
    }

    pub fn tag(&self) -> usize {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Node] {
        &self.fields
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

fn require_resolved(node: &'static str, ty: &Type) -> Result<(), AstError> {
    if ty.is_resolved() {
        Ok(())
    } else {
        Err(AstError::UnresolvedType {
            node,
            ty: ty.to_string(),
        })
    }
}
