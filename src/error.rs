use thiserror::Error;

/// Top-level error type for the aotc pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", format_error_pretty("compile error", &format!("{}", _0)))]
    Lower(#[from] LowerError),

    #[error("{}", format_error_pretty("invalid node", &format!("{}", _0)))]
    Ast(#[from] AstError),

    #[error("{}", format_error_pretty("codegen error", &format!("{}", _0)))]
    Codegen(#[from] CodegenError),

    #[error("{}", format_error_pretty("runtime error", &format!("{}", _0)))]
    Interp(#[from] InterpError),
}

fn format_error_pretty(category: &str, msg: &str) -> String {
    format!("[{}] {}", category, msg)
}

// ---------------------------------------------------------------------------
// Node construction errors
// ---------------------------------------------------------------------------

/// A low-level AST node was built in violation of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstError {
    #[error("{node}: expected {expected} argument(s), found {found}")]
    ArityMismatch {
        node: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{node}: type annotation '{ty}' is not fully resolved")]
    UnresolvedType { node: &'static str, ty: String },

    #[error("{node}: expected {expected}, found '{found}'")]
    TypeMismatch {
        node: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("Decl must bind at least one name")]
    EmptyDecl,

    #[error("Decl binds '{name}' more than once")]
    DuplicateBinding { name: String },

    #[error("function '{func}' declares parameter '{name}' more than once")]
    DuplicateParam { func: String, name: String },
}

// ---------------------------------------------------------------------------
// Lowering errors
// ---------------------------------------------------------------------------

/// Lowering failed. Each variant names the function being compiled; the whole
/// compilation unit is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerError {
    #[error("in function '{func}': variable '{name}' is not bound in the lowering environment (upstream scoping bug)")]
    UnboundVariable { func: String, name: String },

    #[error("in function '{func}': global function '{name}' is referenced but never defined in the module")]
    UndefinedGlobal { func: String, name: String },

    #[error("in function '{func}': no kernel named '{name}' is registered")]
    UnknownKernel { func: String, name: String },

    #[error("in function '{func}': unknown constructor '{name}'")]
    UnknownConstructor { func: String, name: String },

    #[error("in function '{func}': {callee} expects {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        func: String,
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("in function '{func}': {construct} — {detail}")]
    TypeMismatch {
        func: String,
        construct: &'static str,
        detail: String,
    },

    #[error("in function '{func}': non-exhaustive match on '{ty}', pattern {missing} is not covered")]
    NonExhaustiveMatch {
        func: String,
        ty: String,
        missing: String,
    },

    #[error("in function '{func}': {construct} has no resolved type annotation")]
    UnresolvedType { func: String, construct: &'static str },

    #[error("in function '{func}': {source}")]
    InvalidNode {
        func: String,
        #[source]
        source: AstError,
    },

    #[error("duplicate function definition: '{name}'")]
    DuplicateFunction { name: String },
}

// ---------------------------------------------------------------------------
// Interpreter errors
// ---------------------------------------------------------------------------

/// Evaluation of a compiled function failed. The current invocation is aborted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpError {
    #[error("no compiled function named '{name}'")]
    UnknownFunction { name: String },

    #[error("{callee} expects {expected} argument(s) but was called with {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("type mismatch in {node} — expected {expected}, got {found}")]
    TypeMismatch {
        node: &'static str,
        expected: String,
        found: String,
    },

    #[error("no match clause accepts the value {value}")]
    NonExhaustiveMatch { value: String },

    #[error("internal error: binding '{name}' is not initialized — this is a compiler bug, please report it")]
    UnboundVariable { name: String },

    #[error("kernel '{kernel}' failed — {source}")]
    Kernel {
        kernel: String,
        #[source]
        source: KernelError,
    },

    #[error("call depth exceeded {limit} — raise EvalOptions::max_call_depth for deeper recursion")]
    DepthExceeded { limit: usize },

    #[error("could not start the evaluation thread — {detail}")]
    Executor { detail: String },
}

/// Returned by kernel callables when their inputs are unacceptable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("expected {expected} input(s), got {found}")]
    Arity { expected: usize, found: usize },

    #[error("input {index} is not a tensor")]
    NotATensor { index: usize },

    #[error("dtype mismatch — {detail}")]
    DType { detail: String },

    #[error("shapes {lhs} and {rhs} cannot be broadcast together")]
    Broadcast { lhs: String, rhs: String },

    #[error("{detail}")]
    Invalid { detail: String },
}

// ---------------------------------------------------------------------------
// Codegen errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("formatting failed while printing the lowered program")]
    Format(#[from] std::fmt::Error),
}

impl Error {
    /// Returns a stable diagnostic code for this error.
    pub fn diagnostic_code(&self) -> &'static str {
        match self {
            Error::Lower(l) => match l {
                LowerError::UnboundVariable { .. } => "E0100",
                LowerError::UndefinedGlobal { .. } => "E0101",
                LowerError::UnknownKernel { .. } => "E0102",
                LowerError::UnknownConstructor { .. } => "E0103",
                LowerError::ArityMismatch { .. } => "E0104",
                LowerError::TypeMismatch { .. } => "E0105",
                LowerError::NonExhaustiveMatch { .. } => "E0106",
                LowerError::UnresolvedType { .. } => "E0107",
                LowerError::InvalidNode { .. } => "E0108",
                LowerError::DuplicateFunction { .. } => "E0109",
            },
            Error::Ast(a) => match a {
                AstError::ArityMismatch { .. } => "E0200",
                AstError::UnresolvedType { .. } => "E0201",
                AstError::TypeMismatch { .. } => "E0202",
                AstError::EmptyDecl => "E0203",
                AstError::DuplicateBinding { .. } => "E0204",
                AstError::DuplicateParam { .. } => "E0205",
            },
            Error::Codegen(_) => "E0300",
            Error::Interp(i) => match i {
                InterpError::UnknownFunction { .. } => "E0400",
                InterpError::ArityMismatch { .. } => "E0401",
                InterpError::TypeMismatch { .. } => "E0402",
                InterpError::NonExhaustiveMatch { .. } => "E0403",
                InterpError::UnboundVariable { .. } => "E0404",
                InterpError::Kernel { .. } => "E0405",
                InterpError::DepthExceeded { .. } => "E0406",
                InterpError::Executor { .. } => "E0407",
            },
        }
    }
}
