//! Knobs for compilation and evaluation.

/// Options for `compile` / `compile_module`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Global name the entry function is registered under by `compile`.
    pub entry_name: String,
    /// Reject `match` expressions whose clauses do not cover every value.
    /// When off, an uncovered value fails at run time instead.
    pub check_exhaustiveness: bool,
    /// Log the printed lowered program at `debug` level after compilation.
    pub dump_lowered: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry_name: "main".to_owned(),
            check_exhaustiveness: true,
            dump_lowered: false,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    pub fn check_exhaustiveness(mut self, on: bool) -> Self {
        self.check_exhaustiveness = on;
        self
    }

    pub fn dump_lowered(mut self, on: bool) -> Self {
        self.dump_lowered = on;
        self
    }
}

/// Minimum stack for the evaluation thread: 64 MB.
const DEFAULT_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Host stack reserved per nested invocation when sizing the evaluation thread.
const STACK_PER_CALL: usize = 128 * 1024;

/// Options for the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Maximum nesting of function invocations before aborting (default: 500).
    pub max_call_depth: usize,
    /// Verify every kernel result against the call site's declared output type.
    pub check_kernel_outputs: bool,
    /// Lower bound on the evaluation thread's stack, in bytes (default: 64 MB).
    /// The thread grows past it when `max_call_depth` needs more.
    pub stack_size: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 500,
            check_kernel_outputs: true,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn check_kernel_outputs(mut self, on: bool) -> Self {
        self.check_kernel_outputs = on;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Stack for the evaluation thread: enough for `max_call_depth` nested
    /// invocations, and never below `stack_size`.
    pub(crate) fn thread_stack_size(&self) -> usize {
        self.stack_size
            .max(self.max_call_depth.saturating_mul(STACK_PER_CALL))
    }
}
