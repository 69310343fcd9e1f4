//! Registry of precompiled kernels.
//!
//! A kernel is opaque to the compiler: it is known by name and arity only,
//! and called with already-evaluated argument values. Kernels must be pure
//! functions of their inputs; the executor calls them without locking.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::KernelError;
use crate::interp::value::Value;

pub type KernelFn = dyn Fn(&[Value]) -> Result<Value, KernelError> + Send + Sync;

/// How a kernel receives its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArity {
    /// Exactly `n` individual arguments.
    Fixed(usize),
    /// One tuple argument; the call site's tuple width is the arity.
    Packed,
}

#[derive(Clone)]
pub struct Kernel {
    name: String,
    arity: KernelArity,
    func: Arc<KernelFn>,
}

impl Kernel {
    pub fn new(
        name: impl Into<String>,
        arity: KernelArity,
        func: impl Fn(&[Value]) -> Result<Value, KernelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> KernelArity {
        self.arity
    }

    /// Runs the kernel. For packed kernels `args` are the unpacked tuple fields.
    pub fn call(&self, args: &[Value]) -> Result<Value, KernelError> {
        if let KernelArity::Fixed(n) = self.arity {
            if args.len() != n {
                return Err(KernelError::Arity {
                    expected: n,
                    found: args.len(),
                });
            }
        }
        (self.func)(args)
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Name → kernel lookup shared by the lowerer (arity) and the executor (code).
#[derive(Debug, Clone)]
pub struct KernelRegistry {
    kernels: HashMap<String, Kernel>,
}

impl KernelRegistry {
    /// A registry with no kernels at all.
    pub fn empty() -> Self {
        Self {
            kernels: HashMap::new(),
        }
    }

    /// A registry preloaded with the element-wise built-ins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        builtin::register_all(&mut registry);
        registry
    }

    /// Adds or replaces a kernel, returning the one it displaced.
    pub fn register(&mut self, kernel: Kernel) -> Option<Kernel> {
        self.kernels.insert(kernel.name.clone(), kernel)
    }

    pub fn get(&self, name: &str) -> Option<&Kernel> {
        self.kernels.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kernels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
