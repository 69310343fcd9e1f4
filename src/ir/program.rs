use std::collections::HashMap;
use std::fmt;

use crate::ir::node::CppFunction;
use crate::ir::types::Type;

/// Uniquely identifies a function within a `FunctionTable` / `Program`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Parameter and return types of a global function, known before its body is lowered.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

#[derive(Debug)]
struct Entry {
    name: String,
    sig: Signature,
    func: Option<CppFunction>,
}

/// The global function table of one compilation unit.
///
/// Registration is two-phase: `reserve` hands out a stable `FunctionId` for a
/// name and signature, `define` installs the lowered body later. References
/// made while the body is still being lowered (self or mutual recursion)
/// resolve to the reserved id.
///
/// Invariants:
/// - Names are unique.
/// - `FunctionId(n)` always indexes `entries[n]`; entries are never removed.
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: Vec<Entry>,
    index: HashMap<String, FunctionId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a slot for `name`. Returns `Err` if the name is already taken.
    pub fn reserve(&mut self, name: impl Into<String>, sig: Signature) -> Result<FunctionId, String> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(format!("function '{}' already registered", name));
        }
        let id = FunctionId(self.entries.len() as u32);
        self.index.insert(name.clone(), id);
        self.entries.push(Entry { name, sig, func: None });
        Ok(id)
    }

    /// Installs the lowered body for a reserved slot. Each slot is defined once.
    pub fn define(&mut self, id: FunctionId, func: CppFunction) -> Result<(), String> {
        let entry = self
            .entries
            .get_mut(id.0 as usize)
            .ok_or_else(|| format!("no reserved function {}", id))?;
        if entry.func.is_some() {
            return Err(format!("function '{}' already defined", entry.name));
        }
        entry.func = Some(func);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<FunctionId> {
        self.index.get(name).copied()
    }

    pub fn signature(&self, id: FunctionId) -> Option<&Signature> {
        self.entries.get(id.0 as usize).map(|e| &e.sig)
    }

    pub fn name(&self, id: FunctionId) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    /// The lowered body, once defined.
    pub fn function(&self, id: FunctionId) -> Option<&CppFunction> {
        self.entries.get(id.0 as usize).and_then(|e| e.func.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seals the table. Fails with the name of the first reserved-but-undefined slot.
    pub fn freeze(self) -> Result<Program, String> {
        let mut functions = Vec::with_capacity(self.entries.len());
        let mut names = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let Some(func) = entry.func else {
                return Err(entry.name);
            };
            functions.push(func);
            names.push(entry.name);
        }
        Ok(Program {
            functions,
            names,
            index: self.index,
        })
    }
}

/// A frozen, read-only set of lowered global functions.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    functions: Vec<CppFunction>,
    names: Vec<String>,
    index: HashMap<String, FunctionId>,
}

impl Program {
    pub fn function(&self, id: FunctionId) -> Option<&CppFunction> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_by_name(&self, name: &str) -> Option<&CppFunction> {
        let id = self.index.get(name)?;
        self.functions.get(id.0 as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<FunctionId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: FunctionId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Iterates `(id, name, function)` in `FunctionId` order.
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &str, &CppFunction)> + '_ {
        self.functions
            .iter()
            .zip(self.names.iter())
            .enumerate()
            .map(|(i, (f, n))| (FunctionId(i as u32), n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
