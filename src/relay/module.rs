use std::collections::HashMap;

use crate::ir::types::Type;
use crate::relay::expr::{Function, GlobalVar};

/// One variant of an algebraic data type.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDef {
    pub name: String,
    pub fields: Vec<Type>,
}

impl ConstructorDef {
    pub fn new(name: impl Into<String>, fields: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// An algebraic data type. The tag of a constructor is its index in `constructors`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeData {
    pub name: String,
    pub constructors: Vec<ConstructorDef>,
}

impl TypeData {
    pub fn new(name: impl Into<String>, constructors: Vec<ConstructorDef>) -> Self {
        Self {
            name: name.into(),
            constructors,
        }
    }
}

/// Resolved view of a constructor.
#[derive(Debug, Clone, Copy)]
pub struct ConstructorInfo<'m> {
    pub adt: &'m TypeData,
    pub tag: usize,
    pub def: &'m ConstructorDef,
}

/// A source module: global functions in definition order plus ADT definitions.
///
/// Invariants:
/// - Global and ADT names are unique.
/// - Constructor names are unique across all ADTs.
/// - Constructor tags are assigned at registration and never change.
#[derive(Debug, Default)]
pub struct Module {
    globals: Vec<(GlobalVar, Function)>,
    global_index: HashMap<String, usize>,
    type_data: Vec<TypeData>,
    type_index: HashMap<String, usize>,
    /// constructor name → (ADT index, tag)
    constructors: HashMap<String, (usize, usize)>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `gv` to `func`. The function may already reference `gv` (recursion).
    pub fn define(&mut self, gv: &GlobalVar, func: Function) -> Result<(), String> {
        if self.global_index.contains_key(gv.name()) {
            return Err(format!("global '{}' already defined", gv.name()));
        }
        self.global_index.insert(gv.name().to_owned(), self.globals.len());
        self.globals.push((gv.clone(), func));
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        let idx = self.global_index.get(name)?;
        self.globals.get(*idx).map(|(_, f)| f)
    }

    /// Globals in definition order.
    pub fn globals(&self) -> impl Iterator<Item = (&GlobalVar, &Function)> + '_ {
        self.globals.iter().map(|(gv, f)| (gv, f))
    }

    /// Registers an ADT and assigns its constructor tags.
    pub fn add_type_data(&mut self, data: TypeData) -> Result<(), String> {
        if self.type_index.contains_key(&data.name) {
            return Err(format!("type '{}' already defined", data.name));
        }
        for ctor in &data.constructors {
            if self.constructors.contains_key(&ctor.name) {
                return Err(format!("constructor '{}' already defined", ctor.name));
            }
        }
        let adt_idx = self.type_data.len();
        for (tag, ctor) in data.constructors.iter().enumerate() {
            self.constructors.insert(ctor.name.clone(), (adt_idx, tag));
        }
        self.type_index.insert(data.name.clone(), adt_idx);
        self.type_data.push(data);
        Ok(())
    }

    /// ADT definitions in registration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeData> + '_ {
        self.type_data.iter()
    }

    pub fn type_data(&self, name: &str) -> Option<&TypeData> {
        let idx = self.type_index.get(name)?;
        self.type_data.get(*idx)
    }

    pub fn constructor(&self, name: &str) -> Option<ConstructorInfo<'_>> {
        let &(adt_idx, tag) = self.constructors.get(name)?;
        let adt = self.type_data.get(adt_idx)?;
        let def = adt.constructors.get(tag)?;
        Some(ConstructorInfo { adt, tag, def })
    }
}
