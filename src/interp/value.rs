use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ir::node::CppFunction;
use crate::ir::program::FunctionId;
use crate::ir::tensor::Tensor;
use crate::ir::types::Type;
use crate::relay::{Module, TypeData};

/// A runtime value produced or consumed by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Tensor(Tensor),
    Tuple(Vec<Value>),
    /// A constructed ADT value: variant tag plus ordered fields.
    Adt { tag: usize, fields: Vec<Value> },
    Closure(Arc<Closure>),
}

/// A function value: its code plus the values it captured when created.
#[derive(Debug, PartialEq)]
pub struct Closure {
    pub(crate) code: ClosureCode,
    pub(crate) captures: Vec<Value>,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ClosureCode {
    Global(FunctionId),
    Local(CppFunction),
}

impl Closure {
    /// Number of formal parameters, when known without the program.
    pub fn local_arity(&self) -> Option<usize> {
        match &self.code {
            ClosureCode::Local(f) => Some(f.params().len()),
            ClosureCode::Global(_) => None,
        }
    }

    pub fn captures(&self) -> &[Value] {
        &self.captures
    }
}

impl Value {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Scalar convenience for tests and callers: the single element as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_tensor().and_then(Tensor::scalar_as_f64)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Tensor(_) => "tensor",
            Value::Tuple(_) => "tuple",
            Value::Adt { .. } => "adt",
            Value::Closure(_) => "closure",
        }
    }

    /// Structural check against a declared type.
    ///
    /// An ADT value must carry a tag of the named type and fields matching
    /// that constructor's field types. A closure is checked by parameter
    /// count when its code is local; global function values are accepted
    /// by kind.
    pub fn conforms_to(&self, ty: &Type, types: &TypeTable) -> bool {
        match (self, ty) {
            (Value::Tensor(t), Type::Tensor { dtype, shape }) => {
                t.dtype() == *dtype && t.shape() == shape
            }
            (Value::Tuple(fields), Type::Tuple(tys)) => {
                fields.len() == tys.len()
                    && fields.iter().zip(tys).all(|(v, t)| v.conforms_to(t, types))
            }
            (Value::Adt { tag, fields }, Type::Adt(name)) => match types.constructor_fields(name, *tag) {
                Some(tys) => {
                    fields.len() == tys.len()
                        && fields.iter().zip(tys).all(|(v, t)| v.conforms_to(t, types))
                }
                None => false,
            },
            (Value::Closure(c), Type::Func { params, .. }) => {
                c.local_arity().map_or(true, |n| n == params.len())
            }
            _ => false,
        }
    }
}

/// ADT definitions of a compiled unit, by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: HashMap<String, TypeData>,
}

impl TypeTable {
    pub fn new(types: impl IntoIterator<Item = TypeData>) -> Self {
        Self {
            types: types.into_iter().map(|td| (td.name.clone(), td)).collect(),
        }
    }

    pub fn from_module(module: &Module) -> Self {
        Self::new(module.types().cloned())
    }

    pub fn get(&self, name: &str) -> Option<&TypeData> {
        self.types.get(name)
    }

    fn constructor_fields(&self, name: &str, tag: usize) -> Option<&[Type]> {
        let ctor = self.types.get(name)?.constructors.get(tag)?;
        Some(&ctor.fields)
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Tensor(t) => write!(f, "{}", t),
            Value::Tuple(elems) => {
                write!(f, "(")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Value::Adt { tag, fields } => {
                write!(f, "variant({})", tag)?;
                if !fields.is_empty() {
                    write!(f, "(")?;
                    for (i, v) in fields.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", v)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Value::Closure(c) => match &c.code {
                ClosureCode::Global(id) => write!(f, "<function {}>", id),
                ClosureCode::Local(func) => match func.name() {
                    Some(n) => write!(f, "<closure {}>", n),
                    None => write!(f, "<closure>"),
                },
            },
        }
    }
}
