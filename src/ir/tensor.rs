use std::fmt;

use crate::ir::types::{DType, Shape, Type};

/// Typed, row-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl Buffer {
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
            Buffer::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
            Buffer::I32(v) => v.len(),
            Buffer::I64(v) => v.len(),
            Buffer::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dense tensor. Scalars are rank-0 tensors holding one element.
///
/// Invariant: `data.len() == shape.numel()`. Every public constructor
/// upholds it; `from_parts` checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Buffer,
}

impl Tensor {
    /// Builds a tensor, returning `None` if the element count does not fit the shape.
    pub fn from_parts(shape: Shape, data: Buffer) -> Option<Self> {
        if shape.numel() != data.len() {
            return None;
        }
        Some(Self { shape, data })
    }

    pub fn scalar_f32(x: f32) -> Self {
        Self { shape: Shape::scalar(), data: Buffer::F32(vec![x]) }
    }

    pub fn scalar_f64(x: f64) -> Self {
        Self { shape: Shape::scalar(), data: Buffer::F64(vec![x]) }
    }

    pub fn scalar_i32(x: i32) -> Self {
        Self { shape: Shape::scalar(), data: Buffer::I32(vec![x]) }
    }

    pub fn scalar_i64(x: i64) -> Self {
        Self { shape: Shape::scalar(), data: Buffer::I64(vec![x]) }
    }

    pub fn scalar_bool(b: bool) -> Self {
        Self { shape: Shape::scalar(), data: Buffer::Bool(vec![b]) }
    }

    /// A one-dimensional `float32` tensor.
    pub fn vector_f32(values: Vec<f32>) -> Self {
        Self { shape: Shape(vec![values.len()]), data: Buffer::F32(values) }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn data(&self) -> &Buffer {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn ty(&self) -> Type {
        Type::Tensor { dtype: self.dtype(), shape: self.shape.clone() }
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.rank() == 0
    }

    /// The value of a boolean scalar, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            Buffer::Bool(v) if self.is_scalar() => v.first().copied(),
            _ => None,
        }
    }

    /// The first element widened to `f64`. Convenient for asserting on scalar results.
    pub fn scalar_as_f64(&self) -> Option<f64> {
        if !self.is_scalar() {
            return None;
        }
        match &self.data {
            Buffer::F32(v) => v.first().map(|&x| x as f64),
            Buffer::F64(v) => v.first().copied(),
            Buffer::I32(v) => v.first().map(|&x| x as f64),
            Buffer::I64(v) => v.first().map(|&x| x as f64),
            Buffer::Bool(v) => v.first().map(|&b| if b { 1.0 } else { 0.0 }),
        }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], scalar: bool) -> fmt::Result {
            if scalar && items.len() == 1 {
                return write!(f, "{}", items[0]);
            }
            write!(f, "[")?;
            for (i, x) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", x)?;
            }
            write!(f, "]")
        }
        let scalar = self.is_scalar();
        match &self.data {
            Buffer::F32(v) => list(f, v, scalar)?,
            Buffer::F64(v) => list(f, v, scalar)?,
            Buffer::I32(v) => list(f, v, scalar)?,
            Buffer::I64(v) => list(f, v, scalar)?,
            Buffer::Bool(v) => list(f, v, scalar)?,
        }
        write!(f, ": {}", self.dtype())
    }
}
