use std::fmt;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_int(self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::Bool => "bool",
        };
        f.write_str(s)
    }
}

/// Concrete tensor shape. The empty shape is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(pub Vec<usize>);

impl Shape {
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements (1 for a scalar).
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// NumPy-style broadcast of two shapes, aligned from the trailing dimension.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        let rank = self.rank().max(other.rank());
        let mut dims = vec![0usize; rank];
        for i in 0..rank {
            let a = dim_from_end(&self.0, rank - 1 - i);
            let b = dim_from_end(&other.0, rank - 1 - i);
            dims[i] = match (a, b) {
                (x, y) if x == y => x,
                (1, y) => y,
                (x, 1) => x,
                _ => return None,
            };
        }
        Some(Shape(dims))
    }
}

/// Size of the dimension `back` places from the end, or 1 past the leading edge.
fn dim_from_end(dims: &[usize], back: usize) -> usize {
    if back < dims.len() {
        dims[dims.len() - 1 - back]
    } else {
        1
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// A type annotation as produced by the upstream type checker.
///
/// `Infer` marks a node the checker left unannotated. Low-level AST nodes
/// refuse to be built around a type that still contains it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Tensor { dtype: DType, shape: Shape },
    Tuple(Vec<Type>),
    Func { params: Vec<Type>, ret: Box<Type> },
    /// An algebraic data type, referenced by name.
    Adt(String),
    Infer,
}

impl Type {
    pub fn scalar(dtype: DType) -> Self {
        Type::Tensor {
            dtype,
            shape: Shape::scalar(),
        }
    }

    pub fn tensor(dtype: DType, dims: &[usize]) -> Self {
        Type::Tensor {
            dtype,
            shape: Shape(dims.to_vec()),
        }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Self {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn adt(name: impl Into<String>) -> Self {
        Type::Adt(name.into())
    }

    /// Returns `false` if `Infer` appears anywhere inside this type.
    pub fn is_resolved(&self) -> bool {
        match self {
            Type::Infer => false,
            Type::Tensor { .. } | Type::Adt(_) => true,
            Type::Tuple(fields) => fields.iter().all(Type::is_resolved),
            Type::Func { params, ret } => params.iter().all(Type::is_resolved) && ret.is_resolved(),
        }
    }

    pub fn is_bool_scalar(&self) -> bool {
        matches!(self, Type::Tensor { dtype: DType::Bool, shape } if shape.rank() == 0)
    }

    /// Field types if this is a tuple type.
    pub fn tuple_fields(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(fields) => Some(fields),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor { dtype, shape } => write!(f, "tensor<{}, {}>", dtype, shape),
            Type::Tuple(fields) => {
                write!(f, "(")?;
                for (i, t) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Type::Func { params, ret } => {
                write!(f, "fn(")?;
                for (i, t) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Adt(name) => f.write_str(name),
            Type::Infer => f.write_str("?"),
        }
    }
}
