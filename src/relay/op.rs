//! Builders for kernel applications.
//!
//! Each helper stamps the call with the output type the upstream type
//! checker would assign, using element-wise broadcasting rules. Operand
//! types that cannot be combined leave the call as `Type::Infer`, which the
//! lowerer rejects.

use crate::ir::types::{DType, Shape, Type};
use crate::relay::expr::Expr;

pub fn add(a: Expr, b: Expr) -> Expr {
    arith("add", a, b)
}

pub fn subtract(a: Expr, b: Expr) -> Expr {
    arith("subtract", a, b)
}

pub fn multiply(a: Expr, b: Expr) -> Expr {
    arith("multiply", a, b)
}

pub fn divide(a: Expr, b: Expr) -> Expr {
    arith("divide", a, b)
}

pub fn less(a: Expr, b: Expr) -> Expr {
    compare("less", a, b)
}

pub fn less_equal(a: Expr, b: Expr) -> Expr {
    compare("less_equal", a, b)
}

pub fn greater(a: Expr, b: Expr) -> Expr {
    compare("greater", a, b)
}

pub fn greater_equal(a: Expr, b: Expr) -> Expr {
    compare("greater_equal", a, b)
}

pub fn equal(a: Expr, b: Expr) -> Expr {
    compare("equal", a, b)
}

pub fn not_equal(a: Expr, b: Expr) -> Expr {
    compare("not_equal", a, b)
}

pub fn exp(x: Expr) -> Expr {
    unary("exp", x)
}

pub fn log(x: Expr) -> Expr {
    unary("log", x)
}

pub fn sqrt(x: Expr) -> Expr {
    unary("sqrt", x)
}

pub fn tanh(x: Expr) -> Expr {
    unary("tanh", x)
}

pub fn sigmoid(x: Expr) -> Expr {
    unary("sigmoid", x)
}

pub fn relu(x: Expr) -> Expr {
    unary("relu", x)
}

pub fn negative(x: Expr) -> Expr {
    unary("negative", x)
}

/// Concatenates a tuple of tensors along axis 0.
pub fn concatenate(tuple: Expr) -> Expr {
    let ty = match tuple.ty() {
        Type::Tuple(fields) => concat_type(&fields),
        _ => Type::Infer,
    };
    Expr::call(Expr::op("concatenate"), vec![tuple], ty)
}

/// Element-wise sum of every tensor in a tuple.
pub fn add_n(tuple: Expr) -> Expr {
    let ty = match tuple.ty() {
        Type::Tuple(fields) => {
            let mut iter = fields.iter();
            match iter.next() {
                Some(first) => iter.fold(first.clone(), |acc, t| broadcast(&acc, t, None)),
                None => Type::Infer,
            }
        }
        _ => Type::Infer,
    };
    Expr::call(Expr::op("add_n"), vec![tuple], ty)
}

fn arith(name: &str, a: Expr, b: Expr) -> Expr {
    let ty = broadcast(&a.ty(), &b.ty(), None);
    Expr::call(Expr::op(name), vec![a, b], ty)
}

fn compare(name: &str, a: Expr, b: Expr) -> Expr {
    let ty = broadcast(&a.ty(), &b.ty(), Some(DType::Bool));
    Expr::call(Expr::op(name), vec![a, b], ty)
}

fn unary(name: &str, x: Expr) -> Expr {
    let ty = x.ty();
    Expr::call(Expr::op(name), vec![x], ty)
}

/// Result type of an element-wise binary kernel. One unresolved side takes
/// the other side's type.
fn broadcast(a: &Type, b: &Type, out_dtype: Option<DType>) -> Type {
    match (a, b) {
        (
            Type::Tensor { dtype: da, shape: sa },
            Type::Tensor { dtype: db, shape: sb },
        ) => {
            if da != db {
                return Type::Infer;
            }
            match sa.broadcast(sb) {
                Some(shape) => Type::Tensor {
                    dtype: out_dtype.unwrap_or(*da),
                    shape,
                },
                None => Type::Infer,
            }
        }
        (Type::Tensor { dtype, shape }, Type::Infer) | (Type::Infer, Type::Tensor { dtype, shape }) => {
            Type::Tensor {
                dtype: out_dtype.unwrap_or(*dtype),
                shape: shape.clone(),
            }
        }
        _ => Type::Infer,
    }
}

fn concat_type(fields: &[Type]) -> Type {
    let mut dtype = None;
    let mut lead = 0usize;
    let mut rest: Option<Vec<usize>> = None;
    for f in fields {
        let Type::Tensor { dtype: d, shape } = f else {
            return Type::Infer;
        };
        if shape.rank() == 0 || dtype.is_some_and(|x| x != *d) {
            return Type::Infer;
        }
        let tail = shape.0[1..].to_vec();
        if rest.as_ref().is_some_and(|r| *r != tail) {
            return Type::Infer;
        }
        dtype = Some(*d);
        lead += shape.0[0];
        rest = Some(tail);
    }
    match (dtype, rest) {
        (Some(dtype), Some(tail)) => {
            let mut dims = vec![lead];
            dims.extend(tail);
            Type::Tensor {
                dtype,
                shape: Shape(dims),
            }
        }
        _ => Type::Infer,
    }
}
