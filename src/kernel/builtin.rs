//! Element-wise built-in kernels with NumPy-style broadcasting.

use crate::error::KernelError;
use crate::interp::value::Value;
use crate::ir::tensor::{Buffer, Tensor};
use crate::ir::types::Shape;
use crate::kernel::{Kernel, KernelArity, KernelRegistry};

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy)]
enum FloatOp {
    Exp,
    Log,
    Sqrt,
    Tanh,
    Sigmoid,
}

/// Registers every built-in under its operator name.
pub fn register_all(registry: &mut KernelRegistry) {
    let arith = [
        ("add", ArithOp::Add),
        ("subtract", ArithOp::Sub),
        ("multiply", ArithOp::Mul),
        ("divide", ArithOp::Div),
    ];
    for (name, op) in arith {
        registry.register(Kernel::new(name, KernelArity::Fixed(2), move |args| {
            let (a, b) = two_tensors(args)?;
            binary_arith(op, a, b)
        }));
    }

    let compare = [
        ("less", CmpOp::Lt),
        ("less_equal", CmpOp::Le),
        ("greater", CmpOp::Gt),
        ("greater_equal", CmpOp::Ge),
        ("equal", CmpOp::Eq),
        ("not_equal", CmpOp::Ne),
    ];
    for (name, op) in compare {
        registry.register(Kernel::new(name, KernelArity::Fixed(2), move |args| {
            let (a, b) = two_tensors(args)?;
            binary_compare(op, a, b)
        }));
    }

    let float_unary = [
        ("exp", FloatOp::Exp),
        ("log", FloatOp::Log),
        ("sqrt", FloatOp::Sqrt),
        ("tanh", FloatOp::Tanh),
        ("sigmoid", FloatOp::Sigmoid),
    ];
    for (name, op) in float_unary {
        registry.register(Kernel::new(name, KernelArity::Fixed(1), move |args| {
            unary_float(name, op, tensor_arg(args, 0)?)
        }));
    }

    registry.register(Kernel::new("negative", KernelArity::Fixed(1), |args| {
        negative(tensor_arg(args, 0)?)
    }));
    registry.register(Kernel::new("relu", KernelArity::Fixed(1), |args| {
        relu(tensor_arg(args, 0)?)
    }));
    registry.register(Kernel::new("concatenate", KernelArity::Packed, concatenate));
    registry.register(Kernel::new("add_n", KernelArity::Packed, add_n));
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn tensor_arg(args: &[Value], index: usize) -> Result<&Tensor, KernelError> {
    match args.get(index) {
        Some(Value::Tensor(t)) => Ok(t),
        Some(_) => Err(KernelError::NotATensor { index }),
        None => Err(KernelError::Arity {
            expected: index + 1,
            found: args.len(),
        }),
    }
}

fn two_tensors(args: &[Value]) -> Result<(&Tensor, &Tensor), KernelError> {
    Ok((tensor_arg(args, 0)?, tensor_arg(args, 1)?))
}

fn finish(shape: Shape, data: Buffer) -> Result<Value, KernelError> {
    Tensor::from_parts(shape, data)
        .map(Value::Tensor)
        .ok_or_else(|| KernelError::Invalid {
            detail: "result element count does not match its shape".to_owned(),
        })
}

/// For each element of `out`, the flat index of the element of `src` it reads.
fn broadcast_indices(out: &Shape, src: &Shape) -> Vec<usize> {
    let rank = out.rank();
    let offset = rank - src.rank();
    let mut strides = vec![0usize; src.rank()];
    let mut acc = 1;
    for d in (0..src.rank()).rev() {
        strides[d] = if src.0[d] == 1 { 0 } else { acc };
        acc *= src.0[d];
    }
    let total = out.numel();
    let mut counter = vec![0usize; rank];
    let mut result = Vec::with_capacity(total);
    for _ in 0..total {
        let flat: usize = (0..src.rank()).map(|d| counter[d + offset] * strides[d]).sum();
        result.push(flat);
        for d in (0..rank).rev() {
            counter[d] += 1;
            if counter[d] < out.0[d] {
                break;
            }
            counter[d] = 0;
        }
    }
    result
}

fn broadcast_shapes(a: &Tensor, b: &Tensor) -> Result<(Shape, Vec<usize>, Vec<usize>), KernelError> {
    let out = a.shape().broadcast(b.shape()).ok_or_else(|| KernelError::Broadcast {
        lhs: a.shape().to_string(),
        rhs: b.shape().to_string(),
    })?;
    let ia = broadcast_indices(&out, a.shape());
    let ib = broadcast_indices(&out, b.shape());
    Ok((out, ia, ib))
}

fn dtype_mismatch(a: &Tensor, b: &Tensor) -> KernelError {
    KernelError::DType {
        detail: format!("operands are {} and {}", a.dtype(), b.dtype()),
    }
}

// ---------------------------------------------------------------------------
// Numeric element trait
// ---------------------------------------------------------------------------

trait Element: Copy + PartialOrd {
    fn arith(op: ArithOp, a: Self, b: Self) -> Result<Self, KernelError>;
    fn neg(self) -> Self;
    fn zero() -> Self;
}

macro_rules! float_element {
    ($t:ty) => {
        impl Element for $t {
            fn arith(op: ArithOp, a: Self, b: Self) -> Result<Self, KernelError> {
                Ok(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                })
            }
            fn neg(self) -> Self {
                -self
            }
            fn zero() -> Self {
                0.0
            }
        }
    };
}

macro_rules! int_element {
    ($t:ty) => {
        impl Element for $t {
            fn arith(op: ArithOp, a: Self, b: Self) -> Result<Self, KernelError> {
                match op {
                    ArithOp::Add => Ok(a.wrapping_add(b)),
                    ArithOp::Sub => Ok(a.wrapping_sub(b)),
                    ArithOp::Mul => Ok(a.wrapping_mul(b)),
                    ArithOp::Div => {
                        if b == 0 {
                            Err(KernelError::Invalid {
                                detail: "integer division by zero".to_owned(),
                            })
                        } else {
                            Ok(a.wrapping_div(b))
                        }
                    }
                }
            }
            fn neg(self) -> Self {
                self.wrapping_neg()
            }
            fn zero() -> Self {
                0
            }
        }
    };
}

float_element!(f32);
float_element!(f64);
int_element!(i32);
int_element!(i64);

fn zip_arith<T: Element>(op: ArithOp, a: &[T], ia: &[usize], b: &[T], ib: &[usize]) -> Result<Vec<T>, KernelError> {
    ia.iter().zip(ib).map(|(&i, &j)| T::arith(op, a[i], b[j])).collect()
}

fn zip_compare<T: PartialOrd>(op: CmpOp, a: &[T], ia: &[usize], b: &[T], ib: &[usize]) -> Vec<bool> {
    ia.iter()
        .zip(ib)
        .map(|(&i, &j)| {
            let (x, y) = (&a[i], &b[j]);
            match op {
                CmpOp::Lt => x < y,
                CmpOp::Le => x <= y,
                CmpOp::Gt => x > y,
                CmpOp::Ge => x >= y,
                CmpOp::Eq => x == y,
                CmpOp::Ne => x != y,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

fn binary_arith(op: ArithOp, a: &Tensor, b: &Tensor) -> Result<Value, KernelError> {
    let (shape, ia, ib) = broadcast_shapes(a, b)?;
    let data = match (a.data(), b.data()) {
        (Buffer::F32(x), Buffer::F32(y)) => Buffer::F32(zip_arith(op, x, &ia, y, &ib)?),
        (Buffer::F64(x), Buffer::F64(y)) => Buffer::F64(zip_arith(op, x, &ia, y, &ib)?),
        (Buffer::I32(x), Buffer::I32(y)) => Buffer::I32(zip_arith(op, x, &ia, y, &ib)?),
        (Buffer::I64(x), Buffer::I64(y)) => Buffer::I64(zip_arith(op, x, &ia, y, &ib)?),
        (Buffer::Bool(_), Buffer::Bool(_)) => {
            return Err(KernelError::DType {
                detail: "arithmetic is not defined on bool".to_owned(),
            })
        }
        _ => return Err(dtype_mismatch(a, b)),
    };
    finish(shape, data)
}

fn binary_compare(op: CmpOp, a: &Tensor, b: &Tensor) -> Result<Value, KernelError> {
    let (shape, ia, ib) = broadcast_shapes(a, b)?;
    let data = match (a.data(), b.data()) {
        (Buffer::F32(x), Buffer::F32(y)) => zip_compare(op, x, &ia, y, &ib),
        (Buffer::F64(x), Buffer::F64(y)) => zip_compare(op, x, &ia, y, &ib),
        (Buffer::I32(x), Buffer::I32(y)) => zip_compare(op, x, &ia, y, &ib),
        (Buffer::I64(x), Buffer::I64(y)) => zip_compare(op, x, &ia, y, &ib),
        (Buffer::Bool(x), Buffer::Bool(y)) => zip_compare(op, x, &ia, y, &ib),
        _ => return Err(dtype_mismatch(a, b)),
    };
    finish(shape, Buffer::Bool(data))
}

fn apply_float(op: FloatOp, x: f64) -> f64 {
    match op {
        FloatOp::Exp => x.exp(),
        FloatOp::Log => x.ln(),
        FloatOp::Sqrt => x.sqrt(),
        FloatOp::Tanh => x.tanh(),
        FloatOp::Sigmoid => 1.0 / (1.0 + (-x).exp()),
    }
}

fn unary_float(name: &str, op: FloatOp, t: &Tensor) -> Result<Value, KernelError> {
    let data = match t.data() {
        Buffer::F32(v) => Buffer::F32(v.iter().map(|&x| apply_float(op, x as f64) as f32).collect()),
        Buffer::F64(v) => Buffer::F64(v.iter().map(|&x| apply_float(op, x)).collect()),
        _ => {
            return Err(KernelError::DType {
                detail: format!("{} requires a floating-point input, got {}", name, t.dtype()),
            })
        }
    };
    finish(t.shape().clone(), data)
}

fn negative(t: &Tensor) -> Result<Value, KernelError> {
    fn neg_all<T: Element>(v: &[T]) -> Vec<T> {
        v.iter().map(|&x| x.neg()).collect()
    }
    let data = match t.data() {
        Buffer::F32(v) => Buffer::F32(neg_all(v)),
        Buffer::F64(v) => Buffer::F64(neg_all(v)),
        Buffer::I32(v) => Buffer::I32(neg_all(v)),
        Buffer::I64(v) => Buffer::I64(neg_all(v)),
        Buffer::Bool(_) => {
            return Err(KernelError::DType {
                detail: "negative is not defined on bool".to_owned(),
            })
        }
    };
    finish(t.shape().clone(), data)
}

fn relu(t: &Tensor) -> Result<Value, KernelError> {
    fn clamp_all<T: Element>(v: &[T]) -> Vec<T> {
        v.iter().map(|&x| if x > T::zero() { x } else { T::zero() }).collect()
    }
    let data = match t.data() {
        Buffer::F32(v) => Buffer::F32(clamp_all(v)),
        Buffer::F64(v) => Buffer::F64(clamp_all(v)),
        Buffer::I32(v) => Buffer::I32(clamp_all(v)),
        Buffer::I64(v) => Buffer::I64(clamp_all(v)),
        Buffer::Bool(_) => {
            return Err(KernelError::DType {
                detail: "relu is not defined on bool".to_owned(),
            })
        }
    };
    finish(t.shape().clone(), data)
}

/// Joins tensors along axis 0. Every input needs rank ≥ 1, one dtype, and
/// identical trailing dimensions.
fn concatenate(args: &[Value]) -> Result<Value, KernelError> {
    let first = tensor_arg(args, 0)?;
    if first.shape().rank() == 0 {
        return Err(KernelError::Invalid {
            detail: "cannot concatenate scalars".to_owned(),
        });
    }
    let tail = &first.shape().0[1..];
    let mut lead = 0usize;
    let mut data = match first.data() {
        Buffer::F32(_) => Buffer::F32(Vec::new()),
        Buffer::F64(_) => Buffer::F64(Vec::new()),
        Buffer::I32(_) => Buffer::I32(Vec::new()),
        Buffer::I64(_) => Buffer::I64(Vec::new()),
        Buffer::Bool(_) => Buffer::Bool(Vec::new()),
    };
    for index in 0..args.len() {
        let t = tensor_arg(args, index)?;
        if t.shape().rank() == 0 || &t.shape().0[1..] != tail {
            return Err(KernelError::Invalid {
                detail: format!(
                    "input {} has shape {}, incompatible with {}",
                    index,
                    t.shape(),
                    first.shape()
                ),
            });
        }
        lead += t.shape().0[0];
        match (&mut data, t.data()) {
            (Buffer::F32(out), Buffer::F32(v)) => out.extend_from_slice(v),
            (Buffer::F64(out), Buffer::F64(v)) => out.extend_from_slice(v),
            (Buffer::I32(out), Buffer::I32(v)) => out.extend_from_slice(v),
            (Buffer::I64(out), Buffer::I64(v)) => out.extend_from_slice(v),
            (Buffer::Bool(out), Buffer::Bool(v)) => out.extend_from_slice(v),
            _ => return Err(dtype_mismatch(first, t)),
        }
    }
    let mut dims = vec![lead];
    dims.extend_from_slice(tail);
    finish(Shape(dims), data)
}

fn add_n(args: &[Value]) -> Result<Value, KernelError> {
    let mut acc = Value::Tensor(tensor_arg(args, 0)?.clone());
    for index in 1..args.len() {
        let next = tensor_arg(args, index)?;
        let Value::Tensor(sum) = &acc else {
            return Err(KernelError::NotATensor { index: 0 });
        };
        acc = binary_arith(ArithOp::Add, sum, next)?;
    }
    Ok(acc)
}
