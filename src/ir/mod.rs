pub mod node;
pub mod program;
pub mod tensor;
pub mod types;

pub use node::{
    Callee, CppConstructor, CppFunction, CppIf, CppMatch, CppTuple, Decl, GlobalRef, Ident, Invoke,
    MatchClause, Node, PackedCall, Param, Pattern,
};
pub use program::{FunctionId, FunctionTable, Program, Signature};
pub use tensor::{Buffer, Tensor};
pub use types::{DType, Shape, Type};
