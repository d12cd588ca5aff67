use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

/// The four Wasm numeric types, the opaque `v128` vector type, and the two reference types.
///
/// `V128` and the threads-proposal atomics operate over `I32`/`I64` the same way the scalar
/// arithmetic instructions do; `V128` is carried here purely so [`cellidx`](crate::cellidx) can
/// size it correctly even though this runtime never executes a SIMD opcode (see Non-goals).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl ValueType {
    /// Number of 32-bit [`Cell`](crate::Val)s this type occupies on the operand stack.
    pub fn cells(self) -> u32 {
        match self {
            ValueType::I32 | ValueType::F32 | ValueType::FuncRef | ValueType::ExternRef => 1,
            ValueType::I64 | ValueType::F64 => 2,
            ValueType::V128 => 4,
        }
    }

    pub fn is_reftype(self) -> bool {
        matches!(self, ValueType::FuncRef | ValueType::ExternRef)
    }

    pub fn is_numeric(self) -> bool {
        !self.is_reftype()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
        };
        f.write_str(s)
    }
}

/// A reference type, the subset of [`ValueType`] a table or `ref.null`/`ref.func` can carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefType {
    FuncRef,
    ExternRef,
}

impl RefType {
    pub fn value_type(self) -> ValueType {
        match self {
            RefType::FuncRef => ValueType::FuncRef,
            RefType::ExternRef => ValueType::ExternRef,
        }
    }
}

/// An ordered sequence of [`ValueType`]s: the parameters or results of a [`FuncType`], or the
/// types produced/consumed by a structured control-flow block.
pub type ResultType = Arc<[ValueType]>;

/// The type of a function: its parameter [`ResultType`] and its result [`ResultType`].
///
/// Two `FuncType`s are equal iff their parameter and result lists are equal; this is exactly the
/// notion of "the function reference type matches" used by `call_indirect` (see the Data Model
/// invariants).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncType {
    params: ResultType,
    results: ResultType,
}

impl FuncType {
    pub fn new<P, R>(params: P, results: R) -> Self
    where
        P: Into<Vec<ValueType>>,
        R: Into<Vec<ValueType>>,
    {
        FuncType {
            params: params.into().into(),
            results: results.into().into(),
        }
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn results(&self) -> &[ValueType] {
        &self.results
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, ")")
    }
}

/// Mutability of a global variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mutability {
    Const,
    Var,
}

impl Mutability {
    pub fn is_mutable(self) -> bool {
        matches!(self, Mutability::Var)
    }
}
