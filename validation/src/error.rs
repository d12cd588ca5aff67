use core::fmt;
use waspvm_core::{LabelIdx, ValueType};

/// Why a function body failed structural type checking. Hand-rolled rather than derived via a
/// macro crate so `waspvm-validation` stays dependency-free and usable from a `no_std` decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },
    StackUnderflow,
    UnusedValuesAtFrameEnd,
    UnclosedBlock,
    ElseWithoutIf,
    InvalidLabel(LabelIdx),
    InvalidLocal(u32),
    InvalidGlobal(u32),
    InvalidFuncIndex(u32),
    InvalidTypeIndex(u32),
    InvalidTableIndex(u32),
    InvalidMemIndex(u32),
    InvalidElemIndex(u32),
    InvalidDataIndex(u32),
    ImmutableGlobalSet(u32),
    ConstExprMutableGlobal(u32),
    ConstExprLocalGlobal(u32),
    IllegalConstExprInstr,
    BrTableArityMismatch,
    SelectTypeMismatch,
    ExpectedReftype,
    IfWithoutElseTypeMismatch,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            ValidationError::StackUnderflow => write!(f, "operand stack underflow"),
            ValidationError::UnusedValuesAtFrameEnd => {
                write!(f, "values remaining on the stack at block end")
            }
            ValidationError::UnclosedBlock => write!(f, "function body ends with open blocks"),
            ValidationError::ElseWithoutIf => write!(f, "else without matching if"),
            ValidationError::InvalidLabel(idx) => write!(f, "invalid branch label {idx}"),
            ValidationError::InvalidLocal(idx) => write!(f, "invalid local index {idx}"),
            ValidationError::InvalidGlobal(idx) => write!(f, "invalid global index {idx}"),
            ValidationError::InvalidFuncIndex(idx) => write!(f, "invalid function index {idx}"),
            ValidationError::InvalidTypeIndex(idx) => write!(f, "invalid type index {idx}"),
            ValidationError::InvalidTableIndex(idx) => write!(f, "invalid table index {idx}"),
            ValidationError::InvalidMemIndex(idx) => write!(f, "invalid memory index {idx}"),
            ValidationError::InvalidElemIndex(idx) => write!(f, "invalid element segment index {idx}"),
            ValidationError::InvalidDataIndex(idx) => write!(f, "invalid data segment index {idx}"),
            ValidationError::ImmutableGlobalSet(idx) => {
                write!(f, "global.set on immutable global {idx}")
            }
            ValidationError::ConstExprMutableGlobal(idx) => write!(
                f,
                "constant expression references mutable global {idx}"
            ),
            ValidationError::ConstExprLocalGlobal(idx) => write!(
                f,
                "constant expression references local (non-imported) global {idx}"
            ),
            ValidationError::IllegalConstExprInstr => {
                write!(f, "instruction not allowed in a constant expression")
            }
            ValidationError::BrTableArityMismatch => {
                write!(f, "br_table target arities do not match the default target")
            }
            ValidationError::SelectTypeMismatch => {
                write!(f, "select operands have different types")
            }
            ValidationError::ExpectedReftype => write!(f, "expected a reference type"),
            ValidationError::IfWithoutElseTypeMismatch => write!(
                f,
                "if without else must not change the operand stack's types"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidationError {}
