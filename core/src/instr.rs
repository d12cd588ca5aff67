//! The flattened, pre-parsed instruction representation shared by the validator and the
//! executor (the Data Model's "Expression": a pre-parsed byte sequence plus an `ExecInfo`).
//!
//! A decoder (external to this crate, see PURPOSE & SCOPE) is expected to translate a function
//! body's raw opcode stream into a `Vec<Instr>` before either the validator or the executor ever
//! see it. Using an index into that vector as the "PC" rather than a raw byte offset keeps the
//! jump table and the interpreter loop free of LEB128/opcode-width bookkeeping, while preserving
//! the same addressing contract: one stable integer per instruction, monotonic within a function.

use crate::types::{RefType, ValueType};
use alloc::sync::Arc;
use alloc::vec::Vec;

pub type Pc = u32;

/// Numeric comparison/arithmetic kind for the `{i32,i64,f32,f64}.*` instruction families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntTy {
    I32,
    I64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatTy {
    F32,
    F64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntBinOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntUnOp {
    Clz,
    Ctz,
    Popcnt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntTestOp {
    Eqz,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntRelOp {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Copysign,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatUnOp {
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatRelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A numeric conversion (`i32.wrap_i64`, `f64.convert_i32_s`, `i32.trunc_sat_f32_u`, ...).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cvt {
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F32DemoteF64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,
}

/// Static memory-access immediate: the `offset` added to the dynamic address, which memory is
/// addressed (always 0 until multi-memory is in scope, kept for forward compatibility).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemArg {
    pub memidx: u32,
    pub offset: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadWidth {
    /// Full-width load: i32/i64/f32/f64.
    Full,
    I32_8S,
    I32_8U,
    I32_16S,
    I32_16U,
    I64_8S,
    I64_8U,
    I64_16S,
    I64_16U,
    I64_32S,
    I64_32U,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreWidth {
    Full,
    Low8,
    Low16,
    Low32,
}

/// A read-modify-write-style atomic memory operation (threads proposal).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtomicRmwOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Xchg,
}

/// A branch target as seen by the instruction stream: the relative label depth (0 = innermost
/// enclosing structured block). Resolved into an absolute `Pc` + arity by the validator's jump
/// table (see Validator, "Jump-table emission").
pub type LabelIdx = u32;

/// The flattened, control-flow-folded instruction set this runtime interprets.
///
/// Structured control flow (`block`/`loop`/`if`/`else`/`end`) is kept exactly as Wasm encodes it
/// rather than pre-flattened into gotos: the [`crate::JumpTable`] computed once by the validator
/// gives O(1) branch resolution without needing a second, goto-only instruction set.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(LabelIdx),
    BrIf(LabelIdx),
    BrTable(Arc<[LabelIdx]>, LabelIdx),
    Return,
    Call(u32),
    CallIndirect { type_idx: u32, table_idx: u32 },

    Drop,
    Select,
    SelectTyped(ValueType),

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    TableGet(u32),
    TableSet(u32),
    TableSize(u32),
    TableGrow(u32),
    TableFill(u32),
    TableCopy { dst: u32, src: u32 },
    TableInit { table: u32, elem: u32 },
    ElemDrop(u32),

    Load(IntOrFloatTy, LoadWidth, MemArg),
    Store(IntOrFloatTy, StoreWidth, MemArg),
    MemorySize(u32),
    MemoryGrow(u32),
    MemoryFill(u32),
    MemoryCopy { dst: u32, src: u32 },
    MemoryInit { mem: u32, data: u32 },
    DataDrop(u32),

    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    ITestOp(IntTy, IntTestOp),
    IRelOp(IntTy, IntRelOp),
    IUnOp(IntTy, IntUnOp),
    IBinOp(IntTy, IntBinOp),
    FRelOp(FloatTy, FloatRelOp),
    FUnOp(FloatTy, FloatUnOp),
    FBinOp(FloatTy, FloatBinOp),
    Cvt(Cvt),

    RefNull(RefType),
    RefIsNull,
    RefFunc(u32),

    MemoryAtomicWait { ty: IntTy, arg: MemArg },
    MemoryAtomicNotify { arg: MemArg },
    AtomicRmw(IntTy, AtomicRmwOp, MemArg),
    AtomicCmpxchg(IntTy, MemArg),
    AtomicLoad(IntTy, MemArg),
    AtomicStore(IntTy, MemArg),
    AtomicFence,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntOrFloatTy {
    I32,
    I64,
    F32,
    F64,
}

/// The type of a structured block: either an inline value type, an empty signature, or an index
/// into the module's type section (a full `FuncType` with params), mirroring the Wasm binary
/// encoding's `blocktype`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
    FuncType(u32),
}

/// One function body: its declared locals (beyond the parameters) and its flattened
/// instruction stream.
#[derive(Clone, Debug)]
pub struct FuncBody {
    pub locals: Arc<[ValueType]>,
    pub instrs: Arc<[Instr]>,
}
