//! Shared value, type and trap model used by both the validator and the executor.
//!
//! This crate deliberately knows nothing about modules, instances or bytecode: it only defines
//! the vocabulary (`ValueType`, `Val`, `TrapCode`, ...) that the rest of the runtime is built out
//! of, kept separate so it can underpin the validator and the engine without either depending on
//! the other.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod float;
mod instr;
mod trap;
mod types;
mod value;

pub use float::{F32, F64};
pub use instr::{
    AtomicRmwOp, BlockType, Cvt, FloatBinOp, FloatRelOp, FloatTy, FloatUnOp, FuncBody, IntBinOp,
    IntOrFloatTy, IntRelOp, IntTestOp, IntTy, IntUnOp, Instr, LabelIdx, LoadWidth, MemArg, Pc,
    StoreWidth,
};
pub use trap::{Trap, TrapCode};
pub use types::{FuncType, Mutability, RefType, ResultType, ValueType};
pub use value::{cellidx, num_cells, pack_cells, unpack_cells, Val, CELL_BYTES};
