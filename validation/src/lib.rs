//! Structural type checker for Wasm function bodies.
//!
//! This crate owns exactly the "Validator" subsystem: a control-frame stack plus an
//! operand-type stack with polymorphic (`unreachable`) semantics, walking a function's
//! flattened [`Instr`] stream once and, in the same pass, emitting the [`JumpTable`] the
//! executor uses for O(1) branch resolution. Validation lives in its own crate, kept out of
//! the main engine crate so it can be reused, audited, and tested in isolation.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod error;
mod frame;
mod jumptable;

#[cfg(test)]
mod tests;

pub use error::ValidationError;
pub use jumptable::{BranchInfo, JumpTable, Slot, Target};

use alloc::sync::Arc;
use alloc::vec::Vec;
use frame::CtrlFrame;
use waspvm_core::{
    BlockType, Cvt, FloatBinOp, FloatRelOp, FloatTy, FloatUnOp, FuncType, Instr, IntBinOp,
    IntOrFloatTy, IntRelOp, IntTestOp, IntTy, IntUnOp, LabelIdx, Pc, RefType, ResultType,
    ValueType,
};

/// Everything about the surrounding module a function body's validation needs to know:
/// the type section (for `block`/`call`/`call_indirect`), how many locals/globals/tables/
/// memories/functions/elements/datas exist, and which globals are immutable.
pub trait ValidationContext {
    fn func_type(&self, type_idx: u32) -> Option<&FuncType>;
    fn func_type_of(&self, func_idx: u32) -> Option<&FuncType>;
    fn global_type(&self, global_idx: u32) -> Option<(ValueType, bool /* mutable */)>;
    /// How many entries at the front of the global index space are imports, rather than
    /// locally defined -- needed to restrict constant-expression `global.get` to imported
    /// globals only (§4.4).
    fn num_imported_globals(&self) -> u32;
    fn table_type(&self, table_idx: u32) -> Option<RefType>;
    fn table_exists(&self, table_idx: u32) -> bool;
    fn memory_exists(&self, mem_idx: u32) -> bool;
    fn data_count(&self) -> Option<u32>;
    fn elem_type(&self, elem_idx: u32) -> Option<RefType>;
}

/// Flags controlling which instructions a body may use.
#[derive(Copy, Clone, Debug, Default)]
pub struct ValidationFlags {
    /// Restrict to the constant-expression subset (globals/offsets/initializers, §4.4).
    pub const_expr: bool,
    /// Emit a [`JumpTable`]; skip it for constant expressions, which never branch.
    pub generate_jump_table: bool,
}

/// Validates one function body (its declared locals plus flattened instruction stream) against
/// `func_type` and `ctx`, returning the [`JumpTable`] needed to execute it.
pub fn validate_function(
    ctx: &dyn ValidationContext,
    func_type: &FuncType,
    locals: &[ValueType],
    instrs: &[Instr],
    flags: ValidationFlags,
) -> Result<JumpTable, ValidationError> {
    let mut v = Validator::new(ctx, func_type, locals, instrs.len(), flags);
    for (pc, instr) in instrs.iter().enumerate() {
        v.visit(pc as Pc, instr)?;
    }
    v.finish()
}

/// Result of [`Validator::pop_valtype`]: either a concrete type, or the polymorphic sentinel
/// produced while the current frame is unreachable and its operand stack is already drained to
/// `height` (see "Polymorphic stack discipline").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Popped {
    Type(ValueType),
    Any,
}

/// The core validator state machine: an operand-type stack plus a control-frame stack.
pub struct Validator<'a> {
    ctx: &'a dyn ValidationContext,
    func_type: &'a FuncType,
    locals: &'a [ValueType],
    valtypes: Vec<ValueType>,
    cframes: Vec<CtrlFrame>,
    jump_table: JumpTable,
    flags: ValidationFlags,
}

impl<'a> Validator<'a> {
    pub fn new(
        ctx: &'a dyn ValidationContext,
        func_type: &'a FuncType,
        locals: &'a [ValueType],
        body_len: usize,
        flags: ValidationFlags,
    ) -> Self {
        let mut v = Validator {
            ctx,
            func_type,
            locals,
            valtypes: Vec::new(),
            cframes: Vec::new(),
            jump_table: JumpTable::new(body_len),
            flags,
        };
        // The implicit outer frame representing the function body itself; popped by the
        // final `end` (Data Model invariant: "control-frame stack is never empty ... until
        // the final end").
        let results: ResultType = func_type.results().to_vec().into();
        v.push_ctrlframe(frame::CtrlFrameKind::Func, None, Arc::from([]), results, 0);
        v
    }

    // ---- operand-type stack ----------------------------------------------------------

    pub fn push_valtype(&mut self, t: ValueType) {
        self.valtypes.push(t);
    }

    pub fn push_valtypes(&mut self, types: &[ValueType]) {
        for &t in types {
            self.push_valtype(t);
        }
    }

    pub fn pop_valtype(&mut self, expected: ValueType) -> Result<(), ValidationError> {
        match self.pop_any()? {
            Popped::Any => Ok(()),
            Popped::Type(actual) if actual == expected => Ok(()),
            Popped::Type(actual) => Err(ValidationError::TypeMismatch {
                expected,
                actual,
            }),
        }
    }

    /// Pop one value off the operand stack without constraining its type, honoring the
    /// polymorphic "unreachable" discipline: never pops below the current frame's `height`.
    pub fn pop_any(&mut self) -> Result<Popped, ValidationError> {
        let frame = self.cframes.last().expect("cframes never empty");
        if self.valtypes.len() == frame.height {
            if frame.unreachable {
                return Ok(Popped::Any);
            }
            return Err(ValidationError::StackUnderflow);
        }
        Ok(Popped::Type(self.valtypes.pop().expect("checked above")))
    }

    pub fn pop_valtypes(&mut self, types: &[ValueType]) -> Result<(), ValidationError> {
        for &t in types.iter().rev() {
            self.pop_valtype(t)?;
        }
        Ok(())
    }

    pub fn mark_unreachable(&mut self) {
        let frame = self.cframes.last_mut().expect("cframes never empty");
        frame.unreachable = true;
        self.valtypes.truncate(frame.height);
    }

    // ---- control-frame stack ----------------------------------------------------------

    fn push_ctrlframe(
        &mut self,
        kind: frame::CtrlFrameKind,
        pc: Option<Pc>,
        start_types: ResultType,
        end_types: ResultType,
        _depth_hint: usize,
    ) {
        // Caller already popped `start_types` off the operand stack to check them against the
        // branch/condition that precedes this block; `height` is that post-pop length, and we
        // push `start_types` right back since they're also this frame's initial locals-less
        // operand contents (Validator, "push_ctrlframe").
        let height = self.valtypes.len();
        self.push_valtypes(&start_types);
        self.cframes.push(CtrlFrame {
            kind,
            start_types: start_types.clone(),
            end_types,
            height,
            unreachable: false,
            pc,
            pending_end_targets: Vec::new(),
        });
    }

    fn pop_ctrlframe(&mut self) -> Result<CtrlFrame, ValidationError> {
        let end_types = self.cframes.last().expect("cframes never empty").end_types.clone();
        self.pop_valtypes(&end_types)?;
        let frame = self.cframes.last().expect("cframes never empty");
        if self.valtypes.len() != frame.height {
            return Err(ValidationError::UnusedValuesAtFrameEnd);
        }
        Ok(self.cframes.pop().expect("checked above"))
    }

    /// The label types of the frame `labelidx` levels from the top (0 = innermost): a `loop`'s
    /// label is its `start_types`, everything else's label is its `end_types`.
    pub fn target_label_types(&self, labelidx: LabelIdx) -> Result<ResultType, ValidationError> {
        let frame = self.frame_at(labelidx)?;
        Ok(match frame.kind {
            frame::CtrlFrameKind::Loop => frame.start_types.clone(),
            _ => frame.end_types.clone(),
        })
    }

    fn frame_at(&self, labelidx: LabelIdx) -> Result<&CtrlFrame, ValidationError> {
        let idx = self
            .cframes
            .len()
            .checked_sub(1 + labelidx as usize)
            .ok_or(ValidationError::InvalidLabel(labelidx))?;
        Ok(&self.cframes[idx])
    }

    fn local_type(&self, idx: u32) -> Result<ValueType, ValidationError> {
        self.func_type
            .params()
            .iter()
            .chain(self.locals.iter())
            .nth(idx as usize)
            .copied()
            .ok_or(ValidationError::InvalidLocal(idx))
    }

    fn block_type_io(&self, bt: BlockType) -> Result<(ResultType, ResultType), ValidationError> {
        Ok(match bt {
            BlockType::Empty => (Arc::from([]), Arc::from([])),
            BlockType::Value(t) => (Arc::from([]), Arc::from([t])),
            BlockType::FuncType(idx) => {
                let ft = self
                    .ctx
                    .func_type(idx)
                    .ok_or(ValidationError::InvalidTypeIndex(idx))?;
                (ft.params().to_vec().into(), ft.results().to_vec().into())
            }
        })
    }

    fn record_data_idx(&self, idx: u32) -> Result<(), ValidationError> {
        match self.ctx.data_count() {
            Some(count) if idx >= count => Err(ValidationError::InvalidDataIndex(idx)),
            _ => Ok(()),
        }
    }

    fn require(&self, cond: bool, err: ValidationError) -> Result<(), ValidationError> {
        if cond {
            Ok(())
        } else {
            Err(err)
        }
    }

    // ---- instruction-by-instruction visitation -----------------------------------------

    pub fn visit(&mut self, pc: Pc, instr: &Instr) -> Result<(), ValidationError> {
        if self.flags.const_expr {
            self.visit_const_expr(instr)?;
            return Ok(());
        }
        self.visit_full(pc, instr)
    }

    fn visit_const_expr(&mut self, instr: &Instr) -> Result<(), ValidationError> {
        match *instr {
            Instr::I32Const(_) => self.push_valtype(ValueType::I32),
            Instr::I64Const(_) => self.push_valtype(ValueType::I64),
            Instr::F32Const(_) => self.push_valtype(ValueType::F32),
            Instr::F64Const(_) => self.push_valtype(ValueType::F64),
            Instr::RefNull(rt) => self.push_valtype(rt.value_type()),
            Instr::RefFunc(_) => self.push_valtype(ValueType::FuncRef),
            Instr::GlobalGet(idx) => {
                let (ty, mutable) = self
                    .ctx
                    .global_type(idx)
                    .ok_or(ValidationError::InvalidGlobal(idx))?;
                self.require(!mutable, ValidationError::ConstExprMutableGlobal(idx))?;
                self.require(
                    idx < self.ctx.num_imported_globals(),
                    ValidationError::ConstExprLocalGlobal(idx),
                )?;
                self.push_valtype(ty);
            }
            Instr::End => {}
            _ => return Err(ValidationError::IllegalConstExprInstr),
        }
        Ok(())
    }

    fn visit_full(&mut self, pc: Pc, instr: &Instr) -> Result<(), ValidationError> {
        use frame::CtrlFrameKind as K;
        match *instr {
            Instr::Unreachable => self.mark_unreachable(),
            Instr::Nop => {}

            Instr::Block(bt) => {
                let (start, end) = self.block_type_io(bt)?;
                self.pop_valtypes(&start)?;
                self.push_ctrlframe(K::Block, Some(pc), start, end, 0);
            }
            Instr::Loop(bt) => {
                let (start, end) = self.block_type_io(bt)?;
                self.pop_valtypes(&start)?;
                self.push_ctrlframe(K::Loop, Some(pc), start, end, 0);
            }
            Instr::If(bt) => {
                self.pop_valtype(ValueType::I32)?;
                let (start, end) = self.block_type_io(bt)?;
                self.pop_valtypes(&start)?;
                self.push_ctrlframe(K::If, Some(pc), start, end, 0);
            }
            Instr::Else => {
                let frame = self.pop_ctrlframe()?;
                self.require(frame.kind == K::If, ValidationError::ElseWithoutIf)?;
                let if_pc = frame.pc.expect("if frame always has a pc");
                if self.flags.generate_jump_table {
                    // The `if`'s false branch skips straight past this marker into the else
                    // body; the marker's own pc is reserved for the ElseEnd skip a completed
                    // `then` arm falls through to.
                    self.jump_table.set(
                        if_pc,
                        BranchInfo::IfElse(Target {
                            pc: pc + 1,
                            arity: frame.start_types.len() as u32,
                            height: frame.height,
                        }),
                    );
                }
                self.push_valtypes(&frame.start_types);
                self.cframes.push(CtrlFrame {
                    kind: K::Else,
                    start_types: frame.start_types,
                    end_types: frame.end_types,
                    // Reuse the popped `if` frame's height rather than the stack length after
                    // re-pushing `start_types`: the else arm's params are poppable the same way a
                    // block's are, and the construct's net effect (for both `pop_ctrlframe` here
                    // and any branch out to `after_end`) is measured from this same baseline the
                    // `if` arm used, not from on top of a fresh copy of its own params.
                    height: frame.height,
                    unreachable: false,
                    pc: Some(pc),
                    pending_end_targets: frame.pending_end_targets,
                });
            }
            Instr::End => {
                let frame = self.pop_ctrlframe()?;
                self.push_valtypes(&frame.end_types);
                let after_end = pc + 1;
                let arity = frame.end_types.len() as u32;
                if self.flags.generate_jump_table {
                    if let Some(if_pc) = frame.pc {
                        if frame.kind == K::If {
                            // An `if` with no `else` runs its `then` arm or nothing at all, so
                            // the two must leave the stack identically typed.
                            self.require(
                                frame.start_types == frame.end_types,
                                ValidationError::IfWithoutElseTypeMismatch,
                            )?;
                            // `if` with no `else`: its false-branch target is right after `end`.
                            self.jump_table.set(
                                if_pc,
                                BranchInfo::IfElse(Target {
                                    pc: after_end,
                                    arity,
                                    height: frame.height,
                                }),
                            );
                        } else if frame.kind == K::Else {
                            self.jump_table.set(
                                if_pc,
                                BranchInfo::ElseEnd(Target {
                                    pc: after_end,
                                    arity,
                                    height: frame.height,
                                }),
                            );
                        }
                    }
                    for (pending_pc, slot) in frame.pending_end_targets {
                        self.jump_table.patch_forward_target(
                            pending_pc,
                            slot,
                            Target {
                                pc: after_end,
                                arity,
                                height: frame.height,
                            },
                        );
                    }
                }
            }

            Instr::Br(labelidx) => {
                let label_types = self.target_label_types(labelidx)?;
                self.pop_valtypes(&label_types)?;
                if self.flags.generate_jump_table {
                    self.record_branch(pc, labelidx, &label_types)?;
                }
                self.mark_unreachable();
            }
            Instr::BrIf(labelidx) => {
                self.pop_valtype(ValueType::I32)?;
                let label_types = self.target_label_types(labelidx)?;
                self.pop_valtypes(&label_types)?;
                self.push_valtypes(&label_types);
                if self.flags.generate_jump_table {
                    self.record_branch(pc, labelidx, &label_types)?;
                }
            }
            Instr::BrTable(ref table, default) => {
                self.pop_valtype(ValueType::I32)?;
                let default_types = self.target_label_types(default)?;
                for &l in table.iter() {
                    let lt = self.target_label_types(l)?;
                    self.require(
                        lt.len() == default_types.len(),
                        ValidationError::BrTableArityMismatch,
                    )?;
                }
                self.pop_valtypes(&default_types)?;
                if self.flags.generate_jump_table {
                    let mut targets = Vec::with_capacity(table.len());
                    for (i, &l) in table.iter().enumerate() {
                        targets.push(self.resolve_or_defer(pc, l, &default_types, jumptable::Slot::TableEntry(i))?);
                    }
                    let default_target =
                        self.resolve_or_defer(pc, default, &default_types, jumptable::Slot::TableDefault)?;
                    self.jump_table.set(
                        pc,
                        BranchInfo::Table {
                            targets: targets.into(),
                            default: default_target,
                        },
                    );
                }
                self.mark_unreachable();
            }
            Instr::Return => {
                let results = self.func_type.results().to_vec();
                self.pop_valtypes(&results)?;
                self.mark_unreachable();
            }

            Instr::Call(func_idx) => {
                let ft = self
                    .ctx
                    .func_type_of(func_idx)
                    .ok_or(ValidationError::InvalidFuncIndex(func_idx))?
                    .clone();
                self.pop_valtypes(ft.params())?;
                self.push_valtypes(ft.results());
            }
            Instr::CallIndirect { type_idx, table_idx } => {
                self.require(
                    self.ctx.table_exists(table_idx),
                    ValidationError::InvalidTableIndex(table_idx),
                )?;
                let ft = self
                    .ctx
                    .func_type(type_idx)
                    .ok_or(ValidationError::InvalidTypeIndex(type_idx))?
                    .clone();
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtypes(ft.params())?;
                self.push_valtypes(ft.results());
            }

            Instr::Drop => {
                self.pop_any()?;
            }
            Instr::Select => {
                self.pop_valtype(ValueType::I32)?;
                let a = self.pop_any()?;
                let b = self.pop_any()?;
                match (a, b) {
                    (Popped::Type(a), Popped::Type(b)) => {
                        self.require(a == b, ValidationError::SelectTypeMismatch)?;
                        self.push_valtype(a);
                    }
                    (Popped::Type(t), Popped::Any) | (Popped::Any, Popped::Type(t)) => {
                        self.push_valtype(t)
                    }
                    (Popped::Any, Popped::Any) => self.push_valtype(ValueType::I32),
                }
            }
            Instr::SelectTyped(t) => {
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(t)?;
                self.pop_valtype(t)?;
                self.push_valtype(t);
            }

            Instr::LocalGet(idx) => self.push_valtype(self.local_type(idx)?),
            Instr::LocalSet(idx) => self.pop_valtype(self.local_type(idx)?)?,
            Instr::LocalTee(idx) => {
                let t = self.local_type(idx)?;
                self.pop_valtype(t)?;
                self.push_valtype(t);
            }
            Instr::GlobalGet(idx) => {
                let (t, _) = self
                    .ctx
                    .global_type(idx)
                    .ok_or(ValidationError::InvalidGlobal(idx))?;
                self.push_valtype(t);
            }
            Instr::GlobalSet(idx) => {
                let (t, mutable) = self
                    .ctx
                    .global_type(idx)
                    .ok_or(ValidationError::InvalidGlobal(idx))?;
                self.require(mutable, ValidationError::ImmutableGlobalSet(idx))?;
                self.pop_valtype(t)?;
            }

            Instr::TableGet(idx) => {
                let rt = self
                    .ctx
                    .table_type(idx)
                    .ok_or(ValidationError::InvalidTableIndex(idx))?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(rt.value_type());
            }
            Instr::TableSet(idx) => {
                let rt = self
                    .ctx
                    .table_type(idx)
                    .ok_or(ValidationError::InvalidTableIndex(idx))?;
                self.pop_valtype(rt.value_type())?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::TableSize(idx) => {
                self.require(
                    self.ctx.table_exists(idx),
                    ValidationError::InvalidTableIndex(idx),
                )?;
                self.push_valtype(ValueType::I32);
            }
            Instr::TableGrow(idx) => {
                let rt = self
                    .ctx
                    .table_type(idx)
                    .ok_or(ValidationError::InvalidTableIndex(idx))?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(rt.value_type())?;
                self.push_valtype(ValueType::I32);
            }
            Instr::TableFill(idx) => {
                let rt = self
                    .ctx
                    .table_type(idx)
                    .ok_or(ValidationError::InvalidTableIndex(idx))?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(rt.value_type())?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::TableCopy { dst, src } => {
                self.require(
                    self.ctx.table_exists(dst) && self.ctx.table_exists(src),
                    ValidationError::InvalidTableIndex(dst),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::TableInit { table, elem } => {
                self.require(
                    self.ctx.table_exists(table),
                    ValidationError::InvalidTableIndex(table),
                )?;
                self.require(
                    self.ctx.elem_type(elem).is_some(),
                    ValidationError::InvalidElemIndex(elem),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::ElemDrop(idx) => {
                self.require(
                    self.ctx.elem_type(idx).is_some(),
                    ValidationError::InvalidElemIndex(idx),
                )?;
            }

            Instr::Load(ty, _, ma) => {
                self.require(
                    self.ctx.memory_exists(ma.memidx),
                    ValidationError::InvalidMemIndex(ma.memidx),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(io_valtype(ty));
            }
            Instr::Store(ty, _, ma) => {
                self.require(
                    self.ctx.memory_exists(ma.memidx),
                    ValidationError::InvalidMemIndex(ma.memidx),
                )?;
                self.pop_valtype(io_valtype(ty))?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::MemorySize(idx) => {
                self.require(
                    self.ctx.memory_exists(idx),
                    ValidationError::InvalidMemIndex(idx),
                )?;
                self.push_valtype(ValueType::I32);
            }
            Instr::MemoryGrow(idx) => {
                self.require(
                    self.ctx.memory_exists(idx),
                    ValidationError::InvalidMemIndex(idx),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(ValueType::I32);
            }
            Instr::MemoryFill(idx) => {
                self.require(
                    self.ctx.memory_exists(idx),
                    ValidationError::InvalidMemIndex(idx),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::MemoryCopy { dst, src } => {
                self.require(
                    self.ctx.memory_exists(dst) && self.ctx.memory_exists(src),
                    ValidationError::InvalidMemIndex(dst),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::MemoryInit { mem, data } => {
                self.require(
                    self.ctx.memory_exists(mem),
                    ValidationError::InvalidMemIndex(mem),
                )?;
                self.record_data_idx(data)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::DataDrop(idx) => self.record_data_idx(idx)?,

            Instr::I32Const(_) => self.push_valtype(ValueType::I32),
            Instr::I64Const(_) => self.push_valtype(ValueType::I64),
            Instr::F32Const(_) => self.push_valtype(ValueType::F32),
            Instr::F64Const(_) => self.push_valtype(ValueType::F64),

            Instr::ITestOp(ty, IntTestOp::Eqz) => {
                self.pop_valtype(int_valtype(ty))?;
                self.push_valtype(ValueType::I32);
            }
            Instr::IRelOp(ty, _) => {
                self.pop_valtype(int_valtype(ty))?;
                self.pop_valtype(int_valtype(ty))?;
                self.push_valtype(ValueType::I32);
            }
            Instr::IUnOp(ty, _) => {
                self.pop_valtype(int_valtype(ty))?;
                self.push_valtype(int_valtype(ty));
            }
            Instr::IBinOp(ty, op) => {
                self.pop_valtype(int_valtype(ty))?;
                self.pop_valtype(int_valtype(ty))?;
                let _ = op;
                self.push_valtype(int_valtype(ty));
            }
            Instr::FRelOp(ty, _) => {
                self.pop_valtype(float_valtype(ty))?;
                self.pop_valtype(float_valtype(ty))?;
                self.push_valtype(ValueType::I32);
            }
            Instr::FUnOp(ty, _) => {
                self.pop_valtype(float_valtype(ty))?;
                self.push_valtype(float_valtype(ty));
            }
            Instr::FBinOp(ty, op) => {
                self.pop_valtype(float_valtype(ty))?;
                self.pop_valtype(float_valtype(ty))?;
                let _ = op;
                self.push_valtype(float_valtype(ty));
            }
            Instr::Cvt(cvt) => {
                let (from, to) = cvt_io(cvt);
                self.pop_valtype(from)?;
                self.push_valtype(to);
            }

            Instr::RefNull(rt) => self.push_valtype(rt.value_type()),
            Instr::RefIsNull => {
                let popped = self.pop_any()?;
                if let Popped::Type(t) = popped {
                    self.require(t.is_reftype(), ValidationError::ExpectedReftype)?;
                }
                self.push_valtype(ValueType::I32);
            }
            Instr::RefFunc(idx) => {
                self.require(
                    self.ctx.func_type_of(idx).is_some(),
                    ValidationError::InvalidFuncIndex(idx),
                )?;
                self.push_valtype(ValueType::FuncRef);
            }

            Instr::MemoryAtomicWait { ty, arg } => {
                self.require(
                    self.ctx.memory_exists(arg.memidx),
                    ValidationError::InvalidMemIndex(arg.memidx),
                )?;
                self.pop_valtype(ValueType::I64)?;
                self.pop_valtype(int_valtype(ty))?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(ValueType::I32);
            }
            Instr::MemoryAtomicNotify { arg } => {
                self.require(
                    self.ctx.memory_exists(arg.memidx),
                    ValidationError::InvalidMemIndex(arg.memidx),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(ValueType::I32);
            }
            Instr::AtomicRmw(ty, _, arg) | Instr::AtomicCmpxchg(ty, arg) => {
                self.require(
                    self.ctx.memory_exists(arg.memidx),
                    ValidationError::InvalidMemIndex(arg.memidx),
                )?;
                if matches!(instr, Instr::AtomicCmpxchg(..)) {
                    self.pop_valtype(int_valtype(ty))?; // replacement
                }
                self.pop_valtype(int_valtype(ty))?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(int_valtype(ty));
            }
            Instr::AtomicLoad(ty, arg) => {
                self.require(
                    self.ctx.memory_exists(arg.memidx),
                    ValidationError::InvalidMemIndex(arg.memidx),
                )?;
                self.pop_valtype(ValueType::I32)?;
                self.push_valtype(int_valtype(ty));
            }
            Instr::AtomicStore(ty, arg) => {
                self.require(
                    self.ctx.memory_exists(arg.memidx),
                    ValidationError::InvalidMemIndex(arg.memidx),
                )?;
                self.pop_valtype(int_valtype(ty))?;
                self.pop_valtype(ValueType::I32)?;
            }
            Instr::AtomicFence => {}
        }
        Ok(())
    }

    /// Shared logic for `br`/`br_if`: if the target is a `loop`, the backward-branch target PC
    /// is already known (the loop's own pc) so we can resolve it immediately; otherwise we defer
    /// until the target frame's `end` by recording a pending jump slot.
    fn record_branch(
        &mut self,
        pc: Pc,
        labelidx: LabelIdx,
        label_types: &[ValueType],
    ) -> Result<(), ValidationError> {
        let target = self.resolve_or_defer(pc, labelidx, label_types, jumptable::Slot::Br)?;
        self.jump_table.set(pc, BranchInfo::Br(target));
        Ok(())
    }

    /// Returns the resolved [`Target`] for `labelidx` if it points at a `loop` (backward branch,
    /// known immediately), otherwise registers `(pc, slot)` as pending on the target frame and
    /// returns a placeholder that [`JumpTable::patch_forward_target`] will overwrite once the
    /// frame's `end` is reached.
    fn resolve_or_defer(
        &mut self,
        pc: Pc,
        labelidx: LabelIdx,
        label_types: &[ValueType],
        slot: jumptable::Slot,
    ) -> Result<Target, ValidationError> {
        let idx = self
            .cframes
            .len()
            .checked_sub(1 + labelidx as usize)
            .ok_or(ValidationError::InvalidLabel(labelidx))?;
        let frame = &mut self.cframes[idx];
        if frame.kind == frame::CtrlFrameKind::Loop {
            let loop_pc = frame.pc.expect("loop frame always has a pc");
            Ok(Target {
                pc: loop_pc,
                arity: label_types.len() as u32,
                height: frame.height,
            })
        } else {
            frame.pending_end_targets.push((pc, slot));
            Ok(Target {
                pc: Pc::MAX,
                arity: label_types.len() as u32,
                height: frame.height,
            })
        }
    }

    pub fn finish(self) -> Result<JumpTable, ValidationError> {
        // Constant expressions never push or pop control frames (`visit_const_expr` only
        // tracks the operand stack), so the implicit outer function frame from `new` is still
        // on top; nothing to check beyond what `visit_const_expr`'s `End` arm already verified.
        if !self.flags.const_expr {
            self.require(self.cframes.is_empty(), ValidationError::UnclosedBlock)?;
        }
        Ok(self.jump_table)
    }
}

fn int_valtype(ty: IntTy) -> ValueType {
    match ty {
        IntTy::I32 => ValueType::I32,
        IntTy::I64 => ValueType::I64,
    }
}

fn float_valtype(ty: FloatTy) -> ValueType {
    match ty {
        FloatTy::F32 => ValueType::F32,
        FloatTy::F64 => ValueType::F64,
    }
}

fn io_valtype(ty: IntOrFloatTy) -> ValueType {
    match ty {
        IntOrFloatTy::I32 => ValueType::I32,
        IntOrFloatTy::I64 => ValueType::I64,
        IntOrFloatTy::F32 => ValueType::F32,
        IntOrFloatTy::F64 => ValueType::F64,
    }
}

fn cvt_io(cvt: Cvt) -> (ValueType, ValueType) {
    use ValueType::*;
    match cvt {
        Cvt::I32WrapI64 => (I64, I32),
        Cvt::I64ExtendI32S | Cvt::I64ExtendI32U => (I32, I64),
        Cvt::I32TruncF32S | Cvt::I32TruncF32U | Cvt::I32TruncSatF32S | Cvt::I32TruncSatF32U => {
            (F32, I32)
        }
        Cvt::I32TruncF64S | Cvt::I32TruncF64U | Cvt::I32TruncSatF64S | Cvt::I32TruncSatF64U => {
            (F64, I32)
        }
        Cvt::I64TruncF32S | Cvt::I64TruncF32U | Cvt::I64TruncSatF32S | Cvt::I64TruncSatF32U => {
            (F32, I64)
        }
        Cvt::I64TruncF64S | Cvt::I64TruncF64U | Cvt::I64TruncSatF64S | Cvt::I64TruncSatF64U => {
            (F64, I64)
        }
        Cvt::F32ConvertI32S | Cvt::F32ConvertI32U => (I32, F32),
        Cvt::F32ConvertI64S | Cvt::F32ConvertI64U => (I64, F32),
        Cvt::F64ConvertI32S | Cvt::F64ConvertI32U => (I32, F64),
        Cvt::F64ConvertI64S | Cvt::F64ConvertI64U => (I64, F64),
        Cvt::F32DemoteF64 => (F64, F32),
        Cvt::F64PromoteF32 => (F32, F64),
        Cvt::I32ReinterpretF32 => (F32, I32),
        Cvt::I64ReinterpretF64 => (F64, I64),
        Cvt::F32ReinterpretI32 => (I32, F32),
        Cvt::F64ReinterpretI64 => (I64, F64),
        Cvt::I32Extend8S | Cvt::I32Extend16S => (I32, I32),
        Cvt::I64Extend8S | Cvt::I64Extend16S | Cvt::I64Extend32S => (I64, I64),
    }
}
