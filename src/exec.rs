//! The Executor (§4.3): a straight interpreter over the pc-indexed [`Instr`] stream the decoder
//! and validator produced, driven by the jump table the validator already built -- so taking a
//! branch is always an O(1) table lookup, never a re-walk of the control-frame stack.
//!
//! Design Notes records the one deliberate departure from the distilled design's explicit
//! `frames[]`/label-stack arrays: this interpreter keeps no runtime label stack and represents a
//! function activation as one nested Rust call, bounded by `depth` against `Config::max_frames`
//! exactly the way a fixed-size frame array would bound recursion. See DESIGN.md.

use alloc::format;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use waspvm_core::{
    pack_cells, unpack_cells, AtomicRmwOp, Cvt, FloatBinOp, FloatRelOp, FloatTy, FloatUnOp,
    Instr, IntBinOp, IntOrFloatTy, IntRelOp, IntTestOp, IntTy, IntUnOp, LoadWidth, Pc, StoreWidth,
    Trap, TrapCode, Val, F32, F64,
};
use waspvm_validation::{BranchInfo, JumpTable, Target};

use crate::atomics::deadline_from_relative_ns;
use crate::config::Config;
use crate::error::Error;
use crate::func::{FuncInst, HostFuncRef, WasmFuncRef};
use crate::instance::Instance;
use crate::memory::MemInst;
use crate::module::FuncDef;

/// What the dispatcher does once an instruction has run: fall through to `pc + 1`, jump to an
/// already-resolved target, or unwind the current activation with its top-of-stack results.
enum Next {
    Advance,
    Goto(Pc),
    Return,
}

/// The operand stack for one function activation, with a running cell count so
/// [`Config::max_stack_cells`] can be enforced without re-summing the whole stack on every push.
struct OperandStack {
    vals: Vec<Val>,
    cells: u32,
    max_cells: u32,
}

impl OperandStack {
    fn new(max_cells: u32) -> Self {
        OperandStack {
            vals: Vec::new(),
            cells: 0,
            max_cells,
        }
    }

    fn push(&mut self, v: Val) -> Result<(), Trap> {
        let cells = self.cells + v.cells();
        if cells > self.max_cells {
            return Err(Trap::from(TrapCode::TooManyStackVals));
        }
        self.cells = cells;
        self.vals.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Val {
        let v = self
            .vals
            .pop()
            .expect("operand stack underflow: validated code guarantees sufficient operands");
        self.cells -= v.cells();
        v
    }

    fn pop_n(&mut self, n: usize) -> Vec<Val> {
        let start = self.vals.len() - n;
        let popped = self.vals.split_off(start);
        self.cells -= popped.iter().map(Val::cells).sum::<u32>();
        popped
    }

    fn len(&self) -> usize {
        self.vals.len()
    }

    /// Takes a resolved branch: keeps the top `target.arity` values (the label's results) and
    /// discards everything above `target.height`, sliding those results down to sit directly on
    /// top of it. This is the entire runtime cost of a structured branch.
    fn branch_to(&mut self, target: Target) {
        let arity = target.arity as usize;
        let top = self.vals.len();
        let tail_start = top - arity;
        let discarded: u32 = self.vals[target.height..tail_start]
            .iter()
            .map(Val::cells)
            .sum();
        self.vals.copy_within(tail_start..top, target.height);
        self.vals.truncate(target.height + arity);
        self.cells -= discarded;
    }
}

/// One interpreter: owns no state across calls except the instance it is bound to, the resource
/// limits it enforces, and the current nesting depth. Cheap to create; a host typically makes
/// one per logical "thread of execution" and reuses it across many [`ExecContext::call`]s.
pub struct ExecContext {
    instance: Arc<Instance>,
    config: Config,
    depth: u32,
}

impl ExecContext {
    pub fn new(instance: Arc<Instance>, config: Config) -> Self {
        ExecContext {
            instance,
            config,
            depth: 0,
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Invokes combined function index `func_idx` (Wasm-defined or host) against this context's
    /// instance, returning its results or whatever stopped it.
    pub fn call(&mut self, func_idx: u32, args: &[Val]) -> Result<Vec<Val>, Error> {
        let func = self.instance.func(func_idx).clone();
        self.invoke(&func, args).map_err(Error::from)
    }

    /// Invokes an already-resolved [`FuncInst`] -- the entry point host functions use to call
    /// back into Wasm (e.g. a callback table).
    pub fn invoke(&mut self, func: &FuncInst, args: &[Val]) -> Result<Vec<Val>, Trap> {
        self.check_interrupt()?;
        if self.depth >= self.config.max_frames {
            return Err(Trap::from(TrapCode::TooManyFrames));
        }
        self.depth += 1;
        let result = match func {
            FuncInst::Wasm(w) => self.run_wasm(w, args),
            FuncInst::Host(h) => self.run_host(h, args),
        };
        self.depth -= 1;
        result
    }

    fn check_interrupt(&self) -> Result<(), Trap> {
        if self.instance.interrupt_requested() {
            return Err(Trap::new(TrapCode::Misc, "execution interrupted"));
        }
        Ok(())
    }

    fn run_host(&mut self, host: &HostFuncRef, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let params = pack_cells(args);
        let mut results = vec![0u32; waspvm_core::num_cells(host.ty.results()) as usize];
        (host.func)(self, &params, &mut results)?;
        Ok(unpack_cells(host.ty.results(), &results))
    }

    fn run_wasm(&mut self, wasm: &WasmFuncRef, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let instance = wasm
            .instance
            .upgrade()
            .expect("FuncInst outlived its owning Instance");
        let imported = instance.module().num_imported_funcs();
        let def = instance.module().funcs[wasm.func_idx as usize - imported].clone();
        self.exec_body(&instance, &def, args)
    }

    /// Runs one function body start to finish: allocates locals, drives the pc-indexed
    /// instruction loop, and returns the top `results.len()` operand-stack values once the
    /// function's own final `end` (or an explicit `return`) is reached.
    fn exec_body(&mut self, instance: &Arc<Instance>, def: &FuncDef, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let func_type = instance
            .module()
            .func_type(def.type_idx)
            .expect("type_idx valid by construction")
            .clone();

        let mut locals: Vec<Val> = Vec::with_capacity(func_type.params().len() + def.body.locals.len());
        locals.extend_from_slice(args);
        locals.extend(def.body.locals.iter().map(|&ty| Val::default_for(ty)));

        let mut stack = OperandStack::new(self.config.max_stack_cells);
        let instrs = &def.body.instrs;
        let jump_table = &def.jump_table;
        let mut pc: Pc = 0;

        loop {
            self.check_interrupt()?;
            let instr = &instrs[pc as usize];
            match self.step(instance, &mut locals, &mut stack, jump_table, instrs, pc, instr)? {
                Next::Advance => pc += 1,
                Next::Goto(target) => pc = target,
                Next::Return => {
                    let n = func_type.results().len();
                    return Ok(stack.pop_n(n));
                }
            }
        }
    }

    /// Dispatches one [`Instr`]. Returns what the caller's instruction loop should do next;
    /// traps propagate with `?` exactly as they do from every other part of the interpreter.
    #[allow(clippy::too_many_arguments)]
    fn step(
        &mut self,
        instance: &Arc<Instance>,
        locals: &mut [Val],
        stack: &mut OperandStack,
        jump_table: &JumpTable,
        instrs: &[Instr],
        pc: Pc,
        instr: &Instr,
    ) -> Result<Next, Trap> {
        match instr {
            Instr::Unreachable => return Err(Trap::from(TrapCode::Unreachable)),
            Instr::Nop | Instr::Block(_) | Instr::Loop(_) => {}

            Instr::If(_) => {
                let cond = stack.pop().as_i32().expect("validated i32 condition");
                if cond == 0 {
                    let target = match jump_table.get(pc) {
                        Some(BranchInfo::IfElse(t)) => *t,
                        _ => unreachable!("if has a resolved IfElse jump-table entry"),
                    };
                    return Ok(self.goto(stack, instrs, target));
                }
            }
            Instr::Else => {
                let target = match jump_table.get(pc) {
                    Some(BranchInfo::ElseEnd(t)) => *t,
                    _ => unreachable!("else has a resolved ElseEnd jump-table entry"),
                };
                return Ok(self.goto(stack, instrs, target));
            }
            Instr::End => {
                if pc as usize + 1 == instrs.len() {
                    return Ok(Next::Return);
                }
            }

            Instr::Br(_) => {
                let target = match jump_table.get(pc) {
                    Some(BranchInfo::Br(t)) => *t,
                    _ => unreachable!("br has a resolved Br jump-table entry"),
                };
                return Ok(self.goto(stack, instrs, target));
            }
            Instr::BrIf(_) => {
                let cond = stack.pop().as_i32().expect("validated i32 condition");
                if cond != 0 {
                    let target = match jump_table.get(pc) {
                        Some(BranchInfo::Br(t)) => *t,
                        _ => unreachable!("br_if has a resolved Br jump-table entry"),
                    };
                    return Ok(self.goto(stack, instrs, target));
                }
            }
            Instr::BrTable(_, _) => {
                let idx = stack.pop().as_i32().expect("validated i32 index") as u32;
                let (targets, default) = match jump_table.get(pc) {
                    Some(BranchInfo::Table { targets, default }) => (targets, *default),
                    _ => unreachable!("br_table has a resolved Table jump-table entry"),
                };
                let target = targets.get(idx as usize).copied().unwrap_or(default);
                return Ok(self.goto(stack, instrs, target));
            }
            Instr::Return => return Ok(Next::Return),

            Instr::Call(func_idx) => {
                let func = instance.func(*func_idx).clone();
                let nparams = func.ty().params().len();
                let args = stack.pop_n(nparams);
                let results = self.invoke(&func, &args)?;
                for v in results {
                    stack.push(v)?;
                }
            }
            Instr::CallIndirect { type_idx, table_idx } => {
                let elem_idx = stack.pop().as_i32().expect("validated i32 index") as u32;
                let expected_ty = instance
                    .module()
                    .func_type(*type_idx)
                    .expect("type_idx valid by construction")
                    .clone();
                let table = instance.table(*table_idx);
                let elem = {
                    let table = table.lock().unwrap_or_else(|e| e.into_inner());
                    if elem_idx >= table.len() {
                        return Err(Trap::from(TrapCode::CallIndirectOutOfBoundsTableAccess));
                    }
                    table.get(elem_idx).expect("index checked above")
                };
                let func_idx = match elem {
                    Val::FuncRef(Some(idx)) => idx,
                    Val::FuncRef(None) => return Err(Trap::from(TrapCode::CallIndirectNullFuncref)),
                    _ => unreachable!("call_indirect table holds funcrefs, validated"),
                };
                let func = instance.func(func_idx).clone();
                if func.ty() != expected_ty {
                    return Err(Trap::from(TrapCode::CallIndirectFuncTypeMismatch));
                }
                let nparams = expected_ty.params().len();
                let args = stack.pop_n(nparams);
                let results = self.invoke(&func, &args)?;
                for v in results {
                    stack.push(v)?;
                }
            }

            Instr::Drop => {
                stack.pop();
            }
            Instr::Select | Instr::SelectTyped(_) => {
                let cond = stack.pop().as_i32().expect("validated i32 condition");
                let val2 = stack.pop();
                let val1 = stack.pop();
                stack.push(if cond != 0 { val1 } else { val2 })?;
            }

            Instr::LocalGet(idx) => stack.push(locals[*idx as usize])?,
            Instr::LocalSet(idx) => locals[*idx as usize] = stack.pop(),
            Instr::LocalTee(idx) => {
                let v = stack.pop();
                locals[*idx as usize] = v;
                stack.push(v)?;
            }
            Instr::GlobalGet(idx) => {
                let v = instance.global(*idx).lock().unwrap_or_else(|e| e.into_inner()).get();
                stack.push(v)?;
            }
            Instr::GlobalSet(idx) => {
                let v = stack.pop();
                instance
                    .global(*idx)
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .set(v)
                    .expect("validator rejects global.set of an immutable global");
            }

            Instr::TableGet(idx) => {
                let addr = stack.pop().as_i32().expect("validated i32 address") as u32;
                let t = instance.table(*idx).lock().unwrap_or_else(|e| e.into_inner());
                stack.push(t.get(addr)?)?;
            }
            Instr::TableSet(idx) => {
                let value = stack.pop();
                let addr = stack.pop().as_i32().expect("validated i32 address") as u32;
                instance
                    .table(*idx)
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .set(addr, value)?;
            }
            Instr::TableSize(idx) => {
                let n = instance.table(*idx).lock().unwrap_or_else(|e| e.into_inner()).len();
                stack.push(Val::I32(n as i32))?;
            }
            Instr::TableGrow(idx) => {
                let n = stack.pop().as_i32().expect("validated i32 delta") as u32;
                let fill = stack.pop();
                let prev = instance
                    .table(*idx)
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .grow(n, fill);
                stack.push(Val::I32(prev as i32))?;
            }
            Instr::TableFill(idx) => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let value = stack.pop();
                let addr = stack.pop().as_i32().expect("validated i32 address") as u32;
                instance
                    .table(*idx)
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .fill(addr, value, n)?;
            }
            Instr::TableCopy { dst, src } => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let src_addr = stack.pop().as_i32().expect("validated i32 src") as u32;
                let dst_addr = stack.pop().as_i32().expect("validated i32 dst") as u32;
                table_copy(instance, *dst, *src, dst_addr, src_addr, n)?;
            }
            Instr::TableInit { table, elem } => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let src_addr = stack.pop().as_i32().expect("validated i32 src") as u32;
                let dst_addr = stack.pop().as_i32().expect("validated i32 dst") as u32;
                let items = instance.elem_segment(*elem).unwrap_or_else(|| Arc::from([]));
                let src_end = (src_addr as u64)
                    .checked_add(n as u64)
                    .filter(|&e| e <= items.len() as u64)
                    .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsElementAccess))?;
                let mut t = instance.table(*table).lock().unwrap_or_else(|e| e.into_inner());
                for (i, &v) in items[src_addr as usize..src_end as usize].iter().enumerate() {
                    let dst = dst_addr
                        .checked_add(i as u32)
                        .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
                    t.set(dst, v)?;
                }
            }
            Instr::ElemDrop(idx) => instance.drop_elem_segment(*idx),

            Instr::Load(ty, width, arg) => {
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let mem = instance.memory(arg.memidx);
                let v = load_value(mem, *ty, *width, base, arg.offset)?;
                stack.push(v)?;
            }
            Instr::Store(ty, width, arg) => {
                let value = stack.pop();
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let mem = instance.memory(arg.memidx);
                store_value(mem, *ty, *width, base, arg.offset, value)?;
            }
            Instr::MemorySize(idx) => {
                stack.push(Val::I32(instance.memory(*idx).current_pages() as i32))?;
            }
            Instr::MemoryGrow(idx) => {
                let n = stack.pop().as_i32().expect("validated i32 delta") as u32;
                let prev = instance.memory(*idx).grow(n);
                stack.push(Val::I32(prev as i32))?;
            }
            Instr::MemoryFill(idx) => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let value = stack.pop().as_i32().expect("validated i32 value") as u8;
                let dst = stack.pop().as_i32().expect("validated i32 dst") as u32;
                instance.memory(*idx).fill(dst, value, n)?;
            }
            Instr::MemoryCopy { dst, src } => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let src_addr = stack.pop().as_i32().expect("validated i32 src") as u32;
                let dst_addr = stack.pop().as_i32().expect("validated i32 dst") as u32;
                let src_mem = instance.memory(*src);
                instance.memory(*dst).copy_from(dst_addr, src_mem, src_addr, n)?;
            }
            Instr::MemoryInit { mem, data } => {
                let n = stack.pop().as_i32().expect("validated i32 length") as u32;
                let src_addr = stack.pop().as_i32().expect("validated i32 src") as u32;
                let dst_addr = stack.pop().as_i32().expect("validated i32 dst") as u32;
                let bytes = instance.data_segment(*data).cloned().unwrap_or_else(|| Arc::from([]));
                instance.memory(*mem).init_from(dst_addr, &bytes, src_addr, n)?;
            }
            Instr::DataDrop(idx) => instance.drop_data_segment(*idx),

            Instr::I32Const(v) => stack.push(Val::I32(*v))?,
            Instr::I64Const(v) => stack.push(Val::I64(*v))?,
            Instr::F32Const(bits) => stack.push(Val::F32(F32::from_bits(*bits)))?,
            Instr::F64Const(bits) => stack.push(Val::F64(F64::from_bits(*bits)))?,

            Instr::ITestOp(ty, op) => {
                let v = int_testop(*ty, *op, stack.pop());
                stack.push(v)?;
            }
            Instr::IRelOp(ty, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(int_relop(*ty, *op, a, b))?;
            }
            Instr::IUnOp(ty, op) => {
                let v = int_unop(*ty, *op, stack.pop());
                stack.push(v)?;
            }
            Instr::IBinOp(ty, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(int_binop(*ty, *op, a, b)?)?;
            }
            Instr::FRelOp(ty, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(float_relop(*ty, *op, a, b))?;
            }
            Instr::FUnOp(ty, op) => {
                let v = float_unop(*ty, *op, stack.pop());
                stack.push(v)?;
            }
            Instr::FBinOp(ty, op) => {
                let b = stack.pop();
                let a = stack.pop();
                stack.push(float_binop(*ty, *op, a, b))?;
            }
            Instr::Cvt(cvt) => {
                let v = eval_cvt(*cvt, stack.pop())?;
                stack.push(v)?;
            }

            Instr::RefNull(rt) => stack.push(Val::default_for(rt.value_type()))?,
            Instr::RefIsNull => {
                let is_null = matches!(stack.pop(), Val::FuncRef(None) | Val::ExternRef(None));
                stack.push(Val::I32(is_null as i32))?;
            }
            Instr::RefFunc(idx) => stack.push(Val::FuncRef(Some(*idx)))?,

            Instr::MemoryAtomicWait { ty, arg } => {
                let timeout_ns = stack.pop().as_i64().expect("validated i64 timeout");
                let expected = stack.pop();
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let result = atomic_wait(instance, *ty, arg.memidx, arg.offset, base, expected, timeout_ns)?;
                stack.push(Val::I32(result))?;
            }
            Instr::MemoryAtomicNotify { arg } => {
                let count = stack.pop().as_i32().expect("validated i32 count") as u32;
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let result = atomic_notify(instance, arg.memidx, arg.offset, base, count)?;
                stack.push(Val::I32(result as i32))?;
            }
            Instr::AtomicRmw(ty, op, arg) => {
                let operand = stack.pop();
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let old = atomic_rmw(instance.memory(arg.memidx), *ty, *op, base, arg.offset, operand)?;
                stack.push(old)?;
            }
            Instr::AtomicCmpxchg(ty, arg) => {
                let replacement = stack.pop();
                let expected = stack.pop();
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let old = atomic_cmpxchg(instance.memory(arg.memidx), *ty, base, arg.offset, expected, replacement)?;
                stack.push(old)?;
            }
            Instr::AtomicLoad(ty, arg) => {
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                let v = atomic_load(instance.memory(arg.memidx), *ty, base, arg.offset)?;
                stack.push(v)?;
            }
            Instr::AtomicStore(ty, arg) => {
                let value = stack.pop();
                let base = stack.pop().as_i32().expect("validated i32 address") as u32;
                atomic_store(instance.memory(arg.memidx), *ty, base, arg.offset, value)?;
            }
            Instr::AtomicFence => core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst),
        }
        Ok(Next::Advance)
    }

    /// Applies a resolved branch target to the operand stack and turns it into the `Next` the
    /// caller's instruction loop acts on, collapsing the "branch lands past the function's own
    /// last instruction" case (a `br` to the outermost implicit function label, equivalent to
    /// `return`) into the same `Next::Return` path an explicit `return` takes.
    fn goto(&self, stack: &mut OperandStack, instrs: &[Instr], target: Target) -> Next {
        stack.branch_to(target);
        if target.pc as usize >= instrs.len() {
            Next::Return
        } else {
            Next::Goto(target.pc)
        }
    }
}

fn table_copy(instance: &Arc<Instance>, dst_idx: u32, src_idx: u32, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
    if dst_idx == src_idx {
        let t = instance.table(dst_idx);
        return t.lock().unwrap_or_else(|e| e.into_inner()).copy_within(dst, src, len);
    }
    // Distinct tables: lock in a fixed index order regardless of which is dst/src so two
    // concurrent `table.copy` calls between the same pair of tables can never deadlock.
    let (lo_idx, hi_idx) = if dst_idx < src_idx { (dst_idx, src_idx) } else { (src_idx, dst_idx) };
    let lo = instance.table(lo_idx);
    let hi = instance.table(hi_idx);
    let mut lo_guard = lo.lock().unwrap_or_else(|e| e.into_inner());
    let mut hi_guard = hi.lock().unwrap_or_else(|e| e.into_inner());
    if dst_idx < src_idx {
        lo_guard.copy_from(dst, &hi_guard, src, len)
    } else {
        hi_guard.copy_from(dst, &lo_guard, src, len)
    }
}

fn read_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_u64_le(buf: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[..8]);
    u64::from_le_bytes(b)
}

fn load_value(mem: &MemInst, ty: IntOrFloatTy, width: LoadWidth, base: u32, offset: u64) -> Result<Val, Trap> {
    use LoadWidth as W;
    let mut buf = [0u8; 8];
    let v = match (ty, width) {
        (IntOrFloatTy::I32, W::Full) => {
            mem.read(base, offset, &mut buf[..4])?;
            Val::I32(read_u32_le(&buf) as i32)
        }
        (IntOrFloatTy::I32, W::I32_8S) => {
            mem.read(base, offset, &mut buf[..1])?;
            Val::I32(buf[0] as i8 as i32)
        }
        (IntOrFloatTy::I32, W::I32_8U) => {
            mem.read(base, offset, &mut buf[..1])?;
            Val::I32(buf[0] as i32)
        }
        (IntOrFloatTy::I32, W::I32_16S) => {
            mem.read(base, offset, &mut buf[..2])?;
            Val::I32(i16::from_le_bytes([buf[0], buf[1]]) as i32)
        }
        (IntOrFloatTy::I32, W::I32_16U) => {
            mem.read(base, offset, &mut buf[..2])?;
            Val::I32(u16::from_le_bytes([buf[0], buf[1]]) as i32)
        }
        (IntOrFloatTy::I64, W::Full) => {
            mem.read(base, offset, &mut buf[..8])?;
            Val::I64(read_u64_le(&buf) as i64)
        }
        (IntOrFloatTy::I64, W::I64_8S) => {
            mem.read(base, offset, &mut buf[..1])?;
            Val::I64(buf[0] as i8 as i64)
        }
        (IntOrFloatTy::I64, W::I64_8U) => {
            mem.read(base, offset, &mut buf[..1])?;
            Val::I64(buf[0] as i64)
        }
        (IntOrFloatTy::I64, W::I64_16S) => {
            mem.read(base, offset, &mut buf[..2])?;
            Val::I64(i16::from_le_bytes([buf[0], buf[1]]) as i64)
        }
        (IntOrFloatTy::I64, W::I64_16U) => {
            mem.read(base, offset, &mut buf[..2])?;
            Val::I64(u16::from_le_bytes([buf[0], buf[1]]) as i64)
        }
        (IntOrFloatTy::I64, W::I64_32S) => {
            mem.read(base, offset, &mut buf[..4])?;
            Val::I64(read_u32_le(&buf) as i32 as i64)
        }
        (IntOrFloatTy::I64, W::I64_32U) => {
            mem.read(base, offset, &mut buf[..4])?;
            Val::I64(read_u32_le(&buf) as i64)
        }
        (IntOrFloatTy::F32, W::Full) => {
            mem.read(base, offset, &mut buf[..4])?;
            Val::F32(F32::from_bits(read_u32_le(&buf)))
        }
        (IntOrFloatTy::F64, W::Full) => {
            mem.read(base, offset, &mut buf[..8])?;
            Val::F64(F64::from_bits(read_u64_le(&buf)))
        }
        _ => unreachable!("validator rejects width/type combinations other than these"),
    };
    Ok(v)
}

fn store_value(mem: &MemInst, ty: IntOrFloatTy, width: StoreWidth, base: u32, offset: u64, value: Val) -> Result<(), Trap> {
    use StoreWidth as W;
    match (ty, width, value) {
        (IntOrFloatTy::I32, W::Full, Val::I32(v)) => mem.write(base, offset, &v.to_le_bytes()),
        (IntOrFloatTy::I32, W::Low8, Val::I32(v)) => mem.write(base, offset, &(v as u8).to_le_bytes()),
        (IntOrFloatTy::I32, W::Low16, Val::I32(v)) => mem.write(base, offset, &(v as u16).to_le_bytes()),
        (IntOrFloatTy::I64, W::Full, Val::I64(v)) => mem.write(base, offset, &v.to_le_bytes()),
        (IntOrFloatTy::I64, W::Low8, Val::I64(v)) => mem.write(base, offset, &(v as u8).to_le_bytes()),
        (IntOrFloatTy::I64, W::Low16, Val::I64(v)) => mem.write(base, offset, &(v as u16).to_le_bytes()),
        (IntOrFloatTy::I64, W::Low32, Val::I64(v)) => mem.write(base, offset, &(v as u32).to_le_bytes()),
        (IntOrFloatTy::F32, W::Full, Val::F32(v)) => mem.write(base, offset, &v.to_bits().to_le_bytes()),
        (IntOrFloatTy::F64, W::Full, Val::F64(v)) => mem.write(base, offset, &v.to_bits().to_le_bytes()),
        _ => unreachable!("validator rejects width/type/value combinations other than these"),
    }
}

fn int_testop(ty: IntTy, op: IntTestOp, v: Val) -> Val {
    let IntTestOp::Eqz = op;
    match ty {
        IntTy::I32 => Val::I32((v.as_i32().expect("validated i32") == 0) as i32),
        IntTy::I64 => Val::I32((v.as_i64().expect("validated i64") == 0) as i32),
    }
}

fn int_relop(ty: IntTy, op: IntRelOp, a: Val, b: Val) -> Val {
    let r = match ty {
        IntTy::I32 => {
            let (a, b) = (a.as_i32().expect("validated i32"), b.as_i32().expect("validated i32"));
            let (ua, ub) = (a as u32, b as u32);
            match op {
                IntRelOp::Eq => a == b,
                IntRelOp::Ne => a != b,
                IntRelOp::LtS => a < b,
                IntRelOp::LtU => ua < ub,
                IntRelOp::GtS => a > b,
                IntRelOp::GtU => ua > ub,
                IntRelOp::LeS => a <= b,
                IntRelOp::LeU => ua <= ub,
                IntRelOp::GeS => a >= b,
                IntRelOp::GeU => ua >= ub,
            }
        }
        IntTy::I64 => {
            let (a, b) = (a.as_i64().expect("validated i64"), b.as_i64().expect("validated i64"));
            let (ua, ub) = (a as u64, b as u64);
            match op {
                IntRelOp::Eq => a == b,
                IntRelOp::Ne => a != b,
                IntRelOp::LtS => a < b,
                IntRelOp::LtU => ua < ub,
                IntRelOp::GtS => a > b,
                IntRelOp::GtU => ua > ub,
                IntRelOp::LeS => a <= b,
                IntRelOp::LeU => ua <= ub,
                IntRelOp::GeS => a >= b,
                IntRelOp::GeU => ua >= ub,
            }
        }
    };
    Val::I32(r as i32)
}

fn int_unop(ty: IntTy, op: IntUnOp, v: Val) -> Val {
    match ty {
        IntTy::I32 => {
            let v = v.as_i32().expect("validated i32");
            let r = match op {
                IntUnOp::Clz => v.leading_zeros() as i32,
                IntUnOp::Ctz => v.trailing_zeros() as i32,
                IntUnOp::Popcnt => v.count_ones() as i32,
            };
            Val::I32(r)
        }
        IntTy::I64 => {
            let v = v.as_i64().expect("validated i64");
            let r = match op {
                IntUnOp::Clz => v.leading_zeros() as i64,
                IntUnOp::Ctz => v.trailing_zeros() as i64,
                IntUnOp::Popcnt => v.count_ones() as i64,
            };
            Val::I64(r)
        }
    }
}

fn int_binop(ty: IntTy, op: IntBinOp, a: Val, b: Val) -> Result<Val, Trap> {
    Ok(match ty {
        IntTy::I32 => {
            let (a, b) = (a.as_i32().expect("validated i32"), b.as_i32().expect("validated i32"));
            Val::I32(match op {
                IntBinOp::Add => a.wrapping_add(b),
                IntBinOp::Sub => a.wrapping_sub(b),
                IntBinOp::Mul => a.wrapping_mul(b),
                IntBinOp::DivS => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    if a == i32::MIN && b == -1 {
                        return Err(Trap::from(TrapCode::IntegerOverflow));
                    }
                    a.wrapping_div(b)
                }
                IntBinOp::DivU => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    ((a as u32) / (b as u32)) as i32
                }
                IntBinOp::RemS => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    if a == i32::MIN && b == -1 {
                        0
                    } else {
                        a.wrapping_rem(b)
                    }
                }
                IntBinOp::RemU => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    ((a as u32) % (b as u32)) as i32
                }
                IntBinOp::And => a & b,
                IntBinOp::Or => a | b,
                IntBinOp::Xor => a ^ b,
                IntBinOp::Shl => a.wrapping_shl(b as u32),
                IntBinOp::ShrS => a.wrapping_shr(b as u32),
                IntBinOp::ShrU => (a as u32).wrapping_shr(b as u32) as i32,
                IntBinOp::Rotl => a.rotate_left(b as u32),
                IntBinOp::Rotr => a.rotate_right(b as u32),
            })
        }
        IntTy::I64 => {
            let (a, b) = (a.as_i64().expect("validated i64"), b.as_i64().expect("validated i64"));
            Val::I64(match op {
                IntBinOp::Add => a.wrapping_add(b),
                IntBinOp::Sub => a.wrapping_sub(b),
                IntBinOp::Mul => a.wrapping_mul(b),
                IntBinOp::DivS => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    if a == i64::MIN && b == -1 {
                        return Err(Trap::from(TrapCode::IntegerOverflow));
                    }
                    a.wrapping_div(b)
                }
                IntBinOp::DivU => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    ((a as u64) / (b as u64)) as i64
                }
                IntBinOp::RemS => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    if a == i64::MIN && b == -1 {
                        0
                    } else {
                        a.wrapping_rem(b)
                    }
                }
                IntBinOp::RemU => {
                    if b == 0 {
                        return Err(Trap::from(TrapCode::DivByZero));
                    }
                    ((a as u64) % (b as u64)) as i64
                }
                IntBinOp::And => a & b,
                IntBinOp::Or => a | b,
                IntBinOp::Xor => a ^ b,
                IntBinOp::Shl => a.wrapping_shl(b as u32),
                IntBinOp::ShrS => a.wrapping_shr(b as u32),
                IntBinOp::ShrU => (a as u64).wrapping_shr(b as u32) as i64,
                IntBinOp::Rotl => a.rotate_left(b as u32),
                IntBinOp::Rotr => a.rotate_right(b as u32),
            })
        }
    })
}

fn as_float(ty: FloatTy, v: Val) -> FloatVal {
    match ty {
        FloatTy::F32 => FloatVal::F32(v.as_f32().expect("validated f32")),
        FloatTy::F64 => FloatVal::F64(v.as_f64().expect("validated f64")),
    }
}

/// A tiny local sum type so the float op helpers below can stay generic over `F32`/`F64` without
/// duplicating each match arm per width.
enum FloatVal {
    F32(F32),
    F64(F64),
}

fn float_relop(ty: FloatTy, op: FloatRelOp, a: Val, b: Val) -> Val {
    let r = match (as_float(ty, a), as_float(ty, b)) {
        (FloatVal::F32(a), FloatVal::F32(b)) => match op {
            FloatRelOp::Eq => a == b,
            FloatRelOp::Ne => a != b,
            FloatRelOp::Lt => a < b,
            FloatRelOp::Gt => a > b,
            FloatRelOp::Le => a <= b,
            FloatRelOp::Ge => a >= b,
        },
        (FloatVal::F64(a), FloatVal::F64(b)) => match op {
            FloatRelOp::Eq => a == b,
            FloatRelOp::Ne => a != b,
            FloatRelOp::Lt => a < b,
            FloatRelOp::Gt => a > b,
            FloatRelOp::Le => a <= b,
            FloatRelOp::Ge => a >= b,
        },
        _ => unreachable!("both operands share ty by construction"),
    };
    Val::I32(r as i32)
}

fn float_unop(ty: FloatTy, op: FloatUnOp, v: Val) -> Val {
    match as_float(ty, v) {
        FloatVal::F32(v) => Val::F32(match op {
            FloatUnOp::Abs => v.abs(),
            FloatUnOp::Neg => -v,
            FloatUnOp::Ceil => v.ceil(),
            FloatUnOp::Floor => v.floor(),
            FloatUnOp::Trunc => v.trunc(),
            FloatUnOp::Nearest => v.nearest(),
            FloatUnOp::Sqrt => v.sqrt(),
        }),
        FloatVal::F64(v) => Val::F64(match op {
            FloatUnOp::Abs => v.abs(),
            FloatUnOp::Neg => -v,
            FloatUnOp::Ceil => v.ceil(),
            FloatUnOp::Floor => v.floor(),
            FloatUnOp::Trunc => v.trunc(),
            FloatUnOp::Nearest => v.nearest(),
            FloatUnOp::Sqrt => v.sqrt(),
        }),
    }
}

fn float_binop(ty: FloatTy, op: FloatBinOp, a: Val, b: Val) -> Val {
    match (as_float(ty, a), as_float(ty, b)) {
        (FloatVal::F32(a), FloatVal::F32(b)) => Val::F32(match op {
            FloatBinOp::Add => a + b,
            FloatBinOp::Sub => a - b,
            FloatBinOp::Mul => a * b,
            FloatBinOp::Div => a / b,
            FloatBinOp::Min => a.min(b),
            FloatBinOp::Max => a.max(b),
            FloatBinOp::Copysign => a.copysign(b),
        }),
        (FloatVal::F64(a), FloatVal::F64(b)) => Val::F64(match op {
            FloatBinOp::Add => a + b,
            FloatBinOp::Sub => a - b,
            FloatBinOp::Mul => a * b,
            FloatBinOp::Div => a / b,
            FloatBinOp::Min => a.min(b),
            FloatBinOp::Max => a.max(b),
            FloatBinOp::Copysign => a.copysign(b),
        }),
        _ => unreachable!("both operands share ty by construction"),
    }
}

/// Non-saturating float-to-int truncation: traps on NaN or out-of-range rather than clamping.
/// `lo`/`hi` are the target integer range's bounds, expressed as `f64` (wide enough to exactly
/// represent every bound this runtime needs, including the `i64` ones).
fn trunc_checked(f: f64, lo: f64, hi: f64) -> Result<f64, Trap> {
    if f.is_nan() {
        return Err(Trap::new(TrapCode::InvalidConversionToInteger, "NaN has no integer value"));
    }
    let t = f.trunc();
    if t < lo || t >= hi {
        return Err(Trap::new(
            TrapCode::InvalidConversionToInteger,
            format!("{t} is outside the target integer range"),
        ));
    }
    Ok(t)
}

fn eval_cvt(cvt: Cvt, v: Val) -> Result<Val, Trap> {
    Ok(match cvt {
        Cvt::I32WrapI64 => Val::I32(v.as_i64().expect("validated i64") as i32),
        Cvt::I64ExtendI32S => Val::I64(v.as_i32().expect("validated i32") as i64),
        Cvt::I64ExtendI32U => Val::I64(v.as_i32().expect("validated i32") as u32 as i64),

        Cvt::I32TruncF32S => {
            let f = v.as_f32().expect("validated f32").to_float() as f64;
            Val::I32(trunc_checked(f, -2147483648.0, 2147483648.0)? as i32)
        }
        Cvt::I32TruncF32U => {
            let f = v.as_f32().expect("validated f32").to_float() as f64;
            Val::I32(trunc_checked(f, 0.0, 4294967296.0)? as u32 as i32)
        }
        Cvt::I32TruncF64S => {
            let f = v.as_f64().expect("validated f64").to_float();
            Val::I32(trunc_checked(f, -2147483648.0, 2147483648.0)? as i32)
        }
        Cvt::I32TruncF64U => {
            let f = v.as_f64().expect("validated f64").to_float();
            Val::I32(trunc_checked(f, 0.0, 4294967296.0)? as u32 as i32)
        }
        Cvt::I64TruncF32S => {
            let f = v.as_f32().expect("validated f32").to_float() as f64;
            Val::I64(trunc_checked(f, -9223372036854775808.0, 9223372036854775808.0)? as i64)
        }
        Cvt::I64TruncF32U => {
            let f = v.as_f32().expect("validated f32").to_float() as f64;
            Val::I64(trunc_checked(f, 0.0, 18446744073709551616.0)? as u64 as i64)
        }
        Cvt::I64TruncF64S => {
            let f = v.as_f64().expect("validated f64").to_float();
            Val::I64(trunc_checked(f, -9223372036854775808.0, 9223372036854775808.0)? as i64)
        }
        Cvt::I64TruncF64U => {
            let f = v.as_f64().expect("validated f64").to_float();
            Val::I64(trunc_checked(f, 0.0, 18446744073709551616.0)? as u64 as i64)
        }

        // Saturating variants: Rust's float-to-int `as` is itself defined as saturate-and-NaN-to-0
        // (Rust RFC 1218), which is exactly the `trunc_sat` contract, so no manual clamping needed.
        Cvt::I32TruncSatF32S => Val::I32(v.as_f32().expect("validated f32").to_float() as i32),
        Cvt::I32TruncSatF32U => Val::I32(v.as_f32().expect("validated f32").to_float() as u32 as i32),
        Cvt::I32TruncSatF64S => Val::I32(v.as_f64().expect("validated f64").to_float() as i32),
        Cvt::I32TruncSatF64U => Val::I32(v.as_f64().expect("validated f64").to_float() as u32 as i32),
        Cvt::I64TruncSatF32S => Val::I64(v.as_f32().expect("validated f32").to_float() as i64),
        Cvt::I64TruncSatF32U => Val::I64(v.as_f32().expect("validated f32").to_float() as u64 as i64),
        Cvt::I64TruncSatF64S => Val::I64(v.as_f64().expect("validated f64").to_float() as i64),
        Cvt::I64TruncSatF64U => Val::I64(v.as_f64().expect("validated f64").to_float() as u64 as i64),

        Cvt::F32ConvertI32S => Val::F32(F32::from_float(v.as_i32().expect("validated i32") as f32)),
        Cvt::F32ConvertI32U => Val::F32(F32::from_float(v.as_i32().expect("validated i32") as u32 as f32)),
        Cvt::F32ConvertI64S => Val::F32(F32::from_float(v.as_i64().expect("validated i64") as f32)),
        Cvt::F32ConvertI64U => Val::F32(F32::from_float(v.as_i64().expect("validated i64") as u64 as f32)),
        Cvt::F64ConvertI32S => Val::F64(F64::from_float(v.as_i32().expect("validated i32") as f64)),
        Cvt::F64ConvertI32U => Val::F64(F64::from_float(v.as_i32().expect("validated i32") as u32 as f64)),
        Cvt::F64ConvertI64S => Val::F64(F64::from_float(v.as_i64().expect("validated i64") as f64)),
        Cvt::F64ConvertI64U => Val::F64(F64::from_float(v.as_i64().expect("validated i64") as u64 as f64)),

        Cvt::F32DemoteF64 => Val::F32(F32::from_float(v.as_f64().expect("validated f64").to_float() as f32)),
        Cvt::F64PromoteF32 => Val::F64(F64::from_float(v.as_f32().expect("validated f32").to_float() as f64)),

        Cvt::I32ReinterpretF32 => Val::I32(v.as_f32().expect("validated f32").to_bits() as i32),
        Cvt::I64ReinterpretF64 => Val::I64(v.as_f64().expect("validated f64").to_bits() as i64),
        Cvt::F32ReinterpretI32 => Val::F32(F32::from_bits(v.as_i32().expect("validated i32") as u32)),
        Cvt::F64ReinterpretI64 => Val::F64(F64::from_bits(v.as_i64().expect("validated i64") as u64)),

        Cvt::I32Extend8S => Val::I32(v.as_i32().expect("validated i32") as i8 as i32),
        Cvt::I32Extend16S => Val::I32(v.as_i32().expect("validated i32") as i16 as i32),
        Cvt::I64Extend8S => Val::I64(v.as_i64().expect("validated i64") as i8 as i64),
        Cvt::I64Extend16S => Val::I64(v.as_i64().expect("validated i64") as i16 as i64),
        Cvt::I64Extend32S => Val::I64(v.as_i64().expect("validated i64") as i32 as i64),
    })
}

/// Checks natural alignment for an atomic access and returns the 32-bit effective address to use
/// as the waitlist's `ident`. Bounds-checking is left to the `with_exclusive`/`read`/`write` call
/// that follows, which already traps `OutOfBoundsMemoryAccess` on a bad range.
fn atomic_addr(_mem: &MemInst, base: u32, offset: u64, size: u64) -> Result<u32, Trap> {
    let effective = (base as u64)
        .checked_add(offset)
        .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsMemoryAccess))?;
    if effective % size != 0 {
        return Err(Trap::new(TrapCode::Misc, "unaligned atomic memory access"));
    }
    Ok(effective as u32)
}

fn atomic_load(mem: &MemInst, ty: IntTy, base: u32, offset: u64) -> Result<Val, Trap> {
    let size = match ty {
        IntTy::I32 => 4,
        IntTy::I64 => 8,
    };
    atomic_addr(mem, base, offset, size)?;
    mem.with_exclusive(base, offset, size, |buf| match ty {
        IntTy::I32 => Val::I32(read_u32_le(buf) as i32),
        IntTy::I64 => Val::I64(read_u64_le(buf) as i64),
    })
}

fn atomic_store(mem: &MemInst, ty: IntTy, base: u32, offset: u64, value: Val) -> Result<(), Trap> {
    let size = match ty {
        IntTy::I32 => 4,
        IntTy::I64 => 8,
    };
    atomic_addr(mem, base, offset, size)?;
    mem.with_exclusive(base, offset, size, |buf| match (ty, value) {
        (IntTy::I32, Val::I32(v)) => buf.copy_from_slice(&(v as u32).to_le_bytes()),
        (IntTy::I64, Val::I64(v)) => buf.copy_from_slice(&(v as u64).to_le_bytes()),
        _ => unreachable!("validated ty/value pair"),
    })
}

fn apply_rmw(op: AtomicRmwOp, old: u64, operand: u64) -> u64 {
    match op {
        AtomicRmwOp::Add => old.wrapping_add(operand),
        AtomicRmwOp::Sub => old.wrapping_sub(operand),
        AtomicRmwOp::And => old & operand,
        AtomicRmwOp::Or => old | operand,
        AtomicRmwOp::Xor => old ^ operand,
        AtomicRmwOp::Xchg => operand,
    }
}

fn atomic_rmw(mem: &MemInst, ty: IntTy, op: AtomicRmwOp, base: u32, offset: u64, operand: Val) -> Result<Val, Trap> {
    let size = match ty {
        IntTy::I32 => 4,
        IntTy::I64 => 8,
    };
    atomic_addr(mem, base, offset, size)?;
    mem.with_exclusive(base, offset, size, |buf| match ty {
        IntTy::I32 => {
            let old = read_u32_le(buf);
            let operand = operand.as_i32().expect("validated i32") as u32;
            let new = apply_rmw(op, old as u64, operand as u64) as u32;
            buf.copy_from_slice(&new.to_le_bytes());
            Val::I32(old as i32)
        }
        IntTy::I64 => {
            let old = read_u64_le(buf);
            let operand = operand.as_i64().expect("validated i64") as u64;
            let new = apply_rmw(op, old, operand);
            buf.copy_from_slice(&new.to_le_bytes());
            Val::I64(old as i64)
        }
    })
}

fn atomic_cmpxchg(mem: &MemInst, ty: IntTy, base: u32, offset: u64, expected: Val, replacement: Val) -> Result<Val, Trap> {
    let size = match ty {
        IntTy::I32 => 4,
        IntTy::I64 => 8,
    };
    atomic_addr(mem, base, offset, size)?;
    mem.with_exclusive(base, offset, size, |buf| match ty {
        IntTy::I32 => {
            let current = read_u32_le(buf);
            let expected = expected.as_i32().expect("validated i32") as u32;
            if current == expected {
                let replacement = replacement.as_i32().expect("validated i32") as u32;
                buf.copy_from_slice(&replacement.to_le_bytes());
            }
            Val::I32(current as i32)
        }
        IntTy::I64 => {
            let current = read_u64_le(buf);
            let expected = expected.as_i64().expect("validated i64") as u64;
            if current == expected {
                let replacement = replacement.as_i64().expect("validated i64") as u64;
                buf.copy_from_slice(&replacement.to_le_bytes());
            }
            Val::I64(current as i64)
        }
    })
}

/// `memory.atomic.wait32`/`wait64`: returns `0` (woken), `1` (value already didn't match), or
/// `2` (timed out), per the Wasm threads proposal's result encoding.
///
/// The equality check and the waitlist registration are not one atomic step (they'd need to share
/// the memory's lock with the waitlist's own mutex to be so); see DESIGN.md for why that gap is
/// an accepted simplification here rather than a closed race.
fn atomic_wait(instance: &Arc<Instance>, ty: IntTy, memidx: u32, offset: u64, base: u32, expected: Val, timeout_ns: i64) -> Result<i32, Trap> {
    let mem = instance.memory(memidx);
    let size = match ty {
        IntTy::I32 => 4,
        IntTy::I64 => 8,
    };
    let Some(waiters) = mem.waiters() else {
        return Err(Trap::new(TrapCode::Misc, "atomic.wait on a non-shared memory"));
    };
    let ident = atomic_addr(mem, base, offset, size)?;
    let current = atomic_load(mem, ty, base, offset)?;
    let matches = match (ty, current, expected) {
        (IntTy::I32, Val::I32(a), Val::I32(b)) => a == b,
        (IntTy::I64, Val::I64(a), Val::I64(b)) => a == b,
        _ => unreachable!("validated ty/value pair"),
    };
    if !matches {
        return Ok(1);
    }
    let deadline = deadline_from_relative_ns(timeout_ns);
    match waiters.wait(ident, deadline) {
        crate::atomics::WaitResult::Ok => Ok(0),
        crate::atomics::WaitResult::Timeout => Ok(2),
        crate::atomics::WaitResult::Overflow => {
            Err(Trap::new(TrapCode::Misc, "atomic.wait waiter list overflow"))
        }
    }
}

fn atomic_notify(instance: &Arc<Instance>, memidx: u32, offset: u64, base: u32, count: u32) -> Result<u32, Trap> {
    let mem = instance.memory(memidx);
    // `memory.atomic.notify` is itself a 4-byte atomic access per the threads proposal: it must
    // trap `OutOfBoundsMemoryAccess` on a bad address and reject misalignment, even though it
    // never actually touches the bytes at that address the way `wait`'s `atomic_load` does.
    let ident = atomic_addr(mem, base, offset, 4)?;
    mem.check_bounds(base, offset, 4)?;
    let Some(waiters) = mem.waiters() else {
        return Ok(0);
    };
    Ok(waiters.notify(ident, count))
}
