//! The restricted, constant-producing instruction subset used for global initializers, element
//! and data segment offsets, and table `ref.func`/`ref.null` initializers (§4.4).
//!
//! A `ConstExpr` is validated once, at decode time, with [`waspvm_validation`]'s
//! `const_expr` flag (which statically rejects every opcode but the ones listed in §4.4); this
//! module only needs to *evaluate* an already-validated expression, so it can never observe an
//! illegal instruction at run time.

use waspvm_core::{Instr, RefType, Val};

/// A validated constant expression: `i32.const`/`i64.const`/`f32.const`/`f64.const`,
/// `ref.null`, `ref.func`, or `global.get` of an immutable imported global, followed by `end`.
#[derive(Clone, Debug)]
pub struct ConstExpr {
    instrs: Box<[Instr]>,
}

impl ConstExpr {
    pub fn new(instrs: Box<[Instr]>) -> Self {
        ConstExpr { instrs }
    }

    /// Evaluates this expression. `global_value` resolves a `global.get` operand to the current
    /// value of that (always-immutable, always-already-initialized) global.
    pub fn eval(&self, global_value: impl Fn(u32) -> Val) -> Val {
        for instr in self.instrs.iter() {
            match *instr {
                Instr::I32Const(v) => return Val::I32(v),
                Instr::I64Const(v) => return Val::I64(v),
                Instr::F32Const(bits) => return Val::F32(waspvm_core::F32::from_bits(bits)),
                Instr::F64Const(bits) => return Val::F64(waspvm_core::F64::from_bits(bits)),
                Instr::RefNull(RefType::FuncRef) => return Val::FuncRef(None),
                Instr::RefNull(RefType::ExternRef) => return Val::ExternRef(None),
                Instr::RefFunc(idx) => return Val::FuncRef(Some(idx)),
                Instr::GlobalGet(idx) => return global_value(idx),
                Instr::End => {}
                _ => unreachable!("ConstExpr holds only validator-accepted constant opcodes"),
            }
        }
        unreachable!("a validated ConstExpr always produces exactly one value before `end`")
    }

    /// The `i32` offset for an active element/data segment, or a trap-worthy error if the
    /// expression (legally, per the grammar) produced a non-i32 value — which validation already
    /// prevents for offsets specifically, so this is infallible in practice.
    pub fn eval_i32_offset(&self, global_value: impl Fn(u32) -> Val) -> i32 {
        match self.eval(global_value) {
            Val::I32(v) => v,
            other => unreachable!("offset const expr must be i32, validated as {other:?}"),
        }
    }
}
