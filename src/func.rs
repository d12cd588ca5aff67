//! `FuncInst` (Data Model §3): "either wasm-function+owning-instance or
//! host-function+host-instance".
//!
//! A function instance never owns its instance strongly: `Instance` owns an arena of `FuncInst`s,
//! so a strong back-reference would be a cycle. We hold a `Weak` instead (§9 "Cycles"), upgraded
//! only for the duration of a call.

use alloc::sync::{Arc, Weak};

use waspvm_core::{FuncType, Trap};

use crate::exec::ExecContext;
use crate::instance::Instance;

/// A host function: boxed so embedders can close over arbitrary state. Invoked with the
/// contract from §6: the calling `ExecContext`, this function's declared type, and packed
/// parameter/result cell buffers (External Interfaces, "Host-function contract").
pub type HostFn = dyn Fn(&mut ExecContext, &[u32], &mut [u32]) -> Result<(), Trap> + Send + Sync;

#[derive(Clone)]
pub struct WasmFuncRef {
    pub instance: Weak<Instance>,
    /// Index into the combined function space of the owning instance's `Module`.
    pub func_idx: u32,
}

#[derive(Clone)]
pub struct HostFuncRef {
    pub ty: FuncType,
    pub func: Arc<HostFn>,
}

/// A function instance: a Wasm-defined function bound to the instance that owns it, or a host
/// function bound to whatever state its closure carries.
#[derive(Clone)]
pub enum FuncInst {
    Wasm(WasmFuncRef),
    Host(HostFuncRef),
}

impl FuncInst {
    pub fn ty(&self) -> FuncType {
        match self {
            FuncInst::Wasm(w) => {
                let instance = w
                    .instance
                    .upgrade()
                    .expect("FuncInst outlived its owning Instance");
                instance
                    .module()
                    .func_type_of(w.func_idx)
                    .expect("func_idx is valid by construction")
                    .clone()
            }
            FuncInst::Host(h) => h.ty.clone(),
        }
    }
}
