//! `GlobalInst` (Data Model §3: "GlobalInst (Val, mutability)").

use waspvm_core::{Trap, TrapCode, Val};

use crate::types::GlobalType;

/// A global variable instance: a boxed value plus its mutability, set once at instantiation from
/// the module's constant init expression and thereafter mutated only by `global.set` (if mutable)
/// or never (if const).
#[derive(Debug)]
pub struct GlobalInst {
    ty: GlobalType,
    value: Val,
}

impl GlobalInst {
    pub fn new(ty: GlobalType, value: Val) -> Self {
        debug_assert_eq!(ty.content, value.value_type());
        GlobalInst { ty, value }
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn get(&self) -> Val {
        self.value
    }

    /// Overwrites the value. A validated module never reaches this with an immutable global --
    /// the check below only fires against a host embedder calling `set` directly.
    pub fn set(&mut self, value: Val) -> Result<(), Trap> {
        if !self.ty.mutability.is_mutable() {
            return Err(Trap::new(TrapCode::Misc, "write to an immutable global"));
        }
        self.value = value;
        Ok(())
    }
}
