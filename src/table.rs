//! `TableInst` (Data Model §3): element type, current length bounded by an optional maximum,
//! and the element storage itself -- a `funcref`/`externref` slot per entry, `None` meaning
//! `ref.null`.

use alloc::vec;
use alloc::vec::Vec;

use waspvm_core::{Trap, TrapCode, Val};

use crate::types::TableType;

#[derive(Debug)]
pub struct TableInst {
    ty: TableType,
    elems: Vec<Val>,
}

impl TableInst {
    pub fn new(ty: TableType) -> Self {
        let init = Val::default_for(ty.value_type());
        TableInst {
            ty,
            elems: vec![init; ty.limits.min as usize],
        }
    }

    pub fn ty(&self) -> TableType {
        self.ty
    }

    pub fn len(&self) -> u32 {
        self.elems.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, idx: u32) -> Result<Val, Trap> {
        self.elems
            .get(idx as usize)
            .copied()
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))
    }

    pub fn set(&mut self, idx: u32, value: Val) -> Result<(), Trap> {
        let slot = self
            .elems
            .get_mut(idx as usize)
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        *slot = value;
        Ok(())
    }

    /// `table.grow`: appends `delta` copies of `fill`, returning the previous length, or `-1`
    /// (as `u32::MAX`, per the Wasm `table.grow` contract) if that would exceed the max.
    pub fn grow(&mut self, delta: u32, fill: Val) -> u32 {
        let current = self.len();
        let new_len = match current.checked_add(delta) {
            Some(n) => n,
            None => return u32::MAX,
        };
        if let Some(max) = self.ty.limits.max {
            if new_len > max {
                return u32::MAX;
            }
        }
        self.elems.resize(new_len as usize, fill);
        current
    }

    /// `table.fill`: writes `len` copies of `value` starting at `offset`; traps, without partial
    /// writes that the spec forbids observing, on out-of-bounds.
    pub fn fill(&mut self, offset: u32, value: Val, len: u32) -> Result<(), Trap> {
        let end = offset
            .checked_add(len)
            .filter(|&e| e <= self.len())
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        for slot in &mut self.elems[offset as usize..end as usize] {
            *slot = value;
        }
        Ok(())
    }

    /// `table.copy` within this table (dst/src may be the same table; ranges may overlap).
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> Result<(), Trap> {
        src.checked_add(len)
            .filter(|&e| e <= self.len())
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        dst.checked_add(len)
            .filter(|&e| e <= self.len())
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        self.elems
            .copy_within(src as usize..(src + len) as usize, dst as usize);
        Ok(())
    }

    /// `table.copy`/`table.init` between two distinct tables.
    pub fn copy_from(&mut self, dst: u32, src_table: &TableInst, src: u32, len: u32) -> Result<(), Trap> {
        let src_end = src
            .checked_add(len)
            .filter(|&e| e <= src_table.len())
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        let dst_end = dst
            .checked_add(len)
            .filter(|&e| e <= self.len())
            .ok_or_else(|| Trap::from(TrapCode::OutOfBoundsTableAccess))?;
        self.elems[dst as usize..dst_end as usize]
            .copy_from_slice(&src_table.elems[src as usize..src_end as usize]);
        Ok(())
    }
}
