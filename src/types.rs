//! Module-level type descriptors: table/memory/global types and the combined `ExternType` used
//! by imports and exports. `ValueType`/`FuncType`/`Mutability` themselves live in
//! `waspvm-core` since the validator needs them too; this module adds the module-shape types
//! that sit one layer above.

use waspvm_core::{FuncType, Mutability, RefType, ValueType};

/// Shared `{min, max}` limits used by both table and memory types, matching the Wasm binary
/// format's `limits` production.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl Limits {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Limits { min, max }
    }
}

/// A table's element type and size limits, counted in elements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableType {
    pub element: RefType,
    pub limits: Limits,
}

impl TableType {
    pub fn value_type(&self) -> ValueType {
        self.element.value_type()
    }
}

/// A linear memory's size limits, counted in 64KiB pages, plus the threads-proposal `shared`
/// flag (Data Model: "memories (min/max pages, shared flag)").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
    pub shared: bool,
}

/// A global's value type and mutability.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlobalType {
    pub content: ValueType,
    pub mutability: Mutability,
}

/// The type of an import or export: whichever of the four external kinds it describes.
#[derive(Clone, Debug, PartialEq)]
pub enum ExternType {
    Func(FuncType),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

impl ExternType {
    pub fn matches(&self, other: &ExternType) -> bool {
        match (self, other) {
            (ExternType::Func(a), ExternType::Func(b)) => a == b,
            (ExternType::Table(a), ExternType::Table(b)) => {
                a.element == b.element && limits_compatible(a.limits, b.limits)
            }
            (ExternType::Memory(a), ExternType::Memory(b)) => {
                a.shared == b.shared && limits_compatible(a.limits, b.limits)
            }
            (ExternType::Global(a), ExternType::Global(b)) => a == b,
            _ => false,
        }
    }
}

/// Import subtyping over limits: the provided `actual` must be at least as large and at least
/// as tightly bounded as what the import declares (`self.min <= other.min`, `self.max <=
/// other.max` when the import even has a max).
fn limits_compatible(required: Limits, actual: Limits) -> bool {
    if actual.min < required.min {
        return false;
    }
    match (required.max, actual.max) {
        (None, _) => true,
        (Some(req_max), Some(act_max)) => act_max <= req_max,
        (Some(_), None) => false,
    }
}
