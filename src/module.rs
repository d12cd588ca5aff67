//! The parsed-but-untyped `Module` representation (Data Model §3), produced by [`crate::decode`]
//! once [`waspvm_validation`] has accepted every function body and constant expression in it.
//!
//! Function/table/memory/global indices throughout this module are indices into the *combined*
//! space of imports-of-that-kind followed by locally-defined entities of that kind, exactly as
//! the Wasm binary format numbers them; [`Module::func_type`] and friends hide the split from
//! callers that don't care which side of the import boundary an index falls on.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use waspvm_core::{FuncBody, FuncType, RefType};
use waspvm_validation::JumpTable;

use crate::constexpr::ConstExpr;
use crate::types::{ExternType, GlobalType, MemoryType, TableType};

#[derive(Clone, Debug)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ExternType,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

#[derive(Clone, Debug)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

/// A locally-defined function: its type and its validated, jump-table-annotated body.
#[derive(Clone, Debug)]
pub struct FuncDef {
    pub type_idx: u32,
    pub body: FuncBody,
    pub jump_table: Arc<JumpTable>,
}

#[derive(Clone, Debug)]
pub struct GlobalDef {
    pub ty: GlobalType,
    pub init: ConstExpr,
}

#[derive(Clone, Debug)]
pub enum ElementKind {
    Active { table: u32, offset: ConstExpr },
    Passive,
    /// Declared segments exist only to make a `ref.func` reachable for validation purposes;
    /// their items are never copied anywhere.
    Declared,
}

#[derive(Clone, Debug)]
pub struct ElementSegment {
    pub kind: ElementKind,
    pub ty: RefType,
    pub items: Vec<ConstExpr>,
}

#[derive(Clone, Debug)]
pub enum DataKind {
    Active { memory: u32, offset: ConstExpr },
    Passive,
}

#[derive(Clone, Debug)]
pub struct DataSegment {
    pub kind: DataKind,
    pub bytes: Arc<[u8]>,
}

/// An immutable, validated Wasm module (Data Model: "Module (immutable after decode+validate)").
///
/// Cheaply `Clone`-able (every field is `Arc`/`Vec` of small `Copy` data or itself cheap to
/// clone) so an [`crate::instance::Instance`] can hold a strong reference alongside its mutable
/// state without the module ever needing interior mutability.
#[derive(Clone, Debug)]
pub struct Module {
    pub types: Arc<[FuncType]>,
    pub imports: Arc<[Import]>,
    pub exports: Arc<[Export]>,
    pub start: Option<u32>,

    /// Type index of each *locally defined* function, i.e. `funcs[i]` is combined func index
    /// `num_imported_funcs() + i`.
    pub funcs: Arc<[FuncDef]>,
    pub tables: Arc<[TableType]>,
    pub memories: Arc<[MemoryType]>,
    pub globals: Arc<[GlobalDef]>,
    pub elements: Arc<[ElementSegment]>,
    pub data: Arc<[DataSegment]>,
}

impl Module {
    pub fn num_imported_funcs(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, ExternType::Func(_)))
            .count()
    }

    pub fn num_imported_tables(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, ExternType::Table(_)))
            .count()
    }

    pub fn num_imported_memories(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, ExternType::Memory(_)))
            .count()
    }

    pub fn num_imported_globals(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, ExternType::Global(_)))
            .count()
    }

    pub fn func_type(&self, type_idx: u32) -> Option<&FuncType> {
        self.types.get(type_idx as usize)
    }

    /// The `FuncType` of combined function index `func_idx`, whether imported or local.
    pub fn func_type_of(&self, func_idx: u32) -> Option<&FuncType> {
        let imported = self.num_imported_funcs();
        if (func_idx as usize) < imported {
            let idx = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Func(_)))
                .nth(func_idx as usize)?;
            match &idx.desc {
                ExternType::Func(ft) => Some(ft),
                _ => None,
            }
        } else {
            let def = self.funcs.get(func_idx as usize - imported)?;
            self.func_type(def.type_idx)
        }
    }

    pub fn table_type_of(&self, table_idx: u32) -> Option<TableType> {
        let imported = self.num_imported_tables();
        if (table_idx as usize) < imported {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Table(_)))
                .nth(table_idx as usize)?;
            match import.desc {
                ExternType::Table(t) => Some(t),
                _ => None,
            }
        } else {
            self.tables.get(table_idx as usize - imported).copied()
        }
    }

    pub fn memory_type_of(&self, mem_idx: u32) -> Option<MemoryType> {
        let imported = self.num_imported_memories();
        if (mem_idx as usize) < imported {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Memory(_)))
                .nth(mem_idx as usize)?;
            match import.desc {
                ExternType::Memory(t) => Some(t),
                _ => None,
            }
        } else {
            self.memories.get(mem_idx as usize - imported).copied()
        }
    }

    pub fn global_type_of(&self, global_idx: u32) -> Option<GlobalType> {
        let imported = self.num_imported_globals();
        if (global_idx as usize) < imported {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Global(_)))
                .nth(global_idx as usize)?;
            match import.desc {
                ExternType::Global(t) => Some(t),
                _ => None,
            }
        } else {
            self.globals
                .get(global_idx as usize - imported)
                .map(|g| g.ty)
        }
    }
}
