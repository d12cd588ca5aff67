//! The Instance builder (§4.2): resolves imports, allocates local tables/memories/globals,
//! evaluates every constant expression, seeds active element/data segments, and runs the start
//! function if the module declares one.
//!
//! `Instance` itself is the thing a host actually holds on to once instantiation succeeds. Its
//! funcs/tables/memories/globals are indexed through [`waspvm_arena::Arena`] (Design Notes:
//! "manual pointer graphs -> arena + indices") rather than by pointer, so a `table.grow` or a
//! `memory.grow` never invalidates anything another part of the runtime is holding.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use waspvm_arena::{arena_index, Arena};
use waspvm_core::{Trap, TrapCode, Val};

use crate::config::Config;
use crate::error::{Error, LinkError};
use crate::func::{FuncInst, WasmFuncRef};
use crate::global::GlobalInst;
use crate::memory::MemInst;
use crate::module::{DataKind, ElementKind, Import, Module};
use crate::table::TableInst;
use crate::types::ExternType;

arena_index! {
    /// Combined-space function index (imports of that kind, then locally defined ones).
    pub struct FuncIdx(u32);
}
arena_index! {
    pub struct TableIdx(u32);
}
arena_index! {
    pub struct MemoryIdx(u32);
}
arena_index! {
    pub struct GlobalIdx(u32);
}

/// A handle to one of the four external kinds, as contributed by a host or exported by a module.
#[derive(Clone)]
pub enum Extern {
    Func(FuncInst),
    Table(Arc<Mutex<TableInst>>),
    Memory(Arc<MemInst>),
    Global(Arc<Mutex<GlobalInst>>),
}

impl Extern {
    pub fn ty(&self) -> ExternType {
        match self {
            Extern::Func(f) => ExternType::Func(f.ty()),
            Extern::Table(t) => {
                ExternType::Table(t.lock().unwrap_or_else(|e| e.into_inner()).ty())
            }
            Extern::Memory(m) => ExternType::Memory(m.ty()),
            Extern::Global(g) => {
                ExternType::Global(g.lock().unwrap_or_else(|e| e.into_inner()).ty())
            }
        }
    }
}

/// A list of `(module, name, Extern)` entries a host contributes at instantiation time.
#[derive(Default, Clone)]
pub struct ImportObject {
    entries: Vec<(String, String, Extern)>,
}

impl ImportObject {
    pub fn new() -> Self {
        ImportObject::default()
    }

    pub fn define(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        ext: Extern,
    ) -> &mut Self {
        self.entries.push((module.into(), name.into(), ext));
        self
    }

    pub fn resolve(&self, module: &str, name: &str) -> Option<&Extern> {
        self.entries
            .iter()
            .find(|(m, n, _)| m == module && n == name)
            .map(|(_, _, e)| e)
    }
}

fn resolve_import(imports: &ImportObject, imp: &Import) -> Result<Extern, Error> {
    let ext = imports.resolve(&imp.module, &imp.name).ok_or_else(|| {
        Error::Link(LinkError::Missing {
            module: imp.module.clone(),
            name: imp.name.clone(),
        })
    })?;
    if !imp.desc.matches(&ext.ty()) {
        return Err(Error::Link(LinkError::TypeMismatch {
            module: imp.module.clone(),
            name: imp.name.clone(),
        }));
    }
    Ok(ext.clone())
}

/// A live, instantiated module: owned tables/memories/globals plus non-owning handles to
/// whatever was imported (Data Model: "Instance exclusively owns ... unless imported").
pub struct Instance {
    module: Module,
    funcs: Arena<FuncIdx, FuncInst>,
    tables: Arena<TableIdx, Arc<Mutex<TableInst>>>,
    memories: Arena<MemoryIdx, Arc<MemInst>>,
    globals: Arena<GlobalIdx, Arc<Mutex<GlobalInst>>>,
    /// Evaluated items of every element segment, by segment index; `None` once dropped (either
    /// explicitly via `elem.drop` or implicitly, for `Active`/`Declared` segments, right after
    /// instantiation -- an active segment is never revisited by `table.init`).
    elems: Vec<Mutex<Option<Arc<[Val]>>>>,
    /// Whether data segment `i` has been dropped, same implicit-drop rule as `elems`.
    data_dropped: Vec<AtomicBool>,
    /// Cooperative-interruption request counter (§4.3/§5: "the owning cluster may ask a running
    /// call to stop at its next poll point"). Any non-zero value means "stop"; a counter rather
    /// than a bool so overlapping `request_interrupt`/`clear_interrupt` calls from independent
    /// callers can't race each other into clearing a still-wanted interrupt.
    interrupt: core::sync::atomic::AtomicU32,
}

impl Instance {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn func(&self, idx: u32) -> &FuncInst {
        self.funcs
            .get(FuncIdx::new(idx))
            .expect("func_idx is valid by construction")
    }

    pub fn table(&self, idx: u32) -> &Arc<Mutex<TableInst>> {
        self.tables
            .get(TableIdx::new(idx))
            .expect("table_idx is valid by construction")
    }

    pub fn memory(&self, idx: u32) -> &Arc<MemInst> {
        self.memories
            .get(MemoryIdx::new(idx))
            .expect("mem_idx is valid by construction")
    }

    pub fn global(&self, idx: u32) -> &Arc<Mutex<GlobalInst>> {
        self.globals
            .get(GlobalIdx::new(idx))
            .expect("global_idx is valid by construction")
    }

    /// The live items of element segment `idx`, or `None` if it has been dropped.
    pub fn elem_segment(&self, idx: u32) -> Option<Arc<[Val]>> {
        self.elems[idx as usize]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn drop_elem_segment(&self, idx: u32) {
        *self.elems[idx as usize]
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The raw bytes of data segment `idx`, or `None` if it has been dropped.
    pub fn data_segment(&self, idx: u32) -> Option<&Arc<[u8]>> {
        if self.data_dropped[idx as usize].load(Ordering::Relaxed) {
            return None;
        }
        Some(&self.module.data[idx as usize].bytes)
    }

    pub fn drop_data_segment(&self, idx: u32) {
        self.data_dropped[idx as usize].store(true, Ordering::Relaxed);
    }

    /// Asks every [`crate::exec::ExecContext`] currently running against this instance to stop
    /// at its next poll point, trapping the call in progress.
    pub fn request_interrupt(&self) {
        self.interrupt.fetch_add(1, Ordering::SeqCst);
    }

    /// Clears a pending interrupt request, allowing subsequent calls to run uninterrupted again.
    pub fn clear_interrupt(&self) {
        self.interrupt.store(0, Ordering::SeqCst);
    }

    pub(crate) fn interrupt_requested(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst) != 0
    }

    /// Runs the §4.2 instantiation algorithm: resolve imports, allocate locals, evaluate
    /// globals/segments, seed active segments, then (if declared) call the start function.
    pub fn instantiate(
        module: &Module,
        imports: &ImportObject,
        config: &Config,
    ) -> Result<Arc<Instance>, Error> {
        let mut imported_tables = Vec::new();
        let mut imported_memories = Vec::new();
        let mut imported_globals = Vec::new();
        let mut imported_funcs = Vec::new();

        for imp in module.imports.iter() {
            match resolve_import(imports, imp)? {
                Extern::Func(f) => imported_funcs.push(f),
                Extern::Table(t) => imported_tables.push(t),
                Extern::Memory(m) => imported_memories.push(m),
                Extern::Global(g) => imported_globals.push(g),
            }
        }

        let mut tables: Arena<TableIdx, Arc<Mutex<TableInst>>> =
            imported_tables.into_iter().collect();
        for ty in module.tables.iter() {
            tables.alloc(Arc::new(Mutex::new(TableInst::new(*ty))));
        }

        let mut memories: Arena<MemoryIdx, Arc<MemInst>> =
            imported_memories.into_iter().collect();
        for ty in module.memories.iter() {
            memories.alloc(Arc::new(MemInst::new(*ty)));
        }

        let mut globals: Arena<GlobalIdx, Arc<Mutex<GlobalInst>>> =
            imported_globals.into_iter().collect();
        for def in module.globals.iter() {
            let value = def.init.eval(|idx| {
                globals
                    .get(GlobalIdx::new(idx))
                    .expect("validated const expr only references already-defined globals")
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get()
            });
            globals.alloc(Arc::new(Mutex::new(GlobalInst::new(def.ty, value))));
        }

        let global_value = |idx: u32| {
            globals
                .get(GlobalIdx::new(idx))
                .expect("validated const expr only references already-defined globals")
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get()
        };

        let mut elems = Vec::with_capacity(module.elements.len());
        for seg in module.elements.iter() {
            let items: Arc<[Val]> = seg
                .items
                .iter()
                .map(|c| c.eval(global_value))
                .collect::<Vec<_>>()
                .into();
            match &seg.kind {
                ElementKind::Active { table, offset } => {
                    let base = offset.eval_i32_offset(global_value) as u32;
                    let table = tables
                        .get(TableIdx::new(*table))
                        .expect("table_idx validated");
                    let mut table = table.lock().unwrap_or_else(|e| e.into_inner());
                    for (i, &v) in items.iter().enumerate() {
                        let dst = base
                            .checked_add(i as u32)
                            .ok_or_else(|| Error::from(Trap::from(TrapCode::OutOfBoundsTableAccess)))?;
                        table.set(dst, v).map_err(Error::from)?;
                    }
                    // Active segments are used exactly once, during instantiation; they behave
                    // as already-dropped from here on (never a valid `table.init` source).
                    elems.push(Mutex::new(None));
                }
                ElementKind::Declared => {
                    // Exists only so `ref.func` validates; never copied anywhere.
                    elems.push(Mutex::new(None));
                }
                ElementKind::Passive => {
                    elems.push(Mutex::new(Some(items)));
                }
            }
        }

        let mut data_dropped = Vec::with_capacity(module.data.len());
        for seg in module.data.iter() {
            match &seg.kind {
                DataKind::Active { memory, offset } => {
                    let base = offset.eval_i32_offset(global_value) as u32;
                    let mem = memories
                        .get(MemoryIdx::new(*memory))
                        .expect("mem_idx validated");
                    mem.write(base, 0, &seg.bytes).map_err(Error::from)?;
                    data_dropped.push(AtomicBool::new(true));
                }
                DataKind::Passive => {
                    data_dropped.push(AtomicBool::new(false));
                }
            }
        }

        let module = module.clone();
        let imported_func_count = imported_funcs.len() as u32;
        let instance = Arc::new_cyclic(|weak: &Weak<Instance>| {
            let mut funcs: Arena<FuncIdx, FuncInst> = imported_funcs.into_iter().collect();
            for (i, def) in module.funcs.iter().enumerate() {
                funcs.alloc(FuncInst::Wasm(WasmFuncRef {
                    instance: weak.clone(),
                    func_idx: imported_func_count + i as u32,
                }));
            }
            Instance {
                module,
                funcs,
                tables,
                memories,
                globals,
                elems,
                data_dropped,
                interrupt: core::sync::atomic::AtomicU32::new(0),
            }
        });

        if let Some(start_idx) = instance.module.start {
            let mut cx = crate::exec::ExecContext::new(Arc::clone(&instance), *config);
            cx.call(start_idx, &[])?;
        }

        Ok(instance)
    }
}
