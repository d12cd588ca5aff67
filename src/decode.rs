//! Binary decoder: turns a raw Wasm byte stream into a validated [`Module`] (Data Model §3).
//!
//! This crate treats the binary format itself as an external, well-studied concern and leans on
//! [`wasmparser`] for section/opcode framing rather than hand-rolling LEB128 and opcode tables;
//! what belongs to this crate is turning wasmparser's borrowed, streaming types into the
//! flattened [`waspvm_core::Instr`] stream [`waspvm_validation`] and the executor understand, and
//! running every function body and constant expression through the validator before a `Module`
//! is allowed to exist at all.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

use waspvm_core::{
    AtomicRmwOp, BlockType, Cvt, FloatBinOp, FloatRelOp, FloatTy, FloatUnOp, FuncBody, FuncType,
    Instr, IntBinOp, IntOrFloatTy, IntRelOp, IntTestOp, IntTy, IntUnOp, LoadWidth, MemArg,
    Mutability, RefType, StoreWidth, ValueType,
};
use waspvm_validation::{validate_function, ValidationContext, ValidationFlags};

use crate::config::Config;
use crate::constexpr::ConstExpr;
use crate::error::Error;
use crate::module::{
    DataKind, DataSegment, ElementKind, ElementSegment, Export, ExportDesc, FuncDef, GlobalDef,
    Import, Module,
};
use crate::types::{ExternType, GlobalType, Limits, MemoryType, TableType};

/// Decodes and validates a complete Wasm binary module against the given [`Config`]; disabling
/// `config.enable_threads` rejects shared memories and every atomic opcode at decode time rather
/// than letting them reach the executor.
pub fn decode_module(wasm: &[u8], config: &Config) -> Result<Module, Error> {
    let mut builder = Builder::new(config.enable_threads);
    for payload in wasmparser::Parser::new(0).parse_all(wasm) {
        let payload = payload.map_err(wp_err)?;
        builder.accept(payload)?;
    }
    builder.finish()
}

fn wp_err(e: wasmparser::BinaryReaderError) -> Error {
    Error::Decode(format!("{e}"))
}

/// Accumulates module state section by section, in the order the binary format guarantees:
/// everything a function body or constant expression might reference (types, imports, the
/// function/table/memory/global index spaces, element/data counts) is fully known by the time
/// the code and data sections -- the only sections whose entries we validate -- are reached.
#[derive(Default)]
struct Builder {
    enable_threads: bool,
    types: Vec<FuncType>,
    imports: Vec<Import>,
    num_imported_funcs: usize,
    num_imported_tables: usize,
    num_imported_memories: usize,
    num_imported_globals: usize,
    /// Type index of each locally-defined function, from the function section.
    func_type_idxs: Vec<u32>,
    tables: Vec<TableType>,
    memories: Vec<MemoryType>,
    globals: Vec<GlobalDef>,
    exports: Vec<Export>,
    start: Option<u32>,
    elements: Vec<ElementSegment>,
    data_count: Option<u32>,
    data: Vec<DataSegment>,
    funcs: Vec<FuncDef>,
}

impl Builder {
    fn new(enable_threads: bool) -> Self {
        Builder { enable_threads, ..Builder::default() }
    }

    fn accept(&mut self, payload: wasmparser::Payload<'_>) -> Result<(), Error> {
        use wasmparser::Payload;
        match payload {
            Payload::TypeSection(section) => self.process_types(section)?,
            Payload::ImportSection(section) => self.process_imports(section)?,
            Payload::FunctionSection(section) => self.process_functions(section)?,
            Payload::TableSection(section) => self.process_tables(section)?,
            Payload::MemorySection(section) => self.process_memories(section)?,
            Payload::GlobalSection(section) => self.process_globals(section)?,
            Payload::ExportSection(section) => self.process_exports(section)?,
            Payload::StartSection { func, .. } => self.start = Some(func),
            Payload::ElementSection(section) => self.process_elements(section)?,
            Payload::DataCountSection { count, .. } => self.data_count = Some(count),
            Payload::CodeSectionEntry(body) => self.process_code_entry(body)?,
            Payload::DataSection(section) => self.process_data(section)?,
            // Not interesting to a pure interpreter: version/custom/unknown sections, and the
            // code section's own start marker (we don't need the declared function count ahead
            // of time, we just process entries as they stream by).
            _ => {}
        }
        Ok(())
    }

    fn process_types(&mut self, section: wasmparser::TypeSectionReader<'_>) -> Result<(), Error> {
        for ty in section {
            match ty.map_err(wp_err)? {
                wasmparser::Type::Func(ft) => self.types.push(convert_func_type(ft)?),
            }
        }
        Ok(())
    }

    fn process_imports(
        &mut self,
        section: wasmparser::ImportSectionReader<'_>,
    ) -> Result<(), Error> {
        for import in section {
            let import = import.map_err(wp_err)?;
            let desc = self.convert_import_desc(import.ty)?;
            match &desc {
                ExternType::Func(_) => self.num_imported_funcs += 1,
                ExternType::Table(_) => self.num_imported_tables += 1,
                ExternType::Memory(_) => self.num_imported_memories += 1,
                ExternType::Global(_) => self.num_imported_globals += 1,
            }
            self.imports.push(Import {
                module: import.module.to_string(),
                name: import.name.to_string(),
                desc,
            });
        }
        Ok(())
    }

    fn convert_import_desc(&self, ty: wasmparser::TypeRef) -> Result<ExternType, Error> {
        match ty {
            wasmparser::TypeRef::Func(idx) => {
                let ft = self
                    .types
                    .get(idx as usize)
                    .ok_or_else(|| Error::Decode(format!("import of unknown type {idx}")))?;
                Ok(ExternType::Func(ft.clone()))
            }
            wasmparser::TypeRef::Table(t) => Ok(ExternType::Table(convert_table_type(t)?)),
            wasmparser::TypeRef::Memory(m) => {
                let ty = convert_memory_type(m)?;
                if ty.shared && !self.enable_threads {
                    return Err(Error::Decode(
                        "shared memories require threads support to be enabled".to_string(),
                    ));
                }
                Ok(ExternType::Memory(ty))
            }
            wasmparser::TypeRef::Global(g) => Ok(ExternType::Global(convert_global_type(g)?)),
            wasmparser::TypeRef::Tag(_) => {
                Err(Error::Decode("exception-handling tag imports are not supported".to_string()))
            }
        }
    }

    fn process_functions(
        &mut self,
        section: wasmparser::FunctionSectionReader<'_>,
    ) -> Result<(), Error> {
        for type_idx in section {
            self.func_type_idxs.push(type_idx.map_err(wp_err)?);
        }
        Ok(())
    }

    fn process_tables(
        &mut self,
        section: wasmparser::TableSectionReader<'_>,
    ) -> Result<(), Error> {
        for table in section {
            self.tables.push(convert_table_type(table.map_err(wp_err)?)?);
        }
        Ok(())
    }

    fn process_memories(
        &mut self,
        section: wasmparser::MemorySectionReader<'_>,
    ) -> Result<(), Error> {
        for memory in section {
            let ty = convert_memory_type(memory.map_err(wp_err)?)?;
            if ty.shared && !self.enable_threads {
                return Err(Error::Decode(
                    "shared memories require threads support to be enabled".to_string(),
                ));
            }
            self.memories.push(ty);
        }
        Ok(())
    }

    fn process_globals(
        &mut self,
        section: wasmparser::GlobalSectionReader<'_>,
    ) -> Result<(), Error> {
        for global in section {
            let global = global.map_err(wp_err)?;
            let ty = convert_global_type(global.ty)?;
            let instrs = decode_const_expr(global.init_expr)?;
            let sig = FuncType::new(Vec::new(), alloc::vec![ty.content]);
            validate_function(
                self,
                &sig,
                &[],
                &instrs,
                ValidationFlags { const_expr: true, generate_jump_table: false },
            )?;
            self.globals.push(GlobalDef { ty, init: ConstExpr::new(instrs.into_boxed_slice()) });
        }
        Ok(())
    }

    fn process_exports(
        &mut self,
        section: wasmparser::ExportSectionReader<'_>,
    ) -> Result<(), Error> {
        for export in section {
            let export = export.map_err(wp_err)?;
            let desc = match export.kind {
                wasmparser::ExternalKind::Func => ExportDesc::Func(export.index),
                wasmparser::ExternalKind::Table => ExportDesc::Table(export.index),
                wasmparser::ExternalKind::Memory => ExportDesc::Memory(export.index),
                wasmparser::ExternalKind::Global => ExportDesc::Global(export.index),
                wasmparser::ExternalKind::Tag => {
                    return Err(Error::Decode("tag exports are not supported".to_string()))
                }
            };
            self.exports.push(Export { name: export.name.to_string(), desc });
        }
        Ok(())
    }

    fn process_elements(
        &mut self,
        section: wasmparser::ElementSectionReader<'_>,
    ) -> Result<(), Error> {
        for elem in section {
            let elem = elem.map_err(wp_err)?;
            let (ty, items) = self.decode_element_items(elem.items)?;
            let kind = match elem.kind {
                wasmparser::ElementKind::Passive => ElementKind::Passive,
                wasmparser::ElementKind::Declared => ElementKind::Declared,
                wasmparser::ElementKind::Active { table_index, offset_expr } => {
                    let table = table_index.unwrap_or(0);
                    let instrs = decode_const_expr(offset_expr)?;
                    let sig = FuncType::new(Vec::new(), alloc::vec![ValueType::I32]);
                    validate_function(
                        self,
                        &sig,
                        &[],
                        &instrs,
                        ValidationFlags { const_expr: true, generate_jump_table: false },
                    )?;
                    ElementKind::Active { table, offset: ConstExpr::new(instrs.into_boxed_slice()) }
                }
            };
            self.elements.push(ElementSegment { kind, ty, items });
        }
        Ok(())
    }

    fn decode_element_items(
        &self,
        items: wasmparser::ElementItems<'_>,
    ) -> Result<(RefType, Vec<ConstExpr>), Error> {
        match items {
            wasmparser::ElementItems::Functions(funcs) => {
                let mut out = Vec::new();
                for func_idx in funcs {
                    let func_idx = func_idx.map_err(wp_err)?;
                    let instrs = alloc::vec![Instr::RefFunc(func_idx), Instr::End];
                    let sig = FuncType::new(Vec::new(), alloc::vec![ValueType::FuncRef]);
                    validate_function(
                        self,
                        &sig,
                        &[],
                        &instrs,
                        ValidationFlags { const_expr: true, generate_jump_table: false },
                    )?;
                    out.push(ConstExpr::new(instrs.into_boxed_slice()));
                }
                Ok((RefType::FuncRef, out))
            }
            wasmparser::ElementItems::Expressions(ref_ty, exprs) => {
                let element_ty = convert_ref_type(ref_ty)?;
                let mut out = Vec::new();
                for expr in exprs {
                    let expr = expr.map_err(wp_err)?;
                    let instrs = decode_const_expr(expr)?;
                    let sig = FuncType::new(Vec::new(), alloc::vec![element_ty.value_type()]);
                    validate_function(
                        self,
                        &sig,
                        &[],
                        &instrs,
                        ValidationFlags { const_expr: true, generate_jump_table: false },
                    )?;
                    out.push(ConstExpr::new(instrs.into_boxed_slice()));
                }
                Ok((element_ty, out))
            }
        }
    }

    fn process_data(&mut self, section: wasmparser::DataSectionReader<'_>) -> Result<(), Error> {
        for data in section {
            let data = data.map_err(wp_err)?;
            let kind = match data.kind {
                wasmparser::DataKind::Passive => DataKind::Passive,
                wasmparser::DataKind::Active { memory_index, offset_expr } => {
                    let instrs = decode_const_expr(offset_expr)?;
                    let sig = FuncType::new(Vec::new(), alloc::vec![ValueType::I32]);
                    validate_function(
                        self,
                        &sig,
                        &[],
                        &instrs,
                        ValidationFlags { const_expr: true, generate_jump_table: false },
                    )?;
                    DataKind::Active {
                        memory: memory_index,
                        offset: ConstExpr::new(instrs.into_boxed_slice()),
                    }
                }
            };
            self.data.push(DataSegment { kind, bytes: Arc::from(data.data) });
        }
        Ok(())
    }

    fn process_code_entry(&mut self, body: wasmparser::FunctionBody<'_>) -> Result<(), Error> {
        let local_idx = self.funcs.len();
        let type_idx = *self.func_type_idxs.get(local_idx).ok_or_else(|| {
            Error::Decode("more function bodies than function declarations".to_string())
        })?;
        let func_type = self
            .types
            .get(type_idx as usize)
            .ok_or_else(|| Error::Decode(format!("function references unknown type {type_idx}")))?
            .clone();

        let mut locals = Vec::new();
        for local in body.get_locals_reader().map_err(wp_err)? {
            let (count, ty) = local.map_err(wp_err)?;
            let ty = convert_value_type(ty)?;
            for _ in 0..count {
                locals.push(ty);
            }
        }

        let mut instrs = Vec::new();
        for op in body.get_operators_reader().map_err(wp_err)? {
            let instr = decode_instr(op.map_err(wp_err)?)?;
            if !self.enable_threads && is_atomic_instr(&instr) {
                return Err(Error::Decode(
                    "atomic instructions require threads support to be enabled".to_string(),
                ));
            }
            instrs.push(instr);
        }

        let jump_table = validate_function(
            self,
            &func_type,
            &locals,
            &instrs,
            ValidationFlags { const_expr: false, generate_jump_table: true },
        )?;

        self.funcs.push(FuncDef {
            type_idx,
            body: FuncBody { locals: locals.into(), instrs: instrs.into() },
            jump_table: Arc::new(jump_table),
        });
        Ok(())
    }

    fn finish(self) -> Result<Module, Error> {
        if let Some(declared) = self.data_count {
            if declared as usize != self.data.len() {
                return Err(Error::Decode(
                    "data count section does not match the data section".to_string(),
                ));
            }
        }
        if self.funcs.len() != self.func_type_idxs.len() {
            return Err(Error::Decode(
                "fewer function bodies than function declarations".to_string(),
            ));
        }
        if let Some(start) = self.start {
            let ft = self
                .func_type_of(start)
                .ok_or_else(|| Error::Decode(format!("start function index {start} out of bounds")))?;
            if !ft.params().is_empty() || !ft.results().is_empty() {
                return Err(Error::Decode("start function must have type [] -> []".to_string()));
            }
        }
        Ok(Module {
            types: self.types.into(),
            imports: self.imports.into(),
            exports: self.exports.into(),
            start: self.start,
            funcs: self.funcs.into(),
            tables: self.tables.into(),
            memories: self.memories.into(),
            globals: self.globals.into(),
            elements: self.elements.into(),
            data: self.data.into(),
        })
    }
}

impl ValidationContext for Builder {
    fn func_type(&self, type_idx: u32) -> Option<&FuncType> {
        self.types.get(type_idx as usize)
    }

    fn func_type_of(&self, func_idx: u32) -> Option<&FuncType> {
        if (func_idx as usize) < self.num_imported_funcs {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Func(_)))
                .nth(func_idx as usize)?;
            match &import.desc {
                ExternType::Func(ft) => Some(ft),
                _ => None,
            }
        } else {
            let local = func_idx as usize - self.num_imported_funcs;
            let type_idx = *self.func_type_idxs.get(local)?;
            self.func_type(type_idx)
        }
    }

    fn global_type(&self, global_idx: u32) -> Option<(ValueType, bool)> {
        if (global_idx as usize) < self.num_imported_globals {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Global(_)))
                .nth(global_idx as usize)?;
            match import.desc {
                ExternType::Global(g) => Some((g.content, g.mutability.is_mutable())),
                _ => None,
            }
        } else {
            let local = global_idx as usize - self.num_imported_globals;
            let g = self.globals.get(local)?;
            Some((g.ty.content, g.ty.mutability.is_mutable()))
        }
    }

    fn num_imported_globals(&self) -> u32 {
        self.num_imported_globals as u32
    }

    fn table_type(&self, table_idx: u32) -> Option<RefType> {
        if (table_idx as usize) < self.num_imported_tables {
            let import = self
                .imports
                .iter()
                .filter(|i| matches!(i.desc, ExternType::Table(_)))
                .nth(table_idx as usize)?;
            match import.desc {
                ExternType::Table(t) => Some(t.element),
                _ => None,
            }
        } else {
            let local = table_idx as usize - self.num_imported_tables;
            self.tables.get(local).map(|t| t.element)
        }
    }

    fn table_exists(&self, table_idx: u32) -> bool {
        (table_idx as usize) < self.num_imported_tables + self.tables.len()
    }

    fn memory_exists(&self, mem_idx: u32) -> bool {
        (mem_idx as usize) < self.num_imported_memories + self.memories.len()
    }

    fn data_count(&self) -> Option<u32> {
        self.data_count
    }

    fn elem_type(&self, elem_idx: u32) -> Option<RefType> {
        self.elements.get(elem_idx as usize).map(|e| e.ty)
    }
}

fn convert_func_type(ft: wasmparser::FuncType) -> Result<FuncType, Error> {
    let params = ft
        .params()
        .iter()
        .map(|t| convert_value_type(*t))
        .collect::<Result<Vec<_>, _>>()?;
    let results = ft
        .results()
        .iter()
        .map(|t| convert_value_type(*t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FuncType::new(params, results))
}

fn convert_value_type(ty: wasmparser::ValType) -> Result<ValueType, Error> {
    match ty {
        wasmparser::ValType::I32 => Ok(ValueType::I32),
        wasmparser::ValType::I64 => Ok(ValueType::I64),
        wasmparser::ValType::F32 => Ok(ValueType::F32),
        wasmparser::ValType::F64 => Ok(ValueType::F64),
        wasmparser::ValType::FuncRef => Ok(ValueType::FuncRef),
        wasmparser::ValType::ExternRef => Ok(ValueType::ExternRef),
        wasmparser::ValType::V128 => Err(Error::Decode("SIMD (v128) is not supported".to_string())),
    }
}

fn convert_ref_type(ty: wasmparser::RefType) -> Result<RefType, Error> {
    if ty.is_func_ref() {
        Ok(RefType::FuncRef)
    } else if ty.is_extern_ref() {
        Ok(RefType::ExternRef)
    } else {
        Err(Error::Decode("unsupported reference type".to_string()))
    }
}

fn convert_table_type(ty: wasmparser::TableType) -> Result<TableType, Error> {
    let element = match ty.element_type {
        wasmparser::ValType::FuncRef => RefType::FuncRef,
        wasmparser::ValType::ExternRef => RefType::ExternRef,
        _ => {
            return Err(Error::Decode(
                "table element type must be funcref or externref".to_string(),
            ))
        }
    };
    let min = u32::try_from(ty.initial).map_err(|_| Error::Decode("table too large".to_string()))?;
    let max = ty
        .maximum
        .map(u32::try_from)
        .transpose()
        .map_err(|_| Error::Decode("table too large".to_string()))?;
    Ok(TableType { element, limits: Limits::new(min, max) })
}

fn convert_memory_type(ty: wasmparser::MemoryType) -> Result<MemoryType, Error> {
    if ty.memory64 {
        return Err(Error::Decode("64-bit memories are not supported".to_string()));
    }
    let min = u32::try_from(ty.initial).map_err(|_| Error::Decode("memory too large".to_string()))?;
    let max = ty
        .maximum
        .map(u32::try_from)
        .transpose()
        .map_err(|_| Error::Decode("memory too large".to_string()))?;
    Ok(MemoryType { limits: Limits::new(min, max), shared: ty.shared })
}

fn convert_global_type(ty: wasmparser::GlobalType) -> Result<GlobalType, Error> {
    let content = convert_value_type(ty.content_type)?;
    let mutability = if ty.mutable { Mutability::Var } else { Mutability::Const };
    Ok(GlobalType { content, mutability })
}

fn convert_block_type(ty: wasmparser::BlockType) -> Result<BlockType, Error> {
    match ty {
        wasmparser::BlockType::Empty => Ok(BlockType::Empty),
        wasmparser::BlockType::Type(vt) => Ok(BlockType::Value(convert_value_type(vt)?)),
        wasmparser::BlockType::FuncType(idx) => Ok(BlockType::FuncType(idx)),
    }
}

fn convert_memarg(m: wasmparser::MemArg) -> MemArg {
    MemArg { memidx: m.memory, offset: m.offset }
}

fn convert_heap_type(ty: wasmparser::HeapType) -> Result<RefType, Error> {
    match ty {
        wasmparser::HeapType::Abstract {
            shared: false,
            ty: wasmparser::AbstractHeapType::Func,
        } => Ok(RefType::FuncRef),
        wasmparser::HeapType::Abstract {
            shared: false,
            ty: wasmparser::AbstractHeapType::Extern,
        } => Ok(RefType::ExternRef),
        other => Err(Error::Decode(format!("unsupported heap type in ref.null: {other:?}"))),
    }
}

/// Decodes a bounded `ConstExpr` operator stream (global initializers, element/data offsets,
/// table item expressions) into the restricted opcode subset §4.4 allows. Shares
/// [`decode_instr`]'s opcode table rather than hand-rolling a second one; the validator's
/// `const_expr` flag, not the decoder, is what actually enforces the restriction.
/// Whether `instr` belongs to the threads proposal (shared-memory atomics), the family
/// [`Config::enable_threads`](crate::Config) gates independently of every other opcode class.
fn is_atomic_instr(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::MemoryAtomicWait { .. }
            | Instr::MemoryAtomicNotify { .. }
            | Instr::AtomicRmw(..)
            | Instr::AtomicCmpxchg(..)
            | Instr::AtomicLoad(..)
            | Instr::AtomicStore(..)
            | Instr::AtomicFence
    )
}

fn decode_const_expr(expr: wasmparser::ConstExpr<'_>) -> Result<Vec<Instr>, Error> {
    let mut reader = expr.get_operators_reader();
    let mut out = Vec::new();
    loop {
        let op = reader.read().map_err(wp_err)?;
        let is_end = matches!(op, wasmparser::Operator::End);
        out.push(decode_instr(op)?);
        if is_end {
            break;
        }
    }
    Ok(out)
}

/// Translates one [`wasmparser::Operator`] into this runtime's flattened [`Instr`].
///
/// Covers the MVP, sign-extension, non-trapping-float-to-int, bulk-memory, reference-types and
/// (threads proposal) full-width atomics opcode sets; anything else -- SIMD, exceptions, GC,
/// tail calls, sub-word atomics -- is rejected with a decode error rather than silently
/// mistranslated (Non-goals: SIMD, exception handling, GC, tail calls are all out of scope).
fn decode_instr(op: wasmparser::Operator<'_>) -> Result<Instr, Error> {
    use wasmparser::Operator as O;
    Ok(match op {
        O::Unreachable => Instr::Unreachable,
        O::Nop => Instr::Nop,
        O::Block { blockty } => Instr::Block(convert_block_type(blockty)?),
        O::Loop { blockty } => Instr::Loop(convert_block_type(blockty)?),
        O::If { blockty } => Instr::If(convert_block_type(blockty)?),
        O::Else => Instr::Else,
        O::End => Instr::End,
        O::Br { relative_depth } => Instr::Br(relative_depth),
        O::BrIf { relative_depth } => Instr::BrIf(relative_depth),
        O::BrTable { targets } => {
            let default = targets.default();
            let labels = targets
                .targets()
                .collect::<Result<Vec<_>, _>>()
                .map_err(wp_err)?;
            Instr::BrTable(Arc::from(labels), default)
        }
        O::Return => Instr::Return,
        O::Call { function_index } => Instr::Call(function_index),
        O::CallIndirect { type_index, table_index, .. } => {
            Instr::CallIndirect { type_idx: type_index, table_idx: table_index }
        }
        O::Drop => Instr::Drop,
        O::Select => Instr::Select,
        O::TypedSelect { ty } => Instr::SelectTyped(convert_value_type(ty)?),

        O::LocalGet { local_index } => Instr::LocalGet(local_index),
        O::LocalSet { local_index } => Instr::LocalSet(local_index),
        O::LocalTee { local_index } => Instr::LocalTee(local_index),
        O::GlobalGet { global_index } => Instr::GlobalGet(global_index),
        O::GlobalSet { global_index } => Instr::GlobalSet(global_index),

        O::TableGet { table } => Instr::TableGet(table),
        O::TableSet { table } => Instr::TableSet(table),
        O::TableSize { table } => Instr::TableSize(table),
        O::TableGrow { table } => Instr::TableGrow(table),
        O::TableFill { table } => Instr::TableFill(table),
        O::TableCopy { dst_table, src_table } => {
            Instr::TableCopy { dst: dst_table, src: src_table }
        }
        O::TableInit { elem_index, table } => Instr::TableInit { table, elem: elem_index },
        O::ElemDrop { elem_index } => Instr::ElemDrop(elem_index),

        O::I32Load { memarg } => Instr::Load(IntOrFloatTy::I32, LoadWidth::Full, convert_memarg(memarg)),
        O::I64Load { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::Full, convert_memarg(memarg)),
        O::F32Load { memarg } => Instr::Load(IntOrFloatTy::F32, LoadWidth::Full, convert_memarg(memarg)),
        O::F64Load { memarg } => Instr::Load(IntOrFloatTy::F64, LoadWidth::Full, convert_memarg(memarg)),
        O::I32Load8S { memarg } => Instr::Load(IntOrFloatTy::I32, LoadWidth::I32_8S, convert_memarg(memarg)),
        O::I32Load8U { memarg } => Instr::Load(IntOrFloatTy::I32, LoadWidth::I32_8U, convert_memarg(memarg)),
        O::I32Load16S { memarg } => Instr::Load(IntOrFloatTy::I32, LoadWidth::I32_16S, convert_memarg(memarg)),
        O::I32Load16U { memarg } => Instr::Load(IntOrFloatTy::I32, LoadWidth::I32_16U, convert_memarg(memarg)),
        O::I64Load8S { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_8S, convert_memarg(memarg)),
        O::I64Load8U { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_8U, convert_memarg(memarg)),
        O::I64Load16S { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_16S, convert_memarg(memarg)),
        O::I64Load16U { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_16U, convert_memarg(memarg)),
        O::I64Load32S { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_32S, convert_memarg(memarg)),
        O::I64Load32U { memarg } => Instr::Load(IntOrFloatTy::I64, LoadWidth::I64_32U, convert_memarg(memarg)),

        O::I32Store { memarg } => Instr::Store(IntOrFloatTy::I32, StoreWidth::Full, convert_memarg(memarg)),
        O::I64Store { memarg } => Instr::Store(IntOrFloatTy::I64, StoreWidth::Full, convert_memarg(memarg)),
        O::F32Store { memarg } => Instr::Store(IntOrFloatTy::F32, StoreWidth::Full, convert_memarg(memarg)),
        O::F64Store { memarg } => Instr::Store(IntOrFloatTy::F64, StoreWidth::Full, convert_memarg(memarg)),
        O::I32Store8 { memarg } => Instr::Store(IntOrFloatTy::I32, StoreWidth::Low8, convert_memarg(memarg)),
        O::I32Store16 { memarg } => Instr::Store(IntOrFloatTy::I32, StoreWidth::Low16, convert_memarg(memarg)),
        O::I64Store8 { memarg } => Instr::Store(IntOrFloatTy::I64, StoreWidth::Low8, convert_memarg(memarg)),
        O::I64Store16 { memarg } => Instr::Store(IntOrFloatTy::I64, StoreWidth::Low16, convert_memarg(memarg)),
        O::I64Store32 { memarg } => Instr::Store(IntOrFloatTy::I64, StoreWidth::Low32, convert_memarg(memarg)),

        O::MemorySize { mem, .. } => Instr::MemorySize(mem),
        O::MemoryGrow { mem, .. } => Instr::MemoryGrow(mem),
        O::MemoryFill { mem } => Instr::MemoryFill(mem),
        O::MemoryCopy { dst_mem, src_mem } => Instr::MemoryCopy { dst: dst_mem, src: src_mem },
        O::MemoryInit { data_index, mem } => Instr::MemoryInit { mem, data: data_index },
        O::DataDrop { data_index } => Instr::DataDrop(data_index),

        O::I32Const { value } => Instr::I32Const(value),
        O::I64Const { value } => Instr::I64Const(value),
        O::F32Const { value } => Instr::F32Const(value.bits()),
        O::F64Const { value } => Instr::F64Const(value.bits()),

        O::I32Eqz => Instr::ITestOp(IntTy::I32, IntTestOp::Eqz),
        O::I64Eqz => Instr::ITestOp(IntTy::I64, IntTestOp::Eqz),
        O::I32Eq => Instr::IRelOp(IntTy::I32, IntRelOp::Eq),
        O::I32Ne => Instr::IRelOp(IntTy::I32, IntRelOp::Ne),
        O::I32LtS => Instr::IRelOp(IntTy::I32, IntRelOp::LtS),
        O::I32LtU => Instr::IRelOp(IntTy::I32, IntRelOp::LtU),
        O::I32GtS => Instr::IRelOp(IntTy::I32, IntRelOp::GtS),
        O::I32GtU => Instr::IRelOp(IntTy::I32, IntRelOp::GtU),
        O::I32LeS => Instr::IRelOp(IntTy::I32, IntRelOp::LeS),
        O::I32LeU => Instr::IRelOp(IntTy::I32, IntRelOp::LeU),
        O::I32GeS => Instr::IRelOp(IntTy::I32, IntRelOp::GeS),
        O::I32GeU => Instr::IRelOp(IntTy::I32, IntRelOp::GeU),
        O::I64Eq => Instr::IRelOp(IntTy::I64, IntRelOp::Eq),
        O::I64Ne => Instr::IRelOp(IntTy::I64, IntRelOp::Ne),
        O::I64LtS => Instr::IRelOp(IntTy::I64, IntRelOp::LtS),
        O::I64LtU => Instr::IRelOp(IntTy::I64, IntRelOp::LtU),
        O::I64GtS => Instr::IRelOp(IntTy::I64, IntRelOp::GtS),
        O::I64GtU => Instr::IRelOp(IntTy::I64, IntRelOp::GtU),
        O::I64LeS => Instr::IRelOp(IntTy::I64, IntRelOp::LeS),
        O::I64LeU => Instr::IRelOp(IntTy::I64, IntRelOp::LeU),
        O::I64GeS => Instr::IRelOp(IntTy::I64, IntRelOp::GeS),
        O::I64GeU => Instr::IRelOp(IntTy::I64, IntRelOp::GeU),

        O::F32Eq => Instr::FRelOp(FloatTy::F32, FloatRelOp::Eq),
        O::F32Ne => Instr::FRelOp(FloatTy::F32, FloatRelOp::Ne),
        O::F32Lt => Instr::FRelOp(FloatTy::F32, FloatRelOp::Lt),
        O::F32Gt => Instr::FRelOp(FloatTy::F32, FloatRelOp::Gt),
        O::F32Le => Instr::FRelOp(FloatTy::F32, FloatRelOp::Le),
        O::F32Ge => Instr::FRelOp(FloatTy::F32, FloatRelOp::Ge),
        O::F64Eq => Instr::FRelOp(FloatTy::F64, FloatRelOp::Eq),
        O::F64Ne => Instr::FRelOp(FloatTy::F64, FloatRelOp::Ne),
        O::F64Lt => Instr::FRelOp(FloatTy::F64, FloatRelOp::Lt),
        O::F64Gt => Instr::FRelOp(FloatTy::F64, FloatRelOp::Gt),
        O::F64Le => Instr::FRelOp(FloatTy::F64, FloatRelOp::Le),
        O::F64Ge => Instr::FRelOp(FloatTy::F64, FloatRelOp::Ge),

        O::I32Clz => Instr::IUnOp(IntTy::I32, IntUnOp::Clz),
        O::I32Ctz => Instr::IUnOp(IntTy::I32, IntUnOp::Ctz),
        O::I32Popcnt => Instr::IUnOp(IntTy::I32, IntUnOp::Popcnt),
        O::I64Clz => Instr::IUnOp(IntTy::I64, IntUnOp::Clz),
        O::I64Ctz => Instr::IUnOp(IntTy::I64, IntUnOp::Ctz),
        O::I64Popcnt => Instr::IUnOp(IntTy::I64, IntUnOp::Popcnt),

        O::I32Add => Instr::IBinOp(IntTy::I32, IntBinOp::Add),
        O::I32Sub => Instr::IBinOp(IntTy::I32, IntBinOp::Sub),
        O::I32Mul => Instr::IBinOp(IntTy::I32, IntBinOp::Mul),
        O::I32DivS => Instr::IBinOp(IntTy::I32, IntBinOp::DivS),
        O::I32DivU => Instr::IBinOp(IntTy::I32, IntBinOp::DivU),
        O::I32RemS => Instr::IBinOp(IntTy::I32, IntBinOp::RemS),
        O::I32RemU => Instr::IBinOp(IntTy::I32, IntBinOp::RemU),
        O::I32And => Instr::IBinOp(IntTy::I32, IntBinOp::And),
        O::I32Or => Instr::IBinOp(IntTy::I32, IntBinOp::Or),
        O::I32Xor => Instr::IBinOp(IntTy::I32, IntBinOp::Xor),
        O::I32Shl => Instr::IBinOp(IntTy::I32, IntBinOp::Shl),
        O::I32ShrS => Instr::IBinOp(IntTy::I32, IntBinOp::ShrS),
        O::I32ShrU => Instr::IBinOp(IntTy::I32, IntBinOp::ShrU),
        O::I32Rotl => Instr::IBinOp(IntTy::I32, IntBinOp::Rotl),
        O::I32Rotr => Instr::IBinOp(IntTy::I32, IntBinOp::Rotr),

        O::I64Add => Instr::IBinOp(IntTy::I64, IntBinOp::Add),
        O::I64Sub => Instr::IBinOp(IntTy::I64, IntBinOp::Sub),
        O::I64Mul => Instr::IBinOp(IntTy::I64, IntBinOp::Mul),
        O::I64DivS => Instr::IBinOp(IntTy::I64, IntBinOp::DivS),
        O::I64DivU => Instr::IBinOp(IntTy::I64, IntBinOp::DivU),
        O::I64RemS => Instr::IBinOp(IntTy::I64, IntBinOp::RemS),
        O::I64RemU => Instr::IBinOp(IntTy::I64, IntBinOp::RemU),
        O::I64And => Instr::IBinOp(IntTy::I64, IntBinOp::And),
        O::I64Or => Instr::IBinOp(IntTy::I64, IntBinOp::Or),
        O::I64Xor => Instr::IBinOp(IntTy::I64, IntBinOp::Xor),
        O::I64Shl => Instr::IBinOp(IntTy::I64, IntBinOp::Shl),
        O::I64ShrS => Instr::IBinOp(IntTy::I64, IntBinOp::ShrS),
        O::I64ShrU => Instr::IBinOp(IntTy::I64, IntBinOp::ShrU),
        O::I64Rotl => Instr::IBinOp(IntTy::I64, IntBinOp::Rotl),
        O::I64Rotr => Instr::IBinOp(IntTy::I64, IntBinOp::Rotr),

        O::F32Abs => Instr::FUnOp(FloatTy::F32, FloatUnOp::Abs),
        O::F32Neg => Instr::FUnOp(FloatTy::F32, FloatUnOp::Neg),
        O::F32Ceil => Instr::FUnOp(FloatTy::F32, FloatUnOp::Ceil),
        O::F32Floor => Instr::FUnOp(FloatTy::F32, FloatUnOp::Floor),
        O::F32Trunc => Instr::FUnOp(FloatTy::F32, FloatUnOp::Trunc),
        O::F32Nearest => Instr::FUnOp(FloatTy::F32, FloatUnOp::Nearest),
        O::F32Sqrt => Instr::FUnOp(FloatTy::F32, FloatUnOp::Sqrt),
        O::F64Abs => Instr::FUnOp(FloatTy::F64, FloatUnOp::Abs),
        O::F64Neg => Instr::FUnOp(FloatTy::F64, FloatUnOp::Neg),
        O::F64Ceil => Instr::FUnOp(FloatTy::F64, FloatUnOp::Ceil),
        O::F64Floor => Instr::FUnOp(FloatTy::F64, FloatUnOp::Floor),
        O::F64Trunc => Instr::FUnOp(FloatTy::F64, FloatUnOp::Trunc),
        O::F64Nearest => Instr::FUnOp(FloatTy::F64, FloatUnOp::Nearest),
        O::F64Sqrt => Instr::FUnOp(FloatTy::F64, FloatUnOp::Sqrt),

        O::F32Add => Instr::FBinOp(FloatTy::F32, FloatBinOp::Add),
        O::F32Sub => Instr::FBinOp(FloatTy::F32, FloatBinOp::Sub),
        O::F32Mul => Instr::FBinOp(FloatTy::F32, FloatBinOp::Mul),
        O::F32Div => Instr::FBinOp(FloatTy::F32, FloatBinOp::Div),
        O::F32Min => Instr::FBinOp(FloatTy::F32, FloatBinOp::Min),
        O::F32Max => Instr::FBinOp(FloatTy::F32, FloatBinOp::Max),
        O::F32Copysign => Instr::FBinOp(FloatTy::F32, FloatBinOp::Copysign),
        O::F64Add => Instr::FBinOp(FloatTy::F64, FloatBinOp::Add),
        O::F64Sub => Instr::FBinOp(FloatTy::F64, FloatBinOp::Sub),
        O::F64Mul => Instr::FBinOp(FloatTy::F64, FloatBinOp::Mul),
        O::F64Div => Instr::FBinOp(FloatTy::F64, FloatBinOp::Div),
        O::F64Min => Instr::FBinOp(FloatTy::F64, FloatBinOp::Min),
        O::F64Max => Instr::FBinOp(FloatTy::F64, FloatBinOp::Max),
        O::F64Copysign => Instr::FBinOp(FloatTy::F64, FloatBinOp::Copysign),

        O::I32WrapI64 => Instr::Cvt(Cvt::I32WrapI64),
        O::I64ExtendI32S => Instr::Cvt(Cvt::I64ExtendI32S),
        O::I64ExtendI32U => Instr::Cvt(Cvt::I64ExtendI32U),
        O::I32TruncF32S => Instr::Cvt(Cvt::I32TruncF32S),
        O::I32TruncF32U => Instr::Cvt(Cvt::I32TruncF32U),
        O::I32TruncF64S => Instr::Cvt(Cvt::I32TruncF64S),
        O::I32TruncF64U => Instr::Cvt(Cvt::I32TruncF64U),
        O::I64TruncF32S => Instr::Cvt(Cvt::I64TruncF32S),
        O::I64TruncF32U => Instr::Cvt(Cvt::I64TruncF32U),
        O::I64TruncF64S => Instr::Cvt(Cvt::I64TruncF64S),
        O::I64TruncF64U => Instr::Cvt(Cvt::I64TruncF64U),
        O::I32TruncSatF32S => Instr::Cvt(Cvt::I32TruncSatF32S),
        O::I32TruncSatF32U => Instr::Cvt(Cvt::I32TruncSatF32U),
        O::I32TruncSatF64S => Instr::Cvt(Cvt::I32TruncSatF64S),
        O::I32TruncSatF64U => Instr::Cvt(Cvt::I32TruncSatF64U),
        O::I64TruncSatF32S => Instr::Cvt(Cvt::I64TruncSatF32S),
        O::I64TruncSatF32U => Instr::Cvt(Cvt::I64TruncSatF32U),
        O::I64TruncSatF64S => Instr::Cvt(Cvt::I64TruncSatF64S),
        O::I64TruncSatF64U => Instr::Cvt(Cvt::I64TruncSatF64U),
        O::F32ConvertI32S => Instr::Cvt(Cvt::F32ConvertI32S),
        O::F32ConvertI32U => Instr::Cvt(Cvt::F32ConvertI32U),
        O::F32ConvertI64S => Instr::Cvt(Cvt::F32ConvertI64S),
        O::F32ConvertI64U => Instr::Cvt(Cvt::F32ConvertI64U),
        O::F64ConvertI32S => Instr::Cvt(Cvt::F64ConvertI32S),
        O::F64ConvertI32U => Instr::Cvt(Cvt::F64ConvertI32U),
        O::F64ConvertI64S => Instr::Cvt(Cvt::F64ConvertI64S),
        O::F64ConvertI64U => Instr::Cvt(Cvt::F64ConvertI64U),
        O::F32DemoteF64 => Instr::Cvt(Cvt::F32DemoteF64),
        O::F64PromoteF32 => Instr::Cvt(Cvt::F64PromoteF32),
        O::I32ReinterpretF32 => Instr::Cvt(Cvt::I32ReinterpretF32),
        O::I64ReinterpretF64 => Instr::Cvt(Cvt::I64ReinterpretF64),
        O::F32ReinterpretI32 => Instr::Cvt(Cvt::F32ReinterpretI32),
        O::F64ReinterpretI64 => Instr::Cvt(Cvt::F64ReinterpretI64),
        O::I32Extend8S => Instr::Cvt(Cvt::I32Extend8S),
        O::I32Extend16S => Instr::Cvt(Cvt::I32Extend16S),
        O::I64Extend8S => Instr::Cvt(Cvt::I64Extend8S),
        O::I64Extend16S => Instr::Cvt(Cvt::I64Extend16S),
        O::I64Extend32S => Instr::Cvt(Cvt::I64Extend32S),

        O::RefNull { hty } => Instr::RefNull(convert_heap_type(hty)?),
        O::RefIsNull => Instr::RefIsNull,
        O::RefFunc { function_index } => Instr::RefFunc(function_index),

        O::MemoryAtomicNotify { memarg } => Instr::MemoryAtomicNotify { arg: convert_memarg(memarg) },
        O::MemoryAtomicWait32 { memarg } => {
            Instr::MemoryAtomicWait { ty: IntTy::I32, arg: convert_memarg(memarg) }
        }
        O::MemoryAtomicWait64 { memarg } => {
            Instr::MemoryAtomicWait { ty: IntTy::I64, arg: convert_memarg(memarg) }
        }
        O::AtomicFence { .. } => Instr::AtomicFence,
        O::I32AtomicLoad { memarg } => Instr::AtomicLoad(IntTy::I32, convert_memarg(memarg)),
        O::I64AtomicLoad { memarg } => Instr::AtomicLoad(IntTy::I64, convert_memarg(memarg)),
        O::I32AtomicStore { memarg } => Instr::AtomicStore(IntTy::I32, convert_memarg(memarg)),
        O::I64AtomicStore { memarg } => Instr::AtomicStore(IntTy::I64, convert_memarg(memarg)),
        O::I32AtomicRmwAdd { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::Add, convert_memarg(memarg))
        }
        O::I32AtomicRmwSub { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::Sub, convert_memarg(memarg))
        }
        O::I32AtomicRmwAnd { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::And, convert_memarg(memarg))
        }
        O::I32AtomicRmwOr { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::Or, convert_memarg(memarg))
        }
        O::I32AtomicRmwXor { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::Xor, convert_memarg(memarg))
        }
        O::I32AtomicRmwXchg { memarg } => {
            Instr::AtomicRmw(IntTy::I32, AtomicRmwOp::Xchg, convert_memarg(memarg))
        }
        O::I32AtomicRmwCmpxchg { memarg } => Instr::AtomicCmpxchg(IntTy::I32, convert_memarg(memarg)),
        O::I64AtomicRmwAdd { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::Add, convert_memarg(memarg))
        }
        O::I64AtomicRmwSub { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::Sub, convert_memarg(memarg))
        }
        O::I64AtomicRmwAnd { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::And, convert_memarg(memarg))
        }
        O::I64AtomicRmwOr { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::Or, convert_memarg(memarg))
        }
        O::I64AtomicRmwXor { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::Xor, convert_memarg(memarg))
        }
        O::I64AtomicRmwXchg { memarg } => {
            Instr::AtomicRmw(IntTy::I64, AtomicRmwOp::Xchg, convert_memarg(memarg))
        }
        O::I64AtomicRmwCmpxchg { memarg } => Instr::AtomicCmpxchg(IntTy::I64, convert_memarg(memarg)),

        other => {
            return Err(Error::Decode(format!(
                "unsupported instruction (SIMD, exceptions, GC, tail calls, sub-word atomics \
                 and the component model are out of scope): {other:?}"
            )))
        }
    })
}
