//! `waspvm`: a WebAssembly interpreter with threads-proposal atomics support.
//!
//! The pipeline is the usual four stages (Data Model §3): [`decode_module`] turns a raw binary
//! into a validated, immutable [`Module`]; [`Instance::instantiate`] resolves its imports against
//! an [`ImportObject`] and runs its start function; an [`exec::ExecContext`] then drives calls
//! into it. Everything above the value/trap vocabulary in `waspvm-core` and the jump-table
//! builder in `waspvm-validation` lives here: decoding, instance state, the interpreter itself.

extern crate alloc;

mod atomics;
mod config;
mod constexpr;
mod decode;
mod error;
mod exec;
mod func;
mod global;
mod instance;
mod memory;
mod module;
mod table;
mod types;

pub use config::Config;
pub use decode::decode_module;
pub use error::{Error, LinkError};
pub use exec::ExecContext;
pub use func::{FuncInst, HostFn, HostFuncRef, WasmFuncRef};
pub use global::GlobalInst;
pub use instance::{Extern, ImportObject, Instance};
pub use memory::MemInst;
pub use module::{
    DataKind, DataSegment, ElementKind, ElementSegment, Export, ExportDesc, FuncDef, GlobalDef,
    Import, Module,
};
pub use table::TableInst;
pub use types::{ExternType, GlobalType, Limits, MemoryType, TableType};

pub use waspvm_core::{
    FuncType, Mutability, RefType, ResultType, Trap, TrapCode, Val, ValueType, F32, F64,
};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    fn compile(wat: &str) -> Module {
        let wasm = wat::parse_str(wat).expect("valid wat");
        decode_module(&wasm, &Config::default()).expect("module should decode and validate")
    }

    #[test]
    fn instantiates_empty_module() {
        let module = compile("(module)");
        let imports = ImportObject::new();
        let config = Config::default();
        Instance::instantiate(&module, &imports, &config).expect("empty module instantiates");
    }

    #[test]
    fn calls_an_exported_add_function() {
        let module = compile(
            r#"(module
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add))"#,
        );
        let imports = ImportObject::new();
        let config = Config::default();
        let instance = Instance::instantiate(&module, &imports, &config).unwrap();
        let func_idx = module
            .exports
            .iter()
            .find_map(|e| match &e.desc {
                module::ExportDesc::Func(idx) if e.name == "add" => Some(*idx),
                _ => None,
            })
            .expect("add is exported");
        let mut cx = ExecContext::new(Arc::clone(&instance), config);
        let results = cx.call(func_idx, &[Val::I32(2), Val::I32(40)]).unwrap();
        assert_eq!(results, alloc::vec![Val::I32(42)]);
    }

    #[test]
    fn traps_on_division_by_zero() {
        let module = compile(
            r#"(module
                (func (export "divzero") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.div_s))"#,
        );
        let imports = ImportObject::new();
        let config = Config::default();
        let instance = Instance::instantiate(&module, &imports, &config).unwrap();
        let func_idx = module
            .exports
            .iter()
            .find_map(|e| match &e.desc {
                module::ExportDesc::Func(idx) if e.name == "divzero" => Some(*idx),
                _ => None,
            })
            .unwrap();
        let mut cx = ExecContext::new(Arc::clone(&instance), config);
        let err = cx.call(func_idx, &[Val::I32(1), Val::I32(0)]).unwrap_err();
        match err {
            Error::Trap(trap) => assert_eq!(trap.code(), TrapCode::DivByZero),
            other => panic!("expected a trap, got {other}"),
        }
    }

    #[test]
    fn shared_memory_is_rejected_with_threads_disabled() {
        let wasm = wat::parse_str(r#"(module (memory 1 1 shared))"#).expect("valid wat");
        let config = Config { enable_threads: false, ..Config::default() };
        let err = decode_module(&wasm, &config).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn atomic_opcode_is_rejected_with_threads_disabled() {
        let wasm = wat::parse_str(
            r#"(module
                (memory 1 1 shared)
                (func (export "f") (result i32)
                    i32.const 0
                    i32.atomic.load))"#,
        )
        .expect("valid wat");
        let config = Config { enable_threads: false, ..Config::default() };
        let err = decode_module(&wasm, &config).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
