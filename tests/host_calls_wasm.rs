//! A host function that calls back into the same instance's exports, and a host function that
//! returns a trap the guest never gets a chance to recover from.

extern crate alloc;

use alloc::sync::Arc;
use waspvm::{
    Config, ExecContext, Extern, FuncInst, FuncType, HostFuncRef, ImportObject, Instance,
    Trap, TrapCode, Val, ValueType,
};

fn decode(wat: &str) -> waspvm::Module {
    let wasm = wat::parse_str(wat).expect("valid wat");
    waspvm::decode_module(&wasm, &Config::default()).expect("module should decode and validate")
}

fn func_export(module: &waspvm::Module, name: &str) -> u32 {
    module
        .exports
        .iter()
        .find_map(|e| match (e.name.as_str(), e.desc) {
            (n, waspvm::ExportDesc::Func(idx)) if n == name => Some(idx),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function export named {name}"))
}

#[test]
fn host_function_calls_back_into_wasm() {
    let module = decode(
        r#"(module
            (import "env" "double_via_host" (func $double_via_host (param i32) (result i32)))
            (func (export "run") (param i32) (result i32)
                local.get 0
                call $double_via_host)
            (func (export "square") (param i32) (result i32)
                local.get 0
                local.get 0
                i32.mul))"#,
    );

    let mut imports = ImportObject::new();
    imports.define(
        "env",
        "double_via_host",
        Extern::Func(FuncInst::Host(HostFuncRef {
            ty: FuncType::new(vec![ValueType::I32], vec![ValueType::I32]),
            func: Arc::new(|cx: &mut ExecContext, params: &[u32], results: &mut [u32]| {
                let n = params[0] as i32;
                let instance = Arc::clone(cx.instance());
                let square = func_export(instance.module(), "square");
                let doubled = cx.call(square, &[Val::I32(n + n)])?;
                results[0] = match doubled[0] {
                    Val::I32(v) => v as u32,
                    _ => unreachable!("square returns i32"),
                };
                Ok(())
            }),
        })),
    );

    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();
    let mut cx = ExecContext::new(Arc::clone(&instance), config);
    let run = func_export(&module, "run");
    let results = cx.call(run, &[Val::I32(3)]).unwrap();
    assert_eq!(results, alloc::vec![Val::I32(36)]);
}

#[test]
fn host_function_trap_unwinds_the_guest_call() {
    let module = decode(
        r#"(module
            (import "env" "fail" (func $fail))
            (func (export "run")
                call $fail))"#,
    );

    let mut imports = ImportObject::new();
    imports.define(
        "env",
        "fail",
        Extern::Func(FuncInst::Host(HostFuncRef {
            ty: FuncType::new(vec![], vec![]),
            func: Arc::new(|_cx, _params, _results| {
                Err(Trap::new(TrapCode::Misc, "host refused"))
            }),
        })),
    );

    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();
    let mut cx = ExecContext::new(Arc::clone(&instance), config);
    let run = func_export(&module, "run");
    let err = cx.call(run, &[]).unwrap_err();
    match err {
        waspvm::Error::Trap(trap) => assert_eq!(trap.message(), "host refused"),
        other => panic!("expected a trap, got {other}"),
    }
}
