extern crate alloc;

use alloc::sync::Arc;
use waspvm::{Config, ExportDesc, ExecContext, ImportObject, Instance, Val};

fn decode(wat: &str) -> waspvm::Module {
    let wasm = wat::parse_str(wat).expect("valid wat");
    waspvm::decode_module(&wasm, &Config::default()).expect("module should decode and validate")
}

fn find_func_export(module: &waspvm::Module, name: &str) -> u32 {
    module
        .exports
        .iter()
        .find_map(|e| match (e.name.as_str(), e.desc) {
            (n, ExportDesc::Func(idx)) if n == name => Some(idx),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function export named {name}"))
}

#[test]
fn instantiate_out_of_bounds_active_data_segment_fails() {
    let module = decode(
        r#"(module
            (memory 1 1)
            (data (i32.const 70000) "\ff"))"#,
    );
    let imports = ImportObject::new();
    let config = Config::default();
    Instance::instantiate(&module, &imports, &config).unwrap_err();
}

#[test]
fn instantiate_out_of_bounds_active_element_segment_fails() {
    let module = decode(
        r#"(module
            (table 1 funcref)
            (func $f)
            (elem (i32.const 5) func $f))"#,
    );
    let imports = ImportObject::new();
    let config = Config::default();
    Instance::instantiate(&module, &imports, &config).unwrap_err();
}

#[test]
fn start_function_runs_during_instantiation() {
    let module = decode(
        r#"(module
            (global $g (mut i32) (i32.const 0))
            (func $start
                i32.const 42
                global.set $g)
            (start $start)
            (func (export "get_g") (result i32)
                global.get $g))"#,
    );
    let imports = ImportObject::new();
    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();
    let mut cx = ExecContext::new(Arc::clone(&instance), config);
    let func_idx = find_func_export(&module, "get_g");
    let results = cx.call(func_idx, &[]).unwrap();
    assert_eq!(results, alloc::vec![Val::I32(42)]);
}

#[test]
fn missing_import_is_a_link_error() {
    let module = decode(
        r#"(module
            (import "env" "missing" (func)))"#,
    );
    let imports = ImportObject::new();
    let config = Config::default();
    let err = Instance::instantiate(&module, &imports, &config).unwrap_err();
    assert!(matches!(err, waspvm::Error::Link(waspvm::LinkError::Missing { .. })));
}

#[test]
fn import_type_mismatch_is_a_link_error() {
    let module = decode(
        r#"(module
            (import "env" "f" (func (param i32))))"#,
    );
    let mut imports = ImportObject::new();
    imports.define(
        "env",
        "f",
        waspvm::Extern::Func(waspvm::FuncInst::Host(waspvm::HostFuncRef {
            ty: waspvm::FuncType::new(vec![], vec![]),
            func: Arc::new(|_cx, _params, _results| Ok(())),
        })),
    );
    let config = Config::default();
    let err = Instance::instantiate(&module, &imports, &config).unwrap_err();
    assert!(matches!(
        err,
        waspvm::Error::Link(waspvm::LinkError::TypeMismatch { .. })
    ));
}
