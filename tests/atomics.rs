//! `memory.atomic.wait32` / `memory.atomic.notify` across two real OS threads sharing one
//! instance, exercising the waitlist end to end rather than only `waspvm-core`'s unit tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use waspvm::{Config, ExecContext, ImportObject, Instance, Val};

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

fn shared_memory_module() -> waspvm::Module {
    decode(
        r#"(module
            (memory (export "mem") 1 1 shared)
            (func (export "wait") (param i32 i32 i64) (result i32)
                local.get 0
                local.get 1
                local.get 2
                memory.atomic.wait32)
            (func (export "notify") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                memory.atomic.notify))"#,
    )
}

#[test]
fn notify_wakes_a_blocked_waiter() {
    let module = shared_memory_module();
    let imports = ImportObject::new();
    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();

    let wait_idx = func_export(&module, "wait");
    let notify_idx = func_export(&module, "notify");

    let waiter_instance = Arc::clone(&instance);
    let waiter = thread::spawn(move || {
        let mut cx = ExecContext::new(waiter_instance, config);
        // memory starts zeroed; wait while the cell at address 0 still reads 0, for up to 5s.
        cx.call(wait_idx, &[Val::I32(0), Val::I32(0), Val::I64(5_000_000_000)])
            .unwrap()
    });

    // Give the waiter a head start so it is parked before we notify it.
    thread::sleep(Duration::from_millis(100));

    let mut notifier_cx = ExecContext::new(Arc::clone(&instance), config);
    let woken = notifier_cx.call(notify_idx, &[Val::I32(0), Val::I32(1)]).unwrap();
    assert_eq!(woken, vec![Val::I32(1)]);

    let result = waiter.join().unwrap();
    assert_eq!(result, vec![Val::I32(0)], "0 means woken by notify, not timed out");
}

#[test]
fn wait_times_out_without_a_notify() {
    let module = shared_memory_module();
    let imports = ImportObject::new();
    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();
    let wait_idx = func_export(&module, "wait");

    let mut cx = ExecContext::new(instance, config);
    let result = cx
        .call(wait_idx, &[Val::I32(0), Val::I32(0), Val::I64(50_000_000)])
        .unwrap();
    assert_eq!(result, vec![Val::I32(2)], "2 means timed out");
}

#[test]
fn fifo_notify_wakes_only_the_earliest_waiters() {
    let module = shared_memory_module();
    let imports = ImportObject::new();
    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();

    let wait_idx = func_export(&module, "wait");
    let notify_idx = func_export(&module, "notify");

    // Stagger each spawn so waiter `i` is already parked before waiter `i + 1` calls `wait`,
    // guaranteeing the waitlist's enqueue order matches spawn order below.
    let spawn_waiter = |timeout_ns: i64| {
        let instance = Arc::clone(&instance);
        let handle = thread::spawn(move || {
            let mut cx = ExecContext::new(instance, config);
            cx.call(wait_idx, &[Val::I32(0), Val::I32(0), Val::I64(timeout_ns)])
                .unwrap()
        });
        thread::sleep(Duration::from_millis(100));
        handle
    };

    let first = spawn_waiter(5_000_000_000);
    let second = spawn_waiter(5_000_000_000);
    let third = spawn_waiter(200_000_000);

    let mut notifier_cx = ExecContext::new(Arc::clone(&instance), config);
    let woken = notifier_cx.call(notify_idx, &[Val::I32(0), Val::I32(2)]).unwrap();
    assert_eq!(woken, vec![Val::I32(2)], "notify(count=2) wakes exactly two");

    assert_eq!(first.join().unwrap(), vec![Val::I32(0)], "first-enqueued waiter is woken");
    assert_eq!(second.join().unwrap(), vec![Val::I32(0)], "second-enqueued waiter is woken");
    assert_eq!(
        third.join().unwrap(),
        vec![Val::I32(2)],
        "third waiter was left out of notify(count=2) and times out unwoken"
    );
}

#[test]
fn wait_returns_immediately_when_the_expected_value_does_not_match() {
    let module = shared_memory_module();
    let imports = ImportObject::new();
    let config = Config::default();
    let instance = Instance::instantiate(&module, &imports, &config).unwrap();
    let wait_idx = func_export(&module, "wait");

    let mut cx = ExecContext::new(instance, config);
    // expected value 1 never matches the zeroed memory cell at address 0.
    let result = cx
        .call(wait_idx, &[Val::I32(0), Val::I32(1), Val::I64(5_000_000_000)])
        .unwrap();
    assert_eq!(result, vec![Val::I32(1)], "1 means the value didn't match");
}
