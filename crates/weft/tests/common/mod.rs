#![allow(dead_code)]

use parking_lot::{Mutex, MutexGuard};

use weft::RuntimeConfig;

// The runtime is process-global and the harness runs tests on many OS
// threads, so every test that initializes it serializes on this gate.
static RUNTIME_GATE: Mutex<()> = Mutex::new(());

pub fn runtime_lock() -> MutexGuard<'static, ()> {
    RUNTIME_GATE.lock()
}

/// Runs `body` inside a freshly initialized runtime, holding the gate for
/// the whole test so no other test can see the global state.
pub fn with_runtime<R>(config: RuntimeConfig, body: impl FnOnce() -> R) -> R {
    let _gate = runtime_lock();
    weft::init(config).expect("runtime init");
    let out = body();
    weft::shutdown().expect("runtime shutdown");
    out
}

pub fn small_config() -> RuntimeConfig {
    RuntimeConfig {
        max_threads: 8,
        stack_size: 32 * 1024,
        ..RuntimeConfig::default()
    }
}
