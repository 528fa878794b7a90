//! A ready-made [`Host`] for embedders that just want to register a few
//! native functions and have everything else (logging, `import`
//! resolution) behave sensibly by default.

use std::collections::HashMap;

use quill_bytecode::{Host, LogLevel, Value, VmHandle};

/// A native function: takes the calling VM (narrowed to [`VmHandle`]) and
/// its arguments, returns a value. Natives never fail outright — a native
/// that can't satisfy a call should log and return `Value::Nil`, since
/// there's no runtime error kind dedicated to native-side rejection.
pub type NativeFn = Box<dyn Fn(&mut dyn VmHandle, &[Value]) -> Value>;

/// A [`Host`] that logs to stderr (via the `log` crate) and dispatches
/// natives from an in-process registry. Imports are not resolved unless a
/// caller wraps this with something that overrides `resolve_include`.
#[derive(Default)]
pub struct StderrHost {
    natives: HashMap<String, NativeFn>,
}

impl StderrHost {
    /// An empty host with no natives registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a native function under `name`.
    pub fn register_native(&mut self, name: impl Into<String>, f: NativeFn) {
        self.natives.insert(name.into(), f);
    }
}

impl Host for StderrHost {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
        }
    }

    fn call_native(&mut self, name: &str, vm: &mut dyn VmHandle, args: &[Value]) -> Option<Value> {
        self.natives.get(name).map(|f| f(vm, args))
    }
}
