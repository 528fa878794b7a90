//! The embedding application's single point of contact with the compiler
//! and the VM: logging, `import` resolution, and native-function dispatch.
//! Both `quill_compiler::compile` and `quill_vm::Vm::new` take a `Host` by
//! value (or a narrower view of one) instead of reaching for process-wide
//! statics.

use crate::value::Value;

/// Severity of a message handed to [`Host::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Routine progress (e.g. `PRINT` output).
    Info,
    /// A dev-build-only policy warning (see the container's shipping-build
    /// trust check) or other non-fatal concern.
    Warn,
    /// A runtime error message, mirroring what lands in `Vm::errors`.
    Error,
}

/// The narrow view of a VM a native function is allowed to see: enough to
/// request cooperative suspension, nothing else. Implemented by `quill_vm`;
/// kept here so a native's type signature doesn't need to name the VM
/// crate at all.
pub trait VmHandle {
    /// Requests that the VM pause after this native call returns. Calling
    /// this outside of a native's own invocation has no effect.
    fn pause(&mut self);
}

/// Host integration surface threaded through `Compiler::new`/`Vm::new`.
/// Default method bodies make every hook optional: an embedder that only
/// cares about natives can ignore logging and imports entirely.
pub trait Host {
    /// Receives a log message from the compiler or VM.
    fn log(&mut self, level: LogLevel, message: &str) {
        let _ = (level, message);
    }

    /// Resolves an `import` path to source text, or `None` if this host
    /// doesn't support imports or couldn't find the one named.
    fn resolve_include(&mut self, path: &str) -> Option<String> {
        let _ = path;
        None
    }

    /// Dispatches a native call by name. Returns `None` if no native by
    /// that name is registered, which the VM surfaces as `UnknownNative`.
    fn call_native(&mut self, name: &str, vm: &mut dyn VmHandle, args: &[Value]) -> Option<Value> {
        let _ = (name, vm, args);
        None
    }
}
