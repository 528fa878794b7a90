//! The host hook used to resolve `import` statements. Kept separate from
//! any VM-facing `Host` trait: the compiler never needs natives, a log
//! sink, or pause/resume, only a way to turn an import path into source
//! text, so it gets the narrowest interface that can do that.

/// Resolves an `import "path";` statement to source text.
///
/// Implementations decide what a path means — a filesystem path relative to
/// some root, a key into an in-memory bundle, a network fetch — the
/// compiler only cares whether a path resolves and, if so, to what text.
pub trait IncludeResolver {
    /// Returns the source text for `path`, or `None` if it can't be found.
    fn resolve(&mut self, path: &str) -> Option<String>;
}

/// An [`IncludeResolver`] that never resolves anything. Every `import`
/// compiles to an `UnresolvedImport` error. The right default for a
/// standalone script with no host-provided include mechanism.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl IncludeResolver for NullResolver {
    fn resolve(&mut self, _path: &str) -> Option<String> {
        None
    }
}

/// Any full `Host` (the handle also threaded through `Vm::new`) doubles as
/// an `IncludeResolver`, so a single host implementation can be passed to
/// both `quill_compiler::compile` and `quill_vm::Vm::new`.
impl<H: quill_bytecode::Host> IncludeResolver for H {
    fn resolve(&mut self, path: &str) -> Option<String> {
        self.resolve_include(path)
    }
}
