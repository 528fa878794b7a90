//! Compile-time errors: everything that can go wrong turning a [`quill_ast::Program`]
//! into bytecode, independent of the lexing/parsing stage that came before it.

/// What went wrong while compiling a program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The same function name was declared twice at the top level.
    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),
    /// `break` appeared outside any loop or `switch`.
    #[error("'break' used outside a loop or switch")]
    BreakOutsideLoop,
    /// `continue` appeared outside any loop.
    #[error("'continue' used outside a loop")]
    ContinueOutsideLoop,
    /// A `return` statement's presence (or value) doesn't match the
    /// function's declared return type: a value returned from a `void`
    /// function, or a bare `return;` in a non-`void` function.
    #[error("invalid return in function '{0}': {1}")]
    InvalidReturnType(String, String),
    /// An `import` path was already being resolved higher up the import
    /// chain when it was encountered again.
    #[error("circular import: '{0}'")]
    CircularImport(String),
    /// An `import` path could not be resolved by the host's include
    /// resolver, or was used somewhere other than the top level.
    #[error("unresolved import: '{0}'")]
    UnresolvedImport(String),
    /// The constant pool grew past its 256-entry, 1-byte-index limit.
    #[error("too many distinct constants in one chunk (limit is 256)")]
    TooManyConstants,
    /// A function scope accumulated more than 256 local variables (including
    /// its parameters).
    #[error("too many local variables in one function (limit is 256)")]
    TooManyLocals,
}
