//! quill-compiler — turns a parsed [`quill_ast::Program`] into a
//! [`quill_bytecode::Chunk`].
//!
//! Globals and top-level statements are emitted first, followed by a
//! `HALT`, followed by every function body back to back — the layout the
//! container format and the verifier both assume. Locals live on the VM's
//! value stack at a slot fixed at compile time; there is no heap of
//! boxed variables to manage.

#![deny(missing_docs)]

mod compiler;
mod error;
mod resolver;

pub use compiler::{compile, CompileOutcome};
pub use error::CompileError;
pub use resolver::{IncludeResolver, NullResolver};
