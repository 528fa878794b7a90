//! quill-vm — a stack-based virtual machine that executes verified
//! [`quill_bytecode::Chunk`]s under strict resource limits. Never panics
//! into the embedding host: every failure mode surfaces as a
//! [`RuntimeError`] and a transition to [`State::Error`].

#![deny(missing_docs)]

mod error;
mod frame;
mod host;
mod limits;
mod state;
mod vm;

pub use error::RuntimeError;
pub use frame::Frame;
pub use host::{NativeFn, StderrHost};
pub use limits::Limits;
pub use state::State;
pub use vm::Vm;
