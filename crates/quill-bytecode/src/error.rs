//! Errors raised while decoding or verifying a chunk. The container format
//! and the verifier are the only place untrusted bytes become a trusted
//! [`crate::Chunk`]; nothing downstream re-checks these invariants.

/// Failure modes for container decoding and chunk verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
    /// The file did not start with the `SBC1` magic number.
    #[error("bad magic number")]
    BadMagic,
    /// The chunk's format version isn't one this toolchain understands.
    #[error("unsupported bytecode version {0}")]
    UnsupportedVersion(u32),
    /// The recomputed signature didn't match the one stored in the chunk.
    #[error("signature mismatch")]
    SignatureMismatch,
    /// The compressed payload failed to inflate.
    #[error("failed to decompress payload: {0}")]
    DecompressionFailed(String),
    /// A structural invariant (in-range index, valid jump target, aligned
    /// opcode boundary, ...) was violated at the given byte offset.
    #[error("malformed bytecode at offset {offset}: {reason}")]
    MalformedBytecode {
        /// Byte offset into `code` where the problem was found.
        offset: u32,
        /// What was wrong.
        reason: String,
    },
    /// A shipping build policy rejected this chunk's provenance.
    #[error("untrusted compiler for a shipping build: {0}")]
    UntrustedCompiler(String),
    /// Reading or writing the underlying bytes failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<quill_core::CoreError> for BytecodeError {
    fn from(e: quill_core::CoreError) -> Self {
        Self::Io(e.to_string())
    }
}
