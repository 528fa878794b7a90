//! Bytecode provenance metadata: who compiled a chunk, with what build, and
//! what source it came from. None of this is load-bearing for execution
//! except `compiler_type`/`compiler_flags`, which the shipping-build policy
//! checks before a chunk is trusted.

use bitflags::bitflags;

/// Identifies the kind of tool that produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompilerType {
    /// Compiled by a compiler embedded in the host application.
    HostIntegrated = 0,
    /// Compiled by the standalone `script-compiler` CLI.
    Standalone = 1,
    /// Compiled by a third-party or unvetted toolchain.
    External = 2,
    /// Provenance not recorded.
    Unknown = 255,
}

impl CompilerType {
    /// Decodes a raw byte, falling back to `Unknown` for anything
    /// unrecognized rather than failing the whole chunk.
    #[must_use]
    pub const fn from_u8(b: u8) -> Self {
        match b {
            0 => Self::HostIntegrated,
            1 => Self::Standalone,
            2 => Self::External,
            _ => Self::Unknown,
        }
    }
}

bitflags! {
    /// Bits describing how a chunk was built.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompilerFlags: u32 {
        /// Built by an official, released toolchain.
        const OFFICIAL_BUILD    = 1 << 0;
        /// Compiled from within an editor/IDE session.
        const EDITOR_COMPILED   = 1 << 1;
        /// A development build (debug assertions, unoptimized).
        const DEVELOPMENT_BUILD = 1 << 2;
        /// A shipping (release) build.
        const SHIPPING_BUILD    = 1 << 3;
        /// The source text is embedded or recoverable from the chunk.
        const INCLUDES_SOURCE   = 1 << 4;
        /// Debug symbols (line map) are present and trustworthy.
        const DEBUG_SYMBOLS     = 1 << 5;
        /// The chunk has been signed by a trusted authority.
        const TRUSTED_SIGNED    = 1 << 6;
        /// The chunk passed an additional security review/scan.
        const SECURITY_VERIFIED = 1 << 7;
    }
}

/// Provenance metadata carried alongside a chunk's code and constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// What kind of tool compiled this chunk.
    pub compiler_type: CompilerType,
    /// Build flags (see [`CompilerFlags`]).
    pub compiler_flags: CompilerFlags,
    /// Name of the compiler.
    pub compiler_name: String,
    /// Version of the compiler.
    pub compiler_version: String,
    /// Version of the embedding host engine, if any.
    pub engine_version: String,
    /// Name of the game/application this chunk belongs to.
    pub game_name: String,
    /// Version of the game/application.
    pub game_version: String,
    /// Name of the author who compiled this chunk.
    pub author_name: String,
    /// Operating system the chunk was compiled on.
    pub operating_system: String,
    /// Hostname of the machine that compiled this chunk.
    pub machine_name: String,
    /// Compilation timestamp, in host-defined ticks (not covered by the
    /// signature: it changes on every rebuild of otherwise-identical code).
    pub compilation_time: u64,
    /// Name of the original source file.
    pub source_file_name: String,
    /// Size in bytes of the original source file.
    pub source_file_size: u32,
    /// Checksum of the original source file (format is compiler-defined;
    /// the container does not interpret it).
    pub source_checksum: String,
    /// Whether this chunk represents mission/level content rather than
    /// general game logic.
    pub is_mission: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            compiler_type: CompilerType::Unknown,
            compiler_flags: CompilerFlags::empty(),
            compiler_name: String::new(),
            compiler_version: String::new(),
            engine_version: String::new(),
            game_name: String::new(),
            game_version: String::new(),
            author_name: String::new(),
            operating_system: String::new(),
            machine_name: String::new(),
            compilation_time: 0,
            source_file_name: String::new(),
            source_file_size: 0,
            source_checksum: String::new(),
            is_mission: false,
        }
    }
}
