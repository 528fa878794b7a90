//! The in-memory bytecode chunk: the complete output of the compiler, and
//! the complete input to the VM once verified.

use quill_core::{ByteReader, ByteWriter};

use crate::error::BytecodeError;
use crate::metadata::Metadata;
use crate::value::Value;

/// Format version this toolchain reads and writes.
pub const CHUNK_VERSION: u32 = 2;

/// A named entry point into `Chunk::code`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    /// Function name, as declared in source.
    pub name: String,
    /// Byte offset of the function's first instruction.
    pub address: u32,
    /// Number of parameters (also the number of locals reserved for them).
    pub arity: u8,
}

/// A complete compiled program: code, its constant pool, the function
/// table, and enough provenance metadata to decide whether to trust it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Format version. Always [`CHUNK_VERSION`] for chunks this toolchain
    /// produces; older versions may still be readable by the container
    /// layer.
    pub version: u32,
    /// Provenance metadata.
    pub metadata: Metadata,
    /// Lowercase hex signature over version, author, OS, and code (see
    /// [`crate::container::compute_signature`]). Tamper-evidence only: this
    /// is an unkeyed hash, not an authentication scheme.
    pub signature: String,
    /// The instruction stream.
    pub code: Vec<u8>,
    /// The constant pool. Deduplicated for scalars (nil/bool/number/string);
    /// arrays are never placed here (see `quill-compiler`'s emission policy
    /// and the container format's array-serialization gap).
    pub constants: Vec<Value>,
    /// Every declared function, in declaration order.
    pub functions: Vec<FunctionEntry>,
    /// Source line for each instruction-start offset in `code`, in the same
    /// order; empty when the chunk was compiled without debug symbols. Not
    /// part of the on-disk container format — purely an in-memory aid for
    /// diagnostics and disassembly.
    pub line_map: Vec<u32>,
    /// Hash of the original source text, for diagnostics (not itself
    /// verified against anything at runtime).
    pub source_hash: String,
}

impl Chunk {
    /// An empty chunk, ready for a compiler to append to.
    #[must_use]
    pub fn new(metadata: Metadata) -> Self {
        Self {
            version: CHUNK_VERSION,
            metadata,
            signature: String::new(),
            code: Vec::new(),
            constants: Vec::new(),
            functions: Vec::new(),
            line_map: Vec::new(),
            source_hash: String::new(),
        }
    }

    pub(crate) fn encode_payload(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        encode_metadata(&mut w, &self.metadata, self.version);
        w.write_lp_string(&self.source_hash);
        w.write_u32_le(self.code.len() as u32);
        w.write_bytes(&self.code);
        w.write_u32_le(self.constants.len() as u32);
        for c in &self.constants {
            encode_value(&mut w, c);
        }
        w.write_u32_le(self.functions.len() as u32);
        for f in &self.functions {
            w.write_lp_string(&f.name);
            w.write_u32_le(f.address);
            w.write_u8(f.arity);
        }
        w.into_vec()
    }

    pub(crate) fn decode_payload(
        version: u32,
        signature: String,
        bytes: &[u8],
    ) -> Result<Self, BytecodeError> {
        let mut r = ByteReader::new(bytes);
        let metadata = decode_metadata(&mut r, version)?;
        let source_hash = r.read_lp_string()?;
        let code_len = r.read_u32_le()? as usize;
        let code = r.read_bytes(code_len)?.to_vec();
        let constant_count = r.read_u32_le()?;
        let mut constants = Vec::with_capacity(constant_count as usize);
        for _ in 0..constant_count {
            constants.push(decode_value(&mut r)?);
        }
        let function_count = r.read_u32_le()?;
        let mut functions = Vec::with_capacity(function_count as usize);
        for _ in 0..function_count {
            let name = r.read_lp_string()?;
            let address = r.read_u32_le()?;
            let arity = r.read_u8()?;
            functions.push(FunctionEntry { name, address, arity });
        }
        Ok(Self {
            version,
            metadata,
            signature,
            code,
            constants,
            functions,
            line_map: Vec::new(),
            source_hash,
        })
    }
}

fn encode_metadata(w: &mut ByteWriter, m: &Metadata, version: u32) {
    w.write_u8(m.compiler_type as u8);
    w.write_u32_le(m.compiler_flags.bits());
    w.write_lp_string(&m.compiler_name);
    w.write_lp_string(&m.compiler_version);
    w.write_lp_string(&m.engine_version);
    w.write_lp_string(&m.game_name);
    w.write_lp_string(&m.game_version);
    w.write_lp_string(&m.author_name);
    w.write_lp_string(&m.operating_system);
    w.write_lp_string(&m.machine_name);
    w.write_u64_le(m.compilation_time);
    w.write_lp_string(&m.source_file_name);
    w.write_u32_le(m.source_file_size);
    w.write_lp_string(&m.source_checksum);
    if version >= 2 {
        w.write_u8(u8::from(m.is_mission));
    }
}

fn decode_metadata(r: &mut ByteReader<'_>, version: u32) -> Result<Metadata, BytecodeError> {
    use crate::metadata::{CompilerFlags, CompilerType};

    let compiler_type = CompilerType::from_u8(r.read_u8()?);
    let compiler_flags = CompilerFlags::from_bits_truncate(r.read_u32_le()?);
    let compiler_name = r.read_lp_string()?;
    let compiler_version = r.read_lp_string()?;
    let engine_version = r.read_lp_string()?;
    let game_name = r.read_lp_string()?;
    let game_version = r.read_lp_string()?;
    let author_name = r.read_lp_string()?;
    let operating_system = r.read_lp_string()?;
    let machine_name = r.read_lp_string()?;
    let compilation_time = r.read_u64_le()?;
    let source_file_name = r.read_lp_string()?;
    let source_file_size = r.read_u32_le()?;
    let source_checksum = r.read_lp_string()?;
    let is_mission = if version >= 2 { r.read_u8()? != 0 } else { false };

    Ok(Metadata {
        compiler_type,
        compiler_flags,
        compiler_name,
        compiler_version,
        engine_version,
        game_name,
        game_version,
        author_name,
        operating_system,
        machine_name,
        compilation_time,
        source_file_name,
        source_file_size,
        source_checksum,
        is_mission,
    })
}

const VALUE_TAG_NIL: u8 = 0;
const VALUE_TAG_BOOL: u8 = 1;
const VALUE_TAG_NUMBER: u8 = 2;
const VALUE_TAG_STRING: u8 = 3;
const VALUE_TAG_ARRAY: u8 = 4;

fn encode_value(w: &mut ByteWriter, v: &Value) {
    match v {
        Value::Nil => w.write_u8(VALUE_TAG_NIL),
        Value::Bool(b) => {
            w.write_u8(VALUE_TAG_BOOL);
            w.write_u8(u8::from(*b));
        }
        Value::Number(n) => {
            w.write_u8(VALUE_TAG_NUMBER);
            w.write_f64_le(*n);
        }
        Value::String(s) => {
            w.write_u8(VALUE_TAG_STRING);
            w.write_lp_string(s);
        }
        Value::Array(items) => {
            // Element bytes are intentionally not written: the compiler
            // never places an array in the constant pool (arrays are
            // always built at runtime via CREATE_ARRAY), so only the count
            // is preserved here for forward structural compatibility.
            w.write_u8(VALUE_TAG_ARRAY);
            w.write_u32_le(items.len() as u32);
        }
    }
}

fn decode_value(r: &mut ByteReader<'_>) -> Result<Value, BytecodeError> {
    Ok(match r.read_u8()? {
        VALUE_TAG_NIL => Value::Nil,
        VALUE_TAG_BOOL => Value::Bool(r.read_u8()? != 0),
        VALUE_TAG_NUMBER => Value::Number(r.read_f64_le()?),
        VALUE_TAG_STRING => Value::String(r.read_lp_string()?),
        VALUE_TAG_ARRAY => {
            let count = r.read_u32_le()? as usize;
            Value::Array(vec![Value::Nil; count])
        }
        other => {
            return Err(BytecodeError::MalformedBytecode {
                offset: r.offset() as u32,
                reason: format!("unknown constant tag {other}"),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrips() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.code = vec![0, 0, 45];
        chunk.constants.push(Value::Number(3.0));
        chunk.constants.push(Value::String("hi".into()));
        chunk.functions.push(FunctionEntry { name: "main".into(), address: 0, arity: 0 });
        chunk.source_hash = "deadbeef".into();

        let bytes = chunk.encode_payload();
        let decoded = Chunk::decode_payload(chunk.version, "sig".into(), &bytes).unwrap();
        assert_eq!(decoded.code, chunk.code);
        assert_eq!(decoded.constants, chunk.constants);
        assert_eq!(decoded.functions, chunk.functions);
        assert_eq!(decoded.source_hash, chunk.source_hash);
    }
}
