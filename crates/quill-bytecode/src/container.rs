//! The on-disk `.scc` container: `SBC1` magic, version, a compression flag,
//! a tamper-evident signature, and a (possibly zlib-compressed) payload
//! holding everything else in [`Chunk`].

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use quill_core::{ByteReader, ByteWriter};
use sha2::{Digest, Sha256};

use crate::chunk::Chunk;
use crate::error::BytecodeError;

/// `"SBC1"` read as a little-endian `u32`.
pub const MAGIC: u32 = 0x3143_4253;

/// Below this payload size, compression is never attempted: the zlib
/// framing overhead would make small chunks larger, not smaller.
const COMPRESSION_THRESHOLD: usize = 1024;

const FLAG_COMPRESSED: u32 = 1 << 0;

/// Computes the chunk's tamper-evident signature: SHA-256 over the format
/// version, the author name, the operating system, and the code bytes —
/// in that order, all as their natural byte representations.
///
/// This is an unkeyed hash. It proves the chunk matches the metadata and
/// code it shipped with; it does not prove who produced it. Treat it as
/// tamper evidence, not authentication, unless paired with a real signing
/// scheme at the host layer.
#[must_use]
pub fn compute_signature(chunk: &Chunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.version.to_le_bytes());
    hasher.update(chunk.metadata.author_name.as_bytes());
    hasher.update(chunk.metadata.operating_system.as_bytes());
    hasher.update(&chunk.code);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Serializes a chunk to the `.scc` container format. Signs the chunk
/// (overwriting `chunk.signature`'s on-disk copy with a freshly computed
/// one) since the signature must always reflect the bytes actually
/// written.
#[must_use]
pub fn write_container(chunk: &Chunk) -> Vec<u8> {
    let signature = compute_signature(chunk);
    let payload = chunk.encode_payload();
    let uncompressed_size = payload.len() as u32;

    let (payload, compressed) = maybe_compress(&payload);

    let mut w = ByteWriter::new();
    w.write_u32_le(MAGIC);
    w.write_u32_le(chunk.version);
    w.write_u32_le(if compressed { FLAG_COMPRESSED } else { 0 });
    w.write_u32_le(signature.len() as u32);
    w.write_bytes(signature.as_bytes());
    w.write_u32_le(uncompressed_size);
    w.write_u32_le(payload.len() as u32);
    w.write_bytes(&payload);
    w.into_vec()
}

fn maybe_compress(payload: &[u8]) -> (Vec<u8>, bool) {
    if payload.len() <= COMPRESSION_THRESHOLD {
        return (payload.to_vec(), false);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(payload).is_err() {
        return (payload.to_vec(), false);
    }
    match encoder.finish() {
        Ok(compressed) if compressed.len() < payload.len() => (compressed, true),
        _ => (payload.to_vec(), false),
    }
}

/// Parses a `.scc` container into a [`Chunk`], without yet verifying its
/// signature or structural bounds (see [`crate::verify::verify`]).
pub fn read_container(bytes: &[u8]) -> Result<Chunk, BytecodeError> {
    let mut r = ByteReader::new(bytes);
    let magic = r.read_u32_le()?;
    if magic != MAGIC {
        return Err(BytecodeError::BadMagic);
    }
    let version = r.read_u32_le()?;
    if version != crate::chunk::CHUNK_VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }
    let flags = r.read_u32_le()?;
    let compressed = flags & FLAG_COMPRESSED != 0;

    let signature_length = r.read_u32_le()? as usize;
    let signature_bytes = r.read_bytes(signature_length)?;
    let signature = std::str::from_utf8(signature_bytes)
        .map_err(|_| BytecodeError::MalformedBytecode {
            offset: r.offset() as u32,
            reason: "signature is not valid UTF-8".into(),
        })?
        .to_string();

    let uncompressed_size = r.read_u32_le()? as usize;
    let payload_size = r.read_u32_le()? as usize;
    let payload_bytes = r.read_bytes(payload_size)?;

    let payload = if compressed {
        let mut decoder = ZlibDecoder::new(payload_bytes);
        let mut out = Vec::with_capacity(uncompressed_size);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| BytecodeError::DecompressionFailed(e.to_string()))?;
        out
    } else {
        payload_bytes.to_vec()
    };

    Chunk::decode_payload(version, signature, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use crate::value::Value;

    fn sample_chunk(code_len: usize) -> Chunk {
        let mut chunk = Chunk::new(Metadata { author_name: "tester".into(), ..Metadata::default() });
        chunk.code = vec![45; code_len.max(3)]; // padded with HALT-like filler
        chunk.code[0] = 1; // NIL
        chunk.code[1] = 45; // HALT
        chunk.constants.push(Value::Number(1.0));
        chunk.signature = compute_signature(&chunk);
        chunk
    }

    #[test]
    fn small_payload_is_never_compressed() {
        let chunk = sample_chunk(4);
        let bytes = write_container(&chunk);
        let flags = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(flags & FLAG_COMPRESSED, 0);
    }

    #[test]
    fn large_compressible_payload_is_compressed() {
        let chunk = sample_chunk(4096);
        let bytes = write_container(&chunk);
        let flags = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_ne!(flags & FLAG_COMPRESSED, 0);
    }

    #[test]
    fn roundtrip_preserves_code_and_constants() {
        let chunk = sample_chunk(4096);
        let bytes = write_container(&chunk);
        let decoded = read_container(&bytes).unwrap();
        assert_eq!(decoded.code, chunk.code);
        assert_eq!(decoded.constants, chunk.constants);
        assert_eq!(decoded.signature, chunk.signature);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write_container(&sample_chunk(4));
        bytes[0] = 0;
        assert_eq!(read_container(&bytes), Err(BytecodeError::BadMagic));
    }

    #[test]
    fn signature_covers_code_but_not_compilation_time() {
        let mut a = sample_chunk(4);
        let mut b = a.clone();
        b.metadata.compilation_time = 999;
        assert_eq!(compute_signature(&a), compute_signature(&b));

        a.code.push(0);
        assert_ne!(compute_signature(&a), compute_signature(&b));
    }
}
