//! The chunk verifier: the sole place untrusted bytes become a trusted
//! [`Chunk`]. Must run before any instruction is dispatched.

use crate::chunk::{Chunk, CHUNK_VERSION};
use crate::container::compute_signature;
use crate::error::BytecodeError;
use crate::metadata::CompilerFlags;
use crate::metadata::CompilerType;
use crate::op::Op;

/// Verifies `chunk` per the container's trust policy:
///
/// 1. version is one this toolchain understands,
/// 2. the recomputed signature matches the stored one,
/// 3. if `shipping` is set, the chunk's provenance flags clear the
///    shipping-build bar (dev builds only warn, so this check is skipped),
/// 4. every structural bound on the bytecode holds (in-range indices,
///    jump targets landing on opcode boundaries, in-range function
///    addresses).
///
/// Returns `Ok(())` only if the chunk is safe to execute.
pub fn verify(chunk: &Chunk, shipping: bool) -> Result<(), BytecodeError> {
    if chunk.version != CHUNK_VERSION {
        return Err(BytecodeError::UnsupportedVersion(chunk.version));
    }
    if compute_signature(chunk) != chunk.signature {
        return Err(BytecodeError::SignatureMismatch);
    }
    if shipping {
        check_shipping_provenance(chunk)?;
    }
    verify_structure(chunk)
}

fn check_shipping_provenance(chunk: &Chunk) -> Result<(), BytecodeError> {
    let required = CompilerFlags::OFFICIAL_BUILD
        | CompilerFlags::TRUSTED_SIGNED
        | CompilerFlags::SECURITY_VERIFIED;
    if chunk.metadata.compiler_type == CompilerType::External {
        return Err(BytecodeError::UntrustedCompiler("compiler_type is External".into()));
    }
    if !chunk.metadata.compiler_flags.contains(required) {
        return Err(BytecodeError::UntrustedCompiler(
            "missing one of OfficialBuild/TrustedSigned/SecurityVerified".into(),
        ));
    }
    Ok(())
}

/// Walks `chunk.code` once, decoding opcode-by-opcode from offset 0, and
/// checks every index and jump target it finds along the way. The
/// compiler always lays code out as a contiguous sequence of instructions
/// (globals, then `HALT`, then function bodies back to back), so a single
/// linear decode from 0 visits every byte exactly once when the chunk is
/// well-formed; any misalignment surfaces as a decode failure here.
fn verify_structure(chunk: &Chunk) -> Result<(), BytecodeError> {
    let code = &chunk.code;
    let mut starts = std::collections::HashSet::new();
    let mut jumps: Vec<(u32, u32)> = Vec::new(); // (offset after operand, target)
    let mut offset = 0usize;

    while offset < code.len() {
        starts.insert(offset as u32);
        let op = Op::from_u8(code[offset]).ok_or_else(|| BytecodeError::MalformedBytecode {
            offset: offset as u32,
            reason: format!("unknown opcode byte {}", code[offset]),
        })?;
        let operand_start = offset + 1;
        let operand_len = op.operand_len();
        if operand_start + operand_len > code.len() {
            return Err(BytecodeError::MalformedBytecode {
                offset: offset as u32,
                reason: "opcode operand runs past the end of code".into(),
            });
        }

        match op {
            Op::Constant | Op::DefineGlobal | Op::GetGlobal | Op::SetGlobal => {
                let idx = code[operand_start] as usize;
                check_constant_index(chunk, idx, offset as u32)?;
            }
            Op::GetField | Op::SetField => {
                let idx = u16::from_le_bytes([code[operand_start], code[operand_start + 1]]) as usize;
                check_constant_index(chunk, idx, offset as u32)?;
            }
            Op::CreateArray | Op::GetLocal | Op::SetLocal => {
                // Bounded by a single byte; nothing further to check
                // without the compiler's local-slot count in hand.
            }
            Op::Jump | Op::JumpIfFalse | Op::Loop => {
                let delta =
                    u16::from_le_bytes([code[operand_start], code[operand_start + 1]]) as i64;
                let after_operand = (operand_start + operand_len) as i64;
                let target = if matches!(op, Op::Loop) { after_operand - delta } else { after_operand + delta };
                if target < 0 || target as usize > code.len() {
                    return Err(BytecodeError::MalformedBytecode {
                        offset: offset as u32,
                        reason: "jump target out of bounds".into(),
                    });
                }
                jumps.push((target as u32, offset as u32));
            }
            Op::Call => {
                let idx =
                    u16::from_le_bytes([code[operand_start + 1], code[operand_start + 2]]) as usize;
                if idx >= chunk.functions.len() {
                    return Err(BytecodeError::MalformedBytecode {
                        offset: offset as u32,
                        reason: format!("function index {idx} out of range"),
                    });
                }
            }
            Op::CallNative => {
                let idx =
                    u16::from_le_bytes([code[operand_start + 1], code[operand_start + 2]]) as usize;
                check_constant_index(chunk, idx, offset as u32)?;
            }
            _ => {}
        }

        offset = operand_start + operand_len;
    }

    for (target, from) in jumps {
        if !starts.contains(&target) && target as usize != code.len() {
            return Err(BytecodeError::MalformedBytecode {
                offset: from,
                reason: format!("jump target {target} does not land on an opcode boundary"),
            });
        }
    }

    for f in &chunk.functions {
        if f.address as usize >= code.len() || !starts.contains(&f.address) {
            return Err(BytecodeError::MalformedBytecode {
                offset: f.address,
                reason: format!("function '{}' address does not land on an opcode boundary", f.name),
            });
        }
        if f.arity > 255 {
            return Err(BytecodeError::MalformedBytecode {
                offset: f.address,
                reason: "arity exceeds 255".into(),
            });
        }
    }

    Ok(())
}

fn check_constant_index(chunk: &Chunk, idx: usize, offset: u32) -> Result<(), BytecodeError> {
    if idx >= chunk.constants.len() {
        return Err(BytecodeError::MalformedBytecode {
            offset,
            reason: format!("constant index {idx} out of range"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::FunctionEntry;
    use crate::container::compute_signature;
    use crate::metadata::Metadata;
    use crate::value::Value;

    fn signed(mut chunk: Chunk) -> Chunk {
        chunk.signature = compute_signature(&chunk);
        chunk
    }

    #[test]
    fn accepts_a_well_formed_chunk() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.constants.push(Value::Number(1.0));
        // CONSTANT 0; HALT
        chunk.code = vec![Op::Constant as u8, 0, Op::Halt as u8];
        let chunk = signed(chunk);
        assert!(verify(&chunk, false).is_ok());
    }

    #[test]
    fn rejects_a_tampered_chunk() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.code = vec![Op::Halt as u8];
        let mut chunk = signed(chunk);
        chunk.code.push(Op::Halt as u8);
        assert_eq!(verify(&chunk, false), Err(BytecodeError::SignatureMismatch));
    }

    #[test]
    fn rejects_out_of_range_constant_index() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.code = vec![Op::Constant as u8, 5, Op::Halt as u8];
        let chunk = signed(chunk);
        assert!(matches!(verify(&chunk, false), Err(BytecodeError::MalformedBytecode { .. })));
    }

    #[test]
    fn rejects_jump_into_the_middle_of_an_instruction() {
        let mut chunk = Chunk::new(Metadata::default());
        // JUMP +1 (lands on the operand byte of itself, not an opcode start), HALT
        chunk.code = vec![Op::Jump as u8, 1, 0, Op::Halt as u8];
        let chunk = signed(chunk);
        assert!(matches!(verify(&chunk, false), Err(BytecodeError::MalformedBytecode { .. })));
    }

    #[test]
    fn rejects_out_of_range_function_address() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.code = vec![Op::Halt as u8];
        chunk.functions.push(FunctionEntry { name: "f".into(), address: 99, arity: 0 });
        let chunk = signed(chunk);
        assert!(matches!(verify(&chunk, false), Err(BytecodeError::MalformedBytecode { .. })));
    }

    #[test]
    fn shipping_build_requires_trust_flags() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.code = vec![Op::Halt as u8];
        let chunk = signed(chunk);
        assert!(matches!(verify(&chunk, true), Err(BytecodeError::UntrustedCompiler(_))));
    }

    #[test]
    fn shipping_build_accepts_a_fully_trusted_chunk() {
        let mut chunk = Chunk::new(Metadata {
            compiler_type: CompilerType::Standalone,
            compiler_flags: CompilerFlags::OFFICIAL_BUILD
                | CompilerFlags::TRUSTED_SIGNED
                | CompilerFlags::SECURITY_VERIFIED,
            ..Metadata::default()
        });
        chunk.code = vec![Op::Halt as u8];
        let chunk = signed(chunk);
        assert!(verify(&chunk, true).is_ok());
    }
}
