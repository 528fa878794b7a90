//! A human-readable instruction listing, for the `-d` flag of the
//! standalone compiler and for debugging embedders.

use std::fmt::Write as _;

use crate::chunk::Chunk;
use crate::op::Op;

/// Renders `chunk` as a listing: header metadata, the function table, the
/// constant pool, then one line per instruction. Never fails — an
/// unrecognized opcode byte (which `verify` would have already rejected)
/// is rendered as a literal byte value rather than aborting the listing.
#[must_use]
pub fn disassemble(chunk: &Chunk) -> String {
    let mut out = String::new();
    writeln!(out, "; compiler: {} {}", chunk.metadata.compiler_name, chunk.metadata.compiler_version).ok();
    writeln!(out, "; source: {} ({} bytes)", chunk.metadata.source_file_name, chunk.metadata.source_file_size).ok();
    writeln!(out, "; signature: {}", chunk.signature).ok();
    out.push('\n');

    if !chunk.functions.is_empty() {
        writeln!(out, "; functions:").ok();
        for f in &chunk.functions {
            writeln!(out, ";   {}(arity={}) @ {}", f.name, f.arity, f.address).ok();
        }
        out.push('\n');
    }

    if !chunk.constants.is_empty() {
        writeln!(out, "; constants:").ok();
        for (i, c) in chunk.constants.iter().enumerate() {
            writeln!(out, ";   [{i}] = {}", c.stringify()).ok();
        }
        out.push('\n');
    }

    let mut offset = 0usize;
    while offset < chunk.code.len() {
        offset = disassemble_one(chunk, offset, &mut out);
    }
    out
}

fn disassemble_one(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let code = &chunk.code;
    let byte = code[offset];
    let Some(op) = Op::from_u8(byte) else {
        writeln!(out, "{offset:06} | <unknown opcode {byte}>").ok();
        return offset + 1;
    };

    let operand_start = offset + 1;
    let len = op.operand_len();
    if operand_start + len > code.len() {
        writeln!(out, "{offset:06} | {op:?} <truncated>").ok();
        return code.len();
    }
    let operand = &code[operand_start..operand_start + len];

    match op {
        Op::Constant | Op::GetLocal | Op::SetLocal | Op::DefineGlobal | Op::GetGlobal | Op::SetGlobal | Op::CreateArray => {
            writeln!(out, "{offset:06} | {op:?} {}", operand[0]).ok();
        }
        Op::Jump | Op::JumpIfFalse => {
            let delta = u16::from_le_bytes([operand[0], operand[1]]);
            writeln!(out, "{offset:06} | {op:?} -> {}", operand_start + len + delta as usize).ok();
        }
        Op::Loop => {
            let delta = u16::from_le_bytes([operand[0], operand[1]]);
            writeln!(out, "{offset:06} | {op:?} -> {}", (operand_start + len).saturating_sub(delta as usize)).ok();
        }
        Op::GetField | Op::SetField => {
            let idx = u16::from_le_bytes([operand[0], operand[1]]);
            writeln!(out, "{offset:06} | {op:?} {idx}").ok();
        }
        Op::Call => {
            let idx = u16::from_le_bytes([operand[1], operand[2]]);
            writeln!(out, "{offset:06} | {op:?} argc={} fn={idx}", operand[0]).ok();
        }
        Op::CallNative => {
            let idx = u16::from_le_bytes([operand[1], operand[2]]);
            writeln!(out, "{offset:06} | {op:?} argc={} name={idx}", operand[0]).ok();
        }
        _ => {
            writeln!(out, "{offset:06} | {op:?}").ok();
        }
    }

    operand_start + len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;
    use crate::value::Value;

    #[test]
    fn renders_a_simple_chunk_without_panicking() {
        let mut chunk = Chunk::new(Metadata::default());
        chunk.constants.push(Value::Number(1.0));
        chunk.code = vec![Op::Constant as u8, 0, Op::Halt as u8];
        let text = disassemble(&chunk);
        assert!(text.contains("Constant 0"));
        assert!(text.contains("Halt"));
    }
}
