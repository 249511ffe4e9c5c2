// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Human-readable chunk dumps.
//!
//! ```text
//! == add ==
//! 0000    1 CONSTANT            0 '1'
//! 0002    | CONSTANT            1 '2'
//! 0004    | ADD
//! 0005    2 RETURN
//! ```

use std::fmt::Write;

use super::chunk::Chunk;
use super::opcode::OpCode;
use crate::gc::heap::Heap;

/// Disassembles a whole chunk under a `== name ==` header.
pub fn disassemble(chunk: &Chunk, name: &str, heap: &Heap) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", name);

    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, heap, &mut out);
    }
    out
}

/// Appends one instruction to `out`, returning the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, heap: &Heap, out: &mut String) -> usize {
    let _ = write!(out, "{:04} ", offset);
    match (offset.checked_sub(1).and_then(|prev| chunk.line(prev)), chunk.line(offset)) {
        (Some(prev), Some(line)) if prev == line => out.push_str("   | "),
        (_, Some(line)) => {
            let _ = write!(out, "{:>4} ", line);
        }
        (_, None) => out.push_str("   ? "),
    }

    let Some(byte) = chunk.byte(offset) else {
        out.push_str("<end>\n");
        return offset + 1;
    };
    let Ok(op) = OpCode::try_from(byte) else {
        let _ = writeln!(out, "Unknown opcode {}", byte);
        return offset + 1;
    };

    let next = offset + 1 + op.operand_width();
    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            match chunk.byte(offset + 1) {
                Some(index) => {
                    let shown = match chunk.constant(index as usize) {
                        Some(value) => value.display(heap).to_string(),
                        None => "<out of range>".to_string(),
                    };
                    let _ = writeln!(out, "{:<16} {:4} '{}'", op.name(), index, shown);
                }
                None => {
                    let _ = writeln!(out, "{:<16} <truncated>", op.name());
                }
            }
        }
        OpCode::GetLocal | OpCode::SetLocal | OpCode::Call => match chunk.byte(offset + 1) {
            Some(operand) => {
                let _ = writeln!(out, "{:<16} {:4}", op.name(), operand);
            }
            None => {
                let _ = writeln!(out, "{:<16} <truncated>", op.name());
            }
        },
        OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => match chunk.read_u16(offset + 1) {
            Some(jump) => {
                let jump = jump as usize;
                let target = if op == OpCode::Loop {
                    next as isize - jump as isize
                } else {
                    (next + jump) as isize
                };
                let _ = writeln!(out, "{:<16} {:4} -> {}", op.name(), offset, target);
            }
            None => {
                let _ = writeln!(out, "{:<16} <truncated>", op.name());
            }
        },
        _ => {
            let _ = writeln!(out, "{}", op.name());
        }
    }
    next
}
