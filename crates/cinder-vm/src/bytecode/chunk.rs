// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode container.

use super::opcode::OpCode;
use crate::error::{Error, Result};
use crate::runtime::value::Value;

/// Largest constant pool a chunk can address with a one-byte operand.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// A compiled bytecode chunk.
///
/// Append-only while compiling, read-only while executing. Every byte in
/// `code` has a matching entry in `lines`.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    /// Creates a new empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw byte.
    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Appends an opcode.
    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op.into(), line);
    }

    /// Appends an opcode followed by a one-byte operand.
    pub fn write_op_u8(&mut self, op: OpCode, operand: u8, line: usize) {
        self.write_op(op, line);
        self.write(operand, line);
    }

    /// Adds a constant, reusing an existing identical entry.
    ///
    /// Fails once the pool would outgrow the one-byte operand.
    pub fn add_constant(&mut self, value: Value) -> Result<u8> {
        if let Some(index) = self.constants.iter().position(|c| c.same_constant(&value)) {
            return Ok(index as u8);
        }
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(Error::Compile("Too many constants in one chunk.".into()));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u8)
    }

    /// Adds a constant and emits `CONSTANT` for it.
    pub fn write_constant(&mut self, value: Value, line: usize) -> Result<u8> {
        let index = self.add_constant(value)?;
        self.write_op_u8(OpCode::Constant, index, line);
        Ok(index)
    }

    /// Emits a forward jump with a placeholder offset, returning the offset
    /// of the placeholder for [`Chunk::patch_jump`].
    pub fn emit_jump(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        self.write(0xff, line);
        self.write(0xff, line);
        self.code.len() - 2
    }

    /// Points the jump placeholder at `offset` to the end of the chunk.
    pub fn patch_jump(&mut self, offset: usize) -> Result<()> {
        let jump = self.code.len() - offset - 2;
        let jump = u16::try_from(jump)
            .map_err(|_| Error::Compile("Too much code to jump over.".into()))?;
        let [hi, lo] = jump.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
        Ok(())
    }

    /// Emits a `LOOP` back to `loop_start`.
    pub fn emit_loop(&mut self, loop_start: usize, line: usize) -> Result<()> {
        self.write_op(OpCode::Loop, line);
        let offset = self.code.len() - loop_start + 2;
        let offset =
            u16::try_from(offset).map_err(|_| Error::Compile("Loop body too large.".into()))?;
        let [hi, lo] = offset.to_be_bytes();
        self.write(hi, line);
        self.write(lo, line);
        Ok(())
    }

    /// Returns the instruction bytes.
    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Returns the constant pool.
    #[inline]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Returns the byte at `offset`.
    #[inline]
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Returns the big-endian u16 at `offset`.
    #[inline]
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Returns the constant at `index`.
    #[inline]
    pub fn constant(&self, index: usize) -> Option<Value> {
        self.constants.get(index).copied()
    }

    /// Returns the source line of the byte at `offset`.
    #[inline]
    pub fn line(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }

    /// Returns the number of instruction bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns whether the chunk holds no instructions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the approximate size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.code.capacity()
            + self.lines.capacity() * std::mem::size_of::<usize>()
            + self.constants.capacity() * std::mem::size_of::<Value>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_new() {
        let chunk = Chunk::new();
        assert!(chunk.is_empty());
        assert!(chunk.constants().is_empty());
    }

    #[test]
    fn test_write_tracks_lines() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Return, 2);
        assert_eq!(chunk.code(), &[OpCode::Nil as u8, OpCode::Return as u8]);
        assert_eq!(chunk.line(0), Some(1));
        assert_eq!(chunk.line(1), Some(2));
        assert_eq!(chunk.line(2), None);
    }

    #[test]
    fn test_add_constant_deduplicates() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.0)).unwrap();
        let b = chunk.add_constant(Value::Number(2.0)).unwrap();
        let c = chunk.add_constant(Value::Number(1.0)).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(c, 0);
        assert_eq!(chunk.constants().len(), 2);
    }

    #[test]
    fn test_signed_zero_constants_are_distinct() {
        let mut chunk = Chunk::new();
        let zero = chunk.add_constant(Value::Number(0.0)).unwrap();
        let neg_zero = chunk.add_constant(Value::Number(-0.0)).unwrap();
        assert_ne!(zero, neg_zero);
    }

    #[test]
    fn test_constant_pool_limit() {
        let mut chunk = Chunk::new();
        for i in 0..MAX_CONSTANTS {
            chunk.add_constant(Value::Number(i as f64)).unwrap();
        }
        let err = chunk.add_constant(Value::Number(-1.0)).unwrap_err();
        assert_eq!(err, Error::Compile("Too many constants in one chunk.".into()));
        // Existing constants are still reusable at the limit.
        assert_eq!(chunk.add_constant(Value::Number(3.0)).unwrap(), 3);
    }

    #[test]
    fn test_patch_jump() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::JumpIfFalse, 1);
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(jump).unwrap();
        assert_eq!(chunk.read_u16(jump), Some(2));
    }

    #[test]
    fn test_emit_loop() {
        let mut chunk = Chunk::new();
        let start = chunk.len();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.emit_loop(start, 1).unwrap();
        // LOOP sits at 2; after reading its operand ip is 5, and 5 - 5 = 0.
        assert_eq!(chunk.read_u16(3), Some(5));
    }

    #[test]
    fn test_jump_too_far() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..=u16::MAX as usize {
            chunk.write_op(OpCode::Nil, 1);
        }
        assert!(chunk.patch_jump(jump).is_err());
    }
}
