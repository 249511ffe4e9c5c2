// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Operation codes for the VM.

use std::fmt;

/// Operation codes for the VM.
///
/// Each opcode is one byte, followed by [`OpCode::operand_width`] operand
/// bytes. Multi-byte operands are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push a constant onto the stack (u8 pool index)
    Constant,
    /// Push nil
    Nil,
    /// Push true
    True,
    /// Push false
    False,
    /// Pop the top value
    Pop,

    // Variable operations
    /// Load a local variable (u8 slot)
    GetLocal,
    /// Store to a local variable, leaving the value on the stack (u8 slot)
    SetLocal,
    /// Load a global variable (u8 name constant)
    GetGlobal,
    /// Pop a value and bind it to a global (u8 name constant)
    DefineGlobal,
    /// Assign an existing global, leaving the value on the stack (u8 name constant)
    SetGlobal,

    // Comparison operations
    /// Equal
    Equal,
    /// Not equal
    NotEqual,
    /// Greater than
    Greater,
    /// Greater than or equal
    GreaterEqual,
    /// Less than
    Less,
    /// Less than or equal
    LessEqual,

    // Arithmetic operations
    /// Add numbers or concatenate strings
    Add,
    /// Subtract
    Subtract,
    /// Multiply
    Multiply,
    /// Divide
    Divide,
    /// Logical NOT
    Not,
    /// Negate (unary minus)
    Negate,

    // Host output
    /// Pop the top value and print it
    Print,

    // Control flow
    /// Unconditional forward jump (u16 offset)
    Jump,
    /// Pop, and jump forward if the value is falsy (u16 offset)
    JumpIfFalse,
    /// Unconditional backward jump (u16 offset)
    Loop,

    // Function operations
    /// Call a function (u8 argument count)
    Call,
    /// Return from function
    Return,
}

impl OpCode {
    /// Every opcode, in byte order.
    pub const ALL: [OpCode; 28] = [
        OpCode::Constant,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::GetLocal,
        OpCode::SetLocal,
        OpCode::GetGlobal,
        OpCode::DefineGlobal,
        OpCode::SetGlobal,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Greater,
        OpCode::GreaterEqual,
        OpCode::Less,
        OpCode::LessEqual,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Not,
        OpCode::Negate,
        OpCode::Print,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::Loop,
        OpCode::Call,
        OpCode::Return,
    ];

    /// Returns the number of operand bytes following the opcode.
    pub fn operand_width(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::Call => 1,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::Loop => 2,
            _ => 0,
        }
    }

    /// Returns the mnemonic used in disassembly.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::Nil => "NIL",
            OpCode::True => "TRUE",
            OpCode::False => "FALSE",
            OpCode::Pop => "POP",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::DefineGlobal => "DEFINE_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::Equal => "EQUAL",
            OpCode::NotEqual => "NOT_EQUAL",
            OpCode::Greater => "GREATER",
            OpCode::GreaterEqual => "GREATER_EQUAL",
            OpCode::Less => "LESS",
            OpCode::LessEqual => "LESS_EQUAL",
            OpCode::Add => "ADD",
            OpCode::Subtract => "SUBTRACT",
            OpCode::Multiply => "MULTIPLY",
            OpCode::Divide => "DIVIDE",
            OpCode::Not => "NOT",
            OpCode::Negate => "NEGATE",
            OpCode::Print => "PRINT",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::Loop => "LOOP",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    #[inline]
    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL.get(byte as usize).copied().ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    #[inline]
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip_matches_discriminant() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(*op as u8 as usize, i);
            assert_eq!(OpCode::try_from(i as u8), Ok(*op));
        }
    }

    #[test]
    fn test_unknown_byte() {
        assert_eq!(OpCode::try_from(200), Err(200));
    }

    #[test]
    fn test_operand_width() {
        assert_eq!(OpCode::Constant.operand_width(), 1);
        assert_eq!(OpCode::JumpIfFalse.operand_width(), 2);
        assert_eq!(OpCode::Return.operand_width(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(OpCode::GreaterEqual.to_string(), "GREATER_EQUAL");
    }
}
