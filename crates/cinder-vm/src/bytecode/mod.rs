// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode: the instruction set, chunks and the disassembler.

pub mod chunk;
pub mod disassembler;
pub mod opcode;

pub use chunk::Chunk;
pub use disassembler::{disassemble, disassemble_instruction};
pub use opcode::OpCode;
