// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # cinder-vm
//!
//! The execution core of the Cinder scripting language: a stack-based
//! bytecode VM, its value and object model, and a mark-sweep garbage
//! collector.
//!
//! ## Overview
//!
//! - [`bytecode`] - Instruction set, [`Chunk`] and the disassembler
//! - [`gc`] - The [`Heap`]: allocator, string interning and collector
//! - [`runtime`] - [`Value`], functions and call frames
//! - [`vm`] - The dispatch loop
//! - [`builtins`] - Natives installed at VM construction
//!
//! The lexer and compiler live outside this crate. A front end emits a
//! [`Chunk`], allocating strings and functions through the VM so that they
//! share its heap.
//!
//! ## Quick Start
//!
//! ```rust
//! use cinder_vm::{Chunk, OpCode, Value, Vm};
//!
//! let mut vm = Vm::new()?;
//! let mut chunk = Chunk::new();
//! chunk.write_constant(Value::Number(1.0), 1)?;
//! chunk.write_constant(Value::Number(2.0), 1)?;
//! chunk.write_op(OpCode::Add, 1);
//! chunk.write_op(OpCode::Return, 1);
//!
//! assert_eq!(vm.run(chunk)?, Value::Number(3.0));
//! # Ok::<(), cinder_vm::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod bytecode;
pub mod config;
pub mod error;
pub mod gc;
pub mod runtime;
pub mod vm;

// Re-exports for convenience
pub use bytecode::{Chunk, OpCode, disassemble};
pub use config::{GcConfig, VmConfig};
pub use error::{Error, Result, RuntimeError, RuntimeErrorKind, TraceEntry};
pub use gc::{FunctionMut, GcRef, GcStats, Heap};
pub use runtime::{NativeContext, NativeFn, Value};
pub use vm::{Output, SharedBuffer, StdoutOutput, Vm};
