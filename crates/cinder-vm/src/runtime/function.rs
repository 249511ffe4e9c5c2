// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Function objects, native functions and call frames.

use std::fmt;

use super::value::Value;
use crate::bytecode::Chunk;
use crate::error::Result;
use crate::gc::heap::Heap;
use crate::gc::object::GcRef;
use crate::gc::trace::RootSource;

/// A compiled function. Owns its chunk.
#[derive(Debug, Clone, Default)]
pub struct ObjectFunction {
    /// The function name; `None` for the top-level script
    pub name: Option<GcRef>,
    /// Number of parameters
    pub arity: u8,
    /// The compiled body
    pub chunk: Chunk,
}

impl ObjectFunction {
    /// Creates a function with an empty chunk.
    pub fn new(name: Option<GcRef>, arity: u8) -> Self {
        Self::with_chunk(name, arity, Chunk::new())
    }

    /// Creates a function around an already emitted chunk.
    pub fn with_chunk(name: Option<GcRef>, arity: u8, chunk: Chunk) -> Self {
        Self { name, arity, chunk }
    }

    /// Returns the arity (number of parameters).
    pub fn arity(&self) -> usize {
        self.arity as usize
    }
}

/// What a native function can reach while it runs.
///
/// Allocation goes through the heap with the VM's roots attached, so values
/// created here follow the normal collection rules. Natives must not keep
/// handles past the call.
pub struct NativeContext<'vm> {
    heap: &'vm mut Heap,
    roots: &'vm dyn RootSource,
}

impl<'vm> NativeContext<'vm> {
    pub(crate) fn new(heap: &'vm mut Heap, roots: &'vm dyn RootSource) -> Self {
        Self { heap, roots }
    }

    /// Read access to the heap.
    pub fn heap(&self) -> &Heap {
        &*self.heap
    }

    /// Interns a string and returns it as a value.
    pub fn intern(&mut self, chars: &str) -> Result<Value> {
        let gc_ref = self.heap.intern_string(chars, self.roots)?;
        Ok(Value::Object(gc_ref))
    }
}

/// A native (Rust) function.
///
/// Receives exactly `arity` arguments; an `Err` becomes a runtime error.
pub type NativeFn = fn(&mut NativeContext<'_>, &[Value]) -> std::result::Result<Value, String>;

/// A host-provided function. Owns no chunk.
#[derive(Clone)]
pub struct ObjectNativeFunction {
    /// The function name
    pub name: String,
    /// Number of parameters
    pub arity: u8,
    /// The native function pointer
    pub function: NativeFn,
}

impl ObjectNativeFunction {
    /// Creates a native function object.
    pub fn new(name: impl Into<String>, arity: u8, function: NativeFn) -> Self {
        Self {
            name: name.into(),
            arity,
            function,
        }
    }

    /// Returns the arity (number of parameters).
    pub fn arity(&self) -> usize {
        self.arity as usize
    }
}

impl fmt::Debug for ObjectNativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({}/{})", self.name, self.arity)
    }
}

/// A call frame for function execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// The function being executed
    pub function: GcRef,
    /// Instruction pointer within this function's chunk
    pub ip: usize,
    /// Stack index of local slot 0 (the first argument)
    pub base: usize,
}

impl CallFrame {
    /// Creates a new call frame starting at the first instruction.
    pub fn new(function: GcRef, base: usize) -> Self {
        Self {
            function,
            ip: 0,
            base,
        }
    }

    /// Stack index of the callee value, just below the arguments.
    #[inline]
    pub fn callee_slot(&self) -> usize {
        self.base - 1
    }
}
