// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode interpreter.

use rustc_hash::FxHashMap;
use tracing::{debug, error, warn};

use super::output::{Output, StdoutOutput};
use crate::builtins;
use crate::bytecode::{Chunk, OpCode};
use crate::config::VmConfig;
use crate::error::{Error, Result, RuntimeError, RuntimeErrorKind, TraceEntry};
use crate::gc::heap::{FunctionMut, Heap};
use crate::gc::object::{GcRef, Object};
use crate::gc::trace::{RootSource, Tracer};
use crate::runtime::function::{
    CallFrame, NativeContext, NativeFn, ObjectFunction, ObjectNativeFunction,
};
use crate::runtime::value::{TypeMismatch, Value};

const ADD_OPERANDS: TypeMismatch = TypeMismatch("Operands must be two numbers or two strings.");

/// The VM's root set, borrowed field by field so the heap can be borrowed
/// mutably alongside it.
struct VmRoots<'a> {
    stack: &'a [Value],
    frames: &'a [CallFrame],
    globals: &'a FxHashMap<GcRef, Value>,
}

impl RootSource for VmRoots<'_> {
    fn trace_roots(&self, tracer: &mut Tracer) {
        tracer.mark_values(self.stack);
        for frame in self.frames {
            tracer.mark(frame.function);
        }
        for (name, value) in self.globals {
            tracer.mark(*name);
            tracer.mark_value(value);
        }
    }
}

fn no_frame() -> Error {
    Error::CorruptBytecode {
        offset: 0,
        reason: "no active call frame".into(),
    }
}

/// The virtual machine that executes bytecode.
///
/// Globals and the heap live as long as the VM, so successive [`Vm::run`]
/// calls see each other's definitions.
pub struct Vm {
    /// The value stack
    stack: Vec<Value>,
    /// Active call frames, innermost last
    frames: Vec<CallFrame>,
    /// Global variables keyed by interned name
    globals: FxHashMap<GcRef, Value>,
    /// Owner of every object
    heap: Heap,
    config: VmConfig,
    output: Box<dyn Output>,
}

impl Vm {
    /// Creates a VM with default configuration, printing to stdout.
    pub fn new() -> Result<Self> {
        Self::with_config(VmConfig::default())
    }

    /// Creates a VM with custom configuration, printing to stdout.
    pub fn with_config(config: VmConfig) -> Result<Self> {
        Self::with_output(config, Box::new(StdoutOutput))
    }

    /// Creates a VM with custom configuration and host output.
    pub fn with_output(config: VmConfig, output: Box<dyn Output>) -> Result<Self> {
        let mut vm = Self {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(config.max_frames),
            globals: FxHashMap::default(),
            heap: Heap::with_config(config.gc.clone()),
            config,
            output,
        };
        if vm.config.register_builtins {
            builtins::register_builtins(&mut vm)?;
        }
        Ok(vm)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Read access to the heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Looks up a global by name.
    pub fn global(&self, name: &str) -> Option<Value> {
        let key = self.heap.find_interned(name)?;
        self.globals.get(&key).copied()
    }

    /// Returns the number of defined globals.
    pub fn globals_len(&self) -> usize {
        self.globals.len()
    }

    /// Renders a value the way `PRINT` would.
    pub fn display(&self, value: Value) -> String {
        value.display(&self.heap).to_string()
    }

    /// Interns a string in this VM's heap.
    pub fn intern(&mut self, chars: &str) -> Result<GcRef> {
        let (heap, roots) = self.split();
        heap.intern_string(chars, &roots)
    }

    /// Allocates a function with an empty chunk.
    ///
    /// The handle is not rooted. A front end emitting into the chunk should
    /// [`Vm::pin`] it until it is reachable from a constant or global.
    pub fn allocate_function(&mut self, name: Option<GcRef>, arity: u8) -> Result<GcRef> {
        let (heap, roots) = self.split();
        heap.allocate_function(name, arity, &roots)
    }

    /// Gets a function mutably, for emitting into its chunk. The heap
    /// re-accounts the function's size when the guard drops.
    pub fn function_mut(&mut self, function: GcRef) -> Option<FunctionMut<'_>> {
        self.heap.function_mut(function)
    }

    /// Keeps an object alive until [`Vm::unpin`].
    pub fn pin(&mut self, gc_ref: GcRef) {
        self.heap.pin(gc_ref);
    }

    /// Releases one [`Vm::pin`].
    pub fn unpin(&mut self, gc_ref: GcRef) {
        self.heap.unpin(gc_ref);
    }

    /// Forces a collection with the VM's roots, returning the number of
    /// objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        let (heap, roots) = self.split();
        heap.collect(&roots)
    }

    /// Registers a native function as a global.
    pub fn define_native(&mut self, name: &str, arity: u8, function: NativeFn) -> Result<()> {
        let key = self.intern(name)?;
        // The key is not reachable until it is inserted.
        self.heap.pin(key);
        let native = {
            let (heap, roots) = self.split();
            heap.allocate_native(ObjectNativeFunction::new(name, arity, function), &roots)
        };
        self.heap.unpin(key);

        self.globals.insert(key, Value::Object(native?));
        debug!(name, arity, "native defined");
        Ok(())
    }

    /// Runs a top-level chunk and returns the value of its final `RETURN`.
    ///
    /// The chunk becomes the body of an unnamed function with no parameters.
    pub fn run(&mut self, chunk: Chunk) -> Result<Value> {
        let script = Object::Function(ObjectFunction::with_chunk(None, 0, chunk));
        let function = {
            let (heap, roots) = self.split();
            heap.allocate(script, &roots)?
        };
        self.run_function(function)
    }

    /// Runs an already allocated function that takes no arguments.
    ///
    /// On error every active frame is discarded. Globals and the heap are
    /// kept; the VM can be reused unless the error [`is_fatal`](Error::is_fatal).
    pub fn run_function(&mut self, function: GcRef) -> Result<Value> {
        self.reset_stacks();
        debug!(?function, globals = self.globals.len(), "run begin");

        let result = self.start(function);
        match &result {
            Ok(value) => {
                debug!(
                    result = %value.display(&self.heap),
                    objects = self.heap.object_count(),
                    bytes = self.heap.bytes_allocated(),
                    "run end"
                );
            }
            Err(Error::Runtime(err)) => {
                warn!(line = err.line, "runtime error: {}", err.kind);
                self.reset_stacks();
            }
            Err(err) => {
                error!("fatal error: {}", err);
                self.reset_stacks();
            }
        }
        result
    }

    fn start(&mut self, function: GcRef) -> Result<Value> {
        let callee = Value::Object(function);
        self.push(callee)?;
        self.call_value(callee, 0)?;
        // A native entry point has already replaced itself with its result.
        if self.frames.is_empty() {
            return self.pop();
        }
        self.execute()
    }

    fn execute(&mut self) -> Result<Value> {
        loop {
            #[cfg(feature = "trace-execution")]
            self.trace_instruction();

            let byte = self.read_byte()?;
            let op = OpCode::try_from(byte)
                .map_err(|byte| self.corrupt(format!("unknown opcode {}", byte)))?;

            match op {
                OpCode::Constant => {
                    let value = self.read_constant()?;
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop()?;
                }

                OpCode::GetLocal => {
                    let slot = self.read_local_slot()?;
                    let value = self.stack[slot];
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_local_slot()?;
                    let value = self.peek(0)?;
                    self.stack[slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_name()?;
                    match self.globals.get(&name).copied() {
                        Some(value) => self.push(value)?,
                        None => return Err(self.undefined_variable(name)),
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_name()?;
                    let value = self.peek(0)?;
                    self.globals.insert(name, value);
                    self.pop()?;
                }
                OpCode::SetGlobal => {
                    let name = self.read_name()?;
                    let value = self.peek(0)?;
                    match self.globals.get_mut(&name) {
                        Some(slot) => *slot = value,
                        None => return Err(self.undefined_variable(name)),
                    }
                }

                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::NotEqual => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(Value::Bool(a != b))?;
                }
                OpCode::Greater => self.binary(Value::greater)?,
                OpCode::GreaterEqual => self.binary(Value::greater_equal)?,
                OpCode::Less => self.binary(Value::less)?,
                OpCode::LessEqual => self.binary(Value::less_equal)?,

                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary(Value::try_sub)?,
                OpCode::Multiply => self.binary(Value::try_mul)?,
                OpCode::Divide => self.binary(Value::try_div)?,
                OpCode::Not => {
                    let value = self.pop()?;
                    self.push(value.logical_not())?;
                }
                OpCode::Negate => {
                    let value = self.peek(0)?;
                    let negated = value.try_negate().map_err(|e| self.type_mismatch(e))?;
                    self.pop()?;
                    self.push(negated)?;
                }

                OpCode::Print => {
                    let value = self.pop()?;
                    let text = value.display(&self.heap).to_string();
                    self.output
                        .write_line(&text)
                        .map_err(|e| Error::Io(e.to_string()))?;
                }

                OpCode::Jump => {
                    let offset = self.read_u16()?;
                    self.jump(offset, false)?;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16()?;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.jump(offset, false)?;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16()?;
                    self.jump(offset, true)?;
                }

                OpCode::Call => {
                    let argc = self.read_byte()? as usize;
                    let callee = self.peek(argc)?;
                    self.call_value(callee, argc)?;
                }
                OpCode::Return => {
                    let result = self.pop()?;
                    let frame = self.frames.pop().ok_or_else(no_frame)?;
                    self.stack.truncate(frame.callee_slot());
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }
            }
        }
    }

    // ========== Calls ==========

    fn call_value(&mut self, callee: Value, argc: usize) -> Result<()> {
        let Value::Object(gc_ref) = callee else {
            return Err(self.runtime_error(RuntimeErrorKind::NotCallable(
                callee.type_name(&self.heap),
            )));
        };

        match self.heap.get(gc_ref) {
            Some(Object::Function(function)) => {
                let arity = function.arity();
                self.call_function(gc_ref, arity, argc)
            }
            Some(Object::NativeFunction(native)) => {
                let (arity, function) = (native.arity(), native.function);
                self.call_native(function, arity, argc)
            }
            Some(object) => Err(self.runtime_error(RuntimeErrorKind::NotCallable(
                object.kind().name(),
            ))),
            None => Err(self.corrupt(format!("callee {:?} is not a live object", gc_ref))),
        }
    }

    fn call_function(&mut self, function: GcRef, arity: usize, argc: usize) -> Result<()> {
        if argc != arity {
            return Err(self.runtime_error(RuntimeErrorKind::ArityMismatch {
                expected: arity,
                got: argc,
            }));
        }
        if self.frames.len() >= self.config.max_frames {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }

        let base = self.stack.len() - argc;
        self.frames.push(CallFrame::new(function, base));
        Ok(())
    }

    fn call_native(&mut self, function: NativeFn, arity: usize, argc: usize) -> Result<()> {
        if argc != arity {
            return Err(self.runtime_error(RuntimeErrorKind::ArityMismatch {
                expected: arity,
                got: argc,
            }));
        }

        let args_start = self.stack.len() - argc;
        let outcome = {
            let roots = VmRoots {
                stack: &self.stack,
                frames: &self.frames,
                globals: &self.globals,
            };
            let mut context = NativeContext::new(&mut self.heap, &roots);
            function(&mut context, &self.stack[args_start..])
        };
        let result = outcome.map_err(|message| self.runtime_error(RuntimeErrorKind::Native(message)))?;

        // Drop the arguments and the callee below them.
        self.stack.truncate(args_start - 1);
        self.push(result)
    }

    // ========== Operators ==========

    fn binary(&mut self, op: fn(Value, Value) -> std::result::Result<Value, TypeMismatch>) -> Result<()> {
        let b = self.peek(0)?;
        let a = self.peek(1)?;
        let result = op(a, b).map_err(|e| self.type_mismatch(e))?;
        self.pop()?;
        self.pop()?;
        self.push(result)
    }

    fn add(&mut self) -> Result<()> {
        let b = self.peek(0)?;
        let a = self.peek(1)?;

        if let Some(joined) = self.concatenation(a, b) {
            // Both operands stay on the stack, and so stay rooted, while the
            // result is allocated.
            let result = self.intern(&joined)?;
            self.pop()?;
            self.pop()?;
            return self.push(Value::Object(result));
        }

        let result = a.try_add(b).map_err(|_| self.type_mismatch(ADD_OPERANDS))?;
        self.pop()?;
        self.pop()?;
        self.push(result)
    }

    fn concatenation(&self, a: Value, b: Value) -> Option<String> {
        let (Value::Object(a), Value::Object(b)) = (a, b) else {
            return None;
        };
        let a = self.heap.as_string(a)?;
        let b = self.heap.as_string(b)?;
        let mut joined = String::with_capacity(a.len() + b.len());
        joined.push_str(a.as_str());
        joined.push_str(b.as_str());
        Some(joined)
    }

    // ========== Stack ==========

    #[inline]
    fn push(&mut self, value: Value) -> Result<()> {
        if self.stack.len() >= self.config.max_stack {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }
        self.stack.push(value);
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| self.corrupt("value stack underflow"))
    }

    #[inline]
    fn peek(&self, distance: usize) -> Result<Value> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .map(|index| self.stack[index])
            .ok_or_else(|| self.corrupt("value stack underflow"))
    }

    fn reset_stacks(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }

    /// Splits the VM into its heap and the roots the heap must respect.
    fn split(&mut self) -> (&mut Heap, VmRoots<'_>) {
        (
            &mut self.heap,
            VmRoots {
                stack: &self.stack,
                frames: &self.frames,
                globals: &self.globals,
            },
        )
    }

    // ========== Instruction decoding ==========

    fn frame(&self) -> Result<&CallFrame> {
        self.frames.last().ok_or_else(no_frame)
    }

    fn current_function(&self) -> Result<&ObjectFunction> {
        let frame = self.frame()?;
        self.heap.as_function(frame.function).ok_or_else(|| Error::CorruptBytecode {
            offset: frame.ip,
            reason: "frame does not reference a function".into(),
        })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let frame = self.frames.last_mut().ok_or_else(no_frame)?;
        let byte = self
            .heap
            .as_function(frame.function)
            .and_then(|function| function.chunk.byte(frame.ip));
        match byte {
            Some(byte) => {
                frame.ip += 1;
                Ok(byte)
            }
            None => Err(Error::CorruptBytecode {
                offset: frame.ip,
                reason: "instruction pointer outside the chunk".into(),
            }),
        }
    }

    fn read_u16(&mut self) -> Result<u16> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn read_constant(&mut self) -> Result<Value> {
        let index = self.read_byte()? as usize;
        self.current_function()?
            .chunk
            .constant(index)
            .ok_or_else(|| self.corrupt(format!("constant index {} out of range", index)))
    }

    fn read_name(&mut self) -> Result<GcRef> {
        match self.read_constant()? {
            Value::Object(name) if self.heap.as_string(name).is_some() => Ok(name),
            _ => Err(self.corrupt("global name constant is not a string")),
        }
    }

    fn read_local_slot(&mut self) -> Result<usize> {
        let slot = self.read_byte()? as usize;
        let index = self.frame()?.base + slot;
        if index >= self.stack.len() {
            return Err(self.corrupt(format!("local slot {} out of range", slot)));
        }
        Ok(index)
    }

    fn jump(&mut self, offset: u16, backward: bool) -> Result<()> {
        let len = self.current_function()?.chunk.len();
        let ip = self.frame()?.ip;
        let target = if backward {
            ip.checked_sub(offset as usize)
        } else {
            Some(ip + offset as usize)
        };
        match target {
            Some(target) if target <= len => {
                let frame = self.frames.last_mut().ok_or_else(no_frame)?;
                frame.ip = target;
                Ok(())
            }
            _ => Err(self.corrupt("jump target outside the chunk")),
        }
    }

    // ========== Errors ==========

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::CorruptBytecode {
            offset: self.frames.last().map_or(0, |frame| frame.ip.saturating_sub(1)),
            reason: reason.into(),
        }
    }

    fn type_mismatch(&self, mismatch: TypeMismatch) -> Error {
        self.runtime_error(RuntimeErrorKind::TypeMismatch(mismatch.to_string()))
    }

    fn undefined_variable(&self, name: GcRef) -> Error {
        let name = self
            .heap
            .as_string(name)
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        self.runtime_error(RuntimeErrorKind::UndefinedVariable(name))
    }

    /// Builds a runtime error with one trace entry per active frame.
    fn runtime_error(&self, kind: RuntimeErrorKind) -> Error {
        let trace: Vec<TraceEntry> = self
            .frames
            .iter()
            .rev()
            .map(|frame| {
                let function = self.heap.as_function(frame.function);
                TraceEntry {
                    function: function
                        .and_then(|f| f.name)
                        .and_then(|name| self.heap.as_string(name))
                        .map(|name| name.as_str().to_string()),
                    line: function
                        .and_then(|f| f.chunk.line(frame.ip.saturating_sub(1)))
                        .unwrap_or(0),
                }
            })
            .collect();
        let line = trace.first().map_or(0, |entry| entry.line);
        Error::Runtime(RuntimeError { kind, line, trace })
    }

    #[cfg(feature = "trace-execution")]
    fn trace_instruction(&self) {
        let (Ok(frame), Ok(function)) = (self.frame(), self.current_function()) else {
            return;
        };
        let stack: String = self
            .stack
            .iter()
            .map(|value| format!("[ {} ]", value.display(&self.heap)))
            .collect();
        let mut instruction = String::new();
        crate::bytecode::disassemble_instruction(&function.chunk, frame.ip, &self.heap, &mut instruction);
        tracing::trace!(stack = %stack, "{}", instruction.trim_end());
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("stack", &self.stack.len())
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.len())
            .field("heap", &self.heap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GcConfig;
    use crate::vm::output::SharedBuffer;

    fn vm() -> Vm {
        Vm::with_output(VmConfig::default().without_builtins(), Box::new(SharedBuffer::new())).unwrap()
    }

    fn script(build: impl FnOnce(&mut Chunk)) -> Chunk {
        let mut chunk = Chunk::new();
        build(&mut chunk);
        chunk
    }

    #[test]
    fn test_constant_return() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_constant(Value::Number(42.0), 1).unwrap();
            c.write_op(OpCode::Return, 1);
        });
        assert_eq!(vm.run(chunk).unwrap(), Value::Number(42.0));
        assert!(vm.stack.is_empty());
        assert!(vm.frames.is_empty());
    }

    #[test]
    fn test_comparison_and_not() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_constant(Value::Number(1.0), 1).unwrap();
            c.write_constant(Value::Number(2.0), 1).unwrap();
            c.write_op(OpCode::LessEqual, 1);
            c.write_op(OpCode::Not, 1);
            c.write_op(OpCode::Return, 1);
        });
        assert_eq!(vm.run(chunk).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_negate_requires_number() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_op(OpCode::True, 4);
            c.write_op(OpCode::Negate, 4);
            c.write_op(OpCode::Return, 4);
        });
        let err = vm.run(chunk).unwrap_err();
        let runtime = err.as_runtime().unwrap();
        assert_eq!(
            runtime.kind,
            RuntimeErrorKind::TypeMismatch("Operand must be a number.".into())
        );
        assert_eq!(runtime.line, 4);
        assert!(vm.stack.is_empty());
    }

    #[test]
    fn test_add_mixed_operands() {
        let mut vm = vm();
        let s = vm.intern("s").unwrap();
        let chunk = script(|c| {
            c.write_constant(Value::Number(1.0), 2).unwrap();
            c.write_constant(Value::Object(s), 2).unwrap();
            c.write_op(OpCode::Add, 2);
            c.write_op(OpCode::Return, 2);
        });
        let err = vm.run(chunk).unwrap_err();
        assert_eq!(
            err.as_runtime().unwrap().kind,
            RuntimeErrorKind::TypeMismatch("Operands must be two numbers or two strings.".into())
        );
    }

    #[test]
    fn test_set_local_leaves_value() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_constant(Value::Number(1.0), 1).unwrap();
            c.write_constant(Value::Number(5.0), 1).unwrap();
            c.write_op_u8(OpCode::SetLocal, 0, 1);
            c.write_op(OpCode::Pop, 1);
            c.write_op_u8(OpCode::GetLocal, 0, 1);
            c.write_op(OpCode::Return, 1);
        });
        assert_eq!(vm.run(chunk).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_jump_if_false_pops_condition() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_constant(Value::Number(7.0), 1).unwrap();
            c.write_op(OpCode::False, 1);
            let jump = c.emit_jump(OpCode::JumpIfFalse, 1);
            c.write_op(OpCode::Pop, 1);
            c.patch_jump(jump).unwrap();
            c.write_op(OpCode::Return, 1);
        });
        assert_eq!(vm.run(chunk).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_loop_counts_down() {
        let mut vm = vm();
        // slot 0 = 3; while (slot0 > 0) slot0 = slot0 - 1; return slot0
        let chunk = script(|c| {
            c.write_constant(Value::Number(3.0), 1).unwrap();
            let start = c.len();
            c.write_op_u8(OpCode::GetLocal, 0, 2);
            c.write_constant(Value::Number(0.0), 2).unwrap();
            c.write_op(OpCode::Greater, 2);
            let exit = c.emit_jump(OpCode::JumpIfFalse, 2);
            c.write_op_u8(OpCode::GetLocal, 0, 3);
            c.write_constant(Value::Number(1.0), 3).unwrap();
            c.write_op(OpCode::Subtract, 3);
            c.write_op_u8(OpCode::SetLocal, 0, 3);
            c.write_op(OpCode::Pop, 3);
            c.emit_loop(start, 3).unwrap();
            c.patch_jump(exit).unwrap();
            c.write_op_u8(OpCode::GetLocal, 0, 4);
            c.write_op(OpCode::Return, 4);
        });
        assert_eq!(vm.run(chunk).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_bad_constant_index_is_corrupt_bytecode() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_op_u8(OpCode::Constant, 9, 1);
            c.write_op(OpCode::Return, 1);
        });
        let err = vm.run(chunk).unwrap_err();
        assert!(matches!(err, Error::CorruptBytecode { offset: 1, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_running_off_the_end_is_corrupt_bytecode() {
        let mut vm = vm();
        let chunk = script(|c| c.write_op(OpCode::Nil, 1));
        assert!(matches!(
            vm.run(chunk).unwrap_err(),
            Error::CorruptBytecode { offset: 1, .. }
        ));
    }

    #[test]
    fn test_bad_local_slot_is_corrupt_bytecode() {
        let mut vm = vm();
        let chunk = script(|c| {
            c.write_op_u8(OpCode::GetLocal, 3, 1);
            c.write_op(OpCode::Return, 1);
        });
        assert!(matches!(vm.run(chunk).unwrap_err(), Error::CorruptBytecode { .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let mut vm = vm();
        let chunk = script(|c| c.write(0xee, 1));
        match vm.run(chunk).unwrap_err() {
            Error::CorruptBytecode { reason, .. } => assert_eq!(reason, "unknown opcode 238"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_value_stack_limit() {
        let config = VmConfig::default().without_builtins().with_max_stack(4);
        let mut vm = Vm::with_output(config, Box::new(SharedBuffer::new())).unwrap();
        let chunk = script(|c| {
            for _ in 0..4 {
                c.write_op(OpCode::Nil, 1);
            }
            c.write_op(OpCode::Return, 1);
        });
        let err = vm.run(chunk).unwrap_err();
        assert_eq!(err.as_runtime().unwrap().kind, RuntimeErrorKind::StackOverflow);
    }

    #[test]
    fn test_collect_garbage_keeps_globals() {
        let config = VmConfig::default()
            .without_builtins()
            .with_gc(GcConfig::default().with_stress(true));
        let mut vm = Vm::with_output(config, Box::new(SharedBuffer::new())).unwrap();
        let name = vm.intern("kept").unwrap();
        vm.pin(name);
        let value = vm.intern("value").unwrap();
        vm.unpin(name);
        vm.globals.insert(name, Value::Object(value));

        vm.intern("garbage").unwrap();
        vm.collect_garbage();

        assert_eq!(vm.heap().find_interned("garbage"), None);
        assert_eq!(vm.display(vm.global("kept").unwrap()), "value");
    }
}
