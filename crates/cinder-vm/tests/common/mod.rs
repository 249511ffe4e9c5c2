//! Shared helpers for the integration tests.
//!
//! There is no compiler in this crate, so tests assemble bytecode by hand
//! with [`Asm`].

#![allow(dead_code)]

use cinder_vm::{Chunk, GcConfig, GcRef, OpCode, Result, SharedBuffer, Value, Vm, VmConfig};

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A VM with builtins, printing into the returned buffer.
pub fn vm() -> (Vm, SharedBuffer) {
    vm_with(VmConfig::default())
}

/// A VM that collects before every allocation.
pub fn stress_vm() -> (Vm, SharedBuffer) {
    vm_with(VmConfig::default().with_gc(GcConfig::default().with_stress(true)))
}

/// A VM with custom configuration, printing into the returned buffer.
pub fn vm_with(config: VmConfig) -> (Vm, SharedBuffer) {
    init_tracing();
    let output = SharedBuffer::new();
    let vm = Vm::with_output(config, Box::new(output.clone())).unwrap();
    (vm, output)
}

/// Hand assembler for one chunk.
///
/// Strings interned for the chunk are pinned until the chunk is owned by a
/// heap function, so a collection in between cannot free them.
pub struct Asm<'vm> {
    vm: &'vm mut Vm,
    chunk: Chunk,
    pinned: Vec<GcRef>,
    line: usize,
}

impl<'vm> Asm<'vm> {
    pub fn new(vm: &'vm mut Vm) -> Self {
        Self {
            vm,
            chunk: Chunk::new(),
            pinned: Vec::new(),
            line: 1,
        }
    }

    /// Sets the source line for everything emitted next.
    pub fn line(&mut self, line: usize) -> &mut Self {
        self.line = line;
        self
    }

    pub fn op(&mut self, op: OpCode) -> &mut Self {
        self.chunk.write_op(op, self.line);
        self
    }

    pub fn op_u8(&mut self, op: OpCode, operand: u8) -> &mut Self {
        self.chunk.write_op_u8(op, operand, self.line);
        self
    }

    pub fn number(&mut self, n: f64) -> &mut Self {
        self.constant(Value::Number(n))
    }

    pub fn constant(&mut self, value: Value) -> &mut Self {
        self.chunk.write_constant(value, self.line).unwrap();
        self
    }

    pub fn string(&mut self, chars: &str) -> &mut Self {
        let s = self.intern(chars);
        self.constant(Value::Object(s))
    }

    /// Emits a global instruction naming `name`.
    pub fn global(&mut self, op: OpCode, name: &str) -> &mut Self {
        let s = self.intern(name);
        let index = self.chunk.add_constant(Value::Object(s)).unwrap();
        self.op_u8(op, index)
    }

    pub fn call(&mut self, argc: u8) -> &mut Self {
        self.op_u8(OpCode::Call, argc)
    }

    pub fn emit_jump(&mut self, op: OpCode) -> usize {
        self.chunk.emit_jump(op, self.line)
    }

    pub fn patch_jump(&mut self, offset: usize) -> &mut Self {
        self.chunk.patch_jump(offset).unwrap();
        self
    }

    pub fn loop_start(&self) -> usize {
        self.chunk.len()
    }

    pub fn emit_loop(&mut self, start: usize) -> &mut Self {
        self.chunk.emit_loop(start, self.line).unwrap();
        self
    }

    fn intern(&mut self, chars: &str) -> GcRef {
        let s = self.vm.intern(chars).unwrap();
        self.vm.pin(s);
        self.pinned.push(s);
        s
    }

    fn release(&mut self) {
        for gc_ref in self.pinned.drain(..) {
            self.vm.unpin(gc_ref);
        }
    }

    /// Runs the chunk as a top-level script.
    pub fn run(&mut self) -> Result<Value> {
        let chunk = std::mem::take(&mut self.chunk);
        let result = self.vm.run(chunk);
        self.release();
        result
    }

    /// Turns the chunk into a named function.
    ///
    /// The returned function is pinned; it stays alive for the rest of the
    /// test unless the caller unpins it.
    pub fn function(&mut self, name: &str, arity: u8) -> GcRef {
        let name = self.intern(name);
        let function = self.vm.allocate_function(Some(name), arity).unwrap();
        self.vm.pin(function);

        let chunk = std::mem::take(&mut self.chunk);
        self.vm.function_mut(function).unwrap().chunk = chunk;
        self.release();
        function
    }
}

/// Returns the string behind `value`, if it is one.
pub fn as_str(vm: &Vm, value: Value) -> Option<String> {
    let gc_ref = value.as_object()?;
    vm.heap().as_string(gc_ref).map(|s| s.as_str().to_string())
}
