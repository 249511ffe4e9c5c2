// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! GC object representation.
//!
//! Objects form a closed set of variants sharing one [`ObjectKind`] tag. The
//! collector only needs the tag, a size estimate and [`Object::trace`].

use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

use rustc_hash::FxHasher;

use super::trace::Tracer;
use crate::runtime::function::{ObjectFunction, ObjectNativeFunction};

/// A handle to a heap object.
///
/// The handle is an index into the heap's slot table plus the generation of
/// that slot when the object was stored. It never owns the object; the
/// [`Heap`](super::heap::Heap) does. Once the object is freed the slot's
/// generation moves on and the handle stops resolving, even if the slot is
/// reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef {
    index: u32,
    generation: u32,
}

impl GcRef {
    /// Creates a first-generation handle from a raw slot index.
    #[inline]
    pub fn from_raw(index: u32) -> Self {
        Self::new(index, 0)
    }

    #[inline]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index of this handle.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Returns the slot generation this handle was issued for.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for GcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcRef({}@{})", self.index, self.generation)
    }
}

/// Type tag shared by every heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// An [`ObjectString`]
    String,
    /// An [`ObjectFunction`]
    Function,
    /// An [`ObjectNativeFunction`]
    NativeFunction,
}

impl ObjectKind {
    /// Returns the user-facing name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::String => "string",
            ObjectKind::Function => "function",
            ObjectKind::NativeFunction => "native function",
        }
    }
}

/// Collector metadata stored alongside every object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectHeader {
    /// Set during mark, cleared by sweep on survivors
    pub marked: bool,
    /// Bytes currently accounted to this object
    pub size: usize,
}

/// An immutable, interned string with a cached hash.
#[derive(Debug, Clone)]
pub struct ObjectString {
    chars: Arc<str>,
    hash: u64,
}

impl ObjectString {
    /// Creates a string object, computing its hash.
    pub fn new(chars: Arc<str>) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(chars.as_bytes());
        let hash = hasher.finish();
        Self { chars, hash }
    }

    /// Returns the string contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    /// Returns the shared buffer backing this string.
    #[inline]
    pub(crate) fn chars(&self) -> &Arc<str> {
        &self.chars
    }

    /// Returns the cached hash.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns the length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Returns whether the string is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// A heap object.
#[derive(Debug)]
pub enum Object {
    /// Interned string
    String(ObjectString),
    /// Compiled function owning its chunk
    Function(ObjectFunction),
    /// Host-provided function
    NativeFunction(ObjectNativeFunction),
}

impl Object {
    /// Returns the type tag of this object.
    #[inline]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::String(_) => ObjectKind::String,
            Object::Function(_) => ObjectKind::Function,
            Object::NativeFunction(_) => ObjectKind::NativeFunction,
        }
    }

    /// Returns the approximate size in bytes, excluding the slot itself.
    pub fn size_bytes(&self) -> usize {
        match self {
            Object::String(s) => s.len(),
            Object::Function(f) => f.chunk.size_bytes(),
            Object::NativeFunction(n) => n.name.len(),
        }
    }

    /// Reports every object this object keeps alive.
    pub fn trace(&self, tracer: &mut Tracer) {
        match self {
            Object::String(_) | Object::NativeFunction(_) => {}
            Object::Function(function) => {
                if let Some(name) = function.name {
                    tracer.mark(name);
                }
                for constant in function.chunk.constants() {
                    tracer.mark_value(constant);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Chunk;
    use crate::runtime::value::Value;

    #[test]
    fn test_gc_ref_index() {
        let gc_ref = GcRef::from_raw(42);
        assert_eq!(gc_ref.index(), 42);
        assert_eq!(gc_ref.generation(), 0);
        assert_eq!(format!("{:?}", gc_ref), "GcRef(42@0)");
        assert_ne!(gc_ref, GcRef::new(42, 1));
    }

    #[test]
    fn test_string_hash_is_content_based() {
        let a = ObjectString::new(Arc::from("foo"));
        let b = ObjectString::new(Arc::from("foo"));
        let c = ObjectString::new(Arc::from("bar"));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
        assert_eq!(a.len(), 3);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_object_kind() {
        let object = Object::String(ObjectString::new(Arc::from("x")));
        assert_eq!(object.kind(), ObjectKind::String);
        assert_eq!(object.kind().name(), "string");
    }

    #[test]
    fn test_function_trace_reports_name_and_constants() {
        let name = GcRef::from_raw(1);
        let constant = GcRef::from_raw(2);

        let mut chunk = Chunk::new();
        chunk.add_constant(Value::Object(constant)).unwrap();
        chunk.add_constant(Value::Number(1.0)).unwrap();
        let function = Object::Function(ObjectFunction::with_chunk(Some(name), 0, chunk));

        let mut tracer = Tracer::new();
        function.trace(&mut tracer);
        let refs = tracer.into_pending();
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&name));
        assert!(refs.contains(&constant));
    }

    #[test]
    fn test_string_trace_is_empty() {
        let object = Object::String(ObjectString::new(Arc::from("leaf")));
        let mut tracer = Tracer::new();
        object.trace(&mut tracer);
        assert!(tracer.into_pending().is_empty());
    }
}
