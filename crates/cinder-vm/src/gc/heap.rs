// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The memory mutator: allocator, string interning table and mark-sweep
//! collector.
//!
//! # Design
//!
//! Objects live in a slot table (`Vec<Option<HeapEntry>>`) with a free list
//! for reuse. Everything outside the heap holds [`GcRef`] indices, never
//! owning pointers. Each slot carries a generation that advances when its
//! object is freed, so a handle to a freed object never resolves to the
//! slot's next occupant. A collection marks from the roots supplied by the caller
//! (plus pinned objects), then sweeps every unmarked slot back to the free
//! list.
//!
//! ```text
//! allocate ──► bytes_allocated > next_gc ? ──► mark(roots, pinned, pending)
//!                                             └► sweep(slots, interning table)
//!                                             └► next_gc = live * growth_factor
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::object::{GcRef, Object, ObjectHeader, ObjectString};
use super::trace::{RootSource, Tracer};
use crate::config::GcConfig;
use crate::error::{Error, Result};
use crate::runtime::function::{ObjectFunction, ObjectNativeFunction};

/// A slot in the heap combining header and object.
#[derive(Debug)]
struct HeapEntry {
    header: ObjectHeader,
    object: Object,
}

/// Statistics about garbage collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Number of completed collections
    pub collections: usize,
    /// Total objects allocated
    pub objects_allocated: usize,
    /// Total objects freed
    pub objects_freed: usize,
    /// Total bytes freed
    pub bytes_freed: usize,
    /// Peak accounted heap size in bytes
    pub peak_bytes: usize,
}

/// The garbage-collected heap.
///
/// Each VM owns one heap; objects are never shared across heaps.
pub struct Heap {
    /// Storage for all objects
    entries: Vec<Option<HeapEntry>>,
    /// Free list (indices of available slots)
    free_slots: Vec<u32>,
    /// Current generation of every slot, parallel to `entries`
    generations: Vec<u32>,
    /// Interning table; weak, entries are dropped when their string is swept
    strings: FxHashMap<Arc<str>, GcRef>,
    /// Extra roots registered by the embedder
    pinned: Vec<GcRef>,
    /// Currently accounted bytes
    bytes_allocated: usize,
    /// Allocation level that triggers the next collection
    next_gc: usize,
    config: GcConfig,
    stats: GcStats,
}

impl Heap {
    /// Creates a new heap with default configuration.
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Creates a new heap with custom configuration.
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            entries: Vec::new(),
            free_slots: Vec::new(),
            generations: Vec::new(),
            strings: FxHashMap::default(),
            pinned: Vec::new(),
            bytes_allocated: 0,
            next_gc: config.initial_threshold,
            config,
            stats: GcStats::default(),
        }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Returns collection statistics.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Returns the currently accounted heap size.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Returns the allocation level that triggers the next collection.
    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    /// Returns the number of live objects.
    pub fn object_count(&self) -> usize {
        self.entries.len() - self.free_slots.len()
    }

    /// Returns the number of strings in the interning table.
    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    /// Allocates `object`, collecting first if the threshold is crossed.
    ///
    /// Objects referenced by `object` are treated as roots during that
    /// collection, so a value under construction never loses its children.
    pub fn allocate(&mut self, object: Object, roots: &dyn RootSource) -> Result<GcRef> {
        let size = entry_size(object.size_bytes());

        let mut collected = false;
        if self.config.stress || self.bytes_allocated + size > self.next_gc {
            self.collect_with(roots, Some(&object));
            collected = true;
        }

        if let Some(limit) = self.config.max_heap_bytes {
            if !collected && self.bytes_allocated + size > limit {
                self.collect_with(roots, Some(&object));
            }
            if self.bytes_allocated + size > limit {
                return Err(Error::OutOfMemory {
                    requested: size,
                    limit,
                });
            }
        }

        let entry = HeapEntry {
            header: ObjectHeader { marked: false, size },
            object,
        };

        let gc_ref = if let Some(index) = self.free_slots.pop() {
            self.entries[index as usize] = Some(entry);
            GcRef::new(index, self.generations[index as usize])
        } else {
            let index = u32::try_from(self.entries.len()).map_err(|_| Error::OutOfMemory {
                requested: size,
                limit: self.bytes_allocated,
            })?;
            self.entries.push(Some(entry));
            self.generations.push(0);
            GcRef::new(index, 0)
        };

        self.bytes_allocated += size;
        self.stats.objects_allocated += 1;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.bytes_allocated);

        Ok(gc_ref)
    }

    /// Returns the canonical string object for `chars`, allocating it on
    /// first use.
    pub fn intern_string(&mut self, chars: &str, roots: &dyn RootSource) -> Result<GcRef> {
        if let Some(&existing) = self.strings.get(chars) {
            return Ok(existing);
        }

        let chars: Arc<str> = Arc::from(chars);
        let gc_ref = self.allocate(Object::String(ObjectString::new(chars.clone())), roots)?;
        self.strings.insert(chars, gc_ref);
        Ok(gc_ref)
    }

    /// Looks up an interned string without allocating.
    pub fn find_interned(&self, chars: &str) -> Option<GcRef> {
        self.strings.get(chars).copied()
    }

    /// Allocates a function with an empty chunk.
    pub fn allocate_function(
        &mut self,
        name: Option<GcRef>,
        arity: u8,
        roots: &dyn RootSource,
    ) -> Result<GcRef> {
        self.allocate(Object::Function(ObjectFunction::new(name, arity)), roots)
    }

    /// Allocates a native function.
    pub fn allocate_native(
        &mut self,
        native: ObjectNativeFunction,
        roots: &dyn RootSource,
    ) -> Result<GcRef> {
        self.allocate(Object::NativeFunction(native), roots)
    }

    #[inline]
    fn is_current(&self, gc_ref: GcRef) -> bool {
        self.generations.get(gc_ref.index()) == Some(&gc_ref.generation())
    }

    /// Gets an object by handle. Handles to freed objects return `None`.
    #[inline]
    pub fn get(&self, gc_ref: GcRef) -> Option<&Object> {
        if !self.is_current(gc_ref) {
            return None;
        }
        self.entries
            .get(gc_ref.index())
            .and_then(|slot| slot.as_ref())
            .map(|entry| &entry.object)
    }

    /// Returns whether the handle points at a live object.
    pub fn contains(&self, gc_ref: GcRef) -> bool {
        self.get(gc_ref).is_some()
    }

    /// Gets a string object by handle.
    #[inline]
    pub fn as_string(&self, gc_ref: GcRef) -> Option<&ObjectString> {
        match self.get(gc_ref) {
            Some(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Gets a function object by handle.
    #[inline]
    pub fn as_function(&self, gc_ref: GcRef) -> Option<&ObjectFunction> {
        match self.get(gc_ref) {
            Some(Object::Function(f)) => Some(f),
            _ => None,
        }
    }

    /// Gets a function object mutably, for emitting into its chunk.
    ///
    /// The function's size is re-accounted when the returned guard drops, so
    /// emitted code counts towards the next collection and the heap cap. Going
    /// past the cap surfaces as `OutOfMemory` from the next allocation.
    pub fn function_mut(&mut self, gc_ref: GcRef) -> Option<FunctionMut<'_>> {
        if !self.is_current(gc_ref) {
            return None;
        }
        let Heap {
            entries,
            bytes_allocated,
            stats,
            ..
        } = self;
        let HeapEntry { header, object } = entries.get_mut(gc_ref.index())?.as_mut()?;
        match object {
            Object::Function(function) => Some(FunctionMut {
                function,
                header,
                bytes_allocated,
                peak_bytes: &mut stats.peak_bytes,
            }),
            _ => None,
        }
    }

    /// Gets a native function object by handle.
    #[inline]
    pub fn as_native(&self, gc_ref: GcRef) -> Option<&ObjectNativeFunction> {
        match self.get(gc_ref) {
            Some(Object::NativeFunction(n)) => Some(n),
            _ => None,
        }
    }

    /// Keeps `gc_ref` alive across collections until [`Heap::unpin`].
    pub fn pin(&mut self, gc_ref: GcRef) {
        self.pinned.push(gc_ref);
    }

    /// Releases one [`Heap::pin`] of `gc_ref`.
    pub fn unpin(&mut self, gc_ref: GcRef) {
        if let Some(pos) = self.pinned.iter().rposition(|&r| r == gc_ref) {
            self.pinned.swap_remove(pos);
        }
    }

    /// Forces a garbage collection, returning the number of objects freed.
    pub fn collect(&mut self, roots: &dyn RootSource) -> usize {
        self.collect_with(roots, None)
    }

    fn collect_with(&mut self, roots: &dyn RootSource, pending: Option<&Object>) -> usize {
        let before = self.bytes_allocated;
        debug!(
            collection = self.stats.collections + 1,
            objects = self.object_count(),
            bytes = before,
            "gc begin"
        );

        let mut tracer = Tracer::new();
        roots.trace_roots(&mut tracer);
        for &gc_ref in &self.pinned {
            tracer.mark(gc_ref);
        }
        if let Some(object) = pending {
            object.trace(&mut tracer);
        }
        self.mark(tracer);

        let freed = self.sweep();

        let growth = self.config.growth_factor.max(1.0);
        let grown = (self.bytes_allocated as f64 * growth) as usize;
        self.next_gc = grown.max(self.config.min_threshold);
        self.stats.collections += 1;

        debug!(
            freed,
            collected_bytes = before - self.bytes_allocated,
            bytes = self.bytes_allocated,
            next_gc = self.next_gc,
            "gc end"
        );

        freed
    }

    /// Mark phase: drain the worklist, marking everything reachable.
    fn mark(&mut self, mut tracer: Tracer) {
        while let Some(gc_ref) = tracer.pop() {
            if !self.is_current(gc_ref) {
                continue;
            }
            let Some(entry) = self
                .entries
                .get_mut(gc_ref.index())
                .and_then(|slot| slot.as_mut())
            else {
                continue;
            };
            if entry.header.marked {
                continue;
            }
            entry.header.marked = true;
            entry.object.trace(&mut tracer);
        }
    }

    /// Sweep phase: free unmarked objects and reset marks on survivors.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;

        for index in 0..self.entries.len() {
            let slot = &mut self.entries[index];
            let Some(entry) = slot else {
                continue;
            };
            if entry.header.marked {
                entry.header.marked = false;
                continue;
            }

            let Some(entry) = slot.take() else {
                continue;
            };
            trace!(index, kind = ?entry.object.kind(), size = entry.header.size, "free");

            if let Object::String(s) = &entry.object {
                self.strings.remove(s.chars().as_ref());
            }
            self.bytes_allocated -= entry.header.size;
            self.stats.bytes_freed += entry.header.size;
            self.generations[index] = self.generations[index].wrapping_add(1);
            self.free_slots.push(index as u32);
            freed += 1;
        }

        self.stats.objects_freed += freed;
        freed
    }
}

/// Accounted size of an object with `payload` bytes, including its slot.
fn entry_size(payload: usize) -> usize {
    std::mem::size_of::<HeapEntry>() + payload
}

/// Mutable access to a function returned by [`Heap::function_mut`].
///
/// Dropping the guard brings the function's accounted size up to date with
/// its chunk.
pub struct FunctionMut<'heap> {
    function: &'heap mut ObjectFunction,
    header: &'heap mut ObjectHeader,
    bytes_allocated: &'heap mut usize,
    peak_bytes: &'heap mut usize,
}

impl Deref for FunctionMut<'_> {
    type Target = ObjectFunction;

    fn deref(&self) -> &ObjectFunction {
        &*self.function
    }
}

impl DerefMut for FunctionMut<'_> {
    fn deref_mut(&mut self) -> &mut ObjectFunction {
        &mut *self.function
    }
}

impl Drop for FunctionMut<'_> {
    fn drop(&mut self) {
        let size = entry_size(self.function.chunk.size_bytes());
        if size == self.header.size {
            return;
        }
        // `header.size` is part of `bytes_allocated`, so this cannot underflow.
        *self.bytes_allocated = *self.bytes_allocated - self.header.size + size;
        self.header.size = size;
        *self.peak_bytes = (*self.peak_bytes).max(*self.bytes_allocated);
        trace!(size, bytes = *self.bytes_allocated, "function resized");
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("objects", &self.object_count())
            .field("interned", &self.strings.len())
            .field("bytes_allocated", &self.bytes_allocated)
            .field("next_gc", &self.next_gc)
            .field("free_slots", &self.free_slots.len())
            .finish()
    }
}
