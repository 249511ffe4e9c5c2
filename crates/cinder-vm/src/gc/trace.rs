// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Root supply and the mark worklist.
//!
//! The heap knows nothing about the VM. Whoever owns the roots implements
//! [`RootSource`] and hands it to the heap on every call that may collect.

use super::object::GcRef;
use crate::runtime::value::Value;

/// Worklist of objects discovered during marking.
#[derive(Debug, Default)]
pub struct Tracer {
    pending: Vec<GcRef>,
}

impl Tracer {
    /// Creates an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports an object as reachable.
    #[inline]
    pub fn mark(&mut self, gc_ref: GcRef) {
        self.pending.push(gc_ref);
    }

    /// Reports the object behind a value as reachable, if it has one.
    #[inline]
    pub fn mark_value(&mut self, value: &Value) {
        if let Value::Object(gc_ref) = value {
            self.pending.push(*gc_ref);
        }
    }

    /// Reports every object in a slice of values.
    pub fn mark_values(&mut self, values: &[Value]) {
        for value in values {
            self.mark_value(value);
        }
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<GcRef> {
        self.pending.pop()
    }

    /// Consumes the tracer, returning everything reported but not yet visited.
    pub fn into_pending(self) -> Vec<GcRef> {
        self.pending
    }
}

/// Supplies the root set to the collector.
pub trait RootSource {
    /// Reports every root to `tracer`.
    fn trace_roots(&self, tracer: &mut Tracer);
}

/// An empty root set.
///
/// Only pinned objects survive a collection run with these roots.
pub struct NoRoots;

impl RootSource for NoRoots {
    fn trace_roots(&self, _tracer: &mut Tracer) {}
}

impl RootSource for [Value] {
    fn trace_roots(&self, tracer: &mut Tracer) {
        tracer.mark_values(self);
    }
}

impl RootSource for Vec<Value> {
    fn trace_roots(&self, tracer: &mut Tracer) {
        tracer.mark_values(self);
    }
}

impl RootSource for [GcRef] {
    fn trace_roots(&self, tracer: &mut Tracer) {
        for gc_ref in self {
            tracer.mark(*gc_ref);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_value_skips_immediates() {
        let mut tracer = Tracer::new();
        tracer.mark_values(&[
            Value::Nil,
            Value::Number(1.0),
            Value::Object(GcRef::from_raw(7)),
        ]);
        assert_eq!(tracer.into_pending(), vec![GcRef::from_raw(7)]);
    }

    #[test]
    fn test_slice_root_source() {
        let roots = vec![Value::Object(GcRef::from_raw(1)), Value::Bool(true)];
        let mut tracer = Tracer::new();
        roots.trace_roots(&mut tracer);
        assert_eq!(tracer.into_pending(), vec![GcRef::from_raw(1)]);
    }

    #[test]
    fn test_no_roots() {
        let mut tracer = Tracer::new();
        NoRoots.trace_roots(&mut tracer);
        assert!(tracer.pop().is_none());
    }
}
