// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Garbage collection.
//!
//! A stop-the-world mark-sweep collector over a slot-table heap. The heap
//! owns every object; the rest of the crate holds [`GcRef`] handles.
//!
//! ## Structure
//!
//! - `object` - Object variants, handles and headers
//! - `heap` - Allocator, interning table and collector
//! - `trace` - Root supply and the mark worklist

pub mod heap;
pub mod object;
pub mod trace;

pub use heap::{FunctionMut, GcStats, Heap};
pub use object::{GcRef, Object, ObjectKind, ObjectString};
pub use trace::{NoRoots, RootSource, Tracer};
