// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Runtime data: values, functions and call frames.

pub mod function;
pub mod value;

pub use function::{CallFrame, NativeContext, NativeFn, ObjectFunction, ObjectNativeFunction};
pub use value::{TypeMismatch, Value, ValueKind};
