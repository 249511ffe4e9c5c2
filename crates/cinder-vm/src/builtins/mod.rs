// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in native functions.

pub mod clock;

use crate::error::Result;
use crate::vm::Vm;

/// Register all built-in natives as globals.
pub fn register_builtins(vm: &mut Vm) -> Result<()> {
    vm.define_native("clock", 0, clock::clock)?;
    Ok(())
}
