// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - Dispatch loop, call frames and globals
//! - `output` - Host output collaborator used by `PRINT`

mod interpreter;
pub mod output;

pub use interpreter::Vm;
pub use output::{Output, SharedBuffer, StdoutOutput};
