// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `clock()`

use std::time::{SystemTime, UNIX_EPOCH};

use crate::runtime::function::NativeContext;
use crate::runtime::value::Value;

/// Whole milliseconds since the Unix epoch.
pub fn clock(_ctx: &mut NativeContext<'_>, _args: &[Value]) -> Result<Value, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock is before the Unix epoch: {}", e))?;
    Ok(Value::Number(elapsed.as_millis() as f64))
}
