// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host output for `PRINT`.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Receives the text written by `PRINT`, one line per call.
///
/// Writes are expected to be visible immediately; implementations must not
/// hold output back until the run ends.
pub trait Output: Send {
    /// Writes one line. The newline is appended by the implementation.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Writes to the process's standard output, flushing after every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl Output for StdoutOutput {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()
    }
}

/// Collects printed lines in memory. Clones share the same buffer, so a host
/// can keep one handle and give another to the VM.
#[derive(Debug, Default, Clone)]
pub struct SharedBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Removes and returns every line written so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl Output for SharedBuffer {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}
