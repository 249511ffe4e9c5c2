// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the Cinder core.

use std::fmt;

use thiserror::Error;

/// Result type for VM, heap and chunk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for a compile-time failure.
pub const EXIT_CODE_COMPILATION_ERROR: i32 = 65;
/// Exit code for a runtime failure.
pub const EXIT_CODE_RUNTIME_ERROR: i32 = 70;
/// Exit code for a fatal system failure.
pub const EXIT_CODE_SYSTEM_ERROR: i32 = 71;

/// Main error type for the Cinder core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Raised by the front end and surfaced through the same channel
    #[error("{0}")]
    Compile(String),

    /// A recoverable error raised while executing bytecode
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The heap could not satisfy an allocation
    #[error("Out of memory: requested {requested} bytes with a limit of {limit} bytes")]
    OutOfMemory {
        /// Bytes the failed allocation needed
        requested: usize,
        /// The configured heap cap
        limit: usize,
    },

    /// The dispatch loop found an index, offset or opcode outside the chunk
    #[error("Corrupt bytecode at offset {offset}: {reason}")]
    CorruptBytecode {
        /// Offset of the faulting byte in the current chunk
        offset: usize,
        /// What was out of range
        reason: String,
    },

    /// The host output collaborator failed to write
    #[error("Output error: {0}")]
    Io(String),
}

impl Error {
    /// Returns whether the error leaves the VM unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::OutOfMemory { .. } | Error::CorruptBytecode { .. } | Error::Io(_)
        )
    }

    /// Returns the process exit code a driver should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Compile(_) => EXIT_CODE_COMPILATION_ERROR,
            Error::Runtime(_) => EXIT_CODE_RUNTIME_ERROR,
            Error::OutOfMemory { .. } | Error::CorruptBytecode { .. } | Error::Io(_) => {
                EXIT_CODE_SYSTEM_ERROR
            }
        }
    }

    /// Returns the runtime error, if this is one.
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

/// The subkind of a runtime error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    /// An operator was applied to operands of the wrong kind
    #[error("{0}")]
    TypeMismatch(String),

    /// A global was read or assigned before being defined
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    /// A callable was invoked with the wrong number of arguments
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Arguments supplied
        got: usize,
    },

    /// The callee is not a function
    #[error("Can only call functions and classes.")]
    NotCallable(&'static str),

    /// The call-frame or value stack limit was exceeded
    #[error("Stack overflow.")]
    StackOverflow,

    /// A native function reported a failure
    #[error("{0}")]
    Native(String),
}

/// One line of a runtime stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Function name, `None` for the top-level script
    pub function: Option<String>,
    /// Source line executing in that frame
    pub line: usize,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A runtime error together with the line it was raised on.
///
/// `Display` shows the message and the innermost frame; [`RuntimeError::report`]
/// shows every frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct RuntimeError {
    /// What went wrong
    pub kind: RuntimeErrorKind,
    /// Source line of the faulting instruction
    pub line: usize,
    /// Active frames at the time of the error, innermost first
    pub trace: Vec<TraceEntry>,
}

impl RuntimeError {
    /// Creates a runtime error without a stack trace.
    pub fn new(kind: RuntimeErrorKind, line: usize) -> Self {
        Self {
            kind,
            line,
            trace: Vec::new(),
        }
    }

    /// Returns the innermost frame, falling back to the script at `line`.
    pub fn location(&self) -> TraceEntry {
        self.trace.first().cloned().unwrap_or(TraceEntry {
            function: None,
            line: self.line,
        })
    }

    /// Renders the message followed by one line per active frame.
    pub fn report(&self) -> String {
        let mut out = self.kind.to_string();
        for entry in &self.trace {
            out.push('\n');
            out.push_str(&entry.to_string());
        }
        out
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.kind, self.location())
    }
}
