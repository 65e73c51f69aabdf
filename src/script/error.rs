//! Error taxonomy of the script host and its one-line diagnostics.

use std::{borrow::Cow, io};

use thiserror::Error;

use crate::error::GcError;
use crate::probe::ProbeError;

pub const OUT_OF_MEMORY_DIAGNOSTIC: &str = "Out of memory!";
pub const UNHANDLED_DIAGNOSTIC: &str = "Unhandled exception!";

/// Failure raised while loading or running a script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Condition reported to the user, such as a missing input file
    #[error("Run-time error: {0}")]
    Runtime(String),
    /// Unrecoverable condition outside normal execution
    #[error("Fatal error: {0}")]
    Fatal(String),
    /// The heap could not satisfy an allocation after collecting
    #[error("Out of memory")]
    OutOfMemory,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Classification used at the top-level boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Runtime,
    Fatal,
    OutOfMemory,
    Unhandled,
}

impl ScriptError {
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ScriptError::Fatal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScriptError::Runtime(_) => ErrorKind::Runtime,
            ScriptError::Fatal(_) => ErrorKind::Fatal,
            ScriptError::OutOfMemory => ErrorKind::OutOfMemory,
            ScriptError::Io(_) | ScriptError::Other(_) => ErrorKind::Unhandled,
        }
    }

    /// The line printed for this error. Out-of-memory yields a static string
    /// so reporting it does not allocate.
    pub fn diagnostic(&self) -> Cow<'static, str> {
        match self.kind() {
            ErrorKind::Runtime | ErrorKind::Fatal => Cow::Owned(self.to_string()),
            ErrorKind::OutOfMemory => Cow::Borrowed(OUT_OF_MEMORY_DIAGNOSTIC),
            ErrorKind::Unhandled => Cow::Borrowed(UNHANDLED_DIAGNOSTIC),
        }
    }
}

impl From<GcError> for ScriptError {
    fn from(err: GcError) -> Self {
        if err.is_out_of_memory() {
            ScriptError::OutOfMemory
        } else {
            ScriptError::Fatal(err.to_string())
        }
    }
}

impl From<ProbeError> for ScriptError {
    fn from(err: ProbeError) -> Self {
        ScriptError::Fatal(err.to_string())
    }
}
