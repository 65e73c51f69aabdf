//! Script execution on top of the managed heap.

pub mod error;
pub mod host;
pub mod interpreter;
pub mod source;

pub use error::{ErrorKind, ScriptError};
pub use host::{ExitStatus, MAIN_THREAD_NAME, ScriptHost};
pub use interpreter::{Interpreter, SourceCheckInterpreter};
pub use source::ScriptSource;
