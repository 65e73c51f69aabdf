//! Boundary between the script host and a language front end.

use crate::guards::EnableGuard;
use crate::handle::Local;
use crate::object::{GcArray, GcString};

use super::error::ScriptError;
use super::source::ScriptSource;

/// Top-level entry of a language implementation.
///
/// Called once per run, inside an enable scope, with every host-owned value
/// rooted for the duration of the call.
pub trait Interpreter {
    /// Run the scripts in `sources`. Returns whether execution succeeded.
    fn execute_top_script(
        &mut self,
        scope: &EnableGuard<'_>,
        sources: &Local<'_, GcArray<ScriptSource>>,
        arguments: &Local<'_, GcArray<GcString>>,
    ) -> Result<bool, ScriptError>;
}

/// Interpreter used until a language front end is plugged in: a script
/// succeeds if its source is valid UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceCheckInterpreter;

impl Interpreter for SourceCheckInterpreter {
    fn execute_top_script(
        &mut self,
        scope: &EnableGuard<'_>,
        sources: &Local<'_, GcArray<ScriptSource>>,
        arguments: &Local<'_, GcArray<GcString>>,
    ) -> Result<bool, ScriptError> {
        for index in 0..sources.len() {
            let Some(source) = sources.get(scope, index)? else {
                continue;
            };
            let name = source.file_name(scope)?;
            let name = String::from_utf8_lossy(name.as_bytes()).into_owned();
            let code = source.code(scope)?;
            if let Err(err) = code.to_str() {
                tracing::info!(file = %name, %err, "script is not valid UTF-8");
                return Ok(false);
            }
            tracing::debug!(
                file = %name,
                bytes = code.len(),
                arguments = arguments.len(),
                "script accepted"
            );
        }
        Ok(true)
    }
}
