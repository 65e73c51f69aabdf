//! Script source descriptors and the managed values built for an execution.

use std::{fs::File, io::Read, mem::size_of};

use crate::error::{GcError, GcResult};
use crate::guards::EnableGuard;
use crate::handle::{Local, StringLocal};
use crate::object::{GcArray, GcString, ManagedObject, ObjectId, ObjectKind, Ref, Trace};

use super::error::ScriptError;

/// A named unit of source code.
#[derive(Debug, Clone, Copy)]
pub struct ScriptSource {
    file_name: Ref<GcString>,
    code: Ref<GcString>,
}

impl ScriptSource {
    /// Both strings must live in the same heap.
    pub fn new(file_name: &StringLocal<'_>, code: &StringLocal<'_>) -> GcResult<Self> {
        if file_name.id().heap_id() != code.id().heap_id() {
            return Err(GcError::ForeignHeap);
        }
        Ok(Self {
            file_name: file_name.to_ref(),
            code: code.to_ref(),
        })
    }

    pub fn file_name<'s>(&self, scope: &'s EnableGuard<'_>) -> GcResult<StringLocal<'s>> {
        scope.root(self.file_name)
    }

    pub fn code<'s>(&self, scope: &'s EnableGuard<'_>) -> GcResult<StringLocal<'s>> {
        scope.root(self.code)
    }
}

impl Trace for ScriptSource {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        self.file_name.trace(visitor);
        self.code.trace(visitor);
    }
}

impl ManagedObject for ScriptSource {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ScriptSource
    }

    fn payload_size(&self) -> usize {
        2 * size_of::<Ref<GcString>>()
    }
}

/// Read the whole file into a managed string.
///
/// A file that cannot be opened is a runtime error naming it; failures after
/// the open are passed through as I/O errors. A file larger than the whole
/// heap budget is refused as out of memory before it is read.
pub fn load_file<'s>(
    scope: &'s EnableGuard<'_>,
    file_name: &str,
) -> Result<StringLocal<'s>, ScriptError> {
    let mut file = File::open(file_name).map_err(|err| {
        tracing::debug!(file = file_name, %err, "failed to open script");
        ScriptError::runtime(format!("File not found: {file_name}"))
    })?;

    let budget = scope.heap().budget_bytes();
    let size = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);
    if size > budget {
        tracing::debug!(file = file_name, size, budget, "script exceeds heap budget");
        return Err(ScriptError::OutOfMemory);
    }

    let mut bytes = Vec::with_capacity(size);
    file.read_to_end(&mut bytes)?;
    tracing::debug!(file = file_name, bytes = bytes.len(), "script loaded");

    Ok(scope.alloc(GcString::new(bytes))?)
}

/// Managed array holding one string per argument, in order.
pub fn create_arguments_array<'s>(
    scope: &'s EnableGuard<'_>,
    arguments: &[String],
) -> GcResult<Local<'s, GcArray<GcString>>> {
    let array = scope.alloc_array(arguments.len())?;
    for (index, argument) in arguments.iter().enumerate() {
        let value = scope.alloc_string(argument)?;
        array.set(index, Some(&value))?;
    }
    Ok(array)
}

/// One-element source array for a top-level script.
pub fn single_script_source<'s>(
    scope: &'s EnableGuard<'_>,
    file_name: &StringLocal<'_>,
    code: &StringLocal<'_>,
) -> GcResult<Local<'s, GcArray<ScriptSource>>> {
    let source = scope.alloc(ScriptSource::new(file_name, code)?)?;
    let sources = scope.alloc_array(1)?;
    sources.set(0, Some(&source))?;
    Ok(sources)
}
