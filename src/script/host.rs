//! Script execution entry.
//!
//! [`ScriptHost::run`] probes the memory budget, opens the startup, thread and
//! enable scopes in that order, builds the managed inputs and hands them to
//! the [`Interpreter`]. Every failure, panics included, is reported as one
//! diagnostic line and exit status 1.

use std::{
    borrow::Cow,
    io::Write,
    panic::{self, AssertUnwindSafe},
    process::ExitCode,
    sync::Arc,
};

use crate::config::BudgetConfig;
use crate::guards::{HeapSlot, StartupGuard};
use crate::heap::HeapObserver;
use crate::probe::{ProbeAllocator, SystemProbeAllocator, probe_memory_budget};

use super::error::{ScriptError, UNHANDLED_DIAGNOSTIC};
use super::interpreter::Interpreter;
use super::source::{create_arguments_array, load_file, single_script_source};

/// Name under which the host attaches its thread.
pub const MAIN_THREAD_NAME: &str = "main";

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl From<bool> for ExitStatus {
    fn from(succeeded: bool) -> Self {
        if succeeded {
            ExitStatus::Success
        } else {
            ExitStatus::Failure
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::SUCCESS,
            ExitStatus::Failure => ExitCode::FAILURE,
        }
    }
}

/// Runs top-level scripts under a freshly started heap.
pub struct ScriptHost<'a, I> {
    interpreter: I,
    budget: BudgetConfig,
    prober: Box<dyn ProbeAllocator + 'a>,
    slot: &'a HeapSlot,
    observer: Option<Arc<dyn HeapObserver>>,
}

impl<I: Interpreter> ScriptHost<'static, I> {
    /// Host using the process heap slot, the system allocator for probing and
    /// the budget bounds from the environment.
    pub fn new(interpreter: I) -> Self {
        Self {
            interpreter,
            budget: BudgetConfig::from_env(),
            prober: Box::new(SystemProbeAllocator),
            slot: HeapSlot::global(),
            observer: None,
        }
    }
}

impl<'a, I: Interpreter> ScriptHost<'a, I> {
    pub fn with_budget_config(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_prober(mut self, prober: impl ProbeAllocator + 'a) -> Self {
        self.prober = Box::new(prober);
        self
    }

    pub fn with_heap_slot<'b>(self, slot: &'b HeapSlot) -> ScriptHost<'b, I>
    where
        'a: 'b,
    {
        ScriptHost {
            interpreter: self.interpreter,
            budget: self.budget,
            prober: self.prober,
            slot,
            observer: self.observer,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn HeapObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn budget_config(&self) -> &BudgetConfig {
        &self.budget
    }

    /// Run `file_name` with `arguments` under a heap of `memory_limit_mb`
    /// MiB (0 selects the default). Failures are written to `diagnostics`.
    pub fn run(
        &mut self,
        file_name: &str,
        arguments: &[String],
        memory_limit_mb: usize,
        diagnostics: &mut dyn Write,
    ) -> ExitStatus {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(file_name, arguments, memory_limit_mb)
        }));

        let diagnostic: Cow<'static, str> = match outcome {
            Ok(Ok(succeeded)) => {
                tracing::debug!(file = file_name, succeeded, "script finished");
                return ExitStatus::from(succeeded);
            }
            Ok(Err(err)) => {
                tracing::debug!(file = file_name, kind = ?err.kind(), error = ?err, "script failed");
                err.diagnostic()
            }
            Err(_) => {
                tracing::error!(file = file_name, "script host panicked");
                Cow::Borrowed(UNHANDLED_DIAGNOSTIC)
            }
        };

        if let Err(err) = writeln!(diagnostics, "{diagnostic}") {
            tracing::warn!(%err, "failed to write diagnostic");
        }
        ExitStatus::Failure
    }

    fn execute(
        &mut self,
        file_name: &str,
        arguments: &[String],
        memory_limit_mb: usize,
    ) -> Result<bool, ScriptError> {
        let budget = probe_memory_budget(memory_limit_mb, &self.budget, &*self.prober)?;

        let startup = match &self.observer {
            Some(observer) => StartupGuard::with_observer(self.slot, budget, observer.clone())?,
            None => StartupGuard::new(self.slot, budget)?,
        };
        let thread = startup.manage_thread(MAIN_THREAD_NAME)?;
        let scope = thread.enable()?;

        let code = load_file(&scope, file_name)?;
        let name = scope.alloc_string(file_name)?;
        let argv = create_arguments_array(&scope, arguments)?;
        let sources = single_script_source(&scope, &name, &code)?;

        self.interpreter.execute_top_script(&scope, &sources, &argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::EnableGuard;
    use crate::handle::Local;
    use crate::object::{GcArray, GcString};
    use crate::script::source::ScriptSource;

    struct Fixed(bool);

    impl Interpreter for Fixed {
        fn execute_top_script(
            &mut self,
            _scope: &EnableGuard<'_>,
            _sources: &Local<'_, GcArray<ScriptSource>>,
            _arguments: &Local<'_, GcArray<GcString>>,
        ) -> Result<bool, ScriptError> {
            Ok(self.0)
        }
    }

    #[test]
    fn exit_status_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::Failure.code(), 1);
        assert_eq!(ExitStatus::from(true), ExitStatus::Success);
        assert!(!ExitStatus::from(false).is_success());
    }

    #[test]
    fn interpreter_result_maps_to_status_without_diagnostic() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let slot = HeapSlot::new();

        for (result, expected) in [(true, ExitStatus::Success), (false, ExitStatus::Failure)] {
            let mut host = ScriptHost::new(Fixed(result)).with_heap_slot(&slot);
            let mut diagnostics = Vec::new();
            assert_eq!(host.run(path, &[], 1, &mut diagnostics), expected);
            assert!(diagnostics.is_empty());
            assert!(!slot.is_active());
        }
    }

    #[test]
    fn missing_file_reports_runtime_error() {
        let slot = HeapSlot::new();
        let mut host = ScriptHost::new(Fixed(true)).with_heap_slot(&slot);
        let mut diagnostics = Vec::new();

        let status = host.run("/nonexistent/path", &[], 8, &mut diagnostics);
        assert_eq!(status, ExitStatus::Failure);
        assert_eq!(
            String::from_utf8(diagnostics).unwrap(),
            "Run-time error: File not found: /nonexistent/path\n"
        );
    }
}
