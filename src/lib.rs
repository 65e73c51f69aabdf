//! Budgeted mark-sweep heap with scoped rooting, and a script host that runs
//! an interpreter under it.
//!
//! Heap access is bracketed by nested guards:
//!
//! ```
//! use scriptgc::{GcArray, GcString, HeapSlot, StartupGuard};
//!
//! let slot = HeapSlot::new();
//! let startup = StartupGuard::new(&slot, 1 << 20)?;
//! let thread = startup.manage_thread("main")?;
//! let scope = thread.enable()?;
//!
//! let words = scope.alloc_array::<GcString>(2)?;
//! words.set(0, Some(&scope.alloc_string("hello")?))?;
//! words.set(1, Some(&scope.alloc_string("world")?))?;
//! scope.collect()?;
//!
//! assert_eq!(*words.get(&scope, 1)?.unwrap(), "world");
//! # Ok::<(), scriptgc::GcError>(())
//! ```

pub mod config;
pub mod error;
pub mod guards;
pub mod handle;
pub mod heap;
pub mod object;
pub mod probe;
pub mod roots;
pub mod script;
pub mod thread;

pub use config::BudgetConfig;
pub use error::{GcError, GcResult};
pub use guards::{DisableGuard, EnableGuard, HeapSlot, ManageThreadGuard, StartupGuard};
pub use handle::{Local, Persistent, StringLocal};
pub use heap::{CollectionSummary, Heap, HeapObserver, HeapStats, LifecycleEvent};
pub use object::{
    GcArray, GcPrimitiveArray, GcString, ManagedObject, ObjectId, ObjectKind, Ref, Trace,
};
pub use probe::{ProbeAllocator, ProbeError, SystemProbeAllocator, probe_memory_budget};
pub use script::{ExitStatus, Interpreter, ScriptError, ScriptHost, SourceCheckInterpreter};
