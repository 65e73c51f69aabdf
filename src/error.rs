//! Error types for the managed heap.

use thiserror::Error;

/// Errors that can occur during heap lifecycle and allocation.
///
/// `OutOfMemory` is the only condition raised by the collector itself; every
/// other variant reports a broken lifecycle contract (wrong thread, heap not
/// running, allocation parked).
///
/// # Examples
///
/// ```
/// use scriptgc::error::{GcError, GcResult};
///
/// let oom_error = GcError::OutOfMemory;
/// let failure: GcResult<u32> = Err(GcError::Disabled);
///
/// assert!(failure.is_err());
/// assert_eq!(oom_error.to_string(), "Out of memory");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GcError {
    /// A collection could not free enough space for the pending allocation
    #[error("Out of memory")]
    OutOfMemory,
    /// Another heap is already active in the same slot
    #[error("Heap already started")]
    AlreadyStarted,
    /// The heap has been shut down
    #[error("Heap is shut down")]
    ShutDown,
    /// The calling thread has no attachment entry in the root registry
    #[error("Thread is not attached to the heap")]
    ThreadNotAttached,
    /// The calling thread already holds an attachment entry
    #[error("Thread already attached: {0}")]
    ThreadAlreadyAttached(String),
    /// Allocation requested while the thread's enable counter is zero
    #[error("Allocation while the collector is disabled")]
    Disabled,
    /// A handle or root belongs to a different heap than the active scope
    #[error("Object belongs to a different heap")]
    ForeignHeap,
    /// A reference does not name a live object
    #[error("Invalid object reference")]
    InvalidReference,
}

impl GcError {
    /// True for the collector's own exhaustion condition, as opposed to a
    /// lifecycle fault.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, GcError::OutOfMemory)
    }
}

/// Result type for heap operations
pub type GcResult<T> = Result<T, GcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_readable_messages() {
        let cases = [
            (GcError::OutOfMemory, "Out of memory"),
            (GcError::AlreadyStarted, "Heap already started"),
            (GcError::ShutDown, "Heap is shut down"),
            (
                GcError::ThreadNotAttached,
                "Thread is not attached to the heap",
            ),
            (
                GcError::ThreadAlreadyAttached("main".into()),
                "Thread already attached: main",
            ),
            (
                GcError::Disabled,
                "Allocation while the collector is disabled",
            ),
            (GcError::ForeignHeap, "Object belongs to a different heap"),
            (GcError::InvalidReference, "Invalid object reference"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn only_exhaustion_counts_as_out_of_memory() {
        assert!(GcError::OutOfMemory.is_out_of_memory());
        assert!(!GcError::Disabled.is_out_of_memory());
        assert!(!GcError::ThreadNotAttached.is_out_of_memory());
    }

    #[test]
    fn gc_result_alias_behaves_like_result() {
        fn take_result(value: GcResult<usize>) -> usize {
            value.unwrap_or_default()
        }

        assert_eq!(take_result(Ok(42)), 42);
        assert_eq!(take_result(Err(GcError::OutOfMemory)), 0);
    }
}
