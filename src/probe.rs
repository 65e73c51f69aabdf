//! Memory budget feasibility probe.
//!
//! Runs once, before any heap state exists: the effective budget is requested
//! from the platform allocator as a single block and released immediately.
//! A refusal is reported as [`ProbeError::InsufficientMemory`], which the
//! script host turns into a fatal error.

use std::alloc::{self, Layout};

use thiserror::Error;

use crate::config::BudgetConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Not enough memory to reserve {bytes} bytes")]
    InsufficientMemory { bytes: usize },
}

/// Source of the raw block used by the probe.
pub trait ProbeAllocator {
    /// Acquire and immediately release `bytes` contiguous bytes. Returns
    /// `false` if the platform refused the request.
    fn try_reserve(&self, bytes: usize) -> bool;
}

/// Probe backed by the global Rust allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbeAllocator;

impl ProbeAllocator for SystemProbeAllocator {
    fn try_reserve(&self, bytes: usize) -> bool {
        if bytes == 0 {
            return true;
        }
        let Ok(layout) = Layout::from_size_align(bytes, 1) else {
            return false;
        };
        // SAFETY: layout has a non-zero size; the block is released with the
        // same layout right away and never read.
        unsafe {
            let block = alloc::alloc(layout);
            if block.is_null() {
                return false;
            }
            alloc::dealloc(block, layout);
        }
        true
    }
}

/// Resolve the requested limit through `config` and check the platform can
/// hand out that many bytes. Returns the budget in bytes.
///
/// # Examples
///
/// ```
/// use scriptgc::config::BudgetConfig;
/// use scriptgc::probe::{probe_memory_budget, SystemProbeAllocator};
///
/// let budget = probe_memory_budget(0, &BudgetConfig::default(), &SystemProbeAllocator).unwrap();
/// assert_eq!(budget, 8 * 1024 * 1024);
/// ```
pub fn probe_memory_budget(
    requested_mb: usize,
    config: &BudgetConfig,
    allocator: &dyn ProbeAllocator,
) -> Result<usize, ProbeError> {
    let bytes = config.effective_bytes(requested_mb);
    if allocator.try_reserve(bytes) {
        tracing::debug!(requested_mb, bytes, "memory budget probe succeeded");
        Ok(bytes)
    } else {
        tracing::warn!(requested_mb, bytes, "memory budget probe failed");
        Err(ProbeError::InsufficientMemory { bytes })
    }
}
