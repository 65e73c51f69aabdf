//! Lifecycle guards.
//!
//! Heap use is bracketed by three nested RAII guards:
//!
//! - [`StartupGuard`] claims a [`HeapSlot`] and owns the heap.
//! - [`ManageThreadGuard`] attaches the calling thread.
//! - [`EnableGuard`] raises the thread's enable counter and is the capability
//!   token for allocation, rooting and collection.
//!
//! Each guard borrows the one outside it, so the nesting is checked by the
//! compiler and the guards release in reverse order on every exit path.
//!
//! # Examples
//!
//! ```
//! use scriptgc::guards::{HeapSlot, StartupGuard};
//!
//! let slot = HeapSlot::new();
//! let startup = StartupGuard::new(&slot, 1 << 20)?;
//! let thread = startup.manage_thread("main")?;
//! let scope = thread.enable()?;
//!
//! let greeting = scope.alloc_string("hello")?;
//! assert_eq!(*greeting, "hello");
//! # Ok::<(), scriptgc::error::GcError>(())
//! ```

use std::{
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::error::{GcError, GcResult};
use crate::handle::{Local, Persistent, StringLocal};
use crate::heap::{CollectionSummary, Heap, HeapObserver};
use crate::object::{GcArray, GcPrimitiveArray, GcString, ManagedObject, Ref};

/// Marker keeping thread-bound guards on their creating thread.
type NotSend = PhantomData<*const ()>;

/// Exclusive claim on "the" heap of a host.
///
/// At most one [`StartupGuard`] may be live per slot. The process-wide slot is
/// [`HeapSlot::global`]; embedders and tests may create their own.
#[derive(Debug, Default)]
pub struct HeapSlot {
    active: AtomicBool,
}

impl HeapSlot {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    pub fn global() -> &'static HeapSlot {
        static GLOBAL: HeapSlot = HeapSlot::new();
        &GLOBAL
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn claim(&self) -> GcResult<()> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| GcError::AlreadyStarted)
    }

    fn release(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Owns the heap for as long as it lives.
///
/// Dropping the guard reclaims every remaining object and frees the slot.
#[derive(Debug)]
pub struct StartupGuard<'a> {
    slot: &'a HeapSlot,
    heap: Heap,
}

impl<'a> StartupGuard<'a> {
    pub fn new(slot: &'a HeapSlot, budget_bytes: usize) -> GcResult<Self> {
        slot.claim()?;
        Ok(Self {
            slot,
            heap: Heap::new(budget_bytes, None),
        })
    }

    /// Like [`StartupGuard::new`], reporting charges and lifecycle events to
    /// `observer`.
    pub fn with_observer(
        slot: &'a HeapSlot,
        budget_bytes: usize,
        observer: Arc<dyn HeapObserver>,
    ) -> GcResult<Self> {
        slot.claim()?;
        Ok(Self {
            slot,
            heap: Heap::new(budget_bytes, Some(observer)),
        })
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Attach the calling thread under `name`.
    pub fn manage_thread(&self, name: &str) -> GcResult<ManageThreadGuard<'_>> {
        self.heap.attach_current_thread(name)?;
        Ok(ManageThreadGuard {
            heap: &self.heap,
            name: name.to_string(),
            _not_send: PhantomData,
        })
    }
}

impl Drop for StartupGuard<'_> {
    fn drop(&mut self) {
        self.heap.shutdown();
        self.slot.release();
    }
}

/// Attachment of the calling thread to a heap.
#[derive(Debug)]
pub struct ManageThreadGuard<'h> {
    heap: &'h Heap,
    name: String,
    _not_send: NotSend,
}

impl ManageThreadGuard<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enter an enable scope. Scopes nest; each one raises the thread's
    /// enable counter until it drops.
    pub fn enable(&self) -> GcResult<EnableGuard<'_>> {
        self.heap.enable_current_thread()?;
        Ok(EnableGuard {
            heap: self.heap,
            _not_send: PhantomData,
        })
    }
}

impl Drop for ManageThreadGuard<'_> {
    fn drop(&mut self) {
        self.heap.detach_current_thread();
    }
}

/// Enable scope on an attached thread.
///
/// Every [`Local`] borrows the scope it was created in and cannot outlive it.
#[derive(Debug)]
pub struct EnableGuard<'t> {
    heap: &'t Heap,
    _not_send: NotSend,
}

impl<'t> EnableGuard<'t> {
    pub fn heap(&self) -> &Heap {
        self.heap
    }

    /// Move `value` into the heap, collecting first if the budget is
    /// exhausted.
    pub fn alloc<T: ManagedObject>(&self, value: T) -> GcResult<Local<'_, T>> {
        let (reference, position) = self.heap.allocate(value)?;
        Ok(Local::new(self.heap, reference, position))
    }

    pub fn alloc_string(&self, bytes: impl AsRef<[u8]>) -> GcResult<StringLocal<'_>> {
        self.alloc(GcString::new(bytes.as_ref()))
    }

    /// Allocate an array of `length` empty slots.
    pub fn alloc_array<T: ManagedObject>(&self, length: usize) -> GcResult<Local<'_, GcArray<T>>> {
        self.alloc(GcArray::new(length))
    }

    /// Allocate a value array of `length` defaults.
    pub fn alloc_primitive_array<T>(
        &self,
        length: usize,
    ) -> GcResult<Local<'_, GcPrimitiveArray<T>>>
    where
        T: Copy + Default + Send + Sync + 'static,
    {
        self.alloc(GcPrimitiveArray::new(length))
    }

    /// Root the object behind `reference` in this scope.
    pub fn root<T: ManagedObject>(&self, reference: Ref<T>) -> GcResult<Local<'_, T>> {
        let position = self.heap.push_root(reference)?;
        Ok(Local::new(self.heap, reference, position))
    }

    /// Register `local`'s object as a global root.
    pub fn persist<T: ManagedObject>(&self, local: &Local<'_, T>) -> GcResult<Persistent<T>> {
        Persistent::new(self.heap, local.to_ref())
    }

    pub fn collect(&self) -> GcResult<CollectionSummary> {
        self.heap.collect()
    }

    /// Park allocation on this thread until the returned guard drops.
    pub fn disable(&self) -> GcResult<DisableGuard<'_>> {
        self.heap.disable_current_thread()?;
        Ok(DisableGuard {
            heap: self.heap,
            _not_send: PhantomData,
        })
    }
}

impl Drop for EnableGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.heap.disable_current_thread() {
            tracing::error!(%err, "enable scope closed on a detached thread");
        }
    }
}

/// Window of non-managed work inside an enable scope.
#[derive(Debug)]
pub struct DisableGuard<'e> {
    heap: &'e Heap,
    _not_send: NotSend,
}

impl Drop for DisableGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.heap.enable_current_thread() {
            tracing::error!(%err, "failed to restore enable scope");
        }
    }
}
