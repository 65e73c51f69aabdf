//! Budgeted mark-sweep heap.
//!
//! The heap owns a fixed byte budget. Allocation charges the physical size of
//! each object against it; when a request does not fit, a stop-the-world
//! collection runs on the requesting thread:
//!
//! 1. Mark every object reachable from the handle stacks of all attached
//!    threads and from the global roots.
//! 2. Sweep the unmarked objects and recompute the allocated byte count.
//! 3. Retry the request, failing with [`GcError::OutOfMemory`] if it still
//!    does not fit.
//!
//! All heap state sits behind one lock; allocation, root registration and
//! collection are sequential per thread.

use std::{
    any::TypeId,
    fmt,
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::Instant,
};

use parking_lot::Mutex;

use crate::error::{GcError, GcResult};
use crate::object::{
    MAX_OBJECT_SIZE, ManagedObject, ObjectHeader, ObjectId, Ref, calc_physical_block_size,
};
use crate::roots::{RootKey, RootRegistry};
use crate::thread::AttachedThread;

/// Heap lifecycle transitions reported to a [`HeapObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started { budget_bytes: usize },
    ThreadAttached { name: String },
    Enabled { depth: usize },
    Disabled { depth: usize },
    ThreadDetached { name: String },
    ShutDown,
}

/// Hooks notified of every budget charge and lifecycle transition.
///
/// Callbacks run while the heap lock is held and must not call back into the
/// heap.
pub trait HeapObserver: Send + Sync {
    fn memory_allocated(&self, _id: ObjectId, _bytes: usize) {}

    fn memory_released(&self, _id: ObjectId, _bytes: usize) {}

    fn lifecycle(&self, _event: LifecycleEvent) {}
}

/// Point-in-time heap counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub budget_bytes: usize,
    pub allocated_bytes: usize,
    pub object_count: usize,
    pub collections: u64,
    /// Bytes reclaimed over the heap's lifetime.
    pub reclaimed_bytes: usize,
    pub attached_threads: usize,
    pub root_count: usize,
}

/// Outcome of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub reclaimed_objects: usize,
    pub reclaimed_bytes: usize,
    pub live_objects: usize,
    pub live_bytes: usize,
}

/// A live object. The body is owned through a raw pointer so that handles
/// may keep their own pointers to it while the slot table grows.
struct ObjectSlot {
    header: ObjectHeader,
    type_id: TypeId,
    body: NonNull<dyn ManagedObject>,
}

// SAFETY: the slot uniquely owns its body, and every `ManagedObject` is
// `Send + Sync`.
unsafe impl Send for ObjectSlot {}

impl ObjectSlot {
    /// Box `value`, returning the slot and a typed pointer to the same body.
    fn new<T: ManagedObject>(value: T, header: ObjectHeader) -> (Self, NonNull<T>) {
        let raw = Box::into_raw(Box::new(value));
        // SAFETY: `Box::into_raw` never returns null.
        let ptr = unsafe { NonNull::new_unchecked(raw) };
        let slot = Self {
            header,
            type_id: TypeId::of::<T>(),
            body: ptr,
        };
        (slot, ptr)
    }

    fn body(&self) -> &dyn ManagedObject {
        // SAFETY: the body stays allocated until the slot drops.
        unsafe { self.body.as_ref() }
    }
}

impl Drop for ObjectSlot {
    fn drop(&mut self) {
        // SAFETY: `body` came from `Box::into_raw` in `ObjectSlot::new` and
        // is released only here.
        drop(unsafe { Box::from_raw(self.body.as_ptr()) });
    }
}

/// Slot table entry. The generation outlives the object so that stale ids
/// are recognised after the slot is reused.
#[derive(Default)]
struct SlotEntry {
    generation: u32,
    object: Option<ObjectSlot>,
}

impl SlotEntry {
    fn free(&mut self) -> Option<ObjectSlot> {
        let object = self.object.take();
        if object.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
        object
    }
}

#[derive(Default)]
struct HeapState {
    heap_id: u64,
    objects: Vec<SlotEntry>,
    free_slots: Vec<usize>,
    allocated: usize,
    object_count: usize,
    collections: u64,
    reclaimed_bytes: usize,
    roots: RootRegistry,
    shut_down: bool,
}

impl HeapState {
    fn new(heap_id: u64) -> Self {
        Self {
            heap_id,
            ..Self::default()
        }
    }

    fn check_running(&self) -> GcResult<()> {
        if self.shut_down {
            Err(GcError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn current_thread(&mut self) -> GcResult<&mut AttachedThread> {
        self.roots.threads.attached_mut(thread::current().id())
    }

    fn fits(&self, bytes: usize, budget: usize) -> bool {
        self.allocated
            .checked_add(bytes)
            .is_some_and(|total| total <= budget)
    }

    fn live(&self, id: ObjectId) -> Option<&ObjectSlot> {
        if id.heap_id() != self.heap_id {
            return None;
        }
        let entry = self.objects.get(id.index())?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.object.as_ref()
    }

    fn live_mut(&mut self, id: ObjectId) -> Option<&mut ObjectSlot> {
        if id.heap_id() != self.heap_id {
            return None;
        }
        let entry = self.objects.get_mut(id.index())?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.object.as_mut()
    }

    /// `id` must name a live object of this heap.
    fn check_id(&self, id: ObjectId) -> GcResult<&ObjectSlot> {
        if id.heap_id() != self.heap_id {
            return Err(GcError::ForeignHeap);
        }
        self.live(id).ok_or(GcError::InvalidReference)
    }

    /// `reference` must name a live `T` of this heap at the address it
    /// carries.
    fn check_ref<T: 'static>(&self, reference: &Ref<T>) -> GcResult<()> {
        let slot = self.check_id(reference.id())?;
        let same_type = slot.type_id == TypeId::of::<T>();
        let body = slot.body.as_ptr().cast_const();
        if same_type && std::ptr::addr_eq(body, reference.ptr().as_ptr().cast_const()) {
            Ok(())
        } else {
            Err(GcError::InvalidReference)
        }
    }

    /// Every reference held by `value` must name a live object of this heap.
    fn check_children(&self, value: &dyn ManagedObject) -> GcResult<()> {
        let mut result = Ok(());
        value.trace(&mut |child| {
            if result.is_ok() {
                result = self.check_id(child).map(|_| ());
            }
        });
        result
    }

    fn insert(&mut self, slot: ObjectSlot) -> ObjectId {
        self.object_count += 1;
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.objects.push(SlotEntry::default());
                self.objects.len() - 1
            }
        };
        let entry = &mut self.objects[index];
        entry.object = Some(slot);
        ObjectId::new(self.heap_id, index, entry.generation)
    }

    fn collect(&mut self, observer: Option<&dyn HeapObserver>) -> CollectionSummary {
        let started = Instant::now();

        let mut worklist = Vec::with_capacity(self.roots.root_count());
        self.roots.for_each_root(|id| worklist.push(id));

        while let Some(id) = worklist.pop() {
            // References into other heaps are never followed.
            let Some(slot) = self.live_mut(id) else {
                continue;
            };
            if slot.header.is_marked() {
                continue;
            }
            slot.header.set_marked(true);
            slot.body().trace(&mut |child| worklist.push(child));
        }

        let mut summary = CollectionSummary::default();
        for (index, entry) in self.objects.iter_mut().enumerate() {
            let generation = entry.generation;
            let Some(slot) = entry.object.as_mut() else {
                continue;
            };
            if slot.header.is_marked() {
                slot.header.set_marked(false);
                summary.live_objects += 1;
                summary.live_bytes += slot.header.size;
                continue;
            }
            if let Some(dead) = entry.free() {
                summary.reclaimed_objects += 1;
                summary.reclaimed_bytes += dead.header.size;
                if let Some(observer) = observer {
                    let id = ObjectId::new(self.heap_id, index, generation);
                    observer.memory_released(id, dead.header.size);
                }
                self.free_slots.push(index);
            }
        }

        debug_assert_eq!(self.allocated - summary.reclaimed_bytes, summary.live_bytes);
        self.allocated = summary.live_bytes;
        self.object_count = summary.live_objects;
        self.collections += 1;
        self.reclaimed_bytes += summary.reclaimed_bytes;

        tracing::debug!(
            collected = summary.reclaimed_objects,
            bytes = summary.reclaimed_bytes,
            live = summary.live_objects,
            elapsed_us = started.elapsed().as_micros() as u64,
            "GC: collection finished"
        );

        summary
    }

    /// Drop every object regardless of reachability.
    fn release_all(&mut self, observer: Option<&dyn HeapObserver>) -> usize {
        let mut released = 0;
        for (index, entry) in self.objects.iter_mut().enumerate() {
            let generation = entry.generation;
            if let Some(slot) = entry.free() {
                if let Some(observer) = observer {
                    let id = ObjectId::new(self.heap_id, index, generation);
                    observer.memory_released(id, slot.header.size);
                }
                released += 1;
            }
        }
        self.free_slots.clear();
        self.allocated = 0;
        self.object_count = 0;
        released
    }
}

struct HeapInner {
    id: u64,
    budget: usize,
    state: Mutex<HeapState>,
    observer: Option<Arc<dyn HeapObserver>>,
}

/// Shared handle to one heap instance.
///
/// Created by [`StartupGuard`](crate::guards::StartupGuard); all mutation goes
/// through the guards and handles borrowed from it.
#[derive(Clone)]
pub struct Heap {
    inner: Arc<HeapInner>,
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("id", &self.inner.id)
            .field("budget", &self.inner.budget)
            .finish()
    }
}

impl Heap {
    pub(crate) fn new(budget: usize, observer: Option<Arc<dyn HeapObserver>>) -> Self {
        static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

        let id = NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed);
        let heap = Self {
            inner: Arc::new(HeapInner {
                id,
                budget,
                state: Mutex::new(HeapState::new(id)),
                observer,
            }),
        };
        tracing::debug!(heap = heap.inner.id, budget, "heap started");
        heap.notify(LifecycleEvent::Started {
            budget_bytes: budget,
        });
        heap
    }

    fn observer(&self) -> Option<&dyn HeapObserver> {
        self.inner.observer.as_deref()
    }

    fn notify(&self, event: LifecycleEvent) {
        if let Some(observer) = self.observer() {
            observer.lifecycle(event);
        }
    }

    /// Process-unique id, also carried by every [`ObjectId`] of this heap.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn budget_bytes(&self) -> usize {
        self.inner.budget
    }

    pub fn same_heap(&self, other: &Heap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().shut_down
    }

    pub fn stats(&self) -> HeapStats {
        let state = self.inner.state.lock();
        HeapStats {
            budget_bytes: self.inner.budget,
            allocated_bytes: state.allocated,
            object_count: state.object_count,
            collections: state.collections,
            reclaimed_bytes: state.reclaimed_bytes,
            attached_threads: state.roots.threads.len(),
            root_count: state.roots.root_count(),
        }
    }

    /// Enable depth of the calling thread, or `None` if it is not attached.
    pub fn enable_depth(&self) -> Option<usize> {
        let state = self.inner.state.lock();
        state
            .roots
            .threads
            .get(thread::current().id())
            .map(AttachedThread::enable_count)
    }

    pub(crate) fn attach_current_thread(&self, name: &str) -> GcResult<()> {
        let mut state = self.inner.state.lock();
        state.check_running()?;
        state.roots.threads.register(thread::current().id(), name)?;
        tracing::debug!(heap = self.inner.id, thread = name, "thread attached");
        self.notify(LifecycleEvent::ThreadAttached {
            name: name.to_string(),
        });
        Ok(())
    }

    pub(crate) fn detach_current_thread(&self) {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.roots.threads.unregister(thread::current().id()) {
            if !entry.stack().is_empty() {
                tracing::warn!(
                    thread = entry.name(),
                    handles = entry.stack().len(),
                    "thread detached with live handles"
                );
            }
            tracing::debug!(heap = self.inner.id, thread = entry.name(), "thread detached");
            self.notify(LifecycleEvent::ThreadDetached {
                name: entry.name().to_string(),
            });
        }
    }

    pub(crate) fn enable_current_thread(&self) -> GcResult<usize> {
        let mut state = self.inner.state.lock();
        state.check_running()?;
        let depth = state.current_thread()?.enable();
        self.notify(LifecycleEvent::Enabled { depth });
        Ok(depth)
    }

    pub(crate) fn disable_current_thread(&self) -> GcResult<usize> {
        let mut state = self.inner.state.lock();
        let depth = state.current_thread()?.disable()?;
        self.notify(LifecycleEvent::Disabled { depth });
        Ok(depth)
    }

    /// Move `value` into the heap and root it on the calling thread's handle
    /// stack. Returns the reference and its stack position.
    ///
    /// Every reference `value` holds must name a live object of this heap.
    pub(crate) fn allocate<T: ManagedObject>(&self, value: T) -> GcResult<(Ref<T>, usize)> {
        let logical = value
            .payload_size()
            .checked_add(ObjectHeader::SIZE)
            .filter(|size| *size <= MAX_OBJECT_SIZE)
            .ok_or(GcError::OutOfMemory)?;
        let physical = calc_physical_block_size(logical);
        let kind = value.kind();
        let budget = self.inner.budget;

        let mut state = self.inner.state.lock();
        state.check_running()?;
        if !state.current_thread()?.is_enabled() {
            return Err(GcError::Disabled);
        }

        if !state.fits(physical, budget) {
            state.collect(self.observer());
            if !state.fits(physical, budget) {
                tracing::debug!(
                    requested = physical,
                    allocated = state.allocated,
                    budget,
                    "allocation failed after collection"
                );
                return Err(GcError::OutOfMemory);
            }
        }

        // Checked after any collection so a child swept meanwhile is caught.
        state.check_children(&value)?;

        let (slot, ptr) = ObjectSlot::new(value, ObjectHeader::new(kind, physical));
        let id = state.insert(slot);
        state.allocated += physical;
        if let Some(observer) = self.observer() {
            observer.memory_allocated(id, physical);
        }

        let position = state.current_thread()?.stack_mut().push(id);
        Ok((Ref::new(id, ptr), position))
    }

    /// Root an existing object on the calling thread's handle stack.
    pub(crate) fn push_root<T: 'static>(&self, reference: Ref<T>) -> GcResult<usize> {
        let mut state = self.inner.state.lock();
        state.check_running()?;
        state.check_ref(&reference)?;
        Ok(state.current_thread()?.stack_mut().push(reference.id()))
    }

    /// Root `id` again on the calling thread. The caller already holds a
    /// root for it, so the object is known to be live.
    pub(crate) fn duplicate_root(&self, id: ObjectId) -> GcResult<usize> {
        let mut state = self.inner.state.lock();
        Ok(state.current_thread()?.stack_mut().push(id))
    }

    pub(crate) fn pop_root(&self, position: usize) {
        let mut state = self.inner.state.lock();
        if let Ok(thread) = state.current_thread() {
            thread.stack_mut().pop(position);
        }
    }

    pub(crate) fn register_global<T: 'static>(&self, reference: Ref<T>) -> GcResult<RootKey> {
        let mut state = self.inner.state.lock();
        state.check_running()?;
        state.check_ref(&reference)?;
        Ok(state.roots.globals.register(reference.id()))
    }

    pub(crate) fn unregister_global(&self, key: RootKey) {
        self.inner.state.lock().roots.globals.unregister(key);
    }

    /// Collect now, on behalf of the calling thread.
    pub(crate) fn collect(&self) -> GcResult<CollectionSummary> {
        let mut state = self.inner.state.lock();
        state.check_running()?;
        if !state.current_thread()?.is_enabled() {
            return Err(GcError::Disabled);
        }
        Ok(state.collect(self.observer()))
    }

    /// Reclaim every remaining object and refuse further use.
    pub(crate) fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if state.shut_down {
            return;
        }
        if !state.roots.threads.is_empty() {
            tracing::warn!(
                threads = state.roots.threads.len(),
                "heap shut down with attached threads"
            );
        }

        state.roots.globals.clear();
        let released = state.release_all(self.observer());
        state.shut_down = true;
        tracing::debug!(
            heap = self.inner.id,
            released,
            collections = state.collections,
            reclaimed = state.reclaimed_bytes,
            "heap shut down"
        );
        self.notify(LifecycleEvent::ShutDown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guards::{HeapSlot, StartupGuard};
    use crate::object::{GcArray, GcString};

    fn string_cost(len: usize) -> usize {
        calc_physical_block_size(ObjectHeader::SIZE + len)
    }

    #[test]
    fn allocation_charges_physical_size() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let _s = scope.alloc_string("hello").unwrap();
        let stats = startup.heap().stats();
        assert_eq!(stats.allocated_bytes, string_cost(5));
        assert_eq!(stats.object_count, 1);
        assert_eq!(stats.root_count, 1);
    }

    #[test]
    fn collection_reclaims_unrooted_objects() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let kept = scope.alloc_string("kept").unwrap();
        {
            let _garbage = scope.alloc_string("garbage").unwrap();
        }

        let summary = scope.collect().unwrap();
        assert_eq!(summary.reclaimed_objects, 1);
        assert_eq!(summary.reclaimed_bytes, string_cost(7));
        assert_eq!(summary.live_objects, 1);
        assert_eq!(startup.heap().stats().allocated_bytes, string_cost(4));
        assert_eq!(*kept, "kept");
    }

    #[test]
    fn collection_traces_through_arrays() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let array = scope.alloc(GcArray::<GcString>::new(2)).unwrap();
        {
            let element = scope.alloc_string("element").unwrap();
            array.set(1, Some(&element)).unwrap();
        }

        let summary = scope.collect().unwrap();
        assert_eq!(summary.reclaimed_objects, 0);
        assert_eq!(summary.live_objects, 2);

        let element = array.get(&scope, 1).unwrap().unwrap();
        assert_eq!(*element, "element");
    }

    #[test]
    fn exhausted_budget_triggers_collection() {
        let budget = string_cost(64) * 2;
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, budget).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        for _ in 0..10 {
            let _temp = scope.alloc_string(vec![b'x'; 64]).unwrap();
        }

        let stats = startup.heap().stats();
        assert!(stats.collections > 0);
        assert!(stats.allocated_bytes <= budget);
    }

    #[test]
    fn oversized_request_fails_without_charge() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 256).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let _small = scope.alloc_string("a").unwrap();
        let before = startup.heap().stats().allocated_bytes;

        let err = scope.alloc_string(vec![0u8; 1024]).unwrap_err();
        assert_eq!(err, GcError::OutOfMemory);
        assert_eq!(startup.heap().stats().allocated_bytes, before);
        assert_eq!(startup.heap().stats().collections, 1);
    }

    #[test]
    fn invalid_reference_is_rejected() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();
        let string = scope.alloc_string("x").unwrap();
        let heap_id = startup.heap().id();
        let forged = Ref::<GcString>::new(ObjectId::new(heap_id, 42, 0), string.to_ref().ptr());

        assert_eq!(
            startup.heap().push_root(forged),
            Err(GcError::InvalidReference)
        );

        let other_heap = Ref::<GcString>::new(
            ObjectId::new(heap_id + 1_000_000, string.id().index(), 0),
            string.to_ref().ptr(),
        );
        assert_eq!(
            startup.heap().push_root(other_heap),
            Err(GcError::ForeignHeap)
        );
    }

    /// Same footprint as `GcString`, so it can land in a freed string's slot.
    struct Impostor {
        bytes: &'static [u8],
    }

    impl crate::object::Trace for Impostor {
        fn trace(&self, _visitor: &mut dyn FnMut(ObjectId)) {}
    }

    impl ManagedObject for Impostor {
        fn kind(&self) -> crate::object::ObjectKind {
            crate::object::ObjectKind::Custom
        }

        fn payload_size(&self) -> usize {
            self.bytes.len()
        }
    }

    #[test]
    fn stale_reference_to_reused_slot_is_rejected() {
        assert_eq!(
            std::mem::size_of::<Impostor>(),
            std::mem::size_of::<GcString>()
        );

        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let stale = scope.alloc_string("old").unwrap().to_ref();
        scope.collect().unwrap();

        let impostor = scope
            .alloc(Impostor {
                bytes: b"SECRET-BYTES",
            })
            .unwrap();
        assert_eq!(impostor.id().index(), stale.id().index());
        assert_ne!(impostor.id().generation(), stale.id().generation());
        assert_eq!(scope.root(stale).unwrap_err(), GcError::InvalidReference);
        assert_eq!(impostor.bytes, b"SECRET-BYTES");

        drop(impostor);
        scope.collect().unwrap();
        let replacement = scope.alloc_string("new").unwrap();
        assert_eq!(replacement.id().index(), stale.id().index());
        assert_eq!(scope.root(stale).unwrap_err(), GcError::InvalidReference);
        assert_eq!(*replacement, "new");
    }

    #[test]
    fn handles_stay_valid_while_the_slot_table_grows() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let thread = startup.manage_thread("main").unwrap();
        let scope = thread.enable().unwrap();

        let first = scope.alloc_string("first").unwrap();
        let others: Vec<_> = (0..256)
            .map(|i| scope.alloc_string(i.to_string()).unwrap())
            .collect();
        assert_eq!(*first, "first");

        drop(others);
        scope.collect().unwrap();
        assert_eq!(*first, "first");
    }

    #[test]
    fn allocation_rejects_children_from_another_heap() {
        let slot_a = HeapSlot::new();
        let slot_b = HeapSlot::new();
        let heap_a = StartupGuard::new(&slot_a, 1 << 16).unwrap();
        let heap_b = StartupGuard::new(&slot_b, 1 << 16).unwrap();
        let thread_a = heap_a.manage_thread("a").unwrap();
        let thread_b = heap_b.manage_thread("b").unwrap();
        let scope_a = thread_a.enable().unwrap();
        let scope_b = thread_b.enable().unwrap();

        let name = scope_b.alloc_string("name").unwrap();
        let code = scope_b.alloc_string("code").unwrap();
        let source = crate::script::ScriptSource::new(&name, &code).unwrap();

        assert_eq!(scope_a.alloc(source).unwrap_err(), GcError::ForeignHeap);
        assert_eq!(heap_a.heap().stats().object_count, 0);
        assert!(scope_b.alloc(source).is_ok());
    }

    #[test]
    fn shutdown_releases_everything() {
        let slot = HeapSlot::new();
        let startup = StartupGuard::new(&slot, 1 << 20).unwrap();
        let heap = startup.heap().clone();
        {
            let thread = startup.manage_thread("main").unwrap();
            let scope = thread.enable().unwrap();
            let _a = scope.alloc_string("a").unwrap();
        }
        drop(startup);

        assert!(heap.is_shut_down());
        assert_eq!(heap.stats().allocated_bytes, 0);
        assert_eq!(heap.stats().object_count, 0);
    }
}
