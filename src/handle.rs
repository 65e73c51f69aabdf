//! Rooted handles.
//!
//! A [`Local`] is a root on the calling thread's handle stack for as long as
//! it lives. A [`Persistent`] is a global root that may travel between
//! threads; it must be re-rooted as a `Local` before its object is read.

use std::{fmt, marker::PhantomData, ops::Deref};

use crate::error::{GcError, GcResult};
use crate::guards::EnableGuard;
use crate::heap::Heap;
use crate::object::{GcString, ManagedObject, ObjectId, Ref};
use crate::roots::RootKey;

/// Scoped, typed root.
///
/// Valid within the borrow `'s` of the [`EnableGuard`] that created it and
/// only on the creating thread.
pub struct Local<'s, T> {
    heap: &'s Heap,
    reference: Ref<T>,
    position: usize,
    _not_send: PhantomData<*const ()>,
}

/// Handle to a managed byte string.
pub type StringLocal<'s> = Local<'s, GcString>;

impl<'s, T> Local<'s, T> {
    pub(crate) fn new(heap: &'s Heap, reference: Ref<T>, position: usize) -> Self {
        Self {
            heap,
            reference,
            position,
            _not_send: PhantomData,
        }
    }

    /// Untraced reference for storing inside another managed object.
    pub fn to_ref(&self) -> Ref<T> {
        self.reference
    }

    pub fn id(&self) -> ObjectId {
        self.reference.id()
    }

    /// True if both handles name the same object.
    pub fn ptr_eq(&self, other: &Local<'_, T>) -> bool {
        self.reference == other.reference
    }

    /// Root the same object again.
    ///
    /// The object is already rooted by `self`, so only the thread lookup can
    /// fail, and a handle never outlives its thread's attachment.
    pub fn try_clone(&self) -> GcResult<Self> {
        let position = self.heap.duplicate_root(self.reference.id())?;
        Ok(Local::new(self.heap, self.reference, position))
    }
}

impl<T: ManagedObject> Deref for Local<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the object is on this thread's handle stack until `self`
        // drops, so no sweep can free it. Its body is a separate allocation
        // that stays put while the slot table grows.
        unsafe { self.reference.ptr().as_ref() }
    }
}

/// Infallible: see [`Local::try_clone`].
impl<T> Clone for Local<'_, T> {
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(local) => local,
            Err(err) => unreachable!("handle outlived its thread attachment: {err}"),
        }
    }
}

impl<T> Drop for Local<'_, T> {
    fn drop(&mut self) {
        self.heap.pop_root(self.position);
    }
}

impl<T: ManagedObject + fmt::Debug> fmt::Debug for Local<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Local")
            .field("id", &self.reference.id().index())
            .field("value", &**self)
            .finish()
    }
}

/// Global root, released on drop.
pub struct Persistent<T> {
    heap: Heap,
    reference: Ref<T>,
    key: RootKey,
}

impl<T> Persistent<T> {
    pub(crate) fn new(heap: &Heap, reference: Ref<T>) -> GcResult<Self>
    where
        T: 'static,
    {
        let key = heap.register_global(reference)?;
        Ok(Self {
            heap: heap.clone(),
            reference,
            key,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.reference.id()
    }

    /// Root the object in `scope`, which must belong to the same heap.
    pub fn local<'s>(&self, scope: &'s EnableGuard<'_>) -> GcResult<Local<'s, T>>
    where
        T: ManagedObject,
    {
        if !scope.heap().same_heap(&self.heap) {
            return Err(GcError::ForeignHeap);
        }
        scope.root(self.reference)
    }
}

impl<T> Drop for Persistent<T> {
    fn drop(&mut self) {
        self.heap.unregister_global(self.key);
    }
}

impl<T> fmt::Debug for Persistent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistent")
            .field("id", &self.reference.id().index())
            .field("heap", &self.heap)
            .finish()
    }
}
