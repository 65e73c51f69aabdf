//! Object model for managed heap objects.
//!
//! Every allocation carries an [`ObjectHeader`] kept by the heap next to the
//! boxed body. Bodies implement [`ManagedObject`]; references between managed
//! objects are stored as [`Ref`] and reported to the collector through
//! [`Trace`].

use std::{fmt, marker::PhantomData, mem::size_of, ptr::NonNull, str::Utf8Error};

use bitflags::bitflags;
use parking_lot::RwLock;

use crate::error::{GcError, GcResult};
use crate::guards::EnableGuard;
use crate::handle::Local;

/// Largest logical object size the heap accepts. The top two bits are kept
/// free so the size can never overflow when the bookkeeping words are added.
pub const MAX_OBJECT_SIZE: usize = (1 << (usize::BITS - 2)) - 1;

/// Size the heap charges for an object of `logical_size` bytes: rounded up to
/// a word, plus three words of per-object bookkeeping.
///
/// # Examples
///
/// ```
/// use scriptgc::object::calc_physical_block_size;
///
/// let word = std::mem::size_of::<usize>();
/// assert_eq!(calc_physical_block_size(0), 3 * word);
/// assert_eq!(calc_physical_block_size(1), 4 * word);
/// assert_eq!(calc_physical_block_size(word), 4 * word);
/// ```
pub const fn calc_physical_block_size(logical_size: usize) -> usize {
    let word = size_of::<usize>();
    let mask = word - 1;
    (logical_size + word * 3 + mask) & !mask
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u8 {
        const MARKED = 0b0001;
    }
}

/// Type tag of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    String,
    Array,
    PrimitiveArray,
    ScriptSource,
    Custom,
}

/// Per-object metadata owned by the heap.
#[derive(Debug, Clone, Copy)]
pub struct ObjectHeader {
    pub kind: ObjectKind,
    pub flags: ObjectFlags,
    /// Physical size charged against the budget.
    pub size: usize,
}

impl ObjectHeader {
    pub const SIZE: usize = size_of::<ObjectHeader>();

    pub fn new(kind: ObjectKind, size: usize) -> Self {
        Self {
            kind,
            flags: ObjectFlags::empty(),
            size,
        }
    }

    pub fn is_marked(&self) -> bool {
        self.flags.contains(ObjectFlags::MARKED)
    }

    pub fn set_marked(&mut self, marked: bool) {
        self.flags.set(ObjectFlags::MARKED, marked);
    }
}

/// Identifier of one object: the owning heap, the slot index and the slot's
/// generation at allocation time.
///
/// A slot's generation advances every time its object is reclaimed, so an id
/// kept past its object's lifetime never names the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    heap: u64,
    index: usize,
    generation: u32,
}

impl ObjectId {
    pub(crate) const fn new(heap: u64, index: usize, generation: u32) -> Self {
        Self {
            heap,
            index,
            generation,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Id of the heap that allocated the object.
    pub fn heap_id(self) -> u64 {
        self.heap
    }
}

/// Trait implemented by managed types to report the objects they reference.
pub trait Trace {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId));
}

/// A value that lives in the managed heap.
///
/// Bodies must not touch the heap from `Drop`: they are dropped by the
/// collector while it holds the heap lock.
pub trait ManagedObject: Trace + Send + Sync + 'static {
    fn kind(&self) -> ObjectKind;

    /// Logical payload size in bytes, excluding the header.
    fn payload_size(&self) -> usize;
}

/// Untraced reference from one managed object to another.
///
/// A `Ref` keeps nothing alive by itself; it is followed by the collector
/// only when the object holding it is reachable. Turn it back into a rooted
/// handle with [`EnableGuard::root`].
pub struct Ref<T> {
    id: ObjectId,
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

// SAFETY: a `Ref` is an address plus a slot id. It is only dereferenced via a
// `Local`, which requires an attached, enabled thread and a rooted object.
unsafe impl<T: Send + Sync> Send for Ref<T> {}
unsafe impl<T: Send + Sync> Sync for Ref<T> {}

impl<T> Copy for Ref<T> {}
impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Ref<T> {}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.id.index).finish()
    }
}

impl<T> Ref<T> {
    pub(crate) fn new(id: ObjectId, ptr: NonNull<T>) -> Self {
        Self {
            id,
            ptr,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn ptr(&self) -> NonNull<T> {
        self.ptr
    }
}

impl<T> Trace for Ref<T> {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        visitor(self.id);
    }
}

impl<T> Trace for Option<Ref<T>> {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        if let Some(reference) = self {
            visitor(reference.id);
        }
    }
}

/// Immutable byte string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GcString {
    bytes: Box<[u8]>,
}

impl GcString {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq<str> for GcString {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for GcString {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for GcString {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Debug for GcString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Display for GcString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl Trace for GcString {
    fn trace(&self, _visitor: &mut dyn FnMut(ObjectId)) {}
}

impl ManagedObject for GcString {
    fn kind(&self) -> ObjectKind {
        ObjectKind::String
    }

    fn payload_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Fixed-length array of nullable references.
pub struct GcArray<T: ManagedObject> {
    slots: RwLock<Box<[Option<Ref<T>>]>>,
}

impl<T: ManagedObject> GcArray<T> {
    /// New array with every slot empty.
    pub fn new(length: usize) -> Self {
        Self {
            slots: RwLock::new(vec![None; length].into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw slot contents. Panics if `index` is out of bounds.
    pub fn get_ref(&self, index: usize) -> Option<Ref<T>> {
        self.slots.read()[index]
    }

    /// Root the element at `index` in `scope`. Panics if `index` is out of
    /// bounds.
    pub fn get<'s>(&self, scope: &'s EnableGuard<'_>, index: usize) -> GcResult<Option<Local<'s, T>>> {
        match self.get_ref(index) {
            Some(reference) => scope.root(reference).map(Some),
            None => Ok(None),
        }
    }

    fn store(&self, index: usize, value: Option<Ref<T>>) {
        self.slots.write()[index] = value;
    }
}

impl<T: ManagedObject> Local<'_, GcArray<T>> {
    /// Store `value` at `index`. Panics if `index` is out of bounds.
    ///
    /// Fails with [`GcError::ForeignHeap`] if `value` lives in another heap
    /// than the array, leaving the slot unchanged.
    pub fn set(&self, index: usize, value: Option<&Local<'_, T>>) -> GcResult<()> {
        let value = value.map(Local::to_ref);
        if let Some(reference) = value
            && reference.id().heap_id() != self.id().heap_id()
        {
            return Err(GcError::ForeignHeap);
        }
        self.store(index, value);
        Ok(())
    }
}

impl<T: ManagedObject> Trace for GcArray<T> {
    fn trace(&self, visitor: &mut dyn FnMut(ObjectId)) {
        for slot in self.slots.read().iter() {
            slot.trace(visitor);
        }
    }
}

impl<T: ManagedObject> ManagedObject for GcArray<T> {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Array
    }

    fn payload_size(&self) -> usize {
        self.len().saturating_mul(size_of::<Option<Ref<T>>>())
    }
}

impl<T: ManagedObject> fmt::Debug for GcArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots.read().iter()).finish()
    }
}

/// Fixed-length array of plain values. The collector never looks inside it.
pub struct GcPrimitiveArray<T> {
    values: RwLock<Box<[T]>>,
}

impl<T: Copy + Send + Sync + 'static> GcPrimitiveArray<T> {
    /// New array of `length` default values.
    pub fn new(length: usize) -> Self
    where
        T: Default,
    {
        Self::from(vec![T::default(); length])
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`. Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> T {
        self.values.read()[index]
    }

    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, value: T) {
        self.values.write()[index] = value;
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.values.read().to_vec()
    }
}

impl<T> From<Vec<T>> for GcPrimitiveArray<T> {
    fn from(values: Vec<T>) -> Self {
        Self {
            values: RwLock::new(values.into_boxed_slice()),
        }
    }
}

impl<T> Trace for GcPrimitiveArray<T> {
    fn trace(&self, _visitor: &mut dyn FnMut(ObjectId)) {}
}

impl<T: Copy + Send + Sync + 'static> ManagedObject for GcPrimitiveArray<T> {
    fn kind(&self) -> ObjectKind {
        ObjectKind::PrimitiveArray
    }

    fn payload_size(&self) -> usize {
        self.len().saturating_mul(size_of::<T>())
    }
}

impl<T: fmt::Debug> fmt::Debug for GcPrimitiveArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.read().iter()).finish()
    }
}
