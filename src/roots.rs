//! Root registry consulted by the collector.
//!
//! Roots come from two places: the handle stack of every attached thread
//! ([`StackRoots`]) and the process-visible [`GlobalRoots`].

use std::collections::HashMap;

use crate::object::ObjectId;
use crate::thread::ThreadRegistry;

/// Per-thread handle stack.
///
/// Entries are pushed as handles are created and popped as they drop. A
/// handle dropped out of order leaves a hole that is trimmed once every entry
/// above it is gone, so the stack depth always follows lexical nesting.
#[derive(Debug, Default)]
pub struct StackRoots {
    entries: Vec<Option<ObjectId>>,
    live: usize,
}

impl StackRoots {
    /// Push `id`, returning the entry's position.
    pub fn push(&mut self, id: ObjectId) -> usize {
        self.entries.push(Some(id));
        self.live += 1;
        self.entries.len() - 1
    }

    /// Release the entry at `position`.
    pub fn pop(&mut self, position: usize) {
        let Some(entry) = self.entries.get_mut(position) else {
            return;
        };
        if entry.take().is_some() {
            self.live -= 1;
        }
        while matches!(self.entries.last(), Some(None)) {
            self.entries.pop();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.live = 0;
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Stack height including holes left by out-of-order drops.
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.iter().flatten().copied()
    }
}

/// Key of a registered global root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootKey(u64);

/// Roots visible from every thread (module-level constants and the like).
#[derive(Debug, Default)]
pub struct GlobalRoots {
    handles: HashMap<RootKey, ObjectId>,
    next_key: u64,
}

impl GlobalRoots {
    pub fn register(&mut self, id: ObjectId) -> RootKey {
        let key = RootKey(self.next_key);
        self.next_key += 1;
        self.handles.insert(key, id);
        key
    }

    pub fn unregister(&mut self, key: RootKey) -> Option<ObjectId> {
        self.handles.remove(&key)
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.handles.values().copied()
    }
}

/// Threads plus global roots: everything a collection starts from.
#[derive(Debug, Default)]
pub struct RootRegistry {
    pub threads: ThreadRegistry,
    pub globals: GlobalRoots,
}

impl RootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit every root of every attached thread, then the global roots.
    pub fn for_each_root<F>(&self, mut f: F)
    where
        F: FnMut(ObjectId),
    {
        for thread in self.threads.iter() {
            thread.stack().iter().for_each(&mut f);
        }
        self.globals.iter().for_each(f);
    }

    /// Total number of live roots.
    pub fn root_count(&self) -> usize {
        self.threads.iter().map(|t| t.stack().len()).sum::<usize>() + self.globals.len()
    }
}
