//! Thread attachment entries and the registry that tracks them.
//!
//! A thread may touch managed objects only while it holds an entry here. Each
//! entry owns the thread's handle stack and its reentrant enable counter.
//!
//! # Examples
//!
//! ```
//! use scriptgc::thread::ThreadRegistry;
//!
//! let mut registry = ThreadRegistry::new();
//! let id = std::thread::current().id();
//! registry.register(id, "main").unwrap();
//!
//! assert!(registry.register(id, "again").is_err());
//! assert_eq!(registry.len(), 1);
//! assert_eq!(registry.get(id).unwrap().name(), "main");
//! ```

use std::thread::ThreadId;

use crate::error::{GcError, GcResult};
use crate::roots::StackRoots;

/// Attachment entry for one mutator thread.
#[derive(Debug)]
pub struct AttachedThread {
    id: ThreadId,
    name: String,
    enable_count: usize,
    stack: StackRoots,
}

impl AttachedThread {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enable_count: 0,
            stack: StackRoots::default(),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enable_count(&self) -> usize {
        self.enable_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_count > 0
    }

    /// Increment the enable counter, returning the new depth.
    pub fn enable(&mut self) -> usize {
        self.enable_count += 1;
        self.enable_count
    }

    /// Decrement the enable counter, returning the new depth.
    pub fn disable(&mut self) -> GcResult<usize> {
        if self.enable_count == 0 {
            return Err(GcError::Disabled);
        }
        self.enable_count -= 1;
        Ok(self.enable_count)
    }

    pub fn stack(&self) -> &StackRoots {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut StackRoots {
        &mut self.stack
    }
}

/// Registry of attached threads, keyed by [`ThreadId`].
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: Vec<AttachedThread>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ThreadId, name: impl Into<String>) -> GcResult<()> {
        let name = name.into();
        if self.threads.iter().any(|existing| existing.id == id) {
            return Err(GcError::ThreadAlreadyAttached(name));
        }
        self.threads.push(AttachedThread::new(id, name));
        Ok(())
    }

    /// Remove a thread, handing back its entry.
    pub fn unregister(&mut self, id: ThreadId) -> Option<AttachedThread> {
        let position = self.threads.iter().position(|thread| thread.id == id)?;
        Some(self.threads.swap_remove(position))
    }

    pub fn get(&self, id: ThreadId) -> Option<&AttachedThread> {
        self.threads.iter().find(|thread| thread.id == id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut AttachedThread> {
        self.threads.iter_mut().find(|thread| thread.id == id)
    }

    /// Entry for `id`, or [`GcError::ThreadNotAttached`].
    pub fn attached_mut(&mut self, id: ThreadId) -> GcResult<&mut AttachedThread> {
        self.get_mut(id).ok_or(GcError::ThreadNotAttached)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachedThread> + '_ {
        self.threads.iter()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn enable_counter_nests() {
        let mut entry = AttachedThread::new(thread::current().id(), "main");
        assert!(!entry.is_enabled());
        assert_eq!(entry.enable(), 1);
        assert_eq!(entry.enable(), 2);
        assert_eq!(entry.disable(), Ok(1));
        assert!(entry.is_enabled());
        assert_eq!(entry.disable(), Ok(0));
        assert_eq!(entry.disable(), Err(GcError::Disabled));
    }

    #[test]
    fn registers_and_enumerates_threads() {
        let mut registry = ThreadRegistry::new();
        let main_id = thread::current().id();
        let other_id = thread::spawn(|| thread::current().id()).join().unwrap();

        registry.register(main_id, "main").unwrap();
        registry.register(other_id, "worker").unwrap();

        let mut names: Vec<_> = registry.iter().map(|t| t.name().to_string()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["main", "worker"]);

        let removed = registry.unregister(other_id).unwrap();
        assert_eq!(removed.name(), "worker");
        assert!(registry.get(other_id).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_thread_is_not_attached() {
        let mut registry = ThreadRegistry::new();
        assert_eq!(
            registry.attached_mut(thread::current().id()).unwrap_err(),
            GcError::ThreadNotAttached
        );
        assert!(registry.unregister(thread::current().id()).is_none());
    }
}
