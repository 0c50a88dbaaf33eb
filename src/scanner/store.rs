// Bounded, insertion-ordered result collection shared by probe tasks
use std::sync::{Mutex, MutexGuard};

/// Append-only collection that stops accepting entries once `bound` is hit.
///
/// All mutation goes through one lock. Readers are expected to call
/// [`ResultStore::snapshot`] or [`ResultStore::into_inner`] only after every
/// producer has been joined.
#[derive(Debug)]
pub struct ResultStore<T> {
    entries: Mutex<Vec<T>>,
    bound: usize,
}

impl<T> ResultStore<T> {
    pub fn new(bound: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::with_capacity(bound.min(1024))),
            bound,
        }
    }

    /// Check the length and append in one critical section.
    /// Returns the 0-based position of the new entry, or `None` when full.
    pub fn try_insert(&self, item: T) -> Option<usize> {
        self.insert_with(item, |_, _| {})
    }

    /// Like [`ResultStore::try_insert`], but runs `on_insert` with the new
    /// position while the lock is still held, so callbacks fire in
    /// position order.
    pub fn insert_with<F>(&self, item: T, on_insert: F) -> Option<usize>
    where
        F: FnOnce(usize, &T),
    {
        let mut entries = self.lock();
        if entries.len() >= self.bound {
            return None;
        }
        entries.push(item);
        let position = entries.len() - 1;
        on_insert(position, &entries[position]);
        Some(position)
    }

    pub fn insert_if_under_bound(&self, item: T) -> bool {
        self.try_insert(item).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.bound
    }

    pub fn into_inner(self) -> Vec<T> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Entries are only ever appended whole, so a poisoned guard still
    // holds a consistent vector.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> ResultStore<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().clone()
    }
}
