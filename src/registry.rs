use hashlink::LinkedHashMap;

/// Token-keyed listener list that keeps insertion order.
///
/// Removing an entry never reorders the rest, and tokens are never reused.
pub struct Registry<T> {
    next_id: u64,
    entries: LinkedHashMap<u64, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: LinkedHashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn insert(&mut self, value: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, value);
        id
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Registry<T> {
    /// Clone the entries out so callers can invoke them without holding a lock.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }
}
