//! Fixed-capacity circular buffer with overwrite-oldest semantics.

/// A ring of at most `capacity` items.
///
/// Storage grows up to `capacity` on the first pass and is then reused.
/// After [`RingBuffer::reset`] the old slots are left in place and are only
/// logically invalid; readers never see more than [`RingBuffer::len`] items.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Next slot to overwrite
    write_index: usize,
    /// Number of valid items, saturating at `capacity`
    filled: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty ring. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            write_index: 0,
            filled: 0,
        }
    }

    /// Write an item at the current position, overwriting the oldest item
    /// once the ring is full.
    pub fn insert(&mut self, item: T) {
        if self.write_index < self.slots.len() {
            self.slots[self.write_index] = item;
        } else {
            self.slots.push(item);
        }

        self.write_index = (self.write_index + 1) % self.capacity;
        if self.filled < self.capacity {
            self.filled += 1;
        }
    }

    /// Forget all items without releasing storage.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot index of the oldest valid item.
    fn start(&self) -> usize {
        (self.write_index + self.capacity - self.filled) % self.capacity
    }

    /// Iterate over valid items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + Clone + '_ {
        let start = self.start();
        (0..self.filled).map(move |i| &self.slots[(start + i) % self.capacity])
    }

    pub fn oldest(&self) -> Option<&T> {
        self.iter().next()
    }

    pub fn newest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots.get(self.newest_index())
    }

    pub fn newest_mut(&mut self) -> Option<&mut T> {
        if self.is_empty() {
            return None;
        }
        let index = self.newest_index();
        self.slots.get_mut(index)
    }

    fn newest_index(&self) -> usize {
        (self.write_index + self.capacity - 1) % self.capacity
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy the valid items, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
