//! Ring Buffer Implementation

use crate::RingBufferError;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default buffer capacity (1024 messages)
pub const DEFAULT_CAPACITY: usize = 1024;

/// Slot storage and indices, only touched under the lock
#[derive(Debug)]
struct Slots<T> {
    /// Pre-allocated storage
    storage: Box<[Option<T>]>,
    /// Index of the oldest entry
    head: usize,
    /// Index of the next insert
    tail: usize,
    /// Number of live entries
    count: usize,
    /// Total entries ever written (for statistics)
    total_written: u64,
}

/// Fixed-capacity circular store that overwrites its oldest entry when full
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    slots: Mutex<Slots<T>>,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }

        let storage: Vec<Option<T>> = (0..capacity).map(|_| None).collect();
        Ok(Self {
            capacity,
            slots: Mutex::new(Slots {
                storage: storage.into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
                total_written: 0,
            }),
        })
    }

    /// Create a buffer with default capacity (1024 entries)
    pub fn with_default_capacity() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            slots: Mutex::new(Slots {
                storage: (0..DEFAULT_CAPACITY).map(|_| None).collect(),
                head: 0,
                tail: 0,
                count: 0,
                total_written: 0,
            }),
        }
    }

    /// Push an entry (evicts the oldest if full)
    pub fn push(&self, item: T) {
        let mut slots = self.lock();

        if slots.count == self.capacity {
            slots.head = (slots.head + 1) % self.capacity;
            slots.count -= 1;
        }

        let tail = slots.tail;
        slots.storage[tail] = Some(item);
        slots.tail = (tail + 1) % self.capacity;
        slots.count += 1;
        slots.total_written += 1;
    }

    /// Copy every held entry, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        let slots = self.lock();
        let count = slots.count;
        let mut items = Vec::with_capacity(count);
        if count == 0 {
            return items;
        }

        // Contiguous run from head, then the wrapped run from index 0
        let first_len = count.min(self.capacity - slots.head);
        let first = &slots.storage[slots.head..slots.head + first_len];
        let second = &slots.storage[..count - first_len];
        items.extend(first.iter().chain(second).flatten().cloned());
        items
    }

    /// Read the last N entries (most recent first)
    pub fn read_last(&self, count: usize) -> Vec<T> {
        let slots = self.lock();
        let count = count.min(slots.count);

        (1..=count)
            .filter_map(|i| {
                let idx = (slots.tail + self.capacity - i) % self.capacity;
                slots.storage[idx].clone()
            })
            .collect()
    }

    /// Drop every entry and reset the indices
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.storage.iter_mut().for_each(|slot| *slot = None);
        slots.head = 0;
        slots.tail = 0;
        slots.count = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> RingBuffer<T> {
    /// Get the number of entries currently in the buffer
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get fill ratio (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Get total entries written (for statistics)
    pub fn total_written(&self) -> u64 {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total_written
    }
}
