//! Object pool for transaction wrappers.
//!
//! Request and response wrappers are created and consumed at bus frequency. Instead of
//! boxing each one, they live in a pre-sized arena and are addressed by [`Handle`]s:
//! 1. **Allocation:** `insert` reuses the most recently freed slot in O(1).
//! 2. **Ownership:** a `Handle` is neither `Clone` nor `Copy`, so a wrapper can only sit in
//!    one queue at a time; moving the handle moves ownership.
//! 3. **Recycling:** `release` consumes the handle and put the slot back on the free list.
//! 4. **Profiling:** the pool remembers its high-water mark for buffer profiling.

use std::fmt;
use std::marker::PhantomData;

/// Unique owner of one occupied pool slot.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Returns the slot index (for diagnostics only).
    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

/// Arena of recyclable `T` slots.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<T>,
    live: Vec<bool>,
    free: Vec<usize>,
    in_use: usize,
    high_water: usize,
}

impl<T: Default> Pool<T> {
    /// Creates a pool with `capacity` slots pre-allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, T::default);
        Self {
            slots,
            live: vec![false; capacity],
            free: (0..capacity).rev().collect(),
            in_use: 0,
            high_water: 0,
        }
    }

    /// Stores `value` and returns the unique handle to it.
    ///
    /// Grows the arena by one slot when every slot is in use.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        let index = if let Some(index) = self.free.pop() {
            self.slots[index] = value;
            index
        } else {
            self.slots.push(value);
            self.live.push(false);
            self.slots.len() - 1
        };
        self.live[index] = true;
        self.in_use += 1;
        self.high_water = self.high_water.max(self.in_use);
        Handle {
            index,
            _marker: PhantomData,
        }
    }

    /// Returns a shared reference to the value behind `handle`.
    #[inline]
    pub fn get(&self, handle: &Handle<T>) -> &T {
        debug_assert!(self.live[handle.index]);
        &self.slots[handle.index]
    }

    /// Recycles the slot, dropping its value in place.
    pub fn release(&mut self, handle: Handle<T>) {
        self.slots[handle.index] = T::default();
        self.free_slot(handle.index);
    }

    fn free_slot(&mut self, index: usize) {
        debug_assert!(self.live[index]);
        self.live[index] = false;
        self.in_use -= 1;
        self.free.push(index);
    }

    /// Number of slots currently owned by handles.
    #[inline]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    /// Total number of slots (occupied or free).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Largest number of simultaneously occupied slots seen so far.
    #[inline]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Clears the high-water mark back to the current occupancy.
    pub const fn reset_high_water(&mut self) {
        self.high_water = self.in_use;
    }
}
