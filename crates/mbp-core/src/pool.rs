//! Order pool: a bounded slot arena with a LIFO free list.
//!
//! The first `POOL_SIZE` slots are pre-allocated at startup; once they are
//! all live, allocation grows the backing arena instead of failing, so
//! callers never see a capacity error. Handles are indices into the arena,
//! which makes the pool-vs-overflow origin test a plain index comparison.
//! LIFO recycling keeps recently freed slots hot in cache.

use alloc::vec::Vec;
use crate::order::Order;

/// Number of pre-allocated order slots.
pub const POOL_SIZE: usize = 50_000;

/// Index into the order pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OrderHandle(pub u32);

impl OrderHandle {
    /// Invalid handle constant.
    pub const INVALID: Self = Self(u32::MAX);

    /// Check if handle is valid.
    #[inline(always)]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Get raw index.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for OrderHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Slot arena for order records.
pub struct OrderPool {
    slots: Vec<Order>,
    /// LIFO free list over the whole arena.
    free: Vec<u32>,
    /// Pre-allocated capacity; slots past this bound are overflow.
    reserved: usize,
    active: u32,
    overflow_allocs: u64,
}

impl OrderPool {
    /// Create a pool with the default pre-allocated capacity.
    pub fn new() -> Self {
        Self::with_capacity(POOL_SIZE)
    }

    /// Create a pool with `capacity` pre-allocated slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Order::default);

        // Reverse so the first pop hands out slot 0.
        let free: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            slots,
            free,
            reserved: capacity,
            active: 0,
            overflow_allocs: 0,
        }
    }

    /// Allocate a slot. Never fails: exhaustion grows the arena.
    #[inline(always)]
    pub fn allocate(&mut self) -> OrderHandle {
        self.active += 1;
        match self.free.pop() {
            Some(idx) => OrderHandle(idx),
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Order::default());
                self.overflow_allocs += 1;
                OrderHandle(idx)
            }
        }
    }

    /// Return a slot to the pool. The slot is zeroed before reuse.
    #[inline(always)]
    pub fn deallocate(&mut self, handle: OrderHandle) {
        debug_assert!(handle.index() < self.slots.len(), "invalid handle");
        debug_assert!(self.active > 0, "double deallocation");

        self.slots[handle.index()] = Order::default();
        self.free.push(handle.0);
        self.active -= 1;
    }

    /// Write an order into the slot.
    #[inline(always)]
    pub fn insert(&mut self, handle: OrderHandle, order: Order) {
        self.slots[handle.index()] = order;
    }

    /// Allocate and insert an order in one operation.
    #[inline(always)]
    pub fn allocate_and_insert(&mut self, order: Order) -> OrderHandle {
        let handle = self.allocate();
        self.insert(handle, order);
        handle
    }

    /// Get immutable reference to an order.
    #[inline(always)]
    pub fn get(&self, handle: OrderHandle) -> &Order {
        &self.slots[handle.index()]
    }

    /// Get mutable reference to an order.
    #[inline(always)]
    pub fn get_mut(&mut self, handle: OrderHandle) -> &mut Order {
        &mut self.slots[handle.index()]
    }

    /// Check whether a handle refers to a pre-allocated slot.
    #[inline(always)]
    pub fn in_reserved_range(&self, handle: OrderHandle) -> bool {
        handle.index() < self.reserved
    }

    /// Number of live orders.
    #[inline(always)]
    pub fn active(&self) -> usize {
        self.active as usize
    }

    /// Number of free slots currently available.
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Pre-allocated capacity.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.reserved
    }

    /// Number of times allocation fell past the pre-allocated range.
    #[inline(always)]
    pub fn overflow_allocs(&self) -> u64 {
        self.overflow_allocs
    }

    /// Check if no orders are live.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.active == 0
    }
}

impl Default for OrderPool {
    fn default() -> Self {
        Self::new()
    }
}
