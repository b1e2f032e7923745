//! Order book: dual-index container over pooled orders.
//!
//! Each side is an ordered price→level map; the id index maps feed order ids
//! to pool handles in expected O(1). The top-10 projection is cached behind
//! a validity flag and recomputed lazily on the first read after a mutation.

use alloc::collections::BTreeMap;
use hashbrown::HashMap;

use crate::fixed::PriceTick;
use crate::level::Level;
use crate::order::{Order, OrderId, Side};
use crate::pool::{OrderPool, OrderHandle};
use crate::snapshot::{MbpSnapshot, DEPTH};

/// Initial id-index capacity.
const ID_INDEX_CAPACITY: usize = 10_000;

/// One side of the book: price levels plus the iteration direction.
///
/// Best-first means highest price for bids and lowest for asks; the same
/// map type serves both by flipping the traversal.
pub struct BookSide {
    side: Side,
    levels: BTreeMap<PriceTick, Level>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Best level on this side, if any.
    #[inline]
    pub fn best(&self) -> Option<&Level> {
        match self.side {
            Side::Bid => self.levels.values().next_back(),
            Side::Ask => self.levels.values().next(),
        }
    }

    /// Number of levels on this side.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if this side holds no levels.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline(always)]
    fn get_mut(&mut self, price: PriceTick) -> Option<&mut Level> {
        self.levels.get_mut(&price)
    }

    #[inline]
    fn get_or_create(&mut self, price: PriceTick, created: &mut u64) -> &mut Level {
        self.levels.entry(price).or_insert_with(|| {
            *created += 1;
            Level::new(price)
        })
    }

    #[inline(always)]
    fn remove_level(&mut self, price: PriceTick) {
        self.levels.remove(&price);
    }

    fn clear(&mut self) {
        self.levels.clear();
    }

    /// Copy up to `DEPTH` best levels into the given arrays, best first.
    /// Remaining slots are left at price 0, size 0.
    fn fill_top(&self, px: &mut [PriceTick; DEPTH], sz: &mut [u64; DEPTH]) {
        px.fill(PriceTick::ZERO);
        sz.fill(0);

        match self.side {
            Side::Bid => {
                for (i, level) in self.levels.values().rev().take(DEPTH).enumerate() {
                    px[i] = level.price;
                    sz[i] = level.total_size;
                }
            }
            Side::Ask => {
                for (i, level) in self.levels.values().take(DEPTH).enumerate() {
                    px[i] = level.price;
                    sz[i] = level.total_size;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn levels(&self) -> &BTreeMap<PriceTick, Level> {
        &self.levels
    }
}

/// The complete order book for a single instrument.
pub struct OrderBook {
    bids: BookSide,
    asks: BookSide,
    by_id: HashMap<OrderId, OrderHandle>,
    pool: OrderPool,

    cached_bid_px: [PriceTick; DEPTH],
    cached_bid_sz: [u64; DEPTH],
    cached_ask_px: [PriceTick; DEPTH],
    cached_ask_sz: [u64; DEPTH],
    cache_valid: bool,

    orders_processed: u64,
    levels_created: u64,
}

impl OrderBook {
    /// Create an empty book with a freshly reserved pool and id index.
    pub fn new() -> Self {
        Self {
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            by_id: HashMap::with_capacity(ID_INDEX_CAPACITY),
            pool: OrderPool::new(),
            cached_bid_px: [PriceTick::ZERO; DEPTH],
            cached_bid_sz: [0; DEPTH],
            cached_ask_px: [PriceTick::ZERO; DEPTH],
            cached_ask_sz: [0; DEPTH],
            cache_valid: false,
            orders_processed: 0,
            levels_created: 0,
        }
    }

    /// Install a new resting order at the tail of its price level.
    ///
    /// Fails on a duplicate id or a zero size. Crossing prices are accepted:
    /// a crossed feed must be rendered faithfully.
    pub fn add_order(
        &mut self,
        id: OrderId,
        price: PriceTick,
        size: u32,
        side: Side,
        timestamp_ns: u64,
    ) -> bool {
        if size == 0 {
            return false;
        }
        if self.by_id.contains_key(&id) {
            return false;
        }

        let handle = self
            .pool
            .allocate_and_insert(Order::new(id, price, size, side, timestamp_ns));

        let book_side = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        let level = book_side.get_or_create(price, &mut self.levels_created);
        level.push_back(&mut self.pool, handle);

        self.by_id.insert(id, handle);
        self.orders_processed += 1;
        self.cache_valid = false;
        true
    }

    /// Change a resting order's price and/or size.
    ///
    /// A same-price modify resizes in place and keeps time priority. A price
    /// change re-queues the order at the tail of the new level, losing time
    /// priority, which matches the feed convention. A zero new size removes
    /// the order outright.
    pub fn modify_order(&mut self, id: OrderId, new_price: PriceTick, new_size: u32) -> bool {
        let Some(&handle) = self.by_id.get(&id) else {
            return false;
        };

        if new_size == 0 {
            return self.cancel_order(id);
        }

        let (old_price, old_size, side) = {
            let order = self.pool.get(handle);
            (order.price, order.size, order.side)
        };

        let book_side = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        if new_price == old_price {
            if let Some(level) = book_side.get_mut(old_price) {
                level.resize_order(old_size, new_size);
            }
            self.pool.get_mut(handle).size = new_size;
        } else {
            let now_empty = match book_side.get_mut(old_price) {
                Some(level) => {
                    level.remove(&mut self.pool, handle);
                    level.is_empty()
                }
                None => false,
            };
            if now_empty {
                book_side.remove_level(old_price);
            }

            {
                let order = self.pool.get_mut(handle);
                order.price = new_price;
                order.size = new_size;
            }

            let level = book_side.get_or_create(new_price, &mut self.levels_created);
            level.push_back(&mut self.pool, handle);
        }

        self.cache_valid = false;
        true
    }

    /// Remove a resting order and release it to the pool.
    pub fn cancel_order(&mut self, id: OrderId) -> bool {
        let Some(handle) = self.by_id.remove(&id) else {
            return false;
        };

        let (price, side) = {
            let order = self.pool.get(handle);
            (order.price, order.side)
        };

        let book_side = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        let now_empty = match book_side.get_mut(price) {
            Some(level) => {
                level.remove(&mut self.pool, handle);
                level.is_empty()
            }
            None => false,
        };
        if now_empty {
            book_side.remove_level(price);
        }

        self.pool.deallocate(handle);
        self.cache_valid = false;
        true
    }

    /// Consume passive liquidity at exactly `price`.
    ///
    /// The decrement lands on the side opposite `aggressor_side`. Orders
    /// fill head-first in time priority; a partially covered head is resized
    /// in place. Returns `true` even when the level held less than `size`:
    /// partial coverage shows up in the book state, not in the return value.
    pub fn execute_trade(&mut self, price: PriceTick, size: u32, aggressor_side: Side) -> bool {
        if size == 0 {
            return true;
        }

        let passive = aggressor_side.opposite();
        let book_side = match passive {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        let now_empty = {
            let Some(level) = book_side.get_mut(price) else {
                return false;
            };

            let mut remaining = size;
            while remaining > 0 {
                let head = level.front();
                if !head.is_valid() {
                    break;
                }
                let (head_id, head_size) = {
                    let order = self.pool.get(head);
                    (order.order_id, order.size)
                };

                if head_size <= remaining {
                    remaining -= head_size;
                    level.remove(&mut self.pool, head);
                    self.by_id.remove(&head_id);
                    self.pool.deallocate(head);
                } else {
                    level.resize_order(head_size, head_size - remaining);
                    self.pool.get_mut(head).size = head_size - remaining;
                    remaining = 0;
                }
            }

            level.is_empty()
        };
        if now_empty {
            book_side.remove_level(price);
        }

        self.cache_valid = false;
        true
    }

    /// Release every order and empty both sides. The pool survives.
    pub fn clear(&mut self) {
        for (_id, handle) in self.by_id.drain() {
            self.pool.deallocate(handle);
        }
        self.bids.clear();
        self.asks.clear();
        self.cache_valid = false;
    }

    /// Best bid as (price, total size), or (0, 0) when empty.
    pub fn best_bid(&self) -> (PriceTick, u64) {
        self.bids
            .best()
            .map_or((PriceTick::ZERO, 0), |l| (l.price, l.total_size))
    }

    /// Best ask as (price, total size), or (0, 0) when empty.
    pub fn best_ask(&self) -> (PriceTick, u64) {
        self.asks
            .best()
            .map_or((PriceTick::ZERO, 0), |l| (l.price, l.total_size))
    }

    /// Copy the top-10 projection of both sides into `out`.
    ///
    /// The cached arrays are recomputed first if any mutation happened since
    /// the last read. `out.timestamp_ns` is left for the caller to stamp.
    pub fn top10_snapshot(&mut self, out: &mut MbpSnapshot) {
        if !self.cache_valid {
            self.refresh_cache();
        }
        out.bid_px = self.cached_bid_px;
        out.bid_sz = self.cached_bid_sz;
        out.ask_px = self.cached_ask_px;
        out.ask_sz = self.cached_ask_sz;
    }

    fn refresh_cache(&mut self) {
        self.bids.fill_top(&mut self.cached_bid_px, &mut self.cached_bid_sz);
        self.asks.fill_top(&mut self.cached_ask_px, &mut self.cached_ask_sz);
        self.cache_valid = true;
    }

    /// Bid side accessor.
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    /// Ask side accessor.
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Number of currently resting orders.
    pub fn active_orders(&self) -> usize {
        self.by_id.len()
    }

    /// Number of live price levels across both sides.
    pub fn price_levels(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Orders accepted over the book's lifetime.
    pub fn orders_processed(&self) -> u64 {
        self.orders_processed
    }

    /// Levels created over the book's lifetime.
    pub fn levels_created(&self) -> u64 {
        self.levels_created
    }

    /// Pool accessor, for allocation statistics.
    pub fn pool(&self) -> &OrderPool {
        &self.pool
    }

    /// Walk every structure and assert the cross-index invariants:
    /// id-index/residency bijection, per-level aggregates, no empty levels,
    /// and side/price consistency of every resident order.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut resident = 0usize;

        for (book_side, side) in [(&self.bids, Side::Bid), (&self.asks, Side::Ask)] {
            for (&price, level) in book_side.levels().iter() {
                assert!(!level.is_empty(), "empty level resident in map");
                assert_eq!(level.price, price);

                let mut total = 0u64;
                let mut count = 0u32;
                for handle in level.iter(&self.pool) {
                    let order = self.pool.get(handle);
                    assert_eq!(order.price, price);
                    assert_eq!(order.side, side);
                    assert!(order.size > 0, "zero-size order resident");
                    assert_eq!(self.by_id.get(&order.order_id), Some(&handle));
                    total += u64::from(order.size);
                    count += 1;
                    resident += 1;
                }
                assert_eq!(level.total_size, total);
                assert_eq!(level.order_count, count);
            }
        }

        assert_eq!(resident, self.by_id.len(), "id index out of bijection");
        assert_eq!(resident, self.pool.active(), "pool active count drifted");
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
