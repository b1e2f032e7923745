//! Order record and side types.

use crate::fixed::PriceTick;
use crate::pool::OrderHandle;

/// Side of the order book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    Bid = 0,
    /// Ask side (sellers).
    Ask = 1,
}

impl Side {
    /// Get the opposite side.
    #[inline(always)]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Check if this is the bid side.
    #[inline(always)]
    pub const fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    /// Check if this is the ask side.
    #[inline(always)]
    pub const fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }
}

/// Unique order identifier, assigned by the upstream feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Invalid/unset order ID.
    pub const INVALID: Self = Self(0);

    /// Check if order ID is valid.
    #[inline(always)]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// A resting order.
///
/// The `prev`/`next` handles chain the order into its level's FIFO; both are
/// indices into the owning pool, so splicing never touches a raw pointer.
/// The side is stored explicitly: modify and cancel look it up here instead
/// of probing the bid levels, which misattributes in a locked or crossed
/// market.
#[derive(Clone, Copy, Debug)]
pub struct Order {
    /// Unique order identifier.
    pub order_id: OrderId,
    /// Resting price.
    pub price: PriceTick,
    /// Remaining quantity.
    pub size: u32,
    /// Quantity when the order was placed. Never mutated after creation.
    pub original_size: u32,
    /// Arrival time in nanoseconds; establishes time priority within a level.
    pub timestamp_ns: u64,
    /// Side the order rests on.
    pub side: Side,
    /// Previous order in the level FIFO.
    pub prev: OrderHandle,
    /// Next order in the level FIFO.
    pub next: OrderHandle,
}

impl Order {
    /// Create a new unlinked order.
    #[inline(always)]
    pub fn new(order_id: OrderId, price: PriceTick, size: u32, side: Side, timestamp_ns: u64) -> Self {
        Self {
            order_id,
            price,
            size,
            original_size: size,
            timestamp_ns,
            side,
            prev: OrderHandle::INVALID,
            next: OrderHandle::INVALID,
        }
    }

    /// Check if the order is linked into a level FIFO.
    #[inline(always)]
    pub const fn is_linked(&self) -> bool {
        self.prev.is_valid() || self.next.is_valid()
    }
}

impl Default for Order {
    fn default() -> Self {
        Self {
            order_id: OrderId::INVALID,
            price: PriceTick::ZERO,
            size: 0,
            original_size: 0,
            timestamp_ns: 0,
            side: Side::Bid,
            prev: OrderHandle::INVALID,
            next: OrderHandle::INVALID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_new_order_unlinked() {
        let o = Order::new(OrderId(7), PriceTick::from_raw(10050), 100, Side::Bid, 1000);
        assert!(!o.is_linked());
        assert_eq!(o.original_size, 100);
        assert_eq!(o.size, 100);
    }
}
