//! MBO feed event schema.

use crate::fixed::PriceTick;
use crate::order::Side;

/// MBO action code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    /// Add a new order.
    Add = b'A',
    /// Modify price/size of a resting order.
    Modify = b'M',
    /// Cancel a resting order. Also terminates a T→F→C sequence.
    Cancel = b'C',
    /// Trade announcement (first leg of T→F→C).
    Trade = b'T',
    /// Fill confirmation (second leg of T→F→C).
    Fill = b'F',
    /// Reset; empties the book except for the session-start marker.
    Reset = b'R',
    /// No-op.
    None = b'N',
}

impl Action {
    /// Wire code for this action.
    #[inline(always)]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Action {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            b'A' => Ok(Action::Add),
            b'M' => Ok(Action::Modify),
            b'C' => Ok(Action::Cancel),
            b'T' => Ok(Action::Trade),
            b'F' => Ok(Action::Fill),
            b'R' => Ok(Action::Reset),
            b'N' => Ok(Action::None),
            _ => Err(()),
        }
    }
}

/// One MBO feed record.
///
/// `side` is `None` for the feed's `N` side code (resets, sequence
/// terminators); adds and modifies require a concrete side.
#[derive(Clone, Copy, Debug)]
pub struct MboEvent {
    /// Event time in nanoseconds.
    pub timestamp_ns: u64,
    /// Feed-assigned order identifier (trade reference id on `T`/`F`).
    pub order_id: u64,
    /// Price in ticks.
    pub price: PriceTick,
    /// Quantity.
    pub size: u32,
    /// Feed sequence number.
    pub sequence: u16,
    /// Action code.
    pub action: Action,
    /// Side code, `None` for `N`.
    pub side: Option<Side>,
}

impl MboEvent {
    /// Convenience constructor with sequence 0.
    pub fn new(
        timestamp_ns: u64,
        action: Action,
        side: Option<Side>,
        price: PriceTick,
        size: u32,
        order_id: u64,
    ) -> Self {
        Self {
            timestamp_ns,
            order_id,
            price,
            size,
            sequence: 0,
            action,
            side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes_round_trip() {
        for code in [b'A', b'M', b'C', b'T', b'F', b'R', b'N'] {
            let action = Action::try_from(code).unwrap();
            assert_eq!(action.code(), code);
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Action::try_from(b'X').is_err());
        assert!(Action::try_from(b'a').is_err());
    }

    #[test]
    fn test_event_ctor() {
        let ev = MboEvent::new(1000, Action::Add, Some(Side::Bid), PriceTick::from_raw(10050), 100, 1001);
        assert_eq!(ev.sequence, 0);
        assert_eq!(ev.order_id, 1001);
        assert_eq!(ev.side, Some(Side::Bid));
    }
}
