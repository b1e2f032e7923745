//! Action engine: interprets MBO action codes against the book.
//!
//! The interesting part is the Trade→Fill→Cancel triplet the feed uses to
//! announce an executed aggression. The trade is buffered on `T`, confirmed
//! on a matching `F`, and applied to the passive side when the terminating
//! `C` arrives. Everything else dispatches straight to the book.

use crate::book::OrderBook;
use crate::event::{Action, MboEvent};
use crate::fixed::PriceTick;
use crate::order::{OrderId, Side};

/// T→F→C aggregation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TradeState {
    Idle,
    TradeReceived,
    FillReceived,
}

/// Buffered trade, alive only while a T→F→C sequence is in flight.
#[derive(Clone, Copy, Debug)]
struct TradeContext {
    /// Trade announcement time; retained for diagnostics.
    #[allow(dead_code)]
    trade_ts: u64,
    trade_ref_id: OrderId,
    price: PriceTick,
    size: u32,
    /// Side that initiated the aggression, opposite of the feed's trade side.
    aggressor_side: Side,
    fill_confirmed: bool,
}

/// Per-action event counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionCounters {
    pub adds: u64,
    pub modifies: u64,
    pub cancels: u64,
    pub trades: u64,
    pub fills: u64,
    pub resets: u64,
    pub noops: u64,
}

/// Dispatches events to the book and runs the T→F→C state machine.
pub struct ActionEngine {
    state: TradeState,
    pending: Option<TradeContext>,
    first_reset_seen: bool,

    actions_processed: u64,
    trades_aggregated: u64,
    errors_encountered: u64,
    counters: ActionCounters,
}

impl ActionEngine {
    /// Create an engine in the idle state.
    pub fn new() -> Self {
        Self {
            state: TradeState::Idle,
            pending: None,
            first_reset_seen: false,
            actions_processed: 0,
            trades_aggregated: 0,
            errors_encountered: 0,
            counters: ActionCounters::default(),
        }
    }

    /// Apply one event to the book.
    ///
    /// Returns `true` when the book may have changed (a snapshot
    /// opportunity); the differ makes the final emission decision.
    pub fn process_event(&mut self, book: &mut OrderBook, event: &MboEvent) -> bool {
        self.actions_processed += 1;

        match event.action {
            Action::Add => {
                self.counters.adds += 1;
                self.handle_add(book, event)
            }
            Action::Modify => {
                self.counters.modifies += 1;
                self.handle_modify(book, event)
            }
            Action::Cancel => {
                self.counters.cancels += 1;
                self.handle_cancel(book, event)
            }
            Action::Trade => {
                self.counters.trades += 1;
                self.handle_trade(event)
            }
            Action::Fill => {
                self.counters.fills += 1;
                self.handle_fill(event)
            }
            Action::Reset => {
                self.counters.resets += 1;
                self.handle_reset(book)
            }
            Action::None => {
                self.counters.noops += 1;
                true
            }
        }
    }

    fn handle_add(&mut self, book: &mut OrderBook, event: &MboEvent) -> bool {
        let Some(side) = event.side else {
            // Sideless add is malformed; drop it.
            return false;
        };

        let ok = book.add_order(
            OrderId(event.order_id),
            event.price,
            event.size,
            side,
            event.timestamp_ns,
        );
        if !ok {
            self.errors_encountered += 1;
        }
        ok
    }

    fn handle_modify(&mut self, book: &mut OrderBook, event: &MboEvent) -> bool {
        if event.side.is_none() {
            return false;
        }

        let ok = book.modify_order(OrderId(event.order_id), event.price, event.size);
        if !ok {
            self.errors_encountered += 1;
        }
        ok
    }

    fn handle_cancel(&mut self, book: &mut OrderBook, event: &MboEvent) -> bool {
        if self.state == TradeState::FillReceived {
            return self.complete_trade(book);
        }

        let ok = book.cancel_order(OrderId(event.order_id));
        if !ok {
            self.errors_encountered += 1;
        }
        ok
    }

    fn handle_trade(&mut self, event: &MboEvent) -> bool {
        let Some(side) = event.side else {
            self.errors_encountered += 1;
            return false;
        };

        // A second T re-buffers, replacing the in-flight trade. The feed's
        // trade side names the resting side being consumed; the aggressor is
        // its opposite.
        self.state = TradeState::TradeReceived;
        self.pending = Some(TradeContext {
            trade_ts: event.timestamp_ns,
            trade_ref_id: OrderId(event.order_id),
            price: event.price,
            size: event.size,
            aggressor_side: side.opposite(),
            fill_confirmed: false,
        });
        false
    }

    fn handle_fill(&mut self, event: &MboEvent) -> bool {
        if self.state != TradeState::TradeReceived {
            // Orphan fill, or a duplicate after confirmation.
            self.errors_encountered += 1;
            self.state = TradeState::Idle;
            self.pending = None;
            return false;
        }

        match &mut self.pending {
            Some(ctx) if ctx.trade_ref_id == OrderId(event.order_id) => {
                ctx.fill_confirmed = true;
                self.state = TradeState::FillReceived;
            }
            _ => {
                self.errors_encountered += 1;
                self.state = TradeState::Idle;
                self.pending = None;
            }
        }
        false
    }

    fn handle_reset(&mut self, book: &mut OrderBook) -> bool {
        if !self.first_reset_seen {
            // Session-start marker: acknowledged, not applied to the book.
            self.first_reset_seen = true;
            self.state = TradeState::Idle;
            self.pending = None;
            return false;
        }

        book.clear();
        self.state = TradeState::Idle;
        self.pending = None;
        true
    }

    fn complete_trade(&mut self, book: &mut OrderBook) -> bool {
        let ok = match self.pending.take() {
            Some(ctx) if ctx.fill_confirmed => {
                book.execute_trade(ctx.price, ctx.size, ctx.aggressor_side)
            }
            _ => false,
        };

        if ok {
            self.trades_aggregated += 1;
        } else {
            self.errors_encountered += 1;
        }
        self.state = TradeState::Idle;
        ok
    }

    /// Total events seen.
    pub fn actions_processed(&self) -> u64 {
        self.actions_processed
    }

    /// Completed T→F→C sequences that reached the book.
    pub fn trades_aggregated(&self) -> u64 {
        self.trades_aggregated
    }

    /// Recoverable per-event failures.
    pub fn errors_encountered(&self) -> u64 {
        self.errors_encountered
    }

    /// Per-action breakdown.
    pub fn counters(&self) -> &ActionCounters {
        &self.counters
    }
}

impl Default for ActionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::PriceTick;
    use crate::snapshot::SnapshotDiffer;

    fn px(raw: i64) -> PriceTick {
        PriceTick::from_raw(raw)
    }

    fn ev(ts: u64, action: Action, side: Option<Side>, price: i64, size: u32, oid: u64) -> MboEvent {
        MboEvent::new(ts, action, side, px(price), size, oid)
    }

    #[test]
    fn test_add_then_cancel() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        assert!(engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Bid), 10050, 100, 1001)));
        assert!(engine.process_event(&mut book, &ev(2000, Action::Add, Some(Side::Ask), 10100, 200, 1002)));
        assert!(engine.process_event(&mut book, &ev(3000, Action::Cancel, Some(Side::Bid), 10050, 0, 1001)));

        assert_eq!(book.best_bid(), (PriceTick::ZERO, 0));
        assert_eq!(book.best_ask(), (px(10100), 200));
        assert_eq!(engine.errors_encountered(), 0);
        book.check_invariants();
    }

    #[test]
    fn test_same_price_modify_keeps_head() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Bid), 10050, 100, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Add, Some(Side::Bid), 10050, 150, 1002));
        assert!(engine.process_event(&mut book, &ev(3000, Action::Modify, Some(Side::Bid), 10050, 200, 1001)));

        assert_eq!(book.best_bid(), (px(10050), 350));
        let level = book.bids().best().unwrap();
        assert_eq!(book.pool().get(level.front()).order_id, OrderId(1001));
    }

    #[test]
    fn test_price_modify_loses_priority() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Bid), 10050, 100, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Add, Some(Side::Bid), 10050, 150, 1002));
        assert!(engine.process_event(&mut book, &ev(3000, Action::Modify, Some(Side::Bid), 10075, 100, 1001)));

        assert_eq!(book.best_bid(), (px(10075), 100));
        let best = book.bids().best().unwrap();
        assert_eq!(book.pool().get(best.front()).order_id, OrderId(1001));
        book.check_invariants();
    }

    #[test]
    fn test_full_trade_sequence() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();
        let mut differ = SnapshotDiffer::new();
        let mut emitted = 0;

        let events = [
            ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001),
            ev(2000, Action::Trade, Some(Side::Ask), 10100, 100, 9999),
            ev(3000, Action::Fill, Some(Side::Ask), 10100, 100, 9999),
            ev(4000, Action::Cancel, None, 10100, 0, 9999),
        ];
        for event in &events {
            if engine.process_event(&mut book, event) {
                if differ.observe(&mut book, event.timestamp_ns).is_some() {
                    emitted += 1;
                }
            }
        }

        assert_eq!(book.best_ask(), (px(10100), 100));
        assert_eq!(engine.trades_aggregated(), 1);
        assert_eq!(engine.errors_encountered(), 0);
        // Snapshots only for the add and the completed trade.
        assert_eq!(emitted, 2);
        book.check_invariants();
    }

    #[test]
    fn test_orphan_fill_dropped() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        assert!(!engine.process_event(&mut book, &ev(2000, Action::Fill, Some(Side::Ask), 10100, 100, 9999)));

        assert_eq!(engine.errors_encountered(), 1);
        assert_eq!(book.best_ask(), (px(10100), 200));
    }

    #[test]
    fn test_mismatched_fill_aborts_sequence() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Trade, Some(Side::Ask), 10100, 100, 9999));
        assert!(!engine.process_event(&mut book, &ev(3000, Action::Fill, Some(Side::Ask), 10100, 100, 8888)));
        assert_eq!(engine.errors_encountered(), 1);

        // The terminating cancel now takes the plain path and fails on the
        // unknown synthetic id.
        assert!(!engine.process_event(&mut book, &ev(4000, Action::Cancel, None, 10100, 0, 9999)));
        assert_eq!(engine.errors_encountered(), 2);
        assert_eq!(engine.trades_aggregated(), 0);
        assert_eq!(book.best_ask(), (px(10100), 200));
    }

    #[test]
    fn test_second_trade_rebuffers() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Trade, Some(Side::Ask), 10100, 50, 9998));
        engine.process_event(&mut book, &ev(3000, Action::Trade, Some(Side::Ask), 10100, 100, 9999));
        engine.process_event(&mut book, &ev(4000, Action::Fill, Some(Side::Ask), 10100, 100, 9999));
        assert!(engine.process_event(&mut book, &ev(5000, Action::Cancel, None, 10100, 0, 9999)));

        // The replacement trade's size is what got applied.
        assert_eq!(book.best_ask(), (px(10100), 100));
        assert_eq!(engine.trades_aggregated(), 1);
    }

    #[test]
    fn test_add_during_sequence_is_independent() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Trade, Some(Side::Ask), 10100, 100, 9999));
        // Unrelated add between T and F; the buffered trade survives.
        assert!(engine.process_event(&mut book, &ev(2500, Action::Add, Some(Side::Bid), 10000, 30, 1002)));
        engine.process_event(&mut book, &ev(3000, Action::Fill, Some(Side::Ask), 10100, 100, 9999));
        assert!(engine.process_event(&mut book, &ev(4000, Action::Cancel, None, 10100, 0, 9999)));

        assert_eq!(book.best_ask(), (px(10100), 100));
        assert_eq!(book.best_bid(), (px(10000), 30));
        assert_eq!(engine.trades_aggregated(), 1);
    }

    #[test]
    fn test_first_reset_swallowed() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        assert!(!engine.process_event(&mut book, &ev(1000, Action::Reset, None, 0, 0, 0)));
        assert!(engine.process_event(&mut book, &ev(2000, Action::Add, Some(Side::Bid), 10050, 100, 1001)));
        assert!(engine.process_event(&mut book, &ev(3000, Action::Reset, None, 0, 0, 0)));

        assert_eq!(book.active_orders(), 0);
        assert_eq!(book.best_bid(), (PriceTick::ZERO, 0));
        book.check_invariants();
    }

    #[test]
    fn test_reset_aborts_inflight_sequence() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(500, Action::Reset, None, 0, 0, 0));
        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Trade, Some(Side::Ask), 10100, 100, 9999));
        assert!(engine.process_event(&mut book, &ev(3000, Action::Reset, None, 0, 0, 0)));

        // The buffered trade is gone; a stray fill is now an orphan.
        assert!(!engine.process_event(&mut book, &ev(4000, Action::Fill, Some(Side::Ask), 10100, 100, 9999)));
        assert_eq!(engine.errors_encountered(), 1);
        assert_eq!(book.active_orders(), 0);
    }

    #[test]
    fn test_duplicate_fill_after_confirmation() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Ask), 10100, 200, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Trade, Some(Side::Ask), 10100, 100, 9999));
        engine.process_event(&mut book, &ev(3000, Action::Fill, Some(Side::Ask), 10100, 100, 9999));
        // Second fill: protocol violation, sequence dropped.
        assert!(!engine.process_event(&mut book, &ev(3500, Action::Fill, Some(Side::Ask), 10100, 100, 9999)));
        assert_eq!(engine.errors_encountered(), 1);

        assert!(!engine.process_event(&mut book, &ev(4000, Action::Cancel, None, 10100, 0, 9999)));
        assert_eq!(engine.trades_aggregated(), 0);
        assert_eq!(book.best_ask(), (px(10100), 200));
    }

    #[test]
    fn test_sideless_add_and_modify_dropped() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        assert!(!engine.process_event(&mut book, &ev(1000, Action::Add, None, 10050, 100, 1001)));
        assert!(!engine.process_event(&mut book, &ev(2000, Action::Modify, None, 10050, 100, 1001)));
        assert_eq!(book.active_orders(), 0);
    }

    #[test]
    fn test_noop_is_worthy_but_suppressed() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();
        let mut differ = SnapshotDiffer::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Bid), 10050, 100, 1001));
        assert!(differ.observe(&mut book, 1000).is_some());

        assert!(engine.process_event(&mut book, &ev(2000, Action::None, None, 0, 0, 0)));
        assert!(differ.observe(&mut book, 2000).is_none());
        assert_eq!(differ.skipped(), 1);
    }

    #[test]
    fn test_counters_track_outcomes() {
        let mut book = OrderBook::new();
        let mut engine = ActionEngine::new();

        engine.process_event(&mut book, &ev(1000, Action::Add, Some(Side::Bid), 10050, 100, 1001));
        engine.process_event(&mut book, &ev(2000, Action::Modify, Some(Side::Bid), 10050, 150, 1001));
        engine.process_event(&mut book, &ev(3000, Action::Cancel, Some(Side::Bid), 0, 0, 1001));
        engine.process_event(&mut book, &ev(4000, Action::Cancel, Some(Side::Bid), 0, 0, 1001));
        engine.process_event(&mut book, &ev(5000, Action::None, None, 0, 0, 0));

        assert_eq!(engine.actions_processed(), 5);
        assert_eq!(engine.errors_encountered(), 1);
        let c = engine.counters();
        assert_eq!(c.adds, 1);
        assert_eq!(c.modifies, 1);
        assert_eq!(c.cancels, 2);
        assert_eq!(c.noops, 1);
    }
}
