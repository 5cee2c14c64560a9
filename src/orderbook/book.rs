//! Price-level order book for one outcome token

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::common::types::{BookSide, PriceLevel, TradePrint};

/// Bids and asks keyed by price.
///
/// Only levels with a positive size are stored. A price lives on at most one
/// side: upserting it on one side removes it from the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookState {
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    last_trade: Option<TradePrint>,
    /// Bumped on every change that actually altered the book
    sequence: u64,
}

impl BookState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both sides wholesale
    pub fn apply_snapshot<B, A>(&mut self, bids: B, asks: A)
    where
        B: IntoIterator<Item = PriceLevel>,
        A: IntoIterator<Item = PriceLevel>,
    {
        self.bids = collect_side(bids);
        self.asks = collect_side(asks);
        self.sequence += 1;
    }

    /// Upsert (`size > 0`) or remove (`size <= 0`) one level.
    ///
    /// Returns whether the book changed; reapplying the same delta is a
    /// no-op.
    pub fn apply_delta(&mut self, side: BookSide, price: Decimal, size: Decimal) -> bool {
        if price.is_sign_negative() {
            return false;
        }

        let changed = if size > Decimal::ZERO {
            let crossed = self.side_mut(side.opposite()).remove(&price).is_some();
            let previous = self.side_mut(side).insert(price, size);
            crossed || previous != Some(size)
        } else {
            self.side_mut(side).remove(&price).is_some()
        };

        if changed {
            self.sequence += 1;
        }
        changed
    }

    /// Remember the last trade; levels are untouched
    pub fn record_trade(&mut self, print: TradePrint) {
        self.last_trade = Some(print);
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next_back()
            .map(|(price, size)| PriceLevel::new(*price, *size))
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(price, size)| PriceLevel::new(*price, *size))
    }

    /// `best_ask - best_bid`; `None` while either side is empty
    pub fn spread(&self) -> Option<Decimal> {
        self.best_ask()?.price.checked_sub(self.best_bid()?.price)
    }

    /// `None` while either side is empty or the sum is out of range
    pub fn midpoint(&self) -> Option<Decimal> {
        let sum = self.best_ask()?.price.checked_add(self.best_bid()?.price)?;
        Some(sum / Decimal::TWO)
    }

    /// Top `depth` bids, best (highest) first
    pub fn bids_desc(&self, depth: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .rev()
            .take(depth)
            .map(|(price, size)| PriceLevel::new(*price, *size))
            .collect()
    }

    /// Top `depth` asks, best (lowest) first
    pub fn asks_asc(&self, depth: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(depth)
            .map(|(price, size)| PriceLevel::new(*price, *size))
            .collect()
    }

    /// Largest size among the top `depth` levels of either side
    pub fn max_size(&self, depth: usize) -> Option<Decimal> {
        self.bids
            .values()
            .rev()
            .take(depth)
            .chain(self.asks.values().take(depth))
            .copied()
            .max()
    }

    pub fn level(&self, side: BookSide, price: Decimal) -> Option<Decimal> {
        match side {
            BookSide::Bid => self.bids.get(&price).copied(),
            BookSide::Ask => self.asks.get(&price).copied(),
        }
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn last_trade(&self) -> Option<&TradePrint> {
        self.last_trade.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn side_mut(&mut self, side: BookSide) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            BookSide::Bid => &mut self.bids,
            BookSide::Ask => &mut self.asks,
        }
    }
}

fn collect_side(levels: impl IntoIterator<Item = PriceLevel>) -> BTreeMap<Decimal, Decimal> {
    levels
        .into_iter()
        .filter(|level| level.size > Decimal::ZERO && !level.price.is_sign_negative())
        .map(|level| (level.price, level.size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn book(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> BookState {
        let mut book = BookState::new();
        book.apply_snapshot(
            bids.iter().map(|(p, s)| PriceLevel::new(*p, *s)),
            asks.iter().map(|(p, s)| PriceLevel::new(*p, *s)),
        );
        book
    }

    #[test]
    fn test_spread_and_midpoint() {
        let book = book(&[(dec!(0.45), dec!(100))], &[(dec!(0.47), dec!(80))]);

        assert_eq!(book.spread(), Some(dec!(0.02)));
        assert_eq!(book.midpoint(), Some(dec!(0.46)));
        assert_eq!(book.best_bid(), Some(PriceLevel::new(dec!(0.45), dec!(100))));
        assert_eq!(book.best_ask(), Some(PriceLevel::new(dec!(0.47), dec!(80))));
    }

    #[test]
    fn test_empty_book_has_no_derived_values() {
        let book = BookState::new();

        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
        assert!(book.midpoint().is_none());
    }

    #[test]
    fn test_midpoint_out_of_range_is_none() {
        let book = book(&[(Decimal::MAX, dec!(1))], &[(Decimal::MAX, dec!(1))]);

        assert_eq!(book.spread(), Some(Decimal::ZERO));
        assert!(book.midpoint().is_none());
    }

    #[test]
    fn test_one_sided_book_has_no_spread() {
        let book = book(&[(dec!(0.45), dec!(100))], &[]);
        assert!(book.spread().is_none());
    }

    #[test]
    fn test_snapshot_replaces_and_drops_empty_levels() {
        let mut book = book(&[(dec!(0.30), dec!(5))], &[(dec!(0.70), dec!(5))]);

        book.apply_snapshot(
            vec![
                PriceLevel::new(dec!(0.40), dec!(50)),
                PriceLevel::new(dec!(0.39), dec!(0)),
            ],
            vec![PriceLevel::new(dec!(0.42), dec!(30))],
        );

        assert_eq!(book.bids_desc(10), vec![PriceLevel::new(dec!(0.40), dec!(50))]);
        assert_eq!(book.asks_asc(10), vec![PriceLevel::new(dec!(0.42), dec!(30))]);
    }

    #[test]
    fn test_delta_zero_removes_level() {
        let mut book = book(&[(dec!(0.40), dec!(50))], &[(dec!(0.42), dec!(30))]);

        assert!(book.apply_delta(BookSide::Bid, dec!(0.40), dec!(0)));

        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.asks_asc(10), vec![PriceLevel::new(dec!(0.42), dec!(30))]);
    }

    #[test]
    fn test_delta_zero_on_unknown_price_is_noop() {
        let mut book = book(&[(dec!(0.40), dec!(50))], &[]);
        let before = book.clone();

        assert!(!book.apply_delta(BookSide::Bid, dec!(0.41), dec!(0)));
        assert_eq!(book, before);
    }

    #[test]
    fn test_delta_is_idempotent() {
        let mut once = book(&[(dec!(0.40), dec!(50))], &[(dec!(0.42), dec!(30))]);
        once.apply_delta(BookSide::Ask, dec!(0.43), dec!(12));

        let mut twice = once.clone();
        assert!(!twice.apply_delta(BookSide::Ask, dec!(0.43), dec!(12)));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_delta_equal_prices_with_different_scale() {
        let mut book = book(&[(dec!(0.40), dec!(50))], &[]);

        book.apply_delta(BookSide::Bid, dec!(0.4), dec!(75));

        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.level(BookSide::Bid, dec!(0.400)), Some(dec!(75)));
    }

    #[test]
    fn test_upsert_removes_price_from_opposite_side() {
        let mut book = book(&[(dec!(0.40), dec!(50))], &[(dec!(0.42), dec!(30))]);

        book.apply_delta(BookSide::Bid, dec!(0.42), dec!(10));

        assert_eq!(book.level(BookSide::Bid, dec!(0.42)), Some(dec!(10)));
        assert_eq!(book.level(BookSide::Ask, dec!(0.42)), None);
    }

    #[test]
    fn test_delta_sequences_keep_invariants() {
        let prices = [dec!(0.40), dec!(0.41), dec!(0.42), dec!(0.43)];
        let sizes = [dec!(0), dec!(5), dec!(-1), dec!(20)];
        let mut book = BookState::new();

        for step in 0..200usize {
            let side = if step % 3 == 0 { BookSide::Ask } else { BookSide::Bid };
            let price = prices[(step * 7) % prices.len()];
            let size = sizes[(step * 5 + step / 4) % sizes.len()];
            book.apply_delta(side, price, size);

            let bids = book.bids_desc(usize::MAX);
            let asks = book.asks_asc(usize::MAX);
            assert!(bids.iter().chain(asks.iter()).all(|l| l.size > Decimal::ZERO));
            assert!(bids.iter().all(|b| asks.iter().all(|a| a.price != b.price)));
            assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
            assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
        }
    }

    #[test]
    fn test_trade_does_not_touch_levels() {
        let mut book = book(&[(dec!(0.40), dec!(50))], &[]);
        let before_seq = book.sequence();

        book.record_trade(TradePrint {
            price: dec!(0.41),
            size: Some(dec!(3)),
            side: Some(BookSide::Bid),
            timestamp: None,
        });

        assert_eq!(book.bids_desc(10), vec![PriceLevel::new(dec!(0.40), dec!(50))]);
        assert_eq!(book.last_trade().map(|t| t.price), Some(dec!(0.41)));
        assert_eq!(book.sequence(), before_seq);
    }

    #[test]
    fn test_depth_limits() {
        let book = book(
            &[(dec!(0.40), dec!(1)), (dec!(0.41), dec!(2)), (dec!(0.39), dec!(3))],
            &[(dec!(0.45), dec!(1)), (dec!(0.44), dec!(2))],
        );

        assert_eq!(
            book.bids_desc(2),
            vec![
                PriceLevel::new(dec!(0.41), dec!(2)),
                PriceLevel::new(dec!(0.40), dec!(1)),
            ]
        );
        assert_eq!(book.asks_asc(1), vec![PriceLevel::new(dec!(0.44), dec!(2))]);
        assert_eq!(book.max_size(1), Some(dec!(2)));
        assert_eq!(book.max_size(3), Some(dec!(3)));
        assert_eq!(BookState::new().max_size(5), None);
    }
}
