use std::{fmt, ops::Range};

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::trace;

use crate::{
    Error, Fill, MarketOrderResponse, Order, OrderId, Owner, PriceSize, Result, Side,
    half::HalfBook,
};

/// Smallest price increment; every resting price sits on this grid.
pub const TICK_SIZE: Decimal = dec!(0.01);

/// Observer for fills against market-maker orders.
///
/// `mark_price` is the book's current market price at the moment of the
/// fill, taken while the level being consumed is still resting.
pub trait FillListener {
    fn on_fill(&mut self, fill: &Fill, mark_price: Decimal);
}

/// Mid when both sides are quoted, else the only quoted side, else
/// `fallback`.
pub fn market_price(
    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
    fallback: Decimal,
) -> Decimal {
    match (best_bid, best_ask) {
        (Some(bid), Some(ask)) => (bid + ask) / dec!(2),
        (Some(bid), None) => bid,
        (None, Some(ask)) => ask,
        (None, None) => fallback,
    }
}

#[derive(Debug)]
pub struct OrderBook {
    /// Bids are an arena
    pub bids: HalfBook,
    /// Asks are an arena
    pub asks: HalfBook,

    mid_price: Decimal,
    current_id: OrderId,
}

impl OrderBook {
    pub fn new(initial_price: Decimal) -> Self {
        Self {
            bids: HalfBook::new(Side::Buy),
            asks: HalfBook::new(Side::Sell),
            mid_price: initial_price,
            current_id: 0,
        }
    }

    /// A book with `levels` one-tick-apart investor levels on each side of
    /// `initial_price`, each holding a single order with a size drawn from
    /// `sizes`.
    pub fn seeded<R: Rng + ?Sized>(
        initial_price: Decimal,
        levels: usize,
        sizes: Range<i64>,
        rng: &mut R,
    ) -> Result<Self> {
        if levels > 0 && (sizes.is_empty() || sizes.start <= 0) {
            return Err(Error::Config(format!(
                "seed order sizes must be a non-empty positive range, got {sizes:?}"
            )));
        }

        let mut book = Self::new(initial_price);

        for i in 1..=levels {
            let offset = TICK_SIZE * Decimal::from(i as i64);
            let bid_size = rng.gen_range(sizes.clone());
            let ask_size = rng.gen_range(sizes.clone());

            book.add_limit_order(
                (initial_price - offset).round_dp(2),
                bid_size,
                Side::Buy,
                Owner::Investor,
            )?;
            book.add_limit_order(
                (initial_price + offset).round_dp(2),
                ask_size,
                Side::Sell,
                Owner::Investor,
            )?;
        }

        Ok(book)
    }

    /// Appends to the tail of the `(price, side)` level. No crossed-market
    /// check is made here.
    pub fn add_limit_order(
        &mut self,
        price: Decimal,
        size: i64,
        side: Side,
        owner: Owner,
    ) -> Result<OrderId> {
        let id = self.get_next_id();
        self.half_mut(side).insert(id, price, size, owner)?;
        self.update_mid_price();

        Ok(id)
    }

    /// Removes the whole level at `price`, whoever the orders belong to.
    pub fn cancel_order(&mut self, price: Decimal, side: Side) -> Result<Vec<OrderId>> {
        let removed = self.half_mut(side).remove_level(price)?;
        self.update_mid_price();

        Ok(removed)
    }

    /// Removes a single order, leaving the rest of its level queued. Returns
    /// `false` if the order is no longer resting.
    pub fn cancel_order_by_id(&mut self, id: OrderId) -> Result<bool> {
        let removed = match self.bids.remove(id)? {
            Some(order) => Some(order),
            None => self.asks.remove(id)?,
        };
        self.update_mid_price();

        Ok(removed.is_some())
    }

    /// Takers buy from the asks and sell to the bids. Whatever cannot be
    /// filled is dropped; a market order never rests.
    pub fn execute_market_order(
        &mut self,
        size: i64,
        side: Side,
        mut listener: Option<&mut dyn FillListener>,
    ) -> Result<MarketOrderResponse> {
        if size <= 0 {
            return Err(Error::InvalidOrder {
                price: Decimal::ZERO,
                size,
            });
        }

        let fallback = self.mid_price;
        let (half, opposite_best) = match side {
            Side::Buy => (&mut self.asks, self.bids.best_price()),
            Side::Sell => (&mut self.bids, self.asks.best_price()),
        };

        let (filled, notional) = half.match_size(size, |fill| {
            trace!(
                order_id = fill.order_id,
                price = %fill.price,
                size = fill.size,
                taker = ?fill.taker_side,
                owner = ?fill.owner,
                "fill"
            );

            if fill.owner != Owner::MarketMaker {
                return;
            }
            if let Some(listener) = listener.as_mut() {
                let mark = match side {
                    Side::Buy => market_price(opposite_best, Some(fill.price), fallback),
                    Side::Sell => market_price(Some(fill.price), opposite_best, fallback),
                };
                listener.on_fill(fill, mark);
            }
        })?;

        self.update_mid_price();

        Ok(MarketOrderResponse {
            requested: size,
            filled,
            notional,
        })
    }

    /// The reference price used for marking inventory.
    pub fn get_current_market_price(&self) -> Decimal {
        market_price(self.best_bid(), self.best_ask(), self.mid_price)
    }

    /// Cached mid, only refreshed while both sides are quoted.
    pub fn mid_price(&self) -> Decimal {
        self.mid_price
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.best_price()
    }

    pub fn get_best_bid(&self) -> Option<PriceSize> {
        self.bids.get_top_of_book()
    }

    pub fn get_best_ask(&self) -> Option<PriceSize> {
        self.asks.get_top_of_book()
    }

    pub fn total_liquidity(&self, side: Side) -> i64 {
        self.half(side).get_total_liquidity()
    }

    pub fn half(&self, side: Side) -> &HalfBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn prices(&self, side: Side) -> Vec<Decimal> {
        self.half(side).prices()
    }

    pub fn orders_at(&self, price: Decimal, side: Side) -> Vec<&Order> {
        self.half(side).orders_at(price)
    }

    /// Looks an order up on either side.
    pub fn order(&self, id: OrderId) -> Option<(Side, &Order)> {
        self.bids
            .order(id)
            .map(|order| (Side::Buy, order))
            .or_else(|| self.asks.order(id).map(|order| (Side::Sell, order)))
    }

    /// Investor flow is allowed to cross the book; only the maker guards
    /// its own quotes.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Structural checks on both halves plus the cached mid.
    pub fn assert_invariants(&self) {
        self.bids.assert_invariants();
        self.asks.assert_invariants();
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            assert_eq!(self.mid_price, (bid + ask) / dec!(2), "cached mid is stale");
        }
    }

    fn half_mut(&mut self, side: Side) -> &mut HalfBook {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn update_mid_price(&mut self) {
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            self.mid_price = (bid + ask) / dec!(2);
        }
    }

    fn get_next_id(&mut self) -> OrderId {
        let id = self.current_id;
        self.current_id += 1;
        id
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn describe(orders: Vec<&Order>) -> String {
            if orders.is_empty() {
                return " - ".to_string();
            }
            orders
                .iter()
                .map(|order| {
                    let owner = match order.owner {
                        Owner::Investor => "investor",
                        Owner::MarketMaker => "market_maker",
                    };
                    format!("{} ({})", order.size, owner)
                })
                .collect::<Vec<_>>()
                .join(", ")
        }

        let mut prices = self.bids.prices();
        prices.extend(self.asks.prices());
        prices.sort_unstable_by(|a, b| b.cmp(a));
        prices.dedup();

        writeln!(f, "{:<10} {:<24} {:<24}", "Price", "Ask Size (Owner)", "Bid Size (Owner)")?;
        writeln!(f, "{}", "-".repeat(58))?;
        for price in prices {
            writeln!(
                f,
                "{:<10} {:<24} {:<24}",
                price.to_string(),
                describe(self.asks.orders_at(price)),
                describe(self.bids.orders_at(price)),
            )?;
        }
        write!(f, "{}", "-".repeat(58))
    }
}
