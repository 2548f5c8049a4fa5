use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Fill, OrderId, Owner, Result, Side,
    book::{FillListener, OrderBook},
    strategy::{JoinInside, QuotingStrategy},
};

/// Represents profit and loss information.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PnL {
    /// Cash flow from fills.
    pub realized: Decimal,

    /// Inventory marked at the latest market price.
    pub unrealized: Decimal,

    /// Total PnL (realized + unrealized).
    pub total: Decimal,
}

/// How the previous pair of quotes is withdrawn before a requote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelScope {
    /// Cancel only the maker's own orders, by id.
    #[default]
    Order,
    /// Cancel the whole price level the maker was quoting at, including
    /// anyone else queued there.
    Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSkip {
    /// One side of the book has no liquidity.
    EmptyBook,
    /// The strategy declined to quote one or both sides, or proposed a
    /// non-positive price.
    NoQuote,
    /// The proposed bid is at or through the proposed ask.
    Crossed { bid: Decimal, ask: Decimal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOutcome {
    Placed { bid: Decimal, ask: Decimal },
    Skipped(QuoteSkip),
}

/// Keeps one bid and one ask resting in the book and books its own fills
/// into inventory and PnL through [`FillListener`].
pub struct MarketMaker {
    strategy: Box<dyn QuotingStrategy>,
    size: i64,
    cancel_scope: CancelScope,

    current_bid: Option<Decimal>,
    current_ask: Option<Decimal>,
    bid_id: Option<OrderId>,
    ask_id: Option<OrderId>,

    inventory: i64,
    pnl: PnL,
    fills: u64,
}

impl MarketMaker {
    pub fn new(strategy: Box<dyn QuotingStrategy>, size: i64) -> Self {
        Self {
            strategy,
            size,
            cancel_scope: CancelScope::default(),
            current_bid: None,
            current_ask: None,
            bid_id: None,
            ask_id: None,
            inventory: 0,
            pnl: PnL::default(),
            fills: 0,
        }
    }

    pub fn with_cancel_scope(mut self, cancel_scope: CancelScope) -> Self {
        self.cancel_scope = cancel_scope;
        self
    }

    /// Cancel the previous quotes and post a fresh pair from the strategy.
    ///
    /// Nothing is touched when either side of the book is empty, when the
    /// strategy declines or proposes a non-positive price, or when the
    /// proposal would cross itself; the old quotes keep resting in those cases.
    pub fn place_quotes(&mut self, book: &mut OrderBook) -> Result<QuoteOutcome> {
        if book.bids.is_empty() || book.asks.is_empty() {
            debug!("requote skipped: one side of the book is empty");
            return Ok(QuoteOutcome::Skipped(QuoteSkip::EmptyBook));
        }

        let quote = self.strategy.quote(book, self.size);
        let (Some(bid), Some(ask)) = (quote.bid, quote.ask) else {
            debug!("requote skipped: strategy declined to quote");
            return Ok(QuoteOutcome::Skipped(QuoteSkip::NoQuote));
        };

        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            debug!(%bid, %ask, "requote skipped: non-positive quote price");
            return Ok(QuoteOutcome::Skipped(QuoteSkip::NoQuote));
        }

        if bid >= ask {
            debug!(%bid, %ask, "requote skipped: quote would cross");
            return Ok(QuoteOutcome::Skipped(QuoteSkip::Crossed { bid, ask }));
        }

        self.cancel_quotes(book)?;

        self.bid_id = Some(book.add_limit_order(bid, self.size, Side::Buy, Owner::MarketMaker)?);
        self.ask_id = Some(book.add_limit_order(ask, self.size, Side::Sell, Owner::MarketMaker)?);
        self.current_bid = Some(bid);
        self.current_ask = Some(ask);

        debug!(%bid, %ask, size = self.size, "requoted");

        Ok(QuoteOutcome::Placed { bid, ask })
    }

    /// Books a fill. `side` is the taker's side: a taker buy lifted our ask.
    pub fn update_pnl(&mut self, price: Decimal, size: i64, side: Side, mark_price: Decimal) {
        let notional = Decimal::from(size) * price;
        match side {
            Side::Buy => {
                self.pnl.realized += notional;
                self.inventory -= size;
            }
            Side::Sell => {
                self.pnl.realized -= notional;
                self.inventory += size;
            }
        }
        self.fills += 1;

        self.mark_to_market(mark_price);
    }

    /// Re-marks inventory without a fill.
    pub fn mark_to_market(&mut self, mark_price: Decimal) {
        self.pnl.unrealized = Decimal::from(self.inventory) * mark_price;
        self.pnl.total = self.pnl.unrealized + self.pnl.realized;
    }

    pub fn inventory(&self) -> i64 {
        self.inventory
    }

    pub fn pnl(&self) -> PnL {
        self.pnl
    }

    pub fn fills(&self) -> u64 {
        self.fills
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn current_bid(&self) -> Option<Decimal> {
        self.current_bid
    }

    pub fn current_ask(&self) -> Option<Decimal> {
        self.current_ask
    }

    pub fn bid_id(&self) -> Option<OrderId> {
        self.bid_id
    }

    pub fn ask_id(&self) -> Option<OrderId> {
        self.ask_id
    }

    fn cancel_quotes(&mut self, book: &mut OrderBook) -> Result<()> {
        match self.cancel_scope {
            CancelScope::Order => {
                for id in [self.bid_id.take(), self.ask_id.take()].into_iter().flatten() {
                    book.cancel_order_by_id(id)?;
                }
            }
            CancelScope::Level => {
                if let Some(bid) = self.current_bid {
                    book.cancel_order(bid, Side::Buy)?;
                }
                if let Some(ask) = self.current_ask {
                    book.cancel_order(ask, Side::Sell)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for MarketMaker {
    fn default() -> Self {
        Self::new(Box::new(JoinInside::default()), 10)
    }
}

impl FillListener for MarketMaker {
    fn on_fill(&mut self, fill: &Fill, mark_price: Decimal) {
        trace!(order_id = fill.order_id, price = %fill.price, size = fill.size, "maker filled");
        self.update_pnl(fill.price, fill.size, fill.taker_side, mark_price);
    }
}
