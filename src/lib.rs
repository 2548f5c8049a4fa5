pub mod book;
pub mod config;
pub mod half;
pub mod market_maker;
pub mod price;
pub mod simulation;
pub mod strategy;

mod error;

pub use error::{Error, Result};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type OrderId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSize {
    pub price: Decimal,
    pub size: i64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Who is resting an order. Only market-maker fills are reported to a
/// [`book::FillListener`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    #[default]
    Investor,
    MarketMaker,
}

/// An arena slot. `prev`/`next` link the slot into its price level's FIFO.
#[derive(Default, Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub price: Decimal,
    pub size: i64,
    pub owner: Owner,

    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl Order {
    pub fn overwrite(
        &mut self,
        id: OrderId,
        price: Decimal,
        size: i64,
        owner: Owner,
        prev: Option<usize>,
        next: Option<usize>,
    ) {
        self.id = id;
        self.price = price;
        self.size = size;
        self.owner = owner;
        self.prev = prev;
        self.next = next;
    }
}

#[derive(Debug, Default)]
pub struct PriceLevel {
    pub head: Option<usize>,
    pub tail: Option<usize>,
    pub total_size: i64,
    pub order_count: usize,
}

/// One matched segment of a market order against a single resting order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub owner: Owner,
    pub price: Decimal,
    pub size: i64,
    /// Side of the incoming market order, not of the resting order.
    pub taker_side: Side,
}

/// tell the caller how much they bought and at what price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketOrderResponse {
    pub requested: i64,
    pub filled: i64,
    pub notional: Decimal,
}
