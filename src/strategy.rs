use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::book::{OrderBook, TICK_SIZE};

/// A proposed two-sided quote. A missing side means "do not quote".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl Quote {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn two_sided(bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
        }
    }
}

/// Turns the current book into a proposed quote. Any
/// `Fn(&OrderBook, i64) -> Quote` closure is one.
pub trait QuotingStrategy {
    fn quote(&self, book: &OrderBook, size: i64) -> Quote;
}

impl<F> QuotingStrategy for F
where
    F: Fn(&OrderBook, i64) -> Quote,
{
    fn quote(&self, book: &OrderBook, size: i64) -> Quote {
        self(book, size)
    }
}

/// Improves both sides of the inside spread by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinInside {
    pub tick: Decimal,
}

impl Default for JoinInside {
    fn default() -> Self {
        Self { tick: TICK_SIZE }
    }
}

impl QuotingStrategy for JoinInside {
    fn quote(&self, book: &OrderBook, _size: i64) -> Quote {
        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            return Quote::none();
        };

        Quote::two_sided(
            (best_bid + self.tick).round_dp(2),
            (best_ask - self.tick).round_dp(2),
        )
    }
}

/// Quotes a constant spread around the current mid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSpread {
    pub spread: Decimal,
}

impl Default for FixedSpread {
    fn default() -> Self {
        Self { spread: dec!(0.10) }
    }
}

impl QuotingStrategy for FixedSpread {
    fn quote(&self, book: &OrderBook, _size: i64) -> Quote {
        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            return Quote::none();
        };

        let mid = (best_bid + best_ask) / dec!(2);
        let half_spread = self.spread / dec!(2);
        Quote::two_sided(
            (mid - half_spread).round_dp(2),
            (mid + half_spread).round_dp(2),
        )
    }
}

/// Serializable strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    JoinInside { tick: Decimal },
    FixedSpread { spread: Decimal },
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::JoinInside { tick: TICK_SIZE }
    }
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn QuotingStrategy> {
        match self {
            StrategyKind::JoinInside { tick } => Box::new(JoinInside { tick }),
            StrategyKind::FixedSpread { spread } => Box::new(FixedSpread { spread }),
        }
    }
}
