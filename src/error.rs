use rust_decimal::Decimal;
use thiserror::Error;

use crate::OrderId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid order: price {price}, size {size}")]
    InvalidOrder { price: Decimal, size: i64 },

    #[error("price process produced an unusable price {0}")]
    InvalidPrice(f64),

    #[error("price {0} cannot be represented as a decimal")]
    UnrepresentablePrice(f64),

    #[error("price level {0} is missing from the book")]
    MissingLevel(Decimal),

    #[error("arena slot {index} is out of bounds (order {id:?})")]
    Arena { index: usize, id: Option<OrderId> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
