use std::{ops::Range, path::Path};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, market_maker::CancelScope, strategy::StrategyKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub num_steps: usize,
    pub seed: u64,
    pub initial_price: f64,
    /// Investor levels placed on each side before the first tick.
    pub seed_levels: usize,
    pub gbm: GbmConfig,
    pub maker: MakerConfig,
    pub flow: FlowConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmConfig {
    pub mu: f64,
    pub sigma: f64,
    /// Defaults to `1 / num_steps`.
    pub dt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MakerConfig {
    pub size: i64,
    pub strategy: StrategyKind,
    pub cancel_scope: CancelScope,
}

/// Synthetic investor order flow. Ranges are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub bid_count: Range<usize>,
    pub ask_count: Range<usize>,
    pub order_size: Range<i64>,
    /// Bid prices are centred on `bid_offset * reference`.
    pub bid_offset: f64,
    pub ask_offset: f64,
    /// Standard deviation of investor prices, in currency units.
    pub price_noise: f64,
    /// Chance that an investor order joins one tick inside the best level.
    pub aggressive_probability: f64,
    /// Relative distance from the reference price past which a level expires.
    pub stale_threshold: Decimal,
    /// Also expire bids at or above, and asks at or below, the reference.
    pub expire_through_reference: bool,
    pub market_order_count: Range<usize>,
    pub market_order_size: Range<i64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_steps: 50,
            seed: 42,
            initial_price: 100.0,
            seed_levels: 5,
            gbm: GbmConfig::default(),
            maker: MakerConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            mu: 0.05,
            sigma: 0.15,
            dt: None,
        }
    }
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            size: 10,
            strategy: StrategyKind::default(),
            cancel_scope: CancelScope::default(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            bid_count: 10..20,
            ask_count: 10..20,
            order_size: 5..20,
            bid_offset: 0.99,
            ask_offset: 1.01,
            price_noise: 0.05,
            aggressive_probability: 0.20,
            stale_threshold: Decimal::new(3, 2),
            expire_through_reference: false,
            market_order_count: 1..6,
            market_order_size: 5..15,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn dt(&self) -> f64 {
        self.gbm
            .dt
            .unwrap_or_else(|| 1.0 / self.num_steps.max(1) as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.initial_price.is_finite() && self.initial_price > 0.0) {
            return invalid(format!("initial_price must be positive, got {}", self.initial_price));
        }
        if self.maker.size <= 0 {
            return invalid(format!("maker.size must be positive, got {}", self.maker.size));
        }
        match self.maker.strategy {
            StrategyKind::JoinInside { tick } if tick <= Decimal::ZERO => {
                return invalid(format!("join_inside tick must be positive, got {tick}"));
            }
            StrategyKind::FixedSpread { spread } if spread <= Decimal::ZERO => {
                return invalid(format!("fixed_spread spread must be positive, got {spread}"));
            }
            _ => {}
        }
        if self.gbm.dt.is_some_and(|dt| !(dt > 0.0)) {
            return invalid("gbm.dt must be positive".into());
        }
        self.flow.validate()
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("bid_count", &self.bid_count),
            ("ask_count", &self.ask_count),
            ("market_order_count", &self.market_order_count),
        ] {
            if range.is_empty() {
                return invalid(format!("flow.{name} is an empty range"));
            }
        }
        for (name, range) in [
            ("order_size", &self.order_size),
            ("market_order_size", &self.market_order_size),
        ] {
            if range.is_empty() || range.start <= 0 {
                return invalid(format!("flow.{name} must be a non-empty positive range"));
            }
        }
        if !(0.0..=1.0).contains(&self.aggressive_probability) {
            return invalid(format!(
                "flow.aggressive_probability must be within [0, 1], got {}",
                self.aggressive_probability
            ));
        }
        if !(self.price_noise.is_finite() && self.price_noise >= 0.0) {
            return invalid("flow.price_noise must be non-negative".into());
        }
        if !(self.bid_offset > 0.0 && self.ask_offset > 0.0) {
            return invalid("flow offsets must be positive".into());
        }
        if self.stale_threshold <= Decimal::ZERO {
            return invalid("flow.stale_threshold must be positive".into());
        }
        Ok(())
    }
}

fn invalid<T>(message: String) -> Result<T> {
    Err(Error::Config(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dt(), 0.02);
        assert_eq!(config.flow.stale_threshold, dec!(0.03));
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = SimConfig::from_json(
            r#"{
                "num_steps": 200,
                "seed": 7,
                "maker": {
                    "size": 30,
                    "strategy": { "kind": "fixed_spread", "spread": "0.10" },
                    "cancel_scope": "level"
                },
                "flow": { "market_order_count": { "start": 2, "end": 4 } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.num_steps, 200);
        assert_eq!(config.seed, 7);
        assert_eq!(config.maker.size, 30);
        assert_eq!(config.maker.strategy, StrategyKind::FixedSpread { spread: dec!(0.10) });
        assert_eq!(config.maker.cancel_scope, CancelScope::Level);
        assert_eq!(config.flow.market_order_count, 2..4);
        assert_eq!(config.flow.bid_count, 10..20);
        assert_eq!(config.gbm.sigma, 0.15);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(SimConfig::from_json(r#"{ "maker": { "size": 0 } }"#).is_err());
        assert!(SimConfig::from_json(r#"{ "initial_price": -5.0 }"#).is_err());
        assert!(
            SimConfig::from_json(r#"{ "flow": { "aggressive_probability": 1.5 } }"#).is_err()
        );
        assert!(
            SimConfig::from_json(r#"{ "flow": { "order_size": { "start": 5, "end": 5 } } }"#)
                .is_err()
        );
        assert!(SimConfig::from_json("not json").is_err());
    }

    #[test]
    fn from_file_loads_and_validates() {
        let path = std::env::temp_dir().join(format!("mmsim-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "num_steps": 12, "flow": { "expire_through_reference": true } }"#,
        )
        .unwrap();

        let loaded = SimConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.num_steps, 12);
        assert!(config.flow.expire_through_reference);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn from_file_reports_a_missing_file() {
        let path = std::env::temp_dir().join("mmsim-config-does-not-exist.json");

        assert!(matches!(SimConfig::from_file(&path), Err(Error::Io(_))));
    }
}
