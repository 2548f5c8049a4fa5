use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::{Error, Result};

/// Source of the reference ("true") price the simulation ticks against.
pub trait PriceProcess {
    /// Advances one step. Must return a finite, strictly positive price.
    fn next_price<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64;
}

/// Geometric Brownian motion:
/// `S *= exp((mu - sigma^2 / 2) * dt + sigma * sqrt(dt) * Z)`.
#[derive(Debug, Clone)]
pub struct Gbm {
    price: f64,
    mu: f64,
    sigma: f64,
    dt: f64,
    history: Vec<f64>,
}

impl Gbm {
    pub fn new(initial_price: f64, mu: f64, sigma: f64, dt: f64) -> Result<Self> {
        if !(initial_price.is_finite() && initial_price > 0.0) {
            return Err(Error::Config(format!(
                "initial price must be positive, got {initial_price}"
            )));
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::Config(format!("dt must be positive, got {dt}")));
        }
        if !(sigma.is_finite() && sigma >= 0.0) || !mu.is_finite() {
            return Err(Error::Config(format!(
                "invalid drift/volatility: mu {mu}, sigma {sigma}"
            )));
        }

        Ok(Self {
            price: initial_price,
            mu,
            sigma,
            dt,
            history: vec![initial_price],
        })
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Every price produced so far, starting with the initial one.
    pub fn history(&self) -> &[f64] {
        &self.history
    }
}

impl PriceProcess for Gbm {
    fn next_price<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        let drift = (self.mu - 0.5 * self.sigma * self.sigma) * self.dt;
        let diffusion = self.sigma * self.dt.sqrt() * z;

        self.price *= (drift + diffusion).exp();
        self.history.push(self.price);
        self.price
    }
}

/// Replays a fixed sequence, then holds its last value.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    prices: Vec<f64>,
    cursor: usize,
}

impl PriceSeries {
    pub fn new(prices: Vec<f64>) -> Result<Self> {
        if prices.is_empty() {
            return Err(Error::Config("price series is empty".into()));
        }
        Ok(Self { prices, cursor: 0 })
    }
}

impl PriceProcess for PriceSeries {
    fn next_price<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> f64 {
        let index = self.cursor.min(self.prices.len() - 1);
        self.cursor += 1;
        self.prices[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn gbm_without_volatility_is_pure_drift() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut gbm = Gbm::new(100.0, 0.05, 0.0, 0.02).unwrap();

        let next = gbm.next_price(&mut rng);

        assert!((next - 100.0 * (0.05f64 * 0.02).exp()).abs() < 1e-9);
        assert_eq!(gbm.history().len(), 2);
    }

    #[test]
    fn gbm_is_reproducible_from_a_seed() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut gbm = Gbm::new(100.0, 0.05, 0.15, 0.02).unwrap();
            (0..50).map(|_| gbm.next_price(&mut rng)).collect::<Vec<_>>()
        };

        assert_eq!(run(9), run(9));
        assert_ne!(run(9), run(10));
        assert!(run(9).iter().all(|p| *p > 0.0));
    }

    #[test]
    fn gbm_rejects_bad_parameters() {
        assert!(Gbm::new(0.0, 0.05, 0.15, 0.02).is_err());
        assert!(Gbm::new(100.0, 0.05, -0.15, 0.02).is_err());
        assert!(Gbm::new(100.0, 0.05, 0.15, 0.0).is_err());
    }

    #[test]
    fn series_holds_its_last_value() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut series = PriceSeries::new(vec![100.0, 101.5]).unwrap();

        assert_eq!(series.next_price(&mut rng), 100.0);
        assert_eq!(series.next_price(&mut rng), 101.5);
        assert_eq!(series.next_price(&mut rng), 101.5);
        assert!(PriceSeries::new(Vec::new()).is_err());
    }
}
