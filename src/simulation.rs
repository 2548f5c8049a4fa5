use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    Error, Owner, Result, Side,
    book::{OrderBook, TICK_SIZE},
    config::{FlowConfig, SimConfig},
    market_maker::{MarketMaker, QuoteOutcome},
    price::{Gbm, PriceProcess},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub step: usize,
    pub true_price: f64,
    pub mid_price: Decimal,
    pub inventory: i64,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    /// Maker fills during this tick.
    pub fills: u64,
    pub quoted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub ticks: Vec<TickRecord>,
}

impl SimulationReport {
    /// Reference price per tick.
    pub fn prices(&self) -> Vec<f64> {
        self.ticks.iter().map(|tick| tick.true_price).collect()
    }

    /// Total PnL per tick, parallel to [`Self::prices`].
    pub fn total_pnls(&self) -> Vec<Decimal> {
        self.ticks.iter().map(|tick| tick.total_pnl).collect()
    }

    pub fn last(&self) -> Option<&TickRecord> {
        self.ticks.last()
    }
}

/// Each tick: advance the price process, expire stale levels, inject
/// investor limit orders, requote the maker, then fire random market orders.
pub struct Simulation<P> {
    flow: FlowConfig,
    num_steps: usize,
    book: OrderBook,
    maker: MarketMaker,
    process: P,
    rng: StdRng,
    tick: usize,
}

impl Simulation<Gbm> {
    /// A GBM-driven run over a seeded book, everything drawn from one
    /// `StdRng` seeded with `config.seed`.
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let initial_price = Decimal::from_f64(config.initial_price)
            .ok_or(Error::UnrepresentablePrice(config.initial_price))?
            .round_dp(2);
        let book = OrderBook::seeded(
            initial_price,
            config.seed_levels,
            config.flow.order_size.clone(),
            &mut rng,
        )?;
        let maker = MarketMaker::new(config.maker.strategy.build(), config.maker.size)
            .with_cancel_scope(config.maker.cancel_scope);
        let gbm = Gbm::new(config.initial_price, config.gbm.mu, config.gbm.sigma, config.dt())?;

        Self::new(config, gbm, book, maker, rng)
    }
}

impl<P: PriceProcess> Simulation<P> {
    pub fn new(
        config: &SimConfig,
        process: P,
        book: OrderBook,
        maker: MarketMaker,
        rng: StdRng,
    ) -> Result<Self> {
        config.flow.validate()?;

        Ok(Self {
            flow: config.flow.clone(),
            num_steps: config.num_steps,
            book,
            maker,
            process,
            rng,
            tick: 0,
        })
    }

    /// Runs the remaining ticks up to `num_steps`.
    pub fn run(&mut self) -> Result<SimulationReport> {
        info!(num_steps = self.num_steps, "simulation started");

        let mut report = SimulationReport {
            ticks: Vec::with_capacity(self.num_steps.saturating_sub(self.tick)),
        };
        while self.tick < self.num_steps {
            report.ticks.push(self.step()?);
        }

        if let Some(last) = report.last() {
            info!(
                inventory = last.inventory,
                realized = %last.realized_pnl,
                unrealized = %last.unrealized_pnl,
                total = %last.total_pnl,
                "simulation finished"
            );
        }

        Ok(report)
    }

    pub fn step(&mut self) -> Result<TickRecord> {
        let true_price = self.process.next_price(&mut self.rng);
        if !(true_price.is_finite() && true_price > 0.0) {
            return Err(Error::InvalidPrice(true_price));
        }
        let reference =
            Decimal::from_f64(true_price).ok_or(Error::UnrepresentablePrice(true_price))?;

        self.expire_stale_orders(reference)?;
        self.inject_investor_orders(true_price, Side::Buy)?;
        self.inject_investor_orders(true_price, Side::Sell)?;

        let outcome = self.maker.place_quotes(&mut self.book)?;

        let fills_before = self.maker.fills();
        let count = self.rng.gen_range(self.flow.market_order_count.clone());
        for _ in 0..count {
            let size = self.rng.gen_range(self.flow.market_order_size.clone());
            let side = if self.rng.gen_bool(0.5) {
                Side::Buy
            } else {
                Side::Sell
            };
            self.book
                .execute_market_order(size, side, Some(&mut self.maker))?;
        }

        self.maker
            .mark_to_market(self.book.get_current_market_price());
        let pnl = self.maker.pnl();

        let record = TickRecord {
            step: self.tick,
            true_price,
            mid_price: self.book.mid_price(),
            inventory: self.maker.inventory(),
            realized_pnl: pnl.realized,
            unrealized_pnl: pnl.unrealized,
            total_pnl: pnl.total,
            fills: self.maker.fills() - fills_before,
            quoted: matches!(outcome, QuoteOutcome::Placed { .. }),
        };
        self.tick += 1;

        debug!(
            step = record.step,
            price = record.true_price,
            mid = %record.mid_price,
            inventory = record.inventory,
            total = %record.total_pnl,
            fills = record.fills,
            "tick"
        );

        Ok(record)
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn maker(&self) -> &MarketMaker {
        &self.maker
    }

    pub fn ticks_run(&self) -> usize {
        self.tick
    }

    /// Drops whole levels that have drifted too far from the reference.
    fn expire_stale_orders(&mut self, reference: Decimal) -> Result<()> {
        for side in [Side::Buy, Side::Sell] {
            let stale: Vec<Decimal> = self
                .book
                .prices(side)
                .into_iter()
                .filter(|price| self.is_stale(*price, reference, side))
                .collect();

            for price in stale {
                self.book.cancel_order(price, side)?;
            }
        }
        Ok(())
    }

    fn is_stale(&self, price: Decimal, reference: Decimal, side: Side) -> bool {
        let drifted = ((price - reference) / reference).abs() > self.flow.stale_threshold;
        let through = self.flow.expire_through_reference
            && match side {
                Side::Buy => price >= reference,
                Side::Sell => price <= reference,
            };
        drifted || through
    }

    /// Adds a random batch of investor limit orders on one side. Orders that
    /// would cross the opposite best, or land on a non-positive price, are
    /// dropped rather than clipped.
    fn inject_investor_orders(&mut self, true_price: f64, side: Side) -> Result<()> {
        let (counts, offset) = match side {
            Side::Buy => (self.flow.bid_count.clone(), self.flow.bid_offset),
            Side::Sell => (self.flow.ask_count.clone(), self.flow.ask_offset),
        };
        let count = self.rng.gen_range(counts);
        let prices = Normal::new(true_price * offset, self.flow.price_noise)?;

        for _ in 0..count {
            let draw: f64 = prices.sample(&mut self.rng);
            let size = self.rng.gen_range(self.flow.order_size.clone());
            let aggressive = self.rng.gen_bool(self.flow.aggressive_probability);

            let mut price = Decimal::from_f64(draw)
                .ok_or(Error::UnrepresentablePrice(draw))?
                .round_dp(2);

            if aggressive {
                if let Some(best) = self.book.half(side).best_price() {
                    price = match side {
                        Side::Buy => best + TICK_SIZE,
                        Side::Sell => best - TICK_SIZE,
                    }
                    .round_dp(2);
                }
            }

            let crosses = match side {
                Side::Buy => self.book.best_ask().is_some_and(|ask| price >= ask),
                Side::Sell => self.book.best_bid().is_some_and(|bid| price <= bid),
            };
            if crosses || price <= Decimal::ZERO {
                continue;
            }

            self.book.add_limit_order(price, size, side, Owner::Investor)?;
        }

        Ok(())
    }
}

/// Runs a full GBM-driven simulation from `config`.
pub fn run_simulation(config: &SimConfig) -> Result<SimulationReport> {
    Simulation::from_config(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PriceSeries;
    use rust_decimal_macros::dec;

    fn series_sim(prices: Vec<f64>, num_steps: usize, seed: u64) -> Simulation<PriceSeries> {
        let config = SimConfig {
            num_steps,
            seed,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let book = OrderBook::seeded(dec!(100), 5, 5..20, &mut rng).unwrap();
        Simulation::new(
            &config,
            PriceSeries::new(prices).unwrap(),
            book,
            MarketMaker::default(),
            rng,
        )
        .unwrap()
    }

    #[test]
    fn run_produces_one_record_per_step() {
        let mut sim = series_sim(vec![100.0, 100.2, 99.9], 10, 3);

        let report = sim.run().unwrap();

        assert_eq!(report.ticks.len(), 10);
        assert_eq!(report.prices()[..3], [100.0, 100.2, 99.9]);
        assert_eq!(report.prices().len(), report.total_pnls().len());
        assert_eq!(sim.ticks_run(), 10);
        // already finished
        assert!(sim.run().unwrap().ticks.is_empty());
    }

    #[test]
    fn every_tick_keeps_book_and_pnl_consistent() {
        let mut sim = series_sim(vec![100.0, 100.5, 101.0, 100.3, 99.4, 99.8], 40, 5);

        for _ in 0..40 {
            let record = sim.step().unwrap();
            sim.book().assert_invariants();

            let mark = sim.book().get_current_market_price();
            assert_eq!(
                record.total_pnl,
                record.realized_pnl + Decimal::from(record.inventory) * mark
            );

            let maker = sim.maker();
            let bid = maker.bid_id().and_then(|id| sim.book().order(id));
            let ask = maker.ask_id().and_then(|id| sim.book().order(id));
            if let (Some((_, bid)), Some((_, ask))) = (bid, ask) {
                assert!(bid.price < ask.price);
            }
        }
    }

    #[test]
    fn stale_levels_follow_the_reference() {
        let mut sim = series_sim(vec![100.0, 110.0], 2, 8);
        sim.step().unwrap();
        sim.step().unwrap();

        let reference = dec!(110);
        for side in [Side::Buy, Side::Sell] {
            for price in sim.book().prices(side) {
                assert!(((price - reference) / reference).abs() <= dec!(0.03), "{price}");
            }
        }
    }

    fn through_reference_sim(expire_through_reference: bool) -> Simulation<PriceSeries> {
        let mut config = SimConfig::default();
        config.flow.expire_through_reference = expire_through_reference;

        let mut book = OrderBook::new(dec!(100));
        for (price, side) in [
            (dec!(100.00), Side::Buy),
            (dec!(99.50), Side::Buy),
            (dec!(90.00), Side::Buy),
            (dec!(99.80), Side::Sell),
            (dec!(100.50), Side::Sell),
        ] {
            book.add_limit_order(price, 5, side, Owner::Investor).unwrap();
        }

        Simulation::new(
            &config,
            PriceSeries::new(vec![100.0]).unwrap(),
            book,
            MarketMaker::default(),
            StdRng::seed_from_u64(1),
        )
        .unwrap()
    }

    #[test]
    fn levels_through_the_reference_expire_when_enabled() {
        let mut sim = through_reference_sim(true);

        sim.expire_stale_orders(dec!(100)).unwrap();

        assert_eq!(sim.book().prices(Side::Buy), vec![dec!(99.50)]);
        assert_eq!(sim.book().prices(Side::Sell), vec![dec!(100.50)]);
        sim.book().assert_invariants();
    }

    #[test]
    fn levels_through_the_reference_survive_by_default() {
        let mut sim = through_reference_sim(false);

        sim.expire_stale_orders(dec!(100)).unwrap();

        // only the drifted bid goes
        assert_eq!(sim.book().prices(Side::Buy), vec![dec!(100.00), dec!(99.50)]);
        assert_eq!(sim.book().prices(Side::Sell), vec![dec!(99.80), dec!(100.50)]);
    }

    #[test]
    fn same_seed_same_run() {
        let prices = vec![100.0, 100.1, 100.3, 99.8, 99.7, 100.2];
        let a = series_sim(prices.clone(), 50, 21).run().unwrap();
        let b = series_sim(prices, 50, 21).run().unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn gbm_runs_are_seeded() {
        let config = SimConfig::default();
        let a = run_simulation(&config).unwrap();
        let b = run_simulation(&config).unwrap();
        let c = run_simulation(&SimConfig {
            seed: config.seed + 1,
            ..config.clone()
        })
        .unwrap();

        assert_eq!(a.ticks.len(), 50);
        assert_eq!(a, b);
        assert_ne!(a.prices(), c.prices());
    }

    #[test]
    fn bad_reference_price_aborts_the_run() {
        let mut sim = series_sim(vec![100.0, -1.0], 5, 1);

        assert!(sim.step().is_ok());
        assert!(matches!(sim.step(), Err(Error::InvalidPrice(p)) if p == -1.0));
    }
}
