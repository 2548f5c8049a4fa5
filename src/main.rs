use mmsim::{Result, config::SimConfig, simulation::run_simulation};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("MMSIM_CONFIG") {
        Ok(path) => {
            info!(%path, "loading config");
            SimConfig::from_file(path)?
        }
        Err(_) => SimConfig::default(),
    };

    let report = run_simulation(&config)?;

    let prices = report.prices();
    let pnls = report.total_pnls();
    if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
        let max_pnl = pnls.iter().max().copied().unwrap_or_default();
        let min_pnl = pnls.iter().min().copied().unwrap_or_default();
        info!(
            steps = prices.len(),
            first_price = first,
            last_price = last,
            %min_pnl,
            %max_pnl,
            "summary"
        );
    }

    Ok(())
}
