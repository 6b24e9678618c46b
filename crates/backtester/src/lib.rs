//! Backtester
//!
//! Historical simulation framework for testing trading strategies against
//! recorded bid/ask quotes.
//!
//! # Features
//!
//! - **SignalSource Trait**: Pluggable strategy interface for custom implementations
//! - **Transaction Cost Model**: Commission, slippage, and market impact modeling
//! - **Backtest Engine**: Event-driven daily replay with full results reduction
//! - **Walk-Forward Runner**: Rolling out-of-sample evaluation windows
//! - **Monte Carlo Runner**: Bootstrap resampling on a bounded worker pool
//!
//! # Example
//!
//! ```ignore
//! use backtester::{Backtester, BacktesterConfig, MomentumConfig, MomentumStrategy};
//!
//! let engine = Backtester::new(BacktesterConfig::default());
//! let mut strategy = MomentumStrategy::new(MomentumConfig::default());
//!
//! let results = engine.run(&mut strategy, &data, start_date, end_date).await?;
//! println!("Return: {:.2}%", results.total_return_pct * 100.0);
//! ```

pub mod costs;
pub mod engine;
pub mod ledger;
pub mod metrics;
pub mod monte_carlo;
pub mod strategy;
pub mod walkforward;

// Re-exports
pub use costs::{TradeCosts, TransactionCostModel};
pub use engine::{Backtester, BacktesterConfig, BacktestResults, HistoricalData};
pub use ledger::PortfolioLedger;
pub use monte_carlo::{MonteCarloReport, MonteCarloRunner, TailRisk};
pub use strategy::{
    MeanReversionConfig, MeanReversionStrategy, MomentumConfig, MomentumStrategy,
    SignalSource, StrategyFactory, StrategyRegistry,
};
pub use walkforward::{WalkForwardReport, WalkForwardRunner, WindowResult};
