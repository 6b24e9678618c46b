//! Alpaca-Quant: Trading Automation and Backtesting Toolkit
//!
//! This is the root crate that provides benchmark access to the internal modules.
//! For actual functionality, use the individual crates directly:
//!
//! - `alpaca-core`: Shared domain types and configuration
//! - `backtester`: Historical simulation, walk-forward and Monte Carlo analysis

// Re-export for benchmarks
pub use alpaca_core as core;
pub use backtester;
