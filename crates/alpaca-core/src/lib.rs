//! Alpaca Core Library
//!
//! Shared domain types and configuration for the trading automation toolkit.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CostParameters, MonteCarloSettings, Settings, WalkForwardSettings};
pub use error::{Error, Result};
pub use types::{
    ExecutedTrade, PortfolioSnapshot, Position, Quote, SignalType, TradeSide, TradeSignal,
};
