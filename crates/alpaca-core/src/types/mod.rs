//! Shared domain types for quotes, positions, signals, and trades.

pub mod portfolio;
pub mod position;
pub mod quote;
pub mod signal;
pub mod trade;

pub use portfolio::PortfolioSnapshot;
pub use position::Position;
pub use quote::Quote;
pub use signal::{SignalType, TradeSignal};
pub use trade::{ExecutedTrade, TradeSide};
