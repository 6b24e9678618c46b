//! Portfolio value snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Position;

/// An immutable snapshot of portfolio state at one simulated date.
///
/// Snapshots are appended to a chronological history, one per date, with
/// strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Snapshot timestamp.
    pub timestamp: DateTime<Utc>,
    /// Cash plus the sum of all position market values.
    pub total_value: Decimal,
    /// Available cash.
    pub buying_power: Decimal,
    /// Aggregate value change since the previous snapshot.
    pub day_pnl: Decimal,
    /// Total value minus initial capital.
    pub total_pnl: Decimal,
    /// Open positions, ordered by symbol.
    pub positions: Vec<Position>,
}

impl PortfolioSnapshot {
    /// Look up a position by symbol.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Signed share quantity held in a symbol, zero when flat.
    pub fn quantity(&self, symbol: &str) -> i64 {
        self.position(symbol).map(|p| p.quantity).unwrap_or(0)
    }
}
