//! Portfolio positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position in a single symbol.
///
/// Quantity is signed: positive for long, negative for short. The sign of
/// `market_value` always matches the sign of `quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Ticker symbol (unique per portfolio).
    pub symbol: String,
    /// Signed share quantity.
    pub quantity: i64,
    /// Signed market value (quantity x last mark price).
    pub market_value: Decimal,
    /// Average per-share cost basis.
    pub cost_basis: Decimal,
    /// Unrealized profit and loss versus cost basis.
    pub unrealized_pnl: Decimal,
    /// Change in market value since the previous mark.
    pub day_pnl: Decimal,
}

impl Position {
    /// Open a new position at a fill price.
    pub fn open(symbol: &str, quantity: i64, fill_price: Decimal) -> Self {
        let market_value = Decimal::from(quantity) * fill_price;
        Self {
            symbol: symbol.to_string(),
            quantity,
            market_value,
            cost_basis: fill_price,
            unrealized_pnl: Decimal::ZERO,
            day_pnl: Decimal::ZERO,
        }
    }

    /// Re-mark the position at a new price, returning the value change.
    pub fn mark(&mut self, price: Decimal) -> Decimal {
        let previous = self.market_value;
        self.market_value = Decimal::from(self.quantity) * price;
        self.unrealized_pnl = self.market_value - Decimal::from(self.quantity) * self.cost_basis;
        self.day_pnl = self.market_value - previous;
        self.day_pnl
    }

    /// Whether this is a long position.
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }
}
