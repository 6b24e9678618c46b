//! Executed trade records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// An immutable record of one executed trade.
///
/// Created exactly once per executed signal and appended to the run's trade
/// log in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    /// Trade identifier.
    pub id: Uuid,
    /// Execution timestamp.
    pub timestamp: DateTime<Utc>,
    /// Ticker symbol.
    pub symbol: String,
    /// Trade side.
    pub side: TradeSide,
    /// Filled share quantity (always positive).
    pub quantity: i64,
    /// Price actually achieved, including slippage adjustment.
    pub fill_price: Decimal,
    /// Commission charged.
    pub commission: Decimal,
    /// Slippage cost.
    pub slippage: Decimal,
    /// Market impact cost.
    pub market_impact: Decimal,
    /// Strategy that originated the trade.
    pub strategy_id: String,
    /// Strength of the originating signal.
    pub signal_strength: f64,
}

impl ExecutedTrade {
    /// Sum of commission, slippage, and market impact.
    pub fn total_cost(&self) -> Decimal {
        self.commission + self.slippage + self.market_impact
    }

    /// Cash moved by this trade: cost outlay for buys, net proceeds for sells.
    pub fn net_amount(&self) -> Decimal {
        let gross = self.fill_price * Decimal::from(self.quantity);
        match self.side {
            TradeSide::Buy => gross + self.total_cost(),
            TradeSide::Sell => gross - self.total_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(side: TradeSide) -> ExecutedTrade {
        ExecutedTrade {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            symbol: "AAPL".to_string(),
            side,
            quantity: 100,
            fill_price: Decimal::new(150, 0),
            commission: Decimal::ONE,
            slippage: Decimal::new(50, 2),
            market_impact: Decimal::new(25, 2),
            strategy_id: "momentum".to_string(),
            signal_strength: 0.8,
        }
    }

    #[test]
    fn test_total_cost() {
        assert_eq!(trade(TradeSide::Buy).total_cost(), Decimal::new(175, 2));
    }

    #[test]
    fn test_net_amount_buy_adds_costs() {
        // 100 x 150 + 1.75
        assert_eq!(
            trade(TradeSide::Buy).net_amount(),
            Decimal::new(1500175, 2)
        );
    }

    #[test]
    fn test_net_amount_sell_subtracts_costs() {
        // 100 x 150 - 1.75
        assert_eq!(
            trade(TradeSide::Sell).net_amount(),
            Decimal::new(1499825, 2)
        );
    }
}
