//! Transaction cost model: commission, slippage, and market impact.

use alpaca_core::types::{Quote, TradeSide};
use alpaca_core::CostParameters;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost breakdown for a single hypothetical trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeCosts {
    /// Commission charged.
    pub commission: Decimal,
    /// Slippage cost from crossing the spread.
    pub slippage: Decimal,
    /// Market impact cost from the trade's own size.
    pub market_impact: Decimal,
}

impl TradeCosts {
    /// Sum of all cost components.
    pub fn total(&self) -> Decimal {
        self.commission + self.slippage + self.market_impact
    }
}

/// Pure cost calculator over configured [`CostParameters`].
///
/// All inputs are pre-validated non-negative; the model itself has no error
/// conditions and no side effects.
#[derive(Debug, Clone)]
pub struct TransactionCostModel {
    params: CostParameters,
}

impl TransactionCostModel {
    /// Create a cost model from configured parameters.
    pub fn new(params: CostParameters) -> Self {
        Self { params }
    }

    /// Per-trade commission: per-share rate clamped to the configured
    /// floor and ceiling.
    pub fn commission(&self, quantity: i64) -> Decimal {
        (Decimal::from(quantity) * self.params.commission_per_share)
            .max(self.params.commission_min)
            .min(self.params.commission_max)
    }

    /// Slippage cost: the quoted spread, scaled by the configured fraction,
    /// paid on every share.
    pub fn slippage_cost(&self, spread: Decimal, quantity: i64) -> Decimal {
        spread * self.params.spread_cost_fraction * Decimal::from(quantity)
    }

    /// Market impact cost as a fraction of traded notional.
    pub fn market_impact(&self, price: Decimal, quantity: i64) -> Decimal {
        Decimal::from(quantity) * price * self.params.market_impact_fraction
    }

    /// Price achieved on execution.
    ///
    /// Buys fill at the ask plus a quantity-scaled adjustment, sells at the
    /// bid minus it. The adjustment is capped at 1% of the touch price, and a
    /// sell can never fill below zero.
    pub fn execution_price(&self, side: TradeSide, quote: &Quote, quantity: i64) -> Decimal {
        let touch = match side {
            TradeSide::Buy => quote.ask,
            TradeSide::Sell => quote.bid,
        };
        let scale = Decimal::from(quantity) / Decimal::ONE_HUNDRED;
        let adjustment = (touch * self.params.slippage_fraction * scale).min(touch / Decimal::ONE_HUNDRED);

        match side {
            TradeSide::Buy => touch + adjustment,
            TradeSide::Sell => (touch - adjustment).max(Decimal::ZERO),
        }
    }

    /// Full cost breakdown for a trade at the given execution price.
    pub fn costs_for(&self, price: Decimal, spread: Decimal, quantity: i64) -> TradeCosts {
        TradeCosts {
            commission: self.commission(quantity),
            slippage: self.slippage_cost(spread, quantity),
            market_impact: self.market_impact(price, quantity),
        }
    }
}
