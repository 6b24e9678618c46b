//! Trade signals emitted by strategies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the originating strategy id.
pub const STRATEGY_KEY: &str = "strategy";

/// Recommended action for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

/// A strategy's recommendation for one symbol on one simulated date.
///
/// Consumed once per date; signals are only persisted if they result in an
/// executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Ticker symbol.
    pub symbol: String,
    /// Recommended action.
    pub signal_type: SignalType,
    /// Confidence in [0, 1].
    pub strength: f64,
    /// Explicit share quantity, if the strategy sizes its own trades.
    pub quantity: Option<i64>,
    /// Optional limit price.
    pub limit_price: Option<Decimal>,
    /// Free-form metadata; always includes the originating strategy id.
    pub metadata: HashMap<String, String>,
}

impl TradeSignal {
    /// Create a signal, clamping strength to [0, 1].
    pub fn new(symbol: &str, signal_type: SignalType, strength: f64, strategy_id: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(STRATEGY_KEY.to_string(), strategy_id.to_string());

        Self {
            symbol: symbol.to_string(),
            signal_type,
            strength: strength.clamp(0.0, 1.0),
            quantity: None,
            limit_price: None,
            metadata,
        }
    }

    /// Create a buy signal.
    pub fn buy(symbol: &str, strength: f64, strategy_id: &str) -> Self {
        Self::new(symbol, SignalType::Buy, strength, strategy_id)
    }

    /// Create a sell signal.
    pub fn sell(symbol: &str, strength: f64, strategy_id: &str) -> Self {
        Self::new(symbol, SignalType::Sell, strength, strategy_id)
    }

    /// Create a hold signal.
    pub fn hold(symbol: &str, strategy_id: &str) -> Self {
        Self::new(symbol, SignalType::Hold, 0.0, strategy_id)
    }

    /// Set an explicit quantity.
    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Set a limit price.
    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    /// The originating strategy id from metadata.
    pub fn strategy_id(&self) -> Option<&str> {
        self.metadata.get(STRATEGY_KEY).map(String::as_str)
    }
}
