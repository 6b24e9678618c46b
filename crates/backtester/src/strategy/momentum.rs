//! Momentum strategy: buys strength into rising prices, exits on reversal.

use alpaca_core::types::{PortfolioSnapshot, Quote, TradeSignal};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

use crate::strategy::SignalSource;

/// Configuration for the momentum strategy.
#[derive(Debug, Clone)]
pub struct MomentumConfig {
    /// Number of prior marks the momentum is measured over.
    pub lookback: usize,
    /// Fractional rise over the lookback that triggers an entry.
    pub entry_threshold: f64,
    /// Fractional fall over the lookback that triggers an exit.
    pub exit_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            entry_threshold: 0.02,
            exit_threshold: 0.01,
        }
    }
}

/// Trend-following signal source over a rolling mid-price history.
pub struct MomentumStrategy {
    config: MomentumConfig,
    mids: HashMap<String, Vec<Decimal>>,
}

impl MomentumStrategy {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            mids: HashMap::new(),
        }
    }

    fn momentum(&self, symbol: &str, current: Decimal) -> Option<f64> {
        let history = self.mids.get(symbol)?;
        if history.len() < self.config.lookback {
            return None;
        }

        let base = history[history.len() - self.config.lookback];
        if base == Decimal::ZERO {
            return None;
        }
        ((current - base) / base).to_f64()
    }
}

#[async_trait]
impl SignalSource for MomentumStrategy {
    fn id(&self) -> &str {
        "momentum"
    }

    async fn generate_signals(
        &mut self,
        quotes: &HashMap<String, Quote>,
        portfolio: &PortfolioSnapshot,
        _history: &HashMap<String, Vec<Quote>>,
    ) -> Result<Vec<TradeSignal>> {
        let mut symbols: Vec<&String> = quotes.keys().collect();
        symbols.sort();

        let mut signals = Vec::new();
        for symbol in symbols {
            let quote = &quotes[symbol];
            let Some(momentum) = self.momentum(symbol, quote.mid_price()) else {
                continue;
            };

            let held = portfolio.quantity(symbol);
            if held > 0 && momentum <= -self.config.exit_threshold {
                debug!(symbol = %symbol, momentum, "Momentum exit");
                signals.push(
                    TradeSignal::sell(symbol, 1.0, self.id()).with_quantity(held),
                );
            } else if held == 0 && momentum >= self.config.entry_threshold {
                let strength = momentum / (2.0 * self.config.entry_threshold);
                debug!(symbol = %symbol, momentum, "Momentum entry");
                signals.push(TradeSignal::buy(symbol, strength, self.id()));
            }
        }

        Ok(signals)
    }

    async fn update_state(
        &mut self,
        quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
    ) -> Result<()> {
        for (symbol, quote) in quotes {
            let history = self.mids.entry(symbol.clone()).or_default();
            history.push(quote.mid_price());

            let max_history = self.config.lookback * 2;
            if history.len() > max_history {
                history.remove(0);
            }
        }
        Ok(())
    }
}
