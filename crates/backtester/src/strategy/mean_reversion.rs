//! Mean reversion strategy: buys deep below the rolling mean, exits on recovery.

use alpaca_core::types::{PortfolioSnapshot, Quote, TradeSignal};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;
use tracing::debug;

use crate::strategy::SignalSource;

/// Configuration for the mean reversion strategy.
#[derive(Debug, Clone)]
pub struct MeanReversionConfig {
    /// Rolling window the mean and deviation are computed over.
    pub lookback: usize,
    /// Z-score at or below which an entry triggers.
    pub entry_z_score: f64,
    /// Z-score at or above which a held position exits.
    pub exit_z_score: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            entry_z_score: 2.0,
            exit_z_score: 0.0,
        }
    }
}

/// Counter-trend signal source over the engine-supplied quote history.
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        Self { config }
    }

    fn z_score(&self, history: &[Quote], current_mid: f64) -> Option<f64> {
        if history.len() < self.config.lookback {
            return None;
        }

        let window: Vec<f64> = history[history.len() - self.config.lookback..]
            .iter()
            .filter_map(|q| q.mid_price().to_f64())
            .collect();
        if window.len() < self.config.lookback {
            return None;
        }

        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let variance =
            window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / window.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return None;
        }

        Some((current_mid - mean) / std_dev)
    }
}

#[async_trait]
impl SignalSource for MeanReversionStrategy {
    fn id(&self) -> &str {
        "mean_reversion"
    }

    async fn generate_signals(
        &mut self,
        quotes: &HashMap<String, Quote>,
        portfolio: &PortfolioSnapshot,
        history: &HashMap<String, Vec<Quote>>,
    ) -> Result<Vec<TradeSignal>> {
        let mut symbols: Vec<&String> = quotes.keys().collect();
        symbols.sort();

        let mut signals = Vec::new();
        for symbol in symbols {
            let quote = &quotes[symbol];
            let Some(mid) = quote.mid_price().to_f64() else {
                continue;
            };
            let Some(series) = history.get(symbol) else {
                continue;
            };
            let Some(z) = self.z_score(series, mid) else {
                continue;
            };

            let held = portfolio.quantity(symbol);
            if held == 0 && z <= -self.config.entry_z_score {
                let strength = -z / (2.0 * self.config.entry_z_score);
                debug!(symbol = %symbol, z_score = z, "Mean reversion entry");
                signals.push(TradeSignal::buy(symbol, strength, self.id()));
            } else if held > 0 && z >= self.config.exit_z_score {
                debug!(symbol = %symbol, z_score = z, "Mean reversion exit");
                signals.push(
                    TradeSignal::sell(symbol, 1.0, self.id()).with_quantity(held),
                );
            }
        }

        Ok(signals)
    }

    async fn update_state(
        &mut self,
        _quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpaca_core::types::{Position, SignalType};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn quote(symbol: &str, price: Decimal, offset_days: i64) -> Quote {
        Quote::new(
            symbol,
            Utc::now() + Duration::days(offset_days),
            price,
            price,
        )
    }

    fn history_around(symbol: &str, base: i64, len: usize) -> Vec<Quote> {
        // Alternate one dollar around the base so the deviation is non-zero
        (0..len)
            .map(|i| {
                let price = if i % 2 == 0 { base + 1 } else { base - 1 };
                quote(symbol, Decimal::new(price, 0), i as i64)
            })
            .collect()
    }

    fn flat_portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp: Utc::now(),
            total_value: Decimal::new(100000, 0),
            buying_power: Decimal::new(100000, 0),
            day_pnl: Decimal::ZERO,
            total_pnl: Decimal::ZERO,
            positions: vec![],
        }
    }

    #[tokio::test]
    async fn test_buy_far_below_mean() {
        let mut strategy = MeanReversionStrategy::new(MeanReversionConfig::default());
        let history = HashMap::from([("AAPL".to_string(), history_around("AAPL", 100, 20))]);
        // Mean 100, std 1: a price of 90 is z = -10
        let quotes = HashMap::from([("AAPL".to_string(), quote("AAPL", Decimal::new(90, 0), 21))]);

        let signals = strategy
            .generate_signals(&quotes, &flat_portfolio(), &history)
            .await
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::Buy);
        assert_eq!(signals[0].strength, 1.0);
    }

    #[tokio::test]
    async fn test_sell_on_recovery_when_holding() {
        let mut strategy = MeanReversionStrategy::new(MeanReversionConfig::default());
        let history = HashMap::from([("AAPL".to_string(), history_around("AAPL", 100, 20))]);
        let quotes =
            HashMap::from([("AAPL".to_string(), quote("AAPL", Decimal::new(103, 0), 21))]);

        let mut portfolio = flat_portfolio();
        portfolio
            .positions
            .push(Position::open("AAPL", 25, Decimal::new(95, 0)));

        let signals = strategy
            .generate_signals(&quotes, &portfolio, &history)
            .await
            .unwrap();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::Sell);
        assert_eq!(signals[0].quantity, Some(25));
    }

    #[tokio::test]
    async fn test_no_signal_without_enough_history() {
        let mut strategy = MeanReversionStrategy::new(MeanReversionConfig::default());
        let history = HashMap::from([("AAPL".to_string(), history_around("AAPL", 100, 5))]);
        let quotes = HashMap::from([("AAPL".to_string(), quote("AAPL", Decimal::new(90, 0), 6))]);

        let signals = strategy
            .generate_signals(&quotes, &flat_portfolio(), &history)
            .await
            .unwrap();
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_flat_series_yields_no_signal() {
        let mut strategy = MeanReversionStrategy::new(MeanReversionConfig::default());
        let flat: Vec<Quote> = (0..20)
            .map(|i| quote("AAPL", Decimal::new(100, 0), i))
            .collect();
        let history = HashMap::from([("AAPL".to_string(), flat)]);
        let quotes =
            HashMap::from([("AAPL".to_string(), quote("AAPL", Decimal::new(100, 0), 21))]);

        let signals = strategy
            .generate_signals(&quotes, &flat_portfolio(), &history)
            .await
            .unwrap();
        assert!(signals.is_empty());
    }
}
