//! Strategy interface and registry.
//!
//! A strategy is any [`SignalSource`]: once per simulated date the engine
//! asks it for signals, filters them through its own validation, and feeds
//! back the day's market data and portfolio state.

pub mod mean_reversion;
pub mod momentum;

use alpaca_core::types::{PortfolioSnapshot, Quote, TradeSignal};
use alpaca_core::Error;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};

/// A producer of trade signals, driven once per simulated date.
///
/// The engine calls `generate_signals`, executes the accepted signals, then
/// calls `update_state` with the day's market data and the resulting
/// portfolio state, in that order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalSource: Send {
    /// Stable identifier recorded on every signal and trade.
    fn id(&self) -> &str;

    /// Produce zero or more signals for the current date.
    async fn generate_signals(
        &mut self,
        quotes: &HashMap<String, Quote>,
        portfolio: &PortfolioSnapshot,
        history: &HashMap<String, Vec<Quote>>,
    ) -> Result<Vec<TradeSignal>>;

    /// Whether a signal is acceptable for execution.
    fn validate_signal(&self, signal: &TradeSignal) -> bool {
        !signal.symbol.is_empty()
            && (0.0..=1.0).contains(&signal.strength)
            && signal.quantity.map_or(true, |q| q > 0)
    }

    /// Absorb the day's market data and post-execution portfolio state.
    async fn update_state(
        &mut self,
        quotes: &HashMap<String, Quote>,
        portfolio: &PortfolioSnapshot,
    ) -> Result<()>;
}

/// Factory producing a fresh, independent strategy instance.
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn SignalSource> + Send + Sync>;

/// Explicit strategy lookup table.
///
/// Constructed and owned by the composition root and passed by reference to
/// whatever needs strategy creation; there is no ambient global registry.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: DashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in strategies.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("momentum", || {
            Box::new(MomentumStrategy::new(MomentumConfig::default()))
        });
        registry.register("mean_reversion", || {
            Box::new(MeanReversionStrategy::new(MeanReversionConfig::default()))
        });
        registry
    }

    /// Register a strategy factory under an id, replacing any previous entry.
    pub fn register<F>(&self, id: &str, factory: F)
    where
        F: Fn() -> Box<dyn SignalSource> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Arc::new(factory));
    }

    /// Instantiate a fresh strategy by id.
    pub fn create(&self, id: &str) -> alpaca_core::Result<Box<dyn SignalSource>> {
        self.factories
            .get(id)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownStrategy(id.to_string()))
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// All registered ids.
    pub fn ids(&self) -> Vec<String> {
        self.factories.iter().map(|e| e.key().clone()).collect()
    }
}
