//! Integration tests for component interactions.
//!
//! These tests drive the backtest engine, walk-forward runner, and Monte
//! Carlo runner through the public crate APIs.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use alpaca_core::types::{PortfolioSnapshot, Quote, TradeSignal};
use alpaca_core::{CostParameters, MonteCarloSettings, Settings, WalkForwardSettings};
use backtester::{
    Backtester, BacktesterConfig, HistoricalData, MonteCarloRunner, SignalSource,
    StrategyRegistry, WalkForwardRunner,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap() + Duration::days(offset)
}

fn flat_series(symbol: &str, price: Decimal, days: i64) -> Vec<Quote> {
    (0..days)
        .map(|d| Quote::new(symbol, day(d), price, price))
        .collect()
}

/// Deterministic wavy price path, no randomness needed.
fn wavy_series(symbol: &str, days: i64) -> Vec<Quote> {
    (0..days)
        .map(|d| {
            let swing = ((d * 37) % 21) - 10; // -10..=10
            let price = Decimal::new(100 + swing, 0);
            Quote::new(symbol, day(d), price, price + Decimal::new(10, 2))
        })
        .collect()
}

fn zero_cost_config(initial_capital: Decimal) -> BacktesterConfig {
    BacktesterConfig {
        initial_capital,
        max_position_pct: Decimal::new(10, 2),
        costs: CostParameters::zero(),
    }
}

/// Strategy that emits a fixed batch of signals on its first date.
struct ScriptedStrategy {
    pending: Vec<TradeSignal>,
}

#[async_trait::async_trait]
impl SignalSource for ScriptedStrategy {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn generate_signals(
        &mut self,
        _quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
        _history: &HashMap<String, Vec<Quote>>,
    ) -> anyhow::Result<Vec<TradeSignal>> {
        Ok(std::mem::take(&mut self.pending))
    }

    async fn update_state(
        &mut self,
        _quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

struct SilentStrategy;

#[async_trait::async_trait]
impl SignalSource for SilentStrategy {
    fn id(&self) -> &str {
        "silent"
    }

    async fn generate_signals(
        &mut self,
        _quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
        _history: &HashMap<String, Vec<Quote>>,
    ) -> anyhow::Result<Vec<TradeSignal>> {
        Ok(vec![])
    }

    async fn update_state(
        &mut self,
        _quotes: &HashMap<String, Quote>,
        _portfolio: &PortfolioSnapshot,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A strategy that never signals leaves capital untouched.
#[tokio::test]
async fn test_silent_strategy_preserves_capital() {
    init_tracing();

    let engine = Backtester::new(zero_cost_config(Decimal::new(100000, 0)));
    let data: HistoricalData = HashMap::from([(
        "AAPL".to_string(),
        flat_series("AAPL", Decimal::new(150, 0), 10),
    )]);

    let results = engine
        .run(
            &mut SilentStrategy,
            &data,
            day(0).date_naive(),
            day(9).date_naive(),
        )
        .await
        .unwrap();

    assert_eq!(results.total_trades, 0);
    assert_eq!(results.final_value, Decimal::new(100000, 0));
    assert_eq!(results.trading_days, 10);
}

/// A single frictionless buy rides a linear rally from 150 to 160.
#[tokio::test]
async fn test_single_buy_in_rising_market() {
    let engine = Backtester::new(zero_cost_config(Decimal::new(100000, 0)));

    let quotes: Vec<Quote> = (0..10)
        .map(|d| {
            let price =
                Decimal::new(150, 0) + Decimal::from(d) * Decimal::new(10, 0) / Decimal::new(9, 0);
            Quote::new("AAPL", day(d), price, price)
        })
        .collect();
    let data: HistoricalData = HashMap::from([("AAPL".to_string(), quotes)]);

    let mut strategy = ScriptedStrategy {
        pending: vec![TradeSignal::buy("AAPL", 1.0, "scripted").with_quantity(100)],
    };
    let results = engine
        .run(&mut strategy, &data, day(0).date_naive(), day(9).date_naive())
        .await
        .unwrap();

    assert_eq!(results.total_trades, 1);
    assert_eq!(results.trades[0].quantity, 100);

    let last = results.snapshots.last().unwrap();
    assert_eq!(
        last.position("AAPL").map(|p| p.market_value),
        Some(Decimal::new(16000, 0))
    );
    assert_eq!(last.buying_power, Decimal::new(85000, 0));
    assert_eq!(last.total_value, Decimal::new(101000, 0));
}

/// Monte Carlo over a never-trading strategy is a degenerate distribution.
#[tokio::test]
async fn test_monte_carlo_never_trading_strategy() {
    init_tracing();

    let registry = StrategyRegistry::new();
    registry.register("silent", || Box::new(SilentStrategy));

    let settings = MonteCarloSettings {
        num_simulations: 10,
        confidence_levels: vec![0.95, 0.99],
        max_concurrency: 4,
        seed: Some(7),
    };
    let runner = MonteCarloRunner::new(settings, zero_cost_config(Decimal::new(100000, 0)));
    let data: Arc<HistoricalData> = Arc::new(HashMap::from([(
        "AAPL".to_string(),
        wavy_series("AAPL", 30),
    )]));

    let report = runner
        .run(
            &registry,
            "silent",
            data,
            day(0).date_naive(),
            day(29).date_naive(),
        )
        .await
        .unwrap();

    assert_eq!(report.successful_simulations, 10);
    assert_eq!(report.mean_return, 0.0);
    for tail in &report.tail_risk {
        assert_eq!(tail.var, 0.0);
        assert_eq!(tail.cvar, 0.0);
    }
}

/// One-month windows stepped monthly across three months test exactly twice.
#[tokio::test]
async fn test_walk_forward_window_count() {
    let runner = WalkForwardRunner::new(
        WalkForwardSettings {
            training_months: 1,
            testing_months: 1,
            step_months: 1,
        },
        zero_cost_config(Decimal::new(100000, 0)),
    );
    let data: HistoricalData = HashMap::from([("AAPL".to_string(), wavy_series("AAPL", 91))]);

    let report = runner
        .run(
            &mut SilentStrategy,
            &data,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(report.windows.len(), 2);
    assert_eq!(report.consistency_ratio, 0.0);
}

/// Identical inputs produce identical results: no hidden randomness in the
/// engine path.
#[tokio::test]
async fn test_backtest_is_deterministic() {
    let registry = StrategyRegistry::with_builtins();
    let engine = Backtester::new(BacktesterConfig::default());
    let data: HistoricalData = HashMap::from([
        ("AAPL".to_string(), wavy_series("AAPL", 60)),
        ("MSFT".to_string(), wavy_series("MSFT", 60)),
    ]);

    let mut first_strategy = registry.create("momentum").unwrap();
    let first = engine
        .run(
            first_strategy.as_mut(),
            &data,
            day(0).date_naive(),
            day(59).date_naive(),
        )
        .await
        .unwrap();

    let mut second_strategy = registry.create("momentum").unwrap();
    let second = engine
        .run(
            second_strategy.as_mut(),
            &data,
            day(0).date_naive(),
            day(59).date_naive(),
        )
        .await
        .unwrap();

    assert_eq!(first.final_value, second.final_value);
    assert_eq!(first.total_trades, second.total_trades);
    assert_eq!(first.total_commission, second.total_commission);
    assert_eq!(first.max_drawdown, second.max_drawdown);
}

/// Ledger identity holds at every snapshot, with realistic costs and trades.
#[tokio::test]
async fn test_snapshot_identity_invariant() {
    let registry = StrategyRegistry::with_builtins();
    let engine = Backtester::new(BacktesterConfig::default());
    let data: HistoricalData = HashMap::from([("AAPL".to_string(), wavy_series("AAPL", 90))]);

    let mut strategy = registry.create("mean_reversion").unwrap();
    let results = engine
        .run(
            strategy.as_mut(),
            &data,
            day(0).date_naive(),
            day(89).date_naive(),
        )
        .await
        .unwrap();

    for snapshot in &results.snapshots {
        let position_value: Decimal = snapshot.positions.iter().map(|p| p.market_value).sum();
        assert_eq!(snapshot.total_value, snapshot.buying_power + position_value);
        assert!(snapshot.buying_power >= Decimal::ZERO);
    }
}

/// Settings wire through to an engine configuration.
#[test]
fn test_settings_build_engine_config() {
    let settings = Settings::default();
    let config = BacktesterConfig::from(&settings);

    assert_eq!(config.initial_capital, settings.initial_capital);
    assert_eq!(config.max_position_pct, settings.max_position_pct);
    assert_eq!(config.costs, settings.costs);
}

/// Strategy comparison ranks every completed run.
#[tokio::test]
async fn test_compare_strategies() {
    let registry = StrategyRegistry::with_builtins();
    let engine = Backtester::new(BacktesterConfig::default());
    let data: HistoricalData = HashMap::from([("AAPL".to_string(), wavy_series("AAPL", 90))]);

    let mut strategies: Vec<Box<dyn SignalSource>> = vec![
        registry.create("momentum").unwrap(),
        registry.create("mean_reversion").unwrap(),
    ];

    let results = engine
        .compare(
            &mut strategies,
            &data,
            day(0).date_naive(),
            day(89).date_naive(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].sharpe_ratio >= results[1].sharpe_ratio);
}
