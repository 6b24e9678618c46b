//! Backtest engine: event-driven replay of historical quotes.

use alpaca_core::types::{
    ExecutedTrade, PortfolioSnapshot, Quote, SignalType, TradeSide, TradeSignal,
};
use alpaca_core::{CostParameters, Settings};
use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::costs::TransactionCostModel;
use crate::ledger::PortfolioLedger;
use crate::metrics;
use crate::strategy::SignalSource;

/// Historical quote series per symbol, fully materialized before a run.
pub type HistoricalData = HashMap<String, Vec<Quote>>;

/// Configuration for the backtest engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktesterConfig {
    /// Starting cash.
    pub initial_capital: Decimal,
    /// Fraction of cash a single auto-sized trade may consume.
    pub max_position_pct: Decimal,
    /// Transaction cost parameters.
    pub costs: CostParameters,
}

impl Default for BacktesterConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::new(100000, 0),
            max_position_pct: Decimal::new(10, 2), // 10%
            costs: CostParameters::default(),
        }
    }
}

impl From<&Settings> for BacktesterConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            initial_capital: settings.initial_capital,
            max_position_pct: settings.max_position_pct,
            costs: settings.costs.clone(),
        }
    }
}

/// Result of one backtest run, read-only once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResults {
    /// Strategy that produced the run.
    pub strategy_id: String,
    /// First date of the requested range.
    pub start_date: NaiveDate,
    /// Last date of the requested range.
    pub end_date: NaiveDate,
    /// Number of simulated trading dates.
    pub trading_days: usize,
    /// Starting cash.
    pub initial_capital: Decimal,
    /// Portfolio value at the final snapshot.
    pub final_value: Decimal,
    /// Absolute return.
    pub total_return: Decimal,
    /// Fractional return.
    pub total_return_pct: f64,
    /// Compound annual growth rate.
    pub annualized_return: f64,
    /// Maximum peak-to-trough decline.
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Annualized Sortino ratio.
    pub sortino_ratio: f64,
    /// Annualized return over max drawdown.
    pub calmar_ratio: f64,
    /// Total return over max drawdown.
    pub recovery_factor: f64,
    /// Fraction of trades classified as wins.
    pub win_rate: f64,
    /// Gross profit over gross loss.
    pub profit_factor: f64,
    /// Trades executed.
    pub total_trades: usize,
    /// Trades classified as wins.
    pub winning_trades: usize,
    /// Trades classified as losses.
    pub losing_trades: usize,
    /// Longest winning streak.
    pub max_consecutive_wins: usize,
    /// Longest losing streak.
    pub max_consecutive_losses: usize,
    /// Total commission paid.
    pub total_commission: Decimal,
    /// Total slippage cost.
    pub total_slippage: Decimal,
    /// Total market impact cost.
    pub total_market_impact: Decimal,
    /// Full trade log, in execution order.
    pub trades: Vec<ExecutedTrade>,
    /// Full snapshot history, one per simulated date.
    pub snapshots: Vec<PortfolioSnapshot>,
    /// When the results were computed.
    pub computed_at: DateTime<Utc>,
}

impl BacktestResults {
    /// Whether the run ended above its starting capital.
    pub fn is_profitable(&self) -> bool {
        self.final_value > self.initial_capital
    }
}

/// The backtest engine.
///
/// A single run is strictly sequential: per date, positions are marked to
/// market, the strategy is asked for signals, accepted signals are sized and
/// executed, and the strategy absorbs the day's state, in that order.
pub struct Backtester {
    config: BacktesterConfig,
    costs: TransactionCostModel,
}

struct SeriesCursor<'a> {
    symbol: String,
    quotes: Vec<&'a Quote>,
    cursor: usize,
}

impl Backtester {
    /// Create an engine from configuration.
    pub fn new(config: BacktesterConfig) -> Self {
        let costs = TransactionCostModel::new(config.costs.clone());
        Self { config, costs }
    }

    /// Engine configuration.
    pub fn config(&self) -> &BacktesterConfig {
        &self.config
    }

    /// Run a backtest over `[start_date, end_date]`.
    ///
    /// Validation failures abort the run with an error; per-date data gaps
    /// and unaffordable signals are logged and skipped.
    pub async fn run<S>(
        &self,
        strategy: &mut S,
        data: &HistoricalData,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BacktestResults>
    where
        S: SignalSource + ?Sized,
    {
        self.validate_inputs(data, start_date, end_date)?;

        info!(
            strategy = strategy.id(),
            %start_date,
            %end_date,
            "Starting backtest"
        );

        let dates: Vec<NaiveDate> = data
            .values()
            .flatten()
            .map(|q| q.timestamp.date_naive())
            .filter(|d| *d >= start_date && *d <= end_date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if dates.is_empty() {
            bail!("no trading dates in range {} to {}", start_date, end_date);
        }

        let mut series: Vec<SeriesCursor> = data
            .iter()
            .map(|(symbol, quotes)| {
                let mut refs: Vec<&Quote> = quotes.iter().collect();
                refs.sort_by_key(|q| q.timestamp);
                SeriesCursor {
                    symbol: symbol.clone(),
                    quotes: refs,
                    cursor: 0,
                }
            })
            .collect();
        series.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut ledger = PortfolioLedger::new(self.config.initial_capital);
        let mut history: HistoricalData = HashMap::new();

        for date in &dates {
            let mut day_quotes: HashMap<String, Quote> = HashMap::new();
            for sc in series.iter_mut() {
                while sc.cursor < sc.quotes.len()
                    && sc.quotes[sc.cursor].timestamp.date_naive() <= *date
                {
                    let quote = sc.quotes[sc.cursor];
                    if quote.timestamp.date_naive() == *date {
                        day_quotes.insert(sc.symbol.clone(), quote.clone());
                    }
                    history
                        .entry(sc.symbol.clone())
                        .or_default()
                        .push(quote.clone());
                    sc.cursor += 1;
                }
            }

            let snapshot = ledger.mark_to_market(&day_quotes, *date);

            let signals = strategy
                .generate_signals(&day_quotes, &snapshot, &history)
                .await?;

            let timestamp = date.and_time(NaiveTime::MIN).and_utc();
            for signal in &signals {
                if signal.signal_type == SignalType::Hold {
                    continue;
                }
                if !strategy.validate_signal(signal) {
                    debug!(symbol = %signal.symbol, "Signal rejected by strategy validation");
                    continue;
                }
                self.execute_signal(signal, &mut ledger, &day_quotes, timestamp, strategy.id());
            }

            let end_of_day = ledger.snapshot_now(timestamp);
            strategy.update_state(&day_quotes, &end_of_day).await?;
        }

        let results = self.build_results(strategy.id(), &ledger, start_date, end_date);

        info!(
            strategy = strategy.id(),
            return_pct = results.total_return_pct,
            sharpe = results.sharpe_ratio,
            trades = results.total_trades,
            "Backtest completed"
        );

        Ok(results)
    }

    /// Run several strategies over the same data and rank them by Sharpe.
    ///
    /// A strategy whose run fails is logged and omitted from the ranking.
    pub async fn compare(
        &self,
        strategies: &mut [Box<dyn SignalSource>],
        data: &HistoricalData,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BacktestResults>> {
        let mut results = Vec::new();

        for strategy in strategies.iter_mut() {
            match self.run(strategy.as_mut(), data, start_date, end_date).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(strategy = strategy.id(), error = %e, "Strategy backtest failed");
                }
            }
        }

        results.sort_by(|a, b| {
            b.sharpe_ratio
                .partial_cmp(&a.sharpe_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    // Private methods

    fn validate_inputs(
        &self,
        data: &HistoricalData,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<()> {
        if data.is_empty() {
            bail!("historical data is empty");
        }
        for (symbol, quotes) in data {
            if quotes.is_empty() {
                bail!("quote series for {} is empty", symbol);
            }
        }
        if start_date >= end_date {
            bail!(
                "start date {} must be before end date {}",
                start_date,
                end_date
            );
        }
        if self.config.initial_capital <= Decimal::ZERO {
            bail!(
                "initial capital must be positive, got {}",
                self.config.initial_capital
            );
        }

        let data_start = data
            .values()
            .flatten()
            .map(|q| q.timestamp.date_naive())
            .min();
        let data_end = data
            .values()
            .flatten()
            .map(|q| q.timestamp.date_naive())
            .max();
        if let (Some(first), Some(last)) = (data_start, data_end) {
            if start_date < first || end_date > last {
                warn!(
                    %start_date,
                    %end_date,
                    data_start = %first,
                    data_end = %last,
                    "Requested range exceeds available data span"
                );
            }
        }

        Ok(())
    }

    fn execute_signal(
        &self,
        signal: &TradeSignal,
        ledger: &mut PortfolioLedger,
        day_quotes: &HashMap<String, Quote>,
        timestamp: DateTime<Utc>,
        fallback_strategy_id: &str,
    ) {
        let Some(quote) = day_quotes.get(&signal.symbol) else {
            debug!(symbol = %signal.symbol, "No quote for signal today, skipping");
            return;
        };

        let side = match signal.signal_type {
            SignalType::Buy => TradeSide::Buy,
            SignalType::Sell => TradeSide::Sell,
            SignalType::Hold => return,
        };

        let touch = match side {
            TradeSide::Buy => quote.ask,
            TradeSide::Sell => quote.bid,
        };
        if touch <= Decimal::ZERO {
            debug!(symbol = %signal.symbol, "Non-positive quoted price, skipping");
            return;
        }

        let requested = match signal.quantity {
            Some(quantity) => quantity,
            None => {
                let strength = Decimal::from_f64(signal.strength).unwrap_or(Decimal::ZERO);
                let target = ledger.cash() * self.config.max_position_pct * strength;
                (target / touch).floor().to_i64().unwrap_or(0)
            }
        };
        if requested <= 0 {
            debug!(symbol = %signal.symbol, "Signal sized to zero quantity, skipping");
            return;
        }

        let spread = quote.spread();
        let mut quantity = requested;
        let mut price = self.costs.execution_price(side, quote, quantity);
        let mut costs = self.costs.costs_for(price, spread, quantity);

        match side {
            TradeSide::Buy => {
                let cash = ledger.cash();
                let mut total = price * Decimal::from(quantity) + costs.total();
                while quantity >= 1 && total > cash {
                    let per_share = total / Decimal::from(quantity);
                    let fit = (cash / per_share).floor().to_i64().unwrap_or(0);
                    quantity = fit.min(quantity - 1);
                    if quantity < 1 {
                        break;
                    }
                    price = self.costs.execution_price(side, quote, quantity);
                    costs = self.costs.costs_for(price, spread, quantity);
                    total = price * Decimal::from(quantity) + costs.total();
                }
                if quantity < 1 || total > cash {
                    debug!(
                        symbol = %signal.symbol,
                        requested,
                        cash = %cash,
                        "Buy unaffordable even after shrinking, skipping"
                    );
                    return;
                }
                if quantity < requested {
                    debug!(
                        symbol = %signal.symbol,
                        requested,
                        filled = quantity,
                        "Shrank buy to largest affordable quantity"
                    );
                }
            }
            TradeSide::Sell => {
                if price * Decimal::from(quantity) < costs.total() {
                    debug!(
                        symbol = %signal.symbol,
                        "Sell proceeds below transaction costs, skipping"
                    );
                    return;
                }
            }
        }

        let strategy_id = signal.strategy_id().unwrap_or(fallback_strategy_id);
        let trade = ledger.execute_trade(
            &signal.symbol,
            side,
            quantity,
            price,
            costs,
            timestamp,
            strategy_id,
            signal.strength,
        );
        debug!(
            symbol = %trade.symbol,
            side = ?trade.side,
            quantity = trade.quantity,
            price = %trade.fill_price,
            "Executed trade"
        );
    }

    fn build_results(
        &self,
        strategy_id: &str,
        ledger: &PortfolioLedger,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BacktestResults {
        let snapshots = ledger.snapshots();
        let trades = ledger.trades();

        let equity: Vec<Decimal> = snapshots.iter().map(|s| s.total_value).collect();
        let final_value = equity
            .last()
            .copied()
            .unwrap_or(self.config.initial_capital);
        let total_return = final_value - self.config.initial_capital;
        let total_return_pct = ((final_value / self.config.initial_capital) - Decimal::ONE)
            .to_f64()
            .unwrap_or(0.0);

        let calendar_days = (end_date - start_date).num_days();
        let annualized_return = metrics::annualized_return(total_return_pct, calendar_days);

        let returns = metrics::period_returns(&equity);
        let max_drawdown = metrics::max_drawdown(&equity);
        let (sharpe_ratio, sortino_ratio) = metrics::sharpe_sortino(&returns);
        let calmar_ratio = metrics::calmar_ratio(annualized_return, max_drawdown);
        let recovery_factor = metrics::recovery_factor(total_return_pct, max_drawdown);

        // Simplified classification: every sell realizes profit, every buy
        // is a cost. True round-trip lot matching is a known alternative.
        let winning_trades = trades.iter().filter(|t| t.side == TradeSide::Sell).count();
        let losing_trades = trades.len() - winning_trades;
        let gross_profit: Decimal = trades
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .map(|t| t.net_amount())
            .sum();
        let gross_loss: Decimal = trades
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| t.net_amount())
            .sum();

        let win_rate = if trades.is_empty() {
            0.0
        } else {
            winning_trades as f64 / trades.len() as f64
        };
        let profit_factor = if gross_loss > Decimal::ZERO {
            (gross_profit / gross_loss).to_f64().unwrap_or(0.0)
        } else if gross_profit > Decimal::ZERO {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_consecutive_wins, max_consecutive_losses) =
            metrics::consecutive_streaks(trades);

        BacktestResults {
            strategy_id: strategy_id.to_string(),
            start_date,
            end_date,
            trading_days: snapshots.len(),
            initial_capital: self.config.initial_capital,
            final_value,
            total_return,
            total_return_pct,
            annualized_return,
            max_drawdown,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            recovery_factor,
            win_rate,
            profit_factor,
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            max_consecutive_wins,
            max_consecutive_losses,
            total_commission: trades.iter().map(|t| t.commission).sum(),
            total_slippage: trades.iter().map(|t| t.slippage).sum(),
            total_market_impact: trades.iter().map(|t| t.market_impact).sum(),
            trades: trades.to_vec(),
            snapshots: snapshots.to_vec(),
            computed_at: Utc::now(),
        }
    }
}
