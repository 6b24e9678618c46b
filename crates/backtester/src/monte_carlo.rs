//! Monte Carlo robustness analysis via bootstrap resampling.

use alpaca_core::types::Quote;
use alpaca_core::MonteCarloSettings;
use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::engine::{Backtester, BacktesterConfig, HistoricalData};
use crate::metrics;
use crate::strategy::StrategyRegistry;

/// VaR/CVaR at one confidence level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TailRisk {
    /// Confidence level in (0, 1).
    pub confidence: f64,
    /// Value-at-Risk: the empirical tail percentile of the return
    /// distribution.
    pub var: f64,
    /// Conditional VaR: mean of returns at or beyond the VaR percentile.
    pub cvar: f64,
}

/// Aggregate return/risk distribution across successful simulations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloReport {
    /// Simulations requested.
    pub num_simulations: usize,
    /// Simulations that completed successfully.
    pub successful_simulations: usize,
    /// Mean total return.
    pub mean_return: f64,
    /// Median total return.
    pub median_return: f64,
    /// Standard deviation of total returns.
    pub return_stddev: f64,
    /// Worst total return.
    pub min_return: f64,
    /// Best total return.
    pub max_return: f64,
    /// Mean Sharpe ratio.
    pub mean_sharpe: f64,
    /// Mean maximum drawdown.
    pub mean_drawdown: f64,
    /// Worst maximum drawdown.
    pub worst_drawdown: f64,
    /// Fraction of simulations with a positive return.
    pub positive_return_pct: f64,
    /// Tail risk per requested confidence level.
    pub tail_risk: Vec<TailRisk>,
}

/// Runs independent backtests over bootstrap-resampled quote histories on a
/// bounded worker pool.
///
/// Each simulation owns a fresh strategy instance, engine, and ledger; no
/// state is shared between workers. Results are collected in completion
/// order and sorted before aggregation.
pub struct MonteCarloRunner {
    settings: MonteCarloSettings,
    engine_config: BacktesterConfig,
}

impl MonteCarloRunner {
    /// Create a runner from batch settings and an engine configuration.
    pub fn new(settings: MonteCarloSettings, engine_config: BacktesterConfig) -> Self {
        Self {
            settings,
            engine_config,
        }
    }

    /// Run the batch for a registered strategy over `[start_date, end_date]`.
    ///
    /// Individual simulation failures are logged and excluded; the batch
    /// fails only when every simulation fails.
    pub async fn run(
        &self,
        registry: &StrategyRegistry,
        strategy_id: &str,
        data: Arc<HistoricalData>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<MonteCarloReport> {
        if self.settings.num_simulations == 0 {
            bail!("Monte Carlo simulation count must be positive");
        }
        for level in &self.settings.confidence_levels {
            if !(*level > 0.0 && *level < 1.0) {
                bail!("confidence level must be in (0, 1), got {}", level);
            }
        }

        info!(
            strategy = strategy_id,
            simulations = self.settings.num_simulations,
            concurrency = self.settings.max_concurrency,
            "Starting Monte Carlo batch"
        );

        let mut master = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for simulation in 0..self.settings.num_simulations {
            let task_seed = master.gen::<u64>();
            let semaphore = semaphore.clone();
            let data = data.clone();
            let mut strategy = registry.create(strategy_id)?;
            let engine = Backtester::new(self.engine_config.clone());

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (simulation, Err(anyhow!("worker pool closed"))),
                };
                let mut rng = StdRng::seed_from_u64(task_seed);
                let resampled = bootstrap_resample(&data, &mut rng);
                let result = engine
                    .run(strategy.as_mut(), &resampled, start_date, end_date)
                    .await;
                (simulation, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(result))) => results.push(result),
                Ok((simulation, Err(e))) => {
                    warn!(simulation, error = %e, "Simulation failed");
                }
                Err(e) => {
                    warn!(error = %e, "Simulation task panicked");
                }
            }
        }

        if results.is_empty() {
            bail!(
                "all {} Monte Carlo simulations failed",
                self.settings.num_simulations
            );
        }

        // Results arrive in completion order; sort so aggregation is
        // independent of worker scheduling.
        results.sort_by(|a, b| {
            a.total_return_pct
                .partial_cmp(&b.total_return_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let report = self.aggregate(&results);
        info!(
            successful = report.successful_simulations,
            mean_return = report.mean_return,
            "Monte Carlo batch completed"
        );
        Ok(report)
    }

    fn aggregate(&self, results: &[crate::engine::BacktestResults]) -> MonteCarloReport {
        let returns: Vec<f64> = results.iter().map(|r| r.total_return_pct).collect();
        let mut sorted = returns.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = returns.len() as f64;
        let mean_return = returns.iter().sum::<f64>() / n;
        let variance = returns
            .iter()
            .map(|r| (r - mean_return).powi(2))
            .sum::<f64>()
            / n;

        let tail_risk = self
            .settings
            .confidence_levels
            .iter()
            .map(|level| {
                let (var, cvar) = metrics::var_cvar(&returns, *level);
                TailRisk {
                    confidence: *level,
                    var,
                    cvar,
                }
            })
            .collect();

        MonteCarloReport {
            num_simulations: self.settings.num_simulations,
            successful_simulations: results.len(),
            mean_return,
            median_return: metrics::percentile(&sorted, 0.5),
            return_stddev: variance.sqrt(),
            min_return: sorted.first().copied().unwrap_or(0.0),
            max_return: sorted.last().copied().unwrap_or(0.0),
            mean_sharpe: results.iter().map(|r| r.sharpe_ratio).sum::<f64>() / n,
            mean_drawdown: results.iter().map(|r| r.max_drawdown).sum::<f64>() / n,
            worst_drawdown: results
                .iter()
                .map(|r| r.max_drawdown)
                .fold(0.0_f64, f64::max),
            positive_return_pct: returns.iter().filter(|r| **r > 0.0).count() as f64 / n,
            tail_risk,
        }
    }
}

/// Resample each symbol's quote series with replacement at the same length,
/// re-sorted chronologically.
fn bootstrap_resample(data: &HistoricalData, rng: &mut StdRng) -> HistoricalData {
    data.iter()
        .map(|(symbol, quotes)| {
            let mut resampled: Vec<Quote> = (0..quotes.len())
                .map(|_| quotes[rng.gen_range(0..quotes.len())].clone())
                .collect();
            resampled.sort_by_key(|q| q.timestamp);
            (symbol.clone(), resampled)
        })
        .collect()
}
