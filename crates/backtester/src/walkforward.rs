//! Walk-forward analysis: rolling out-of-sample evaluation.

use alpaca_core::WalkForwardSettings;
use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Backtester, BacktesterConfig, HistoricalData};
use crate::strategy::SignalSource;

/// Out-of-sample results for one testing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    /// Window number (1-indexed).
    pub window: usize,
    /// Training window start.
    pub training_start: NaiveDate,
    /// Training window end (exclusive).
    pub training_end: NaiveDate,
    /// Testing window start.
    pub testing_start: NaiveDate,
    /// Testing window end (exclusive).
    pub testing_end: NaiveDate,
    /// Fractional return over the testing window.
    pub total_return_pct: f64,
    /// Annualized Sharpe ratio over the testing window.
    pub sharpe_ratio: f64,
    /// Maximum drawdown over the testing window.
    pub max_drawdown: f64,
    /// Win rate over the testing window.
    pub win_rate: f64,
    /// Trades executed in the testing window.
    pub total_trades: usize,
}

/// Aggregate statistics across all testing windows.
///
/// Zero tested windows produce an empty report with zeroed statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    /// Per-window out-of-sample results.
    pub windows: Vec<WindowResult>,
    /// Mean of window returns.
    pub mean_return: f64,
    /// Standard deviation of window returns.
    pub return_stddev: f64,
    /// Mean of window Sharpe ratios.
    pub mean_sharpe: f64,
    /// Mean of window drawdowns.
    pub mean_drawdown: f64,
    /// Worst window drawdown.
    pub worst_drawdown: f64,
    /// Fraction of windows with a positive return.
    pub consistency_ratio: f64,
}

/// Rolls training/testing windows across a date range, backtesting each
/// testing window out-of-sample.
///
/// The training window is carved but not used for fitting: this runner only
/// evaluates the given strategy instance on each testing window.
pub struct WalkForwardRunner {
    settings: WalkForwardSettings,
    engine: Backtester,
}

impl WalkForwardRunner {
    /// Create a runner from window settings and an engine configuration.
    pub fn new(settings: WalkForwardSettings, engine_config: BacktesterConfig) -> Self {
        Self {
            settings,
            engine: Backtester::new(engine_config),
        }
    }

    /// Run the walk-forward analysis over `[start_date, end_date]`.
    pub async fn run<S>(
        &self,
        strategy: &mut S,
        data: &HistoricalData,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<WalkForwardReport>
    where
        S: SignalSource + ?Sized,
    {
        if self.settings.training_months == 0
            || self.settings.testing_months == 0
            || self.settings.step_months == 0
        {
            bail!("walk-forward window lengths must be positive");
        }

        info!(
            strategy = strategy.id(),
            %start_date,
            %end_date,
            training_months = self.settings.training_months,
            testing_months = self.settings.testing_months,
            step_months = self.settings.step_months,
            "Starting walk-forward analysis"
        );

        let mut windows = Vec::new();
        let mut training_start = start_date;
        let mut window = 1;

        loop {
            let training_end = add_months(training_start, self.settings.training_months as i32);
            let testing_start = training_end;
            let testing_end = add_months(testing_start, self.settings.testing_months as i32);
            if testing_end > end_date {
                break;
            }

            let window_end = testing_end.pred_opt().unwrap_or(testing_end);
            match self
                .engine
                .run(strategy, data, testing_start, window_end)
                .await
            {
                Ok(results) => {
                    windows.push(WindowResult {
                        window,
                        training_start,
                        training_end,
                        testing_start,
                        testing_end,
                        total_return_pct: results.total_return_pct,
                        sharpe_ratio: results.sharpe_ratio,
                        max_drawdown: results.max_drawdown,
                        win_rate: results.win_rate,
                        total_trades: results.total_trades,
                    });
                }
                Err(e) => {
                    warn!(window, error = %e, "Skipping walk-forward window");
                }
            }

            training_start = add_months(training_start, self.settings.step_months as i32);
            window += 1;
        }

        let report = Self::aggregate(windows);
        info!(
            windows = report.windows.len(),
            mean_return = report.mean_return,
            consistency = report.consistency_ratio,
            "Walk-forward analysis completed"
        );
        Ok(report)
    }

    fn aggregate(windows: Vec<WindowResult>) -> WalkForwardReport {
        if windows.is_empty() {
            return WalkForwardReport {
                windows,
                mean_return: 0.0,
                return_stddev: 0.0,
                mean_sharpe: 0.0,
                mean_drawdown: 0.0,
                worst_drawdown: 0.0,
                consistency_ratio: 0.0,
            };
        }

        let n = windows.len() as f64;
        let mean_return = windows.iter().map(|w| w.total_return_pct).sum::<f64>() / n;
        let return_variance = windows
            .iter()
            .map(|w| (w.total_return_pct - mean_return).powi(2))
            .sum::<f64>()
            / n;
        let mean_sharpe = windows.iter().map(|w| w.sharpe_ratio).sum::<f64>() / n;
        let mean_drawdown = windows.iter().map(|w| w.max_drawdown).sum::<f64>() / n;
        let worst_drawdown = windows
            .iter()
            .map(|w| w.max_drawdown)
            .fold(0.0_f64, f64::max);
        let positive = windows
            .iter()
            .filter(|w| w.total_return_pct > 0.0)
            .count() as f64;

        WalkForwardReport {
            windows,
            mean_return,
            return_stddev: return_variance.sqrt(),
            mean_sharpe,
            mean_drawdown,
            worst_drawdown,
            consistency_ratio: positive / n,
        }
    }
}

/// Add whole months to a date, clamping the day to the target month's length.
fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;

    while month > 12 {
        year += 1;
        month -= 12;
    }
    while month < 1 {
        year -= 1;
        month += 12;
    }

    let day = date.day().min(days_in_month(year, month as u32));
    NaiveDate::from_ymd_opt(year, month as u32, day).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
