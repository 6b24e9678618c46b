//! Performance and risk metrics reduced from equity curves and trade logs.

use alpaca_core::types::{ExecutedTrade, TradeSide};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Annualization factor for daily return series.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Per-period fractional returns of a value series.
pub fn period_returns(values: &[Decimal]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            let prev = w[0];
            let curr = w[1];
            if prev == Decimal::ZERO {
                0.0
            } else {
                ((curr - prev) / prev).to_f64().unwrap_or(0.0)
            }
        })
        .collect()
}

/// Largest peak-to-trough decline of a value series, as a fraction of the peak.
pub fn max_drawdown(values: &[Decimal]) -> f64 {
    let mut peak = match values.first() {
        Some(first) => *first,
        None => return 0.0,
    };
    let mut max_drawdown: f64 = 0.0;

    for value in values {
        if *value > peak {
            peak = *value;
        }
        if peak > Decimal::ZERO {
            let drawdown = ((peak - *value) / peak).to_f64().unwrap_or(0.0);
            max_drawdown = max_drawdown.max(drawdown);
        }
    }

    max_drawdown
}

/// Annualized Sharpe and Sortino ratios of a daily return series.
///
/// Assumes a zero risk-free rate. Sortino is infinite when returns are
/// positive with no downside observations.
pub fn sharpe_sortino(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance: f64 =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();

    let sharpe = if std_dev > 0.0 {
        (mean / std_dev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).map(|&r| r * r).collect();
    let downside_dev = if downside.is_empty() {
        0.0
    } else {
        (downside.iter().sum::<f64>() / downside.len() as f64).sqrt()
    };

    let sortino = if downside_dev > 0.0 {
        (mean / downside_dev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else if mean > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Compound annual growth rate from a total return over elapsed calendar days.
pub fn annualized_return(total_return_pct: f64, calendar_days: i64) -> f64 {
    let years = calendar_days as f64 / 365.0;
    if years > 0.0 {
        (1.0 + total_return_pct).powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

/// Annualized return over maximum drawdown.
pub fn calmar_ratio(annualized: f64, max_drawdown: f64) -> f64 {
    if max_drawdown > 0.0 {
        annualized / max_drawdown
    } else if annualized > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Total return over maximum drawdown.
pub fn recovery_factor(total_return_pct: f64, max_drawdown: f64) -> f64 {
    if max_drawdown > 0.0 {
        total_return_pct / max_drawdown
    } else if total_return_pct > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Empirical percentile of an ascending-sorted slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64) * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Value-at-Risk and Conditional VaR of a return distribution.
///
/// A confidence level above 0.5 reads the lower tail at `1 - level`; a level
/// below 0.5 reads it at `level` directly. CVaR is the mean of returns at or
/// beyond the VaR percentile.
pub fn var_cvar(returns: &[f64], confidence: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let tail = if confidence > 0.5 { 1.0 - confidence } else { confidence };
    let index = ((sorted.len() as f64) * tail).floor() as usize;
    let index = index.min(sorted.len() - 1);

    let var = sorted[index];
    let tail_returns = &sorted[..=index];
    let cvar = tail_returns.iter().sum::<f64>() / tail_returns.len() as f64;

    (var, cvar)
}

/// Longest win and loss streaks under the simplified classification
/// (every sell realizes profit, every buy is a cost).
pub fn consecutive_streaks(trades: &[ExecutedTrade]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut wins = 0;
    let mut losses = 0;

    for trade in trades {
        match trade.side {
            TradeSide::Sell => {
                wins += 1;
                losses = 0;
                max_wins = max_wins.max(wins);
            }
            TradeSide::Buy => {
                losses += 1;
                wins = 0;
                max_losses = max_losses.max(losses);
            }
        }
    }

    (max_wins, max_losses)
}
