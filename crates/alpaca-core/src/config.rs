//! Configuration for the backtesting toolkit.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

/// Transaction cost constants, fixed for the lifetime of an engine instance.
///
/// All values are non-negative; fractions are expressed as decimal ratios
/// (0.5 = 50%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// Commission charged per share.
    pub commission_per_share: Decimal,
    /// Commission floor per trade.
    pub commission_min: Decimal,
    /// Commission ceiling per trade.
    pub commission_max: Decimal,
    /// Fraction of the quoted spread charged as slippage cost.
    pub spread_cost_fraction: Decimal,
    /// Fraction of notional charged as market impact.
    pub market_impact_fraction: Decimal,
    /// Fraction used to adjust the execution price away from the touch.
    pub slippage_fraction: Decimal,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            commission_per_share: Decimal::new(5, 3), // $0.005/share
            commission_min: Decimal::ONE,
            commission_max: Decimal::new(25, 0),
            spread_cost_fraction: Decimal::new(5, 1), // 50% of spread
            market_impact_fraction: Decimal::new(1, 4), // 1bp of notional
            slippage_fraction: Decimal::new(5, 4),    // 5bp price adjustment
        }
    }
}

impl CostParameters {
    /// Zero-cost parameters, useful for friction-free simulations.
    pub fn zero() -> Self {
        Self {
            commission_per_share: Decimal::ZERO,
            commission_min: Decimal::ZERO,
            commission_max: Decimal::ZERO,
            spread_cost_fraction: Decimal::ZERO,
            market_impact_fraction: Decimal::ZERO,
            slippage_fraction: Decimal::ZERO,
        }
    }

    /// Check that every parameter is non-negative and the clamp is ordered.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("commission_per_share", self.commission_per_share),
            ("commission_min", self.commission_min),
            ("commission_max", self.commission_max),
            ("spread_cost_fraction", self.spread_cost_fraction),
            ("market_impact_fraction", self.market_impact_fraction),
            ("slippage_fraction", self.slippage_fraction),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(Error::Config {
                    message: format!("{} must be non-negative, got {}", name, value),
                });
            }
        }
        if self.commission_min > self.commission_max {
            return Err(Error::Config {
                message: "commission_min exceeds commission_max".to_string(),
            });
        }
        Ok(())
    }
}

/// Walk-forward window configuration, in whole months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardSettings {
    /// Training window length.
    pub training_months: u32,
    /// Testing window length.
    pub testing_months: u32,
    /// Months to advance between windows.
    pub step_months: u32,
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            training_months: 6,
            testing_months: 1,
            step_months: 1,
        }
    }
}

/// Monte Carlo batch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSettings {
    /// Number of bootstrap simulations to run.
    pub num_simulations: usize,
    /// Confidence levels for VaR/CVaR, each in (0, 1).
    pub confidence_levels: Vec<f64>,
    /// Maximum simulations in flight at once.
    pub max_concurrency: usize,
    /// Seed for reproducible resampling; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            num_simulations: 100,
            confidence_levels: vec![0.95, 0.99],
            max_concurrency: 4,
            seed: None,
        }
    }
}

/// Application settings consumed by the simulation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Starting cash for each backtest run.
    pub initial_capital: Decimal,
    /// Fraction of cash a single auto-sized trade may consume.
    pub max_position_pct: Decimal,
    /// Transaction cost parameters.
    pub costs: CostParameters,
    /// Walk-forward window configuration.
    pub walkforward: WalkForwardSettings,
    /// Monte Carlo batch configuration.
    pub monte_carlo: MonteCarloSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::new(100000, 0),
            max_position_pct: Decimal::new(10, 2), // 10%
            costs: CostParameters::default(),
            walkforward: WalkForwardSettings::default(),
            monte_carlo: MonteCarloSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let settings = Self {
            initial_capital: env_decimal("BACKTEST_INITIAL_CAPITAL", defaults.initial_capital)?,
            max_position_pct: env_decimal("BACKTEST_MAX_POSITION_PCT", defaults.max_position_pct)?,
            costs: CostParameters {
                commission_per_share: env_decimal(
                    "COST_COMMISSION_PER_SHARE",
                    defaults.costs.commission_per_share,
                )?,
                commission_min: env_decimal("COST_COMMISSION_MIN", defaults.costs.commission_min)?,
                commission_max: env_decimal("COST_COMMISSION_MAX", defaults.costs.commission_max)?,
                spread_cost_fraction: env_decimal(
                    "COST_SPREAD_FRACTION",
                    defaults.costs.spread_cost_fraction,
                )?,
                market_impact_fraction: env_decimal(
                    "COST_IMPACT_FRACTION",
                    defaults.costs.market_impact_fraction,
                )?,
                slippage_fraction: env_decimal(
                    "COST_SLIPPAGE_FRACTION",
                    defaults.costs.slippage_fraction,
                )?,
            },
            walkforward: WalkForwardSettings {
                training_months: env_u32(
                    "WALKFORWARD_TRAINING_MONTHS",
                    defaults.walkforward.training_months,
                )?,
                testing_months: env_u32(
                    "WALKFORWARD_TESTING_MONTHS",
                    defaults.walkforward.testing_months,
                )?,
                step_months: env_u32("WALKFORWARD_STEP_MONTHS", defaults.walkforward.step_months)?,
            },
            monte_carlo: MonteCarloSettings {
                num_simulations: env_usize(
                    "MONTE_CARLO_SIMULATIONS",
                    defaults.monte_carlo.num_simulations,
                )?,
                confidence_levels: env_f64_list(
                    "MONTE_CARLO_CONFIDENCE_LEVELS",
                    defaults.monte_carlo.confidence_levels,
                )?,
                max_concurrency: env_usize(
                    "MONTE_CARLO_CONCURRENCY",
                    defaults.monte_carlo.max_concurrency,
                )?,
                seed: env_u64_opt("MONTE_CARLO_SEED")?,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check all configured values against their documented ranges.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(Error::Config {
                message: format!("initial capital must be positive, got {}", self.initial_capital),
            });
        }
        if self.max_position_pct <= Decimal::ZERO || self.max_position_pct > Decimal::ONE {
            return Err(Error::Config {
                message: format!(
                    "max position fraction must be in (0, 1], got {}",
                    self.max_position_pct
                ),
            });
        }
        self.costs.validate()?;

        let windows = [
            ("training", self.walkforward.training_months),
            ("testing", self.walkforward.testing_months),
            ("step", self.walkforward.step_months),
        ];
        for (name, months) in windows {
            if months == 0 {
                return Err(Error::Config {
                    message: format!("walk-forward {} window must be at least one month", name),
                });
            }
        }

        if self.monte_carlo.num_simulations == 0 {
            return Err(Error::Config {
                message: "Monte Carlo simulation count must be positive".to_string(),
            });
        }
        for level in &self.monte_carlo.confidence_levels {
            if !(*level > 0.0 && *level < 1.0) {
                return Err(Error::Config {
                    message: format!("confidence level must be in (0, 1), got {}", level),
                });
            }
        }
        if self.monte_carlo.max_concurrency == 0 {
            return Err(Error::Config {
                message: "Monte Carlo concurrency must be positive".to_string(),
            });
        }
        Ok(())
    }
}

fn env_decimal(key: &str, default: Decimal) -> Result<Decimal> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{} is not a valid decimal: {}", key, raw),
        }),
        Err(_) => Ok(default),
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{} is not a valid integer: {}", key, raw),
        }),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| Error::Config {
            message: format!("{} is not a valid integer: {}", key, raw),
        }),
        Err(_) => Ok(default),
    }
}

fn env_u64_opt(key: &str) -> Result<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config {
                message: format!("{} is not a valid integer: {}", key, raw),
            }),
        Err(_) => Ok(None),
    }
}

fn env_f64_list(key: &str, default: Vec<f64>) -> Result<Vec<f64>> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|part| {
                part.trim().parse().map_err(|_| Error::Config {
                    message: format!("{} contains an invalid number: {}", key, part),
                })
            })
            .collect(),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.initial_capital, Decimal::new(100000, 0));
        assert_eq!(settings.max_position_pct, Decimal::new(10, 2));
    }

    #[test]
    fn test_zero_costs_validate() {
        assert!(CostParameters::zero().validate().is_ok());
    }

    #[test]
    fn test_negative_cost_rejected() {
        let costs = CostParameters {
            commission_per_share: Decimal::new(-1, 2),
            ..CostParameters::default()
        };
        assert!(costs.validate().is_err());
    }

    #[test]
    fn test_inverted_commission_clamp_rejected() {
        let costs = CostParameters {
            commission_min: Decimal::new(50, 0),
            commission_max: Decimal::new(10, 0),
            ..CostParameters::default()
        };
        assert!(costs.validate().is_err());
    }

    #[test]
    fn test_non_positive_capital_rejected() {
        let settings = Settings {
            initial_capital: Decimal::ZERO,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_confidence_level_bounds() {
        let mut settings = Settings::default();
        settings.monte_carlo.confidence_levels = vec![0.95, 1.0];
        assert!(settings.validate().is_err());

        settings.monte_carlo.confidence_levels = vec![0.05, 0.95];
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut settings = Settings::default();
        settings.walkforward.step_months = 0;
        assert!(settings.validate().is_err());
    }
}
