//! In-memory portfolio state: cash, positions, trade log, snapshot history.

use alpaca_core::types::{ExecutedTrade, PortfolioSnapshot, Position, Quote, TradeSide};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::costs::TradeCosts;

/// Mutable portfolio state for one backtest run.
///
/// The ledger enforces no affordability guards itself; the caller must size
/// trades so that cash never goes negative.
pub struct PortfolioLedger {
    initial_capital: Decimal,
    cash: Decimal,
    positions: HashMap<String, Position>,
    trades: Vec<ExecutedTrade>,
    snapshots: Vec<PortfolioSnapshot>,
}

impl PortfolioLedger {
    /// Create an all-cash ledger.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Return the ledger to its all-cash starting state.
    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.positions.clear();
        self.trades.clear();
        self.snapshots.clear();
    }

    /// Available cash.
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Configured starting capital.
    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    /// Open position for a symbol, if any.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// All open positions.
    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    /// Chronological trade log.
    pub fn trades(&self) -> &[ExecutedTrade] {
        &self.trades
    }

    /// Chronological snapshot history.
    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    /// Cash plus the market value of every open position.
    pub fn total_value(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value)
                .sum::<Decimal>()
    }

    /// Re-mark every held position with a quote for `date` and append the
    /// day's snapshot. Positions without a quote retain their prior value.
    ///
    /// Called exactly once per simulated date.
    pub fn mark_to_market(
        &mut self,
        quotes: &HashMap<String, Quote>,
        date: NaiveDate,
    ) -> PortfolioSnapshot {
        let mut day_pnl = Decimal::ZERO;
        for position in self.positions.values_mut() {
            match quotes.get(&position.symbol) {
                Some(quote) => day_pnl += position.mark(quote.mid_price()),
                None => position.day_pnl = Decimal::ZERO,
            }
        }

        let timestamp = date.and_time(NaiveTime::MIN).and_utc();
        let snapshot = self.build_snapshot(timestamp, day_pnl);
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// Build a snapshot of the current state without recording it.
    pub fn snapshot_now(&self, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        let day_pnl = self.positions.values().map(|p| p.day_pnl).sum();
        self.build_snapshot(timestamp, day_pnl)
    }

    /// Apply an executed trade: move cash by the net amount, create or update
    /// the position, and append the trade record.
    ///
    /// Cost basis is averaged on same-direction adds, left unchanged on
    /// partial closes, and the entry is removed when quantity returns to
    /// exactly zero.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_trade(
        &mut self,
        symbol: &str,
        side: TradeSide,
        quantity: i64,
        fill_price: Decimal,
        costs: TradeCosts,
        timestamp: DateTime<Utc>,
        strategy_id: &str,
        signal_strength: f64,
    ) -> ExecutedTrade {
        let trade = ExecutedTrade {
            id: Uuid::new_v4(),
            timestamp,
            symbol: symbol.to_string(),
            side,
            quantity,
            fill_price,
            commission: costs.commission,
            slippage: costs.slippage,
            market_impact: costs.market_impact,
            strategy_id: strategy_id.to_string(),
            signal_strength,
        };

        match side {
            TradeSide::Buy => self.cash -= trade.net_amount(),
            TradeSide::Sell => self.cash += trade.net_amount(),
        }

        let delta = match side {
            TradeSide::Buy => quantity,
            TradeSide::Sell => -quantity,
        };
        self.apply_position_delta(symbol, delta, fill_price);

        self.trades.push(trade.clone());
        trade
    }

    fn apply_position_delta(&mut self, symbol: &str, delta: i64, fill_price: Decimal) {
        match self.positions.entry(symbol.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Position::open(symbol, delta, fill_price));
            }
            Entry::Occupied(mut slot) => {
                let previous = slot.get().quantity;
                let updated = previous + delta;
                if updated == 0 {
                    slot.remove();
                    return;
                }

                let position = slot.get_mut();
                if previous.signum() == delta.signum() {
                    let prev_abs = Decimal::from(previous.abs());
                    let delta_abs = Decimal::from(delta.abs());
                    position.cost_basis = (prev_abs * position.cost_basis
                        + delta_abs * fill_price)
                        / (prev_abs + delta_abs);
                } else if updated.signum() != previous.signum() {
                    position.cost_basis = fill_price;
                }
                position.quantity = updated;
                position.market_value = Decimal::from(updated) * fill_price;
                position.unrealized_pnl =
                    position.market_value - Decimal::from(updated) * position.cost_basis;
            }
        }
    }

    fn build_snapshot(&self, timestamp: DateTime<Utc>, day_pnl: Decimal) -> PortfolioSnapshot {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let total_value = self.cash
            + positions
                .iter()
                .map(|p| p.market_value)
                .sum::<Decimal>();

        PortfolioSnapshot {
            timestamp,
            total_value,
            buying_power: self.cash,
            day_pnl,
            total_pnl: total_value - self.initial_capital,
            positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_costs() -> TradeCosts {
        TradeCosts {
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            market_impact: Decimal::ZERO,
        }
    }

    fn quote(symbol: &str, price: Decimal) -> Quote {
        Quote::new(symbol, Utc::now(), price, price)
    }

    #[test]
    fn test_round_trip_restores_cash_and_removes_position() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let price = Decimal::new(150, 0);
        let now = Utc::now();

        ledger.execute_trade("AAPL", TradeSide::Buy, 100, price, zero_costs(), now, "test", 1.0);
        assert_eq!(ledger.cash(), Decimal::new(85000, 0));
        assert_eq!(ledger.position("AAPL").map(|p| p.quantity), Some(100));

        ledger.execute_trade("AAPL", TradeSide::Sell, 100, price, zero_costs(), now, "test", 1.0);
        assert_eq!(ledger.cash(), Decimal::new(100000, 0));
        assert!(ledger.position("AAPL").is_none());
        assert_eq!(ledger.trades().len(), 2);
    }

    #[test]
    fn test_same_direction_add_averages_cost_basis() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            100,
            Decimal::new(100, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );
        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            100,
            Decimal::new(120, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );

        let position = ledger.position("AAPL").unwrap();
        assert_eq!(position.quantity, 200);
        assert_eq!(position.cost_basis, Decimal::new(110, 0));
    }

    #[test]
    fn test_partial_close_keeps_cost_basis() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            100,
            Decimal::new(100, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );
        ledger.execute_trade(
            "AAPL",
            TradeSide::Sell,
            40,
            Decimal::new(130, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );

        let position = ledger.position("AAPL").unwrap();
        assert_eq!(position.quantity, 60);
        assert_eq!(position.cost_basis, Decimal::new(100, 0));
    }

    #[test]
    fn test_sell_through_zero_opens_short_at_fill() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            50,
            Decimal::new(100, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );
        ledger.execute_trade(
            "AAPL",
            TradeSide::Sell,
            80,
            Decimal::new(110, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );

        let position = ledger.position("AAPL").unwrap();
        assert_eq!(position.quantity, -30);
        assert_eq!(position.cost_basis, Decimal::new(110, 0));
        assert!(position.market_value < Decimal::ZERO);
    }

    #[test]
    fn test_snapshot_total_matches_cash_plus_positions() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();
        let date = now.date_naive();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            100,
            Decimal::new(150, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );

        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), quote("AAPL", Decimal::new(160, 0)));

        let snapshot = ledger.mark_to_market(&quotes, date);
        let position_value: Decimal = snapshot.positions.iter().map(|p| p.market_value).sum();

        assert_eq!(snapshot.total_value, snapshot.buying_power + position_value);
        assert_eq!(snapshot.total_value, Decimal::new(101000, 0));
        assert_eq!(snapshot.total_pnl, Decimal::new(1000, 0));
        assert_eq!(ledger.snapshots().len(), 1);
    }

    #[test]
    fn test_mark_without_quote_retains_value() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            100,
            Decimal::new(150, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );

        let snapshot = ledger.mark_to_market(&HashMap::new(), now.date_naive());
        assert_eq!(
            snapshot.position("AAPL").map(|p| p.market_value),
            Some(Decimal::new(15000, 0))
        );
        assert_eq!(snapshot.day_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_reset_restores_all_cash() {
        let mut ledger = PortfolioLedger::new(Decimal::new(100000, 0));
        let now = Utc::now();

        ledger.execute_trade(
            "AAPL",
            TradeSide::Buy,
            10,
            Decimal::new(150, 0),
            zero_costs(),
            now,
            "test",
            1.0,
        );
        ledger.mark_to_market(&HashMap::new(), now.date_naive());
        ledger.reset();

        assert_eq!(ledger.cash(), Decimal::new(100000, 0));
        assert!(ledger.positions().is_empty());
        assert!(ledger.trades().is_empty());
        assert!(ledger.snapshots().is_empty());
    }
}
