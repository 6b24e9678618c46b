//! Point-in-time bid/ask quotes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bid/ask quote for a symbol at a point in time.
///
/// Immutable once created; historical feeds supply one quote per symbol per
/// timestamp, sortable chronologically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    pub symbol: String,
    /// Timestamp of the quote.
    pub timestamp: DateTime<Utc>,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Size available at the bid.
    pub bid_size: Decimal,
    /// Size available at the ask.
    pub ask_size: Decimal,
}

impl Quote {
    /// Create a new quote with zero depth.
    pub fn new(symbol: &str, timestamp: DateTime<Utc>, bid: Decimal, ask: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            bid,
            ask,
            bid_size: Decimal::ZERO,
            ask_size: Decimal::ZERO,
        }
    }

    /// Set bid/ask depth.
    pub fn with_sizes(mut self, bid_size: Decimal, ask_size: Decimal) -> Self {
        self.bid_size = bid_size;
        self.ask_size = ask_size;
        self
    }

    /// Midpoint of bid and ask.
    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Bid/ask spread.
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
