//! Trade instructions and order batches.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Action {
    Buy,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(Action::Buy),
            "SELL" => Ok(Action::Sell),
            other => Err(Error::Ticket(format!("unknown action: {other}"))),
        }
    }
}

/// Order types accepted by the downstream bulk-order import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    Market,
    Limit,
    MarketOnClose,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MKT"),
            OrderType::Limit => write!(f, "LMT"),
            OrderType::MarketOnClose => write!(f, "MOC"),
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MKT" => Ok(OrderType::Market),
            "LMT" => Ok(OrderType::Limit),
            "MOC" => Ok(OrderType::MarketOnClose),
            other => Err(Error::Ticket(format!("unknown order type: {other}"))),
        }
    }
}

/// One row of an order ticket.
///
/// Field order matches the on-disk ticket columns consumed by the broker's
/// bulk-order import; reordering is a breaking change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeInstruction {
    pub account_id: String,
    pub symbol: String,
    pub action: Action,
    /// Share quantity, when known. Notional-only instructions leave it unset.
    pub quantity: Option<f64>,
    pub amount_cents: i64,
    pub order_type: OrderType,
    pub note: String,
    pub ts: DateTime<Utc>,
}

/// A named set of instructions produced by one calculator invocation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderBatch {
    pub name: String,
    pub orders: Vec<TradeInstruction>,
    pub created_at: DateTime<Utc>,
}

impl OrderBatch {
    pub fn new(name: impl Into<String>, orders: Vec<TradeInstruction>) -> Self {
        Self {
            name: name.into(),
            orders,
            created_at: Utc::now(),
        }
    }

    /// Batch name in the operational convention, e.g. `Deposit_U123_B301_20260823_120000`.
    pub fn named_for(kind: &str, account_id: &str, portfolio_id: &str, ts: DateTime<Utc>) -> String {
        format!(
            "{kind}_{account_id}_{portfolio_id}_{}",
            ts.format("%Y%m%d_%H%M%S")
        )
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut buy_orders = 0;
        let mut sell_orders = 0;
        let mut buy_cents = 0_i64;
        let mut sell_cents = 0_i64;
        let mut accounts: Vec<String> = Vec::new();
        let mut symbols: Vec<String> = Vec::new();

        for order in &self.orders {
            match order.action {
                Action::Buy => {
                    buy_orders += 1;
                    buy_cents += order.amount_cents;
                }
                Action::Sell => {
                    sell_orders += 1;
                    sell_cents += order.amount_cents;
                }
            }
            if !accounts.contains(&order.account_id) {
                accounts.push(order.account_id.clone());
            }
            if !symbols.contains(&order.symbol) {
                symbols.push(order.symbol.clone());
            }
        }
        accounts.sort();
        symbols.sort();

        BatchSummary {
            batch_name: self.name.clone(),
            total_orders: self.orders.len(),
            buy_orders,
            sell_orders,
            buy_cents,
            sell_cents,
            net_cents: buy_cents - sell_cents,
            accounts,
            symbols,
        }
    }
}

/// Aggregated view of a batch for display and the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_name: String,
    pub total_orders: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub buy_cents: i64,
    pub sell_cents: i64,
    pub net_cents: i64,
    pub accounts: Vec<String>,
    pub symbols: Vec<String>,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BATCH {}:", self.batch_name)?;
        writeln!(
            f,
            "  {} orders ({} buy / {} sell)",
            self.total_orders, self.buy_orders, self.sell_orders
        )?;
        writeln!(
            f,
            "  Buy ${:.2}  Sell ${:.2}  Net ${:+.2}",
            self.buy_cents as f64 / 100.0,
            self.sell_cents as f64 / 100.0,
            self.net_cents as f64 / 100.0,
        )?;
        writeln!(
            f,
            "  Accounts: {}  Symbols: {}",
            self.accounts.join(", "),
            self.symbols.join(", "),
        )?;
        Ok(())
    }
}
