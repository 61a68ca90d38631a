//! Rebalance calculator: CURRENT vs TARGET order generation.
//!
//! Pure computation from (snapshot, model portfolio, scenario) to a sorted
//! list of trade instructions. Performs no I/O and no currency conversion;
//! inputs are base-currency cents throughout.

use chrono::{DateTime, Timelike, Utc};

use crate::error::{Error, Result};
use crate::model::ModelPortfolio;
use crate::orders::{Action, OrderType, TradeInstruction};
use crate::snapshot::PositionSnapshot;

/// How a withdrawal is raised from existing positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalStrategy {
    /// Sell every position in proportion to its share of current value.
    Proportional,
    /// Consume positions greedily, largest market value first.
    LargestFirst,
}

/// What the account owner wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Deposit {
        amount_cents: i64,
    },
    Withdrawal {
        amount_cents: i64,
        strategy: WithdrawalStrategy,
    },
    Rebalance {
        target_total_cents: i64,
        min_trade_cents: i64,
    },
}

/// Compute the order ticket for one account under one scenario.
///
/// Output is deterministic: instructions are sorted by symbol ascending
/// (BUY before SELL on a same-symbol tie) and all rows share one generation
/// timestamp, truncated to whole seconds to match the ticket format.
pub fn compute_orders(
    snapshot: &PositionSnapshot,
    model: &ModelPortfolio,
    scenario: Scenario,
) -> Result<Vec<TradeInstruction>> {
    let now = Utc::now();
    let ts = now.with_nanosecond(0).unwrap_or(now);

    let mut orders = match scenario {
        Scenario::Deposit { amount_cents } => deposit_orders(snapshot, model, amount_cents, ts)?,
        Scenario::Withdrawal {
            amount_cents,
            strategy,
        } => withdrawal_orders(snapshot, amount_cents, strategy, ts)?,
        Scenario::Rebalance {
            target_total_cents,
            min_trade_cents,
        } => rebalance_orders(snapshot, model, target_total_cents, min_trade_cents, ts)?,
    };

    orders.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then_with(|| a.action.cmp(&b.action))
    });
    Ok(orders)
}

/// Split `total` cents across `weights` proportionally, largest remainder
/// first, so the parts sum to exactly `total`. Ties go to the earlier entry.
fn allocate_cents(total: i64, weights: &[f64]) -> Vec<i64> {
    let weight_sum: f64 = weights.iter().sum();
    if weights.is_empty() || weight_sum <= 0.0 {
        return vec![0; weights.len()];
    }

    let mut parts = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    let mut allocated = 0_i64;

    for &w in weights {
        let exact = total as f64 * w / weight_sum;
        let base = exact.floor() as i64;
        parts.push(base);
        remainders.push(exact - base as f64);
        allocated += base;
    }

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        remainders[b]
            .partial_cmp(&remainders[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut leftover = total - allocated;
    for &i in &order {
        if leftover == 0 {
            break;
        }
        parts[i] += 1;
        leftover -= 1;
    }

    parts
}

fn deposit_orders(
    snapshot: &PositionSnapshot,
    model: &ModelPortfolio,
    amount_cents: i64,
    ts: DateTime<Utc>,
) -> Result<Vec<TradeInstruction>> {
    if amount_cents <= 0 {
        return Err(Error::Scenario(format!(
            "deposit amount must be positive, got {:.2}",
            amount_cents as f64 / 100.0
        )));
    }
    if model.holdings.is_empty() {
        return Err(Error::Scenario(format!(
            "model portfolio {} has no holdings",
            model.portfolio_id
        )));
    }

    let mut holdings: Vec<_> = model.holdings.iter().collect();
    holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let weights: Vec<f64> = holdings.iter().map(|h| h.weight_pct).collect();
    let legs = allocate_cents(amount_cents, &weights);

    let orders = holdings
        .iter()
        .zip(legs)
        .filter(|(_, leg)| *leg > 0)
        .map(|(holding, leg)| TradeInstruction {
            account_id: snapshot.account_id.clone(),
            symbol: holding.symbol.clone(),
            action: Action::Buy,
            quantity: None,
            amount_cents: leg,
            order_type: OrderType::Market,
            note: format!(
                "New deposit allocation to {} ({}% target weight)",
                model.portfolio_id, holding.weight_pct
            ),
            ts,
        })
        .collect();

    Ok(orders)
}

fn withdrawal_orders(
    snapshot: &PositionSnapshot,
    amount_cents: i64,
    strategy: WithdrawalStrategy,
    ts: DateTime<Utc>,
) -> Result<Vec<TradeInstruction>> {
    if amount_cents <= 0 {
        return Err(Error::Scenario(format!(
            "withdrawal amount must be positive, got {:.2}",
            amount_cents as f64 / 100.0
        )));
    }

    // Cash is not a position; only positively valued holdings can be sold.
    let mut sellable: Vec<_> = snapshot
        .positions()
        .iter()
        .filter(|p| p.market_value_cents > 0)
        .collect();

    let sellable_total: i64 = sellable.iter().map(|p| p.market_value_cents).sum();
    if sellable.is_empty() {
        return Err(Error::Scenario(
            "withdrawal requires sellable positions, snapshot has none".into(),
        ));
    }
    if amount_cents > sellable_total {
        return Err(Error::Scenario(format!(
            "withdrawal {:.2} exceeds liquidatable value {:.2}",
            amount_cents as f64 / 100.0,
            sellable_total as f64 / 100.0
        )));
    }

    let total_usd = amount_cents as f64 / 100.0;
    let mut orders = Vec::new();

    match strategy {
        WithdrawalStrategy::Proportional => {
            sellable.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            let values: Vec<f64> = sellable
                .iter()
                .map(|p| p.market_value_cents as f64)
                .collect();
            for (pos, leg) in sellable.iter().zip(allocate_cents(amount_cents, &values)) {
                if leg == 0 {
                    continue;
                }
                orders.push(TradeInstruction {
                    account_id: snapshot.account_id.clone(),
                    symbol: pos.symbol.clone(),
                    action: Action::Sell,
                    quantity: None,
                    amount_cents: leg,
                    order_type: OrderType::Market,
                    note: format!("Proportional withdrawal (${total_usd:.2} total)"),
                    ts,
                });
            }
        }
        WithdrawalStrategy::LargestFirst => {
            sellable.sort_by(|a, b| {
                b.market_value_cents
                    .cmp(&a.market_value_cents)
                    .then_with(|| a.symbol.cmp(&b.symbol))
            });
            let mut remaining = amount_cents;
            for pos in sellable {
                if remaining == 0 {
                    break;
                }
                let leg = remaining.min(pos.market_value_cents);
                orders.push(TradeInstruction {
                    account_id: snapshot.account_id.clone(),
                    symbol: pos.symbol.clone(),
                    action: Action::Sell,
                    quantity: None,
                    amount_cents: leg,
                    order_type: OrderType::Market,
                    note: format!("Withdrawal, largest positions first (${total_usd:.2} total)"),
                    ts,
                });
                remaining -= leg;
            }
        }
    }

    Ok(orders)
}

fn rebalance_orders(
    snapshot: &PositionSnapshot,
    model: &ModelPortfolio,
    target_total_cents: i64,
    min_trade_cents: i64,
    ts: DateTime<Utc>,
) -> Result<Vec<TradeInstruction>> {
    if target_total_cents <= 0 {
        return Err(Error::Scenario(format!(
            "rebalance target total must be positive, got {:.2}",
            target_total_cents as f64 / 100.0
        )));
    }
    if min_trade_cents < 0 {
        return Err(Error::Scenario("minimum trade amount must be >= 0".into()));
    }
    if model.holdings.is_empty() {
        return Err(Error::Scenario(format!(
            "model portfolio {} has no holdings",
            model.portfolio_id
        )));
    }

    // Union universe: everything in the model plus everything held.
    let mut symbols: Vec<&str> = model.holdings.iter().map(|h| h.symbol.as_str()).collect();
    for pos in snapshot.positions() {
        if !symbols.contains(&pos.symbol.as_str()) {
            symbols.push(&pos.symbol);
        }
    }
    symbols.sort_unstable();

    let mut orders = Vec::new();

    for symbol in symbols {
        let current = snapshot
            .position(symbol)
            .map(|p| p.market_value_cents)
            .unwrap_or(0);

        let weight = model.weight(symbol).filter(|w| *w > 0.0);
        let Some(weight) = weight else {
            // Zero target weight: full exit, never filtered by the minimum
            // trade threshold so untracked positions are not stranded.
            if current > 0 {
                orders.push(TradeInstruction {
                    account_id: snapshot.account_id.clone(),
                    symbol: symbol.to_string(),
                    action: Action::Sell,
                    quantity: snapshot.position(symbol).map(|p| p.quantity),
                    amount_cents: current,
                    order_type: OrderType::Market,
                    note: format!("Full exit, not in {} model", model.portfolio_id),
                    ts,
                });
            }
            continue;
        };

        let target = (target_total_cents as f64 * weight / 100.0).round() as i64;
        let delta = target - current;

        let (action, amount) = if delta > min_trade_cents {
            (Action::Buy, delta)
        } else if delta < -min_trade_cents {
            (Action::Sell, -delta)
        } else {
            continue;
        };

        orders.push(TradeInstruction {
            account_id: snapshot.account_id.clone(),
            symbol: symbol.to_string(),
            action,
            quantity: None,
            amount_cents: amount,
            order_type: OrderType::Market,
            note: format!(
                "Rebalance to {} model (target: {weight}%)",
                model.portfolio_id
            ),
            ts,
        });
    }

    Ok(orders)
}
