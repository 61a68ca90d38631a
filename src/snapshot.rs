//! Position snapshots from the custody collaborator.
//!
//! All monetary values must already be expressed in the account's base
//! currency; the only way to build a snapshot is through
//! [`PositionSnapshot::normalized`], which makes that precondition part of
//! the type rather than an unchecked convention. The calculator performs no
//! currency conversion of its own.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// One valued position: quantity plus base-currency market value.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionValue {
    pub symbol: String,
    pub quantity: f64,
    pub market_value_cents: i64,
}

/// Current holdings of one account, base-currency normalized.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub account_id: String,
    pub base_currency: String,
    pub cash_cents: i64,
    pub as_of: DateTime<Utc>,
    positions: Vec<PositionValue>,
}

/// On-disk snapshot document (dollar amounts, written by the position
/// provider).
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    account_id: String,
    base_currency: String,
    #[serde(default)]
    cash: f64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    positions: Vec<RawPosition>,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    symbol: String,
    #[serde(default)]
    quantity: f64,
    market_value: f64,
}

fn to_cents(usd: f64) -> i64 {
    (usd * 100.0).round() as i64
}

impl PositionSnapshot {
    /// Build a snapshot from values already normalized to the base currency.
    pub fn normalized(
        account_id: impl Into<String>,
        base_currency: impl Into<String>,
        positions: Vec<PositionValue>,
        cash_cents: i64,
        as_of: DateTime<Utc>,
    ) -> Result<Self> {
        let account_id = account_id.into();
        let base_currency = base_currency.into();
        if account_id.is_empty() {
            return Err(Error::Snapshot("account id must not be empty".into()));
        }
        if base_currency.is_empty() {
            return Err(Error::Snapshot("base currency must not be empty".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for pos in &positions {
            if pos.symbol.is_empty() {
                return Err(Error::Snapshot("empty symbol in positions".into()));
            }
            if !seen.insert(pos.symbol.as_str()) {
                return Err(Error::Snapshot(format!(
                    "duplicate symbol in positions: {}",
                    pos.symbol
                )));
            }
        }

        Ok(Self {
            account_id,
            base_currency,
            cash_cents,
            as_of,
            positions,
        })
    }

    /// Load a snapshot JSON file exported by the position provider.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::SnapshotRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        let positions = raw
            .positions
            .into_iter()
            .map(|p| PositionValue {
                symbol: p.symbol,
                quantity: p.quantity,
                market_value_cents: to_cents(p.market_value),
            })
            .collect();

        Self::normalized(
            raw.account_id,
            raw.base_currency,
            positions,
            to_cents(raw.cash),
            raw.timestamp.unwrap_or_else(Utc::now),
        )
    }

    pub fn positions(&self) -> &[PositionValue] {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionValue> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Sum of position market values.
    pub fn invested_cents(&self) -> i64 {
        self.positions.iter().map(|p| p.market_value_cents).sum()
    }

    /// Sum of positions with positive market value, the most a withdrawal
    /// can raise.
    pub fn sellable_cents(&self) -> i64 {
        self.positions
            .iter()
            .map(|p| p.market_value_cents.max(0))
            .sum()
    }

    /// Net liquidation value: positions plus cash.
    pub fn total_cents(&self) -> i64 {
        self.invested_cents() + self.cash_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_json() -> &'static str {
        r#"{
            "account_id": "U1234567",
            "base_currency": "USD",
            "timestamp": "2026-08-23T04:00:00Z",
            "cash": 5000.0,
            "positions": [
                { "symbol": "SPMO", "quantity": 95.2, "market_value": 20000.0 },
                { "symbol": "SMH", "quantity": 57.0, "market_value": 15000.0 },
                { "symbol": "IAU", "quantity": 310.0, "market_value": 15000.0 }
            ]
        }"#
    }

    #[test]
    fn parse_valid_snapshot() {
        let snap = PositionSnapshot::from_json(snapshot_json()).unwrap();
        assert_eq!(snap.account_id, "U1234567");
        assert_eq!(snap.base_currency, "USD");
        assert_eq!(snap.positions().len(), 3);
        assert_eq!(snap.cash_cents, 5000_00);
        assert_eq!(snap.invested_cents(), 50_000_00);
        assert_eq!(snap.total_cents(), 55_000_00);
        assert_eq!(
            snap.position("SPMO").unwrap().market_value_cents,
            20_000_00
        );
    }

    #[test]
    fn dollar_values_convert_to_cents() {
        let json = r#"{
            "account_id": "U1",
            "base_currency": "USD",
            "cash": 0.015,
            "positions": [{ "symbol": "AAA", "market_value": 1234.567 }]
        }"#;
        let snap = PositionSnapshot::from_json(json).unwrap();
        assert_eq!(snap.cash_cents, 2);
        assert_eq!(snap.position("AAA").unwrap().market_value_cents, 1234_57);
    }

    #[test]
    fn reject_duplicate_symbols() {
        let json = r#"{
            "account_id": "U1",
            "base_currency": "USD",
            "positions": [
                { "symbol": "AAA", "market_value": 100.0 },
                { "symbol": "AAA", "market_value": 200.0 }
            ]
        }"#;
        assert!(matches!(
            PositionSnapshot::from_json(json),
            Err(Error::Snapshot(_))
        ));
    }

    #[test]
    fn reject_missing_base_currency_marker() {
        // Without the base_currency field the document is not accepted as
        // normalized input.
        let json = r#"{ "account_id": "U1", "positions": [] }"#;
        assert!(matches!(
            PositionSnapshot::from_json(json),
            Err(Error::SnapshotParse(_))
        ));
    }

    #[test]
    fn sellable_excludes_negative_values() {
        let snap = PositionSnapshot::normalized(
            "U1",
            "USD",
            vec![
                PositionValue {
                    symbol: "AAA".into(),
                    quantity: 10.0,
                    market_value_cents: 500_00,
                },
                PositionValue {
                    symbol: "BBB".into(),
                    quantity: -5.0,
                    market_value_cents: -200_00,
                },
            ],
            0,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(snap.invested_cents(), 300_00);
        assert_eq!(snap.sellable_cents(), 500_00);
    }
}
