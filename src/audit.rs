//! JSONL audit trail logging.
//!
//! Each generator run appends events to an audit.jsonl file, one JSON
//! object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::orders::OrderBatch;
use crate::snapshot::PositionSnapshot;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a run start event.
pub fn log_run_started(
    audit: &mut AuditLog,
    command: &str,
    account_id: &str,
    portfolio_id: Option<&str>,
) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "command": command,
            "account": account_id,
            "portfolio": portfolio_id,
        }),
    )
}

/// Convenience: log the snapshot the run was computed from.
pub fn log_snapshot(audit: &mut AuditLog, snapshot: &PositionSnapshot) -> Result<()> {
    let positions: Vec<_> = snapshot
        .positions()
        .iter()
        .map(|p| {
            serde_json::json!({
                "symbol": p.symbol,
                "quantity": p.quantity,
                "market_value": p.market_value_cents as f64 / 100.0,
            })
        })
        .collect();

    audit.log(
        "snapshot_loaded",
        serde_json::json!({
            "account": snapshot.account_id,
            "base_currency": snapshot.base_currency,
            "cash": snapshot.cash_cents as f64 / 100.0,
            "total": snapshot.total_cents() as f64 / 100.0,
            "positions": positions,
        }),
    )
}

/// Convenience: log the generated batch.
pub fn log_orders_generated(audit: &mut AuditLog, batch: &OrderBatch) -> Result<()> {
    let order_data: Vec<_> = batch
        .orders
        .iter()
        .map(|o| {
            serde_json::json!({
                "symbol": o.symbol,
                "action": format!("{}", o.action),
                "amount": o.amount_cents as f64 / 100.0,
                "note": o.note,
            })
        })
        .collect();

    audit.log(
        "orders_generated",
        serde_json::json!({
            "batch": batch.name,
            "summary": batch.summary(),
            "orders": order_data,
        }),
    )
}

/// Convenience: log the written ticket file.
pub fn log_ticket_written(audit: &mut AuditLog, path: &Path, orders: usize) -> Result<()> {
    audit.log(
        "ticket_written",
        serde_json::json!({
            "path": path.display().to_string(),
            "orders": orders,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{Action, OrderType, TradeInstruction};

    #[test]
    fn audit_log_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_audit.jsonl");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.log_simple("test_event").unwrap();
            log.log("test_data", serde_json::json!({"key": "value"}))
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        for line in &lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }

        assert!(lines[0].contains("\"event\":\"test_event\""));
    }

    #[test]
    fn audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdir").join("deep").join("audit.jsonl");

        let mut log = AuditLog::open(&path).unwrap();
        log.log_simple("test").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn orders_generated_carries_batch_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let batch = OrderBatch::new(
            "Deposit_U1_B301_20260823_120000",
            vec![TradeInstruction {
                account_id: "U1".into(),
                symbol: "SPMO".into(),
                action: Action::Buy,
                quantity: None,
                amount_cents: 3334_00,
                order_type: OrderType::Market,
                note: "New deposit allocation to B301 (33.34% target weight)".into(),
                ts: Utc::now(),
            }],
        );

        {
            let mut log = AuditLog::open(&path).unwrap();
            log_orders_generated(&mut log, &batch).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(value["event"], "orders_generated");
        assert_eq!(value["summary"]["buy_orders"], 1);
        assert_eq!(value["orders"][0]["symbol"], "SPMO");
    }
}
