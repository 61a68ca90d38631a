//! Order ticket CSV: fixed-column, round-trippable serialization.
//!
//! Column order matches the downstream bulk-order import and must not
//! change: `Account_ID,Symbol,Action,Quantity,Amount,Order_Type,Notes,
//! Timestamp`. Amounts are dollars with exactly two decimals; timestamps
//! are UTC seconds. Re-parsing emitted text and re-serializing it yields
//! byte-identical output.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::orders::TradeInstruction;

const HEADER: &str = "Account_ID,Symbol,Action,Quantity,Amount,Order_Type,Notes,Timestamp";
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Split one CSV record, honoring RFC 4180 quoting.
pub(crate) fn split_record(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' if field.is_empty() => in_quotes = true,
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}

/// Quote a field only when it needs it, doubling embedded quotes.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render instructions as ticket CSV text.
pub fn format_ticket(instructions: &[TradeInstruction]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    for instr in instructions {
        let quantity = match instr.quantity {
            Some(q) => q.to_string(),
            None => String::new(),
        };
        let row = [
            escape_field(&instr.account_id),
            escape_field(&instr.symbol),
            instr.action.to_string(),
            quantity,
            format!("{:.2}", instr.amount_cents as f64 / 100.0),
            instr.order_type.to_string(),
            escape_field(&instr.note),
            instr.ts.format(TS_FORMAT).to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Parse ticket CSV text back into instructions.
pub fn parse_ticket(text: &str) -> Result<Vec<TradeInstruction>> {
    let mut lines = text.lines().enumerate();
    let (_, header) = lines
        .next()
        .ok_or_else(|| Error::Ticket("ticket is empty".into()))?;
    if header != HEADER {
        return Err(Error::Ticket(format!(
            "unexpected header: expected '{HEADER}', got '{header}'"
        )));
    }

    let mut instructions = Vec::new();
    while let Some((idx, line)) = lines.next() {
        let lineno = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        // Quoted fields span lines: while a quote is still open (odd count
        // of quote characters so far), the record continues on the next line.
        let mut record = line.to_string();
        while record.matches('"').count() % 2 == 1 {
            let Some((_, next)) = lines.next() else {
                break;
            };
            record.push('\n');
            record.push_str(next);
        }

        let fields =
            split_record(&record).map_err(|e| Error::Ticket(format!("line {lineno}: {e}")))?;
        if fields.len() != 8 {
            return Err(Error::Ticket(format!(
                "line {lineno}: expected 8 columns, got {}",
                fields.len()
            )));
        }

        let quantity = match fields[3].as_str() {
            "" => None,
            s => Some(s.parse::<f64>().map_err(|_| {
                Error::Ticket(format!("line {lineno}: bad quantity '{s}'"))
            })?),
        };
        let amount: f64 = fields[4].parse().map_err(|_| {
            Error::Ticket(format!("line {lineno}: bad amount '{}'", fields[4]))
        })?;
        let ts = NaiveDateTime::parse_from_str(&fields[7], TS_FORMAT)
            .map_err(|_| Error::Ticket(format!("line {lineno}: bad timestamp '{}'", fields[7])))?
            .and_utc();

        instructions.push(TradeInstruction {
            account_id: fields[0].clone(),
            symbol: fields[1].clone(),
            action: fields[2].parse()?,
            quantity,
            amount_cents: (amount * 100.0).round() as i64,
            order_type: fields[5].parse()?,
            note: fields[6].clone(),
            ts,
        });
    }

    Ok(instructions)
}

/// Write a ticket file, creating parent directories as needed.
pub fn write_ticket(path: &Path, instructions: &[TradeInstruction]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Ticket(format!("failed to create {}: {e}", parent.display())))?;
    }
    fs::write(path, format_ticket(instructions))
        .map_err(|e| Error::Ticket(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::inconsistent_digit_grouping)]

    use super::*;
    use crate::orders::{Action, OrderType};
    use chrono::{TimeZone, Utc};

    fn sample() -> Vec<TradeInstruction> {
        let ts = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        vec![
            TradeInstruction {
                account_id: "U1234567".into(),
                symbol: "SPMO".into(),
                action: Action::Sell,
                quantity: Some(15.5),
                amount_cents: 3330_00,
                order_type: OrderType::Market,
                note: "Rebalance to B301 model (target: 33.34%)".into(),
                ts,
            },
            TradeInstruction {
                account_id: "U1234567".into(),
                symbol: "SMH".into(),
                action: Action::Buy,
                quantity: None,
                amount_cents: 1665_00,
                order_type: OrderType::Market,
                note: "Rebalance to B301 model (target: 33.33%)".into(),
                ts,
            },
        ]
    }

    #[test]
    fn format_emits_fixed_columns() {
        let text = format_ticket(&sample());
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Account_ID,Symbol,Action,Quantity,Amount,Order_Type,Notes,Timestamp"
        );
        assert_eq!(
            lines.next().unwrap(),
            "U1234567,SPMO,SELL,15.5,3330.00,MKT,Rebalance to B301 model (target: 33.34%),2026-08-23 12:00:00"
        );
        assert_eq!(
            lines.next().unwrap(),
            "U1234567,SMH,BUY,,1665.00,MKT,Rebalance to B301 model (target: 33.33%),2026-08-23 12:00:00"
        );
    }

    #[test]
    fn parse_round_trips_instructions() {
        let original = sample();
        let parsed = parse_ticket(&format_ticket(&original)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn reserialization_is_byte_identical() {
        let text = format_ticket(&sample());
        let reserialized = format_ticket(&parse_ticket(&text).unwrap());
        assert_eq!(reserialized, text);
    }

    #[test]
    fn note_with_comma_survives_quoting() {
        let mut instr = sample().remove(0);
        instr.note = "Withdrawal, largest positions first ($25000.00 total)".into();
        let text = format_ticket(std::slice::from_ref(&instr));
        assert!(text.contains("\"Withdrawal, largest positions first"));
        let parsed = parse_ticket(&text).unwrap();
        assert_eq!(parsed[0].note, instr.note);
    }

    #[test]
    fn note_with_newline_round_trips() {
        let mut instr = sample().remove(0);
        instr.note = "first line\nsecond line".into();
        let text = format_ticket(std::slice::from_ref(&instr));
        let parsed = parse_ticket(&text).unwrap();
        assert_eq!(parsed[0].note, instr.note);
        assert_eq!(format_ticket(&parsed), text);
    }

    #[test]
    fn note_with_embedded_quote_survives() {
        let mut instr = sample().remove(0);
        instr.note = r#"client asked for "defensive" tilt"#.into();
        let parsed = parse_ticket(&format_ticket(std::slice::from_ref(&instr))).unwrap();
        assert_eq!(parsed[0].note, instr.note);
    }

    #[test]
    fn empty_ticket_round_trips() {
        let text = format_ticket(&[]);
        assert_eq!(parse_ticket(&text).unwrap(), Vec::new());
    }

    #[test]
    fn reject_wrong_header() {
        assert!(matches!(
            parse_ticket("Symbol,Action\nSPMO,BUY\n"),
            Err(Error::Ticket(_))
        ));
    }

    #[test]
    fn reject_wrong_column_count() {
        let text = format!("{HEADER}\nU1,SPMO,BUY\n");
        let err = parse_ticket(&text).unwrap_err();
        assert!(err.to_string().contains("expected 8 columns"));
    }

    #[test]
    fn reject_bad_amount_and_timestamp() {
        let bad_amount = format!("{HEADER}\nU1,SPMO,BUY,,lots,MKT,n,2026-08-23 12:00:00\n");
        assert!(parse_ticket(&bad_amount).is_err());

        let bad_ts = format!("{HEADER}\nU1,SPMO,BUY,,10.00,MKT,n,yesterday\n");
        assert!(parse_ticket(&bad_ts).is_err());
    }

    #[test]
    fn reject_unterminated_quote() {
        let text = format!("{HEADER}\nU1,SPMO,BUY,,10.00,MKT,\"oops,2026-08-23 12:00:00\n");
        let err = parse_ticket(&text).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn write_ticket_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("orders.csv");
        write_ticket(&path, &sample()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse_ticket(&contents).unwrap(), sample());
    }
}
