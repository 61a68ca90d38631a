//! Model portfolio store: MP master CSV loading and validation.
//!
//! The master file carries one row per (portfolio, holding):
//! `Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date`.
//! Weights are 0-100 percentages and must sum to 100 per portfolio.

use std::path::Path;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::ticket::split_record;

/// Allowed deviation of a portfolio's weight sum from 100.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

const COLUMNS: [&str; 6] = [
    "Portfolio_ID",
    "Bucket_Name",
    "ISIN",
    "Symbol",
    "Weight",
    "Effective_Date",
];

/// One holding of a model portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    /// Target weight as a 0-100 percentage, matching the master file format.
    pub weight_pct: f64,
    pub isin: Option<String>,
}

/// A named target allocation whose holdings sum to 100%.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPortfolio {
    pub portfolio_id: String,
    pub bucket_name: String,
    pub effective_date: NaiveDate,
    pub holdings: Vec<Holding>,
}

impl ModelPortfolio {
    /// Target weights as symbol -> percentage.
    pub fn target_weights(&self) -> FxHashMap<&str, f64> {
        self.holdings
            .iter()
            .map(|h| (h.symbol.as_str(), h.weight_pct))
            .collect()
    }

    /// Target weight for a symbol, if the portfolio holds it.
    pub fn weight(&self, symbol: &str) -> Option<f64> {
        self.holdings
            .iter()
            .find(|h| h.symbol == symbol)
            .map(|h| h.weight_pct)
    }

    pub fn total_weight(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight_pct).sum()
    }
}

/// All model portfolios from one master file, keyed by portfolio id.
#[derive(Debug, Clone)]
pub struct ModelPortfolioSet {
    portfolios: FxHashMap<String, ModelPortfolio>,
}

impl ModelPortfolioSet {
    /// Load and validate the MP master CSV.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ModelRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_csv(&contents)
    }

    /// Parse from CSV text (useful for testing).
    pub fn from_csv(contents: &str) -> Result<Self> {
        let mut lines = contents
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| Error::DataFormat("master file is empty".into()))?;
        let header_fields =
            split_record(header).map_err(|e| Error::DataFormat(format!("header: {e}")))?;
        if header_fields != COLUMNS {
            return Err(Error::DataFormat(format!(
                "unexpected header: expected '{}', got '{}'",
                COLUMNS.join(","),
                header_fields.join(","),
            )));
        }

        let mut portfolios: FxHashMap<String, ModelPortfolio> = FxHashMap::default();

        for (idx, line) in lines {
            let lineno = idx + 1;
            let fields = split_record(line)
                .map_err(|e| Error::DataFormat(format!("line {lineno}: {e}")))?;
            if fields.len() != COLUMNS.len() {
                return Err(Error::DataFormat(format!(
                    "line {lineno}: expected {} columns, got {}",
                    COLUMNS.len(),
                    fields.len(),
                )));
            }

            let portfolio_id = fields[0].trim().to_string();
            let bucket_name = fields[1].trim().to_string();
            let isin = match fields[2].trim() {
                "" => None,
                s => Some(s.to_string()),
            };
            let symbol = fields[3].trim().to_string();
            let weight_raw = fields[4].trim();
            let date_raw = fields[5].trim();

            if portfolio_id.is_empty() {
                return Err(Error::DataFormat(format!("line {lineno}: empty portfolio id")));
            }
            if symbol.is_empty() {
                return Err(Error::DataFormat(format!("line {lineno}: empty symbol")));
            }

            let weight_pct: f64 = weight_raw.parse().map_err(|_| {
                Error::DataFormat(format!("line {lineno}: non-numeric weight '{weight_raw}'"))
            })?;
            if !weight_pct.is_finite() || weight_pct <= 0.0 || weight_pct > 100.0 {
                return Err(Error::DataFormat(format!(
                    "line {lineno}: weight {weight_pct} for {symbol} outside (0, 100]; omit the row instead of a zero weight"
                )));
            }

            let effective_date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d").map_err(|_| {
                Error::DataFormat(format!("line {lineno}: malformed date '{date_raw}'"))
            })?;

            let entry = portfolios
                .entry(portfolio_id.clone())
                .or_insert_with(|| ModelPortfolio {
                    portfolio_id: portfolio_id.clone(),
                    bucket_name: bucket_name.clone(),
                    effective_date,
                    holdings: Vec::new(),
                });

            if entry.effective_date != effective_date {
                return Err(Error::DataFormat(format!(
                    "line {lineno}: portfolio {portfolio_id} has inconsistent effective dates ({} vs {})",
                    entry.effective_date, effective_date,
                )));
            }
            if entry.holdings.iter().any(|h| h.symbol == symbol) {
                return Err(Error::DataFormat(format!(
                    "line {lineno}: duplicate symbol {symbol} in portfolio {portfolio_id}"
                )));
            }

            entry.holdings.push(Holding {
                symbol,
                weight_pct,
                isin,
            });
        }

        if portfolios.is_empty() {
            return Err(Error::DataFormat("master file has no portfolio rows".into()));
        }

        for portfolio in portfolios.values() {
            let total = portfolio.total_weight();
            if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(Error::DataFormat(format!(
                    "portfolio {} weights sum to {total:.4}%, expected 100% +/- {WEIGHT_SUM_TOLERANCE}",
                    portfolio.portfolio_id,
                )));
            }
        }

        Ok(Self { portfolios })
    }

    /// Find a portfolio by id.
    pub fn lookup(&self, portfolio_id: &str) -> Result<&ModelPortfolio> {
        self.portfolios
            .get(portfolio_id)
            .ok_or_else(|| Error::NotFound(format!("model portfolio '{portfolio_id}'")))
    }

    /// Sorted portfolio ids.
    pub fn portfolio_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.portfolios.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master_csv() -> &'static str {
        "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
         B301,GTAA Core,US78464A8541,SPMO,33.34,2026-08-01\n\
         B301,GTAA Core,,SMH,33.33,2026-08-01\n\
         B301,GTAA Core,,IAU,33.33,2026-08-01\n\
         B302,Defensive,,SHY,60.0,2026-08-01\n\
         B302,Defensive,,IEF,40.0,2026-08-01\n"
    }

    #[test]
    fn parse_valid_master() {
        let set = ModelPortfolioSet::from_csv(master_csv()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.portfolio_ids(), vec!["B301", "B302"]);

        let gtaa = set.lookup("B301").unwrap();
        assert_eq!(gtaa.bucket_name, "GTAA Core");
        assert_eq!(gtaa.holdings.len(), 3);
        assert_eq!(gtaa.weight("SPMO"), Some(33.34));
        assert_eq!(gtaa.holdings[0].isin.as_deref(), Some("US78464A8541"));
        assert_eq!(gtaa.holdings[1].isin, None);
        assert_eq!(
            gtaa.effective_date,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
        );
    }

    #[test]
    fn lookup_unknown_id_is_not_found() {
        let set = ModelPortfolioSet::from_csv(master_csv()).unwrap();
        assert!(matches!(set.lookup("B999"), Err(Error::NotFound(_))));
    }

    #[test]
    fn reject_weights_summing_low() {
        // 99.98 is outside the +/- 0.01 tolerance
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,49.99,2026-01-01\n\
                   B1,Test,,BBB,49.99,2026-01-01\n";
        assert!(matches!(
            ModelPortfolioSet::from_csv(csv),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn reject_weights_summing_high() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,50.01,2026-01-01\n\
                   B1,Test,,BBB,50.01,2026-01-01\n";
        assert!(matches!(
            ModelPortfolioSet::from_csv(csv),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn accept_weights_within_tolerance() {
        // 100.005 is inside the +/- 0.01 tolerance
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,50.0,2026-01-01\n\
                   B1,Test,,BBB,50.005,2026-01-01\n";
        let set = ModelPortfolioSet::from_csv(csv).unwrap();
        assert_eq!(set.lookup("B1").unwrap().holdings.len(), 2);
    }

    #[test]
    fn reject_duplicate_symbol() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,50.0,2026-01-01\n\
                   B1,Test,,AAA,50.0,2026-01-01\n";
        let err = ModelPortfolioSet::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("duplicate symbol"));
    }

    #[test]
    fn reject_non_numeric_weight() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,fifty,2026-01-01\n";
        let err = ModelPortfolioSet::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("non-numeric weight"));
    }

    #[test]
    fn reject_zero_weight() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,0.0,2026-01-01\n\
                   B1,Test,,BBB,100.0,2026-01-01\n";
        assert!(ModelPortfolioSet::from_csv(csv).is_err());
    }

    #[test]
    fn reject_malformed_date() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,100.0,01/08/2026\n";
        let err = ModelPortfolioSet::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("malformed date"));
    }

    #[test]
    fn reject_inconsistent_effective_dates() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,,AAA,50.0,2026-01-01\n\
                   B1,Test,,BBB,50.0,2026-02-01\n";
        let err = ModelPortfolioSet::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("inconsistent effective dates"));
    }

    #[test]
    fn reject_wrong_header() {
        let csv = "Id,Name,Symbol,Weight\nB1,Test,AAA,100.0\n";
        assert!(matches!(
            ModelPortfolioSet::from_csv(csv),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn reject_wrong_column_count() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,Test,AAA,100.0,2026-01-01\n";
        let err = ModelPortfolioSet::from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("expected 6 columns"));
    }

    #[test]
    fn reject_empty_file() {
        assert!(ModelPortfolioSet::from_csv("").is_err());
        assert!(
            ModelPortfolioSet::from_csv("Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n")
                .is_err()
        );
    }

    #[test]
    fn quoted_bucket_name_with_comma() {
        let csv = "Portfolio_ID,Bucket_Name,ISIN,Symbol,Weight,Effective_Date\n\
                   B1,\"Growth, Global\",,AAA,100.0,2026-01-01\n";
        let set = ModelPortfolioSet::from_csv(csv).unwrap();
        assert_eq!(set.lookup("B1").unwrap().bucket_name, "Growth, Global");
    }
}
