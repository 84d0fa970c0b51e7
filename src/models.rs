use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use crate::layout::Layout;

/// A single spreadsheet cell as handed over by the ingestion adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl Cell {
    /// Whitespace-only text counts as empty, same as a blank cell.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// String form of the cell. Integral numbers render without a fraction so
    /// that account numbers and operation ids read the way they were typed.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(f) => {
                if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Self::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
            Self::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%d/%m/%Y").to_string()
                } else {
                    dt.format("%d/%m/%Y %H:%M:%S").to_string()
                }
            }
            Self::Time(t) => t.format("%H:%M:%S").to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

/// Row-major grid of raw cells. Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<Cell>>,
}

impl RawGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[Cell]> {
        self.rows.get(idx).map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BankCode {
    #[serde(rename = "BCP")]
    Bcp,
    #[serde(rename = "BNB1")]
    Bnb1,
    #[serde(rename = "BNB2")]
    Bnb2,
    #[serde(rename = "BNBUSD")]
    BnbUsd,
    #[serde(rename = "UNION")]
    Union,
}

impl BankCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bcp => "BCP",
            Self::Bnb1 => "BNB1",
            Self::Bnb2 => "BNB2",
            Self::BnbUsd => "BNBUSD",
            Self::Union => "UNION",
        }
    }
}

impl std::fmt::Display for BankCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub layout: Layout,
    pub bank_code: Option<BankCode>,
    pub account_id: Option<String>,
}

impl DetectionResult {
    pub fn unknown() -> Self {
        Self {
            layout: Layout::Unknown,
            bank_code: None,
            account_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Debit,
    Credit,
    Transfer,
    Other,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "DEBIT",
            Self::Credit => "CREDIT",
            Self::Transfer => "TRANSFER",
            Self::Other => "OTHER",
        }
    }
}

/// Bank-agnostic transaction record, one per genuine statement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub bank_code: BankCode,
    pub account_number: String,
    pub company_voucher: String,
    pub bank_voucher: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub transaction_time: Option<NaiveTime>,
    pub description: Option<String>,
    pub transaction_type: TransactionType,
    pub reference_number: Option<String>,
    pub debit_amount: Option<Decimal>,
    pub credit_amount: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub itf_amount: Decimal,
    pub branch_office: Option<String>,
    pub additional_details: Option<String>,
    pub import_batch_id: String,
}

impl CanonicalTransaction {
    /// Signed amount: credits positive, debits negative.
    pub fn signed_amount(&self) -> Option<Decimal> {
        match (self.debit_amount, self.credit_amount) {
            (None, None) => None,
            (debit, credit) => Some(credit.unwrap_or_default() - debit.unwrap_or_default()),
        }
    }
}

/// A row of the payment-detail report, used only as a reconciliation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReportEntry {
    pub channel: Option<String>,
    pub report_date: Option<NaiveDate>,
    pub report_time: Option<NaiveTime>,
    pub credited_amount: Option<Decimal>,
    pub operation_amount: Option<Decimal>,
    pub operation_currency: Option<String>,
    pub narrative: Option<String>,
    pub holder: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    MultiMatched,
    Unmatched,
}

#[cfg(test)]
pub fn text_grid(rows: &[&[&str]]) -> RawGrid {
    RawGrid::new(
        rows.iter()
            .map(|r| r.iter().map(|c| Cell::from(*c)).collect())
            .collect(),
    )
}
