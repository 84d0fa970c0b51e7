use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExtractoError, Result};
use crate::models::{BankCode, CanonicalTransaction, MatchStatus, PaymentReportEntry, TransactionType};
use crate::reconcile::ReconciledTransaction;

pub const PAYMENTS_SUFFIX: &str = "_payments_clean.csv";
pub const BCP_SUFFIX: &str = "_bcp_clean.csv";
pub const ENRICHED_FILE: &str = "bcp_final.csv";

const STATEMENT_MATCH_COLUMNS: &[&str] = &["transaction_date", "debit_amount", "credit_amount"];
const REPORT_MATCH_COLUMNS: &[&str] = &["report_date", "credited_amount"];

fn file_stem(source: &Path) -> String {
    source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("statement")
        .to_string()
}

pub fn statement_output_path(processed_dir: &Path, source: &Path, bank_code: BankCode) -> PathBuf {
    let bank = bank_code.as_str().to_lowercase();
    processed_dir.join(format!("{}_{bank}_clean.csv", file_stem(source)))
}

pub fn payments_output_path(processed_dir: &Path, source: &Path) -> PathBuf {
    processed_dir.join(format!("{}{PAYMENTS_SUFFIX}", file_stem(source)))
}

/// Enriched statement row: the canonical record plus how it was matched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
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
    pub match_status: MatchStatus,
}

impl From<&ReconciledTransaction> for EnrichedRow {
    fn from(r: &ReconciledTransaction) -> Self {
        let t = r.transaction.clone();
        Self {
            bank_code: t.bank_code,
            account_number: t.account_number,
            company_voucher: t.company_voucher,
            bank_voucher: t.bank_voucher,
            transaction_date: t.transaction_date,
            transaction_time: t.transaction_time,
            description: t.description,
            transaction_type: t.transaction_type,
            reference_number: t.reference_number,
            debit_amount: t.debit_amount,
            credit_amount: t.credit_amount,
            balance: t.balance,
            itf_amount: t.itf_amount,
            branch_office: t.branch_office,
            additional_details: t.additional_details,
            import_batch_id: t.import_batch_id,
            match_status: r.status,
        }
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "saved");
    Ok(())
}

// Optional fields deserialize as None when their column is absent, so the
// columns used for matching are checked against the header first.
fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&'static str]) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?;
    if let Some(column) = required.iter().find(|c| !headers.iter().any(|h| h.trim() == **c)) {
        return Err(ExtractoError::ReconcileInput {
            file: path.display().to_string(),
            column: *column,
        });
    }
    let mut rows = Vec::new();
    for record in rdr.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

pub fn write_transactions(path: &Path, rows: &[CanonicalTransaction]) -> Result<()> {
    write_rows(path, rows)
}

pub fn read_transactions(path: &Path) -> Result<Vec<CanonicalTransaction>> {
    read_rows(path, STATEMENT_MATCH_COLUMNS)
}

pub fn write_payment_entries(path: &Path, rows: &[PaymentReportEntry]) -> Result<()> {
    write_rows(path, rows)
}

pub fn read_payment_entries(path: &Path) -> Result<Vec<PaymentReportEntry>> {
    read_rows(path, REPORT_MATCH_COLUMNS)
}

pub fn write_enriched(path: &Path, rows: &[ReconciledTransaction]) -> Result<()> {
    let rows: Vec<EnrichedRow> = rows.iter().map(EnrichedRow::from).collect();
    write_rows(path, &rows)
}

#[cfg(test)]
pub fn read_enriched(path: &Path) -> Result<Vec<EnrichedRow>> {
    read_rows(path, STATEMENT_MATCH_COLUMNS)
}

/// Most recently modified file in `dir` whose name ends with `suffix`.
pub fn latest_matching(dir: &Path, suffix: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if !matches || !path.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let newer = match &best {
            Some((t, p)) => (modified, &path) > (*t, p),
            None => true,
        };
        if newer {
            best = Some((modified, path));
        }
    }
    Ok(best.map(|(_, p)| p))
}
