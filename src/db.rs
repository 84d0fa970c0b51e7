use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::CanonicalTransaction;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    bank_code TEXT NOT NULL,
    account_number TEXT NOT NULL,
    import_batch_id TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS bank_transactions (
    id INTEGER PRIMARY KEY,
    bank_code TEXT NOT NULL,
    account_number TEXT NOT NULL,
    company_voucher TEXT NOT NULL UNIQUE,
    bank_voucher TEXT,
    transaction_date TEXT,
    transaction_time TEXT,
    description TEXT,
    transaction_type TEXT NOT NULL,
    reference_number TEXT,
    debit_amount TEXT,
    credit_amount TEXT,
    balance TEXT,
    itf_amount TEXT NOT NULL DEFAULT '0',
    branch_office TEXT,
    additional_details TEXT,
    import_batch_id TEXT NOT NULL,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_bank_transactions_date ON bank_transactions(transaction_date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResult {
    pub inserted: usize,
    pub skipped: usize,
    pub duplicate_file: bool,
}

/// Persist one batch. A file whose checksum was already imported is skipped
/// whole; individual rows whose company voucher already exists are ignored.
pub fn store_transactions(
    conn: &mut Connection,
    file_path: &Path,
    transactions: &[CanonicalTransaction],
) -> Result<StoreResult> {
    let checksum = compute_checksum(file_path)?;
    {
        let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1")?;
        if stmt.exists([&checksum])? {
            info!(path = %file_path.display(), "file already imported");
            return Ok(StoreResult {
                inserted: 0,
                skipped: 0,
                duplicate_file: true,
            });
        }
    }

    let dates: Vec<String> = transactions
        .iter()
        .filter_map(|t| t.transaction_date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    let first = transactions.first();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO imports (filename, bank_code, account_number, import_batch_id, record_count, date_range_start, date_range_end, checksum) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            first.map(|t| t.bank_code.as_str()).unwrap_or(""),
            first.map(|t| t.account_number.as_str()).unwrap_or(""),
            first.map(|t| t.import_batch_id.as_str()).unwrap_or(""),
            transactions.len() as i64,
            dates.iter().min(),
            dates.iter().max(),
            checksum,
        ],
    )?;
    let import_id = tx.last_insert_rowid();

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO bank_transactions (bank_code, account_number, company_voucher, bank_voucher, transaction_date, transaction_time, description, transaction_type, reference_number, debit_amount, credit_amount, balance, itf_amount, branch_office, additional_details, import_batch_id, import_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        for t in transactions {
            let changed = stmt.execute(rusqlite::params![
                t.bank_code.as_str(),
                t.account_number,
                t.company_voucher,
                t.bank_voucher,
                t.transaction_date.map(|d| d.format("%Y-%m-%d").to_string()),
                t.transaction_time.map(|d| d.format("%H:%M:%S").to_string()),
                t.description,
                t.transaction_type.as_str(),
                t.reference_number,
                t.debit_amount.map(|d| d.to_string()),
                t.credit_amount.map(|d| d.to_string()),
                t.balance.map(|d| d.to_string()),
                t.itf_amount.to_string(),
                t.branch_office,
                t.additional_details,
                t.import_batch_id,
                import_id,
            ])?;
            if changed == 0 {
                debug!(voucher = %t.company_voucher, "already stored");
                skipped += 1;
            } else {
                inserted += 1;
            }
        }
    }
    tx.commit()?;

    Ok(StoreResult {
        inserted,
        skipped,
        duplicate_file: false,
    })
}
