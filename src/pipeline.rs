use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::detector::detect;
use crate::error::{ExtractoError, Result};
use crate::grid::read_grid;
use crate::header::{locate_header, HeaderMatch};
use crate::mapper::{map_payment_entries, map_to_canonical};
use crate::models::{BankCode, CanonicalTransaction, DetectionResult, Layout, PaymentReportEntry, RawGrid};
use crate::reconcile::{reconcile, MatchStats, ReconciledTransaction};
use crate::settings::Paths;
use crate::storage;
use crate::table::extract_table;

/// `{YYYYMMDDHHMMSS}-{8 hex}`: sortable by time, unique per run.
pub fn new_batch_id() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let salt: [u8; 4] = rand::random();
    format!("{stamp}-{}", hex::encode(salt))
}

#[derive(Debug, Clone)]
pub enum Records {
    Statement(Vec<CanonicalTransaction>),
    Payments(Vec<PaymentReportEntry>),
}

impl Records {
    pub fn len(&self) -> usize {
        match self {
            Self::Statement(rows) => rows.len(),
            Self::Payments(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything learned while turning one grid into records.
#[derive(Debug, Clone)]
pub struct ProcessedGrid {
    pub detection: DetectionResult,
    pub header: HeaderMatch,
    pub rows_before: usize,
    pub rows_after: usize,
    pub records: Records,
}

/// Detect, locate the header, filter and map a grid. `source` only labels errors.
pub fn process_grid(grid: &RawGrid, source: &str, batch_id: &str) -> Result<ProcessedGrid> {
    let detection = detect(grid);
    let layout = detection.layout;
    if layout == Layout::Unknown {
        return Err(ExtractoError::UnsupportedLayout(source.to_string()));
    }
    info!(layout = layout.key(), account = detection.account_id.as_deref().unwrap_or("-"), "detected");

    let header = locate_header(grid, layout);
    let extracted = extract_table(grid, header.index(), layout)?;
    info!(
        header_row = header.index(),
        header_found = header.is_found(),
        rows_before = extracted.rows_before,
        rows_after = extracted.rows_after,
        "extracted transaction rows"
    );

    let records = if layout.is_statement() {
        let bank_code = detection.bank_code.unwrap_or(BankCode::Bcp);
        let account = detection.account_id.as_deref().unwrap_or_default();
        Records::Statement(map_to_canonical(&extracted, bank_code, account, batch_id))
    } else {
        Records::Payments(map_payment_entries(&extracted))
    };

    Ok(ProcessedGrid {
        detection,
        header,
        rows_before: extracted.rows_before,
        rows_after: extracted.rows_after,
        records,
    })
}

#[derive(Debug, Clone)]
pub struct Enrichment {
    pub rows: Vec<ReconciledTransaction>,
    pub stats: MatchStats,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub source: PathBuf,
    pub processed: ProcessedGrid,
    pub output: PathBuf,
    pub enrichment: Option<Enrichment>,
}

/// Full run for one input file: clean it, save the cleaned CSV and, when the
/// counterpart of a BCP statement/payment report pair is already on disk,
/// enrich the statement.
pub fn process_file(paths: &Paths, source: &Path, batch_id: &str) -> Result<ProcessedFile> {
    let grid = read_grid(source)?;
    let processed = process_grid(&grid, &source.display().to_string(), batch_id)?;
    paths.ensure_dirs()?;

    let (output, enrichment) = match &processed.records {
        Records::Statement(rows) => {
            let bank_code = processed.detection.bank_code.unwrap_or(BankCode::Bcp);
            let output = storage::statement_output_path(&paths.processed_dir, source, bank_code);
            storage::write_transactions(&output, rows)?;
            let enrichment = match (bank_code, storage::latest_matching(&paths.processed_dir, storage::PAYMENTS_SUFFIX)?) {
                (BankCode::Bcp, Some(report)) => Some(enrich(paths, Some(&output), Some(&report))?),
                _ => None,
            };
            (output, enrichment)
        }
        Records::Payments(rows) => {
            let output = storage::payments_output_path(&paths.processed_dir, source);
            storage::write_payment_entries(&output, rows)?;
            let enrichment = match storage::latest_matching(&paths.processed_dir, storage::BCP_SUFFIX)? {
                Some(statement) => Some(enrich(paths, Some(&statement), Some(&output))?),
                None => None,
            };
            (output, enrichment)
        }
    };

    Ok(ProcessedFile {
        source: source.to_path_buf(),
        processed,
        output,
        enrichment,
    })
}

/// Reconcile a cleaned BCP statement against a cleaned payment report and
/// write the result to `bcp_final.csv`. Missing paths default to the newest
/// cleaned file of each kind.
pub fn enrich(paths: &Paths, statement: Option<&Path>, report: Option<&Path>) -> Result<Enrichment> {
    let statement = match statement {
        Some(p) => p.to_path_buf(),
        None => storage::latest_matching(&paths.processed_dir, storage::BCP_SUFFIX)?
            .ok_or(ExtractoError::NotFound("BCP statement"))?,
    };
    let report = match report {
        Some(p) => p.to_path_buf(),
        None => storage::latest_matching(&paths.processed_dir, storage::PAYMENTS_SUFFIX)?
            .ok_or(ExtractoError::NotFound("payment report"))?,
    };
    for path in [&statement, &report] {
        if !path.exists() {
            return Err(ExtractoError::FileNotFound(path.display().to_string()));
        }
    }
    info!(statement = %statement.display(), report = %report.display(), "enriching");

    let transactions = storage::read_transactions(&statement)?;
    if transactions.iter().any(|t| t.bank_code != BankCode::Bcp) {
        warn!(path = %statement.display(), "statement contains non-BCP transactions");
    }
    let entries = storage::read_payment_entries(&report)?;
    let (rows, stats) = reconcile(&transactions, &entries);

    let output = paths.processed_dir.join(storage::ENRICHED_FILE);
    storage::write_enriched(&output, &rows)?;
    Ok(Enrichment { rows, stats, output })
}
