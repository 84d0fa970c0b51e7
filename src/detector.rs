use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::layout::Layout;
use crate::models::{BankCode, Cell, DetectionResult, RawGrid};

const SCAN_WINDOW: usize = 5;
const PAYMENT_BANNER: &str = "CONSULTA DE ABONOS RECIBIDOS";
const PAYMENT_ACCOUNT_LABEL: &str = "Nro. Cuenta Destino:";

const BNB_ACCOUNT_LABEL: &str = "Número De cuenta";
const BNB_ACCOUNTS: &[(&str, BankCode)] = &[
    ("1000092297", BankCode::Bnb1),
    ("1000264616", BankCode::Bnb2),
    ("1400017553", BankCode::BnbUsd),
];
// Unlisted accounts under this prefix belong to the main BNB sub-account.
const BNB_DEFAULT_PREFIX: (&str, BankCode) = ("10000", BankCode::Bnb1);

const UNION_MARKER: &str = "Cuenta:";
const UNION_MIN_ACCOUNT_LEN: usize = 9;

fn bcp_account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(-\d+){2,}$").expect("static regex"))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Classify a grid into one of the known layouts and pull out the account
/// number when the file carries one. Never fails: anything unrecognised is
/// `Layout::Unknown`.
pub fn detect(grid: &RawGrid) -> DetectionResult {
    // Payment reports would otherwise trip the account checks below.
    let result = detect_payment_report(grid)
        .or_else(|| detect_bnb(grid))
        .or_else(|| detect_union(grid))
        .or_else(|| detect_bcp(grid))
        .unwrap_or_else(DetectionResult::unknown);
    debug!(
        layout = result.layout.key(),
        account = result.account_id.as_deref().unwrap_or("-"),
        "detection finished"
    );
    result
}

pub fn detect_payment_report(grid: &RawGrid) -> Option<DetectionResult> {
    let banner_row = grid.rows().iter().take(SCAN_WINDOW).position(|row| {
        row.iter()
            .filter_map(Cell::as_str)
            .any(|s| s.to_uppercase().contains(PAYMENT_BANNER))
    })?;

    let account_id = grid
        .rows()
        .iter()
        .skip(banner_row)
        .take(SCAN_WINDOW)
        .find_map(|row| payment_account_in_row(row));

    Some(DetectionResult {
        layout: Layout::PaymentReport,
        bank_code: Some(BankCode::Bcp),
        account_id,
    })
}

fn payment_account_in_row(row: &[Cell]) -> Option<String> {
    let pos = row
        .iter()
        .position(|c| c.as_str().is_some_and(|s| s.contains(PAYMENT_ACCOUNT_LABEL)))?;
    let label = row[pos].as_text();
    let trailing = label.rsplit(':').next().unwrap_or("").trim().to_string();
    if !trailing.is_empty() {
        return Some(trailing);
    }
    // Label and value split across cells.
    row[pos + 1..]
        .iter()
        .map(|c| c.as_text().trim().to_string())
        .find(|s| !s.is_empty())
}

fn detect_bnb(grid: &RawGrid) -> Option<DetectionResult> {
    for row in grid.rows() {
        for (j, cell) in row.iter().enumerate() {
            if cell.as_str().map(str::trim) != Some(BNB_ACCOUNT_LABEL) {
                continue;
            }
            let Some(next) = row.get(j + 1) else { continue };
            let account = next.as_text().trim().to_string();
            if !is_digits(&account) {
                continue;
            }
            let known = BNB_ACCOUNTS
                .iter()
                .find(|(number, _)| *number == account)
                .map(|(_, code)| *code);
            let code = known.or_else(|| {
                account
                    .starts_with(BNB_DEFAULT_PREFIX.0)
                    .then_some(BNB_DEFAULT_PREFIX.1)
            });
            if let Some(code) = code {
                return Some(DetectionResult {
                    layout: Layout::Bnb,
                    bank_code: Some(code),
                    account_id: Some(account),
                });
            }
        }
    }
    None
}

fn detect_union(grid: &RawGrid) -> Option<DetectionResult> {
    for row in grid.rows() {
        let has_marker = row
            .iter()
            .any(|c| c.as_str().is_some_and(|s| s.contains(UNION_MARKER)));
        if !has_marker {
            continue;
        }
        let account = row.iter().find_map(|c| {
            c.as_text()
                .split(|ch: char| ch.is_whitespace() || ch == ':')
                .find(|t| is_digits(t) && t.len() >= UNION_MIN_ACCOUNT_LEN)
                .map(str::to_string)
        });
        if let Some(account) = account {
            return Some(DetectionResult {
                layout: Layout::Union,
                bank_code: Some(BankCode::Union),
                account_id: Some(account),
            });
        }
    }
    None
}

fn detect_bcp(grid: &RawGrid) -> Option<DetectionResult> {
    grid.rows()
        .iter()
        .flat_map(|row| row.iter())
        .filter_map(Cell::as_str)
        .map(str::trim)
        .find(|s| bcp_account_re().is_match(s))
        .map(|account| DetectionResult {
            layout: Layout::Bcp,
            bank_code: Some(BankCode::Bcp),
            account_id: Some(account.to_string()),
        })
}
