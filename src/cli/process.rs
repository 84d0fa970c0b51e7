use colored::Colorize;
use comfy_table::{Cell, Table};
use tracing::warn;

use crate::cli::enrich::print_enrichment;
use crate::db::{get_connection, init_db, store_transactions};
use crate::error::Result;
use crate::fmt::opt_amount;
use crate::header::HeaderMatch;
use crate::models::{CanonicalTransaction, PaymentReportEntry};
use crate::pipeline::{self, ProcessedFile, Records};
use crate::settings::Paths;

const PREVIEW_ROWS: usize = 5;

// First and last few items, with the skipped count when the list is long.
fn preview<T>(items: &[T]) -> (Vec<&T>, usize, Vec<&T>) {
    if items.len() <= PREVIEW_ROWS * 2 {
        return (items.iter().collect(), 0, Vec::new());
    }
    let head = items[..PREVIEW_ROWS].iter().collect();
    let tail = items[items.len() - PREVIEW_ROWS..].iter().collect();
    (head, items.len() - PREVIEW_ROWS * 2, tail)
}

fn fmt_date(d: Option<chrono::NaiveDate>) -> String {
    d.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default()
}

fn transaction_table(rows: &[CanonicalTransaction]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Voucher", "Type", "Description", "Debit", "Credit", "Balance"]);
    let (head, skipped, tail) = preview(rows);
    let add = |table: &mut Table, t: &CanonicalTransaction| {
        table.add_row(vec![
            Cell::new(fmt_date(t.transaction_date)),
            Cell::new(&t.company_voucher),
            Cell::new(t.transaction_type.as_str()),
            Cell::new(t.description.as_deref().unwrap_or("")),
            Cell::new(opt_amount(t.debit_amount)),
            Cell::new(opt_amount(t.credit_amount)),
            Cell::new(opt_amount(t.balance)),
        ]);
    };
    for t in head {
        add(&mut table, t);
    }
    if skipped > 0 {
        table.add_row(vec![Cell::new(format!("... {skipped} more").dimmed())]);
    }
    for t in tail {
        add(&mut table, t);
    }
    table
}

fn payment_table(rows: &[PaymentReportEntry]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Channel", "Date", "Credited", "Details"]);
    let (head, skipped, tail) = preview(rows);
    let add = |table: &mut Table, e: &PaymentReportEntry| {
        table.add_row(vec![
            Cell::new(e.channel.as_deref().unwrap_or("")),
            Cell::new(fmt_date(e.report_date)),
            Cell::new(opt_amount(e.credited_amount)),
            Cell::new(e.details.as_deref().unwrap_or("")),
        ]);
    };
    for e in head {
        add(&mut table, e);
    }
    if skipped > 0 {
        table.add_row(vec![Cell::new(format!("... {skipped} more").dimmed())]);
    }
    for e in tail {
        add(&mut table, e);
    }
    table
}

fn print_summary(result: &ProcessedFile) {
    let p = &result.processed;
    let d = &p.detection;
    println!("{} {}", "File:".bold(), result.source.display());
    println!("{} {}", "Layout:".bold(), d.layout.to_string().green());
    if let Some(bank) = d.bank_code {
        println!("{} {}", "Bank:".bold(), bank);
    }
    println!("{} {}", "Account:".bold(), d.account_id.as_deref().unwrap_or("-"));
    match p.header {
        HeaderMatch::Found(i) => println!("{} row {}", "Header:".bold(), i + 1),
        HeaderMatch::Defaulted => println!("{} {}", "Header:".bold(), "not found, using first row".yellow()),
    }
    println!("{} {} read, {} kept", "Rows:".bold(), p.rows_before, p.rows_after);

    if p.records.is_empty() {
        println!("{}", "No transactions found.".yellow());
    } else {
        match &p.records {
            Records::Statement(rows) => println!("{}", transaction_table(rows)),
            Records::Payments(rows) => println!("{}", payment_table(rows)),
        }
    }
    println!("Saved: {}", result.output.display());
}

pub fn run(paths: &Paths, file: &str, store: bool, batch_id: Option<String>) -> Result<()> {
    let source = paths.locate_input(file);
    let batch_id = batch_id.unwrap_or_else(pipeline::new_batch_id);
    let result = pipeline::process_file(paths, &source, &batch_id)?;
    print_summary(&result);

    if let Some(enrichment) = &result.enrichment {
        println!();
        print_enrichment(enrichment);
    }

    if store {
        match &result.processed.records {
            Records::Statement(rows) => {
                let mut conn = get_connection(&paths.db_path)?;
                init_db(&conn)?;
                let stored = store_transactions(&mut conn, &source, rows)?;
                if stored.duplicate_file {
                    println!("This file has already been stored (duplicate checksum).");
                } else {
                    println!("{} stored, {} skipped (duplicates)", stored.inserted, stored.skipped);
                }
            }
            Records::Payments(_) => warn!("--store only applies to bank statements"),
        }
    }
    Ok(())
}
