use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::opt_amount;
use crate::models::MatchStatus;
use crate::pipeline::{self, Enrichment};
use crate::settings::Paths;

pub fn run(paths: &Paths, statement: Option<&str>, report: Option<&str>) -> Result<()> {
    let statement = statement.map(PathBuf::from);
    let report = report.map(PathBuf::from);
    let enrichment = pipeline::enrich(paths, statement.as_deref(), report.as_deref())?;
    print_enrichment(&enrichment);
    Ok(())
}

fn status_cell(status: MatchStatus) -> Cell {
    match status {
        MatchStatus::Matched => Cell::new("matched".green()),
        MatchStatus::MultiMatched => Cell::new("multiple".yellow()),
        MatchStatus::Unmatched => Cell::new("-".dimmed()),
    }
}

pub(crate) fn print_enrichment(enrichment: &Enrichment) {
    let s = &enrichment.stats;
    println!("{}", "Enrichment".bold());
    println!("  statement rows: {}", s.total_statement);
    println!("  report rows:    {}", s.total_report);
    println!("  matched:        {}", s.matched.to_string().green());
    println!("  multiple:       {}", s.multi_matched.to_string().yellow());
    println!("  unmatched:      {}", s.unmatched);

    let mut table = Table::new();
    table.set_header(vec!["Date", "Voucher", "Amount", "Status", "Details"]);
    for row in enrichment.rows.iter().filter(|r| r.status != MatchStatus::Unmatched) {
        let t = &row.transaction;
        table.add_row(vec![
            Cell::new(t.transaction_date.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default()),
            Cell::new(&t.company_voucher),
            Cell::new(opt_amount(t.signed_amount())),
            status_cell(row.status),
            Cell::new(t.additional_details.as_deref().unwrap_or("")),
        ]);
    }
    if s.matched + s.multi_matched > 0 {
        println!("{table}");
    }
    println!("Saved: {}", enrichment.output.display());
}
