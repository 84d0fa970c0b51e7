use colored::Colorize;

use crate::detector::detect;
use crate::error::Result;
use crate::grid::read_grid;
use crate::header::{locate_header, HeaderMatch};
use crate::models::Layout;
use crate::settings::Paths;

pub fn run(paths: &Paths, file: &str) -> Result<()> {
    let path = paths.locate_input(file);
    let grid = read_grid(&path)?;
    let detection = detect(&grid);

    println!("{} {}", "File:".bold(), path.display());
    if detection.layout == Layout::Unknown {
        println!("{} {}", "Layout:".bold(), "unknown".red());
        return Ok(());
    }
    println!("{} {}", "Layout:".bold(), detection.layout.to_string().green());
    println!(
        "{} {}",
        "Bank:".bold(),
        detection.bank_code.map(|b| b.to_string()).unwrap_or_else(|| "-".into())
    );
    println!("{} {}", "Account:".bold(), detection.account_id.as_deref().unwrap_or("-"));
    match locate_header(&grid, detection.layout) {
        HeaderMatch::Found(i) => println!("{} row {}", "Header:".bold(), i + 1),
        HeaderMatch::Defaulted => println!("{} {}", "Header:".bold(), "not found".yellow()),
    }
    Ok(())
}
