use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ExtractoError, Result};
use crate::models::{Cell, RawGrid};
#[cfg(feature = "excel")]
use crate::normalize::excel_serial_to_datetime;

const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Load the first sheet of a spreadsheet (or a headerless CSV) as raw cells.
pub fn read_grid(path: &Path) -> Result<RawGrid> {
    if !path.exists() {
        return Err(ExtractoError::FileNotFound(path.display().to_string()));
    }
    let ext = extension(path);
    let grid = match ext.as_str() {
        "csv" => read_csv(path)?,
        #[cfg(feature = "excel")]
        e if SPREADSHEET_EXTENSIONS.contains(&e) => read_workbook(path)?,
        _ => return Err(ExtractoError::UnsupportedFormat(path.display().to_string())),
    };
    if grid.is_empty() {
        warn!(path = %path.display(), "no rows in input");
    }
    debug!(path = %path.display(), rows = grid.len(), "grid loaded");
    Ok(grid)
}

fn read_csv(path: &Path) -> Result<RawGrid> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from).collect());
    }
    Ok(RawGrid::new(rows))
}

#[cfg(feature = "excel")]
fn read_workbook(path: &Path) -> Result<RawGrid> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(RawGrid::default()),
    };
    // Keep sheet coordinates: the used range may not start at A1.
    let (top, left) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); top as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; left as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    Ok(RawGrid::new(rows))
}

#[cfg(feature = "excel")]
fn convert_cell(data: &calamine::Data) -> Cell {
    use calamine::Data;

    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match excel_serial_to_datetime(serial) {
                Some(ts) if serial < 1.0 => Cell::Time(ts.time()),
                Some(ts) => Cell::DateTime(ts),
                None => Cell::Number(serial),
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
