use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{ExtractoError, Result};
use crate::layout::{Field, Layout};
use crate::models::{Cell, RawGrid};
use crate::normalize::normalize_text;

static EMPTY: Cell = Cell::Empty;

/// Header-labelled view over the data rows of a grid. Column names are the
/// layout's native labels; every row is padded to the header width.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl LogicalTable {
    /// Build the table from `header_row`, keeping only rows strictly below it
    /// and dropping rows and columns that are entirely empty.
    pub fn from_grid(grid: &RawGrid, header_row: usize) -> Self {
        let header = grid.row(header_row).unwrap_or(&[]);
        let data = grid.rows().get(header_row + 1..).unwrap_or(&[]);

        let width = data
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let columns: Vec<String> = (0..width)
            .map(|i| match header.get(i) {
                Some(cell @ Cell::Text(_)) => {
                    normalize_text(cell, false).unwrap_or_else(|| format!("Unnamed: {i}"))
                }
                _ => format!("Unnamed: {i}"),
            })
            .collect();

        let rows: Vec<Vec<Cell>> = data
            .iter()
            .filter(|r| !r.iter().all(Cell::is_empty))
            .map(|r| {
                let mut row = r.clone();
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        let mut table = Self { columns, rows };
        table.drop_blank_columns();
        table
    }

    // A table without data rows keeps its header intact so that column
    // resolution still reflects the file's real layout.
    fn drop_blank_columns(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|c| self.rows.iter().any(|r| !r[c].is_empty()))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        let mut idx = 0;
        self.columns.retain(|_| {
            idx += 1;
            keep[idx - 1]
        });
        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|_| {
                idx += 1;
                keep[idx - 1]
            });
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find a column by name: exact match against each alternative in
    /// priority order, then case- and space-insensitive containment.
    pub fn resolve(&self, alternatives: &[&str]) -> Option<usize> {
        for alt in alternatives {
            if let Some(i) = self.columns.iter().position(|c| c == alt) {
                return Some(i);
            }
        }
        let squash = |s: &str| s.to_lowercase().replace(' ', "");
        let wanted: Vec<String> = alternatives.iter().map(|a| squash(a)).collect();
        self.columns.iter().position(|c| {
            let have = squash(c);
            wanted.iter().any(|w| have.contains(w.as_str()))
        })
    }

    /// Resolve every column the layout knows about. Optional columns that
    /// can't be found stay unresolved and read as empty; a missing mandatory
    /// column is fatal for the file.
    pub fn resolve_layout(&self, layout: Layout) -> Result<ResolvedColumns> {
        let mut map = HashMap::new();
        for spec in layout.columns() {
            match self.resolve(spec.alternatives) {
                Some(i) => {
                    map.insert(spec.field, i);
                }
                None if spec.required => {
                    return Err(ExtractoError::MissingColumn {
                        layout,
                        column: spec.label(),
                    });
                }
                None => debug!(layout = layout.key(), column = spec.label(), "optional column not found"),
            }
        }
        Ok(ResolvedColumns { map })
    }

    fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|r| keep(r));
    }
}

/// Field → column index lookup produced by [`LogicalTable::resolve_layout`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedColumns {
    map: HashMap<Field, usize>,
}

impl ResolvedColumns {
    pub fn index(&self, field: Field) -> Option<usize> {
        self.map.get(&field).copied()
    }

    /// Cell for `field` in `row`; unresolved columns read as empty.
    pub fn cell<'a>(&self, row: &'a [Cell], field: Field) -> &'a Cell {
        self.index(field).and_then(|i| row.get(i)).unwrap_or(&EMPTY)
    }

    pub fn text_at(&self, row: &[Cell], field: Field) -> String {
        self.cell(row, field).as_text()
    }

    pub fn is_empty_at(&self, row: &[Cell], field: Field) -> bool {
        self.cell(row, field).is_empty()
    }
}

/// Table plus the diagnostics of how it was filtered.
#[derive(Debug, Clone)]
pub struct ExtractedTable {
    pub layout: Layout,
    pub table: LogicalTable,
    pub columns: ResolvedColumns,
    pub rows_before: usize,
    pub rows_after: usize,
}

/// Extract the logical table under `header_row` and keep only the rows the
/// layout considers genuine transactions.
pub fn extract_table(grid: &RawGrid, header_row: usize, layout: Layout) -> Result<ExtractedTable> {
    let mut table = LogicalTable::from_grid(grid, header_row);
    debug!(layout = layout.key(), columns = ?table.columns(), "logical table built");
    if table.is_empty() {
        warn!(layout = layout.key(), header_row, "no data rows below the header");
    }
    let columns = table.resolve_layout(layout)?;
    let rows_before = table.len();
    table.retain_rows(|row| layout.is_transaction(row, &columns));
    let rows_after = table.len();
    debug!(layout = layout.key(), rows_before, rows_after, "filtered transaction rows");
    Ok(ExtractedTable {
        layout,
        table,
        columns,
        rows_before,
        rows_after,
    })
}
