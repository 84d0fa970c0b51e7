use tracing::{debug, warn};

use crate::layout::Layout;
use crate::models::{Cell, RawGrid};

/// Outcome of the header scan. `Defaulted` means no row carried the layout's
/// tokens and extraction falls back to row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatch {
    Found(usize),
    Defaulted,
}

impl HeaderMatch {
    pub fn index(&self) -> usize {
        match self {
            Self::Found(i) => *i,
            Self::Defaulted => 0,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

fn row_has_token(row: &[Cell], token: &str, case_sensitive: bool) -> bool {
    row.iter().filter_map(Cell::as_str).any(|text| {
        if case_sensitive {
            text.contains(token)
        } else {
            text.to_lowercase().contains(&token.to_lowercase())
        }
    })
}

/// First row, top to bottom, in which every header token of `layout` appears.
pub fn locate_header(grid: &RawGrid, layout: Layout) -> HeaderMatch {
    let tokens = layout.header_tokens();
    if tokens.is_empty() {
        return HeaderMatch::Defaulted;
    }
    let case_sensitive = layout.header_case_sensitive();
    let found = grid
        .rows()
        .iter()
        .position(|row| {
            tokens
                .iter()
                .all(|spellings| spellings.iter().any(|t| row_has_token(row, t, case_sensitive)))
        });
    match found {
        Some(i) => {
            debug!(layout = layout.key(), row = i, "header row located");
            HeaderMatch::Found(i)
        }
        None => {
            warn!(layout = layout.key(), "no header row found, defaulting to row 0");
            HeaderMatch::Defaulted
        }
    }
}
