use thiserror::Error;

use crate::models::Layout;

#[derive(Error, Debug)]
pub enum ExtractoError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported statement layout in {0}")]
    UnsupportedLayout(String),

    #[error("{layout}: mandatory column '{column}' not found")]
    MissingColumn { layout: Layout, column: &'static str },

    #[error("{file}: column '{column}' is required for reconciliation")]
    ReconcileInput { file: String, column: &'static str },

    #[error("No cleaned {0} found in the processed directory")]
    NotFound(&'static str),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, ExtractoError>;
