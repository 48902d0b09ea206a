// src/ingest/error.rs
use thiserror::Error;

/// Batch-level import failures. The `Display` text is what the user sees;
/// the import is abandoned and the active dataset is left untouched.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Please select an Excel file (.xlsx or .xls)")]
    UnsupportedFileType { filename: String },

    #[error("File must be less than 50MB")]
    TooLarge { size: usize, limit: usize },

    #[error("The Excel file is empty.")]
    EmptyWorkbook,

    #[error("Failed to read the Excel file: {0}")]
    Workbook(String),

    #[error("Google Sheet ID is not configured. Set it in Settings.")]
    MissingSheetId,

    #[error("HTTP error! status: {status}. Sheet may not be public or URL is incorrect.")]
    HttpStatus { status: u16 },

    #[error("Failed to load data from Google Sheets: {0}")]
    Network(String),

    #[error("No data received from Google Sheets")]
    EmptyPayload,

    #[error("Failed to parse CSV data: {0}")]
    Csv(String),

    #[error("No data rows found in Google Sheets")]
    NoRows,
}

impl ImportError {
    /// True when the failure is the caller's input rather than the upstream source.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedFileType { .. }
                | ImportError::TooLarge { .. }
                | ImportError::EmptyWorkbook
                | ImportError::Workbook(_)
                | ImportError::MissingSheetId
        )
    }
}
