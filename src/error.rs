//! Error types for the sheetstream library

use thiserror::Error;

/// Result type alias for sheetstream operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all workbook writing operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// A sheet-level operation was called before any sheet was begun
    #[error("No active worksheet")]
    NoActiveSheet,

    /// A cell operation was called while no row is open
    #[error("No open row in sheet '{sheet}'; call begin_row first")]
    NoActiveRow { sheet: String },

    /// The sheet has already been sealed
    #[error("Sheet '{0}' is closed")]
    SheetClosed(String),

    /// Sheet name is empty, too long or contains forbidden characters
    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: String },

    /// Another sheet already uses this name (case-insensitive)
    #[error("Duplicate sheet name '{0}'")]
    DuplicateSheetName(String),

    /// Row count would exceed the format maximum
    #[error("Row {row} exceeds the maximum of {max} rows")]
    RowLimitExceeded { row: u64, max: u32 },

    /// Column index would exceed the format maximum
    #[error("Column {column} exceeds the maximum of {max} columns")]
    ColumnLimitExceeded { column: u64, max: u32 },

    /// A merge, validation, filter or reference range is out of bounds
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A page break index is outside its allowed range
    #[error("Invalid page break: {0}")]
    InvalidPageBreak(String),

    /// Protection password is empty or too long
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    /// Text contains a character the XML grammar does not allow
    #[error("Invalid XML character U+{code:04X} at position {position}")]
    InvalidCharacter { position: usize, code: u32 },

    /// Value cannot be represented in a cell (e.g. NaN)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The document has already been finalized
    #[error("Workbook already finalized")]
    AlreadyFinalized,

    /// Archive would overflow 32-bit ZIP fields without ZIP64 enabled
    #[error("Archive limit exceeded: {0}")]
    ArchiveLimit(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// s-zip archive error
    #[error("Archive error: {0}")]
    Archive(String),
}

impl From<s_zip::SZipError> for ExcelError {
    fn from(err: s_zip::SZipError) -> Self {
        ExcelError::Archive(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExcelError::InvalidCharacter {
            position: 3,
            code: 0,
        };
        assert_eq!(
            err.to_string(),
            "Invalid XML character U+0000 at position 3"
        );

        let err = ExcelError::RowLimitExceeded {
            row: 1_048_577,
            max: 1_048_576,
        };
        assert!(err.to_string().contains("1048577"));
    }
}
