//! Cell reference generation
//!
//! Column names use bijective base-26 (1 -> A, 26 -> Z, 27 -> AA). The whole valid
//! range is small, so names are computed once into a shared read-only table.

use crate::error::{ExcelError, Result};
use once_cell::sync::Lazy;

/// Maximum number of columns in a sheet (XFD)
pub const MAX_COLUMNS: u32 = 16_384;
/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

static COLUMN_NAMES: Lazy<Vec<Box<str>>> = Lazy::new(|| {
    (1..=MAX_COLUMNS)
        .map(|col| encode_column(col).into_boxed_str())
        .collect()
});

fn encode_column(col: u32) -> String {
    let mut letters = [0u8; 3];
    let mut start = letters.len();
    let mut n = col;
    while n > 0 {
        let rem = (n - 1) % 26;
        start -= 1;
        letters[start] = b'A' + rem as u8;
        n = (n - 1) / 26;
    }
    letters[start..].iter().map(|&b| b as char).collect()
}

/// Column letters for a 1-based column index
pub fn column_name(col: u32) -> Result<&'static str> {
    if col == 0 || col > MAX_COLUMNS {
        return Err(ExcelError::ColumnLimitExceeded {
            column: col as u64,
            max: MAX_COLUMNS,
        });
    }
    Ok(&COLUMN_NAMES[(col - 1) as usize])
}

fn check_row(row: u32) -> Result<()> {
    if row == 0 || row > MAX_ROWS {
        return Err(ExcelError::RowLimitExceeded {
            row: row as u64,
            max: MAX_ROWS,
        });
    }
    Ok(())
}

/// `"B7"` style reference for a 1-based row and column
pub fn cell_reference(row: u32, col: u32) -> Result<String> {
    check_row(row)?;
    let mut num = itoa::Buffer::new();
    let name = column_name(col)?;
    let digits = num.format(row);
    let mut out = String::with_capacity(name.len() + digits.len());
    out.push_str(name);
    out.push_str(digits);
    Ok(out)
}

/// A rectangular block of cells, 1-based and inclusive of its first cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u32,
    pub row_count: u32,
    pub col_count: u32,
}

impl CellRange {
    /// Validate a block starting at (`first_row`, `first_col`) spanning `row_count` x `col_count`
    pub fn new(first_row: u32, first_col: u32, row_count: u32, col_count: u32) -> Result<Self> {
        if row_count == 0 || col_count == 0 {
            return Err(ExcelError::InvalidRange(format!(
                "range must cover at least one row and column, got {}x{}",
                row_count, col_count
            )));
        }
        let range = CellRange {
            first_row,
            first_col,
            row_count,
            col_count,
        };
        let last_row = first_row as u64 + row_count as u64 - 1;
        let last_col = first_col as u64 + col_count as u64 - 1;
        if first_row == 0 || last_row > MAX_ROWS as u64 {
            return Err(ExcelError::InvalidRange(format!(
                "rows {}..={} outside 1..={}",
                first_row, last_row, MAX_ROWS
            )));
        }
        if first_col == 0 || last_col > MAX_COLUMNS as u64 {
            return Err(ExcelError::InvalidRange(format!(
                "columns {}..={} outside 1..={}",
                first_col, last_col, MAX_COLUMNS
            )));
        }
        Ok(range)
    }

    pub fn last_row(&self) -> u32 {
        self.first_row + self.row_count - 1
    }

    pub fn last_col(&self) -> u32 {
        self.first_col + self.col_count - 1
    }

    /// `"A1:C4"`, or `"A1"` for a single cell
    pub fn reference(&self) -> String {
        self.format(false)
    }

    /// `"$A$1:$C$4"`, as used by defined names
    pub fn absolute_reference(&self) -> String {
        self.format(true)
    }

    fn format(&self, absolute: bool) -> String {
        let mut out = String::with_capacity(16);
        let mut num = itoa::Buffer::new();
        // Bounds were validated in `new`, indexing cannot fail.
        let mut push_cell = |out: &mut String, row: u32, col: u32| {
            if absolute {
                out.push('$');
            }
            out.push_str(&COLUMN_NAMES[(col - 1) as usize]);
            if absolute {
                out.push('$');
            }
            out.push_str(num.format(row));
        };
        push_cell(&mut out, self.first_row, self.first_col);
        if self.row_count > 1 || self.col_count > 1 || absolute {
            out.push(':');
            push_cell(&mut out, self.last_row(), self.last_col());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(1).unwrap(), "A");
        assert_eq!(column_name(26).unwrap(), "Z");
        assert_eq!(column_name(27).unwrap(), "AA");
        assert_eq!(column_name(702).unwrap(), "ZZ");
        assert_eq!(column_name(703).unwrap(), "AAA");
        assert_eq!(column_name(16384).unwrap(), "XFD");
    }

    #[test]
    fn test_column_names_out_of_range() {
        assert!(column_name(0).is_err());
        assert!(column_name(16385).is_err());
    }

    #[test]
    fn test_column_names_are_bijective() {
        let mut seen = std::collections::HashSet::new();
        for col in 1..=MAX_COLUMNS {
            assert!(seen.insert(column_name(col).unwrap()));
        }
    }

    #[test]
    fn test_cell_ref() {
        assert_eq!(cell_reference(1, 1).unwrap(), "A1");
        assert_eq!(cell_reference(100, 27).unwrap(), "AA100");
        assert_eq!(cell_reference(1_048_576, 16_384).unwrap(), "XFD1048576");
        assert!(cell_reference(0, 1).is_err());
        assert!(cell_reference(1_048_577, 1).is_err());
    }

    #[test]
    fn test_ranges() {
        let range = CellRange::new(2, 1, 3, 4).unwrap();
        assert_eq!(range.reference(), "A2:D4");
        assert_eq!(range.absolute_reference(), "$A$2:$D$4");

        let single = CellRange::new(5, 2, 1, 1).unwrap();
        assert_eq!(single.reference(), "B5");

        assert!(CellRange::new(1, 1, 0, 1).is_err());
        assert!(CellRange::new(1, 16_384, 1, 2).is_err());
        assert!(CellRange::new(1_048_576, 1, 2, 1).is_err());
    }
}
