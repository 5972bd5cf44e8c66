//! # sheetstream
//!
//! A streaming XLSX writer for very large spreadsheets.
//!
//! ## Features
//!
//! - **Streaming Write**: rows go straight into the compressed package; memory stays
//!   bounded by the flush threshold, not by the row count
//! - **Append-only sheets**: an explicit row/cell state machine with gaps, merges,
//!   validations, filters, page breaks, protection and header/footer
//! - **Deduplicated styles and strings**: one registry entry per distinct format, one
//!   table entry per distinct shared string
//! - **Any destination**: a file via `s-zip`, or any `std::io::Write` via the built-in
//!   ZIP writer (no `Seek` needed, optional ZIP64)
//! - **Async output** (feature `async`) over a tokio `AsyncWrite`
//!
//! ## Quick Start
//!
//! ### Writing rows
//!
//! ```rust,no_run
//! use sheetstream::writer::ExcelWriter;
//! use sheetstream::types::CellValue;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = ExcelWriter::new("output.xlsx")?;
//!
//! // Bold header
//! writer.write_header(["Name", "Age", "City"])?;
//!
//! // Typed values
//! writer.write_row_typed(&[
//!     CellValue::String("Alice".to_string()),
//!     CellValue::Int(30),
//!     CellValue::String("New York".to_string()),
//! ])?;
//!
//! // Formulas are computed when the file is opened
//! writer.write_row_typed(&[
//!     CellValue::String("Total".to_string()),
//!     CellValue::Formula("=COUNT(B2:B10)".to_string()),
//!     CellValue::Empty,
//! ])?;
//!
//! writer.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Cell-level control
//!
//! ```rust,no_run
//! use sheetstream::fast_writer::{WorkbookWriter, WriterOptions};
//! use sheetstream::style::CellStyle;
//! use sheetstream::types::DataValidation;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bold = CellStyle::header_bold().shared();
//! let mut workbook = WorkbookWriter::from_writer(Vec::new(), WriterOptions::default());
//!
//! workbook.begin_sheet("Orders")?;
//! workbook.begin_row()?;
//! workbook.write_string("Status", Some(&bold))?;
//! workbook.add_data_validation(2, 1, 1000, 1, &DataValidation::list(&["Open", "Closed"]))?;
//! workbook.skip_rows(2)?;
//! workbook.begin_row()?;
//! workbook.write_shared_string("Open", None)?;
//!
//! let bytes = workbook.finish()?.into_inner()?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fast_writer;
pub mod style;
pub mod types;
pub mod writer;

pub use error::{ExcelError, Result};
pub use fast_writer::{WorkbookWriter, WriterOptions};
pub use style::{CellStyle, Style};
pub use types::CellValue;
pub use writer::ExcelWriter;
