//! Fast Excel writer optimized for streaming
//!
//! This module holds the streaming engine:
//! - `xml_writer`: reusable output buffer with validating escapes
//! - `styles` / `shared_strings`: workbook-wide registries serialized at the end
//! - `worksheet`: the per-sheet row/cell state machine
//! - `workbook`: sheet sequencing and package assembly
//! - `archive` / `streaming_zip_writer`: where the package bytes go

pub mod archive;
#[cfg(feature = "async")]
pub mod async_writer;
pub mod cell_ref;
pub mod options;
pub mod parts;
pub mod protection;
pub mod shared_strings;
pub mod streaming_zip_writer;
pub mod styles;
pub mod workbook;
pub mod worksheet;
pub mod xml_writer;

use crate::error::Result;
use std::path::Path;

pub use archive::{ArchiveSink, SZipSink};
#[cfg(feature = "async")]
pub use async_writer::AsyncWorkbookWriter;
pub use cell_ref::{cell_reference, column_name, CellRange, MAX_COLUMNS, MAX_ROWS};
pub use options::{InvalidCharPolicy, MemoryProfile, WriterOptions};
pub use streaming_zip_writer::ZipPackage;
pub use workbook::WorkbookWriter;
pub use worksheet::{SheetState, SheetWriter};

/// Create a file-backed workbook writer with its flush threshold taken from
/// `MEMORY_LIMIT_MB` (see [`MemoryProfile::from_env`])
///
/// # Examples
///
/// ```no_run
/// use sheetstream::fast_writer::create_workbook_auto;
///
/// let mut workbook = create_workbook_auto("output.xlsx")?;
/// workbook.begin_sheet("Sheet1")?;
/// workbook.begin_row()?;
/// workbook.write_string("hello", None)?;
/// workbook.finalize()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_workbook_auto<P: AsRef<Path>>(path: P) -> Result<WorkbookWriter<SZipSink>> {
    create_workbook_with_profile(path, MemoryProfile::from_env())
}

/// Create a file-backed workbook writer with a specific memory profile
pub fn create_workbook_with_profile<P: AsRef<Path>>(
    path: P,
    profile: MemoryProfile,
) -> Result<WorkbookWriter<SZipSink>> {
    WorkbookWriter::create(path, WriterOptions::default().memory_profile(profile))
}
