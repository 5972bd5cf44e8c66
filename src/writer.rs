//! Row-oriented convenience writer
//!
//! `ExcelWriter` sits on top of [`WorkbookWriter`] for the common case: a file
//! path, rows of values, maybe a bold header. Data is streamed to disk as rows
//! are written; nothing is kept in memory beyond the current flush buffer and
//! the workbook-wide style/string registries.

use crate::error::Result;
use crate::fast_writer::workbook::DEFAULT_SHEET_NAME;
use crate::fast_writer::{MemoryProfile, SZipSink, WorkbookWriter, WriterOptions};
use crate::style::{CellStyle, Style};
use crate::types::{CellValue, DocumentProperties, SheetOptions};
use std::path::{Path, PathBuf};

/// Excel file writer with streaming row output
///
/// # Examples
///
/// ```no_run
/// use sheetstream::writer::ExcelWriter;
///
/// let mut writer = ExcelWriter::new("output.xlsx").unwrap();
///
/// writer.write_header(["Name", "Age", "Email"]).unwrap();
/// for i in 0..1_000_000 {
///     writer.write_row(["Alice", "30", "alice@example.com"]).unwrap();
/// }
///
/// writer.save().unwrap();
/// ```
pub struct ExcelWriter {
    inner: WorkbookWriter<SZipSink>,
    current_sheet_name: String,
    header_style: Style,
}

impl ExcelWriter {
    /// Create a writer with default options and a first sheet named `Sheet1`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        ExcelWriterBuilder::new(path).build()
    }

    /// Create a writer with explicit options
    pub fn with_options<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        ExcelWriterBuilder::new(path).with_options(options).build()
    }

    /// Write a row of text cells
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sheetstream::writer::ExcelWriter;
    ///
    /// let mut writer = ExcelWriter::new("output.xlsx").unwrap();
    /// writer.write_row(["Alice", "30", "New York"]).unwrap();
    /// writer.write_row(["Bob", "25", "San Francisco"]).unwrap();
    /// writer.save().unwrap();
    /// ```
    pub fn write_row<I, S>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.begin_row()?;
        for value in data {
            self.inner.write_string(value.as_ref(), None)?;
        }
        Ok(())
    }

    /// Write multiple rows at once
    pub fn write_rows_batch<I, R, S>(&mut self, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    /// Write multiple typed rows at once
    pub fn write_rows_typed_batch(&mut self, rows: &[Vec<CellValue>]) -> Result<()> {
        for row in rows {
            self.write_row_typed(row)?;
        }
        Ok(())
    }

    /// Write a row with typed cell values
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sheetstream::writer::ExcelWriter;
    /// use sheetstream::types::CellValue;
    ///
    /// let mut writer = ExcelWriter::new("output.xlsx").unwrap();
    /// writer.write_row_typed(&[
    ///     CellValue::String("Alice".to_string()),
    ///     CellValue::Int(30),
    ///     CellValue::Float(1234.56),
    /// ]).unwrap();
    /// writer.save().unwrap();
    /// ```
    pub fn write_row_typed(&mut self, cells: &[CellValue]) -> Result<()> {
        self.inner.write_row(cells)
    }

    /// Write a row where every cell carries its own style
    pub fn write_row_styled(&mut self, cells: &[(CellValue, Style)]) -> Result<()> {
        self.inner.begin_row()?;
        for (value, style) in cells {
            self.inner.write_value(value, Some(style))?;
        }
        Ok(())
    }

    /// Write a row with all cells using the same style
    pub fn write_row_with_style(&mut self, values: &[CellValue], style: &Style) -> Result<()> {
        self.inner.begin_row()?;
        for value in values {
            self.inner.write_value(value, Some(style))?;
        }
        Ok(())
    }

    /// Write a header row in bold
    pub fn write_header<I, S>(&mut self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.begin_row()?;
        for header in headers {
            self.inner
                .write_string(header.as_ref(), Some(&self.header_style))?;
        }
        Ok(())
    }

    /// Seal the current sheet and continue in a new one
    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        self.add_sheet_with(name, &SheetOptions::default())
    }

    pub fn add_sheet_with(&mut self, name: &str, options: &SheetOptions) -> Result<()> {
        self.inner.begin_sheet_with(name, options)?;
        self.current_sheet_name = name.to_string();
        Ok(())
    }

    pub fn set_properties(&mut self, properties: DocumentProperties) {
        self.inner.set_properties(properties);
    }

    /// The underlying workbook, for merges, validations, protection and the like
    pub fn workbook_mut(&mut self) -> &mut WorkbookWriter<SZipSink> {
        &mut self.inner
    }

    pub fn current_sheet_name(&self) -> &str {
        &self.current_sheet_name
    }

    /// Rows written to the current sheet
    pub fn current_row(&self) -> u32 {
        self.inner.current_row()
    }

    /// Save and finalize the workbook
    pub fn save(mut self) -> Result<()> {
        self.inner.finalize()
    }
}

/// Builder for creating configured Excel writers
pub struct ExcelWriterBuilder {
    path: PathBuf,
    first_sheet: Option<String>,
    options: WriterOptions,
    sheet_options: SheetOptions,
    properties: Option<DocumentProperties>,
}

impl ExcelWriterBuilder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ExcelWriterBuilder {
            path: path.as_ref().to_path_buf(),
            first_sheet: None,
            options: WriterOptions::default(),
            sheet_options: SheetOptions::default(),
            properties: None,
        }
    }

    /// Set the name of the first sheet
    pub fn with_sheet_name(mut self, name: &str) -> Self {
        self.first_sheet = Some(name.to_string());
        self
    }

    /// Options of the first sheet
    pub fn with_sheet_options(mut self, options: SheetOptions) -> Self {
        self.sheet_options = options;
        self
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_memory_profile(mut self, profile: MemoryProfile) -> Self {
        self.options = self.options.memory_profile(profile);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.options = self.options.compression_level(level);
        self
    }

    pub fn with_properties(mut self, properties: DocumentProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn build(self) -> Result<ExcelWriter> {
        let mut inner = WorkbookWriter::create(&self.path, self.options)?;
        if let Some(properties) = self.properties {
            inner.set_properties(properties);
        }

        let sheet_name = self
            .first_sheet
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
        inner.begin_sheet_with(&sheet_name, &self.sheet_options)?;

        Ok(ExcelWriter {
            inner,
            current_sheet_name: sheet_name,
            header_style: CellStyle::header_bold().shared(),
        })
    }
}
