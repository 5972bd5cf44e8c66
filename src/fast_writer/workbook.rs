//! Streaming workbook writer
//!
//! `WorkbookWriter` owns the archive sink, the style registry and the shared
//! string table, and drives one [`SheetWriter`] at a time. Sheets are written to
//! the archive as they stream; registries and package parts follow at finalize.

use super::archive::{ArchiveSink, SZipSink};
use super::options::WriterOptions;
use super::parts::{self, SheetEntry};
use super::shared_strings::SharedStrings;
use super::streaming_zip_writer::ZipPackage;
use super::styles::StyleRegistry;
use super::worksheet::{validate_sheet_options, SheetWriter, WriteContext};
use super::xml_writer::{is_xml_char, XmlBuffer};
use crate::error::{ExcelError, Result};
use crate::style::Style;
use crate::types::{
    CellValue, DataValidation, DocumentProperties, FormulaResult, HeaderFooter,
    ProtectionOptions, RowOptions, SheetOptions,
};
use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;

pub const MAX_SHEET_NAME_LEN: usize = 31;
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
const FORBIDDEN_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Check a sheet name against the container's naming rules
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(ExcelError::InvalidSheetName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return invalid("name is longer than 31 characters");
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(ExcelError::InvalidSheetName {
            name: name.to_string(),
            reason: format!("character '{}' is not allowed", c),
        });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("name cannot start or end with an apostrophe");
    }
    if !name.chars().all(is_xml_char) {
        return invalid("name contains characters XML cannot carry");
    }
    Ok(())
}

/// Streaming XLSX writer over an [`ArchiveSink`]
///
/// # Examples
///
/// ```no_run
/// use sheetstream::fast_writer::{WorkbookWriter, WriterOptions};
///
/// let mut workbook = WorkbookWriter::create("output.xlsx", WriterOptions::default())?;
/// workbook.begin_sheet("Sheet1")?;
///
/// workbook.begin_row()?;
/// workbook.write_string("Name", None)?;
/// workbook.write_string("Age", None)?;
/// workbook.begin_row()?;
/// workbook.write_string("Alice", None)?;
/// workbook.write_integer(30, None)?;
///
/// workbook.finalize()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WorkbookWriter<S: ArchiveSink> {
    sink: S,
    options: WriterOptions,
    styles: StyleRegistry,
    strings: SharedStrings,
    sheets: Vec<SheetEntry>,
    current: Option<SheetWriter>,
    needs_recalc: bool,
    properties: DocumentProperties,
    finalized: bool,
}

impl WorkbookWriter<SZipSink> {
    /// Create a workbook file at `path`
    ///
    /// The s-zip file sink has no 64-bit mode, so `options.zip64` is rejected here.
    /// Use [`WorkbookWriter::from_writer`] over a `BufWriter<File>` for ZIP64 output.
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        if options.zip64 {
            return Err(ExcelError::InvalidValue(
                "zip64 is only supported by WorkbookWriter::from_writer".to_string(),
            ));
        }
        let sink = SZipSink::create(path, options.compression_level)?;
        Ok(Self::with_sink(sink, options))
    }
}

impl<W: Write> WorkbookWriter<ZipPackage<W>> {
    /// Stream the package into any writer; no `Seek` needed. Honors `options.zip64`.
    pub fn from_writer(output: W, options: WriterOptions) -> Self {
        let sink = ZipPackage::new(output, options.compression_level).with_zip64(options.zip64);
        Self::with_sink(sink, options)
    }
}

impl<S: ArchiveSink> WorkbookWriter<S> {
    pub fn with_sink(sink: S, options: WriterOptions) -> Self {
        WorkbookWriter {
            sink,
            options,
            styles: StyleRegistry::new(),
            strings: SharedStrings::new(),
            sheets: Vec::new(),
            current: None,
            needs_recalc: false,
            properties: DocumentProperties::default(),
            finalized: false,
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn set_properties(&mut self, properties: DocumentProperties) {
        self.properties = properties;
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The open sheet, if any
    pub fn current_sheet(&self) -> Option<&SheetWriter> {
        self.current.as_ref()
    }

    /// 1-based row number of the open sheet (0 before its first row)
    pub fn current_row(&self) -> u32 {
        self.current.as_ref().map_or(0, SheetWriter::current_row)
    }

    /// 1-based column the next cell goes to (0 when no row is open)
    pub fn current_column(&self) -> u32 {
        self.current.as_ref().map_or(0, SheetWriter::current_column)
    }

    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.finalized {
            return Err(ExcelError::AlreadyFinalized);
        }
        Ok(())
    }

    fn with_sheet<T>(
        &mut self,
        f: impl FnOnce(&mut SheetWriter, &mut WriteContext<'_>) -> Result<T>,
    ) -> Result<T> {
        self.ensure_writable()?;
        let sheet = self.current.as_mut().ok_or(ExcelError::NoActiveSheet)?;
        let mut ctx = WriteContext {
            sink: &mut self.sink,
            styles: &mut self.styles,
            strings: &mut self.strings,
            options: &self.options,
            needs_recalc: &mut self.needs_recalc,
        };
        f(sheet, &mut ctx)
    }

    /// Begin a sheet with default options
    pub fn begin_sheet(&mut self, name: &str) -> Result<()> {
        self.begin_sheet_with(name, &SheetOptions::default())
    }

    /// Seal the open sheet (if any) and start a new one
    pub fn begin_sheet_with(&mut self, name: &str, sheet_options: &SheetOptions) -> Result<()> {
        self.ensure_writable()?;
        validate_sheet_name(name)?;
        let lower = name.to_lowercase();
        if self.sheets.iter().any(|s| s.name.to_lowercase() == lower) {
            return Err(ExcelError::DuplicateSheetName(name.to_string()));
        }
        validate_sheet_options(sheet_options)?;

        self.seal_current()?;

        let index = self.sheets.len();
        let selected = !sheet_options.hidden && self.sheets.iter().all(|s| s.hidden);
        self.sink
            .start_entry(&format!("xl/worksheets/sheet{}.xml", index + 1))?;
        let mut ctx = WriteContext {
            sink: &mut self.sink,
            styles: &mut self.styles,
            strings: &mut self.strings,
            options: &self.options,
            needs_recalc: &mut self.needs_recalc,
        };
        let sheet = SheetWriter::new(name, index, selected, sheet_options, &mut ctx)?;

        self.sheets.push(SheetEntry {
            name: name.to_string(),
            hidden: sheet_options.hidden,
            filter_range: None,
        });
        self.current = Some(sheet);
        Ok(())
    }

    fn seal_current(&mut self) -> Result<()> {
        let Some(mut sheet) = self.current.take() else {
            return Ok(());
        };
        let mut ctx = WriteContext {
            sink: &mut self.sink,
            styles: &mut self.styles,
            strings: &mut self.strings,
            options: &self.options,
            needs_recalc: &mut self.needs_recalc,
        };
        sheet.seal(&mut ctx)?;
        if let Some(entry) = self.sheets.get_mut(sheet.index()) {
            entry.filter_range = sheet.auto_filter_name();
        }
        Ok(())
    }

    pub fn begin_row(&mut self) -> Result<()> {
        self.begin_row_with(&RowOptions::default())
    }

    /// Open the next row with height/hidden/style attributes
    pub fn begin_row_with(&mut self, row: &RowOptions) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.begin_row(row, ctx))
    }

    pub fn skip_rows(&mut self, count: u32) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.skip_rows(count))
    }

    pub fn skip_columns(&mut self, count: u32) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.skip_columns(count))
    }

    pub fn write_string(&mut self, text: &str, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_string(text, style, ctx))
    }

    pub fn write_shared_string(&mut self, text: &str, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_shared_string(text, style, ctx))
    }

    pub fn write_number(&mut self, value: f64, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_number(value, style, ctx))
    }

    pub fn write_integer(&mut self, value: i64, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_integer(value, style, ctx))
    }

    pub fn write_decimal(&mut self, value: &Decimal, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_decimal(value, style, ctx))
    }

    pub fn write_bool(&mut self, value: bool, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_bool(value, style, ctx))
    }

    pub fn write_datetime(&mut self, value: &NaiveDateTime, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_datetime(value, style, ctx))
    }

    pub fn write_error(&mut self, error: &str, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_error(error, style, ctx))
    }

    /// Formula without a cached result; the workbook is flagged for recalculation
    pub fn write_formula(&mut self, formula: &str, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_formula(formula, None, style, ctx))
    }

    pub fn write_formula_with_result(
        &mut self,
        formula: &str,
        result: &FormulaResult,
        style: Option<&Style>,
    ) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_formula(formula, Some(result), style, ctx))
    }

    pub fn write_blank(&mut self, style: Option<&Style>, repeat: u32) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_blank(style, repeat, ctx))
    }

    pub fn write_value(&mut self, value: &CellValue, style: Option<&Style>) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_value(value, style, ctx))
    }

    /// Value in the current cell, merged across `span` columns
    pub fn write_spanning(
        &mut self,
        value: &CellValue,
        style: Option<&Style>,
        span: u32,
    ) -> Result<()> {
        self.with_sheet(|sheet, ctx| sheet.write_spanning(value, style, span, ctx))
    }

    /// Begin a row and write `values` into it
    pub fn write_row(&mut self, values: &[CellValue]) -> Result<()> {
        self.with_sheet(|sheet, ctx| {
            sheet.begin_row(&RowOptions::default(), ctx)?;
            for value in values {
                sheet.write_value(value, None, ctx)?;
            }
            Ok(())
        })
    }

    pub fn merge_cells(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
    ) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.merge_cells(first_row, first_col, row_count, col_count))
    }

    pub fn add_data_validation(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
        rule: &DataValidation,
    ) -> Result<()> {
        self.with_sheet(|sheet, _| {
            sheet.add_data_validation(first_row, first_col, row_count, col_count, rule)
        })
    }

    pub fn add_row_break(&mut self, row: u32) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.add_row_break(row))
    }

    pub fn add_column_break(&mut self, col: u32) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.add_column_break(col))
    }

    pub fn set_auto_filter(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
    ) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.set_auto_filter(first_row, first_col, row_count, col_count))
    }

    pub fn protect_sheet(&mut self, options: &ProtectionOptions) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.protect(options))
    }

    pub fn set_header_footer(&mut self, header_footer: &HeaderFooter) -> Result<()> {
        self.with_sheet(|sheet, _| sheet.set_header_footer(header_footer))
    }

    /// Seal the last sheet, write registries and package parts, close the archive.
    ///
    /// A second call does nothing.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        if self.sheets.is_empty() {
            log::warn!("Finalizing a workbook without sheets; adding an empty {}", DEFAULT_SHEET_NAME);
            self.begin_sheet(DEFAULT_SHEET_NAME)?;
        }
        if self.sheets.iter().all(|s| s.hidden) {
            return Err(ExcelError::InvalidValue(
                "at least one sheet must be visible".to_string(),
            ));
        }
        self.finalized = true;
        self.seal_current()?;

        let threshold = self.options.flush_threshold;
        let mut buffer = XmlBuffer::new(self.options.invalid_char_policy);

        self.sink.start_entry("xl/styles.xml")?;
        self.styles.write_xml(&mut buffer, &mut self.sink, threshold)?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("xl/sharedStrings.xml")?;
        self.strings.write_xml(&mut buffer, &mut self.sink, threshold)?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("xl/workbook.xml")?;
        parts::write_workbook(&mut buffer, &self.sheets, self.needs_recalc)?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("xl/_rels/workbook.xml.rels")?;
        parts::write_workbook_rels(&mut buffer, self.sheets.len())?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("[Content_Types].xml")?;
        parts::write_content_types(&mut buffer, self.sheets.len());
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("_rels/.rels")?;
        parts::write_root_rels(&mut buffer);
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("docProps/core.xml")?;
        parts::write_core_props(&mut buffer, &self.properties, Utc::now())?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.start_entry("docProps/app.xml")?;
        parts::write_app_props(&mut buffer, &self.properties)?;
        buffer.flush_to(&mut self.sink)?;

        self.sink.finish()?;

        log::info!(
            "Finalized workbook: {} sheets, {} cell formats, {} shared strings",
            self.sheets.len(),
            self.styles.len(),
            self.strings.count()
        );
        Ok(())
    }

    /// Finalize and hand back the sink
    pub fn finish(mut self) -> Result<S> {
        self.finalize()?;
        Ok(self.sink)
    }
}
