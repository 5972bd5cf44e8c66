//! Streaming worksheet writer
//!
//! A sheet is append-only: rows go down, cells go right, and nothing already
//! emitted is revisited. Features that the part format places after `sheetData`
//! (protection, filter, merges, validations, margins, header/footer, page breaks)
//! are collected while rows stream and written once when the sheet is sealed.

use super::cell_ref::{cell_reference, column_name, CellRange, MAX_COLUMNS, MAX_ROWS};
use super::options::{InvalidCharPolicy, WriterOptions};
use super::protection::{PasswordHash, ALGORITHM_NAME};
use super::shared_strings::SharedStrings;
use super::styles::StyleRegistry;
use super::xml_writer::{sanitize, XmlBuffer};
use crate::error::{ExcelError, Result};
use crate::style::{CellStyle, Style};
use crate::types::{
    excel_serial, CellValue, DataValidation, FormulaResult, HeaderFooter, ProtectionOptions,
    RowOptions, SheetOptions, ValidationType,
};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::io::Write;

/// Workbook-owned state a sheet writes through
pub struct WriteContext<'a> {
    pub sink: &'a mut dyn Write,
    pub styles: &'a mut StyleRegistry,
    pub strings: &'a mut SharedStrings,
    pub options: &'a WriterOptions,
    /// Set when a formula is written without a cached result
    pub needs_recalc: &'a mut bool,
}

/// Where the sheet is in its row protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetState {
    /// Open, no row started (initial, and after `skip_rows`)
    NoRow,
    /// A row element is open and accepts cells
    InRow,
    /// Sealed; terminal
    Closed,
}

struct SheetProtection {
    hash: Option<PasswordHash>,
    options: ProtectionOptions,
}

fn sanitize_field(field: &mut Option<String>, policy: InvalidCharPolicy) -> Result<()> {
    if let Some(text) = field {
        if let Cow::Owned(clean) = sanitize(text, policy)? {
            *text = clean;
        }
    }
    Ok(())
}

/// Check column definitions and freeze panes before anything is written
pub fn validate_sheet_options(options: &SheetOptions) -> Result<()> {
    for column in &options.columns {
        if column.first == 0 || column.first > column.last || column.last > MAX_COLUMNS {
            return Err(ExcelError::InvalidRange(format!(
                "column definition {}..={} outside 1..={}",
                column.first, column.last, MAX_COLUMNS
            )));
        }
    }
    if options.freeze_rows >= MAX_ROWS || options.freeze_columns >= MAX_COLUMNS {
        return Err(ExcelError::InvalidRange(format!(
            "cannot freeze {} rows and {} columns",
            options.freeze_rows, options.freeze_columns
        )));
    }
    Ok(())
}

/// Quote a sheet name for use in a formula: `'It''s'`
pub(crate) fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Writer for one worksheet part
pub struct SheetWriter {
    name: String,
    index: usize,
    state: SheetState,
    current_row: u32,
    current_column: u32,
    reference_owed: bool,
    default_style: Option<Style>,
    date_style_id: Option<u32>,
    buffer: XmlBuffer,
    merges: Vec<CellRange>,
    validations: IndexMap<DataValidation, Vec<CellRange>>,
    row_breaks: BTreeSet<u32>,
    column_breaks: BTreeSet<u32>,
    auto_filter: Option<CellRange>,
    protection: Option<SheetProtection>,
    header_footer: Option<HeaderFooter>,
}

impl SheetWriter {
    /// Start the sheet part: everything up to and including `<sheetData>`
    pub fn new(
        name: &str,
        index: usize,
        selected: bool,
        sheet_options: &SheetOptions,
        ctx: &mut WriteContext<'_>,
    ) -> Result<Self> {
        validate_sheet_options(sheet_options)?;
        let mut buffer = XmlBuffer::new(ctx.options.invalid_char_policy);

        buffer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        buffer.write_str(
            "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">",
        );

        if let Some(color) = &sheet_options.tab_color {
            buffer.write_str("<sheetPr><tabColor rgb=\"");
            buffer.write_str(&color.argb_hex());
            buffer.write_str("\"/></sheetPr>");
        }

        buffer.write_str("<sheetViews><sheetView workbookViewId=\"0\"");
        if selected {
            buffer.write_str(" tabSelected=\"1\"");
        }
        let (rows, cols) = (sheet_options.freeze_rows, sheet_options.freeze_columns);
        if rows == 0 && cols == 0 {
            buffer.close_empty();
        } else {
            buffer.write_str("><pane");
            if cols > 0 {
                buffer.attribute_int("xSplit", cols);
            }
            if rows > 0 {
                buffer.attribute_int("ySplit", rows);
            }
            buffer.attribute("topLeftCell", &cell_reference(rows + 1, cols + 1)?)?;
            let pane = match (rows > 0, cols > 0) {
                (true, true) => "bottomRight",
                (true, false) => "bottomLeft",
                _ => "topRight",
            };
            buffer.attribute("activePane", pane)?;
            buffer.write_str(" state=\"frozen\"/></sheetView>");
        }
        buffer.write_str("</sheetViews><sheetFormatPr defaultRowHeight=\"15\"/>");

        if !sheet_options.columns.is_empty() {
            buffer.write_str("<cols>");
            for column in &sheet_options.columns {
                buffer.start_element("col");
                buffer.attribute_int("min", column.first);
                buffer.attribute_int("max", column.last);
                if let Some(width) = column.width {
                    buffer.attribute_f64("width", width)?;
                    buffer.write_str(" customWidth=\"1\"");
                }
                if let Some(style) = &column.style {
                    buffer.attribute_int("style", ctx.styles.resolve(style)?);
                }
                if column.hidden {
                    buffer.write_str(" hidden=\"1\"");
                }
                buffer.close_empty();
            }
            buffer.write_str("</cols>");
        }

        buffer.write_str("<sheetData>");
        buffer.flush_to(ctx.sink)?;

        log::debug!("Began sheet '{}' (index {})", name, index);

        Ok(SheetWriter {
            name: name.to_string(),
            index,
            state: SheetState::NoRow,
            current_row: 0,
            current_column: 0,
            reference_owed: false,
            default_style: sheet_options.default_style.clone(),
            date_style_id: None,
            buffer,
            merges: Vec::new(),
            validations: IndexMap::new(),
            row_breaks: BTreeSet::new(),
            column_breaks: BTreeSet::new(),
            auto_filter: None,
            protection: None,
            header_footer: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 0-based position in the workbook
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> SheetState {
        self.state
    }

    /// 1-based number of the last row begun (0 before the first row)
    pub fn current_row(&self) -> u32 {
        self.current_row
    }

    /// 1-based column the next cell goes to (0 when no row is open)
    pub fn current_column(&self) -> u32 {
        self.current_column
    }

    pub fn set_default_style(&mut self, style: Option<Style>) {
        self.default_style = style;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SheetState::Closed {
            return Err(ExcelError::SheetClosed(self.name.clone()));
        }
        Ok(())
    }

    fn ensure_in_row(&self) -> Result<()> {
        match self.state {
            SheetState::InRow => Ok(()),
            SheetState::NoRow => Err(ExcelError::NoActiveRow {
                sheet: self.name.clone(),
            }),
            SheetState::Closed => Err(ExcelError::SheetClosed(self.name.clone())),
        }
    }

    fn close_row(&mut self) {
        if self.state == SheetState::InRow {
            self.buffer.write_raw(b"</row>");
            self.state = SheetState::NoRow;
            self.current_column = 0;
        }
    }

    fn needs_reference(&self, ctx: &WriteContext<'_>) -> bool {
        self.reference_owed || ctx.options.always_emit_references
    }

    /// Close any open row and open the next one
    pub fn begin_row(&mut self, row: &RowOptions, ctx: &mut WriteContext<'_>) -> Result<()> {
        self.ensure_open()?;
        let next = self.current_row as u64 + 1;
        if next > MAX_ROWS as u64 {
            return Err(ExcelError::RowLimitExceeded {
                row: next,
                max: MAX_ROWS,
            });
        }
        let style_id = match &row.style {
            Some(style) => ctx.styles.resolve(style)?,
            None => 0,
        };

        self.close_row();
        self.current_row = next as u32;
        self.current_column = 1;

        self.buffer.write_raw(b"<row");
        if self.needs_reference(ctx) {
            self.buffer.attribute_int("r", self.current_row);
        }
        // Cells of a fresh row start at column A, so only the row itself needed the position.
        self.reference_owed = false;
        if let Some(height) = row.height {
            self.buffer.attribute_f64("ht", height)?;
            self.buffer.write_str(" customHeight=\"1\"");
        }
        if row.hidden {
            self.buffer.write_str(" hidden=\"1\"");
        }
        if style_id != 0 {
            self.buffer.attribute_int("s", style_id);
            self.buffer.write_str(" customFormat=\"1\"");
        }
        self.buffer.close_start_tag();
        self.state = SheetState::InRow;

        self.buffer
            .flush_if_at_least(ctx.sink, ctx.options.flush_threshold)?;
        Ok(())
    }

    /// Close any open row and leave `count` rows empty
    pub fn skip_rows(&mut self, count: u32) -> Result<()> {
        self.ensure_open()?;
        let target = self.current_row as u64 + count as u64;
        if target > MAX_ROWS as u64 {
            return Err(ExcelError::RowLimitExceeded {
                row: target,
                max: MAX_ROWS,
            });
        }
        self.close_row();
        if count > 0 {
            self.current_row = target as u32;
            self.reference_owed = true;
        }
        Ok(())
    }

    /// Leave `count` cells of the open row empty
    pub fn skip_columns(&mut self, count: u32) -> Result<()> {
        self.ensure_in_row()?;
        let target = self.current_column as u64 + count as u64;
        if target > MAX_COLUMNS as u64 + 1 {
            return Err(ExcelError::ColumnLimitExceeded {
                column: target - 1,
                max: MAX_COLUMNS,
            });
        }
        if count > 0 {
            self.current_column = target as u32;
            self.reference_owed = true;
        }
        Ok(())
    }

    /// A cell fits into the open row at the current column
    fn check_cell(&self) -> Result<()> {
        self.ensure_in_row()?;
        if self.current_column > MAX_COLUMNS {
            return Err(ExcelError::ColumnLimitExceeded {
                column: self.current_column as u64,
                max: MAX_COLUMNS,
            });
        }
        Ok(())
    }

    /// Style id for the next cell. Checked against the row first so a rejected
    /// cell does not leave a format behind in the registry.
    fn resolve_style(&mut self, style: Option<&Style>, ctx: &mut WriteContext<'_>) -> Result<u32> {
        self.check_cell()?;
        match style.or(self.default_style.as_ref()) {
            Some(style) => ctx.styles.resolve(style),
            None => Ok(0),
        }
    }

    /// Emit `<c ...` with position/style/type, then let `body` finish the element.
    ///
    /// A failing body rolls the buffer back so no half-written cell survives.
    fn write_cell<F>(
        &mut self,
        style_id: u32,
        cell_type: Option<&str>,
        ctx: &mut WriteContext<'_>,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut XmlBuffer) -> Result<()>,
    {
        self.check_cell()?;

        let mark = self.buffer.len();
        self.buffer.write_raw(b"<c");
        if self.needs_reference(ctx) {
            self.buffer.write_raw(b" r=\"");
            self.buffer.write_str(column_name(self.current_column)?);
            self.buffer.write_int(self.current_row);
            self.buffer.write_raw(b"\"");
        }
        if style_id != 0 {
            self.buffer.attribute_int("s", style_id);
        }
        if let Some(cell_type) = cell_type {
            self.buffer.write_raw(b" t=\"");
            self.buffer.write_str(cell_type);
            self.buffer.write_raw(b"\"");
        }
        if let Err(err) = body(&mut self.buffer) {
            self.buffer.truncate(mark);
            return Err(err);
        }

        self.reference_owed = false;
        self.current_column += 1;
        self.buffer
            .flush_if_at_least(ctx.sink, ctx.options.flush_threshold)?;
        Ok(())
    }

    /// Inline string cell (`t="inlineStr"`)
    pub fn write_string(
        &mut self,
        text: &str,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let text = sanitize(text, ctx.options.invalid_char_policy)?;
        let style_id = self.resolve_style(style, ctx)?;
        self.write_cell(style_id, Some("inlineStr"), ctx, |buf| {
            buf.write_raw(b"><is><t");
            buf.write_space_preserve(&text);
            buf.close_start_tag();
            buf.write_escaped_text(&text)?;
            buf.write_raw(b"</t></is></c>");
            Ok(())
        })
    }

    /// Shared string cell (`t="s"`); the text is interned in the workbook table
    pub fn write_shared_string(
        &mut self,
        text: &str,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let text = sanitize(text, ctx.options.invalid_char_policy)?;
        let style_id = self.resolve_style(style, ctx)?;
        let index = ctx.strings.add_string(&text);
        self.write_cell(style_id, Some("s"), ctx, |buf| {
            buf.write_raw(b"><v>");
            buf.write_int(index);
            buf.write_raw(b"</v></c>");
            Ok(())
        })
    }

    pub fn write_number(
        &mut self,
        value: f64,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        check_finite(value)?;
        let style_id = self.resolve_style(style, ctx)?;
        self.write_number_with_id(value, style_id, ctx)
    }

    fn write_number_with_id(
        &mut self,
        value: f64,
        style_id: u32,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        self.write_cell(style_id, None, ctx, |buf| {
            buf.write_raw(b"><v>");
            buf.write_f64(value)?;
            buf.write_raw(b"</v></c>");
            Ok(())
        })
    }

    pub fn write_integer(
        &mut self,
        value: i64,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let style_id = self.resolve_style(style, ctx)?;
        self.write_cell(style_id, None, ctx, |buf| {
            buf.write_raw(b"><v>");
            buf.write_int(value);
            buf.write_raw(b"</v></c>");
            Ok(())
        })
    }

    pub fn write_decimal(
        &mut self,
        value: &Decimal,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let style_id = self.resolve_style(style, ctx)?;
        self.write_cell(style_id, None, ctx, |buf| {
            buf.write_raw(b"><v>");
            buf.write_decimal(value)?;
            buf.write_raw(b"</v></c>");
            Ok(())
        })
    }

    pub fn write_bool(
        &mut self,
        value: bool,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let style_id = self.resolve_style(style, ctx)?;
        self.write_cell(style_id, Some("b"), ctx, |buf| {
            buf.write_raw(if value { b"><v>1</v></c>" } else { b"><v>0</v></c>" });
            Ok(())
        })
    }

    /// Date cell as a serial number. Without a style the built-in date-time format is used.
    pub fn write_datetime(
        &mut self,
        value: &NaiveDateTime,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let serial = excel_serial(value)?;
        self.check_cell()?;
        let style_id = match style.or(self.default_style.as_ref()) {
            Some(style) => ctx.styles.resolve(style)?,
            None => match self.date_style_id {
                Some(id) => id,
                None => {
                    let id = ctx.styles.resolve_style(&CellStyle::timestamp())?;
                    self.date_style_id = Some(id);
                    id
                }
            },
        };
        self.write_number_with_id(serial, style_id, ctx)
    }

    /// Error cell (`t="e"`), e.g. `#N/A`
    pub fn write_error(
        &mut self,
        error: &str,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let error = sanitize(error, ctx.options.invalid_char_policy)?;
        let style_id = self.resolve_style(style, ctx)?;
        self.write_cell(style_id, Some("e"), ctx, |buf| {
            buf.write_raw(b"><v>");
            buf.write_escaped_text(&error)?;
            buf.write_raw(b"</v></c>");
            Ok(())
        })
    }

    /// Formula cell. Without a cached result the workbook asks for recalculation on load.
    pub fn write_formula(
        &mut self,
        formula: &str,
        result: Option<&FormulaResult>,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        let policy = ctx.options.invalid_char_policy;
        let formula = sanitize(formula.strip_prefix('=').unwrap_or(formula), policy)?;
        let result_text = match result {
            Some(FormulaResult::String(text)) | Some(FormulaResult::Error(text)) => {
                Some(sanitize(text, policy)?)
            }
            Some(FormulaResult::Number(value)) => {
                check_finite(*value)?;
                None
            }
            Some(FormulaResult::Bool(_)) | None => None,
        };
        let style_id = self.resolve_style(style, ctx)?;
        let cell_type = match result {
            Some(FormulaResult::String(_)) => Some("str"),
            Some(FormulaResult::Bool(_)) => Some("b"),
            Some(FormulaResult::Error(_)) => Some("e"),
            Some(FormulaResult::Number(_)) | None => None,
        };
        self.write_cell(style_id, cell_type, ctx, |buf| {
            buf.write_raw(b"><f>");
            buf.write_escaped_text(&formula)?;
            buf.write_raw(b"</f>");
            if let Some(result) = result {
                buf.write_raw(b"<v>");
                match result {
                    FormulaResult::Number(value) => buf.write_f64(*value)?,
                    FormulaResult::String(_) | FormulaResult::Error(_) => {
                        if let Some(text) = &result_text {
                            buf.write_escaped_text(text)?;
                        }
                    }
                    FormulaResult::Bool(value) => buf.write_raw(if *value { b"1" } else { b"0" }),
                }
                buf.write_raw(b"</v>");
            }
            buf.write_raw(b"</c>");
            Ok(())
        })?;
        if result.is_none() {
            *ctx.needs_recalc = true;
        }
        Ok(())
    }

    /// Style-only cells, `repeat` of them in a row
    pub fn write_blank(
        &mut self,
        style: Option<&Style>,
        repeat: u32,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        self.ensure_in_row()?;
        if repeat == 0 {
            return Ok(());
        }
        let last = self.current_column as u64 + repeat as u64;
        if last > MAX_COLUMNS as u64 + 1 {
            return Err(ExcelError::ColumnLimitExceeded {
                column: last - 1,
                max: MAX_COLUMNS,
            });
        }
        let style_id = self.resolve_style(style, ctx)?;
        for _ in 0..repeat {
            self.write_cell(style_id, None, ctx, |buf| {
                buf.close_empty();
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Write any [`CellValue`]. `Empty` without a style just advances the column.
    pub fn write_value(
        &mut self,
        value: &CellValue,
        style: Option<&Style>,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        match value {
            CellValue::Empty => match style {
                Some(_) => self.write_blank(style, 1, ctx),
                None => self.skip_columns(1),
            },
            CellValue::String(s) => self.write_string(s, style, ctx),
            CellValue::SharedString(s) => self.write_shared_string(s, style, ctx),
            CellValue::Int(i) => self.write_integer(*i, style, ctx),
            CellValue::Float(f) => self.write_number(*f, style, ctx),
            CellValue::Decimal(d) => self.write_decimal(d, style, ctx),
            CellValue::Bool(b) => self.write_bool(*b, style, ctx),
            CellValue::DateTime(dt) => self.write_datetime(dt, style, ctx),
            CellValue::Error(e) => self.write_error(e, style, ctx),
            CellValue::Formula(f) => self.write_formula(f, None, style, ctx),
        }
    }

    /// Write `value` across `span` columns: merge, value in the first cell, styled blanks after
    pub fn write_spanning(
        &mut self,
        value: &CellValue,
        style: Option<&Style>,
        span: u32,
        ctx: &mut WriteContext<'_>,
    ) -> Result<()> {
        self.ensure_in_row()?;
        if span == 0 {
            return Err(ExcelError::InvalidRange(
                "span must cover at least one column".to_string(),
            ));
        }
        // Bounds-checked up front; registered only once the cells are in
        let range = CellRange::new(self.current_row, self.current_column, 1, span)?;
        self.write_value(value, style, ctx)?;
        self.write_blank(style, span - 1, ctx)?;
        if span > 1 {
            self.merges.push(range);
        }
        Ok(())
    }

    /// Register a merged block
    pub fn merge_cells(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
    ) -> Result<()> {
        self.ensure_open()?;
        self.merges
            .push(CellRange::new(first_row, first_col, row_count, col_count)?);
        Ok(())
    }

    /// Attach a validation rule to a block; equal rules share one output entry
    pub fn add_data_validation(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
        rule: &DataValidation,
    ) -> Result<()> {
        self.ensure_open()?;
        let range = CellRange::new(first_row, first_col, row_count, col_count)?;

        if let Some(ranges) = self.validations.get_mut(rule) {
            ranges.push(range);
            return Ok(());
        }
        let policy = self.buffer.policy();
        let mut rule = rule.clone();
        for field in [
            &mut rule.formula1,
            &mut rule.formula2,
            &mut rule.prompt_title,
            &mut rule.prompt,
            &mut rule.error_title,
            &mut rule.error,
        ] {
            sanitize_field(field, policy)?;
        }
        self.validations.entry(rule).or_default().push(range);
        Ok(())
    }

    /// Manual page break before `row` (2..=1 048 576)
    pub fn add_row_break(&mut self, row: u32) -> Result<()> {
        self.ensure_open()?;
        if !(2..=MAX_ROWS).contains(&row) {
            return Err(ExcelError::InvalidPageBreak(format!(
                "row break {} outside 2..={}",
                row, MAX_ROWS
            )));
        }
        self.row_breaks.insert(row);
        Ok(())
    }

    /// Manual page break before `col` (2..=16 384)
    pub fn add_column_break(&mut self, col: u32) -> Result<()> {
        self.ensure_open()?;
        if !(2..=MAX_COLUMNS).contains(&col) {
            return Err(ExcelError::InvalidPageBreak(format!(
                "column break {} outside 2..={}",
                col, MAX_COLUMNS
            )));
        }
        self.column_breaks.insert(col);
        Ok(())
    }

    /// Set the sheet's single autofilter range (replaces any earlier one)
    pub fn set_auto_filter(
        &mut self,
        first_row: u32,
        first_col: u32,
        row_count: u32,
        col_count: u32,
    ) -> Result<()> {
        self.ensure_open()?;
        self.auto_filter = Some(CellRange::new(first_row, first_col, row_count, col_count)?);
        Ok(())
    }

    /// Formula for the hidden `_xlnm._FilterDatabase` name, if a filter is set
    pub fn auto_filter_name(&self) -> Option<String> {
        self.auto_filter.map(|range| {
            format!(
                "{}!{}",
                quote_sheet_name(&self.name),
                range.absolute_reference()
            )
        })
    }

    /// Protect the sheet. The password is hashed now and not kept.
    pub fn protect(&mut self, options: &ProtectionOptions) -> Result<()> {
        self.ensure_open()?;
        let hash = match &options.password {
            Some(password) => Some(match &options.salt {
                Some(salt) => PasswordHash::with_salt(password, salt, options.spin_count)?,
                None => PasswordHash::new(password, options.spin_count)?,
            }),
            None => None,
        };
        let mut options = options.clone();
        options.password = None;
        self.protection = Some(SheetProtection { hash, options });
        Ok(())
    }

    pub fn set_header_footer(&mut self, header_footer: &HeaderFooter) -> Result<()> {
        self.ensure_open()?;
        let policy = self.buffer.policy();
        let mut header_footer = header_footer.clone();
        for field in [
            &mut header_footer.odd_header,
            &mut header_footer.odd_footer,
            &mut header_footer.even_header,
            &mut header_footer.even_footer,
            &mut header_footer.first_header,
            &mut header_footer.first_footer,
        ] {
            sanitize_field(field, policy)?;
        }
        self.header_footer = Some(header_footer);
        Ok(())
    }

    /// Close the last row, write the deferred features and end the part.
    ///
    /// Calling it again on a sealed sheet does nothing.
    pub fn seal(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if self.state == SheetState::Closed {
            return Ok(());
        }
        self.close_row();
        self.state = SheetState::Closed;

        self.buffer.write_str("</sheetData>");
        self.write_protection()?;
        if let Some(range) = &self.auto_filter {
            self.buffer.start_element("autoFilter");
            self.buffer.attribute("ref", &range.reference())?;
            self.buffer.close_empty();
        }
        self.write_merges()?;
        self.write_validations(ctx)?;
        self.buffer.write_str(
            "<pageMargins left=\"0.7\" right=\"0.7\" top=\"0.75\" bottom=\"0.75\" header=\"0.3\" footer=\"0.3\"/>",
        );
        self.write_header_footer()?;
        write_breaks(&mut self.buffer, "rowBreaks", &self.row_breaks, MAX_COLUMNS - 1);
        write_breaks(&mut self.buffer, "colBreaks", &self.column_breaks, MAX_ROWS - 1);
        self.buffer.write_str("</worksheet>");
        self.buffer.flush_to(ctx.sink)?;

        log::debug!(
            "Sealed sheet '{}': {} rows, {} merges, {} validation rules",
            self.name,
            self.current_row,
            self.merges.len(),
            self.validations.len()
        );
        Ok(())
    }

    fn write_protection(&mut self) -> Result<()> {
        let Some(protection) = &self.protection else {
            return Ok(());
        };
        let buf = &mut self.buffer;
        buf.start_element("sheetProtection");
        if let Some(hash) = &protection.hash {
            buf.attribute("algorithmName", ALGORITHM_NAME)?;
            buf.attribute("hashValue", &hash.hash_base64())?;
            buf.attribute("saltValue", &hash.salt_base64())?;
            buf.attribute_int("spinCount", hash.spin_count());
        }
        buf.write_str(" sheet=\"1\" objects=\"1\" scenarios=\"1\"");

        let options = &protection.options;
        // These default to protected ("1"); allowing an action writes "0".
        for (allowed, name) in [
            (options.allow_format_cells, "formatCells"),
            (options.allow_format_columns, "formatColumns"),
            (options.allow_format_rows, "formatRows"),
            (options.allow_insert_columns, "insertColumns"),
            (options.allow_insert_rows, "insertRows"),
            (options.allow_delete_columns, "deleteColumns"),
            (options.allow_delete_rows, "deleteRows"),
            (options.allow_sort, "sort"),
            (options.allow_auto_filter, "autoFilter"),
        ] {
            if allowed {
                buf.write_raw(b" ");
                buf.write_str(name);
                buf.write_raw(b"=\"0\"");
            }
        }
        // Selection defaults to allowed.
        if !options.allow_select_locked_cells {
            buf.write_str(" selectLockedCells=\"1\"");
        }
        if !options.allow_select_unlocked_cells {
            buf.write_str(" selectUnlockedCells=\"1\"");
        }
        buf.close_empty();
        Ok(())
    }

    fn write_merges(&mut self) -> Result<()> {
        if self.merges.is_empty() {
            return Ok(());
        }
        self.buffer.start_element("mergeCells");
        self.buffer.attribute_int("count", self.merges.len());
        self.buffer.close_start_tag();
        for range in &self.merges {
            self.buffer.start_element("mergeCell");
            self.buffer.attribute("ref", &range.reference())?;
            self.buffer.close_empty();
        }
        self.buffer.end_element("mergeCells");
        Ok(())
    }

    fn write_validations(&mut self, ctx: &mut WriteContext<'_>) -> Result<()> {
        if self.validations.is_empty() {
            return Ok(());
        }
        let buf = &mut self.buffer;
        buf.start_element("dataValidations");
        buf.attribute_int("count", self.validations.len());
        buf.close_start_tag();

        for (rule, ranges) in &self.validations {
            buf.start_element("dataValidation");
            buf.attribute("type", rule.kind.as_str())?;
            if rule.error_style != Default::default() {
                buf.attribute("errorStyle", rule.error_style.as_str())?;
            }
            let has_operator = matches!(
                rule.kind,
                ValidationType::Whole
                    | ValidationType::Decimal
                    | ValidationType::Date
                    | ValidationType::Time
                    | ValidationType::TextLength
            );
            if has_operator && rule.operator != Default::default() {
                buf.attribute("operator", rule.operator.as_str())?;
            }
            if rule.allow_blank {
                buf.write_str(" allowBlank=\"1\"");
            }
            if rule.hide_dropdown {
                // The attribute name is inverted in the format: 1 hides the arrow.
                buf.write_str(" showDropDown=\"1\"");
            }
            if rule.show_input_message {
                buf.write_str(" showInputMessage=\"1\"");
            }
            if rule.show_error_message {
                buf.write_str(" showErrorMessage=\"1\"");
            }
            for (name, value) in [
                ("errorTitle", &rule.error_title),
                ("error", &rule.error),
                ("promptTitle", &rule.prompt_title),
                ("prompt", &rule.prompt),
            ] {
                if let Some(value) = value {
                    buf.attribute(name, value)?;
                }
            }

            buf.write_str(" sqref=\"");
            for (i, range) in ranges.iter().enumerate() {
                if i > 0 {
                    buf.write_raw(b" ");
                }
                buf.write_str(&range.reference());
            }
            buf.write_raw(b"\"");

            if rule.formula1.is_none() && rule.formula2.is_none() {
                buf.close_empty();
            } else {
                buf.close_start_tag();
                if let Some(formula) = &rule.formula1 {
                    buf.text_element("formula1", formula)?;
                }
                if let Some(formula) = &rule.formula2 {
                    buf.text_element("formula2", formula)?;
                }
                buf.end_element("dataValidation");
            }
            buf.flush_if_at_least(ctx.sink, ctx.options.flush_threshold)?;
        }
        buf.end_element("dataValidations");
        Ok(())
    }

    fn write_header_footer(&mut self) -> Result<()> {
        let Some(hf) = &self.header_footer else {
            return Ok(());
        };
        let buf = &mut self.buffer;
        buf.start_element("headerFooter");
        if hf.different_odd_even() {
            buf.write_str(" differentOddEven=\"1\"");
        }
        if hf.different_first() {
            buf.write_str(" differentFirst=\"1\"");
        }
        buf.close_start_tag();
        for (name, text) in [
            ("oddHeader", &hf.odd_header),
            ("oddFooter", &hf.odd_footer),
            ("evenHeader", &hf.even_header),
            ("evenFooter", &hf.even_footer),
            ("firstHeader", &hf.first_header),
            ("firstFooter", &hf.first_footer),
        ] {
            if let Some(text) = text {
                buf.text_element(name, text)?;
            }
        }
        buf.end_element("headerFooter");
        Ok(())
    }
}

fn check_finite(value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ExcelError::InvalidValue(format!(
            "{} cannot be stored in a numeric cell",
            value
        )))
    }
}

/// `<rowBreaks>`/`<colBreaks>`; `id` is the 0-based index the break follows
fn write_breaks(buffer: &mut XmlBuffer, element: &str, breaks: &BTreeSet<u32>, max: u32) {
    if breaks.is_empty() {
        return;
    }
    buffer.start_element(element);
    buffer.attribute_int("count", breaks.len());
    buffer.attribute_int("manualBreakCount", breaks.len());
    buffer.close_start_tag();
    for index in breaks {
        buffer.start_element("brk");
        buffer.attribute_int("id", index - 1);
        buffer.attribute_int("max", max);
        buffer.write_str(" man=\"1\"/>");
    }
    buffer.end_element(element);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ValidationOperator, ValidationErrorStyle};
    use pretty_assertions::assert_eq;

    struct Harness {
        sink: Vec<u8>,
        styles: StyleRegistry,
        strings: SharedStrings,
        options: WriterOptions,
        needs_recalc: bool,
    }

    impl Harness {
        fn new(options: WriterOptions) -> Self {
            Harness {
                sink: Vec::new(),
                styles: StyleRegistry::new(),
                strings: SharedStrings::new(),
                options,
                needs_recalc: false,
            }
        }

        fn ctx(&mut self) -> WriteContext<'_> {
            WriteContext {
                sink: &mut self.sink,
                styles: &mut self.styles,
                strings: &mut self.strings,
                options: &self.options,
                needs_recalc: &mut self.needs_recalc,
            }
        }

        fn sheet(&mut self) -> SheetWriter {
            SheetWriter::new("Data", 0, true, &SheetOptions::default(), &mut self.ctx()).unwrap()
        }

        fn xml(&self) -> String {
            String::from_utf8(self.sink.clone()).unwrap()
        }

        fn sheet_data(&self) -> String {
            let xml = self.xml();
            let start = xml.find("<sheetData>").unwrap() + "<sheetData>".len();
            let end = xml.find("</sheetData>").unwrap();
            xml[start..end].to_string()
        }
    }

    #[test]
    fn test_row_and_column_tracking() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let ctx = &mut h.ctx();

        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        sheet.write_string("A1", None, ctx).unwrap();
        sheet.write_string("B1", None, ctx).unwrap();
        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        sheet.write_string("A2", None, ctx).unwrap();

        assert_eq!(sheet.current_row(), 2);
        assert_eq!(sheet.current_column(), 2);

        sheet.skip_columns(2).unwrap();
        assert_eq!(sheet.current_column(), 4);
        assert_eq!(sheet.state(), SheetState::InRow);
    }

    #[test]
    fn test_cells_require_open_row() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let ctx = &mut h.ctx();

        assert!(matches!(
            sheet.write_integer(1, None, ctx),
            Err(ExcelError::NoActiveRow { .. })
        ));
        assert!(sheet.skip_columns(1).is_err());

        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        sheet.skip_rows(1).unwrap();
        assert_eq!(sheet.state(), SheetState::NoRow);
        assert!(sheet.write_bool(true, None, ctx).is_err());
    }

    #[test]
    fn test_references_only_when_owed() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_integer(1, None, ctx).unwrap();
            sheet.skip_columns(1).unwrap();
            sheet.write_integer(3, None, ctx).unwrap();
            sheet.write_integer(4, None, ctx).unwrap();
            sheet.skip_rows(2).unwrap();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_bool(false, None, ctx).unwrap();
            sheet.seal(ctx).unwrap();
        }

        assert_eq!(
            h.sheet_data(),
            "<row><c><v>1</v></c><c r=\"C1\"><v>3</v></c><c><v>4</v></c></row>\
             <row r=\"4\"><c t=\"b\"><v>0</v></c></row>"
        );
    }

    #[test]
    fn test_always_emit_references() {
        let mut h = Harness::new(WriterOptions::default().always_emit_references(true));
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_number(1.5, None, ctx).unwrap();
            sheet.write_string(" x ", None, ctx).unwrap();
            sheet.seal(ctx).unwrap();
        }

        assert_eq!(
            h.sheet_data(),
            "<row r=\"1\"><c r=\"A1\"><v>1.5</v></c>\
             <c r=\"B1\" t=\"inlineStr\"><is><t xml:space=\"preserve\"> x </t></is></c></row>"
        );
    }

    #[test]
    fn test_row_attributes() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let style = CellStyle::highlight_yellow().shared();
        {
            let ctx = &mut h.ctx();
            sheet
                .begin_row(&RowOptions::new().height(20.5).hidden().style(style), ctx)
                .unwrap();
            sheet.seal(ctx).unwrap();
        }
        assert_eq!(
            h.sheet_data(),
            "<row ht=\"20.5\" customHeight=\"1\" hidden=\"1\" s=\"1\" customFormat=\"1\"></row>"
        );
    }

    #[test]
    fn test_row_limit() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let ctx = &mut h.ctx();

        sheet.skip_rows(MAX_ROWS - 1).unwrap();
        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        assert_eq!(sheet.current_row(), MAX_ROWS);
        assert!(matches!(
            sheet.begin_row(&RowOptions::default(), ctx),
            Err(ExcelError::RowLimitExceeded { .. })
        ));
        assert!(sheet.skip_rows(1).is_err());
    }

    #[test]
    fn test_column_limit() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let ctx = &mut h.ctx();

        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        sheet.skip_columns(MAX_COLUMNS - 1).unwrap();
        sheet.write_integer(1, None, ctx).unwrap();
        assert!(matches!(
            sheet.write_integer(2, None, ctx),
            Err(ExcelError::ColumnLimitExceeded { .. })
        ));
        assert!(sheet.skip_columns(1).is_ok());
        assert!(sheet.skip_columns(1).is_err());
    }

    #[test]
    fn test_invalid_text_leaves_no_partial_cell() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            let err = sheet.write_string("bad\u{1}", None, ctx).unwrap_err();
            assert!(matches!(err, ExcelError::InvalidCharacter { position: 3, code: 1 }));
            assert_eq!(sheet.current_column(), 1);
            sheet.write_string("good", None, ctx).unwrap();
            sheet.seal(ctx).unwrap();
        }
        assert_eq!(
            h.sheet_data(),
            "<row><c t=\"inlineStr\"><is><t>good</t></is></c></row>"
        );
    }

    #[test]
    fn test_skip_policy_drops_characters() {
        let options = WriterOptions::default().invalid_char_policy(InvalidCharPolicy::Skip);
        let mut h = Harness::new(options);
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_shared_string("a\u{0}b", None, ctx).unwrap();
            sheet.seal(ctx).unwrap();
        }
        assert_eq!(h.strings.get(0), Some("ab"));
    }

    #[test]
    fn test_formulas_and_recalc_flag() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet
                .write_formula("=A1&\"x\"", Some(&FormulaResult::String("1x".into())), None, ctx)
                .unwrap();
            sheet.seal(ctx).unwrap();
        }
        assert!(!h.needs_recalc);
        assert_eq!(
            h.sheet_data(),
            "<row><c t=\"str\"><f>A1&amp;\"x\"</f><v>1x</v></c></row>"
        );

        let mut sheet = h.sheet();
        let ctx = &mut h.ctx();
        sheet.begin_row(&RowOptions::default(), ctx).unwrap();
        sheet.write_formula("SUM(A1:A3)", None, None, ctx).unwrap();
        assert!(*ctx.needs_recalc);
    }

    #[test]
    fn test_spanning_write_merges_and_pads() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let style = CellStyle::header_bold().shared();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.skip_columns(1).unwrap();
            sheet
                .write_spanning(&CellValue::from("Title"), Some(&style), 3, ctx)
                .unwrap();
            assert_eq!(sheet.current_column(), 5);
            sheet.seal(ctx).unwrap();
        }
        let xml = h.xml();
        assert!(xml.contains(
            "<c r=\"B1\" s=\"1\" t=\"inlineStr\"><is><t>Title</t></is></c><c s=\"1\"/><c s=\"1\"/></row>"
        ));
        assert!(xml.contains("<mergeCells count=\"1\"><mergeCell ref=\"B1:D1\"/></mergeCells>"));
        // Same Arc every time: one hashed lookup
        assert_eq!(h.styles.lookups(), 1);
    }

    #[test]
    fn test_failed_spanning_write_registers_no_merge() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            assert!(sheet
                .write_spanning(&CellValue::from("bad\u{1}"), None, 3, ctx)
                .is_err());
            assert!(sheet
                .write_spanning(&CellValue::Float(f64::NAN), None, 2, ctx)
                .is_err());
            assert_eq!(sheet.current_column(), 1);
            sheet.write_string("ok", None, ctx).unwrap();
            sheet.seal(ctx).unwrap();
        }
        let xml = h.xml();
        assert!(!xml.contains("<mergeCells"));
        assert_eq!(
            h.sheet_data(),
            "<row><c t=\"inlineStr\"><is><t>ok</t></is></c></row>"
        );
    }

    #[test]
    fn test_rejected_cells_leave_registries_untouched() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let style = CellStyle::highlight_yellow().shared();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.skip_columns(MAX_COLUMNS - 1).unwrap();
            sheet.write_integer(1, None, ctx).unwrap();
            assert!(matches!(
                sheet.write_shared_string("late", Some(&style), ctx),
                Err(ExcelError::ColumnLimitExceeded { .. })
            ));
            assert!(sheet.write_string("late", Some(&style), ctx).is_err());
            assert!(sheet.write_blank(Some(&style), 1, ctx).is_err());
        }
        assert_eq!(h.strings.count(), 0);
        assert_eq!(h.strings.reference_count(), 0);
        assert_eq!(h.styles.len(), 1);

        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            assert!(sheet.write_number(f64::NAN, Some(&style), ctx).is_err());
            assert!(sheet
                .write_formula(
                    "1/0",
                    Some(&FormulaResult::Number(f64::INFINITY)),
                    Some(&style),
                    ctx
                )
                .is_err());
            assert!(sheet.write_error("#N/A\u{2}", Some(&style), ctx).is_err());
        }
        assert_eq!(h.styles.len(), 1);
        assert!(!h.needs_recalc);
    }

    #[test]
    fn test_skip_policy_keeps_edge_whitespace() {
        let options = WriterOptions::default().invalid_char_policy(InvalidCharPolicy::Skip);
        let mut h = Harness::new(options);
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_string("\u{1} a", None, ctx).unwrap();
            sheet
                .write_formula("=\"x\"\u{3}", Some(&FormulaResult::String("x\u{3}".into())), None, ctx)
                .unwrap();
            sheet.seal(ctx).unwrap();
        }
        assert_eq!(
            h.sheet_data(),
            "<row><c t=\"inlineStr\"><is><t xml:space=\"preserve\"> a</t></is></c>\
             <c t=\"str\"><f>\"x\"</f><v>x</v></c></row>"
        );
    }

    #[test]
    fn test_validations_merge_by_content() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        let yes_no = DataValidation::list(&["Yes", "No"]);
        let range = DataValidation::whole_number(ValidationOperator::GreaterThan, "0", None)
            .error_message(ValidationErrorStyle::Warning, "Oops", "Must be > 0");
        {
            let ctx = &mut h.ctx();
            sheet.add_data_validation(1, 1, 10, 1, &yes_no).unwrap();
            sheet
                .add_data_validation(1, 3, 1, 1, &DataValidation::list(&["Yes", "No"]))
                .unwrap();
            sheet.add_data_validation(2, 2, 5, 1, &range).unwrap();
            sheet
                .add_data_validation(1, 4, 1, 1, &yes_no.clone().allow_blank(false))
                .unwrap();
            sheet.seal(ctx).unwrap();
        }
        let xml = h.xml();
        assert!(xml.contains("<dataValidations count=\"3\">"));
        assert!(xml.contains(
            "<dataValidation type=\"list\" allowBlank=\"1\" showErrorMessage=\"1\" sqref=\"A1:A10 C1\">\
             <formula1>\"Yes,No\"</formula1></dataValidation>"
        ));
        assert!(xml.contains(
            "<dataValidation type=\"whole\" errorStyle=\"warning\" operator=\"greaterThan\" allowBlank=\"1\" \
             showErrorMessage=\"1\" errorTitle=\"Oops\" error=\"Must be &gt; 0\" sqref=\"B2:B6\">"
        ));
        assert!(xml.contains("showErrorMessage=\"1\" sqref=\"D1\">"));
    }

    #[test]
    fn test_out_of_range_features() {
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();

        assert!(sheet.merge_cells(1, 1, 0, 2).is_err());
        assert!(sheet.merge_cells(1, 16_384, 1, 2).is_err());
        assert!(sheet
            .add_data_validation(0, 1, 1, 1, &DataValidation::custom("TRUE"))
            .is_err());
        assert!(sheet.add_row_break(1).is_err());
        assert!(sheet.add_row_break(MAX_ROWS + 1).is_err());
        assert!(sheet.add_column_break(1).is_err());
        assert!(sheet.add_column_break(MAX_COLUMNS).is_ok());
        assert!(matches!(
            sheet.protect(&ProtectionOptions::new().password("")),
            Err(ExcelError::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_sealed_features_in_schema_order() {
        use base64::Engine;
        let salt = base64::engine::general_purpose::STANDARD
            .decode("5kelhTC7DUqQ5qi78ihM8A==")
            .unwrap();
        let mut h = Harness::new(WriterOptions::default());
        let mut sheet = h.sheet();
        {
            let ctx = &mut h.ctx();
            sheet.begin_row(&RowOptions::default(), ctx).unwrap();
            sheet.write_string("x", None, ctx).unwrap();
            sheet.add_row_break(20).unwrap();
            sheet.add_row_break(10).unwrap();
            sheet.add_row_break(20).unwrap();
            sheet.add_column_break(3).unwrap();
            sheet.set_auto_filter(1, 1, 5, 2).unwrap();
            sheet.merge_cells(7, 1, 2, 2).unwrap();
            sheet
                .add_data_validation(1, 1, 1, 1, &DataValidation::custom("A1>0"))
                .unwrap();
            sheet
                .set_header_footer(&HeaderFooter::new().header("&CTitle").first_footer("&P"))
                .unwrap();
            sheet
                .protect(
                    &ProtectionOptions::new()
                        .password("x")
                        .salt(&salt)
                        .spin_count(1)
                        .allow_formatting(),
                )
                .unwrap();
            sheet.seal(ctx).unwrap();
            // Sealing twice is harmless
            sheet.seal(ctx).unwrap();
        }
        let xml = h.xml();
        let order = [
            "</sheetData>",
            "<sheetProtection algorithmName=\"SHA-512\"",
            "<autoFilter ref=\"A1:B5\"/>",
            "<mergeCells",
            "<dataValidations",
            "<pageMargins",
            "<headerFooter differentFirst=\"1\"><oddHeader>&amp;CTitle</oddHeader><firstFooter>&amp;P</firstFooter></headerFooter>",
            "<rowBreaks count=\"2\" manualBreakCount=\"2\"><brk id=\"9\" max=\"16383\" man=\"1\"/><brk id=\"19\" max=\"16383\" man=\"1\"/></rowBreaks>",
            "<colBreaks count=\"1\" manualBreakCount=\"1\"><brk id=\"2\" max=\"1048575\" man=\"1\"/></colBreaks>",
            "</worksheet>",
        ];
        let mut last = 0;
        for part in order {
            let pos = xml[last..]
                .find(part)
                .unwrap_or_else(|| panic!("missing or out of order: {}", part));
            last += pos;
        }
        assert!(xml.contains(
            "hashValue=\"knvz9gF2+6xM5AYITe9miF3lk3SbZfRx4+OzPTFlTIRa8JHFsGo6cdiRzLw8mySy4tgwnTLwENdlB6eqYas2Yg==\" \
             saltValue=\"5kelhTC7DUqQ5qi78ihM8A==\" spinCount=\"1\" sheet=\"1\" objects=\"1\" scenarios=\"1\" \
             formatCells=\"0\" formatColumns=\"0\" formatRows=\"0\"/>"
        ));
        assert_eq!(xml.matches("</worksheet>").count(), 1);
        assert_eq!(
            sheet.auto_filter_name().as_deref(),
            Some("'Data'!$A$1:$B$5")
        );
        assert!(sheet.merge_cells(1, 1, 1, 1).is_err());
    }

    #[test]
    fn test_sheet_header_options() {
        let mut h = Harness::new(WriterOptions::default());
        let options = SheetOptions::new()
            .freeze(1, 2)
            .column(crate::types::ColumnOptions::new(1, 3).width(12.5).hidden());
        SheetWriter::new("Frozen", 1, false, &options, &mut h.ctx()).unwrap();
        let xml = h.xml();
        assert!(xml.contains(
            "<sheetView workbookViewId=\"0\"><pane xSplit=\"2\" ySplit=\"1\" topLeftCell=\"C2\" activePane=\"bottomRight\" state=\"frozen\"/></sheetView>"
        ));
        assert!(xml.contains("<cols><col min=\"1\" max=\"3\" width=\"12.5\" customWidth=\"1\" hidden=\"1\"/></cols>"));
        assert!(xml.ends_with("<sheetData>"));
    }

    #[test]
    fn test_invalid_sheet_options() {
        let bad_columns = SheetOptions::new().column(crate::types::ColumnOptions::new(3, 2));
        assert!(validate_sheet_options(&bad_columns).is_err());
        assert!(validate_sheet_options(&SheetOptions::new().freeze(MAX_ROWS, 0)).is_err());
        assert!(validate_sheet_options(&SheetOptions::new().freeze(5, 1)).is_ok());
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("It's"), "'It''s'");
    }
}
