//! Type definitions for cell values and whole-sheet features

use crate::error::{ExcelError, Result};
use crate::style::{Color, Style};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Represents a single cell value in an Excel worksheet
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Empty cell (skipped, the column still advances)
    Empty,
    /// Inline string value
    String(String),
    /// String stored once in the shared strings table
    SharedString(String),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Exact decimal value
    Decimal(Decimal),
    /// Boolean value
    Bool(bool),
    /// Date and time, stored as a serial number
    DateTime(NaiveDateTime),
    /// Error value such as `#N/A`
    Error(String),
    /// Formula value (e.g., "=SUM(A1:A10)"), computed when the file is opened
    Formula(String),
}

impl CellValue {
    /// Check if cell is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::String(s) | CellValue::SharedString(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Decimal(d) => write!(f, "{}", d),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::DateTime(dt) => write!(f, "{}", dt),
            CellValue::Error(e) => f.write_str(e),
            CellValue::Formula(formula) => f.write_str(formula),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<Decimal> for CellValue {
    fn from(d: Decimal) -> Self {
        CellValue::Decimal(d)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

/// Precomputed result stored next to a formula
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaResult {
    Number(f64),
    String(String),
    Bool(bool),
    Error(String),
}

/// `NaiveDate::num_days_from_ce()` of 1899-12-30, serial day 0 of the 1900 date system
const SERIAL_EPOCH_DAYS: i32 = 693_594;
/// Day offset of 1900-03-01; earlier serials are shifted by the phantom 1900-02-29
const PHANTOM_LEAP_DAY: i32 = 61;
const MAX_SERIAL_DAY: i32 = 2_958_465;

/// Convert a date-time to a 1900-system serial number.
///
/// Serial 60 is the non-existent 1900-02-29, so dates before March 1900 are one
/// lower than their day distance from the epoch.
pub fn excel_serial(dt: &NaiveDateTime) -> Result<f64> {
    let days = dt.date().num_days_from_ce() - SERIAL_EPOCH_DAYS;
    if !(2..=MAX_SERIAL_DAY).contains(&days) {
        return Err(ExcelError::InvalidValue(format!(
            "{} is outside the 1900-01-01..=9999-12-31 date range",
            dt
        )));
    }
    let time = dt.time();
    let seconds =
        time.num_seconds_from_midnight() as f64 + time.nanosecond().min(999_999_999) as f64 / 1e9;
    let mut serial = days as f64 + seconds / 86_400.0;
    if days < PHANTOM_LEAP_DAY {
        serial -= 1.0;
    }
    Ok(serial)
}

/// Row-level attributes for `begin_row`
#[derive(Debug, Clone, Default)]
pub struct RowOptions {
    /// Height in points
    pub height: Option<f64>,
    pub hidden: bool,
    /// Style applied to empty cells of the row
    pub style: Option<Style>,
}

impl RowOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }
}

/// Width/visibility/style for a run of columns
#[derive(Debug, Clone)]
pub struct ColumnOptions {
    /// First column, 1-based
    pub first: u32,
    /// Last column, inclusive
    pub last: u32,
    pub width: Option<f64>,
    pub hidden: bool,
    pub style: Option<Style>,
}

impl ColumnOptions {
    pub fn new(first: u32, last: u32) -> Self {
        ColumnOptions {
            first,
            last,
            width: None,
            hidden: false,
            style: None,
        }
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }
}

/// Settings fixed when a sheet begins (they precede the cell data in the part)
#[derive(Debug, Clone, Default)]
pub struct SheetOptions {
    pub columns: Vec<ColumnOptions>,
    pub freeze_rows: u32,
    pub freeze_columns: u32,
    pub hidden: bool,
    pub tab_color: Option<Color>,
    /// Style for cells written without one
    pub default_style: Option<Style>,
}

impl SheetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: ColumnOptions) -> Self {
        self.columns.push(column);
        self
    }

    /// Freeze the top `rows` rows and left `columns` columns
    pub fn freeze(mut self, rows: u32, columns: u32) -> Self {
        self.freeze_rows = rows;
        self.freeze_columns = columns;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn tab_color(mut self, color: Color) -> Self {
        self.tab_color = Some(color);
        self
    }

    pub fn default_style(mut self, style: Style) -> Self {
        self.default_style = Some(style);
        self
    }
}

/// Sheet protection settings. `allow_*` flags unlock the matching action.
#[derive(Debug, Clone)]
pub struct ProtectionOptions {
    pub password: Option<String>,
    /// Fixed salt; a random one is generated when absent
    pub salt: Option<Vec<u8>>,
    pub spin_count: u32,
    pub allow_select_locked_cells: bool,
    pub allow_select_unlocked_cells: bool,
    pub allow_format_cells: bool,
    pub allow_format_columns: bool,
    pub allow_format_rows: bool,
    pub allow_insert_rows: bool,
    pub allow_insert_columns: bool,
    pub allow_delete_rows: bool,
    pub allow_delete_columns: bool,
    pub allow_sort: bool,
    pub allow_auto_filter: bool,
}

impl Default for ProtectionOptions {
    fn default() -> Self {
        ProtectionOptions {
            password: None,
            salt: None,
            spin_count: crate::fast_writer::protection::DEFAULT_SPIN_COUNT,
            allow_select_locked_cells: true,
            allow_select_unlocked_cells: true,
            allow_format_cells: false,
            allow_format_columns: false,
            allow_format_rows: false,
            allow_insert_rows: false,
            allow_insert_columns: false,
            allow_delete_rows: false,
            allow_delete_columns: false,
            allow_sort: false,
            allow_auto_filter: false,
        }
    }
}

impl ProtectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn salt(mut self, salt: &[u8]) -> Self {
        self.salt = Some(salt.to_vec());
        self
    }

    pub fn spin_count(mut self, spin_count: u32) -> Self {
        self.spin_count = spin_count;
        self
    }

    pub fn allow_formatting(mut self) -> Self {
        self.allow_format_cells = true;
        self.allow_format_columns = true;
        self.allow_format_rows = true;
        self
    }

    pub fn allow_sort_and_filter(mut self) -> Self {
        self.allow_sort = true;
        self.allow_auto_filter = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationType {
    #[default]
    Any,
    Whole,
    Decimal,
    List,
    Date,
    Time,
    TextLength,
    Custom,
}

impl ValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::Any => "none",
            ValidationType::Whole => "whole",
            ValidationType::Decimal => "decimal",
            ValidationType::List => "list",
            ValidationType::Date => "date",
            ValidationType::Time => "time",
            ValidationType::TextLength => "textLength",
            ValidationType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationOperator {
    #[default]
    Between,
    NotBetween,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl ValidationOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOperator::Between => "between",
            ValidationOperator::NotBetween => "notBetween",
            ValidationOperator::Equal => "equal",
            ValidationOperator::NotEqual => "notEqual",
            ValidationOperator::GreaterThan => "greaterThan",
            ValidationOperator::LessThan => "lessThan",
            ValidationOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            ValidationOperator::LessThanOrEqual => "lessThanOrEqual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationErrorStyle {
    #[default]
    Stop,
    Warning,
    Information,
}

impl ValidationErrorStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorStyle::Stop => "stop",
            ValidationErrorStyle::Warning => "warning",
            ValidationErrorStyle::Information => "information",
        }
    }
}

/// A data validation rule. Two rules are the same rule when every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataValidation {
    pub kind: ValidationType,
    pub operator: ValidationOperator,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub allow_blank: bool,
    pub hide_dropdown: bool,
    pub show_input_message: bool,
    pub show_error_message: bool,
    pub error_style: ValidationErrorStyle,
    pub prompt_title: Option<String>,
    pub prompt: Option<String>,
    pub error_title: Option<String>,
    pub error: Option<String>,
}

impl DataValidation {
    fn with_kind(kind: ValidationType) -> Self {
        DataValidation {
            kind,
            allow_blank: true,
            show_error_message: true,
            ..Default::default()
        }
    }

    /// Dropdown of literal items
    pub fn list(items: &[&str]) -> Self {
        let joined = items.join(",").replace('"', "\"\"");
        let mut rule = Self::with_kind(ValidationType::List);
        rule.formula1 = Some(format!("\"{}\"", joined));
        rule
    }

    /// Dropdown fed from a range such as `$A$1:$A$10`
    pub fn list_from_range(range: &str) -> Self {
        let mut rule = Self::with_kind(ValidationType::List);
        rule.formula1 = Some(range.to_string());
        rule
    }

    pub fn whole_number(operator: ValidationOperator, formula1: &str, formula2: Option<&str>) -> Self {
        Self::compare(ValidationType::Whole, operator, formula1, formula2)
    }

    pub fn decimal(operator: ValidationOperator, formula1: &str, formula2: Option<&str>) -> Self {
        Self::compare(ValidationType::Decimal, operator, formula1, formula2)
    }

    pub fn text_length(operator: ValidationOperator, formula1: &str, formula2: Option<&str>) -> Self {
        Self::compare(ValidationType::TextLength, operator, formula1, formula2)
    }

    pub fn custom(formula: &str) -> Self {
        let mut rule = Self::with_kind(ValidationType::Custom);
        rule.formula1 = Some(formula.to_string());
        rule
    }

    fn compare(
        kind: ValidationType,
        operator: ValidationOperator,
        formula1: &str,
        formula2: Option<&str>,
    ) -> Self {
        let mut rule = Self::with_kind(kind);
        rule.operator = operator;
        rule.formula1 = Some(formula1.to_string());
        rule.formula2 = formula2.map(str::to_string);
        rule
    }

    pub fn allow_blank(mut self, value: bool) -> Self {
        self.allow_blank = value;
        self
    }

    pub fn input_message(mut self, title: &str, message: &str) -> Self {
        self.show_input_message = true;
        self.prompt_title = Some(title.to_string());
        self.prompt = Some(message.to_string());
        self
    }

    pub fn error_message(mut self, style: ValidationErrorStyle, title: &str, message: &str) -> Self {
        self.show_error_message = true;
        self.error_style = style;
        self.error_title = Some(title.to_string());
        self.error = Some(message.to_string());
        self
    }
}

/// Print header/footer text. Formatting codes (`&P`, `&D`, ...) pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFooter {
    pub odd_header: Option<String>,
    pub odd_footer: Option<String>,
    pub even_header: Option<String>,
    pub even_footer: Option<String>,
    pub first_header: Option<String>,
    pub first_footer: Option<String>,
}

impl HeaderFooter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, text: &str) -> Self {
        self.odd_header = Some(text.to_string());
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.odd_footer = Some(text.to_string());
        self
    }

    pub fn even_header(mut self, text: &str) -> Self {
        self.even_header = Some(text.to_string());
        self
    }

    pub fn even_footer(mut self, text: &str) -> Self {
        self.even_footer = Some(text.to_string());
        self
    }

    pub fn first_header(mut self, text: &str) -> Self {
        self.first_header = Some(text.to_string());
        self
    }

    pub fn first_footer(mut self, text: &str) -> Self {
        self.first_footer = Some(text.to_string());
        self
    }

    pub fn different_odd_even(&self) -> bool {
        self.even_header.is_some() || self.even_footer.is_some()
    }

    pub fn different_first(&self) -> bool {
        self.first_header.is_some() || self.first_footer.is_some()
    }
}

/// Document metadata written to `docProps/core.xml` and `docProps/app.xml`
#[derive(Debug, Clone, Default)]
pub struct DocumentProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub company: Option<String>,
    /// Defaults to the time of finalization
    pub created: Option<DateTime<Utc>>,
}

impl DocumentProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }

    pub fn created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(excel_serial(&at(1900, 1, 1, 0, 0, 0)).unwrap(), 1.0);
        assert_eq!(excel_serial(&at(1900, 2, 28, 0, 0, 0)).unwrap(), 59.0);
        assert_eq!(excel_serial(&at(1900, 3, 1, 0, 0, 0)).unwrap(), 61.0);

        let serial = excel_serial(&at(2020, 5, 6, 18, 27, 0)).unwrap();
        assert!((serial - 43957.76875).abs() < 1e-6);
    }

    #[test]
    fn test_serial_out_of_range() {
        assert!(excel_serial(&at(1899, 12, 31, 0, 0, 0)).is_err());
        assert!(excel_serial(&at(9999, 12, 31, 23, 59, 59)).is_ok());
    }

    #[test]
    fn test_validation_equality_is_by_content() {
        let a = DataValidation::list(&["Yes", "No"]);
        let b = DataValidation::list(&["Yes", "No"]);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().allow_blank(false));
        assert_eq!(a.formula1.as_deref(), Some("\"Yes,No\""));
    }

    #[test]
    fn test_header_footer_flags() {
        let hf = HeaderFooter::new().header("&CPage &P");
        assert!(!hf.different_first());
        assert!(!hf.different_odd_even());

        let hf = hf.first_footer("Cover").even_header("Even");
        assert!(hf.different_first());
        assert!(hf.different_odd_even());
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::from(42i64).to_string(), "42");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert!(CellValue::Empty.is_empty());
    }
}
