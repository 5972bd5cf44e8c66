//! Style registry: deduplicates formatting into `styles.xml` ids
//!
//! Each descriptor kind is interned on its own, then the tuple of ids plus the
//! alignment is interned as a cell format (`xf`). Ids are dense, assigned on first
//! use, and never renumbered. Slot 0 of every table (and fill 1, `gray125`) is
//! pre-seeded with the defaults the format hard-codes.

use super::xml_writer::XmlBuffer;
use crate::error::{ExcelError, Result};
use crate::style::{Alignment, Border, BorderSide, CellStyle, Fill, Font, NumberFormat, PatternType, Style};
use indexmap::IndexSet;
use std::hash::Hash;
use std::io::Write;
use std::sync::Arc;

/// Ids below this are built-in number formats
pub const FIRST_CUSTOM_NUMBER_FORMAT: u32 = 164;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FormatKey {
    number_format: u32,
    font: u32,
    fill: u32,
    border: u32,
    alignment: Alignment,
}

fn intern<T: Hash + Eq + Clone>(set: &mut IndexSet<T>, value: &T) -> u32 {
    match set.get_index_of(value) {
        Some(index) => index as u32,
        None => set.insert_full(value.clone()).0 as u32,
    }
}

/// Builder and deduplicator for the workbook stylesheet
pub struct StyleRegistry {
    fonts: IndexSet<Font>,
    fills: IndexSet<Fill>,
    borders: IndexSet<Border>,
    number_formats: IndexSet<String>,
    cell_formats: IndexSet<FormatKey>,
    last: Option<(Style, u32)>,
    lookups: u64,
    saved: bool,
}

impl StyleRegistry {
    pub fn new() -> Self {
        let mut fonts = IndexSet::new();
        fonts.insert(Font::default());

        let mut fills = IndexSet::new();
        fills.insert(Fill::default());
        fills.insert(Fill::pattern(PatternType::Gray125));

        let mut borders = IndexSet::new();
        borders.insert(Border::default());

        let mut cell_formats = IndexSet::new();
        cell_formats.insert(FormatKey {
            number_format: 0,
            font: 0,
            fill: 0,
            border: 0,
            alignment: Alignment::default(),
        });

        StyleRegistry {
            fonts,
            fills,
            borders,
            number_formats: IndexSet::new(),
            cell_formats,
            last: None,
            lookups: 0,
            saved: false,
        }
    }

    /// Resolve a shared style, short-circuiting when it is the same `Arc` as last time
    pub fn resolve(&mut self, style: &Style) -> Result<u32> {
        if let Some((last, id)) = &self.last {
            if Arc::ptr_eq(last, style) {
                return Ok(*id);
            }
        }
        let id = self.resolve_style(style)?;
        self.last = Some((Arc::clone(style), id));
        Ok(id)
    }

    /// Resolve a style by content
    pub fn resolve_style(&mut self, style: &CellStyle) -> Result<u32> {
        if self.saved {
            return Err(ExcelError::AlreadyFinalized);
        }
        self.lookups += 1;

        let number_format = match &style.number_format {
            NumberFormat::General => 0,
            NumberFormat::Builtin(id) => *id as u32,
            NumberFormat::Custom(code) => {
                FIRST_CUSTOM_NUMBER_FORMAT + intern(&mut self.number_formats, code)
            }
        };
        let key = FormatKey {
            number_format,
            font: intern(&mut self.fonts, &style.font),
            fill: intern(&mut self.fills, &style.fill),
            border: intern(&mut self.borders, &style.border),
            alignment: style.alignment,
        };
        Ok(intern(&mut self.cell_formats, &key))
    }

    /// Number of cell formats, including the default at id 0
    pub fn len(&self) -> usize {
        self.cell_formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_formats.is_empty()
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len()
    }

    pub fn border_count(&self) -> usize {
        self.borders.len()
    }

    /// Number of hashed lookups performed (cache hits excluded)
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Write `xl/styles.xml`. The registry is sealed afterwards.
    pub fn write_xml<W: Write + ?Sized>(
        &mut self,
        buffer: &mut XmlBuffer,
        sink: &mut W,
        flush_threshold: usize,
    ) -> Result<()> {
        if self.saved {
            return Err(ExcelError::AlreadyFinalized);
        }
        self.saved = true;
        self.last = None;

        buffer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        buffer.write_str(
            "<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
        );

        if !self.number_formats.is_empty() {
            buffer.start_element("numFmts");
            buffer.attribute_int("count", self.number_formats.len());
            buffer.close_start_tag();
            for (index, code) in self.number_formats.iter().enumerate() {
                buffer.start_element("numFmt");
                buffer.attribute_int("numFmtId", FIRST_CUSTOM_NUMBER_FORMAT + index as u32);
                buffer.attribute("formatCode", code)?;
                buffer.close_empty();
            }
            buffer.end_element("numFmts");
        }

        buffer.start_element("fonts");
        buffer.attribute_int("count", self.fonts.len());
        buffer.close_start_tag();
        for font in &self.fonts {
            write_font(buffer, font)?;
            buffer.flush_if_at_least(sink, flush_threshold)?;
        }
        buffer.end_element("fonts");

        buffer.start_element("fills");
        buffer.attribute_int("count", self.fills.len());
        buffer.close_start_tag();
        for fill in &self.fills {
            write_fill(buffer, fill);
        }
        buffer.end_element("fills");

        buffer.start_element("borders");
        buffer.attribute_int("count", self.borders.len());
        buffer.close_start_tag();
        for border in &self.borders {
            write_border(buffer, border);
        }
        buffer.end_element("borders");
        buffer.flush_if_at_least(sink, flush_threshold)?;

        buffer.write_str(
            "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
        );

        buffer.start_element("cellXfs");
        buffer.attribute_int("count", self.cell_formats.len());
        buffer.close_start_tag();
        for key in &self.cell_formats {
            write_cell_format(buffer, key);
            buffer.flush_if_at_least(sink, flush_threshold)?;
        }
        buffer.end_element("cellXfs");

        buffer.write_str(
            "<cellStyles count=\"1\"><cellStyle name=\"Normal\" xfId=\"0\" builtinId=\"0\"/></cellStyles>",
        );
        buffer.end_element("styleSheet");
        buffer.flush_to(sink)?;

        log::debug!(
            "Saved styles: {} formats, {} fonts, {} fills, {} borders, {} custom number formats",
            self.cell_formats.len(),
            self.fonts.len(),
            self.fills.len(),
            self.borders.len(),
            self.number_formats.len()
        );
        Ok(())
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn write_color(buffer: &mut XmlBuffer, element: &str, color: &crate::style::Color) {
    buffer.start_element(element);
    buffer.write_str(" rgb=\"");
    buffer.write_str(&color.argb_hex());
    buffer.write_raw(b"\"/>");
}

fn write_font(buffer: &mut XmlBuffer, font: &Font) -> Result<()> {
    buffer.write_str("<font>");
    if font.bold {
        buffer.write_str("<b/>");
    }
    if font.italic {
        buffer.write_str("<i/>");
    }
    if font.strikethrough {
        buffer.write_str("<strike/>");
    }
    if font.underline {
        buffer.write_str("<u/>");
    }
    buffer.start_element("sz");
    buffer.attribute_f64("val", font.size())?;
    buffer.close_empty();
    if let Some(color) = &font.color {
        write_color(buffer, "color", color);
    }
    buffer.start_element("name");
    buffer.attribute("val", &font.name)?;
    buffer.close_empty();
    buffer.write_str("<family val=\"2\"/>");
    buffer.end_element("font");
    Ok(())
}

fn write_fill(buffer: &mut XmlBuffer, fill: &Fill) {
    buffer.write_str("<fill><patternFill patternType=\"");
    buffer.write_str(fill.pattern.as_str());
    if fill.foreground.is_none() && fill.background.is_none() {
        buffer.write_str("\"/></fill>");
        return;
    }
    buffer.write_str("\">");
    if let Some(color) = &fill.foreground {
        write_color(buffer, "fgColor", color);
    }
    if let Some(color) = &fill.background {
        write_color(buffer, "bgColor", color);
    }
    buffer.write_str("</patternFill></fill>");
}

fn write_border_side(buffer: &mut XmlBuffer, element: &str, side: &BorderSide) {
    buffer.start_element(element);
    if side.is_none() {
        buffer.close_empty();
        return;
    }
    buffer.write_str(" style=\"");
    buffer.write_str(side.style.as_str());
    buffer.write_raw(b"\"");
    buffer.close_start_tag();
    match &side.color {
        Some(color) => write_color(buffer, "color", color),
        None => buffer.write_str("<color auto=\"1\"/>"),
    }
    buffer.end_element(element);
}

fn write_border(buffer: &mut XmlBuffer, border: &Border) {
    buffer.write_str("<border>");
    write_border_side(buffer, "left", &border.left);
    write_border_side(buffer, "right", &border.right);
    write_border_side(buffer, "top", &border.top);
    write_border_side(buffer, "bottom", &border.bottom);
    buffer.write_str("<diagonal/></border>");
}

fn write_cell_format(buffer: &mut XmlBuffer, key: &FormatKey) {
    buffer.start_element("xf");
    buffer.attribute_int("numFmtId", key.number_format);
    buffer.attribute_int("fontId", key.font);
    buffer.attribute_int("fillId", key.fill);
    buffer.attribute_int("borderId", key.border);
    buffer.write_str(" xfId=\"0\"");
    if key.number_format != 0 {
        buffer.write_str(" applyNumberFormat=\"1\"");
    }
    if key.font != 0 {
        buffer.write_str(" applyFont=\"1\"");
    }
    if key.fill != 0 {
        buffer.write_str(" applyFill=\"1\"");
    }
    if key.border != 0 {
        buffer.write_str(" applyBorder=\"1\"");
    }
    if key.alignment.is_default() {
        buffer.close_empty();
        return;
    }
    buffer.write_str(" applyAlignment=\"1\"><alignment");
    let alignment = &key.alignment;
    if alignment.horizontal != Default::default() {
        buffer.write_str(" horizontal=\"");
        buffer.write_str(alignment.horizontal.as_str());
        buffer.write_raw(b"\"");
    }
    if alignment.vertical != Default::default() {
        buffer.write_str(" vertical=\"");
        buffer.write_str(alignment.vertical.as_str());
        buffer.write_raw(b"\"");
    }
    if alignment.rotation != 0 {
        buffer.attribute_int("textRotation", alignment.rotation);
    }
    if alignment.wrap_text {
        buffer.write_str(" wrapText=\"1\"");
    }
    if alignment.indent != 0 {
        buffer.attribute_int("indent", alignment.indent);
    }
    if alignment.shrink_to_fit {
        buffer.write_str(" shrinkToFit=\"1\"");
    }
    buffer.write_str("/></xf>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_writer::options::InvalidCharPolicy;
    use crate::style::{BorderStyle, Color, HorizontalAlignment};

    #[test]
    fn test_default_style_is_zero() {
        let mut registry = StyleRegistry::new();
        assert_eq!(registry.resolve_style(&CellStyle::default()).unwrap(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.fill_count(), 2);
    }

    #[test]
    fn test_content_equal_styles_share_id() {
        let mut registry = StyleRegistry::new();
        let a = CellStyle::header_bold().shared();
        let b = CellStyle::header_bold().shared();
        assert!(!Arc::ptr_eq(&a, &b));

        let id_a = registry.resolve(&a).unwrap();
        let id_b = registry.resolve(&b).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(id_a, 1);
    }

    #[test]
    fn test_distinct_styles_get_distinct_ids() {
        let mut registry = StyleRegistry::new();
        let styles = [
            CellStyle::header_bold(),
            CellStyle::highlight_yellow(),
            CellStyle::border_thin(),
            CellStyle::currency(),
            CellStyle::new().alignment(Alignment::default().horizontal(HorizontalAlignment::Center)),
            CellStyle::new().font(Font::default().color(Color::RED)),
        ];
        let mut ids: Vec<u32> = styles
            .iter()
            .map(|s| registry.resolve_style(s).unwrap())
            .collect();
        // Resolving in reverse order must not change anything
        for (style, id) in styles.iter().zip(ids.iter()).rev() {
            assert_eq!(registry.resolve_style(style).unwrap(), *id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), styles.len());
    }

    #[test]
    fn test_last_used_cache() {
        let mut registry = StyleRegistry::new();
        let style = CellStyle::border_thin().shared();
        let before = registry.len();

        for _ in 0..1000 {
            registry.resolve(&style).unwrap();
        }

        assert_eq!(registry.len(), before + 1);
        assert_eq!(registry.lookups(), 1);
    }

    #[test]
    fn test_custom_number_formats_above_threshold() {
        let mut registry = StyleRegistry::new();
        registry
            .resolve_style(&CellStyle::new().number_format(NumberFormat::custom("0.000")))
            .unwrap();
        registry
            .resolve_style(&CellStyle::new().number_format(NumberFormat::DATE))
            .unwrap();

        let mut out = Vec::new();
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        registry.write_xml(&mut buffer, &mut out, 1024).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert!(xml.contains("<numFmts count=\"1\"><numFmt numFmtId=\"164\" formatCode=\"0.000\"/></numFmts>"));
        assert!(xml.contains("<xf numFmtId=\"14\""));
        assert!(xml.contains("<cellXfs count=\"3\">"));
        assert!(xml.contains("<patternFill patternType=\"gray125\"/>"));
    }

    #[test]
    fn test_no_resolve_after_save() {
        let mut registry = StyleRegistry::new();
        let mut out = Vec::new();
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        registry.write_xml(&mut buffer, &mut out, 1024).unwrap();

        assert!(matches!(
            registry.resolve_style(&CellStyle::border_thin()),
            Err(ExcelError::AlreadyFinalized)
        ));
        assert!(registry.write_xml(&mut buffer, &mut out, 1024).is_err());
    }

    #[test]
    fn test_border_xml() {
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        write_border(&mut buffer, &Border::all(BorderStyle::Thin));
        let xml = String::from_utf8(buffer.as_bytes().to_vec()).unwrap();
        assert!(xml.starts_with("<border><left style=\"thin\"><color auto=\"1\"/></left>"));
    }
}
