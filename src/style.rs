//! Cell formatting descriptors
//!
//! These are plain values compared by content. A [`CellStyle`] bundles one descriptor
//! of each kind; wrap it in a [`Style`] (`Arc<CellStyle>`) to share it across cells so
//! repeated writes hit the registry's last-used fast path.

use std::sync::Arc;

/// Shared handle to a cell style
pub type Style = Arc<CellStyle>;

/// RGB color (`0xRRGGBB`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xFFFFFF);
    pub const RED: Color = Color(0xFF0000);
    pub const GREEN: Color = Color(0xC6EFCE);
    pub const YELLOW: Color = Color(0xFFFF00);

    pub const fn rgb(value: u32) -> Self {
        Color(value & 0x00FF_FFFF)
    }

    /// Opaque ARGB hex as stored in the styles part, e.g. `FFFF0000`
    pub fn argb_hex(&self) -> String {
        format!("FF{:06X}", self.0)
    }
}

/// Font descriptor. Size is kept in hundredths of a point so the type stays hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Font {
    pub name: String,
    size_hundredths: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Option<Color>,
}

impl Default for Font {
    fn default() -> Self {
        Font::new("Calibri", 11.0)
    }
}

impl Font {
    pub fn new(name: &str, size: f64) -> Self {
        Font {
            name: name.to_string(),
            size_hundredths: (size * 100.0).round().max(100.0) as u32,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            color: None,
        }
    }

    pub fn size(&self) -> f64 {
        self.size_hundredths as f64 / 100.0
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PatternType {
    #[default]
    None,
    Solid,
    Gray125,
    Gray0625,
    LightGray,
    MediumGray,
    DarkGray,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::None => "none",
            PatternType::Solid => "solid",
            PatternType::Gray125 => "gray125",
            PatternType::Gray0625 => "gray0625",
            PatternType::LightGray => "lightGray",
            PatternType::MediumGray => "mediumGray",
            PatternType::DarkGray => "darkGray",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fill {
    pub pattern: PatternType,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

impl Fill {
    /// Solid background in `color`
    pub fn solid(color: Color) -> Self {
        Fill {
            pattern: PatternType::Solid,
            foreground: Some(color),
            background: None,
        }
    }

    pub fn pattern(pattern: PatternType) -> Self {
        Fill {
            pattern,
            ..Fill::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderStyle {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
}

impl BorderStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::None => "none",
            BorderStyle::Thin => "thin",
            BorderStyle::Medium => "medium",
            BorderStyle::Thick => "thick",
            BorderStyle::Dashed => "dashed",
            BorderStyle::Dotted => "dotted",
            BorderStyle::Double => "double",
            BorderStyle::Hair => "hair",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BorderSide {
    pub style: BorderStyle,
    pub color: Option<Color>,
}

impl BorderSide {
    pub fn new(style: BorderStyle) -> Self {
        BorderSide { style, color: None }
    }

    pub fn is_none(&self) -> bool {
        self.style == BorderStyle::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Border {
    pub left: BorderSide,
    pub right: BorderSide,
    pub top: BorderSide,
    pub bottom: BorderSide,
}

impl Border {
    /// Same line on all four sides
    pub fn all(style: BorderStyle) -> Self {
        let side = BorderSide::new(style);
        Border {
            left: side,
            right: side,
            top: side,
            bottom: side,
        }
    }
}

/// Number format: one of the built-in ids below 164, or a custom format code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    #[default]
    General,
    Builtin(u16),
    Custom(String),
}

impl NumberFormat {
    /// `m/d/yy h:mm`
    pub const DATE_TIME: NumberFormat = NumberFormat::Builtin(22);
    /// `mm-dd-yy`
    pub const DATE: NumberFormat = NumberFormat::Builtin(14);
    /// `0.00%`
    pub const PERCENT: NumberFormat = NumberFormat::Builtin(10);
    /// `#,##0`
    pub const THOUSANDS: NumberFormat = NumberFormat::Builtin(3);
    /// `#,##0.00`
    pub const THOUSANDS_DECIMAL: NumberFormat = NumberFormat::Builtin(4);

    pub fn custom(code: &str) -> Self {
        NumberFormat::Custom(code.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterContinuous,
    Distributed,
}

impl HorizontalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorizontalAlignment::General => "general",
            HorizontalAlignment::Left => "left",
            HorizontalAlignment::Center => "center",
            HorizontalAlignment::Right => "right",
            HorizontalAlignment::Fill => "fill",
            HorizontalAlignment::Justify => "justify",
            HorizontalAlignment::CenterContinuous => "centerContinuous",
            HorizontalAlignment::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlignment {
    #[default]
    Bottom,
    Top,
    Center,
    Justify,
    Distributed,
}

impl VerticalAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Bottom => "bottom",
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Justify => "justify",
            VerticalAlignment::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    pub wrap_text: bool,
    pub shrink_to_fit: bool,
    pub indent: u8,
    /// Degrees 0-180, or 255 for vertical text
    pub rotation: u8,
}

impl Alignment {
    pub fn is_default(&self) -> bool {
        *self == Alignment::default()
    }

    pub fn horizontal(mut self, value: HorizontalAlignment) -> Self {
        self.horizontal = value;
        self
    }

    pub fn vertical(mut self, value: VerticalAlignment) -> Self {
        self.vertical = value;
        self
    }

    pub fn wrap_text(mut self) -> Self {
        self.wrap_text = true;
        self
    }
}

/// Composite cell style: one descriptor of each kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    pub font: Font,
    pub fill: Fill,
    pub border: Border,
    pub number_format: NumberFormat,
    pub alignment: Alignment,
}

impl CellStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(mut self, font: Font) -> Self {
        self.font = font;
        self
    }

    pub fn fill(mut self, fill: Fill) -> Self {
        self.fill = fill;
        self
    }

    pub fn border(mut self, border: Border) -> Self {
        self.border = border;
        self
    }

    pub fn number_format(mut self, format: NumberFormat) -> Self {
        self.number_format = format;
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Wrap into a shareable [`Style`]
    pub fn shared(self) -> Style {
        Arc::new(self)
    }

    /// Bold text for headers
    pub fn header_bold() -> Self {
        CellStyle::new().font(Font::default().bold())
    }

    /// Date format (mm-dd-yy)
    pub fn date() -> Self {
        CellStyle::new().number_format(NumberFormat::DATE)
    }

    /// DateTime format (m/d/yy h:mm)
    pub fn timestamp() -> Self {
        CellStyle::new().number_format(NumberFormat::DATE_TIME)
    }

    /// Currency format ($#,##0.00)
    pub fn currency() -> Self {
        CellStyle::new().number_format(NumberFormat::custom("\"$\"#,##0.00"))
    }

    /// Yellow background highlight
    pub fn highlight_yellow() -> Self {
        CellStyle::new().fill(Fill::solid(Color::YELLOW))
    }

    /// Thin borders on all sides
    pub fn border_thin() -> Self {
        CellStyle::new().border(Border::all(BorderStyle::Thin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_equality() {
        let a = CellStyle::new().font(Font::new("Arial", 10.5).bold());
        let b = CellStyle::new().font(Font::new("Arial", 10.5).bold());
        assert_eq!(a, b);
        assert_ne!(a, CellStyle::header_bold());
        assert_eq!(a.font.size(), 10.5);
    }

    #[test]
    fn test_color_hex() {
        assert_eq!(Color::RED.argb_hex(), "FFFF0000");
        assert_eq!(Color::rgb(0x12_3456).argb_hex(), "FF123456");
    }
}
