//! Optimized XML buffer with minimal allocations
//!
//! `XmlBuffer` accumulates UTF-8 markup in a reusable `Vec<u8>` and hands it to a
//! destination stream in chunks. Text goes through one of two escaping entry points
//! (element text or attribute value) that validate every character against the XML
//! `Char` production and apply the writer's [`InvalidCharPolicy`].

use super::options::InvalidCharPolicy;
use crate::error::{ExcelError, Result};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::io::Write;

/// Characters allowed by XML 1.0 (`#x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]`)
#[inline]
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

#[inline]
fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// True when leading or trailing whitespace would be collapsed on reload
#[inline]
pub fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(is_xml_space) || text.ends_with(is_xml_space)
}

/// Check `text` for characters XML cannot carry.
///
/// Returns the text unchanged when it is clean, a filtered copy under
/// [`InvalidCharPolicy::Skip`], or the position of the first bad character under
/// [`InvalidCharPolicy::Fail`].
pub fn sanitize(text: &str, policy: InvalidCharPolicy) -> Result<Cow<'_, str>> {
    match text.char_indices().find(|(_, c)| !is_xml_char(*c)) {
        None => Ok(Cow::Borrowed(text)),
        Some((position, c)) => match policy {
            InvalidCharPolicy::Fail => Err(ExcelError::InvalidCharacter {
                position,
                code: c as u32,
            }),
            InvalidCharPolicy::Skip => {
                log::warn!("Dropping invalid XML characters from text at byte {}", position);
                Ok(Cow::Owned(text.chars().filter(|c| is_xml_char(*c)).collect()))
            }
        },
    }
}

#[inline]
fn escape_for(c: char, attribute: bool) -> Option<&'static [u8]> {
    match c {
        '<' => Some(b"&lt;"),
        '>' => Some(b"&gt;"),
        '&' => Some(b"&amp;"),
        '"' if attribute => Some(b"&quot;"),
        '\'' if attribute => Some(b"&apos;"),
        _ => None,
    }
}

/// Reusable XML output buffer
pub struct XmlBuffer {
    buffer: Vec<u8>,
    policy: InvalidCharPolicy,
}

impl XmlBuffer {
    pub fn new(policy: InvalidCharPolicy) -> Self {
        Self::with_capacity(8192, policy) // 8KB buffer
    }

    pub fn with_capacity(capacity: usize, policy: InvalidCharPolicy) -> Self {
        XmlBuffer {
            buffer: Vec::with_capacity(capacity),
            policy,
        }
    }

    pub fn policy(&self) -> InvalidCharPolicy {
        self.policy
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop everything written after `len` (used to undo a half-written cell)
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write trusted markup without escaping
    #[inline]
    pub fn write_str(&mut self, s: &str) {
        self.buffer.extend_from_slice(s.as_bytes());
    }

    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) {
        let mut num = itoa::Buffer::new();
        self.buffer.extend_from_slice(num.format(value).as_bytes());
    }

    /// Write a double in shortest round-trip form, independent of locale
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(ExcelError::InvalidValue(format!(
                "{} cannot be stored in a numeric cell",
                value
            )));
        }
        if value.fract() == 0.0 && value.abs() < 1e15 {
            self.write_int(value as i64);
        } else {
            let mut num = ryu::Buffer::new();
            self.buffer
                .extend_from_slice(num.format_finite(value).as_bytes());
        }
        Ok(())
    }

    /// Write a decimal exactly as its canonical text
    pub fn write_decimal(&mut self, value: &Decimal) -> Result<()> {
        write!(self.buffer, "{}", value)?;
        Ok(())
    }

    /// Write element text, escaping `<`, `>` and `&`
    pub fn write_escaped_text(&mut self, text: &str) -> Result<()> {
        self.escape_str(text, false)
    }

    /// Write an attribute value, escaping `<`, `>`, `&`, `'` and `"`
    pub fn write_escaped_attr(&mut self, text: &str) -> Result<()> {
        self.escape_str(text, true)
    }

    /// UTF-16 variant of [`write_escaped_text`](Self::write_escaped_text); detects lone surrogates
    pub fn write_escaped_text_utf16(&mut self, text: &[u16]) -> Result<()> {
        self.escape_utf16(text, false)
    }

    /// UTF-16 variant of [`write_escaped_attr`](Self::write_escaped_attr)
    pub fn write_escaped_attr_utf16(&mut self, text: &[u16]) -> Result<()> {
        self.escape_utf16(text, true)
    }

    /// Emit ` xml:space="preserve"` when `text` has whitespace at either edge
    #[inline]
    pub fn write_space_preserve(&mut self, text: &str) {
        if needs_space_preserve(text) {
            self.buffer.extend_from_slice(b" xml:space=\"preserve\"");
        }
    }

    fn escape_str(&mut self, text: &str, attribute: bool) -> Result<()> {
        let bytes = text.as_bytes();
        let mut start = 0;
        for (i, c) in text.char_indices() {
            if let Some(entity) = escape_for(c, attribute) {
                self.buffer.extend_from_slice(&bytes[start..i]);
                self.buffer.extend_from_slice(entity);
                start = i + 1;
            } else if !is_xml_char(c) {
                self.buffer.extend_from_slice(&bytes[start..i]);
                start = i + c.len_utf8();
                self.reject(i, c as u32)?;
            }
        }
        self.buffer.extend_from_slice(&bytes[start..]);
        Ok(())
    }

    fn escape_utf16(&mut self, text: &[u16], attribute: bool) -> Result<()> {
        let mut position = 0;
        for unit in char::decode_utf16(text.iter().copied()) {
            match unit {
                Ok(c) => {
                    if let Some(entity) = escape_for(c, attribute) {
                        self.buffer.extend_from_slice(entity);
                    } else if is_xml_char(c) {
                        let mut utf8 = [0u8; 4];
                        self.buffer
                            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                    } else {
                        self.reject(position, c as u32)?;
                    }
                    position += c.len_utf16();
                }
                Err(err) => {
                    self.reject(position, err.unpaired_surrogate() as u32)?;
                    position += 1;
                }
            }
        }
        Ok(())
    }

    fn reject(&self, position: usize, code: u32) -> Result<()> {
        match self.policy {
            InvalidCharPolicy::Fail => Err(ExcelError::InvalidCharacter { position, code }),
            InvalidCharPolicy::Skip => {
                log::warn!(
                    "Skipping invalid XML character U+{:04X} at position {}",
                    code,
                    position
                );
                Ok(())
            }
        }
    }

    /// Write XML element start tag (without closing `>`)
    #[inline]
    pub fn start_element(&mut self, name: &str) {
        self.buffer.push(b'<');
        self.write_str(name);
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) {
        self.buffer.extend_from_slice(b"</");
        self.write_str(name);
        self.buffer.push(b'>');
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) {
        self.buffer.push(b'>');
    }

    /// Close start tag as a self-closing element
    #[inline]
    pub fn close_empty(&mut self) {
        self.buffer.extend_from_slice(b"/>");
    }

    /// Write attribute with an escaped value
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.buffer.push(b' ');
        self.write_str(name);
        self.buffer.extend_from_slice(b"=\"");
        self.write_escaped_attr(value)?;
        self.buffer.push(b'"');
        Ok(())
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) {
        self.buffer.push(b' ');
        self.write_str(name);
        self.buffer.extend_from_slice(b"=\"");
        self.write_int(value);
        self.buffer.push(b'"');
    }

    /// Write attribute with floating point value
    #[inline]
    pub fn attribute_f64(&mut self, name: &str, value: f64) -> Result<()> {
        self.buffer.push(b' ');
        self.write_str(name);
        self.buffer.extend_from_slice(b"=\"");
        self.write_f64(value)?;
        self.buffer.push(b'"');
        Ok(())
    }

    /// `<name>escaped text</name>`
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start_element(name);
        self.close_start_tag();
        self.write_escaped_text(text)?;
        self.end_element(name);
        Ok(())
    }

    /// Copy the buffer to `sink` and reset it to empty
    pub fn flush_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<()> {
        if !self.buffer.is_empty() {
            sink.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush only once the buffer holds at least `threshold` bytes
    #[inline]
    pub fn flush_if_at_least<W: Write + ?Sized>(
        &mut self,
        sink: &mut W,
        threshold: usize,
    ) -> Result<bool> {
        if self.buffer.len() >= threshold {
            self.flush_to(sink)?;
            return Ok(true);
        }
        Ok(false)
    }
}
