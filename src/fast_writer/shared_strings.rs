//! Shared strings table for string deduplication

use super::xml_writer::XmlBuffer;
use crate::error::Result;
use indexmap::IndexSet;
use std::io::Write;

/// Shared strings table that deduplicates strings across the workbook.
///
/// IDs are dense and assigned in first-seen order; the index of a string in the
/// set is its ID, so saving in set order is saving in ID order.
pub struct SharedStrings {
    strings: IndexSet<String>,
    references: u64,
}

impl SharedStrings {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SharedStrings {
            strings: IndexSet::with_capacity(capacity),
            references: 0,
        }
    }

    /// Add a string and get its index
    pub fn add_string(&mut self, s: &str) -> u32 {
        self.references += 1;
        if let Some(index) = self.strings.get_index_of(s) {
            return index as u32;
        }
        let (index, _) = self.strings.insert_full(s.to_owned());
        index as u32
    }

    /// Get number of unique strings
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    /// Number of cells that referenced the table
    pub fn reference_count(&self) -> u64 {
        self.references
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.strings.get_index(index as usize).map(String::as_str)
    }

    /// Write `xl/sharedStrings.xml`, flushing into `sink` as the buffer fills
    pub fn write_xml<W: Write + ?Sized>(
        &self,
        buffer: &mut XmlBuffer,
        sink: &mut W,
        flush_threshold: usize,
    ) -> Result<()> {
        buffer.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        buffer.start_element("sst");
        buffer.attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
        )?;
        buffer.attribute_int("count", self.references);
        buffer.attribute_int("uniqueCount", self.strings.len());
        buffer.close_start_tag();

        for s in &self.strings {
            buffer.write_raw(b"<si><t");
            buffer.write_space_preserve(s);
            buffer.close_start_tag();
            buffer.write_escaped_text(s)?;
            buffer.write_raw(b"</t></si>");
            buffer.flush_if_at_least(sink, flush_threshold)?;
        }

        buffer.end_element("sst");
        buffer.flush_to(sink)
    }
}

impl Default for SharedStrings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_writer::options::InvalidCharPolicy;

    #[test]
    fn test_shared_strings() {
        let mut ss = SharedStrings::new();

        let idx1 = ss.add_string("Hello");
        let idx2 = ss.add_string("World");
        let idx3 = ss.add_string("Hello"); // Duplicate

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0); // Should return same index
        assert_eq!(ss.count(), 2);
        assert_eq!(ss.reference_count(), 3);
        assert_eq!(ss.get(1), Some("World"));
    }

    #[test]
    fn test_write_xml_in_id_order() {
        let mut ss = SharedStrings::new();
        ss.add_string("b & c");
        ss.add_string(" padded");
        ss.add_string("b & c");

        let mut out = Vec::new();
        let mut buffer = XmlBuffer::new(InvalidCharPolicy::Fail);
        ss.write_xml(&mut buffer, &mut out, 16).unwrap();

        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("count=\"3\" uniqueCount=\"2\""));
        let first = xml.find("<si><t>b &amp; c</t></si>").unwrap();
        let second = xml
            .find("<si><t xml:space=\"preserve\"> padded</t></si>")
            .unwrap();
        assert!(first < second);
        assert!(xml.ends_with("</sst>"));
    }
}
