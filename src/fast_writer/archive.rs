//! Destinations for the package entries
//!
//! The workbook writes every part through [`ArchiveSink`]: open a named entry,
//! stream its bytes through `Write`, then finish the archive once at the end.

use super::streaming_zip_writer::ZipPackage;
use crate::error::{ExcelError, Result};
use s_zip::StreamingZipWriter;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Sequential entry-by-entry archive output
pub trait ArchiveSink: Write {
    /// Close the current entry (if any) and open `name`
    fn start_entry(&mut self, name: &str) -> Result<()>;

    /// Write the archive trailer. Calling it again does nothing.
    fn finish(&mut self) -> Result<()>;
}

impl<W: Write> ArchiveSink for ZipPackage<W> {
    fn start_entry(&mut self, name: &str) -> Result<()> {
        ZipPackage::start_entry(self, name)
    }

    fn finish(&mut self) -> Result<()> {
        ZipPackage::finish(self)
    }
}

/// File-backed sink using the `s-zip` streaming writer
pub struct SZipSink {
    writer: Option<StreamingZipWriter<File>>,
}

impl SZipSink {
    pub fn create<P: AsRef<Path>>(path: P, compression_level: u32) -> Result<Self> {
        let path = path.as_ref().to_string_lossy();
        let writer = StreamingZipWriter::with_compression(&*path, compression_level.min(9))?;
        Ok(SZipSink {
            writer: Some(writer),
        })
    }

    fn writer(&mut self) -> Result<&mut StreamingZipWriter<File>> {
        self.writer.as_mut().ok_or(ExcelError::AlreadyFinalized)
    }
}

impl Write for SZipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = self.writer().map_err(io::Error::other)?;
        writer
            .write_data(buf)
            .map_err(|err| io::Error::other(ExcelError::from(err)))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArchiveSink for SZipSink {
    fn start_entry(&mut self, name: &str) -> Result<()> {
        self.writer()?.start_entry(name)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_szip_sink_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.zip");

        let mut sink = SZipSink::create(&path, 6).unwrap();
        sink.start_entry("xl/a.xml").unwrap();
        sink.write_all(b"<a/>").unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.start_entry("late.xml").is_err());

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("xl/a.xml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<a/>");
    }

    #[test]
    fn test_zip_package_through_trait() {
        fn write_part(sink: &mut dyn ArchiveSink) -> Result<()> {
            sink.start_entry("p.xml")?;
            sink.write_all(b"<p/>")?;
            sink.finish()
        }

        let mut package = ZipPackage::new(Vec::new(), 6);
        write_part(&mut package).unwrap();
        assert!(package.into_inner().unwrap().starts_with(b"PK\x03\x04"));
    }
}
