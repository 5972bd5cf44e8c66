//! Streaming ZIP writer that compresses XML on-the-fly without temp files
//!
//! Entries are deflated straight into the output as they are written. Sizes and
//! CRC are not known up front, so every local header sets the data-descriptor flag
//! and the real values follow the compressed data. The output is only ever appended
//! to, which means any `Write` works as the destination: a file, a socket, a `Vec`.

use crate::error::{ExcelError, Result};
use crc32fast::Hasher as Crc32;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x0606_4b50;
const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Bit 3: sizes in data descriptor, bit 11: UTF-8 names
const FLAGS: u16 = 0x0808;
const METHOD_DEFLATE: u16 = 8;
const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;
/// 1980-01-01 00:00
const DOS_DATE: u16 = 0x0021;
const DOS_TIME: u16 = 0;

/// Compressed bytes are staged up to this size before they go to the output
const STAGING_LIMIT: usize = 64 * 1024;
const MAX_ENTRIES: usize = 0xFFFF;

/// Entry already written, kept for the central directory
struct ZipEntry {
    name: String,
    local_header_offset: u64,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
}

struct CurrentEntry {
    name: String,
    local_header_offset: u64,
    crc: Crc32,
    uncompressed_size: u64,
    compressed_size: u64,
    encoder: DeflateEncoder<Vec<u8>>,
}

/// ZIP package writer over any append-only destination
pub struct ZipPackage<W: Write> {
    output: W,
    offset: u64,
    entries: Vec<ZipEntry>,
    current_entry: Option<CurrentEntry>,
    compression_level: u32,
    zip64: bool,
    finished: bool,
}

impl<W: Write> ZipPackage<W> {
    pub fn new(output: W, compression_level: u32) -> Self {
        ZipPackage {
            output,
            offset: 0,
            entries: Vec::new(),
            current_entry: None,
            compression_level: compression_level.min(9),
            zip64: false,
            finished: false,
        }
    }

    /// Write ZIP64 records so entries and the archive may exceed 4 GiB
    pub fn with_zip64(mut self, zip64: bool) -> Self {
        self.zip64 = zip64;
        self
    }

    /// Bytes written to the destination so far
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    /// Direct access to the destination. Bytes may be taken out of it, but nothing
    /// written into it directly may precede what the package writes next.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.output
    }

    /// Finish the archive if needed and return the destination
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.output)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    fn fits_u32(&self, what: &str, value: u64) -> Result<u32> {
        if value >= u32::MAX as u64 {
            return Err(ExcelError::ArchiveLimit(format!(
                "{} of {} bytes needs ZIP64, which is disabled",
                what, value
            )));
        }
        Ok(value as u32)
    }

    /// Start a new entry (file) in the ZIP, finishing the previous one
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        if self.finished {
            return Err(ExcelError::AlreadyFinalized);
        }
        self.finish_current_entry()?;
        if self.entries.len() >= MAX_ENTRIES && !self.zip64 {
            return Err(ExcelError::ArchiveLimit(format!(
                "more than {} entries needs ZIP64, which is disabled",
                MAX_ENTRIES
            )));
        }

        let local_header_offset = self.offset;
        if !self.zip64 {
            self.fits_u32("entry offset", local_header_offset)?;
        }

        self.put_u32(LOCAL_HEADER_SIG)?;
        self.put_u16(if self.zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT })?;
        self.put_u16(FLAGS)?;
        self.put_u16(METHOD_DEFLATE)?;
        self.put_u16(DOS_TIME)?;
        self.put_u16(DOS_DATE)?;
        self.put_u32(0)?; // crc32, in data descriptor
        if self.zip64 {
            self.put_u32(u32::MAX)?;
            self.put_u32(u32::MAX)?;
        } else {
            self.put_u32(0)?;
            self.put_u32(0)?;
        }
        self.put_u16(name.len() as u16)?;
        self.put_u16(if self.zip64 { 20 } else { 0 })?;
        self.put(name.as_bytes())?;
        if self.zip64 {
            self.put_u16(ZIP64_EXTRA_ID)?;
            self.put_u16(16)?;
            self.put_u64(0)?;
            self.put_u64(0)?;
        }

        self.current_entry = Some(CurrentEntry {
            name: name.to_string(),
            local_header_offset,
            crc: Crc32::new(),
            uncompressed_size: 0,
            compressed_size: 0,
            encoder: DeflateEncoder::new(
                Vec::with_capacity(STAGING_LIMIT),
                Compression::new(self.compression_level),
            ),
        });
        Ok(())
    }

    /// Write uncompressed data to current entry (will be compressed on-the-fly)
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let entry = self
            .current_entry
            .as_mut()
            .ok_or_else(|| ExcelError::Archive("No entry started".to_string()))?;
        entry.crc.update(data);
        entry.uncompressed_size += data.len() as u64;
        entry.encoder.write_all(data)?;

        if entry.encoder.get_ref().len() >= STAGING_LIMIT {
            self.drain_staged()?;
        }
        Ok(())
    }

    /// Move compressed bytes of the open entry to the output
    fn drain_staged(&mut self) -> Result<()> {
        let Some(entry) = self.current_entry.as_mut() else {
            return Ok(());
        };
        let staged = entry.encoder.get_mut();
        if staged.is_empty() {
            return Ok(());
        }
        self.output.write_all(staged)?;
        let len = staged.len() as u64;
        staged.clear();
        entry.compressed_size += len;
        self.offset += len;
        Ok(())
    }

    /// Finish compression and write the data descriptor
    fn finish_current_entry(&mut self) -> Result<()> {
        let Some(entry) = self.current_entry.take() else {
            return Ok(());
        };
        let remaining = entry.encoder.finish()?;
        self.put(&remaining)?;

        let crc32 = entry.crc.finalize();
        let compressed_size = entry.compressed_size + remaining.len() as u64;
        let uncompressed_size = entry.uncompressed_size;

        self.put_u32(DATA_DESCRIPTOR_SIG)?;
        self.put_u32(crc32)?;
        if self.zip64 {
            self.put_u64(compressed_size)?;
            self.put_u64(uncompressed_size)?;
        } else {
            let compressed = self.fits_u32("compressed entry", compressed_size)?;
            let uncompressed = self.fits_u32("entry", uncompressed_size)?;
            self.put_u32(compressed)?;
            self.put_u32(uncompressed)?;
        }

        self.entries.push(ZipEntry {
            name: entry.name,
            local_header_offset: entry.local_header_offset,
            crc32,
            compressed_size,
            uncompressed_size,
        });
        Ok(())
    }

    /// Finish ZIP file (write central directory). Further calls do nothing.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.finish_current_entry()?;

        let central_dir_offset = self.offset;
        let entries = std::mem::take(&mut self.entries);
        for entry in &entries {
            self.put_u32(CENTRAL_DIR_SIG)?;
            let version = if self.zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };
            self.put_u16(version)?; // made by
            self.put_u16(version)?; // needed
            self.put_u16(FLAGS)?;
            self.put_u16(METHOD_DEFLATE)?;
            self.put_u16(DOS_TIME)?;
            self.put_u16(DOS_DATE)?;
            self.put_u32(entry.crc32)?;
            if self.zip64 {
                self.put_u32(u32::MAX)?;
                self.put_u32(u32::MAX)?;
            } else {
                self.put_u32(entry.compressed_size as u32)?;
                self.put_u32(entry.uncompressed_size as u32)?;
            }
            self.put_u16(entry.name.len() as u16)?;
            self.put_u16(if self.zip64 { 28 } else { 0 })?; // extra len
            self.put_u16(0)?; // comment len
            self.put_u16(0)?; // disk number start
            self.put_u16(0)?; // internal attrs
            self.put_u32(0)?; // external attrs
            if self.zip64 {
                self.put_u32(u32::MAX)?;
            } else {
                self.put_u32(entry.local_header_offset as u32)?;
            }
            self.put(entry.name.as_bytes())?;
            if self.zip64 {
                self.put_u16(ZIP64_EXTRA_ID)?;
                self.put_u16(24)?;
                self.put_u64(entry.uncompressed_size)?;
                self.put_u64(entry.compressed_size)?;
                self.put_u64(entry.local_header_offset)?;
            }
        }
        let central_dir_size = self.offset - central_dir_offset;
        let count = entries.len() as u64;
        self.entries = entries;

        if self.zip64 {
            let zip64_end_offset = self.offset;
            self.put_u32(ZIP64_END_OF_CENTRAL_DIR_SIG)?;
            self.put_u64(44)?; // size of the remaining record
            self.put_u16(VERSION_ZIP64)?;
            self.put_u16(VERSION_ZIP64)?;
            self.put_u32(0)?; // this disk
            self.put_u32(0)?; // disk with central dir
            self.put_u64(count)?;
            self.put_u64(count)?;
            self.put_u64(central_dir_size)?;
            self.put_u64(central_dir_offset)?;

            self.put_u32(ZIP64_LOCATOR_SIG)?;
            self.put_u32(0)?;
            self.put_u64(zip64_end_offset)?;
            self.put_u32(1)?; // total disks
        } else {
            self.fits_u32("central directory offset", central_dir_offset)?;
            self.fits_u32("central directory", central_dir_size)?;
        }

        self.put_u32(END_OF_CENTRAL_DIR_SIG)?;
        self.put_u16(0)?; // disk number
        self.put_u16(0)?; // disk with central dir
        if self.zip64 {
            self.put_u16(0xFFFF)?;
            self.put_u16(0xFFFF)?;
            self.put_u32(u32::MAX)?;
            self.put_u32(u32::MAX)?;
        } else {
            self.put_u16(count as u16)?;
            self.put_u16(count as u16)?;
            self.put_u32(central_dir_size as u32)?;
            self.put_u32(central_dir_offset as u32)?;
        }
        self.put_u16(0)?; // comment len

        self.output.flush()?;
        Ok(())
    }
}

impl<W: Write> Write for ZipPackage<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_data(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_staged().map_err(io::Error::other)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_entries_read_back() {
        let mut zip = ZipPackage::new(Vec::new(), 6);
        zip.start_entry("a.xml").unwrap();
        zip.write_data(b"<a>hello</a>").unwrap();
        zip.start_entry("dir/b.xml").unwrap();
        zip.write_all(b"<b/>").unwrap();
        let bytes = zip.into_inner().unwrap();

        assert_eq!(read_entry(&bytes, "a.xml"), "<a>hello</a>");
        assert_eq!(read_entry(&bytes, "dir/b.xml"), "<b/>");
    }

    #[test]
    fn test_large_entry_is_staged() {
        let row = "<row><c><v>12345</v></c></row>".repeat(10);
        let mut zip = ZipPackage::new(Vec::new(), 1);
        zip.start_entry("big.xml").unwrap();
        for _ in 0..5_000 {
            zip.write_data(row.as_bytes()).unwrap();
        }
        zip.flush().unwrap();
        let bytes = zip.into_inner().unwrap();

        let content = read_entry(&bytes, "big.xml");
        assert_eq!(content.len(), row.len() * 5_000);
    }

    #[test]
    fn test_zip64_archive_reads_back() {
        let mut zip = ZipPackage::new(Vec::new(), 6).with_zip64(true);
        zip.start_entry("x.xml").unwrap();
        zip.write_data(b"payload").unwrap();
        let bytes = zip.into_inner().unwrap();

        assert_eq!(read_entry(&bytes, "x.xml"), "payload");
    }

    #[test]
    fn test_write_without_entry_fails() {
        let mut zip = ZipPackage::new(Vec::new(), 6);
        assert!(zip.write_data(b"x").is_err());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut zip = ZipPackage::new(Vec::new(), 6);
        zip.start_entry("a").unwrap();
        zip.finish().unwrap();
        let len = zip.bytes_written();
        zip.finish().unwrap();
        assert_eq!(zip.bytes_written(), len);
        assert!(matches!(
            zip.start_entry("b"),
            Err(ExcelError::AlreadyFinalized)
        ));
    }
}
