//! Asynchronous workbook writer over a tokio `AsyncWrite`
//!
//! Cells are still written synchronously into memory. Compressed package bytes
//! collect in a small pending buffer that is handed to the async destination only
//! at row starts (once the flush threshold is reached), at sheet starts and at
//! finalization. Those are the only await points, so rows must be started through
//! the async methods here rather than the synchronous ones behind `Deref`.

use super::options::WriterOptions;
use super::streaming_zip_writer::ZipPackage;
use super::workbook::WorkbookWriter;
use crate::error::Result;
use crate::types::{CellValue, RowOptions, SheetOptions};
use std::ops::{Deref, DerefMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Workbook writer whose archive output goes to an async destination
///
/// Cell operations are reached through `Deref` to the synchronous
/// [`WorkbookWriter`]; the methods defined here replace the ones that may
/// move data to the destination.
pub struct AsyncWorkbookWriter<A: AsyncWrite + Unpin> {
    inner: WorkbookWriter<ZipPackage<Vec<u8>>>,
    output: A,
}

impl<A: AsyncWrite + Unpin> AsyncWorkbookWriter<A> {
    pub fn new(output: A, options: WriterOptions) -> Self {
        AsyncWorkbookWriter {
            inner: WorkbookWriter::from_writer(Vec::new(), options),
            output,
        }
    }

    /// Hand pending archive bytes to the destination
    async fn drain(&mut self, force: bool) -> Result<()> {
        let threshold = self.inner.options().flush_threshold;
        let pending = self.inner.sink_mut().get_mut();
        if pending.is_empty() || (!force && pending.len() < threshold) {
            return Ok(());
        }
        self.output.write_all(pending).await?;
        pending.clear();
        Ok(())
    }

    pub async fn begin_sheet(&mut self, name: &str) -> Result<()> {
        self.begin_sheet_with(name, &SheetOptions::default()).await
    }

    /// Seal the open sheet, start the next one and flush what the seal produced
    pub async fn begin_sheet_with(&mut self, name: &str, options: &SheetOptions) -> Result<()> {
        self.inner.begin_sheet_with(name, options)?;
        self.drain(true).await
    }

    pub async fn begin_row(&mut self) -> Result<()> {
        self.begin_row_with(&RowOptions::default()).await
    }

    pub async fn begin_row_with(&mut self, row: &RowOptions) -> Result<()> {
        self.drain(false).await?;
        self.inner.begin_row_with(row)
    }

    /// Begin a row and write `values` into it
    pub async fn write_row(&mut self, values: &[CellValue]) -> Result<()> {
        self.drain(false).await?;
        self.inner.write_row(values)
    }

    /// Write the remaining parts and flush everything to the destination.
    ///
    /// A second call does nothing.
    pub async fn finalize(&mut self) -> Result<()> {
        if self.inner.is_finalized() {
            return Ok(());
        }
        self.inner.finalize()?;
        self.drain(true).await?;
        self.output.flush().await?;
        Ok(())
    }

    /// Finalize and return the destination
    pub async fn finish(mut self) -> Result<A> {
        self.finalize().await?;
        Ok(self.output)
    }
}

impl<A: AsyncWrite + Unpin> Deref for AsyncWorkbookWriter<A> {
    type Target = WorkbookWriter<ZipPackage<Vec<u8>>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<A: AsyncWrite + Unpin> DerefMut for AsyncWorkbookWriter<A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
