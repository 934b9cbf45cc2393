//! Raw-mode ZIP writer.
//!
//! Entries are written exactly as described by their [`EntryHeader`]: the
//! writer never recomputes sizes or CRC-32 from the payload, so the caller
//! owns header/content consistency. General purpose flags are kept as the
//! source had them, and a 16-byte data descriptor follows the payload only
//! when flag bit 3 is set.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use anyhow::{Context, Result, bail};

use super::structures::*;

/// Central Directory record remembered for each written entry
struct CentralRecord {
    header: EntryHeader,
    lfh_offset: u64,
}

/// Streaming ZIP writer over any async sink.
pub struct ZipWriter<W> {
    inner: W,
    offset: u64,
    central: Vec<CentralRecord>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            central: Vec::new(),
        }
    }

    /// Bytes written so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Write one entry: local header, `data` as is, then the data descriptor
    /// if the header asks for one.
    ///
    /// Returns the number of payload bytes written.
    pub async fn write_raw_entry(&mut self, header: &EntryHeader, data: &[u8]) -> Result<u64> {
        if data.len() as u64 != header.compressed_size {
            bail!(
                "{}: payload is {} bytes, header declares {}",
                header.display_name(),
                data.len(),
                header.compressed_size
            );
        }

        let lfh_offset = self.offset;
        zip32(lfh_offset, "local header offset")?;
        let lfh = header.local_header_bytes()?;
        let descriptor = if header.has_data_descriptor() {
            header.data_descriptor_bytes()?
        } else {
            Vec::new()
        };

        self.inner.write_all(&lfh).await?;
        self.inner.write_all(data).await?;
        self.inner.write_all(&descriptor).await?;

        self.offset += (lfh.len() + data.len() + descriptor.len()) as u64;
        self.central.push(CentralRecord {
            header: header.clone(),
            lfh_offset,
        });

        Ok(data.len() as u64)
    }

    /// Write the Central Directory and EOCD, flush, and hand back the sink.
    pub async fn finish(mut self) -> Result<W> {
        let cd_offset = zip32(self.offset, "Central Directory offset")?;
        let total_entries =
            u16::try_from(self.central.len()).context("too many entries for zip32")?;

        let mut cd = Vec::new();
        for record in &self.central {
            cd.extend_from_slice(&record.header.central_header_bytes(record.lfh_offset)?);
        }

        let eocd = EndOfCentralDirectory {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size: zip32(cd.len() as u64, "Central Directory size")?,
            cd_offset,
            comment_len: 0,
        };

        self.inner.write_all(&cd).await?;
        self.inner.write_all(&eocd.to_bytes()?).await?;
        self.inner.flush().await?;

        Ok(self.inner)
    }
}
