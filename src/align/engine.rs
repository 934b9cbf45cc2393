use tokio::io::AsyncWrite;

use crate::error::{AlignError, AlignResult};
use crate::io::ReadAt;
use crate::zip::{CompressionMethod, EntryHeader, ZipArchive, ZipFileEntry, ZipWriter};

use super::AlignmentPolicy;
use super::padding::pad_extra_field;
use super::recompress::recompress;

/// Totals for one aligned archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignSummary {
    /// Bytes written for all entries, i.e. the offset the Central Directory starts at
    pub bytes_written: u64,
    pub entries: usize,
    /// Entries that received a padding block
    pub padded_entries: usize,
    /// Zero bytes added across all padding blocks, excluding their headers
    pub padding_bytes: u64,
    pub recompressed_entries: usize,
}

/// How one entry is carried into the output
enum EntryAction {
    /// Payload copied as is, header untouched
    Copy,
    /// Payload copied as is after padding the header to this boundary
    Align(u16),
    Recompress,
}

/// Rewrites an archive entry by entry, tracking the output offset.
///
/// The running offset is only valid for a single pass, so
/// [`process_archive`](Self::process_archive) consumes the aligner.
pub struct ZipAligner {
    policy: AlignmentPolicy,
    recompress: bool,
    offset: u64,
    summary: AlignSummary,
}

impl ZipAligner {
    pub fn new(policy: AlignmentPolicy, recompress: bool) -> Self {
        Self {
            policy,
            recompress,
            offset: 0,
            summary: AlignSummary::default(),
        }
    }

    /// Copy every entry of `archive` into `writer`, in order.
    ///
    /// The writer is left open; callers finish it to emit the Central
    /// Directory. Any error leaves the output unusable.
    pub async fn process_archive<R, W>(
        mut self,
        archive: &ZipArchive<R>,
        writer: &mut ZipWriter<W>,
    ) -> AlignResult<AlignSummary>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        for entry in archive.entries() {
            self.process_entry(archive, entry, writer).await?;
        }

        self.summary.bytes_written = self.offset;
        Ok(self.summary)
    }

    fn action_for(&self, entry: &ZipFileEntry) -> EntryAction {
        match entry.compression_method {
            CompressionMethod::Deflate if self.recompress && entry.is_encrypted() => {
                log::warn!("{}: encrypted, copied without recompression", entry.file_name);
                EntryAction::Copy
            }
            CompressionMethod::Deflate if self.recompress => EntryAction::Recompress,
            CompressionMethod::Deflate => EntryAction::Copy,
            CompressionMethod::Stored | CompressionMethod::Unknown(_) => {
                EntryAction::Align(self.policy.alignment_for(&entry.raw_name))
            }
        }
    }

    async fn process_entry<R, W>(
        &mut self,
        archive: &ZipArchive<R>,
        entry: &ZipFileEntry,
        writer: &mut ZipWriter<W>,
    ) -> AlignResult<()>
    where
        R: ReadAt,
        W: AsyncWrite + Unpin,
    {
        let mut header = archive.header(entry).await.map_err(AlignError::open)?;
        let raw = archive.read_raw(entry).await.map_err(AlignError::open)?;

        let (header, written) = match self.action_for(entry) {
            EntryAction::Copy => {
                let written = write(writer, &header, &raw).await?;
                (header, written)
            }
            EntryAction::Align(align_to) => {
                if let Some(padding) = pad_extra_field(self.offset, &mut header, align_to)? {
                    log::debug!(
                        "{}: {} bytes of padding for {}-byte alignment",
                        entry.file_name,
                        padding,
                        align_to
                    );
                    self.summary.padded_entries += 1;
                    self.summary.padding_bytes += u64::from(padding);
                }
                let written = write(writer, &header, &raw).await?;
                (header, written)
            }
            EntryAction::Recompress => {
                let recompressed = recompress(&header, &raw)?;
                let written = write(writer, &recompressed.header, &recompressed.data).await?;
                self.summary.recompressed_entries += 1;
                (recompressed.header, written)
            }
        };

        log::debug!(
            "{:>8} {} ({} bytes)",
            self.offset + header.local_header_size(),
            entry.file_name,
            written
        );

        self.offset += entry_span(&header, written);
        self.summary.entries += 1;
        Ok(())
    }
}

/// Bytes an entry occupies in the output: header, payload, and the data
/// descriptor when the entry's flags call for one.
fn entry_span(header: &EntryHeader, written: u64) -> u64 {
    header.local_header_size() + written + header.data_descriptor_size()
}

async fn write<W: AsyncWrite + Unpin>(
    writer: &mut ZipWriter<W>,
    header: &EntryHeader,
    data: &[u8],
) -> AlignResult<u64> {
    writer
        .write_raw_entry(header, data)
        .await
        .map_err(AlignError::write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::FLAG_DATA_DESCRIPTOR;
    use std::sync::Arc;

    async fn stored_archive(entries: &[(&str, &[u8])]) -> ZipArchive<MemoryReader> {
        let mut writer = ZipWriter::new(Vec::new());
        for (name, data) in entries {
            let mut header = EntryHeader::new(name, CompressionMethod::Stored);
            header.compressed_size = data.len() as u64;
            header.uncompressed_size = data.len() as u64;
            header.crc32 = crc32fast::hash(data);
            writer.write_raw_entry(&header, data).await.unwrap();
        }
        let bytes = writer.finish().await.unwrap();
        ZipArchive::open(Arc::new(MemoryReader::new(bytes)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn running_offset_matches_bytes_written() {
        let archive = stored_archive(&[
            ("a.txt", &b"hello"[..]),
            ("b/c.bin", &[1, 2, 3, 4, 5, 6, 7][..]),
            ("d", &[][..]),
        ])
        .await;

        let policy = AlignmentPolicy::new(8).unwrap();
        let mut writer = ZipWriter::new(Vec::new());
        let summary = ZipAligner::new(policy, false)
            .process_archive(&archive, &mut writer)
            .await
            .unwrap();

        assert_eq!(summary.entries, 3);
        assert_eq!(summary.bytes_written, writer.offset());
    }

    #[tokio::test]
    async fn descriptor_bytes_count_towards_the_offset() {
        let mut writer = ZipWriter::new(Vec::new());
        for (name, flags) in [("a.bin", FLAG_DATA_DESCRIPTOR), ("b.bin", 0), ("c.bin", 0)] {
            let mut header = EntryHeader::new(name, CompressionMethod::Stored);
            header.flags = flags;
            header.compressed_size = 3;
            header.uncompressed_size = 3;
            header.crc32 = crc32fast::hash(b"xyz");
            writer.write_raw_entry(&header, b"xyz").await.unwrap();
        }
        let bytes = writer.finish().await.unwrap();
        let archive = ZipArchive::open(Arc::new(MemoryReader::new(bytes)))
            .await
            .unwrap();

        let policy = AlignmentPolicy::new(16).unwrap();
        let mut writer = ZipWriter::new(Vec::new());
        let summary = ZipAligner::new(policy, false)
            .process_archive(&archive, &mut writer)
            .await
            .unwrap();
        assert_eq!(summary.bytes_written, writer.offset());

        let aligned = ZipArchive::open(Arc::new(MemoryReader::new(
            writer.finish().await.unwrap(),
        )))
        .await
        .unwrap();
        for entry in aligned.entries() {
            assert_eq!(aligned.data_offset(entry).await.unwrap() % 16, 0);
        }
    }

    #[tokio::test]
    async fn alignment_one_copies_headers_unchanged() {
        let archive = stored_archive(&[("a.txt", &b"hello"[..]), ("bb.txt", &b"world!"[..])]).await;

        let policy = AlignmentPolicy::new(1).unwrap();
        let mut writer = ZipWriter::new(Vec::new());
        let summary = ZipAligner::new(policy, false)
            .process_archive(&archive, &mut writer)
            .await
            .unwrap();

        assert_eq!(summary.padded_entries, 0);
        assert_eq!(summary.padding_bytes, 0);
    }
}
