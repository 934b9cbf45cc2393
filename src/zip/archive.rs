use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, EntryHeader, ZipFileEntry};

/// An opened ZIP archive with its Central Directory loaded.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Open an archive, reading the EOCD and the whole Central Directory.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files().await?;
        Ok(Self { parser, entries })
    }

    /// Entries in archive order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Build the writable header for an entry, including its local extra field.
    pub async fn header(&self, entry: &ZipFileEntry) -> Result<EntryHeader> {
        let local = self.parser.read_local_header(entry).await?;
        Ok(EntryHeader::from_entry(entry, local.extra_field))
    }

    /// Offset of the entry's first payload byte.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        Ok(self.parser.read_local_header(entry).await?.data_offset)
    }

    /// Read the payload exactly as stored (still compressed for deflate).
    pub async fn read_raw(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.data_offset(entry).await?;
        if data_offset
            .checked_add(entry.compressed_size)
            .is_none_or(|end| end > self.parser.reader().size())
        {
            bail!("{}: data extends past the end of the archive", entry.file_name);
        }

        let mut buf = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut buf)
            .await
            .with_context(|| format!("{}: reading entry data", entry.file_name))?;

        Ok(buf)
    }

    /// Read the payload fully decoded, checking size and CRC-32.
    pub async fn read_decoded(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let raw = self.read_raw(entry).await?;
        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => inflate(&raw, entry.uncompressed_size)
                .with_context(|| format!("{}: inflating entry data", entry.file_name))?,
            CompressionMethod::Unknown(method) => {
                bail!("{}: unsupported compression method: {}", entry.file_name, method)
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "{}: size mismatch ({} bytes, {} declared)",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            );
        }

        let crc = crc32fast::hash(&data);
        if crc != entry.crc32 {
            bail!(
                "{}: crc32 mismatch ({:08x}, {:08x} declared)",
                entry.file_name,
                crc,
                entry.crc32
            );
        }

        Ok(data)
    }
}

/// Inflate a raw deflate stream, expecting `expected_len` output bytes.
///
/// The stream must end cleanly; trailing garbage after the final block is
/// ignored the way other zip readers do.
pub fn inflate(raw: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let capacity = usize::try_from(expected_len).unwrap_or(0).min(64 << 20);
    let mut out = Vec::with_capacity(capacity);
    let mut decoder = DeflateDecoder::new(raw);
    decoder.read_to_end(&mut out)?;

    if out.len() as u64 != expected_len {
        bail!(
            "inflated to {} bytes, {} declared",
            out.len(),
            expected_len
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    #[test]
    fn inflate_accepts_a_complete_stream() {
        let input = b"aligned aligned aligned aligned".repeat(20);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&input).unwrap();
        let raw = encoder.finish().unwrap();

        assert_eq!(inflate(&raw, input.len() as u64).unwrap(), input);
    }

    #[test]
    fn inflate_rejects_truncated_streams() {
        let input: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&input).unwrap();
        let raw = encoder.finish().unwrap();

        assert!(inflate(&raw[..raw.len() / 2], input.len() as u64).is_err());
    }

    #[test]
    fn inflate_checks_the_declared_length() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"twelve bytes").unwrap();
        let raw = encoder.finish().unwrap();

        let err = inflate(&raw, 13).unwrap_err();
        assert!(err.to_string().contains("13 declared"));
    }
}
