use zopfli::{Format, Options};

use crate::error::{AlignError, AlignResult};
use crate::zip::{EntryHeader, inflate};

/// A deflate entry re-encoded with Zopfli, with a header that describes
/// the new bytes.
#[derive(Debug, Clone)]
pub struct Recompressed {
    pub header: EntryHeader,
    pub data: Vec<u8>,
}

/// Decode `raw` and deflate it again with Zopfli.
///
/// Only the decoded content is preserved, not the compressed bytes. The
/// CRC-32 is recomputed over the decoded content and must match the one
/// the source declared. When Zopfli does not beat the source stream, the
/// source bytes are kept.
pub fn recompress(header: &EntryHeader, raw: &[u8]) -> AlignResult<Recompressed> {
    let name = header.display_name();

    let decoded = inflate(raw, header.uncompressed_size).map_err(|e| AlignError::EntryDecode {
        name: name.clone(),
        reason: format!("{e:#}"),
    })?;

    let crc32 = crc32fast::hash(&decoded);
    if crc32 != header.crc32 {
        return Err(AlignError::EntryDecode {
            name,
            reason: format!(
                "crc32 mismatch ({crc32:08x}, {:08x} declared)",
                header.crc32
            ),
        });
    }

    let mut data = Vec::with_capacity(raw.len());
    zopfli::compress(Options::default(), Format::Deflate, decoded.as_slice(), &mut data)
        .map_err(|e| AlignError::ArchiveWrite(format!("{name}: re-encoding failed: {e}")))?;

    if data.len() >= raw.len() {
        log::debug!(
            "{name}: kept source stream ({} bytes, zopfli gave {})",
            raw.len(),
            data.len()
        );
        return Ok(Recompressed {
            header: header.clone(),
            data: raw.to_vec(),
        });
    }

    log::debug!(
        "{name}: recompressed {} -> {} bytes ({} decoded)",
        raw.len(),
        data.len(),
        decoded.len()
    );

    let mut header = header.clone();
    header.compressed_size = data.len() as u64;
    header.crc32 = crc32;

    Ok(Recompressed { header, data })
}
