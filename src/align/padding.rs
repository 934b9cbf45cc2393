//! Padding arithmetic for local file headers.
//!
//! Padding lives in a trailing extra field block with header ID 0 followed
//! by a little-endian length and that many zero bytes. Readers skip extra
//! blocks they don't recognise by their declared length, so the block is
//! invisible to everything but the data offset.

use crate::error::{AlignError, AlignResult};
use crate::zip::EntryHeader;

/// Header ID of the padding block
pub const PADDING_EXTRA_ID: u16 = 0x0000;

/// Tag plus length preceding the padding bytes
pub const PADDING_BLOCK_HEADER_SIZE: u64 = 4;

/// Bytes needed after `offset + header_size` to reach a multiple of `align_to`.
///
/// An alignment of 0 or 1 never needs padding.
pub fn padding_for(offset: u64, header_size: u64, align_to: u16) -> u16 {
    if align_to <= 1 {
        return 0;
    }

    let align = u64::from(align_to);
    ((align - (offset + header_size) % align) % align) as u16
}

/// Append a padding block to `header.extra_field` so that an entry whose
/// local header starts at `offset` has its data on an `align_to` boundary.
///
/// Returns the number of zero bytes in the appended block, or `None` when
/// the data is already aligned and the header was left untouched. The
/// block's own four header bytes shift the data, so the final length is
/// computed against the grown header and may be zero.
pub fn pad_extra_field(
    offset: u64,
    header: &mut EntryHeader,
    align_to: u16,
) -> AlignResult<Option<u16>> {
    if padding_for(offset, header.local_header_size(), align_to) == 0 {
        return Ok(None);
    }

    let padding = padding_for(
        offset,
        header.local_header_size() + PADDING_BLOCK_HEADER_SIZE,
        align_to,
    );

    let new_len = header.extra_field.len() + PADDING_BLOCK_HEADER_SIZE as usize + padding as usize;
    if new_len > u16::MAX as usize {
        return Err(AlignError::ExtraFieldOverflow {
            name: header.display_name(),
            len: new_len,
        });
    }

    header.extra_field.extend_from_slice(&PADDING_EXTRA_ID.to_le_bytes());
    header.extra_field.extend_from_slice(&padding.to_le_bytes());
    header.extra_field.resize(new_len, 0);

    Ok(Some(padding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::CompressionMethod;

    fn stored(name: &str, extra: &[u8]) -> EntryHeader {
        let mut header = EntryHeader::new(name, CompressionMethod::Stored);
        header.extra_field = extra.to_vec();
        header
    }

    #[test]
    fn data_offset_three_mod_four_gets_one_byte() {
        // 30 + 15 + 6 = 51, so data would start at 51 = 3 (mod 4)
        let mut header = stored("assets/icon.png", &[0xfe, 0xca, 2, 0, 0, 0]);
        let before = header.extra_field.len();

        let padding = pad_extra_field(0, &mut header, 4).unwrap();

        assert_eq!(padding, Some(1));
        assert_eq!(header.extra_field.len(), before + 4 + 1);
        assert_eq!(header.local_header_size() % 4, 0);
        assert_eq!(&header.extra_field[before..], &[0, 0, 1, 0, 0]);
    }

    #[test]
    fn aligned_data_leaves_extra_field_untouched() {
        // 30 + 6 = 36
        let mut header = stored("a.bin/", &[]);
        assert_eq!(pad_extra_field(0, &mut header, 4).unwrap(), None);
        assert!(header.extra_field.is_empty());

        let mut header = stored("abc", &[]);
        assert_eq!(pad_extra_field(3, &mut header, 4).unwrap(), None);
        assert!(header.extra_field.is_empty());
    }

    #[test]
    fn alignment_one_and_zero_never_pad() {
        let mut header = stored("abc", &[]);
        assert_eq!(pad_extra_field(7, &mut header, 1).unwrap(), None);
        assert_eq!(pad_extra_field(7, &mut header, 0).unwrap(), None);
        assert!(header.extra_field.is_empty());
        assert_eq!(padding_for(7, 33, 0), 0);
    }

    #[test]
    fn block_header_crossing_a_boundary_is_recomputed() {
        // 4032 + 30 + 32 = 4094 is 2 short of 4096, but the 4-byte block
        // alone overshoots to 4098, so the second pass pads to 8192
        let name = "x".repeat(32);
        let mut header = stored(&name, &[]);

        let padding = pad_extra_field(4032, &mut header, 4096).unwrap();

        assert_eq!(padding, Some(4094));
        assert_eq!(4032 + header.local_header_size(), 8192);
    }

    #[test]
    fn block_may_end_up_with_zero_padding() {
        // 30 + 3 + 2 = 35 = 2 (mod 3); the block itself brings it to 39
        let mut header = stored("abc", &[]);
        let padding = pad_extra_field(2, &mut header, 3).unwrap();

        assert_eq!(padding, Some(0));
        assert_eq!(header.extra_field, vec![0, 0, 0, 0]);
        assert_eq!((2 + header.local_header_size()) % 3, 0);
    }

    #[test]
    fn padding_tracks_the_running_offset() {
        for offset in 0..64u64 {
            let mut header = stored("res/raw/clip.ogg", &[]);
            pad_extra_field(offset, &mut header, 16).unwrap();
            assert_eq!((offset + header.local_header_size()) % 16, 0, "offset {offset}");
        }
    }

    #[test]
    fn oversized_extra_field_is_an_error() {
        let mut header = stored("lib/libbig.so", &vec![0u8; 65530]);
        let err = pad_extra_field(1, &mut header, 4096).unwrap_err();

        assert!(matches!(err, AlignError::ExtraFieldOverflow { .. }));
        assert_eq!(header.extra_field.len(), 65530);
    }
}
