//! Alignment, recompression and verification of ZIP entries.
//!
//! Stored entries are padded so that their data begins on a multiple of the
//! configured alignment, letting a loader map them straight out of the
//! archive. Deflate entries are never padded: they are copied as is, or
//! recompressed when asked.

mod engine;
mod padding;
mod recompress;
mod verify;

pub use engine::{AlignSummary, ZipAligner};
pub use padding::{PADDING_BLOCK_HEADER_SIZE, PADDING_EXTRA_ID, pad_extra_field, padding_for};
pub use recompress::{Recompressed, recompress};
pub use verify::{CheckStatus, EntryCheck, Verification, Violation, verify};

use crate::error::{AlignError, AlignResult};

/// Page size used for shared libraries when page alignment is requested
pub const PAGE_ALIGNMENT: u16 = 4096;

/// Name suffix identifying shared libraries
pub const SHARED_LIB_SUFFIX: &str = ".so";

/// Which boundary each entry's data must start on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentPolicy {
    base_alignment: u16,
    page_align_shared_libs: bool,
    page_alignment: u16,
}

impl AlignmentPolicy {
    /// Policy with the given base alignment; zero is rejected.
    pub fn new(base_alignment: u16) -> AlignResult<Self> {
        if base_alignment == 0 {
            return Err(AlignError::InvalidAlignment(
                "alignment must be a positive number of bytes".to_string(),
            ));
        }

        Ok(Self {
            base_alignment,
            page_align_shared_libs: false,
            page_alignment: PAGE_ALIGNMENT,
        })
    }

    /// Align shared libraries (`*.so`) on memory pages instead.
    pub fn with_page_aligned_shared_libs(mut self, enabled: bool) -> Self {
        self.page_align_shared_libs = enabled;
        self
    }

    pub fn base_alignment(&self) -> u16 {
        self.base_alignment
    }

    /// Required alignment for a stored entry named `name`.
    pub fn alignment_for(&self, name: &[u8]) -> u16 {
        if self.page_align_shared_libs && name.ends_with(SHARED_LIB_SUFFIX.as_bytes()) {
            self.page_alignment
        } else {
            self.base_alignment
        }
    }
}

/// Parse an alignment given on the command line.
pub fn parse_alignment(value: &str) -> AlignResult<u16> {
    let alignment: i64 = value
        .trim()
        .parse()
        .map_err(|_| AlignError::InvalidAlignment(format!("'{value}' is not a number")))?;

    if alignment <= 0 {
        return Err(AlignError::InvalidAlignment(format!(
            "{alignment} is not a positive number of bytes"
        )));
    }

    u16::try_from(alignment).map_err(|_| {
        AlignError::InvalidAlignment(format!("{alignment} exceeds the maximum of {}", u16::MAX))
    })
}
