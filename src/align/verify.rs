use std::fmt;

use crate::error::{AlignError, AlignResult};
use crate::io::ReadAt;
use crate::zip::{CompressionMethod, ZipArchive};

use super::AlignmentPolicy;

/// Outcome of checking a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Aligned,
    /// Deflate entries have no alignment requirement
    Compressed,
    Misaligned { required: u16, remainder: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCheck {
    pub name: String,
    /// Absolute offset of the entry's data
    pub offset: u64,
    pub status: CheckStatus,
}

impl EntryCheck {
    pub fn is_ok(&self) -> bool {
        !matches!(self.status, CheckStatus::Misaligned { .. })
    }
}

impl fmt::Display for EntryCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8} {} ", self.offset, self.name)?;
        match self.status {
            CheckStatus::Aligned => write!(f, "(OK)"),
            CheckStatus::Compressed => write!(f, "(OK - compressed)"),
            CheckStatus::Misaligned { remainder, .. } => write!(f, "(BAD - {remainder})"),
        }
    }
}

/// A misaligned entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub name: String,
    pub offset: u64,
    pub required: u16,
}

/// Per-entry results of [`verify`], in archive order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub entries: Vec<EntryCheck>,
}

impl Verification {
    pub fn all_aligned(&self) -> bool {
        self.entries.iter().all(EntryCheck::is_ok)
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.entries
            .iter()
            .filter_map(|check| match check.status {
                CheckStatus::Misaligned { required, .. } => Some(Violation {
                    name: check.name.clone(),
                    offset: check.offset,
                    required,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Check every entry's data offset against `policy`.
///
/// Stored and unknown-method entries must start on their alignment;
/// deflate entries always pass.
pub async fn verify<R: ReadAt>(
    archive: &ZipArchive<R>,
    policy: &AlignmentPolicy,
) -> AlignResult<Verification> {
    let mut verification = Verification::default();

    for entry in archive.entries() {
        let offset = archive.data_offset(entry).await.map_err(AlignError::open)?;

        let status = match entry.compression_method {
            CompressionMethod::Deflate => CheckStatus::Compressed,
            CompressionMethod::Stored | CompressionMethod::Unknown(_) => {
                let required = policy.alignment_for(&entry.raw_name);
                match offset % u64::from(required) {
                    0 => CheckStatus::Aligned,
                    remainder => CheckStatus::Misaligned {
                        required,
                        remainder,
                    },
                }
            }
        };

        verification.entries.push(EntryCheck {
            name: entry.file_name.clone(),
            offset,
            status,
        });
    }

    Ok(verification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, offset: u64, status: CheckStatus) -> EntryCheck {
        EntryCheck {
            name: name.to_string(),
            offset,
            status,
        }
    }

    #[test]
    fn report_lines() {
        assert_eq!(
            check("assets/icon.png", 56, CheckStatus::Aligned).to_string(),
            "      56 assets/icon.png (OK)"
        );
        assert_eq!(
            check("classes.dex", 123, CheckStatus::Compressed).to_string(),
            "     123 classes.dex (OK - compressed)"
        );
        assert_eq!(
            check(
                "a.bin",
                35,
                CheckStatus::Misaligned {
                    required: 4,
                    remainder: 3
                }
            )
            .to_string(),
            "      35 a.bin (BAD - 3)"
        );
    }

    #[test]
    fn violations_keep_entry_order() {
        let verification = Verification {
            entries: vec![
                check("z", 35, CheckStatus::Misaligned { required: 4, remainder: 3 }),
                check("m", 64, CheckStatus::Aligned),
                check("a", 4097, CheckStatus::Misaligned { required: 4096, remainder: 1 }),
            ],
        };

        assert!(!verification.all_aligned());
        let names: Vec<_> = verification.violations().into_iter().map(|v| v.name).collect();
        assert_eq!(names, ["z", "a"]);
    }

    #[test]
    fn empty_archive_is_aligned() {
        assert!(Verification::default().all_aligned());
    }
}
