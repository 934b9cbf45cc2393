//! # rzipalign
//!
//! A zipalign utility: rewrites a ZIP archive so that the data of every
//! stored entry starts on a multiple of a chosen alignment, letting a loader
//! map it straight out of the archive without a copy.
//!
//! ## Features
//!
//! - Pads stored entries through a zero-ID block in the local extra field
//! - Page-aligns shared libraries (`*.so`) on request
//! - Optionally recompresses deflate entries with Zopfli
//! - Verifies the alignment of an existing archive
//! - Reads source archives from the local filesystem or HTTP URLs using
//!   Range requests
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rzipalign::{AlignmentPolicy, LocalFileReader, ZipAligner, ZipArchive, ZipWriter, verify};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new("app.apk".as_ref())?);
//!     let archive = ZipArchive::open(reader).await?;
//!
//!     let policy = AlignmentPolicy::new(4)?.with_page_aligned_shared_libs(true);
//!     let mut writer = ZipWriter::new(Vec::new());
//!     ZipAligner::new(policy, false)
//!         .process_archive(&archive, &mut writer)
//!         .await?;
//!     let aligned = writer.finish().await?;
//!
//!     let output = ZipArchive::open(Arc::new(rzipalign::MemoryReader::new(aligned))).await?;
//!     assert!(verify(&output, &policy).await?.all_aligned());
//!     Ok(())
//! }
//! ```

pub mod align;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use align::{AlignSummary, AlignmentPolicy, Verification, ZipAligner, verify};
pub use cli::Cli;
pub use error::{AlignError, AlignResult};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ZipArchive, ZipWriter};
