//! ZIP container reading and raw writing.
//!
//! This module is the container layer under the alignment engine: it knows
//! the record layouts but makes no alignment decisions.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`archive`]: Opened archive with raw and decoded entry reads
//! - [`writer`]: Raw-mode writer that emits headers exactly as given
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD, then the Central Directory; local headers
//! are read per entry because their extra field may differ from the
//! Central Directory copy, and alignment is measured against them.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support (encrypted entries are only copied)
//! - No multi-disk archive support
//! - The writer does not emit ZIP64 records

mod archive;
mod parser;
mod structures;
mod writer;

pub use archive::{ZipArchive, inflate};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::ZipWriter;
