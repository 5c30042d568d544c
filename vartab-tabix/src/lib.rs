//!
//! # vartab-tabix
//!
//! Tabix-style indexing for sorted, line-oriented genomic text files: build
//! a hierarchical binning index in one pass, persist it as a compact binary
//! sidecar, and answer region queries with a handful of seeks instead of a
//! full scan. The indexed file is only ever touched through the
//! [`LineStream`](vartab_core::io::LineStream) seam, so block-compressed
//! backends plug in without this crate knowing about compression.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Cursor;
//! use vartab_core::io::PlainTextStream;
//! use vartab_tabix::build::index_stream;
//! use vartab_tabix::conf::TabixConfig;
//! use vartab_tabix::query::query_records;
//! use vartab_tabix::region::ParseMode;
//!
//! let bed = "chr1\t100\t200\tfeature-a\nchr1\t500\t900\tfeature-b\n";
//!
//! let mut stream = PlainTextStream::new(Cursor::new(bed.as_bytes())).unwrap();
//! let index = index_stream(&mut stream, TabixConfig::bed(), None).unwrap();
//!
//! let mut stream = PlainTextStream::new(Cursor::new(bed.as_bytes())).unwrap();
//! let hits: Vec<String> = query_records(&index, &mut stream, "chr1:150-600", ParseMode::default())
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(hits.len(), 2);
//! ```
//!

pub mod binning;
pub mod build;
pub mod conf;
pub mod errors;
pub mod extract;
pub mod index;
pub mod io;
pub mod query;
pub mod region;

pub mod consts {
    /// Magic bytes of the legacy two-level index layout.
    pub const TBI_MAGIC: &[u8; 4] = b"TBI\x01";
    /// Magic bytes of the generalized index layout.
    pub const CSI_MAGIC: &[u8; 4] = b"CSI\x01";

    pub const TBI_FILE_EXTENSION: &str = "tbi";
    pub const CSI_FILE_EXTENSION: &str = "csi";
}

pub use errors::{Result, TabixError};
