//!
//! # Core models for `vartab`
//! This crate holds the small building blocks shared across the `vartab`
//! workspace: genomic intervals, virtual offsets into block-compressed
//! streams, the sequence-name dictionary, and the `LineStream` seam that the
//! indexing engine reads records through.
//!
//! ## Examples
//! ### Resolve sequence names to dense ids
//! ```rust
//! use vartab_core::models::SequenceDictionary;
//!
//! let mut dict = SequenceDictionary::new();
//! let chr1 = dict.get_or_create_id("chr1");
//! let chr2 = dict.get_or_create_id("chr2");
//!
//! assert_eq!((chr1, chr2), (0, 1));
//! assert_eq!(dict.lookup_id("chr2"), Some(1));
//! ```
//!

pub mod io;
pub mod models;
pub mod utils;
