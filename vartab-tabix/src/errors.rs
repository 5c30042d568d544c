use std::io;

use thiserror::Error;

use vartab_core::models::DictionaryError;

/// Error type for building, persisting, and querying binning indexes.
#[derive(Error, Debug)]
pub enum TabixError {
    /// IO error from the underlying stream or index file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Region names a sequence the dictionary does not know.
    #[error("unknown sequence name: {0:?}")]
    UnknownSequence(String),

    /// Unbraced region resolves both as a whole name and as name:coords.
    #[error("region is ambiguous: use {{{0}}} or {{{1}}}{2} instead")]
    AmbiguousRegion(String, String, String),

    /// Region coordinates are 1-based; zero is never a valid position.
    #[error("coordinates must be > 0 in region {0:?}")]
    ZeroCoordinate(String),

    /// Text left over after the parsable part of a region.
    #[error("unexpected string {0:?} after region")]
    TrailingGarbage(String),

    /// `{` without a matching `}`.
    #[error("mismatched braces in {0:?}")]
    MismatchedBraces(String),

    /// Region resolved to an empty range.
    #[error("invalid region {0:?}: begin must be less than end")]
    EmptyRegion(String),

    /// A begin/end column did not hold an integer.
    #[error("expected an integer in column {column} of line {line:?}")]
    ExpectedInteger { column: usize, line: String },

    /// Line could not be reduced to a (sequence, begin, end) interval.
    #[error("failed to extract an interval from line {0:?}")]
    MalformedLine(String),

    /// Input records are not sorted by (sequence id, begin).
    #[error("records out of order: {0}")]
    UnsortedInput(String),

    /// Interval does not fit the current hierarchy geometry.
    #[error(
        "interval {begin}-{end} cannot be stored with min_shift={min_shift}, n_lvls={n_lvls}"
    )]
    CoordinateOverflow {
        begin: i64,
        end: i64,
        min_shift: u32,
        n_lvls: u32,
    },

    #[error("min_shift {0} out of range (4..=31)")]
    InvalidMinShift(u32),

    /// Index was finished and can no longer accept records.
    #[error("index is finished and can no longer be modified")]
    IndexFinished,

    /// Query issued against an index still under construction.
    #[error("index is still being built; call finish first")]
    IndexUnfinished,

    /// Persisted index failed validation; no partial index is returned.
    #[error("invalid index header: {0}")]
    InvalidIndexHeader(String),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
}

/// Result type alias for vartab-tabix operations.
pub type Result<T> = std::result::Result<T, TabixError>;
