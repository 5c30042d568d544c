use vartab_core::models::SequenceDictionary;
use vartab_core::utils::parse_decimal;

use crate::errors::{Result, TabixError};

/// "End of sequence" placeholder for open-ended regions.
pub const POS_MAX: i64 = i64::MAX;

/// How region strings are interpreted.
#[derive(Debug, Clone, Copy)]
pub struct ParseMode {
    /// `chr:100` means the single base `[99, 100)` instead of `[99, end)`.
    pub one_coord: bool,
    /// Parse one item of a comma-separated list; the returned offset then
    /// points past the consumed token and its trailing comma.
    pub list: bool,
    /// Accept `,` grouping inside coordinates. Forced off in list mode,
    /// where the comma separates regions instead.
    pub thousands_sep: bool,
}

impl Default for ParseMode {
    fn default() -> Self {
        ParseMode {
            one_coord: false,
            list: false,
            thousands_sep: true,
        }
    }
}

/// A parsed region token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSpec {
    /// `.`: every record, from the start of the data.
    Start,
    /// `*`: records that carry no coordinate.
    Unplaced,
    /// A resolved `[begin, end)` range on one sequence.
    Mapped { tid: usize, begin: i64, end: i64 },
}

/// Parse one region token against a sequence dictionary.
///
/// Sequence names may legally contain `:` (GRCh38 adds names like
/// `HLA-DRB1*12:17`), so the whole unbraced string is tried as a name
/// before it is split at the last colon; when both readings resolve, the
/// region is rejected as ambiguous rather than guessed at. Braces force
/// the name reading: `{chr1:100-200}` is all name, `{chr1}:100-200` all
/// coordinates.
///
/// Coordinates are 1-based inclusive on the way in and 0-based half-open on
/// the way out. Returns the parsed region and the byte offset just past the consumed
/// token (past the trailing comma in list mode), for walking region lists.
pub fn parse_region(
    s: &str,
    dict: &SequenceDictionary,
    mode: ParseMode,
) -> Result<(RegionSpec, usize)> {
    let thousands = mode.thousands_sep && !mode.list;

    if s.starts_with('{') {
        let close = s
            .find('}')
            .ok_or_else(|| TabixError::MismatchedBraces(s.to_string()))?;
        let name = &s[1..close];

        // token may continue with coordinates, a list comma, or nothing
        let mut token_len = s.len();
        let mut consumed = s.len();
        if mode.list {
            if let Some(comma) = s[close..].find(',').map(|at| at + close) {
                token_len = comma;
                consumed = comma + 1;
            }
        }

        let tid = dict
            .lookup_id(name)
            .ok_or_else(|| TabixError::UnknownSequence(name.to_string()))?;
        let after = &s[close + 1..token_len];
        if after.is_empty() {
            return Ok((RegionSpec::Mapped { tid, begin: 0, end: POS_MAX }, consumed));
        }
        let Some(coords) = after.strip_prefix(':') else {
            return Err(TabixError::TrailingGarbage(after.to_string()));
        };
        let (begin, end) = parse_coords(coords, s, thousands, mode.one_coord)?;
        return Ok((RegionSpec::Mapped { tid, begin, end }, consumed));
    }

    let mut token_len = s.len();
    let mut consumed = s.len();
    if mode.list {
        if let Some(comma) = s.find(',') {
            token_len = comma;
            consumed = comma + 1;
        }
    }
    let token = &s[..token_len];

    // sentinel regions bypass coordinate parsing entirely
    if token == "." {
        return Ok((RegionSpec::Start, consumed));
    }
    if token == "*" {
        return Ok((RegionSpec::Unplaced, consumed));
    }

    let colon = token.rfind(':');

    // simplest case first: no colon, the token is a bare sequence name
    let Some(colon) = colon else {
        let tid = dict
            .lookup_id(token)
            .ok_or_else(|| TabixError::UnknownSequence(token.to_string()))?;
        return Ok((RegionSpec::Mapped { tid, begin: 0, end: POS_MAX }, consumed));
    };

    // a colon is present, but the whole token may still be a name
    if let Some(tid) = dict.lookup_id(token) {
        // it is -- unless the pre-colon part is also a name, in which case
        // the region cannot be resolved without braces
        let prefix = &token[..colon];
        if dict.lookup_id(prefix).is_some() {
            return Err(TabixError::AmbiguousRegion(
                token.to_string(),
                prefix.to_string(),
                token[colon..].to_string(),
            ));
        }
        return Ok((RegionSpec::Mapped { tid, begin: 0, end: POS_MAX }, consumed));
    }

    let name = &token[..colon];
    let tid = dict
        .lookup_id(name)
        .ok_or_else(|| TabixError::UnknownSequence(name.to_string()))?;
    let (begin, end) = parse_coords(&token[colon + 1..], s, thousands, mode.one_coord)?;
    Ok((RegionSpec::Mapped { tid, begin, end }, consumed))
}

/// Convert a 1-based inclusive coordinate spec (`""`, `"N"`, `"-N"`,
/// `"N-"`, `"N-M"`) into a 0-based half-open pair.
fn parse_coords(coords: &str, region: &str, thousands: bool, one_coord: bool) -> Result<(i64, i64)> {
    if coords.is_empty() {
        return Ok((0, POS_MAX));
    }

    // `-N` is shorthand for "from the start through N"
    if let Some(rest) = coords.strip_prefix('-') {
        let (value, used) = parse_decimal(rest, thousands);
        if used == 0 || !rest[used..].is_empty() {
            return Err(TabixError::TrailingGarbage(coords.to_string()));
        }
        let end = if value == 0 { POS_MAX } else { value };
        return Ok((0, end));
    }

    let (value, used) = parse_decimal(coords, thousands);
    if used == 0 {
        return Err(TabixError::TrailingGarbage(coords.to_string()));
    }
    if value == 0 {
        return Err(TabixError::ZeroCoordinate(region.to_string()));
    }
    let begin = value - 1;
    let rest = &coords[used..];

    let end = if rest.is_empty() {
        if one_coord { begin + 1 } else { POS_MAX }
    } else if let Some(rest) = rest.strip_prefix('-') {
        let (value, used) = parse_decimal(rest, thousands);
        if !rest[used..].is_empty() {
            return Err(TabixError::TrailingGarbage(rest[used..].to_string()));
        }
        // `N-` leaves the end open
        if value == 0 { POS_MAX } else { value }
    } else {
        return Err(TabixError::TrailingGarbage(rest.to_string()));
    };

    if begin >= end {
        return Err(TabixError::EmptyRegion(region.to_string()));
    }
    Ok((begin, end))
}

/// Render a mapped region back in 1-based inclusive notation.
pub fn format_region(dict: &SequenceDictionary, tid: usize, begin: i64, end: i64) -> String {
    let name = dict.name(tid).unwrap_or("?");
    if begin == 0 && end == POS_MAX {
        return name.to_string();
    }
    if end == POS_MAX {
        return format!("{}:{}-", name, begin + 1);
    }
    format!("{}:{}-{}", name, begin + 1, end)
}
