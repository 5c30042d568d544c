use std::path::Path;

use vartab_core::io::{LineStream, PlainTextStream};
use vartab_core::utils::parse_decimal;

use crate::binning;
use crate::conf::{Preset, TabixConfig};
use crate::errors::{Result, TabixError};
use crate::extract::IntervalExtractor;
use crate::index::{BinningIndex, IndexFormat};

/// Geometry implied by the legacy two-level layout.
const LEGACY_MIN_SHIFT: u32 = 14;
const LEGACY_N_LVLS: u32 = 5;

/// Reference length assumed for generalized indexes when no header line
/// declares one: 100 Gbp.
const DEFAULT_MAX_REF_LEN: i64 = 100 * 1024 * 1024 * 1024;

/// Build an index over every record of `stream`, which must be sorted by
/// (sequence, begin) with any header lines first.
///
/// `min_shift == None` builds the legacy two-level layout at the fixed
/// (14, 5) geometry. `Some(shift)` builds the generalized layout; its level
/// count is settled before the first record is binned, using the longest
/// reference length declared in the header (`##contig=<...length=N>` /
/// `@SQ ... LN:N`), or 100 Gbp when none is declared.
///
/// The build is all-or-nothing: any unparsable record or ordering violation
/// aborts with an error and no index is returned.
pub fn index_stream<S: LineStream + ?Sized>(
    stream: &mut S,
    conf: TabixConfig,
    min_shift: Option<u32>,
) -> Result<BinningIndex> {
    let (min_shift, mut n_lvls, format) = match min_shift {
        Some(shift) => {
            if !(4..=binning::MAX_SHIFT).contains(&shift) {
                return Err(TabixError::InvalidMinShift(shift));
            }
            (
                shift,
                (binning::MAX_SHIFT - shift + 2) / 3,
                IndexFormat::Csi,
            )
        }
        None => (LEGACY_MIN_SHIFT, LEGACY_N_LVLS, IndexFormat::Tbi),
    };

    let mut extractor = IntervalExtractor::new(conf.clone());
    let mut index: Option<BinningIndex> = None;
    let mut last_off = stream.tell()?;
    let mut max_ref_len: i64 = 0;
    let mut lineno: i64 = 0;
    let mut line = String::new();

    while stream.read_line(&mut line)? {
        lineno += 1;
        if format == IndexFormat::Csi && extractor.is_meta_line(&line) {
            match conf.preset {
                Preset::Sam => scan_sam_reference_len(&line, &mut max_ref_len),
                Preset::Vcf => scan_vcf_reference_len(&line, &mut max_ref_len),
                _ => {}
            }
        }
        if lineno <= conf.line_skip as i64 || extractor.is_meta_line(&line) {
            last_off = stream.tell()?;
            continue;
        }

        // geometry is settled when the first real record shows up
        let idx = index.get_or_insert_with(|| {
            if format == IndexFormat::Csi {
                if max_ref_len == 0 {
                    max_ref_len = DEFAULT_MAX_REF_LEN;
                }
                n_lvls = binning::adjust_levels(min_shift, n_lvls, max_ref_len);
            }
            BinningIndex::new(format, min_shift, n_lvls, conf.clone(), last_off)
        });

        let raw = extractor.extract(&line)?;
        let tid = match conf.preset {
            // graph alignments carry node ids, not sequence names
            Preset::Gaf => 0,
            _ => idx.dictionary_mut().get_or_create_id(raw.name),
        };
        let record_end = stream.tell()?;
        idx.push(Some(tid), raw.begin, raw.end, record_end, true)?;
    }

    let mut index = match index {
        Some(index) => index,
        // header-only or empty input still yields a valid, empty index
        None => BinningIndex::new(format, min_shift, n_lvls, conf, last_off),
    };
    index.finish(stream.tell()?)?;
    Ok(index)
}

/// Build an index over an uncompressed file on disk.
pub fn index_file<P: AsRef<Path>>(
    path: P,
    conf: TabixConfig,
    min_shift: Option<u32>,
) -> Result<BinningIndex> {
    let mut stream = PlainTextStream::open(path)?;
    index_stream(&mut stream, conf, min_shift)
}

/// Pull `length=` out of a `##contig` header line. Only used to widen the
/// hierarchy, so a line this cannot read is simply skipped.
fn scan_vcf_reference_len(line: &str, max_ref_len: &mut i64) {
    if !line.starts_with("##contig") {
        return;
    }
    let Some(at) = line[8..].find("length") else {
        return;
    };
    let rest = line[8 + at + 6..].trim_start_matches([' ', '=']);
    let (len, used) = parse_decimal(rest, false);
    if used > 0 && len > *max_ref_len {
        *max_ref_len = len;
    }
}

/// Same for `@SQ` header lines with an `LN:` field.
fn scan_sam_reference_len(line: &str, max_ref_len: &mut i64) {
    if !line.starts_with("@SQ") {
        return;
    }
    let Some(at) = line[3..].find("\tLN:") else {
        return;
    };
    let rest = &line[3 + at + 4..];
    let (len, used) = parse_decimal(rest, false);
    if used > 0 && len > *max_ref_len {
        *max_ref_len = len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    fn stream_over(text: &str) -> PlainTextStream<Cursor<Vec<u8>>> {
        PlainTextStream::new(Cursor::new(text.as_bytes().to_vec())).unwrap()
    }

    const SORTED_BED: &str = "\
chr1\t100\t200\ta
chr1\t150\t300\tb
chr2\t50\t60\tc
";

    #[test]
    fn test_index_sorted_bed() {
        let mut stream = stream_over(SORTED_BED);
        let index = index_stream(&mut stream, TabixConfig::bed(), None).unwrap();
        assert_eq!(index.dictionary().names(), &["chr1", "chr2"]);
        assert_eq!(index.record_counts(0), Some((2, 0)));
        assert_eq!(index.record_counts(1), Some((1, 0)));
        assert_eq!(index.format(), IndexFormat::Tbi);
    }

    #[test]
    fn test_headers_are_skipped_and_offsets_advance() {
        let text = format!("#one\n#two\n{SORTED_BED}");
        let mut stream = stream_over(&text);
        let index = index_stream(&mut stream, TabixConfig::bed(), None).unwrap();
        // the first chunk must start after the header bytes
        assert_eq!(index.first_record_offset().compressed(), 10);
        let chunks = index.query(0, 100, 200).unwrap();
        assert_eq!(chunks[0].begin.compressed(), 10);
    }

    #[test]
    fn test_unsorted_input_aborts() {
        let text = "chr1\t500\t600\ta\nchr1\t100\t200\tb\n";
        let mut stream = stream_over(text);
        let err = index_stream(&mut stream, TabixConfig::bed(), None).unwrap_err();
        assert!(matches!(err, TabixError::UnsortedInput(_)));
    }

    #[test]
    fn test_malformed_record_aborts() {
        let text = "chr1\tnope\t200\ta\n";
        let mut stream = stream_over(text);
        let err = index_stream(&mut stream, TabixConfig::bed(), None).unwrap_err();
        assert!(matches!(err, TabixError::ExpectedInteger { .. }));
    }

    #[test]
    fn test_empty_input_yields_empty_index() {
        let mut stream = stream_over("");
        let index = index_stream(&mut stream, TabixConfig::bed(), None).unwrap();
        assert_eq!(index.dictionary().len(), 0);
        assert!(index.query(0, 0, 1000).unwrap().is_empty());
    }

    #[test]
    fn test_csi_levels_follow_contig_length() {
        let text = "\
##contig=<ID=chr1,length=3000000000>
chr1\t100\t.\tA\tT\t.\tPASS\t.
";
        let mut stream = stream_over(text);
        let index = index_stream(&mut stream, TabixConfig::vcf(), Some(14)).unwrap();
        assert_eq!(index.format(), IndexFormat::Csi);
        // 3 Gbp does not fit 5 levels at min_shift 14
        assert!(binning::max_position(14, index.n_lvls()) >= 3_000_000_000);
    }

    #[test]
    fn test_csi_default_levels_without_declared_length() {
        let mut stream = stream_over(SORTED_BED);
        let index = index_stream(&mut stream, TabixConfig::bed(), Some(14)).unwrap();
        // 100 Gbp default
        assert!(binning::max_position(14, index.n_lvls()) >= 100 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_min_shift_out_of_range() {
        let mut stream = stream_over(SORTED_BED);
        let err = index_stream(&mut stream, TabixConfig::bed(), Some(40)).unwrap_err();
        assert!(matches!(err, TabixError::InvalidMinShift(40)));
    }

    #[test]
    fn test_sam_header_length_scan() {
        let mut max_len = 0;
        scan_sam_reference_len("@SQ\tSN:chr1\tLN:248956422", &mut max_len);
        assert_eq!(max_len, 248956422);
        scan_sam_reference_len("@PG\tID:x", &mut max_len);
        assert_eq!(max_len, 248956422);
    }

    #[test]
    fn test_vcf_header_length_scan() {
        let mut max_len = 0;
        scan_vcf_reference_len("##contig=<ID=chr1,length=12345>", &mut max_len);
        assert_eq!(max_len, 12345);
        scan_vcf_reference_len("##contig=<ID=chrX>", &mut max_len);
        assert_eq!(max_len, 12345);
    }

    #[test]
    fn test_gaf_records_share_id_zero() {
        let text = "\
read1\t10\t0\t10\t+\t>3>4\t100\t0\t10\t9\t10\t60
read2\t10\t0\t10\t+\t>5<9\t100\t0\t10\t9\t10\t60
";
        let mut stream = stream_over(text);
        let index = index_stream(&mut stream, TabixConfig::gaf(), None).unwrap();
        assert_eq!(index.dictionary().len(), 0);
        assert_eq!(index.n_refs(), 1);
        assert!(!index.query(0, 3, 10).unwrap().is_empty());
    }
}
