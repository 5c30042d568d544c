use vartab_core::models::RawInterval;
use vartab_core::utils::parse_decimal;

use crate::conf::{Preset, TabixConfig};
use crate::errors::{Result, TabixError};

/// Maximum number of alleles examined for `SVLEN` inference on one record.
const MAX_ALLELES: usize = 65536;

/// Pulls `(sequence, begin, end)` intervals out of raw record lines.
///
/// Dispatch is on the config preset; all presets share the column walk and
/// differ in how the end position is inferred. Output intervals are 0-based
/// half-open regardless of the input convention.
///
/// Soft warnings (a malformed `INFO/END=` tag, a clamped coordinate) are
/// reported once per extractor instance, i.e. once per build or per query
/// iteration.
pub struct IntervalExtractor {
    conf: TabixConfig,
    end_tag_warned: bool,
    coord_warned: bool,
}

impl IntervalExtractor {
    pub fn new(conf: TabixConfig) -> Self {
        IntervalExtractor {
            conf,
            end_tag_warned: false,
            coord_warned: false,
        }
    }

    pub fn conf(&self) -> &TabixConfig {
        &self.conf
    }

    /// True when `line` is a header/comment line for this format.
    pub fn is_meta_line(&self, line: &str) -> bool {
        line.chars().next() == Some(self.conf.meta_char)
    }

    /// Extract the interval covered by one data line.
    ///
    /// Meta/comment lines are the caller's to skip (via [`is_meta_line`]),
    /// so offset bookkeeping stays next to the stream.
    ///
    /// [`is_meta_line`]: IntervalExtractor::is_meta_line
    pub fn extract<'a>(&mut self, line: &'a str) -> Result<RawInterval<'a>> {
        match self.conf.preset {
            Preset::Generic | Preset::Ucsc => self.extract_generic(line),
            Preset::Sam => self.extract_sam(line),
            Preset::Vcf => self.extract_vcf(line),
            Preset::Gaf => self.extract_gaf(line),
        }
    }

    fn extract_generic<'a>(&mut self, line: &'a str) -> Result<RawInterval<'a>> {
        let mut name = None;
        let mut begin: i64 = -1;
        let mut end: i64 = -1;
        for (idx, field) in line.split('\t').enumerate() {
            let col = idx as i32 + 1;
            if col == self.conf.seq_col {
                name = Some(field);
            } else if col == self.conf.begin_col {
                begin = parse_int_field(field, col, line)?;
                if self.conf.begin_col <= self.conf.end_col {
                    end = begin;
                }
                if self.conf.preset != Preset::Ucsc {
                    begin -= 1;
                } else if self.conf.begin_col <= self.conf.end_col {
                    end += 1;
                }
                if begin < 0 {
                    self.warn_clamped_coordinate();
                    begin = 0;
                }
                if end < 1 {
                    end = 1;
                }
            } else if col == self.conf.end_col {
                end = parse_int_field(field, col, line)?;
            }
        }
        finish_interval(name, begin, end, line)
    }

    fn extract_sam<'a>(&mut self, line: &'a str) -> Result<RawInterval<'a>> {
        let mut name = None;
        let mut begin: i64 = -1;
        let mut end: i64 = -1;
        for (idx, field) in line.split('\t').enumerate() {
            let col = idx as i32 + 1;
            if col == self.conf.seq_col {
                name = Some(field);
            } else if col == self.conf.begin_col {
                begin = parse_int_field(field, col, line)? - 1;
                if begin < 0 {
                    self.warn_clamped_coordinate();
                    begin = 0;
                }
                if end < 1 {
                    end = 1;
                }
            } else if col == 6 {
                // span on the reference is the sum of M/D/N operations
                end = begin + cigar_reference_span(field);
            }
        }
        finish_interval(name, begin, end, line)
    }

    fn extract_vcf<'a>(&mut self, line: &'a str) -> Result<RawInterval<'a>> {
        let mut name = None;
        let mut begin: i64 = -1;
        let mut end: i64 = -1;
        let mut reflen: i64 = 0;
        let mut svlen: i64 = 0;
        let mut fmtlen: i64 = 0;
        // allele 0 is REF; ALT alleles count up from 1
        let mut allele_count: usize = 0;
        let mut svlen_alleles: Vec<bool> = Vec::new();
        let mut use_svlen = false;
        let mut want_format_len = false;
        let mut len_field_pos: Option<usize> = None;
        let mut scan_samples = true;

        for (idx, field) in line.split('\t').enumerate() {
            let col = idx as i32 + 1;
            if col == self.conf.seq_col {
                name = Some(field);
            } else if col == self.conf.begin_col {
                begin = parse_int_field(field, col, line)? - 1;
                if begin < 0 {
                    self.warn_clamped_coordinate();
                    begin = 0;
                }
                if end < 1 {
                    end = 1;
                }
            } else if col == 4 {
                // reference allele length is the baseline span
                if !field.is_empty() {
                    end = begin + field.len() as i64;
                }
                reflen = field.len() as i64;
                allele_count += 1;
            } else if col == 5 {
                for alt in field.split(',') {
                    if allele_count >= MAX_ALLELES {
                        break;
                    }
                    if alt_requires_svlen(alt) {
                        if svlen_alleles.len() <= allele_count {
                            svlen_alleles.resize(allele_count + 1, false);
                        }
                        svlen_alleles[allele_count] = true;
                        use_svlen = true;
                    } else if alt == "<*>" || alt == "<NON_REF>" {
                        // gVCF reference block; span comes from FORMAT/LEN
                        want_format_len = true;
                    }
                    allele_count += 1;
                }
            } else if col == 8 {
                if let Some(value) = info_tag_value(field, "END=") {
                    if !value.starts_with('.') {
                        let (parsed, used) = parse_decimal(value, false);
                        let tag_end = if used > 0 { parsed } else { 0 };
                        if tag_end <= begin {
                            self.warn_end_tag(name, begin, tag_end);
                        } else {
                            end = tag_end;
                        }
                    }
                }
                if let Some(values) = info_tag_value(field, "SVLEN=") {
                    let mut allele = 1usize;
                    for value in values.split(',') {
                        if allele >= allele_count {
                            break;
                        }
                        let span = if use_svlen
                            && svlen_alleles.get(allele).copied().unwrap_or(false)
                        {
                            // END = POS + |SVLEN|, so the span on the
                            // reference includes the anchor base
                            let (parsed, used) = parse_decimal(value, false);
                            if used > 0 { parsed.abs() + 1 } else { 0 }
                        } else {
                            1
                        };
                        svlen = svlen.max(span);
                        allele += 1;
                    }
                }
            } else if col == 9 && want_format_len {
                len_field_pos = field.split(':').position(|key| key == "LEN");
                if len_field_pos.is_none() {
                    // no per-sample lengths on this record
                    scan_samples = false;
                }
            } else if col > 9 && want_format_len && scan_samples {
                if let Some(pos) = len_field_pos {
                    if let Some(value) = field.split(':').nth(pos) {
                        let (parsed, used) = parse_decimal(value, false);
                        if used > 0 {
                            fmtlen = fmtlen.max(parsed);
                        }
                    }
                }
            }
        }

        let inferred = begin + reflen.max(svlen).max(fmtlen);
        if end < inferred {
            end = inferred;
        }
        finish_interval(name, begin, end, line)
    }

    fn extract_gaf<'a>(&mut self, line: &'a str) -> Result<RawInterval<'a>> {
        let mut name = None;
        let mut begin: i64 = -1;
        let mut end: i64 = -1;
        for (idx, field) in line.split('\t').enumerate() {
            let col = idx as i32 + 1;
            if col == self.conf.seq_col {
                name = Some(field);
            } else if col == self.conf.begin_col {
                (begin, end) = path_node_span(field);
            }
        }
        finish_interval(name, begin, end, line)
    }

    fn warn_clamped_coordinate(&mut self) {
        if self.coord_warned {
            return;
        }
        self.coord_warned = true;
        log::warn!("coordinate <= 0 detected; clamping to the start of the sequence");
    }

    fn warn_end_tag(&mut self, name: Option<&str>, begin: i64, tag_end: i64) {
        if self.end_tag_warned {
            return;
        }
        self.end_tag_warned = true;
        log::warn!(
            "VCF INFO/END={} is not past POS at {}:{}; the tag is ignored. \
             Only one invalid END tag is reported.",
            tag_end,
            name.unwrap_or(""),
            begin
        );
    }
}

/// ALT alleles that are not a plain base substitution take their reference
/// span from `INFO/SVLEN`. The gVCF reference-block symbols are excluded;
/// their span comes from `FORMAT/LEN` instead.
fn alt_requires_svlen(alt: &str) -> bool {
    if alt == "<*>" || alt == "<NON_REF>" {
        return false;
    }
    !alt.is_empty()
        && !alt.bytes().all(|b| {
            matches!(
                b,
                b'A' | b'C'
                    | b'G'
                    | b'T'
                    | b'N'
                    | b'a'
                    | b'c'
                    | b'g'
                    | b't'
                    | b'n'
                    | b'*'
                    | b'.'
            )
        })
}

/// Value of `TAG=` in an INFO field, anchored at the field start or after a
/// `;` so that e.g. `SVEND=` never matches `END=`.
fn info_tag_value<'a>(info: &'a str, tag: &str) -> Option<&'a str> {
    if let Some(rest) = info.strip_prefix(tag) {
        return Some(rest);
    }
    let anchored = format!(";{tag}");
    info.find(&anchored)
        .map(|at| &info[at + anchored.len()..])
}

/// Reference span implied by a CIGAR string; 1 when the CIGAR carries no
/// reference-consuming operation (`*`, empty, pure insertions).
fn cigar_reference_span(cigar: &str) -> i64 {
    let mut span = 0i64;
    let bytes = cigar.as_bytes();
    let mut at = 0;
    while at < bytes.len() {
        let (len, used) = parse_decimal(&cigar[at..], false);
        at += used;
        let op = bytes.get(at).copied().unwrap_or(0).to_ascii_uppercase();
        if matches!(op, b'M' | b'D' | b'N') {
            span += len;
        }
        at += 1;
    }
    if span == 0 { 1 } else { span }
}

/// Min/max node id embedded in a GAF path such as `>12<34>7`. The first
/// byte is an orientation symbol and every id is preceded by one.
fn path_node_span(path: &str) -> (i64, i64) {
    let (mut begin, mut end) = (-1i64, -1i64);
    if path.is_empty() {
        return (begin, end);
    }
    let rest = &path[1..];
    let mut at = 0;
    while at < rest.len() {
        let (node, used) = parse_decimal(&rest[at..], false);
        let node = if used > 0 { node } else { 0 };
        if begin == -1 {
            begin = node;
            end = node;
        } else {
            begin = begin.min(node);
            end = end.max(node);
        }
        at += used + 1;
    }
    (begin, end)
}

fn parse_int_field(field: &str, col: i32, line: &str) -> Result<i64> {
    let (value, used) = parse_decimal(field, false);
    if used == 0 {
        return Err(TabixError::ExpectedInteger {
            column: col as usize,
            line: line.to_string(),
        });
    }
    Ok(value)
}

fn finish_interval<'a>(
    name: Option<&'a str>,
    begin: i64,
    end: i64,
    line: &str,
) -> Result<RawInterval<'a>> {
    match name {
        Some(name) if !name.is_empty() && begin >= 0 && end >= 0 => Ok(RawInterval {
            name,
            begin,
            end,
        }),
        _ => Err(TabixError::MalformedLine(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn extract(conf: TabixConfig, line: &str) -> RawInterval<'_> {
        IntervalExtractor::new(conf).extract(line).unwrap()
    }

    #[test]
    fn test_bed_half_open_passthrough() {
        let iv = extract(TabixConfig::bed(), "chr1\t100\t200\tpeak1");
        assert_eq!((iv.name, iv.begin, iv.end), ("chr1", 100, 200));
    }

    #[test]
    fn test_bed_missing_end_column_spans_one_base() {
        let iv = extract(TabixConfig::bed(), "chr1\t100");
        assert_eq!((iv.begin, iv.end), (100, 101));
    }

    #[test]
    fn test_gff_one_based_inclusive() {
        let iv = extract(TabixConfig::gff(), "chr1\tsrc\tgene\t100\t200\t.\t+\t.\tID=g1");
        assert_eq!((iv.begin, iv.end), (99, 200));
    }

    #[test]
    fn test_generic_malformed_begin_is_an_error() {
        let err = IntervalExtractor::new(TabixConfig::bed())
            .extract("chr1\tnotanumber\t200")
            .unwrap_err();
        assert!(matches!(err, TabixError::ExpectedInteger { column: 2, .. }));
    }

    #[test]
    fn test_sam_cigar_span() {
        let line = "r1\t0\tchr1\t100\t60\t50M10D20N5I30M\t*\t0\t0\tACGT\t####";
        let iv = extract(TabixConfig::sam(), line);
        // 50M + 10D + 20N + 30M on the reference; the 5I does not count
        assert_eq!((iv.begin, iv.end), (99, 99 + 110));
    }

    #[test]
    fn test_sam_star_cigar_defaults_to_one_base() {
        let line = "r1\t4\tchr1\t100\t0\t*\t*\t0\t0\tACGT\t####";
        let iv = extract(TabixConfig::sam(), line);
        assert_eq!((iv.begin, iv.end), (99, 100));
    }

    #[test]
    fn test_vcf_reference_allele_span() {
        let iv = extract(TabixConfig::vcf(), "chr1\t100\t.\tACGT\tA\t.\tPASS\t.");
        assert_eq!((iv.begin, iv.end), (99, 103));
    }

    #[test]
    fn test_vcf_symbolic_alt_uses_svlen() {
        // END = POS + |SVLEN| = 150 for a 100-base deletion anchored at 50
        let line = "chr1\t50\t.\tA\t<DEL>\t.\tPASS\tSVLEN=-100";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (49, 150));
    }

    #[test]
    fn test_vcf_substitution_alt_ignores_svlen() {
        // a plain SNP must not pick up a stray SVLEN tag
        let line = "chr1\t50\t.\tA\tT\t.\tPASS\tSVLEN=-100";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (49, 50));
    }

    #[test]
    fn test_vcf_end_tag_honored_when_valid() {
        let line = "chr1\t100\t.\tA\t<DUP>\t.\tPASS\tEND=300";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (99, 300));
    }

    #[test]
    fn test_vcf_end_tag_before_pos_is_ignored() {
        let line = "chr1\t50\t.\tACG\tT\t.\tPASS\tEND=10";
        let iv = extract(TabixConfig::vcf(), line);
        // falls back to the reference-allele span
        assert_eq!((iv.begin, iv.end), (49, 52));
    }

    #[test]
    fn test_vcf_end_tag_is_anchored() {
        // SVEND= must not be mistaken for END=
        let line = "chr1\t50\t.\tAC\tT\t.\tPASS\tSVEND=500";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (49, 51));
    }

    #[test]
    fn test_vcf_gvcf_len_from_samples() {
        let line = "chr1\t100\t.\tA\t<*>\t.\t.\t.\tGT:LEN\t0/0:250\t0/0:40";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (99, 99 + 250));
    }

    #[test]
    fn test_vcf_gvcf_without_len_field() {
        let line = "chr1\t100\t.\tA\t<NON_REF>\t.\t.\t.\tGT:DP\t0/0:30";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (99, 100));
    }

    #[test]
    fn test_vcf_multiallelic_svlen_per_allele() {
        // only the symbolic second ALT consults SVLEN; the SNP allele
        // contributes the placeholder span of 1
        let line = "chr1\t10\t.\tA\tT,<DEL>\t.\tPASS\tSVLEN=1,60";
        let iv = extract(TabixConfig::vcf(), line);
        assert_eq!((iv.begin, iv.end), (9, 9 + 61));
    }

    #[rstest]
    #[case("<DEL>", true)]
    #[case("<INV>", true)]
    #[case("T]13:123456]", true)]
    #[case("ACGT", false)]
    #[case("a", false)]
    #[case("*", false)]
    #[case("<*>", false)]
    #[case("<NON_REF>", false)]
    fn test_alt_requires_svlen(#[case] alt: &str, #[case] expected: bool) {
        assert_eq!(alt_requires_svlen(alt), expected);
    }

    #[test]
    fn test_gaf_node_span() {
        let line = "read1\t100\t0\t100\t+\t>12<34>7\t1000\t0\t100\t90\t100\t60";
        let iv = extract(TabixConfig::gaf(), line);
        assert_eq!((iv.begin, iv.end), (7, 34));
    }

    #[test]
    fn test_meta_line_detection() {
        let extractor = IntervalExtractor::new(TabixConfig::vcf());
        assert!(extractor.is_meta_line("##fileformat=VCFv4.3"));
        assert!(extractor.is_meta_line("#CHROM\tPOS"));
        assert!(!extractor.is_meta_line("chr1\t100"));
    }
}
