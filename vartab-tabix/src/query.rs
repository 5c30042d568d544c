use vartab_core::io::LineStream;
use vartab_core::models::VirtualOffset;

use crate::errors::Result;
use crate::extract::IntervalExtractor;
use crate::index::{BinningIndex, Chunk};
use crate::region::{self, ParseMode, RegionSpec};

/// Open a lazy iterator over the records of `stream` overlapping `region`,
/// resolved against `index`'s dictionary.
///
/// `stream` must be the same file the index was built from. Each call
/// starts a fresh iteration; after a stream error mid-iteration the
/// iterator fuses and a new call is needed.
pub fn query_records<'a, S: LineStream + ?Sized>(
    index: &'a BinningIndex,
    stream: &'a mut S,
    region: &str,
    mode: ParseMode,
) -> Result<RecordIterator<'a, S>> {
    let (spec, _) = region::parse_region(region, index.dictionary(), mode)?;
    query_spec(index, stream, spec)
}

/// Like [`query_records`], for an already-parsed region.
pub fn query_spec<'a, S: LineStream + ?Sized>(
    index: &'a BinningIndex,
    stream: &'a mut S,
    spec: RegionSpec,
) -> Result<RecordIterator<'a, S>> {
    let (chunks, filter) = match spec {
        RegionSpec::Start => (
            vec![Chunk {
                begin: index.first_record_offset(),
                end: VirtualOffset::MAX,
                max_end: i64::MAX,
            }],
            None,
        ),
        // text formats index no coordinate-free records; the count is
        // still available via `BinningIndex::unplaced`
        RegionSpec::Unplaced => (Vec::new(), None),
        RegionSpec::Mapped { tid, begin, end } => {
            (index.query(tid, begin, end)?, Some((tid, begin, end)))
        }
    };
    Ok(RecordIterator {
        index,
        stream,
        extractor: IntervalExtractor::new(index.conf().clone()),
        chunks,
        chunk_at: 0,
        in_chunk: false,
        filter,
        line: String::new(),
        done: false,
    })
}

/// Lazy record iterator: walks the candidate chunks in offset order,
/// decodes lines, and yields only records that truly overlap the query.
///
/// The chunk list is a superset, so every candidate line is re-extracted
/// and filtered; iteration stops early once a record at or past the query
/// end (or on a later sequence) shows up, which sorted input guarantees is
/// final.
pub struct RecordIterator<'a, S: ?Sized> {
    index: &'a BinningIndex,
    stream: &'a mut S,
    extractor: IntervalExtractor,
    chunks: Vec<Chunk>,
    chunk_at: usize,
    in_chunk: bool,
    /// `(tid, begin, end)` for mapped regions; `None` yields everything.
    filter: Option<(usize, i64, i64)>,
    line: String,
    done: bool,
}

impl<'a, S: LineStream + ?Sized> RecordIterator<'a, S> {
    fn advance(&mut self) -> Result<Option<String>> {
        loop {
            if !self.in_chunk {
                let Some(chunk) = self.chunks.get(self.chunk_at) else {
                    return Ok(None);
                };
                self.stream.seek(chunk.begin)?;
                self.in_chunk = true;
            }
            let chunk = self.chunks[self.chunk_at];
            if self.stream.tell()? >= chunk.end || !self.stream.read_line(&mut self.line)? {
                self.chunk_at += 1;
                self.in_chunk = false;
                continue;
            }
            if self.extractor.is_meta_line(&self.line) {
                continue;
            }

            let Some((tid, begin, end)) = self.filter else {
                return Ok(Some(self.line.clone()));
            };
            let raw = self.extractor.extract(&self.line)?;
            let Some(record_tid) = self.index.dictionary().lookup_id(raw.name) else {
                continue;
            };
            if record_tid > tid || (record_tid == tid && raw.begin >= end) {
                // sorted input: nothing past this point can overlap
                return Ok(None);
            }
            if record_tid == tid && raw.end > begin && raw.begin < end {
                return Ok(Some(self.line.clone()));
            }
        }
    }
}

impl<'a, S: LineStream + ?Sized> Iterator for RecordIterator<'a, S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use vartab_core::io::PlainTextStream;

    use crate::build::index_stream;
    use crate::conf::TabixConfig;

    const VCF: &str = "\
##fileformat=VCFv4.3
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr1\t100\trs1\tA\tT\t.\tPASS\t.
chr1\t5000\tsv1\tG\t<DEL>\t.\tPASS\tSVLEN=-100
chr1\t20000\trs2\tC\tCT\t.\tPASS\t.
chr2\t300\trs3\tT\tA\t.\tPASS\t.
";

    fn vcf_index() -> BinningIndex {
        let mut stream = PlainTextStream::new(Cursor::new(VCF.as_bytes().to_vec())).unwrap();
        index_stream(&mut stream, TabixConfig::vcf(), None).unwrap()
    }

    fn collect(index: &BinningIndex, region: &str, mode: ParseMode) -> Vec<String> {
        let mut stream = PlainTextStream::new(Cursor::new(VCF.as_bytes().to_vec())).unwrap();
        query_records(index, &mut stream, region, mode)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    fn ids(lines: &[String]) -> Vec<&str> {
        lines
            .iter()
            .map(|line| line.split('\t').nth(2).unwrap())
            .collect()
    }

    #[test]
    fn test_point_query() {
        let index = vcf_index();
        let hits = collect(&index, "chr1:100-100", ParseMode::default());
        assert_eq!(ids(&hits), vec!["rs1"]);
    }

    #[test]
    fn test_svlen_extends_the_deletion() {
        let index = vcf_index();
        // the DEL at POS 5000 spans 100 bases via SVLEN
        let hits = collect(&index, "chr1:5050-5060", ParseMode::default());
        assert_eq!(ids(&hits), vec!["sv1"]);
        // and just past the inferred end there is nothing
        let hits = collect(&index, "chr1:5200-5300", ParseMode::default());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_whole_sequence_query() {
        let index = vcf_index();
        let hits = collect(&index, "chr1", ParseMode::default());
        assert_eq!(ids(&hits), vec!["rs1", "sv1", "rs2"]);
        let hits = collect(&index, "chr2", ParseMode::default());
        assert_eq!(ids(&hits), vec!["rs3"]);
    }

    #[test]
    fn test_one_coord_against_open_ended_default() {
        let index = vcf_index();
        // default: chr1:5000 reaches to the end of the sequence
        let hits = collect(&index, "chr1:5000", ParseMode::default());
        assert_eq!(ids(&hits), vec!["sv1", "rs2"]);
        // one-coordinate mode: the single base 5000 only
        let mode = ParseMode {
            one_coord: true,
            ..Default::default()
        };
        let hits = collect(&index, "chr1:5000", mode);
        assert_eq!(ids(&hits), vec!["sv1"]);
    }

    #[test]
    fn test_start_sentinel_yields_all_records() {
        let index = vcf_index();
        let hits = collect(&index, ".", ParseMode::default());
        assert_eq!(ids(&hits), vec!["rs1", "sv1", "rs2", "rs3"]);
    }

    #[test]
    fn test_unplaced_sentinel_is_empty() {
        let index = vcf_index();
        assert!(collect(&index, "*", ParseMode::default()).is_empty());
        assert_eq!(index.unplaced(), 0);
    }

    #[test]
    fn test_no_false_negatives_across_boundaries() {
        let index = vcf_index();
        // every record must be found by a query pinned to its own span
        for (region, id) in [
            ("chr1:100-100", "rs1"),
            ("chr1:5000-5000", "sv1"),
            ("chr1:20000-20001", "rs2"),
            ("chr2:300-301", "rs3"),
        ] {
            let hits = collect(&index, region, ParseMode::default());
            assert!(
                ids(&hits).contains(&id),
                "record {id} missing from query {region}"
            );
        }
    }

    #[test]
    fn test_iterator_is_restartable_per_call() {
        let index = vcf_index();
        let first = collect(&index, "chr1:100-100", ParseMode::default());
        let second = collect(&index, "chr1:100-100", ParseMode::default());
        assert_eq!(first, second);
    }
}
