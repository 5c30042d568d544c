use std::collections::HashMap;

use vartab_core::models::{SequenceDictionary, VirtualOffset};

use crate::binning::{self, reg2bin, reg2bins};
use crate::conf::TabixConfig;
use crate::errors::{Result, TabixError};

/// On-disk flavor of a persisted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// Legacy two-level tabix layout with the fixed (14, 5) geometry.
    Tbi,
    /// Generalized layout carrying its own `min_shift` / `n_lvls`.
    Csi,
}

/// Contiguous virtual-offset range holding records assigned to one bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub begin: VirtualOffset,
    pub end: VirtualOffset,
    /// Maximum interval end among the records folded into this chunk; a
    /// chunk with `max_end <= query begin` cannot contain an overlap.
    pub max_end: i64,
}

/// Bin table and linear index for one sequence.
#[derive(Debug, Clone, Default)]
pub struct RefIndex {
    pub(crate) bins: HashMap<u32, Vec<Chunk>>,
    /// Minimum virtual offset per `min_shift`-wide coordinate bucket.
    /// `u64::MAX` marks an untouched bucket until `finish` backfills it.
    pub(crate) linear: Vec<u64>,
    pub(crate) n_mapped: u64,
    pub(crate) n_unmapped: u64,
}

/// Sequential-build bookkeeping; dropped when the index is finished.
#[derive(Debug)]
struct BuildState {
    /// Bin of the chunk currently being extended, with its sequence.
    save_bin: Option<(usize, u32)>,
    /// Start offset of that open chunk.
    save_off: VirtualOffset,
    /// Running max interval end within the open chunk.
    open_max_end: i64,
    last_tid: Option<usize>,
    last_coor: i64,
    /// End offset of the previous record == start offset of the next one.
    last_off: VirtualOffset,
    seen_unplaced: bool,
}

/// Hierarchical binning index over one sorted, line-oriented file.
///
/// Built by sequential [`push`] calls in file order, sealed by [`finish`],
/// after which it is immutable: [`query`] takes `&self` and a finished
/// index may be shared freely across threads.
///
/// [`push`]: BinningIndex::push
/// [`finish`]: BinningIndex::finish
/// [`query`]: BinningIndex::query
#[derive(Debug)]
pub struct BinningIndex {
    format: IndexFormat,
    min_shift: u32,
    n_lvls: u32,
    conf: TabixConfig,
    dict: SequenceDictionary,
    refs: Vec<RefIndex>,
    n_no_coor: u64,
    first_record_offset: VirtualOffset,
    state: Option<BuildState>,
}

impl BinningIndex {
    /// Empty index ready for sequential insertion. `start_offset` is the
    /// stream position where data records begin (after skipped headers).
    pub fn new(
        format: IndexFormat,
        min_shift: u32,
        n_lvls: u32,
        conf: TabixConfig,
        start_offset: VirtualOffset,
    ) -> Self {
        BinningIndex {
            format,
            min_shift,
            n_lvls,
            conf,
            dict: SequenceDictionary::new(),
            refs: Vec::new(),
            n_no_coor: 0,
            first_record_offset: start_offset,
            state: Some(BuildState {
                save_bin: None,
                save_off: start_offset,
                open_max_end: 0,
                last_tid: None,
                last_coor: 0,
                last_off: start_offset,
                seen_unplaced: false,
            }),
        }
    }

    pub(crate) fn from_parts(
        format: IndexFormat,
        min_shift: u32,
        n_lvls: u32,
        conf: TabixConfig,
        dict: SequenceDictionary,
        refs: Vec<RefIndex>,
        n_no_coor: u64,
    ) -> Self {
        BinningIndex {
            format,
            min_shift,
            n_lvls,
            conf,
            dict,
            refs,
            n_no_coor,
            first_record_offset: VirtualOffset::new(0, 0),
            state: None,
        }
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    pub fn min_shift(&self) -> u32 {
        self.min_shift
    }

    pub fn n_lvls(&self) -> u32 {
        self.n_lvls
    }

    pub fn conf(&self) -> &TabixConfig {
        &self.conf
    }

    pub fn dictionary(&self) -> &SequenceDictionary {
        &self.dict
    }

    pub(crate) fn dictionary_mut(&mut self) -> &mut SequenceDictionary {
        &mut self.dict
    }

    /// Count of records that carried no coordinate.
    pub fn unplaced(&self) -> u64 {
        self.n_no_coor
    }

    /// Mapped/unmapped record counts for one sequence, when known.
    /// Counts are build bookkeeping and are not persisted.
    pub fn record_counts(&self, tid: usize) -> Option<(u64, u64)> {
        self.refs.get(tid).map(|r| (r.n_mapped, r.n_unmapped))
    }

    /// Number of per-sequence tables; at least the dictionary size, and
    /// exactly one for dictionary-free (graph alignment) indexes.
    pub fn n_refs(&self) -> usize {
        self.refs.len()
    }

    /// Where data records start; the `.` sentinel region iterates from
    /// here. Build bookkeeping, zero on a loaded index.
    pub fn first_record_offset(&self) -> VirtualOffset {
        self.first_record_offset
    }

    pub(crate) fn ref_index(&self, tid: usize) -> Option<&RefIndex> {
        self.refs.get(tid)
    }

    /// Insert one record interval. `tid == None` counts an unplaced record.
    ///
    /// Records must arrive in non-decreasing `(tid, begin)` order, with any
    /// unplaced records in one block at the end; `offset` is the virtual
    /// offset just past the record. Consecutive records falling into the
    /// same bin extend a single open chunk, which is closed out (recording
    /// its running `max_end`) when the bin changes.
    pub fn push(
        &mut self,
        tid: Option<usize>,
        begin: i64,
        end: i64,
        offset: VirtualOffset,
        is_mapped: bool,
    ) -> Result<()> {
        let state = self.state.as_mut().ok_or(TabixError::IndexFinished)?;

        let tid = match tid {
            None => {
                state.seen_unplaced = true;
                state.last_off = offset;
                self.n_no_coor += 1;
                return Ok(());
            }
            Some(tid) => tid,
        };

        if state.seen_unplaced {
            return Err(TabixError::UnsortedInput(
                "placed record after unplaced records".to_string(),
            ));
        }
        if let Some(last_tid) = state.last_tid {
            if tid < last_tid {
                return Err(TabixError::UnsortedInput(format!(
                    "sequence id {tid} after {last_tid}"
                )));
            }
            if tid == last_tid && begin < state.last_coor {
                return Err(TabixError::UnsortedInput(format!(
                    "position {} after {} on sequence id {tid}",
                    begin, state.last_coor
                )));
            }
        }
        if end > binning::max_position(self.min_shift, self.n_lvls) {
            return Err(TabixError::CoordinateOverflow {
                begin,
                end,
                min_shift: self.min_shift,
                n_lvls: self.n_lvls,
            });
        }

        if tid >= self.refs.len() {
            self.refs.resize_with(tid + 1, RefIndex::default);
        }

        let record_start = state.last_off;
        let r = &mut self.refs[tid];
        insert_linear(&mut r.linear, begin, end, record_start.raw(), self.min_shift);
        if is_mapped {
            r.n_mapped += 1;
        } else {
            r.n_unmapped += 1;
        }

        let bin = reg2bin(begin, end, self.min_shift, self.n_lvls);
        if state.save_bin != Some((tid, bin)) {
            if let Some((save_tid, save_bin)) = state.save_bin {
                close_chunk(
                    &mut self.refs[save_tid],
                    save_bin,
                    state.save_off,
                    record_start,
                    state.open_max_end,
                );
            }
            state.save_bin = Some((tid, bin));
            state.save_off = record_start;
            state.open_max_end = end;
        } else if end > state.open_max_end {
            state.open_max_end = end;
        }

        state.last_tid = Some(tid);
        state.last_coor = begin;
        state.last_off = offset;
        Ok(())
    }

    /// Seal the index: close the open chunk at `final_offset`, backfill
    /// linear-index gaps, and drop the build state. The index is immutable
    /// afterwards.
    pub fn finish(&mut self, final_offset: VirtualOffset) -> Result<()> {
        let state = self.state.take().ok_or(TabixError::IndexFinished)?;
        if let Some((save_tid, save_bin)) = state.save_bin {
            close_chunk(
                &mut self.refs[save_tid],
                save_bin,
                state.save_off,
                final_offset,
                state.open_max_end,
            );
        }
        if self.refs.len() < self.dict.len() {
            self.refs.resize_with(self.dict.len(), RefIndex::default);
        }
        for r in &mut self.refs {
            let mut previous = 0u64;
            for slot in &mut r.linear {
                if *slot == u64::MAX {
                    *slot = previous;
                } else {
                    previous = *slot;
                }
            }
        }
        Ok(())
    }

    /// All file ranges that may hold records overlapping `[begin, end)` on
    /// `tid`, sorted by start offset with overlapping or block-adjacent
    /// ranges coalesced. The result is a superset: the caller decodes the
    /// candidate records and filters by actual overlap.
    pub fn query(&self, tid: usize, begin: i64, end: i64) -> Result<Vec<Chunk>> {
        if self.state.is_some() {
            return Err(TabixError::IndexUnfinished);
        }
        let r = match self.refs.get(tid) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };
        let begin = begin.max(0);
        let end = end.min(binning::max_position(self.min_shift, self.n_lvls));
        if begin >= end {
            return Ok(Vec::new());
        }

        // linear lower bound: nothing before this offset can overlap
        let bucket = (begin >> self.min_shift) as usize;
        let min_off = if r.linear.is_empty() {
            0
        } else {
            r.linear[bucket.min(r.linear.len() - 1)]
        };

        let mut hits: Vec<Chunk> = Vec::new();
        for bin in reg2bins(begin, end, self.min_shift, self.n_lvls) {
            if let Some(chunks) = r.bins.get(&bin) {
                for chunk in chunks {
                    if chunk.max_end > begin && chunk.end.raw() > min_off {
                        hits.push(*chunk);
                    }
                }
            }
        }
        hits.sort_by_key(|chunk| chunk.begin);

        let mut merged: Vec<Chunk> = Vec::with_capacity(hits.len());
        for chunk in hits {
            match merged.last_mut() {
                Some(last) if chunk.begin <= last.end || chunk.begin.same_block(last.end) => {
                    if chunk.end > last.end {
                        last.end = chunk.end;
                    }
                    if chunk.max_end > last.max_end {
                        last.max_end = chunk.max_end;
                    }
                }
                _ => merged.push(chunk),
            }
        }
        Ok(merged)
    }
}

fn close_chunk(
    r: &mut RefIndex,
    bin: u32,
    start: VirtualOffset,
    end: VirtualOffset,
    max_end: i64,
) {
    let chunks = r.bins.entry(bin).or_default();
    // back-to-back runs of the same bin collapse into one range
    if let Some(last) = chunks.last_mut() {
        if last.end == start {
            last.end = end;
            if max_end > last.max_end {
                last.max_end = max_end;
            }
            return;
        }
    }
    chunks.push(Chunk {
        begin: start,
        end,
        max_end,
    });
}

fn insert_linear(linear: &mut Vec<u64>, begin: i64, end: i64, offset: u64, min_shift: u32) {
    let first = (begin >> min_shift) as usize;
    let last = (((end - 1) >> min_shift) as usize).max(first);
    if linear.len() <= last {
        linear.resize(last + 1, u64::MAX);
    }
    for slot in &mut linear[first..=last] {
        if *slot == u64::MAX {
            *slot = offset;
        }
    }
}
