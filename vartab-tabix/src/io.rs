use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use vartab_core::models::{SequenceDictionary, VirtualOffset};

use crate::conf::{Preset, TabixConfig};
use crate::consts::{CSI_MAGIC, TBI_MAGIC};
use crate::errors::{Result, TabixError};
use crate::index::{BinningIndex, Chunk, IndexFormat, RefIndex};

/// Size of the fixed config prefix inside the metadata blob.
const META_PREFIX_LEN: usize = 28;

/// Persist `index` to `path` as a gzip-wrapped little-endian container.
///
/// Layout: magic (legacy `TBI\x01` or generalized `CSI\x01`), geometry for
/// the generalized flavor, reference count, the metadata blob (28-byte
/// config prefix plus NUL-terminated names in id order), one bin table and
/// linear index per reference, and the trailing unplaced-record count.
pub fn write_index<P: AsRef<Path>>(index: &BinningIndex, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = GzEncoder::new(BufWriter::new(file), Compression::default());

    match index.format() {
        IndexFormat::Tbi => writer.write_all(TBI_MAGIC)?,
        IndexFormat::Csi => {
            writer.write_all(CSI_MAGIC)?;
            writer.write_i32::<LittleEndian>(index.min_shift() as i32)?;
            writer.write_i32::<LittleEndian>(index.n_lvls() as i32)?;
        }
    }

    let names = index.dictionary().names();
    // dictionary-free indexes (graph alignments) still carry their tables
    let n_ref = names.len().max(index.n_refs());
    writer.write_i32::<LittleEndian>(n_ref as i32)?;

    let meta = encode_meta(index.conf(), names);
    writer.write_u32::<LittleEndian>(meta.len() as u32)?;
    writer.write_all(&meta)?;

    for tid in 0..n_ref {
        match index.ref_index(tid) {
            Some(r) => write_ref(&mut writer, r)?,
            None => write_ref(&mut writer, &RefIndex::default())?,
        }
    }

    writer.write_u64::<LittleEndian>(index.unplaced())?;
    writer.finish()?.flush()?;
    Ok(())
}

/// Load an index previously written by [`write_index`].
///
/// Validation failures are fatal: no partial index is ever returned.
pub fn read_index<P: AsRef<Path>>(path: P) -> Result<BinningIndex> {
    let file = File::open(path)?;
    let mut reader = MultiGzDecoder::new(BufReader::new(file));

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    let (format, min_shift, n_lvls) = if &magic == TBI_MAGIC {
        (IndexFormat::Tbi, 14u32, 5u32)
    } else if &magic == CSI_MAGIC {
        let min_shift = reader.read_i32::<LittleEndian>()?;
        let n_lvls = reader.read_i32::<LittleEndian>()?;
        if !(4..=31).contains(&min_shift)
            || n_lvls < 0
            || min_shift as i64 + 3 * n_lvls as i64 > 62
        {
            return Err(TabixError::InvalidIndexHeader(format!(
                "implausible geometry min_shift={min_shift}, n_lvls={n_lvls}"
            )));
        }
        (IndexFormat::Csi, min_shift as u32, n_lvls as u32)
    } else {
        return Err(TabixError::InvalidIndexHeader(format!(
            "unrecognized magic {magic:?}"
        )));
    };

    let n_ref = reader.read_i32::<LittleEndian>()?;
    if n_ref < 0 {
        return Err(TabixError::InvalidIndexHeader(format!(
            "negative reference count {n_ref}"
        )));
    }

    let l_meta = reader.read_u32::<LittleEndian>()? as usize;
    if l_meta < META_PREFIX_LEN {
        return Err(TabixError::InvalidIndexHeader(format!(
            "metadata blob of {l_meta} bytes is shorter than {META_PREFIX_LEN}"
        )));
    }
    let mut meta = vec![0u8; l_meta];
    reader.read_exact(&mut meta)?;
    let (conf, names) = decode_meta(&meta)?;

    // names rebuild the dictionary in file order; a dictionary-free index
    // legitimately has none at all
    if !names.is_empty() && names.len() != n_ref as usize {
        return Err(TabixError::InvalidIndexHeader(format!(
            "name table holds {} names for {} references",
            names.len(),
            n_ref
        )));
    }
    let dict = SequenceDictionary::from_names(names)
        .map_err(|e| TabixError::InvalidIndexHeader(e.to_string()))?;

    let mut refs = Vec::new();
    for _ in 0..n_ref {
        refs.push(read_ref(&mut reader)?);
    }

    let n_no_coor = match reader.read_u64::<LittleEndian>() {
        Ok(count) => count,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => 0,
        Err(e) => return Err(e.into()),
    };

    Ok(BinningIndex::from_parts(
        format, min_shift, n_lvls, conf, dict, refs, n_no_coor,
    ))
}

fn encode_meta(conf: &TabixConfig, names: &[String]) -> Vec<u8> {
    let mut table = Vec::new();
    for name in names {
        table.extend_from_slice(name.as_bytes());
        table.push(0);
    }

    let mut meta = Vec::with_capacity(META_PREFIX_LEN + table.len());
    for value in [
        conf.preset.to_flags(),
        conf.seq_col,
        conf.begin_col,
        conf.end_col,
        conf.meta_char as i32,
        conf.line_skip,
        table.len() as i32,
    ] {
        meta.extend_from_slice(&value.to_le_bytes());
    }
    meta.extend_from_slice(&table);
    meta
}

fn decode_meta(meta: &[u8]) -> Result<(TabixConfig, Vec<String>)> {
    let mut prefix = &meta[..META_PREFIX_LEN];
    let flags = prefix.read_i32::<LittleEndian>()?;
    let seq_col = prefix.read_i32::<LittleEndian>()?;
    let begin_col = prefix.read_i32::<LittleEndian>()?;
    let end_col = prefix.read_i32::<LittleEndian>()?;
    let meta_char = prefix.read_i32::<LittleEndian>()?;
    let line_skip = prefix.read_i32::<LittleEndian>()?;
    let l_nm = prefix.read_i32::<LittleEndian>()?;

    if l_nm < 0 || l_nm as usize > meta.len() - META_PREFIX_LEN {
        return Err(TabixError::InvalidIndexHeader(format!(
            "name table of {l_nm} bytes overruns the metadata blob"
        )));
    }
    let table = &meta[META_PREFIX_LEN..META_PREFIX_LEN + l_nm as usize];
    if !table.is_empty() && table.last() != Some(&0) {
        return Err(TabixError::InvalidIndexHeader(
            "name table is not NUL-terminated".to_string(),
        ));
    }

    let mut names = Vec::new();
    if !table.is_empty() {
        for raw in table[..table.len() - 1].split(|&b| b == 0) {
            if raw.is_empty() {
                return Err(TabixError::InvalidIndexHeader(
                    "empty sequence name in name table".to_string(),
                ));
            }
            let name = String::from_utf8(raw.to_vec()).map_err(|_| {
                TabixError::InvalidIndexHeader("sequence name is not UTF-8".to_string())
            })?;
            names.push(name);
        }
    }

    if !(0..=255).contains(&meta_char) {
        return Err(TabixError::InvalidIndexHeader(format!(
            "meta character {meta_char} out of range"
        )));
    }

    let conf = TabixConfig {
        preset: Preset::from_flags(flags)?,
        seq_col,
        begin_col,
        end_col,
        meta_char: meta_char as u8 as char,
        line_skip,
    };
    Ok((conf, names))
}

fn write_ref<W: Write>(writer: &mut W, r: &RefIndex) -> Result<()> {
    let mut bin_ids: Vec<u32> = r.bins.keys().copied().collect();
    bin_ids.sort_unstable();

    writer.write_i32::<LittleEndian>(bin_ids.len() as i32)?;
    for bin in bin_ids {
        let chunks = &r.bins[&bin];
        writer.write_u32::<LittleEndian>(bin)?;
        writer.write_i32::<LittleEndian>(chunks.len() as i32)?;
        for chunk in chunks {
            writer.write_u64::<LittleEndian>(chunk.begin.raw())?;
            writer.write_u64::<LittleEndian>(chunk.end.raw())?;
            writer.write_u64::<LittleEndian>(chunk.max_end as u64)?;
        }
    }

    writer.write_i32::<LittleEndian>(r.linear.len() as i32)?;
    for offset in &r.linear {
        writer.write_u64::<LittleEndian>(*offset)?;
    }
    Ok(())
}

fn read_ref<R: Read>(reader: &mut R) -> Result<RefIndex> {
    let n_bin = reader.read_i32::<LittleEndian>()?;
    if n_bin < 0 {
        return Err(TabixError::InvalidIndexHeader(format!(
            "negative bin count {n_bin}"
        )));
    }

    let mut bins = HashMap::new();
    for _ in 0..n_bin {
        let bin = reader.read_u32::<LittleEndian>()?;
        let n_chunk = reader.read_i32::<LittleEndian>()?;
        if n_chunk < 0 {
            return Err(TabixError::InvalidIndexHeader(format!(
                "negative chunk count {n_chunk} in bin {bin}"
            )));
        }
        let mut chunks = Vec::new();
        for _ in 0..n_chunk {
            let begin = VirtualOffset::from(reader.read_u64::<LittleEndian>()?);
            let end = VirtualOffset::from(reader.read_u64::<LittleEndian>()?);
            let max_end = reader.read_u64::<LittleEndian>()? as i64;
            chunks.push(Chunk {
                begin,
                end,
                max_end,
            });
        }
        if bins.insert(bin, chunks).is_some() {
            return Err(TabixError::InvalidIndexHeader(format!(
                "bin {bin} appears twice"
            )));
        }
    }

    let n_intv = reader.read_i32::<LittleEndian>()?;
    if n_intv < 0 {
        return Err(TabixError::InvalidIndexHeader(format!(
            "negative linear-index length {n_intv}"
        )));
    }
    let mut linear = Vec::new();
    for _ in 0..n_intv {
        linear.push(reader.read_u64::<LittleEndian>()?);
    }

    Ok(RefIndex {
        bins,
        linear,
        n_mapped: 0,
        n_unmapped: 0,
    })
}
