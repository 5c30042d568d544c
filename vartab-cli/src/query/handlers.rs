use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::ArgMatches;

use vartab_core::io::PlainTextStream;
use vartab_tabix::consts::{CSI_FILE_EXTENSION, TBI_FILE_EXTENSION};
use vartab_tabix::io::read_index;
use vartab_tabix::query::query_records;
use vartab_tabix::region::ParseMode;

pub fn run_query(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("--input is required");

    let index_path = match matches.get_one::<String>("index") {
        Some(path) => PathBuf::from(path),
        None => find_default_index(input)?,
    };
    let index = read_index(&index_path)
        .with_context(|| format!("failed to load index {}", index_path.display()))?;

    let mode = ParseMode {
        one_coord: matches.get_flag("one-coord"),
        ..Default::default()
    };

    let mut stream = PlainTextStream::open(input)
        .with_context(|| format!("failed to open input {input}"))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for region in matches
        .get_many::<String>("REGION")
        .expect("at least one region is required")
    {
        let records = query_records(&index, &mut stream, region, mode)
            .with_context(|| format!("failed to query region {region:?}"))?;
        for line in records {
            let line = line.with_context(|| format!("error while reading region {region:?}"))?;
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn find_default_index(input: &str) -> Result<PathBuf> {
    for ext in [TBI_FILE_EXTENSION, CSI_FILE_EXTENSION] {
        let candidate = PathBuf::from(format!("{input}.{ext}"));
        if Path::new(&candidate).exists() {
            return Ok(candidate);
        }
    }
    bail!("no index found next to {input}; pass --index explicitly");
}
