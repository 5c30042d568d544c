use anyhow::{Context, Result, bail};
use clap::ArgMatches;

use vartab_tabix::build::index_file;
use vartab_tabix::conf::TabixConfig;
use vartab_tabix::consts::{CSI_FILE_EXTENSION, TBI_FILE_EXTENSION};
use vartab_tabix::io::write_index;

pub fn run_index(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .expect("--input is required");

    let preset = matches.get_one::<String>("preset").expect("has a default");
    let conf = conf_for_preset(preset)?;

    let min_shift = matches
        .get_one::<String>("min-shift")
        .map(|s| s.parse::<u32>())
        .transpose()
        .context("--min-shift must be a small positive integer")?;

    if input.ends_with(".gz") {
        bail!("compressed inputs are not seekable; decompress {input} before indexing");
    }

    let index =
        index_file(input, conf, min_shift).with_context(|| format!("failed to index {input}"))?;

    let output = match matches.get_one::<String>("output") {
        Some(path) => path.clone(),
        None => {
            let ext = if min_shift.is_some() {
                CSI_FILE_EXTENSION
            } else {
                TBI_FILE_EXTENSION
            };
            format!("{input}.{ext}")
        }
    };
    write_index(&index, &output).with_context(|| format!("failed to write index to {output}"))?;

    println!(
        "indexed {} sequences from {} into {}",
        index.dictionary().len(),
        input,
        output
    );
    Ok(())
}

fn conf_for_preset(preset: &str) -> Result<TabixConfig> {
    match preset {
        "vcf" => Ok(TabixConfig::vcf()),
        "bed" => Ok(TabixConfig::bed()),
        "gff" => Ok(TabixConfig::gff()),
        "sam" => Ok(TabixConfig::sam()),
        "gaf" => Ok(TabixConfig::gaf()),
        other => bail!("unknown preset: {other} (expected vcf, bed, gff, sam or gaf)"),
    }
}
