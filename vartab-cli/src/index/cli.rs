use clap::{Command, arg};

pub const INDEX_CMD: &str = "index";

pub fn create_index_cli() -> Command {
    Command::new(INDEX_CMD)
        .about("Build a binning index over a sorted, tab-delimited genomic text file.")
        .arg(arg!(--input <FILE> "Path to the sorted input file").required(true))
        .arg(
            arg!(--preset <PRESET> "Input format: vcf, bed, gff, sam or gaf")
                .required(false)
                .default_value("vcf"),
        )
        .arg(
            arg!(--"min-shift" <N> "Build a generalized index with this smallest-bin width (log2)")
                .required(false),
        )
        .arg(
            arg!(--output <FILE> "Path for the index (default: <input>.tbi or <input>.csi)")
                .required(false),
        )
}
