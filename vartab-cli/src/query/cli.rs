use clap::{Command, arg};

pub const QUERY_CMD: &str = "query";

pub fn create_query_cli() -> Command {
    Command::new(QUERY_CMD)
        .about("Print records overlapping one or more regions of an indexed file.")
        .arg(arg!(--input <FILE> "Path to the indexed input file").required(true))
        .arg(
            arg!(--index <FILE> "Path to the index (default: <input>.tbi, then <input>.csi)")
                .required(false),
        )
        .arg(arg!(--"one-coord" "Treat chr:N as the single base N instead of chr:N-<end>"))
        .arg(arg!(<REGION> ... "Regions like chr1, chr1:100-200, {name}:5-9, . or *"))
}
