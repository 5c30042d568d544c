mod index;
mod query;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "vartab";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Tabix-style indexing and region queries over sorted genomic text files.")
        .subcommand_required(true)
        .subcommand(index::cli::create_index_cli())
        .subcommand(query::cli::create_query_cli())
}

fn main() -> Result<()> {
    env_logger::init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // INDEX
        //
        Some((index::cli::INDEX_CMD, matches)) => {
            index::handlers::run_index(matches)?;
        }

        //
        // QUERY
        //
        Some((query::cli::QUERY_CMD, matches)) => {
            query::handlers::run_query(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
