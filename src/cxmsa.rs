extern crate clap;
use clap::*;

mod cmd_cxmsa;

fn main() -> anyhow::Result<()> {
    let app = Command::new("cxmsa")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`cxmsa` - Complex MSA assembler")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Print debug information, e.g. why hits were dropped"),
        )
        .subcommand(cmd_cxmsa::align_peptide::make_subcommand())
        .subcommand(cmd_cxmsa::align_complex::make_subcommand())
        .subcommand(cmd_cxmsa::a3m_filter::make_subcommand())
        .subcommand(cmd_cxmsa::csv_to_fasta::make_subcommand())
        .subcommand(cmd_cxmsa::mhc_preprocess::make_subcommand())
        .subcommand(cmd_cxmsa::split_data::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Alignments:
    * align-peptide - Bootstrap peptide A3M files by exact-length matches
    * align-complex - Fuse per-chain A3M files into multi-chain alignments
    * a3m-filter    - Keep rows that are plain gapped copies of the query

* Databases:
    * csv-to-fasta   - Ingest TCR/peptide/MHC CSV files into a database
    * mhc-preprocess - Resolve MHC alleles to sequences
    * split-data     - Cluster-based train/test split

Logging goes to stderr; `-v` or RUST_LOG=debug shows more.

"###,
        );

    let matches = app.get_matches();
    init_logger(matches.get_count("verbose"));

    // Check which subcomamnd the user ran...
    match matches.subcommand() {
        Some(("align-peptide", sub_matches)) => cmd_cxmsa::align_peptide::execute(sub_matches),
        Some(("align-complex", sub_matches)) => cmd_cxmsa::align_complex::execute(sub_matches),
        Some(("a3m-filter", sub_matches)) => cmd_cxmsa::a3m_filter::execute(sub_matches),
        Some(("csv-to-fasta", sub_matches)) => cmd_cxmsa::csv_to_fasta::execute(sub_matches),
        Some(("mhc-preprocess", sub_matches)) => cmd_cxmsa::mhc_preprocess::execute(sub_matches),
        Some(("split-data", sub_matches)) => cmd_cxmsa::split_data::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
