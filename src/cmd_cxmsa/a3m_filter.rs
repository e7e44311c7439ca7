use anyhow::Context;
use clap::*;
use cxmsa::libs::a3m::A3m;
use cxmsa::libs::aligned::is_aligned;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("a3m-filter")
        .about("Keeps A3M rows that are plain gapped copies of the query")
        .after_help(
            r###"
A row passes when it is the query with one block of leading gaps and one
block of trailing gaps at most. Internal gaps, mismatches and insertions
(lowercase letters) reject the row. Used to clean up MHC alignments.

Output: <infile>\t<rows> before and after filtering.

Examples:
1. Count the rows that pass:
   cxmsa a3m-filter mhc/*.a3m

2. Also write the kept rows:
   cxmsa a3m-filter mhc/*.a3m --outdir filtered

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Input A3M file(s)"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .num_args(1)
                .help("Write the kept rows to <outdir>/<file name>"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let mut writer = cxmsa::writer(args.get_one::<String>("outfile").unwrap());
    let outdir = args.get_one::<String>("outdir").map(std::path::Path::new);
    if let Some(dir) = outdir {
        std::fs::create_dir_all(dir)?;
    }

    //----------------------------
    // Ops
    //----------------------------
    for infile in args.get_many::<String>("infiles").unwrap() {
        log::info!("processing {} ...", infile);
        let text = cxmsa::read_text(infile).with_context(|| format!("Failed to read {}", infile))?;
        let a3m = A3m::parse(&text);
        let Some((target, _)) = a3m.query() else {
            anyhow::bail!("{} holds no sequences", infile);
        };
        writer.write_all(format!("{}\t{}\n", infile, a3m.len()).as_ref())?;

        let mut kept = A3m::default();
        for (seq, desc) in a3m.iter().filter(|(seq, _)| is_aligned(target, seq)) {
            kept.push(seq.to_string(), desc.to_string());
        }
        writer.write_all(format!("{}\t{}\n", infile, kept.len()).as_ref())?;

        if let Some(dir) = outdir {
            let name = std::path::Path::new(infile)
                .file_name()
                .with_context(|| format!("Invalid file name {}", infile))?;
            let path = dir.join(name);
            let mut out = cxmsa::file_writer(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            kept.write(&mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}
