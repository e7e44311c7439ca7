use anyhow::Context;
use clap::*;
use cxmsa::libs::a3m::A3m;
use indexmap::IndexMap;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("align-peptide")
        .about("Bootstraps peptide A3M files by exact-length matches")
        .after_help(
            r###"
Peptides are too short for a homology search. Each database peptide of the
same length as the query becomes an ungapped hit.

* Every input FASTA file holds exactly one sequence
* Output: <outdir>/<stem>/msas/<name>, the query row first
* Hit headers: <db-id>/1-<length>

Examples:
1. Align two peptides against a database:
   cxmsa align-peptide pep1.fasta pep2.fasta --db iedb.fasta -o a3m

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Input FASTA file(s), one peptide each"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .required(true)
                .num_args(1..)
                .help("Peptide FASTA database(s)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .num_args(1)
                .default_value("bfd_uniclust_hits.a3m")
                .help("File name of the A3M output"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value(".")
                .help("Output directory"),
        )
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let outdir = std::path::Path::new(args.get_one::<String>("outdir").unwrap());
    let name = args.get_one::<String>("name").unwrap();

    //----------------------------
    // Database
    //----------------------------
    let mut db = A3m::default();
    for infile in args.get_many::<String>("db").unwrap() {
        let text = cxmsa::read_text(infile).with_context(|| format!("Failed to read {}", infile))?;
        for (seq, desc) in A3m::parse(&text).iter() {
            let id = desc.split_whitespace().next().unwrap_or_default();
            db.push(seq.to_string(), id.to_string());
        }
    }

    // length -> indices of db peptides
    let mut idx_of_len: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (i, seq) in db.seqs.iter().enumerate() {
        idx_of_len.entry(seq.chars().count()).or_default().push(i);
    }
    log::info!("{} peptides in the database", db.len());

    //----------------------------
    // Ops
    //----------------------------
    for infile in args.get_many::<String>("infiles").unwrap() {
        log::info!("process {} ...", infile);
        let text = cxmsa::read_text(infile).with_context(|| format!("Failed to read {}", infile))?;
        let query = A3m::parse(&text);
        if query.len() != 1 {
            anyhow::bail!("{} holds {} sequences, expected 1", infile, query.len());
        }
        let (seq, desc) = query.query().unwrap_or_default();

        let pid = std::path::Path::new(infile)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(infile.as_str());
        let dir = outdir.join(pid).join("msas");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(name);
        let mut writer = cxmsa::file_writer(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_all(format!(">{}\n{}\n", desc, seq).as_ref())?;

        let len = seq.chars().count();
        if let Some(indices) = idx_of_len.get(&len) {
            for &i in indices {
                writer.write_all(format!(">{}/1-{}\n{}\n", db.descs[i], len, db.seqs[i]).as_ref())?;
            }
        }
        writer.flush()?;
    }

    Ok(())
}
