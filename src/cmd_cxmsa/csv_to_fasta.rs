use anyhow::Context;
use clap::*;
use cxmsa::libs::db::{
    fasta_path, read_attr_idx, read_fasta_idx, read_mapping_idx, AttrIdx, DbUri, MappingIdx,
};
use cxmsa::libs::pid::compose;
use indexmap::IndexMap;
use std::io::Write;

// CSV column -> chain
const CHAIN_OF_COLUMN: [(&str, &str); 8] = [
    ("Antigen", "P"),
    ("Peptide", "P"),
    ("MHC_str", "M"),
    ("a_seq", "A"),
    ("b_seq", "B"),
    ("tcrb", "B"),
    ("TCRA", "A"),
    ("TCRB", "B"),
];

// chain -> label slots: 0 for pMHC, 1 for TCR-pMHC
fn task_of_chain(chain: &str) -> &'static [usize] {
    match chain {
        "A" | "B" => &[1],
        "M" => &[0],
        _ => &[],
    }
}

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("csv-to-fasta")
        .about("Ingests TCR/peptide/MHC CSV files into a database")
        .after_help(
            r###"
Each CSV row becomes a complex <prefix><n> whose chains come from the columns:
* Antigen, Peptide -> P
* MHC_str -> M
* a_seq, TCRA -> A
* b_seq, tcrb, TCRB -> B

Sequences already in the target database (<target>/fasta/<pid>.fasta) are
aliased to it; new ones are written to <outdir>/fasta/<pid>.fasta.

Labels come from the `y` or `label` column, or --default-y. The label mask
has two slots, pMHC (an MHC chain is present) and TCR (a TCR chain is
present). A HLA or Allele column is kept as the MHC attribute.

Output: <outdir>/mapping.idx and <outdir>/attr.idx, merged with the target ones.

Examples:
1. Ingest a CSV file:
   cxmsa csv-to-fasta vdjdb.csv --target-uri data/pdb -o data/tcr_pmhc

2. Unlabelled rows are positives:
   cxmsa csv-to-fasta iedb.csv --default-y 1.0 --pid-prefix pmhc_ -o data/pmhc

"###,
        )
        .arg(
            Arg::new("infiles")
                .required(true)
                .num_args(1..)
                .index(1)
                .help("Input CSV file(s)"),
        )
        .arg(
            Arg::new("target_uri")
                .long("target-uri")
                .num_args(1)
                .default_value(".")
                .help("Uri of the database holding known sequences"),
        )
        .arg(
            Arg::new("start_idx")
                .long("start-idx")
                .num_args(1)
                .default_value("0")
                .value_parser(value_parser!(usize))
                .help("Index of the first complex"),
        )
        .arg(
            Arg::new("pid_prefix")
                .long("pid-prefix")
                .num_args(1)
                .default_value("tcr_pmhc_")
                .help("Prefix of complex ids"),
        )
        .arg(
            Arg::new("default_y")
                .long("default-y")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Label of rows without a label column"),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('o')
                .num_args(1)
                .default_value(".")
                .help("Output database uri"),
        )
}

/// Combines the raw label with the task mask.
///
/// A positive label is spread over the present tasks. A negative TCR-pMHC
/// row keeps the pMHC binding as positive when an MHC chain is present.
fn make_label(label: f64, mask: &[bool; 2]) -> [f64; 2] {
    if label > 0.0 {
        [
            if mask[0] { label } else { 0.0 },
            if mask[1] { label } else { 0.0 },
        ]
    } else if mask[1] {
        [if mask[0] { 1.0 } else { 0.0 }, label]
    } else {
        [label, 0.0]
    }
}

fn is_valid_cell(cell: &str) -> bool {
    !cell.is_empty() && !cell.contains("nan")
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let output_uri: DbUri = args.get_one::<String>("outdir").unwrap().parse()?;
    let target_uri: DbUri = args.get_one::<String>("target_uri").unwrap().parse()?;
    let opt_start_idx = *args.get_one::<usize>("start_idx").unwrap();
    let opt_prefix = args.get_one::<String>("pid_prefix").unwrap();
    let opt_default_y = args.get_one::<f64>("default_y").copied();

    std::fs::create_dir_all(&output_uri.path)?;

    //----------------------------
    // Known sequences
    //----------------------------
    log::info!("load {} ...", target_uri.path.display());
    let mut mapping_idx = MappingIdx::new();
    read_mapping_idx(&target_uri, &mut mapping_idx)?;
    let mut attr_idx = AttrIdx::new();
    read_attr_idx(&target_uri, &mut attr_idx)?;

    // sequence -> canonical pid
    let mut pid_of_seq: IndexMap<String, String> = read_fasta_idx(&target_uri, &mapping_idx)?
        .into_iter()
        .map(|(pid, seq)| (seq, pid))
        .collect();

    //----------------------------
    // Ops
    //----------------------------
    let mut idx = opt_start_idx;
    for infile in args.get_many::<String>("infiles").unwrap() {
        log::info!("process {} ...", infile);
        let mut reader = csv::Reader::from_path(infile)
            .with_context(|| format!("Failed to open {}", infile))?;
        let headers = reader.headers()?.clone();

        for record in reader.records() {
            let record = record?;
            let row: IndexMap<&str, &str> = headers.iter().zip(record.iter()).collect();
            let pid = format!("{}{}", opt_prefix, idx);
            idx += 1;

            let label = match row.get("y").or_else(|| row.get("label")) {
                Some(v) => v
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("Invalid label of {}: {}", pid, v))?,
                None => opt_default_y
                    .with_context(|| format!("No label for {} in {}", pid, infile))?,
            };

            let mut mask = [false; 2];
            for (column, chain) in CHAIN_OF_COLUMN {
                let Some(&cell) = row.get(column) else {
                    continue;
                };
                if !is_valid_cell(cell) {
                    continue;
                }

                let chain_pid = compose(&pid, Some(chain));
                match pid_of_seq.get(cell) {
                    Some(canonical) => {
                        mapping_idx.insert(chain_pid, canonical.to_string());
                    }
                    None => {
                        let path = fasta_path(&output_uri, &chain_pid);
                        if let Some(dir) = path.parent() {
                            std::fs::create_dir_all(dir)?;
                        }
                        std::fs::write(&path, format!(">{}\n{}\n", chain_pid, cell))?;
                        mapping_idx.insert(chain_pid.clone(), chain_pid.clone());
                        pid_of_seq.insert(cell.to_string(), chain_pid);
                    }
                }
                for &task in task_of_chain(chain) {
                    mask[task] = true;
                }
            }

            let mut attr = serde_json::json!({
                "label": make_label(label, &mask),
                "label_mask": mask,
            });
            if let Some(mhc) = ["HLA", "Allele"].iter().find_map(|k| row.get(k)) {
                attr["MHC"] = serde_json::Value::from(*mhc);
            }
            attr_idx.insert(pid, attr);
        }
    }

    //----------------------------
    // Output
    //----------------------------
    log::info!("write {} ...", output_uri.mapping_idx);
    let path = output_uri.mapping_idx_path();
    let mut writer = cxmsa::file_writer(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (alias, canonical) in &mapping_idx {
        writer.write_all(format!("{}\t{}\n", canonical, alias).as_ref())?;
    }
    writer.flush()?;

    log::info!("write {} ...", output_uri.attr_idx);
    let path = output_uri.attr_idx_path();
    let mut writer = cxmsa::file_writer(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (pid, attr) in &attr_idx {
        writer.write_all(format!("{}\t{}\n", pid, attr).as_ref())?;
    }
    writer.flush()?;

    Ok(())
}
