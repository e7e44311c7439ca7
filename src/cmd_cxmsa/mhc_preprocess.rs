use anyhow::Context;
use clap::*;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_ALLELE: Regex = Regex::new(r"[*:]").unwrap();
}

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("mhc-preprocess")
        .about("Resolves MHC alleles to sequences")
        .after_help(
            r###"
The MHC sequence file is a CSV with `name` and `sqe` columns. A name like
HLA-A*02:01:01 is indexed as HLA-A0201 and HLA-A02; the first sequence seen
for a key wins.

The input CSV has `Allele` and `Peptide` columns. Rows with a known allele
are written as `Antigen,a_seq,b_seq,MHC_str`; unknown alleles are reported
with -v.

Examples:
1. Build a pMHC CSV:
   cxmsa mhc-preprocess --mhc-seq-file hla.csv iedb.csv -o pmhc.csv

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .index(1)
                .help("Input CSV file with Allele and Peptide columns. [stdin] for standard input"),
        )
        .arg(
            Arg::new("mhc_seq_file")
                .long("mhc-seq-file")
                .required(true)
                .num_args(1)
                .help("CSV file with MHC names and sequences"),
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

// HLA-A*02:01:01 -> [HLA-A0201, HLA-A02]
fn allele_keys(name: &str) -> Vec<String> {
    let fields: Vec<&str> = RE_ALLELE.split(name).collect();
    [3, 2]
        .iter()
        .map(|&n| fields[..n.min(fields.len())].concat())
        .collect()
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let infile = args.get_one::<String>("infile").unwrap();
    let mhc_seq_file = args.get_one::<String>("mhc_seq_file").unwrap();
    let outfile = args.get_one::<String>("outfile").unwrap();

    //----------------------------
    // MHC sequences
    //----------------------------
    log::info!("load {} ...", mhc_seq_file);
    let mut seq_of: IndexMap<String, String> = IndexMap::new();
    let mut reader = csv::Reader::from_path(mhc_seq_file)
        .with_context(|| format!("Failed to open {}", mhc_seq_file))?;
    let headers = reader.headers()?.clone();
    let i_name = column_of(&headers, "name", mhc_seq_file)?;
    let i_seq = column_of(&headers, "sqe", mhc_seq_file)?;
    for record in reader.records() {
        let record = record?;
        for key in allele_keys(&record[i_name]) {
            seq_of
                .entry(key)
                .or_insert_with(|| record[i_seq].to_string());
        }
    }

    //----------------------------
    // Ops
    //----------------------------
    log::info!("process {} ...", infile);
    let mut reader = csv::Reader::from_reader(cxmsa::reader(infile));
    let headers = reader.headers()?.clone();
    let i_allele = column_of(&headers, "Allele", infile)?;
    let i_peptide = column_of(&headers, "Peptide", infile)?;

    let mut writer = csv::Writer::from_writer(cxmsa::writer(outfile));
    writer.write_record(["Antigen", "a_seq", "b_seq", "MHC_str"])?;
    for record in reader.records() {
        let record = record?;
        let allele = &record[i_allele];
        match seq_of.get(allele) {
            Some(seq) => writer.write_record([&record[i_peptide], "", "", seq.as_str()])?,
            None => log::debug!("{} not found", allele),
        }
    }
    writer.flush()?;

    Ok(())
}

fn column_of(headers: &csv::StringRecord, name: &str, file: &str) -> anyhow::Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("No column {} in {}", name, file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allele_keys() {
        assert_eq!(allele_keys("HLA-A*02:01:01"), vec!["HLA-A0201", "HLA-A02"]);
        assert_eq!(allele_keys("HLA-B*07:02"), vec!["HLA-B0702", "HLA-B07"]);
        assert_eq!(allele_keys("H-2-Kb"), vec!["H-2-Kb", "H-2-Kb"]);
    }
}
