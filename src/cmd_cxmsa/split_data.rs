use anyhow::Context;
use clap::*;
use cxmsa::libs::db::{read_chain_idx, read_fasta_idx, resolve, ChainIdx, DbUri, MappingIdx};
use cxmsa::libs::pid::{compose, decompose};
use indexmap::{IndexMap, IndexSet};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("split-data")
        .about("Splits a database into train and test sets by sequence clusters")
        .after_help(
            r###"
The cluster CSV has `Antigen` (a sequence) and `Cluster` columns. Clusters
are shuffled and the first --test-ratio of them go to the test set. A complex
is a test complex when the sequence of its --cluster-chain falls in a test
cluster.

Output:
* <target>/cluster.idx - <sequence>,<cluster>,<train|test>
* stdout - split_data\t<pid> <chains>\t<train|test\t<cluster>>

Examples:
1. Split by peptide clusters:
   cxmsa split-data --target-uri data/tcr_pmhc clusters.csv

2. Reproducible split:
   cxmsa split-data --target-uri data/tcr_pmhc clusters.csv --seed 42 --test-ratio 0.1

"###,
        )
        .arg(
            Arg::new("cluster_file")
                .required(true)
                .index(1)
                .help("Cluster CSV file"),
        )
        .arg(
            Arg::new("target_uri")
                .long("target-uri")
                .num_args(1)
                .default_value(".")
                .help("Uri of the database to split"),
        )
        .arg(
            Arg::new("test_ratio")
                .long("test-ratio")
                .num_args(1)
                .default_value("0.2")
                .value_parser(value_parser!(f64))
                .help("Fraction of clusters in the test set"),
        )
        .arg(
            Arg::new("cluster_chain")
                .long("cluster-chain")
                .num_args(1)
                .default_value("P")
                .help("Cluster by this chain only"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .short('s')
                .num_args(1)
                .value_parser(value_parser!(u64))
                .help("Random seed; default uses system entropy"),
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
    let cluster_file = args.get_one::<String>("cluster_file").unwrap();
    let target_uri: DbUri = args.get_one::<String>("target_uri").unwrap().parse()?;
    let opt_ratio = *args.get_one::<f64>("test_ratio").unwrap();
    let opt_chain = args.get_one::<String>("cluster_chain").unwrap();
    let mut writer = cxmsa::writer(args.get_one::<String>("outfile").unwrap());

    if !(0.0..=1.0).contains(&opt_ratio) {
        anyhow::bail!("--test-ratio should be in [0, 1], got {}", opt_ratio);
    }
    let mut rng = match args.get_one::<u64>("seed") {
        Some(&seed) => rand::rngs::StdRng::seed_from_u64(seed),
        None => rand::rngs::StdRng::from_entropy(),
    };

    //----------------------------
    // Indices
    //----------------------------
    log::info!("load {} ...", target_uri.path.display());
    let mut mapping_idx = MappingIdx::new();
    read_mapping_idx_of_chain(&target_uri, opt_chain, &mut mapping_idx)?;
    // pid -> sequence
    let fasta_idx = read_fasta_idx(&target_uri, &mapping_idx)?;
    let mut chain_idx = ChainIdx::new();
    read_chain_idx(&target_uri, &mut chain_idx)?;

    // sequence -> cluster
    let mut cluster_idx: IndexMap<String, String> = IndexMap::new();
    let mut reader = csv::Reader::from_path(cluster_file)
        .with_context(|| format!("Failed to open {}", cluster_file))?;
    for row in reader.deserialize::<IndexMap<String, String>>() {
        let row = row?;
        let (Some(seq), Some(cluster)) = (row.get("Antigen"), row.get("Cluster")) else {
            anyhow::bail!("{} needs Antigen and Cluster columns", cluster_file);
        };
        cluster_idx.insert(seq.to_string(), cluster.to_string());
    }

    //----------------------------
    // Split by cluster
    //----------------------------
    let mut clusters: Vec<&String> = cluster_idx.values().collect::<IndexSet<_>>().into_iter().collect();
    clusters.shuffle(&mut rng);
    log::info!("Total clusters: {}", clusters.len());
    let n_test = (clusters.len() as f64 * opt_ratio) as usize;
    let test_clusters: IndexSet<&String> = clusters[..n_test].iter().copied().collect();
    log::info!("Clusters for test: {}", test_clusters.len());

    let path = target_uri.path.join("cluster.idx");
    let mut cluster_writer = cxmsa::file_writer(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for (seq, cluster) in &cluster_idx {
        let set = if test_clusters.contains(cluster) {
            "test"
        } else {
            "train"
        };
        cluster_writer.write_all(format!("{},{},{}\n", seq, cluster, set).as_ref())?;
    }
    cluster_writer.flush()?;

    //----------------------------
    // Output
    //----------------------------
    for (pid, chains) in &chain_idx {
        let mut label = "train".to_string();
        if chains.contains(opt_chain) {
            let key = compose(pid, Some(opt_chain));
            let key = resolve(&mapping_idx, &key);
            let seq = fasta_idx
                .get(key)
                .with_context(|| format!("No sequence for {}", key))?;
            if let Some(cluster) = cluster_idx.get(seq) {
                if test_clusters.contains(cluster) {
                    label = format!("test\t{}", cluster);
                }
            }
        }
        writer.write_all(format!("split_data\t{} {}\t{}\n", pid, chains.join(" "), label).as_ref())?;
    }
    writer.flush()?;

    Ok(())
}

// Only aliases of the given chain
fn read_mapping_idx_of_chain(
    uri: &DbUri,
    chain: &str,
    mapping_idx: &mut MappingIdx,
) -> anyhow::Result<()> {
    cxmsa::libs::db::read_mapping_idx(uri, mapping_idx)?;
    mapping_idx.retain(|alias, _| decompose(alias).1 == Some(chain));
    Ok(())
}
