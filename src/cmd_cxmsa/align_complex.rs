use anyhow::Context;
use clap::*;
use cxmsa::libs::complex::{Assembler, Assembly};
use cxmsa::libs::db::{read_chain_idx, read_mapping_idx, ChainIdx, Database, DbUri, MappingIdx};
use std::io::Write;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("align-complex")
        .about("Fuses per-chain A3M files of each target complex into one alignment")
        .after_help(
            r###"
For every complex listed in the chain index of the target uri, reads the A3M
file of each chain, keeps the database complexes whose chains are all hit,
and writes the fused alignment.

Database uri:
* `path[?chain_idx=..&mapping_idx=..&attr_idx=..&a3m_dir=..]`
* Defaults: chain.idx, mapping.idx, attr.idx and the `a3m` directory
* Several --db-uri are merged; later ones win on duplicated keys

Output, per target complex <pid>:
* <outdir>/<pid>/msas/<pid>.a3m - the target row, then one row per complete hit
* <outdir>/<pid>/msas/<pid>.bin - bincode snapshot of the chain coverage
* stdout: <pid>\t<rows>\t<chains>

Chains are joined by --padding gaps. Leading and trailing gaps of a hit are
replaced by `*`; a chain without any hit is filled with `*`.

A target with a missing A3M file is skipped with a warning.

Examples:
1. Fuse alignments:
   cxmsa align-complex --db-uri data/pdb --target-uri data/tcr_pmhc -o out

2. Merge two databases, 8 threads:
   cxmsa align-complex --db-uri data/pdb data/pdb_new?attr_idx=attr.v2.idx \
       --target-uri data/tcr_pmhc -o out -p 8

"###,
        )
        .arg(
            Arg::new("db_uri")
                .long("db-uri")
                .required(true)
                .num_args(1..)
                .help("Database uri(s) the hits come from"),
        )
        .arg(
            Arg::new("target_uri")
                .long("target-uri")
                .required(true)
                .num_args(1)
                .help("Uri of the target complexes and their per-chain A3M files"),
        )
        .arg(
            Arg::new("padding")
                .long("padding")
                .num_args(1)
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("Number of gaps between two chains"),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Number of threads"),
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
    let db_uris = args
        .get_many::<String>("db_uri")
        .unwrap()
        .map(|s| s.parse::<DbUri>())
        .collect::<anyhow::Result<Vec<_>>>()?;
    let target_uri: DbUri = args.get_one::<String>("target_uri").unwrap().parse()?;
    let opt_padding = *args.get_one::<usize>("padding").unwrap();
    let opt_parallel = *args.get_one::<usize>("parallel").unwrap();
    let outdir = args.get_one::<String>("outdir").unwrap();

    //----------------------------
    // Indices
    //----------------------------
    let db = Database::load(&db_uris)?;

    let mut target_mapping_idx = MappingIdx::new();
    read_mapping_idx(&target_uri, &mut target_mapping_idx)?;
    let mut target_chain_idx = ChainIdx::new();
    read_chain_idx(&target_uri, &mut target_chain_idx)?;
    log::info!(
        "{} targets in {}",
        target_chain_idx.len(),
        target_uri.path.display()
    );

    let assembler =
        Assembler::new(&db, &target_uri, &target_mapping_idx).with_padding(opt_padding);

    //----------------------------
    // Ops
    //----------------------------
    let mut writer = cxmsa::writer("stdout");
    if opt_parallel <= 1 {
        for (pid, chains) in &target_chain_idx {
            let result = assembler.align_complex(pid, chains);
            proc_result(pid, result, outdir, &mut writer)?;
        }
    } else {
        proc_complex_p(&assembler, &target_chain_idx, opt_parallel, outdir, &mut writer)?;
    }
    writer.flush()?;

    Ok(())
}

// A failed target is reported and skipped; failing to write is fatal.
fn proc_result(
    pid: &str,
    result: cxmsa::libs::error::Result<Assembly>,
    outdir: &str,
    writer: &mut Box<dyn Write>,
) -> anyhow::Result<()> {
    match result {
        Ok(assembly) => {
            assembly
                .write(outdir)
                .with_context(|| format!("Failed to write the alignment of {}", pid))?;
            writer.write_all(
                format!(
                    "{}\t{}\t{}\n",
                    assembly.pid,
                    assembly.a3m.len(),
                    assembly.chains.join(",")
                )
                .as_ref(),
            )?;
        }
        Err(e) => log::warn!("Skip {}: {}", pid, e),
    }
    Ok(())
}

// Reader -> workers -> writer, the indices are shared read-only by all workers
fn proc_complex_p(
    assembler: &Assembler,
    target_chain_idx: &ChainIdx,
    parallel: usize,
    outdir: &str,
    writer: &mut Box<dyn Write>,
) -> anyhow::Result<()> {
    // Channel 1 - Targets
    let (snd1, rcv1) = crossbeam::channel::bounded::<(&String, &Vec<String>)>(10);
    // Channel 2 - Results
    let (snd2, rcv2) = crossbeam::channel::bounded(10);

    let status = crossbeam::scope(|s| {
        //----------------------------
        // Reader thread
        //----------------------------
        s.spawn(|_| {
            for item in target_chain_idx.iter() {
                if snd1.send(item).is_err() {
                    break;
                }
            }
            // Close the channel - this is necessary to exit the for-loop in the worker
            drop(snd1);
        });

        //----------------------------
        // Worker threads
        //----------------------------
        for _ in 0..parallel {
            // Send to sink, receive from source
            let (sendr, recvr) = (snd2.clone(), rcv1.clone());
            s.spawn(move |_| {
                for (pid, chains) in recvr.iter() {
                    let result = assembler.align_complex(pid, chains);
                    if sendr.send((pid, result)).is_err() {
                        break;
                    }
                }
            });
        }
        // Close the channel, otherwise sink will never exit the for-loop
        drop(snd2);
        drop(rcv1);

        //----------------------------
        // Writer thread
        //----------------------------
        let mut status = Ok(());
        for (pid, result) in rcv2.iter() {
            status = proc_result(pid, result, outdir, writer);
            if status.is_err() {
                break;
            }
        }
        // Unblock the workers when stopped early
        drop(rcv2);
        status
    })
    .map_err(|_| anyhow::anyhow!("A worker thread panicked"))?;

    status
}
