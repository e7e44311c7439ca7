//! Fuses per-chain alignments of one target complex into a multi-chain alignment.
//!
//! Each chain of the target has its own A3M file, searched independently
//! against the database. A database complex contributes one row to the fused
//! alignment only when every one of its chains was hit by some chain of the
//! target. Hits are credited through the aliasing index, so redundant entries
//! of the same sequence count for every complex that shares it.
use crate::libs::a3m::{read_a3m, A3m};
use crate::libs::db::{Database, DbUri, MappingIdx};
use crate::libs::error::Result;
use crate::libs::pid::{compose, decompose, join_domains, Pid};
use indexmap::IndexMap;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Length of the linker between two chains of a concatenated sequence
pub const PADDING: usize = 100;
/// Fills the linker
pub const GAP: char = '-';
/// Marks residues not covered by a hit
pub const MASK: char = '*';

lazy_static! {
    static ref RE_LEADING: Regex = Regex::new(r"^-+").unwrap();
    static ref RE_TRAILING: Regex = Regex::new(r"-+$").unwrap();
}

/// One database hit of one target chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignRecord {
    pub domains: Vec<(usize, usize)>,
    pub seq: String,
    pub desc: String,
    /// The target chain whose alignment produced this row
    pub target_chain: String,
}

/// `base_chain` -> record
pub type RecordStore = IndexMap<String, AlignRecord>;

/// base -> chains covered by hits, in the order they were credited.
///
/// A chainless identifier is recorded as an empty label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    chains: IndexMap<String, Vec<String>>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, base: &str, chain: &str) {
        match self.chains.get_mut(base) {
            Some(v) => v.push(chain.to_string()),
            None => {
                self.chains.insert(base.to_string(), vec![chain.to_string()]);
            }
        }
    }

    pub fn get(&self, base: &str) -> Option<&[String]> {
        self.chains.get(base).map(|v| v.as_slice())
    }

    pub fn count(&self, base: &str) -> usize {
        self.get(base).map_or(0, |v| v.len())
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.chains.iter()
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Folds the hits of one chain's alignment into `store` and `coverage`.
///
/// The query row is skipped. Every hit is stored under its `base_chain` key,
/// later rows replacing earlier ones, and credits its chain to its own base
/// and to the base of each alias.
pub fn align_a3m(
    a3m: &A3m,
    db: &Database,
    store: &mut RecordStore,
    coverage: &mut Coverage,
    target_chain: &str,
) {
    for (seq, desc) in a3m.hits() {
        let Some(token) = desc.split_whitespace().next() else {
            continue;
        };
        let pid: Pid = match token.parse() {
            Ok(pid) => pid,
            Err(e) => {
                log::debug!("Skip hit {}: {}", token, e);
                continue;
            }
        };

        let key = pid.key();
        store.insert(
            key.clone(),
            AlignRecord {
                domains: pid.domains.clone(),
                seq: seq.to_string(),
                desc: desc.to_string(),
                target_chain: target_chain.to_string(),
            },
        );

        for id in std::iter::once(&key).chain(db.aliases(&key)).unique() {
            let (base, chain) = decompose(id);
            coverage.add(base, chain.unwrap_or(""));
        }
    }
}

/// Joins sequences with `padding` gaps and returns the 1-based span of each.
///
/// ```
/// use cxmsa::libs::complex::concat_chains;
///
/// let (seq, domains) = concat_chains(&["ACDEF", "GHIK"], 3);
/// assert_eq!(seq, "ACDEF---GHIK");
/// assert_eq!(domains, vec![(1, 5), (9, 12)]);
/// ```
pub fn concat_chains<S: AsRef<str>>(seqs: &[S], padding: usize) -> (String, Vec<(usize, usize)>) {
    let linker = GAP.to_string().repeat(padding);

    let mut domains = Vec::with_capacity(seqs.len());
    let mut n = 1;
    for seq in seqs {
        let len = seq.as_ref().chars().count();
        domains.push((n, n + len - 1));
        n += len + padding;
    }

    let seq = seqs.iter().map(|s| s.as_ref()).join(&linker);
    (seq, domains)
}

/// Replaces leading and trailing gap runs by mask characters.
///
/// ```
/// use cxmsa::libs::complex::mask_gaps;
///
/// assert_eq!(mask_gaps("---XYZ---"), "***XYZ***");
/// assert_eq!(mask_gaps("XY--Z"), "XY--Z");
/// ```
pub fn mask_gaps(seq: &str) -> String {
    let repl = |caps: &Captures| MASK.to_string().repeat(caps[0].len());
    let seq = RE_LEADING.replace(seq, repl);
    RE_TRAILING.replace(&seq, repl).into_owned()
}

/// The result of assembling one target complex.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub pid: String,
    pub chains: Vec<String>,
    /// Target row followed by one row per complete hit
    pub a3m: A3m,
    pub coverage: Coverage,
}

impl Assembly {
    /// Number of complete hits
    pub fn num_hits(&self) -> usize {
        self.a3m.len().saturating_sub(1)
    }

    /// `<outdir>/<pid>/msas`
    pub fn out_dir<P: AsRef<Path>>(&self, outdir: P) -> PathBuf {
        outdir.as_ref().join(&self.pid).join("msas")
    }

    /// Writes `<pid>.a3m` and the coverage snapshot `<pid>.bin`.
    pub fn write<P: AsRef<Path>>(&self, outdir: P) -> anyhow::Result<()> {
        let dir = self.out_dir(outdir);
        std::fs::create_dir_all(&dir)?;

        let file = std::fs::File::create(dir.join(format!("{}.a3m", self.pid)))?;
        let mut writer = std::io::BufWriter::new(file);
        self.a3m.write(&mut writer)?;
        writer.flush()?;

        std::fs::write(
            dir.join(format!("{}.bin", self.pid)),
            self.coverage.to_bytes()?,
        )?;

        Ok(())
    }
}

/// Read-only context shared by all assembly tasks.
#[derive(Debug, Clone)]
pub struct Assembler<'a> {
    /// The database the hits come from
    pub db: &'a Database,
    /// Where the per-chain alignments of targets live
    pub target_uri: &'a DbUri,
    pub target_mapping_idx: &'a MappingIdx,
    pub padding: usize,
}

impl<'a> Assembler<'a> {
    pub fn new(db: &'a Database, target_uri: &'a DbUri, target_mapping_idx: &'a MappingIdx) -> Self {
        Self {
            db,
            target_uri,
            target_mapping_idx,
            padding: PADDING,
        }
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// A hit counts only with attributes and every chain of its complex covered.
    pub fn is_complete(&self, base: &str, covered: &[String]) -> bool {
        if !self.db.attr_idx.contains_key(base) {
            log::debug!("Drop {}: no attributes", base);
            return false;
        }
        match self.db.chain_idx.get(base) {
            Some(chains) if chains.len() == covered.len() => true,
            Some(chains) => {
                log::debug!(
                    "Drop {}: {} of {} chains covered",
                    base,
                    covered.len(),
                    chains.len()
                );
                false
            }
            None => {
                log::debug!("Drop {}: no chain membership", base);
                false
            }
        }
    }

    /// The record of `base` aligned to `target_chain`, if any.
    fn select<'s>(
        &self,
        store: &'s RecordStore,
        base: &str,
        covered: &[String],
        target_chain: &str,
    ) -> Option<&'s AlignRecord> {
        for chain in covered {
            let key = compose(base, Some(chain));
            let record = store.get(&key).or_else(|| {
                self.db
                    .mapping_idx
                    .get(&key)
                    .and_then(|canonical| store.get(canonical))
            });
            match record {
                Some(r) if r.target_chain == target_chain => return Some(r),
                Some(_) => {}
                None => log::debug!("No record for {}", key),
            }
        }
        None
    }

    pub fn align_complex(&self, pid: &str, chains: &[String]) -> Result<Assembly> {
        let mut store = RecordStore::new();
        let mut coverage = Coverage::new();

        // retrieve aligned chains
        let mut queries = Vec::with_capacity(chains.len());
        for chain in chains {
            let chain_pid = compose(pid, Some(chain));
            let a3m = read_a3m(self.target_uri, self.target_mapping_idx, &chain_pid)?;
            align_a3m(&a3m, self.db, &mut store, &mut coverage, chain);
            log::debug!("{}: {} rows", chain_pid, a3m.len());

            // read_a3m never returns an empty block
            let (query, _) = a3m.query().unwrap_or_default();
            queries.push(query.to_string());
        }

        // the target itself
        let mut a3m = A3m::default();
        let (target_seq, domains) = concat_chains(&queries, self.padding);
        a3m.push(
            target_seq,
            format!("{} domains:{}", pid, join_domains(&domains)),
        );

        // hits with all chains aligned
        let linker = GAP.to_string().repeat(self.padding);
        for (base, covered) in coverage.iter() {
            if !self.is_complete(base, covered) {
                continue;
            }

            let mut desc = format!("{} chains:{}", base, covered.join(","));
            if let Some(attr) = self.db.attr_idx.get(base) {
                desc = format!("{} {}", desc, attr);
            }

            let seq = chains
                .iter()
                .zip(queries.iter())
                .map(|(chain, query)| match self.select(&store, base, covered, chain) {
                    Some(record) => mask_gaps(&record.seq),
                    None => MASK.to_string().repeat(query.chars().count()),
                })
                .join(&linker);
            a3m.push(seq, desc);
        }

        log::debug!(
            "{}: {} of {} hit complexes complete",
            pid,
            a3m.len() - 1,
            coverage.len()
        );

        Ok(Assembly {
            pid: pid.to_string(),
            chains: chains.to_vec(),
            a3m,
            coverage,
        })
    }
}
