//! Database locations and the three flat indices stored in them.
//!
//! * `mapping.idx` - `canonical alias`, one pair per line
//! * `chain.idx` - `base chain1 chain2 ...`
//! * `attr.idx` - `base<TAB>json`
use crate::libs::a3m::A3m;
use crate::libs::error::{Error, Result};
use anyhow::Context;
use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// alias -> canonical
pub type MappingIdx = IndexMap<String, String>;
/// canonical -> aliases
pub type MappingDict = IndexMap<String, Vec<String>>;
/// base -> chains
pub type ChainIdx = IndexMap<String, Vec<String>>;
/// base -> attributes
pub type AttrIdx = IndexMap<String, serde_json::Value>;

/// A database location with optional overrides of the index file names.
///
/// ```
/// use cxmsa::libs::db::DbUri;
///
/// let uri: DbUri = "data/pdb?chain_idx=chain.v2.idx&a3m_dir=/mnt/a3m".parse().unwrap();
/// assert_eq!(uri.path, std::path::PathBuf::from("data/pdb"));
/// assert_eq!(uri.chain_idx, "chain.v2.idx");
/// assert_eq!(uri.mapping_idx, "mapping.idx");
/// assert_eq!(uri.a3m_dir_path(), std::path::PathBuf::from("/mnt/a3m"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbUri {
    pub path: PathBuf,
    pub chain_idx: String,
    pub mapping_idx: String,
    pub attr_idx: String,
    pub a3m_dir: String,
}

impl DbUri {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            chain_idx: "chain.idx".to_string(),
            mapping_idx: "mapping.idx".to_string(),
            attr_idx: "attr.idx".to_string(),
            a3m_dir: "a3m".to_string(),
        }
    }

    /// Absolute names are kept as is, relative ones are joined to the db path.
    pub fn abs_path(&self, name: &str) -> PathBuf {
        let p = Path::new(name);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.path.join(p)
        }
    }

    pub fn chain_idx_path(&self) -> PathBuf {
        self.abs_path(&self.chain_idx)
    }

    pub fn mapping_idx_path(&self) -> PathBuf {
        self.abs_path(&self.mapping_idx)
    }

    pub fn attr_idx_path(&self) -> PathBuf {
        self.abs_path(&self.attr_idx)
    }

    pub fn a3m_dir_path(&self) -> PathBuf {
        self.abs_path(&self.a3m_dir)
    }
}

impl FromStr for DbUri {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.strip_prefix("file://").unwrap_or(s);
        let (path, query) = match s.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (s, None),
        };
        if path.is_empty() {
            anyhow::bail!("Empty database path: {}", s);
        }

        let mut uri = DbUri::new(path);
        if let Some(query) = query {
            // repeated keys: the last one wins
            for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
                match k.as_ref() {
                    "chain_idx" => uri.chain_idx = v.into_owned(),
                    "mapping_idx" => uri.mapping_idx = v.into_owned(),
                    "attr_idx" => uri.attr_idx = v.into_owned(),
                    "a3m_dir" => uri.a3m_dir = v.into_owned(),
                    _ => log::debug!("Ignore unknown db uri option {}={}", k, v),
                }
            }
        }

        Ok(uri)
    }
}

// Yields (1-based line number, trimmed line) of non-empty lines.
// An absent file yields nothing.
fn for_each_line<F>(path: &Path, mut f: F) -> Result<()>
where
    F: FnMut(usize, &str) -> Result<()>,
{
    if !path.is_file() {
        log::debug!("Index {} not found", path.display());
        return Ok(());
    }

    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        f(i + 1, line)?;
    }

    Ok(())
}

pub fn read_mapping_idx(uri: &DbUri, mapping_idx: &mut MappingIdx) -> Result<()> {
    let path = uri.mapping_idx_path();
    for_each_line(&path, |n, line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(Error::Index {
                path: path.clone(),
                line: n,
                message: format!("expected `canonical alias`, got {} fields", fields.len()),
            });
        }
        mapping_idx.insert(fields[1].to_string(), fields[0].to_string());
        Ok(())
    })
}

pub fn read_chain_idx(uri: &DbUri, chain_idx: &mut ChainIdx) -> Result<()> {
    let path = uri.chain_idx_path();
    for_each_line(&path, |_, line| {
        let mut fields = line.split_whitespace();
        // non-empty after trim, so there is always a first field
        if let Some(base) = fields.next() {
            chain_idx.insert(base.to_string(), fields.map(|c| c.to_string()).collect());
        }
        Ok(())
    })
}

/// Parses one `base json` line. The JSON part may contain whitespace.
///
/// ```
/// use cxmsa::libs::db::parse_attr_line;
///
/// let (k, v) = parse_attr_line("tcr_pmhc_0\t{\"label\": [1.0, 0.0]}").unwrap();
/// assert_eq!(k, "tcr_pmhc_0");
/// assert_eq!(v["label"][0], 1.0);
///
/// assert!(parse_attr_line("tcr_pmhc_1\t{broken").is_err());
/// assert!(parse_attr_line("tcr_pmhc_2").is_err());
/// ```
pub fn parse_attr_line(line: &str) -> std::result::Result<(&str, serde_json::Value), serde_json::Error> {
    let line = line.trim();
    let (k, v) = match line.split_once(char::is_whitespace) {
        Some((k, v)) => (k, v.trim()),
        None => (line, ""),
    };
    let v = serde_json::from_str(v)?;
    Ok((k, v))
}

/// Malformed lines are skipped.
pub fn read_attr_idx(uri: &DbUri, attr_idx: &mut AttrIdx) -> Result<()> {
    let path = uri.attr_idx_path();
    for_each_line(&path, |n, line| {
        match parse_attr_line(line) {
            Ok((k, v)) => {
                attr_idx.insert(k.to_string(), v);
            }
            Err(e) => log::debug!("Skip attr line {} of {}: {}", n, path.display(), e),
        }
        Ok(())
    })
}

/// Inverts the aliasing index, keeping the index order of aliases.
pub fn mapping_dict(mapping_idx: &MappingIdx) -> MappingDict {
    let mut dict = MappingDict::new();
    for (alias, canonical) in mapping_idx {
        dict.entry(canonical.to_string())
            .or_default()
            .push(alias.to_string());
    }
    dict
}

/// Canonical identifier of `pid`, or `pid` itself when unknown.
pub fn resolve<'a>(mapping_idx: &'a MappingIdx, pid: &'a str) -> &'a str {
    mapping_idx.get(pid).map(|s| s.as_str()).unwrap_or(pid)
}

/// `<path>/fasta/<pid>.fasta`
pub fn fasta_path(uri: &DbUri, pid: &str) -> PathBuf {
    uri.path.join("fasta").join(format!("{}.fasta", pid))
}

/// Loads the sequence of every canonical identifier, pid -> sequence.
///
/// Each FASTA file must hold exactly one sequence. Files are read in parallel.
pub fn read_fasta_idx(uri: &DbUri, mapping_idx: &MappingIdx) -> anyhow::Result<IndexMap<String, String>> {
    let pids: Vec<&String> = mapping_idx.values().unique().collect();

    let entries = pids
        .par_iter()
        .map(|pid| -> anyhow::Result<(String, String)> {
            let path = fasta_path(uri, pid);
            let text = crate::read_text(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let fasta = A3m::parse(&text);
            if fasta.len() != 1 {
                anyhow::bail!("{} holds {} sequences, expected 1", path.display(), fasta.len());
            }
            Ok((pid.to_string(), fasta.seqs[0].clone()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(entries.into_iter().collect())
}

/// Read-only snapshot of the merged indices of one or more databases.
#[derive(Debug, Clone, Default)]
pub struct Database {
    pub mapping_idx: MappingIdx,
    pub chain_idx: ChainIdx,
    pub attr_idx: AttrIdx,
    pub mapping_dict: MappingDict,
}

impl Database {
    /// Later locations overwrite earlier ones on key collision.
    pub fn load(uris: &[DbUri]) -> Result<Self> {
        let mut db = Database::default();
        for uri in uris {
            read_mapping_idx(uri, &mut db.mapping_idx)?;
            read_chain_idx(uri, &mut db.chain_idx)?;
            read_attr_idx(uri, &mut db.attr_idx)?;
        }
        db.mapping_dict = mapping_dict(&db.mapping_idx);

        log::info!(
            "Loaded {} aliases, {} complexes, {} attributes from {}",
            db.mapping_idx.len(),
            db.chain_idx.len(),
            db.attr_idx.len(),
            uris.iter().map(|u| u.path.display()).join(", ")
        );

        Ok(db)
    }

    pub fn resolve<'a>(&'a self, pid: &'a str) -> &'a str {
        resolve(&self.mapping_idx, pid)
    }

    /// All known aliases of a canonical identifier.
    pub fn aliases(&self, pid: &str) -> &[String] {
        self.mapping_dict
            .get(pid)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_uri_defaults() {
        let uri: DbUri = "db".parse().unwrap();
        assert_eq!(uri, DbUri::new("db"));
        assert_eq!(uri.chain_idx_path(), PathBuf::from("db/chain.idx"));
        assert_eq!(uri.attr_idx_path(), PathBuf::from("db/attr.idx"));
        assert_eq!(uri.a3m_dir_path(), PathBuf::from("db/a3m"));
    }

    #[test]
    fn test_parse_uri_last_wins() {
        let uri: DbUri = "db?attr_idx=a.idx&attr_idx=b.idx&mapping_idx=m%20x.idx"
            .parse()
            .unwrap();
        assert_eq!(uri.attr_idx, "b.idx");
        assert_eq!(uri.mapping_idx, "m x.idx");
        assert!("?a3m_dir=x".parse::<DbUri>().is_err());
    }

    #[test]
    fn test_resolve() {
        let mut mapping = MappingIdx::new();
        mapping.insert("2abc_A".to_string(), "1abc_A".to_string());
        mapping.insert("1abc_A".to_string(), "1abc_A".to_string());

        assert_eq!(resolve(&mapping, "1abc_A"), "1abc_A");
        assert_eq!(resolve(&mapping, "2abc_A"), "1abc_A");
        assert_eq!(resolve(&mapping, "9zzz_C"), "9zzz_C");
    }

    #[test]
    fn test_load_and_merge() {
        let dir = tempdir().unwrap();
        let db1 = dir.path().join("db1");
        let db2 = dir.path().join("db2");
        fs::create_dir_all(&db1).unwrap();
        fs::create_dir_all(&db2).unwrap();

        fs::write(db1.join("mapping.idx"), "1abc_A 1abc_A\n1abc_A 2abc_A\n\n").unwrap();
        fs::write(db1.join("chain.idx"), "1abc A B\n2abc A\n").unwrap();
        fs::write(
            db1.join("attr.idx"),
            "1abc\t{\"resolution\": 2.0}\n2abc\tnot-json\n",
        )
        .unwrap();
        // no attr.idx in db2
        fs::write(db2.join("mapping.idx"), "3abc_A 2abc_A\n").unwrap();
        fs::write(db2.join("chain.idx"), "2abc A B\n").unwrap();

        let db = Database::load(&[DbUri::new(&db1), DbUri::new(&db2)]).unwrap();

        assert_eq!(db.resolve("2abc_A"), "3abc_A");
        assert_eq!(db.chain_idx["2abc"], vec!["A", "B"]);
        assert_eq!(db.chain_idx["1abc"], vec!["A", "B"]);
        assert_eq!(db.attr_idx.len(), 1);
        assert_eq!(db.attr_idx["1abc"]["resolution"], 2.0);
        assert_eq!(db.aliases("1abc_A"), &["1abc_A".to_string()]);
        assert_eq!(db.aliases("3abc_A"), &["2abc_A".to_string()]);
        assert!(db.aliases("9zzz_A").is_empty());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let db = Database::load(&[DbUri::new(dir.path())]).unwrap();
        assert!(db.mapping_idx.is_empty());
        assert!(db.chain_idx.is_empty());
        assert!(db.attr_idx.is_empty());
    }

    #[test]
    fn test_read_fasta_idx() {
        let dir = tempdir().unwrap();
        let fasta = dir.path().join("fasta");
        fs::create_dir_all(&fasta).unwrap();
        fs::write(fasta.join("p_0_P.fasta"), ">p_0_P\nSIINFEKL\n").unwrap();
        fs::write(fasta.join("p_1_M.fasta"), ">p_1_M\nGSHSMRY\nFYTSV\n").unwrap();

        let mut mapping = MappingIdx::new();
        mapping.insert("p_0_P".to_string(), "p_0_P".to_string());
        mapping.insert("p_1_M".to_string(), "p_1_M".to_string());
        mapping.insert("p_2_P".to_string(), "p_0_P".to_string());

        let fasta_idx = read_fasta_idx(&DbUri::new(dir.path()), &mapping).unwrap();
        assert_eq!(fasta_idx.len(), 2);
        assert_eq!(fasta_idx["p_0_P"], "SIINFEKL");
        assert_eq!(fasta_idx["p_1_M"], "GSHSMRYFYTSV");

        mapping.insert("p_3_A".to_string(), "p_3_A".to_string());
        assert!(read_fasta_idx(&DbUri::new(dir.path()), &mapping).is_err());
    }

    #[test]
    fn test_malformed_mapping_line() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mapping.idx"), "1abc_A 1abc_A\n1abc_A\n").unwrap();

        let err = Database::load(&[DbUri::new(dir.path())]).unwrap_err();
        match err {
            Error::Index { line, .. } => assert_eq!(line, 2),
            e => panic!("unexpected error: {}", e),
        }
    }
}
