use crate::libs::db::{resolve, DbUri, MappingIdx};
use crate::libs::error::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

/// An alignment block: ordered rows, the first one is the query.
///
/// ```
/// use cxmsa::libs::a3m::A3m;
///
/// let a3m = A3m::parse(">101m_A mol:protein\nMVLS\nEGEW\n\n>2abc_A/1-8\n--LSEGew\n");
/// assert_eq!(a3m.len(), 2);
/// assert_eq!(a3m.query(), Some(("MVLSEGEW", "101m_A mol:protein")));
/// assert_eq!(a3m.seqs[1], "--LSEGew");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct A3m {
    pub seqs: Vec<String>,
    pub descs: Vec<String>,
}

impl A3m {
    /// Multi-line sequences are joined, blank lines ignored.
    /// Lines before the first header are dropped.
    pub fn parse(text: &str) -> Self {
        let mut a3m = A3m::default();
        for line in text.lines() {
            let line = line.trim();
            if let Some(desc) = line.strip_prefix('>') {
                a3m.descs.push(desc.to_string());
                a3m.seqs.push(String::new());
            } else if line.is_empty() {
                continue;
            } else if let Some(seq) = a3m.seqs.last_mut() {
                seq.push_str(line);
            }
        }
        a3m
    }

    pub fn push(&mut self, seq: String, desc: String) {
        self.seqs.push(seq);
        self.descs.push(desc);
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// (sequence, description) of the first row
    pub fn query(&self) -> Option<(&str, &str)> {
        self.iter().next()
    }

    /// Rows after the query
    pub fn hits(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().skip(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.seqs
            .iter()
            .zip(self.descs.iter())
            .map(|(s, d)| (s.as_str(), d.as_str()))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for (seq, desc) in self.iter() {
            writer.write_all(format!(">{}\n{}\n", desc, seq).as_ref())?;
        }
        Ok(())
    }
}

/// `<a3m_dir>/<pid>/msas/<pid>.a3m`
pub fn a3m_path(uri: &DbUri, pid: &str) -> PathBuf {
    uri.a3m_dir_path()
        .join(pid)
        .join("msas")
        .join(format!("{}.a3m", pid))
}

/// Loads the alignment block of `pid` after resolving it through the aliasing index.
pub fn read_a3m(uri: &DbUri, mapping_idx: &MappingIdx, pid: &str) -> Result<A3m> {
    let pid = resolve(mapping_idx, pid);
    let path = a3m_path(uri, pid);
    if !path.is_file() {
        return Err(Error::MissingAlignment {
            pid: pid.to_string(),
            path,
        });
    }

    let a3m = A3m::parse(&crate::read_text(&path)?);
    if a3m.is_empty() {
        return Err(Error::EmptyAlignment(path));
    }
    Ok(a3m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_skips_preamble() {
        let a3m = A3m::parse("#A3M#\n>q\nAC\n>h1\nA-\n");
        assert_eq!(a3m.descs, vec!["q", "h1"]);
        assert_eq!(a3m.hits().collect::<Vec<_>>(), vec![("A-", "h1")]);
    }

    #[test]
    fn test_write() {
        let mut a3m = A3m::default();
        a3m.push("ACDE".to_string(), "q".to_string());
        a3m.push("-CD-".to_string(), "h1_A".to_string());

        let mut out = vec![];
        a3m.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">q\nACDE\n>h1_A\n-CD-\n");
    }

    #[test]
    fn test_read_a3m_resolves_alias() {
        let dir = tempdir().unwrap();
        let uri = DbUri::new(dir.path());
        let msas = dir.path().join("a3m").join("T1_A").join("msas");
        fs::create_dir_all(&msas).unwrap();
        fs::write(msas.join("T1_A.a3m"), ">T1_A\nACDEF\n>H1_A/1-5\nACDEF\n").unwrap();

        let mut mapping = MappingIdx::new();
        mapping.insert("T2_A".to_string(), "T1_A".to_string());

        let a3m = read_a3m(&uri, &mapping, "T2_A").unwrap();
        assert_eq!(a3m.len(), 2);
        assert_eq!(a3m.query(), Some(("ACDEF", "T1_A")));

        let a3m = read_a3m(&uri, &mapping, "T1_A").unwrap();
        assert_eq!(a3m.len(), 2);
    }

    #[test]
    fn test_read_a3m_missing() {
        let dir = tempdir().unwrap();
        let uri = DbUri::new(dir.path());

        match read_a3m(&uri, &MappingIdx::new(), "T9_A") {
            Err(Error::MissingAlignment { pid, path }) => {
                assert_eq!(pid, "T9_A");
                assert!(path.ends_with("a3m/T9_A/msas/T9_A.a3m"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
