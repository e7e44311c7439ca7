//! Composite identifiers: `base[_chain][/start-end,start-end]`.
//!
//! ```
//! use cxmsa::libs::pid::Pid;
//!
//! let pid: Pid = "101m_A/1-5,106-109".parse().unwrap();
//! assert_eq!(pid.base, "101m");
//! assert_eq!(pid.chain.as_deref(), Some("A"));
//! assert_eq!(pid.domains, vec![(1, 5), (106, 109)]);
//! assert_eq!(pid.key(), "101m_A");
//! assert_eq!(pid.to_string(), "101m_A/1-5,106-109");
//! ```
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Pid {
    pub base: String,
    pub chain: Option<String>,
    /// 1-based, inclusive
    pub domains: Vec<(usize, usize)>,
}

impl Pid {
    pub fn new(base: &str, chain: Option<&str>) -> Self {
        Self {
            base: base.to_string(),
            chain: chain.filter(|c| !c.is_empty()).map(|c| c.to_string()),
            domains: vec![],
        }
    }

    pub fn with_domains(mut self, domains: Vec<(usize, usize)>) -> Self {
        self.domains = domains;
        self
    }

    /// `base_chain`, or `base` for a chainless identifier. Domains are dropped.
    pub fn key(&self) -> String {
        compose(&self.base, self.chain.as_deref())
    }

    pub fn chain_str(&self) -> &str {
        self.chain.as_deref().unwrap_or("")
    }
}

/// ```
/// assert_eq!(cxmsa::libs::pid::compose("1abc", Some("B")), "1abc_B");
/// assert_eq!(cxmsa::libs::pid::compose("1abc", Some("")), "1abc");
/// assert_eq!(cxmsa::libs::pid::compose("1abc", None), "1abc");
/// ```
pub fn compose(base: &str, chain: Option<&str>) -> String {
    match chain {
        Some(c) if !c.is_empty() => format!("{}_{}", base, c),
        _ => base.to_string(),
    }
}

/// Splits `base_chain` at the last underscore.
pub fn decompose(pid: &str) -> (&str, Option<&str>) {
    match pid.rfind('_') {
        Some(k) if k + 1 < pid.len() => (&pid[..k], Some(&pid[k + 1..])),
        Some(k) => (&pid[..k], None),
        None => (pid, None),
    }
}

/// ```
/// let text = cxmsa::libs::pid::join_domains(&[(1, 5), (106, 109)]);
/// assert_eq!(text, "1-5,106-109");
/// ```
pub fn join_domains(domains: &[(usize, usize)]) -> String {
    domains
        .iter()
        .map(|(s, e)| format!("{}-{}", s, e))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_domains(text: &str) -> anyhow::Result<Vec<(usize, usize)>> {
    let mut domains = vec![];
    for part in text.split(',').filter(|s| !s.is_empty()) {
        let (s, e) = part
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid domain range: {}", part))?;
        let s: usize = s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid domain start: {}", part))?;
        let e: usize = e
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid domain end: {}", part))?;
        if s == 0 || e < s {
            anyhow::bail!("Invalid domain range: {}", part);
        }
        domains.push((s, e));
    }
    Ok(domains)
}

impl FromStr for Pid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, domains) = match s.split_once('/') {
            Some((head, text)) => (head, split_domains(text)?),
            None => (s, vec![]),
        };
        if head.is_empty() {
            anyhow::bail!("Empty identifier: {}", s);
        }

        let (base, chain) = decompose(head);
        Ok(Pid::new(base, chain).with_domains(domains))
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if !self.domains.is_empty() {
            write!(f, "/{}", join_domains(&self.domains))?;
        }
        Ok(())
    }
}
