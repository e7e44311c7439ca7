//! Subcommand modules for the `cxmsa` binary.

pub mod a3m_filter;
pub mod align_complex;
pub mod align_peptide;
pub mod csv_to_fasta;
pub mod mhc_preprocess;
pub mod split_data;
