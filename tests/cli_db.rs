use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

fn write_target(dir: &std::path::Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir.join("fasta"))?;
    fs::write(dir.join("fasta/pdb_0_P.fasta"), ">pdb_0_P\nSIINFEKL\n")?;
    fs::write(dir.join("mapping.idx"), "pdb_0_P\tpdb_0_P\n")?;
    fs::write(dir.join("attr.idx"), "pdb_0\t{\"label\": [1.0, 0.0]}\n")?;
    Ok(())
}

#[test]
fn command_csv_to_fasta() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let target = temp.path().join("target");
    let output = temp.path().join("output");
    write_target(&target)?;

    let csv = temp.path().join("in.csv");
    fs::write(
        &csv,
        "Antigen,MHC_str,a_seq,b_seq,y,HLA\n\
         SIINFEKL,GSHSMRY,CAVR,CASS,1,HLA-A*02:01\n\
         GILGFVFT,GSHSMRY,nan,,0,HLA-A*02:01\n",
    )?;

    let mut cmd = Command::cargo_bin("cxmsa")?;
    cmd.arg("csv-to-fasta")
        .arg(&csv)
        .arg("--target-uri")
        .arg(&target)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    // the known peptide is aliased, new sequences are written once
    let mapping = fs::read_to_string(output.join("mapping.idx"))?;
    let lines: Vec<&str> = mapping.lines().collect();
    assert_eq!(
        lines,
        vec![
            "pdb_0_P\tpdb_0_P",
            "pdb_0_P\ttcr_pmhc_0_P",
            "tcr_pmhc_0_M\ttcr_pmhc_0_M",
            "tcr_pmhc_0_A\ttcr_pmhc_0_A",
            "tcr_pmhc_0_B\ttcr_pmhc_0_B",
            "tcr_pmhc_1_P\ttcr_pmhc_1_P",
            "tcr_pmhc_0_M\ttcr_pmhc_1_M",
        ]
    );
    assert_eq!(
        fs::read_to_string(output.join("fasta/tcr_pmhc_1_P.fasta"))?,
        ">tcr_pmhc_1_P\nGILGFVFT\n"
    );
    assert!(!output.join("fasta/tcr_pmhc_1_A.fasta").exists());

    let attr = fs::read_to_string(output.join("attr.idx"))?;
    let lines: Vec<&str> = attr.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("pdb_0\t"));

    let (pid, json) = lines[1].split_once('\t').unwrap();
    assert_eq!(pid, "tcr_pmhc_0");
    let v: serde_json::Value = serde_json::from_str(json)?;
    assert_eq!(v["label"], serde_json::json!([1.0, 1.0]));
    assert_eq!(v["label_mask"], serde_json::json!([true, true]));
    assert_eq!(v["MHC"], "HLA-A*02:01");

    let (_, json) = lines[2].split_once('\t').unwrap();
    let v: serde_json::Value = serde_json::from_str(json)?;
    assert_eq!(v["label"], serde_json::json!([0.0, 0.0]));
    assert_eq!(v["label_mask"], serde_json::json!([true, false]));

    Ok(())
}

#[test]
fn command_csv_to_fasta_no_label() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let csv = temp.path().join("in.csv");
    fs::write(&csv, "Peptide,Allele\nSIINFEKL,H-2-Kb\n")?;

    let mut cmd = Command::cargo_bin("cxmsa")?;
    cmd.arg("csv-to-fasta")
        .arg(&csv)
        .arg("--target-uri")
        .arg(temp.path().join("empty"))
        .arg("-o")
        .arg(temp.path().join("out"))
        .assert()
        .failure();

    let mut cmd = Command::cargo_bin("cxmsa")?;
    cmd.arg("csv-to-fasta")
        .arg(&csv)
        .arg("--target-uri")
        .arg(temp.path().join("empty"))
        .arg("--default-y")
        .arg("1.0")
        .arg("--pid-prefix")
        .arg("pmhc_")
        .arg("--start-idx")
        .arg("7")
        .arg("-o")
        .arg(temp.path().join("out"))
        .assert()
        .success();

    let attr = fs::read_to_string(temp.path().join("out/attr.idx"))?;
    let (pid, json) = attr.trim_end().split_once('\t').unwrap();
    assert_eq!(pid, "pmhc_7");
    let v: serde_json::Value = serde_json::from_str(json)?;
    assert_eq!(v["label"], serde_json::json!([0.0, 0.0]));
    assert_eq!(v["MHC"], "H-2-Kb");

    Ok(())
}

#[test]
fn command_mhc_preprocess() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let seq_file = temp.path().join("hla.csv");
    let csv = temp.path().join("in.csv");
    fs::write(
        &seq_file,
        "name,sqe\nHLA-A*02:01:01,GSHSMRY\nHLA-A*02:01:02,GSHSMRF\nHLA-B*07:02,GSHSMRB\n",
    )?;
    fs::write(
        &csv,
        "Allele,Peptide\nHLA-A0201,SIINFEKL\nHLA-A02,GILGFVFT\nHLA-C0101,NLVPMVATV\n",
    )?;

    let mut cmd = Command::cargo_bin("cxmsa")?;
    let output = cmd
        .arg("mhc-preprocess")
        .arg(&csv)
        .arg("--mhc-seq-file")
        .arg(&seq_file)
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(
        stdout,
        "Antigen,a_seq,b_seq,MHC_str\nSIINFEKL,,,GSHSMRY\nGILGFVFT,,,GSHSMRY\n"
    );

    let mut cmd = Command::cargo_bin("cxmsa")?;
    let output = cmd
        .arg("mhc-preprocess")
        .arg("stdin")
        .arg("--mhc-seq-file")
        .arg(&seq_file)
        .write_stdin("Peptide,Allele\nNLVPMVATV,HLA-B07\n")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout, "Antigen,a_seq,b_seq,MHC_str\nNLVPMVATV,,,GSHSMRB\n");

    Ok(())
}

#[test]
fn command_split_data() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let target = temp.path();
    fs::create_dir_all(target.join("fasta"))?;
    fs::write(target.join("fasta/c_0_P.fasta"), ">c_0_P\nSIINFEKL\n")?;
    fs::write(target.join("fasta/c_1_P.fasta"), ">c_1_P\nGILGFVFT\n")?;
    fs::write(
        target.join("mapping.idx"),
        "c_0_P\tc_0_P\nc_1_P\tc_1_P\nc_0_P\tc_2_P\nc_0_M\tc_0_M\n",
    )?;
    fs::write(target.join("chain.idx"), "c_0 P M\nc_1 P\nc_2 P\nc_3 M\n")?;
    let clusters = target.join("clusters.csv");
    fs::write(&clusters, "Antigen,Cluster\nSIINFEKL,k1\nGILGFVFT,k2\n")?;

    // all clusters in the test set
    let mut cmd = Command::cargo_bin("cxmsa")?;
    let output = cmd
        .arg("split-data")
        .arg(&clusters)
        .arg("--target-uri")
        .arg(target)
        .arg("--test-ratio")
        .arg("1.0")
        .arg("--seed")
        .arg("42")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(
        stdout,
        "split_data\tc_0 P M\ttest\tk1\n\
         split_data\tc_1 P\ttest\tk2\n\
         split_data\tc_2 P\ttest\tk1\n\
         split_data\tc_3 M\ttrain\n"
    );
    let cluster_idx = fs::read_to_string(target.join("cluster.idx"))?;
    assert_eq!(cluster_idx, "SIINFEKL,k1,test\nGILGFVFT,k2,test\n");

    // none
    let mut cmd = Command::cargo_bin("cxmsa")?;
    let output = cmd
        .arg("split-data")
        .arg(&clusters)
        .arg("--target-uri")
        .arg(target)
        .arg("--test-ratio")
        .arg("0")
        .output()?;
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.matches("\ttrain\n").count(), 4);

    Ok(())
}
