//! Integration tests for the edentity-galaxy binary.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn galaxy_cmd() -> Command {
    cargo_bin_cmd!("edentity-galaxy")
}

fn job_args(archive: &Path, out: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "--project_name", "proj",
        "--dataType", "Illumina",
        "--n_max", "0",
        "--average_qual", "25",
        "--length_required", "100",
        "--fastq_maxdiffpct", "100",
        "--fastq_maxdiff", "10",
        "--fastq_minovlen", "50",
        "--forward_primer", "GGWACWGGWTGAACWGTWTAYCCYCC",
        "--reverse_primer", "TANACYTCNGGRTGNCCRAARAAYCA",
        "--discard_untrimmed", "false",
        "--minlen", "200",
        "--maxlen", "500",
        "--maxee", "1",
        "--fasta_width", "0",
        "--alpha", "5",
        "--minsize", "4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push("--input_fastqs".to_string());
    args.push(archive.display().to_string());
    for (flag, name) in [
        ("--ESV_table_output", "esv.tsv"),
        ("--ESV_sequences", "esv.fasta"),
        ("--summary_report", "summary.tsv"),
        ("--multiqc_report", "multiqc.html"),
        ("--json_reports", "reports.zip"),
    ] {
        args.push(flag.to_string());
        args.push(out.join(name).display().to_string());
    }
    args
}

fn write_zip(path: &Path, entries: &[&str]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for name in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(b"@r\nACGT\n+\nIIII\n").unwrap();
    }
    zip.finish().unwrap();
}

#[cfg(unix)]
fn write_fake_edentity(dir: &Path, tail: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --work_dir) work="$2"; shift 2 ;;
    --raw_data_dir) raw="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$work/Results/report/proj_multiqc_reports" "$work/Results/ESVs_fasta"
ls "$raw" > "$work/Results/report/proj_ESV_table.tsv"
echo summary > "$work/Results/report/proj_summary_report.tsv"
echo '<html/>' > "$work/Results/report/proj_multiqc_reports/proj_multiqc_report.html"
printf '>esv1\nACGT\n' > "$work/Results/ESVs_fasta/proj_esv_sequences.fasta"
echo '{{}}' > "$work/Results/report/s1.json"
{}
"#,
        tail
    );

    let path = dir.join("fake-edentity");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_version_flag() {
    galaxy_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("edentity-galaxy"));
}

#[test]
fn test_help_flag() {
    galaxy_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input_fastqs"))
        .stdout(predicate::str::contains("--ESV_table_output"));
}

#[test]
fn test_generate_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("galaxy.toml");

    galaxy_cmd()
        .arg("--generate-config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(&config).unwrap();
    assert!(content.contains("executable = \"edentity\""));
}

#[test]
fn test_archive_name_with_space_rejected() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("my reads.zip");
    write_zip(&archive, &["a.fastq"]);

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("must not contain space"));

    assert!(!temp.path().join("input_data").exists());
}

#[test]
fn test_missing_required_flag() {
    galaxy_cmd()
        .args(["--project_name", "proj"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_dry_run_prints_command_line() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .args(["--dry-run", "--anchored", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("edentity --raw_data_dir"))
        .stdout(predicate::str::contains("--anchoring --n_base_limit 0"))
        .stdout(predicate::str::contains("--discard_untrimmed").not());

    assert!(!temp.path().join("input_data").exists());
}

#[test]
fn test_mixed_locations_exit_code() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");
    write_zip(&archive, &["a/s1.fastq.gz", "b/s2.fastq.gz"]);

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .arg("--quiet")
        .assert()
        .failure()
        .code(6)
        .stderr(predicate::str::contains("different locations"));

    assert!(!temp.path().join("input_data").exists());
}

#[test]
fn test_invalid_archive_exit_code() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");
    fs::write(&archive, "not a zip").unwrap();

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .arg("--quiet")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_missing_executable_exit_code() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");
    write_zip(&archive, &["s1_R1.fastq", "s1_R2.fastq"]);

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .args(["--executable", "/nonexistent/edentity", "--quiet"])
        .assert()
        .failure()
        .code(8);

    assert!(temp.path().join("input_data/s1_R1.fastq").is_file());
}

#[test]
fn test_missing_outputs_exit_code() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");
    write_zip(&archive, &["s1_R1.fastq"]);

    // `true` exits 0 without producing anything.
    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .args(["--executable", "true", "--quiet"])
        .arg("--job-report")
        .arg(temp.path().join("job.json"))
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("ESV table"));

    let report = fs::read_to_string(temp.path().join("job.json")).unwrap();
    assert!(report.contains("\"state\": \"invoked\""));
}

#[cfg(unix)]
#[test]
fn test_relative_base_dir() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    fs::create_dir(&out).unwrap();
    let archive = temp.path().join("reads.zip");
    write_zip(&archive, &["s1_R1.fastq"]);
    let tool = write_fake_edentity(temp.path(), "exit 0");

    galaxy_cmd()
        .current_dir(temp.path())
        .args(job_args(&archive, &out))
        .args(["--base-dir", "job", "--quiet"])
        .arg("--executable")
        .arg(&tool)
        .assert()
        .success();

    assert!(temp.path().join("job/input_data/s1_R1.fastq").is_file());
    assert!(!temp.path().join("job/job").exists());
    assert_eq!(fs::read_to_string(out.join("esv.tsv")).unwrap(), "s1_R1.fastq\n");
    assert!(out.join("reports.zip").is_file());
}

#[cfg(unix)]
#[test]
fn test_json_mode_keeps_pipeline_errors_off_stdout() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("reads.zip");
    write_zip(&archive, &["s1_R1.fastq"]);
    let tool = write_fake_edentity(temp.path(), "echo DENOISE_FAILED >&2\nexit 1");

    galaxy_cmd()
        .args(job_args(&archive, temp.path()))
        .arg("--base-dir")
        .arg(temp.path())
        .args(["--output-format", "json", "--on-tool-failure", "abort"])
        .arg("--executable")
        .arg(&tool)
        .assert()
        .failure()
        .code(9)
        .stderr(predicate::str::contains("DENOISE_FAILED"))
        .stderr(predicate::str::contains("\"level\":\"error\""))
        .stdout(predicate::str::contains("DENOISE_FAILED").not())
        .stdout(predicate::str::contains("\"level\":\"error\"").not());
}
