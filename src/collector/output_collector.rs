use crate::config::CollectionConfig;
use crate::error::{EdentityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, BufReader, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    EsvTable,
    SummaryReport,
    MultiqcReport,
    EsvSequences,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::EsvTable => "ESV table",
            ArtifactKind::SummaryReport => "summary report",
            ArtifactKind::MultiqcReport => "multiqc report",
            ArtifactKind::EsvSequences => "fasta sequences",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the pipeline leaves its results for one project, relative to the
/// job working directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    project_name: String,
    report_dir: PathBuf,
    fasta_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(config: &CollectionConfig, project_name: &str) -> Self {
        let results_dir = PathBuf::from(&config.results_dir);
        Self {
            project_name: project_name.to_string(),
            report_dir: results_dir.join(&config.report_dir),
            fasta_dir: results_dir.join(&config.fasta_dir),
        }
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    pub fn expected_path(&self, kind: ArtifactKind) -> PathBuf {
        let p = &self.project_name;
        match kind {
            ArtifactKind::EsvTable => self.report_dir.join(format!("{}_ESV_table.tsv", p)),
            ArtifactKind::SummaryReport => self.report_dir.join(format!("{}_summary_report.tsv", p)),
            ArtifactKind::MultiqcReport => self
                .report_dir
                .join(format!("{}_multiqc_reports", p))
                .join(format!("{}_multiqc_report.html", p)),
            ArtifactKind::EsvSequences => self.fasta_dir.join(format!("{}_esv_sequences.fasta", p)),
        }
    }
}

/// Caller-chosen destination for every collected output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDestinations {
    pub esv_table: PathBuf,
    pub summary_report: PathBuf,
    pub multiqc_report: PathBuf,
    pub esv_sequences: PathBuf,
    pub json_reports: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub kind: ArtifactKind,
    /// Relative to the job working directory.
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBundle {
    /// Relative to the job working directory.
    pub source_dir: PathBuf,
    pub extension: String,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct OutputArtifactMap {
    entries: Vec<ArtifactEntry>,
    reports: Option<ReportBundle>,
}

impl OutputArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four result files in the order they are collected, plus the JSON
    /// report bundle.
    pub fn standard(
        layout: &OutputLayout,
        config: &CollectionConfig,
        destinations: &ArtifactDestinations,
    ) -> Self {
        Self::new()
            .with_artifact(
                ArtifactKind::EsvTable,
                layout.expected_path(ArtifactKind::EsvTable),
                &destinations.esv_table,
            )
            .with_artifact(
                ArtifactKind::SummaryReport,
                layout.expected_path(ArtifactKind::SummaryReport),
                &destinations.summary_report,
            )
            .with_artifact(
                ArtifactKind::MultiqcReport,
                layout.expected_path(ArtifactKind::MultiqcReport),
                &destinations.multiqc_report,
            )
            .with_artifact(
                ArtifactKind::EsvSequences,
                layout.expected_path(ArtifactKind::EsvSequences),
                &destinations.esv_sequences,
            )
            .with_report_bundle(ReportBundle {
                source_dir: layout.report_dir().to_path_buf(),
                extension: config.report_extension.clone(),
                destination: destinations.json_reports.clone(),
            })
    }

    pub fn with_artifact<S: Into<PathBuf>, D: Into<PathBuf>>(
        mut self,
        kind: ArtifactKind,
        source: S,
        destination: D,
    ) -> Self {
        self.entries.push(ArtifactEntry {
            kind,
            source: source.into(),
            destination: destination.into(),
        });
        self
    }

    pub fn with_report_bundle(mut self, bundle: ReportBundle) -> Self {
        self.reports = Some(bundle);
        self
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    pub fn report_bundle(&self) -> Option<&ReportBundle> {
        self.reports.as_ref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovedArtifact {
    pub kind: ArtifactKind,
    pub destination: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub moved: Vec<MovedArtifact>,
    pub archived_reports: Vec<String>,
    pub report_archive: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct OutputCollector;

impl OutputCollector {
    pub fn new() -> Self {
        Self
    }

    /// Moves every mapped artifact out of `job_work_dir` and writes the report
    /// bundle. Stops at the first missing file; moves already done are kept.
    pub fn collect(&self, job_work_dir: &Path, artifact_map: &OutputArtifactMap) -> Result<CollectionSummary> {
        let mut summary = CollectionSummary::default();

        for entry in artifact_map.entries() {
            let source = job_work_dir.join(&entry.source);
            if !source.is_file() {
                return Err(EdentityError::MissingOutput {
                    artifact: entry.kind.label().to_string(),
                    path: source.display().to_string(),
                });
            }

            let size = fs::metadata(&source)?.len();
            move_file(&source, &entry.destination)?;

            summary.moved.push(MovedArtifact {
                kind: entry.kind,
                destination: entry.destination.clone(),
                size,
            });
        }

        if let Some(bundle) = artifact_map.report_bundle() {
            let source_dir = job_work_dir.join(&bundle.source_dir);
            summary.archived_reports =
                write_report_archive(&source_dir, &bundle.extension, &bundle.destination)?;
            summary.report_archive = Some(bundle.destination.clone());
        }

        Ok(summary)
    }
}

/// Renames `source` to `destination`, falling back to copy and delete when
/// the two are on different filesystems.
pub fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    fs::copy(source, destination)?;
    if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_mtime(destination, filetime::FileTime::from_system_time(modified));
    }
    fs::remove_file(source)?;

    Ok(())
}

/// Zips every `*.extension` file directly inside `source_dir` into
/// `destination`, storing each under its file name. Returns the entry names.
pub fn write_report_archive(source_dir: &Path, extension: &str, destination: &Path) -> Result<Vec<String>> {
    if !source_dir.is_dir() {
        return Err(EdentityError::MissingOutput {
            artifact: "report directory".to_string(),
            path: source_dir.display().to_string(),
        });
    }

    // Keyed by entry name: sorted output, and a repeated name keeps the last file.
    let mut reports: BTreeMap<String, PathBuf> = BTreeMap::new();
    let suffix = format!(".{}", extension);
    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(&suffix) {
                reports.insert(name.to_string(), path);
            }
        }
    }

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let temp = tempfile::NamedTempFile::new_in(&parent)?;
    let file = write_zip(temp.reopen()?, &reports)?;
    file.sync_all()?;
    temp.persist(destination).map_err(|e| EdentityError::Io(e.error))?;

    Ok(reports.into_keys().collect())
}

fn write_zip<W: Write + Seek>(writer: W, reports: &BTreeMap<String, PathBuf>) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in reports {
        zip.start_file(name.as_str(), options)?;
        let mut reader = BufReader::new(fs::File::open(path)?);
        io::copy(&mut reader, &mut zip)?;
    }

    Ok(zip.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::ZipArchive;

    const PROJECT: &str = "proj";

    fn layout() -> OutputLayout {
        OutputLayout::new(&CollectionConfig::default(), PROJECT)
    }

    fn destinations(dir: &Path) -> ArtifactDestinations {
        ArtifactDestinations {
            esv_table: dir.join("esv_table.tsv"),
            summary_report: dir.join("summary.tsv"),
            multiqc_report: dir.join("multiqc.html"),
            esv_sequences: dir.join("esv.fasta"),
            json_reports: dir.join("reports.zip"),
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn populate_work_dir(work_dir: &Path) {
        let layout = layout();
        write(&work_dir.join(layout.expected_path(ArtifactKind::EsvTable)), "esv\tcount\n");
        write(&work_dir.join(layout.expected_path(ArtifactKind::SummaryReport)), "summary\n");
        write(&work_dir.join(layout.expected_path(ArtifactKind::MultiqcReport)), "<html/>");
        write(&work_dir.join(layout.expected_path(ArtifactKind::EsvSequences)), ">esv1\nACGT\n");
        write(&work_dir.join("Results/report/sampleA.json"), "{\"a\":1}");
        write(&work_dir.join("Results/report/sampleB.json"), "{\"b\":2}");
    }

    #[test]
    fn test_expected_layout() {
        let layout = layout();
        assert_eq!(
            layout.expected_path(ArtifactKind::EsvTable),
            PathBuf::from("Results/report/proj_ESV_table.tsv")
        );
        assert_eq!(
            layout.expected_path(ArtifactKind::MultiqcReport),
            PathBuf::from("Results/report/proj_multiqc_reports/proj_multiqc_report.html")
        );
        assert_eq!(
            layout.expected_path(ArtifactKind::EsvSequences),
            PathBuf::from("Results/ESVs_fasta/proj_esv_sequences.fasta")
        );
        assert_eq!(layout.report_dir(), Path::new("Results/report"));
    }

    #[test]
    fn test_collects_all_outputs() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        populate_work_dir(work.path());
        let dest = destinations(out.path());

        let map = OutputArtifactMap::standard(&layout(), &CollectionConfig::default(), &dest);
        let summary = OutputCollector::new().collect(work.path(), &map).unwrap();

        assert_eq!(summary.moved.len(), 4);
        assert_eq!(fs::read_to_string(&dest.esv_table).unwrap(), "esv\tcount\n");
        assert_eq!(fs::read_to_string(&dest.esv_sequences).unwrap(), ">esv1\nACGT\n");
        assert!(dest.multiqc_report.is_file());
        assert!(!work
            .path()
            .join(layout().expected_path(ArtifactKind::EsvTable))
            .exists());

        assert_eq!(summary.archived_reports, vec!["sampleA.json", "sampleB.json"]);
        let mut archive = ZipArchive::new(fs::File::open(&dest.json_reports).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        io::Read::read_to_string(&mut archive.by_name("sampleB.json").unwrap(), &mut content).unwrap();
        assert_eq!(content, "{\"b\":2}");
    }

    #[test]
    fn test_missing_esv_table() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        populate_work_dir(work.path());
        fs::remove_file(work.path().join(layout().expected_path(ArtifactKind::EsvTable))).unwrap();
        let dest = destinations(out.path());

        let map = OutputArtifactMap::standard(&layout(), &CollectionConfig::default(), &dest);
        match OutputCollector::new().collect(work.path(), &map) {
            Err(EdentityError::MissingOutput { artifact, .. }) => assert_eq!(artifact, "ESV table"),
            other => panic!("expected MissingOutput, got {:?}", other),
        }
        assert!(!dest.summary_report.exists());
    }

    #[test]
    fn test_partial_moves_are_kept() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        populate_work_dir(work.path());
        fs::remove_file(work.path().join(layout().expected_path(ArtifactKind::MultiqcReport))).unwrap();
        let dest = destinations(out.path());

        let map = OutputArtifactMap::standard(&layout(), &CollectionConfig::default(), &dest);
        let result = OutputCollector::new().collect(work.path(), &map);

        assert!(matches!(result, Err(EdentityError::MissingOutput { .. })));
        assert!(dest.esv_table.is_file());
        assert!(dest.summary_report.is_file());
        assert!(!dest.esv_sequences.exists());
        assert!(!dest.json_reports.exists());
    }

    #[test]
    fn test_report_archive_skips_other_files() {
        let work = TempDir::new().unwrap();
        let reports = work.path().join("report");
        write(&reports.join("a.json"), "{}");
        write(&reports.join("notes.txt"), "x");
        write(&reports.join("nested/b.json"), "{}");
        let dest = work.path().join("out/reports.zip");

        let names = write_report_archive(&reports, "json", &dest).unwrap();

        assert_eq!(names, vec!["a.json"]);
        let archive = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_report_archive_matches_file_name_suffix() {
        let work = TempDir::new().unwrap();
        let reports = work.path().join("report");
        write(&reports.join(".json"), "{}");
        write(&reports.join("s1.json"), "{}");
        write(&reports.join("s1.json.bak"), "{}");
        write(&reports.join("json"), "{}");
        let dest = work.path().join("reports.zip");

        let names = write_report_archive(&reports, "json", &dest).unwrap();

        assert_eq!(names, vec![".json", "s1.json"]);
        let mut archive = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
        assert!(archive.by_name(".json").is_ok());
    }

    #[test]
    fn test_empty_report_archive() {
        let work = TempDir::new().unwrap();
        let reports = work.path().join("report");
        fs::create_dir_all(&reports).unwrap();
        let dest = work.path().join("reports.zip");

        let names = write_report_archive(&reports, "json", &dest).unwrap();

        assert!(names.is_empty());
        let archive = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_missing_report_directory() {
        let work = TempDir::new().unwrap();
        let result = write_report_archive(&work.path().join("nope"), "json", &work.path().join("r.zip"));
        assert!(matches!(result, Err(EdentityError::MissingOutput { .. })));
    }

    #[test]
    fn test_move_file_creates_parent() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.tsv");
        fs::write(&source, "data").unwrap();
        let dest = temp.path().join("deep/dir/b.tsv");

        move_file(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(dest).unwrap(), "data");
    }
}
