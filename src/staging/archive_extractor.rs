use crate::config::{CollisionPolicy, StagingConfig};
use crate::error::{EdentityError, Result};
use crate::staging::read_filter::{base_name, ReadFileFilter};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;
use zip::ZipArchive;

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub current_file: Option<String>,
    pub start_time: Instant,
}

impl ExtractionProgress {
    pub fn new(total_files: usize, total_bytes: u64) -> Self {
        Self {
            files_processed: 0,
            total_files,
            bytes_processed: 0,
            total_bytes,
            current_file: None,
            start_time: Instant::now(),
        }
    }

    pub fn update_file(&mut self, filename: String, bytes: u64) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(filename);
    }

    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A read file selected from the archive, resolved before anything is written.
#[derive(Debug, Clone)]
struct StagedEntry {
    index: usize,
    name: String,
    relative_path: PathBuf,
    size: u64,
}

pub struct ArchiveExtractor {
    filter: ReadFileFilter,
    collision_policy: CollisionPolicy,
}

impl ArchiveExtractor {
    pub fn new(config: &StagingConfig) -> Result<Self> {
        Ok(Self {
            filter: ReadFileFilter::new(config)?,
            collision_policy: config.on_collision,
        })
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Validates `archive_path`, extracts its read files into `dest_dir` and
    /// flattens them to the top level. Returns the archive-relative names of
    /// the staged files in archive order.
    pub fn validate_and_extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<Vec<String>> {
        self.validate_and_extract_with_progress(archive_path, dest_dir, None)
    }

    pub fn validate_and_extract_with_progress(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        progress_callback: Option<&dyn Fn(&ExtractionProgress)>,
    ) -> Result<Vec<String>> {
        let invalid = |reason: String| EdentityError::InvalidArchive {
            path: archive_path.display().to_string(),
            reason,
        };

        let file = fs::File::open(archive_path).map_err(|e| invalid(e.to_string()))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| invalid(e.to_string()))?;

        let entries = self.plan(&mut archive, archive_path)?;
        self.check_collisions(&entries, dest_dir)?;

        if !dest_dir.exists() {
            fs::create_dir_all(dest_dir)?;
        }

        let total_bytes = entries.iter().map(|e| e.size).sum();
        let mut progress = ExtractionProgress::new(entries.len(), total_bytes);

        for entry in &entries {
            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            let bytes = self.extract_entry(&mut archive, entry, dest_dir)?;
            progress.update_file(entry.name.clone(), bytes);
        }

        self.flatten(dest_dir)?;

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Reads the central directory and decides what will be staged. Nothing
    /// is written until this succeeds.
    fn plan<R: io::Read + io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        archive_path: &Path,
    ) -> Result<Vec<StagedEntry>> {
        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| EdentityError::InvalidArchive {
                path: archive_path.display().to_string(),
                reason: format!("failed to read entry {}: {}", i, e),
            })?;
            names.push(entry.name().to_string());
        }

        let selected = self
            .filter
            .select(names.iter().map(String::as_str))
            .map_err(|e| match e {
                EdentityError::NoMatchingFiles { .. } => EdentityError::NoMatchingFiles {
                    path: archive_path.display().to_string(),
                },
                other => other,
            })?;
        let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

        let mut entries = Vec::with_capacity(selected.len());
        for (index, name) in names.iter().enumerate() {
            if !selected.contains(name.as_str()) {
                continue;
            }

            let entry = archive.by_index_raw(index)?;
            let relative_path = entry.enclosed_name().ok_or_else(|| EdentityError::InvalidArchive {
                path: archive_path.display().to_string(),
                reason: format!("entry {} points outside the extraction directory", name),
            })?;

            entries.push(StagedEntry {
                index,
                name: name.clone(),
                relative_path,
                size: entry.size(),
            });
        }

        Ok(entries)
    }

    fn check_collisions(&self, entries: &[StagedEntry], dest_dir: &Path) -> Result<()> {
        if self.collision_policy == CollisionPolicy::Overwrite {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for entry in entries {
            let name = base_name(&entry.name);
            if !seen.insert(name) || dest_dir.join(name).exists() {
                return Err(EdentityError::BasenameCollision {
                    name: name.to_string(),
                });
            }
        }

        Ok(())
    }

    fn extract_entry<R: io::Read + io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        entry: &StagedEntry,
        dest_dir: &Path,
    ) -> Result<u64> {
        let dest_path = dest_dir.join(&entry.relative_path);

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut source = archive.by_index(entry.index)?;
        let dest_file = fs::File::create(&dest_path)?;
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

        let bytes = io::copy(&mut source, &mut writer)?;
        writer.flush()?;

        Ok(bytes)
    }

    /// Moves every file below the top level of `dest_dir` up to it and drops
    /// the directories left empty.
    fn flatten(&self, dest_dir: &Path) -> Result<()> {
        let mut nested = Vec::new();
        for entry in WalkDir::new(dest_dir).min_depth(2).follow_links(false) {
            let entry = entry.map_err(|e| {
                EdentityError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "directory walk failed")
                }))
            })?;
            if entry.file_type().is_file() {
                nested.push(entry.into_path());
            }
        }

        for path in nested {
            if let Some(name) = path.file_name() {
                fs::rename(&path, dest_dir.join(name))?;
            }
        }

        for entry in WalkDir::new(dest_dir)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .flatten()
        {
            if entry.file_type().is_dir() {
                // Only succeeds once the directory is empty.
                let _ = fs::remove_dir(entry.path());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn create_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }

        zip.finish().unwrap();
    }

    fn extractor() -> ArchiveExtractor {
        ArchiveExtractor::new(&StagingConfig::default()).unwrap()
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_extracts_root_level_reads() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(
            &archive,
            &[
                ("sample_R1.fastq.gz", b"@r1\nACGT\n+\nIIII\n"),
                ("sample_R2.fastq.gz", b"@r2\nTGCA\n+\nIIII\n"),
            ],
        );
        let staging = temp.path().join("input_data");

        let names = extractor().validate_and_extract(&archive, &staging).unwrap();

        assert_eq!(names, vec!["sample_R1.fastq.gz", "sample_R2.fastq.gz"]);
        assert_eq!(dir_names(&staging), vec!["sample_R1.fastq.gz", "sample_R2.fastq.gz"]);
        assert_eq!(
            fs::read(staging.join("sample_R1.fastq.gz")).unwrap(),
            b"@r1\nACGT\n+\nIIII\n"
        );
    }

    #[test]
    fn test_flattens_nested_reads() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(
            &archive,
            &[
                ("reads/", b""),
                ("reads/sampleA_R1.fastq.gz", b"a1"),
                ("reads/sampleA_R2.fastq.gz", b"a2"),
                ("reads/checksums.md5", b"xx"),
            ],
        );
        let staging = temp.path().join("input");

        let names = extractor().validate_and_extract(&archive, &staging).unwrap();

        assert_eq!(names, vec!["reads/sampleA_R1.fastq.gz", "reads/sampleA_R2.fastq.gz"]);
        assert!(staging.join("sampleA_R1.fastq.gz").is_file());
        assert!(staging.join("sampleA_R2.fastq.gz").is_file());
        assert!(!staging.join("reads").exists());
        assert!(!staging.join("checksums.md5").exists());
    }

    #[test]
    fn test_flattens_deeply_nested_reads() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("run1/lane2/x.fastq", b"x")]);
        let staging = temp.path().join("input");

        extractor().validate_and_extract(&archive, &staging).unwrap();

        assert_eq!(dir_names(&staging), vec!["x.fastq"]);
    }

    #[test]
    fn test_mixed_locations_extract_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("a/sample1.fastq", b"1"), ("b/sample2.fastq", b"2")]);
        let staging = temp.path().join("input");

        let result = extractor().validate_and_extract(&archive, &staging);

        assert!(matches!(result, Err(EdentityError::MixedLocation { .. })));
        assert!(!staging.exists());
    }

    #[test]
    fn test_illegal_filename_extracts_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("good.fastq", b"g"), ("sample 1.fastq", b"s")]);
        let staging = temp.path().join("input");

        let result = extractor().validate_and_extract(&archive, &staging);

        assert!(matches!(result, Err(EdentityError::IllegalFilename { .. })));
        assert!(!staging.exists());
    }

    #[test]
    fn test_illegal_character_in_directory_extracts_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("my reads/a.fastq", b"a"), ("my reads/b.fastq", b"b")]);
        let staging = temp.path().join("input");

        match extractor().validate_and_extract(&archive, &staging) {
            Err(EdentityError::IllegalFilename { name, character }) => {
                assert_eq!(name, "my reads/a.fastq");
                assert_eq!(character, ' ');
            }
            other => panic!("expected IllegalFilename, got {:?}", other),
        }
        assert!(!staging.exists());
    }

    #[test]
    fn test_no_matching_files() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("README.txt", b"nothing here"), ("data/", b"")]);
        let staging = temp.path().join("input");

        match extractor().validate_and_extract(&archive, &staging) {
            Err(EdentityError::NoMatchingFiles { path }) => assert!(path.ends_with("reads.zip")),
            other => panic!("expected NoMatchingFiles, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let result = extractor().validate_and_extract(&archive, &temp.path().join("input"));
        assert!(matches!(result, Err(EdentityError::InvalidArchive { .. })));

        let missing = temp.path().join("missing.zip");
        let result = extractor().validate_and_extract(&missing, &temp.path().join("input"));
        assert!(matches!(result, Err(EdentityError::InvalidArchive { .. })));
    }

    #[test]
    fn test_rejects_entries_escaping_destination() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("../evil.fastq", b"e")]);
        let staging = temp.path().join("input");

        let result = extractor().validate_and_extract(&archive, &staging);

        assert!(matches!(result, Err(EdentityError::InvalidArchive { .. })));
        assert!(!temp.path().join("evil.fastq").exists());
    }

    #[test]
    fn test_collision_policy() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("reads/a.fastq", b"new")]);
        let staging = temp.path().join("input");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("a.fastq"), b"old").unwrap();

        let result = extractor()
            .with_collision_policy(CollisionPolicy::Reject)
            .validate_and_extract(&archive, &staging);
        assert!(matches!(result, Err(EdentityError::BasenameCollision { .. })));
        assert_eq!(fs::read(staging.join("a.fastq")).unwrap(), b"old");

        extractor().validate_and_extract(&archive, &staging).unwrap();
        assert_eq!(fs::read(staging.join("a.fastq")).unwrap(), b"new");
    }

    #[test]
    fn test_reject_duplicate_entry_basenames() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("input");
        let entry = |index: usize| StagedEntry {
            index,
            name: "reads/a.fastq".to_string(),
            relative_path: PathBuf::from("reads/a.fastq"),
            size: 1,
        };
        let entries = vec![entry(0), entry(1)];

        let result = extractor()
            .with_collision_policy(CollisionPolicy::Reject)
            .check_collisions(&entries, &staging);
        match result {
            Err(EdentityError::BasenameCollision { name }) => assert_eq!(name, "a.fastq"),
            other => panic!("expected BasenameCollision, got {:?}", other),
        }

        assert!(extractor().check_collisions(&entries, &staging).is_ok());
        assert!(extractor()
            .with_collision_policy(CollisionPolicy::Reject)
            .check_collisions(&entries[..1], &staging)
            .is_ok());
    }

    #[test]
    fn test_progress_reporting() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("reads.zip");
        create_test_zip(&archive, &[("a.fastq", b"1234"), ("b.fastq", b"56")]);
        let staging = temp.path().join("input");

        let last = std::cell::RefCell::new(None);
        let callback = |p: &ExtractionProgress| {
            *last.borrow_mut() = Some((p.files_processed, p.bytes_processed, p.percentage()));
        };

        extractor()
            .validate_and_extract_with_progress(&archive, &staging, Some(&callback))
            .unwrap();

        assert_eq!(*last.borrow(), Some((2, 6, 100.0)));
    }
}
