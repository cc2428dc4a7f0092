use crate::collector::ArtifactDestinations;
use crate::error::{EdentityError, Result};
use crate::pipeline::{PipelineJobSpec, PipelineParam};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the caller supplies for one job: the input archive, the tool
/// settings, and where each output should end up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub project_name: String,
    pub archive: PathBuf,
    /// Tool settings without the two directory arguments, which depend on
    /// where the job runs.
    pub settings: PipelineJobSpec,
    pub destinations: ArtifactDestinations,
}

impl JobRequest {
    pub fn new<P: Into<PathBuf>>(
        project_name: &str,
        archive: P,
        settings: PipelineJobSpec,
        destinations: ArtifactDestinations,
    ) -> Result<Self> {
        validate_project_name(project_name)?;

        let archive = archive.into();
        validate_archive_path(&archive.to_string_lossy()).map_err(|message| {
            EdentityError::InvalidArgument { message }
        })?;

        Ok(Self {
            project_name: project_name.to_string(),
            archive,
            settings,
            destinations,
        })
    }

    /// Pipeline working directory for this job.
    pub fn work_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.project_name)
    }

    pub fn pipeline_spec(&self, staging_dir: &Path, work_dir: &Path) -> PipelineJobSpec {
        self.settings
            .clone()
            .with(PipelineParam::RawDataDir, staging_dir.display())
            .with(PipelineParam::WorkDir, work_dir.display())
    }
}

/// The project name becomes a directory and part of every output file name.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EdentityError::InvalidArgument {
            message: "project name must not be empty".to_string(),
        });
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(EdentityError::InvalidArgument {
            message: format!("project name {:?} must be a single path component", name),
        });
    }
    Ok(())
}

pub fn validate_archive_path(s: &str) -> std::result::Result<String, String> {
    if s.contains(' ') {
        return Err("the ZIP filename must not contain space character(s)".to_string());
    }
    Ok(s.to_string())
}
