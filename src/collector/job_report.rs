use crate::collector::output_collector::CollectionSummary;
use crate::error::{EdentityError, Result};
use crate::pipeline::{CleanupOutcome, PipelineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lifecycle of one job. States are only ever entered in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Staged,
    Invoked,
    Collected,
    Done,
}

impl JobState {
    pub fn next(self) -> Option<JobState> {
        match self {
            JobState::Pending => Some(JobState::Staged),
            JobState::Staged => Some(JobState::Invoked),
            JobState::Invoked => Some(JobState::Collected),
            JobState::Collected => Some(JobState::Done),
            JobState::Done => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Staged => "staged",
            JobState::Invoked => "invoked",
            JobState::Collected => "collected",
            JobState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub state: JobState,
    pub reached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub status: Option<i32>,
    pub success: bool,
    pub duration: Duration,
    pub transient_cleanup: CleanupOutcome,
}

impl From<&PipelineResult> for PipelineSummary {
    fn from(result: &PipelineResult) -> Self {
        Self {
            status: result.status,
            success: result.success(),
            duration: result.duration,
            transient_cleanup: result.transient_cleanup.clone(),
        }
    }
}

/// What happened to a job, stage by stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub project_name: String,
    pub archive: PathBuf,
    pub state: JobState,
    pub staged_files: Vec<String>,
    pub command_line: Vec<String>,
    pub pipeline: Option<PipelineSummary>,
    pub collection: Option<CollectionSummary>,
    pub stages: Vec<StageRecord>,
}

impl JobReport {
    pub fn new<P: Into<PathBuf>>(project_name: &str, archive: P) -> Self {
        Self {
            project_name: project_name.to_string(),
            archive: archive.into(),
            state: JobState::Pending,
            staged_files: Vec::new(),
            command_line: Vec::new(),
            pipeline: None,
            collection: None,
            stages: vec![StageRecord {
                state: JobState::Pending,
                reached_at: Utc::now(),
            }],
        }
    }

    /// Moves to `state`, which must directly follow the current one.
    pub fn advance(&mut self, state: JobState) -> Result<()> {
        if self.state.next() != Some(state) {
            return Err(EdentityError::InvalidArgument {
                message: format!("cannot move job from {} to {}", self.state, state),
            });
        }

        self.state = state;
        self.stages.push(StageRecord {
            state,
            reached_at: Utc::now(),
        });
        Ok(())
    }

    pub fn record_staging(&mut self, staged_files: Vec<String>) -> Result<()> {
        self.staged_files = staged_files;
        self.advance(JobState::Staged)
    }

    pub fn record_invocation(&mut self, command_line: Vec<String>, result: &PipelineResult) -> Result<()> {
        self.command_line = command_line;
        self.pipeline = Some(PipelineSummary::from(result));
        self.advance(JobState::Invoked)
    }

    pub fn record_collection(&mut self, summary: CollectionSummary) -> Result<()> {
        self.collection = Some(summary);
        self.advance(JobState::Collected)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.advance(JobState::Done)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        match (self.stages.first(), self.stages.last()) {
            (Some(first), Some(last)) => last.reached_at - first.reached_at,
            _ => chrono::Duration::zero(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EdentityError::InvalidArgument {
            message: format!("Failed to serialize job report: {}", e),
        })
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
