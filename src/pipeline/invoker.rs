use crate::config::{PipelineConfig, ToolFailurePolicy};
use crate::error::{EdentityError, Result};
use crate::pipeline::job_spec::PipelineJobSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// `None` when the child was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub transient_cleanup: CleanupOutcome,
}

impl PipelineResult {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Turns a failed run into an error when the policy says so.
    pub fn enforce(&self, policy: ToolFailurePolicy) -> Result<()> {
        if !self.success() && policy == ToolFailurePolicy::Abort {
            return Err(EdentityError::ToolFailed {
                status: self.status,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineInvoker {
    executable: String,
    working_dir: Option<PathBuf>,
}

impl PipelineInvoker {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            working_dir: None,
        }
    }

    pub fn with_executable<S: Into<String>>(mut self, executable: S) -> Self {
        self.executable = executable.into();
        self
    }

    /// Directory the child runs in; its workflow engine drops scratch state there.
    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn command_line(&self, spec: &PipelineJobSpec) -> Vec<String> {
        let mut line = vec![self.executable.clone()];
        line.extend(spec.to_args());
        line
    }

    /// Runs the pipeline to completion, then removes `transient_dir` whatever
    /// the exit status was. Only a failure to start the process is an error.
    pub fn invoke(&self, spec: &PipelineJobSpec, transient_dir: &Path) -> Result<PipelineResult> {
        let start = Instant::now();

        let mut command = Command::new(&self.executable);
        command
            .args(spec.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|e| EdentityError::ToolLaunch {
            program: self.executable.clone(),
            source: e,
        });

        // Scratch state is cleared even when the launch itself failed.
        let transient_cleanup = remove_transient_dir(transient_dir);
        let output = output?;

        Ok(PipelineResult {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
            transient_cleanup,
        })
    }
}

pub fn remove_transient_dir(dir: &Path) -> CleanupOutcome {
    if !dir.is_dir() {
        return CleanupOutcome::NotFound;
    }

    match fs::remove_dir_all(dir) {
        Ok(()) => CleanupOutcome::Removed,
        Err(e) => CleanupOutcome::Failed(e.to_string()),
    }
}
