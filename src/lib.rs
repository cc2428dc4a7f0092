pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod staging;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, CollectionConfig, CollisionPolicy, Config, PipelineConfig, StagingConfig, ToolFailurePolicy};
pub use error::{EdentityError, Result, UserFriendlyError};
pub use job::JobRequest;

// Core functionality re-exports
pub use collector::{ArtifactDestinations, JobReport, JobState, OutputArtifactMap, OutputCollector, OutputLayout};
pub use pipeline::{CleanupOutcome, PipelineInvoker, PipelineJobSpec, PipelineParam, PipelineResult};
pub use staging::{ArchiveExtractor, ExtractionProgress};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, PipelineStream, ProgressManager};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;

/// Runs one Galaxy job: stage the reads, run the pipeline, collect the outputs.
pub struct EdentityGalaxy {
    config: Config,
    base_dir: PathBuf,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl EdentityGalaxy {
    pub fn new<P: Into<PathBuf>>(
        config: Config,
        base_dir: P,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Result<Self> {
        Ok(Self {
            config,
            base_dir: absolute_base_dir(base_dir.into())?,
            output_formatter: OutputFormatter::new(output_mode, verbose, quiet),
            progress_manager: ProgressManager::new(!quiet && output_mode == OutputMode::Human),
            shutdown: GracefulShutdown::new()?,
        })
    }

    /// No signal handler, no progress bars.
    #[cfg(test)]
    pub fn new_for_test<P: Into<PathBuf>>(config: Config, base_dir: P) -> Self {
        Self {
            config,
            base_dir: absolute_base_dir(base_dir.into()).unwrap(),
            output_formatter: OutputFormatter::new(OutputMode::Plain, 0, true),
            progress_manager: ProgressManager::new(false),
            shutdown: GracefulShutdown::new_for_test(),
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let base_dir = cli_args.base_dir()?;

        Self::new(
            config,
            base_dir,
            cli_args.output_mode(),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    pub async fn run_job(&self, request: &JobRequest) -> Result<JobReport> {
        let mut report = JobReport::new(&request.project_name, &request.archive);
        self.execute(request, &mut report).await?;
        Ok(report)
    }

    /// Drives `report` through every stage. On error the report keeps the
    /// stages reached so far; nothing already done is rolled back.
    pub async fn execute(&self, request: &JobRequest, report: &mut JobReport) -> Result<()> {
        let staging_dir = self.config.staging_dir(&self.base_dir);
        let work_dir = request.work_dir(&self.base_dir);

        self.output_formatter
            .info(&format!("Input directory: {}", staging_dir.display()));
        self.output_formatter
            .info(&format!("Pipeline work directory: {}", work_dir.display()));
        self.output_formatter
            .info(&format!("Job directory: {}", self.base_dir.display()));

        self.shutdown
            .with_shutdown_check(async {
                let staged = self.stage_reads(&request.archive, &staging_dir).await?;
                report.record_staging(staged)
            })
            .await?;

        self.shutdown
            .with_shutdown_check(async {
                let spec = request.pipeline_spec(&staging_dir, &work_dir);
                let (command_line, result) = self.invoke_pipeline(spec).await?;
                report.record_invocation(command_line, &result)?;
                self.report_pipeline_result(&result);
                result.enforce(self.config.pipeline.on_tool_failure)
            })
            .await?;

        let summary = self.collect_outputs(request, &work_dir).await?;
        report.record_collection(summary)?;

        report.finish()
    }

    async fn stage_reads(&self, archive: &Path, staging_dir: &Path) -> Result<Vec<String>> {
        self.output_formatter.start_operation("Staging reads from archive");

        let file_progress = self.progress_manager.create_file_progress(0);
        let extractor = ArchiveExtractor::new(&self.config.staging)?;
        let archive = archive.to_path_buf();
        let staging_dir = staging_dir.to_path_buf();
        let pb = file_progress.clone();
        let start = Instant::now();

        let staged = task::spawn_blocking(move || {
            let progress_callback = |progress: &ExtractionProgress| {
                ui::progress::update_file_progress(&pb, progress);
            };
            extractor.validate_and_extract_with_progress(&archive, &staging_dir, Some(&progress_callback))
        })
        .await
        .map_err(|e| EdentityError::Io(std::io::Error::other(format!("Staging task failed: {}", e))))?;

        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                file_progress.abandon();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &file_progress,
            &format!("Staged {} read files", staged.len()),
            start.elapsed(),
        );
        self.output_formatter
            .success(&format!("Staged {} read files", staged.len()));
        for name in &staged {
            self.output_formatter.debug(name);
        }

        Ok(staged)
    }

    async fn invoke_pipeline(&self, spec: PipelineJobSpec) -> Result<(Vec<String>, PipelineResult)> {
        let invoker = PipelineInvoker::new(&self.config.pipeline).with_working_dir(&self.base_dir);
        let command_line = invoker.command_line(&spec);

        self.output_formatter
            .start_operation(&format!("Running {}", invoker.executable()));
        self.output_formatter.debug(&command_line.join(" "));

        let spinner = self
            .progress_manager
            .create_spinner(&format!("Running {}", invoker.executable()));
        let transient_dir = self.config.transient_dir(&self.base_dir);

        let result = task::spawn_blocking(move || invoker.invoke(&spec, &transient_dir))
            .await
            .map_err(|e| EdentityError::Io(std::io::Error::other(format!("Pipeline task failed: {}", e))))?;

        match result {
            Ok(result) => {
                ui::progress::finish_progress_with_summary(&spinner, "Pipeline finished", result.duration);
                Ok((command_line, result))
            }
            Err(e) => {
                spinner.abandon();
                Err(e)
            }
        }
    }

    fn report_pipeline_result(&self, result: &PipelineResult) {
        if result.success() {
            self.output_formatter
                .print_pipeline_output(PipelineStream::Stdout, &result.stdout);
        } else {
            self.output_formatter
                .print_pipeline_output(PipelineStream::Stderr, &result.stderr);
            let status = result
                .status
                .map_or_else(|| "a signal".to_string(), |s| format!("status {}", s));
            self.output_formatter
                .warning(&format!("Pipeline exited with {}", status));
        }

        let transient_dir = self.config.transient_dir(&self.base_dir);
        match result.transient_cleanup {
            CleanupOutcome::Removed => self.output_formatter.info(&format!(
                "Removed pipeline scratch directory {}",
                transient_dir.display()
            )),
            CleanupOutcome::NotFound => self.output_formatter.warning(&format!(
                "Pipeline scratch directory not found ({})",
                transient_dir.display()
            )),
            CleanupOutcome::Failed(ref reason) => self.output_formatter.warning(&format!(
                "Could not remove pipeline scratch directory {}: {}",
                transient_dir.display(),
                reason
            )),
        }
    }

    async fn collect_outputs(
        &self,
        request: &JobRequest,
        work_dir: &Path,
    ) -> Result<collector::CollectionSummary> {
        self.output_formatter.start_operation("Collecting pipeline outputs");

        let layout = OutputLayout::new(&self.config.collection, &request.project_name);
        let artifact_map =
            OutputArtifactMap::standard(&layout, &self.config.collection, &request.destinations);
        let work_dir = work_dir.to_path_buf();

        let summary = task::spawn_blocking(move || OutputCollector::new().collect(&work_dir, &artifact_map))
            .await
            .map_err(|e| EdentityError::Io(std::io::Error::other(format!("Collection task failed: {}", e))))??;

        for moved in &summary.moved {
            self.output_formatter.debug(&format!(
                "{} -> {}",
                moved.kind,
                moved.destination.display()
            ));
        }
        self.output_formatter.success(&format!(
            "Collected {} outputs and {} JSON reports",
            summary.moved.len(),
            summary.archived_reports.len()
        ));

        Ok(summary)
    }

    /// The command line the job would run, without touching the filesystem.
    pub fn planned_command_line(&self, request: &JobRequest) -> Vec<String> {
        let staging_dir = self.config.staging_dir(&self.base_dir);
        let work_dir = request.work_dir(&self.base_dir);
        PipelineInvoker::new(&self.config.pipeline).command_line(&request.pipeline_spec(&staging_dir, &work_dir))
    }

    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        std::fs::write(output_path.as_ref(), Config::create_sample_config())?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    pub fn handle_error(&self, error: &EdentityError) {
        self.progress_manager.clear();
        self.output_formatter.print_user_friendly_error(error);
    }
}

/// The pipeline child runs inside the base dir, so every path handed to it
/// must already be absolute.
fn absolute_base_dir(base_dir: PathBuf) -> Result<PathBuf> {
    Ok(std::path::absolute(base_dir)?)
}

pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "edentity-galaxy {} ({}) built on {} for {}",
            self.version, self.git_hash, self.build_date, self.target
        )
    }
}
