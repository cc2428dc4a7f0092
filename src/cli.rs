use crate::collector::ArtifactDestinations;
use crate::config::{CliOverrides, CollisionPolicy, Config, ToolFailurePolicy};
use crate::error::{EdentityError, Result};
use crate::job::{validate_archive_path, JobRequest};
use crate::pipeline::{PipelineJobSpec, PipelineParam};
use crate::ui::OutputMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "edentity-galaxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Galaxy client for the eDentity metabarcoding pipeline")]
#[command(
    long_about = "Stages FASTQ reads from a ZIP archive, runs the edentity pipeline on them \
                  and moves the resulting tables, reports and sequences to the paths Galaxy expects."
)]
#[command(after_help = "EXAMPLES:\n  \
    edentity-galaxy --project_name run7 --dataType Illumina --input_fastqs reads.zip ... \n  \
    edentity-galaxy --generate-config --config edentity-galaxy.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Name of the project; used as the pipeline work directory and in output names
    #[arg(long = "project_name", required_unless_present = "generate_config")]
    pub project_name: Option<String>,

    /// Sequencing platform (Illumina or AVITI)
    #[arg(long = "dataType", required_unless_present = "generate_config")]
    pub data_type: Option<String>,

    /// ZIP archive containing the FASTQ files
    #[arg(
        long = "input_fastqs",
        value_parser = validate_archive_path,
        required_unless_present = "generate_config"
    )]
    pub input_fastqs: Option<String>,

    /// Maximum number of N bases allowed in a read
    #[arg(long = "n_max", required_unless_present = "generate_config")]
    pub n_max: Option<String>,

    /// Minimum average quality score required
    #[arg(long = "average_qual", required_unless_present = "generate_config")]
    pub average_qual: Option<String>,

    /// Minimum read length required after trimming
    #[arg(long = "length_required", required_unless_present = "generate_config")]
    pub length_required: Option<String>,

    /// Maximum percentage of mismatches allowed in the overlap region
    #[arg(long = "fastq_maxdiffpct", required_unless_present = "generate_config")]
    pub fastq_maxdiffpct: Option<String>,

    /// Maximum number of mismatches allowed in the overlap region
    #[arg(long = "fastq_maxdiff", required_unless_present = "generate_config")]
    pub fastq_maxdiff: Option<String>,

    /// Minimum overlap length between read pairs
    #[arg(long = "fastq_minovlen", required_unless_present = "generate_config")]
    pub fastq_minovlen: Option<String>,

    #[arg(long = "forward_primer", required_unless_present = "generate_config")]
    pub forward_primer: Option<String>,

    #[arg(long = "reverse_primer", required_unless_present = "generate_config")]
    pub reverse_primer: Option<String>,

    /// Discard reads without primers ("true" or "1" to enable)
    #[arg(long = "discard_untrimmed", required_unless_present = "generate_config")]
    pub discard_untrimmed: Option<String>,

    /// Anchor primers when trimming ("true" or "1" to enable)
    #[arg(long = "anchored", default_value = "false")]
    pub anchored: String,

    #[arg(long = "minlen", required_unless_present = "generate_config")]
    pub minlen: Option<String>,

    #[arg(long = "maxlen", required_unless_present = "generate_config")]
    pub maxlen: Option<String>,

    /// Maximum expected errors per read
    #[arg(long = "maxee", required_unless_present = "generate_config")]
    pub maxee: Option<String>,

    #[arg(long = "fasta_width", required_unless_present = "generate_config")]
    pub fasta_width: Option<String>,

    /// Alpha parameter of the denoising step
    #[arg(long = "alpha", required_unless_present = "generate_config")]
    pub alpha: Option<String>,

    /// Minimum abundance for an ESV
    #[arg(long = "minsize", required_unless_present = "generate_config")]
    pub minsize: Option<String>,

    /// Create extended per-sample JSON reports ("true" or "1" to enable)
    #[arg(long = "create_extended_json_reports", default_value = "false")]
    pub create_extended_json_reports: String,

    /// Destination of the ESV abundance table
    #[arg(long = "ESV_table_output", required_unless_present = "generate_config")]
    pub esv_table_output: Option<PathBuf>,

    /// Destination of the ESV FASTA file
    #[arg(long = "ESV_sequences", required_unless_present = "generate_config")]
    pub esv_sequences: Option<PathBuf>,

    #[arg(long = "summary_report", required_unless_present = "generate_config")]
    pub summary_report: Option<PathBuf>,

    #[arg(long = "multiqc_report", required_unless_present = "generate_config")]
    pub multiqc_report: Option<PathBuf>,

    /// Destination of the zipped JSON reports
    #[arg(long = "json_reports", required_unless_present = "generate_config")]
    pub json_reports: Option<PathBuf>,

    /// Conda environment prefix (recorded only)
    #[arg(long = "conda_prefix")]
    pub conda_prefix: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Directory the job runs in (defaults to the current directory)
    #[arg(long = "base-dir", env = "EDENTITY_GALAXY_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Pipeline executable to run instead of the configured one
    #[arg(long)]
    pub executable: Option<String>,

    /// What to do when the pipeline exits with a non-zero status
    #[arg(long, value_enum)]
    pub on_tool_failure: Option<FailurePolicyArg>,

    /// What to do when two staged reads share a file name
    #[arg(long, value_enum)]
    pub on_collision: Option<CollisionPolicyArg>,

    /// Write the job report as JSON to this path
    #[arg(long)]
    pub job_report: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show the pipeline command line without staging or running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl From<&OutputFormat> for OutputMode {
    fn from(format: &OutputFormat) -> Self {
        match format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FailurePolicyArg {
    /// Log the failure and still try to collect outputs
    Continue,
    /// Stop the job with an error
    Abort,
}

impl From<FailurePolicyArg> for ToolFailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Continue => ToolFailurePolicy::Continue,
            FailurePolicyArg::Abort => ToolFailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CollisionPolicyArg {
    /// Later entries replace earlier ones
    Overwrite,
    /// Refuse to stage
    Reject,
}

impl From<CollisionPolicyArg> for CollisionPolicy {
    fn from(arg: CollisionPolicyArg) -> Self {
        match arg {
            CollisionPolicyArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionPolicyArg::Reject => CollisionPolicy::Reject,
        }
    }
}

fn required<'a, T>(value: &'a Option<T>, flag: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| EdentityError::InvalidArgument {
        message: format!("--{} is required", flag),
    })
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_executable(self.executable.clone())
            .with_tool_failure_policy(self.on_tool_failure.map(Into::into))
            .with_collision_policy(self.on_collision.map(Into::into))
    }

    pub fn base_dir(&self) -> Result<PathBuf> {
        match self.base_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(&self.output_format)
    }

    pub fn destinations(&self) -> Result<ArtifactDestinations> {
        Ok(ArtifactDestinations {
            esv_table: required(&self.esv_table_output, "ESV_table_output")?.clone(),
            summary_report: required(&self.summary_report, "summary_report")?.clone(),
            multiqc_report: required(&self.multiqc_report, "multiqc_report")?.clone(),
            esv_sequences: required(&self.esv_sequences, "ESV_sequences")?.clone(),
            json_reports: required(&self.json_reports, "json_reports")?.clone(),
        })
    }

    /// Tool settings keyed by the pipeline flag each one feeds.
    pub fn pipeline_settings(&self) -> Result<PipelineJobSpec> {
        Ok(PipelineJobSpec::new()
            .with(PipelineParam::DataType, required(&self.data_type, "dataType")?)
            .with(PipelineParam::ForwardPrimer, required(&self.forward_primer, "forward_primer")?)
            .with(PipelineParam::ReversePrimer, required(&self.reverse_primer, "reverse_primer")?)
            .with(PipelineParam::MakeJsonReports, &self.create_extended_json_reports)
            .with(
                PipelineParam::DiscardUntrimmed,
                required(&self.discard_untrimmed, "discard_untrimmed")?,
            )
            .with(PipelineParam::Anchoring, &self.anchored)
            .with(PipelineParam::NBaseLimit, required(&self.n_max, "n_max")?)
            .with(PipelineParam::AverageQual, required(&self.average_qual, "average_qual")?)
            .with(
                PipelineParam::LengthRequired,
                required(&self.length_required, "length_required")?,
            )
            .with(PipelineParam::MaxDiffPct, required(&self.fastq_maxdiffpct, "fastq_maxdiffpct")?)
            .with(PipelineParam::MinOverlap, required(&self.fastq_minovlen, "fastq_minovlen")?)
            .with(PipelineParam::MaxDiffs, required(&self.fastq_maxdiff, "fastq_maxdiff")?)
            .with(PipelineParam::MinLength, required(&self.minlen, "minlen")?)
            .with(PipelineParam::MaxLength, required(&self.maxlen, "maxlen")?)
            .with(PipelineParam::MaxExpectedErrors, required(&self.maxee, "maxee")?)
            .with(PipelineParam::FastaWidth, required(&self.fasta_width, "fasta_width")?)
            .with(PipelineParam::Alpha, required(&self.alpha, "alpha")?)
            .with(PipelineParam::MinSize, required(&self.minsize, "minsize")?))
    }

    pub fn job_request(&self) -> Result<JobRequest> {
        JobRequest::new(
            required(&self.project_name, "project_name")?,
            required(&self.input_fastqs, "input_fastqs")?,
            self.pipeline_settings()?,
            self.destinations()?,
        )
    }
}
