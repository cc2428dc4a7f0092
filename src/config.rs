use crate::error::{EdentityError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub staging: StagingConfig,
    pub pipeline: PipelineConfig,
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory (relative to the job base directory) receiving the reads.
    pub input_dir: String,
    /// Regex an archive entry name must match to be staged.
    pub read_pattern: String,
    pub illegal_chars: Vec<char>,
    pub on_collision: CollisionPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub executable: String,
    /// Scratch directory left behind by the pipeline's workflow engine.
    pub transient_dir: String,
    pub on_tool_failure: ToolFailurePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub results_dir: String,
    pub report_dir: String,
    pub fasta_dir: String,
    pub report_extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    Overwrite,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFailurePolicy {
    Continue,
    Abort,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            input_dir: "input_data".to_string(),
            read_pattern: r".*[.]fastq([.]gz)?$".to_string(),
            illegal_chars: vec![' ', '*', '\'', '"'],
            on_collision: CollisionPolicy::Overwrite,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            executable: "edentity".to_string(),
            transient_dir: ".snakemake".to_string(),
            on_tool_failure: ToolFailurePolicy::Continue,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            results_dir: "Results".to_string(),
            report_dir: "report".to_string(),
            fasta_dir: "ESVs_fasta".to_string(),
            report_extension: "json".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EdentityError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| EdentityError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| EdentityError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["edentity-galaxy.toml", ".edentity-galaxy.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref executable) = cli_args.executable {
            self.pipeline.executable = executable.clone();
        }

        if let Some(policy) = cli_args.on_tool_failure {
            self.pipeline.on_tool_failure = policy;
        }

        if let Some(policy) = cli_args.on_collision {
            self.staging.on_collision = policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.executable.trim().is_empty() {
            return Err(EdentityError::Config {
                message: "Pipeline executable must not be empty".to_string(),
            });
        }

        if let Err(e) = regex::Regex::new(&self.staging.read_pattern) {
            return Err(EdentityError::Config {
                message: format!("Invalid read_pattern {:?}: {}", self.staging.read_pattern, e),
            });
        }

        // These names are joined onto the job base directory.
        for (key, value) in [
            ("staging.input_dir", &self.staging.input_dir),
            ("pipeline.transient_dir", &self.pipeline.transient_dir),
            ("collection.results_dir", &self.collection.results_dir),
            ("collection.report_dir", &self.collection.report_dir),
            ("collection.fasta_dir", &self.collection.fasta_dir),
        ] {
            if value.is_empty() || Path::new(value).is_absolute() || value.contains("..") {
                return Err(EdentityError::Config {
                    message: format!("{} must be a non-empty relative name, got {:?}", key, value),
                });
            }
        }

        if self.collection.report_extension.is_empty() {
            return Err(EdentityError::Config {
                message: "collection.report_extension must not be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn staging_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.staging.input_dir)
    }

    pub fn transient_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.pipeline.transient_dir)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub executable: Option<String>,
    pub on_tool_failure: Option<ToolFailurePolicy>,
    pub on_collision: Option<CollisionPolicy>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(mut self, executable: Option<String>) -> Self {
        self.executable = executable;
        self
    }

    pub fn with_tool_failure_policy(mut self, policy: Option<ToolFailurePolicy>) -> Self {
        self.on_tool_failure = policy;
        self
    }

    pub fn with_collision_policy(mut self, policy: Option<CollisionPolicy>) -> Self {
        self.on_collision = policy;
        self
    }
}
