use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdentityError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input is not a valid ZIP archive: {path} ({reason})")]
    InvalidArchive { path: String, reason: String },

    #[error("FASTQ files cannot be found in zip file: {path}")]
    NoMatchingFiles { path: String },

    #[error("File name {name} contains illegal character: {character:?}")]
    IllegalFilename { name: String, character: char },

    #[error("FASTQ files found in different locations inside the zip file: {}", .directories.join(", "))]
    MixedLocation { directories: Vec<String> },

    #[error("Staged file name collides with an existing file: {name}")]
    BasenameCollision { name: String },

    #[error("Failed to launch pipeline executable {program}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Pipeline exited with status {}", .status.map_or_else(|| "signal".to_string(), |s| s.to_string()))]
    ToolFailed { status: Option<i32> },

    #[error("Expected pipeline output is missing: {artifact} ({path})")]
    MissingOutput { artifact: String, path: String },

    #[error("ZIP operation failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for EdentityError {
    fn user_message(&self) -> String {
        match self {
            EdentityError::InvalidArchive { path, reason } => {
                format!("Input Zip file is not a valid ZIP file: {} ({})", path, reason)
            }
            EdentityError::NoMatchingFiles { path } => {
                format!("No .fastq or .fastq.gz files found in {}", path)
            }
            EdentityError::IllegalFilename { name, character } => {
                format!("File name {} contains illegal character: {:?}", name, character)
            }
            EdentityError::MixedLocation { directories } => {
                let shown: Vec<String> = directories
                    .iter()
                    .map(|d| if d.is_empty() { "<root>".to_string() } else { d.clone() })
                    .collect();
                format!(
                    "FASTQ files found in different locations inside the zip file: {}",
                    shown.join(", ")
                )
            }
            EdentityError::MissingOutput { artifact, path } => {
                format!("Pipeline did not produce the {}: {}", artifact, path)
            }
            EdentityError::ToolLaunch { program, source } => {
                format!("Could not start {}: {}", program, source)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            EdentityError::InvalidArchive { .. } => Some(
                "Upload the reads as a single .zip archive; other container formats are not supported.".to_string()
            ),
            EdentityError::NoMatchingFiles { .. } => Some(
                "Read files must end in .fastq or .fastq.gz (lower case).".to_string()
            ),
            EdentityError::IllegalFilename { .. } => Some(
                "Rename the read files so they contain no spaces, asterisks or quote characters.".to_string()
            ),
            EdentityError::MixedLocation { .. } => Some(
                "Put all read files in the same folder of the archive, or all at its root.".to_string()
            ),
            EdentityError::BasenameCollision { .. } => Some(
                "Remove duplicate entries from the archive or set staging.on_collision = \"overwrite\".".to_string()
            ),
            EdentityError::ToolLaunch { .. } => Some(
                "Check that the edentity executable is installed and on PATH, or set pipeline.executable.".to_string()
            ),
            EdentityError::ToolFailed { .. } => Some(
                "Inspect the pipeline error output above. Set pipeline.on_tool_failure = \"continue\" to collect partial results.".to_string()
            ),
            EdentityError::MissingOutput { .. } => Some(
                "The pipeline run probably failed; check its error output for the cause.".to_string()
            ),
            EdentityError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            _ => None,
        }
    }
}

impl EdentityError {
    /// Process exit code reported to the workflow engine.
    pub fn exit_code(&self) -> i32 {
        match self {
            EdentityError::Cancelled => 130,
            EdentityError::Config { .. } | EdentityError::InvalidArgument { .. } => 2,
            EdentityError::InvalidArchive { .. } => 3,
            EdentityError::NoMatchingFiles { .. } => 4,
            EdentityError::IllegalFilename { .. } => 5,
            EdentityError::MixedLocation { .. } => 6,
            EdentityError::MissingOutput { .. } => 7,
            EdentityError::ToolLaunch { .. } => 8,
            EdentityError::ToolFailed { .. } => 9,
            EdentityError::BasenameCollision { .. } => 10,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, EdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_friendly_messages() {
        let error = EdentityError::IllegalFilename {
            name: "sample 1.fastq".to_string(),
            character: ' ',
        };
        assert!(error.user_message().contains("sample 1.fastq"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_mixed_location_names_root() {
        let error = EdentityError::MixedLocation {
            directories: vec!["".to_string(), "reads".to_string()],
        };
        assert!(error.user_message().contains("<root>"));
        assert!(error.user_message().contains("reads"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(EdentityError::Cancelled.exit_code(), 130);
        assert_eq!(
            EdentityError::NoMatchingFiles { path: "a.zip".to_string() }.exit_code(),
            4
        );
        assert_eq!(
            EdentityError::MissingOutput {
                artifact: "ESV table".to_string(),
                path: "x".to_string()
            }
            .exit_code(),
            7
        );
        assert_eq!(EdentityError::ToolFailed { status: Some(1) }.exit_code(), 9);
    }

    #[test]
    fn test_tool_failed_display() {
        assert_eq!(
            EdentityError::ToolFailed { status: Some(3) }.to_string(),
            "Pipeline exited with status 3"
        );
        assert_eq!(
            EdentityError::ToolFailed { status: None }.to_string(),
            "Pipeline exited with status signal"
        );
    }
}
