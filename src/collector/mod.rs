pub mod job_report;
pub mod output_collector;

pub use job_report::{JobReport, JobState, PipelineSummary, StageRecord};
pub use output_collector::{
    move_file, write_report_archive, ArtifactDestinations, ArtifactEntry, ArtifactKind,
    CollectionSummary, MovedArtifact, OutputArtifactMap, OutputCollector, OutputLayout,
    ReportBundle,
};
