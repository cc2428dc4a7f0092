pub mod archive_extractor;
pub mod read_filter;

pub use archive_extractor::{ArchiveExtractor, ExtractionProgress};
pub use read_filter::ReadFileFilter;
