pub mod invoker;
pub mod job_spec;

pub use invoker::{CleanupOutcome, PipelineInvoker, PipelineResult};
pub use job_spec::{is_truthy, PipelineJobSpec, PipelineParam};
