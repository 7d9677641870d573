pub type Result<T> = std::result::Result<T, muster_common::PipelineError>;
